// Copyright 2021 Dmitry Tantsur <dtantsur@protonmail.com>
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Pluggable authentication systems.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;

use serde_json::Value;
use static_assertions::assert_obj_safe;

use super::{Credentials, Error, ErrorKind};

/// Name of the built-in authentication system.
pub const KEYSTONE: &str = "keystone";

/// An authentication plugin for the classic dispatcher.
///
/// A plugin replaces the body of the Identity V2 token request, the response
/// is processed the same way as for the built-in password authentication.
pub trait AuthPlugin: Debug + Send + Sync {
    /// Authentication URL to use when none is configured.
    fn auth_url(&self) -> Option<String> {
        None
    }

    /// JSON body to post to `<auth_url>/tokens`.
    fn auth_body(&self, credentials: &Credentials) -> Result<Value, Error>;
}

assert_obj_safe!(AuthPlugin);

/// Authentication system of the classic dispatcher.
#[derive(Debug, Clone, Default)]
pub enum AuthSystem {
    /// Built-in Identity authentication.
    #[default]
    Keystone,
    /// Authentication through a registered plugin.
    Plugin {
        /// Name the plugin is registered under.
        name: String,
        /// The plugin itself.
        plugin: Arc<dyn AuthPlugin>,
    },
}

/// Registry of authentication plugins.
///
/// Plugins are registered explicitly and looked up by name:
///
/// ```rust
/// use osnova::{AuthPlugin, Credentials, PluginRegistry};
///
/// #[derive(Debug)]
/// struct Fake;
///
/// impl AuthPlugin for Fake {
///     fn auth_body(&self, _creds: &Credentials) -> Result<serde_json::Value, osnova::Error> {
///         Ok(serde_json::json!({"auth": {"fake": "me"}}))
///     }
/// }
///
/// let registry = PluginRegistry::new().with_plugin("fake", Fake);
/// assert!(registry.resolve("fake").is_ok());
/// assert!(registry.resolve("other").is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct PluginRegistry {
    plugins: BTreeMap<String, Arc<dyn AuthPlugin>>,
}

impl AuthSystem {
    /// Name of the authentication system.
    pub fn name(&self) -> &str {
        match self {
            AuthSystem::Keystone => KEYSTONE,
            AuthSystem::Plugin { ref name, .. } => name,
        }
    }
}

impl PluginRegistry {
    /// Create an empty registry.
    #[inline]
    pub fn new() -> PluginRegistry {
        PluginRegistry::default()
    }

    /// Register a plugin, replacing any plugin with the same name.
    pub fn register<S, P>(&mut self, name: S, plugin: P)
    where
        S: Into<String>,
        P: AuthPlugin + 'static,
    {
        let _ = self.plugins.insert(name.into(), Arc::new(plugin));
    }

    /// Add a plugin.
    #[inline]
    pub fn with_plugin<S, P>(mut self, name: S, plugin: P) -> Self
    where
        S: Into<String>,
        P: AuthPlugin + 'static,
    {
        self.register(name, plugin);
        self
    }

    /// Names of registered plugins.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.plugins.keys().map(String::as_str)
    }

    /// Resolve an authentication system by name.
    pub fn resolve(&self, name: &str) -> Result<AuthSystem, Error> {
        if name == KEYSTONE {
            return Ok(AuthSystem::Keystone);
        }

        self.plugins
            .get(name)
            .map(|plugin| AuthSystem::Plugin {
                name: name.to_string(),
                plugin: Arc::clone(plugin),
            })
            .ok_or_else(|| {
                Error::new(
                    ErrorKind::AuthSystemNotFound,
                    format!("AuthSystemNotFound: {}", name),
                )
            })
    }
}

#[cfg(test)]
pub mod test {
    use serde_json::{json, Value};

    use super::{AuthPlugin, AuthSystem, PluginRegistry};
    use crate::{Credentials, Error, ErrorKind};

    #[derive(Debug)]
    pub(crate) struct FakePlugin;

    impl AuthPlugin for FakePlugin {
        fn auth_url(&self) -> Option<String> {
            Some("http://auth/v2.0".to_string())
        }

        fn auth_body(&self, _credentials: &Credentials) -> Result<Value, Error> {
            Ok(json!({"auth": {"fake": "me"}}))
        }
    }

    #[test]
    fn test_resolve_keystone() {
        let registry = PluginRegistry::new();
        let system = registry.resolve("keystone").unwrap();
        assert!(matches!(system, AuthSystem::Keystone));
        assert_eq!(system.name(), "keystone");
    }

    #[test]
    fn test_resolve_plugin() {
        let mut registry = PluginRegistry::new();
        registry.register("fake", FakePlugin);
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["fake"]);
        let system = registry.resolve("fake").unwrap();
        assert_eq!(system.name(), "fake");
        match system {
            AuthSystem::Plugin { plugin, .. } => {
                assert_eq!(plugin.auth_url().as_deref(), Some("http://auth/v2.0"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_resolve_missing() {
        let err = PluginRegistry::new().resolve("notexists").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AuthSystemNotFound);
    }
}
