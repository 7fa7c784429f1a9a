// Copyright 2020 Dmitry Tantsur <dtantsur@protonmail.com>
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

//! Support for the environment variables of the nova shell.

use std::env;
use std::str::FromStr;

use super::ClientSettings;
use crate::utils::{parse_bool, parse_timeout};
use crate::{Credentials, Error, HttpClient, InterfaceType, PluginRegistry};

// This is only used for unit testing.
trait Environment {
    fn get(&self, name: &'static str) -> Option<String>;

    fn first_of(&self, names: &[&'static str]) -> Option<String> {
        names.iter().find_map(|name| self.get(name))
    }
}

#[derive(Debug, Clone, Copy)]
struct RealEnvironment;

impl Environment for RealEnvironment {
    fn get(&self, name: &'static str) -> Option<String> {
        env::var(name).ok().filter(|value| !value.is_empty())
    }
}

fn credentials_from_env<E: Environment>(env: &E) -> Result<Credentials, Error> {
    let mut creds = Credentials::new();
    if let Some(username) = env.get("OS_USERNAME") {
        creds = creds.with_user(username);
    }
    if let Some(user_id) = env.get("OS_USER_ID") {
        creds = creds.with_user_id(user_id);
    }
    if let Some(password) = env.get("OS_PASSWORD") {
        creds = creds.with_password(password);
    }
    if let Some(project) = env.first_of(&["OS_TENANT_NAME", "OS_PROJECT_NAME"]) {
        creds = creds.with_project(project);
    }
    if let Some(tenant_id) = env.first_of(&["OS_TENANT_ID", "OS_PROJECT_ID"]) {
        creds = creds.with_tenant_id(tenant_id);
    }
    if let Some(auth_url) = env.get("OS_AUTH_URL") {
        creds = creds.with_auth_url(auth_url);
    }
    if let Some(token) = env.get("OS_AUTH_TOKEN") {
        creds = creds.with_token(token);
    }
    if let Some(region) = env.get("OS_REGION_NAME") {
        creds = creds.with_region(region);
    }
    if let Some(endpoint_type) = env.first_of(&["NOVA_ENDPOINT_TYPE", "OS_ENDPOINT_TYPE"]) {
        creds = creds.with_endpoint_type(InterfaceType::from_str(&endpoint_type)?);
    }
    Ok(creds)
}

fn flag<E: Environment>(env: &E, name: &'static str) -> Result<bool, Error> {
    match env.get(name) {
        Some(value) => parse_bool(name, &value),
        None => Ok(false),
    }
}

#[inline]
fn _from_env<E: Environment>(env: E, registry: &PluginRegistry) -> Result<HttpClient, Error> {
    let auth_system = match env.get("OS_AUTH_SYSTEM") {
        Some(name) => registry.resolve(&name)?,
        None => Default::default(),
    };

    let settings = ClientSettings {
        credentials: credentials_from_env(&env)?,
        auth_system,
        service_type: env.get("OS_COMPUTE_SERVICE_TYPE"),
        service_name: env.get("NOVA_SERVICE_NAME"),
        volume_service_name: env.get("NOVA_VOLUME_SERVICE_NAME"),
        bypass_url: env.get("NOVACLIENT_BYPASS_URL"),
        cacert: env.get("OS_CACERT"),
        insecure: flag(&env, "OS_INSECURE")?,
        use_cache: flag(&env, "OS_CACHE")?,
        debug: flag(&env, "NOVACLIENT_DEBUG")?,
        timeout: env
            .get("OS_TIMEOUT")
            .map(|value| parse_timeout("OS_TIMEOUT", &value))
            .transpose()?,
    };

    settings.into_client()
}

/// Create a classic dispatcher from environment variables.
///
/// Only the built-in `keystone` authentication system is available, use
/// [from_env_with_plugins](fn.from_env_with_plugins.html) for plugins.
pub fn from_env() -> Result<HttpClient, Error> {
    _from_env(RealEnvironment, &PluginRegistry::new())
}

/// Create a classic dispatcher from environment variables.
///
/// `OS_AUTH_SYSTEM` is resolved against the provided plugin registry.
pub fn from_env_with_plugins(registry: &PluginRegistry) -> Result<HttpClient, Error> {
    _from_env(RealEnvironment, registry)
}

#[cfg(test)]
pub mod test {
    use std::collections::HashMap;
    use std::time::Duration;

    use maplit::hashmap;

    use super::{Environment, _from_env};
    use crate::plugin::test::FakePlugin;
    use crate::{ErrorKind, InterfaceType, PluginRegistry};

    impl Environment for HashMap<&'static str, &'static str> {
        fn get(&self, name: &'static str) -> Option<String> {
            HashMap::get(self, name).map(|value| value.to_string())
        }
    }

    #[test]
    fn test_password() {
        let env = hashmap! {
            "OS_AUTH_URL" => "http://example.com:5000/v2.0/",
            "OS_USERNAME" => "admin",
            "OS_PASSWORD" => "password",
            "OS_TENANT_NAME" => "admin",
            "OS_PROJECT_NAME" => "ignored",
            "OS_REGION_NAME" => "RegionOne",
            "NOVA_ENDPOINT_TYPE" => "internalURL",
        };

        let client = _from_env(env, &PluginRegistry::new()).unwrap();
        let creds = client.credentials();
        assert_eq!(creds.auth_url(), Some("http://example.com:5000/v2.0"));
        assert_eq!(creds.username(), Some("admin"));
        assert_eq!(creds.project(), Some("admin"));
        assert_eq!(creds.region(), Some("RegionOne"));
        assert_eq!(creds.endpoint_type(), InterfaceType::Internal);
        assert!(creds.has_password());
        assert!(client.management_url().is_none());
        assert!(!client.uses_token_cache());
    }

    #[test]
    fn test_token_and_bypass() {
        let env = hashmap! {
            "OS_AUTH_URL" => "http://example.com/v2.0",
            "OS_AUTH_TOKEN" => "abcdef",
            "OS_TENANT_ID" => "1234",
            "NOVACLIENT_BYPASS_URL" => "http://nova.example.com/v2/1234/",
            "OS_INSECURE" => "yes",
            "OS_TIMEOUT" => "2.5",
        };

        let client = _from_env(env, &PluginRegistry::new()).unwrap();
        assert_eq!(client.auth_token(), Some("abcdef"));
        assert_eq!(client.credentials().tenant_id(), Some("1234"));
        assert_eq!(client.management_url(), Some("http://nova.example.com/v2/1234"));
        assert_eq!(client.transport().timeout, Some(Duration::from_millis(2500)));
        assert!(client.transport().verify.is_insecure());
    }

    #[test]
    fn test_invalid_values() {
        let env = hashmap! {"OS_INSECURE" => "perhaps"};
        let err = _from_env(env, &PluginRegistry::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);

        let env = hashmap! {"OS_ENDPOINT_TYPE" => "private"};
        let err = _from_env(env, &PluginRegistry::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let env = hashmap! {"OS_TIMEOUT" => "never"};
        let err = _from_env(env, &PluginRegistry::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);
    }

    #[test]
    fn test_auth_system() {
        let env = hashmap! {"OS_AUTH_SYSTEM" => "fake"};
        let err = _from_env(env.clone(), &PluginRegistry::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AuthSystemNotFound);

        let registry = PluginRegistry::new().with_plugin("fake", FakePlugin);
        let client = _from_env(env, &registry).unwrap();
        assert_eq!(client.auth_system().name(), "fake");

        let env = hashmap! {"OS_AUTH_SYSTEM" => "keystone"};
        let client = _from_env(env, &PluginRegistry::new()).unwrap();
        assert_eq!(client.auth_system().name(), "keystone");
    }
}
