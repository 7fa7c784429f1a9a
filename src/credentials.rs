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

//! User credentials for the classic dispatcher.

use std::fmt;

use super::url::trim_slash;
use super::InterfaceType;

/// Credentials and identity endpoint settings.
///
/// ```rust
/// let creds = osnova::Credentials::new()
///     .with_user("demo")
///     .with_password("s3cr3t")
///     .with_project("demo")
///     .with_auth_url("https://keystone.example.com:5000/v2.0/");
/// assert_eq!(creds.auth_url(), Some("https://keystone.example.com:5000/v2.0"));
/// ```
#[derive(Clone, Default)]
pub struct Credentials {
    pub(crate) username: Option<String>,
    pub(crate) user_id: Option<String>,
    pub(crate) password: Option<String>,
    pub(crate) project: Option<String>,
    pub(crate) tenant_id: Option<String>,
    pub(crate) token: Option<String>,
    pub(crate) auth_url: Option<String>,
    pub(crate) region: Option<String>,
    pub(crate) endpoint_type: InterfaceType,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("user_id", &self.user_id)
            .field("project", &self.project)
            .field("tenant_id", &self.tenant_id)
            .field("auth_url", &self.auth_url)
            .field("region", &self.region)
            .field("endpoint_type", &self.endpoint_type)
            .finish_non_exhaustive()
    }
}

impl Credentials {
    /// Empty credentials.
    #[inline]
    pub fn new() -> Credentials {
        Credentials::default()
    }

    /// Add a user name.
    #[inline]
    pub fn with_user<S: Into<String>>(mut self, value: S) -> Self {
        self.username = Some(value.into());
        self
    }

    /// Add a user ID, it takes precedence over the user name.
    #[inline]
    pub fn with_user_id<S: Into<String>>(mut self, value: S) -> Self {
        self.user_id = Some(value.into());
        self
    }

    /// Add a password (an API key for the V1 protocol).
    #[inline]
    pub fn with_password<S: Into<String>>(mut self, value: S) -> Self {
        self.password = Some(value.into());
        self
    }

    /// Add a project (tenant) name.
    #[inline]
    pub fn with_project<S: Into<String>>(mut self, value: S) -> Self {
        self.project = Some(value.into());
        self
    }

    /// Add a tenant ID, it takes precedence over the project name.
    #[inline]
    pub fn with_tenant_id<S: Into<String>>(mut self, value: S) -> Self {
        self.tenant_id = Some(value.into());
        self
    }

    /// Add an existing authentication token.
    #[inline]
    pub fn with_token<S: Into<String>>(mut self, value: S) -> Self {
        self.token = Some(value.into());
        self
    }

    /// Add an authentication URL, trailing slashes are removed.
    #[inline]
    pub fn with_auth_url<S: AsRef<str>>(mut self, value: S) -> Self {
        self.auth_url = Some(trim_slash(value.as_ref()).to_string());
        self
    }

    /// Add a region.
    #[inline]
    pub fn with_region<S: Into<String>>(mut self, value: S) -> Self {
        self.region = Some(value.into());
        self
    }

    /// Set the endpoint interface to use (public by default).
    #[inline]
    pub fn with_endpoint_type(mut self, value: InterfaceType) -> Self {
        self.endpoint_type = value;
        self
    }

    /// User name.
    #[inline]
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// User ID.
    #[inline]
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Project (tenant) name.
    #[inline]
    pub fn project(&self) -> Option<&str> {
        self.project.as_deref()
    }

    /// Tenant ID.
    #[inline]
    pub fn tenant_id(&self) -> Option<&str> {
        self.tenant_id.as_deref()
    }

    /// Authentication URL.
    #[inline]
    pub fn auth_url(&self) -> Option<&str> {
        self.auth_url.as_deref()
    }

    /// Region.
    #[inline]
    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    /// Endpoint interface.
    #[inline]
    pub fn endpoint_type(&self) -> InterfaceType {
        self.endpoint_type
    }

    /// Whether a non-empty password is known.
    #[inline]
    pub fn has_password(&self) -> bool {
        self.password.as_deref().is_some_and(|p| !p.is_empty())
    }
}

#[cfg(test)]
pub mod test {
    use super::Credentials;
    use crate::InterfaceType;

    #[test]
    fn test_debug_hides_secrets() {
        let creds = Credentials::new()
            .with_user("admin")
            .with_password("pa$$w0rd")
            .with_token("abcdef");
        let repr = format!("{:?}", creds);
        assert!(repr.contains("admin"));
        assert!(!repr.contains("pa$$w0rd"));
        assert!(!repr.contains("abcdef"));
    }

    #[test]
    fn test_defaults() {
        let creds = Credentials::new().with_auth_url("http://example.com:5000/v2.0//");
        assert_eq!(creds.auth_url(), Some("http://example.com:5000/v2.0"));
        assert_eq!(creds.endpoint_type(), InterfaceType::Public);
        assert!(!creds.has_password());
        assert!(!creds.with_password("").has_password());
    }
}
