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

//! Token authentication.

use async_trait::async_trait;
use reqwest::{Client, IntoUrl, RequestBuilder, Url};

use super::internal::Internal;
use super::protocol::AuthRoot;
use super::Identity;
use crate::{AuthType, EndpointFilters, Error};

/// Token authentication using Identity API V2.
///
/// Exchanges an existing token for a tenant-scoped one with a service catalog:
///
/// ```rust,no_run
/// let auth = osnova::identity::Token::new(
///     "https://cloud.local/identity/v2.0",
///     "<a token>",
/// )
/// .expect("Invalid auth_url")
/// .with_tenant_id("3f2a9c");
///
/// let client = osnova::SessionClient::new(auth);
/// ```
///
/// The resulting token is cached while it's still valid or until
/// [refresh](../trait.AuthType.html#tymethod.refresh) is called.
/// Clones of a `Token` also start with an empty cache.
#[derive(Debug, Clone)]
pub struct Token {
    inner: Internal,
}

impl Identity for Token {
    fn auth_url(&self) -> &Url {
        self.inner.auth_url()
    }
}

impl Token {
    /// Create a token authentication.
    pub fn new<U, S>(auth_url: U, token: S) -> Result<Self, Error>
    where
        U: IntoUrl,
        S: Into<String>,
    {
        let body = AuthRoot::with_token(token.into());
        Ok(Self {
            inner: Internal::new(auth_url.into_url()?, body)?,
        })
    }

    /// Endpoint filters.
    #[inline]
    pub fn endpoint_filters(&self) -> &EndpointFilters {
        &self.inner.filters
    }

    /// Set endpoint filters.
    #[inline]
    pub fn set_endpoint_filters(&mut self, filters: EndpointFilters) {
        self.inner.filters = filters;
    }

    /// Scope authentication to a tenant by its ID.
    #[inline]
    pub fn with_tenant_id<S: Into<String>>(mut self, tenant_id: S) -> Self {
        self.inner.set_tenant(Some(tenant_id.into()), None);
        self
    }

    /// Scope authentication to a tenant by its name.
    #[inline]
    pub fn with_tenant_name<S: Into<String>>(mut self, tenant_name: S) -> Self {
        self.inner.set_tenant(None, Some(tenant_name.into()));
        self
    }

    /// Set a region for this authentication method.
    #[inline]
    pub fn with_region<S: Into<String>>(mut self, region: S) -> Self {
        self.inner.filters.region = Some(region.into());
        self
    }

    /// Tenant ID or name (if scoped).
    #[inline]
    pub fn tenant(&self) -> Option<&str> {
        self.inner.tenant()
    }
}

#[async_trait]
impl AuthType for Token {
    async fn authenticate(
        &self,
        client: &Client,
        request: RequestBuilder,
    ) -> Result<RequestBuilder, Error> {
        self.inner.authenticate(client, request).await
    }

    async fn get_endpoint(
        &self,
        client: &Client,
        service_type: &str,
        filters: &EndpointFilters,
    ) -> Result<Url, Error> {
        self.inner.get_endpoint(client, service_type, filters).await
    }

    async fn refresh(&self, client: &Client) -> Result<(), Error> {
        self.inner.refresh(client, true).await
    }
}

#[cfg(test)]
pub mod test {
    #![allow(unused_results)]

    use super::Token;
    use crate::identity::Identity;

    #[test]
    fn test_identity_new() {
        let id = Token::new("http://127.0.0.1:8080/", "abcdef").unwrap();
        let e = id.auth_url();
        assert_eq!(e.scheme(), "http");
        assert_eq!(e.host_str().unwrap(), "127.0.0.1");
        assert_eq!(e.port().unwrap(), 8080u16);
        assert_eq!(id.tenant(), None);
    }

    #[test]
    fn test_identity_new_invalid() {
        Token::new("http://127.0.0.1 8080/", "abcdef")
            .err()
            .unwrap();
    }

    #[test]
    fn test_identity_create() {
        let id = Token::new("http://127.0.0.1:8080/identity/v2.0/", "abcdef")
            .unwrap()
            .with_tenant_name("cool project");
        assert_eq!(
            id.auth_url().to_string(),
            "http://127.0.0.1:8080/identity/v2.0"
        );
        assert_eq!(id.tenant(), Some("cool project"));
        assert_eq!(
            id.inner.token_endpoint(),
            "http://127.0.0.1:8080/identity/v2.0/tokens"
        );
        assert!(!format!("{:?}", id).contains("abcdef"));
    }
}
