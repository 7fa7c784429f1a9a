// Copyright 2019 Dmitry Tantsur <dtantsur@protonmail.com>
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

//! Password authentication.

use async_trait::async_trait;
use reqwest::{Client, IntoUrl, RequestBuilder, Url};

use super::internal::Internal;
use super::protocol::AuthRoot;
use super::Identity;
use crate::{AuthType, EndpointFilters, Error, InterfaceType};

/// Password authentication using Identity API V2.
///
/// You need to know `auth_url`, which is an authentication endpoint of the
/// Identity service, and the user name with its password. Most clouds also
/// require a tenant:
///
/// ```rust,no_run
/// let auth = osnova::identity::Password::new(
///     "https://cloud.local/identity/v2.0",
///     "admin",
///     "pa$$w0rd",
/// )
/// .expect("Invalid auth_url")
/// .with_tenant_name("project1")
/// .with_region("US-East");
///
/// let client = osnova::SessionClient::new(auth);
/// ```
///
/// By default, the `public` endpoint interface is used. If you would prefer
/// another one, set it with
/// [with_default_endpoint_interface](#method.with_default_endpoint_interface).
///
/// The authentication token is cached while it's still valid or until
/// [refresh](../trait.AuthType.html#tymethod.refresh) is called.
/// Clones of a `Password` also start with an empty cache.
#[derive(Debug, Clone)]
pub struct Password {
    inner: Internal,
}

impl Identity for Password {
    fn auth_url(&self) -> &Url {
        self.inner.auth_url()
    }
}

impl Password {
    /// Create a password authentication.
    pub fn new<U, S1, S2>(auth_url: U, user_name: S1, password: S2) -> Result<Password, Error>
    where
        U: IntoUrl,
        S1: Into<String>,
        S2: Into<String>,
    {
        let body = AuthRoot::with_password(Some(user_name.into()), None, Some(password.into()));
        Ok(Password {
            inner: Internal::new(auth_url.into_url()?, body)?,
        })
    }

    /// Create a password authentication using a user ID instead of a name.
    pub fn new_with_user_id<U, S1, S2>(
        auth_url: U,
        user_id: S1,
        password: S2,
    ) -> Result<Password, Error>
    where
        U: IntoUrl,
        S1: Into<String>,
        S2: Into<String>,
    {
        let body = AuthRoot::with_password(None, Some(user_id.into()), Some(password.into()));
        Ok(Password {
            inner: Internal::new(auth_url.into_url()?, body)?,
        })
    }

    /// Endpoint filters.
    #[inline]
    pub fn endpoint_filters(&self) -> &EndpointFilters {
        &self.inner.filters
    }

    /// Mutable endpoint filters.
    #[inline]
    pub fn endpoint_filters_mut(&mut self) -> &mut EndpointFilters {
        &mut self.inner.filters
    }

    /// Set the default endpoint interface to use.
    #[inline]
    pub fn set_default_endpoint_interface(&mut self, endpoint_interface: InterfaceType) {
        self.inner.filters.set_interface(endpoint_interface);
    }

    /// Set endpoint filters.
    #[inline]
    pub fn set_endpoint_filters(&mut self, filters: EndpointFilters) {
        self.inner.filters = filters;
    }

    /// Scope authentication to a tenant by its ID.
    #[inline]
    pub fn set_tenant_id<S: Into<String>>(&mut self, tenant_id: S) {
        self.inner.set_tenant(Some(tenant_id.into()), None);
    }

    /// Scope authentication to a tenant by its name.
    #[inline]
    pub fn set_tenant_name<S: Into<String>>(&mut self, tenant_name: S) {
        self.inner.set_tenant(None, Some(tenant_name.into()));
    }

    /// Convert this authentication into one using the given endpoint interface.
    #[inline]
    pub fn with_default_endpoint_interface(mut self, endpoint_interface: InterfaceType) -> Self {
        self.set_default_endpoint_interface(endpoint_interface);
        self
    }

    /// Add endpoint filters.
    #[inline]
    pub fn with_endpoint_filters(mut self, filters: EndpointFilters) -> Self {
        self.inner.filters = filters;
        self
    }

    /// Set a region for this authentication method.
    #[inline]
    pub fn with_region<S>(mut self, region: S) -> Self
    where
        S: Into<String>,
    {
        self.inner.filters.region = Some(region.into());
        self
    }

    /// Scope authentication to a tenant by its ID.
    #[inline]
    pub fn with_tenant_id<S: Into<String>>(mut self, tenant_id: S) -> Self {
        self.set_tenant_id(tenant_id);
        self
    }

    /// Scope authentication to a tenant by its name.
    #[inline]
    pub fn with_tenant_name<S: Into<String>>(mut self, tenant_name: S) -> Self {
        self.set_tenant_name(tenant_name);
        self
    }

    /// User name or ID.
    #[inline]
    pub fn user(&self) -> Option<&str> {
        self.inner.user()
    }

    /// Tenant ID or name (if scoped).
    #[inline]
    pub fn tenant(&self) -> Option<&str> {
        self.inner.tenant()
    }
}

#[async_trait]
impl AuthType for Password {
    /// Add the cached token to the request.
    async fn authenticate(
        &self,
        client: &Client,
        request: RequestBuilder,
    ) -> Result<RequestBuilder, Error> {
        self.inner.authenticate(client, request).await
    }

    /// Get a URL for the requested service.
    async fn get_endpoint(
        &self,
        client: &Client,
        service_type: &str,
        filters: &EndpointFilters,
    ) -> Result<Url, Error> {
        self.inner.get_endpoint(client, service_type, filters).await
    }

    /// Refresh the cached token and service catalog.
    async fn refresh(&self, client: &Client) -> Result<(), Error> {
        self.inner.refresh(client, true).await
    }
}
