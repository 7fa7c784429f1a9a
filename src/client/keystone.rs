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

//! Authentication of the classic dispatcher.

use std::sync::Arc;

use log::{debug, error, trace, warn};
use reqwest::{Method, StatusCode};
use serde_json::Value;

use super::{HttpClient, ProxyToken};
use crate::cache::{cache_key, CachedToken};
use crate::catalog::ServiceCatalog;
use crate::identity::protocol::{
    AuthRoot, AUTH_TOKEN_HEADER, PROJECT_ID_HEADER, V1_KEY_HEADER, V1_MANAGEMENT_URL_HEADER,
    V1_USER_HEADER,
};
use crate::plugin::AuthSystem;
use crate::request::{ApiResponse, RequestOptions};
use crate::url;
use crate::{Error, ErrorKind};

const V2_VERSION: &str = "v2.0";

fn redirect_location(response: &ApiResponse) -> Result<Option<String>, Error> {
    match response.header("location") {
        Some(location) => {
            debug!("Authentication redirected to {}", location);
            Ok(Some(location.to_string()))
        }
        None => Err(Error::new(
            ErrorKind::InvalidResponse,
            "HTTP 305 response without a Location header",
        )),
    }
}

fn unexpected_response(response: &ApiResponse, url: &str, method: &Method) -> Error {
    Error::from_response(
        response.status,
        &response.headers,
        response.body.as_ref(),
        url,
        method,
    )
}

impl HttpClient {
    /// Authenticate, filling in the token and the management URL.
    ///
    /// The auth URL is required even if nothing is sent because the token
    /// and the management URL are already known (possibly from the token
    /// store). The protocol is chosen by the version in the auth URL:
    /// `v2.0` uses Identity V2 (or the authentication plugin), anything else
    /// uses the V1 protocol, falling back to V2 if it is rejected.
    pub async fn authenticate(&mut self) -> Result<(), Error> {
        let auth_url = self.resolve_auth_url()?;

        if !self.keys_restored {
            self.restore_keys();
        }

        if self.session.auth_token.is_some() && self.session.management_url.is_some() {
            trace!("Already authenticated, using the known token");
            self.save_keys();
            return Ok(());
        }

        self.auth_version = url::auth_version(&auth_url)
            .unwrap_or_else(|| url::DEFAULT_AUTH_VERSION.to_string());
        debug!(
            "Authenticating against {} (protocol {}, system {})",
            auth_url,
            self.auth_version,
            self.auth_system.name()
        );

        if self.auth_version == V2_VERSION {
            self.v2_auth_loop(auth_url.clone()).await?;

            if let Some(proxy) = self.proxy.clone() {
                if let Some(bypass) = self.bypass_url.clone() {
                    self.set_management_url(bypass);
                } else {
                    let admin_url = url::admin_url(&auth_url)?;
                    self.fetch_endpoints_from_auth(&admin_url, &proxy).await?;
                }
                // The catalog lookup does not return the user token.
                self.session.auth_token = Some(proxy.token);
            }
        } else {
            self.v1_auth_loop(auth_url).await?;
        }

        if let Some(bypass) = self.bypass_url.clone() {
            self.set_management_url(bypass);
        } else if self.session.management_url.is_none() {
            return Err(Error::new(ErrorKind::Unauthorized, "Nova Client"));
        }

        self.save_keys();
        Ok(())
    }

    fn resolve_auth_url(&mut self) -> Result<String, Error> {
        if let Some(ref auth_url) = self.credentials.auth_url {
            return Ok(auth_url.clone());
        }

        let auth_url = match self.auth_system {
            AuthSystem::Keystone => {
                return Err(Error::new(
                    ErrorKind::InvalidConfig,
                    "Authentication URL is required",
                ))
            }
            AuthSystem::Plugin {
                ref name,
                ref plugin,
            } => plugin.auth_url().ok_or_else(|| {
                Error::new(
                    ErrorKind::EndpointNotFound,
                    format!("Authentication system {} does not provide an auth URL", name),
                )
            })?,
        };

        let auth_url = url::trim_slash(&auth_url).to_string();
        self.credentials.auth_url = Some(auth_url.clone());
        Ok(auth_url)
    }

    async fn v1_auth_loop(&mut self, auth_url: String) -> Result<(), Error> {
        let mut current = auth_url;
        loop {
            match self.v1_auth(&current).await {
                Ok(Some(location)) => current = location,
                Ok(None) => return Ok(()),
                Err(original) if original.kind() == ErrorKind::AuthorizationFailure => {
                    // Some deployments redirect to an Identity V2 endpoint.
                    let v2_url = if current.contains(V2_VERSION) {
                        current
                    } else {
                        format!("{}/{}", current, V2_VERSION)
                    };
                    debug!("V1 authentication failed, trying {}", v2_url);
                    return match self.v2_auth_loop(v2_url).await {
                        Ok(()) => Ok(()),
                        Err(fallback) => {
                            debug!("V2 authentication failed too: {}", fallback);
                            Err(original)
                        }
                    };
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn v2_auth_loop(&mut self, auth_url: String) -> Result<(), Error> {
        let mut current = Some(auth_url);
        while let Some(target) = current {
            current = self.v2_auth(&target).await?;
        }
        Ok(())
    }

    fn password(&mut self) -> Option<String> {
        if !self.credentials.has_password() {
            if let Some(callback) = self.password_callback.clone() {
                if let Some(password) = callback() {
                    self.credentials.password = Some(password);
                }
            }
        }
        self.credentials.password.clone()
    }

    async fn v1_auth(&mut self, url: &str) -> Result<Option<String>, Error> {
        if self.proxy.is_some() {
            return Err(Error::new(
                ErrorKind::NoTokenLookup,
                "Proxy tokens are not supported with the V1 protocol",
            ));
        }

        let mut options = RequestOptions::default();
        options.set_header(
            V1_USER_HEADER,
            self.credentials.username.as_deref().unwrap_or_default(),
        );
        let password = self.password().unwrap_or_default();
        options.set_header(V1_KEY_HEADER, &password);
        if let Some(ref project) = self.credentials.project {
            options.set_header(PROJECT_ID_HEADER, project);
        }

        let response = self.time_request(Method::GET, url, options).await?;
        match response.status {
            StatusCode::OK | StatusCode::NO_CONTENT => {
                let management_url = response.header(V1_MANAGEMENT_URL_HEADER);
                let token = response.header(AUTH_TOKEN_HEADER);
                match (management_url, token) {
                    (Some(management_url), Some(token)) => {
                        self.session.management_url =
                            Some(url::trim_slash(management_url).to_string());
                        self.session.auth_token = Some(token.to_string());
                        self.credentials.auth_url = Some(url.to_string());
                        Ok(None)
                    }
                    _ => Err(Error::new(
                        ErrorKind::AuthorizationFailure,
                        "Authentication response lacks the management URL or the token",
                    )
                    .with_status(response.status)),
                }
            }
            StatusCode::USE_PROXY => redirect_location(&response),
            _ => Err(unexpected_response(&response, url, &Method::GET)),
        }
    }

    async fn v2_auth(&mut self, url: &str) -> Result<Option<String>, Error> {
        if let AuthSystem::Plugin { ref plugin, .. } = self.auth_system {
            let plugin = Arc::clone(plugin);
            let body = plugin.auth_body(&self.credentials)?;
            return self.authenticate_with_body(url, body).await;
        }

        let root = match self.session.auth_token {
            Some(ref token) => AuthRoot::with_token(token.clone()),
            None => {
                let password = self.password();
                AuthRoot::with_password(
                    self.credentials.username.clone(),
                    self.credentials.user_id.clone(),
                    password,
                )
            }
        };
        let tenant_id = self
            .session
            .tenant_id
            .clone()
            .or_else(|| self.credentials.tenant_id.clone());
        let root = root.with_tenant(tenant_id, self.credentials.project.clone());
        let body = serde_json::to_value(&root)
            .map_err(|e| Error::new(ErrorKind::InvalidInput, e.to_string()))?;
        self.authenticate_with_body(url, body).await
    }

    async fn authenticate_with_body(
        &mut self,
        url: &str,
        body: Value,
    ) -> Result<Option<String>, Error> {
        let token_url = format!("{}/tokens", url);
        let options = RequestOptions {
            body: Some(body),
            ..RequestOptions::default()
        };
        let response = self.time_request(Method::POST, &token_url, options).await?;
        self.extract_service_catalog(url, &response, true, &Method::POST)
    }

    async fn fetch_endpoints_from_auth(
        &mut self,
        admin_url: &str,
        proxy: &ProxyToken,
    ) -> Result<(), Error> {
        let url = url::token_lookup(admin_url, &proxy.token, &proxy.tenant_id)?;
        debug!("Using Endpoint URL: {}", url);

        let mut options = RequestOptions::default();
        if let Some(ref token) = self.session.auth_token {
            options.set_header(AUTH_TOKEN_HEADER, token);
        }
        let response = self.time_request(Method::GET, &url, options).await?;
        if let Some(location) = self.extract_service_catalog(&url, &response, false, &Method::GET)? {
            warn!("Ignoring redirect to {} from the endpoints lookup", location);
        }
        Ok(())
    }

    fn extract_service_catalog(
        &mut self,
        url: &str,
        response: &ApiResponse,
        extract_token: bool,
        method: &Method,
    ) -> Result<Option<String>, Error> {
        match response.status {
            StatusCode::OK | StatusCode::CREATED => (),
            StatusCode::USE_PROXY => return redirect_location(response),
            _ => return Err(unexpected_response(response, url, method)),
        }

        let body = response.body.as_ref().ok_or_else(|| {
            Error::new(
                ErrorKind::AuthorizationFailure,
                "Authentication response has no JSON body",
            )
        })?;
        let catalog = ServiceCatalog::from_body(body)?;

        if extract_token {
            let token = catalog.token_id().ok_or_else(|| {
                Error::new(
                    ErrorKind::AuthorizationFailure,
                    "Authentication response has no token",
                )
            })?;
            self.credentials.auth_url = Some(url.to_string());
            self.session.auth_token = Some(token.to_string());
            match catalog.tenant_id() {
                Some(tenant_id) => self.session.tenant_id = Some(tenant_id.to_string()),
                None => debug!("The token is not scoped to a tenant"),
            }
        }

        self.session.service_catalog = Some(catalog);
        self.service_urls.clear();

        let service_type = self.service_type.clone();
        match self.get_service_url(&service_type) {
            Ok(management_url) => {
                self.session.management_url = Some(management_url);
                Ok(None)
            }
            Err(e) => {
                match e.kind() {
                    ErrorKind::AmbiguousEndpoints => error!(
                        "Found more than one valid endpoint. Use a more restrictive filter"
                    ),
                    ErrorKind::EndpointNotFound => {
                        error!("Could not find any suitable endpoint. Correct region?")
                    }
                    _ => (),
                }
                Err(e)
            }
        }
    }

    fn cache_key(&self) -> String {
        cache_key(&[
            self.credentials.auth_url.as_deref(),
            self.credentials.project.as_deref(),
            self.credentials.username.as_deref(),
            self.credentials.region.as_deref(),
            Some(self.credentials.endpoint_type.catalog_key()),
            Some(self.service_type.as_str()),
            self.service_name.as_deref(),
            self.volume_service_name.as_deref(),
        ])
    }

    fn restore_keys(&mut self) {
        self.keys_restored = true;
        if !self.use_token_cache
            || self.session.auth_token.is_some()
            || self.session.management_url.is_some()
        {
            return;
        }

        let store = match self.token_store {
            Some(ref store) => Arc::clone(store),
            None => return,
        };
        let key = self.cache_key();
        match store.load(&key) {
            Ok(Some(cached)) => {
                debug!("Using a cached token for {}", key);
                self.session.auth_token = Some(cached.auth_token);
                self.session.management_url = Some(cached.management_url);
                self.session.tenant_id = Some(cached.tenant_id);
            }
            Ok(None) => trace!("No cached token for {}", key),
            Err(e) => warn!("Cannot load a cached token: {}", e),
        }
    }

    fn save_keys(&mut self) {
        if self.keys_saved || !self.use_token_cache {
            return;
        }

        let store = match self.token_store {
            Some(ref store) => Arc::clone(store),
            None => return,
        };
        let cached = match (
            &self.session.auth_token,
            &self.session.management_url,
            &self.session.tenant_id,
        ) {
            (Some(auth_token), Some(management_url), Some(tenant_id)) => CachedToken {
                auth_token: auth_token.clone(),
                management_url: management_url.clone(),
                tenant_id: tenant_id.clone(),
            },
            _ => return,
        };

        let key = self.cache_key();
        if let Ok(Some(existing)) = store.load(&key) {
            if existing == cached {
                self.keys_saved = true;
                return;
            }
        }

        match store.save(&key, &cached) {
            Ok(()) => {
                debug!("Cached the token for {}", key);
                self.keys_saved = true;
            }
            Err(e) => warn!("Cannot cache the token: {}", e),
        }
    }
}

#[cfg(test)]
pub mod test {
    use std::sync::Arc;

    use crate::cache::{CachedToken, MemoryTokenStore, TokenStore};
    use crate::plugin::test::FakePlugin;
    use crate::{Credentials, ErrorKind, HttpClient, PluginRegistry};

    #[tokio::test]
    async fn test_missing_auth_url() {
        let mut client = HttpClient::new(Credentials::new().with_user("u"));
        let err = client.authenticate().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);
    }

    #[tokio::test]
    async fn test_short_circuit() {
        let mut client = HttpClient::new(
            Credentials::new()
                .with_token("tok")
                .with_auth_url("http://auth.example.com/v2.0"),
        );
        client.set_management_url("http://nova.example.com/v2/1");
        client.authenticate().await.unwrap();
        assert_eq!(client.auth_token(), Some("tok"));
    }

    #[tokio::test]
    async fn test_short_circuit_requires_auth_url() {
        let mut client = HttpClient::new(Credentials::new().with_token("tok"));
        client.set_management_url("http://nova.example.com/v2/1");
        let err = client.authenticate().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);
        assert_eq!(client.auth_token(), Some("tok"));
    }

    #[tokio::test]
    async fn test_restore_from_store() {
        let store = Arc::new(MemoryTokenStore::new());
        let mut client = HttpClient::new(
            Credentials::new()
                .with_user("u")
                .with_project("p")
                .with_auth_url("http://auth.example.com/v2.0"),
        )
        .with_token_store(store.clone());
        store
            .save(
                &client.cache_key(),
                &CachedToken {
                    auth_token: "cached".to_string(),
                    management_url: "http://nova.example.com/v2/1".to_string(),
                    tenant_id: "1".to_string(),
                },
            )
            .unwrap();

        client.authenticate().await.unwrap();
        assert_eq!(client.auth_token(), Some("cached"));
        assert_eq!(client.management_url(), Some("http://nova.example.com/v2/1"));
        assert_eq!(client.session().tenant_id(), Some("1"));
        assert!(client.keys_saved);
    }

    #[test]
    fn test_cache_key() {
        let client = HttpClient::new(
            Credentials::new()
                .with_user("u")
                .with_project("p")
                .with_region("R")
                .with_auth_url("http://auth/v2.0"),
        );
        assert_eq!(client.cache_key(), "http://auth/v2.0/p/u/R/publicURL/compute/?/?");
    }

    #[test]
    fn test_plugin_auth_url() {
        let system = PluginRegistry::new()
            .with_plugin("fake", FakePlugin)
            .resolve("fake")
            .unwrap();
        let mut client = HttpClient::new(Credentials::new()).with_auth_system(system);
        assert_eq!(client.resolve_auth_url().unwrap(), "http://auth/v2.0");
        assert_eq!(client.credentials().auth_url(), Some("http://auth/v2.0"));
    }

    #[test]
    fn test_password_callback() {
        let mut client = HttpClient::new(Credentials::new().with_user("u"))
            .with_password_callback(|| Some("secret".to_string()));
        assert_eq!(client.password().as_deref(), Some("secret"));
        assert!(client.credentials().has_password());
    }
}
