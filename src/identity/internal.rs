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

//! Internal implementation of the identity authentication.

use std::fmt;
use std::ops::Deref;

use chrono::{DateTime, Duration, FixedOffset, Local};
use log::{debug, error, trace};
use reqwest::{Client, Method, RequestBuilder, Url};
use tokio::sync::RwLock;

use super::protocol::{AuthRoot, Identity, AUTH_TOKEN_HEADER};
use super::TOKEN_MIN_VALIDITY;
use crate::catalog::ServiceCatalog;
use crate::httplog::sha1_marker;
use crate::request::{self, CONNECTION_REFUSED_MARKERS};
use crate::url::trim_slash;
use crate::{EndpointFilters, Error, ErrorKind, InterfaceType};

/// Authentication token with its service catalog.
#[derive(Clone)]
pub(crate) struct Token {
    value: String,
    expires_at: Option<DateTime<FixedOffset>>,
    catalog: ServiceCatalog,
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Token")
            .field("value", &sha1_marker(&self.value))
            .field("expires_at", &self.expires_at)
            .field("catalog", &self.catalog)
            .finish()
    }
}

/// Internal identity authentication object.
#[derive(Debug)]
pub(crate) struct Internal {
    auth_url: Url,
    body: AuthRoot,
    token_endpoint: String,
    cached_token: RwLock<Option<Token>>,
    pub filters: EndpointFilters,
}

impl Internal {
    /// Create a new implementation.
    pub fn new(mut auth_url: Url, body: AuthRoot) -> Result<Internal, Error> {
        let _ = auth_url
            .path_segments_mut()
            .map_err(|_| Error::new(ErrorKind::InvalidConfig, "Invalid auth_url: wrong schema?"))?
            .pop_if_empty();

        let base = trim_slash(auth_url.as_str());
        let token_endpoint = if base.ends_with("/v2.0") {
            format!("{}/tokens", base)
        } else {
            format!("{}/v2.0/tokens", base)
        };

        Ok(Internal {
            auth_url,
            body,
            token_endpoint,
            cached_token: RwLock::new(None),
            filters: EndpointFilters::default().with_interface(InterfaceType::Public),
        })
    }

    /// Access to the auth URL.
    #[inline]
    pub fn auth_url(&self) -> &Url {
        &self.auth_url
    }

    /// Scope the authentication to a tenant.
    pub fn set_tenant(&mut self, tenant_id: Option<String>, tenant_name: Option<String>) {
        self.body = self.body.clone().with_tenant(tenant_id, tenant_name);
    }

    /// User name (for password authentication).
    pub fn user(&self) -> Option<&str> {
        match self.body.auth.identity {
            Identity::Password(ref pw) => pw.user_id.as_deref().or(pw.username.as_deref()),
            Identity::Token(..) => None,
        }
    }

    /// Tenant ID or name (if scoped).
    pub fn tenant(&self) -> Option<&str> {
        self.body
            .auth
            .tenant_id
            .as_deref()
            .or(self.body.auth.tenant_name.as_deref())
    }

    async fn with_token<T, F>(&self, client: &Client, f: F) -> Result<T, Error>
    where
        F: FnOnce(&Token) -> Result<T, Error> + Send,
    {
        self.refresh(client, false).await?;
        let guard = self.cached_token.read().await;
        match guard.as_ref() {
            Some(token) => f(token),
            None => Err(Error::new(
                ErrorKind::Unauthorized,
                "No token is available after authentication",
            )),
        }
    }

    /// Get a URL for the requested service.
    pub async fn get_endpoint(
        &self,
        client: &Client,
        service_type: &str,
        filters: &EndpointFilters,
    ) -> Result<Url, Error> {
        let real_filters = filters.clone().with_defaults(&self.filters);
        debug!(
            "Requesting a catalog endpoint for service '{}', filters {:?}",
            service_type, real_filters
        );
        self.with_token(client, |token| {
            let url = token.catalog.url_for(service_type, &real_filters)?;
            Url::parse(url).map_err(Into::into)
        })
        .await
    }

    /// Get the authentication token string.
    #[inline]
    pub async fn get_token(&self, client: &Client) -> Result<String, Error> {
        self.with_token(client, |token| Ok(token.value.clone()))
            .await
    }

    /// Refresh the token (if needed or forced).
    pub async fn refresh(&self, client: &Client, force: bool) -> Result<(), Error> {
        // This is executed every request at least once, so it's important to start with a read
        // lock. We expect to hit this branch most of the time.
        if !force && token_alive(&self.cached_token.read().await) {
            return Ok(());
        }

        let mut lock = self.cached_token.write().await;
        // Additonal check in case another task has updated the token while we were waiting for
        // the write lock.
        if !force && token_alive(&lock) {
            return Ok(());
        }

        let resp = client
            .post(&self.token_endpoint)
            .json(&self.body)
            .send()
            .await?;
        let status = resp.status();
        let headers = resp.headers().clone();
        let text = resp.text().await?;
        let body = request::check_response(
            &Method::POST,
            &self.token_endpoint,
            status,
            &headers,
            &text,
            CONNECTION_REFUSED_MARKERS,
        )?;
        *lock = Some(token_from_body(&self.token_endpoint, body)?);
        Ok(())
    }

    /// Add the token to a request.
    pub async fn authenticate(
        &self,
        client: &Client,
        request: RequestBuilder,
    ) -> Result<RequestBuilder, Error> {
        let token = self.get_token(client).await?;
        Ok(request.header(AUTH_TOKEN_HEADER, token))
    }

    #[cfg(test)]
    pub fn token_endpoint(&self) -> &str {
        &self.token_endpoint
    }
}

impl Clone for Internal {
    fn clone(&self) -> Internal {
        Internal {
            auth_url: self.auth_url.clone(),
            body: self.body.clone(),
            token_endpoint: self.token_endpoint.clone(),
            cached_token: RwLock::new(None),
            filters: self.filters.clone(),
        }
    }
}

#[inline]
fn token_alive(token: &impl Deref<Target = Option<Token>>) -> bool {
    match token.deref() {
        Some(Token {
            expires_at: Some(expires_at),
            ..
        }) => {
            let validity_time_left = expires_at.signed_duration_since(Local::now());
            trace!("Token is valid for {:?}", validity_time_left);
            validity_time_left > Duration::minutes(TOKEN_MIN_VALIDITY)
        }
        // Tokens without an expiration time are used until rejected.
        Some(..) => true,
        None => false,
    }
}

fn token_from_body(url: &str, body: Option<serde_json::Value>) -> Result<Token, Error> {
    let body = body.ok_or_else(|| {
        error!("No JSON body received from {}", url);
        Error::new(
            ErrorKind::InvalidResponse,
            "Authentication response has no JSON body",
        )
    })?;
    let catalog = ServiceCatalog::from_body(&body)?;
    let value = match catalog.token_id() {
        Some(value) => value.to_string(),
        None => {
            error!("No token received from {}", url);
            return Err(Error::new(
                ErrorKind::InvalidResponse,
                "Authentication response has no token",
            ));
        }
    };
    let expires_at = catalog.expires_at();
    debug!("Received a token expiring at {:?}", expires_at);
    Ok(Token {
        value,
        expires_at,
        catalog,
    })
}

#[cfg(test)]
pub mod test {
    use chrono::{Duration, Local};
    use tokio::sync::RwLock;

    use super::{token_alive, token_from_body, Token};
    use crate::catalog::test::catalog_body;
    use crate::catalog::ServiceCatalog;
    use crate::ErrorKind;

    fn token(expires_in: Option<Duration>) -> Token {
        Token {
            value: "abcd".to_string(),
            expires_at: expires_in.map(|d| (Local::now() + d).fixed_offset()),
            catalog: ServiceCatalog::from_body(&catalog_body()).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_token_alive() {
        let lock = RwLock::new(None);
        assert!(!token_alive(&lock.read().await));
        *lock.write().await = Some(token(Some(Duration::hours(1))));
        assert!(token_alive(&lock.read().await));
        *lock.write().await = Some(token(Some(Duration::minutes(5))));
        assert!(!token_alive(&lock.read().await));
        *lock.write().await = Some(token(None));
        assert!(token_alive(&lock.read().await));
    }

    #[test]
    fn test_token_from_body() {
        let token = token_from_body("http://auth/v2.0/tokens", Some(catalog_body())).unwrap();
        assert_eq!(token.value, "ab48a9efdfedb23ty3494");
        assert!(!format!("{:?}", token).contains("ab48a9efdfedb23ty3494"));

        let err = token_from_body("http://auth/v2.0/tokens", None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidResponse);
    }
}
