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

//! Classic dispatcher that owns credentials and authenticates itself.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use log::debug;
use reqwest::{Client, Method, Url};
use static_assertions::assert_impl_all;

use super::cache::TokenStore;
use super::catalog::ServiceCatalog;
use super::httplog::HttpLogger;
use super::identity::protocol::{AUTH_TOKEN_HEADER, PROJECT_ID_HEADER};
use super::plugin::AuthSystem;
use super::pool::{ConnectionPool, TlsVerification, TransportConfig};
use super::request::{self, ApiResponse, RequestOptions, Timing, CONNECTION_REFUSED_MARKERS};
use super::url;
use super::{ApiVersion, Credentials, Dispatcher, EndpointFilters, Error, ErrorKind};

mod keystone;

/// User agent of the dispatchers.
pub const USER_AGENT: &str = concat!("osnova/", env!("CARGO_PKG_VERSION"));

/// Default service type.
pub const COMPUTE: &str = "compute";

/// Callback asked for a password when none is known.
pub type PasswordCallback = Arc<dyn Fn() -> Option<String> + Send + Sync>;

/// Result of the authentication.
#[derive(Clone, Default)]
pub struct AuthSession {
    auth_token: Option<String>,
    management_url: Option<String>,
    service_catalog: Option<ServiceCatalog>,
    tenant_id: Option<String>,
}

/// Authentication state of the classic dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    /// No management URL is known, the next request will authenticate.
    Unauthenticated,
    /// Requests can be sent to the management URL.
    Authenticated,
}

#[derive(Clone)]
struct ProxyToken {
    token: String,
    tenant_id: String,
}

/// Classic dispatcher.
///
/// Owns the credentials, authenticates against the Identity service (V1, V2
/// or a plugin), remembers the token and the management URL and
/// re-authenticates once when a request is rejected with HTTP 401.
///
/// ```rust,no_run
/// # async fn example() -> Result<(), osnova::Error> {
/// use osnova::{Credentials, Dispatcher, HttpClient};
///
/// let creds = Credentials::new()
///     .with_user("demo")
///     .with_password("s3cr3t")
///     .with_project("demo")
///     .with_auth_url("https://keystone.example.com:5000/v2.0");
/// let mut client = HttpClient::new(creds).with_region("RegionOne");
/// let servers = client.get("/servers").await?;
/// println!("{:?}", servers.body);
/// # Ok(()) }
/// ```
pub struct HttpClient {
    credentials: Credentials,
    password_callback: Option<PasswordCallback>,
    auth_system: AuthSystem,
    auth_version: String,
    session: AuthSession,
    service_urls: HashMap<String, String>,
    service_type: String,
    service_name: Option<String>,
    volume_service_name: Option<String>,
    bypass_url: Option<String>,
    proxy: Option<ProxyToken>,
    api_version: Option<ApiVersion>,
    transport: TransportConfig,
    pool: Option<ConnectionPool>,
    http_session: Option<Client>,
    current_origin: Option<String>,
    timings_enabled: bool,
    times: Vec<Timing>,
    logger: HttpLogger,
    refused_markers: Vec<String>,
    token_store: Option<Arc<dyn TokenStore>>,
    use_token_cache: bool,
    keys_restored: bool,
    keys_saved: bool,
    user_agent: String,
}

assert_impl_all!(HttpClient: Send, Sync);

impl AuthSession {
    /// Authentication token.
    #[inline]
    pub fn auth_token(&self) -> Option<&str> {
        self.auth_token.as_deref()
    }

    /// Base URL of the compute service.
    #[inline]
    pub fn management_url(&self) -> Option<&str> {
        self.management_url.as_deref()
    }

    /// Service catalog from the last V2 authentication.
    #[inline]
    pub fn service_catalog(&self) -> Option<&ServiceCatalog> {
        self.service_catalog.as_ref()
    }

    /// Tenant ID from the last authentication.
    #[inline]
    pub fn tenant_id(&self) -> Option<&str> {
        self.tenant_id.as_deref()
    }
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("AuthSession")
            .field("auth_token", &self.auth_token.as_ref().map(|_| "***"))
            .field("management_url", &self.management_url)
            .field("service_catalog", &self.service_catalog)
            .field("tenant_id", &self.tenant_id)
            .finish()
    }
}

impl fmt::Debug for ProxyToken {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ProxyToken")
            .field("token", &"***")
            .field("tenant_id", &self.tenant_id)
            .finish()
    }
}

impl fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("HttpClient")
            .field("credentials", &self.credentials)
            .field("auth_system", &self.auth_system.name())
            .field("session", &self.session)
            .field("service_type", &self.service_type)
            .field("bypass_url", &self.bypass_url)
            .field("proxy", &self.proxy)
            .field("api_version", &self.api_version)
            .field("transport", &self.transport)
            .field("pooled", &self.pool.is_some())
            .finish_non_exhaustive()
    }
}

impl HttpClient {
    /// Create a dispatcher from credentials.
    ///
    /// No network requests are made until the first call.
    pub fn new(mut credentials: Credentials) -> HttpClient {
        let auth_token = credentials.token.take();
        HttpClient {
            credentials,
            password_callback: None,
            auth_system: AuthSystem::Keystone,
            auth_version: url::DEFAULT_AUTH_VERSION.to_string(),
            session: AuthSession {
                auth_token,
                ..AuthSession::default()
            },
            service_urls: HashMap::new(),
            service_type: COMPUTE.to_string(),
            service_name: None,
            volume_service_name: None,
            bypass_url: None,
            proxy: None,
            api_version: None,
            transport: TransportConfig::default(),
            pool: None,
            http_session: None,
            current_origin: None,
            timings_enabled: false,
            times: Vec::new(),
            logger: HttpLogger::default(),
            refused_markers: CONNECTION_REFUSED_MARKERS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            token_store: None,
            use_token_cache: true,
            keys_restored: false,
            keys_saved: false,
            user_agent: USER_AGENT.to_string(),
        }
    }

    /// Use an authentication system other than the built-in one.
    #[inline]
    pub fn with_auth_system(mut self, value: AuthSystem) -> Self {
        self.auth_system = value;
        self
    }

    /// Ask this callback for a password when none is known.
    pub fn with_password_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn() -> Option<String> + Send + Sync + 'static,
    {
        self.password_callback = Some(Arc::new(callback));
        self
    }

    /// Set the region used in catalog lookups.
    #[inline]
    pub fn with_region<S: Into<String>>(mut self, value: S) -> Self {
        self.credentials.region = Some(value.into());
        self
    }

    /// Set the service type (`compute` by default).
    #[inline]
    pub fn with_service_type<S: Into<String>>(mut self, value: S) -> Self {
        self.service_type = value.into();
        self
    }

    /// Set the compute service name used in catalog lookups.
    #[inline]
    pub fn with_service_name<S: Into<String>>(mut self, value: S) -> Self {
        self.service_name = Some(value.into());
        self
    }

    /// Set the volume service name used in catalog lookups.
    #[inline]
    pub fn with_volume_service_name<S: Into<String>>(mut self, value: S) -> Self {
        self.volume_service_name = Some(value.into());
        self
    }

    /// Use a fixed URL instead of the catalog.
    ///
    /// The bypass URL also becomes the management URL, so no authentication
    /// happens until a request is rejected.
    pub fn with_bypass_url<S: AsRef<str>>(mut self, value: S) -> Self {
        let bypass = url::trim_slash(value.as_ref()).to_string();
        self.session.management_url = Some(bypass.clone());
        self.bypass_url = Some(bypass);
        self
    }

    /// Act on behalf of another token, looking up its endpoints with admin credentials.
    pub fn with_proxy_token<S1, S2>(mut self, token: S1, tenant_id: S2) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        self.proxy = Some(ProxyToken {
            token: token.into(),
            tenant_id: tenant_id.into(),
        });
        self
    }

    /// Set the Compute API version.
    #[inline]
    pub fn with_api_version(mut self, value: ApiVersion) -> Self {
        self.api_version = Some(value);
        self
    }

    /// Set the default request timeout.
    #[inline]
    pub fn with_timeout(mut self, value: Duration) -> Self {
        self.transport.timeout = Some(value);
        self
    }

    /// Set the TLS verification mode.
    #[inline]
    pub fn with_tls_verification(mut self, value: TlsVerification) -> Self {
        self.transport.verify = value;
        self
    }

    /// Keep one pooled HTTP client per origin.
    pub fn with_connection_pool(mut self, value: bool) -> Self {
        self.pool = if value {
            Some(ConnectionPool::new())
        } else {
            None
        };
        self
    }

    /// Record timings of requests.
    #[inline]
    pub fn with_timings(mut self, value: bool) -> Self {
        self.timings_enabled = value;
        self
    }

    /// Set the HTTP debug logger.
    #[inline]
    pub fn with_http_logger(mut self, value: HttpLogger) -> Self {
        self.logger = value;
        self
    }

    /// Set the texts that mark an HTTP 400 body as a refused connection.
    pub fn with_connection_refused_markers<I, S>(mut self, markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.refused_markers = markers.into_iter().map(Into::into).collect();
        self
    }

    /// Attach a token store.
    #[inline]
    pub fn with_token_store(mut self, store: Arc<dyn TokenStore>) -> Self {
        self.token_store = Some(store);
        self
    }

    /// Enable or disable the use of the token store (enabled by default).
    #[inline]
    pub fn with_token_cache(mut self, value: bool) -> Self {
        self.use_token_cache = value;
        self
    }

    /// Override the user agent.
    #[inline]
    pub fn with_user_agent<S: Into<String>>(mut self, value: S) -> Self {
        self.user_agent = value.into();
        self
    }

    /// Credentials in use.
    #[inline]
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Authentication system in use.
    #[inline]
    pub fn auth_system(&self) -> &AuthSystem {
        &self.auth_system
    }

    /// Transport settings.
    #[inline]
    pub fn transport(&self) -> &TransportConfig {
        &self.transport
    }

    /// Current authentication results.
    #[inline]
    pub fn session(&self) -> &AuthSession {
        &self.session
    }

    /// Current authentication state.
    pub fn state(&self) -> AuthState {
        if self.session.management_url.is_some() {
            AuthState::Authenticated
        } else {
            AuthState::Unauthenticated
        }
    }

    /// Authentication token (if known).
    #[inline]
    pub fn auth_token(&self) -> Option<&str> {
        self.session.auth_token()
    }

    /// Management URL (if known).
    #[inline]
    pub fn management_url(&self) -> Option<&str> {
        self.session.management_url()
    }

    /// Set the management URL, skipping the catalog lookup.
    pub fn set_management_url<S: AsRef<str>>(&mut self, value: S) {
        self.session.management_url = Some(url::trim_slash(value.as_ref()).to_string());
    }

    /// Forget the token and the management URL.
    pub fn unauthenticate(&mut self) {
        debug!("Discarding the authentication token and the management URL");
        self.session.auth_token = None;
        self.session.management_url = None;
    }

    /// Open an HTTP session reused by the following requests.
    ///
    /// Does nothing when connection pooling is enabled.
    pub fn open_session(&mut self) -> Result<(), Error> {
        if self.pool.is_none() && self.http_session.is_none() {
            self.http_session = Some(self.transport.build_client(true)?);
        }
        Ok(())
    }

    /// Close the HTTP session opened by `open_session`.
    pub fn close_session(&mut self) {
        if self.pool.is_none() {
            self.http_session = None;
        }
    }

    /// Whether the authentication token is cached between runs.
    #[inline]
    pub fn uses_token_cache(&self) -> bool {
        self.use_token_cache && self.token_store.is_some()
    }

    fn endpoint_filters(&self) -> EndpointFilters {
        let mut filters = EndpointFilters::default().with_interface(self.credentials.endpoint_type);
        filters.region.clone_from(&self.credentials.region);
        filters.service_name.clone_from(&self.service_name);
        filters
            .volume_service_name
            .clone_from(&self.volume_service_name);
        filters
    }

    /// URL of a service from the catalog, remembered until the catalog changes.
    pub fn get_service_url(&mut self, service_type: &str) -> Result<String, Error> {
        if let Some(found) = self.service_urls.get(service_type) {
            return Ok(found.clone());
        }

        let filters = self.endpoint_filters();
        let catalog = self.session.service_catalog.as_ref().ok_or_else(|| {
            Error::new(
                ErrorKind::EndpointNotFound,
                "No service catalog is available, authenticate first",
            )
        })?;
        let found = url::trim_slash(catalog.url_for(service_type, &filters)?).to_string();
        let _ = self
            .service_urls
            .insert(service_type.to_string(), found.clone());
        Ok(found)
    }

    fn http_client_for(&mut self, target: &Url) -> Result<Client, Error> {
        if let Some(pool) = self.pool.as_mut() {
            let origin = url::origin(target);
            if self.http_session.is_none() || self.current_origin.as_deref() != Some(&origin) {
                debug!("New session created for: ({})", origin);
                self.http_session = Some(pool.get(&origin, &self.transport)?);
                self.current_origin = Some(origin);
            }
        }

        match self.http_session {
            Some(ref client) => Ok(client.clone()),
            None => self.transport.build_client(false),
        }
    }

    /// Send a request to an absolute URL without authentication.
    ///
    /// The body is sent as JSON, the response body is decoded as JSON when
    /// possible. HTTP errors are converted into errors.
    pub async fn request(
        &mut self,
        method: Method,
        url: &str,
        mut options: RequestOptions,
    ) -> Result<ApiResponse, Error> {
        let target = Url::parse(url)?;
        options.set_standard_headers(&self.user_agent, self.api_version);

        self.logger.log_request(
            &method,
            url,
            &options.headers,
            options.body.as_ref(),
            self.transport.verify.is_insecure(),
        );

        let client = self.http_client_for(&target)?;
        let mut builder = client.request(method.clone(), target);
        for (name, value) in &options.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(ref body) = options.body {
            let data = serde_json::to_string(body)
                .map_err(|e| Error::new(ErrorKind::InvalidInput, e.to_string()))?;
            builder = builder.body(data);
        }
        if let Some(timeout) = options.timeout.or(self.transport.timeout) {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let text = response.text().await?;
        self.logger.log_response(status, &headers, &text);

        let body =
            request::check_response(&method, url, status, &headers, &text, &self.refused_markers)?;
        request::check_microversion(self.api_version, &headers);
        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }

    async fn time_request(
        &mut self,
        method: Method,
        url: &str,
        options: RequestOptions,
    ) -> Result<ApiResponse, Error> {
        let start = Utc::now();
        let response = self.request(method.clone(), url, options).await?;
        if self.timings_enabled {
            self.times.push(Timing::new(&method, url, start));
        }
        Ok(response)
    }

    fn resolve_url(&mut self, path: Option<&str>) -> Result<String, Error> {
        let management_url = self
            .session
            .management_url
            .clone()
            .ok_or_else(|| Error::new(ErrorKind::Unauthorized, "Nova Client"))?;

        match path {
            None => url::unversioned_root(&management_url),
            Some(path) => {
                let base = if self.session.service_catalog.is_some() && self.bypass_url.is_none() {
                    let service_type = self.service_type.clone();
                    self.get_service_url(&service_type)?
                } else {
                    management_url
                };
                Ok(format!("{}{}", base, path))
            }
        }
    }

    fn add_auth_headers(&self, options: &mut RequestOptions) {
        match self.session.auth_token {
            Some(ref token) => options.set_header(AUTH_TOKEN_HEADER, token),
            None => options.remove_header(AUTH_TOKEN_HEADER),
        }
        if let Some(ref project) = self.credentials.project {
            options.set_header(PROJECT_ID_HEADER, project);
        }
    }

    async fn retry_unauthorized(
        &mut self,
        method: Method,
        url: &str,
        mut options: RequestOptions,
    ) -> Result<ApiResponse, Error> {
        // The rejected token must not be reused for re-authentication.
        self.unauthenticate();
        self.keys_saved = false;
        self.authenticate().await?;
        self.add_auth_headers(&mut options);
        self.time_request(method, url, options).await
    }
}

#[async_trait]
impl Dispatcher for HttpClient {
    /// Send an authenticated request, authenticating first if needed.
    ///
    /// A request rejected with HTTP 401 is retried once after a fresh
    /// authentication. If the retry is rejected too, the first error is
    /// returned.
    async fn authenticated_request(
        &mut self,
        method: Method,
        path: Option<&str>,
        mut options: RequestOptions,
    ) -> Result<ApiResponse, Error> {
        if self.session.management_url.is_none() {
            self.authenticate().await?;
        }

        let url = self.resolve_url(path)?;
        self.add_auth_headers(&mut options);
        match self.time_request(method.clone(), &url, options.clone()).await {
            Err(original) if original.kind() == ErrorKind::Unauthorized => {
                debug!("Request to {} was rejected, re-authenticating", url);
                match self.retry_unauthorized(method, &url, options).await {
                    Err(retry) if retry.kind() == ErrorKind::Unauthorized => Err(original),
                    other => other,
                }
            }
            other => other,
        }
    }

    fn timings(&self) -> &[Timing] {
        &self.times
    }

    fn reset_timings(&mut self) {
        self.times.clear();
    }

    fn api_version(&self) -> Option<ApiVersion> {
        self.api_version
    }

    fn set_api_version(&mut self, version: Option<ApiVersion>) {
        self.api_version = version;
    }
}

#[cfg(test)]
pub mod test {
    use super::{AuthState, HttpClient};
    use crate::{Credentials, Dispatcher, ErrorKind};

    fn client() -> HttpClient {
        HttpClient::new(
            Credentials::new()
                .with_user("user")
                .with_password("pass")
                .with_project("project")
                .with_auth_url("http://auth.example.com/v2.0"),
        )
    }

    #[test]
    fn test_new_is_unauthenticated() {
        let client = client();
        assert_eq!(client.state(), AuthState::Unauthenticated);
        assert!(client.auth_token().is_none());
        assert!(client.timings().is_empty());
        assert!(!client.uses_token_cache());
    }

    #[test]
    fn test_bypass_sets_management_url() {
        let client = client().with_bypass_url("http://b/");
        assert_eq!(client.management_url(), Some("http://b"));
        assert_eq!(client.state(), AuthState::Authenticated);
    }

    #[test]
    fn test_unauthenticate() {
        let mut client = HttpClient::new(Credentials::new().with_token("tok"));
        client.set_management_url("http://nova.example.com/v2/1/");
        assert_eq!(client.auth_token(), Some("tok"));
        assert_eq!(client.management_url(), Some("http://nova.example.com/v2/1"));
        client.unauthenticate();
        assert!(client.auth_token().is_none());
        assert!(client.management_url().is_none());
        assert_eq!(client.state(), AuthState::Unauthenticated);
    }

    #[test]
    fn test_resolve_root_url() {
        let mut client = client();
        client.set_management_url("http://foo.com/nova/v2/e5f05b3ff5fd4a8c");
        assert_eq!(client.resolve_url(None).unwrap(), "http://foo.com/nova/");
        assert_eq!(
            client.resolve_url(Some("/servers")).unwrap(),
            "http://foo.com/nova/v2/e5f05b3ff5fd4a8c/servers"
        );
    }

    #[test]
    fn test_service_url_without_catalog() {
        let mut client = client();
        let err = client.get_service_url("compute").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EndpointNotFound);
    }

    #[test]
    fn test_sessions() {
        let mut client = client();
        client.open_session().unwrap();
        assert!(client.http_session.is_some());
        client.close_session();
        assert!(client.http_session.is_none());

        let mut pooled = self::client().with_connection_pool(true);
        pooled.open_session().unwrap();
        assert!(pooled.http_session.is_none());
    }
}
