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

//! Session-delegating dispatcher.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use log::debug;
use reqwest::{Client, Method, Url};
use static_assertions::assert_impl_all;

use super::client::{COMPUTE, USER_AGENT};
use super::httplog::HttpLogger;
use super::pool::TransportConfig;
use super::request::{self, ApiResponse, RequestOptions, Timing, CONNECTION_REFUSED_MARKERS};
use super::url;
use super::{ApiVersion, AuthType, Dispatcher, EndpointFilters, Error, ErrorKind};

/// Dispatcher delegating authentication to an [AuthType](trait.AuthType.html).
///
/// The authentication type provides the token and the endpoint. A request
/// rejected with HTTP 401 is retried once after refreshing the
/// authentication.
///
/// ```rust,no_run
/// # async fn example() -> Result<(), osnova::Error> {
/// use osnova::Dispatcher;
///
/// let auth = osnova::identity::Password::new(
///     "https://cloud.local/identity/v2.0",
///     "admin",
///     "pa$$w0rd",
/// )?
/// .with_tenant_name("admin");
/// let mut client = osnova::SessionClient::new(auth);
/// let flavors = client.get("/flavors").await?;
/// # Ok(()) }
/// ```
///
/// # Note
///
/// All clones of one dispatcher share the same authentication.
#[derive(Debug, Clone)]
pub struct SessionClient {
    client: Client,
    auth: Arc<dyn AuthType>,
    service_type: String,
    filters: EndpointFilters,
    endpoint_override: Option<Url>,
    api_version: Option<ApiVersion>,
    timeout: Option<Duration>,
    insecure: bool,
    logger: HttpLogger,
    refused_markers: Vec<String>,
    timings_enabled: bool,
    times: Vec<Timing>,
    user_agent: String,
}

assert_impl_all!(SessionClient: Send, Sync);

impl SessionClient {
    /// Create a new dispatcher with a given authentication type.
    pub fn new<Auth: AuthType + 'static>(auth_type: Auth) -> SessionClient {
        SessionClient::new_with_client(Client::new(), auth_type)
    }

    /// Create a new dispatcher with the provided HTTP client.
    pub fn new_with_client<Auth: AuthType + 'static>(
        client: Client,
        auth_type: Auth,
    ) -> SessionClient {
        SessionClient {
            client,
            auth: Arc::new(auth_type),
            service_type: COMPUTE.to_string(),
            filters: EndpointFilters::default(),
            endpoint_override: None,
            api_version: None,
            timeout: None,
            insecure: false,
            logger: HttpLogger::default(),
            refused_markers: CONNECTION_REFUSED_MARKERS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            timings_enabled: false,
            times: Vec::new(),
            user_agent: USER_AGENT.to_string(),
        }
    }

    /// Create a new dispatcher building the HTTP client from transport settings.
    pub fn new_with_transport<Auth: AuthType + 'static>(
        transport: &TransportConfig,
        auth_type: Auth,
    ) -> Result<SessionClient, Error> {
        let mut result = SessionClient::new_with_client(transport.build_client(true)?, auth_type);
        result.timeout = transport.timeout;
        result.insecure = transport.verify.is_insecure();
        Ok(result)
    }

    /// Get a reference to the authentication type in use.
    #[inline]
    pub fn auth_type(&self) -> &dyn AuthType {
        self.auth.as_ref()
    }

    /// HTTP client in use.
    #[inline]
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Endpoint filters in use.
    #[inline]
    pub fn endpoint_filters(&self) -> &EndpointFilters {
        &self.filters
    }

    /// Renew the authentication.
    ///
    /// Authentication will also be updated for clones of this dispatcher,
    /// since they share the same authentication object.
    pub async fn refresh(&self) -> Result<(), Error> {
        self.auth.refresh(&self.client).await
    }

    /// Set a new authentication for this dispatcher.
    ///
    /// It does not affect clones of this dispatcher.
    #[inline]
    pub fn set_auth_type<Auth: AuthType + 'static>(&mut self, auth_type: Auth) {
        self.auth = Arc::new(auth_type);
    }

    /// Convert this dispatcher into one using the given authentication.
    #[inline]
    pub fn with_auth_type<Auth: AuthType + 'static>(mut self, auth_type: Auth) -> Self {
        self.set_auth_type(auth_type);
        self
    }

    /// Set the service type (`compute` by default).
    #[inline]
    pub fn with_service_type<S: Into<String>>(mut self, value: S) -> Self {
        self.service_type = value.into();
        self
    }

    /// Set endpoint filters, missing values come from the authentication type.
    #[inline]
    pub fn with_endpoint_filters(mut self, filters: EndpointFilters) -> Self {
        self.filters = filters;
        self
    }

    /// Use a fixed endpoint instead of the catalog.
    pub fn with_endpoint_override<S: AsRef<str>>(mut self, value: S) -> Result<Self, Error> {
        self.endpoint_override = Some(Url::parse(url::trim_slash(value.as_ref()))?);
        Ok(self)
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
        self.timeout = Some(value);
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

    /// Get the endpoint of the configured service.
    pub async fn get_endpoint(&self) -> Result<Url, Error> {
        match self.endpoint_override {
            Some(ref endpoint) => Ok(endpoint.clone()),
            None => {
                self.auth
                    .get_endpoint(&self.client, &self.service_type, &self.filters)
                    .await
            }
        }
    }

    async fn resolve_url(&self, path: Option<&str>) -> Result<String, Error> {
        let endpoint = self.get_endpoint().await?;
        match path {
            None => url::unversioned_root(url::trim_slash(endpoint.as_str())),
            Some(path) => Ok(format!("{}{}", url::trim_slash(endpoint.as_str()), path)),
        }
    }

    async fn send(
        &mut self,
        method: Method,
        url: &str,
        options: &RequestOptions,
    ) -> Result<ApiResponse, Error> {
        let start = Utc::now();
        self.logger.log_request(
            &method,
            url,
            &options.headers,
            options.body.as_ref(),
            self.insecure,
        );

        let mut builder = self.client.request(method.clone(), Url::parse(url)?);
        for (name, value) in &options.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(ref body) = options.body {
            let data = serde_json::to_string(body)
                .map_err(|e| Error::new(ErrorKind::InvalidInput, e.to_string()))?;
            builder = builder.body(data);
        }
        if let Some(timeout) = options.timeout.or(self.timeout) {
            builder = builder.timeout(timeout);
        }
        let builder = self.auth.authenticate(&self.client, builder).await?;

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let text = response.text().await?;
        self.logger.log_response(status, &headers, &text);

        let body =
            request::check_response(&method, url, status, &headers, &text, &self.refused_markers)?;
        request::check_microversion(self.api_version, &headers);
        if self.timings_enabled {
            self.times.push(Timing::new(&method, url, start));
        }
        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }
}

#[async_trait]
impl Dispatcher for SessionClient {
    /// Send an authenticated request.
    ///
    /// A request rejected with HTTP 401 is retried once after refreshing the
    /// authentication. If the retry is rejected too, the first error is
    /// returned.
    async fn authenticated_request(
        &mut self,
        method: Method,
        path: Option<&str>,
        mut options: RequestOptions,
    ) -> Result<ApiResponse, Error> {
        let url = self.resolve_url(path).await?;
        options.set_standard_headers(&self.user_agent, self.api_version);

        match self.send(method.clone(), &url, &options).await {
            Err(original) if original.kind() == ErrorKind::Unauthorized => {
                debug!("Request to {} was rejected, refreshing authentication", url);
                let retry = match self.auth.refresh(&self.client).await {
                    Ok(()) => self.send(method, &url, &options).await,
                    Err(e) => Err(e),
                };
                match retry {
                    Err(e) if e.kind() == ErrorKind::Unauthorized => Err(original),
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
