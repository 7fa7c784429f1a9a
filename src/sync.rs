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

//! Blocking wrapper around the classic dispatcher.

use reqwest::Method;
use serde_json::Value;
use tokio::runtime::{Builder, Runtime};

use super::request::{ApiResponse, RequestOptions};
use super::{Dispatcher, Error, ErrorKind, HttpClient};

/// Blocking classic dispatcher.
///
/// Every call blocks the current thread until the request (including any
/// authentication it triggers) completes. Must not be used from within an
/// asynchronous runtime.
///
/// ```rust,no_run
/// use osnova::sync::SyncClient;
///
/// let mut client = SyncClient::new(osnova::from_env().expect("Invalid environment"))
///     .expect("Cannot start a runtime");
/// let servers = client.get("/servers").expect("Request failed");
/// ```
#[derive(Debug)]
pub struct SyncClient {
    runtime: Runtime,
    inner: HttpClient,
}

impl SyncClient {
    /// Wrap a classic dispatcher.
    pub fn new(inner: HttpClient) -> Result<SyncClient, Error> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| {
                Error::new(
                    ErrorKind::InvalidConfig,
                    format!("Cannot create a runtime: {}", e),
                )
            })?;
        Ok(SyncClient { runtime, inner })
    }

    /// Access the wrapped dispatcher.
    #[inline]
    pub fn inner(&self) -> &HttpClient {
        &self.inner
    }

    /// Mutable access to the wrapped dispatcher.
    #[inline]
    pub fn inner_mut(&mut self) -> &mut HttpClient {
        &mut self.inner
    }

    /// Extract the wrapped dispatcher.
    #[inline]
    pub fn into_inner(self) -> HttpClient {
        self.inner
    }

    /// Authenticate, see [HttpClient::authenticate](../struct.HttpClient.html#method.authenticate).
    pub fn authenticate(&mut self) -> Result<(), Error> {
        self.runtime.block_on(self.inner.authenticate())
    }

    /// Forget the token and the management URL.
    #[inline]
    pub fn unauthenticate(&mut self) {
        self.inner.unauthenticate()
    }

    /// Send a request to an absolute URL without authentication.
    pub fn request(
        &mut self,
        method: Method,
        url: &str,
        options: RequestOptions,
    ) -> Result<ApiResponse, Error> {
        self.runtime
            .block_on(self.inner.request(method, url, options))
    }

    /// Send an authenticated request.
    pub fn authenticated_request(
        &mut self,
        method: Method,
        path: Option<&str>,
        options: RequestOptions,
    ) -> Result<ApiResponse, Error> {
        self.runtime
            .block_on(self.inner.authenticated_request(method, path, options))
    }

    /// Issue a GET request.
    pub fn get(&mut self, path: &str) -> Result<ApiResponse, Error> {
        self.runtime.block_on(self.inner.get(path))
    }

    /// Issue a POST request with a JSON body.
    pub fn post(&mut self, path: &str, body: Value) -> Result<ApiResponse, Error> {
        self.runtime.block_on(self.inner.post(path, body))
    }

    /// Issue a PUT request with an optional JSON body.
    pub fn put(&mut self, path: &str, body: Option<Value>) -> Result<ApiResponse, Error> {
        self.runtime.block_on(self.inner.put(path, body))
    }

    /// Issue a DELETE request.
    pub fn delete(&mut self, path: &str) -> Result<ApiResponse, Error> {
        self.runtime.block_on(self.inner.delete(path))
    }
}

#[cfg(test)]
mod test {
    use super::SyncClient;
    use crate::{Credentials, ErrorKind, HttpClient};

    #[test]
    fn test_missing_auth_url() {
        let mut client = SyncClient::new(HttpClient::new(Credentials::new())).unwrap();
        let err = client.authenticate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);
        let err = client.get("/servers").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);
    }

    #[test]
    fn test_inner() {
        let mut client = SyncClient::new(HttpClient::new(Credentials::new())).unwrap();
        client.inner_mut().set_management_url("http://nova.local/v2/1");
        assert_eq!(client.inner().management_url(), Some("http://nova.local/v2/1"));
        client.unauthenticate();
        assert!(client.into_inner().management_url().is_none());
    }
}
