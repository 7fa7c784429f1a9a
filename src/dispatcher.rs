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

//! Common interface of request dispatchers.

use std::fmt::Debug;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use static_assertions::assert_obj_safe;

use super::request::{ApiResponse, RequestOptions, Timing};
use super::{ApiVersion, Error};

/// A dispatcher sends authenticated requests to the compute service.
///
/// Both [HttpClient](struct.HttpClient.html) and
/// [SessionClient](struct.SessionClient.html) implement it, so code built on
/// top of a dispatcher does not care how authentication is done.
#[async_trait]
pub trait Dispatcher: Debug + Send {
    /// Send an authenticated request.
    ///
    /// The `path` is relative to the compute endpoint. `None` means the
    /// unversioned root of the endpoint.
    async fn authenticated_request(
        &mut self,
        method: Method,
        path: Option<&str>,
        options: RequestOptions,
    ) -> Result<ApiResponse, Error>;

    /// Timings of completed requests (if enabled).
    fn timings(&self) -> &[Timing];

    /// Forget the recorded timings.
    fn reset_timings(&mut self);

    /// Compute API version in use (if any).
    fn api_version(&self) -> Option<ApiVersion>;

    /// Set the Compute API version.
    fn set_api_version(&mut self, version: Option<ApiVersion>);

    /// Issue a GET request.
    async fn get(&mut self, path: &str) -> Result<ApiResponse, Error> {
        self.authenticated_request(Method::GET, Some(path), RequestOptions::default())
            .await
    }

    /// Issue a POST request with a JSON body.
    async fn post(&mut self, path: &str, body: Value) -> Result<ApiResponse, Error> {
        let options = RequestOptions {
            body: Some(body),
            ..RequestOptions::default()
        };
        self.authenticated_request(Method::POST, Some(path), options)
            .await
    }

    /// Issue a PUT request with an optional JSON body.
    async fn put(&mut self, path: &str, body: Option<Value>) -> Result<ApiResponse, Error> {
        let options = RequestOptions {
            body,
            ..RequestOptions::default()
        };
        self.authenticated_request(Method::PUT, Some(path), options)
            .await
    }

    /// Issue a DELETE request.
    async fn delete(&mut self, path: &str) -> Result<ApiResponse, Error> {
        self.authenticated_request(Method::DELETE, Some(path), RequestOptions::default())
            .await
    }
}

assert_obj_safe!(Dispatcher);
