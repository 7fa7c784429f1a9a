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

//! Request options, responses and timings.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{trace, warn};
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::apiversion::MICROVERSION_HEADER;
use super::{ApiVersion, Error, ErrorKind};

/// Default markers of a refused connection reported by a proxy in a 400 body.
pub const CONNECTION_REFUSED_MARKERS: &[&str] = &["Connection refused", "actively refused"];

/// Options of a single request.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Additional headers, sorted by name.
    pub headers: BTreeMap<String, String>,
    /// JSON body.
    pub body: Option<Value>,
    /// Timeout overriding the dispatcher one.
    pub timeout: Option<Duration>,
}

/// Response of a successful request.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// HTTP status code.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Decoded JSON body, `None` for empty or non-JSON bodies.
    pub body: Option<Value>,
}

/// Timing of a completed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timing {
    /// `<METHOD> <url>`.
    pub label: String,
    /// Start time.
    pub start: DateTime<Utc>,
    /// End time.
    pub end: DateTime<Utc>,
}

impl RequestOptions {
    /// Add a header.
    #[inline]
    pub fn with_header<K: Into<String>, V: Into<String>>(mut self, name: K, value: V) -> Self {
        let _ = self.headers.insert(name.into(), value.into());
        self
    }

    /// Add a JSON body from any serializable value.
    pub fn with_json<T: Serialize>(mut self, body: &T) -> Result<Self, Error> {
        let value = serde_json::to_value(body)
            .map_err(|e| Error::new(ErrorKind::InvalidInput, e.to_string()))?;
        self.body = Some(value);
        Ok(self)
    }

    /// Add a timeout.
    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set a header unless it is already present.
    pub(crate) fn set_default_header(&mut self, name: &str, value: &str) {
        if !self
            .headers
            .keys()
            .any(|key| key.eq_ignore_ascii_case(name))
        {
            let _ = self.headers.insert(name.to_string(), value.to_string());
        }
    }

    /// Set a header, replacing any existing one with the same name.
    pub(crate) fn set_header(&mut self, name: &str, value: &str) {
        self.remove_header(name);
        let _ = self.headers.insert(name.to_string(), value.to_string());
    }

    /// Set the user agent and the content negotiation headers.
    ///
    /// The microversion header is only added for non-zero minor versions
    /// and never overrides an explicit one.
    pub(crate) fn set_standard_headers(&mut self, user_agent: &str, version: Option<ApiVersion>) {
        self.set_header("User-Agent", user_agent);
        self.set_header("Accept", "application/json");
        if self.body.is_some() {
            self.set_header("Content-Type", "application/json");
        }
        if let Some(version) = version.and_then(ApiVersion::microversion_header) {
            self.set_default_header(MICROVERSION_HEADER, &version);
        }
    }

    /// Remove a header regardless of its case.
    pub(crate) fn remove_header(&mut self, name: &str) {
        self.headers.retain(|key, _| !key.eq_ignore_ascii_case(name));
    }
}

impl ApiResponse {
    /// Convert the body into a typed value.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        match self.body {
            Some(ref body) => serde_json::from_value(body.clone()).map_err(Into::into),
            None => Err(Error::new(
                ErrorKind::InvalidResponse,
                format!("Expected a JSON body in HTTP {} response", self.status),
            )),
        }
    }

    /// Header value as a string (if present and valid).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }
}

impl Timing {
    pub(crate) fn new(method: &Method, url: &str, start: DateTime<Utc>) -> Timing {
        Timing {
            label: format!("{} {}", method, url),
            start,
            end: Utc::now(),
        }
    }

    /// Duration of the request.
    #[inline]
    pub fn elapsed(&self) -> chrono::Duration {
        self.end.signed_duration_since(self.start)
    }
}

/// Whether an error 400 body actually reports a refused connection.
pub(crate) fn is_connection_refused<S: AsRef<str>>(text: &str, markers: &[S]) -> bool {
    markers.iter().any(|m| text.contains(m.as_ref()))
}

/// Decode a response body and convert failures into errors.
pub(crate) fn check_response<S: AsRef<str>>(
    method: &Method,
    url: &str,
    status: StatusCode,
    headers: &HeaderMap,
    text: &str,
    refused_markers: &[S],
) -> Result<Option<Value>, Error> {
    let body = if text.is_empty() {
        None
    } else {
        if status == StatusCode::BAD_REQUEST && is_connection_refused(text, refused_markers) {
            return Err(Error::new(ErrorKind::ConnectionRefused, text).with_status(status));
        }
        serde_json::from_str::<Value>(text).ok()
    };

    if status.as_u16() >= 400 {
        let error = Error::from_response(status, headers, body.as_ref(), url, method);
        trace!("HTTP request {} {} returned {}: {}", method, url, status, error);
        Err(error)
    } else {
        trace!("HTTP request {} {} returned {}", method, url, status);
        Ok(body)
    }
}

/// Warn if a microversion was requested but the server did not confirm it.
pub(crate) fn check_microversion(version: Option<ApiVersion>, headers: &HeaderMap) {
    if let Some(version) = version {
        if version.is_microversion() && !headers.contains_key(MICROVERSION_HEADER) {
            warn!(
                "API version {} was requested, but the server did not return {}; \
                 it is probably too old to support microversions",
                version, MICROVERSION_HEADER
            );
        }
    }
}

#[cfg(test)]
mod test {
    use reqwest::header::HeaderMap;
    use reqwest::{Method, StatusCode};
    use serde::Deserialize;
    use serde_json::json;

    use super::{check_response, ApiResponse, RequestOptions, CONNECTION_REFUSED_MARKERS};
    use crate::ErrorKind;

    fn check(status: u16, text: &str) -> Result<Option<serde_json::Value>, crate::Error> {
        check_response(
            &Method::GET,
            "http://example.com",
            StatusCode::from_u16(status).unwrap(),
            &HeaderMap::new(),
            text,
            CONNECTION_REFUSED_MARKERS,
        )
    }

    #[test]
    fn test_connection_refused() {
        let err = check(400, "Connection refused by upstream").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConnectionRefused);
        assert_eq!(err.message(), "Connection refused by upstream");
        let err = check(400, "The target machine actively refused it").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConnectionRefused);
        let err = check(400, r#"{"badRequest": {"message": "Invalid"}}"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);
    }

    #[test]
    fn test_body_decoding() {
        assert_eq!(check(200, "").unwrap(), None);
        assert_eq!(check(200, "not json").unwrap(), None);
        assert_eq!(check(200, r#"{"a": 1}"#).unwrap(), Some(json!({"a": 1})));
        assert_eq!(check(503, "").unwrap_err().kind(), ErrorKind::ServiceUnavailable);
    }

    #[test]
    fn test_unknown_error_status() {
        let err = check(600, r#"{"weird": {"message": "Unknown"}}"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ClientException);
        assert_eq!(err.status().map(|s| s.as_u16()), Some(600));
        assert_eq!(check(399, "").unwrap(), None);
    }

    #[test]
    fn test_default_header() {
        let mut opts = RequestOptions::default().with_header("accept", "text/plain");
        opts.set_default_header("Accept", "application/json");
        opts.set_default_header("User-Agent", "osnova");
        assert_eq!(opts.headers.len(), 2);
        assert_eq!(opts.headers["accept"], "text/plain");

        opts.set_header("ACCEPT", "application/json");
        assert_eq!(opts.headers.len(), 2);
        assert_eq!(opts.headers["ACCEPT"], "application/json");
        opts.remove_header("user-agent");
        assert_eq!(opts.headers.len(), 1);
    }

    #[derive(Debug, Deserialize)]
    struct Servers {
        servers: Vec<serde_json::Value>,
    }

    #[test]
    fn test_response_json() {
        let resp = ApiResponse {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Some(json!({"servers": []})),
        };
        assert!(resp.json::<Servers>().unwrap().servers.is_empty());

        let resp = ApiResponse {
            status: StatusCode::NO_CONTENT,
            headers: HeaderMap::new(),
            body: None,
        };
        assert_eq!(
            resp.json::<Servers>().unwrap_err().kind(),
            ErrorKind::InvalidResponse
        );
    }
}
