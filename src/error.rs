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

//! Error and result implementations.

use std::fmt;

use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use serde_json::Value;

/// Kind of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The configuration is missing a required value or is invalid.
    InvalidConfig,

    /// The requested authentication system has no registered plugin.
    AuthSystemNotFound,

    /// Proxy token lookup is not supported by the selected protocol.
    NoTokenLookup,

    /// The requested client version is not supported.
    UnsupportedVersion,

    /// Input parameters are not valid.
    InvalidInput,

    /// Response received from the server is malformed.
    InvalidResponse,

    /// Authentication did not produce usable credentials.
    AuthorizationFailure,

    /// No endpoint matches the service type and filters.
    EndpointNotFound,

    /// More than one endpoint matches the service type and filters.
    AmbiguousEndpoints,

    /// The connection was refused by the remote side.
    ConnectionRefused,

    /// The request timed out.
    OperationTimedOut,

    /// Generic failure of the HTTP transport.
    ProtocolError,

    /// HTTP 400.
    BadRequest,

    /// HTTP 401.
    Unauthorized,

    /// HTTP 403.
    Forbidden,

    /// HTTP 404.
    NotFound,

    /// HTTP 405.
    MethodNotAllowed,

    /// HTTP 406.
    NotAcceptable,

    /// HTTP 409.
    Conflict,

    /// HTTP 413 reporting a rate or quota limit, or HTTP 429.
    OverLimit,

    /// HTTP 413 reporting an oversized request.
    RequestEntityTooLarge,

    /// HTTP 422.
    UnprocessableEntity,

    /// HTTP 500.
    InternalServerError,

    /// HTTP 501.
    NotImplemented,

    /// HTTP 502.
    BadGateway,

    /// HTTP 503.
    ServiceUnavailable,

    /// HTTP 504.
    GatewayTimeout,

    /// Any other HTTP status code of 400 and above.
    ClientException,
}

/// Error from an OpenStack call.
#[derive(Debug, Clone)]
pub struct Error {
    kind: ErrorKind,
    status: Option<StatusCode>,
    message: String,
    details: Option<String>,
    method: Option<Method>,
    url: Option<String>,
    request_id: Option<String>,
    retry_after: Option<u64>,
}

impl ErrorKind {
    /// Short description of the error kind.
    pub fn description(self) -> &'static str {
        match self {
            ErrorKind::InvalidConfig => "Invalid configuration",
            ErrorKind::AuthSystemNotFound => "Authentication system not found",
            ErrorKind::NoTokenLookup => "Token lookup is not supported",
            ErrorKind::UnsupportedVersion => "Unsupported version",
            ErrorKind::InvalidInput => "Invalid input",
            ErrorKind::InvalidResponse => "Invalid response",
            ErrorKind::AuthorizationFailure => "Authorization failure",
            ErrorKind::EndpointNotFound => "Endpoint not found",
            ErrorKind::AmbiguousEndpoints => "Ambiguous endpoints",
            ErrorKind::ConnectionRefused => "Connection refused",
            ErrorKind::OperationTimedOut => "Operation timed out",
            ErrorKind::ProtocolError => "Protocol error",
            ErrorKind::BadRequest => "Bad request",
            ErrorKind::Unauthorized => "Unauthorized",
            ErrorKind::Forbidden => "Forbidden",
            ErrorKind::NotFound => "Not found",
            ErrorKind::MethodNotAllowed => "Method Not Allowed",
            ErrorKind::NotAcceptable => "Not Acceptable",
            ErrorKind::Conflict => "Conflict",
            ErrorKind::OverLimit => "Over limit",
            ErrorKind::RequestEntityTooLarge => "Request Entity Too Large",
            ErrorKind::UnprocessableEntity => "Unprocessable Entity",
            ErrorKind::InternalServerError => "Internal Server Error",
            ErrorKind::NotImplemented => "Not Implemented",
            ErrorKind::BadGateway => "Bad Gateway",
            ErrorKind::ServiceUnavailable => "Service Unavailable",
            ErrorKind::GatewayTimeout => "Gateway Timeout",
            ErrorKind::ClientException => "Unknown Error",
        }
    }

    /// Pick an error kind for an HTTP status code and a decoded response body.
    ///
    /// HTTP 413 is ambiguous in Compute: a body with an `overLimit` fault (or no
    /// body at all) means a rate or quota limit, any other fault means that the
    /// request itself was too large.
    pub fn from_response(status: StatusCode, body: Option<&Value>) -> ErrorKind {
        match status.as_u16() {
            400 => ErrorKind::BadRequest,
            401 => ErrorKind::Unauthorized,
            403 => ErrorKind::Forbidden,
            404 => ErrorKind::NotFound,
            405 => ErrorKind::MethodNotAllowed,
            406 => ErrorKind::NotAcceptable,
            409 => ErrorKind::Conflict,
            413 => match body {
                Some(Value::Object(map)) if !map.contains_key("overLimit") => {
                    ErrorKind::RequestEntityTooLarge
                }
                _ => ErrorKind::OverLimit,
            },
            422 => ErrorKind::UnprocessableEntity,
            429 => ErrorKind::OverLimit,
            500 => ErrorKind::InternalServerError,
            501 => ErrorKind::NotImplemented,
            502 => ErrorKind::BadGateway,
            503 => ErrorKind::ServiceUnavailable,
            504 => ErrorKind::GatewayTimeout,
            _ => ErrorKind::ClientException,
        }
    }

    /// Whether this kind may carry a `Retry-After` value.
    #[inline]
    pub fn is_rate_limit(self) -> bool {
        matches!(
            self,
            ErrorKind::OverLimit | ErrorKind::RequestEntityTooLarge
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl From<StatusCode> for ErrorKind {
    fn from(value: StatusCode) -> ErrorKind {
        ErrorKind::from_response(value, None)
    }
}

impl Error {
    /// Create a new error of the provided kind.
    #[inline]
    pub fn new<S: Into<String>>(kind: ErrorKind, message: S) -> Error {
        Error {
            kind,
            status: None,
            message: message.into(),
            details: None,
            method: None,
            url: None,
            request_id: None,
            retry_after: None,
        }
    }

    /// Build an error from a failed HTTP response.
    ///
    /// The message and details are taken from the Compute fault body, either
    /// `{"message": ..., "details": ...}` or `{"<faultName>": {"message": ...}}`.
    pub fn from_response(
        status: StatusCode,
        headers: &HeaderMap,
        body: Option<&Value>,
        url: &str,
        method: &Method,
    ) -> Error {
        let kind = ErrorKind::from_response(status, body);
        let (message, details) = body.map(extract_fault).unwrap_or((None, None));
        let request_id = header_str(headers, "x-compute-request-id")
            .or_else(|| header_str(headers, "x-openstack-request-id"));
        let retry_after = if kind.is_rate_limit() {
            Some(
                header_str(headers, "retry-after")
                    .and_then(|value| value.trim().parse().ok())
                    .unwrap_or(0),
            )
        } else {
            None
        };

        Error {
            kind,
            status: Some(status),
            message: message.unwrap_or_else(|| kind.description().to_string()),
            details,
            method: Some(method.clone()),
            url: Some(url.to_string()),
            request_id,
            retry_after,
        }
    }

    /// Error kind.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// HTTP status code (if any).
    #[inline]
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// Error message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Error details from the response body (if any).
    #[inline]
    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    /// HTTP method of the failed request (if any).
    #[inline]
    pub fn method(&self) -> Option<&Method> {
        self.method.as_ref()
    }

    /// URL of the failed request (if any).
    #[inline]
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// Request ID reported by the server (if any).
    #[inline]
    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    /// Seconds to wait before retrying, for rate limit errors.
    #[inline]
    pub fn retry_after(&self) -> Option<u64> {
        self.retry_after
    }

    /// Whether the error was produced by an HTTP response.
    #[inline]
    pub fn is_http_error(&self) -> bool {
        self.status.is_some()
    }

    /// Add an HTTP status code.
    #[inline]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }

    #[inline]
    pub(crate) fn new_endpoint_not_found<D: fmt::Display>(service_type: D) -> Error {
        Error::new(
            ErrorKind::EndpointNotFound,
            format!("Endpoint for service {} was not found", service_type),
        )
    }
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(String::from)
}

fn extract_fault(body: &Value) -> (Option<String>, Option<String>) {
    let fault = match body {
        Value::Object(map) if map.contains_key("message") => body,
        Value::Object(map) => match map.values().next() {
            Some(value) => value,
            None => return (None, None),
        },
        _ => return (None, None),
    };

    let get = |key: &str| match fault.get(key) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Null) | None => None,
        Some(other) => Some(other.to_string()),
    };
    (get("message"), get("details"))
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.message)?;
        if let Some(status) = self.status {
            write!(f, " (HTTP {})", status.as_u16())?;
        }
        if let Some(ref request_id) = self.request_id {
            write!(f, " (Request-ID: {})", request_id)?;
        }
        Ok(())
    }
}

impl ::std::error::Error for Error {}

impl From<reqwest::Error> for Error {
    fn from(value: reqwest::Error) -> Error {
        let kind = if value.is_timeout() {
            ErrorKind::OperationTimedOut
        } else if value.is_connect() {
            ErrorKind::ConnectionRefused
        } else if value.is_builder() {
            ErrorKind::InvalidInput
        } else if value.is_decode() {
            ErrorKind::InvalidResponse
        } else {
            ErrorKind::ProtocolError
        };

        let error = Error::new(kind, value.to_string());
        match value.status() {
            Some(status) => error.with_status(status),
            None => error,
        }
    }
}

impl From<url::ParseError> for Error {
    fn from(value: url::ParseError) -> Error {
        Error::new(ErrorKind::InvalidInput, value.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Error {
        Error::new(ErrorKind::InvalidResponse, value.to_string())
    }
}
