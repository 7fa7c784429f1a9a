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

//! Debug logging of HTTP exchanges with credentials redacted.

use std::collections::BTreeMap;

use log::debug;
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use serde_json::Value;
use sha1::{Digest, Sha1};

use super::identity::protocol::AUTH_TOKEN_HEADER;

const REQUEST_SECRET: &[&str] = &["auth", "passwordCredentials", "password"];
const RESPONSE_SECRET: &[&str] = &["access", "token", "id"];

/// Replacement for a secret value: `{SHA1}` followed by its hex digest.
pub fn sha1_marker(value: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(value.as_bytes());
    format!("{{SHA1}}{}", hex::encode(hasher.finalize()))
}

/// Replace the value at the given JSON path.
///
/// Nothing happens if the path does not exist.
pub fn redact(target: &mut Value, path: &[&str], text: Option<&str>) {
    let (last, parents) = match path.split_last() {
        Some(parts) => parts,
        None => return,
    };

    let mut current = target;
    for key in parents {
        current = match current.get_mut(*key) {
            Some(next) => next,
            None => return,
        };
    }

    if let Some(value) = current.get_mut(*last) {
        let replacement = match (text, &*value) {
            (Some(text), _) => text.to_string(),
            (None, Value::String(s)) => sha1_marker(s),
            (None, other) => sha1_marker(&other.to_string()),
        };
        *value = Value::String(replacement);
    }
}

/// Opt-in logger of requests (as `curl` command lines) and responses.
#[derive(Debug, Clone, Default)]
pub struct HttpLogger {
    enabled: bool,
    replacement: Option<String>,
}

impl HttpLogger {
    /// Create a logger, disabled loggers produce nothing.
    pub fn new(enabled: bool) -> HttpLogger {
        HttpLogger {
            enabled,
            replacement: None,
        }
    }

    /// Use a static text instead of SHA1 digests for secrets.
    pub fn with_replacement<S: Into<String>>(mut self, text: S) -> HttpLogger {
        self.replacement = Some(text.into());
        self
    }

    /// Whether logging is enabled.
    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn hide(&self, value: &str) -> String {
        match self.replacement {
            Some(ref text) => text.clone(),
            None => sha1_marker(value),
        }
    }

    /// Render a request as a `curl` command line.
    pub fn format_request(
        &self,
        method: &Method,
        url: &str,
        headers: &BTreeMap<String, String>,
        body: Option<&Value>,
        insecure: bool,
    ) -> String {
        let mut result = String::from("curl -g -i");
        if insecure {
            result.push_str(" --insecure");
        }
        result.push_str(&format!(" '{}' -X {}", url, method));

        for (name, value) in headers {
            let value = if name.eq_ignore_ascii_case(AUTH_TOKEN_HEADER) {
                self.hide(value)
            } else {
                value.clone()
            };
            result.push_str(&format!(" -H \"{}: {}\"", name, value));
        }

        if let Some(body) = body {
            let mut body = body.clone();
            redact(&mut body, REQUEST_SECRET, self.replacement.as_deref());
            result.push_str(&format!(" -d '{}'", body));
        }

        result
    }

    /// Render a response status, headers and body.
    ///
    /// Error 400 bodies and bodies that are not JSON are rendered as `null`.
    pub fn format_response(&self, status: StatusCode, headers: &HeaderMap, text: &str) -> String {
        let body = if !text.is_empty() && status != StatusCode::BAD_REQUEST {
            serde_json::from_str::<Value>(text).ok().map(|mut body| {
                redact(&mut body, RESPONSE_SECRET, self.replacement.as_deref());
                body
            })
        } else {
            None
        };

        let headers = headers
            .iter()
            .map(|(name, value)| {
                let value = value.to_str().unwrap_or("<binary>");
                let value = if name.as_str().eq_ignore_ascii_case(AUTH_TOKEN_HEADER) {
                    self.hide(value)
                } else {
                    value.to_string()
                };
                format!("'{}': '{}'", name, value)
            })
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "RESP: [{}] {{{}}}\nRESP BODY: {}\n",
            status.as_u16(),
            headers,
            body.unwrap_or(Value::Null)
        )
    }

    /// Log a request if enabled.
    pub fn log_request(
        &self,
        method: &Method,
        url: &str,
        headers: &BTreeMap<String, String>,
        body: Option<&Value>,
        insecure: bool,
    ) {
        if self.enabled {
            debug!(
                "REQ: {}",
                self.format_request(method, url, headers, body, insecure)
            );
        }
    }

    /// Log a response if enabled.
    pub fn log_response(&self, status: StatusCode, headers: &HeaderMap, text: &str) {
        if self.enabled {
            debug!("{}", self.format_response(status, headers, text));
        }
    }
}

#[cfg(test)]
pub mod test {
    use std::collections::BTreeMap;

    use reqwest::header::HeaderMap;
    use reqwest::{Method, StatusCode};
    use serde_json::json;

    use super::{redact, sha1_marker, HttpLogger};

    #[test]
    fn test_sha1_marker() {
        assert_eq!(
            sha1_marker("totally_bogus"),
            "{SHA1}b42162b6ffdbd7c3c37b7c95b7ba9f51dda0236d"
        );
        assert_eq!(
            sha1_marker("zhaoqin"),
            "{SHA1}4fc49c6a671ce889078ff6b250f7066cf6d2ada2"
        );
    }

    #[test]
    fn test_redact_missing_path() {
        let mut body = json!({"auth": {"token": {"id": "abc"}}});
        let expected = body.clone();
        redact(&mut body, &["auth", "passwordCredentials", "password"], None);
        assert_eq!(body, expected);
        redact(&mut body, &[], None);
        assert_eq!(body, expected);
    }

    #[test]
    fn test_redact_with_text() {
        let mut body = json!({"access": {"token": {"id": "zhaoqin"}}});
        redact(&mut body, &["access", "token", "id"], Some("<hidden>"));
        assert_eq!(body, json!({"access": {"token": {"id": "<hidden>"}}}));
    }

    #[test]
    fn test_format_request() {
        let logger = HttpLogger::new(true);
        let mut headers = BTreeMap::new();
        let _ = headers.insert("X-Foo".to_string(), "bar".to_string());
        let _ = headers.insert("X-Auth-Token".to_string(), "totally_bogus".to_string());
        assert_eq!(
            logger.format_request(&Method::GET, "/foo", &headers, None, false),
            "curl -g -i '/foo' -X GET \
             -H \"X-Auth-Token: {SHA1}b42162b6ffdbd7c3c37b7c95b7ba9f51dda0236d\" \
             -H \"X-Foo: bar\""
        );
    }

    #[test]
    fn test_format_request_password() {
        let logger = HttpLogger::new(true);
        let body = json!({"auth": {"passwordCredentials": {"username": "me", "password": "zhaoqin"}}});
        let line = logger.format_request(&Method::POST, "/tokens", &BTreeMap::new(), Some(&body), true);
        assert!(line.starts_with("curl -g -i --insecure '/tokens' -X POST -d '"));
        assert!(line.contains("{SHA1}4fc49c6a671ce889078ff6b250f7066cf6d2ada2"));
        assert!(!line.contains("\"zhaoqin\""));
    }

    #[test]
    fn test_format_request_replacement() {
        let logger = HttpLogger::new(true).with_replacement("***");
        let mut headers = BTreeMap::new();
        let _ = headers.insert("x-auth-token".to_string(), "secret".to_string());
        let line = logger.format_request(&Method::GET, "/foo", &headers, None, false);
        assert!(line.ends_with("-H \"x-auth-token: ***\""));
    }

    #[test]
    fn test_format_response() {
        let logger = HttpLogger::new(true);
        let text = r#"{"access": {"token": {"id": "zhaoqin"}}}"#;
        let line = logger.format_response(StatusCode::OK, &HeaderMap::new(), text);
        assert_eq!(
            line,
            "RESP: [200] {}\nRESP BODY: \
             {\"access\":{\"token\":{\"id\":\"{SHA1}4fc49c6a671ce889078ff6b250f7066cf6d2ada2\"}}}\n"
        );
    }

    #[test]
    fn test_format_response_token_header() {
        let logger = HttpLogger::new(true);
        let mut headers = HeaderMap::new();
        let _ = headers.insert("X-Auth-Token", "zhaoqin".parse().unwrap());
        let _ = headers.insert("X-Server-Management-Url", "http://nova/v1.1/1".parse().unwrap());
        let line = logger.format_response(StatusCode::NO_CONTENT, &headers, "");
        assert!(line.starts_with("RESP: [204] {"));
        assert!(line.contains("'x-auth-token': '{SHA1}4fc49c6a671ce889078ff6b250f7066cf6d2ada2'"));
        assert!(line.contains("'x-server-management-url': 'http://nova/v1.1/1'"));
        assert!(!line.contains("'zhaoqin'"));
    }

    #[test]
    fn test_format_response_not_json() {
        let logger = HttpLogger::new(true);
        let line = logger.format_response(StatusCode::OK, &HeaderMap::new(), "<html/>");
        assert!(line.ends_with("RESP BODY: null\n"));
        let line = logger.format_response(
            StatusCode::BAD_REQUEST,
            &HeaderMap::new(),
            r#"{"badRequest": {"message": "no"}}"#,
        );
        assert!(line.ends_with("RESP BODY: null\n"));
    }
}
