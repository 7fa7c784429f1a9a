// Copyright 2019 Dmitry Tantsur <divius.inside@gmail.com>
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

//! Handy primitives for working with URLs.

use reqwest::Url;

use super::{Error, ErrorKind};

/// Port of the administrative Identity endpoint.
pub const ADMIN_PORT: u16 = 35357;

/// Authentication protocol used when the auth URL has no version segment.
pub const DEFAULT_AUTH_VERSION: &str = "v1.1";

/// Remove trailing slashes.
#[inline]
pub fn trim_slash(url: &str) -> &str {
    url.trim_end_matches('/')
}

/// `scheme://host[:port]` of a URL.
pub fn origin(url: &Url) -> String {
    let mut result = format!("{}://{}", url.scheme(), url.host_str().unwrap_or_default());
    if let Some(port) = url.port() {
        result.push_str(&format!(":{}", port));
    }
    result
}

/// Version of the authentication protocol from the auth URL.
///
/// This is the first path segment starting with `v`, e.g. `v2.0`.
pub fn auth_version(auth_url: &str) -> Option<String> {
    let url = Url::parse(auth_url).ok()?;
    let mut segments = url.path_segments()?;
    segments.find(|s| s.starts_with('v')).map(String::from)
}

/// Auth URL with an explicit port replaced by the administrative one.
pub fn admin_url(auth_url: &str) -> Result<String, Error> {
    let mut url = Url::parse(auth_url)?;
    if url.port().is_some() {
        // Only fails for URLs that cannot have a port, which already have none.
        let _ = url.set_port(Some(ADMIN_PORT));
    }
    Ok(trim_slash(url.as_str()).to_string())
}

/// URL of the token validation call on the administrative endpoint.
///
/// The token and the tenant are escaped as a path segment and a query value.
pub fn token_lookup(admin_url: &str, token: &str, tenant_id: &str) -> Result<String, Error> {
    let mut url = Url::parse(admin_url)?;
    let _ = url
        .path_segments_mut()
        .map_err(|_| Error::new(ErrorKind::InvalidConfig, "Invalid auth_url: wrong schema?"))?
        .pop_if_empty()
        .push("tokens")
        .push(token);
    let _ = url.query_pairs_mut().append_pair("belongsTo", tenant_id);
    Ok(url.into())
}

fn version_and_tenant(path: &str) -> Option<usize> {
    let (head, tenant) = path.rsplit_once('/')?;
    if tenant.is_empty()
        || !tenant
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
    {
        return None;
    }

    match head.as_bytes() {
        [.., b'v', b'1'..=b'9'] => Some(head.len() - 2),
        _ => None,
    }
}

/// Root of the management URL, without the `vN/<tenant>` suffix.
///
/// `http://foo.com/nova/v2/abc` becomes `http://foo.com/nova/`. The query
/// and the fragment are dropped.
pub fn unversioned_root(management_url: &str) -> Result<String, Error> {
    let mut url = Url::parse(management_url)?;
    let path = url.path().to_string();
    let new_path = match version_and_tenant(&path) {
        Some(end) => &path[..end],
        None => path.as_str(),
    };
    url.set_path(new_path);
    url.set_query(None);
    url.set_fragment(None);
    Ok(url.to_string())
}
