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

//! Registry of supported Compute API client versions.

use std::collections::BTreeMap;
use std::fmt;

use lazy_static::lazy_static;
use log::{debug, warn};

use super::{ApiVersion, Dispatcher, Error, ErrorKind, HttpClient, SessionClient};

type Factory = fn(ApiVersion, Box<dyn Dispatcher>) -> Client;

lazy_static! {
    static ref CLIENT_FACTORIES: BTreeMap<u16, Factory> = {
        let v2: Factory = Client::new;
        let mut factories = BTreeMap::new();
        let _ = factories.insert(2, v2);
        factories
    };
    static ref DEPRECATED_VERSIONS: BTreeMap<&'static str, &'static str> = {
        let mut deprecated = BTreeMap::new();
        let _ = deprecated.insert("1.1", "2");
        deprecated
    };
}

/// Transport a client is built on.
#[derive(Debug)]
pub enum Transport {
    /// Session-delegating dispatcher.
    Session(SessionClient),
    /// Classic dispatcher owning the credentials.
    Classic(HttpClient),
}

/// A versioned Compute client on top of a dispatcher.
pub struct Client {
    api_version: ApiVersion,
    dispatcher: Box<dyn Dispatcher>,
}

impl From<SessionClient> for Transport {
    fn from(value: SessionClient) -> Transport {
        Transport::Session(value)
    }
}

impl From<HttpClient> for Transport {
    fn from(value: HttpClient) -> Transport {
        Transport::Classic(value)
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Client")
            .field("api_version", &self.api_version)
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}

impl Client {
    fn new(api_version: ApiVersion, dispatcher: Box<dyn Dispatcher>) -> Client {
        Client {
            api_version,
            dispatcher,
        }
    }

    /// API version of the client.
    #[inline]
    pub fn api_version(&self) -> ApiVersion {
        self.api_version
    }

    /// Dispatcher used by the client.
    #[inline]
    pub fn dispatcher(&self) -> &dyn Dispatcher {
        self.dispatcher.as_ref()
    }

    /// Mutable access to the dispatcher.
    #[inline]
    pub fn dispatcher_mut(&mut self) -> &mut dyn Dispatcher {
        self.dispatcher.as_mut()
    }

    /// Extract the dispatcher.
    #[inline]
    pub fn into_dispatcher(self) -> Box<dyn Dispatcher> {
        self.dispatcher
    }
}

/// Major versions that clients can be created for.
pub fn supported_versions() -> Vec<String> {
    CLIENT_FACTORIES.keys().map(|v| v.to_string()).collect()
}

fn invalid_version(requested: &str) -> Error {
    Error::new(
        ErrorKind::UnsupportedVersion,
        format!(
            "Invalid client version '{}'. must be one of: {}",
            requested,
            supported_versions().join(", ")
        ),
    )
}

/// Validate a requested client version.
///
/// Deprecated versions are replaced with their successors with a warning.
pub fn check_version(requested: &str) -> Result<ApiVersion, Error> {
    let version = match DEPRECATED_VERSIONS.get(requested) {
        Some(replacement) => {
            warn!(
                "Version {} is deprecated, using alternative version {} instead",
                requested, replacement
            );
            *replacement
        }
        None => requested,
    };

    let parsed: ApiVersion = version.parse().map_err(|_| invalid_version(requested))?;
    if CLIENT_FACTORIES.contains_key(&parsed.major()) {
        Ok(parsed)
    } else {
        Err(invalid_version(requested))
    }
}

/// Turn a transport into a dispatcher.
pub fn construct_dispatcher(transport: Transport) -> Box<dyn Dispatcher> {
    match transport {
        Transport::Session(session) => Box::new(session),
        Transport::Classic(client) => Box::new(client),
    }
}

/// Create a client for the requested version.
///
/// ```rust
/// let auth = osnova::NoAuth::new("http://nova.local/v2.1").unwrap();
/// let client = osnova::new_client("2.53", osnova::SessionClient::new(auth)).unwrap();
/// assert_eq!(client.api_version(), osnova::ApiVersion(2, 53));
///
/// let auth = osnova::NoAuth::new("http://nova.local/v2.1").unwrap();
/// assert!(osnova::new_client("3", osnova::SessionClient::new(auth)).is_err());
/// ```
pub fn new_client<T: Into<Transport>>(version: &str, transport: T) -> Result<Client, Error> {
    let api_version = check_version(version)?;
    let factory = CLIENT_FACTORIES
        .get(&api_version.major())
        .ok_or_else(|| invalid_version(version))?;
    let mut dispatcher = construct_dispatcher(transport.into());
    dispatcher.set_api_version(Some(api_version));
    debug!("Creating a client for API version {}", api_version);
    Ok(factory(api_version, dispatcher))
}
