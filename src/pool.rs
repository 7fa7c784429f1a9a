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

//! HTTP transport settings and connection pooling.

use std::collections::HashMap;
#[cfg(any(feature = "native-tls", feature = "rustls"))]
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use log::debug;
#[cfg(any(feature = "native-tls", feature = "rustls"))]
use reqwest::Certificate;
use reqwest::{Client, ClientBuilder};

use super::{Error, ErrorKind};

/// Interval of TCP keep-alive probes on pooled connections.
pub const TCP_KEEPALIVE: Duration = Duration::from_secs(60);

/// TLS certificate verification mode.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TlsVerification {
    /// Verify using the system trust store.
    #[default]
    Enabled,
    /// Do not verify certificates (insecure).
    Disabled,
    /// Verify using an additional PEM CA bundle.
    CaBundle(PathBuf),
}

/// Transport settings shared by all connections of a dispatcher.
#[derive(Debug, Clone, Default)]
pub struct TransportConfig {
    /// TLS verification mode.
    pub verify: TlsVerification,
    /// Default request timeout.
    pub timeout: Option<Duration>,
}

/// Pool of HTTP clients keyed by `scheme://host[:port]`.
///
/// Each client keeps its connections alive, so consecutive requests to the
/// same origin reuse TCP connections.
#[derive(Debug, Clone, Default)]
pub struct ConnectionPool {
    clients: HashMap<String, Client>,
}

impl TlsVerification {
    /// Whether certificates are not verified.
    #[inline]
    pub fn is_insecure(&self) -> bool {
        *self == TlsVerification::Disabled
    }
}

#[cfg(any(feature = "native-tls", feature = "rustls"))]
fn configure_tls(mut builder: ClientBuilder, verify: &TlsVerification) -> Result<ClientBuilder, Error> {
    match verify {
        TlsVerification::Enabled => {}
        TlsVerification::Disabled => {
            builder = builder.danger_accept_invalid_certs(true);
        }
        TlsVerification::CaBundle(cert_path) => {
            let cert_content = fs::read(cert_path).map_err(|e| {
                Error::new(
                    ErrorKind::InvalidConfig,
                    format!("Cannot open cacert file {}: {}", cert_path.display(), e),
                )
            })?;

            let cert = Certificate::from_pem(&cert_content).map_err(|e| {
                Error::new(
                    ErrorKind::InvalidConfig,
                    format!("Cannot parse {} as PEM: {}", cert_path.display(), e),
                )
            })?;

            builder = builder.add_root_certificate(cert);
        }
    }
    Ok(builder)
}

#[cfg(not(any(feature = "native-tls", feature = "rustls")))]
fn configure_tls(builder: ClientBuilder, verify: &TlsVerification) -> Result<ClientBuilder, Error> {
    if *verify == TlsVerification::Enabled {
        Ok(builder)
    } else {
        Err(Error::new(
            ErrorKind::InvalidConfig,
            "TLS support is disabled",
        ))
    }
}

impl TransportConfig {
    /// Build an HTTP client with these settings.
    pub fn build_client(&self, keepalive: bool) -> Result<Client, Error> {
        let mut builder = Client::builder().tcp_nodelay(true);
        if keepalive {
            builder = builder.tcp_keepalive(TCP_KEEPALIVE);
        }
        configure_tls(builder, &self.verify)?
            .build()
            .map_err(|e| {
                Error::new(
                    ErrorKind::InvalidConfig,
                    format!("Cannot initialize HTTP backend: {}", e),
                )
            })
    }
}

impl ConnectionPool {
    /// Create an empty pool.
    #[inline]
    pub fn new() -> ConnectionPool {
        ConnectionPool::default()
    }

    /// Get or create a client for the origin.
    pub fn get(&mut self, origin: &str, transport: &TransportConfig) -> Result<Client, Error> {
        if let Some(client) = self.clients.get(origin) {
            return Ok(client.clone());
        }

        debug!("Creating pooled connections for {}", origin);
        let client = transport.build_client(true)?;
        let _ = self.clients.insert(origin.to_string(), client.clone());
        Ok(client)
    }

    /// Number of origins with pooled clients.
    #[inline]
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Whether the pool is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
