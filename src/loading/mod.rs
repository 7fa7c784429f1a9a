// Copyright 2020 Dmitry Tantsur <dtantsur@protonmail.com>
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

//! Support for loading dispatchers from external input.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use log::debug;

use crate::cache::FileTokenStore;
use crate::httplog::HttpLogger;
use crate::plugin::AuthSystem;
use crate::pool::TlsVerification;
use crate::{Credentials, Error, HttpClient};

/// Settings of the classic dispatcher collected from any source.
#[derive(Debug, Default)]
struct ClientSettings {
    credentials: Credentials,
    auth_system: AuthSystem,
    service_type: Option<String>,
    service_name: Option<String>,
    volume_service_name: Option<String>,
    bypass_url: Option<String>,
    cacert: Option<String>,
    insecure: bool,
    use_cache: bool,
    debug: bool,
    timeout: Option<Duration>,
}

impl ClientSettings {
    fn tls_verification(&self) -> TlsVerification {
        if self.insecure {
            TlsVerification::Disabled
        } else if let Some(ref cacert) = self.cacert {
            TlsVerification::CaBundle(PathBuf::from(cacert))
        } else {
            TlsVerification::Enabled
        }
    }

    fn into_client(self) -> Result<HttpClient, Error> {
        let verify = self.tls_verification();
        let mut client = HttpClient::new(self.credentials)
            .with_auth_system(self.auth_system)
            .with_tls_verification(verify)
            .with_http_logger(HttpLogger::new(self.debug))
            .with_token_cache(self.use_cache);

        if let Some(service_type) = self.service_type {
            client = client.with_service_type(service_type);
        }
        if let Some(service_name) = self.service_name {
            client = client.with_service_name(service_name);
        }
        if let Some(volume_service_name) = self.volume_service_name {
            client = client.with_volume_service_name(volume_service_name);
        }
        if let Some(bypass_url) = self.bypass_url {
            client = client.with_bypass_url(bypass_url);
        }
        if let Some(timeout) = self.timeout {
            client = client.with_timeout(timeout);
        }
        if self.use_cache {
            let store = FileTokenStore::default_location()?;
            debug!("Caching tokens in {}", store.path().display());
            client = client.with_token_store(Arc::new(store));
        }

        Ok(client)
    }
}

mod config;
mod env;

pub use config::{from_config, from_config_with_plugins};
pub use env::{from_env, from_env_with_plugins};
