// Copyright 2018-2021 Dmitry Tantsur <dtantsur@protonmail.com>
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

//! Support for cloud configuration file.

use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use log::warn;
use serde::Deserialize;
use serde_yaml::{Mapping, Value};

use super::ClientSettings;
use crate::plugin::AuthSystem;
use crate::utils::{self, parse_timeout};
use crate::{Credentials, Error, ErrorKind, HttpClient, InterfaceType, PluginRegistry};

#[derive(Debug, Default, Deserialize)]
struct Auth {
    #[serde(default)]
    auth_url: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    password: Option<String>,
    #[serde(default, alias = "tenant_name")]
    project_name: Option<String>,
    #[serde(default, alias = "tenant_id")]
    project_id: Option<String>,
    #[serde(default)]
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Cloud {
    #[serde(default)]
    auth: Option<Auth>,
    #[serde(default)]
    auth_type: Option<String>,
    #[serde(default)]
    cacert: Option<String>,
    #[serde(default)]
    verify: Option<bool>,
    #[serde(default)]
    region_name: Option<String>,
    #[serde(default, alias = "endpoint_type")]
    interface: Option<String>,
    #[serde(default)]
    compute_service_type: Option<String>,
    #[serde(default)]
    compute_service_name: Option<String>,
    #[serde(default)]
    volume_service_name: Option<String>,
    #[serde(default)]
    compute_endpoint_override: Option<String>,
    #[serde(default)]
    api_timeout: Option<f64>,
    #[serde(default)]
    cache: Option<bool>,
    #[serde(default)]
    debug: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct Root {
    clouds: HashMap<String, Cloud>,
}

fn find_config<S: AsRef<str>>(filename: S) -> Option<PathBuf> {
    let filename = filename.as_ref();
    let current = Path::new(filename);
    if current.is_file() {
        match current.canonicalize() {
            Ok(val) => return Some(val),
            Err(e) => warn!("Cannot canonicalize {:?}: {}", current, e),
        }
    }

    if let Some(mut home) = dirs::home_dir() {
        home.push(format!(".config/openstack/{}", filename));
        if home.is_file() {
            return Some(home);
        }
    } else {
        warn!("Cannot find home directory");
    }

    let abs = PathBuf::from(format!("/etc/openstack/{}", filename));
    if abs.is_file() {
        Some(abs)
    } else {
        None
    }
}

#[inline]
fn with_one_key(key: &str) -> Mapping {
    let mut result = Mapping::with_capacity(1);
    let _ = result.insert(key.into(), Value::Mapping(Mapping::new()));
    result
}

fn read_yaml(filename: &str, default_root_key: Option<&str>) -> Result<Mapping, Error> {
    let path = match find_config(filename) {
        Some(path) => path,
        None => {
            return match default_root_key {
                Some(default) => Ok(with_one_key(default)),
                None => Err(Error::new(
                    ErrorKind::InvalidConfig,
                    format!("{} was not found in any location", filename),
                )),
            };
        }
    };

    let content = File::open(path).map_err(|e| {
        Error::new(
            ErrorKind::InvalidConfig,
            format!("Cannot read {}: {}", filename, e),
        )
    })?;

    match serde_yaml::from_reader(content).map_err(|e| {
        Error::new(
            ErrorKind::InvalidConfig,
            format!("Cannot parse {}: {}", filename, e),
        )
    })? {
        Value::Mapping(mapping) => Ok(mapping),
        other => Err(Error::new(
            ErrorKind::InvalidConfig,
            format!("Root of {} is {:?}, not a mapping", filename, other),
        )),
    }
}

fn auth_system_from_cloud(
    auth_type: Option<String>,
    registry: &PluginRegistry,
) -> Result<AuthSystem, Error> {
    match auth_type.as_deref() {
        None | Some("password") | Some("v2password") | Some("token") | Some("v2token") => {
            Ok(AuthSystem::Keystone)
        }
        Some(other) => registry.resolve(other),
    }
}

fn credentials_from_cloud(auth: Auth, cloud: &Cloud) -> Result<Credentials, Error> {
    let mut creds = Credentials::new();
    if let Some(auth_url) = auth.auth_url {
        creds = creds.with_auth_url(auth_url);
    }
    if let Some(username) = auth.username {
        creds = creds.with_user(username);
    }
    if let Some(user_id) = auth.user_id {
        creds = creds.with_user_id(user_id);
    }
    if let Some(password) = auth.password {
        creds = creds.with_password(password);
    }
    if let Some(project) = auth.project_name {
        creds = creds.with_project(project);
    }
    if let Some(tenant_id) = auth.project_id {
        creds = creds.with_tenant_id(tenant_id);
    }
    if let Some(token) = auth.token {
        creds = creds.with_token(token);
    }
    if let Some(ref region) = cloud.region_name {
        creds = creds.with_region(region.clone());
    }
    if let Some(ref interface) = cloud.interface {
        creds = creds.with_endpoint_type(InterfaceType::from_str(interface)?);
    }
    Ok(creds)
}

fn from_files(
    name: &str,
    mut clouds: Mapping,
    secure: Mapping,
    registry: &PluginRegistry,
) -> Result<HttpClient, Error> {
    utils::merge_mappings(secure, &mut clouds, true);

    let mut clouds_root: Root = serde_yaml::from_value(Value::Mapping(clouds)).map_err(|e| {
        Error::new(
            ErrorKind::InvalidConfig,
            format!("Cannot parse the merged cloud configuration: {}", e),
        )
    })?;

    let mut cloud = clouds_root
        .clouds
        .remove(name)
        .ok_or_else(|| Error::new(ErrorKind::InvalidConfig, format!("No such cloud: {}", name)))?;

    let auth_system = auth_system_from_cloud(cloud.auth_type.take(), registry)?;
    let credentials = credentials_from_cloud(cloud.auth.take().unwrap_or_default(), &cloud)?;
    let timeout = match cloud.api_timeout {
        Some(value) => Some(parse_timeout("api_timeout", &value.to_string())?),
        None => None,
    };

    let settings = ClientSettings {
        credentials,
        auth_system,
        service_type: cloud.compute_service_type,
        service_name: cloud.compute_service_name,
        volume_service_name: cloud.volume_service_name,
        bypass_url: cloud.compute_endpoint_override,
        cacert: cloud.cacert,
        insecure: cloud.verify == Some(false),
        use_cache: cloud.cache.unwrap_or(false),
        debug: cloud.debug.unwrap_or(false),
        timeout,
    };

    settings.into_client()
}

/// Create a classic dispatcher from a `clouds.yaml` configuration file.
///
/// Secrets from `secure.yaml` are merged into the cloud definition.
pub fn from_config<S: AsRef<str>>(cloud_name: S) -> Result<HttpClient, Error> {
    from_config_with_plugins(cloud_name, &PluginRegistry::new())
}

/// Create a classic dispatcher from a `clouds.yaml` configuration file.
///
/// An `auth_type` other than the built-in ones is resolved against the
/// provided plugin registry.
pub fn from_config_with_plugins<S: AsRef<str>>(
    cloud_name: S,
    registry: &PluginRegistry,
) -> Result<HttpClient, Error> {
    let clouds = read_yaml("clouds.yaml", None)?;
    let secure = read_yaml("secure.yaml", Some("clouds"))?;

    from_files(cloud_name.as_ref(), clouds, secure, registry)
}
