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

//! Endpoint filters for looking up endpoints.

use std::fmt;
use std::str::FromStr;

use super::catalog::Endpoint;
use super::{Error, ErrorKind};

/// Interface type: public, internal or admin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum InterfaceType {
    /// Public interface (used by default).
    #[default]
    Public,
    /// Internal interface.
    Internal,
    /// Administrator interface.
    Admin,
}

/// Endpoint filters for looking up endpoints.
///
/// Unset filters match everything. Note that an endpoint record in the
/// catalog lists one URL per interface, so leaving `interface` unset usually
/// makes the lookup ambiguous.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub struct EndpointFilters {
    /// Endpoint interface.
    pub interface: Option<InterfaceType>,
    /// Cloud region, compared case-insensitively.
    pub region: Option<String>,
    /// Tenant owning the endpoint.
    pub tenant_id: Option<String>,
    /// Name of the compute service to use when several are registered.
    pub service_name: Option<String>,
    /// Name of the volume service to use when several are registered.
    pub volume_service_name: Option<String>,
}

impl InterfaceType {
    /// Key of this interface in a version 2 catalog endpoint record.
    pub fn catalog_key(self) -> &'static str {
        match self {
            InterfaceType::Public => "publicURL",
            InterfaceType::Internal => "internalURL",
            InterfaceType::Admin => "adminURL",
        }
    }
}

impl fmt::Display for InterfaceType {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        f.write_str(match self {
            InterfaceType::Public => "public",
            InterfaceType::Internal => "internal",
            InterfaceType::Admin => "admin",
        })
    }
}

impl FromStr for InterfaceType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" | "publicURL" => Ok(InterfaceType::Public),
            "internal" | "internalURL" => Ok(InterfaceType::Internal),
            "admin" | "adminURL" => Ok(InterfaceType::Admin),
            other => Err(Error::new(
                ErrorKind::InvalidInput,
                format!("Unknown interface type: {}", other),
            )),
        }
    }
}

impl EndpointFilters {
    /// Create filters with an interface and a region.
    ///
    /// Hint: use `default` to create empty filters (and `with_*` methods to populate it).
    pub fn new<S>(interface: InterfaceType, region: S) -> EndpointFilters
    where
        S: Into<String>,
    {
        EndpointFilters {
            interface: Some(interface),
            region: Some(region.into()),
            ..EndpointFilters::default()
        }
    }

    /// Whether the interface, region and tenant filters match the provided endpoint.
    ///
    /// Service name filters apply to services, not endpoints, see `check_service`.
    pub fn check(&self, endpoint: &Endpoint) -> bool {
        if let Some(interface) = self.interface {
            if endpoint.interface != interface {
                return false;
            }
        }

        if let Some(ref region) = self.region {
            match endpoint.region {
                Some(ref value) if value.eq_ignore_ascii_case(region) => {}
                _ => return false,
            }
        }

        if let Some(ref tenant_id) = self.tenant_id {
            if endpoint.tenant_id.as_ref() != Some(tenant_id) {
                return false;
            }
        }

        true
    }

    /// Whether the service name filters match a service of the given type and name.
    pub fn check_service(&self, service_type: &str, name: Option<&str>) -> bool {
        let expected = match service_type {
            "compute" => self.service_name.as_deref(),
            "volume" => self.volume_service_name.as_deref(),
            _ => None,
        };
        match expected {
            Some(expected) => name == Some(expected),
            None => true,
        }
    }

    /// Fill in the missing values from another filters object.
    pub fn with_defaults(mut self, other: &EndpointFilters) -> EndpointFilters {
        if self.interface.is_none() {
            self.interface = other.interface;
        }
        if self.region.is_none() {
            self.region.clone_from(&other.region);
        }
        if self.tenant_id.is_none() {
            self.tenant_id.clone_from(&other.tenant_id);
        }
        if self.service_name.is_none() {
            self.service_name.clone_from(&other.service_name);
        }
        if self.volume_service_name.is_none() {
            self.volume_service_name
                .clone_from(&other.volume_service_name);
        }
        self
    }

    /// Set interface.
    #[inline]
    pub fn set_interface(&mut self, value: InterfaceType) {
        self.interface = Some(value);
    }

    /// Set region.
    #[inline]
    pub fn set_region<T: Into<String>>(&mut self, value: T) {
        self.region = Some(value.into());
    }

    /// Add an interface.
    #[inline]
    pub fn with_interface(mut self, value: InterfaceType) -> Self {
        self.set_interface(value);
        self
    }

    /// Add a region.
    #[inline]
    pub fn with_region<T: Into<String>>(mut self, value: T) -> Self {
        self.set_region(value);
        self
    }

    /// Add a tenant ID.
    #[inline]
    pub fn with_tenant_id<T: Into<String>>(mut self, value: T) -> Self {
        self.tenant_id = Some(value.into());
        self
    }

    /// Add a compute service name.
    #[inline]
    pub fn with_service_name<T: Into<String>>(mut self, value: T) -> Self {
        self.service_name = Some(value.into());
        self
    }

    /// Add a volume service name.
    #[inline]
    pub fn with_volume_service_name<T: Into<String>>(mut self, value: T) -> Self {
        self.volume_service_name = Some(value.into());
        self
    }
}
