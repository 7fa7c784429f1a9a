// Copyright 2017 Dmitry Tantsur <divius.inside@gmail.com>
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

//! Service catalog returned by the Identity service.

use chrono::{DateTime, FixedOffset};
use log::{debug, trace};
use serde_json::Value;

use super::identity::protocol::{
    Access, CatalogRecord, EndpointRecord, EndpointsRoot, TokenInfo,
};
use super::{EndpointFilters, Error, ErrorKind, InterfaceType};

/// Compute endpoint versions that this client can talk to.
const SUPPORTED_COMPUTE_VERSIONS: &[&str] = &["1.1", "2"];

/// One URL of a service endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Endpoint interface.
    pub interface: InterfaceType,
    /// Endpoint region (if any).
    pub region: Option<String>,
    /// Endpoint URL.
    pub url: String,
    /// Tenant owning the endpoint (if any).
    pub tenant_id: Option<String>,
    /// API version served by the endpoint (if any).
    pub version_id: Option<String>,
}

/// A service registered in the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogService {
    /// Service type, e.g. `compute`.
    pub service_type: String,
    /// Service name (if any).
    pub name: Option<String>,
    /// Service endpoints, one record per URL.
    pub endpoints: Vec<Endpoint>,
}

/// Service catalog and token details from an authentication response.
#[derive(Debug, Clone, Default)]
pub struct ServiceCatalog {
    token: Option<TokenInfo>,
    services: Vec<CatalogService>,
}

fn flatten(record: EndpointRecord) -> impl Iterator<Item = Endpoint> {
    let EndpointRecord {
        region,
        public_url,
        internal_url,
        admin_url,
        tenant_id,
        version_id,
    } = record;
    [
        (InterfaceType::Public, public_url),
        (InterfaceType::Internal, internal_url),
        (InterfaceType::Admin, admin_url),
    ]
    .into_iter()
    .filter_map(move |(interface, url)| {
        url.map(|url| Endpoint {
            interface,
            region: region.clone(),
            url,
            tenant_id: tenant_id.clone(),
            version_id: version_id.clone(),
        })
    })
}

impl From<CatalogRecord> for CatalogService {
    fn from(value: CatalogRecord) -> CatalogService {
        CatalogService {
            service_type: value.service_type,
            name: value.name,
            endpoints: value.endpoints.into_iter().flat_map(flatten).collect(),
        }
    }
}

fn invalid_catalog<E: std::fmt::Display>(error: E) -> Error {
    Error::new(
        ErrorKind::AuthorizationFailure,
        format!("Invalid authentication response: {}", error),
    )
}

impl ServiceCatalog {
    /// Parse a service catalog from a response body.
    ///
    /// Accepts a token response (`{"access": {...}}`) or an endpoints lookup
    /// response (`{"endpoints": [...]}`). Anything else is an authorization
    /// failure.
    pub fn from_body(body: &Value) -> Result<ServiceCatalog, Error> {
        if let Some(access) = body.get("access") {
            let access: Access =
                serde_json::from_value(access.clone()).map_err(invalid_catalog)?;
            trace!("Received catalog: {:?}", access.service_catalog);
            Ok(ServiceCatalog {
                token: Some(access.token),
                services: access
                    .service_catalog
                    .into_iter()
                    .map(From::from)
                    .collect(),
            })
        } else if body.get("endpoints").is_some() {
            let root: EndpointsRoot =
                serde_json::from_value(body.clone()).map_err(invalid_catalog)?;
            let mut services: Vec<CatalogService> = Vec::new();
            for record in root.endpoints {
                let existing = services
                    .iter_mut()
                    .find(|s| s.service_type == record.service_type && s.name == record.name);
                let endpoints = flatten(record.endpoint);
                match existing {
                    Some(service) => service.endpoints.extend(endpoints),
                    None => services.push(CatalogService {
                        service_type: record.service_type,
                        name: record.name,
                        endpoints: endpoints.collect(),
                    }),
                }
            }
            Ok(ServiceCatalog {
                token: None,
                services,
            })
        } else {
            Err(invalid_catalog("neither access nor endpoints are present"))
        }
    }

    /// Token ID (if the catalog came with a token).
    #[inline]
    pub fn token_id(&self) -> Option<&str> {
        self.token.as_ref().map(|t| t.id.as_str())
    }

    /// Tenant ID of the token (if any).
    #[inline]
    pub fn tenant_id(&self) -> Option<&str> {
        self.token
            .as_ref()
            .and_then(|t| t.tenant.as_ref())
            .map(|t| t.id.as_str())
    }

    /// Token expiration time (if known and valid).
    pub fn expires_at(&self) -> Option<DateTime<FixedOffset>> {
        let expires = self.token.as_ref()?.expires.as_ref()?;
        match DateTime::parse_from_rfc3339(expires) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!("Cannot parse token expiration time {}: {}", expires, e);
                None
            }
        }
    }

    /// Registered services.
    #[inline]
    pub fn services(&self) -> &[CatalogService] {
        &self.services
    }

    /// Find the only endpoint URL matching the service type and filters.
    ///
    /// Compute endpoints serving an unsupported `versionId` are ignored.
    pub fn url_for(&self, service_type: &str, filters: &EndpointFilters) -> Result<&str, Error> {
        let matching: Vec<&Endpoint> = self
            .services
            .iter()
            .filter(|svc| {
                svc.service_type == service_type
                    && filters.check_service(service_type, svc.name.as_deref())
            })
            .flat_map(|svc| svc.endpoints.iter())
            .filter(|endp| {
                service_type != "compute"
                    || endp
                        .version_id
                        .as_deref()
                        .map_or(true, |v| SUPPORTED_COMPUTE_VERSIONS.contains(&v))
            })
            .filter(|endp| filters.check(endp))
            .collect();

        match matching.as_slice() {
            [] => Err(Error::new_endpoint_not_found(service_type)),
            [endp] => {
                let endp: &Endpoint = *endp;
                debug!("Found {:?} for service {}", endp, service_type);
                Ok(&endp.url)
            }
            many => Err(Error::new(
                ErrorKind::AmbiguousEndpoints,
                format!(
                    "Found {} endpoints for service {}: {}",
                    many.len(),
                    service_type,
                    many.iter()
                        .map(|e| e.url.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            )),
        }
    }
}

#[cfg(test)]
pub mod test {
    use serde_json::{json, Value};

    use super::ServiceCatalog;
    use crate::{EndpointFilters, ErrorKind, InterfaceType};

    pub(crate) fn catalog_body() -> Value {
        json!({"access": {
            "token": {
                "id": "ab48a9efdfedb23ty3494",
                "expires": "2010-11-01T03:32:15-05:00",
                "tenant": {"id": "345", "name": "My Project"}
            },
            "serviceCatalog": [
                {
                    "type": "compute",
                    "name": "nova",
                    "endpoints": [
                        {
                            "region": "North",
                            "versionId": "1.0",
                            "publicURL": "https://compute1.host/v1/1234",
                            "internalURL": "https://compute1.host/v1/1234"
                        },
                        {
                            "region": "North",
                            "versionId": "1.1",
                            "publicURL": "https://compute1.host/v1.1/1234",
                            "internalURL": "https://compute1.host/v1.1/1234"
                        },
                        {
                            "region": "South",
                            "versionId": "2",
                            "publicURL": "https://compute2.host/v2/1234",
                            "internalURL": "https://compute2.host/v2/1234",
                            "adminURL": "https://compute2.admin/v2/1234"
                        }
                    ]
                },
                {
                    "type": "volume",
                    "name": "cinder",
                    "endpoints": [
                        {
                            "region": "South",
                            "publicURL": "https://volume1.host/v1/1234"
                        },
                        {
                            "region": "South",
                            "publicURL": "https://volume1.host/v1.1/1234"
                        }
                    ]
                }
            ]
        }})
    }

    #[test]
    fn test_token_details() {
        let catalog = ServiceCatalog::from_body(&catalog_body()).unwrap();
        assert_eq!(catalog.token_id(), Some("ab48a9efdfedb23ty3494"));
        assert_eq!(catalog.tenant_id(), Some("345"));
        assert!(catalog.expires_at().is_some());
        assert_eq!(catalog.services().len(), 2);
        // One endpoint record per URL.
        assert_eq!(catalog.services()[0].endpoints.len(), 7);
    }

    #[test]
    fn test_ambiguous_without_region() {
        let catalog = ServiceCatalog::from_body(&catalog_body()).unwrap();
        let filters = EndpointFilters::default().with_interface(InterfaceType::Public);
        let err = catalog.url_for("compute", &filters).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AmbiguousEndpoints);
    }

    #[test]
    fn test_region_case_insensitive() {
        let catalog = ServiceCatalog::from_body(&catalog_body()).unwrap();
        let filters = EndpointFilters::new(InterfaceType::Public, "south");
        assert_eq!(
            catalog.url_for("compute", &filters).unwrap(),
            "https://compute2.host/v2/1234"
        );
        let filters = EndpointFilters::new(InterfaceType::Admin, "South");
        assert_eq!(
            catalog.url_for("compute", &filters).unwrap(),
            "https://compute2.admin/v2/1234"
        );
    }

    #[test]
    fn test_unsupported_compute_version_ignored() {
        let catalog = ServiceCatalog::from_body(&catalog_body()).unwrap();
        let filters = EndpointFilters::new(InterfaceType::Internal, "North");
        assert_eq!(
            catalog.url_for("compute", &filters).unwrap(),
            "https://compute1.host/v1.1/1234"
        );
    }

    #[test]
    fn test_missing_interface_is_ambiguous() {
        let catalog = ServiceCatalog::from_body(&catalog_body()).unwrap();
        let filters = EndpointFilters::default().with_region("South");
        let err = catalog.url_for("compute", &filters).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AmbiguousEndpoints);
    }

    #[test]
    fn test_not_found() {
        let catalog = ServiceCatalog::from_body(&catalog_body()).unwrap();
        let filters = EndpointFilters::new(InterfaceType::Public, "North");
        let err = catalog.url_for("volume", &filters).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EndpointNotFound);
        let err = catalog.url_for("image", &Default::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EndpointNotFound);
    }

    #[test]
    fn test_service_name_filters() {
        let catalog = ServiceCatalog::from_body(&catalog_body()).unwrap();
        let filters = EndpointFilters::new(InterfaceType::Public, "South")
            .with_service_name("other");
        let err = catalog.url_for("compute", &filters).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EndpointNotFound);
        let filters = EndpointFilters::new(InterfaceType::Public, "South")
            .with_volume_service_name("cinder");
        let err = catalog.url_for("volume", &filters).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AmbiguousEndpoints);
    }

    #[test]
    fn test_endpoints_lookup_body() {
        let body = json!({"endpoints": [
            {"type": "compute", "name": "nova", "region": "RegionOne",
             "publicURL": "http://nova.example.com/v2/1", "tenantId": "1"},
            {"type": "compute", "name": "nova", "region": "RegionTwo",
             "publicURL": "http://nova2.example.com/v2/1", "tenantId": "1"}
        ]});
        let catalog = ServiceCatalog::from_body(&body).unwrap();
        assert!(catalog.token_id().is_none());
        assert_eq!(catalog.services().len(), 1);
        let filters = EndpointFilters::new(InterfaceType::Public, "RegionTwo");
        assert_eq!(
            catalog.url_for("compute", &filters).unwrap(),
            "http://nova2.example.com/v2/1"
        );
    }

    #[test]
    fn test_invalid_body() {
        let err = ServiceCatalog::from_body(&json!({"hi": "there"})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AuthorizationFailure);
        let err = ServiceCatalog::from_body(&json!({"access": {"serviceCatalog": []}})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AuthorizationFailure);
    }
}
