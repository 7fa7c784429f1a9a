// Copyright 2018 Dmitry Tantsur <dtantsur@protonmail.com>
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

//! Identity V2 JSON structures and protocol bits.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Header with the user name for the legacy V1 protocol.
pub const V1_USER_HEADER: &str = "X-Auth-User";
/// Header with the password (API key) for the legacy V1 protocol.
pub const V1_KEY_HEADER: &str = "X-Auth-Key";
/// Header with the project for the V1 protocol and authenticated requests.
pub const PROJECT_ID_HEADER: &str = "X-Auth-Project-Id";
/// Header with the authentication token.
pub const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";
/// Header with the management URL returned by the V1 protocol.
pub const V1_MANAGEMENT_URL_HEADER: &str = "x-server-management-url";

#[derive(Clone, Serialize)]
pub struct PasswordCredentials {
    #[serde(rename = "userId", skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Clone, Serialize)]
pub struct TokenCredentials {
    pub id: String,
}

#[derive(Clone, Debug, Serialize)]
pub enum Identity {
    #[serde(rename = "token")]
    Token(TokenCredentials),
    #[serde(rename = "passwordCredentials")]
    Password(PasswordCredentials),
}

#[derive(Clone, Debug, Serialize)]
pub struct Auth {
    #[serde(flatten)]
    pub identity: Identity,
    #[serde(rename = "tenantId", skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(rename = "tenantName", skip_serializing_if = "Option::is_none")]
    pub tenant_name: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct AuthRoot {
    pub auth: Auth,
}

#[derive(Clone, Deserialize)]
pub struct TokenInfo {
    pub id: String,
    #[serde(default)]
    pub expires: Option<String>,
    #[serde(default)]
    pub tenant: Option<TenantInfo>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TenantInfo {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct EndpointRecord {
    #[serde(default)]
    pub region: Option<String>,
    #[serde(rename = "publicURL", default)]
    pub public_url: Option<String>,
    #[serde(rename = "internalURL", default)]
    pub internal_url: Option<String>,
    #[serde(rename = "adminURL", default)]
    pub admin_url: Option<String>,
    #[serde(rename = "tenantId", default)]
    pub tenant_id: Option<String>,
    #[serde(rename = "versionId", default)]
    pub version_id: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CatalogRecord {
    #[serde(rename = "type")]
    pub service_type: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub endpoints: Vec<EndpointRecord>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Access {
    pub token: TokenInfo,
    #[serde(rename = "serviceCatalog", default)]
    pub service_catalog: Vec<CatalogRecord>,
}

/// An endpoint record as returned by the endpoints lookup of a token.
#[derive(Clone, Debug, Deserialize)]
pub struct LegacyEndpointRecord {
    #[serde(rename = "type")]
    pub service_type: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(flatten)]
    pub endpoint: EndpointRecord,
}

#[derive(Clone, Debug, Deserialize)]
pub struct EndpointsRoot {
    pub endpoints: Vec<LegacyEndpointRecord>,
}

impl AuthRoot {
    /// Create a password request body.
    pub fn with_password(
        username: Option<String>,
        user_id: Option<String>,
        password: Option<String>,
    ) -> AuthRoot {
        // The user ID takes precedence, the name is only sent without it.
        let username = if user_id.is_some() { None } else { username };
        AuthRoot {
            auth: Auth {
                identity: Identity::Password(PasswordCredentials {
                    user_id,
                    username,
                    password,
                }),
                tenant_id: None,
                tenant_name: None,
            },
        }
    }

    /// Create a token request body.
    pub fn with_token(token: String) -> AuthRoot {
        AuthRoot {
            auth: Auth {
                identity: Identity::Token(TokenCredentials { id: token }),
                tenant_id: None,
                tenant_name: None,
            },
        }
    }

    /// Scope the request to a tenant, the ID wins over the name.
    pub fn with_tenant(mut self, tenant_id: Option<String>, tenant_name: Option<String>) -> Self {
        if tenant_id.is_some() {
            self.auth.tenant_id = tenant_id;
            self.auth.tenant_name = None;
        } else {
            self.auth.tenant_id = None;
            self.auth.tenant_name = tenant_name;
        }
        self
    }
}

impl fmt::Debug for PasswordCredentials {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("PasswordCredentials")
            .field("user_id", &self.user_id)
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

impl fmt::Debug for TokenCredentials {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("TokenCredentials { id: *** }")
    }
}

impl fmt::Debug for TokenInfo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("TokenInfo")
            .field("id", &"***")
            .field("expires", &self.expires)
            .field("tenant", &self.tenant)
            .finish()
    }
}

#[cfg(test)]
pub mod test {
    use serde_json::json;

    use super::AuthRoot;

    #[test]
    fn test_password_body_with_name() {
        let body = AuthRoot::with_password(
            Some("user".into()),
            None,
            Some("secret".into()),
        )
        .with_tenant(None, Some("project".into()));
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"auth": {
                "passwordCredentials": {"username": "user", "password": "secret"},
                "tenantName": "project"
            }})
        );
    }

    #[test]
    fn test_password_body_with_ids() {
        let body = AuthRoot::with_password(
            Some("user".into()),
            Some("uid".into()),
            Some("secret".into()),
        )
        .with_tenant(Some("tid".into()), Some("project".into()));
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"auth": {
                "passwordCredentials": {"userId": "uid", "password": "secret"},
                "tenantId": "tid"
            }})
        );
    }

    #[test]
    fn test_token_body() {
        let body = AuthRoot::with_token("abcd".into());
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"auth": {"token": {"id": "abcd"}}})
        );
        assert!(!format!("{:?}", body).contains("abcd"));
    }
}
