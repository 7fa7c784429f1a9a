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

//! Asynchronous client core for the OpenStack Compute (Nova) API.
//!
//! The crate authenticates against the Identity service, resolves the
//! compute endpoint and dispatches API requests with the token attached.
//! Two dispatchers are provided:
//!
//! * [HttpClient](struct.HttpClient.html) owns the credentials and speaks
//!   the legacy Identity V1 and V2 protocols itself (or delegates to an
//!   [AuthPlugin](trait.AuthPlugin.html)),
//! * [SessionClient](struct.SessionClient.html) delegates authentication to
//!   an [AuthType](trait.AuthType.html) such as
//!   [identity::Password](identity/struct.Password.html).
//!
//! Both implement the [Dispatcher](trait.Dispatcher.html) trait and can be
//! wrapped into a versioned [Client](struct.Client.html) with
//! [new_client](fn.new_client.html).
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), osnova::Error> {
//! use osnova::Dispatcher;
//!
//! let mut client = osnova::new_client("2", osnova::from_env()?)?;
//! let servers = client.dispatcher_mut().get("/servers/detail").await?;
//! println!("{:?}", servers.body);
//! # Ok(()) }
//! ```
//!
//! A blocking wrapper is available in the [sync](sync/index.html) module.

#![crate_name = "osnova"]
#![crate_type = "lib"]
#![doc(html_root_url = "https://docs.rs/osnova/0.1.0")]
// NOTE: we do not use generic deny(warnings) to avoid breakages with new
// versions of the compiler. Add more warnings here as you discover them.
// Taken from https://github.com/rust-unofficial/patterns/
#![deny(
    improper_ctypes,
    missing_debug_implementations,
    missing_docs,
    non_shorthand_field_patterns,
    no_mangle_generic_items,
    overflowing_literals,
    path_statements,
    patterns_in_fns_without_body,
    unconditional_recursion,
    unsafe_code,
    unused_allocation,
    unused_comparisons,
    unused_doc_comments,
    unused_parens,
    while_true
)]
#![warn(
    dead_code,
    missing_copy_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unused,
    unused_import_braces,
    unused_qualifications,
    unused_results
)]
#![allow(
    clippy::new_ret_no_self,
    clippy::should_implement_trait,
    clippy::wrong_self_convention
)]

mod apiversion;
mod auth;
mod cache;
mod catalog;
mod client;
mod credentials;
mod dispatcher;
mod endpointfilters;
mod error;
mod httplog;
pub mod identity;
mod loading;
mod plugin;
mod pool;
pub mod request;
mod session;
pub mod sync;
mod url;
mod utils;
mod versions;

pub use crate::apiversion::{ApiVersion, MICROVERSION_HEADER};
pub use crate::auth::{AuthType, NoAuth};
pub use crate::cache::{CachedToken, FileTokenStore, MemoryTokenStore, TokenStore};
pub use crate::catalog::{CatalogService, Endpoint, ServiceCatalog};
pub use crate::client::{AuthSession, AuthState, HttpClient, PasswordCallback, COMPUTE, USER_AGENT};
pub use crate::credentials::Credentials;
pub use crate::dispatcher::Dispatcher;
pub use crate::endpointfilters::{EndpointFilters, InterfaceType};
pub use crate::error::{Error, ErrorKind};
pub use crate::httplog::HttpLogger;
pub use crate::loading::{from_config, from_config_with_plugins, from_env, from_env_with_plugins};
pub use crate::plugin::{AuthPlugin, AuthSystem, PluginRegistry, KEYSTONE};
pub use crate::pool::{ConnectionPool, TlsVerification, TransportConfig};
pub use crate::request::{ApiResponse, RequestOptions, Timing};
pub use crate::session::SessionClient;
pub use crate::versions::{
    check_version, construct_dispatcher, new_client, supported_versions, Client, Transport,
};
