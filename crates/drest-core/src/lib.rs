//! Blocking client for APIs served by dynamic-rest (DREST).
//!
//! A [`DrestClient`] hands out [`Resource`]s by name. Resources start
//! [`Query`]s (filtering, field selection, ordering, automatic pagination) and
//! produce [`Record`]s that track their own changes.
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::module_name_repetitions
)]

mod auth;
mod client;
mod config;
mod error;
mod net;
mod query;
mod record;
mod resource;
mod transport;

#[cfg(test)]
mod testing;

pub use crate::client::{ClientBuilder, DrestClient, Mocks};
pub use crate::config::{
    Authentication, ClientConfig, DEFAULT_COOKIE_NAME, DEFAULT_LOGIN_ENDPOINT, DEFAULT_SCHEME,
    DEFAULT_TIMEOUT, DEFAULT_TOKEN_TYPE,
};
pub use crate::error::{DrestError, Result};
pub use crate::query::{Query, QueryIter};
pub use crate::record::Record;
pub use crate::resource::Resource;
pub use crate::transport::{
    HttpRequest, HttpResponse, Method, RequestBody, ReqwestTransport, Transport,
};
pub use drest_domain::{PageMeta, QuerySpec, RecordId};
