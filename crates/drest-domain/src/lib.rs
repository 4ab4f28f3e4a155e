#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]

pub mod id;
pub mod payload;
pub mod query;
pub mod record;

pub use id::RecordId;
pub use payload::{embedded_identity, unpack, PageMeta};
pub use query::{QuerySpec, PAGE_PARAM, PER_PAGE_PARAM};
pub use record::{is_public_field, RecordState};
