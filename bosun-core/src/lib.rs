//! Client-less types and request construction for the bosun cluster API client.
//!
//! This crate carries everything that does not need a network stack:
//! selector expressions, resource catalogs, request parameter structs,
//! url/query construction, and the generic object/watch/response types.
//! The same information is re-exported from `bosun-client` under `core`.
#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]

pub mod catalog;
pub use catalog::{GroupManifest, ResourceDescriptor};

pub mod dynamic;
pub use dynamic::{DynamicObject, ObjectList};

pub mod gvk;
pub use gvk::GroupVersion;

pub mod metadata;
pub use metadata::{ListMeta, ObjectMeta, TypeMeta};

pub mod params;

pub mod request;
pub use request::Request;

pub mod response;
pub use response::{ErrorResponse, Status};

pub mod selector;
pub use selector::{Expression, Selector};

pub mod watch;
pub use watch::WatchEvent;

/// Convenient alias for `Result<T, request::Error>`
pub type Result<T, E = request::Error> = std::result::Result<T, E>;
