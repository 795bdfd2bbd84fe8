//! A generic, dynamically-registered client for Kubernetes-style cluster APIs.
//!
//! bosun maps abstract resource kinds onto HTTP operations against a
//! versioned, namespaced API surface. Kinds are registered from plain
//! catalog data, addressed through an [`Api`] facade composing versioned
//! [`ApiGroup`]s, and queried with a typed label/field selector DSL.
//!
//! ```no_run
//! use bosun_client::{Api, ClusterConfig};
//! use bosun_client::core::params::ListParams;
//!
//! # async fn run() -> Result<(), bosun_client::Error> {
//! let config = ClusterConfig::infer()?;
//! let api = Api::new(config)?;
//!
//! let pods = api.resource("pods")?;
//! for pod in pods
//!     .within("kube-system")
//!     .match_labels([("tier", "control-plane")])
//!     .list(&ListParams::default())
//!     .await?
//! {
//!     println!("{:?}", pod.name());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! The client is mechanism, not policy: failures surface as typed errors
//! and nothing is retried internally.
#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]

pub mod api;
pub mod config;
pub mod error;
pub mod group;
pub mod resource;
pub mod transport;

pub use api::{Api, ApiOptions};
pub use config::{AuthMode, ClusterConfig, ConfigOptions, Kubeconfig};
pub use error::{ConfigError, DecodeError, Error, RegistrationError, Result, TransportError};
pub use group::{ApiGroup, ApiGroupOptions, InternalApiGroupOptions};
pub use resource::{Resource, ResourceRequest, WatchStream};
pub use transport::Transport;

/// Re-export of the client-less core crate
pub use bosun_core as core;
