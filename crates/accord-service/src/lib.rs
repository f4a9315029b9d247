//! Consensus-authorized operations on Accord resources.
//!
//! This crate provides:
//! - The `{data, info, by_consensus}` request envelope
//! - One handler per resource operation (peer, negotiation, contribution,
//!   endpoint create/update, message), each split into validate, authorize
//!   and apply
//! - The [`Service`] facade that runs a handler inside a single store
//!   transaction, plus the mandatory-filter listing operations
//!
//! ## Quick Start
//!
//! ```rust
//! use accord_service::{Caller, Service, ServiceConfig};
//! use accord_store::MemoryStore;
//! use serde_json::json;
//!
//! let service = Service::new(MemoryStore::new(), ServiceConfig::default())?;
//! let negotiation = service.create_negotiation(
//!     &Caller::new("alice"),
//!     json!({"data": {}, "info": {"operation": "create", "resource": "negotiation"}}),
//! )?;
//! assert!(negotiation.is_open());
//! # Ok::<(), accord_core::CoreError>(())
//! ```

#![deny(missing_docs)]

/// Service settings.
pub mod config;
/// Request envelope and caller identity.
pub mod envelope;
/// Per-resource handlers.
pub mod handlers;
/// Transactional facade.
pub mod service;

pub use config::ServiceConfig;
pub use envelope::{negotiation_ref, ByConsensus, Caller, Info, Request, STRUCTURAL};
pub use handlers::{Context, Handler};
pub use service::Service;
