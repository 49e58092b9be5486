//! # Warden Interfaces
//!
//! Core vocabulary and collaborator interfaces for the Warden authorization engine.
//!
//! The engine itself never talks to a database, an identity provider or an audit
//! backend directly. Everything it consumes from the outside world is described here
//! as a trait so deployments can inject their own implementations.
//!
//! ## Main Interfaces
//!
//! - [`IdentityStore`] - resolves principals and persists role assignments
//! - [`ConfigSource`] - provides raw role/permission/security definitions
//! - [`DataSource`] - executes queries built by the secure query builder
//! - [`AuditSink`] - receives permission decision events

pub mod audit;
pub mod data;
pub mod document;
pub mod error;
pub mod identity;
pub mod source;
pub mod types;

// Re-export commonly used types
pub use audit::{AuditEvent, AuditSink, AUDIT_TARGET};
pub use data::{DataSource, FilterClause, FilterCondition, Page, Pagination, QueryDescriptor};
pub use document::{AccessLevel, AclEntry, AclSubject, DocumentDraft, StoredDocument};
pub use error::{InterfaceError, InterfaceResult};
pub use identity::{IdentityStore, Principal};
pub use source::{ConfigDocument, ConfigFormat, ConfigSource};
pub use types::{FacilityId, Operation, ParseEnumError, ResourceId, Role};
