//! Hierarchical, facility-scoped authorization for Warden
//!
//! This crate decides what a principal may do and enforces it at the document
//! ACL and query boundaries:
//! - Role hierarchy and rule table built from validated, hot-reloadable configuration
//! - Facility (tenant) isolation with administrator bypass
//! - Named condition predicates validated at load time
//! - TTL-bounded decision cache with eager invalidation
//! - ACL generation for new documents and facility-filtered secure queries

pub mod audit;
pub mod cache;
pub mod conditions;
pub mod config;
pub mod documents;
pub mod enforcer;
pub mod error;
pub mod memory;
pub mod models;
pub mod permissions;
pub mod query;
pub mod roles;
pub mod tenant;
pub mod watcher;

pub use audit::{AuditDispatcher, TracingAuditSink};
pub use cache::{DecisionKey, PermissionCache};
pub use conditions::{Condition, ConditionRegistry};
pub use config::{ConfigurationLoader, SecuritySnapshot};
pub use documents::DocumentSecurityGenerator;
pub use enforcer::{AuthorizationEngine, AuthorizationEngineBuilder};
pub use error::{RbacError, RbacResult};
pub use memory::{InMemoryDataSource, InMemoryIdentityStore, RecordingAuditSink};
pub use models::{
    AccessScope, CollectionSecurity, DenialKind, FieldRule, PermissionDecision, ResourceContext,
    RoleAssignment, RoleSpec,
};
pub use permissions::{CheckOutcome, PermissionValidator};
pub use query::{QueryRequest, SecureQuery, SecureQueryBuilder};
pub use roles::RoleHierarchy;
pub use tenant::{FacilityAccess, FacilityScopeResolver};
pub use watcher::ConfigWatcher;

/// Re-export commonly used types
pub use warden_caching::CacheStats;
pub use warden_interfaces::{
    AccessLevel, AclEntry, AclSubject, DocumentDraft, FacilityId, Operation, Principal,
    ResourceId, Role, StoredDocument, AUDIT_TARGET,
};
