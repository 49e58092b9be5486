//! Audit sink interface

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::InterfaceResult;
use crate::types::{FacilityId, Operation};

/// Tracing target of audit events, for log filters and routing
pub const AUDIT_TARGET: &str = "warden::audit";

/// A permission decision as recorded for compliance logging
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub principal_id: String,
    pub resource: String,
    pub operation: Operation,
    /// Facility named in the request context
    pub facility_id: Option<FacilityId>,
    pub allowed: bool,
    pub reason: String,
    /// Whether the decision was served from cache
    pub cached: bool,
    /// Configuration generation the decision was computed under
    pub generation: Option<u64>,
}

impl AuditEvent {
    pub fn new(
        principal_id: impl Into<String>,
        resource: impl Into<String>,
        operation: Operation,
        allowed: bool,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            principal_id: principal_id.into(),
            resource: resource.into(),
            operation,
            facility_id: None,
            allowed,
            reason: reason.into(),
            cached: false,
            generation: None,
        }
    }
}

/// Accepts permission-decision events
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, event: AuditEvent) -> InterfaceResult<()>;
}
