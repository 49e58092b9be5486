//! Forwarding of permission decisions to the audit sink

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use warden_config::AuditConfig;
use warden_interfaces::{AuditEvent, AuditSink, InterfaceResult, AUDIT_TARGET};

/// Sends decision events to the configured sink
///
/// Sink failures are logged and never change a decision.
#[derive(Clone)]
pub struct AuditDispatcher {
    sink: Arc<dyn AuditSink>,
}

impl AuditDispatcher {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }

    pub async fn dispatch(&self, config: &AuditConfig, event: AuditEvent) {
        if !config.should_record(event.allowed, event.cached) {
            return;
        }

        let event_id = event.id;
        if let Err(e) = self.sink.record(event).await {
            warn!(%event_id, "Failed to record audit event: {}", e);
        }
    }
}

/// Audit sink that writes events to the tracing subscriber
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, event: AuditEvent) -> InterfaceResult<()> {
        info!(
            target: AUDIT_TARGET,
            event_id = %event.id,
            principal_id = %event.principal_id,
            resource = %event.resource,
            operation = %event.operation,
            facility_id = event.facility_id.as_ref().map(|f| f.as_str()),
            allowed = event.allowed,
            reason = %event.reason,
            cached = event.cached,
            generation = event.generation,
            "permission decision"
        );
        Ok(())
    }
}
