//! Shared fixtures for the engine integration tests

#![allow(dead_code)]

use std::sync::Arc;

use warden_config::{ConfigLoader, StaticConfigSource, WardenConfig};
use warden_interfaces::ConfigDocument;
use warden_rbac::{
    AuthorizationEngine, InMemoryIdentityStore, Principal, RecordingAuditSink, Role,
};

/// Minimal document: every section falls back to its defaults
pub const BASE_CONFIG: &str = "logging:\n  level: debug\n";

/// Environment prefix nobody sets, so overrides never leak into tests
pub const TEST_ENV_PREFIX: &str = "WARDEN_RBAC_IT";

pub struct Harness {
    pub engine: AuthorizationEngine,
    pub source: Arc<StaticConfigSource>,
    pub identity: Arc<InMemoryIdentityStore>,
    pub audit: Arc<RecordingAuditSink>,
}

impl Harness {
    /// Replace the configuration served by the source
    pub fn serve(&self, config: &WardenConfig) {
        self.source.replace(ConfigDocument::json(
            "static",
            serde_json::to_string(config).unwrap(),
        ));
    }

    pub fn principal(&self, id: &str) -> Principal {
        self.identity.get(id).unwrap()
    }
}

pub fn admin() -> Principal {
    Principal::new("admin-1").with_role(Role::Administrator)
}

pub fn supervisor() -> Principal {
    Principal::new("supervisor-1")
        .with_role(Role::Supervisor)
        .with_facility("1")
}

pub fn doctor() -> Principal {
    Principal::new("doctor-2").with_role(Role::Doctor).with_facility("2")
}

pub fn nurse() -> Principal {
    Principal::new("nurse-1").with_role(Role::Nurse).with_facility("1")
}

pub fn user() -> Principal {
    Principal::new("user-1").with_role(Role::User).with_facility("1")
}

pub async fn harness() -> Harness {
    harness_with(StaticConfigSource::yaml(BASE_CONFIG)).await
}

pub async fn harness_with(source: StaticConfigSource) -> Harness {
    let source = Arc::new(source);
    let identity = Arc::new(InMemoryIdentityStore::with_principals([
        admin(),
        supervisor(),
        doctor(),
        nurse(),
        user(),
    ]));
    let audit = Arc::new(RecordingAuditSink::new());

    let engine = AuthorizationEngine::builder()
        .with_config_source(source.clone())
        .with_config_loader(ConfigLoader::with_prefix(TEST_ENV_PREFIX))
        .with_identity_store(identity.clone())
        .with_audit_sink(audit.clone())
        .build()
        .await
        .unwrap();

    Harness {
        engine,
        source,
        identity,
        audit,
    }
}
