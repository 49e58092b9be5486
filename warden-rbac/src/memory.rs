//! In-memory collaborator implementations for embedding and tests

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value as JsonValue;
use std::collections::HashMap;

use warden_interfaces::{
    AuditEvent, AuditSink, DataSource, FacilityId, IdentityStore, InterfaceError, InterfaceResult,
    Page, Principal, QueryDescriptor, ResourceId, Role,
};

/// Identity store backed by a map
#[derive(Debug, Default)]
pub struct InMemoryIdentityStore {
    principals: RwLock<HashMap<String, Principal>>,
}

impl InMemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_principals(principals: impl IntoIterator<Item = Principal>) -> Self {
        let store = Self::new();
        for principal in principals {
            store.insert(principal);
        }
        store
    }

    /// Insert or replace a principal
    pub fn insert(&self, principal: Principal) {
        self.principals.write().insert(principal.id.clone(), principal);
    }

    pub fn get(&self, principal_id: &str) -> Option<Principal> {
        self.principals.read().get(principal_id).cloned()
    }
}

#[async_trait]
impl IdentityStore for InMemoryIdentityStore {
    async fn find_principal(&self, principal_id: &str) -> InterfaceResult<Option<Principal>> {
        Ok(self.get(principal_id))
    }

    async fn assign_role(
        &self,
        principal_id: &str,
        role: Role,
        facility_id: Option<&FacilityId>,
    ) -> InterfaceResult<Principal> {
        let mut principals = self.principals.write();
        let principal = principals
            .get_mut(principal_id)
            .ok_or_else(|| InterfaceError::not_found("principal", principal_id))?;

        if !principal.has_role(role) {
            principal.roles.push(role);
        }
        if let Some(facility_id) = facility_id {
            if !principal.belongs_to(facility_id) {
                principal.facility_ids.push(facility_id.clone());
            }
        }

        Ok(principal.clone())
    }
}

/// Data source holding JSON records per resource
#[derive(Debug, Default)]
pub struct InMemoryDataSource {
    records: RwLock<HashMap<ResourceId, Vec<JsonValue>>>,
}

impl InMemoryDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, resource: ResourceId, record: JsonValue) {
        self.records.write().entry(resource).or_default().push(record);
    }
}

#[async_trait]
impl DataSource for InMemoryDataSource {
    async fn execute(&self, query: &QueryDescriptor) -> InterfaceResult<Page> {
        let records = self.records.read();
        let matching: Vec<&JsonValue> = records
            .get(&query.resource)
            .map(|records| records.iter().filter(|record| query.matches(record)).collect())
            .unwrap_or_default();

        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(query.pagination.offset as usize)
            .take(query.pagination.limit as usize)
            .map(|record| {
                let mut record = record.clone();
                if let JsonValue::Object(fields) = &mut record {
                    for field in &query.excluded_fields {
                        fields.remove(field);
                    }
                }
                record
            })
            .collect();

        Ok(Page {
            items,
            total,
            limit: query.pagination.limit,
            offset: query.pagination.offset,
        })
    }
}

/// Audit sink that keeps every event in memory
#[derive(Debug, Default)]
pub struct RecordingAuditSink {
    events: RwLock<Vec<AuditEvent>>,
}

impl RecordingAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.read().clone()
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }
}

#[async_trait]
impl AuditSink for RecordingAuditSink {
    async fn record(&self, event: AuditEvent) -> InterfaceResult<()> {
        self.events.write().push(event);
        Ok(())
    }
}
