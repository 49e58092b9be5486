//! ACL generation for new documents and access checks on stored ones

mod common;

use common::harness;
use serde_json::Map;
use warden_rbac::{
    AccessLevel, AclEntry, AclSubject, DenialKind, DocumentDraft, FacilityId, Operation,
    Principal, ResourceContext, ResourceId, Role, StoredDocument,
};

fn tags(acl: &[AclEntry]) -> Vec<String> {
    acl.iter().map(AclEntry::tag).collect()
}

fn stored(resource: &str, facility: Option<&str>, owner: Option<&str>) -> StoredDocument {
    StoredDocument {
        id: "doc-1".to_string(),
        resource: ResourceId::parse(resource).unwrap(),
        facility_id: facility.map(FacilityId::from),
        owner_id: owner.map(str::to_string),
        acl: Vec::new(),
        fields: Map::new(),
    }
}

#[tokio::test]
async fn test_doctor_creates_patient_in_own_facility() {
    let h = harness().await;
    let doctor = h.principal("doctor-2");

    let acl = h
        .engine
        .generate_document_permissions(&doctor, "collections.patients", &DocumentDraft::new())
        .await
        .unwrap();

    assert_eq!(
        tags(&acl),
        vec![
            "read:role:administrator",
            "write:role:administrator",
            "read:team:facility-2",
            "write:role:supervisor@facility:2",
            "write:role:doctor@facility:2",
            "write:role:nurse@facility:2",
        ]
    );
}

#[tokio::test]
async fn test_write_entries_follow_minimum_role() {
    let h = harness().await;
    let doctor = h.principal("doctor-2");

    let acl = h
        .engine
        .generate_document_permissions(&doctor, "encounters", &DocumentDraft::new().in_facility("2"))
        .await
        .unwrap();

    let writers: Vec<Role> = acl
        .iter()
        .filter(|entry| entry.access == AccessLevel::Write)
        .filter_map(|entry| match &entry.subject {
            AclSubject::Role { role, .. } => Some(*role),
            AclSubject::Team { .. } => None,
        })
        .collect();
    assert_eq!(writers, vec![Role::Administrator, Role::Supervisor, Role::Doctor]);
}

#[tokio::test]
async fn test_reference_data_gets_administrator_entries_only() {
    let h = harness().await;
    let admin = h.principal("admin-1");

    let acl = h
        .engine
        .generate_document_permissions(&admin, "vaccines", &DocumentDraft::new().in_facility("1"))
        .await
        .unwrap();

    assert_eq!(
        tags(&acl),
        vec!["read:role:administrator", "write:role:administrator"]
    );
}

#[tokio::test]
async fn test_administrator_creates_in_any_facility() {
    let h = harness().await;
    let admin = h.principal("admin-1");

    let acl = h
        .engine
        .generate_document_permissions(&admin, "patients", &DocumentDraft::new().in_facility("7"))
        .await
        .unwrap();
    assert!(tags(&acl).contains(&"read:team:facility-7".to_string()));

    assert!(tags(&acl).contains(&"write:role:nurse@facility:7".to_string()));
}

#[tokio::test]
async fn test_scoped_document_needs_a_facility_even_for_administrators() {
    let h = harness().await;
    let admin = h.principal("admin-1");

    let error = h
        .engine
        .generate_document_permissions(&admin, "patients", &DocumentDraft::new())
        .await
        .unwrap_err();
    assert!(error.is_invalid_context());

    // Unscoped collections still need no facility
    let acl = h
        .engine
        .generate_document_permissions(&admin, "vaccines", &DocumentDraft::new())
        .await
        .unwrap();
    assert!(acl.iter().all(|entry| match &entry.subject {
        AclSubject::Role { facility_id, .. } => facility_id.is_none(),
        AclSubject::Team { .. } => false,
    }));
}

#[tokio::test]
async fn test_foreign_facility_is_rejected() {
    let h = harness().await;
    let doctor = h.principal("doctor-2");

    let error = h
        .engine
        .generate_document_permissions(&doctor, "patients", &DocumentDraft::new().in_facility("1"))
        .await
        .unwrap_err();

    assert!(error.is_facility_mismatch());
}

#[tokio::test]
async fn test_creation_requires_create_permission() {
    let h = harness().await;
    let nurse = h.principal("nurse-1");

    let error = h
        .engine
        .generate_document_permissions(&nurse, "patients", &DocumentDraft::new())
        .await
        .unwrap_err();

    assert!(error.is_permission_denied());
}

#[tokio::test]
async fn test_malformed_creation_requests() {
    let h = harness().await;

    let no_roles = Principal::new("x").with_facility("1");
    let error = h
        .engine
        .generate_document_permissions(&no_roles, "patients", &DocumentDraft::new())
        .await
        .unwrap_err();
    assert!(error.is_invalid_context());

    let homeless = Principal::new("doctor-9").with_role(Role::Doctor);
    let error = h
        .engine
        .generate_document_permissions(&homeless, "patients", &DocumentDraft::new())
        .await
        .unwrap_err();
    assert!(error.is_invalid_context());
}

#[tokio::test]
async fn test_document_access_uses_embedded_facility() {
    let h = harness().await;
    let doctor = h.principal("doctor-2");

    let own = stored("patients", Some("2"), None);
    let decision = h
        .engine
        .check_document_access(&doctor, &own, Operation::Read)
        .await;
    assert!(decision.allowed);

    let foreign = stored("patients", Some("1"), None);
    let decision = h
        .engine
        .check_document_access(&doctor, &foreign, Operation::Read)
        .await;
    assert_eq!(decision.denial, Some(DenialKind::FacilityRestriction));
}

#[tokio::test]
async fn test_untagged_scoped_document() {
    let h = harness().await;
    let document = stored("patients", None, None);

    let decision = h
        .engine
        .check_document_access(&h.principal("nurse-1"), &document, Operation::Read)
        .await;
    assert_eq!(decision.denial, Some(DenialKind::InvalidContext));

    let decision = h
        .engine
        .check_document_access(&h.principal("admin-1"), &document, Operation::Read)
        .await;
    assert!(decision.allowed);
}

#[tokio::test]
async fn test_document_owner_satisfies_self_only() {
    let h = harness().await;
    let user = h.principal("user-1");

    let profile = stored("users", Some("1"), Some("user-1"));
    let decision = h
        .engine
        .check_document_access(&user, &profile, Operation::Update)
        .await;
    assert!(decision.allowed);

    let other = stored("users", Some("1"), Some("nurse-1"));
    let decision = h
        .engine
        .check_document_access(&user, &other, Operation::Update)
        .await;
    assert_eq!(decision.denial, Some(DenialKind::ConditionFailed));
}

#[tokio::test]
async fn test_document_access_with_assignment() {
    let h = harness().await;
    let doctor = h.principal("doctor-2");
    let encounter = stored("encounters", Some("2"), None);

    let decision = h
        .engine
        .check_document_access(&doctor, &encounter, Operation::Update)
        .await;
    assert_eq!(decision.denial, Some(DenialKind::ConditionFailed));

    let decision = h
        .engine
        .check_document_access_with(
            &doctor,
            &encounter,
            Operation::Update,
            ResourceContext::new().with_assigned("doctor-2"),
        )
        .await;
    assert!(decision.allowed);
}
