//! Decision caching, reload freshness and role assignment

mod common;

use common::{harness, harness_with, Harness};
use std::sync::Arc;
use std::time::Duration;

use warden_config::{StaticConfigSource, WardenConfig};
use warden_rbac::{
    AuthorizationEngine, DenialKind, FacilityId, Operation, Principal, RbacError, ResourceContext,
    Role,
};

async fn nurse_reads_patients(h: &Harness) -> bool {
    h.engine
        .check_permission(
            "nurse-1",
            "patients",
            Operation::Read,
            &ResourceContext::new().for_facility("1"),
        )
        .await
        .unwrap()
        .allowed
}

#[tokio::test]
async fn test_repeated_checks_hit_cache() {
    let h = harness().await;

    assert!(nurse_reads_patients(&h).await);
    assert!(nurse_reads_patients(&h).await);
    assert!(nurse_reads_patients(&h).await);

    assert_eq!(h.engine.evaluation_count(), 1);

    let stats = h.engine.cache_stats().await.unwrap();
    assert_eq!(stats.hits, 2);
    assert_eq!(stats.entry_count, 1);
}

#[tokio::test]
async fn test_different_context_is_a_different_entry() {
    let h = harness().await;

    let context = ResourceContext::new().for_facility("1");
    let assigned = context.clone().with_assigned("nurse-1");
    for context in [&context, &assigned] {
        h.engine
            .check_permission("nurse-1", "encounters", Operation::Read, context)
            .await
            .unwrap();
    }

    assert_eq!(h.engine.evaluation_count(), 2);
}

#[tokio::test]
async fn test_structural_denials_are_not_cached() {
    let h = harness().await;

    for _ in 0..2 {
        let decision = h
            .engine
            .check_permission("nurse-1", "invoices", Operation::Read, &ResourceContext::new())
            .await
            .unwrap();
        assert_eq!(decision.denial, Some(DenialKind::UnknownResource));
    }

    assert_eq!(h.engine.evaluation_count(), 2);
    assert_eq!(h.engine.cache_stats().await.unwrap().entry_count, 0);
}

#[tokio::test]
async fn test_reload_applies_new_rules_immediately() {
    let h = harness().await;
    assert!(nurse_reads_patients(&h).await);
    assert_eq!(h.engine.generation(), 1);

    let mut config = WardenConfig::default();
    config
        .security
        .roles
        .get_mut(&Role::Nurse)
        .unwrap()
        .permissions
        .retain(|grant| grant.resource != "patients");
    h.serve(&config);

    // Nothing changes until the reload
    assert!(nurse_reads_patients(&h).await);

    assert_eq!(h.engine.reload_all().await.unwrap(), 2);
    assert!(!nurse_reads_patients(&h).await);

    let decision = h
        .engine
        .check_permission(
            "nurse-1",
            "patients",
            Operation::Read,
            &ResourceContext::new().for_facility("1"),
        )
        .await
        .unwrap();
    assert_eq!(decision.denial, Some(DenialKind::NoMatchingRule));
}

#[tokio::test]
async fn test_failed_reload_keeps_previous_configuration() {
    let h = harness().await;
    assert!(nurse_reads_patients(&h).await);

    h.source
        .replace_content("cache:\n  ttl: 0\n");

    let error = h.engine.reload_all().await.unwrap_err();
    assert!(error.is_configuration());
    assert_eq!(h.engine.generation(), 1);
    assert!(h.engine.validate().await.is_err());

    assert!(nurse_reads_patients(&h).await);
}

#[tokio::test]
async fn test_assign_role_invalidates_target() {
    let h = harness().await;
    let supervisor = h.principal("supervisor-1");
    let context = ResourceContext::new().for_facility("1");

    let before = h
        .engine
        .check_permission("user-1", "encounters", Operation::Create, &context)
        .await
        .unwrap();
    assert!(!before.allowed);

    let assignment = h
        .engine
        .assign_role(&supervisor, "user-1", Role::Nurse, Some(FacilityId::new("1")))
        .await
        .unwrap();
    assert_eq!(assignment.principal_id, "user-1");
    assert_eq!(assignment.role, Role::Nurse);
    assert_eq!(assignment.assigned_by, "supervisor-1");

    let after = h
        .engine
        .check_permission("user-1", "encounters", Operation::Create, &context)
        .await
        .unwrap();
    assert!(after.allowed);
    assert!(h.principal("user-1").has_role(Role::Nurse));
}

#[tokio::test]
async fn test_assign_role_rejections() {
    let h = harness().await;
    let supervisor = h.principal("supervisor-1");
    let doctor = h.principal("doctor-2");
    let admin = h.principal("admin-1");

    // Equal rank is not enough
    let error = h
        .engine
        .assign_role(&supervisor, "user-1", Role::Supervisor, Some(FacilityId::new("1")))
        .await
        .unwrap_err();
    assert!(error.is_permission_denied());

    // No manage_users
    let error = h
        .engine
        .assign_role(&doctor, "user-1", Role::Nurse, Some(FacilityId::new("2")))
        .await
        .unwrap_err();
    assert!(error.is_permission_denied());

    // Facility-scoped role without a facility
    let error = h
        .engine
        .assign_role(&supervisor, "user-1", Role::Nurse, None)
        .await
        .unwrap_err();
    assert!(error.is_invalid_context());

    // Outside the actor's facilities
    let error = h
        .engine
        .assign_role(&supervisor, "user-1", Role::Nurse, Some(FacilityId::new("2")))
        .await
        .unwrap_err();
    assert!(error.is_facility_mismatch());

    // Nobody outranks the administrator
    let error = h
        .engine
        .assign_role(&admin, "user-1", Role::Administrator, None)
        .await
        .unwrap_err();
    assert!(error.is_permission_denied());

    // Administrators assign anywhere
    h.engine
        .assign_role(&admin, "doctor-2", Role::Supervisor, Some(FacilityId::new("2")))
        .await
        .unwrap();

    // Unknown target
    let error = h
        .engine
        .assign_role(&admin, "ghost", Role::User, Some(FacilityId::new("1")))
        .await
        .unwrap_err();
    assert!(matches!(error, RbacError::Interface(_)));
}

#[tokio::test]
async fn test_explicit_invalidation() {
    let h = harness().await;
    let context = ResourceContext::new().for_facility("1");

    assert!(nurse_reads_patients(&h).await);
    h.engine
        .check_permission("user-1", "patients", Operation::Read, &context)
        .await
        .unwrap();

    assert_eq!(h.engine.invalidate("nurse-1").await.unwrap(), 1);
    assert_eq!(h.engine.invalidate("nurse-1").await.unwrap(), 0);
    assert_eq!(h.engine.cache_stats().await.unwrap().entry_count, 1);

    h.engine.clear_cache().await.unwrap();
    assert_eq!(h.engine.cache_stats().await.unwrap().entry_count, 0);

    assert!(nurse_reads_patients(&h).await);
    assert_eq!(h.engine.evaluation_count(), 3);
}

#[tokio::test]
async fn test_disabled_cache_evaluates_every_time() {
    let h = harness_with(StaticConfigSource::yaml("cache:\n  enabled: false\n")).await;

    assert!(nurse_reads_patients(&h).await);
    assert!(nurse_reads_patients(&h).await);

    assert_eq!(h.engine.evaluation_count(), 2);
    assert_eq!(h.engine.invalidate("nurse-1").await.unwrap(), 0);
}

#[tokio::test]
async fn test_moka_backend() {
    let h = harness_with(StaticConfigSource::yaml(
        "cache:\n  backend: moka\n  max_entries: 100\n",
    ))
    .await;

    assert!(nurse_reads_patients(&h).await);
    assert!(nurse_reads_patients(&h).await);
    assert_eq!(h.engine.evaluation_count(), 1);
}

#[tokio::test]
async fn test_expired_decision_is_evaluated_again() {
    let h = harness_with(StaticConfigSource::yaml("cache:\n  ttl: 1\n")).await;

    assert!(nurse_reads_patients(&h).await);
    assert!(nurse_reads_patients(&h).await);
    assert_eq!(h.engine.evaluation_count(), 1);

    tokio::time::sleep(Duration::from_millis(1200)).await;

    assert!(nurse_reads_patients(&h).await);
    assert_eq!(h.engine.evaluation_count(), 2);
}

#[tokio::test]
async fn test_reload_applies_new_cache_settings() {
    let h = harness_with(StaticConfigSource::yaml("cache:\n  ttl: 300\n")).await;

    assert!(nurse_reads_patients(&h).await);
    assert!(nurse_reads_patients(&h).await);
    assert_eq!(h.engine.evaluation_count(), 1);

    h.source.replace_content("cache:\n  enabled: false\n");
    h.engine.reload_all().await.unwrap();
    assert_eq!(h.engine.get_configuration("cache").unwrap()["enabled"], false);

    assert!(nurse_reads_patients(&h).await);
    assert!(nurse_reads_patients(&h).await);
    assert_eq!(h.engine.evaluation_count(), 3);
    assert_eq!(h.engine.cache_stats().await.unwrap().entry_count, 0);

    // Turning it back on caches again
    h.source.replace_content("cache:\n  ttl: 60\n  backend: moka\n");
    h.engine.reload_all().await.unwrap();

    assert!(nurse_reads_patients(&h).await);
    assert!(nurse_reads_patients(&h).await);
    assert_eq!(h.engine.evaluation_count(), 4);

    h.engine.shutdown().await;
}

#[tokio::test]
async fn test_initial_load_failure() {
    let source = Arc::new(StaticConfigSource::yaml("cache:\n  ttl: 0\n"));

    let result = AuthorizationEngine::builder()
        .with_config_source(source.clone())
        .build()
        .await;
    assert!(result.is_err());

    let engine = AuthorizationEngine::builder()
        .with_config_source(source.clone())
        .lenient_start()
        .build()
        .await
        .unwrap();
    assert!(!engine.is_ready());

    let nurse = Principal::new("nurse-1").with_role(Role::Nurse).with_facility("1");
    let decision = engine
        .check_principal_permission(&nurse, "patients", Operation::Read, &ResourceContext::new())
        .await;
    assert_eq!(decision.denial, Some(DenialKind::ConfigurationUnavailable));

    source.replace_content(common::BASE_CONFIG);
    assert_eq!(engine.reload_all().await.unwrap(), 1);
    assert!(engine.is_ready());

    let decision = engine
        .check_principal_permission(&nurse, "patients", Operation::Read, &ResourceContext::new())
        .await;
    assert!(decision.allowed);

    engine.shutdown().await;
}

#[tokio::test]
async fn test_missing_source() {
    let error = AuthorizationEngine::builder().build().await.err().unwrap();
    assert!(error.is_configuration());
}

#[tokio::test]
async fn test_shutdown_is_idempotent() {
    let h = harness().await;
    h.engine.shutdown().await;
    h.engine.shutdown().await;

    // Checks keep working after background maintenance stopped
    assert!(nurse_reads_patients(&h).await);
}
