//! Permission decision engine

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use warden_interfaces::{Operation, Principal, ResourceId, Role};

use crate::cache::{DecisionKey, PermissionCache};
use crate::config::{ConfigurationLoader, SecuritySnapshot};
use crate::models::{AccessScope, DenialKind, PermissionDecision, ResourceContext, RoleGrant};

/// A decision together with how it was produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOutcome {
    pub decision: PermissionDecision,
    /// Served from the decision cache
    pub cached: bool,
    /// Configuration generation, absent when no configuration was loaded
    pub generation: Option<u64>,
}

impl CheckOutcome {
    pub(crate) fn uncached(decision: PermissionDecision, generation: Option<u64>) -> Self {
        Self {
            decision,
            cached: false,
            generation,
        }
    }
}

/// Validates principals' operations against the current configuration snapshot
///
/// Checks never fail: every structural problem turns into a denial.
pub struct PermissionValidator {
    loader: Arc<ConfigurationLoader>,
    cache: RwLock<PermissionCache>,
    evaluations: AtomicU64,
}

impl PermissionValidator {
    pub fn new(loader: Arc<ConfigurationLoader>, cache: PermissionCache) -> Self {
        Self {
            loader,
            cache: RwLock::new(cache),
            evaluations: AtomicU64::new(0),
        }
    }

    /// Handle to the decision cache currently in service
    pub fn cache(&self) -> PermissionCache {
        self.cache.read().clone()
    }

    /// Put a new decision cache in service, returning the previous one
    pub fn replace_cache(&self, cache: PermissionCache) -> PermissionCache {
        std::mem::replace(&mut *self.cache.write(), cache)
    }

    /// Number of checks that ran full rule evaluation
    pub fn evaluation_count(&self) -> u64 {
        self.evaluations.load(Ordering::Relaxed)
    }

    /// Check an operation on a resource given as a string (`patients` or
    /// `collections.patients`)
    pub async fn check(
        &self,
        principal: &Principal,
        resource: &str,
        operation: Operation,
        context: &ResourceContext,
    ) -> CheckOutcome {
        match ResourceId::parse(resource) {
            Ok(resource) => self.check_resource(principal, &resource, operation, context).await,
            Err(e) => {
                debug!(principal_id = %principal.id, error = %e, "Rejected malformed resource");
                CheckOutcome::uncached(
                    PermissionDecision::deny(DenialKind::InvalidContext),
                    self.loader.current().map(|snapshot| snapshot.generation),
                )
            }
        }
    }

    pub async fn check_resource(
        &self,
        principal: &Principal,
        resource: &ResourceId,
        operation: Operation,
        context: &ResourceContext,
    ) -> CheckOutcome {
        let Some(snapshot) = self.loader.current() else {
            warn!(
                principal_id = %principal.id,
                resource = %resource,
                "Denying check: no authorization configuration loaded"
            );
            return CheckOutcome::uncached(
                PermissionDecision::deny(DenialKind::ConfigurationUnavailable),
                None,
            );
        };

        if !principal.is_well_formed() {
            return CheckOutcome::uncached(
                PermissionDecision::deny(DenialKind::InvalidContext),
                Some(snapshot.generation),
            );
        }

        let key = DecisionKey {
            principal_id: principal.id.clone(),
            resource: resource.clone(),
            operation,
            facility_id: context.facility_id.clone(),
            fingerprint: context.fingerprint(principal),
        };

        let cache = self.cache();
        match cache.lookup(&key, snapshot.generation).await {
            Ok(Some(decision)) => {
                return CheckOutcome {
                    decision,
                    cached: true,
                    generation: Some(snapshot.generation),
                };
            }
            Ok(None) => {}
            Err(e) => warn!("Discarding cached decision: {}", e),
        }

        let decision = self.evaluate(&snapshot, principal, resource, operation, context);

        debug!(
            principal_id = %principal.id,
            resource = %resource,
            operation = %operation,
            allowed = decision.allowed,
            reason = %decision.reason,
            "Permission evaluated"
        );

        if decision.is_cacheable() {
            if let Err(e) = cache.put(key, decision.clone(), snapshot.generation).await {
                warn!("Failed to cache decision: {}", e);
            }
        }

        CheckOutcome::uncached(decision, Some(snapshot.generation))
    }

    /// Convenience wrapper returning only the decision
    pub async fn check_permission(
        &self,
        principal: &Principal,
        resource: &str,
        operation: Operation,
        context: &ResourceContext,
    ) -> PermissionDecision {
        self.check(principal, resource, operation, context).await.decision
    }

    /// Full rule evaluation against one snapshot
    pub fn evaluate(
        &self,
        snapshot: &SecuritySnapshot,
        principal: &Principal,
        resource: &ResourceId,
        operation: Operation,
        context: &ResourceContext,
    ) -> PermissionDecision {
        self.evaluations.fetch_add(1, Ordering::Relaxed);

        let ranked = snapshot.hierarchy.rank_principal_roles(principal);
        if ranked.len() < principal.roles.len() {
            warn!(
                principal_id = %principal.id,
                generation = snapshot.generation,
                "Principal holds roles missing from the configuration"
            );
        }
        if ranked.is_empty() {
            return PermissionDecision::deny(DenialKind::UnknownRole);
        }

        let administrator = snapshot.hierarchy.administrator();
        if ranked.contains(&administrator) {
            return PermissionDecision::allow(AccessScope::AllFacilities, administrator, "administrator");
        }

        if !snapshot.is_known_resource(resource) {
            warn!(resource = %resource, "Check against resource missing from the configuration");
            return PermissionDecision::deny(DenialKind::UnknownResource);
        }

        let mut first_denial = None;
        for role in ranked {
            let Some(grant) = snapshot.rules.grant(role, resource, operation) else {
                continue;
            };

            match self.evaluate_grant(snapshot, principal, role, grant, resource, context) {
                Ok(scope) => return PermissionDecision::allow(scope, role, "granted"),
                Err(kind) => {
                    first_denial.get_or_insert(kind);
                }
            }
        }

        PermissionDecision::deny(first_denial.unwrap_or(DenialKind::NoMatchingRule))
    }

    /// Facility scoping then conditions for one role's grant
    fn evaluate_grant(
        &self,
        snapshot: &SecuritySnapshot,
        principal: &Principal,
        role: Role,
        grant: &RoleGrant,
        resource: &ResourceId,
        context: &ResourceContext,
    ) -> Result<AccessScope, DenialKind> {
        let role_scoped = snapshot
            .role_spec(role)
            .map_or(true, |spec| spec.facility_scoped);

        let scope = if !snapshot.scope.is_facility_scoped(resource) {
            AccessScope::Global
        } else if !role_scoped {
            AccessScope::AllFacilities
        } else {
            match &context.facility_id {
                Some(facility_id) if principal.belongs_to(facility_id) => AccessScope::FacilityOnly,
                Some(_) => return Err(DenialKind::FacilityRestriction),
                None if principal.facility_ids.is_empty() => return Err(DenialKind::InvalidContext),
                None => AccessScope::FacilityOnly,
            }
        };

        for name in &grant.conditions {
            match snapshot.conditions.evaluate(name, principal, context) {
                Some(true) => {}
                Some(false) => return Err(DenialKind::ConditionFailed),
                None => {
                    warn!(condition = %name, "Grant references an unregistered condition");
                    return Err(DenialKind::ConditionFailed);
                }
            }
        }

        Ok(scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_config::{ConfigLoader, StaticConfigSource};

    async fn validator() -> PermissionValidator {
        let source = Arc::new(StaticConfigSource::yaml("logging:\n  level: debug\n"));
        let loader = Arc::new(ConfigurationLoader::with_parser(
            source,
            ConfigLoader::with_prefix("WARDEN_PERMISSIONS_UNIT"),
        ));
        loader.reload_all().await.unwrap();

        let cache = PermissionCache::from_config(&loader.snapshot().unwrap().config.cache);
        PermissionValidator::new(loader, cache)
    }

    fn nurse() -> Principal {
        Principal::new("nurse-1").with_role(Role::Nurse).with_facility("1")
    }

    #[tokio::test]
    async fn test_unloaded_configuration_denies() {
        let source = Arc::new(StaticConfigSource::yaml(""));
        let loader = Arc::new(ConfigurationLoader::new(source));
        let validator = PermissionValidator::new(loader, PermissionCache::disabled());

        let outcome = validator
            .check(&nurse(), "patients", Operation::Read, &ResourceContext::new())
            .await;
        assert!(!outcome.decision.allowed);
        assert_eq!(outcome.decision.denial, Some(DenialKind::ConfigurationUnavailable));
        assert_eq!(outcome.generation, None);
        assert_eq!(validator.evaluation_count(), 0);
    }

    #[tokio::test]
    async fn test_malformed_inputs() {
        let validator = validator().await;
        let context = ResourceContext::new();

        let no_roles = Principal::new("x").with_facility("1");
        let decision = validator
            .check_permission(&no_roles, "patients", Operation::Read, &context)
            .await;
        assert_eq!(decision.denial, Some(DenialKind::InvalidContext));

        let decision = validator
            .check_permission(&nurse(), "collections.", Operation::Read, &context)
            .await;
        assert_eq!(decision.denial, Some(DenialKind::InvalidContext));
        assert_eq!(validator.evaluation_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_resource() {
        let validator = validator().await;
        let decision = validator
            .check_permission(&nurse(), "invoices", Operation::Read, &ResourceContext::new())
            .await;
        assert_eq!(decision.denial, Some(DenialKind::UnknownResource));
    }

    #[tokio::test]
    async fn test_missing_facility_context() {
        let validator = validator().await;

        let decision = validator
            .check_permission(&nurse(), "patients", Operation::Read, &ResourceContext::new())
            .await;
        assert!(decision.allowed);
        assert_eq!(decision.scope, AccessScope::FacilityOnly);

        let homeless = Principal::new("nurse-2").with_role(Role::Nurse);
        let decision = validator
            .check_permission(&homeless, "patients", Operation::Read, &ResourceContext::new())
            .await;
        assert_eq!(decision.denial, Some(DenialKind::InvalidContext));
    }

    #[tokio::test]
    async fn test_conditions_gate_grants() {
        let validator = validator().await;
        let context = ResourceContext::new().for_facility("1");

        let supervisor = Principal::new("s").with_role(Role::Supervisor).with_facility("1");
        let decision = validator
            .check_permission(&supervisor, "users", Operation::Create, &context)
            .await;
        assert_eq!(decision.denial, Some(DenialKind::ConditionFailed));

        let decision = validator
            .check_permission(
                &supervisor,
                "users",
                Operation::Create,
                &context.clone().targeting(Role::Nurse),
            )
            .await;
        assert!(decision.allowed);

        let user = Principal::new("u-1").with_role(Role::User).with_facility("1");
        let own = context.clone().owned_by("u-1");
        assert!(validator.check_permission(&user, "users", Operation::Update, &own).await.allowed);
        let other = context.owned_by("u-2");
        assert!(!validator.check_permission(&user, "users", Operation::Update, &other).await.allowed);
    }

    #[tokio::test]
    async fn test_multi_role_principal_uses_best_role() {
        let validator = validator().await;
        let principal = Principal::new("m")
            .with_role(Role::User)
            .with_role(Role::Doctor)
            .with_facility("1");

        let decision = validator
            .check_permission(
                &principal,
                "encounters",
                Operation::Create,
                &ResourceContext::new().for_facility("1"),
            )
            .await;
        assert!(decision.allowed);
        assert_eq!(decision.matched_role, Some(Role::Doctor));
    }

    #[tokio::test]
    async fn test_cache_serves_repeated_checks() {
        let validator = validator().await;
        let context = ResourceContext::new().for_facility("1");

        let first = validator.check(&nurse(), "patients", Operation::Read, &context).await;
        let second = validator.check(&nurse(), "patients", Operation::Read, &context).await;

        assert!(!first.cached);
        assert!(second.cached);
        assert_eq!(first.decision, second.decision);
        assert_eq!(validator.evaluation_count(), 1);
    }
}
