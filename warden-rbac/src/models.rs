//! Data models for the authorization engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};

use warden_interfaces::{FacilityId, Operation, Principal, ResourceId, Role};

/// Resolved definition of a role within one configuration snapshot
#[derive(Debug, Clone, Serialize)]
pub struct RoleSpec {
    pub role: Role,
    pub display_name: String,
    pub level: u32,
    pub facility_scoped: bool,
    pub special_permissions: HashSet<String>,
}

impl RoleSpec {
    pub fn has_special_permission(&self, permission: &str) -> bool {
        self.special_permissions.contains(permission)
    }
}

/// One role's grant for a (resource, operation) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleGrant {
    /// Condition names; all must hold
    pub conditions: Vec<String>,
    /// Set when the grant was merged in from a lower role
    pub inherited_from: Option<Role>,
}

/// Everything allowed for one (resource, operation) pair
#[derive(Debug, Clone, Default, Serialize)]
pub struct PermissionRule {
    pub grants: HashMap<Role, RoleGrant>,
}

/// Rule table indexed by (resource, operation)
///
/// Only explicit operations are stored; there is no wildcard entry.
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    rules: HashMap<(ResourceId, Operation), PermissionRule>,
}

impl RuleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a grant unless the role already has one for the pair
    pub fn insert(
        &mut self,
        resource: ResourceId,
        operation: Operation,
        role: Role,
        grant: RoleGrant,
    ) -> bool {
        let rule = self.rules.entry((resource, operation)).or_default();
        if rule.grants.contains_key(&role) {
            return false;
        }
        rule.grants.insert(role, grant);
        true
    }

    pub fn rule(&self, resource: &ResourceId, operation: Operation) -> Option<&PermissionRule> {
        self.rules.get(&(resource.clone(), operation))
    }

    /// Grant of `role` for the pair, if any
    pub fn grant(&self, role: Role, resource: &ResourceId, operation: Operation) -> Option<&RoleGrant> {
        self.rule(resource, operation)
            .and_then(|rule| rule.grants.get(&role))
    }

    pub fn has_resource(&self, resource: &ResourceId) -> bool {
        self.rules.keys().any(|(r, _)| r == resource)
    }

    /// Every condition name referenced by any grant
    pub fn condition_names(&self) -> HashSet<&str> {
        self.rules
            .values()
            .flat_map(|rule| rule.grants.values())
            .flat_map(|grant| grant.conditions.iter().map(String::as_str))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Attributes of the resource being accessed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceContext {
    /// Facility the resource belongs to
    #[serde(default)]
    pub facility_id: Option<FacilityId>,
    /// Principal that owns the resource
    #[serde(default)]
    pub owner_id: Option<String>,
    /// Principals assigned to the resource (e.g. care team of a patient)
    #[serde(default)]
    pub assigned_principals: Vec<String>,
    /// Role being granted or edited, for user management operations
    #[serde(default)]
    pub target_role: Option<Role>,
    #[serde(default)]
    pub team_id: Option<String>,
}

impl ResourceContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_facility(mut self, facility_id: impl Into<FacilityId>) -> Self {
        self.facility_id = Some(facility_id.into());
        self
    }

    pub fn owned_by(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    pub fn with_assigned(mut self, principal_id: impl Into<String>) -> Self {
        self.assigned_principals.push(principal_id.into());
        self
    }

    pub fn targeting(mut self, role: Role) -> Self {
        self.target_role = Some(role);
        self
    }

    pub fn in_team(mut self, team_id: impl Into<String>) -> Self {
        self.team_id = Some(team_id.into());
        self
    }

    /// Hash of everything besides the facility that can change a decision
    ///
    /// Covers the principal's roles, facilities and teams plus the
    /// condition-relevant context fields, independent of list ordering.
    pub fn fingerprint(&self, principal: &Principal) -> u64 {
        let mut hasher = DefaultHasher::new();

        let mut roles: Vec<&str> = principal.roles.iter().map(|r| r.as_str()).collect();
        roles.sort_unstable();
        roles.hash(&mut hasher);

        let mut facilities: Vec<&FacilityId> = principal.facility_ids.iter().collect();
        facilities.sort_unstable();
        facilities.hash(&mut hasher);

        let mut teams: Vec<&String> = principal.team_memberships.iter().collect();
        teams.sort_unstable();
        teams.hash(&mut hasher);

        self.owner_id.hash(&mut hasher);
        let mut assigned: Vec<&String> = self.assigned_principals.iter().collect();
        assigned.sort_unstable();
        assigned.hash(&mut hasher);
        self.target_role.hash(&mut hasher);
        self.team_id.hash(&mut hasher);

        hasher.finish()
    }
}

/// Breadth of an allowed decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessScope {
    /// Every facility (administrator-equivalent or unscoped role)
    AllFacilities,
    /// Only the principal's own facilities
    FacilityOnly,
    /// Resource is not facility scoped
    Global,
    /// Denied
    None,
}

/// Why a decision was denied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialKind {
    NoMatchingRule,
    FacilityRestriction,
    ConditionFailed,
    InvalidContext,
    UnknownRole,
    UnknownResource,
    ConfigurationUnavailable,
}

impl DenialKind {
    /// Reason returned to callers; deliberately coarse
    pub fn reason(&self) -> &'static str {
        match self {
            DenialKind::NoMatchingRule => "no matching rule",
            DenialKind::FacilityRestriction => "Facility access restriction",
            DenialKind::ConditionFailed => "access condition not satisfied",
            DenialKind::InvalidContext => "invalid request context",
            DenialKind::UnknownRole => "no recognized role",
            DenialKind::UnknownResource => "unknown resource",
            DenialKind::ConfigurationUnavailable => "authorization configuration unavailable",
        }
    }

    /// Whether a denial of this kind depends only on rules and inputs
    pub fn is_cacheable(&self) -> bool {
        matches!(
            self,
            DenialKind::NoMatchingRule
                | DenialKind::FacilityRestriction
                | DenialKind::ConditionFailed
        )
    }
}

/// Result of a permission check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionDecision {
    pub allowed: bool,
    pub reason: String,
    pub scope: AccessScope,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub denial: Option<DenialKind>,
    /// Role whose grant produced an allow
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_role: Option<Role>,
}

impl PermissionDecision {
    pub fn allow(scope: AccessScope, role: Role, reason: impl Into<String>) -> Self {
        Self {
            allowed: true,
            reason: reason.into(),
            scope,
            denial: None,
            matched_role: Some(role),
        }
    }

    pub fn deny(kind: DenialKind) -> Self {
        Self {
            allowed: false,
            reason: kind.reason().to_string(),
            scope: AccessScope::None,
            denial: Some(kind),
            matched_role: None,
        }
    }

    pub fn is_cacheable(&self) -> bool {
        self.allowed || self.denial.is_some_and(|kind| kind.is_cacheable())
    }
}

/// Field-level read restriction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldRule {
    pub field: String,
    pub min_read_role: Role,
}

/// Resolved security settings of one collection
#[derive(Debug, Clone, Serialize)]
pub struct CollectionSecurity {
    pub resource: ResourceId,
    pub facility_scoped: bool,
    pub min_write_role: Option<Role>,
    pub field_rules: Vec<FieldRule>,
    pub facility_field: String,
}

/// A completed role assignment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub principal_id: String,
    pub role: Role,
    pub facility_id: Option<FacilityId>,
    pub assigned_by: String,
    pub assigned_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patients() -> ResourceId {
        ResourceId::parse("patients").unwrap()
    }

    #[test]
    fn test_rule_table_keeps_first_grant() {
        let mut table = RuleTable::new();
        let own = RoleGrant {
            conditions: vec![],
            inherited_from: None,
        };
        let inherited = RoleGrant {
            conditions: vec!["self_only".to_string()],
            inherited_from: Some(Role::User),
        };

        assert!(table.insert(patients(), Operation::Read, Role::Nurse, own.clone()));
        assert!(!table.insert(patients(), Operation::Read, Role::Nurse, inherited));

        assert_eq!(table.grant(Role::Nurse, &patients(), Operation::Read), Some(&own));
        assert!(table.grant(Role::Nurse, &patients(), Operation::Delete).is_none());
        assert!(table.has_resource(&patients()));
        assert!(table.condition_names().is_empty());
    }

    #[test]
    fn test_fingerprint_ignores_ordering() {
        let a = Principal::new("p")
            .with_role(Role::Doctor)
            .with_role(Role::Nurse)
            .with_facility("1")
            .with_facility("2");
        let b = Principal::new("p")
            .with_role(Role::Nurse)
            .with_role(Role::Doctor)
            .with_facility("2")
            .with_facility("1");

        let context = ResourceContext::new().with_assigned("x").with_assigned("y");
        let reordered = ResourceContext::new().with_assigned("y").with_assigned("x");
        assert_eq!(context.fingerprint(&a), reordered.fingerprint(&b));
    }

    #[test]
    fn test_fingerprint_tracks_condition_inputs() {
        let principal = Principal::new("p").with_role(Role::User).with_facility("1");
        let base = ResourceContext::new();

        assert_ne!(
            base.fingerprint(&principal),
            base.clone().owned_by("p").fingerprint(&principal)
        );
        assert_ne!(
            base.fingerprint(&principal),
            base.clone().targeting(Role::Nurse).fingerprint(&principal)
        );
        assert_ne!(
            base.fingerprint(&principal),
            base.fingerprint(&principal.clone().with_role(Role::Nurse))
        );
    }

    #[test]
    fn test_decision_cacheability() {
        assert!(PermissionDecision::allow(AccessScope::Global, Role::User, "granted").is_cacheable());
        assert!(PermissionDecision::deny(DenialKind::FacilityRestriction).is_cacheable());
        assert!(!PermissionDecision::deny(DenialKind::InvalidContext).is_cacheable());
        assert!(!PermissionDecision::deny(DenialKind::ConfigurationUnavailable).is_cacheable());

        let denied = PermissionDecision::deny(DenialKind::NoMatchingRule);
        assert_eq!(denied.reason, "no matching rule");
        assert_eq!(denied.scope, AccessScope::None);
    }
}
