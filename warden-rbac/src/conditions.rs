//! Named access conditions
//!
//! A grant can require conditions by name. Every name used in a configuration must
//! resolve to a predicate in the registry when the snapshot is built, so an unknown
//! name fails the load instead of silently passing at check time.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::warn;
use warden_interfaces::{Principal, Role};

use crate::models::{ResourceContext, RoleSpec};
use crate::roles::RoleHierarchy;

/// Predicate over a principal and the resource being accessed
pub type Condition = Arc<dyn Fn(&Principal, &ResourceContext) -> bool + Send + Sync>;

pub const CLINICAL_ACCESS: &str = "clinical_access";
pub const ASSIGNED_PATIENTS: &str = "assigned_patients";
pub const SELF_ONLY: &str = "self_only";
pub const ROLE_HIERARCHY: &str = "role_hierarchy";
pub const SAME_TEAM: &str = "same_team";

/// Registry of named condition predicates
#[derive(Clone, Default)]
pub struct ConditionRegistry {
    conditions: HashMap<String, Condition>,
}

impl ConditionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in predicates bound to one snapshot's hierarchy and role specs
    pub fn builtin(hierarchy: Arc<RoleHierarchy>, roles: Arc<HashMap<Role, RoleSpec>>) -> Self {
        let mut registry = Self::new();

        registry.register(CLINICAL_ACCESS, move |principal, _| {
            principal.roles.iter().any(|role| {
                roles
                    .get(role)
                    .is_some_and(|spec| spec.has_special_permission(CLINICAL_ACCESS))
            })
        });

        registry.register(ASSIGNED_PATIENTS, |principal, context| {
            context.assigned_principals.iter().any(|id| *id == principal.id)
        });

        registry.register(SELF_ONLY, |principal, context| {
            context.owner_id.as_deref() == Some(principal.id.as_str())
        });

        registry.register(ROLE_HIERARCHY, move |principal, context| {
            context
                .target_role
                .is_some_and(|target| hierarchy.principal_outranks(principal, target))
        });

        registry.register(SAME_TEAM, |principal, context| {
            context
                .team_id
                .as_deref()
                .is_some_and(|team| principal.is_team_member(team))
        });

        registry
    }

    /// Register a predicate, replacing any existing one with the same name
    pub fn register<F>(&mut self, name: impl Into<String>, predicate: F)
    where
        F: Fn(&Principal, &ResourceContext) -> bool + Send + Sync + 'static,
    {
        self.conditions.insert(name.into(), Arc::new(predicate));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.conditions.contains_key(name)
    }

    /// Evaluate a condition; `None` when no predicate is registered under the name
    pub fn evaluate(&self, name: &str, principal: &Principal, context: &ResourceContext) -> Option<bool> {
        self.conditions
            .get(name)
            .map(|condition| condition(principal, context))
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.conditions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Add custom predicates; built-ins keep precedence
    pub fn merged_with(mut self, custom: &ConditionRegistry) -> Self {
        for (name, condition) in &custom.conditions {
            if self.conditions.contains_key(name) {
                warn!("Custom condition '{}' shadows a built-in condition and is ignored", name);
                continue;
            }
            self.conditions.insert(name.clone(), condition.clone());
        }
        self
    }
}

impl fmt::Debug for ConditionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConditionRegistry")
            .field("conditions", &self.names())
            .finish()
    }
}
