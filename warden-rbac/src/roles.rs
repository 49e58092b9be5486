//! Role hierarchy derived from a configuration snapshot

use std::collections::HashMap;

use warden_interfaces::{Principal, Role};

use crate::error::{RbacError, RbacResult};

/// Total order over the roles of one configuration snapshot
#[derive(Debug, Clone)]
pub struct RoleHierarchy {
    levels: HashMap<Role, u32>,
    /// Defined roles by descending level
    ranked: Vec<Role>,
    administrator: Role,
}

impl RoleHierarchy {
    /// Build the hierarchy from role levels
    pub fn from_levels(levels: HashMap<Role, u32>) -> RbacResult<Self> {
        let mut ranked: Vec<Role> = levels.keys().copied().collect();
        ranked.sort_by(|a, b| levels[b].cmp(&levels[a]));

        for pair in ranked.windows(2) {
            if levels[&pair[0]] == levels[&pair[1]] {
                return Err(RbacError::internal(format!(
                    "Roles '{}' and '{}' share level {}",
                    pair[0], pair[1], levels[&pair[0]]
                )));
            }
        }

        let administrator = *ranked
            .first()
            .ok_or_else(|| RbacError::internal("Role hierarchy is empty"))?;

        Ok(Self {
            levels,
            ranked,
            administrator,
        })
    }

    /// Level of a role, if it is defined
    pub fn level(&self, role: Role) -> Option<u32> {
        self.levels.get(&role).copied()
    }

    pub fn contains(&self, role: Role) -> bool {
        self.levels.contains_key(&role)
    }

    /// The maximal (administrator-equivalent) role
    pub fn administrator(&self) -> Role {
        self.administrator
    }

    pub fn is_administrator(&self, role: Role) -> bool {
        role == self.administrator
    }

    /// Whether `a` is at or above `b`; undefined roles never compare
    pub fn has_higher_or_equal_role(&self, a: Role, b: Role) -> bool {
        match (self.level(a), self.level(b)) {
            (Some(a), Some(b)) => a >= b,
            _ => false,
        }
    }

    pub fn is_strictly_above(&self, a: Role, b: Role) -> bool {
        match (self.level(a), self.level(b)) {
            (Some(a), Some(b)) => a > b,
            _ => false,
        }
    }

    /// Every defined role, highest first
    pub fn ranked(&self) -> &[Role] {
        &self.ranked
    }

    /// Defined roles of a principal, highest first; undefined roles are dropped
    pub fn rank_principal_roles(&self, principal: &Principal) -> Vec<Role> {
        self.ranked
            .iter()
            .copied()
            .filter(|role| principal.has_role(*role))
            .collect()
    }

    /// Roles at or above `role`, highest first
    pub fn roles_at_or_above(&self, role: Role) -> Vec<Role> {
        self.ranked
            .iter()
            .copied()
            .filter(|candidate| self.has_higher_or_equal_role(*candidate, role))
            .collect()
    }

    /// Highest defined role the principal holds
    pub fn highest_role(&self, principal: &Principal) -> Option<Role> {
        self.ranked.iter().copied().find(|role| principal.has_role(*role))
    }

    /// Whether any of the principal's roles is strictly above `role`
    pub fn principal_outranks(&self, principal: &Principal, role: Role) -> bool {
        self.highest_role(principal)
            .is_some_and(|highest| self.is_strictly_above(highest, role))
    }

    pub fn principal_is_administrator(&self, principal: &Principal) -> bool {
        principal.has_role(self.administrator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn standard() -> RoleHierarchy {
        RoleHierarchy::from_levels(HashMap::from([
            (Role::Administrator, 100),
            (Role::Supervisor, 80),
            (Role::Doctor, 60),
            (Role::Nurse, 40),
            (Role::User, 10),
        ]))
        .unwrap()
    }

    #[test]
    fn test_ordering() {
        let hierarchy = standard();

        assert_eq!(hierarchy.administrator(), Role::Administrator);
        assert_eq!(
            hierarchy.ranked(),
            &[Role::Administrator, Role::Supervisor, Role::Doctor, Role::Nurse, Role::User]
        );
        assert!(hierarchy.has_higher_or_equal_role(Role::Doctor, Role::Nurse));
        assert!(hierarchy.has_higher_or_equal_role(Role::Doctor, Role::Doctor));
        assert!(!hierarchy.has_higher_or_equal_role(Role::Nurse, Role::Doctor));
        assert!(!hierarchy.is_strictly_above(Role::Doctor, Role::Doctor));
    }

    #[test]
    fn test_roles_at_or_above() {
        let hierarchy = standard();
        assert_eq!(
            hierarchy.roles_at_or_above(Role::Doctor),
            vec![Role::Administrator, Role::Supervisor, Role::Doctor]
        );
    }

    #[test]
    fn test_undefined_roles_never_compare() {
        let hierarchy = RoleHierarchy::from_levels(HashMap::from([
            (Role::Administrator, 100),
            (Role::User, 10),
        ]))
        .unwrap();

        assert!(!hierarchy.has_higher_or_equal_role(Role::Doctor, Role::User));
        assert!(!hierarchy.has_higher_or_equal_role(Role::Administrator, Role::Doctor));

        let principal = Principal::new("p").with_role(Role::Doctor).with_role(Role::User);
        assert_eq!(hierarchy.rank_principal_roles(&principal), vec![Role::User]);
        assert!(!hierarchy.principal_outranks(&principal, Role::User));
    }

    #[test]
    fn test_principal_outranks() {
        let hierarchy = standard();
        let supervisor = Principal::new("s").with_role(Role::Nurse).with_role(Role::Supervisor);

        assert_eq!(hierarchy.highest_role(&supervisor), Some(Role::Supervisor));
        assert!(hierarchy.principal_outranks(&supervisor, Role::Doctor));
        assert!(!hierarchy.principal_outranks(&supervisor, Role::Supervisor));
        assert!(!hierarchy.principal_is_administrator(&supervisor));
    }

    #[test]
    fn test_rejects_invalid_levels() {
        assert!(RoleHierarchy::from_levels(HashMap::new()).is_err());
        assert!(RoleHierarchy::from_levels(HashMap::from([
            (Role::Doctor, 50),
            (Role::Nurse, 50),
        ]))
        .is_err());
    }
}
