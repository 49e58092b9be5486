//! Principal model and identity store interface

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::InterfaceResult;
use crate::types::{FacilityId, Role};

/// An authenticated actor attempting an operation
///
/// Supplied per request by the identity collaborator. Warden never authenticates
/// principals itself, it only decides what they may do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Stable principal identifier
    pub id: String,

    /// Roles assigned to the principal
    #[serde(default)]
    pub roles: Vec<Role>,

    /// Facilities (tenants) the principal belongs to
    #[serde(default)]
    pub facility_ids: Vec<FacilityId>,

    /// Team memberships
    #[serde(default)]
    pub team_memberships: Vec<String>,
}

impl Principal {
    /// Create a principal without roles or facilities
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            roles: Vec::new(),
            facility_ids: Vec::new(),
            team_memberships: Vec::new(),
        }
    }

    /// Add a role
    pub fn with_role(mut self, role: Role) -> Self {
        if !self.roles.contains(&role) {
            self.roles.push(role);
        }
        self
    }

    /// Add a facility membership
    pub fn with_facility(mut self, facility_id: impl Into<FacilityId>) -> Self {
        let facility_id = facility_id.into();
        if !self.facility_ids.contains(&facility_id) {
            self.facility_ids.push(facility_id);
        }
        self
    }

    /// Add a team membership
    pub fn with_team(mut self, team: impl Into<String>) -> Self {
        let team = team.into();
        if !self.team_memberships.contains(&team) {
            self.team_memberships.push(team);
        }
        self
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn belongs_to(&self, facility_id: &FacilityId) -> bool {
        self.facility_ids.contains(facility_id)
    }

    pub fn is_team_member(&self, team: &str) -> bool {
        self.team_memberships.iter().any(|t| t == team)
    }

    /// First facility, used as the default facility for new records
    pub fn primary_facility(&self) -> Option<&FacilityId> {
        self.facility_ids.first()
    }

    /// A principal must carry an id and at least one role to be evaluated at all
    pub fn is_well_formed(&self) -> bool {
        !self.id.trim().is_empty() && !self.roles.is_empty()
    }
}

/// Identity/profile store
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Resolve a principal by id
    async fn find_principal(&self, principal_id: &str) -> InterfaceResult<Option<Principal>>;

    /// Persist a role assignment and return the updated principal
    async fn assign_role(
        &self,
        principal_id: &str,
        role: Role,
        facility_id: Option<&FacilityId>,
    ) -> InterfaceResult<Principal>;
}
