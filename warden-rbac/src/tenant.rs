//! Facility (tenant) scoping

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use warden_interfaces::{FacilityId, Principal, ResourceId};

use crate::models::CollectionSecurity;
use crate::roles::RoleHierarchy;

/// Prefix of the team that groups every member of a facility
const FACILITY_TEAM_PREFIX: &str = "facility-";

/// Facilities a principal may see
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FacilityAccess {
    /// Administrator-equivalent: no facility restriction
    All,
    /// Only the listed facilities
    Only(BTreeSet<FacilityId>),
}

impl FacilityAccess {
    pub fn allows(&self, facility_id: &FacilityId) -> bool {
        match self {
            FacilityAccess::All => true,
            FacilityAccess::Only(facilities) => facilities.contains(facility_id),
        }
    }
}

/// Resolves facility scoping of resources and principals
#[derive(Debug, Clone)]
pub struct FacilityScopeResolver {
    collections: HashMap<ResourceId, CollectionSecurity>,
    hierarchy: Arc<RoleHierarchy>,
    default_facility_field: String,
}

impl FacilityScopeResolver {
    pub fn new(
        collections: HashMap<ResourceId, CollectionSecurity>,
        hierarchy: Arc<RoleHierarchy>,
        default_facility_field: impl Into<String>,
    ) -> Self {
        Self {
            collections,
            hierarchy,
            default_facility_field: default_facility_field.into(),
        }
    }

    /// Whether records of the resource are tagged with and filtered by facility
    ///
    /// Resources without collection configuration count as scoped.
    pub fn is_facility_scoped(&self, resource: &ResourceId) -> bool {
        self.collections
            .get(resource)
            .map_or(true, |collection| collection.facility_scoped)
    }

    pub fn collection(&self, resource: &ResourceId) -> Option<&CollectionSecurity> {
        self.collections.get(resource)
    }

    pub fn can_access_facility(&self, principal: &Principal, facility_id: &FacilityId) -> bool {
        self.hierarchy.principal_is_administrator(principal) || principal.belongs_to(facility_id)
    }

    pub fn accessible_facilities(&self, principal: &Principal) -> FacilityAccess {
        if self.hierarchy.principal_is_administrator(principal) {
            FacilityAccess::All
        } else {
            FacilityAccess::Only(principal.facility_ids.iter().cloned().collect())
        }
    }

    /// Fields the principal may not read on the resource
    pub fn hidden_fields(&self, principal: &Principal, resource: &ResourceId) -> Vec<String> {
        let Some(collection) = self.collections.get(resource) else {
            return Vec::new();
        };

        let highest = self.hierarchy.highest_role(principal);
        collection
            .field_rules
            .iter()
            .filter(|rule| {
                !highest.is_some_and(|role| {
                    self.hierarchy.has_higher_or_equal_role(role, rule.min_read_role)
                })
            })
            .map(|rule| rule.field.clone())
            .collect()
    }

    /// Team that groups the members of a facility
    pub fn facility_team(&self, facility_id: &FacilityId) -> String {
        format!("{}{}", FACILITY_TEAM_PREFIX, facility_id)
    }

    /// Record field holding the facility id of the resource
    pub fn facility_field(&self, resource: &ResourceId) -> &str {
        self.collections
            .get(resource)
            .map_or(self.default_facility_field.as_str(), |collection| {
                collection.facility_field.as_str()
            })
    }
}
