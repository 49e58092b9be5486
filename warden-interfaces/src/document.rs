//! Document ACL types

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::fmt;

use crate::types::{FacilityId, ResourceId, Role};

/// Access level granted by an ACL entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    Read,
    Write,
}

impl AccessLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessLevel::Read => "read",
            AccessLevel::Write => "write",
        }
    }
}

/// Who an ACL entry applies to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AclSubject {
    /// Holders of a role, optionally only within one facility
    Role {
        role: Role,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        facility_id: Option<FacilityId>,
    },
    /// Members of a team
    Team { team: String },
}

impl fmt::Display for AclSubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AclSubject::Role {
                role,
                facility_id: Some(facility),
            } => write!(f, "role:{}@facility:{}", role, facility),
            AclSubject::Role {
                role,
                facility_id: None,
            } => write!(f, "role:{}", role),
            AclSubject::Team { team } => write!(f, "team:{}", team),
        }
    }
}

/// Permission annotation attached to a stored document
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AclEntry {
    pub subject: AclSubject,
    pub access: AccessLevel,
}

impl AclEntry {
    pub fn new(subject: AclSubject, access: AccessLevel) -> Self {
        Self { subject, access }
    }

    /// Render as a storage tag, e.g. `write:role:doctor@facility:2`
    pub fn tag(&self) -> String {
        format!("{}:{}", self.access.as_str(), self.subject)
    }
}

/// A record about to be created
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentDraft {
    /// Facility requested by the caller, if any
    #[serde(default)]
    pub facility_id: Option<FacilityId>,
    #[serde(default)]
    pub fields: Map<String, JsonValue>,
}

impl DocumentDraft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_facility(mut self, facility_id: impl Into<FacilityId>) -> Self {
        self.facility_id = Some(facility_id.into());
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }
}

/// A persisted record with its embedded security metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub id: String,
    pub resource: ResourceId,
    #[serde(default)]
    pub facility_id: Option<FacilityId>,
    #[serde(default)]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub acl: Vec<AclEntry>,
    #[serde(default)]
    pub fields: Map<String, JsonValue>,
}
