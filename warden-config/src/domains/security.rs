//! Role, permission and collection security definitions
//!
//! This is the raw, serializable form of the security model. The RBAC crate turns a
//! validated [`SecurityDefinitions`] into an immutable rule table and hierarchy.

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{HashMap, HashSet};

use warden_interfaces::{Operation, ResourceId, Role};

use crate::error::ConfigResult;
use crate::validation::{validate_identifier, validate_required_string, Validatable};

/// Wildcard accepted in operation lists
const WILDCARD: &str = "*";

/// Security definitions: roles and collection rules
///
/// The `Default` impl is the standard healthcare setup and only applies when the
/// whole `security` section is missing. A present section with a missing `roles` or
/// `collections` key gets an empty map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityDefinitions {
    #[serde(default)]
    pub roles: HashMap<Role, RoleDefinition>,

    /// Collection security keyed by resource name (`patients` or `collections.patients`)
    #[serde(default)]
    pub collections: HashMap<String, CollectionDefinition>,
}

/// Definition of a single role
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleDefinition {
    #[serde(default)]
    pub display_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Hierarchy level; higher outranks lower
    pub level: u32,

    /// Whether grants of this role are limited to the principal's own facilities
    #[serde(default = "crate::domains::utils::default_true")]
    pub facility_scoped: bool,

    /// Lower roles whose grants are merged into this one
    #[serde(default)]
    pub inherits_from: Vec<Role>,

    #[serde(default)]
    pub permissions: Vec<GrantDefinition>,

    #[serde(default)]
    pub special_permissions: Vec<String>,
}

/// Operations granted on one resource, with the conditions that must all hold
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrantDefinition {
    pub resource: String,
    pub operations: OperationSet,
    #[serde(default)]
    pub conditions: Vec<String>,
}

/// Explicit list of operations
///
/// Accepts `"*"`, `["*"]` or a list of operation names and always holds the explicit
/// enumeration, so the wildcard never survives parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct OperationSet(Vec<Operation>);

impl OperationSet {
    /// All operations
    pub fn all() -> Self {
        Self(Operation::ALL.to_vec())
    }

    pub fn of(operations: &[Operation]) -> Self {
        let mut set = Vec::with_capacity(operations.len());
        for op in operations {
            if !set.contains(op) {
                set.push(*op);
            }
        }
        Self(set)
    }

    /// Parse operation names, expanding the wildcard
    pub fn parse<S: AsRef<str>>(names: &[S]) -> Result<Self, String> {
        if names.iter().any(|n| n.as_ref().trim() == WILDCARD) {
            return Ok(Self::all());
        }

        let operations = names
            .iter()
            .map(|n| n.as_ref().parse::<Operation>().map_err(|e| e.to_string()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::of(&operations))
    }

    pub fn contains(&self, operation: Operation) -> bool {
        self.0.contains(&operation)
    }

    pub fn iter(&self) -> impl Iterator<Item = Operation> + '_ {
        self.0.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl<'de> Deserialize<'de> for OperationSet {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawOperations {
            Single(String),
            List(Vec<String>),
        }

        let names = match RawOperations::deserialize(deserializer)? {
            RawOperations::Single(name) => vec![name],
            RawOperations::List(names) => names,
        };

        OperationSet::parse(&names).map_err(D::Error::custom)
    }
}

/// Security configuration of one collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionDefinition {
    /// Whether records are tagged with and filtered by facility
    #[serde(default = "crate::domains::utils::default_true")]
    pub facility_scoped: bool,

    /// Lowest role that receives write ACL grants on new documents
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_write_role: Option<Role>,

    #[serde(default)]
    pub field_rules: Vec<FieldRuleDefinition>,

    /// Overrides `query.facility_field` for this collection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facility_field: Option<String>,
}

/// Field-level read restriction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldRuleDefinition {
    pub field: String,
    pub min_read_role: Role,
}

impl Default for SecurityDefinitions {
    fn default() -> Self {
        Self::standard()
    }
}

impl SecurityDefinitions {
    /// Standard healthcare roles and collections
    pub fn standard() -> Self {
        use Operation::*;

        let mut roles = HashMap::new();

        roles.insert(
            Role::Administrator,
            RoleDefinition {
                display_name: "Administrator".to_string(),
                description: Some("Full access to every facility".to_string()),
                level: 100,
                facility_scoped: false,
                inherits_from: Vec::new(),
                permissions: ["patients", "encounters", "vaccines", "users", "reports"]
                    .iter()
                    .map(|resource| grant(resource, OperationSet::all(), &[]))
                    .collect(),
                special_permissions: special(&[
                    "manage_users",
                    "manage_configuration",
                    "view_audit",
                    "clinical_access",
                ]),
            },
        );

        roles.insert(
            Role::Supervisor,
            RoleDefinition {
                display_name: "Supervisor".to_string(),
                description: Some("Manages staff and records of a facility".to_string()),
                level: 80,
                facility_scoped: true,
                inherits_from: Vec::new(),
                permissions: vec![
                    grant("patients", OperationSet::of(&[Create, Read, Update, List]), &[]),
                    grant("encounters", OperationSet::of(&[Create, Read, Update, List]), &[]),
                    grant("vaccines", OperationSet::of(&[Read, List]), &[]),
                    grant("users", OperationSet::of(&[Read, List]), &[]),
                    grant("users", OperationSet::of(&[Create, Update]), &["role_hierarchy"]),
                    grant("reports", OperationSet::of(&[Read, List]), &[]),
                ],
                special_permissions: special(&["manage_users"]),
            },
        );

        roles.insert(
            Role::Doctor,
            RoleDefinition {
                display_name: "Doctor".to_string(),
                description: None,
                level: 60,
                facility_scoped: true,
                inherits_from: Vec::new(),
                permissions: vec![
                    grant("patients", OperationSet::of(&[Create, Read, List]), &[]),
                    grant("patients", OperationSet::of(&[Update]), &["clinical_access"]),
                    grant("encounters", OperationSet::of(&[Create, Read, List]), &[]),
                    grant("encounters", OperationSet::of(&[Update]), &["assigned_patients"]),
                    grant("vaccines", OperationSet::of(&[Read, List]), &[]),
                ],
                special_permissions: special(&["clinical_access"]),
            },
        );

        roles.insert(
            Role::Nurse,
            RoleDefinition {
                display_name: "Nurse".to_string(),
                description: None,
                level: 40,
                facility_scoped: true,
                inherits_from: Vec::new(),
                permissions: vec![
                    grant("patients", OperationSet::of(&[Read, List]), &[]),
                    grant("patients", OperationSet::of(&[Update]), &["clinical_access"]),
                    grant("encounters", OperationSet::of(&[Create, Read, List]), &[]),
                    grant("vaccines", OperationSet::of(&[Read, List]), &[]),
                ],
                special_permissions: special(&["clinical_access"]),
            },
        );

        roles.insert(
            Role::User,
            RoleDefinition {
                display_name: "User".to_string(),
                description: Some("Basic staff access".to_string()),
                level: 10,
                facility_scoped: true,
                inherits_from: Vec::new(),
                permissions: vec![
                    grant("patients", OperationSet::of(&[Read, List]), &[]),
                    grant("vaccines", OperationSet::of(&[Read, List]), &[]),
                    grant("users", OperationSet::of(&[Read, Update]), &["self_only"]),
                ],
                special_permissions: Vec::new(),
            },
        );

        let mut collections = HashMap::new();
        collections.insert(
            "patients".to_string(),
            CollectionDefinition {
                facility_scoped: true,
                min_write_role: Some(Role::Nurse),
                field_rules: vec![FieldRuleDefinition {
                    field: "national_id".to_string(),
                    min_read_role: Role::Doctor,
                }],
                facility_field: None,
            },
        );
        collections.insert("encounters".to_string(), collection(true, Role::Doctor));
        collections.insert("vaccines".to_string(), collection(false, Role::Administrator));
        collections.insert("users".to_string(), collection(true, Role::Supervisor));
        collections.insert("reports".to_string(), collection(true, Role::Supervisor));

        Self { roles, collections }
    }

    /// Normalized collection lookup
    pub fn collection(&self, resource: &ResourceId) -> Option<&CollectionDefinition> {
        self.collections
            .iter()
            .find(|(name, _)| ResourceId::parse(name).is_ok_and(|id| &id == resource))
            .map(|(_, definition)| definition)
    }

    /// The role with the highest level
    pub fn maximal_role(&self) -> Option<Role> {
        self.roles
            .iter()
            .max_by_key(|(_, definition)| definition.level)
            .map(|(role, _)| *role)
    }

    fn check_inheritance_cycle(
        &self,
        current: Role,
        visited: &mut HashSet<Role>,
        stack: &mut Vec<Role>,
    ) -> ConfigResult<()> {
        if stack.contains(&current) {
            return Err(self.validation_error(format!(
                "Circular role inheritance involving '{}'",
                current
            )));
        }

        if !visited.insert(current) {
            return Ok(());
        }

        stack.push(current);
        if let Some(definition) = self.roles.get(&current) {
            for parent in &definition.inherits_from {
                self.check_inheritance_cycle(*parent, visited, stack)?;
            }
        }
        stack.pop();

        Ok(())
    }

    fn validate_collections(&self) -> ConfigResult<HashSet<ResourceId>> {
        let mut defined = HashSet::new();

        for (name, collection) in &self.collections {
            let resource = ResourceId::parse(name)
                .map_err(|e| self.validation_error(format!("Collection '{}': {}", name, e)))?;
            if !defined.insert(resource.clone()) {
                return Err(self.validation_error(format!(
                    "Collection '{}' is defined more than once",
                    resource
                )));
            }

            if let Some(role) = collection.min_write_role {
                if !self.roles.contains_key(&role) {
                    return Err(self.validation_error(format!(
                        "Collection '{}' references undefined min_write_role '{}'",
                        resource, role
                    )));
                }
            }

            for rule in &collection.field_rules {
                validate_required_string(&rule.field, "field_rules.field", self.domain_name())?;
                if !self.roles.contains_key(&rule.min_read_role) {
                    return Err(self.validation_error(format!(
                        "Field rule '{}.{}' references undefined role '{}'",
                        resource, rule.field, rule.min_read_role
                    )));
                }
            }

            if let Some(field) = &collection.facility_field {
                validate_required_string(field, "facility_field", self.domain_name())?;
            }
        }

        Ok(defined)
    }

    fn validate_role(
        &self,
        role: Role,
        definition: &RoleDefinition,
        collections: &HashSet<ResourceId>,
    ) -> ConfigResult<()> {
        let mut seen: HashSet<(ResourceId, Operation)> = HashSet::new();

        for grant in &definition.permissions {
            let resource = ResourceId::parse(&grant.resource).map_err(|e| {
                self.validation_error(format!("Role '{}' grant: {}", role, e))
            })?;

            if !collections.contains(&resource) {
                return Err(self.validation_error(format!(
                    "Role '{}' references undefined resource '{}'",
                    role, resource
                )));
            }

            if grant.operations.is_empty() {
                return Err(self.validation_error(format!(
                    "Role '{}' grant on '{}' has no operations",
                    role, resource
                )));
            }

            for operation in grant.operations.iter() {
                if !seen.insert((resource.clone(), operation)) {
                    return Err(self.validation_error(format!(
                        "Role '{}' grants '{}' on '{}' more than once",
                        role, operation, resource
                    )));
                }
            }

            for condition in &grant.conditions {
                validate_identifier(condition, "condition", self.domain_name())?;
            }
        }

        for parent in &definition.inherits_from {
            let parent_definition = self.roles.get(parent).ok_or_else(|| {
                self.validation_error(format!(
                    "Role '{}' inherits from undefined role '{}'",
                    role, parent
                ))
            })?;

            if parent_definition.level >= definition.level {
                return Err(self.validation_error(format!(
                    "Role '{}' may only inherit from lower roles, '{}' is not lower",
                    role, parent
                )));
            }
        }

        for permission in &definition.special_permissions {
            validate_identifier(permission, "special_permissions", self.domain_name())?;
        }

        Ok(())
    }
}

impl Validatable for SecurityDefinitions {
    fn validate(&self) -> ConfigResult<()> {
        if self.roles.is_empty() {
            return Err(self.validation_error("At least one role must be defined"));
        }

        let mut levels: HashMap<u32, Role> = HashMap::new();
        for (role, definition) in &self.roles {
            if let Some(other) = levels.insert(definition.level, *role) {
                return Err(self.validation_error(format!(
                    "Roles '{}' and '{}' share level {}",
                    other, role, definition.level
                )));
            }
        }

        if let Some(maximal) = self.maximal_role() {
            if self.roles.get(&maximal).is_some_and(|d| d.facility_scoped) {
                return Err(self.validation_error(format!(
                    "Maximal role '{}' must not be facility scoped",
                    maximal
                )));
            }
        }

        let collections = self.validate_collections()?;

        for (role, definition) in &self.roles {
            self.validate_role(*role, definition, &collections)?;
        }

        let mut visited = HashSet::new();
        for role in self.roles.keys() {
            self.check_inheritance_cycle(*role, &mut visited, &mut Vec::new())?;
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "security"
    }
}

fn grant(resource: &str, operations: OperationSet, conditions: &[&str]) -> GrantDefinition {
    GrantDefinition {
        resource: resource.to_string(),
        operations,
        conditions: conditions.iter().map(|c| c.to_string()).collect(),
    }
}

fn collection(facility_scoped: bool, min_write_role: Role) -> CollectionDefinition {
    CollectionDefinition {
        facility_scoped,
        min_write_role: Some(min_write_role),
        field_rules: Vec::new(),
        facility_field: None,
    }
}

fn special(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_definitions_are_valid() {
        let definitions = SecurityDefinitions::standard();
        assert!(definitions.validate().is_ok());
        assert_eq!(definitions.maximal_role(), Some(Role::Administrator));
        assert_eq!(definitions.roles.len(), 5);
    }

    #[test]
    fn test_wildcard_is_canonicalized() {
        let single: OperationSet = serde_yaml::from_str("\"*\"").unwrap();
        let list: OperationSet = serde_yaml::from_str("[\"*\"]").unwrap();
        assert_eq!(single, OperationSet::all());
        assert_eq!(list, OperationSet::all());

        let json = serde_json::to_string(&single).unwrap();
        assert_eq!(json, r#"["create","read","update","delete","list"]"#);
    }

    #[test]
    fn test_operation_list_parsing() {
        let ops: OperationSet = serde_yaml::from_str("[read, list, read]").unwrap();
        assert_eq!(ops, OperationSet::of(&[Operation::Read, Operation::List]));
        assert!(serde_yaml::from_str::<OperationSet>("[read, purge]").is_err());
    }

    #[test]
    fn test_undefined_resource_rejected() {
        let mut definitions = SecurityDefinitions::standard();
        if let Some(doctor) = definitions.roles.get_mut(&Role::Doctor) {
            doctor
                .permissions
                .push(grant("billing", OperationSet::of(&[Operation::Read]), &[]));
        }
        let err = definitions.validate().unwrap_err();
        assert!(err.to_string().contains("undefined resource 'billing'"));
    }

    #[test]
    fn test_duplicate_grant_rejected() {
        let mut definitions = SecurityDefinitions::standard();
        if let Some(nurse) = definitions.roles.get_mut(&Role::Nurse) {
            nurse.permissions.push(grant(
                "collections.patients",
                OperationSet::of(&[Operation::Read]),
                &[],
            ));
        }
        let err = definitions.validate().unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_shared_level_rejected() {
        let mut definitions = SecurityDefinitions::standard();
        if let Some(nurse) = definitions.roles.get_mut(&Role::Nurse) {
            nurse.level = 60;
        }
        assert!(definitions.validate().is_err());
    }

    #[test]
    fn test_scoped_maximal_role_rejected() {
        let mut definitions = SecurityDefinitions::standard();
        if let Some(admin) = definitions.roles.get_mut(&Role::Administrator) {
            admin.facility_scoped = true;
        }
        let err = definitions.validate().unwrap_err();
        assert!(err.to_string().contains("must not be facility scoped"));
    }

    #[test]
    fn test_inheritance_must_point_down() {
        let mut definitions = SecurityDefinitions::standard();
        if let Some(nurse) = definitions.roles.get_mut(&Role::Nurse) {
            nurse.inherits_from.push(Role::Doctor);
        }
        let err = definitions.validate().unwrap_err();
        assert!(err.to_string().contains("may only inherit from lower roles"));
    }

    #[test]
    fn test_undefined_min_write_role_rejected() {
        let mut definitions = SecurityDefinitions::standard();
        definitions.roles.remove(&Role::Nurse);
        let err = definitions.validate().unwrap_err();
        assert!(err.to_string().contains("undefined"));
    }

    #[test]
    fn test_collection_lookup_is_normalized() {
        let definitions = SecurityDefinitions::standard();
        let resource = ResourceId::parse("collections.vaccines").unwrap();
        let vaccines = definitions.collection(&resource).unwrap();
        assert!(!vaccines.facility_scoped);
    }

    #[test]
    fn test_yaml_section_parsing() {
        let yaml = r#"
roles:
  administrator:
    level: 10
    facility_scoped: false
    permissions:
      - resource: collections.patients
        operations: "*"
  user:
    level: 1
    permissions:
      - resource: patients
        operations: [read]
        conditions: [self_only]
collections:
  patients: {}
"#;
        let definitions: SecurityDefinitions = serde_yaml::from_str(yaml).unwrap();
        assert!(definitions.validate().is_ok());
        let user = &definitions.roles[&Role::User];
        assert!(user.facility_scoped);
        assert_eq!(user.permissions[0].conditions, vec!["self_only".to_string()]);
        assert!(definitions.collections["patients"].facility_scoped);
    }
}
