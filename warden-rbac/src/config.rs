//! Configuration snapshots and the loader that swaps them in

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use warden_config::{ConfigError, ConfigLoader, RoleDefinition, WardenConfig};
use warden_interfaces::{ConfigSource, Principal, ResourceId, Role};

use crate::conditions::ConditionRegistry;
use crate::error::{RbacError, RbacResult};
use crate::models::{CollectionSecurity, FieldRule, ResourceContext, RoleGrant, RoleSpec, RuleTable};
use crate::roles::RoleHierarchy;
use crate::tenant::FacilityScopeResolver;

/// Immutable security state derived from one validated configuration
///
/// Snapshots are replaced wholesale on reload and never mutated in place.
#[derive(Debug)]
pub struct SecuritySnapshot {
    pub generation: u64,
    pub loaded_at: DateTime<Utc>,
    /// Description of the source the snapshot was loaded from
    pub origin: String,
    pub config: WardenConfig,
    pub hierarchy: Arc<RoleHierarchy>,
    pub roles: Arc<HashMap<Role, RoleSpec>>,
    pub rules: RuleTable,
    pub scope: FacilityScopeResolver,
    pub conditions: ConditionRegistry,
}

impl SecuritySnapshot {
    /// Build a snapshot, failing on any structural inconsistency
    pub fn build(
        config: WardenConfig,
        custom_conditions: &ConditionRegistry,
        generation: u64,
        origin: impl Into<String>,
    ) -> RbacResult<Self> {
        config.validate_all()?;
        let security = &config.security;

        let levels = security
            .roles
            .iter()
            .map(|(role, definition)| (*role, definition.level))
            .collect();
        let hierarchy = Arc::new(RoleHierarchy::from_levels(levels)?);

        let roles: Arc<HashMap<Role, RoleSpec>> = Arc::new(
            security
                .roles
                .iter()
                .map(|(role, definition)| (*role, role_spec(*role, definition)))
                .collect(),
        );

        let mut collections = HashMap::new();
        for (name, definition) in &security.collections {
            let resource = parse_resource(name)?;
            let facility_field = definition
                .facility_field
                .clone()
                .unwrap_or_else(|| config.query.facility_field.clone());

            collections.insert(
                resource.clone(),
                CollectionSecurity {
                    resource,
                    facility_scoped: definition.facility_scoped,
                    min_write_role: definition.min_write_role,
                    field_rules: definition
                        .field_rules
                        .iter()
                        .map(|rule| FieldRule {
                            field: rule.field.clone(),
                            min_read_role: rule.min_read_role,
                        })
                        .collect(),
                    facility_field,
                },
            );
        }

        let rules = build_rule_table(&security.roles)?;

        let conditions =
            ConditionRegistry::builtin(hierarchy.clone(), roles.clone()).merged_with(custom_conditions);
        let mut unknown: Vec<&str> = rules
            .condition_names()
            .into_iter()
            .filter(|name| !conditions.contains(name))
            .collect();
        if !unknown.is_empty() {
            unknown.sort_unstable();
            return Err(ConfigError::ValidationError(format!(
                "No predicate registered for condition(s): {}",
                unknown.join(", ")
            ))
            .into());
        }

        let scope =
            FacilityScopeResolver::new(collections, hierarchy.clone(), config.query.facility_field.clone());

        Ok(Self {
            generation,
            loaded_at: Utc::now(),
            origin: origin.into(),
            config,
            hierarchy,
            roles,
            rules,
            scope,
            conditions,
        })
    }

    pub fn role_spec(&self, role: Role) -> Option<&RoleSpec> {
        self.roles.get(&role)
    }

    /// Whether any role of the principal carries the special permission
    pub fn has_special_permission(&self, principal: &Principal, permission: &str) -> bool {
        principal.roles.iter().any(|role| {
            self.roles
                .get(role)
                .is_some_and(|spec| spec.has_special_permission(permission))
        })
    }

    pub fn is_known_resource(&self, resource: &ResourceId) -> bool {
        self.scope.collection(resource).is_some() || self.rules.has_resource(resource)
    }
}

fn role_spec(role: Role, definition: &RoleDefinition) -> RoleSpec {
    let display_name = if definition.display_name.is_empty() {
        role.to_string()
    } else {
        definition.display_name.clone()
    };

    RoleSpec {
        role,
        display_name,
        level: definition.level,
        facility_scoped: definition.facility_scoped,
        special_permissions: definition.special_permissions.iter().cloned().collect(),
    }
}

fn parse_resource(name: &str) -> RbacResult<ResourceId> {
    ResourceId::parse(name)
        .map_err(|e| RbacError::Configuration(ConfigError::ValidationError(e.to_string())))
}

/// Explicit rule table with inherited grants merged in
///
/// A role's own grant for a (resource, operation) pair takes precedence over any
/// grant inherited from a lower role.
fn build_rule_table(roles: &HashMap<Role, RoleDefinition>) -> RbacResult<RuleTable> {
    let mut table = RuleTable::new();

    for (role, definition) in roles {
        for grant in &definition.permissions {
            let resource = parse_resource(&grant.resource)?;
            for operation in grant.operations.iter() {
                table.insert(
                    resource.clone(),
                    operation,
                    *role,
                    RoleGrant {
                        conditions: grant.conditions.clone(),
                        inherited_from: None,
                    },
                );
            }
        }
    }

    for (role, definition) in roles {
        for ancestor in inherited_roles(roles, definition) {
            let Some(inherited) = roles.get(&ancestor) else {
                continue;
            };
            for grant in &inherited.permissions {
                let resource = parse_resource(&grant.resource)?;
                for operation in grant.operations.iter() {
                    table.insert(
                        resource.clone(),
                        operation,
                        *role,
                        RoleGrant {
                            conditions: grant.conditions.clone(),
                            inherited_from: Some(ancestor),
                        },
                    );
                }
            }
        }
    }

    Ok(table)
}

/// Transitive `inherits_from` closure, nearest first
fn inherited_roles(roles: &HashMap<Role, RoleDefinition>, definition: &RoleDefinition) -> Vec<Role> {
    let mut seen = HashSet::new();
    let mut ordered = Vec::new();
    let mut pending: Vec<Role> = definition.inherits_from.iter().rev().copied().collect();

    while let Some(role) = pending.pop() {
        if !seen.insert(role) {
            continue;
        }
        ordered.push(role);
        if let Some(parent) = roles.get(&role) {
            pending.extend(parent.inherits_from.iter().rev().copied());
        }
    }

    ordered
}

/// Loads configuration from a source and keeps the current snapshot
pub struct ConfigurationLoader {
    source: Arc<dyn ConfigSource>,
    parser: ConfigLoader,
    custom_conditions: RwLock<ConditionRegistry>,
    current: RwLock<Option<Arc<SecuritySnapshot>>>,
    reload_lock: Mutex<()>,
    generation: AtomicU64,
}

impl ConfigurationLoader {
    pub fn new(source: Arc<dyn ConfigSource>) -> Self {
        Self::with_parser(source, ConfigLoader::new())
    }

    /// Use a custom parser, e.g. one with a different environment prefix
    pub fn with_parser(source: Arc<dyn ConfigSource>, parser: ConfigLoader) -> Self {
        Self {
            source,
            parser,
            custom_conditions: RwLock::new(ConditionRegistry::new()),
            current: RwLock::new(None),
            reload_lock: Mutex::new(()),
            generation: AtomicU64::new(0),
        }
    }

    /// Replace the custom condition predicates used by subsequent loads
    pub fn with_conditions(self, conditions: ConditionRegistry) -> Self {
        *self.custom_conditions.write() = conditions;
        self
    }

    /// Register a custom condition predicate for subsequent loads
    pub fn register_condition<F>(&self, name: impl Into<String>, predicate: F)
    where
        F: Fn(&Principal, &ResourceContext) -> bool + Send + Sync + 'static,
    {
        self.custom_conditions.write().register(name, predicate);
    }

    /// Fetch, validate and build a snapshot without swapping it in
    async fn prepare(&self, generation: u64) -> RbacResult<SecuritySnapshot> {
        let document = self
            .source
            .fetch()
            .await
            .map_err(|e| RbacError::unavailable(format!("{}: {}", self.source.describe(), e)))?;

        let config = self.parser.from_document(&document)?;
        let custom = self.custom_conditions.read().clone();
        SecuritySnapshot::build(config, &custom, generation, document.origin)
    }

    /// Load the configuration and atomically replace the current snapshot
    ///
    /// On failure the previous snapshot stays in service.
    pub async fn reload_all(&self) -> RbacResult<Arc<SecuritySnapshot>> {
        let _guard = self.reload_lock.lock().await;
        let generation = self.generation.load(Ordering::SeqCst) + 1;

        match self.prepare(generation).await {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                *self.current.write() = Some(snapshot.clone());
                self.generation.store(generation, Ordering::SeqCst);

                info!(
                    generation,
                    origin = %snapshot.origin,
                    roles = snapshot.roles.len(),
                    rules = snapshot.rules.len(),
                    "Loaded authorization configuration"
                );
                Ok(snapshot)
            }
            Err(e) => {
                error!(
                    source = %self.source.describe(),
                    error = %e,
                    "Failed to load authorization configuration"
                );
                Err(e)
            }
        }
    }

    /// Dry run of a reload
    pub async fn validate(&self) -> RbacResult<()> {
        let generation = self.generation.load(Ordering::SeqCst) + 1;
        let snapshot = self.prepare(generation).await?;
        debug!(origin = %snapshot.origin, "Configuration validated");
        Ok(())
    }

    pub fn current(&self) -> Option<Arc<SecuritySnapshot>> {
        self.current.read().clone()
    }

    /// Current snapshot, or an error while no configuration is loaded
    pub fn snapshot(&self) -> RbacResult<Arc<SecuritySnapshot>> {
        self.current()
            .ok_or_else(|| RbacError::unavailable("no configuration loaded"))
    }

    /// JSON view of one configuration section
    pub fn get_configuration(&self, name: &str) -> RbacResult<serde_json::Value> {
        Ok(self.snapshot()?.config.section(name)?)
    }

    pub fn is_loaded(&self) -> bool {
        self.current.read().is_some()
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn watch_path(&self) -> Option<PathBuf> {
        self.source.watch_path()
    }

    pub fn describe(&self) -> String {
        self.source.describe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_config::{GrantDefinition, OperationSet, StaticConfigSource};
    use warden_interfaces::Operation;

    fn loader(content: &str) -> (Arc<StaticConfigSource>, ConfigurationLoader) {
        let source = Arc::new(StaticConfigSource::yaml(content));
        let loader =
            ConfigurationLoader::with_parser(source.clone(), ConfigLoader::with_prefix("WARDEN_RBAC_UNIT"));
        (source, loader)
    }

    #[test]
    fn test_standard_snapshot() {
        let snapshot =
            SecuritySnapshot::build(WardenConfig::default(), &ConditionRegistry::new(), 1, "test").unwrap();

        let patients = ResourceId::parse("patients").unwrap();
        assert_eq!(snapshot.hierarchy.administrator(), Role::Administrator);
        assert!(snapshot.rules.grant(Role::Nurse, &patients, Operation::Read).is_some());
        assert!(snapshot.rules.grant(Role::Supervisor, &patients, Operation::Delete).is_none());
        assert_eq!(
            snapshot
                .rules
                .grant(Role::Doctor, &patients, Operation::Update)
                .map(|grant| grant.conditions.clone()),
            Some(vec!["clinical_access".to_string()])
        );
        assert!(snapshot.is_known_resource(&patients));
    }

    #[test]
    fn test_inherited_grants() {
        let mut config = WardenConfig::default();
        let doctor = config.security.roles.get_mut(&Role::Doctor).unwrap();
        doctor.inherits_from = vec![Role::User];

        let snapshot = SecuritySnapshot::build(config, &ConditionRegistry::new(), 1, "test").unwrap();
        let users = ResourceId::parse("users").unwrap();
        let patients = ResourceId::parse("patients").unwrap();

        let inherited = snapshot.rules.grant(Role::Doctor, &users, Operation::Read).unwrap();
        assert_eq!(inherited.inherited_from, Some(Role::User));
        assert_eq!(inherited.conditions, vec!["self_only".to_string()]);

        let own = snapshot.rules.grant(Role::Doctor, &patients, Operation::Read).unwrap();
        assert_eq!(own.inherited_from, None);
    }

    #[test]
    fn test_unregistered_condition_fails() {
        let mut config = WardenConfig::default();
        config
            .security
            .roles
            .get_mut(&Role::Nurse)
            .unwrap()
            .permissions
            .push(GrantDefinition {
                resource: "reports".to_string(),
                operations: OperationSet::of(&[Operation::Read]),
                conditions: vec!["business_hours".to_string()],
            });

        let err = SecuritySnapshot::build(config.clone(), &ConditionRegistry::new(), 1, "test").unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("business_hours"));

        let mut custom = ConditionRegistry::new();
        custom.register("business_hours", |_, _| true);
        assert!(SecuritySnapshot::build(config, &custom, 1, "test").is_ok());
    }

    #[tokio::test]
    async fn test_failed_reload_keeps_snapshot() {
        let (source, loader) = loader("cache:\n  ttl: 60\n");
        assert!(!loader.is_loaded());
        assert!(loader.snapshot().is_err());

        let first = loader.reload_all().await.unwrap();
        assert_eq!(first.generation, 1);
        assert_eq!(first.origin, "static");

        source.replace_content("cache:\n  ttl: 0\n");
        assert!(loader.validate().await.is_err());
        assert!(loader.reload_all().await.is_err());

        let current = loader.snapshot().unwrap();
        assert_eq!(current.generation, 1);
        assert_eq!(loader.generation(), 1);
    }

    #[tokio::test]
    async fn test_get_configuration() {
        let (_, loader) = loader("query:\n  default_page_size: 20\n");
        assert!(loader.get_configuration("query").unwrap_err().is_configuration());

        loader.reload_all().await.unwrap();
        let query = loader.get_configuration("query").unwrap();
        assert_eq!(query["default_page_size"], 20);
        assert!(loader.get_configuration("secrets").is_err());
    }
}
