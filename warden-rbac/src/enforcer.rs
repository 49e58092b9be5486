//! Authorization engine: the explicit context object wiring every component
//!
//! The engine is constructed once at process start with its collaborators
//! injected, and torn down with [`AuthorizationEngine::shutdown`].

use chrono::Utc;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use warden_caching::CacheStats;
use warden_config::{AuditConfig, ConfigLoader, DecisionCacheConfig};
use warden_interfaces::{
    AclEntry, AuditEvent, AuditSink, ConfigSource, DataSource, DocumentDraft, FacilityId,
    IdentityStore, Operation, Page, Principal, ResourceId, Role, StoredDocument,
};

use crate::audit::{AuditDispatcher, TracingAuditSink};
use crate::cache::PermissionCache;
use crate::conditions::ConditionRegistry;
use crate::config::ConfigurationLoader;
use crate::documents::DocumentSecurityGenerator;
use crate::error::{RbacError, RbacResult};
use crate::memory::InMemoryIdentityStore;
use crate::models::{DenialKind, PermissionDecision, ResourceContext, RoleAssignment};
use crate::permissions::{CheckOutcome, PermissionValidator};
use crate::query::{QueryRequest, SecureQuery, SecureQueryBuilder};

/// Special permission required to assign roles
pub const MANAGE_USERS: &str = "manage_users";

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Builder for [`AuthorizationEngine`]
pub struct AuthorizationEngineBuilder {
    source: Option<Arc<dyn ConfigSource>>,
    identity: Option<Arc<dyn IdentityStore>>,
    audit_sink: Option<Arc<dyn AuditSink>>,
    parser: ConfigLoader,
    conditions: ConditionRegistry,
    lenient_start: bool,
}

impl AuthorizationEngineBuilder {
    pub fn new() -> Self {
        Self {
            source: None,
            identity: None,
            audit_sink: None,
            parser: ConfigLoader::new(),
            conditions: ConditionRegistry::new(),
            lenient_start: false,
        }
    }

    pub fn with_config_source(mut self, source: Arc<dyn ConfigSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_identity_store(mut self, identity: Arc<dyn IdentityStore>) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit_sink = Some(sink);
        self
    }

    /// Parser used for every load, e.g. with a custom environment prefix
    pub fn with_config_loader(mut self, parser: ConfigLoader) -> Self {
        self.parser = parser;
        self
    }

    /// Register a custom condition predicate
    pub fn with_condition<F>(mut self, name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Principal, &ResourceContext) -> bool + Send + Sync + 'static,
    {
        self.conditions.register(name, predicate);
        self
    }

    /// Start even if the initial load fails; every check is denied until a reload
    /// succeeds
    pub fn lenient_start(mut self) -> Self {
        self.lenient_start = true;
        self
    }

    pub async fn build(self) -> RbacResult<AuthorizationEngine> {
        let source = self
            .source
            .ok_or_else(|| RbacError::unavailable("no configuration source provided"))?;

        let loader =
            Arc::new(ConfigurationLoader::with_parser(source, self.parser).with_conditions(self.conditions));

        let cache_config = match loader.reload_all().await {
            Ok(snapshot) => snapshot.config.cache.clone(),
            Err(e) if self.lenient_start => {
                warn!("Starting without authorization configuration, denying all checks: {}", e);
                DecisionCacheConfig::default()
            }
            Err(e) => return Err(e),
        };

        let cache = PermissionCache::from_config(&cache_config);
        let validator = Arc::new(PermissionValidator::new(loader.clone(), cache.clone()));
        let documents = DocumentSecurityGenerator::new(loader.clone(), validator.clone());

        let identity = self
            .identity
            .unwrap_or_else(|| Arc::new(InMemoryIdentityStore::new()));
        let audit_sink = self.audit_sink.unwrap_or_else(|| Arc::new(TracingAuditSink));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let maintenance = cache.spawn_maintenance(shutdown_rx);

        info!(
            source = %loader.describe(),
            cache_enabled = cache.is_enabled(),
            "Authorization engine started"
        );

        Ok(AuthorizationEngine {
            loader,
            validator,
            documents,
            identity,
            audit: AuditDispatcher::new(audit_sink),
            cache_config: Mutex::new(cache_config),
            shutdown_tx,
            maintenance: Mutex::new(maintenance),
        })
    }
}

impl Default for AuthorizationEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Multi-tenant authorization engine
pub struct AuthorizationEngine {
    loader: Arc<ConfigurationLoader>,
    validator: Arc<PermissionValidator>,
    documents: DocumentSecurityGenerator,
    identity: Arc<dyn IdentityStore>,
    audit: AuditDispatcher,
    /// Settings the decision cache in service was built from
    cache_config: Mutex<DecisionCacheConfig>,
    shutdown_tx: watch::Sender<bool>,
    maintenance: Mutex<Option<JoinHandle<()>>>,
}

impl AuthorizationEngine {
    pub fn builder() -> AuthorizationEngineBuilder {
        AuthorizationEngineBuilder::new()
    }

    /// Check an operation for a principal resolved through the identity store
    ///
    /// An unknown principal id is an ordinary denial; only identity store failures
    /// are errors.
    pub async fn check_permission(
        &self,
        principal_id: &str,
        resource: &str,
        operation: Operation,
        context: &ResourceContext,
    ) -> RbacResult<PermissionDecision> {
        match self.identity.find_principal(principal_id).await? {
            Some(principal) => Ok(self
                .check_principal_permission(&principal, resource, operation, context)
                .await),
            None => {
                let outcome = CheckOutcome::uncached(
                    PermissionDecision::deny(DenialKind::InvalidContext),
                    self.loader.current().map(|snapshot| snapshot.generation),
                );
                self.record(principal_id, resource, operation, context, &outcome).await;
                Ok(outcome.decision)
            }
        }
    }

    /// Check an operation for an already resolved principal
    pub async fn check_principal_permission(
        &self,
        principal: &Principal,
        resource: &str,
        operation: Operation,
        context: &ResourceContext,
    ) -> PermissionDecision {
        let outcome = self.validator.check(principal, resource, operation, context).await;
        self.record(&principal.id, resource, operation, context, &outcome).await;
        outcome.decision
    }

    pub async fn generate_document_permissions(
        &self,
        principal: &Principal,
        resource_type: &str,
        draft: &DocumentDraft,
    ) -> RbacResult<Vec<AclEntry>> {
        self.documents
            .generate_document_permissions(principal, resource_type, draft)
            .await
    }

    pub async fn check_document_access(
        &self,
        principal: &Principal,
        document: &StoredDocument,
        operation: Operation,
    ) -> PermissionDecision {
        self.check_document_access_with(principal, document, operation, ResourceContext::default())
            .await
    }

    /// Document access check with extra context such as assigned principals
    pub async fn check_document_access_with(
        &self,
        principal: &Principal,
        document: &StoredDocument,
        operation: Operation,
        context: ResourceContext,
    ) -> PermissionDecision {
        let outcome = self
            .documents
            .check_document_access_with(principal, document, operation, context)
            .await;

        let context = ResourceContext::new();
        let context = match &document.facility_id {
            Some(facility) => context.for_facility(facility.clone()),
            None => context,
        };
        self.record(&principal.id, document.resource.as_str(), operation, &context, &outcome)
            .await;
        outcome.decision
    }

    /// Build a query restricted to the principal's facilities
    ///
    /// Requires `list` permission on the resource.
    pub async fn build_secure_query(
        &self,
        principal: &Principal,
        resource_type: &str,
        request: &QueryRequest,
    ) -> RbacResult<SecureQuery> {
        let resource = ResourceId::parse(resource_type)
            .map_err(|e| RbacError::invalid_context(e.to_string()))?;

        let context = ResourceContext::default();
        let outcome = self
            .validator
            .check_resource(principal, &resource, Operation::List, &context)
            .await;
        self.record(&principal.id, resource.as_str(), Operation::List, &context, &outcome)
            .await;

        if !outcome.decision.allowed {
            return Err(RbacError::permission_denied(
                Operation::List.as_str(),
                resource.as_str(),
                outcome.decision.reason,
            ));
        }

        let snapshot = self.loader.snapshot()?;
        SecureQueryBuilder::build(&snapshot, principal, &resource, request)
    }

    pub async fn execute_secure_query(
        &self,
        data_source: &dyn DataSource,
        query: &SecureQuery,
    ) -> RbacResult<Page> {
        SecureQueryBuilder::execute(data_source, query).await
    }

    /// Assign a role to a principal
    ///
    /// The actor must be an administrator or hold `manage_users`, and may only
    /// assign roles strictly below its own. Facility-scoped roles need a facility
    /// the actor can access. Cached decisions of the target are dropped before
    /// returning.
    pub async fn assign_role(
        &self,
        actor: &Principal,
        principal_id: &str,
        role: Role,
        facility_id: Option<FacilityId>,
    ) -> RbacResult<RoleAssignment> {
        if !actor.is_well_formed() {
            return Err(RbacError::invalid_context("actor has no id or no roles"));
        }
        let snapshot = self.loader.snapshot()?;
        let hierarchy = &snapshot.hierarchy;

        let Some(spec) = snapshot.role_spec(role) else {
            return Err(RbacError::UnknownRole {
                role: role.to_string(),
            });
        };

        let may_manage = hierarchy.principal_is_administrator(actor)
            || snapshot.has_special_permission(actor, MANAGE_USERS);
        if !may_manage || !hierarchy.principal_outranks(actor, role) {
            warn!(actor = %actor.id, target = principal_id, role = %role, "Rejected role assignment");
            return Err(RbacError::permission_denied(
                "assign_role",
                role.as_str(),
                "insufficient role level",
            ));
        }

        if spec.facility_scoped && facility_id.is_none() {
            return Err(RbacError::invalid_context(format!(
                "role '{}' requires a facility",
                role
            )));
        }
        if let Some(facility) = &facility_id {
            if !snapshot.scope.can_access_facility(actor, facility) {
                return Err(RbacError::facility_mismatch(
                    "cannot assign roles in a facility the actor does not belong to",
                ));
            }
        }

        self.identity
            .assign_role(principal_id, role, facility_id.as_ref())
            .await?;
        self.validator.cache().invalidate_principal(principal_id).await?;

        info!(
            actor = %actor.id,
            principal_id,
            role = %role,
            facility_id = facility_id.as_ref().map(|f| f.as_str()),
            "Role assigned"
        );

        Ok(RoleAssignment {
            principal_id: principal_id.to_string(),
            role,
            facility_id,
            assigned_by: actor.id.clone(),
            assigned_at: Utc::now(),
        })
    }

    /// Reload the configuration and drop every cached decision
    ///
    /// A changed `cache` section puts a freshly built decision cache in service.
    /// Returns the new configuration generation. On failure the previous
    /// configuration stays in service.
    pub async fn reload_all(&self) -> RbacResult<u64> {
        let snapshot = self.loader.reload_all().await?;
        match self.apply_cache_config(&snapshot.config.cache) {
            Some(retired) => retired.clear().await?,
            None => self.validator.cache().clear().await?,
        }
        Ok(snapshot.generation)
    }

    /// Rebuild the decision cache when its settings changed, returning the retired one
    fn apply_cache_config(&self, config: &DecisionCacheConfig) -> Option<PermissionCache> {
        let mut current = self.cache_config.lock();
        if *current == *config {
            return None;
        }

        let cache = PermissionCache::from_config(config);
        let retired = self.validator.replace_cache(cache.clone());

        let mut maintenance = self.maintenance.lock();
        if let Some(handle) = maintenance.take() {
            handle.abort();
        }
        if !*self.shutdown_tx.borrow() {
            *maintenance = cache.spawn_maintenance(self.shutdown_tx.subscribe());
        }

        info!(
            cache_enabled = cache.is_enabled(),
            ttl_secs = config.ttl.as_secs(),
            backend = ?config.backend,
            "Decision cache rebuilt from reloaded settings"
        );
        *current = config.clone();
        Some(retired)
    }

    /// Check the source's current configuration without applying it
    pub async fn validate(&self) -> RbacResult<()> {
        self.loader.validate().await
    }

    pub fn get_configuration(&self, name: &str) -> RbacResult<serde_json::Value> {
        self.loader.get_configuration(name)
    }

    pub async fn cache_stats(&self) -> RbacResult<CacheStats> {
        self.validator.cache().stats().await
    }

    pub async fn clear_cache(&self) -> RbacResult<()> {
        self.validator.cache().clear().await
    }

    /// Drop cached decisions of one principal
    pub async fn invalidate(&self, principal_id: &str) -> RbacResult<usize> {
        self.validator.cache().invalidate_principal(principal_id).await
    }

    pub fn evaluation_count(&self) -> u64 {
        self.validator.evaluation_count()
    }

    /// Whether a configuration is loaded
    pub fn is_ready(&self) -> bool {
        self.loader.is_loaded()
    }

    pub fn generation(&self) -> u64 {
        self.loader.generation()
    }

    pub fn watch_path(&self) -> Option<PathBuf> {
        self.loader.watch_path()
    }

    /// Stop background maintenance
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);

        let handle = self.maintenance.lock().take();
        if let Some(handle) = handle {
            if tokio::time::timeout(SHUTDOWN_TIMEOUT, handle).await.is_err() {
                warn!("Decision cache maintenance did not stop in time");
            }
        }

        info!("Authorization engine stopped");
    }

    fn audit_config(&self) -> AuditConfig {
        self.loader
            .current()
            .map(|snapshot| snapshot.config.audit.clone())
            .unwrap_or_default()
    }

    async fn record(
        &self,
        principal_id: &str,
        resource: &str,
        operation: Operation,
        context: &ResourceContext,
        outcome: &CheckOutcome,
    ) {
        let mut event = AuditEvent::new(
            principal_id,
            resource,
            operation,
            outcome.decision.allowed,
            outcome.decision.reason.clone(),
        );
        event.facility_id = context.facility_id.clone();
        event.cached = outcome.cached;
        event.generation = outcome.generation;

        self.audit.dispatch(&self.audit_config(), event).await;
    }
}
