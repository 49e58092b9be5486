//! Document ACL generation and document-level access checks

use std::sync::Arc;

use warden_interfaces::{
    AccessLevel, AclEntry, AclSubject, DocumentDraft, FacilityId, Operation, Principal,
    ResourceId, StoredDocument,
};

use crate::config::{ConfigurationLoader, SecuritySnapshot};
use crate::error::{RbacError, RbacResult};
use crate::models::{DenialKind, PermissionDecision, ResourceContext};
use crate::permissions::{CheckOutcome, PermissionValidator};

/// Produces ACL entries for new documents and checks access to stored ones
pub struct DocumentSecurityGenerator {
    loader: Arc<ConfigurationLoader>,
    validator: Arc<PermissionValidator>,
}

impl DocumentSecurityGenerator {
    pub fn new(loader: Arc<ConfigurationLoader>, validator: Arc<PermissionValidator>) -> Self {
        Self { loader, validator }
    }

    /// ACL entries for a document the principal is about to create
    ///
    /// Entries are ordered: administrator read and write, facility team read, then
    /// write grants for every role at or above the collection's minimum write role,
    /// highest first.
    pub async fn generate_document_permissions(
        &self,
        principal: &Principal,
        resource_type: &str,
        draft: &DocumentDraft,
    ) -> RbacResult<Vec<AclEntry>> {
        if !principal.is_well_formed() {
            return Err(RbacError::invalid_context("principal has no id or no roles"));
        }
        let resource = ResourceId::parse(resource_type)
            .map_err(|e| RbacError::invalid_context(e.to_string()))?;
        let snapshot = self.loader.snapshot()?;

        let facility = self.target_facility(&snapshot, principal, &resource, draft)?;

        let context = ResourceContext {
            facility_id: facility.clone(),
            owner_id: Some(principal.id.clone()),
            ..ResourceContext::default()
        };
        let outcome = self
            .validator
            .check_resource(principal, &resource, Operation::Create, &context)
            .await;
        if !outcome.decision.allowed {
            return Err(RbacError::permission_denied(
                Operation::Create.as_str(),
                resource.as_str(),
                outcome.decision.reason,
            ));
        }

        Ok(build_acl(&snapshot, &resource, facility.as_ref()))
    }

    /// Facility a new document belongs to, `None` for unscoped collections
    fn target_facility(
        &self,
        snapshot: &SecuritySnapshot,
        principal: &Principal,
        resource: &ResourceId,
        draft: &DocumentDraft,
    ) -> RbacResult<Option<FacilityId>> {
        if !snapshot.scope.is_facility_scoped(resource) {
            return Ok(None);
        }

        let facility = match &draft.facility_id {
            Some(requested) => {
                if !snapshot.scope.can_access_facility(principal, requested) {
                    return Err(RbacError::facility_mismatch(format!(
                        "cannot create {} records outside the principal's facilities",
                        resource
                    )));
                }
                Some(requested.clone())
            }
            None => principal.primary_facility().cloned(),
        };

        // Facility-less role grants on a scoped record would reach every facility
        match facility {
            Some(facility) => Ok(Some(facility)),
            None => Err(RbacError::invalid_context(format!(
                "no facility to place the {} record in",
                resource
            ))),
        }
    }

    pub async fn check_document_access(
        &self,
        principal: &Principal,
        document: &StoredDocument,
        operation: Operation,
    ) -> CheckOutcome {
        self.check_document_access_with(principal, document, operation, ResourceContext::default())
            .await
    }

    /// Check access to a stored document
    ///
    /// The document's embedded facility and owner replace the corresponding fields
    /// of `context`.
    pub async fn check_document_access_with(
        &self,
        principal: &Principal,
        document: &StoredDocument,
        operation: Operation,
        context: ResourceContext,
    ) -> CheckOutcome {
        if let Some(snapshot) = self.loader.current() {
            let untagged = document.facility_id.is_none()
                && snapshot.scope.is_facility_scoped(&document.resource)
                && !snapshot.hierarchy.principal_is_administrator(principal);
            if untagged {
                return CheckOutcome::uncached(
                    PermissionDecision::deny(DenialKind::InvalidContext),
                    Some(snapshot.generation),
                );
            }
        }

        let context = ResourceContext {
            facility_id: document.facility_id.clone(),
            owner_id: document.owner_id.clone(),
            ..context
        };

        self.validator
            .check_resource(principal, &document.resource, operation, &context)
            .await
    }
}

fn build_acl(
    snapshot: &SecuritySnapshot,
    resource: &ResourceId,
    facility: Option<&FacilityId>,
) -> Vec<AclEntry> {
    let administrator = snapshot.hierarchy.administrator();
    let mut acl = vec![
        AclEntry::new(
            AclSubject::Role {
                role: administrator,
                facility_id: None,
            },
            AccessLevel::Read,
        ),
        AclEntry::new(
            AclSubject::Role {
                role: administrator,
                facility_id: None,
            },
            AccessLevel::Write,
        ),
    ];

    if let Some(facility) = facility {
        acl.push(AclEntry::new(
            AclSubject::Team {
                team: snapshot.scope.facility_team(facility),
            },
            AccessLevel::Read,
        ));
    }

    let min_write_role = snapshot
        .scope
        .collection(resource)
        .and_then(|collection| collection.min_write_role);
    if let Some(min_write_role) = min_write_role {
        for role in snapshot.hierarchy.roles_at_or_above(min_write_role) {
            if role == administrator {
                continue;
            }
            acl.push(AclEntry::new(
                AclSubject::Role {
                    role,
                    facility_id: facility.cloned(),
                },
                AccessLevel::Write,
            ));
        }
    }

    acl
}
