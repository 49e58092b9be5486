//! Facility-aware query construction

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use warden_interfaces::{
    DataSource, FacilityId, FilterClause, Page, Pagination, Principal, QueryDescriptor, ResourceId,
};

use crate::config::SecuritySnapshot;
use crate::error::{RbacError, RbacResult};
use crate::tenant::FacilityAccess;

/// Caller-supplied query parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    /// Field filters; arrays mean "one of"
    #[serde(default)]
    pub filters: Map<String, JsonValue>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub offset: u32,
}

impl QueryRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, field: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.filters.insert(field.into(), value.into());
        self
    }

    pub fn page(mut self, limit: u32, offset: u32) -> Self {
        self.limit = Some(limit);
        self.offset = offset;
        self
    }
}

/// A query whose facility restriction is already in place
///
/// Only [`SecureQueryBuilder`] can construct one, so a descriptor reaching the
/// data source always carries the implicit facility filter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SecureQuery {
    descriptor: QueryDescriptor,
    principal_id: String,
    generation: u64,
}

impl SecureQuery {
    pub fn descriptor(&self) -> &QueryDescriptor {
        &self.descriptor
    }

    pub fn resource(&self) -> &ResourceId {
        &self.descriptor.resource
    }

    pub fn filters(&self) -> &[FilterClause] {
        &self.descriptor.filters
    }

    pub fn excluded_fields(&self) -> &[String] {
        &self.descriptor.excluded_fields
    }

    pub fn pagination(&self) -> Pagination {
        self.descriptor.pagination
    }

    pub fn principal_id(&self) -> &str {
        &self.principal_id
    }

    /// Configuration generation the query was built under
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

pub struct SecureQueryBuilder;

impl SecureQueryBuilder {
    /// Merge caller filters with the mandatory facility filter
    ///
    /// The facility clause comes first. A caller value for the facility field is
    /// only accepted when every facility it names belongs to the principal, and
    /// then narrows the result further.
    pub fn build(
        snapshot: &SecuritySnapshot,
        principal: &Principal,
        resource: &ResourceId,
        request: &QueryRequest,
    ) -> RbacResult<SecureQuery> {
        let facility_field = snapshot.scope.facility_field(resource).to_string();
        let mut filters = Vec::with_capacity(request.filters.len() + 1);

        let restricted = snapshot.scope.is_facility_scoped(resource);
        let access = snapshot.scope.accessible_facilities(principal);

        if restricted {
            if let FacilityAccess::Only(facilities) = &access {
                let values: Vec<JsonValue> = facilities
                    .iter()
                    .map(|facility| JsonValue::String(facility.to_string()))
                    .collect();

                match values.len() {
                    0 => {
                        return Err(RbacError::invalid_context(format!(
                            "principal '{}' has no facility to query {} in",
                            principal.id, resource
                        )))
                    }
                    1 => filters.push(FilterClause::equals(facility_field.clone(), values[0].clone())),
                    _ => filters.push(FilterClause::one_of(facility_field.clone(), values)),
                }
            }
        }

        for (field, value) in &request.filters {
            if restricted && *field == facility_field {
                check_requested_facilities(&access, value)?;
            }

            filters.push(match value {
                JsonValue::Array(values) => FilterClause::one_of(field.clone(), values.clone()),
                other => FilterClause::equals(field.clone(), other.clone()),
            });
        }

        let settings = &snapshot.config.query;
        let limit = request
            .limit
            .unwrap_or(settings.default_page_size)
            .clamp(1, settings.max_page_size);

        Ok(SecureQuery {
            descriptor: QueryDescriptor {
                resource: resource.clone(),
                filters,
                excluded_fields: snapshot.scope.hidden_fields(principal, resource),
                pagination: Pagination::new(limit, request.offset),
            },
            principal_id: principal.id.clone(),
            generation: snapshot.generation,
        })
    }

    /// Run a secure query and strip fields the principal may not read
    pub async fn execute(data_source: &dyn DataSource, query: &SecureQuery) -> RbacResult<Page> {
        let mut page = data_source.execute(&query.descriptor).await?;

        if !query.descriptor.excluded_fields.is_empty() {
            for item in &mut page.items {
                if let JsonValue::Object(record) = item {
                    for field in &query.descriptor.excluded_fields {
                        record.remove(field);
                    }
                }
            }
        }

        Ok(page)
    }
}

fn check_requested_facilities(access: &FacilityAccess, value: &JsonValue) -> RbacResult<()> {
    let requested: Vec<&JsonValue> = match value {
        JsonValue::Array(values) => values.iter().collect(),
        other => vec![other],
    };

    for value in requested {
        let facility = match value {
            JsonValue::String(s) => FacilityId::new(s.clone()),
            JsonValue::Number(n) => FacilityId::new(n.to_string()),
            _ => return Err(RbacError::invalid_context("facility filter must be a string or number")),
        };

        if !access.allows(&facility) {
            return Err(RbacError::facility_mismatch(
                "facility filter outside the principal's facilities",
            ));
        }
    }

    Ok(())
}
