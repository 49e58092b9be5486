//! Query descriptors and the data-access interface
//!
//! Query descriptors are backend neutral: a document store adapter translates the
//! AND-combined filter clauses into its own query language.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::InterfaceResult;
use crate::types::ResourceId;

/// Condition applied to a single field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "value", rename_all = "snake_case")]
pub enum FilterCondition {
    /// Field equals the value
    Equals(JsonValue),
    /// Field equals one of the values
    OneOf(Vec<JsonValue>),
}

impl FilterCondition {
    /// Check a field value against the condition
    pub fn matches(&self, candidate: &JsonValue) -> bool {
        match self {
            FilterCondition::Equals(expected) => loosely_equal(expected, candidate),
            FilterCondition::OneOf(options) => options.iter().any(|o| loosely_equal(o, candidate)),
        }
    }
}

/// A single field filter; clauses of a descriptor combine with AND semantics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterClause {
    pub field: String,
    pub condition: FilterCondition,
}

impl FilterClause {
    pub fn equals(field: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        Self {
            field: field.into(),
            condition: FilterCondition::Equals(value.into()),
        }
    }

    pub fn one_of(field: impl Into<String>, values: Vec<JsonValue>) -> Self {
        Self {
            field: field.into(),
            condition: FilterCondition::OneOf(values),
        }
    }

    /// Evaluate the clause against a JSON record; a missing field never matches
    pub fn matches(&self, record: &JsonValue) -> bool {
        record
            .get(&self.field)
            .is_some_and(|value| self.condition.matches(value))
    }
}

/// Numbers and strings are compared by their textual form so `2` matches `"2"`
fn loosely_equal(expected: &JsonValue, candidate: &JsonValue) -> bool {
    match (expected, candidate) {
        (JsonValue::String(a), JsonValue::Number(b)) | (JsonValue::Number(b), JsonValue::String(a)) => {
            *a == b.to_string()
        }
        _ => expected == candidate,
    }
}

/// Page request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub limit: u32,
    pub offset: u32,
}

impl Pagination {
    pub fn new(limit: u32, offset: u32) -> Self {
        Self { limit, offset }
    }
}

/// Backend neutral query description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryDescriptor {
    pub resource: ResourceId,
    pub filters: Vec<FilterClause>,
    /// Fields the caller is not allowed to see
    pub excluded_fields: Vec<String>,
    pub pagination: Pagination,
}

impl QueryDescriptor {
    /// Check a record against every filter clause
    pub fn matches(&self, record: &JsonValue) -> bool {
        self.filters.iter().all(|clause| clause.matches(record))
    }
}

/// One page of query results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub items: Vec<JsonValue>,
    pub total: u64,
    pub limit: u32,
    pub offset: u32,
}

impl Page {
    pub fn has_more(&self) -> bool {
        (self.offset as u64) + (self.items.len() as u64) < self.total
    }
}

/// Document/data store that executes secure queries
#[async_trait]
pub trait DataSource: Send + Sync {
    async fn execute(&self, query: &QueryDescriptor) -> InterfaceResult<Page>;
}
