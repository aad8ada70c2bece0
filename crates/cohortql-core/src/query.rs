//! Typed query parameters and the compiled query handed to a warehouse.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt;
use time::{Date, OffsetDateTime};

use crate::domain::Domain;
use crate::plan::PersonSet;
use crate::time::{format_date, format_timestamp, truncate_to_micros};

/// Warehouse type of a bound parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ParameterType {
    Int64,
    Float64,
    String,
    Bool,
    Date,
    Timestamp,
    Array,
}

impl fmt::Display for ParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            Self::Int64 => "INT64",
            Self::Float64 => "FLOAT64",
            Self::String => "STRING",
            Self::Bool => "BOOL",
            Self::Date => "DATE",
            Self::Timestamp => "TIMESTAMP",
            Self::Array => "ARRAY",
        };
        f.write_str(tag)
    }
}

/// A value bound to a query placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterValue {
    Int64(i64),
    Float64(f64),
    String(String),
    Bool(bool),
    Date(Date),
    Timestamp(OffsetDateTime),
    Array(Vec<ParameterValue>),
}

impl ParameterValue {
    pub fn timestamp(ts: OffsetDateTime) -> Self {
        Self::Timestamp(truncate_to_micros(ts))
    }

    pub fn int64_array(values: &[i64]) -> Self {
        Self::Array(values.iter().copied().map(Self::Int64).collect())
    }

    pub fn type_tag(&self) -> ParameterType {
        match self {
            Self::Int64(_) => ParameterType::Int64,
            Self::Float64(_) => ParameterType::Float64,
            Self::String(_) => ParameterType::String,
            Self::Bool(_) => ParameterType::Bool,
            Self::Date(_) => ParameterType::Date,
            Self::Timestamp(_) => ParameterType::Timestamp,
            Self::Array(_) => ParameterType::Array,
        }
    }

    /// Element type of an array value; `None` for scalars and empty arrays.
    pub fn element_type(&self) -> Option<ParameterType> {
        match self {
            Self::Array(values) => values.first().map(Self::type_tag),
            _ => None,
        }
    }

    /// Inline SQL rendering for diagnostics.
    ///
    /// Timestamps become `TIMESTAMP '<utc>'`; every other value is written in
    /// its raw form. Never used for SQL sent to a warehouse.
    pub fn render_literal(&self) -> String {
        match self {
            Self::Timestamp(ts) => match format_timestamp(*ts) {
                Ok(formatted) => format!("TIMESTAMP '{formatted}'"),
                Err(_) => format!("TIMESTAMP '{ts}'"),
            },
            Self::Array(values) => {
                let items: Vec<String> = values.iter().map(Self::render_literal).collect();
                format!("[{}]", items.join(", "))
            }
            other => other.raw_string(),
        }
    }

    fn raw_string(&self) -> String {
        match self {
            Self::Int64(v) => v.to_string(),
            Self::Float64(v) => v.to_string(),
            Self::String(v) => v.clone(),
            Self::Bool(v) => v.to_string(),
            Self::Date(d) => format_date(*d).unwrap_or_else(|_| d.to_string()),
            Self::Timestamp(ts) => format_timestamp(*ts).unwrap_or_else(|_| ts.to_string()),
            Self::Array(_) => self.render_literal(),
        }
    }

    /// JSON form used by tooling output.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Int64(v) => json!(v),
            Self::Float64(v) => json!(v),
            Self::String(v) => json!(v),
            Self::Bool(v) => json!(v),
            Self::Date(_) | Self::Timestamp(_) => json!(self.raw_string()),
            Self::Array(values) => Value::Array(values.iter().map(Self::to_json).collect()),
        }
    }
}

impl From<i64> for ParameterValue {
    fn from(value: i64) -> Self {
        Self::Int64(value)
    }
}

impl From<f64> for ParameterValue {
    fn from(value: f64) -> Self {
        Self::Float64(value)
    }
}

impl From<bool> for ParameterValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for ParameterValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for ParameterValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Date> for ParameterValue {
    fn from(value: Date) -> Self {
        Self::Date(value)
    }
}

impl From<OffsetDateTime> for ParameterValue {
    fn from(value: OffsetDateTime) -> Self {
        Self::timestamp(value)
    }
}

impl<T: Into<ParameterValue>> From<Vec<T>> for ParameterValue {
    fn from(values: Vec<T>) -> Self {
        Self::Array(values.into_iter().map(Into::into).collect())
    }
}

// ============================================================================
// Compiled query
// ============================================================================

/// Shape of the result a cohort query produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CohortQueryKind {
    /// One row, one `count` column.
    #[default]
    Count,
    /// One `person_id` column, ordered ascending.
    PersonIds,
}

/// What a compiled query computes, independent of its SQL text.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryPlan {
    Cohort {
        set: PersonSet,
        kind: CohortQueryKind,
    },
    ParticipantEvents {
        domain: Domain,
        person_id: i64,
        limit: i64,
        offset: i64,
    },
}

/// SQL text with `@name` placeholders plus the values bound to them.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub sql: String,
    pub parameters: IndexMap<String, ParameterValue>,
    pub plan: QueryPlan,
}

impl CompiledQuery {
    pub fn parameter(&self, name: &str) -> Option<&ParameterValue> {
        self.parameters.get(name.trim_start_matches('@'))
    }
}

impl fmt::Display for CompiledQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sql)
    }
}
