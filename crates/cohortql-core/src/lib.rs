//! Core types for the cohort criteria compiler.
//!
//! This crate holds everything the compiler, the warehouse seam and the
//! configuration layer share: the criteria tree as it arrives over the wire,
//! the static domain registry, the dataset namespace used to qualify tables,
//! typed parameter values, and the person-set plan that compiled SQL mirrors.

pub mod domain;
pub mod error;
pub mod model;
pub mod namespace;
pub mod plan;
pub mod query;
pub mod time;

pub use domain::{Domain, DomainTableMapping, tables};
pub use error::{CoreError, DomainResolutionError, ErrorCategory, Result};
pub use model::{
    Attribute, Modifier, ModifierType, Operator, SearchGroup, SearchGroupItem, SearchParameter,
    SearchRequest,
};
pub use namespace::DatasetNamespace;
pub use plan::{
    AgeColumn, Comparison, DemographicColumn, DemographicQuery, EventPredicate, EventQuery,
    EventSource, ExpansionStrategy, PersonSet, ValueColumn,
};
pub use query::{CohortQueryKind, CompiledQuery, ParameterType, ParameterValue, QueryPlan};
