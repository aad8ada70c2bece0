//! Cohort criteria compiler.
//!
//! Turns a [`SearchRequest`](cohortql_core::SearchRequest) into parameterized
//! BigQuery SQL in four steps:
//!
//! 1. [`RequestValidator`] checks the tree against the rule bundle of each
//!    item's [`CriterionFamily`].
//! 2. The family builders produce a [`PersonSet`](cohortql_core::PersonSet)
//!    plan per item, and the [`aggregator`] combines items and groups.
//! 3. [`SqlRenderer`] writes the plan as SQL, binding every value through a
//!    [`ParameterBinder`].
//! 4. [`CohortService`] hands the [`CompiledQuery`](cohortql_core::CompiledQuery)
//!    to a warehouse client and reads the result.
//!
//! ```ignore
//! use cohortql_search::{CohortCompiler, CompilerConfig};
//!
//! let compiler = CohortCompiler::new(CompilerConfig::default());
//! let query = compiler.compile(&request, &namespace, CohortQueryKind::Count)?;
//! println!("{}", format_for_log(&query.sql, &query.parameters));
//! ```

pub mod aggregator;
pub mod binder;
pub mod builders;
pub mod compiler;
pub mod error;
pub mod family;
pub mod render;
pub mod review;
pub mod service;
pub mod validation;

pub use binder::{ParameterBinder, QueryParameterBinding, format_for_log};
pub use compiler::{CohortCompiler, CompilerConfig};
pub use error::{CohortError, CompileError, Result, ValidationError};
pub use family::CriterionFamily;
pub use render::SqlRenderer;
pub use review::{EventPage, ParticipantEvent, participant_events_query};
pub use service::CohortService;
pub use validation::{Predicate, RequestValidator};
