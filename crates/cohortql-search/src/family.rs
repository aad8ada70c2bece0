//! Criterion families.
//!
//! Every item type maps to exactly one family, and the family decides both
//! the validation bundle and the builder used for the item.

use cohortql_core::{Domain, PersonSet, SearchGroupItem};
use std::fmt;

use crate::builders;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CriterionFamily {
    /// ICD9, ICD10 and CPT code searches.
    Codes,
    Demographic,
    PhysicalMeasurement,
    Drug,
    Measurement,
    Visit,
    /// Plain concept search in one domain.
    Concept(Domain),
}

impl CriterionFamily {
    /// Resolve an item type, ignoring case. `None` for unknown types.
    #[must_use]
    pub fn from_item_type(item_type: &str) -> Option<Self> {
        let normalized = item_type.trim().to_ascii_uppercase();
        let family = match normalized.as_str() {
            "ICD9" | "ICD10" | "CPT" => Self::Codes,
            "DEMO" => Self::Demographic,
            "PM" => Self::PhysicalMeasurement,
            "DRUG" => Self::Drug,
            "MEAS" => Self::Measurement,
            "VISIT" => Self::Visit,
            other => Self::Concept(Domain::parse(other)?),
        };
        Some(family)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Codes => "code",
            Self::Demographic => "demographic",
            Self::PhysicalMeasurement => "physical measurement",
            Self::Drug => "drug",
            Self::Measurement => "measurement",
            Self::Visit => "visit",
            Self::Concept(_) => "concept",
        }
    }

    /// Demographic and physical-measurement criteria are not events.
    pub fn supports_modifiers(&self) -> bool {
        !matches!(self, Self::Demographic | Self::PhysicalMeasurement)
    }

    /// Build the person set for an already validated item.
    pub fn build(&self, item: &SearchGroupItem) -> Result<PersonSet> {
        let params = item.search_parameters.as_slice();
        match self {
            Self::Codes => builders::codes::build(params, &item.modifiers),
            Self::Demographic => builders::demographic::build(params),
            Self::PhysicalMeasurement => builders::physical::build(params),
            Self::Drug => builders::concept::build(Domain::Drug, params, &item.modifiers),
            Self::Measurement => builders::measurement::build(params, &item.modifiers),
            Self::Visit => builders::concept::build_flat(Domain::Visit, params, &item.modifiers),
            Self::Concept(domain) => builders::concept::build(*domain, params, &item.modifiers),
        }
    }
}

impl fmt::Display for CriterionFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Concept(domain) => write!(f, "concept ({domain})"),
            other => f.write_str(other.name()),
        }
    }
}
