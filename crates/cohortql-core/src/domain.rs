//! Static domain registry.
//!
//! Maps each clinical domain to its raw warehouse table, its denormalized
//! search table and the columns that carry concept ids and entry dates.
//! The registry is a `static` slice: it is immutable for the life of the
//! process and safe for unsynchronized concurrent reads.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::DomainResolutionError;

/// Tables outside the per-domain registry.
pub mod tables {
    pub const PERSON: &str = "person";
    pub const DEATH: &str = "death";
    pub const CRITERIA: &str = "cb_criteria";
    pub const CRITERIA_ANCESTOR: &str = "cb_criteria_ancestor";
}

/// Clinical domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Domain {
    Condition,
    Procedure,
    Observation,
    Measurement,
    Drug,
    Device,
    Visit,
}

/// One registry entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DomainTableMapping {
    pub domain: Domain,
    pub table_name: &'static str,
    pub denormalized_table_name: &'static str,
    pub concept_id_column: &'static str,
    pub source_concept_id_column: &'static str,
    pub entry_date_column: &'static str,
}

static REGISTRY: [DomainTableMapping; 7] = [
    DomainTableMapping {
        domain: Domain::Condition,
        table_name: "condition_occurrence",
        denormalized_table_name: "person_condition",
        concept_id_column: "condition_concept_id",
        source_concept_id_column: "condition_source_concept_id",
        entry_date_column: "condition_start_date",
    },
    DomainTableMapping {
        domain: Domain::Procedure,
        table_name: "procedure_occurrence",
        denormalized_table_name: "person_procedure",
        concept_id_column: "procedure_concept_id",
        source_concept_id_column: "procedure_source_concept_id",
        entry_date_column: "procedure_date",
    },
    DomainTableMapping {
        domain: Domain::Observation,
        table_name: "observation",
        denormalized_table_name: "person_observation",
        concept_id_column: "observation_concept_id",
        source_concept_id_column: "observation_source_concept_id",
        entry_date_column: "observation_date",
    },
    DomainTableMapping {
        domain: Domain::Measurement,
        table_name: "measurement",
        denormalized_table_name: "person_measurement",
        concept_id_column: "measurement_concept_id",
        source_concept_id_column: "measurement_source_concept_id",
        entry_date_column: "measurement_date",
    },
    DomainTableMapping {
        domain: Domain::Drug,
        table_name: "drug_exposure",
        denormalized_table_name: "person_drug",
        concept_id_column: "drug_concept_id",
        source_concept_id_column: "drug_source_concept_id",
        entry_date_column: "drug_exposure_start_date",
    },
    DomainTableMapping {
        domain: Domain::Device,
        table_name: "device_exposure",
        denormalized_table_name: "person_device",
        concept_id_column: "device_concept_id",
        source_concept_id_column: "device_source_concept_id",
        entry_date_column: "device_exposure_start_date",
    },
    DomainTableMapping {
        domain: Domain::Visit,
        table_name: "visit_occurrence",
        denormalized_table_name: "person_visit",
        concept_id_column: "visit_concept_id",
        source_concept_id_column: "visit_source_concept_id",
        entry_date_column: "visit_start_date",
    },
];

impl Domain {
    pub const ALL: [Domain; 7] = [
        Domain::Condition,
        Domain::Procedure,
        Domain::Observation,
        Domain::Measurement,
        Domain::Drug,
        Domain::Device,
        Domain::Visit,
    ];

    /// Parse a domain id, ignoring case.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|d| d.as_str().eq_ignore_ascii_case(s))
    }

    /// Canonical upper-case id, as stored in `cb_criteria.domain_id`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Condition => "CONDITION",
            Domain::Procedure => "PROCEDURE",
            Domain::Observation => "OBSERVATION",
            Domain::Measurement => "MEASUREMENT",
            Domain::Drug => "DRUG",
            Domain::Device => "DEVICE",
            Domain::Visit => "VISIT",
        }
    }

    /// Whether concept ids in this domain expand through the criteria hierarchy.
    pub fn supports_hierarchy(&self) -> bool {
        matches!(
            self,
            Domain::Condition | Domain::Procedure | Domain::Measurement | Domain::Drug
        )
    }

    /// Registry entry for this domain.
    pub fn mapping(&self) -> &'static DomainTableMapping {
        // REGISTRY is laid out in `Domain::ALL` order.
        &REGISTRY[*self as usize]
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Domain {
    type Err = DomainResolutionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| DomainResolutionError::new(s))
    }
}

// ============================================================================
// Lookup API
// ============================================================================

/// Case-insensitive registry lookup. Unknown ids yield `None`.
pub fn lookup(domain_id: &str) -> Option<&'static DomainTableMapping> {
    REGISTRY
        .iter()
        .find(|m| m.domain.as_str().eq_ignore_ascii_case(domain_id))
}

/// Registry lookup that reports unknown ids as a [`DomainResolutionError`].
pub fn resolve(domain_id: &str) -> Result<&'static DomainTableMapping, DomainResolutionError> {
    lookup(domain_id).ok_or_else(|| DomainResolutionError::new(domain_id))
}

pub fn table_name_for(domain_id: &str) -> Option<&'static str> {
    lookup(domain_id).map(|m| m.table_name)
}

pub fn denormalized_table_name_for(domain_id: &str) -> Option<&'static str> {
    lookup(domain_id).map(|m| m.denormalized_table_name)
}

pub fn concept_id_column_for(domain_id: &str) -> Option<&'static str> {
    lookup(domain_id).map(|m| m.concept_id_column)
}

pub fn source_concept_id_column_for(domain_id: &str) -> Option<&'static str> {
    lookup(domain_id).map(|m| m.source_concept_id_column)
}

pub fn entry_date_column_for(domain_id: &str) -> Option<&'static str> {
    lookup(domain_id).map(|m| m.entry_date_column)
}

/// All registry entries.
pub fn all() -> &'static [DomainTableMapping] {
    &REGISTRY
}
