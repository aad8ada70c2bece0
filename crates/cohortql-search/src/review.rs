//! Participant review queries.
//!
//! Lists one participant's events in a domain straight from the raw domain
//! table, using the registry's column names.

use cohortql_core::time::{iso_date, parse_date};
use cohortql_core::{CompiledQuery, DatasetNamespace, Domain, QueryPlan};
use cohortql_warehouse::{QueryRows, WarehouseError};
use serde::{Deserialize, Serialize};
use time::Date;

use crate::binder::ParameterBinder;

/// Page size and offset for a review listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventPage {
    pub limit: i64,
    pub offset: i64,
}

impl Default for EventPage {
    fn default() -> Self {
        Self {
            limit: 25,
            offset: 0,
        }
    }
}

impl EventPage {
    pub fn new(limit: i64, offset: i64) -> Self {
        Self {
            limit: limit.max(0),
            offset: offset.max(0),
        }
    }
}

/// One row of a review listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantEvent {
    pub person_id: i64,
    #[serde(with = "iso_date")]
    pub entry_date: Date,
    pub standard_concept_id: Option<i64>,
    pub source_concept_id: Option<i64>,
}

impl ParticipantEvent {
    pub fn from_rows(rows: &QueryRows) -> Result<Vec<Self>, WarehouseError> {
        rows.iter()
            .map(|row| -> Result<Self, WarehouseError> {
                let person_id = row
                    .get_i64("person_id")?
                    .ok_or_else(|| WarehouseError::type_mismatch("person_id", "a non-null INT64"))?;
                let entry_date = row
                    .get_str("entry_date")?
                    .and_then(|s| parse_date(s).ok())
                    .ok_or_else(|| WarehouseError::type_mismatch("entry_date", "a DATE"))?;
                Ok(Self {
                    person_id,
                    entry_date,
                    standard_concept_id: row.get_i64("standard_concept_id")?,
                    source_concept_id: row.get_i64("source_concept_id")?,
                })
            })
            .collect()
    }
}

/// Newest-first page of `person_id`'s events in `domain`.
pub fn participant_events_query(
    namespace: &DatasetNamespace,
    domain: Domain,
    person_id: i64,
    page: EventPage,
) -> CompiledQuery {
    let mapping = domain.mapping();
    let mut binder = ParameterBinder::new();
    let person = binder.bind(person_id);
    let limit = binder.bind(page.limit);
    let offset = binder.bind(page.offset);

    let sql = format!(
        "SELECT person_id, {entry} AS entry_date, {concept} AS standard_concept_id, \
         {source} AS source_concept_id\nFROM {table}\nWHERE person_id = {person}\n\
         ORDER BY entry_date DESC\nLIMIT {limit} OFFSET {offset}",
        entry = mapping.entry_date_column,
        concept = mapping.concept_id_column,
        source = mapping.source_concept_id_column,
        table = namespace.qualify(mapping.table_name),
    );

    CompiledQuery {
        sql,
        parameters: binder.into_parameters(),
        plan: QueryPlan::ParticipantEvents {
            domain,
            person_id,
            limit: page.limit,
            offset: page.offset,
        },
    }
}
