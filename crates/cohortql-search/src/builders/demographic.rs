//! Demographic criteria against `person` and `death`.

use cohortql_core::{AgeColumn, Comparison, DemographicColumn, DemographicQuery, PersonSet, SearchParameter};
use indexmap::IndexMap;

use super::{integers, require_operator};
use crate::error::{CompileError, Result};

/// Several demographic criteria in one item are alternatives.
pub fn build(params: &[SearchParameter]) -> Result<PersonSet> {
    let mut concepts: IndexMap<DemographicColumn, Vec<i64>> = IndexMap::new();
    let mut sets = Vec::new();

    for param in params {
        let column = match param.subtype_str().trim().to_ascii_uppercase().as_str() {
            "GEN" => DemographicColumn::Gender,
            "RACE" => DemographicColumn::Race,
            "ETH" => DemographicColumn::Ethnicity,
            "AGE" => {
                sets.push(age(param)?);
                continue;
            }
            "DEC" => {
                sets.push(PersonSet::Demographic(DemographicQuery::Deceased));
                continue;
            }
            _ => continue,
        };
        if let Some(concept_id) = param.concept_id {
            let ids = concepts.entry(column).or_default();
            if !ids.contains(&concept_id) {
                ids.push(concept_id);
            }
        }
    }

    let concept_sets = concepts.into_iter().map(|(column, concept_ids)| {
        PersonSet::Demographic(DemographicQuery::ConceptIn {
            column,
            concept_ids,
        })
    });
    Ok(PersonSet::union(concept_sets.chain(sets).collect()))
}

/// Every attribute of one AGE criterion must hold.
fn age(param: &SearchParameter) -> Result<PersonSet> {
    let mut conditions = Vec::with_capacity(param.attributes.len());
    for attribute in &param.attributes {
        let operator = require_operator(attribute.operator, "age attribute")?;
        let column = AgeColumn::parse(attribute.name_str().trim()).ok_or_else(|| {
            CompileError::compilation(format!("unknown age attribute \"{}\"", attribute.name_str()))
        })?;
        conditions.push(PersonSet::Demographic(DemographicQuery::Age {
            column,
            comparison: Comparison::new(operator, integers(&attribute.operands)?),
        }));
    }
    Ok(PersonSet::intersect(conditions))
}
