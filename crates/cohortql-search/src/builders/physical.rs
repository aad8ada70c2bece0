//! Physical measurement criteria (PM).
//!
//! Physical measurements are source-vocabulary rows of the measurement
//! search table. Blood pressure compares the systolic and diastolic columns,
//! the other numeric subtypes compare `value_as_number`, and the remaining
//! subtypes match a value concept.

use cohortql_core::{Domain, EventPredicate, EventSource, PersonSet, SearchParameter, ValueColumn};

use super::modifiers::event_set;
use super::{attribute_comparison, integer};
use crate::error::{CompileError, Result};
use crate::validation::predicates::{ANY, DIASTOLIC, PM_SUBTYPES_WITHOUT_ATTRIBUTES, SYSTOLIC};

pub fn build(params: &[SearchParameter]) -> Result<PersonSet> {
    let sources = params
        .iter()
        .map(|param| -> Result<EventSource> {
            Ok(EventSource::new(Domain::Measurement, predicate(param)?))
        })
        .collect::<Result<Vec<_>>>()?;
    event_set(sources, &[])
}

fn predicate(param: &SearchParameter) -> Result<EventPredicate> {
    let concept_id = param.concept_id.ok_or_else(|| {
        CompileError::compilation(format!(
            "physical measurement {} has no concept id",
            param.display_id()
        ))
    })?;
    let mut predicates = vec![
        EventPredicate::Standard(false),
        EventPredicate::ConceptIn(vec![concept_id]),
    ];

    let subtype = param.subtype_str().trim().to_ascii_uppercase();
    if PM_SUBTYPES_WITHOUT_ATTRIBUTES.contains(&subtype.as_str()) {
        predicates.push(EventPredicate::ValueConceptIn(vec![integer(param.value_str())?]));
    } else {
        for attribute in param.attributes.iter().filter(|a| a.name_str() != ANY) {
            let column = match (subtype.as_str(), attribute.name_str()) {
                ("BP", SYSTOLIC) => ValueColumn::Systolic,
                ("BP", DIASTOLIC) => ValueColumn::Diastolic,
                _ => ValueColumn::ValueAsNumber,
            };
            predicates.push(EventPredicate::Value {
                column,
                comparison: attribute_comparison(attribute)?,
            });
        }
    }
    Ok(EventPredicate::and(predicates))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cohortql_core::{Attribute, Comparison, EventQuery, Operator};

    fn pm(subtype: &str, concept_id: i64) -> SearchParameter {
        SearchParameter::new("PM")
            .with_subtype(subtype)
            .with_concept_id(concept_id)
    }

    fn only_predicate(set: PersonSet) -> EventPredicate {
        let PersonSet::Events(EventQuery { mut sources, .. }) = set else {
            panic!("expected events");
        };
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].domain, Domain::Measurement);
        sources.remove(0).predicate
    }

    #[test]
    fn test_blood_pressure() {
        let param = pm("BP", 903118)
            .with_attribute(Attribute::new(SYSTOLIC, Operator::GreaterThanOrEqualTo, &["140"]))
            .with_attribute(Attribute::new(DIASTOLIC, Operator::Between, &["80", "90"]));
        assert_eq!(
            only_predicate(build(&[param]).unwrap()),
            EventPredicate::And(vec![
                EventPredicate::Standard(false),
                EventPredicate::ConceptIn(vec![903118]),
                EventPredicate::Value {
                    column: ValueColumn::Systolic,
                    comparison: Comparison::new(Operator::GreaterThanOrEqualTo, vec![140.0]),
                },
                EventPredicate::Value {
                    column: ValueColumn::Diastolic,
                    comparison: Comparison::new(Operator::Between, vec![80.0, 90.0]),
                },
            ])
        );
    }

    #[test]
    fn test_any_blood_pressure_has_no_value_filter() {
        let param = pm("BP", 903118).with_attribute(Attribute::new(ANY, Operator::In, &[]));
        assert_eq!(
            only_predicate(build(&[param]).unwrap()),
            EventPredicate::And(vec![
                EventPredicate::Standard(false),
                EventPredicate::ConceptIn(vec![903118]),
            ])
        );
    }

    #[test]
    fn test_numeric_subtype() {
        let param = pm("HEIGHT", 903133)
            .with_attribute(Attribute::new("Height", Operator::LessThan, &["150"]));
        let EventPredicate::And(parts) = only_predicate(build(&[param]).unwrap()) else {
            panic!("expected conjunction");
        };
        assert!(matches!(
            parts[2],
            EventPredicate::Value {
                column: ValueColumn::ValueAsNumber,
                ..
            }
        ));
    }

    #[test]
    fn test_value_concept_subtype() {
        let param = pm("WHEEL", 903111).with_value("4023190");
        let EventPredicate::And(parts) = only_predicate(build(&[param]).unwrap()) else {
            panic!("expected conjunction");
        };
        assert_eq!(parts[2], EventPredicate::ValueConceptIn(vec![4023190]));
    }
}
