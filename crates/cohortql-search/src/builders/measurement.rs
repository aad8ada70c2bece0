//! Lab measurement criteria (MEAS).

use cohortql_core::{
    Attribute, Domain, EventPredicate, EventSource, Modifier, Operator, PersonSet, SearchParameter,
    ValueColumn,
};

use super::modifiers::event_set;
use super::{attribute_comparison, integers};
use crate::error::{CompileError, Result};
use crate::validation::predicates::{ANY, BOTH, CATEGORICAL};

/// Each attribute is an alternative restriction on the concept's rows.
pub fn build(params: &[SearchParameter], modifiers: &[Modifier]) -> Result<PersonSet> {
    let mut sources = Vec::new();
    for param in params {
        sources.extend(param_sources(param)?);
    }
    event_set(sources, modifiers)
}

fn param_sources(param: &SearchParameter) -> Result<Vec<EventSource>> {
    let concept_id = param.concept_id.ok_or_else(|| {
        CompileError::compilation(format!("measurement {} has no concept id", param.display_id()))
    })?;
    let base = vec![
        EventPredicate::Standard(param.standard),
        EventPredicate::ConceptIn(vec![concept_id]),
    ];
    let with = |extra: EventPredicate| {
        let mut predicates = base.clone();
        predicates.push(extra);
        EventSource::new(Domain::Measurement, EventPredicate::and(predicates))
    };

    if param.attributes.is_empty() {
        return Ok(vec![EventSource::new(Domain::Measurement, EventPredicate::and(base.clone()))]);
    }

    let mut sources = Vec::new();
    let mut both = Vec::new();
    for attribute in &param.attributes {
        match attribute.name_str() {
            ANY => sources.push(EventSource::new(
                Domain::Measurement,
                EventPredicate::and(base.clone()),
            )),
            CATEGORICAL => sources.push(with(EventPredicate::ValueConceptIn(integers(&attribute.operands)?))),
            BOTH if attribute.operator == Some(Operator::In) => {
                both.push(EventPredicate::ValueConceptIn(integers(&attribute.operands)?));
            }
            BOTH => both.push(numeric(attribute)?),
            // NUM, and any other name, compares the numeric value.
            _ => sources.push(with(numeric(attribute)?)),
        }
    }
    if !both.is_empty() {
        sources.push(with(EventPredicate::or(both)));
    }
    Ok(sources)
}

fn numeric(attribute: &Attribute) -> Result<EventPredicate> {
    Ok(EventPredicate::Value {
        column: ValueColumn::ValueAsNumber,
        comparison: attribute_comparison(attribute)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::predicates::NUMERICAL;
    use cohortql_core::{Comparison, EventQuery};

    fn meas(attributes: Vec<Attribute>) -> SearchParameter {
        let mut param = SearchParameter::new("MEAS")
            .with_concept_id(3004410)
            .with_standard(true);
        param.attributes = attributes;
        param
    }

    fn sources(set: PersonSet) -> Vec<EventSource> {
        let PersonSet::Events(EventQuery { sources, .. }) = set else {
            panic!("expected events");
        };
        sources
    }

    #[test]
    fn test_no_attributes_matches_concept() {
        let found = sources(build(&[meas(vec![])], &[]).unwrap());
        assert_eq!(
            found[0].predicate,
            EventPredicate::And(vec![
                EventPredicate::Standard(true),
                EventPredicate::ConceptIn(vec![3004410]),
            ])
        );
    }

    #[test]
    fn test_numeric_and_categorical_are_alternatives() {
        let param = meas(vec![
            Attribute::new(NUMERICAL, Operator::GreaterThan, &["7"]),
            Attribute::new(CATEGORICAL, Operator::In, &["4069590", "45878745"]),
        ]);
        let found = sources(build(&[param], &[]).unwrap());
        assert_eq!(found.len(), 2);
        assert_eq!(
            found[0].predicate,
            EventPredicate::And(vec![
                EventPredicate::Standard(true),
                EventPredicate::ConceptIn(vec![3004410]),
                EventPredicate::Value {
                    column: ValueColumn::ValueAsNumber,
                    comparison: Comparison::new(Operator::GreaterThan, vec![7.0]),
                },
            ])
        );
        assert!(matches!(
            found[1].predicate,
            EventPredicate::And(ref parts) if parts[2] == EventPredicate::ValueConceptIn(vec![4069590, 45878745])
        ));
    }

    #[test]
    fn test_both_attributes_collapse_into_one_source() {
        let param = meas(vec![
            Attribute::new(BOTH, Operator::In, &["4069590"]),
            Attribute::new(BOTH, Operator::LessThan, &["5"]),
        ]);
        let found = sources(build(&[param], &[]).unwrap());
        assert_eq!(found.len(), 1);
        let EventPredicate::And(parts) = &found[0].predicate else {
            panic!("expected conjunction");
        };
        assert!(matches!(parts[2], EventPredicate::Or(ref options) if options.len() == 2));
    }
}
