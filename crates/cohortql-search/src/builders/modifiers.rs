//! Item modifiers.
//!
//! `AGE_AT_EVENT`, `EVENT_DATE` and `ENCOUNTERS` restrict the rows of every
//! event source; `NUM_OF_OCCURRENCES` restricts the grouped result.

use cohortql_core::time::parse_date;
use cohortql_core::{
    Comparison, CoreError, EventPredicate, EventQuery, EventSource, Modifier, ModifierType,
    PersonSet,
};

use super::{integers, require_operator};
use crate::error::Result;

/// Combine event sources with UNION ALL and apply the item's modifiers.
pub fn event_set(sources: Vec<EventSource>, modifiers: &[Modifier]) -> Result<PersonSet> {
    if sources.is_empty() {
        return Ok(PersonSet::Empty);
    }

    let mut restrictions = Vec::new();
    let mut occurrences = None;
    for modifier in modifiers {
        let operator = require_operator(modifier.operator, &format!("modifier {}", modifier.name))?;
        match modifier.name {
            ModifierType::AgeAtEvent => restrictions.push(EventPredicate::AgeAtEvent(
                Comparison::new(operator, integers(&modifier.operands)?),
            )),
            ModifierType::EventDate => {
                let dates = modifier
                    .operands
                    .iter()
                    .map(|o| {
                        parse_date(o.trim())
                            .map_err(|_| CoreError::invalid_operand(o.as_str(), "date (yyyy-MM-dd)"))
                    })
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                restrictions.push(EventPredicate::EntryDate(Comparison::new(operator, dates)));
            }
            ModifierType::Encounters => {
                restrictions.push(EventPredicate::VisitConceptIn(integers(&modifier.operands)?));
            }
            ModifierType::NumOfOccurrences => {
                occurrences = Some(Comparison::new(operator, integers(&modifier.operands)?));
            }
        }
    }

    let sources = sources
        .into_iter()
        .map(|source| restrict(source, &restrictions))
        .collect();
    Ok(PersonSet::Events(EventQuery {
        sources,
        occurrences,
    }))
}

fn restrict(source: EventSource, restrictions: &[EventPredicate]) -> EventSource {
    if restrictions.is_empty() {
        return source;
    }
    let mut predicates = match source.predicate {
        EventPredicate::And(inner) => inner,
        other => vec![other],
    };
    predicates.extend(restrictions.iter().cloned());
    EventSource::new(source.domain, EventPredicate::and(predicates))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cohortql_core::{Domain, Operator};
    use time::macros::date;

    fn source() -> EventSource {
        EventSource::new(
            Domain::Condition,
            EventPredicate::and(vec![
                EventPredicate::Standard(true),
                EventPredicate::ConceptIn(vec![201826]),
            ]),
        )
    }

    #[test]
    fn test_no_sources_is_empty() {
        assert_eq!(event_set(vec![], &[]).unwrap(), PersonSet::Empty);
    }

    #[test]
    fn test_without_modifiers_sources_pass_through() {
        let set = event_set(vec![source()], &[]).unwrap();
        assert_eq!(set, PersonSet::Events(EventQuery::new(vec![source()])));
    }

    #[test]
    fn test_row_modifiers_are_anded_into_each_source() {
        let modifiers = [
            Modifier::new(ModifierType::AgeAtEvent, Operator::GreaterThanOrEqualTo, &["18"]),
            Modifier::new(ModifierType::EventDate, Operator::Between, &["2019-01-01", "2019-12-31"]),
            Modifier::new(ModifierType::Encounters, Operator::In, &["9201"]),
        ];
        let PersonSet::Events(query) = event_set(vec![source(), source()], &modifiers).unwrap() else {
            panic!("expected events");
        };
        assert_eq!(query.sources.len(), 2);
        assert!(query.occurrences.is_none());
        let EventPredicate::And(predicates) = &query.sources[0].predicate else {
            panic!("expected conjunction");
        };
        assert_eq!(predicates.len(), 5);
        assert_eq!(
            predicates[3],
            EventPredicate::EntryDate(Comparison::new(
                Operator::Between,
                vec![date!(2019 - 01 - 01), date!(2019 - 12 - 31)]
            ))
        );
        assert_eq!(predicates[4], EventPredicate::VisitConceptIn(vec![9201]));
    }

    #[test]
    fn test_occurrences() {
        let modifiers = [Modifier::new(
            ModifierType::NumOfOccurrences,
            Operator::GreaterThanOrEqualTo,
            &["2"],
        )];
        let PersonSet::Events(query) = event_set(vec![source()], &modifiers).unwrap() else {
            panic!("expected events");
        };
        assert_eq!(
            query.occurrences,
            Some(Comparison::new(Operator::GreaterThanOrEqualTo, vec![2]))
        );
        assert_eq!(query.sources, vec![source()]);
    }

    #[test]
    fn test_bad_date_operand() {
        let modifiers = [Modifier::new(ModifierType::EventDate, Operator::GreaterThan, &["yesterday"])];
        assert!(event_set(vec![source()], &modifiers).is_err());
    }
}
