//! In-memory warehouse.
//!
//! Evaluates a compiled query's plan over a [`Fixture`] instead of running
//! its SQL. Column semantics follow the SQL the renderer emits for the same
//! plan: `is_standard` and `concept_id` on the search tables, path
//! containment on `cb_criteria`, `cb_criteria_ancestor` for drugs, and month
//! arithmetic for computed ages.

use async_trait::async_trait;
use cohortql_core::{
    AgeColumn, CohortQueryKind, CompiledQuery, DemographicColumn, DemographicQuery, Domain,
    EventPredicate, EventQuery, ExpansionStrategy, PersonSet, QueryPlan, ValueColumn,
};
use serde_json::{Value, json};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;
use time::Date;
use tracing::debug;

use crate::error::Result;
use crate::fixture::{Fixture, FixtureCriterion, FixtureEvent, FixturePerson};
use crate::rows::QueryRows;
use crate::traits::WarehouseClient;

#[derive(Debug, Clone)]
pub struct InMemoryWarehouse {
    fixture: Fixture,
}

impl InMemoryWarehouse {
    pub fn new(fixture: Fixture) -> Self {
        Self { fixture }
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(Fixture::from_path(path)?))
    }

    pub fn fixture(&self) -> &Fixture {
        &self.fixture
    }

    /// Person ids in a plan, ascending.
    pub fn evaluate(&self, set: &PersonSet) -> BTreeSet<i64> {
        match set {
            PersonSet::Empty => BTreeSet::new(),
            PersonSet::Events(query) => self.evaluate_events(query),
            PersonSet::Demographic(query) => self
                .fixture
                .persons
                .iter()
                .filter(|p| self.matches_demographic(p, query))
                .map(|p| p.person_id)
                .collect(),
            PersonSet::Union(sets) => sets.iter().flat_map(|s| self.evaluate(s)).collect(),
            PersonSet::Intersect(sets) => {
                let mut iter = sets.iter();
                let Some(first) = iter.next() else {
                    return BTreeSet::new();
                };
                let mut acc = self.evaluate(first);
                for set in iter {
                    let next = self.evaluate(set);
                    acc.retain(|id| next.contains(id));
                }
                acc
            }
            PersonSet::Except { base, excluded } => {
                let excluded = self.evaluate(excluded);
                self.evaluate(base)
                    .into_iter()
                    .filter(|id| !excluded.contains(id))
                    .collect()
            }
        }
    }

    fn evaluate_events(&self, query: &EventQuery) -> BTreeSet<i64> {
        // One entry per (source, matching event), like UNION ALL.
        let matches: Vec<&FixtureEvent> = query
            .sources
            .iter()
            .flat_map(|source| {
                self.fixture.events.iter().filter(move |event| {
                    event.domain == source.domain && self.matches_event(event, &source.predicate)
                })
            })
            .collect();

        match &query.occurrences {
            None => matches.iter().map(|e| e.person_id).collect(),
            Some(comparison) => {
                let mut counts: HashMap<(i64, i64), i64> = HashMap::new();
                for event in &matches {
                    *counts.entry((event.person_id, event.concept_id)).or_default() += 1;
                }
                counts
                    .into_iter()
                    .filter(|(_, count)| comparison.matches(count))
                    .map(|((person_id, _), _)| person_id)
                    .collect()
            }
        }
    }

    fn matches_event(&self, event: &FixtureEvent, predicate: &EventPredicate) -> bool {
        match predicate {
            EventPredicate::Standard(standard) => event.is_standard == *standard,
            EventPredicate::ConceptIn(ids) => ids.contains(&event.concept_id),
            EventPredicate::CodeLike(patterns) => event
                .code
                .as_deref()
                .is_some_and(|code| patterns.iter().any(|p| like(p, code))),
            EventPredicate::Vocabulary {
                code_type,
                subtype,
                domain,
            } => self
                .vocabulary(code_type, subtype.as_deref(), *domain)
                .any(|c| !c.is_standard && c.concept_id == Some(event.concept_id)),
            EventPredicate::CodeRollup {
                code_type,
                subtype,
                domain,
                patterns,
            } => self
                .code_rollup(code_type, subtype.as_deref(), *domain, patterns)
                .contains(&event.concept_id),
            EventPredicate::ConceptRollup {
                strategy,
                domain,
                standard,
                parents,
                children,
            } => self
                .concept_rollup(*strategy, *domain, *standard, parents, children)
                .contains(&event.concept_id),
            EventPredicate::Value { column, comparison } => {
                let value = match column {
                    ValueColumn::ValueAsNumber => event.value_as_number,
                    ValueColumn::Systolic => event.systolic,
                    ValueColumn::Diastolic => event.diastolic,
                };
                value.is_some_and(|v| comparison.matches(&v))
            }
            EventPredicate::ValueConceptIn(ids) => event
                .value_as_concept_id
                .is_some_and(|id| ids.contains(&id)),
            EventPredicate::AgeAtEvent(comparison) => {
                event.age_at_event.is_some_and(|age| comparison.matches(&age))
            }
            EventPredicate::EntryDate(comparison) => comparison.matches(&event.entry_date),
            EventPredicate::VisitConceptIn(ids) => {
                event.visit_concept_id.is_some_and(|id| ids.contains(&id))
            }
            EventPredicate::And(predicates) => {
                predicates.iter().all(|p| self.matches_event(event, p))
            }
            EventPredicate::Or(predicates) => {
                predicates.iter().any(|p| self.matches_event(event, p))
            }
        }
    }

    /// Criteria rows of one vocabulary.
    fn vocabulary<'a>(
        &'a self,
        code_type: &'a str,
        subtype: Option<&'a str>,
        domain: Domain,
    ) -> impl Iterator<Item = &'a FixtureCriterion> + 'a {
        self.fixture
            .criteria
            .iter()
            .filter(move |c| c.domain == domain)
            .filter(move |c| c.criterion_type.eq_ignore_ascii_case(code_type))
            .filter(move |c| {
                subtype.is_none_or(|s| c.subtype.as_deref().is_some_and(|v| v.eq_ignore_ascii_case(s)))
            })
    }

    /// Concept ids of every selectable row under a matching group criterion.
    fn code_rollup(
        &self,
        code_type: &str,
        subtype: Option<&str>,
        domain: Domain,
        patterns: &[String],
    ) -> HashSet<i64> {
        let anchors: Vec<i64> = self
            .vocabulary(code_type, subtype, domain)
            .filter(|c| c.is_group && c.is_selectable)
            .filter(|c| {
                c.code
                    .as_deref()
                    .is_some_and(|code| patterns.iter().any(|p| like(p, code)))
            })
            .map(|c| c.id)
            .collect();

        self.fixture
            .criteria
            .iter()
            .filter(|c| c.is_selectable && anchors.iter().any(|a| c.path_contains(*a)))
            .filter_map(|c| c.concept_id)
            .collect()
    }

    fn concept_rollup(
        &self,
        strategy: ExpansionStrategy,
        domain: Domain,
        standard: bool,
        parents: &[i64],
        children: &[i64],
    ) -> HashSet<i64> {
        let in_scope = |c: &&FixtureCriterion| {
            c.domain == domain && c.is_standard == standard && c.is_selectable
        };
        let anchors: Vec<i64> = self
            .fixture
            .criteria
            .iter()
            .filter(in_scope)
            .filter(|c| {
                c.concept_id.is_some_and(|id| {
                    (c.is_group && parents.contains(&id)) || (!c.is_group && children.contains(&id))
                })
            })
            .map(|c| c.id)
            .collect();

        let descendants: HashSet<i64> = self
            .fixture
            .criteria
            .iter()
            .filter(in_scope)
            .filter(|c| anchors.iter().any(|a| c.path_contains(*a)))
            .filter_map(|c| c.concept_id)
            .collect();

        match strategy {
            ExpansionStrategy::CriteriaPath => descendants,
            ExpansionStrategy::DrugAncestor => self
                .fixture
                .ancestors
                .iter()
                .filter(|a| descendants.contains(&a.ancestor_id))
                .map(|a| a.descendant_id)
                .collect(),
        }
    }

    fn matches_demographic(&self, person: &FixturePerson, query: &DemographicQuery) -> bool {
        match query {
            DemographicQuery::ConceptIn {
                column,
                concept_ids,
            } => {
                let value = match column {
                    DemographicColumn::Gender => Some(person.gender_concept_id),
                    DemographicColumn::Race => person.race_concept_id,
                    DemographicColumn::Ethnicity => person.ethnicity_concept_id,
                };
                value.is_some_and(|v| concept_ids.contains(&v))
            }
            DemographicQuery::Age { column, comparison } => {
                let age = match column {
                    AgeColumn::Age => Some(age_in_years(person.birth_date, self.fixture.as_of)),
                    AgeColumn::AgeAtConsent => person.age_at_consent,
                    AgeColumn::AgeAtCdr => person.age_at_cdr,
                };
                !person.deceased && age.is_some_and(|a| comparison.matches(&a))
            }
            DemographicQuery::Deceased => person.deceased,
        }
    }

    fn participant_events(&self, domain: Domain, person_id: i64, limit: i64, offset: i64) -> QueryRows {
        let mut events: Vec<&FixtureEvent> = self
            .fixture
            .events
            .iter()
            .filter(|e| e.domain == domain && e.person_id == person_id)
            .collect();
        events.sort_by(|a, b| b.entry_date.cmp(&a.entry_date));

        let mut rows = QueryRows::new(vec![
            "person_id".into(),
            "entry_date".into(),
            "standard_concept_id".into(),
            "source_concept_id".into(),
        ]);
        let skip = usize::try_from(offset).unwrap_or_default();
        let take = usize::try_from(limit).unwrap_or_default();
        for event in events.into_iter().skip(skip).take(take) {
            let (standard, source) = if event.is_standard {
                (json!(event.concept_id), Value::Null)
            } else {
                (Value::Null, json!(event.concept_id))
            };
            rows.push(vec![
                json!(event.person_id),
                json!(event.entry_date.to_string()),
                standard,
                source,
            ]);
        }
        rows
    }
}

/// `LIKE` for the patterns the compiler emits: a trailing `%` is a prefix
/// match, anything else is exact.
fn like(pattern: &str, text: &str) -> bool {
    match pattern.strip_suffix('%') {
        Some(prefix) => text.starts_with(prefix),
        None => text == pattern,
    }
}

/// `FLOOR(DATE_DIFF(as_of, birth, MONTH) / 12)`.
fn age_in_years(birth: Date, as_of: Date) -> i64 {
    let months = (i64::from(as_of.year()) - i64::from(birth.year())) * 12
        + (i64::from(u8::from(as_of.month())) - i64::from(u8::from(birth.month())));
    months.div_euclid(12)
}

#[async_trait]
impl WarehouseClient for InMemoryWarehouse {
    async fn execute(&self, query: &CompiledQuery) -> Result<QueryRows> {
        let rows = match &query.plan {
            QueryPlan::Cohort { set, kind } => {
                let persons = self.evaluate(set);
                debug!(persons = persons.len(), kind = ?kind, "evaluated cohort plan");
                match kind {
                    CohortQueryKind::Count => {
                        let mut rows = QueryRows::new(vec!["count".into()]);
                        rows.push(vec![json!(persons.len())]);
                        rows
                    }
                    CohortQueryKind::PersonIds => {
                        let mut rows = QueryRows::new(vec!["person_id".into()]);
                        for id in persons {
                            rows.push(vec![json!(id)]);
                        }
                        rows
                    }
                }
            }
            QueryPlan::ParticipantEvents {
                domain,
                person_id,
                limit,
                offset,
            } => self.participant_events(*domain, *person_id, *limit, *offset),
        };
        Ok(rows)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
