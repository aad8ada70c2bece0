//! Concept-id criteria.
//!
//! Concept ids are split into a standard-vocabulary and a source-vocabulary
//! partition. Each non-empty partition becomes one event source; in domains
//! with a hierarchy the ids also expand to their descendants.

use cohortql_core::{
    Domain, EventPredicate, EventSource, ExpansionStrategy, Modifier, PersonSet, SearchParameter,
};
use std::collections::HashMap;
use tracing::warn;

use super::modifiers::event_set;
use crate::error::Result;

/// Concept ids of one partition, split by whether the criterion is a group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConceptSet {
    pub parents: Vec<i64>,
    pub children: Vec<i64>,
}

impl ConceptSet {
    /// Parents first, then children.
    pub fn ids(&self) -> Vec<i64> {
        self.parents.iter().chain(&self.children).copied().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty() && self.children.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConceptPartition {
    pub standard: ConceptSet,
    pub source: ConceptSet,
}

/// Partition concept ids by their `standard` flag.
///
/// An id lands in exactly one partition. When the same id is supplied with
/// both flags, the first occurrence wins.
pub fn partition_by_standard(params: &[SearchParameter]) -> ConceptPartition {
    let mut partition = ConceptPartition::default();
    let mut seen: HashMap<i64, bool> = HashMap::new();

    for param in params {
        let Some(concept_id) = param.concept_id else {
            continue;
        };
        if let Some(&standard) = seen.get(&concept_id) {
            if standard != param.standard {
                warn!(
                    concept_id,
                    kept_standard = standard,
                    "concept id supplied as both standard and source"
                );
            }
            continue;
        }
        seen.insert(concept_id, param.standard);

        let set = if param.standard {
            &mut partition.standard
        } else {
            &mut partition.source
        };
        if param.group {
            set.parents.push(concept_id);
        } else {
            set.children.push(concept_id);
        }
    }
    partition
}

/// One event source per non-empty partition, standard first.
pub fn concept_sources(domain: Domain, params: &[SearchParameter]) -> Vec<EventSource> {
    let partition = partition_by_standard(params);
    [(true, partition.standard), (false, partition.source)]
        .into_iter()
        .filter(|(_, set)| !set.is_empty())
        .map(|(standard, set)| EventSource::new(domain, partition_predicate(domain, standard, set)))
        .collect()
}

fn partition_predicate(domain: Domain, standard: bool, set: ConceptSet) -> EventPredicate {
    let ids = EventPredicate::ConceptIn(set.ids());
    let concepts = if domain.supports_hierarchy() {
        EventPredicate::or(vec![
            ids,
            EventPredicate::ConceptRollup {
                strategy: ExpansionStrategy::for_domain(domain),
                domain,
                standard,
                parents: set.parents,
                children: set.children,
            },
        ])
    } else {
        ids
    };
    EventPredicate::and(vec![EventPredicate::Standard(standard), concepts])
}

/// Concept search in `domain`, expanded through the hierarchy where the
/// domain has one.
pub fn build(domain: Domain, params: &[SearchParameter], modifiers: &[Modifier]) -> Result<PersonSet> {
    event_set(concept_sources(domain, params), modifiers)
}

/// Concept search that never expands, regardless of domain.
pub fn build_flat(domain: Domain, params: &[SearchParameter], modifiers: &[Modifier]) -> Result<PersonSet> {
    let partition = partition_by_standard(params);
    let sources = [(true, partition.standard), (false, partition.source)]
        .into_iter()
        .filter(|(_, set)| !set.is_empty())
        .map(|(standard, set)| {
            EventSource::new(
                domain,
                EventPredicate::and(vec![
                    EventPredicate::Standard(standard),
                    EventPredicate::ConceptIn(set.ids()),
                ]),
            )
        })
        .collect();
    event_set(sources, modifiers)
}
