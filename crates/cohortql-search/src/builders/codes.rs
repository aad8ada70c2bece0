//! ICD9, ICD10 and CPT code criteria.
//!
//! Criteria are grouped by code key (type, subtype, domain, group). A leaf
//! key matches event codes by prefix within its own vocabulary; a group key
//! matches every concept under the matching group rows of `cb_criteria`.
//! Criteria that carry a concept id instead of a code go through the concept
//! partition.

use cohortql_core::domain::resolve;
use cohortql_core::{Domain, EventPredicate, EventSource, Modifier, PersonSet, SearchParameter};
use indexmap::IndexMap;

use super::concept::concept_sources;
use super::modifiers::event_set;
use crate::error::{CompileError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CodeKey {
    code_type: String,
    subtype: Option<String>,
    domain: Domain,
    group: bool,
}

impl CodeKey {
    fn predicate(self, patterns: Vec<String>) -> EventPredicate {
        if self.group {
            return EventPredicate::and(vec![
                EventPredicate::Standard(false),
                EventPredicate::CodeRollup {
                    code_type: self.code_type,
                    subtype: self.subtype,
                    domain: self.domain,
                    patterns,
                },
            ]);
        }
        // Codes repeat across vocabularies; a leaf stays within its own.
        EventPredicate::and(vec![
            EventPredicate::Standard(false),
            EventPredicate::CodeLike(patterns),
            EventPredicate::Vocabulary {
                code_type: self.code_type,
                subtype: self.subtype,
                domain: self.domain,
            },
        ])
    }
}

pub fn build(params: &[SearchParameter], modifiers: &[Modifier]) -> Result<PersonSet> {
    let mut keys: IndexMap<CodeKey, Vec<String>> = IndexMap::new();
    let mut concepts: IndexMap<(String, Domain), Vec<SearchParameter>> = IndexMap::new();

    for param in params {
        let domain = resolve(param.domain_str())?.domain;
        let code_type = param.type_str().trim().to_ascii_uppercase();
        let code = param.value.as_deref().map(str::trim).filter(|v| !v.is_empty());

        match code {
            Some(code) => {
                let key = CodeKey {
                    code_type,
                    subtype: param
                        .subtype
                        .as_deref()
                        .map(|s| s.trim().to_ascii_uppercase())
                        .filter(|s| !s.is_empty()),
                    domain,
                    group: param.group,
                };
                let pattern = format!("{code}%");
                let patterns = keys.entry(key).or_default();
                if !patterns.contains(&pattern) {
                    patterns.push(pattern);
                }
            }
            None => concepts
                .entry((code_type, domain))
                .or_default()
                .push(param.clone()),
        }
    }

    // Sources of one code type are alternatives; code types are intersected.
    let mut by_type: IndexMap<String, Vec<EventSource>> = IndexMap::new();
    for (key, patterns) in keys {
        let domain = key.domain;
        by_type
            .entry(key.code_type.clone())
            .or_default()
            .push(EventSource::new(domain, key.predicate(patterns)));
    }
    for ((code_type, domain), params) in concepts {
        by_type
            .entry(code_type)
            .or_default()
            .extend(concept_sources(domain, &params));
    }

    if by_type.values().all(Vec::is_empty) {
        return Err(CompileError::compilation(
            "code criteria produced no code keys",
        ));
    }

    let sets = by_type
        .into_values()
        .map(|sources| event_set(sources, modifiers))
        .collect::<Result<Vec<_>>>()?;
    Ok(PersonSet::intersect(sets))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cohortql_core::{EventQuery, ModifierType, Operator};

    fn code(code_type: &str, value: &str) -> SearchParameter {
        SearchParameter::new(code_type)
            .with_subtype("CM")
            .with_domain("Condition")
            .with_value(value)
    }

    #[test]
    fn test_leaf_codes_share_one_key() {
        let set = build(&[code("ICD9", "250.01"), code("icd9", "401"), code("ICD9", "401")], &[]).unwrap();
        assert_eq!(
            set,
            PersonSet::Events(EventQuery::new(vec![EventSource::new(
                Domain::Condition,
                EventPredicate::And(vec![
                    EventPredicate::Standard(false),
                    EventPredicate::CodeLike(vec!["250.01%".to_string(), "401%".to_string()]),
                    EventPredicate::Vocabulary {
                        code_type: "ICD9".to_string(),
                        subtype: Some("CM".to_string()),
                        domain: Domain::Condition,
                    },
                ]),
            )]))
        );
    }

    #[test]
    fn test_leaf_keys_keep_their_vocabulary() {
        let procedure = |code_type: &str, subtype: &str| {
            SearchParameter::new(code_type)
                .with_subtype(subtype)
                .with_domain("Procedure")
                .with_value("99")
        };
        let icd9 = build(&[procedure("ICD9", "PROC")], &[]).unwrap();
        let cpt = build(&[procedure("CPT", "CPT4")], &[]).unwrap();
        assert_ne!(icd9, cpt);

        let PersonSet::Events(query) = cpt else {
            panic!("expected events");
        };
        let EventPredicate::And(parts) = &query.sources[0].predicate else {
            panic!("expected conjunction");
        };
        assert!(parts.contains(&EventPredicate::Vocabulary {
            code_type: "CPT".to_string(),
            subtype: Some("CPT4".to_string()),
            domain: Domain::Procedure,
        }));
    }

    #[test]
    fn test_group_code_rolls_up() {
        let set = build(&[code("ICD9", "250").with_group(true)], &[]).unwrap();
        let PersonSet::Events(query) = set else {
            panic!("expected events");
        };
        assert_eq!(
            query.sources[0].predicate,
            EventPredicate::And(vec![
                EventPredicate::Standard(false),
                EventPredicate::CodeRollup {
                    code_type: "ICD9".to_string(),
                    subtype: Some("CM".to_string()),
                    domain: Domain::Condition,
                    patterns: vec!["250%".to_string()],
                },
            ])
        );
    }

    #[test]
    fn test_same_type_keys_are_alternatives() {
        let params = [code("ICD9", "250").with_group(true), code("ICD9", "401.1")];
        let PersonSet::Events(query) = build(&params, &[]).unwrap() else {
            panic!("expected events");
        };
        assert_eq!(query.sources.len(), 2);
    }

    #[test]
    fn test_different_types_intersect() {
        let params = [code("ICD9", "250"), code("ICD10", "E11").with_subtype("ICD10CM")];
        let set = build(&params, &[]).unwrap();
        assert!(matches!(set, PersonSet::Intersect(ref members) if members.len() == 2));
    }

    #[test]
    fn test_concept_only_criteria_use_partition() {
        let param = SearchParameter::new("ICD10")
            .with_subtype("ICD10CM")
            .with_domain("Condition")
            .with_concept_id(35206882);
        let PersonSet::Events(query) = build(&[param], &[]).unwrap() else {
            panic!("expected events");
        };
        assert_eq!(query.sources.len(), 1);
        assert!(matches!(
            query.sources[0].predicate,
            EventPredicate::And(ref parts) if parts[0] == EventPredicate::Standard(false)
        ));
    }

    #[test]
    fn test_modifiers_apply_per_type() {
        let modifiers = [Modifier::new(ModifierType::NumOfOccurrences, Operator::GreaterThanOrEqualTo, &["2"])];
        let PersonSet::Events(query) = build(&[code("CPT", "99213").with_subtype("CPT4")], &modifiers).unwrap()
        else {
            panic!("expected events");
        };
        assert!(query.occurrences.is_some());
    }

    #[test]
    fn test_unknown_domain_is_resolution_error() {
        let param = code("ICD9", "250").with_domain("Specimen");
        assert!(matches!(
            build(&[param], &[]),
            Err(CompileError::DomainResolution(_))
        ));
    }

    #[test]
    fn test_no_keys_is_compilation_error() {
        let mut param = code("ICD9", "");
        param.value = None;
        assert!(matches!(
            build(&[param], &[]),
            Err(CompileError::Compilation(_))
        ));
    }
}
