//! End-to-end scenarios: compile a cohort definition and run it against the
//! in-memory warehouse.

use std::sync::Arc;

use cohortql_core::{
    Attribute, CohortQueryKind, DatasetNamespace, Domain, Modifier, ModifierType, Operator,
    ParameterValue, SearchGroup, SearchGroupItem, SearchParameter, SearchRequest,
};
use cohortql_search::{CohortCompiler, CohortError, CohortService, CompileError};
use cohortql_warehouse::{Fixture, FixtureCriterion, FixtureEvent, FixturePerson, InMemoryWarehouse};
use time::macros::date;

const MALE: i64 = 8507;
const FEMALE: i64 = 8532;
const BLOOD_PRESSURE: i64 = 903118;
const HBA1C: i64 = 3004410;

fn fixture() -> Fixture {
    Fixture::new(date!(2024 - 01 - 01))
        .with_person(FixturePerson::new(1, date!(1980 - 05 - 01), MALE).with_race(8527))
        .with_person(FixturePerson::new(2, date!(1990 - 01 - 15), FEMALE))
        .with_person(FixturePerson::new(3, date!(1950 - 03 - 01), MALE).deceased())
        .with_person(FixturePerson::new(4, date!(2010 - 06 - 01), FEMALE))
        // Source-vocabulary condition codes.
        .with_event(
            FixtureEvent::new(1, Domain::Condition, 44823941, date!(2019 - 02 - 01))
                .with_code("250.01")
                .with_age_at_event(38),
        )
        .with_event(
            FixtureEvent::new(1, Domain::Condition, 44823941, date!(2020 - 02 - 01))
                .with_code("250.01")
                .with_age_at_event(39),
        )
        .with_event(
            FixtureEvent::new(2, Domain::Condition, 44833556, date!(2021 - 06 - 01))
                .with_code("401.9")
                .with_age_at_event(31),
        )
        .with_event(
            FixtureEvent::new(4, Domain::Condition, 44829000, date!(2022 - 03 - 01))
                .with_code("11.12")
                .with_age_at_event(11),
        )
        // Standard-vocabulary conditions.
        .with_event(FixtureEvent::new(2, Domain::Condition, 201826, date!(2021 - 01 - 01)).standard())
        .with_event(FixtureEvent::new(3, Domain::Condition, 4193704, date!(2015 - 01 - 01)).standard())
        // Measurements.
        .with_event(
            FixtureEvent::new(1, Domain::Measurement, BLOOD_PRESSURE, date!(2022 - 01 - 01))
                .with_blood_pressure(150.0, 85.0),
        )
        .with_event(
            FixtureEvent::new(2, Domain::Measurement, BLOOD_PRESSURE, date!(2022 - 01 - 01))
                .with_blood_pressure(120.0, 70.0),
        )
        .with_event(
            FixtureEvent::new(4, Domain::Measurement, HBA1C, date!(2023 - 01 - 01))
                .standard()
                .with_value(8.2),
        )
        // Procedures: "99" is an ICD9 PROC prefix and a CPT prefix.
        .with_event(
            FixtureEvent::new(1, Domain::Procedure, 2414397, date!(2021 - 03 - 01)).with_code("99213"),
        )
        .with_event(
            FixtureEvent::new(3, Domain::Procedure, 2002906, date!(2014 - 03 - 01)).with_code("99.04"),
        )
        // Drug ingredient.
        .with_event(FixtureEvent::new(2, Domain::Drug, 1127078, date!(2021 - 06 - 01)).standard())
        // ICD9 hierarchy: 250 -> 250.01.
        .with_criterion(
            FixtureCriterion::new(10, Domain::Condition, "ICD9", "10")
                .with_subtype("CM")
                .with_code("250")
                .group(),
        )
        .with_criterion(
            FixtureCriterion::new(11, Domain::Condition, "ICD9", "10.11")
                .with_subtype("CM")
                .with_code("250.01")
                .with_concept_id(44823941),
        )
        .with_criterion(
            FixtureCriterion::new(12, Domain::Condition, "ICD9", "12")
                .with_subtype("CM")
                .with_code("11.12")
                .with_concept_id(44829000),
        )
        .with_criterion(
            FixtureCriterion::new(13, Domain::Condition, "ICD9", "13")
                .with_subtype("CM")
                .with_code("401.9")
                .with_concept_id(44833556),
        )
        // Procedure vocabularies.
        .with_criterion(
            FixtureCriterion::new(20, Domain::Procedure, "ICD9", "20")
                .with_subtype("PROC")
                .with_code("99")
                .group(),
        )
        .with_criterion(
            FixtureCriterion::new(21, Domain::Procedure, "ICD9", "20.21")
                .with_subtype("PROC")
                .with_code("99.04")
                .with_concept_id(2002906),
        )
        .with_criterion(
            FixtureCriterion::new(22, Domain::Procedure, "CPT", "22")
                .with_subtype("CPT4")
                .with_code("99213")
                .with_concept_id(2414397),
        )
        // SNOMED hierarchy: 201826 -> 4193704.
        .with_criterion(
            FixtureCriterion::new(30, Domain::Condition, "SNOMED", "30")
                .with_concept_id(201826)
                .standard()
                .group(),
        )
        .with_criterion(
            FixtureCriterion::new(31, Domain::Condition, "SNOMED", "30.31")
                .with_concept_id(4193704)
                .standard(),
        )
        // ATC class whose ingredient is 1127078.
        .with_criterion(
            FixtureCriterion::new(40, Domain::Drug, "ATC", "40")
                .with_concept_id(21600001)
                .standard()
                .group(),
        )
        .with_ancestor(21600001, 1127078)
}

fn service() -> CohortService {
    CohortService::new(
        CohortCompiler::default(),
        Arc::new(InMemoryWarehouse::new(fixture())),
    )
}

fn namespace() -> DatasetNamespace {
    DatasetNamespace::new("all-of-us", "cdr2024").unwrap()
}

fn include(item: SearchGroupItem) -> SearchRequest {
    SearchRequest::default().with_include(SearchGroup::new("g1").with_item(item))
}

fn participants(request: &SearchRequest) -> Vec<i64> {
    tokio_test::block_on(service().participant_ids(request, &namespace())).unwrap()
}

fn count(request: &SearchRequest) -> i64 {
    tokio_test::block_on(service().count_participants(request, &namespace())).unwrap()
}

fn icd9_item(code: &str, group: bool) -> SearchGroupItem {
    SearchGroupItem::new("icd9", "ICD9").with_parameter(
        SearchParameter::new("ICD9")
            .with_id("c1")
            .with_subtype("CM")
            .with_domain("Condition")
            .with_value(code)
            .with_group(group),
    )
}

fn gender_item(concept_id: i64) -> SearchGroupItem {
    SearchGroupItem::new("gender", "DEMO").with_parameter(
        SearchParameter::new("DEMO")
            .with_subtype("GEN")
            .with_concept_id(concept_id),
    )
}

#[test]
fn male_gender_returns_exactly_the_male_persons() {
    assert_eq!(participants(&include(gender_item(MALE))), vec![1, 3]);
    assert_eq!(count(&include(gender_item(MALE))), 2);
}

#[test]
fn including_and_excluding_the_same_code_is_empty() {
    let request = include(icd9_item("250", false))
        .with_exclude(SearchGroup::new("g2").with_item(icd9_item("250", false)));
    assert_eq!(count(&request), 0);

    let compiled = CohortCompiler::default()
        .compile(&request, &namespace(), CohortQueryKind::Count)
        .unwrap();
    assert!(compiled.sql.contains("WHERE person_id NOT IN ("));
}

#[test]
fn blood_pressure_with_three_attributes_is_rejected() {
    let item = SearchGroupItem::new("bp", "PM").with_parameter(
        SearchParameter::new("PM")
            .with_id("bp-1")
            .with_subtype("BP")
            .with_concept_id(BLOOD_PRESSURE)
            .with_attribute(Attribute::new("Systolic", Operator::GreaterThan, &["140"]))
            .with_attribute(Attribute::new("Diastolic", Operator::GreaterThan, &["90"]))
            .with_attribute(Attribute::new("Diastolic", Operator::LessThan, &["100"])),
    );
    let result = tokio_test::block_on(service().count_participants(&include(item), &namespace()));
    match result {
        Err(CohortError::Compile(CompileError::Validation(err))) => {
            assert!(err.rule.contains("not_two_attributes"));
            assert_eq!(err.item_id.as_deref(), Some("bp"));
            assert_eq!(err.criterion_id.as_deref(), Some("bp-1"));
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn blood_pressure_ranges() {
    let item = SearchGroupItem::new("bp", "PM").with_parameter(
        SearchParameter::new("PM")
            .with_subtype("BP")
            .with_concept_id(BLOOD_PRESSURE)
            .with_attribute(Attribute::new("Systolic", Operator::GreaterThanOrEqualTo, &["140"]))
            .with_attribute(Attribute::new("Diastolic", Operator::Between, &["80", "90"])),
    );
    assert_eq!(participants(&include(item)), vec![1]);
}

#[test]
fn compilation_is_deterministic() {
    let request = include(icd9_item("250", true))
        .with_include(SearchGroup::new("g2").with_item(gender_item(FEMALE)));
    let compiler = CohortCompiler::default();
    let first = compiler.compile(&request, &namespace(), CohortQueryKind::Count).unwrap();
    let second = compiler.compile(&request, &namespace(), CohortQueryKind::Count).unwrap();
    assert_eq!(first.sql, second.sql);
    assert_eq!(first.parameters, second.parameters);
}

#[test]
fn leaf_code_is_a_bound_like_pattern() {
    let request = include(icd9_item("11.1", false));
    let compiled = CohortCompiler::default()
        .compile(&request, &namespace(), CohortQueryKind::Count)
        .unwrap();
    assert!(compiled.sql.contains("code LIKE @p1"));
    assert!(!compiled.sql.contains("11.1"));
    assert_eq!(
        compiled.parameter("p1"),
        Some(&ParameterValue::String("11.1%".to_string()))
    );
    assert_eq!(count(&request), 1);
}

#[test]
fn group_code_matches_descendants_through_the_criteria_table() {
    let request = include(icd9_item("250", true));
    let compiled = CohortCompiler::default()
        .compile(&request, &namespace(), CohortQueryKind::Count)
        .unwrap();
    assert!(compiled.sql.contains("`all-of-us.cdr2024.cb_criteria`"));
    assert_eq!(participants(&request), vec![1]);
}

#[test]
fn leaf_codes_do_not_cross_vocabularies() {
    let procedure = |item_type: &str, subtype: &str| {
        SearchGroupItem::new("proc", item_type).with_parameter(
            SearchParameter::new(item_type)
                .with_subtype(subtype)
                .with_domain("Procedure")
                .with_value("99"),
        )
    };
    assert_eq!(participants(&include(procedure("ICD9", "PROC"))), vec![3]);
    assert_eq!(participants(&include(procedure("CPT", "CPT4"))), vec![1]);
}

#[test]
fn group_code_anchors_on_its_own_domain() {
    let group = |domain: &str| {
        SearchGroupItem::new("proc", "ICD9").with_parameter(
            SearchParameter::new("ICD9")
                .with_subtype("PROC")
                .with_domain(domain)
                .with_value("99")
                .with_group(true),
        )
    };
    let request = include(group("Procedure"));
    let compiled = CohortCompiler::default()
        .compile(&request, &namespace(), CohortQueryKind::Count)
        .unwrap();
    assert!(compiled.sql.contains("WHERE domain_id = @"));
    assert_eq!(
        compiled.parameter("p1"),
        Some(&ParameterValue::String("PROCEDURE".to_string()))
    );
    assert_eq!(participants(&request), vec![3]);
    assert!(participants(&include(group("Observation"))).is_empty());
}

#[test]
fn occurrence_count_modifier() {
    let twice = include(icd9_item("250", false).with_modifier(Modifier::new(
        ModifierType::NumOfOccurrences,
        Operator::GreaterThanOrEqualTo,
        &["2"],
    )));
    assert_eq!(participants(&twice), vec![1]);

    let thrice = include(icd9_item("250", false).with_modifier(Modifier::new(
        ModifierType::NumOfOccurrences,
        Operator::GreaterThanOrEqualTo,
        &["3"],
    )));
    assert_eq!(count(&thrice), 0);
}

#[test]
fn age_at_event_modifier() {
    let request = include(icd9_item("250", false).with_modifier(Modifier::new(
        ModifierType::AgeAtEvent,
        Operator::GreaterThan,
        &["38"],
    )));
    assert_eq!(participants(&request), vec![1]);

    let request = include(icd9_item("401", false).with_modifier(Modifier::new(
        ModifierType::AgeAtEvent,
        Operator::GreaterThan,
        &["38"],
    )));
    assert!(participants(&request).is_empty());
}

#[test]
fn standard_concept_expands_through_hierarchy() {
    let item = SearchGroupItem::new("cond", "CONDITION").with_parameter(
        SearchParameter::new("SNOMED")
            .with_domain("Condition")
            .with_concept_id(201826)
            .with_standard(true)
            .with_group(true),
    );
    assert_eq!(participants(&include(item)), vec![2, 3]);
}

#[test]
fn drug_class_expands_through_ancestor_table() {
    let item = SearchGroupItem::new("drug", "DRUG").with_parameter(
        SearchParameter::new("ATC")
            .with_domain("Drug")
            .with_concept_id(21600001)
            .with_standard(true)
            .with_group(true),
    );
    let request = include(item);
    let compiled = CohortCompiler::default()
        .compile(&request, &namespace(), CohortQueryKind::Count)
        .unwrap();
    assert!(compiled.sql.contains("cb_criteria_ancestor"));
    assert_eq!(participants(&request), vec![2]);
}

#[test]
fn age_excludes_the_deceased() {
    let item = SearchGroupItem::new("age", "DEMO").with_parameter(
        SearchParameter::new("DEMO")
            .with_subtype("AGE")
            .with_attribute(Attribute::new("AGE", Operator::GreaterThanOrEqualTo, &["40"])),
    );
    assert_eq!(participants(&include(item)), vec![1]);
}

#[test]
fn fractional_age_is_rejected_not_truncated() {
    let item = SearchGroupItem::new("age", "DEMO").with_parameter(
        SearchParameter::new("DEMO")
            .with_id("age-1")
            .with_subtype("AGE")
            .with_attribute(Attribute::new("AGE", Operator::GreaterThanOrEqualTo, &["18.9"])),
    );
    let result = CohortCompiler::default().compile(&include(item), &namespace(), CohortQueryKind::Count);
    match result {
        Err(CompileError::Validation(err)) => {
            assert_eq!(err.rule, "operands_not_integers");
            assert_eq!(err.criterion_id.as_deref(), Some("age-1"));
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn lab_value_comparison() {
    let item = SearchGroupItem::new("lab", "MEAS").with_parameter(
        SearchParameter::new("LOINC")
            .with_domain("Measurement")
            .with_concept_id(HBA1C)
            .with_standard(true)
            .with_attribute(Attribute::new("NUM", Operator::GreaterThan, &["7"])),
    );
    assert_eq!(participants(&include(item)), vec![4]);
}

#[test]
fn include_groups_are_alternatives_and_items_must_all_hold() {
    let drug = SearchGroupItem::new("drug", "DRUG").with_parameter(
        SearchParameter::new("RXNORM")
            .with_domain("Drug")
            .with_concept_id(1127078)
            .with_standard(true),
    );
    let request = include(gender_item(MALE))
        .with_include(SearchGroup::new("g2").with_item(drug.clone()));
    assert_eq!(participants(&request), vec![1, 2, 3]);

    let both = SearchRequest::default().with_include(
        SearchGroup::new("g1")
            .with_item(gender_item(FEMALE))
            .with_item(drug),
    );
    assert_eq!(participants(&both), vec![2]);
}

#[test]
fn request_from_json() {
    let json = r#"{
        "includes": [{
            "id": "g1",
            "items": [{
                "id": "i1",
                "type": "ICD9",
                "searchParameters": [{
                    "parameterId": "p1",
                    "domainId": "Condition",
                    "type": "ICD9",
                    "subtype": "CM",
                    "value": "250",
                    "group": true
                }],
                "modifiers": [{"name": "EVENT_DATE", "operator": "GREATER_THAN_OR_EQUAL_TO", "operands": ["2020-01-01"]}]
            }]
        }]
    }"#;
    let request = SearchRequest::from_json(json).unwrap();
    let compiled = CohortCompiler::default()
        .compile(&request, &namespace(), CohortQueryKind::PersonIds)
        .unwrap();
    assert!(compiled.sql.contains("entry_date >= @"));
    assert!(compiled.sql.ends_with("ORDER BY person_id"));
    assert_eq!(participants(&request), vec![1]);
}
