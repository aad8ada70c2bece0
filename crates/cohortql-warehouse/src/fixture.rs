//! Fixture data for the in-memory warehouse.
//!
//! A fixture is a flattened slice of the warehouse: persons with their
//! demographics, events shaped like rows of the denormalized search tables,
//! and the criteria hierarchy with its ancestor table.

use cohortql_core::Domain;
use cohortql_core::time::iso_date;
use serde::{Deserialize, Serialize};
use std::path::Path;
use time::Date;

use crate::error::{Result, WarehouseError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fixture {
    /// Stands in for `CURRENT_DATE` when computing ages.
    #[serde(with = "iso_date")]
    pub as_of: Date,
    #[serde(default)]
    pub persons: Vec<FixturePerson>,
    #[serde(default)]
    pub events: Vec<FixtureEvent>,
    #[serde(default)]
    pub criteria: Vec<FixtureCriterion>,
    #[serde(default)]
    pub ancestors: Vec<FixtureAncestor>,
}

impl Fixture {
    pub fn new(as_of: Date) -> Self {
        Self {
            as_of,
            persons: Vec::new(),
            events: Vec::new(),
            criteria: Vec::new(),
            ancestors: Vec::new(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let fixture: Fixture = serde_json::from_str(json)?;
        fixture.check()?;
        Ok(fixture)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Events must reference known persons.
    fn check(&self) -> Result<()> {
        for event in &self.events {
            if !self.persons.iter().any(|p| p.person_id == event.person_id) {
                return Err(WarehouseError::fixture(format!(
                    "event references unknown person {}",
                    event.person_id
                )));
            }
        }
        Ok(())
    }

    pub fn with_person(mut self, person: FixturePerson) -> Self {
        self.persons.push(person);
        self
    }

    pub fn with_event(mut self, event: FixtureEvent) -> Self {
        self.events.push(event);
        self
    }

    pub fn with_criterion(mut self, criterion: FixtureCriterion) -> Self {
        self.criteria.push(criterion);
        self
    }

    pub fn with_ancestor(mut self, ancestor_id: i64, descendant_id: i64) -> Self {
        self.ancestors.push(FixtureAncestor {
            ancestor_id,
            descendant_id,
        });
        self
    }
}

/// Row of `person`, with the `death` table folded in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixturePerson {
    pub person_id: i64,
    #[serde(with = "iso_date")]
    pub birth_date: Date,
    pub gender_concept_id: i64,
    #[serde(default)]
    pub race_concept_id: Option<i64>,
    #[serde(default)]
    pub ethnicity_concept_id: Option<i64>,
    #[serde(default)]
    pub age_at_consent: Option<i64>,
    #[serde(default)]
    pub age_at_cdr: Option<i64>,
    #[serde(default)]
    pub deceased: bool,
}

impl FixturePerson {
    pub fn new(person_id: i64, birth_date: Date, gender_concept_id: i64) -> Self {
        Self {
            person_id,
            birth_date,
            gender_concept_id,
            race_concept_id: None,
            ethnicity_concept_id: None,
            age_at_consent: None,
            age_at_cdr: None,
            deceased: false,
        }
    }

    pub fn with_race(mut self, concept_id: i64) -> Self {
        self.race_concept_id = Some(concept_id);
        self
    }

    pub fn with_ethnicity(mut self, concept_id: i64) -> Self {
        self.ethnicity_concept_id = Some(concept_id);
        self
    }

    pub fn deceased(mut self) -> Self {
        self.deceased = true;
        self
    }
}

/// Row of a `person_<domain>` search table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixtureEvent {
    pub person_id: i64,
    pub domain: Domain,
    #[serde(with = "iso_date")]
    pub entry_date: Date,
    pub concept_id: i64,
    #[serde(default)]
    pub is_standard: bool,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub value_as_number: Option<f64>,
    #[serde(default)]
    pub value_as_concept_id: Option<i64>,
    #[serde(default)]
    pub systolic: Option<f64>,
    #[serde(default)]
    pub diastolic: Option<f64>,
    #[serde(default)]
    pub age_at_event: Option<i64>,
    #[serde(default)]
    pub visit_concept_id: Option<i64>,
}

impl FixtureEvent {
    pub fn new(person_id: i64, domain: Domain, concept_id: i64, entry_date: Date) -> Self {
        Self {
            person_id,
            domain,
            entry_date,
            concept_id,
            is_standard: false,
            code: None,
            value_as_number: None,
            value_as_concept_id: None,
            systolic: None,
            diastolic: None,
            age_at_event: None,
            visit_concept_id: None,
        }
    }

    pub fn standard(mut self) -> Self {
        self.is_standard = true;
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_value(mut self, value: f64) -> Self {
        self.value_as_number = Some(value);
        self
    }

    pub fn with_value_concept(mut self, concept_id: i64) -> Self {
        self.value_as_concept_id = Some(concept_id);
        self
    }

    pub fn with_blood_pressure(mut self, systolic: f64, diastolic: f64) -> Self {
        self.systolic = Some(systolic);
        self.diastolic = Some(diastolic);
        self
    }

    pub fn with_age_at_event(mut self, age: i64) -> Self {
        self.age_at_event = Some(age);
        self
    }

    pub fn with_visit_concept(mut self, concept_id: i64) -> Self {
        self.visit_concept_id = Some(concept_id);
        self
    }
}

/// Row of `cb_criteria`. `path` is the dot-separated chain of ids from the
/// root down to and including this row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixtureCriterion {
    pub id: i64,
    pub domain: Domain,
    #[serde(rename = "type")]
    pub criterion_type: String,
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub concept_id: Option<i64>,
    #[serde(default)]
    pub is_standard: bool,
    #[serde(default)]
    pub is_group: bool,
    #[serde(default = "default_selectable")]
    pub is_selectable: bool,
    pub path: String,
}

fn default_selectable() -> bool {
    true
}

impl FixtureCriterion {
    pub fn new(id: i64, domain: Domain, criterion_type: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            id,
            domain,
            criterion_type: criterion_type.into(),
            subtype: None,
            code: None,
            concept_id: None,
            is_standard: false,
            is_group: false,
            is_selectable: true,
            path: path.into(),
        }
    }

    pub fn with_subtype(mut self, subtype: impl Into<String>) -> Self {
        self.subtype = Some(subtype.into());
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_concept_id(mut self, concept_id: i64) -> Self {
        self.concept_id = Some(concept_id);
        self
    }

    pub fn standard(mut self) -> Self {
        self.is_standard = true;
        self
    }

    pub fn group(mut self) -> Self {
        self.is_group = true;
        self
    }

    /// Whether `id` appears as a segment of this row's path.
    pub fn path_contains(&self, id: i64) -> bool {
        let id = id.to_string();
        self.path.split('.').any(|segment| segment == id)
    }
}

/// Row of `cb_criteria_ancestor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixtureAncestor {
    pub ancestor_id: i64,
    pub descendant_id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use time::macros::date;

    const FIXTURE: &str = r#"{
        "asOf": "2024-01-01",
        "persons": [
            {"personId": 1, "birthDate": "1980-05-01", "genderConceptId": 8507},
            {"personId": 2, "birthDate": "1990-01-15", "genderConceptId": 8532, "deceased": true}
        ],
        "events": [
            {"personId": 1, "domain": "CONDITION", "entryDate": "2019-02-01", "conceptId": 44823941, "code": "250.00"}
        ],
        "criteria": [
            {"id": 10, "domain": "CONDITION", "type": "ICD9", "subtype": "CM", "code": "250", "isGroup": true, "path": "10"}
        ]
    }"#;

    #[test]
    fn test_parse_fixture() {
        let fixture = Fixture::from_json(FIXTURE).unwrap();
        assert_eq!(fixture.as_of, date!(2024 - 01 - 01));
        assert_eq!(fixture.persons.len(), 2);
        assert!(fixture.persons[1].deceased);
        assert_eq!(fixture.events[0].domain, Domain::Condition);
        assert!(fixture.criteria[0].is_selectable);
        assert!(fixture.ancestors.is_empty());
    }

    #[test]
    fn test_rejects_orphan_event() {
        let json = r#"{"asOf": "2024-01-01", "events": [
            {"personId": 9, "domain": "DRUG", "entryDate": "2019-02-01", "conceptId": 1}
        ]}"#;
        assert!(matches!(
            Fixture::from_json(json),
            Err(WarehouseError::Fixture(_))
        ));
    }

    #[test]
    fn test_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(FIXTURE.as_bytes()).unwrap();
        let fixture = Fixture::from_path(file.path()).unwrap();
        assert_eq!(fixture.events.len(), 1);
    }

    #[test]
    fn test_path_contains() {
        let row = FixtureCriterion::new(3, Domain::Condition, "ICD9", "1.12.3");
        assert!(row.path_contains(12));
        assert!(row.path_contains(3));
        assert!(!row.path_contains(2));
    }
}
