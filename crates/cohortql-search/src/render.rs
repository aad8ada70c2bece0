//! SQL renderer.
//!
//! Walks a [`PersonSet`] and emits BigQuery Standard SQL. Every value coming
//! from a criterion is bound through the [`ParameterBinder`]; only table
//! names (from the namespace and the domain registry), column names and
//! fixed flags appear in the text.

use cohortql_core::{
    AgeColumn, CohortQueryKind, Comparison, DatasetNamespace, DemographicQuery, Domain,
    EventPredicate, EventQuery, EventSource, ExpansionStrategy, Operator, ParameterValue,
    PersonSet, tables,
};

use crate::binder::ParameterBinder;

/// Set expression that yields no rows.
pub const EMPTY_SET_SQL: &str = "SELECT person_id FROM UNNEST(CAST([] AS ARRAY<INT64>)) AS person_id";

const AGE_EXPRESSION: &str =
    "CAST(FLOOR(DATE_DIFF(CURRENT_DATE, DATE(p.birth_datetime), MONTH)/12) AS INT64)";

pub struct SqlRenderer<'a> {
    namespace: &'a DatasetNamespace,
    binder: ParameterBinder,
}

impl<'a> SqlRenderer<'a> {
    pub fn new(namespace: &'a DatasetNamespace) -> Self {
        Self {
            namespace,
            binder: ParameterBinder::new(),
        }
    }

    pub fn binder(&self) -> &ParameterBinder {
        &self.binder
    }

    pub fn into_binder(self) -> ParameterBinder {
        self.binder
    }

    /// Wrap a person set in the final projection for `kind`.
    pub fn render_query(&mut self, set: &PersonSet, kind: CohortQueryKind) -> String {
        let inner = self.render_set(set);
        match kind {
            CohortQueryKind::Count => {
                format!("SELECT COUNT(DISTINCT person_id) AS count FROM (\n{inner}\n) cohort")
            }
            CohortQueryKind::PersonIds => {
                format!("SELECT DISTINCT person_id FROM (\n{inner}\n) cohort ORDER BY person_id")
            }
        }
    }

    /// A query whose single column is `person_id`.
    pub fn render_set(&mut self, set: &PersonSet) -> String {
        match set {
            PersonSet::Empty => EMPTY_SET_SQL.to_string(),
            PersonSet::Events(query) => self.render_events(query),
            PersonSet::Demographic(query) => self.render_demographic(query),
            PersonSet::Union(sets) => self.render_set_operation(sets, "UNION DISTINCT"),
            PersonSet::Intersect(sets) => self.render_set_operation(sets, "INTERSECT DISTINCT"),
            PersonSet::Except { base, excluded } => {
                let base = self.render_set(base);
                let excluded = self.render_set(excluded);
                format!(
                    "SELECT person_id FROM (\n{base}\n) included\nWHERE person_id NOT IN (\n{excluded}\n)"
                )
            }
        }
    }

    fn render_set_operation(&mut self, sets: &[PersonSet], operator: &str) -> String {
        if sets.is_empty() {
            return EMPTY_SET_SQL.to_string();
        }
        let members: Vec<String> = sets
            .iter()
            .map(|set| format!("({})", self.render_set(set)))
            .collect();
        members.join(&format!("\n{operator}\n"))
    }

    // ========================================================================
    // Events
    // ========================================================================

    fn render_events(&mut self, query: &EventQuery) -> String {
        if query.sources.is_empty() {
            return EMPTY_SET_SQL.to_string();
        }
        let fragments: Vec<String> = query
            .sources
            .iter()
            .map(|source| self.render_source(source))
            .collect();
        let mut sql = format!(
            "SELECT criteria.person_id FROM (\n{}\n) criteria",
            fragments.join("\nUNION ALL\n")
        );
        if let Some(occurrences) = &query.occurrences {
            let having = self.comparison("COUNT(criteria.person_id)", occurrences);
            sql.push_str(&format!(
                "\nGROUP BY criteria.person_id, criteria.concept_id\nHAVING {having}"
            ));
        }
        sql
    }

    fn render_source(&mut self, source: &EventSource) -> String {
        let table = self
            .namespace
            .qualify(source.domain.mapping().denormalized_table_name);
        let predicate = self.render_predicate(&source.predicate);
        format!("SELECT person_id, entry_date, concept_id FROM {table} WHERE {predicate}")
    }

    fn render_predicate(&mut self, predicate: &EventPredicate) -> String {
        match predicate {
            EventPredicate::Standard(standard) => {
                format!("is_standard = {}", self.binder.bind(i64::from(*standard)))
            }
            EventPredicate::ConceptIn(ids) => {
                format!("concept_id IN UNNEST({})", self.binder.bind(ParameterValue::int64_array(ids)))
            }
            EventPredicate::CodeLike(patterns) => self.code_like("code", patterns),
            EventPredicate::Vocabulary {
                code_type,
                subtype,
                domain,
            } => self.vocabulary(code_type, subtype.as_deref(), *domain),
            EventPredicate::CodeRollup {
                code_type,
                subtype,
                domain,
                patterns,
            } => self.code_rollup(code_type, subtype.as_deref(), *domain, patterns),
            EventPredicate::ConceptRollup {
                strategy,
                domain,
                standard,
                parents,
                children,
            } => self.concept_rollup(*strategy, *domain, *standard, parents, children),
            EventPredicate::Value { column, comparison } => {
                self.comparison(column.column_name(), comparison)
            }
            EventPredicate::ValueConceptIn(ids) => format!(
                "value_as_concept_id IN UNNEST({})",
                self.binder.bind(ParameterValue::int64_array(ids))
            ),
            EventPredicate::AgeAtEvent(comparison) => self.comparison("age_at_event", comparison),
            EventPredicate::EntryDate(comparison) => self.comparison("entry_date", comparison),
            EventPredicate::VisitConceptIn(ids) => format!(
                "visit_concept_id IN UNNEST({})",
                self.binder.bind(ParameterValue::int64_array(ids))
            ),
            EventPredicate::And(predicates) => self.junction(predicates, " AND ", "TRUE"),
            EventPredicate::Or(predicates) => self.junction(predicates, " OR ", "FALSE"),
        }
    }

    fn junction(&mut self, predicates: &[EventPredicate], separator: &str, identity: &str) -> String {
        if predicates.is_empty() {
            return identity.to_string();
        }
        let parts: Vec<String> = predicates
            .iter()
            .map(|p| {
                let rendered = self.render_predicate(p);
                if matches!(p, EventPredicate::And(_) | EventPredicate::Or(_)) {
                    format!("({rendered})")
                } else {
                    rendered
                }
            })
            .collect();
        parts.join(separator)
    }

    fn code_like(&mut self, column: &str, patterns: &[String]) -> String {
        let parts: Vec<String> = patterns
            .iter()
            .map(|p| format!("{column} LIKE {}", self.binder.bind(p.as_str())))
            .collect();
        match parts.len() {
            0 => "FALSE".to_string(),
            1 => parts.concat(),
            _ => format!("({})", parts.join(" OR ")),
        }
    }

    /// Path join from anchor rows (an `id` column) to the selectable rows
    /// below them.
    fn path_join(&self, anchors: &str, filter: &str) -> String {
        let criteria = self.namespace.qualify(tables::CRITERIA);
        format!(
            "SELECT DISTINCT c.concept_id FROM {criteria} c JOIN ({anchors}) a \
             ON (c.path LIKE CONCAT('%.', a.id, '.%') OR c.path LIKE CONCAT('%.', a.id) \
             OR c.path LIKE CONCAT(a.id, '.%') OR c.path = a.id) \
             WHERE {filter}c.is_selectable = 1"
        )
    }

    /// `WHERE` clause selecting the `cb_criteria` rows of one source vocabulary.
    fn vocabulary_filter(&mut self, code_type: &str, subtype: Option<&str>, domain: Domain) -> String {
        let mut filter = format!(
            "domain_id = {} AND type = {}",
            self.binder.bind(domain.as_str()),
            self.binder.bind(code_type)
        );
        if let Some(subtype) = subtype {
            filter.push_str(&format!(" AND subtype = {}", self.binder.bind(subtype)));
        }
        filter
    }

    fn vocabulary(&mut self, code_type: &str, subtype: Option<&str>, domain: Domain) -> String {
        let criteria = self.namespace.qualify(tables::CRITERIA);
        let filter = self.vocabulary_filter(code_type, subtype, domain);
        format!(
            "concept_id IN (SELECT concept_id FROM {criteria} WHERE {filter} AND is_standard = 0)"
        )
    }

    fn code_rollup(
        &mut self,
        code_type: &str,
        subtype: Option<&str>,
        domain: Domain,
        patterns: &[String],
    ) -> String {
        let criteria = self.namespace.qualify(tables::CRITERIA);
        let filter = self.vocabulary_filter(code_type, subtype, domain);
        let codes = self.code_like("code", patterns);
        let anchor = format!(
            "SELECT CAST(id AS STRING) AS id FROM {criteria} WHERE {filter} \
             AND {codes} AND is_group = 1 AND is_selectable = 1"
        );
        format!("concept_id IN ({})", self.path_join(&anchor, ""))
    }

    fn concept_rollup(
        &mut self,
        strategy: ExpansionStrategy,
        domain: Domain,
        standard: bool,
        parents: &[i64],
        children: &[i64],
    ) -> String {
        if parents.is_empty() && children.is_empty() {
            return "FALSE".to_string();
        }
        let criteria = self.namespace.qualify(tables::CRITERIA);
        let domain_param = self.binder.bind(domain.as_str());
        let standard_param = self.binder.bind(i64::from(standard));

        let mut anchors = Vec::with_capacity(2);
        for (group, ids) in [(1i64, parents), (0i64, children)] {
            if ids.is_empty() {
                continue;
            }
            let ids_param = self.binder.bind(ParameterValue::int64_array(ids));
            let group_param = self.binder.bind(group);
            anchors.push(format!(
                "SELECT CAST(cr.id AS STRING) AS id FROM {criteria} cr \
                 WHERE domain_id = {domain_param} AND is_standard = {standard_param} \
                 AND concept_id IN UNNEST({ids_param}) AND is_group = {group_param} \
                 AND is_selectable = 1"
            ));
        }

        let filter = format!("c.domain_id = {domain_param} AND c.is_standard = {standard_param} AND ");
        let descendants = self.path_join(&anchors.join(" UNION ALL "), &filter);
        match strategy {
            ExpansionStrategy::CriteriaPath => format!("concept_id IN ({descendants})"),
            ExpansionStrategy::DrugAncestor => {
                let ancestor = self.namespace.qualify(tables::CRITERIA_ANCESTOR);
                format!(
                    "concept_id IN (SELECT DISTINCT ca.descendant_id FROM {ancestor} ca \
                     JOIN ({descendants}) b ON (ca.ancestor_id = b.concept_id))"
                )
            }
        }
    }

    // ========================================================================
    // Demographics
    // ========================================================================

    fn render_demographic(&mut self, query: &DemographicQuery) -> String {
        let person = self.namespace.qualify(tables::PERSON);
        let death = self.namespace.qualify(tables::DEATH);
        let dead = format!("EXISTS (SELECT 'x' FROM {death} d WHERE d.person_id = p.person_id)");

        let condition = match query {
            DemographicQuery::ConceptIn {
                column,
                concept_ids,
            } => format!(
                "p.{} IN UNNEST({})",
                column.column_name(),
                self.binder.bind(ParameterValue::int64_array(concept_ids))
            ),
            DemographicQuery::Age { column, comparison } => {
                let expression = match column {
                    AgeColumn::Age => AGE_EXPRESSION,
                    AgeColumn::AgeAtConsent => "p.age_at_consent",
                    AgeColumn::AgeAtCdr => "p.age_at_cdr",
                };
                let age = self.comparison(expression, comparison);
                format!("{age} AND NOT {dead}")
            }
            DemographicQuery::Deceased => dead,
        };
        format!("SELECT person_id FROM {person} p WHERE {condition}")
    }

    // ========================================================================
    // Comparisons
    // ========================================================================

    /// `<column> <op> <params>`. A comparison without the operands its
    /// operator needs matches nothing.
    fn comparison<T>(&mut self, column: &str, comparison: &Comparison<T>) -> String
    where
        T: Clone + Into<ParameterValue>,
    {
        let operands = comparison.operands.as_slice();
        match comparison.operator {
            Operator::Between => match operands {
                [low, high] => {
                    let low = self.binder.bind(low.clone());
                    let high = self.binder.bind(high.clone());
                    format!("{column} BETWEEN {low} AND {high}")
                }
                _ => "FALSE".to_string(),
            },
            Operator::In | Operator::NotIn => {
                let values = self.binder.bind(operands.to_vec());
                format!("{column} {} UNNEST({values})", comparison.operator.as_sql())
            }
            operator => match operands.first() {
                Some(value) => {
                    let value = self.binder.bind(value.clone());
                    format!("{column} {} {value}", operator.as_sql())
                }
                None => "FALSE".to_string(),
            },
        }
    }
}
