//! Cohort compiler entry point.
//!
//! `compile` validates the criteria tree, builds the person-set plan and
//! renders it against the namespace given by the caller. A compiler holds
//! only its configuration; every call owns its own binder, so one compiler
//! can be shared freely across tasks.

use cohortql_core::{CohortQueryKind, CompiledQuery, DatasetNamespace, QueryPlan, SearchRequest};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::aggregator::build_request_set;
use crate::binder::format_for_log;
use crate::error::{CompileError, Result};
use crate::render::SqlRenderer;
use crate::validation::RequestValidator;

/// Compiler limits and diagnostics switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    pub max_groups: usize,
    pub max_items_per_group: usize,
    pub max_parameters_per_item: usize,
    /// Log compiled SQL with literals substituted.
    pub log_sql: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            max_groups: 20,
            max_items_per_group: 20,
            max_parameters_per_item: 1000,
            log_sql: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CohortCompiler {
    config: CompilerConfig,
    validator: RequestValidator,
}

impl CohortCompiler {
    pub fn new(config: CompilerConfig) -> Self {
        Self {
            config,
            validator: RequestValidator::new(config),
        }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    pub fn validator(&self) -> &RequestValidator {
        &self.validator
    }

    /// Compile a cohort definition into parameterized SQL.
    pub fn compile(
        &self,
        request: &SearchRequest,
        namespace: &DatasetNamespace,
        kind: CohortQueryKind,
    ) -> Result<CompiledQuery> {
        self.compile_inner(request, namespace, kind)
            .inspect_err(|err| match err {
                CompileError::DomainResolution(_) | CompileError::Compilation(_) => {
                    error!(error = %err, category = %err.category(), "cohort compilation failed");
                }
                _ => debug!(error = %err, "cohort definition rejected"),
            })
    }

    fn compile_inner(
        &self,
        request: &SearchRequest,
        namespace: &DatasetNamespace,
        kind: CohortQueryKind,
    ) -> Result<CompiledQuery> {
        self.validator.validate(request)?;
        let set = build_request_set(request)?;

        let mut renderer = SqlRenderer::new(namespace);
        let sql = renderer.render_query(&set, kind);
        let parameters = renderer.into_binder().into_parameters();

        debug!(
            namespace = %namespace,
            ?kind,
            parameters = parameters.len(),
            "compiled cohort query"
        );
        if self.config.log_sql {
            debug!(sql = %format_for_log(&sql, &parameters), "cohort sql");
        }

        Ok(CompiledQuery {
            sql,
            parameters,
            plan: QueryPlan::Cohort { set, kind },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cohortql_core::{ParameterValue, SearchGroup, SearchGroupItem, SearchParameter};

    fn namespace() -> DatasetNamespace {
        DatasetNamespace::new("proj", "cdr").unwrap()
    }

    fn icd9_request(code: &str, group: bool) -> SearchRequest {
        let item = SearchGroupItem::new("i1", "ICD9").with_parameter(
            SearchParameter::new("ICD9")
                .with_subtype("CM")
                .with_domain("Condition")
                .with_value(code)
                .with_group(group),
        );
        SearchRequest::default().with_include(SearchGroup::new("g1").with_item(item))
    }

    #[test]
    fn test_default_config() {
        let config = CompilerConfig::default();
        assert_eq!(config.max_groups, 20);
        assert_eq!(config.max_parameters_per_item, 1000);
        assert!(!config.log_sql);

        let partial: CompilerConfig = serde_json::from_str(r#"{"max_groups": 3}"#).unwrap();
        assert_eq!(partial.max_groups, 3);
        assert_eq!(partial.max_items_per_group, 20);
    }

    #[test]
    fn test_compile_leaf_code() {
        let compiled = CohortCompiler::default()
            .compile(&icd9_request("11.1", false), &namespace(), CohortQueryKind::Count)
            .unwrap();
        assert!(compiled.sql.starts_with("SELECT COUNT(DISTINCT person_id) AS count FROM ("));
        assert!(compiled.sql.contains("code LIKE @p1"));
        assert_eq!(
            compiled.parameter("@p1"),
            Some(&ParameterValue::String("11.1%".to_string()))
        );
        assert!(!compiled.sql.contains("11.1"));
        assert!(matches!(
            compiled.plan,
            QueryPlan::Cohort {
                kind: CohortQueryKind::Count,
                ..
            }
        ));
    }

    #[test]
    fn test_compile_is_deterministic() {
        let compiler = CohortCompiler::default();
        let request = icd9_request("250", true);
        let first = compiler.compile(&request, &namespace(), CohortQueryKind::PersonIds).unwrap();
        let second = compiler.compile(&request, &namespace(), CohortQueryKind::PersonIds).unwrap();
        assert_eq!(first.sql, second.sql);
        assert_eq!(first.parameters, second.parameters);
    }

    #[test]
    fn test_validation_error_surfaces() {
        let err = CohortCompiler::default()
            .compile(&SearchRequest::default(), &namespace(), CohortQueryKind::Count)
            .unwrap_err();
        assert!(matches!(err, CompileError::Validation(ref v) if v.rule == "includes_empty"));
        assert!(err.is_client_error());
    }
}
