//! Parameter binding.
//!
//! Every literal that reaches SQL goes through a [`ParameterBinder`]. Names
//! are `p0`, `p1`, ... in bind order, so identical input always yields
//! identical SQL. Each compile owns its binder.

use cohortql_core::{ParameterType, ParameterValue};
use indexmap::IndexMap;
use regex::{Captures, Regex};
use std::sync::LazyLock;

static PLACEHOLDER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"@([A-Za-z_][A-Za-z0-9_]*)").expect("Invalid placeholder regex")
});

/// One bound value.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryParameterBinding {
    pub name: String,
    pub value: ParameterValue,
}

impl QueryParameterBinding {
    pub fn type_tag(&self) -> ParameterType {
        self.value.type_tag()
    }

    /// `@name` as it appears in SQL.
    pub fn placeholder(&self) -> String {
        format!("@{}", self.name)
    }
}

/// Ordered arena of bindings; a binding's index is its name.
#[derive(Debug, Default)]
pub struct ParameterBinder {
    bindings: Vec<QueryParameterBinding>,
}

impl ParameterBinder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name_for(index: usize) -> String {
        format!("p{index}")
    }

    /// Register a value and return its placeholder. Repeated values still
    /// get distinct names.
    pub fn bind(&mut self, value: impl Into<ParameterValue>) -> String {
        let name = Self::name_for(self.bindings.len());
        let binding = QueryParameterBinding {
            name,
            value: value.into(),
        };
        let placeholder = binding.placeholder();
        self.bindings.push(binding);
        placeholder
    }

    pub fn bindings(&self) -> &[QueryParameterBinding] {
        &self.bindings
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn render_literal(binding: &QueryParameterBinding) -> String {
        binding.value.render_literal()
    }

    pub fn into_parameters(self) -> IndexMap<String, ParameterValue> {
        self.bindings
            .into_iter()
            .map(|binding| (binding.name, binding.value))
            .collect()
    }
}

/// Substitute bound values back into `sql` for logs.
///
/// The result is for humans only and must never be sent to a warehouse.
/// Placeholders without a binding are left as they are.
pub fn format_for_log(sql: &str, parameters: &IndexMap<String, ParameterValue>) -> String {
    PLACEHOLDER_REGEX
        .replace_all(sql, |caps: &Captures<'_>| match parameters.get(&caps[1]) {
            Some(value) => value.render_literal(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cohortql_core::time::parse_timestamp;
    use time::macros::datetime;

    #[test]
    fn test_sequential_names() {
        let mut binder = ParameterBinder::new();
        assert_eq!(binder.bind("a"), "@p0");
        assert_eq!(binder.bind("a"), "@p1");
        assert_eq!(binder.bind(1i64), "@p2");
        assert_eq!(binder.len(), 3);
        assert_eq!(binder.bindings()[2].type_tag(), ParameterType::Int64);
    }

    #[test]
    fn test_into_parameters_keeps_order() {
        let mut binder = ParameterBinder::new();
        binder.bind(true);
        binder.bind(vec![1i64, 2]);
        let params = binder.into_parameters();
        let names: Vec<&str> = params.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["p0", "p1"]);
        assert_eq!(params["p1"].type_tag(), ParameterType::Array);
    }

    #[test]
    fn test_format_for_log() {
        let mut binder = ParameterBinder::new();
        let mut sql = String::from("SELECT 1 WHERE code LIKE ");
        sql.push_str(&binder.bind("11.1%"));
        for i in 0..10 {
            sql.push_str(" AND x = ");
            sql.push_str(&binder.bind(i as i64));
        }
        let logged = format_for_log(&sql, &binder.into_parameters());
        assert!(logged.starts_with("SELECT 1 WHERE code LIKE 11.1% AND x = 0"));
        // @p10 must not be read as @p1 followed by "0".
        assert!(logged.ends_with("AND x = 9"));
    }

    #[test]
    fn test_format_for_log_leaves_unknown_placeholders() {
        let params = IndexMap::new();
        assert_eq!(format_for_log("WHERE a = @p0", &params), "WHERE a = @p0");
    }

    #[test]
    fn test_timestamp_round_trip() {
        let ts = datetime!(2019-03-01 12:30:45.123 +05:00);
        let mut binder = ParameterBinder::new();
        binder.bind(ts);
        let rendered = ParameterBinder::render_literal(&binder.bindings()[0]);
        let inner = rendered
            .strip_prefix("TIMESTAMP '")
            .and_then(|s| s.strip_suffix('\''))
            .unwrap();
        let parsed = parse_timestamp(inner).unwrap();
        assert_eq!(
            parsed.unix_timestamp_nanos() / 1_000_000,
            ts.unix_timestamp_nanos() / 1_000_000
        );
    }
}
