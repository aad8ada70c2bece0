use cohortql_core::{ExpansionStrategy, domain};

use crate::output::print_table;

pub fn list() {
    let rows = domain::all()
        .iter()
        .map(|mapping| {
            let expansion = if mapping.domain.supports_hierarchy() {
                format!("{:?}", ExpansionStrategy::for_domain(mapping.domain))
            } else {
                "-".to_string()
            };
            [
                mapping.domain.to_string(),
                mapping.table_name.to_string(),
                mapping.denormalized_table_name.to_string(),
                mapping.concept_id_column.to_string(),
                mapping.source_concept_id_column.to_string(),
                mapping.entry_date_column.to_string(),
                expansion,
            ]
        })
        .collect();
    print_table(
        [
            "Domain",
            "Table",
            "Search table",
            "Concept column",
            "Source concept column",
            "Entry date column",
            "Expansion",
        ],
        rows,
    );
}
