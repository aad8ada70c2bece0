use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use cohortql_config::AppConfig;
use cohortql_core::SearchRequest;
use cohortql_search::{CohortCompiler, CohortService, format_for_log};
use cohortql_warehouse::InMemoryWarehouse;
use colored::Colorize;
use serde_json::json;

use crate::cli::{CompileArgs, CountArgs, ExplainArgs, SqlFormat};
use crate::output::{parameter_json, print_heading, print_json, print_success, print_table};

fn read_definition(path: &Path) -> Result<SearchRequest> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;
    SearchRequest::from_json(&content)
        .with_context(|| format!("Invalid cohort definition: {}", path.display()))
}

pub fn validate(cfg: &AppConfig, file: &Path) -> Result<()> {
    let request = read_definition(file)?;
    CohortCompiler::new(cfg.compiler)
        .validator()
        .validate(&request)?;
    print_success(&format!(
        "{} is valid ({} include, {} exclude groups)",
        file.display().to_string().cyan(),
        request.includes.len(),
        request.excludes.len()
    ));
    Ok(())
}

pub fn compile(cfg: &AppConfig, args: &CompileArgs) -> Result<()> {
    let request = read_definition(&args.file)?;
    let namespace = cfg.namespace()?;
    let query = CohortCompiler::new(cfg.compiler).compile(&request, &namespace, args.kind.into())?;

    match args.format {
        SqlFormat::Sql => println!("{}", query.sql),
        SqlFormat::Json => {
            let parameters: Vec<_> = query
                .parameters
                .iter()
                .map(|(name, value)| parameter_json(name, value))
                .collect();
            print_json(&json!({
                "sql": query.sql,
                "parameters": parameters,
            }))?;
        }
    }
    Ok(())
}

pub fn explain(cfg: &AppConfig, args: &ExplainArgs) -> Result<()> {
    let request = read_definition(&args.file)?;
    let namespace = cfg.namespace()?;
    let query = CohortCompiler::new(cfg.compiler).compile(&request, &namespace, args.kind.into())?;

    print_heading("Namespace", &namespace.to_string());
    println!("{}", format_for_log(&query.sql, &query.parameters));
    println!();

    if query.parameters.is_empty() {
        println!("No parameters.");
        return Ok(());
    }
    let rows = query
        .parameters
        .iter()
        .map(|(name, value)| {
            let type_name = match value.element_type() {
                Some(element) => format!("ARRAY<{element}>"),
                None => value.type_tag().to_string(),
            };
            [format!("@{name}"), type_name, value.render_literal()]
        })
        .collect();
    print_table(["Name", "Type", "Value"], rows);
    Ok(())
}

pub async fn count(cfg: &AppConfig, args: &CountArgs) -> Result<()> {
    let request = read_definition(&args.file)?;
    let namespace = cfg.namespace()?;
    let warehouse = InMemoryWarehouse::from_path(&args.fixture)
        .with_context(|| format!("Failed to load fixture: {}", args.fixture.display()))?;
    let service = CohortService::new(CohortCompiler::new(cfg.compiler), Arc::new(warehouse));

    let count = service.count_participants(&request, &namespace).await?;
    print_heading("Participants", &count.to_string());

    if args.ids {
        let ids = service.participant_ids(&request, &namespace).await?;
        let ids: Vec<String> = ids.iter().map(i64::to_string).collect();
        print_heading("Person ids", &ids.join(", "));
    }
    Ok(())
}
