use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use cohortql_core::CohortQueryKind;

#[derive(Parser)]
#[command(name = "cohortql")]
#[command(about = "Validate, compile and count cohort definitions")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (defaults to ./cohortql.toml when present)
    #[arg(short, long, global = true, env = "COHORTQL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Dataset namespace as project.dataset (overrides config)
    #[arg(short, long, global = true, env = "COHORTQL_DATASET")]
    pub dataset: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check a cohort definition without compiling it
    Validate(DefinitionArgs),
    /// Print the parameterized SQL for a cohort definition
    Compile(CompileArgs),
    /// Print the SQL with literals substituted, plus the parameter table
    Explain(ExplainArgs),
    /// Run a cohort definition against a fixture warehouse
    Count(CountArgs),
    /// List the domain registry
    Domains,
    /// Inspect the resolved configuration
    Config(ConfigArgs),
}

#[derive(clap::Args)]
pub struct DefinitionArgs {
    /// Path to a JSON cohort definition
    pub file: PathBuf,
}

#[derive(Clone, Copy, ValueEnum, Default)]
pub enum QueryKind {
    /// Number of distinct persons
    #[default]
    Count,
    /// Matching person ids
    Ids,
}

impl From<QueryKind> for CohortQueryKind {
    fn from(kind: QueryKind) -> Self {
        match kind {
            QueryKind::Count => CohortQueryKind::Count,
            QueryKind::Ids => CohortQueryKind::PersonIds,
        }
    }
}

#[derive(Clone, Copy, ValueEnum, Default)]
pub enum SqlFormat {
    #[default]
    Sql,
    Json,
}

#[derive(clap::Args)]
pub struct CompileArgs {
    /// Path to a JSON cohort definition
    pub file: PathBuf,
    /// Result shape
    #[arg(short, long, default_value = "count")]
    pub kind: QueryKind,
    /// Output format
    #[arg(short, long, default_value = "sql")]
    pub format: SqlFormat,
}

#[derive(clap::Args)]
pub struct ExplainArgs {
    /// Path to a JSON cohort definition
    pub file: PathBuf,
    /// Result shape
    #[arg(short, long, default_value = "count")]
    pub kind: QueryKind,
}

#[derive(clap::Args)]
pub struct CountArgs {
    /// Path to a JSON cohort definition
    pub file: PathBuf,
    /// Fixture warehouse (JSON)
    #[arg(long)]
    pub fixture: PathBuf,
    /// Also list the matching person ids
    #[arg(long)]
    pub ids: bool,
}

#[derive(clap::Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the resolved config
    Show,
}
