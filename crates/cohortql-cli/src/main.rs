mod cli;
mod commands;
mod observability;
mod output;

use anyhow::Result;
use clap::Parser;
use cohortql_config::{AppConfig, ConfigOverrides, load_config_with};

use cli::{Cli, Commands, ConfigCommands};
use output::print_error;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    observability::init_tracing_with_level(cli.log_level.as_deref().unwrap_or("warn"));

    match &cli.command {
        Commands::Validate(args) => {
            let cfg = resolve_config(&cli)?;
            commands::cohort::validate(&cfg, &args.file)?;
        }
        Commands::Compile(args) => {
            let cfg = resolve_config(&cli)?;
            commands::cohort::compile(&cfg, args)?;
        }
        Commands::Explain(args) => {
            let cfg = resolve_config(&cli)?;
            commands::cohort::explain(&cfg, args)?;
        }
        Commands::Count(args) => {
            let cfg = resolve_config(&cli)?;
            commands::cohort::count(&cfg, args).await?;
        }
        Commands::Domains => commands::domains::list(),
        Commands::Config(args) => match &args.command {
            ConfigCommands::Show => {
                let cfg = resolve_config(&cli)?;
                commands::config::show(&cfg)?;
            }
        },
    }

    Ok(())
}

fn resolve_config(cli: &Cli) -> Result<AppConfig> {
    let overrides = ConfigOverrides {
        dataset: cli.dataset.clone(),
        log_level: cli.log_level.clone(),
    };
    let cfg = load_config_with(cli.config.as_deref(), &overrides)?;
    observability::apply_logging_level(&cfg.logging.level);
    tracing::debug!(namespace = %cfg.namespace()?, "configuration resolved");
    Ok(cfg)
}
