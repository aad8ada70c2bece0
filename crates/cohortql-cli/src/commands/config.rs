use anyhow::Result;
use cohortql_config::AppConfig;

use crate::output::print_heading;

pub fn show(cfg: &AppConfig) -> Result<()> {
    print_heading("Namespace", &cfg.namespace()?.to_string());
    print_heading("Log level", &cfg.logging.level);
    println!();
    print!("{}", cfg.to_toml()?);
    Ok(())
}
