use cohortql_core::ParameterValue;
use colored::Colorize;
use serde_json::{Value, json};
use tabled::builder::Builder;
use tabled::settings::Style;

pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

pub fn print_heading(label: &str, value: &str) {
    println!("{}: {}", label.cyan(), value);
}

pub fn print_table<const N: usize>(header: [&str; N], rows: Vec<[String; N]>) {
    let mut builder = Builder::default();
    builder.push_record(header);
    for row in rows {
        builder.push_record(row);
    }
    println!("{}", builder.build().with(Style::rounded()));
}

pub fn print_json(value: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Query parameter as sent alongside the SQL text.
pub fn parameter_json(name: &str, value: &ParameterValue) -> Value {
    let mut parameter = json!({
        "name": name,
        "type": value.type_tag().to_string(),
        "value": value.to_json(),
    });
    if let Some(element) = value.element_type() {
        parameter["arrayType"] = json!(element.to_string());
    }
    parameter
}
