use std::{env, fs};

use cohortql_config::{ConfigOverrides, load_config, load_config_with};

#[test]
fn config_parsing_and_env_overrides_and_validation() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("cohortql.toml");

    let toml_content = r#"
[warehouse]
project = "all-of-us"
dataset = "cdr2024"

[compiler]
max_groups = 5
log_sql = true

[logging]
level = "debug"
"#;
    fs::write(&path, toml_content).expect("write toml");

    // 1) Valid config parses, unspecified limits keep their defaults
    let cfg = load_config(Some(&path)).expect("should parse config");
    assert_eq!(cfg.namespace().unwrap().to_string(), "all-of-us.cdr2024");
    assert_eq!(cfg.compiler.max_groups, 5);
    assert_eq!(cfg.compiler.max_items_per_group, 20);
    assert!(cfg.compiler.log_sql);
    assert_eq!(cfg.logging.level, "debug");

    // 2) Env override wins over file
    unsafe {
        env::set_var("COHORTQL__COMPILER__MAX_GROUPS", "9");
    }
    let cfg_env = load_config(Some(&path)).expect("should parse config with env overrides");
    assert_eq!(cfg_env.compiler.max_groups, 9);
    unsafe {
        env::remove_var("COHORTQL__COMPILER__MAX_GROUPS");
    }

    // 3) Command-line overrides win over file
    let overrides = ConfigOverrides {
        dataset: Some("other-project.cdr2025".into()),
        log_level: Some("warn".into()),
    };
    let cfg_cli = load_config_with(Some(&path), &overrides).expect("should apply overrides");
    assert_eq!(cfg_cli.warehouse.project, "other-project");
    assert_eq!(cfg_cli.warehouse.dataset, "cdr2025");
    assert_eq!(cfg_cli.logging.level, "warn");

    // 4) Invalid config (zero limit) errors
    let invalid_path = dir.path().join("invalid.toml");
    let invalid_toml = r#"
[warehouse]
project = "all-of-us"
dataset = "cdr2024"

[compiler]
max_parameters_per_item = 0
"#;
    fs::write(&invalid_path, invalid_toml).expect("write invalid toml");
    let err = load_config(Some(&invalid_path)).expect_err("expected validation error");
    assert!(err.to_string().contains("max_parameters_per_item must be > 0"));
}

#[test]
fn missing_warehouse_is_rejected() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("cohortql.toml");
    fs::write(&path, "[logging]\nlevel = \"info\"\n").expect("write toml");

    let err = load_config(Some(&path)).expect_err("expected validation error");
    assert!(err.to_string().contains("warehouse.project must not be empty"));
}

#[test]
fn malformed_dataset_override_is_rejected() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("missing.toml");

    let overrides = ConfigOverrides {
        dataset: Some("proj.bad dataset".into()),
        log_level: None,
    };
    let err = load_config_with(Some(&path), &overrides).expect_err("expected namespace error");
    assert!(err.to_string().contains("bad dataset"));
}

#[test]
fn dataset_override_without_project_is_rejected() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("missing.toml");

    let overrides = ConfigOverrides {
        dataset: Some("cdr2024".into()),
        log_level: None,
    };
    let err = load_config_with(Some(&path), &overrides).expect_err("expected dataset error");
    assert!(err.to_string().contains("expected <project>.<dataset>"));
    assert!(!err.to_string().contains("project must not be empty"));
}
