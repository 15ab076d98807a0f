mod common;

use std::fs;

use common::*;
use deepcover::commands::{
    apply_overrides, coverage_command, dependencies_command, load_config, ConfigOverrides,
};
use deepcover_core::{CoverMode, Deepcover, GoToolchain, MatchRule, MemoryLoader};
use tempfile::tempdir;

fn calc_engine() -> Deepcover {
    let loader = MemoryLoader::new()
        .package(Some(MODULE), PACKAGE, &[("calc.go", CALC_GO)])
        .test_files(PACKAGE, &[("calc_test.go", CALC_TEST_GO)])
        .standard("testing");
    Deepcover::new(loader, GoToolchain::new("/definitely/not/a/go/binary"))
}

#[test]
fn load_config_defaults_without_a_file() {
    let config = load_config(None).unwrap();
    assert_eq!(config.cover_mode, CoverMode::Atomic);
    assert_eq!(config.match_rule, MatchRule::Ownership);
}

#[test]
fn load_config_reads_json_and_yaml() {
    let temp = tempdir().unwrap();
    let json = temp.path().join("deepcover.json");
    fs::write(&json, r#"{"cover_mode":"set","test_args":["-count=1"]}"#).unwrap();
    let config = load_config(Some(&json)).unwrap();
    assert_eq!(config.cover_mode, CoverMode::Set);
    assert_eq!(config.match_rule, MatchRule::Ownership);
    assert_eq!(config.test_args, vec!["-count=1"]);

    let yaml = temp.path().join("deepcover.yml");
    fs::write(&yaml, "match_rule: substring\ngo_binary: /opt/go/bin/go\n").unwrap();
    let config = load_config(Some(&yaml)).unwrap();
    assert_eq!(config.match_rule, MatchRule::Substring);
    assert_eq!(config.resolve_go_binary(), std::path::PathBuf::from("/opt/go/bin/go"));
}

#[test]
fn load_config_errors_name_the_file() {
    let temp = tempdir().unwrap();
    let bad = temp.path().join("deepcover.json");
    fs::write(&bad, "not-json").unwrap();
    let err = load_config(Some(&bad)).unwrap_err();
    assert!(err.to_string().contains("Failed to parse JSON config"), "unexpected error: {err}");

    let bad_yaml = temp.path().join("deepcover.yaml");
    fs::write(&bad_yaml, "cover_mode: sometimes\n").unwrap();
    let err = load_config(Some(&bad_yaml)).unwrap_err();
    assert!(err.to_string().contains("Failed to parse YAML config"), "unexpected error: {err}");
}

#[test]
fn overrides_win_over_the_file() {
    let temp = tempdir().unwrap();
    let yaml = temp.path().join("deepcover.yaml");
    fs::write(&yaml, "cover_mode: count\nmatch_rule: substring\n").unwrap();
    let config = load_config(Some(&yaml)).unwrap();

    let config = apply_overrides(config, &ConfigOverrides {
        cover_mode: Some("set".into()),
        match_rule: None,
    })
    .unwrap();
    assert_eq!(config.cover_mode, CoverMode::Set);
    assert_eq!(config.match_rule, MatchRule::Substring);

    let err = apply_overrides(config, &ConfigOverrides {
        cover_mode: None,
        match_rule: Some("fuzzy".into()),
    })
    .unwrap_err();
    assert!(err.to_string().contains("unknown match rule"), "unexpected error: {err}");
}

#[test]
fn dependencies_command_needs_no_toolchain() {
    dependencies_command(&calc_engine(), PACKAGE, "Test", false).unwrap();
    dependencies_command(&calc_engine(), PACKAGE, "Test", true).unwrap();
}

#[test]
fn dependencies_command_adds_context() {
    let err = dependencies_command(&calc_engine(), "example.com/missing", "Test", false)
        .unwrap_err();
    let message = format!("{err:#}");
    assert!(message.starts_with("Failed to extract dependencies of example.com/missing"));
    assert!(message.contains("no packages found"), "unexpected error: {message}");
}

#[test]
fn coverage_command_reports_toolchain_failures() {
    if std::env::var_os("DEEPCOVER_FAKE_COVER_FUNC").is_some() {
        return;
    }
    let err = coverage_command(&calc_engine(), PACKAGE, "Test", None, false).unwrap_err();
    let message = format!("{err:#}");
    assert!(message.starts_with(&format!("Failed to compute coverage of {PACKAGE}")));
    assert!(message.contains("go test failed"), "unexpected error: {message}");
}

#[test]
fn coverage_command_with_no_targets_prints_an_empty_table() {
    let temp = tempdir().unwrap();
    let out = temp.path().join("empty.cover");
    coverage_command(&calc_engine(), PACKAGE, "^Nothing$", Some(&out), false).unwrap();
    assert_eq!(fs::read_to_string(&out).unwrap(), "Total: 0.00%\n");
}
