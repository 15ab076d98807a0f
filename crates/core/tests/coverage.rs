mod common;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use common::*;
use deepcover_core::analysis::build;
use deepcover_core::coverage::{collapse, package_set};
use deepcover_core::dependencies::extract_all;
use deepcover_core::module::ModuleResolver;
use deepcover_core::{
    CoverMode, Deepcover, DeepcoverConfig, DeepcoverError, Locator, MatchRule, ModuleCache,
};
use regex::Regex;

fn engine(fake: &FakeToolchain) -> Deepcover {
    Deepcover::new(example_loader(), fake.clone())
}

fn summary_of(rows: &[deepcover_core::CoverageRow]) -> Vec<(String, Option<u32>, f64)> {
    rows.iter().map(|r| (r.function.clone(), r.weight, r.percent)).collect()
}

#[test]
fn rows_are_kept_per_dependency_and_weighted() {
    let fake = FakeToolchain::new(SUMMARY);
    let report = engine(&fake).run(ROOT, "Test").unwrap();

    assert_eq!(summary_of(&report.coverages), vec![
        ("Top".to_string(), Some(1), 100.0),
        ("Bottom".to_string(), Some(1), 100.0),
        ("Alternative".to_string(), Some(1), 100.0),
        ("newInterface".to_string(), Some(1), 100.0),
        ("Method".to_string(), Some(3), 75.0),
        ("Method".to_string(), Some(1), 100.0),
        ("SubPkg".to_string(), Some(5), 83.3),
    ]);
    assert!((report.approx_total - 1141.5 / 13.0).abs() < 1e-9, "got {}", report.approx_total);
    assert_eq!(format!("{:.2}", report.approx_total), "87.81");
}

#[test]
fn substring_rule_also_keeps_prefix_sharing_packages() {
    let fake = FakeToolchain::new(SUMMARY);
    let config = DeepcoverConfig { match_rule: MatchRule::Substring, ..Default::default() };
    let report = engine(&fake).with_config(config).run(ROOT, "Test").unwrap();

    assert_eq!(report.coverages.len(), 8);
    let sibling = report.coverages.last().unwrap();
    assert_eq!(sibling.path, format!("{SIBLING}/sibling.go:3:"));
    assert_eq!(sibling.weight, Some(1));
    assert!((report.approx_total - 1141.5 / 14.0).abs() < 1e-9);
}

#[test]
fn one_test_run_instruments_every_dependency_package() {
    let fake = FakeToolchain::new(SUMMARY);
    let config = DeepcoverConfig {
        cover_mode: CoverMode::Count,
        test_args: vec!["-count=1".to_string()],
        ..Default::default()
    };
    engine(&fake).with_config(config).run(ROOT, "Test").unwrap();

    let log = fake.log();
    let log = log.lock().unwrap();
    assert_eq!(log.test_runs.len(), 1);
    assert_eq!(log.summaries, 1);
    let args = &log.test_runs[0];
    let profile = format!("-coverprofile={}", log.profiles[0].display());
    assert_eq!(args, &vec![
        "test".to_string(),
        "-run".to_string(),
        "Test".to_string(),
        profile,
        "-covermode=count".to_string(),
        format!("-coverpkg={ROOT},{SUBPKG}"),
        "-count=1".to_string(),
        ROOT.to_string(),
    ]);
    assert!(log.profiles[0].ends_with("coverage.out"));
}

#[test]
fn profile_directory_is_removed_after_the_run() {
    let fake = FakeToolchain::new(SUMMARY);
    engine(&fake).run(ROOT, "Test").unwrap();

    let log = fake.log();
    let profile = log.lock().unwrap().profiles[0].clone();
    let dir = profile.parent().unwrap();
    assert!(dir.file_name().unwrap().to_string_lossy().starts_with("deepcover-"));
    assert!(!dir.exists());
}

#[test]
fn failing_tests_abort_and_still_clean_up() {
    let fake = FakeToolchain::failing();
    let err = engine(&fake).run(ROOT, "Test").unwrap_err();
    assert!(matches!(err, DeepcoverError::Invocation { ref command, .. } if command == "go test"));
    assert!(err.to_string().contains("--- FAIL: TestTop"));

    let log = fake.log();
    let log = log.lock().unwrap();
    assert_eq!(log.summaries, 0);
    assert!(!log.profiles[0].parent().unwrap().exists());
}

#[test]
fn malformed_summary_is_a_parse_error() {
    let fake = FakeToolchain::new("example.com/deepcover/testexample/example.go:8:\tTop\tabc%\n");
    let err = engine(&fake).run(ROOT, "Test").unwrap_err();
    assert!(matches!(err, DeepcoverError::Parse { .. }), "unexpected: {err}");
}

#[test]
fn no_targets_means_no_test_run() {
    let fake = FakeToolchain::new(SUMMARY);
    let report = engine(&fake).run(ROOT, "^ImpossibleFn$").unwrap();
    assert!(report.coverages.is_empty());
    assert_eq!(report.approx_total, 0.0);
    assert!(fake.log().lock().unwrap().test_runs.is_empty());
}

#[test]
fn invalid_regex_is_rejected_before_loading() {
    let fake = FakeToolchain::new(SUMMARY);
    let err = engine(&fake).run(ROOT, "Test(").unwrap_err();
    assert!(matches!(err, DeepcoverError::InvalidRegex(_)));
}

#[test]
fn cancel_flag_stops_before_analysis() {
    let fake = FakeToolchain::new(SUMMARY);
    let flag = Arc::new(AtomicBool::new(true));
    let err = engine(&fake).with_cancel_flag(flag).run(ROOT, "Test").unwrap_err();
    assert!(matches!(err, DeepcoverError::Cancelled("analysis")));
    assert_eq!(err.to_string(), "analysis cancelled before analysis");
    assert!(fake.log().lock().unwrap().test_runs.is_empty());
}

#[test]
fn shared_module_cache_survives_runs() {
    let fake = FakeToolchain::new(SUMMARY);
    let cache = ModuleCache::shared();
    let engine = engine(&fake).with_module_cache(Arc::clone(&cache));
    engine.run(ROOT, "Test").unwrap();
    let seeded = cache.len();
    assert!(seeded > 0);
    assert_eq!(cache.get(ROOT), Some(Some(MODULE.to_string())));

    engine.run(ROOT, "TestTop").unwrap();
    assert_eq!(cache.len(), seeded);
}

#[test]
fn collapse_is_a_first_occurrence_union() {
    let loader = example_loader();
    let cache = ModuleCache::new();
    let locator = Locator::import_path(ROOT);
    let dataset = build(&loader, &cache, &locator, &Regex::new("Test").unwrap()).unwrap();
    let resolver = ModuleResolver::new(&loader, &cache, &locator);
    let all = extract_all(&dataset, &resolver).unwrap();

    let once = collapse(all.values().flatten().cloned());
    let twice = collapse(once.iter().cloned().chain(once.iter().cloned()));
    assert_eq!(once, twice);
    assert_eq!(once.len(), 10);
    assert_eq!(package_set(&once, &dataset.files), vec![ROOT.to_string(), SUBPKG.to_string()]);
}

#[test]
fn analyze_lists_dependencies_with_locations() {
    let fake = FakeToolchain::new(SUMMARY);
    let targets = engine(&fake).analyze(ROOT, "TestBottom").unwrap();
    assert_eq!(targets.len(), 1);
    let deps = &targets[0].dependencies;
    assert_eq!(deps[0].location.as_deref(), Some("example_test.go:9"));
    let method = deps.iter().find(|d| d.function.name == "(*Struct).Method").unwrap();
    assert_eq!(method.location.as_deref(), Some("interface.go:15"));
    assert_eq!(method.weight, 3);
    assert!(fake.log().lock().unwrap().test_runs.is_empty());
}
