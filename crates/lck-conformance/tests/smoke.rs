use std::path::Path;

use lck_conformance::{
    FixtureStatus, HarnessConfig, run_conformance_suite, run_conformance_suite_in,
};
use lck_tolerance::PrecisionMode;

#[test]
fn bundled_fixtures_are_present() {
    let cfg = HarnessConfig::default_paths();
    let fixture_path = cfg.fixture_root.join("copysign_scenarios.json");
    assert!(Path::new(&fixture_path).exists());
}

#[test]
fn conformance_suite_passes() {
    let cfg = HarnessConfig::default_paths();
    let suite = run_conformance_suite(&cfg);

    assert!(suite.case_count >= 20, "only {} fixtures ran", suite.case_count);
    assert!(suite.load_errors.is_empty(), "{:?}", suite.load_errors);
    assert!(
        suite.all_passed(),
        "{} of {} fixtures conform:\n{}",
        suite.pass_count,
        suite.case_count,
        suite.failures.join("\n")
    );
}

#[test]
fn mode_filter_skips_fixtures_without_that_mode() {
    let cfg = HarnessConfig::default_paths();
    let suite = run_conformance_suite_in(&cfg, &[PrecisionMode::Relaxed]);

    assert!(suite.all_passed(), "{}", suite.failures.join("\n"));
    let skipped: Vec<&str> = suite
        .outcomes
        .iter()
        .filter(|outcome| outcome.status == FixtureStatus::Skipped)
        .map(|outcome| outcome.id.as_str())
        .collect();
    assert!(skipped.contains(&"copysign_w1_nan_output"), "{skipped:?}");
    assert!(!skipped.contains(&"exp_past_full_bound_within_relaxed"));
    for report in suite.reports() {
        assert_eq!(report.modes, vec![PrecisionMode::Relaxed]);
    }
}

#[test]
fn suite_digest_is_stable() {
    let cfg = HarnessConfig::default_paths();
    let first = run_conformance_suite(&cfg).reports();
    let second = run_conformance_suite(&cfg).reports();
    let first: Vec<String> = first.iter().map(|report| report.digest()).collect();
    let second: Vec<String> = second.iter().map(|report| report.digest()).collect();
    assert_eq!(first, second);
}
