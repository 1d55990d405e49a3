#![forbid(unsafe_code)]

use crate::fixtures::{Expectation, FixtureError, LaneFixture, fixture_files, load_fixture_file};
use crate::report::VerificationReport;
use crate::verify::{VerifyError, verify};
use lck_reference::FunctionCatalog;
use lck_tolerance::PrecisionMode;
use std::path::Path;
use tracing::warn;

/// How a fixture's verification compared with its declared expectation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixtureStatus {
    /// Outcome matched `expect`.
    Conforming,
    /// Lanes passed or failed against `expect`.
    Mismatch,
    /// A setup defect the fixture did not declare.
    Defect,
    /// None of the requested modes has outputs in this fixture.
    Skipped,
}

#[derive(Debug, Clone)]
pub struct FixtureOutcome {
    pub id: String,
    pub status: FixtureStatus,
    pub report: Option<VerificationReport>,
    pub error: Option<VerifyError>,
    pub fixture_error: Option<FixtureError>,
}

#[derive(Debug, Clone, Default)]
pub struct SuiteReport {
    pub case_count: usize,
    pub pass_count: usize,
    pub failures: Vec<String>,
    pub outcomes: Vec<FixtureOutcome>,
    pub load_errors: Vec<FixtureError>,
}

impl SuiteReport {
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.case_count == self.pass_count && self.failures.is_empty()
    }

    #[must_use]
    pub fn has_defects(&self) -> bool {
        !self.load_errors.is_empty()
            || self
                .outcomes
                .iter()
                .any(|outcome| outcome.status == FixtureStatus::Defect)
    }

    #[must_use]
    pub fn has_mismatches(&self) -> bool {
        self.outcomes
            .iter()
            .any(|outcome| outcome.status == FixtureStatus::Mismatch)
    }

    /// Reports of every fixture that reached verification, in run order.
    #[must_use]
    pub fn reports(&self) -> Vec<VerificationReport> {
        self.outcomes
            .iter()
            .filter_map(|outcome| outcome.report.clone())
            .collect()
    }

    fn record(&mut self, outcome: FixtureOutcome, failure: Option<String>) {
        if outcome.status != FixtureStatus::Skipped {
            self.case_count += 1;
            if failure.is_none() {
                self.pass_count += 1;
            }
        }
        self.failures.extend(failure);
        self.outcomes.push(outcome);
    }
}

/// Verifies one fixture and classifies the result against `expect`.
pub fn run_fixture(
    catalog: &FunctionCatalog,
    fixture: &LaneFixture,
    modes: Option<&[PrecisionMode]>,
) -> (FixtureOutcome, Option<String>) {
    let outputs = match fixture.kernel_outputs(modes) {
        Ok(outputs) => outputs,
        Err(err) => {
            warn!(fixture = %fixture.id, reason_code = err.reason_code(), "fixture rejected");
            let (status, failure) = classify_defect(fixture, err.reason_code(), &err);
            return (
                FixtureOutcome {
                    id: fixture.id.clone(),
                    status,
                    report: None,
                    error: None,
                    fixture_error: Some(err),
                },
                failure,
            );
        }
    };
    if outputs.is_empty() && modes.is_some() {
        return (
            FixtureOutcome {
                id: fixture.id.clone(),
                status: FixtureStatus::Skipped,
                report: None,
                error: None,
                fixture_error: None,
            },
            None,
        );
    }

    let rows = fixture.input_rows();
    let result = verify(catalog, &fixture.function, &rows, fixture.width, &outputs);
    let (status, failure) = classify(fixture, &result);
    let (report, error) = match result {
        Ok(report) => (Some(report), None),
        Err(err) => (None, Some(err)),
    };
    (
        FixtureOutcome {
            id: fixture.id.clone(),
            status,
            report,
            error,
            fixture_error: None,
        },
        failure,
    )
}

fn classify(
    fixture: &LaneFixture,
    result: &Result<VerificationReport, VerifyError>,
) -> (FixtureStatus, Option<String>) {
    match (fixture.expect, result) {
        (Expectation::Pass, Ok(report)) if report.all_passed() => (FixtureStatus::Conforming, None),
        (Expectation::Pass, Ok(report)) => (
            FixtureStatus::Mismatch,
            Some(format!(
                "{}: {} of {} lanes failed\n{}",
                fixture.id,
                report.failed_lanes,
                report.total_lanes,
                report.failure_lines().join("\n")
            )),
        ),
        (Expectation::Fail, Ok(report)) if !report.all_passed() => {
            (FixtureStatus::Conforming, None)
        }
        (Expectation::Fail, Ok(_)) => (
            FixtureStatus::Mismatch,
            Some(format!("{}: expected failing lanes, all passed", fixture.id)),
        ),
        (Expectation::Error, Ok(_)) => (
            FixtureStatus::Mismatch,
            Some(format!("{}: expected a setup defect, verification ran", fixture.id)),
        ),
        (_, Err(err)) => classify_defect(fixture, err.reason_code(), err),
    }
}

/// A setup defect conforms only when the fixture declares it, and the
/// declared reason code, if any, matches.
fn classify_defect(
    fixture: &LaneFixture,
    reason_code: &str,
    err: &dyn std::fmt::Display,
) -> (FixtureStatus, Option<String>) {
    let declared = fixture.expect == Expectation::Error
        && fixture
            .expected_reason_code
            .as_deref()
            .is_none_or(|code| code == reason_code);
    if declared {
        (FixtureStatus::Conforming, None)
    } else {
        (
            FixtureStatus::Defect,
            Some(format!("{}: reason_code={reason_code} {err}", fixture.id)),
        )
    }
}

/// Runs every fixture file under `dir`. Unreadable files are collected as
/// load errors and the remaining files still run.
#[must_use]
pub fn run_fixture_dir(
    catalog: &FunctionCatalog,
    dir: &Path,
    modes: Option<&[PrecisionMode]>,
) -> SuiteReport {
    let mut suite = SuiteReport::default();
    let files = match fixture_files(dir) {
        Ok(files) => files,
        Err(err) => {
            warn!(reason_code = err.reason_code(), error = %err, "fixture directory unreadable");
            suite.failures.push(err.to_string());
            suite.load_errors.push(err);
            return suite;
        }
    };

    for path in files {
        match load_fixture_file(&path) {
            Ok(fixtures) => {
                for fixture in &fixtures {
                    let (outcome, failure) = run_fixture(catalog, fixture, modes);
                    suite.record(outcome, failure);
                }
            }
            Err(err) => {
                warn!(reason_code = err.reason_code(), error = %err, "fixture file skipped");
                suite.failures.push(err.to_string());
                suite.load_errors.push(err);
            }
        }
    }
    suite
}
