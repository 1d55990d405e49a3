#![forbid(unsafe_code)]

pub mod fixtures;
pub mod report;
pub mod suite;
pub mod verify;

pub use report::{LaneOutcome, VerificationReport};
pub use suite::{FixtureStatus, SuiteReport, run_fixture_dir};
pub use verify::{KernelOutputs, VerifyError, verify, verify_builtin};

use lck_reference::FunctionCatalog;
use lck_tolerance::PrecisionMode;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub fixture_root: PathBuf,
    pub report_root: PathBuf,
}

impl HarnessConfig {
    #[must_use]
    pub fn default_paths() -> Self {
        let crate_root = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        Self {
            fixture_root: crate_root.join("fixtures"),
            report_root: crate_root.join("../../artifacts/reports"),
        }
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self::default_paths()
    }
}

/// Runs the bundled fixture suite in every mode against the built-in catalog.
#[must_use]
pub fn run_conformance_suite(config: &HarnessConfig) -> SuiteReport {
    run_fixture_dir(&FunctionCatalog::builtin(), &config.fixture_root, None)
}

/// Same as [`run_conformance_suite`], limited to `modes`.
#[must_use]
pub fn run_conformance_suite_in(config: &HarnessConfig, modes: &[PrecisionMode]) -> SuiteReport {
    run_fixture_dir(&FunctionCatalog::builtin(), &config.fixture_root, Some(modes))
}
