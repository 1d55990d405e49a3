#![forbid(unsafe_code)]

use lck_lanes::{Verdict, VectorWidth};
use lck_tolerance::PrecisionMode;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

pub const REPORT_SCHEMA_VERSION: u8 = 1;

/// One lane verdict located by row and mode.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LaneOutcome {
    pub row: usize,
    pub mode: PrecisionMode,
    #[serde(flatten)]
    pub verdict: Verdict,
}

impl LaneOutcome {
    #[must_use]
    pub fn lane(&self) -> usize {
        self.verdict.lane
    }

    #[must_use]
    pub fn passed(&self) -> bool {
        self.verdict.pass
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationReport {
    pub function: String,
    pub width: VectorWidth,
    pub modes: Vec<PrecisionMode>,
    pub row_count: usize,
    pub total_lanes: usize,
    pub passed_lanes: usize,
    pub failed_lanes: usize,
    pub outcomes: Vec<LaneOutcome>,
}

impl VerificationReport {
    #[must_use]
    pub fn new(
        function: impl Into<String>,
        width: VectorWidth,
        modes: Vec<PrecisionMode>,
        row_count: usize,
        outcomes: Vec<LaneOutcome>,
    ) -> Self {
        let passed_lanes = outcomes.iter().filter(|outcome| outcome.passed()).count();
        Self {
            function: function.into(),
            width,
            modes,
            row_count,
            total_lanes: outcomes.len(),
            passed_lanes,
            failed_lanes: outcomes.len() - passed_lanes,
            outcomes,
        }
    }

    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.failed_lanes == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &LaneOutcome> + '_ {
        self.outcomes.iter().filter(|outcome| !outcome.passed())
    }

    #[must_use]
    pub fn outcomes_for(&self, mode: PrecisionMode) -> Vec<&LaneOutcome> {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.mode == mode)
            .collect()
    }

    /// SHA-256 over the canonical outcome stream: row, lane, mode, pass flag,
    /// reference bits and actual bits of every outcome in report order.
    #[must_use]
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.function.as_bytes());
        hasher.update([u8::from(self.width)]);
        for outcome in &self.outcomes {
            hasher.update((outcome.row as u64).to_le_bytes());
            hasher.update((outcome.lane() as u64).to_le_bytes());
            hasher.update(outcome.mode.as_str().as_bytes());
            hasher.update([u8::from(outcome.passed())]);
            hasher.update(outcome.verdict.reference_value.to_bits().to_le_bytes());
            hasher.update(outcome.verdict.actual_value.to_bits().to_le_bytes());
        }
        hex_lower(&hasher.finalize())
    }

    /// Failure diagnostics, each prefixed with its row.
    #[must_use]
    pub fn failure_lines(&self) -> Vec<String> {
        self.failures()
            .map(|outcome| {
                format!(
                    "row={} {}",
                    outcome.row,
                    outcome.verdict.diagnostic.as_deref().unwrap_or("no diagnostic")
                )
            })
            .collect()
    }
}

fn hex_lower(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(&mut out, "{byte:02x}");
    }
    out
}

#[derive(Serialize)]
struct ReportFile<'a> {
    schema_version: u8,
    digest: String,
    reports: &'a [VerificationReport],
}

/// Writes reports as pretty JSON with their combined digest.
pub fn write_reports(path: &Path, reports: &[VerificationReport]) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|err| format!("failed creating {}: {err}", parent.display()))?;
    }

    let file = ReportFile {
        schema_version: REPORT_SCHEMA_VERSION,
        digest: combined_digest(reports),
        reports,
    };
    let raw = serde_json::to_string_pretty(&file)
        .map_err(|err| format!("failed to serialize verification report: {err}"))?;
    fs::write(path, raw).map_err(|err| format!("failed writing {}: {err}", path.display()))
}

#[must_use]
pub fn combined_digest(reports: &[VerificationReport]) -> String {
    let mut hasher = Sha256::new();
    for report in reports {
        hasher.update(report.digest().as_bytes());
    }
    hex_lower(&hasher.finalize())
}
