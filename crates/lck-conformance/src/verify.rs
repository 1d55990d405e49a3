#![forbid(unsafe_code)]

use crate::report::{LaneOutcome, VerificationReport};
use lck_lanes::{InputTuple, LaneError, VectorWidth, compare, rows_of};
use lck_reference::{CatalogError, FunctionCatalog};
use lck_tolerance::PrecisionMode;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::sync::OnceLock;
use tracing::{debug, info, warn};

/// Kernel output vectors per precision mode. The key set is the set of
/// modes that get verified.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KernelOutputs {
    by_mode: BTreeMap<PrecisionMode, Vec<Vec<f32>>>,
}

impl KernelOutputs {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn single(mode: PrecisionMode, rows: Vec<Vec<f32>>) -> Self {
        Self::new().with(mode, rows)
    }

    #[must_use]
    pub fn with(mut self, mode: PrecisionMode, rows: Vec<Vec<f32>>) -> Self {
        self.insert(mode, rows);
        self
    }

    pub fn insert(&mut self, mode: PrecisionMode, rows: Vec<Vec<f32>>) -> Option<Vec<Vec<f32>>> {
        self.by_mode.insert(mode, rows)
    }

    /// Adds a flat output allocation laid out vector after vector.
    pub fn insert_buffer(
        &mut self,
        mode: PrecisionMode,
        buffer: &[f32],
        width: VectorWidth,
    ) -> Result<(), LaneError> {
        let rows = rows_of(buffer, width)?
            .into_iter()
            .map(<[f32]>::to_vec)
            .collect();
        self.by_mode.insert(mode, rows);
        Ok(())
    }

    #[must_use]
    pub fn rows(&self, mode: PrecisionMode) -> Option<&[Vec<f32>]> {
        self.by_mode.get(&mode).map(Vec::as_slice)
    }

    pub fn modes(&self) -> impl Iterator<Item = PrecisionMode> + '_ {
        self.by_mode.keys().copied()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_mode.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerifyError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("row {row}: {source}")]
    Lane { row: usize, source: LaneError },
    #[error("{mode} outputs hold {actual} rows, expected {expected}")]
    OutputRowCount {
        mode: PrecisionMode,
        expected: usize,
        actual: usize,
    },
    #[error("no precision mode requested")]
    NoModes,
}

impl VerifyError {
    #[must_use]
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::Catalog(err) => err.reason_code(),
            Self::Lane { source, .. } => source.reason_code(),
            Self::OutputRowCount { .. } => "verify_output_row_count_mismatch",
            Self::NoModes => "verify_no_modes_requested",
        }
    }
}

/// Verifies every lane of every row once per mode present in `outputs`.
///
/// Failing lanes are collected, never short-circuited. Setup defects (an
/// unknown function, a missing tolerance entry, mismatched shapes) are
/// returned as `Err` and never mixed with verdicts.
pub fn verify(
    catalog: &FunctionCatalog,
    function_id: &str,
    rows: &[InputTuple],
    width: VectorWidth,
    outputs: &KernelOutputs,
) -> Result<VerificationReport, VerifyError> {
    let result = run_verification(catalog, function_id, rows, width, outputs);
    match &result {
        Ok(report) => info!(
            function = %report.function,
            width = %width,
            rows = report.row_count,
            lanes = report.total_lanes,
            failed = report.failed_lanes,
            "verification finished"
        ),
        Err(err) => warn!(
            function = function_id,
            reason_code = err.reason_code(),
            error = %err,
            "verification setup defect"
        ),
    }
    result
}

/// [`verify`] against the built-in catalog.
pub fn verify_builtin(
    function_id: &str,
    rows: &[InputTuple],
    width: VectorWidth,
    outputs: &KernelOutputs,
) -> Result<VerificationReport, VerifyError> {
    static BUILTIN: OnceLock<FunctionCatalog> = OnceLock::new();
    verify(
        BUILTIN.get_or_init(FunctionCatalog::builtin),
        function_id,
        rows,
        width,
        outputs,
    )
}

fn run_verification(
    catalog: &FunctionCatalog,
    function_id: &str,
    rows: &[InputTuple],
    width: VectorWidth,
    outputs: &KernelOutputs,
) -> Result<VerificationReport, VerifyError> {
    let descriptor = catalog.describe(function_id)?;
    if outputs.is_empty() {
        return Err(VerifyError::NoModes);
    }
    for (mode, mode_rows) in &outputs.by_mode {
        if mode_rows.len() != rows.len() {
            return Err(VerifyError::OutputRowCount {
                mode: *mode,
                expected: rows.len(),
                actual: mode_rows.len(),
            });
        }
    }

    let mut outcomes = Vec::with_capacity(outputs.by_mode.len() * rows.len() * width.lanes());
    for (&mode, mode_rows) in &outputs.by_mode {
        // Collected in row order; the first defect by row index wins.
        let per_row: Vec<Result<Vec<LaneOutcome>, VerifyError>> = rows
            .par_iter()
            .zip(mode_rows.par_iter())
            .enumerate()
            .map(|(row, (tuple, actual))| {
                compare(&descriptor, tuple, actual, width, mode)
                    .map(|verdicts| {
                        verdicts
                            .into_iter()
                            .map(|verdict| LaneOutcome { row, mode, verdict })
                            .collect()
                    })
                    .map_err(|source| VerifyError::Lane { row, source })
            })
            .collect();

        for row_outcomes in per_row {
            for outcome in row_outcomes? {
                if !outcome.passed() {
                    debug!(
                        function = function_id,
                        row = outcome.row,
                        lane = outcome.lane(),
                        mode = %outcome.mode,
                        diagnostic = outcome.verdict.diagnostic.as_deref().unwrap_or_default(),
                        "lane failed"
                    );
                }
                outcomes.push(outcome);
            }
        }
    }

    Ok(VerificationReport::new(
        descriptor.function.name(),
        width,
        outputs.modes().collect(),
        rows.len(),
        outcomes,
    ))
}
