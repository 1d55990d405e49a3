#![forbid(unsafe_code)]

use lck_accept::build_range;
use lck_float::{FloatDiagnostic, flush_subnormal};
use lck_reference::{CatalogError, FunctionDescriptor};
use lck_tolerance::PrecisionMode;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt::Write as _;

/// Lane count of a vector value. Width 3 is stored with a fourth padding
/// lane that is never compared.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub enum VectorWidth {
    One,
    Two,
    Three,
    Four,
}

impl VectorWidth {
    pub const ALL: [Self; 4] = [Self::One, Self::Two, Self::Three, Self::Four];

    #[must_use]
    pub const fn lanes(self) -> usize {
        match self {
            Self::One => 1,
            Self::Two => 2,
            Self::Three => 3,
            Self::Four => 4,
        }
    }

    /// Physical element count per vector, padding included.
    #[must_use]
    pub const fn stride(self) -> usize {
        match self {
            Self::Three => 4,
            other => other.lanes(),
        }
    }

    #[must_use]
    pub fn from_lanes(lanes: usize) -> Option<Self> {
        Self::ALL.into_iter().find(|width| width.lanes() == lanes)
    }

    /// Whether `len` is a valid storage length: logical lanes, or the padded
    /// stride.
    #[must_use]
    pub fn accepts_len(self, len: usize) -> bool {
        len == self.lanes() || len == self.stride()
    }
}

impl TryFrom<u8> for VectorWidth {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_lanes(usize::from(value))
            .ok_or_else(|| format!("vector width must be 1, 2, 3 or 4, got {value}"))
    }
}

impl From<VectorWidth> for u8 {
    fn from(width: VectorWidth) -> Self {
        match width {
            VectorWidth::One => 1,
            VectorWidth::Two => 2,
            VectorWidth::Three => 3,
            VectorWidth::Four => 4,
        }
    }
}

impl std::fmt::Display for VectorWidth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.lanes())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArgValues {
    /// One value per lane, optionally followed by the width-3 padding slot.
    Lanes(Vec<f32>),
    /// A scalar broadcast to every lane.
    Splat(f32),
}

impl ArgValues {
    fn lane(&self, lane: usize) -> Option<f32> {
        match self {
            Self::Lanes(values) => values.get(lane).copied(),
            Self::Splat(value) => Some(*value),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NamedArg {
    pub role: String,
    pub values: ArgValues,
}

impl NamedArg {
    pub fn lanes(role: impl Into<String>, values: Vec<f32>) -> Self {
        Self {
            role: role.into(),
            values: ArgValues::Lanes(values),
        }
    }

    pub fn splat(role: impl Into<String>, value: f32) -> Self {
        Self {
            role: role.into(),
            values: ArgValues::Splat(value),
        }
    }
}

/// The inputs of one kernel invocation, one argument per declared role.
#[derive(Debug, Clone, PartialEq)]
pub struct InputTuple {
    args: Vec<NamedArg>,
}

impl InputTuple {
    #[must_use]
    pub fn new(args: Vec<NamedArg>) -> Self {
        Self { args }
    }

    #[must_use]
    pub fn args(&self) -> &[NamedArg] {
        &self.args
    }

    /// Checks the tuple against the function's roles and the vector width.
    pub fn validate(&self, roles: &[&str], width: VectorWidth) -> Result<(), LaneError> {
        if self.args.len() != roles.len() {
            return Err(LaneError::ArityMismatch {
                expected: roles.len(),
                actual: self.args.len(),
            });
        }
        for (position, (arg, expected)) in self.args.iter().zip(roles).enumerate() {
            if arg.role != *expected {
                return Err(LaneError::RoleMismatch {
                    position,
                    expected: (*expected).to_string(),
                    actual: arg.role.clone(),
                });
            }
            if let ArgValues::Lanes(values) = &arg.values
                && !width.accepts_len(values.len())
            {
                return Err(LaneError::ArgumentWidth {
                    role: arg.role.clone(),
                    width,
                    actual: values.len(),
                });
            }
        }
        Ok(())
    }

    /// Scalar inputs of one lane, in role order. Call after [`Self::validate`].
    #[must_use]
    pub fn lane(&self, lane: usize) -> Vec<f32> {
        self.args
            .iter()
            .map(|arg| arg.values.lane(lane).unwrap_or(f32::NAN))
            .collect()
    }

    /// Splits flat per-argument buffers (vector after vector, in the padded
    /// layout) into one tuple per row.
    pub fn batch_from_buffers(
        buffers: &[(&str, &[f32])],
        width: VectorWidth,
    ) -> Result<Vec<Self>, LaneError> {
        let mut columns = Vec::with_capacity(buffers.len());
        for (role, buffer) in buffers {
            columns.push((*role, rows_of(buffer, width)?));
        }
        let row_count = columns.first().map_or(0, |(_, rows)| rows.len());
        if let Some((role, rows)) = columns.iter().find(|(_, rows)| rows.len() != row_count) {
            return Err(LaneError::RowCountMismatch {
                role: (*role).to_string(),
                expected: row_count,
                actual: rows.len(),
            });
        }
        Ok((0..row_count)
            .map(|row| {
                Self::new(
                    columns
                        .iter()
                        .map(|(role, rows)| NamedArg::lanes(*role, rows[row].to_vec()))
                        .collect(),
                )
            })
            .collect())
    }
}

/// Splits a flat buffer into vectors of `width.stride()` elements.
pub fn rows_of(buffer: &[f32], width: VectorWidth) -> Result<Vec<&[f32]>, LaneError> {
    let stride = width.stride();
    if buffer.len() % stride != 0 {
        return Err(LaneError::RaggedBuffer {
            len: buffer.len(),
            stride,
        });
    }
    Ok(buffer.chunks_exact(stride).collect())
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LaneError {
    #[error("expected {expected} input arguments, got {actual}")]
    ArityMismatch { expected: usize, actual: usize },
    #[error("argument {position} should be '{expected}', got '{actual}'")]
    RoleMismatch {
        position: usize,
        expected: String,
        actual: String,
    },
    #[error("argument '{role}' holds {actual} values, not a width-{width} vector")]
    ArgumentWidth {
        role: String,
        width: VectorWidth,
        actual: usize,
    },
    #[error("output holds {actual} values, not a width-{width} vector")]
    OutputWidth { width: VectorWidth, actual: usize },
    #[error("buffer of {len} values is not a multiple of stride {stride}")]
    RaggedBuffer { len: usize, stride: usize },
    #[error("'{role}' has {actual} rows, expected {expected}")]
    RowCountMismatch {
        role: String,
        expected: usize,
        actual: usize,
    },
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl LaneError {
    #[must_use]
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::ArityMismatch { .. } => "lane_arity_mismatch",
            Self::RoleMismatch { .. } => "lane_role_mismatch",
            Self::ArgumentWidth { .. } => "lane_argument_width_mismatch",
            Self::OutputWidth { .. } => "lane_output_width_mismatch",
            Self::RaggedBuffer { .. } => "lane_ragged_buffer",
            Self::RowCountMismatch { .. } => "lane_row_count_mismatch",
            Self::Catalog(err) => err.reason_code(),
        }
    }
}

/// Outcome for one lane of one output vector.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub pass: bool,
    pub lane: usize,
    pub reference_value: f64,
    pub actual_value: f32,
    pub diagnostic: Option<String>,
}

/// JSON has no NaN or infinity, so each value travels with its raw bits in
/// the `0x` literal form fixtures accept.
impl Serialize for Verdict {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Verdict", 7)?;
        state.serialize_field("pass", &self.pass)?;
        state.serialize_field("lane", &self.lane)?;
        state.serialize_field("reference_value", &self.reference_value)?;
        state.serialize_field(
            "reference_bits",
            &format!("0x{}", self.reference_value.hex_bits()),
        )?;
        state.serialize_field("actual_value", &self.actual_value)?;
        state.serialize_field("actual_bits", &format!("0x{}", self.actual_value.hex_bits()))?;
        state.serialize_field("diagnostic", &self.diagnostic)?;
        state.end()
    }
}

impl Verdict {
    /// Bit-level equality, so NaN verdicts compare equal to themselves.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        self.pass == other.pass
            && self.lane == other.lane
            && self.reference_value.to_bits() == other.reference_value.to_bits()
            && self.actual_value.to_bits() == other.actual_value.to_bits()
            && self.diagnostic == other.diagnostic
    }
}

/// Checks every logical lane of `actual` against the reference for `tuple`.
pub fn compare(
    descriptor: &FunctionDescriptor,
    tuple: &InputTuple,
    actual: &[f32],
    width: VectorWidth,
    mode: PrecisionMode,
) -> Result<Vec<Verdict>, LaneError> {
    tuple.validate(descriptor.function.roles(), width)?;
    if !width.accepts_len(actual.len()) {
        return Err(LaneError::OutputWidth {
            width,
            actual: actual.len(),
        });
    }

    let entry = descriptor.entry(mode);
    let mut verdicts = Vec::with_capacity(width.lanes());
    for (lane, &actual_value) in actual.iter().take(width.lanes()).enumerate() {
        let inputs = tuple.lane(lane);
        let reference_value = descriptor.evaluate(&inputs)?;
        let range = build_range(reference_value, entry, descriptor.zero_sign);
        let accepts = range.predicate();
        let mut pass = accepts(actual_value);

        // Relaxed kernels may flush subnormal inputs before computing.
        if !pass && mode == PrecisionMode::Relaxed {
            pass = accepts_with_flushed_inputs(descriptor, &inputs, reference_value, actual_value)?;
        }

        let diagnostic = (!pass).then(|| {
            render_diagnostic(&DiagnosticContext {
                descriptor,
                tuple,
                inputs: &inputs,
                lane,
                width,
                mode,
                reference_value,
                range: &range,
                actual_value,
            })
        });

        verdicts.push(Verdict {
            pass,
            lane,
            reference_value,
            actual_value,
            diagnostic,
        });
    }
    Ok(verdicts)
}

/// Re-checks `actual_value` against the reference of the inputs with
/// subnormals flushed to zero. A flushed reference that turns into NaN only
/// admits NaN; it never absorbs every output the way a NaN reference does.
fn accepts_with_flushed_inputs(
    descriptor: &FunctionDescriptor,
    inputs: &[f32],
    reference_value: f64,
    actual_value: f32,
) -> Result<bool, LaneError> {
    let flushed: Vec<f32> = inputs.iter().copied().map(flush_subnormal).collect();
    let changed = flushed
        .iter()
        .zip(inputs)
        .any(|(lhs, rhs)| lhs.to_bits() != rhs.to_bits());
    if !changed {
        return Ok(false);
    }

    let flushed_reference = descriptor.evaluate(&flushed)?;
    if flushed_reference.is_nan() && !reference_value.is_nan() {
        return Ok(actual_value.is_nan());
    }
    let entry = descriptor.entry(PrecisionMode::Relaxed);
    Ok(build_range(flushed_reference, entry, descriptor.zero_sign).contains(actual_value))
}

struct DiagnosticContext<'a> {
    descriptor: &'a FunctionDescriptor,
    tuple: &'a InputTuple,
    inputs: &'a [f32],
    lane: usize,
    width: VectorWidth,
    mode: PrecisionMode,
    reference_value: f64,
    range: &'a lck_accept::AcceptanceRange,
    actual_value: f32,
}

fn render_diagnostic(ctx: &DiagnosticContext<'_>) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Incorrect output for {} width={} lane={} mode={}:",
        ctx.descriptor.function,
        ctx.width,
        ctx.lane,
        ctx.mode
    );
    for (arg, value) in ctx.tuple.args().iter().zip(ctx.inputs) {
        let _ = writeln!(out, "Input {}: {}", arg.role, value.describe());
    }
    let _ = writeln!(out, "Reference value: {}", ctx.reference_value.describe());
    let _ = writeln!(out, "Expected output: {}", ctx.range);
    let _ = write!(out, "Actual   output: {} FAIL", ctx.actual_value.describe());
    out
}
