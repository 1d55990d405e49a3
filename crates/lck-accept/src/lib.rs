#![forbid(unsafe_code)]

//! Acceptance ranges: the set of f32 results that conform for one lane.
//!
//! Rules, strongest first:
//!
//! 1. a NaN reference accepts every bit pattern;
//! 2. an `Unconstrained` bound accepts every bit pattern;
//! 3. `Exact` accepts the correctly rounded reference bits, with `+0`/`-0`
//!    interchangeable unless the function preserves the sign of zero;
//! 4. `UlpBound(n)` accepts values within `n` ordered steps of the f32
//!    bracket around the reference.
//!
//! In relaxed mode a reference that rounds to a subnormal also accepts the
//! flushed zero.

use lck_float::{
    FloatDiagnostic, bits_equal_ignoring_zero_sign, bracket_f64, narrow_f64, ordered_step,
    step_by,
};
use lck_reference::ZeroSignSemantics;
use lck_tolerance::{BoundKind, PrecisionMode, ToleranceEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnyReason {
    NanReference,
    Unconstrained,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AcceptanceRange {
    Any(AnyReason),
    Exact {
        expected: f32,
        zero_sign: ZeroSignSemantics,
        flushed: Option<f32>,
    },
    Steps {
        low: f32,
        high: f32,
        ulps: u32,
        flushed: Option<f32>,
    },
}

#[must_use]
pub fn build_range(
    reference: f64,
    entry: ToleranceEntry,
    zero_sign: ZeroSignSemantics,
) -> AcceptanceRange {
    if reference.is_nan() {
        return AcceptanceRange::Any(AnyReason::NanReference);
    }

    let nearest = narrow_f64(reference);
    let flushed = (entry.applies_to == PrecisionMode::Relaxed && nearest.is_subnormal())
        .then(|| 0.0_f32.copysign(nearest));

    match entry.bound {
        BoundKind::Unconstrained => AcceptanceRange::Any(AnyReason::Unconstrained),
        BoundKind::Exact => AcceptanceRange::Exact {
            expected: nearest,
            zero_sign,
            flushed,
        },
        BoundKind::UlpBound(ulps) => {
            let (lo, hi) = bracket_f64(reference);
            AcceptanceRange::Steps {
                low: step_by(lo, -i64::from(ulps)),
                high: step_by(hi, i64::from(ulps)),
                ulps,
                flushed,
            }
        }
    }
}

impl AcceptanceRange {
    #[must_use]
    pub fn contains(&self, candidate: f32) -> bool {
        match *self {
            Self::Any(_) => true,
            Self::Exact {
                expected,
                zero_sign,
                flushed,
            } => {
                zero_match(expected, candidate, zero_sign)
                    || flushed.is_some_and(|zero| zero_match(zero, candidate, zero_sign))
            }
            Self::Steps {
                low,
                high,
                flushed,
                ..
            } => {
                let position = (
                    ordered_step(low),
                    ordered_step(high),
                    ordered_step(candidate),
                );
                let within = match position {
                    (Some(low), Some(high), Some(candidate)) => {
                        low <= candidate && candidate <= high
                    }
                    _ => false,
                };
                within || flushed.is_some_and(|zero| candidate == zero)
            }
        }
    }

    /// The range as a plain predicate.
    pub fn predicate(&self) -> impl Fn(f32) -> bool + '_ {
        move |candidate| self.contains(candidate)
    }

    #[must_use]
    pub fn accepts_everything(&self) -> bool {
        matches!(self, Self::Any(_))
    }
}

fn zero_match(expected: f32, candidate: f32, zero_sign: ZeroSignSemantics) -> bool {
    match zero_sign {
        ZeroSignSemantics::Preserved => expected.to_bits() == candidate.to_bits(),
        ZeroSignSemantics::Conflated => bits_equal_ignoring_zero_sign(expected, candidate),
    }
}

impl std::fmt::Display for AcceptanceRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Any(AnyReason::NanReference) => write!(f, "any value (reference is NaN)"),
            Self::Any(AnyReason::Unconstrained) => write!(f, "any value (unconstrained)"),
            Self::Exact {
                expected,
                zero_sign,
                flushed,
            } => {
                write!(f, "exactly {}", expected.describe())?;
                if *expected == 0.0 && *zero_sign == ZeroSignSemantics::Conflated {
                    write!(f, " (either zero)")?;
                }
                if let Some(zero) = flushed {
                    write!(f, " or flushed {}", zero.describe())?;
                }
                Ok(())
            }
            Self::Steps {
                low,
                high,
                ulps,
                flushed,
            } => {
                write!(
                    f,
                    "[{}, {}] ({ulps} ulp)",
                    low.describe().trim(),
                    high.describe().trim()
                )?;
                if let Some(zero) = flushed {
                    write!(f, " or flushed {}", zero.describe())?;
                }
                Ok(())
            }
        }
    }
}
