#![forbid(unsafe_code)]

use lck_float::SIGN_MASK;
use lck_tolerance::{PrecisionMode, ToleranceEntry, ToleranceError, ToleranceSpec, ToleranceTable};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MathFunction {
    Copysign,
    Fabs,
    Fmax,
    Fmin,
    Floor,
    Ceil,
    Trunc,
    Rint,
    Round,
    Sign,
    Step,
    Clamp,
    Fmod,
    Fdim,
    Fma,
    Mad,
    Sqrt,
    Rsqrt,
    Hypot,
    Cbrt,
    Exp,
    Exp2,
    Exp10,
    Expm1,
    Log,
    Log2,
    Log10,
    Log1p,
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Atan2,
    Sinh,
    Cosh,
    Tanh,
    Pow,
    NativeExp,
    NativeLog,
    NativeSin,
}

/// Whether the sign of a zero result is part of a function's contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroSignSemantics {
    /// `+0` and `-0` are interchangeable results.
    Conflated,
    /// The exact signed zero must be produced (sign-transfer family).
    Preserved,
}

/// Reference computation in f64 over the f32 lane inputs.
#[derive(Debug, Clone, Copy)]
pub enum ReferenceKernel {
    Unary(fn(f32) -> f64),
    Binary(fn(f32, f32) -> f64),
    Ternary(fn(f32, f32, f32) -> f64),
}

impl ReferenceKernel {
    #[must_use]
    pub fn arity(self) -> usize {
        match self {
            Self::Unary(_) => 1,
            Self::Binary(_) => 2,
            Self::Ternary(_) => 3,
        }
    }
}

const V: &[&str] = &["v"];
const AB: &[&str] = &["a", "b"];

impl MathFunction {
    pub const ALL: [Self; 42] = [
        Self::Copysign,
        Self::Fabs,
        Self::Fmax,
        Self::Fmin,
        Self::Floor,
        Self::Ceil,
        Self::Trunc,
        Self::Rint,
        Self::Round,
        Self::Sign,
        Self::Step,
        Self::Clamp,
        Self::Fmod,
        Self::Fdim,
        Self::Fma,
        Self::Mad,
        Self::Sqrt,
        Self::Rsqrt,
        Self::Hypot,
        Self::Cbrt,
        Self::Exp,
        Self::Exp2,
        Self::Exp10,
        Self::Expm1,
        Self::Log,
        Self::Log2,
        Self::Log10,
        Self::Log1p,
        Self::Sin,
        Self::Cos,
        Self::Tan,
        Self::Asin,
        Self::Acos,
        Self::Atan,
        Self::Atan2,
        Self::Sinh,
        Self::Cosh,
        Self::Tanh,
        Self::Pow,
        Self::NativeExp,
        Self::NativeLog,
        Self::NativeSin,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Copysign => "copysign",
            Self::Fabs => "fabs",
            Self::Fmax => "fmax",
            Self::Fmin => "fmin",
            Self::Floor => "floor",
            Self::Ceil => "ceil",
            Self::Trunc => "trunc",
            Self::Rint => "rint",
            Self::Round => "round",
            Self::Sign => "sign",
            Self::Step => "step",
            Self::Clamp => "clamp",
            Self::Fmod => "fmod",
            Self::Fdim => "fdim",
            Self::Fma => "fma",
            Self::Mad => "mad",
            Self::Sqrt => "sqrt",
            Self::Rsqrt => "rsqrt",
            Self::Hypot => "hypot",
            Self::Cbrt => "cbrt",
            Self::Exp => "exp",
            Self::Exp2 => "exp2",
            Self::Exp10 => "exp10",
            Self::Expm1 => "expm1",
            Self::Log => "log",
            Self::Log2 => "log2",
            Self::Log10 => "log10",
            Self::Log1p => "log1p",
            Self::Sin => "sin",
            Self::Cos => "cos",
            Self::Tan => "tan",
            Self::Asin => "asin",
            Self::Acos => "acos",
            Self::Atan => "atan",
            Self::Atan2 => "atan2",
            Self::Sinh => "sinh",
            Self::Cosh => "cosh",
            Self::Tanh => "tanh",
            Self::Pow => "pow",
            Self::NativeExp => "native_exp",
            Self::NativeLog => "native_log",
            Self::NativeSin => "native_sin",
        }
    }

    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        let wanted = name.trim();
        Self::ALL.into_iter().find(|function| function.name() == wanted)
    }

    /// Names of the arguments in declaration order.
    #[must_use]
    pub fn roles(self) -> &'static [&'static str] {
        match self {
            Self::Copysign => &["magnitude_value", "sign_value"],
            Self::Fmax | Self::Fmin | Self::Fdim | Self::Hypot => AB,
            Self::Fmod | Self::Atan2 => &["numerator", "denominator"],
            Self::Pow => &["base", "exponent"],
            Self::Step => &["edge", "v"],
            Self::Clamp => &["value", "min_value", "max_value"],
            Self::Fma | Self::Mad => &["multiplicand1", "multiplicand2", "offset"],
            _ => V,
        }
    }

    #[must_use]
    pub fn arity(self) -> usize {
        self.kernel().arity()
    }

    #[must_use]
    pub fn zero_sign(self) -> ZeroSignSemantics {
        match self {
            Self::Copysign | Self::Fabs => ZeroSignSemantics::Preserved,
            _ => ZeroSignSemantics::Conflated,
        }
    }

    #[must_use]
    pub fn kernel(self) -> ReferenceKernel {
        use ReferenceKernel::{Binary, Ternary, Unary};
        match self {
            Self::Copysign => Binary(ref_copysign),
            Self::Fabs => Unary(ref_fabs),
            Self::Fmax => Binary(ref_fmax),
            Self::Fmin => Binary(ref_fmin),
            Self::Floor => Unary(|x| f64::from(libm::floorf(x))),
            Self::Ceil => Unary(|x| f64::from(libm::ceilf(x))),
            Self::Trunc => Unary(|x| f64::from(libm::truncf(x))),
            Self::Rint => Unary(|x| f64::from(libm::rintf(x))),
            Self::Round => Unary(|x| f64::from(libm::roundf(x))),
            Self::Sign => Unary(ref_sign),
            Self::Step => Binary(ref_step),
            Self::Clamp => Ternary(ref_clamp),
            Self::Fmod => Binary(|x, y| libm::fmod(f64::from(x), f64::from(y))),
            Self::Fdim => Binary(|x, y| libm::fdim(f64::from(x), f64::from(y))),
            Self::Fma => Ternary(|a, b, c| libm::fma(f64::from(a), f64::from(b), f64::from(c))),
            Self::Mad => Ternary(|a, b, c| f64::from(a) * f64::from(b) + f64::from(c)),
            Self::Sqrt => Unary(|x| libm::sqrt(f64::from(x))),
            Self::Rsqrt => Unary(|x| 1.0 / libm::sqrt(f64::from(x))),
            Self::Hypot => Binary(|x, y| libm::hypot(f64::from(x), f64::from(y))),
            Self::Cbrt => Unary(|x| libm::cbrt(f64::from(x))),
            Self::Exp | Self::NativeExp => Unary(|x| libm::exp(f64::from(x))),
            Self::Exp2 => Unary(|x| libm::exp2(f64::from(x))),
            Self::Exp10 => Unary(|x| libm::exp10(f64::from(x))),
            Self::Expm1 => Unary(|x| libm::expm1(f64::from(x))),
            Self::Log | Self::NativeLog => Unary(|x| libm::log(f64::from(x))),
            Self::Log2 => Unary(|x| libm::log2(f64::from(x))),
            Self::Log10 => Unary(|x| libm::log10(f64::from(x))),
            Self::Log1p => Unary(|x| libm::log1p(f64::from(x))),
            Self::Sin | Self::NativeSin => Unary(|x| libm::sin(f64::from(x))),
            Self::Cos => Unary(|x| libm::cos(f64::from(x))),
            Self::Tan => Unary(|x| libm::tan(f64::from(x))),
            Self::Asin => Unary(|x| libm::asin(f64::from(x))),
            Self::Acos => Unary(|x| libm::acos(f64::from(x))),
            Self::Atan => Unary(|x| libm::atan(f64::from(x))),
            Self::Atan2 => Binary(|y, x| libm::atan2(f64::from(y), f64::from(x))),
            Self::Sinh => Unary(|x| libm::sinh(f64::from(x))),
            Self::Cosh => Unary(|x| libm::cosh(f64::from(x))),
            Self::Tanh => Unary(|x| libm::tanh(f64::from(x))),
            Self::Pow => Binary(|x, y| libm::pow(f64::from(x), f64::from(y))),
        }
    }

    /// Reference result for one lane. Every input combination has a result,
    /// possibly NaN; only a wrong argument count is an error.
    pub fn evaluate(self, args: &[f32]) -> Result<f64, CatalogError> {
        match (self.kernel(), args) {
            (ReferenceKernel::Unary(f), &[x]) => Ok(f(x)),
            (ReferenceKernel::Binary(f), &[a, b]) => Ok(f(a, b)),
            (ReferenceKernel::Ternary(f), &[a, b, c]) => Ok(f(a, b, c)),
            (kernel, _) => Err(CatalogError::ArityMismatch {
                function: self.name().to_string(),
                expected: kernel.arity(),
                actual: args.len(),
            }),
        }
    }
}

impl std::fmt::Display for MathFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// Sign transfer works on raw bits so NaN payloads and signed zeros survive.
fn ref_copysign(magnitude: f32, sign: f32) -> f64 {
    let bits = (magnitude.to_bits() & !SIGN_MASK) | (sign.to_bits() & SIGN_MASK);
    f64::from(f32::from_bits(bits))
}

fn ref_fabs(x: f32) -> f64 {
    f64::from(f32::from_bits(x.to_bits() & !SIGN_MASK))
}

fn ref_fmax(a: f32, b: f32) -> f64 {
    let picked = if a.is_nan() || b > a { b } else { a };
    f64::from(picked)
}

fn ref_fmin(a: f32, b: f32) -> f64 {
    let picked = if a.is_nan() || b < a { b } else { a };
    f64::from(picked)
}

fn ref_sign(x: f32) -> f64 {
    if x.is_nan() || x == 0.0 {
        f64::from(x)
    } else if x > 0.0 {
        1.0
    } else {
        -1.0
    }
}

fn ref_step(edge: f32, v: f32) -> f64 {
    if v < edge { 0.0 } else { 1.0 }
}

fn ref_clamp(value: f32, min_value: f32, max_value: f32) -> f64 {
    // Undefined bounds leave the result unconstrained.
    if min_value > max_value {
        return f64::NAN;
    }
    let lower = lck_float::narrow_f64(ref_fmax(value, min_value));
    ref_fmin(lower, max_value)
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("unknown function '{name}'")]
    UnknownFunction { name: String },
    #[error(transparent)]
    Tolerance(#[from] ToleranceError),
    #[error("{function} takes {expected} arguments, got {actual}")]
    ArityMismatch {
        function: String,
        expected: usize,
        actual: usize,
    },
}

impl CatalogError {
    #[must_use]
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::UnknownFunction { .. } => "catalog_unknown_function",
            Self::Tolerance(err) => err.reason_code(),
            Self::ArityMismatch { .. } => "catalog_arity_mismatch",
        }
    }
}

/// Everything the engine needs to check one function: reference kernel,
/// both tolerance tiers and zero-sign semantics.
#[derive(Debug, Clone, Copy)]
pub struct FunctionDescriptor {
    pub function: MathFunction,
    pub tolerance: ToleranceSpec,
    pub zero_sign: ZeroSignSemantics,
}

impl FunctionDescriptor {
    #[must_use]
    pub fn entry(&self, mode: PrecisionMode) -> ToleranceEntry {
        self.tolerance.entry(mode)
    }

    pub fn evaluate(&self, args: &[f32]) -> Result<f64, CatalogError> {
        self.function.evaluate(args)
    }
}

/// Joins the function set with a tolerance table.
#[derive(Debug, Clone)]
pub struct FunctionCatalog {
    tolerances: ToleranceTable,
}

impl Default for FunctionCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl FunctionCatalog {
    #[must_use]
    pub fn builtin() -> Self {
        Self::with_tolerances(ToleranceTable::builtin())
    }

    #[must_use]
    pub fn with_tolerances(tolerances: ToleranceTable) -> Self {
        Self { tolerances }
    }

    #[must_use]
    pub fn tolerances(&self) -> &ToleranceTable {
        &self.tolerances
    }

    pub fn describe(&self, name: &str) -> Result<FunctionDescriptor, CatalogError> {
        let function = MathFunction::parse(name).ok_or_else(|| CatalogError::UnknownFunction {
            name: name.to_string(),
        })?;
        let tolerance = self
            .tolerances
            .spec(function.name())
            .ok_or_else(|| ToleranceError::MissingEntry {
                function: function.name().to_string(),
            })?;
        Ok(FunctionDescriptor {
            function,
            tolerance,
            zero_sign: function.zero_sign(),
        })
    }

    /// Functions that both have a reference kernel and a tolerance entry.
    pub fn supported(&self) -> impl Iterator<Item = MathFunction> + '_ {
        MathFunction::ALL
            .into_iter()
            .filter(|function| self.tolerances.spec(function.name()).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::{CatalogError, FunctionCatalog, MathFunction, ZeroSignSemantics};
    use lck_tolerance::{BoundKind, PrecisionMode, ToleranceTable};

    fn eval(function: MathFunction, args: &[f32]) -> f64 {
        function.evaluate(args).expect("arity matches")
    }

    #[test]
    fn copysign_transfers_sign_onto_zero() {
        let out = eval(MathFunction::Copysign, &[0.0, -3.0]);
        assert_eq!(out, 0.0);
        assert!(out.is_sign_negative());
        assert_eq!(eval(MathFunction::Copysign, &[3.5, -1.0]), -3.5);
        assert_eq!(eval(MathFunction::Copysign, &[-3.5, 0.0]), 3.5);
    }

    #[test]
    fn copysign_keeps_nan_payload_and_takes_sign() {
        let payload = f32::from_bits(0x7fc0_1234);
        let out = eval(MathFunction::Copysign, &[payload, -1.0]);
        assert!(out.is_nan());
        assert!(out.is_sign_negative());
        #[allow(clippy::cast_possible_truncation)]
        let narrowed = out as f32;
        assert_eq!(narrowed.to_bits() & 0x007f_ffff, 0x0040_1234);
    }

    #[test]
    fn fabs_clears_sign_of_negative_zero() {
        let out = eval(MathFunction::Fabs, &[-0.0]);
        assert!(out.is_sign_positive());
    }

    #[test]
    fn fmax_and_fmin_ignore_single_nan() {
        assert_eq!(eval(MathFunction::Fmax, &[f32::NAN, 2.0]), 2.0);
        assert_eq!(eval(MathFunction::Fmax, &[2.0, f32::NAN]), 2.0);
        assert_eq!(eval(MathFunction::Fmin, &[f32::NAN, -2.0]), -2.0);
        assert!(eval(MathFunction::Fmin, &[f32::NAN, f32::NAN]).is_nan());
        assert_eq!(eval(MathFunction::Fmax, &[1.0, 7.0]), 7.0);
    }

    #[test]
    fn clamp_with_inverted_bounds_is_undefined() {
        assert!(eval(MathFunction::Clamp, &[1.0, 5.0, 2.0]).is_nan());
        assert_eq!(eval(MathFunction::Clamp, &[9.0, 2.0, 5.0]), 5.0);
        assert_eq!(eval(MathFunction::Clamp, &[-9.0, 2.0, 5.0]), 2.0);
    }

    #[test]
    fn rounding_family_matches_c_semantics() {
        assert_eq!(eval(MathFunction::Rint, &[2.5]), 2.0);
        assert_eq!(eval(MathFunction::Round, &[2.5]), 3.0);
        assert_eq!(eval(MathFunction::Trunc, &[-2.7]), -2.0);
        assert!(eval(MathFunction::Floor, &[-0.0]).is_sign_negative());
    }

    #[test]
    fn sign_and_step() {
        assert!(eval(MathFunction::Sign, &[-0.0]).is_sign_negative());
        assert_eq!(eval(MathFunction::Sign, &[-4.0]), -1.0);
        assert_eq!(eval(MathFunction::Step, &[1.0, 0.5]), 0.0);
        assert_eq!(eval(MathFunction::Step, &[1.0, 1.0]), 1.0);
    }

    #[test]
    fn transcendental_references_are_defined_everywhere() {
        assert!(eval(MathFunction::Sqrt, &[-1.0]).is_nan());
        assert_eq!(eval(MathFunction::Log, &[0.0]), f64::NEG_INFINITY);
        assert_eq!(eval(MathFunction::Exp, &[f32::INFINITY]), f64::INFINITY);
        assert!(eval(MathFunction::Sin, &[f32::INFINITY]).is_nan());
        assert_eq!(eval(MathFunction::Exp10, &[2.0]), 100.0);
    }

    #[test]
    fn reports_arity_mismatch() {
        let err = MathFunction::Copysign
            .evaluate(&[1.0])
            .expect_err("copysign needs two inputs");
        assert_eq!(
            err,
            CatalogError::ArityMismatch {
                function: "copysign".to_string(),
                expected: 2,
                actual: 1
            }
        );
        assert_eq!(err.reason_code(), "catalog_arity_mismatch");
    }

    #[test]
    fn roles_match_kernel_arity() {
        for function in MathFunction::ALL {
            assert_eq!(
                function.roles().len(),
                function.arity(),
                "{function}: roles disagree with kernel"
            );
        }
    }

    #[test]
    fn names_round_trip() {
        for function in MathFunction::ALL {
            assert_eq!(MathFunction::parse(function.name()), Some(function));
        }
        assert_eq!(MathFunction::parse("erfc"), None);
    }

    #[test]
    fn builtin_catalog_covers_every_function() {
        let catalog = FunctionCatalog::builtin();
        assert_eq!(catalog.supported().count(), MathFunction::ALL.len());
        for name in catalog.tolerances().functions() {
            assert!(MathFunction::parse(name).is_some(), "orphan tolerance {name}");
        }
    }

    #[test]
    fn describe_joins_tolerance_and_zero_sign() {
        let catalog = FunctionCatalog::builtin();
        let copysign = catalog.describe("copysign").expect("copysign");
        assert_eq!(copysign.zero_sign, ZeroSignSemantics::Preserved);
        assert_eq!(copysign.entry(PrecisionMode::Relaxed).bound, BoundKind::Exact);
        let cos = catalog.describe("cos").expect("cos");
        assert_eq!(cos.zero_sign, ZeroSignSemantics::Conflated);
        assert_eq!(cos.entry(PrecisionMode::Full).bound, BoundKind::UlpBound(4));
    }

    #[test]
    fn describe_separates_unknown_from_untabulated() {
        let catalog = FunctionCatalog::builtin();
        let unknown = catalog.describe("erfc").expect_err("erfc unknown");
        assert_eq!(unknown.reason_code(), "catalog_unknown_function");

        let mut table = ToleranceTable::builtin();
        table.remove("copysign");
        let partial = FunctionCatalog::with_tolerances(table);
        let missing = partial.describe("copysign").expect_err("no tolerance");
        assert_eq!(missing.reason_code(), "tolerance_entry_missing");
    }
}
