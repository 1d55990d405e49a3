#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum PrecisionMode {
    Full,
    Relaxed,
}

impl PrecisionMode {
    pub const ALL: [Self; 2] = [Self::Full, Self::Relaxed];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Relaxed => "relaxed",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "full" | "strict" => Some(Self::Full),
            "relaxed" => Some(Self::Relaxed),
            _ => None,
        }
    }
}

impl std::fmt::Display for PrecisionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Allowed error of a function result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundKind {
    /// Bit-identical to the correctly rounded reference.
    Exact,
    /// Within `n` representable steps of the reference.
    UlpBound(u32),
    /// Any output conforms.
    Unconstrained,
}

impl BoundKind {
    /// Total order from strictest to loosest:
    /// `Exact < UlpBound(0) < UlpBound(1) < ... < Unconstrained`.
    #[must_use]
    pub const fn looseness(self) -> u64 {
        match self {
            Self::Exact => 0,
            Self::UlpBound(n) => 1 + n as u64,
            Self::Unconstrained => u64::MAX,
        }
    }

    #[must_use]
    pub const fn is_at_least_as_loose_as(self, other: Self) -> bool {
        self.looseness() >= other.looseness()
    }
}

impl std::fmt::Display for BoundKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exact => write!(f, "exact"),
            Self::UlpBound(n) => write!(f, "{n} ulp"),
            Self::Unconstrained => write!(f, "unconstrained"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ToleranceEntry {
    pub bound: BoundKind,
    pub applies_to: PrecisionMode,
}

/// Full-precision bound plus an optional looser relaxed bound.
///
/// A spec whose relaxed bound is stricter than its full bound cannot be
/// built, so relaxed acceptance ranges always contain the full ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToleranceSpec {
    full: BoundKind,
    relaxed: Option<BoundKind>,
}

impl ToleranceSpec {
    #[must_use]
    pub const fn uniform(bound: BoundKind) -> Self {
        Self {
            full: bound,
            relaxed: None,
        }
    }

    /// Compile-time checked constructor for table literals.
    ///
    /// # Panics
    ///
    /// Panics (at compile time in const context) if `relaxed` is stricter
    /// than `full`.
    #[must_use]
    pub const fn tiered(full: BoundKind, relaxed: BoundKind) -> Self {
        assert!(
            relaxed.is_at_least_as_loose_as(full),
            "relaxed bound stricter than full bound"
        );
        Self {
            full,
            relaxed: Some(relaxed),
        }
    }

    pub fn new(full: BoundKind, relaxed: Option<BoundKind>) -> Result<Self, ToleranceError> {
        if let Some(relaxed) = relaxed
            && !relaxed.is_at_least_as_loose_as(full)
        {
            return Err(ToleranceError::RelaxedStricterThanFull { full, relaxed });
        }
        Ok(Self { full, relaxed })
    }

    #[must_use]
    pub fn full(self) -> BoundKind {
        self.full
    }

    #[must_use]
    pub fn relaxed(self) -> Option<BoundKind> {
        self.relaxed
    }

    /// Entry for `mode`; relaxed reuses the full bound when none is declared.
    #[must_use]
    pub fn entry(self, mode: PrecisionMode) -> ToleranceEntry {
        let bound = match mode {
            PrecisionMode::Full => self.full,
            PrecisionMode::Relaxed => self.relaxed.unwrap_or(self.full),
        };
        ToleranceEntry {
            bound,
            applies_to: mode,
        }
    }
}

const EXACT: ToleranceSpec = ToleranceSpec::uniform(BoundKind::Exact);
const UNCONSTRAINED: ToleranceSpec = ToleranceSpec::uniform(BoundKind::Unconstrained);

const fn ulp(full: u32, relaxed: u32) -> ToleranceSpec {
    ToleranceSpec::tiered(BoundKind::UlpBound(full), BoundKind::UlpBound(relaxed))
}

pub const BUILTIN_TOLERANCES: [(&str, ToleranceSpec); 42] = [
    ("copysign", EXACT),
    ("fabs", EXACT),
    ("fmax", EXACT),
    ("fmin", EXACT),
    ("floor", EXACT),
    ("ceil", EXACT),
    ("trunc", EXACT),
    ("rint", EXACT),
    ("round", EXACT),
    ("sign", EXACT),
    ("step", EXACT),
    ("clamp", EXACT),
    ("fmod", EXACT),
    ("fdim", ToleranceSpec::uniform(BoundKind::UlpBound(1))),
    ("fma", ToleranceSpec::uniform(BoundKind::UlpBound(0))),
    ("mad", ulp(4, 4)),
    ("sqrt", ulp(3, 3)),
    ("rsqrt", ulp(2, 2)),
    ("hypot", ulp(4, 4)),
    ("cbrt", ulp(2, 128)),
    ("exp", ulp(3, 16)),
    ("exp2", ulp(3, 16)),
    ("exp10", ulp(3, 16)),
    ("expm1", ulp(3, 16)),
    ("log", ulp(3, 16)),
    ("log2", ulp(3, 16)),
    ("log10", ulp(3, 16)),
    ("log1p", ulp(3, 16)),
    ("sin", ulp(4, 128)),
    ("cos", ulp(4, 128)),
    ("tan", ulp(5, 128)),
    ("asin", ulp(4, 128)),
    ("acos", ulp(4, 128)),
    ("atan", ulp(4, 128)),
    ("atan2", ulp(6, 128)),
    ("sinh", ulp(4, 128)),
    ("cosh", ulp(4, 128)),
    ("tanh", ulp(5, 128)),
    ("pow", ulp(16, 128)),
    ("native_exp", UNCONSTRAINED),
    ("native_log", UNCONSTRAINED),
    ("native_sin", UNCONSTRAINED),
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ToleranceError {
    #[error("relaxed bound {relaxed} is stricter than full bound {full}")]
    RelaxedStricterThanFull {
        full: BoundKind,
        relaxed: BoundKind,
    },
    #[error("no tolerance entry declared for function '{function}'")]
    MissingEntry { function: String },
}

impl ToleranceError {
    #[must_use]
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::RelaxedStricterThanFull { .. } => "tolerance_relaxed_stricter_than_full",
            Self::MissingEntry { .. } => "tolerance_entry_missing",
        }
    }
}

/// Lookup table from function name to its tolerance spec.
#[derive(Debug, Clone, Default)]
pub struct ToleranceTable {
    specs: BTreeMap<String, ToleranceSpec>,
}

impl ToleranceTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn builtin() -> Self {
        let mut table = Self::new();
        for (name, spec) in BUILTIN_TOLERANCES {
            table.insert(name, spec);
        }
        table
    }

    /// Replaces any previous spec for `function`.
    pub fn insert(
        &mut self,
        function: impl Into<String>,
        spec: ToleranceSpec,
    ) -> Option<ToleranceSpec> {
        self.specs.insert(function.into(), spec)
    }

    pub fn remove(&mut self, function: &str) -> Option<ToleranceSpec> {
        self.specs.remove(function)
    }

    #[must_use]
    pub fn spec(&self, function: &str) -> Option<ToleranceSpec> {
        self.specs.get(function).copied()
    }

    pub fn lookup(
        &self,
        function: &str,
        mode: PrecisionMode,
    ) -> Result<ToleranceEntry, ToleranceError> {
        self.spec(function)
            .map(|spec| spec.entry(mode))
            .ok_or_else(|| ToleranceError::MissingEntry {
                function: function.to_string(),
            })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn functions(&self) -> impl Iterator<Item = &str> {
        self.specs.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::{
        BUILTIN_TOLERANCES, BoundKind, PrecisionMode, ToleranceError, ToleranceSpec,
        ToleranceTable,
    };

    #[test]
    fn looseness_orders_bounds() {
        assert!(BoundKind::UlpBound(0).is_at_least_as_loose_as(BoundKind::Exact));
        assert!(BoundKind::UlpBound(4).is_at_least_as_loose_as(BoundKind::UlpBound(3)));
        assert!(!BoundKind::UlpBound(3).is_at_least_as_loose_as(BoundKind::UlpBound(4)));
        assert!(BoundKind::Unconstrained.is_at_least_as_loose_as(BoundKind::UlpBound(u32::MAX)));
        assert!(!BoundKind::Exact.is_at_least_as_loose_as(BoundKind::Unconstrained));
    }

    #[test]
    fn relaxed_falls_back_to_full() {
        let spec = ToleranceSpec::uniform(BoundKind::UlpBound(2));
        let entry = spec.entry(PrecisionMode::Relaxed);
        assert_eq!(entry.bound, BoundKind::UlpBound(2));
        assert_eq!(entry.applies_to, PrecisionMode::Relaxed);
    }

    #[test]
    fn rejects_relaxed_stricter_than_full() {
        let err = ToleranceSpec::new(BoundKind::UlpBound(4), Some(BoundKind::Exact))
            .expect_err("relaxed exact under 4 ulp full must be rejected");
        assert_eq!(err.reason_code(), "tolerance_relaxed_stricter_than_full");
        assert!(ToleranceSpec::new(BoundKind::Exact, Some(BoundKind::Unconstrained)).is_ok());
    }

    #[test]
    fn builtin_relaxed_never_stricter() {
        for (name, spec) in BUILTIN_TOLERANCES {
            let full = spec.entry(PrecisionMode::Full).bound;
            let relaxed = spec.entry(PrecisionMode::Relaxed).bound;
            assert!(
                relaxed.is_at_least_as_loose_as(full),
                "{name}: relaxed {relaxed} stricter than full {full}"
            );
        }
    }

    #[test]
    fn builtin_names_are_unique() {
        let table = ToleranceTable::builtin();
        assert_eq!(table.len(), BUILTIN_TOLERANCES.len());
    }

    #[test]
    fn lookup_reports_missing_function() {
        let table = ToleranceTable::builtin();
        assert_eq!(
            table.lookup("sin", PrecisionMode::Relaxed).map(|e| e.bound),
            Ok(BoundKind::UlpBound(128))
        );
        let err = table
            .lookup("erfc", PrecisionMode::Full)
            .expect_err("erfc is not declared");
        assert_eq!(
            err,
            ToleranceError::MissingEntry {
                function: "erfc".to_string()
            }
        );
        assert_eq!(err.reason_code(), "tolerance_entry_missing");
    }

    #[test]
    fn mode_parse_accepts_aliases() {
        assert_eq!(PrecisionMode::parse("strict"), Some(PrecisionMode::Full));
        assert_eq!(PrecisionMode::parse(" Relaxed "), Some(PrecisionMode::Relaxed));
        assert_eq!(PrecisionMode::parse("fast"), None);
        assert_eq!(BoundKind::UlpBound(3).to_string(), "3 ulp");
    }
}
