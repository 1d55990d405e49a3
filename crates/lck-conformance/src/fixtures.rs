#![forbid(unsafe_code)]

use crate::verify::KernelOutputs;
use lck_float::{narrow_f64, parse_f32_literal};
use lck_lanes::{InputTuple, NamedArg, VectorWidth};
use lck_reference::MathFunction;
use lck_tolerance::PrecisionMode;
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// An f32 read from a JSON number or from a string literal such as `"nan"`,
/// `"-0"` or `"0x7fc00001"`.
#[derive(Debug, Clone, Copy)]
pub struct FloatLiteral(pub f32);

impl<'de> Deserialize<'de> for FloatLiteral {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(f64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(value) => Ok(Self(narrow_f64(value))),
            Raw::Text(text) => parse_f32_literal(&text).map(Self).ok_or_else(|| {
                serde::de::Error::custom(format!("invalid float literal '{text}'"))
            }),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum FixtureValues {
    Scalar(FloatLiteral),
    Lanes(Vec<FloatLiteral>),
}

impl FixtureValues {
    fn into_arg(self, role: &str) -> NamedArg {
        match self {
            Self::Scalar(FloatLiteral(value)) => NamedArg::splat(role, value),
            Self::Lanes(values) => NamedArg::lanes(role, values.into_iter().map(|v| v.0).collect()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FixtureRow {
    pub inputs: BTreeMap<String, FixtureValues>,
    pub outputs: BTreeMap<String, Vec<FloatLiteral>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expectation {
    #[default]
    Pass,
    Fail,
    /// The fixture is a setup defect; `expected_reason_code` names it.
    Error,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LaneFixture {
    pub id: String,
    pub function: String,
    pub width: VectorWidth,
    pub rows: Vec<FixtureRow>,
    #[serde(default)]
    pub expect: Expectation,
    #[serde(default)]
    pub expected_reason_code: Option<String>,
}

impl LaneFixture {
    /// Input tuples in the function's declared role order. Roles the
    /// function does not declare are appended so shape checks report them.
    #[must_use]
    pub fn input_rows(&self) -> Vec<InputTuple> {
        let declared: &[&str] = MathFunction::parse(&self.function)
            .map(MathFunction::roles)
            .unwrap_or_default();
        self.rows
            .iter()
            .map(|row| {
                let mut inputs = row.inputs.clone();
                let mut args: Vec<NamedArg> = declared
                    .iter()
                    .filter_map(|role| inputs.remove(*role).map(|values| values.into_arg(role)))
                    .collect();
                args.extend(
                    inputs
                        .into_iter()
                        .map(|(role, values)| values.into_arg(&role)),
                );
                InputTuple::new(args)
            })
            .collect()
    }

    /// Output rows per mode, restricted to `modes` when given. A mode missing
    /// from some row leaves that mode with fewer rows than inputs.
    pub fn kernel_outputs(
        &self,
        modes: Option<&[PrecisionMode]>,
    ) -> Result<KernelOutputs, FixtureError> {
        let mut by_mode: BTreeMap<PrecisionMode, Vec<Vec<f32>>> = BTreeMap::new();
        for row in &self.rows {
            for (raw_mode, values) in &row.outputs {
                let mode = PrecisionMode::parse(raw_mode).ok_or_else(|| {
                    FixtureError::UnknownMode {
                        fixture: self.id.clone(),
                        mode: raw_mode.clone(),
                    }
                })?;
                if modes.is_some_and(|wanted| !wanted.contains(&mode)) {
                    continue;
                }
                by_mode
                    .entry(mode)
                    .or_default()
                    .push(values.iter().map(|v| v.0).collect());
            }
        }

        let mut outputs = KernelOutputs::new();
        for (mode, rows) in by_mode {
            outputs.insert(mode, rows);
        }
        Ok(outputs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FixtureError {
    #[error("failed reading {path}: {message}")]
    Read { path: PathBuf, message: String },
    #[error("invalid fixture json {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("fixture {fixture}: unknown precision mode '{mode}'")]
    UnknownMode { fixture: String, mode: String },
}

impl FixtureError {
    #[must_use]
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::Read { .. } => "fixture_read_failed",
            Self::Parse { .. } => "fixture_parse_failed",
            Self::UnknownMode { .. } => "fixture_unknown_mode",
        }
    }
}

/// Loads a fixture file holding either one fixture object or an array.
pub fn load_fixture_file(path: &Path) -> Result<Vec<LaneFixture>, FixtureError> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum FixtureFile {
        Many(Vec<LaneFixture>),
        One(Box<LaneFixture>),
    }

    let raw = fs::read_to_string(path).map_err(|err| FixtureError::Read {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;
    let parsed: FixtureFile = serde_json::from_str(&raw).map_err(|err| FixtureError::Parse {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;
    Ok(match parsed {
        FixtureFile::Many(fixtures) => fixtures,
        FixtureFile::One(fixture) => vec![*fixture],
    })
}

/// Every `*.json` file directly under `dir`, sorted by name.
pub fn fixture_files(dir: &Path) -> Result<Vec<PathBuf>, FixtureError> {
    let entries = fs::read_dir(dir).map_err(|err| FixtureError::Read {
        path: dir.to_path_buf(),
        message: err.to_string(),
    })?;
    let mut files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();
    Ok(files)
}
