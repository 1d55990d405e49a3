#![forbid(unsafe_code)]

use clap::Parser;
use lck_conformance::report::{combined_digest, write_reports};
use lck_conformance::suite::run_fixture_dir;
use lck_conformance::{FixtureStatus, HarnessConfig};
use lck_reference::FunctionCatalog;
use lck_tolerance::PrecisionMode;
use std::path::PathBuf;
use std::process::ExitCode;

/// Verify recorded kernel outputs against reference results lane by lane.
#[derive(Parser)]
#[command(name = "run_lane_verification")]
#[command(version)]
struct Cli {
    /// Directory of JSON fixtures (defaults to the bundled fixtures)
    #[arg(long)]
    fixtures: Option<PathBuf>,

    /// Where to write the JSON report
    #[arg(long)]
    report: Option<PathBuf>,

    /// Precision mode to verify; repeat for several (default: every mode a
    /// fixture records)
    #[arg(long = "mode", value_parser = parse_mode)]
    modes: Vec<PrecisionMode>,
}

fn parse_mode(raw: &str) -> Result<PrecisionMode, String> {
    PrecisionMode::parse(raw).ok_or_else(|| format!("unknown precision mode '{raw}'"))
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("run_lane_verification failed: {err}");
            ExitCode::from(1)
        }
    }
}

fn run(cli: &Cli) -> Result<ExitCode, String> {
    let cfg = HarnessConfig::default_paths();
    let fixture_root = cli.fixtures.clone().unwrap_or(cfg.fixture_root);
    let report_path = cli
        .report
        .clone()
        .unwrap_or_else(|| cfg.report_root.join("lane_verification_report.json"));
    let modes = (!cli.modes.is_empty()).then_some(cli.modes.as_slice());

    let suite = run_fixture_dir(&FunctionCatalog::builtin(), &fixture_root, modes);
    let reports = suite.reports();
    write_reports(&report_path, &reports)?;

    for outcome in &suite.outcomes {
        let label = match outcome.status {
            FixtureStatus::Conforming => "ok",
            FixtureStatus::Mismatch => "MISMATCH",
            FixtureStatus::Defect => "DEFECT",
            FixtureStatus::Skipped => "skipped",
        };
        println!("{label:>8} {}", outcome.id);
    }
    for failure in &suite.failures {
        println!("{failure}");
    }
    println!(
        "lane verification: fixtures={} conforming={} digest={}",
        suite.case_count,
        suite.pass_count,
        combined_digest(&reports)
    );
    println!("wrote {}", report_path.display());

    Ok(if suite.has_defects() {
        ExitCode::from(1)
    } else if suite.has_mismatches() {
        ExitCode::from(2)
    } else {
        ExitCode::SUCCESS
    })
}
