//! mend: repair CAD-exported DXF geometry into closed outlines.
//!
//! Reads a DXF drawing whose outlines were exported as loose arcs, lines,
//! and polylines with tiny gaps and overlaps, snaps the endpoints
//! together, and writes a new DXF where every closed outline is a single
//! closed `LWPOLYLINE` and everything that could not be closed is plain
//! `LINE` entities.
//!
//! # Usage
//!
//! ```text
//! mend [OPTIONS] <INPUT> <OUTPUT>
//! ```
//!
//! Progress is logged to stderr (`RUST_LOG` or `-v` to adjust). The
//! per-stage report goes to stdout, as JSON with `--json`.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use mend_pipeline::{RepairConfig, RepairResult, Unit};
use tracing::info;

/// Repair CAD-exported DXF geometry into closed, fillable outlines.
///
/// Flattens arcs, circles, and bulged polylines, snaps endpoints that lie
/// within the precision of each other, removes duplicate edges, and
/// rebuilds closed loops.
#[derive(Parser)]
#[command(name = "mend", version)]
struct Cli {
    /// Input DXF file.
    input: PathBuf,

    /// Output DXF file.
    output: PathBuf,

    /// Drawing unit of the input file.
    #[arg(long, value_enum, default_value_t = UnitArg::Mm)]
    unit: UnitArg,

    /// Snapping precision in micrometers.
    #[arg(long, default_value_t = RepairConfig::DEFAULT_PRECISION_UM)]
    precision_um: f64,

    /// Snapping tolerance in drawing units. Overrides `--precision-um`.
    #[arg(long)]
    tolerance: Option<f64>,

    /// Straight sub-segments per arc, circle, or bulge span.
    #[arg(long, default_value_t = RepairConfig::DEFAULT_ARC_SEGMENTS, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    arc_segments: usize,

    /// Uniform scale applied to the output.
    #[arg(long, default_value_t = RepairConfig::DEFAULT_SCALE)]
    scale: f64,

    /// Mirror the output about the x axis.
    #[arg(long)]
    flip_y: bool,

    /// Write an SVG overlay of the reconstruction to this path.
    #[arg(long)]
    overlay: Option<PathBuf>,

    /// Print diagnostics as JSON instead of the human-readable report.
    #[arg(long)]
    json: bool,

    /// Full repair config as a JSON string.
    ///
    /// When provided, `--unit`, `--precision-um`, `--tolerance`,
    /// `--arc-segments`, `--scale`, and `--flip-y` are ignored. Missing
    /// fields take their defaults.
    #[arg(long)]
    config_json: Option<String>,

    /// Log debug output.
    #[arg(short, long)]
    verbose: bool,
}

/// Drawing unit selection.
#[derive(Clone, Copy, ValueEnum)]
enum UnitArg {
    /// Millimeters.
    Mm,
    /// Micrometers.
    Um,
}

impl From<UnitArg> for Unit {
    fn from(unit: UnitArg) -> Self {
        match unit {
            UnitArg::Mm => Self::Millimeters,
            UnitArg::Um => Self::Micrometers,
        }
    }
}

/// Install a stderr `fmt` subscriber filtered by `RUST_LOG`, at `info`
/// (or `debug` with `--verbose`) unless overridden.
fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

/// Build a [`RepairConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and the
/// individual parameter flags are ignored.
fn config_from_cli(cli: &Cli) -> Result<RepairConfig> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).context("failed to parse --config-json");
    }

    let tolerance = cli.tolerance.unwrap_or_else(|| {
        RepairConfig::tolerance_from_precision(cli.precision_um, cli.unit.into())
    });
    Ok(RepairConfig {
        tolerance,
        arc_segments: cli.arc_segments,
        scale: cli.scale,
        flip_y: cli.flip_y,
    })
}

fn write_overlay(
    path: &Path,
    input: &Path,
    result: &RepairResult,
    config: &RepairConfig,
) -> Result<()> {
    let title = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("mend");
    let description = format!(
        "tolerance={} arc_segments={} loops={} chains={} snapping_events={}",
        config.tolerance,
        config.arc_segments,
        result.loop_count(),
        result.chain_count(),
        result.snapping_events.len(),
    );
    let svg = mend_export::to_overlay_svg(
        &result.loop_polylines(),
        &result.chain_polylines(),
        &result.snapping_events,
        &mend_export::SvgMetadata {
            title: Some(title),
            description: Some(&description),
        },
    );
    std::fs::write(path, &svg)
        .with_context(|| format!("failed to write overlay to {}", path.display()))?;
    info!(path = %path.display(), bytes = svg.len(), "saved reconstruction overlay");
    Ok(())
}

fn run(cli: &Cli) -> Result<()> {
    let config = config_from_cli(cli)?;

    info!(path = %cli.input.display(), "loading DXF");
    let bytes = std::fs::read(&cli.input)
        .with_context(|| format!("failed to read {}", cli.input.display()))?;
    let primitives = mend_export::decode(&bytes)
        .with_context(|| format!("failed to decode {}", cli.input.display()))?;

    info!(
        tolerance = config.tolerance,
        arc_segments = config.arc_segments,
        scale = config.scale,
        flip_y = config.flip_y,
        "repairing {} entities",
        primitives.len(),
    );
    let result = mend_pipeline::process(primitives, &config)?;

    info!(count = result.snapping_events.len(), "snapping events");
    info!(
        closed = result.loop_count(),
        open = result.chain_count(),
        "reconstructed paths"
    );

    let encoded = mend_export::encode(&result.output).context("failed to encode output")?;
    std::fs::write(&cli.output, &encoded)
        .with_context(|| format!("failed to write {}", cli.output.display()))?;
    info!(path = %cli.output.display(), "saved repaired DXF");

    if let Some(ref overlay) = cli.overlay {
        write_overlay(overlay, &cli.input, &result, &config)?;
    }

    if cli.json {
        let json = serde_json::to_string_pretty(&result.diagnostics)
            .context("failed to serialize diagnostics")?;
        println!("{json}");
    } else {
        println!("{}", result.diagnostics.report());
    }

    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
