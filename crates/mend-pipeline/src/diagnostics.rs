//! Run diagnostics: timing and counts for each pipeline stage.
//!
//! Every run through [`Pipeline`](crate::Pipeline) collects diagnostics
//! alongside its output. Per-primitive and per-segment issues (skipped
//! entities, degenerate segments, duplicates) are never errors; they are
//! aggregated here and reported once the run completes.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Diagnostics collected from a single pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairDiagnostics {
    /// Stage 1: flattening.
    pub flatten: StageDiagnostics,
    /// Stage 2: endpoint snapping.
    pub snap: StageDiagnostics,
    /// Stage 3: deduplication.
    pub dedup: StageDiagnostics,
    /// Stage 4: path reconstruction.
    pub reconstruct: StageDiagnostics,
    /// Stage 5: emission.
    pub emit: StageDiagnostics,
    /// Total wall-clock duration of the run (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary counts across all stages.
    pub summary: RepairSummary,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

/// Stage-specific metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Flattening metrics.
    Flatten {
        /// Primitives handed to the pipeline.
        primitive_count: usize,
        /// Non-degenerate segments produced.
        segment_count: usize,
        /// Zero-length segments dropped.
        degenerate_count: usize,
        /// Primitives skipped for NaN or infinite geometry.
        non_finite_count: usize,
        /// Skipped primitives, keyed by entity kind.
        unsupported: BTreeMap<String, usize>,
        /// Sub-segments per curve.
        arc_segments: usize,
    },
    /// Snapping metrics.
    Snap {
        /// Snapping distance in working units.
        tolerance: f64,
        /// Endpoints clustered (two per segment).
        endpoint_count: usize,
        /// Clusters formed.
        cluster_count: usize,
        /// Distinct endpoint positions that moved.
        snapping_events: usize,
    },
    /// Deduplication metrics.
    Dedup {
        /// Canonical segments in.
        input_count: usize,
        /// Unique segments out.
        output_count: usize,
        /// Repeated node pairs removed.
        duplicates_removed: usize,
        /// Collapsed segments removed.
        self_loops_removed: usize,
    },
    /// Path reconstruction metrics.
    Reconstruct {
        /// Graph edges partitioned.
        edge_count: usize,
        /// Closed loops found.
        loop_count: usize,
        /// Open chains left over.
        chain_count: usize,
    },
    /// Emission metrics.
    Emit {
        /// Closed polylines written.
        closed_polylines: usize,
        /// Straight lines written.
        lines: usize,
        /// Output scale.
        scale: f64,
        /// Whether output was mirrored about the x axis.
        flip_y: bool,
    },
}

/// High-level summary counts for the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairSummary {
    /// Primitives handed to the pipeline.
    pub primitive_count: usize,
    /// Primitives skipped as unsupported.
    pub unsupported_count: usize,
    /// Closed loops reconstructed.
    pub loop_count: usize,
    /// Open chains left over.
    pub chain_count: usize,
    /// Output primitives emitted.
    pub output_count: usize,
}

impl RepairDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Repair Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Primitives: {} ({} unsupported)",
            self.summary.primitive_count, self.summary.unsupported_count,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        let stages = [
            ("Flatten", &self.flatten),
            ("Snap", &self.snap),
            ("Deduplicate", &self.dedup),
            ("Reconstruct", &self.reconstruct),
            ("Emit", &self.emit),
        ];

        for (name, diag) in stages {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        lines.push(format!(
            "Closed loops: {}  |  Open chains: {}  |  Output primitives: {}",
            self.summary.loop_count, self.summary.chain_count, self.summary.output_count,
        ));

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Flatten {
            primitive_count,
            segment_count,
            degenerate_count,
            non_finite_count,
            unsupported,
            arc_segments,
        } => {
            let mut details = format!(
                "{primitive_count} primitives -> {segment_count} segments (n={arc_segments}, {degenerate_count} degenerate)",
            );
            if *non_finite_count > 0 {
                details.push_str(&format!(" {non_finite_count} non-finite"));
            }
            if !unsupported.is_empty() {
                let kinds: Vec<String> = unsupported
                    .iter()
                    .map(|(kind, count)| format!("{kind}x{count}"))
                    .collect();
                details.push_str(&format!(" skipped: {}", kinds.join(", ")));
            }
            details
        }
        StageMetrics::Snap {
            tolerance,
            endpoint_count,
            cluster_count,
            snapping_events,
        } => {
            format!(
                "tol={tolerance:e} {endpoint_count} endpoints -> {cluster_count} clusters ({snapping_events} snapped)",
            )
        }
        StageMetrics::Dedup {
            input_count,
            output_count,
            duplicates_removed,
            self_loops_removed,
        } => {
            format!(
                "{input_count}->{output_count} segments ({duplicates_removed} duplicates, {self_loops_removed} collapsed)",
            )
        }
        StageMetrics::Reconstruct {
            edge_count,
            loop_count,
            chain_count,
        } => format!("{edge_count} edges -> {loop_count} loops, {chain_count} chains"),
        StageMetrics::Emit {
            closed_polylines,
            lines,
            scale,
            flip_y,
        } => {
            format!("{closed_polylines} polylines, {lines} lines (scale={scale} flip_y={flip_y})")
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn stage(ms: u64, metrics: StageMetrics) -> StageDiagnostics {
        StageDiagnostics {
            duration: Duration::from_millis(ms),
            metrics,
        }
    }

    fn sample() -> RepairDiagnostics {
        RepairDiagnostics {
            flatten: stage(
                4,
                StageMetrics::Flatten {
                    primitive_count: 12,
                    segment_count: 400,
                    degenerate_count: 1,
                    non_finite_count: 0,
                    unsupported: BTreeMap::from([("SPLINE".to_owned(), 2)]),
                    arc_segments: 100,
                },
            ),
            snap: stage(
                3,
                StageMetrics::Snap {
                    tolerance: 1e-4,
                    endpoint_count: 800,
                    cluster_count: 398,
                    snapping_events: 6,
                },
            ),
            dedup: stage(
                1,
                StageMetrics::Dedup {
                    input_count: 400,
                    output_count: 398,
                    duplicates_removed: 2,
                    self_loops_removed: 0,
                },
            ),
            reconstruct: stage(
                1,
                StageMetrics::Reconstruct {
                    edge_count: 398,
                    loop_count: 3,
                    chain_count: 1,
                },
            ),
            emit: stage(
                1,
                StageMetrics::Emit {
                    closed_polylines: 3,
                    lines: 5,
                    scale: 1.0,
                    flip_y: false,
                },
            ),
            total_duration: Duration::from_millis(10),
            summary: RepairSummary {
                primitive_count: 12,
                unsupported_count: 2,
                loop_count: 3,
                chain_count: 1,
                output_count: 8,
            },
        }
    }

    #[test]
    fn duration_ms_converts_correctly() {
        let d = Duration::from_millis(1234);
        let ms = duration_ms(d);
        assert!((ms - 1234.0).abs() < 0.01);
    }

    #[test]
    fn report_lists_every_stage_and_skipped_kinds() {
        let report = sample().report();
        assert!(report.contains("Repair Diagnostics Report"));
        for stage in ["Flatten", "Snap", "Deduplicate", "Reconstruct", "Emit"] {
            assert!(report.contains(stage), "missing {stage} in:\n{report}");
        }
        assert!(report.contains("SPLINEx2"));
        assert!(report.contains("Closed loops: 3"));
        assert!(report.contains("Open chains: 1"));
    }

    #[test]
    fn diagnostics_survive_json() {
        let diag = sample();
        let json = serde_json::to_string(&diag).unwrap();
        let back: RepairDiagnostics = serde_json::from_str(&json).unwrap();
        assert_eq!(back, diag);
    }

    #[test]
    fn negative_duration_is_rejected() {
        let json = serde_json::to_string(&sample())
            .unwrap()
            .replace("\"total_duration\":0.01", "\"total_duration\":-1.0");
        assert!(serde_json::from_str::<RepairDiagnostics>(&json).is_err());
    }
}
