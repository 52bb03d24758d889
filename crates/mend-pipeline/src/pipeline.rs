//! Incremental pipeline: advance stage-by-stage, inspecting each
//! intermediate result before continuing.
//!
//! Unlike [`crate::process`] which runs every stage in one call,
//! [`Pipeline`] lets the caller drive execution one step at a time:
//!
//! ```rust
//! # use mend_pipeline::{Pipeline, Primitive, RepairConfig, RepairError};
//! # fn run(primitives: Vec<Primitive>) -> Result<(), RepairError> {
//! let snapped = Pipeline::new(primitives, RepairConfig::default())
//!     .flatten()?
//!     .snap();
//! println!("{} clusters", snapped.snap_map().cluster_count());
//!
//! let _result = snapped
//!     .deduplicate()
//!     .reconstruct()
//!     .emit()
//!     .into_result();
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next pipeline state,
//! carrying forward the intermediates later stages (and the overlay) need
//! along with the diagnostics collected so far.

use tracing::debug;
use web_time::Instant;

use crate::dedup::Deduplication;
use crate::diagnostics::{RepairDiagnostics, RepairSummary, StageDiagnostics, StageMetrics};
use crate::flatten::Flattening;
use crate::reconstruct::Path;
use crate::snap::SnapMap;
use crate::types::{
    CanonicalSegment, OutputPrimitive, Point, Polyline, Primitive, RepairConfig, RepairError,
    Segment,
};

/// Everything a completed run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct RepairResult {
    /// Output primitives, transformed by the configured scale and flip.
    pub output: Vec<OutputPrimitive>,
    /// Reconstructed paths over cluster ids.
    pub paths: Vec<Path>,
    /// Canonical point of every cluster, untransformed.
    pub canonical_points: Vec<Point>,
    /// Distinct endpoint positions moved by snapping, untransformed.
    pub snapping_events: Vec<Point>,
    /// Per-stage timing and counts.
    pub diagnostics: RepairDiagnostics,
}

impl RepairResult {
    /// Number of closed loops.
    #[must_use]
    pub fn loop_count(&self) -> usize {
        self.paths.iter().filter(|p| p.is_loop()).count()
    }

    /// Number of open chains.
    #[must_use]
    pub fn chain_count(&self) -> usize {
        self.paths.len() - self.loop_count()
    }

    /// Loops as untransformed polylines, closing point repeated.
    #[must_use]
    pub fn loop_polylines(&self) -> Vec<Polyline> {
        self.polylines(true)
    }

    /// Chains as untransformed polylines.
    #[must_use]
    pub fn chain_polylines(&self) -> Vec<Polyline> {
        self.polylines(false)
    }

    fn polylines(&self, loops: bool) -> Vec<Polyline> {
        self.paths
            .iter()
            .filter(|p| p.is_loop() == loops)
            .map(|p| crate::emit::path_polyline(p, &self.canonical_points))
            .collect()
    }
}

/// Time `f`, returning its output and elapsed duration.
fn timed<T>(f: impl FnOnce() -> T) -> (T, std::time::Duration) {
    let start = Instant::now();
    let out = f();
    (out, start.elapsed())
}

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Pipeline state before any processing has occurred.
///
/// Call [`flatten`](Self::flatten) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing, call .flatten() to continue"]
pub struct Pending {
    config: RepairConfig,
    primitives: Vec<Primitive>,
}

impl Pending {
    /// The input primitives.
    #[must_use]
    pub fn primitives(&self) -> &[Primitive] {
        &self.primitives
    }

    /// Validate the configuration and flatten every primitive into
    /// straight segments.
    ///
    /// # Errors
    ///
    /// Returns [`RepairError::InvalidConfig`] if the configuration fails
    /// [`RepairConfig::validate`].
    pub fn flatten(self) -> Result<Flattened, RepairError> {
        self.config.validate()?;
        let started = Instant::now();

        let (flattening, duration) =
            timed(|| crate::flatten::flatten_all(&self.primitives, self.config.arc_segments));
        debug!(
            primitives = self.primitives.len(),
            segments = flattening.segments.len(),
            unsupported = flattening.unsupported_count(),
            "flattened"
        );

        let diagnostics = StageDiagnostics {
            duration,
            metrics: StageMetrics::Flatten {
                primitive_count: self.primitives.len(),
                segment_count: flattening.segments.len(),
                degenerate_count: flattening.degenerate,
                non_finite_count: flattening.non_finite,
                unsupported: flattening.unsupported.clone(),
                arc_segments: self.config.arc_segments,
            },
        };

        Ok(Flattened {
            config: self.config,
            started,
            primitive_count: self.primitives.len(),
            flattening,
            flatten: diagnostics,
        })
    }
}

// ───────────────────────── Stage 1: Flattened ────────────────────────

/// Pipeline state after flattening.
///
/// Call [`snap`](Self::snap) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing, call .snap() to continue"]
pub struct Flattened {
    config: RepairConfig,
    started: Instant,
    primitive_count: usize,
    flattening: Flattening,
    flatten: StageDiagnostics,
}

impl Flattened {
    /// Non-degenerate straight segments.
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.flattening.segments
    }

    /// Snap segment endpoints into clusters.
    pub fn snap(self) -> Snapped {
        let tolerance = self.config.tolerance;
        let ((map, canonical, events), duration) = timed(|| {
            let (map, canonical) = crate::snap::snap_segments(&self.flattening.segments, tolerance);
            let endpoints = crate::snap::endpoints(&self.flattening.segments);
            let events = crate::snap::snapping_events(&endpoints, &map);
            (map, canonical, events)
        });
        debug!(
            endpoints = map.endpoint_count(),
            clusters = map.cluster_count(),
            events = events.len(),
            "snapped"
        );

        let snap = StageDiagnostics {
            duration,
            metrics: StageMetrics::Snap {
                tolerance,
                endpoint_count: map.endpoint_count(),
                cluster_count: map.cluster_count(),
                snapping_events: events.len(),
            },
        };

        Snapped {
            config: self.config,
            started: self.started,
            primitive_count: self.primitive_count,
            unsupported_count: self.flattening.unsupported_count(),
            map,
            canonical,
            events,
            flatten: self.flatten,
            snap,
        }
    }
}

// ───────────────────────── Stage 2: Snapped ──────────────────────────

/// Pipeline state after endpoint snapping.
///
/// Call [`deduplicate`](Self::deduplicate) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing, call .deduplicate() to continue"]
pub struct Snapped {
    config: RepairConfig,
    started: Instant,
    primitive_count: usize,
    unsupported_count: usize,
    map: SnapMap,
    canonical: Vec<CanonicalSegment>,
    events: Vec<Point>,
    flatten: StageDiagnostics,
    snap: StageDiagnostics,
}

impl Snapped {
    /// Cluster assignment and canonical points.
    #[must_use]
    pub const fn snap_map(&self) -> &SnapMap {
        &self.map
    }

    /// Segments rewritten over cluster ids, self-loops included.
    #[must_use]
    pub fn canonical_segments(&self) -> &[CanonicalSegment] {
        &self.canonical
    }

    /// Distinct endpoint positions that moved.
    #[must_use]
    pub fn snapping_events(&self) -> &[Point] {
        &self.events
    }

    /// Remove self-loops and duplicate node pairs.
    pub fn deduplicate(self) -> Deduplicated {
        let (dedup, duration) = timed(|| crate::dedup::deduplicate(&self.canonical));
        debug!(
            kept = dedup.segments.len(),
            duplicates = dedup.duplicates_removed,
            self_loops = dedup.self_loops_removed,
            "deduplicated"
        );

        let stage = StageDiagnostics {
            duration,
            metrics: StageMetrics::Dedup {
                input_count: self.canonical.len(),
                output_count: dedup.segments.len(),
                duplicates_removed: dedup.duplicates_removed,
                self_loops_removed: dedup.self_loops_removed,
            },
        };

        Deduplicated {
            config: self.config,
            started: self.started,
            primitive_count: self.primitive_count,
            unsupported_count: self.unsupported_count,
            map: self.map,
            events: self.events,
            dedup,
            flatten: self.flatten,
            snap: self.snap,
            dedup_diag: stage,
        }
    }
}

// ───────────────────────── Stage 3: Deduplicated ─────────────────────

/// Pipeline state after deduplication.
///
/// Call [`reconstruct`](Self::reconstruct) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing, call .reconstruct() to continue"]
pub struct Deduplicated {
    config: RepairConfig,
    started: Instant,
    primitive_count: usize,
    unsupported_count: usize,
    map: SnapMap,
    events: Vec<Point>,
    dedup: Deduplication,
    flatten: StageDiagnostics,
    snap: StageDiagnostics,
    dedup_diag: StageDiagnostics,
}

impl Deduplicated {
    /// Unique segments, one per node pair.
    #[must_use]
    pub fn segments(&self) -> &[CanonicalSegment] {
        &self.dedup.segments
    }

    /// Partition the segment graph into loops and chains.
    pub fn reconstruct(self) -> Reconstructed {
        let (paths, duration) = timed(|| {
            crate::reconstruct::reconstruct(self.map.cluster_count(), &self.dedup.segments)
        });
        let loop_count = paths.iter().filter(|p| p.is_loop()).count();
        let chain_count = paths.len() - loop_count;
        debug!(loops = loop_count, chains = chain_count, "reconstructed");

        let reconstruct = StageDiagnostics {
            duration,
            metrics: StageMetrics::Reconstruct {
                edge_count: self.dedup.segments.len(),
                loop_count,
                chain_count,
            },
        };

        Reconstructed {
            config: self.config,
            started: self.started,
            primitive_count: self.primitive_count,
            unsupported_count: self.unsupported_count,
            canonical_points: self.map.into_canonical_points(),
            events: self.events,
            paths,
            flatten: self.flatten,
            snap: self.snap,
            dedup: self.dedup_diag,
            reconstruct,
        }
    }
}

// ───────────────────────── Stage 4: Reconstructed ────────────────────

/// Pipeline state after path reconstruction.
///
/// Call [`emit`](Self::emit) to advance to the final stage.
#[must_use = "pipeline stages are consumed by advancing, call .emit() to continue"]
pub struct Reconstructed {
    config: RepairConfig,
    started: Instant,
    primitive_count: usize,
    unsupported_count: usize,
    canonical_points: Vec<Point>,
    events: Vec<Point>,
    paths: Vec<Path>,
    flatten: StageDiagnostics,
    snap: StageDiagnostics,
    dedup: StageDiagnostics,
    reconstruct: StageDiagnostics,
}

impl Reconstructed {
    /// Loops and chains in discovery order.
    #[must_use]
    pub fn paths(&self) -> &[Path] {
        &self.paths
    }

    /// Canonical point of every cluster.
    #[must_use]
    pub fn canonical_points(&self) -> &[Point] {
        &self.canonical_points
    }

    /// Convert paths into transformed output primitives.
    pub fn emit(self) -> Emitted {
        let (output, duration) =
            timed(|| crate::emit::emit(&self.paths, &self.canonical_points, &self.config));
        let closed_polylines = output
            .iter()
            .filter(|o| matches!(o, OutputPrimitive::ClosedPolyline(_)))
            .count();
        debug!(
            closed_polylines,
            lines = output.len() - closed_polylines,
            "emitted"
        );

        let emit = StageDiagnostics {
            duration,
            metrics: StageMetrics::Emit {
                closed_polylines,
                lines: output.len() - closed_polylines,
                scale: self.config.scale,
                flip_y: self.config.flip_y,
            },
        };

        let loop_count = self.paths.iter().filter(|p| p.is_loop()).count();
        let diagnostics = RepairDiagnostics {
            flatten: self.flatten,
            snap: self.snap,
            dedup: self.dedup,
            reconstruct: self.reconstruct,
            emit,
            total_duration: self.started.elapsed(),
            summary: RepairSummary {
                primitive_count: self.primitive_count,
                unsupported_count: self.unsupported_count,
                loop_count,
                chain_count: self.paths.len() - loop_count,
                output_count: output.len(),
            },
        };

        Emitted {
            result: RepairResult {
                output,
                paths: self.paths,
                canonical_points: self.canonical_points,
                snapping_events: self.events,
                diagnostics,
            },
        }
    }
}

// ───────────────────────── Stage 5: Emitted ──────────────────────────

/// Pipeline state after emission, the final stage.
#[must_use = "call .into_result() to extract the RepairResult"]
pub struct Emitted {
    result: RepairResult,
}

impl Emitted {
    /// The output primitives.
    #[must_use]
    pub fn output(&self) -> &[OutputPrimitive] {
        &self.result.output
    }

    /// Diagnostics for the whole run.
    #[must_use]
    pub const fn diagnostics(&self) -> &RepairDiagnostics {
        &self.result.diagnostics
    }

    /// Consume the pipeline and return the full [`RepairResult`].
    #[must_use]
    pub fn into_result(self) -> RepairResult {
        self.result
    }
}

/// Entry point for the typed pipeline.
///
/// Each stage method consumes the current state and returns the next,
/// making it a compile-time error to skip stages or call them out of
/// order.
pub struct Pipeline;

impl Pipeline {
    /// Create a new pipeline from decoded primitives and config.
    ///
    /// No processing is performed until [`.flatten()`](Pending::flatten).
    #[allow(clippy::new_ret_no_self)]
    pub const fn new(primitives: Vec<Primitive>, config: RepairConfig) -> Pending {
        Pending { config, primitives }
    }
}
