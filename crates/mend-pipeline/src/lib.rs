//! mend-pipeline: Pure geometry reconstruction pipeline (sans-IO).
//!
//! Repairs CAD geometry whose curves and polylines were exported as
//! loose, slightly misaligned pieces:
//! flatten -> snap endpoints -> deduplicate -> reconstruct paths -> emit.
//!
//! This crate has **no I/O dependencies**. It takes typed
//! [`Primitive`]s and returns typed [`OutputPrimitive`]s; reading and
//! writing DXF files lives in `mend-export`.

pub mod dedup;
pub mod diagnostics;
pub mod emit;
pub mod flatten;
pub mod pipeline;
pub mod reconstruct;
pub mod snap;
pub mod types;

pub use diagnostics::{RepairDiagnostics, RepairSummary, StageDiagnostics, StageMetrics};
pub use pipeline::{
    Deduplicated, Emitted, Flattened, Pending, Pipeline, Reconstructed, RepairResult, Snapped,
};
pub use reconstruct::{Path, PathKind};
pub use snap::SnapMap;
pub use types::{
    ArcDirection, CanonicalSegment, ClusterId, OutputPrimitive, Point, Polyline, PolylineVertex,
    Primitive, RepairConfig, RepairError, Segment, Unit,
};

/// Run the full reconstruction pipeline.
///
/// # Pipeline steps
///
/// 1. Flatten lines, arcs, circles, and polylines into straight segments
/// 2. Snap near-coincident endpoints into clusters
/// 3. Remove duplicate and collapsed segments
/// 4. Walk the segment graph into closed loops and open chains
/// 5. Emit loops as closed polylines and chains as lines
///
/// An empty primitive list is not an error; it yields an empty result.
///
/// # Errors
///
/// Returns [`RepairError::InvalidConfig`] if `config` fails validation.
pub fn process(
    primitives: Vec<Primitive>,
    config: &RepairConfig,
) -> Result<RepairResult, RepairError> {
    Ok(Pipeline::new(primitives, config.clone())
        .flatten()?
        .snap()
        .deduplicate()
        .reconstruct()
        .emit()
        .into_result())
}
