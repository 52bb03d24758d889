//! Emission: convert reconstructed paths into output primitives.
//!
//! Loops become closed polylines (first point not repeated) and chains
//! become one line per traversed edge. The optional scale and vertical
//! flip are applied to every point on the way out; the canonical points
//! themselves are never modified.

use crate::reconstruct::Path;
use crate::types::{ClusterId, OutputPrimitive, Point, Polyline, RepairConfig};

/// Apply the output transform to one point.
///
/// `flip_y` mirrors about the x axis, so the flip and the scale commute.
#[must_use]
pub fn transform_point(p: Point, scale: f64, flip_y: bool) -> Point {
    let sy = if flip_y { -scale } else { scale };
    Point::new(p.x * scale, p.y * sy)
}

/// Build the output primitive list.
///
/// `canonical` is indexed by cluster id (see
/// [`SnapMap::canonical_points`](crate::snap::SnapMap::canonical_points)).
///
/// # Panics
///
/// Panics if a path references a cluster id outside `canonical`.
#[must_use]
pub fn emit(paths: &[Path], canonical: &[Point], config: &RepairConfig) -> Vec<OutputPrimitive> {
    let point = |id: &ClusterId| {
        transform_point(canonical[id.index()], config.scale, config.flip_y)
    };

    let mut out = Vec::new();
    for path in paths {
        let nodes = path.nodes();
        if path.is_loop() {
            let open = &nodes[..nodes.len().saturating_sub(1)];
            out.push(OutputPrimitive::ClosedPolyline(Polyline::new(
                open.iter().map(point).collect(),
            )));
        } else {
            out.extend(nodes.windows(2).map(|w| OutputPrimitive::Line {
                start: point(&w[0]),
                end: point(&w[1]),
            }));
        }
    }
    out
}

/// Canonical points of a path in walk order, untransformed.
///
/// Loops keep their repeated closing point so the polyline draws closed.
#[must_use]
pub fn path_polyline(path: &Path, canonical: &[Point]) -> Polyline {
    Polyline::new(
        path.nodes()
            .iter()
            .filter_map(|id| canonical.get(id.index()).copied())
            .collect(),
    )
}
