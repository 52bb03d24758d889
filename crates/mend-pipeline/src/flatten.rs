//! Flattening: turn curved and compound primitives into straight segments.
//!
//! Every supported primitive is first traced into an ordered point
//! sequence, then consecutive point pairs become [`Segment`]s. Arcs,
//! circles, and bulged polyline spans are sampled uniformly by angle with
//! a fixed number of sub-segments per curve.
//!
//! Trace endpoints are exact: the first and last points of an arc trace
//! are its analytic start and end, a circle trace ends on its own first
//! point, and a bulge span ends on the next polyline vertex. Consecutive
//! segments share their joint point bit-for-bit.

use std::collections::BTreeMap;
use std::f64::consts::TAU;

use crate::types::{ArcDirection, Point, PolylineVertex, Primitive, Segment};

/// Bulges smaller than this are treated as straight spans.
const BULGE_EPSILON: f64 = 1e-9;

/// A primitive the flattener cannot trace.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FlattenError {
    /// The primitive kind is outside the supported set.
    #[error("unsupported entity type: {0}")]
    Unsupported(String),
}

/// Segments produced from a whole primitive list, plus the per-primitive
/// issues encountered along the way.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Flattening {
    /// Non-degenerate segments in input order.
    pub segments: Vec<Segment>,
    /// Count of skipped primitives, keyed by entity kind.
    pub unsupported: BTreeMap<String, usize>,
    /// Zero-length segments dropped during flattening.
    pub degenerate: usize,
    /// Primitives skipped because their geometry is not finite.
    pub non_finite: usize,
}

impl Flattening {
    /// Total number of skipped primitives across all kinds.
    #[must_use]
    pub fn unsupported_count(&self) -> usize {
        self.unsupported.values().sum()
    }
}

/// Flatten every primitive, skipping unsupported ones and dropping
/// zero-length segments.
///
/// A primitive whose trace contains a NaN or infinite coordinate (from a
/// non-finite point, radius, angle, or bulge) is skipped whole and counted
/// in [`Flattening::non_finite`].
#[must_use]
pub fn flatten_all(primitives: &[Primitive], arc_segments: usize) -> Flattening {
    let mut out = Flattening::default();
    for primitive in primitives {
        match trace(primitive, arc_segments) {
            Ok(points) if !points.iter().all(|p| p.is_finite()) => {
                out.non_finite += 1;
            }
            Ok(points) => {
                for segment in segments_of(&points) {
                    if segment.is_degenerate() {
                        out.degenerate += 1;
                    } else {
                        out.segments.push(segment);
                    }
                }
            }
            Err(FlattenError::Unsupported(kind)) => {
                *out.unsupported.entry(kind).or_default() += 1;
            }
        }
    }
    for (kind, count) in &out.unsupported {
        tracing::warn!(kind = %kind, count, "skipped unsupported entities");
    }
    if out.non_finite > 0 {
        tracing::warn!(count = out.non_finite, "skipped entities with non-finite geometry");
    }
    out
}

/// Flatten one primitive into its straight segments.
///
/// Zero-length segments are kept; [`flatten_all`] is where they are
/// filtered and counted.
///
/// # Errors
///
/// Returns [`FlattenError::Unsupported`] for [`Primitive::Unsupported`].
pub fn flatten(primitive: &Primitive, arc_segments: usize) -> Result<Vec<Segment>, FlattenError> {
    trace(primitive, arc_segments).map(|points| segments_of(&points).collect())
}

/// Trace a primitive into the ordered points it passes through.
///
/// # Errors
///
/// Returns [`FlattenError::Unsupported`] for [`Primitive::Unsupported`].
pub fn trace(primitive: &Primitive, arc_segments: usize) -> Result<Vec<Point>, FlattenError> {
    match primitive {
        Primitive::Line { start, end } => Ok(vec![*start, *end]),
        Primitive::Arc {
            center,
            radius,
            start_angle,
            end_angle,
            direction,
        } => {
            let start = start_angle.to_radians();
            let sweep = arc_sweep(start, end_angle.to_radians(), *direction);
            Ok(arc_points(*center, *radius, start, sweep, arc_segments))
        }
        Primitive::Circle { center, radius } => {
            let mut points = arc_points(*center, *radius, 0.0, TAU, arc_segments);
            // Close exactly: cos/sin of 2π does not round-trip to the start.
            if let Some(&first) = points.first() {
                if let Some(last) = points.last_mut() {
                    *last = first;
                }
            }
            Ok(points)
        }
        Primitive::Polyline { vertices, closed } => {
            Ok(polyline_points(vertices, *closed, arc_segments))
        }
        Primitive::Unsupported { kind } => Err(FlattenError::Unsupported(kind.clone())),
    }
}

/// Consecutive point pairs of a trace, as segments.
fn segments_of(points: &[Point]) -> impl Iterator<Item = Segment> + '_ {
    points.windows(2).map(|w| Segment::new(w[0], w[1]))
}

/// Signed sweep (radians) from `start` to `end` in the given direction.
///
/// Counter-clockwise sweeps are in `[0, 2π)` after wrapping a negative
/// difference, matching how DXF interprets an `ARC` whose end angle is
/// numerically below its start angle. Clockwise sweeps mirror that.
fn arc_sweep(start: f64, end: f64, direction: ArcDirection) -> f64 {
    match direction {
        ArcDirection::CounterClockwise => {
            let sweep = end - start;
            if sweep < 0.0 { sweep.rem_euclid(TAU) } else { sweep }
        }
        ArcDirection::Clockwise => {
            let sweep = start - end;
            -(if sweep < 0.0 { sweep.rem_euclid(TAU) } else { sweep })
        }
    }
}

/// Sample `segments + 1` points on a circle from `start` through `sweep`.
fn arc_points(center: Point, radius: f64, start: f64, sweep: f64, segments: usize) -> Vec<Point> {
    let segments = segments.max(1);
    #[allow(clippy::cast_precision_loss)]
    let step = sweep / segments as f64;
    (0..=segments)
        .map(|i| {
            #[allow(clippy::cast_precision_loss)]
            let angle = (i as f64).mul_add(step, start);
            Point::new(
                radius.mul_add(angle.cos(), center.x),
                radius.mul_add(angle.sin(), center.y),
            )
        })
        .collect()
}

/// Trace a polyline, expanding bulged spans into arcs.
fn polyline_points(vertices: &[PolylineVertex], closed: bool, segments: usize) -> Vec<Point> {
    let Some(first) = vertices.first() else {
        return Vec::new();
    };
    let mut points = vec![first.point];

    let span_count = if closed && vertices.len() > 1 {
        vertices.len()
    } else {
        vertices.len().saturating_sub(1)
    };

    for i in 0..span_count {
        let from = vertices[i];
        let to = vertices[(i + 1) % vertices.len()].point;
        if from.bulge.abs() < BULGE_EPSILON {
            points.push(to);
        } else {
            let arc = bulge_points(from.point, to, from.bulge, segments);
            points.extend_from_slice(&arc[1..]);
        }
    }

    points
}

/// Flatten one bulged span from `from` to `to`.
///
/// The included angle is `4 * atan(bulge)`; the center sits on the chord's
/// perpendicular bisector at signed distance `(c / 2) / tan(θ / 2)` to the
/// left of the chord direction. The returned trace starts at `from` and
/// ends at `to` exactly.
fn bulge_points(from: Point, to: Point, bulge: f64, segments: usize) -> Vec<Point> {
    let dx = to.x - from.x;
    let dy = to.y - from.y;
    let chord = dx.hypot(dy);
    if chord == 0.0 {
        return vec![from, to];
    }

    let theta = 4.0 * bulge.atan();
    let half_chord = chord / 2.0;
    let radius = half_chord / (theta / 2.0).sin().abs();
    let offset = half_chord / (theta / 2.0).tan();

    let center = Point::new(
        (-dy / chord).mul_add(offset, from.x + dx / 2.0),
        (dx / chord).mul_add(offset, from.y + dy / 2.0),
    );
    let start = (from.y - center.y).atan2(from.x - center.x);

    let mut points = arc_points(center, radius, start, theta, segments);
    if let Some(p) = points.first_mut() {
        *p = from;
    }
    if let Some(p) = points.last_mut() {
        *p = to;
    }
    points
}
