//! Shared types for the mend geometry reconstruction pipeline.

use serde::{Deserialize, Serialize};

/// A 2D point in working units (drawing units of the source file).
///
/// Equality is bit-exact; geometric equivalence between points is always
/// decided against a tolerance by the snapping stage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal coordinate.
    pub x: f64,
    /// Vertical coordinate (y-up, as in DXF model space).
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    ///
    /// Avoids the square root for comparison purposes.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.mul_add(dx, dy * dy)
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }

    /// Whether both coordinates are finite.
    #[must_use]
    pub const fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// One straight edge between two endpoints.
///
/// Segments are unordered: `(a, b)` and `(b, a)` describe the same edge.
/// The field order only records the direction the flattener traced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// First endpoint in trace order.
    pub a: Point,
    /// Second endpoint in trace order.
    pub b: Point,
}

impl Segment {
    /// Create a new segment.
    #[must_use]
    pub const fn new(a: Point, b: Point) -> Self {
        Self { a, b }
    }

    /// Returns `true` if both endpoints are bit-identical.
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        self.a == self.b
    }

    /// Euclidean length of the segment.
    #[must_use]
    pub fn length(&self) -> f64 {
        self.a.distance(self.b)
    }
}

/// Label of one endpoint cluster produced by the snapping stage.
///
/// Cluster ids are dense (`0..cluster_count`) and are assigned in order of
/// first appearance in the endpoint list, so they are reproducible for a
/// given input ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClusterId(pub usize);

impl ClusterId {
    /// The dense index of this cluster.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// A segment whose endpoints have been replaced by their cluster labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CanonicalSegment {
    /// Cluster of the first endpoint.
    pub a: ClusterId,
    /// Cluster of the second endpoint.
    pub b: ClusterId,
}

impl CanonicalSegment {
    /// Create a new canonical segment.
    #[must_use]
    pub const fn new(a: ClusterId, b: ClusterId) -> Self {
        Self { a, b }
    }

    /// Returns `true` if both endpoints collapsed into the same cluster.
    #[must_use]
    pub fn is_self_loop(&self) -> bool {
        self.a == self.b
    }

    /// The unordered endpoint pair as `(min, max)`.
    #[must_use]
    pub fn key(&self) -> (ClusterId, ClusterId) {
        if self.a <= self.b {
            (self.a, self.b)
        } else {
            (self.b, self.a)
        }
    }
}

/// Sweep direction of a circular arc.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ArcDirection {
    /// Increasing angle (the DXF convention for `ARC` entities).
    #[default]
    CounterClockwise,
    /// Decreasing angle.
    Clockwise,
}

/// One vertex of a polyline, with the bulge of the span that starts here.
///
/// A bulge of `0.0` is a straight span. Otherwise the span to the next
/// vertex is a circular arc whose included angle is `4 * atan(bulge)`;
/// positive bulges sweep counter-clockwise.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PolylineVertex {
    /// Vertex position.
    pub point: Point,
    /// Bulge of the span from this vertex to the next.
    pub bulge: f64,
}

impl PolylineVertex {
    /// A vertex whose outgoing span is straight.
    #[must_use]
    pub const fn straight(point: Point) -> Self {
        Self { point, bulge: 0.0 }
    }

    /// A vertex whose outgoing span is an arc with the given bulge.
    #[must_use]
    pub const fn with_bulge(point: Point, bulge: f64) -> Self {
        Self { point, bulge }
    }
}

/// A typed input primitive, as decoded by a format codec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Primitive {
    /// A straight line between two endpoints.
    Line {
        /// Start point.
        start: Point,
        /// End point.
        end: Point,
    },
    /// A circular arc. Angles are in degrees, measured from the +x axis.
    Arc {
        /// Arc center.
        center: Point,
        /// Arc radius.
        radius: f64,
        /// Start angle in degrees.
        start_angle: f64,
        /// End angle in degrees.
        end_angle: f64,
        /// Sweep direction from start to end.
        direction: ArcDirection,
    },
    /// A full circle.
    Circle {
        /// Circle center.
        center: Point,
        /// Circle radius.
        radius: f64,
    },
    /// A polyline or lightweight polyline, possibly with arc bulges.
    Polyline {
        /// Vertices in order.
        vertices: Vec<PolylineVertex>,
        /// Whether a closing span runs from the last vertex to the first.
        closed: bool,
    },
    /// An entity the codec recognized but the pipeline cannot flatten.
    Unsupported {
        /// Entity type name as reported by the codec (e.g. `SPLINE`).
        kind: String,
    },
}

impl Primitive {
    /// Short name of the primitive kind, used in logs and reports.
    #[must_use]
    pub fn kind(&self) -> &str {
        match self {
            Self::Line { .. } => "LINE",
            Self::Arc { .. } => "ARC",
            Self::Circle { .. } => "CIRCLE",
            Self::Polyline { .. } => "POLYLINE",
            Self::Unsupported { kind } => kind,
        }
    }
}

/// A sequence of connected points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polyline(Vec<Point>);

impl Polyline {
    /// Create a new polyline from a vector of points.
    #[must_use]
    pub const fn new(points: Vec<Point>) -> Self {
        Self(points)
    }

    /// Returns `true` if the polyline has no points.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of points in the polyline.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns the first point, if any.
    #[must_use]
    pub fn first(&self) -> Option<&Point> {
        self.0.first()
    }

    /// Returns the last point, if any.
    #[must_use]
    pub fn last(&self) -> Option<&Point> {
        self.0.last()
    }

    /// Returns a slice of all points.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.0
    }

    /// Consumes the polyline and returns the underlying vector of points.
    #[must_use]
    pub fn into_points(self) -> Vec<Point> {
        self.0
    }
}

/// A primitive handed back to a format codec for serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OutputPrimitive {
    /// A closed polyline. The first point is not repeated at the end;
    /// closure is implied.
    ClosedPolyline(Polyline),
    /// A straight line.
    Line {
        /// Start point.
        start: Point,
        /// End point.
        end: Point,
    },
}

/// Drawing unit of the source file, used to convert a precision given in
/// micrometers into a tolerance in working units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Unit {
    /// Millimeters.
    #[default]
    #[serde(rename = "mm")]
    Millimeters,
    /// Micrometers.
    #[serde(rename = "um")]
    Micrometers,
}

impl Unit {
    /// How many working units one micrometer spans.
    #[must_use]
    pub const fn per_micrometer(self) -> f64 {
        match self {
            Self::Millimeters => 0.001,
            Self::Micrometers => 1.0,
        }
    }
}

/// Configuration for the reconstruction pipeline.
///
/// Passed explicitly to every stage; there is no global default state.
/// Call [`validate`](Self::validate) (the pipeline does so before
/// flattening) to reject values the stages cannot honor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepairConfig {
    /// Endpoint snapping distance in working units. Endpoints closer than
    /// this (directly or through a chain of such endpoints) merge.
    pub tolerance: f64,

    /// Number of straight sub-segments per arc, circle, or bulge span.
    pub arc_segments: usize,

    /// Uniform scale applied to every output point.
    pub scale: f64,

    /// Mirror output about the x axis (`y -> -y`).
    pub flip_y: bool,
}

impl RepairConfig {
    /// Default snapping precision in micrometers.
    pub const DEFAULT_PRECISION_UM: f64 = 0.1;

    /// Default drawing unit.
    pub const DEFAULT_UNIT: Unit = Unit::Millimeters;

    /// Default snapping tolerance: 0.1 µm expressed in millimeters.
    pub const DEFAULT_TOLERANCE: f64 = 1e-4;

    /// Default arc subdivision count.
    pub const DEFAULT_ARC_SEGMENTS: usize = 100;

    /// Default output scale.
    pub const DEFAULT_SCALE: f64 = 1.0;

    /// Default vertical flip.
    pub const DEFAULT_FLIP_Y: bool = false;

    /// Convert a precision in micrometers into a tolerance in `unit`.
    #[must_use]
    pub fn tolerance_from_precision(precision_um: f64, unit: Unit) -> f64 {
        precision_um * unit.per_micrometer()
    }

    /// Check that every parameter is usable.
    ///
    /// # Errors
    ///
    /// Returns [`RepairError::InvalidConfig`] if the tolerance is negative
    /// or not finite, `arc_segments` is zero, or the scale is not a
    /// positive finite number.
    pub fn validate(&self) -> Result<(), RepairError> {
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(RepairError::InvalidConfig(format!(
                "tolerance must be a finite non-negative distance, got {}",
                self.tolerance
            )));
        }
        if self.arc_segments == 0 {
            return Err(RepairError::InvalidConfig(
                "arc_segments must be at least 1".to_owned(),
            ));
        }
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(RepairError::InvalidConfig(format!(
                "scale must be a finite positive number, got {}",
                self.scale
            )));
        }
        Ok(())
    }
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            tolerance: Self::DEFAULT_TOLERANCE,
            arc_segments: Self::DEFAULT_ARC_SEGMENTS,
            scale: Self::DEFAULT_SCALE,
            flip_y: Self::DEFAULT_FLIP_Y,
        }
    }
}

/// Errors that abort a pipeline run.
///
/// Per-primitive problems (unsupported entities, degenerate segments) are
/// never errors; they are counted in the run diagnostics instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum RepairError {
    /// Pipeline configuration is invalid.
    #[error("invalid repair configuration: {0}")]
    InvalidConfig(String),
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn distance_is_euclidean() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert!((a.distance(b) - 5.0).abs() < f64::EPSILON);
        assert!((a.distance_squared(b) - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn canonical_key_is_unordered() {
        let ab = CanonicalSegment::new(ClusterId(3), ClusterId(1));
        let ba = CanonicalSegment::new(ClusterId(1), ClusterId(3));
        assert_eq!(ab.key(), ba.key());
        assert_eq!(ab.key(), (ClusterId(1), ClusterId(3)));
    }

    #[test]
    fn default_tolerance_matches_default_precision() {
        let derived = RepairConfig::tolerance_from_precision(
            RepairConfig::DEFAULT_PRECISION_UM,
            RepairConfig::DEFAULT_UNIT,
        );
        assert!((derived - RepairConfig::DEFAULT_TOLERANCE).abs() < 1e-15);
    }

    #[test]
    fn micrometer_unit_keeps_precision_as_is() {
        let tol = RepairConfig::tolerance_from_precision(0.5, Unit::Micrometers);
        assert!((tol - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn default_config_is_valid() {
        assert!(RepairConfig::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_values() {
        let cases = [
            RepairConfig {
                tolerance: -1.0,
                ..RepairConfig::default()
            },
            RepairConfig {
                tolerance: f64::NAN,
                ..RepairConfig::default()
            },
            RepairConfig {
                arc_segments: 0,
                ..RepairConfig::default()
            },
            RepairConfig {
                scale: 0.0,
                ..RepairConfig::default()
            },
            RepairConfig {
                scale: f64::INFINITY,
                ..RepairConfig::default()
            },
        ];
        for config in cases {
            assert!(
                matches!(config.validate(), Err(RepairError::InvalidConfig(_))),
                "expected {config:?} to be rejected"
            );
        }
    }

    #[test]
    fn config_json_fills_missing_fields_with_defaults() {
        let config: RepairConfig = serde_json::from_str(r#"{"flip_y": true}"#).unwrap();
        assert!(config.flip_y);
        assert_eq!(config.arc_segments, RepairConfig::DEFAULT_ARC_SEGMENTS);
    }

    #[test]
    fn unit_serializes_as_short_name() {
        assert_eq!(serde_json::to_string(&Unit::Micrometers).unwrap(), r#""um""#);
        assert_eq!(serde_json::to_string(&Unit::Millimeters).unwrap(), r#""mm""#);
    }

    #[test]
    fn unsupported_kind_is_reported_verbatim() {
        let p = Primitive::Unsupported {
            kind: "SPLINE".to_owned(),
        };
        assert_eq!(p.kind(), "SPLINE");
    }
}
