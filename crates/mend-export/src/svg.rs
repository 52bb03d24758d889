//! SVG diagnostic overlay.
//!
//! Draws a repaired drawing so its topology can be checked by eye:
//!
//! | Layer (`<g id>`) | Content                         | Color   |
//! |------------------|---------------------------------|---------|
//! | `loops`          | closed loops                    | black   |
//! | `chains`         | open chains                     | orange  |
//! | `snaps`          | endpoints moved by snapping     | green   |
//! | `chain-starts`   | first point of each chain       | red     |
//! | `chain-ends`     | last point of each chain        | magenta |
//!
//! Coordinates are drawing units with y pointing up, as in DXF model
//! space. The `viewBox` is fit to the bounding box of everything drawn,
//! and a `scale(1,-1)` group flips the SVG y axis to match.
//!
//! This is a pure function with no I/O; it returns a `String`.

use geo::{BoundingRect, MultiPoint, Rect};
use svg::Document;
use svg::node::element::path::Data;
use svg::node::element::{Circle, Description, Group, Path, Title};
use svg::node::{Text, Value};

use mend_pipeline::{Point, Polyline};

const LOOP_COLOR: &str = "black";
const CHAIN_COLOR: &str = "orange";
const SNAP_COLOR: &str = "green";
const CHAIN_START_COLOR: &str = "red";
const CHAIN_END_COLOR: &str = "magenta";

/// Margin around the geometry, as a fraction of its larger extent.
const MARGIN_RATIO: f64 = 0.05;

/// Marker radius, as a fraction of the larger extent.
const MARKER_RATIO: f64 = 0.004;

/// Metadata to embed in the SVG document.
///
/// Both fields are optional. When present, a `<title>` and/or `<desc>`
/// element is emitted immediately after the opening `<svg>` tag.
#[derive(Debug, Clone, Default)]
pub struct SvgMetadata<'a> {
    /// Document title, emitted as `<title>`. Typically the input filename.
    pub title: Option<&'a str>,

    /// Document description, emitted as `<desc>`.
    pub description: Option<&'a str>,
}

/// Build an SVG path `d` attribute string from a polyline.
///
/// Returns an empty string for polylines with fewer than 2 points.
///
/// # Examples
///
/// ```
/// use mend_pipeline::{Point, Polyline};
/// use mend_export::build_path_data;
///
/// let polyline = Polyline::new(vec![
///     Point::new(10.0, 20.0),
///     Point::new(30.0, 40.0),
/// ]);
/// assert_eq!(build_path_data(&polyline), "M10,20 L30,40");
/// ```
#[must_use]
pub fn build_path_data(polyline: &Polyline) -> String {
    let points = polyline.points();
    if points.len() < 2 {
        return String::new();
    }

    let first = &points[0];
    let mut data = Data::new().move_to((first.x, first.y));
    for p in &points[1..] {
        data = data.line_to((p.x, p.y));
    }
    String::from(Value::from(data))
}

/// Bounding box of every point the overlay draws, or `None` if empty.
fn bounds(loops: &[Polyline], chains: &[Polyline], snapping_events: &[Point]) -> Option<Rect> {
    let coords: Vec<(f64, f64)> = loops
        .iter()
        .chain(chains)
        .flat_map(Polyline::points)
        .chain(snapping_events)
        .map(|p| (p.x, p.y))
        .collect();
    MultiPoint::from(coords).bounding_rect()
}

fn layer(id: &str, color: &str) -> Group {
    Group::new().set("id", id).set("stroke", color)
}

fn polyline_layer(id: &str, color: &str, polylines: &[Polyline]) -> Group {
    let mut group = layer(id, color).set("fill", "none");
    for polyline in polylines {
        let d = build_path_data(polyline);
        if d.is_empty() {
            continue;
        }
        group = group.add(
            Path::new()
                .set("d", d)
                .set("stroke-width", 1)
                .set("vector-effect", "non-scaling-stroke"),
        );
    }
    group
}

fn marker_layer<'a>(
    id: &str,
    color: &str,
    radius: f64,
    points: impl IntoIterator<Item = &'a Point>,
) -> Group {
    let mut group = layer(id, color).set("fill", color);
    for p in points {
        group = group.add(
            Circle::new()
                .set("cx", p.x)
                .set("cy", p.y)
                .set("r", radius),
        );
    }
    group
}

/// Render the overlay.
///
/// `loops` and `chains` are untransformed canonical polylines (loops
/// repeat their first point at the end); `snapping_events` are the
/// original endpoint positions that snapping moved.
#[must_use]
pub fn to_overlay_svg(
    loops: &[Polyline],
    chains: &[Polyline],
    snapping_events: &[Point],
    metadata: &SvgMetadata<'_>,
) -> String {
    let (min_x, min_y, width, height) = bounds(loops, chains, snapping_events).map_or(
        (0.0, 0.0, 1.0, 1.0),
        |rect| {
            let extent = rect.width().max(rect.height()).max(f64::EPSILON);
            let margin = extent * MARGIN_RATIO;
            (
                rect.min().x - margin,
                rect.min().y - margin,
                2.0f64.mul_add(margin, rect.width()),
                2.0f64.mul_add(margin, rect.height()),
            )
        },
    );
    let marker = width.max(height) * MARKER_RATIO;

    // With y flipped by the group, model y in [min_y, min_y + height]
    // lands in SVG y [-(min_y + height), -min_y].
    let mut doc = Document::new()
        .set("viewBox", (min_x, -(min_y + height), width, height))
        .set("preserveAspectRatio", "xMidYMid meet");

    if let Some(title) = metadata.title {
        doc = doc.add(Title::new(title));
    }
    if let Some(description) = metadata.description {
        doc = doc.add(Description::new().add(Text::new(description)));
    }

    let chain_starts = chains.iter().filter_map(Polyline::first);
    let chain_ends = chains.iter().filter_map(Polyline::last);

    let drawing = Group::new()
        .set("transform", "scale(1,-1)")
        .add(polyline_layer("loops", LOOP_COLOR, loops))
        .add(polyline_layer("chains", CHAIN_COLOR, chains))
        .add(marker_layer("snaps", SNAP_COLOR, marker, snapping_events))
        .add(marker_layer("chain-starts", CHAIN_START_COLOR, marker, chain_starts))
        .add(marker_layer("chain-ends", CHAIN_END_COLOR, marker, chain_ends));
    doc = doc.add(drawing);

    // The svg crate omits the XML declaration, so we prepend it.
    format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{doc}\n")
}
