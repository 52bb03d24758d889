//! DXF codec: entities in, repaired entities out.
//!
//! [`decode`] reads an ASCII or binary DXF drawing with the [`dxf`] crate
//! and maps each entity in the `ENTITIES` section onto a pipeline
//! [`Primitive`]. `LINE`, `ARC`, `CIRCLE`, `LWPOLYLINE`, and `POLYLINE`
//! (with bulges) are understood; every other entity type becomes
//! [`Primitive::Unsupported`] carrying its DXF type name so the pipeline
//! can count and skip it.
//!
//! [`encode`] writes [`OutputPrimitive`]s as a new drawing: closed
//! polylines as `LWPOLYLINE` with the closed flag set, lines as `LINE`.
//!
//! Coordinates are read from the entity's x/y values directly. Entities
//! with a non-default extrusion direction are not transformed out of
//! their object coordinate system.

use dxf::LwPolylineVertex;
use dxf::entities::{Entity, EntityType, Line, LwPolyline};
use dxf::enums::AcadVersion;
use dxf::Drawing;

use mend_pipeline::{ArcDirection, OutputPrimitive, Point, PolylineVertex, Primitive};

/// Closed bit of the `LWPOLYLINE`/`POLYLINE` flags field.
const CLOSED_FLAG: i32 = 1;

/// Errors from reading or writing DXF data.
#[derive(Debug, thiserror::Error)]
pub enum DxfError {
    /// The input contained no bytes.
    #[error("input is empty")]
    EmptyInput,

    /// The input is not a readable DXF drawing.
    #[error("failed to parse DXF: {0}")]
    Parse(#[from] dxf::DxfError),

    /// Serializing the output drawing failed.
    #[error("failed to write DXF: {0}")]
    Write(dxf::DxfError),
}

/// Decode DXF bytes into pipeline primitives, in file order.
///
/// # Errors
///
/// Returns [`DxfError::EmptyInput`] if `bytes` is empty and
/// [`DxfError::Parse`] if the data is not a valid drawing.
pub fn decode(bytes: &[u8]) -> Result<Vec<Primitive>, DxfError> {
    if bytes.is_empty() {
        return Err(DxfError::EmptyInput);
    }
    let mut reader = bytes;
    let drawing = Drawing::load(&mut reader)?;
    let primitives: Vec<Primitive> = drawing
        .entities()
        .map(|entity| primitive_from_entity(&entity.specific))
        .collect();
    tracing::debug!(entities = primitives.len(), "decoded DXF");
    Ok(primitives)
}

/// Map one DXF entity onto a pipeline primitive.
#[must_use]
pub fn primitive_from_entity(specific: &EntityType) -> Primitive {
    match specific {
        EntityType::Line(line) => Primitive::Line {
            start: point(&line.p1),
            end: point(&line.p2),
        },
        EntityType::Arc(arc) => Primitive::Arc {
            center: point(&arc.center),
            radius: arc.radius,
            start_angle: arc.start_angle,
            end_angle: arc.end_angle,
            direction: ArcDirection::CounterClockwise,
        },
        EntityType::Circle(circle) => Primitive::Circle {
            center: point(&circle.center),
            radius: circle.radius,
        },
        EntityType::LwPolyline(polyline) => Primitive::Polyline {
            vertices: polyline
                .vertices
                .iter()
                .map(|v| PolylineVertex::with_bulge(Point::new(v.x, v.y), v.bulge))
                .collect(),
            closed: polyline.flags & CLOSED_FLAG != 0,
        },
        EntityType::Polyline(polyline) => Primitive::Polyline {
            vertices: polyline
                .vertices()
                .map(|v| PolylineVertex::with_bulge(point(&v.location), v.bulge))
                .collect(),
            closed: polyline.flags & CLOSED_FLAG != 0,
        },
        other => Primitive::Unsupported {
            kind: entity_kind(other),
        },
    }
}

/// DXF type name of an entity as written in the group-0 code, e.g.
/// `SPLINE`, `POINT`, or `DIMENSION`.
///
/// Variants whose Rust name differs from the DXF name are mapped
/// explicitly. The rest upper-case their variant name, which already
/// matches (`Spline` is `SPLINE`, `MText` is `MTEXT`).
fn entity_kind(specific: &EntityType) -> String {
    let name = match specific {
        EntityType::ModelPoint(_) => "POINT",
        EntityType::Face3D(_) => "3DFACE",
        EntityType::Solid3D(_) => "3DSOLID",
        EntityType::Attribute(_) => "ATTRIB",
        EntityType::AttributeDefinition(_) => "ATTDEF",
        EntityType::ProxyEntity(_) => "ACAD_PROXY_ENTITY",
        other => return variant_kind(other),
    };
    name.to_owned()
}

fn variant_kind(specific: &EntityType) -> String {
    let debug = format!("{specific:?}");
    let variant = debug
        .split(['(', ' ', '{'])
        .next()
        .unwrap_or("UNKNOWN")
        .to_uppercase();
    // Every dimension subtype is stored as one DIMENSION entity.
    if variant.ends_with("DIMENSION") {
        "DIMENSION".to_owned()
    } else {
        variant
    }
}

fn point(p: &dxf::Point) -> Point {
    Point::new(p.x, p.y)
}

fn dxf_point(p: Point) -> dxf::Point {
    dxf::Point::new(p.x, p.y, 0.0)
}

/// Encode output primitives as a DXF drawing.
///
/// The drawing targets AutoCAD R2000 so closed polylines can be written
/// as `LWPOLYLINE`.
///
/// # Errors
///
/// Returns [`DxfError::Write`] if serialization fails.
pub fn encode(primitives: &[OutputPrimitive]) -> Result<Vec<u8>, DxfError> {
    let mut drawing = Drawing::new();
    drawing.header.version = AcadVersion::R2000;

    for primitive in primitives {
        let specific = match primitive {
            OutputPrimitive::ClosedPolyline(polyline) => {
                EntityType::LwPolyline(LwPolyline {
                    flags: CLOSED_FLAG,
                    vertices: polyline
                        .points()
                        .iter()
                        .map(|p| LwPolylineVertex {
                            x: p.x,
                            y: p.y,
                            ..LwPolylineVertex::default()
                        })
                        .collect(),
                    ..LwPolyline::default()
                })
            }
            OutputPrimitive::Line { start, end } => {
                EntityType::Line(Line::new(dxf_point(*start), dxf_point(*end)))
            }
        };
        drawing.add_entity(Entity::new(specific));
    }

    let mut buf = Vec::new();
    drawing.save(&mut buf).map_err(DxfError::Write)?;
    Ok(buf)
}
