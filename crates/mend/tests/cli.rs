//! End-to-end tests: run the `mend` binary on drawings written to a
//! temporary directory.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::path::Path;
use std::process::{Command, Output};

use dxf::entities::{Entity, EntityType, Line};
use dxf::enums::AcadVersion;
use dxf::{Drawing, Point};

fn write_drawing(path: &Path, lines: &[((f64, f64), (f64, f64))]) {
    let mut drawing = Drawing::new();
    drawing.header.version = AcadVersion::R2000;
    for &((x0, y0), (x1, y1)) in lines {
        drawing.add_entity(Entity::new(EntityType::Line(Line::new(
            Point::new(x0, y0, 0.0),
            Point::new(x1, y1, 0.0),
        ))));
    }
    let mut buf = Vec::new();
    drawing.save(&mut buf).expect("serialize input drawing");
    std::fs::write(path, buf).expect("write input drawing");
}

fn read_drawing(path: &Path) -> Drawing {
    let bytes = std::fs::read(path).expect("read output drawing");
    Drawing::load(&mut bytes.as_slice()).expect("parse output drawing")
}

/// A 10 mm square whose left edge is 0.05 µm off.
fn gapped_square() -> Vec<((f64, f64), (f64, f64))> {
    let gap = 0.000_05;
    vec![
        ((0.0, 0.0), (10.0, 0.0)),
        ((10.0, 0.0), (10.0, 10.0)),
        ((10.0, 10.0), (0.0, 10.0)),
        ((0.0, 10.0 + gap), (0.0, gap)),
    ]
}

fn mend(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_mend"))
        .args(args)
        .output()
        .expect("run mend")
}

fn arg(path: &Path) -> &str {
    path.to_str().expect("utf-8 temp path")
}

#[test]
fn repairs_gapped_square_into_one_closed_polyline() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("square.dxf");
    let output = dir.path().join("square_fixed.dxf");
    write_drawing(&input, &gapped_square());

    let out = mend(&[arg(&input), arg(&output)]);
    assert!(
        out.status.success(),
        "mend failed: {}",
        String::from_utf8_lossy(&out.stderr)
    );

    let drawing = read_drawing(&output);
    let entities: Vec<&Entity> = drawing.entities().collect();
    assert_eq!(entities.len(), 1);
    let EntityType::LwPolyline(lw) = &entities[0].specific else {
        unreachable!("expected LWPOLYLINE, got {:?}", entities[0].specific);
    };
    assert_eq!(lw.flags & 1, 1);
    assert_eq!(lw.vertices.len(), 4);

    let report = String::from_utf8_lossy(&out.stdout);
    assert!(report.contains("Closed loops: 1"), "{report}");
}

#[test]
fn fine_precision_in_micrometers_leaves_square_open() {
    // In a micrometer drawing, 0.00001 µm precision is a 1e-5 unit
    // tolerance, too small to bridge the 5e-5 unit gap.
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("square.dxf");
    let output = dir.path().join("out.dxf");
    write_drawing(&input, &gapped_square());

    let out = mend(&[
        arg(&input),
        arg(&output),
        "--unit",
        "um",
        "--precision-um",
        "0.00001",
        "--json",
    ]);
    assert!(out.status.success());

    let diagnostics: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(diagnostics["summary"]["loop_count"], 0);
    assert_eq!(diagnostics["summary"]["chain_count"], 1);

    let drawing = read_drawing(&output);
    let lines = drawing
        .entities()
        .filter(|e| matches!(e.specific, EntityType::Line(_)))
        .count();
    assert_eq!(lines, 4);
}

#[test]
fn scale_and_flip_apply_to_written_geometry() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("line.dxf");
    let output = dir.path().join("out.dxf");
    write_drawing(&input, &[((1.0, 2.0), (3.0, 2.0))]);

    let out = mend(&[arg(&input), arg(&output), "--scale", "10", "--flip-y"]);
    assert!(out.status.success());

    let drawing = read_drawing(&output);
    let line = drawing
        .entities()
        .find_map(|e| match &e.specific {
            EntityType::Line(line) => Some(line.clone()),
            _ => None,
        })
        .unwrap();
    assert!((line.p1.x - 10.0).abs() < 1e-9);
    assert!((line.p1.y + 20.0).abs() < 1e-9);
    assert!((line.p2.x - 30.0).abs() < 1e-9);
}

#[test]
fn overlay_is_written_when_requested() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("square.dxf");
    let output = dir.path().join("out.dxf");
    let overlay = dir.path().join("overlay.svg");
    write_drawing(&input, &gapped_square());

    let out = mend(&[arg(&input), arg(&output), "--overlay", arg(&overlay)]);
    assert!(out.status.success());

    let svg = std::fs::read_to_string(&overlay).unwrap();
    assert!(svg.contains("<title>square</title>"));
    assert!(svg.contains("id=\"snaps\""));
}

#[test]
fn config_json_overrides_flags() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("square.dxf");
    let output = dir.path().join("out.dxf");
    write_drawing(&input, &gapped_square());

    let out = mend(&[
        arg(&input),
        arg(&output),
        "--tolerance",
        "0.5",
        "--config-json",
        r#"{"tolerance": 0.0}"#,
        "--json",
    ]);
    assert!(out.status.success());
    let diagnostics: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(diagnostics["summary"]["loop_count"], 0);
}

#[test]
fn missing_input_fails() {
    let dir = tempfile::tempdir().unwrap();
    let out = mend(&[
        arg(&dir.path().join("nope.dxf")),
        arg(&dir.path().join("out.dxf")),
    ]);
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("failed to read"));
}

#[test]
fn invalid_tolerance_fails() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("square.dxf");
    write_drawing(&input, &gapped_square());
    let out = mend(&[
        arg(&input),
        arg(&dir.path().join("out.dxf")),
        "--tolerance=-1",
    ]);
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("invalid repair configuration"));
}

#[test]
fn missing_arguments_are_a_usage_error() {
    let out = mend(&[]);
    assert_eq!(out.status.code(), Some(2));
}
