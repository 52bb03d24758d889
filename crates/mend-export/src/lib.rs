//! mend-export: Pure format codecs (sans-IO)
//!
//! Reads DXF drawings into pipeline primitives, writes repaired output
//! back to DXF, and renders an SVG overlay for inspecting the result.

pub mod dxf;
pub mod svg;

pub use self::dxf::{DxfError, decode, encode, primitive_from_entity};
pub use self::svg::{SvgMetadata, build_path_data, to_overlay_svg};
