//! Property key constants for layer Attrs.
//!
//! These are the persisted names; keep them stable.
//! Usage: `layer.attrs.get_float(A_X_SCALE)`

// === Identity ===
/// Layer title shown in the layer list
pub const A_TITLE: &str = "title";
/// Raster path, relative to the session file when possible
pub const A_FILEPATH: &str = "filepath";

// === Transform ===
/// Map units per pixel along the raster width
pub const A_X_SCALE: &str = "xScale";
/// Map units per pixel along the raster height
pub const A_Y_SCALE: &str = "yScale";
/// Clockwise rotation in degrees
pub const A_ROTATION: &str = "rotation";
/// Center X in map units
pub const A_X_CENTER: &str = "xCenter";
/// Center Y in map units
pub const A_Y_CENTER: &str = "yCenter";

// === Appearance ===
/// Transparency percentage, 0..=100
pub const A_TRANSPARENCY: &str = "transparency";
/// Blend mode name (e.g. "SourceOver")
pub const A_BLEND_MODE: &str = "blendMode";

// === CRS ===
/// Identifier of the CRS the transform is expressed in
pub const A_CRS: &str = "crs";
/// Follow map CRS changes by reprojecting the transform
pub const A_TRACKS_MAP_CRS: &str = "tracksMapCrs";
