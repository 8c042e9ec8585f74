//! Entities module - georeferencing data model
//!
//! - [`transform`]: placement of a raster on the map (center, rotation, scale)
//! - [`geotransform`]: six-coefficient affine matrix and world file text
//! - [`history`]: per-layer undo entries
//! - [`layer`]: one raster with its placement, appearance and lifecycle
//! - [`project`]: the session holding every layer and the active tool

pub mod attrs;
pub mod geotransform;
pub mod history;
pub mod keys;
pub mod layer;
pub mod layer_events;
pub mod loader;
pub mod project;
pub mod transform;

pub use attrs::{AttrValue, Attrs};
pub use geotransform::GeoTransform;
pub use history::{History, HistoryEntry, HistoryKind};
pub use layer::{BlendMode, GeorefLayer, LayerState};
pub use loader::{GeoreferenceProbe, Loader, RasterImage, WorldFileProbe};
pub use project::Session;
pub use transform::{CornerSet, Extent, ImageSize, Transform};
