//! Error kinds for layer loading, geometry and export.
//!
//! Every variant is recoverable at the session level: a failing layer is
//! flagged invalid and skipped, a failed reprojection leaves the transform
//! untouched. Nothing here aborts a session.

use std::path::PathBuf;

/// Georeferencing errors
#[derive(Debug)]
pub enum GeorefError {
    /// Raster path not found at load time (after the resolver was asked)
    MissingFile(PathBuf),
    /// Image format unreadable
    Decode(String),
    /// Raster could not be written in the requested format
    Encode(String),
    /// No transform path between two coordinate reference systems
    Reprojection { from: String, to: String },
    /// Decomposed matrix implies a zero scale
    DegenerateGeotransform,
    /// World file is malformed
    WorldFile(String),
    Io(std::io::Error),
    Serialize(String),
    NoActiveLayer,
    /// Layer is not initialized or was flagged invalid
    LayerNotReady(String),
    /// Non-finite number entered in a numeric control
    InvalidValue(String),
}

impl std::fmt::Display for GeorefError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GeorefError::MissingFile(path) => write!(f, "Raster not found: {}", path.display()),
            GeorefError::Decode(e) => write!(f, "Decode error: {}", e),
            GeorefError::Encode(e) => write!(f, "Encode error: {}", e),
            GeorefError::Reprojection { from, to } => {
                write!(f, "No transformation from {} to {}", from, to)
            }
            GeorefError::DegenerateGeotransform => {
                write!(f, "Geotransform has zero scale")
            }
            GeorefError::WorldFile(e) => write!(f, "World file error: {}", e),
            GeorefError::Io(e) => write!(f, "I/O error: {}", e),
            GeorefError::Serialize(e) => write!(f, "Serialize error: {}", e),
            GeorefError::NoActiveLayer => write!(f, "No georeferencing layer is active"),
            GeorefError::LayerNotReady(title) => write!(f, "Layer '{}' is not ready", title),
            GeorefError::InvalidValue(what) => write!(f, "Invalid {} value", what),
        }
    }
}

impl std::error::Error for GeorefError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GeorefError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for GeorefError {
    fn from(e: std::io::Error) -> Self {
        GeorefError::Io(e)
    }
}

impl From<serde_json::Error> for GeorefError {
    fn from(e: serde_json::Error) -> Self {
        GeorefError::Serialize(e.to_string())
    }
}

impl From<image::ImageError> for GeorefError {
    fn from(e: image::ImageError) -> Self {
        GeorefError::Decode(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GeorefError>;
