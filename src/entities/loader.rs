//! Raster loading and existing-georeference probing.
//!
//! Decoding goes through the `image` crate. Existing georeferencing is
//! read through the [`GeoreferenceProbe`] trait; the default
//! [`WorldFileProbe`] looks for sidecar world (`.pgw`, `.tfw`, `.wld`, ...)
//! and `.prj` files next to the raster.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::DynamicImage;
use log::{debug, info};

use super::geotransform::GeoTransform;
use super::transform::ImageSize;
use crate::error::{GeorefError, Result};
use crate::paths;

/// Decoded raster with fixed pixel dimensions.
///
/// Cheap to clone: the pixel buffer is shared.
#[derive(Debug, Clone)]
pub struct RasterImage {
    image: Arc<DynamicImage>,
}

impl RasterImage {
    pub fn from_image(image: DynamicImage) -> Self {
        Self { image: Arc::new(image) }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn size(&self) -> ImageSize {
        (self.width(), self.height())
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }
}

/// Image decoder
pub struct Loader;

impl Loader {
    /// Read only the pixel dimensions.
    pub fn header(path: &Path) -> Result<ImageSize> {
        if !path.exists() {
            return Err(GeorefError::MissingFile(path.to_path_buf()));
        }
        Ok(image::image_dimensions(path)?)
    }

    /// Decode a raster file.
    ///
    /// Fails with [`GeorefError::MissingFile`] when the path does not exist and
    /// [`GeorefError::Decode`] when the content is not a readable image.
    pub fn decode(path: &Path) -> Result<RasterImage> {
        if !path.exists() {
            return Err(GeorefError::MissingFile(path.to_path_buf()));
        }
        debug!("Decoding raster: {}", path.display());

        let image = image::ImageReader::open(path)?
            .with_guessed_format()?
            .decode()?;

        info!("Loaded {} ({}x{})", path.display(), image.width(), image.height());
        Ok(RasterImage::from_image(image))
    }
}

// =============================================================================
// Georeference probe
// =============================================================================

/// Reads georeferencing that already exists for a raster.
pub trait GeoreferenceProbe {
    /// Existing pixel->map matrix, if any.
    fn read_geotransform(&self, raster: &Path) -> Option<GeoTransform>;
    /// Identifier (or WKT) of the CRS the matrix is expressed in, if known.
    fn read_crs(&self, raster: &Path) -> Option<String>;
}

/// Probe that never finds georeferencing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProbe;

impl GeoreferenceProbe for NoProbe {
    fn read_geotransform(&self, _raster: &Path) -> Option<GeoTransform> {
        None
    }

    fn read_crs(&self, _raster: &Path) -> Option<String> {
        None
    }
}

/// Sidecar world file + `.prj` probe.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorldFileProbe;

impl WorldFileProbe {
    fn candidates(raster: &Path) -> Vec<PathBuf> {
        let mut out = vec![paths::world_file_path(raster)];
        if let Some(ext) = raster.extension().and_then(|e| e.to_str()) {
            out.push(raster.with_extension(format!("{}w", ext)));
        }
        out.push(raster.with_extension("wld"));
        out.dedup();
        out
    }
}

impl GeoreferenceProbe for WorldFileProbe {
    fn read_geotransform(&self, raster: &Path) -> Option<GeoTransform> {
        for candidate in Self::candidates(raster) {
            let Ok(text) = std::fs::read_to_string(&candidate) else {
                continue;
            };
            match GeoTransform::from_world_file(&text) {
                Ok(m) => {
                    debug!("World file found: {}", candidate.display());
                    return Some(m);
                }
                Err(e) => log::warn!("Ignoring {}: {}", candidate.display(), e),
            }
        }
        None
    }

    fn read_crs(&self, raster: &Path) -> Option<String> {
        let text = std::fs::read_to_string(raster.with_extension("prj")).ok()?;
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn write_png(dir: &Path, name: &str, w: u32, h: u32) -> PathBuf {
        let path = dir.join(name);
        RgbaImage::from_pixel(w, h, Rgba([10, 20, 30, 255])).save(&path).unwrap();
        path
    }

    #[test]
    fn test_decode_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(dir.path(), "scan.png", 12, 7);
        let raster = Loader::decode(&path).unwrap();
        assert_eq!(raster.size(), (12, 7));
        assert_eq!(Loader::header(&path).unwrap(), (12, 7));
    }

    #[test]
    fn test_decode_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.png");
        assert!(matches!(Loader::decode(&missing), Err(GeorefError::MissingFile(_))));

        let junk = dir.path().join("junk.png");
        std::fs::write(&junk, b"definitely not an image").unwrap();
        assert!(matches!(Loader::decode(&junk), Err(GeorefError::Decode(_))));
    }

    #[test]
    fn test_world_file_probe() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(dir.path(), "map.png", 4, 4);
        assert!(WorldFileProbe.read_geotransform(&path).is_none());

        std::fs::write(dir.path().join("map.pgw"), "2\n0\n0\n-2\n101\n199\n").unwrap();
        std::fs::write(dir.path().join("map.prj"), "EPSG:3857\n").unwrap();
        let m = WorldFileProbe.read_geotransform(&path).unwrap();
        assert_eq!(m, GeoTransform::new(100.0, 2.0, 0.0, 200.0, 0.0, -2.0));
        assert_eq!(WorldFileProbe.read_crs(&path).as_deref(), Some("EPSG:3857"));
    }

    #[test]
    fn test_world_file_probe_fallback_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(dir.path(), "map.png", 4, 4);
        std::fs::write(dir.path().join("map.wld"), "1 0 0 -1 0.5 9.5").unwrap();
        let m = WorldFileProbe.read_geotransform(&path).unwrap();
        assert_eq!(m.origin_x(), 0.0);
        assert_eq!(m.origin_y(), 10.0);
    }
}
