//! World file export.
//!
//! Writes the placement of a layer as a world file next to an output raster
//! path and, unless only the world file is wanted, puts the raster there too:
//! a byte copy when the format is unchanged, a re-encode otherwise. Pixels are
//! never resampled. Without rotation in the world file the matrix covers the
//! bounding box of the rotated footprint, so the raster is stretched over it.

use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::entities::geotransform::GeoTransform;
use crate::entities::layer::GeorefLayer;
use crate::error::{GeorefError, Result};
use crate::paths;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportOptions {
    /// Full affine matrix; otherwise an axis-aligned bounding-box matrix
    pub rotation_in_world_file: bool,
    /// Write only the world file (and `.prj`), not the raster
    pub world_file_only: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            rotation_in_world_file: true,
            world_file_only: false,
        }
    }
}

/// Files written by an export.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportReport {
    pub raster: Option<PathBuf>,
    pub world_file: PathBuf,
    pub prj: Option<PathBuf>,
    pub geotransform: GeoTransform,
}

/// Matrix that would be written for `layer`.
pub fn export_geotransform(layer: &GeorefLayer, options: &ExportOptions) -> Result<GeoTransform> {
    let (size, extent) = match (layer.is_ready(), layer.size(), layer.extent()) {
        (true, Some(size), Some(extent)) => (size, extent),
        _ => return Err(GeorefError::LayerNotReady(layer.title().to_string())),
    };
    Ok(if options.rotation_in_world_file {
        GeoTransform::compose(layer.transform(), size)
    } else {
        GeoTransform::scale_only(&extent, size)
    })
}

/// Export `layer` to `output` (the raster path; sidecars are derived from it).
pub fn export_georef_raster(layer: &GeorefLayer, output: &Path, options: &ExportOptions) -> Result<ExportReport> {
    let geotransform = export_geotransform(layer, options)?;

    let raster = if options.world_file_only {
        None
    } else {
        write_raster(layer, output)?;
        Some(output.to_path_buf())
    };

    let world_file = paths::world_file_path(output);
    std::fs::write(&world_file, geotransform.to_world_file())?;
    debug!("World file written: {}", world_file.display());

    let prj = match layer.crs() {
        Some(crs) => {
            let prj = output.with_extension("prj");
            std::fs::write(&prj, format!("{}\n", crs))?;
            Some(prj)
        }
        None => None,
    };

    info!("Exported '{}' to {}", layer.title(), output.display());
    Ok(ExportReport {
        raster,
        world_file,
        prj,
        geotransform,
    })
}

fn same_extension(a: &Path, b: &Path) -> bool {
    match (a.extension().and_then(|e| e.to_str()), b.extension().and_then(|e| e.to_str())) {
        (Some(x), Some(y)) => x.eq_ignore_ascii_case(y),
        _ => false,
    }
}

fn write_raster(layer: &GeorefLayer, output: &Path) -> Result<()> {
    if let Some(source) = layer.absolute_path().filter(|src| same_extension(src, output)) {
        if source == output {
            debug!("Export target is the source raster, not copying");
            return Ok(());
        }
        std::fs::copy(source, output)?;
        return Ok(());
    }

    let image = layer
        .image()
        .ok_or_else(|| GeorefError::LayerNotReady(layer.title().to_string()))?;
    image
        .image()
        .save(output)
        .map_err(|e| GeorefError::Encode(format!("{}: {}", output.display(), e)))
}
