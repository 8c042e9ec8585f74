//! GDAL-style geotransform codec.
//!
//! A geotransform is the 6-parameter affine matrix
//! `[origin_x, a, b, origin_y, d, e]` mapping pixel to map coordinates:
//!
//! ```text
//! map_x = origin_x + a * px + b * py
//! map_y = origin_y + d * px + e * py
//! ```
//!
//! `(px, py)` is a pixel-corner position (top-left origin, +Y down).
//! Decomposition folds shear and mirroring into the rotation angle and
//! two positive scales, so it only inverts matrices produced by
//! [`GeoTransform::compose`].

use glam::DVec2;

use super::transform::{Extent, ImageSize, Transform};
use crate::error::{GeorefError, Result};

/// 6-parameter affine pixel->map matrix in GDAL order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform(pub [f64; 6]);

impl GeoTransform {
    /// The matrix GDAL reports for a raster without georeferencing.
    pub const DEFAULT: GeoTransform = GeoTransform([0.0, 1.0, 0.0, 0.0, 0.0, 1.0]);

    pub fn new(origin_x: f64, a: f64, b: f64, origin_y: f64, d: f64, e: f64) -> Self {
        Self([origin_x, a, b, origin_y, d, e])
    }

    pub fn origin_x(&self) -> f64 {
        self.0[0]
    }

    pub fn a(&self) -> f64 {
        self.0[1]
    }

    pub fn b(&self) -> f64 {
        self.0[2]
    }

    pub fn origin_y(&self) -> f64 {
        self.0[3]
    }

    pub fn d(&self) -> f64 {
        self.0[4]
    }

    pub fn e(&self) -> f64 {
        self.0[5]
    }

    /// Map a pixel position to map coordinates.
    #[inline]
    pub fn apply(&self, px: DVec2) -> DVec2 {
        DVec2::new(
            self.origin_x() + self.a() * px.x + self.b() * px.y,
            self.origin_y() + self.d() * px.x + self.e() * px.y,
        )
    }

    /// True for the "no real georeferencing" sentinel: zero origin and unit
    /// diagonal. Such a matrix must not be decomposed.
    pub fn is_default(&self) -> bool {
        self.origin_x() == 0.0 && self.origin_y() == 0.0 && self.a() == 1.0 && self.e() == 1.0
    }

    /// Split into center / clockwise rotation / positive scales.
    ///
    /// Returns [`GeorefError::DegenerateGeotransform`] when either scale is zero.
    pub fn decompose(&self, size: ImageSize) -> Result<Transform> {
        let (a, b, d, e) = (self.a(), self.b(), self.d(), self.e());
        let x_scale = a.hypot(d);
        let y_scale = b.hypot(e);
        if !(x_scale > 0.0 && y_scale > 0.0) || !x_scale.is_finite() || !y_scale.is_finite() {
            return Err(GeorefError::DegenerateGeotransform);
        }

        let rotation = (-d).atan2(a).to_degrees();
        let pixel_center = DVec2::new(size.0 as f64 * 0.5, size.1 as f64 * 0.5);
        let center = self.apply(pixel_center);

        log::debug!(
            "decompose: rotation={:.6} scale=({:.6}, {:.6}) center=({:.3}, {:.3})",
            rotation, x_scale, y_scale, center.x, center.y
        );
        Ok(Transform::new(center, rotation, x_scale, y_scale))
    }

    /// Matrix for a placed raster. Exact inverse of [`decompose`](Self::decompose).
    pub fn compose(t: &Transform, size: ImageSize) -> Self {
        let theta = t.rotation().to_radians();
        let (sin, cos) = theta.sin_cos();
        let a = t.x_scale() * cos;
        let b = -t.y_scale() * sin;
        let d = -t.x_scale() * sin;
        let e = -t.y_scale() * cos;

        let half = DVec2::new(size.0 as f64 * 0.5, size.1 as f64 * 0.5);
        let origin_x = t.center().x - a * half.x - b * half.y;
        let origin_y = t.center().y - d * half.x - e * half.y;
        Self::new(origin_x, a, b, origin_y, d, e)
    }

    /// Axis-aligned matrix whose pixel grid covers `extent`.
    ///
    /// Rotation is folded into the scale: the raster is stretched over the
    /// bounding box of its rotated footprint.
    pub fn scale_only(extent: &Extent, size: ImageSize) -> Self {
        let a = extent.width() / size.0 as f64;
        let e = -extent.height() / size.1 as f64;
        Self::new(extent.min.x, a, 0.0, extent.max.y, 0.0, e)
    }

    // === World file text ===

    /// Render as world file text: `a, d, b, e, x, y`, one value per line.
    ///
    /// The world file origin is the center of the top-left pixel.
    pub fn to_world_file(&self) -> String {
        let x = self.origin_x() + 0.5 * self.a() + 0.5 * self.b();
        let y = self.origin_y() + 0.5 * self.d() + 0.5 * self.e();
        [self.a(), self.d(), self.b(), self.e(), x, y]
            .iter()
            .map(|v| format!("{}\n", v))
            .collect()
    }

    /// Parse world file text. Accepts any whitespace between the six values.
    pub fn from_world_file(text: &str) -> Result<Self> {
        let values = text
            .split_whitespace()
            .map(|tok| {
                tok.parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| GeorefError::WorldFile(format!("not a number: '{}'", tok)))
            })
            .collect::<Result<Vec<f64>>>()?;

        let [a, d, b, e, x, y] = values[..] else {
            return Err(GeorefError::WorldFile(format!(
                "expected 6 values, found {}",
                values.len()
            )));
        };
        let origin_x = x - 0.5 * a - 0.5 * b;
        let origin_y = y - 0.5 * d - 0.5 * e;
        Ok(Self::new(origin_x, a, b, origin_y, d, e))
    }
}
