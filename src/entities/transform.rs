//! Affine placement of a raster on the map plane.
//!
//! A raster is placed by four numbers: the map position of its center,
//! a clockwise rotation in degrees and one scale factor per image axis
//! (map units per pixel).
//!
//! ## Coordinate Spaces
//!
//! - **Map space**: +Y up, map units. Center, corners and extents live here.
//! - **Raster axes**: origin at the raster center, axes aligned with the
//!   raster's own width/height, +Y up, map units (scale already applied).
//! - **Pixel space**: origin top-left, +Y down, pixels.
//!
//! ```text
//! pixel --(- size/2, flip Y, * scale)--> raster axes --(rotate -rotation)--> + center --> map
//! ```
//!
//! Rotation sign: clockwise-positive (user convention). The rotation
//! primitive (`DVec2::from_angle`) is counter-clockwise positive, so
//! angles are negated at the boundary.

use glam::DVec2;

/// Smallest scale factor the interactive tools will produce.
/// Matches the lower bound of the numeric scale controls.
pub const MIN_SCALE: f64 = 0.001;

/// Raster size in pixels `(width, height)`.
pub type ImageSize = (u32, u32);

/// Half of the raster size in pixels.
#[inline]
fn half_pixels(size: ImageSize) -> DVec2 {
    DVec2::new(size.0 as f64 * 0.5, size.1 as f64 * 0.5)
}

/// Counter-clockwise rotor for a clockwise angle in degrees.
#[inline]
fn cw_rotor(degrees: f64) -> DVec2 {
    DVec2::from_angle(-degrees.to_radians())
}

// =============================================================================
// Extent
// =============================================================================

/// Axis-aligned rectangle in map space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    pub min: DVec2,
    pub max: DVec2,
}

impl Extent {
    /// Build from any two opposite corners.
    pub fn new(a: DVec2, b: DVec2) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Bounding box of a set of points. Empty input yields a zero-size extent at the origin.
    pub fn from_points(points: &[DVec2]) -> Self {
        let Some(first) = points.first() else {
            return Self::new(DVec2::ZERO, DVec2::ZERO);
        };
        points.iter().skip(1).fold(Self::new(*first, *first), |acc, p| Self {
            min: acc.min.min(*p),
            max: acc.max.max(*p),
        })
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    pub fn center(&self) -> DVec2 {
        (self.min + self.max) * 0.5
    }

    /// True when the rectangle has no area.
    pub fn is_empty(&self) -> bool {
        self.width() <= 0.0 || self.height() <= 0.0
    }

    pub fn contains(&self, p: DVec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }
}

// =============================================================================
// CornerSet
// =============================================================================

/// The four rotated corners of a placed raster, in map space.
///
/// Derived data: always recomputed from a [`Transform`], never stored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CornerSet {
    pub top_left: DVec2,
    pub top_right: DVec2,
    pub bottom_right: DVec2,
    pub bottom_left: DVec2,
}

impl CornerSet {
    /// Corners in TL, TR, BR, BL order.
    pub fn points(&self) -> [DVec2; 4] {
        [self.top_left, self.top_right, self.bottom_right, self.bottom_left]
    }

    /// Axis-aligned bounding box of the corners.
    pub fn extent(&self) -> Extent {
        Extent::from_points(&self.points())
    }

    /// Midpoint of the TL-BR diagonal, i.e. the rectangle center.
    pub fn center(&self) -> DVec2 {
        (self.top_left + self.bottom_right) * 0.5
    }

    fn from_local(center: DVec2, half: DVec2, rotor: DVec2) -> Self {
        let place = |local: DVec2| center + rotor.rotate(local);
        Self {
            top_left: place(DVec2::new(-half.x, half.y)),
            top_right: place(DVec2::new(half.x, half.y)),
            bottom_right: place(DVec2::new(half.x, -half.y)),
            bottom_left: place(DVec2::new(-half.x, -half.y)),
        }
    }
}

// =============================================================================
// Transform
// =============================================================================

/// Placement of a raster on the map: center, clockwise rotation, per-axis scale.
///
/// Invariants: `rotation` is in `[0, 360)`. Scales are positive; this is a
/// caller precondition (checked with `debug_assert!`), not clamped here.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    center: DVec2,
    rotation: f64,
    x_scale: f64,
    y_scale: f64,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            center: DVec2::ZERO,
            rotation: 0.0,
            x_scale: 1.0,
            y_scale: 1.0,
        }
    }
}

impl Transform {
    pub fn new(center: DVec2, rotation: f64, x_scale: f64, y_scale: f64) -> Self {
        let mut t = Self {
            center,
            rotation: 0.0,
            x_scale: 1.0,
            y_scale: 1.0,
        };
        t.set_rotation(rotation);
        t.set_scale(x_scale, y_scale);
        t
    }

    pub fn center(&self) -> DVec2 {
        self.center
    }

    /// Clockwise rotation in degrees, `[0, 360)`.
    pub fn rotation(&self) -> f64 {
        self.rotation
    }

    pub fn x_scale(&self) -> f64 {
        self.x_scale
    }

    pub fn y_scale(&self) -> f64 {
        self.y_scale
    }

    pub fn scale(&self) -> DVec2 {
        DVec2::new(self.x_scale, self.y_scale)
    }

    /// Replace both scale factors.
    ///
    /// Precondition: both factors are strictly positive.
    pub fn set_scale(&mut self, x_scale: f64, y_scale: f64) {
        debug_assert!(x_scale > 0.0 && y_scale > 0.0, "scale must be positive: {x_scale}, {y_scale}");
        self.x_scale = x_scale;
        self.y_scale = y_scale;
    }

    /// Set rotation, normalized into `[0, 360)`.
    pub fn set_rotation(&mut self, degrees: f64) {
        debug_assert!(degrees.is_finite());
        self.rotation = normalize_degrees(degrees);
    }

    pub fn set_center(&mut self, center: DVec2) {
        self.center = center;
    }

    /// Rotated corners of a raster of `size` pixels.
    pub fn corner_coordinates(&self, size: ImageSize) -> CornerSet {
        CornerSet::from_local(self.center, half_pixels(size) * self.scale(), cw_rotor(self.rotation))
    }

    /// Axis-aligned bounding box of [`corner_coordinates`](Self::corner_coordinates).
    pub fn extent(&self, size: ImageSize) -> Extent {
        self.corner_coordinates(size).extent()
    }

    /// Corners after a gesture that holds `pivot` fixed.
    ///
    /// `delta_rotation` (degrees, clockwise) and the factors apply on top of
    /// the current rotation and scale:
    /// - the pivot->center vector is scaled by `(x_factor, y_factor)` along
    ///   the raster's own axes, then rotated by `delta_rotation`;
    /// - the rectangle, sized by `scale * factor`, is rotated by the total
    ///   rotation `rotation + delta_rotation`;
    /// - everything is re-anchored on `pivot`.
    pub fn point_transform_from_pivot(
        &self,
        size: ImageSize,
        pivot: DVec2,
        delta_rotation: f64,
        x_factor: f64,
        y_factor: f64,
    ) -> CornerSet {
        let factors = DVec2::new(x_factor, y_factor);
        let local_center = self.to_raster_axes(self.center - pivot) * factors;

        let total = cw_rotor(self.rotation + delta_rotation);
        let new_center = pivot + total.rotate(local_center);
        let half = half_pixels(size) * self.scale() * factors;

        CornerSet::from_local(new_center, half, total)
    }

    /// Center implied by [`point_transform_from_pivot`](Self::point_transform_from_pivot):
    /// midpoint of the resulting TL and BR corners.
    pub fn recenter_from_pivot(
        &self,
        size: ImageSize,
        pivot: DVec2,
        delta_rotation: f64,
        x_factor: f64,
        y_factor: f64,
    ) -> DVec2 {
        self.point_transform_from_pivot(size, pivot, delta_rotation, x_factor, y_factor)
            .center()
    }

    /// Full transform after a pivot gesture: recentered, rotated, rescaled.
    pub fn transformed_about(
        &self,
        size: ImageSize,
        pivot: DVec2,
        delta_rotation: f64,
        x_factor: f64,
        y_factor: f64,
    ) -> Transform {
        let center = self.recenter_from_pivot(size, pivot, delta_rotation, x_factor, y_factor);
        Transform::new(
            center,
            self.rotation + delta_rotation,
            self.x_scale * x_factor,
            self.y_scale * y_factor,
        )
    }

    // === Point conversions ===

    /// Map-space vector -> raster axes (undo rotation only).
    #[inline]
    pub fn to_raster_axes(&self, v: DVec2) -> DVec2 {
        cw_rotor(-self.rotation).rotate(v)
    }

    /// Raster-axes vector -> map-space vector (apply rotation only).
    #[inline]
    pub fn from_raster_axes(&self, v: DVec2) -> DVec2 {
        cw_rotor(self.rotation).rotate(v)
    }

    /// Pixel position (top-left origin, +Y down) -> map point.
    pub fn pixel_to_map(&self, size: ImageSize, px: DVec2) -> DVec2 {
        let half = half_pixels(size);
        let local = DVec2::new(px.x - half.x, half.y - px.y) * self.scale();
        self.center + self.from_raster_axes(local)
    }

    /// Map point -> pixel position. Inverse of [`pixel_to_map`](Self::pixel_to_map).
    pub fn map_to_pixel(&self, size: ImageSize, p: DVec2) -> DVec2 {
        let half = half_pixels(size);
        let local = self.to_raster_axes(p - self.center) / self.scale();
        DVec2::new(local.x + half.x, half.y - local.y)
    }
}

/// Wrap degrees into `[0, 360)`.
#[inline]
pub fn normalize_degrees(degrees: f64) -> f64 {
    let r = degrees.rem_euclid(360.0);
    // rem_euclid rounds tiny negatives up to exactly 360
    if r >= 360.0 { 0.0 } else { r }
}

/// Clockwise angle in degrees that turns direction `from` onto direction `to`.
pub fn cw_angle_between(from: DVec2, to: DVec2) -> f64 {
    -from.angle_to(to).to_degrees()
}
