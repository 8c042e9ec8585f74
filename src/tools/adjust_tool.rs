//! Adjust tool: drag a side or a corner of the raster.
//!
//! The press picks what is grabbed, in raster-local coordinates normalized
//! by the half-size (`±1` on the edges):
//! - within [`CORNER_ZONE`] of a corner on both axes: the two adjacent sides
//! - otherwise the side whose normalized distance from the center is largest
//!
//! The side opposite each grabbed one stays fixed. Sides that are not
//! grabbed keep their length.

use glam::DVec2;

use super::tool::{Commit, Gesture, MapTool, Modifiers, Preview, ToolMode};
use crate::entities::history::HistoryKind;
use crate::entities::layer::GeorefLayer;
use crate::entities::transform::{ImageSize, Transform, MIN_SCALE};

/// Fraction of the half-size that counts as "at the corner".
pub const CORNER_ZONE: f64 = 0.25;

/// Grabbed sides: `-1`/`+1` per raster axis (left/right, bottom/top), `0` if free.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Grab {
    pub x: i8,
    pub y: i8,
}

impl Grab {
    /// Pick the side(s) nearest to `point` on the raster placed by `t`.
    pub fn pick(t: &Transform, size: ImageSize, point: DVec2) -> Self {
        let half = half_extent(t, size);
        let n = t.to_raster_axes(point - t.center()) / half;
        let sign = |v: f64| if v < 0.0 { -1 } else { 1 };

        let near_corner = (1.0 - n.x.abs()).abs() <= CORNER_ZONE && (1.0 - n.y.abs()).abs() <= CORNER_ZONE;
        if near_corner {
            Grab { x: sign(n.x), y: sign(n.y) }
        } else if n.x.abs() >= n.y.abs() {
            Grab { x: sign(n.x), y: 0 }
        } else {
            Grab { x: 0, y: sign(n.y) }
        }
    }
}

/// Half of the raster size in map units, along the raster axes.
fn half_extent(t: &Transform, size: ImageSize) -> DVec2 {
    DVec2::new(size.0 as f64, size.1 as f64) * 0.5 * t.scale()
}

#[derive(Debug, Clone, Default)]
pub struct AdjustTool {
    gesture: Option<Gesture>,
    grab: Grab,
}

impl AdjustTool {
    pub fn grab(&self) -> Option<Grab> {
        self.gesture.map(|_| self.grab)
    }
}

impl MapTool for AdjustTool {
    fn mode(&self) -> ToolMode {
        ToolMode::Adjust
    }

    fn press(&mut self, layer: &GeorefLayer, point: DVec2, _modifiers: Modifiers) {
        self.gesture = Gesture::begin(layer, point);
        if let Some(g) = &self.gesture {
            self.grab = Grab::pick(&g.baseline, g.size, point);
            log::debug!("adjust grab: {:?}", self.grab);
        }
    }

    fn drag(&mut self, _layer: &GeorefLayer, point: DVec2, _modifiers: Modifiers) {
        let grab = self.grab;
        let Some(g) = self.gesture.as_mut() else {
            return;
        };
        g.current = point;
        let base = g.baseline;
        let half = half_extent(&base, g.size);
        let local = base.to_raster_axes(point - base.center());

        // Fixed point: middle of the opposite side, or the opposite corner
        let pivot_local = DVec2::new(-(grab.x as f64) * half.x, -(grab.y as f64) * half.y);
        let factor = |sign: i8, pointer: f64, half: f64, scale: f64| {
            if sign == 0 {
                return 1.0;
            }
            // Distance from the fixed side to the pointer over the full length
            let f = (sign as f64 * pointer + half) / (2.0 * half);
            f.max(MIN_SCALE / scale)
        };
        let fx = factor(grab.x, local.x, half.x, base.x_scale());
        let fy = factor(grab.y, local.y, half.y, base.y_scale());

        let pivot = base.center() + base.from_raster_axes(pivot_local);
        g.provisional = base.transformed_about(g.size, pivot, 0.0, fx, fy);
    }

    fn release(&mut self, layer: &GeorefLayer, point: DVec2, modifiers: Modifiers) -> Option<Commit> {
        self.drag(layer, point, modifiers);
        self.gesture.take()?.finish(HistoryKind::Adjust)
    }

    fn reset(&mut self) {
        self.gesture = None;
    }

    fn preview(&self) -> Option<Preview> {
        self.gesture.as_ref().map(Gesture::preview)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::history::HistoryEntry;
    use crate::entities::layer::tests::ready_layer;

    fn close(a: DVec2, b: DVec2) -> bool {
        (a - b).length() < 1e-9
    }

    #[test]
    fn test_pick() {
        let t = Transform::default();
        let size = (100, 50);
        assert_eq!(Grab::pick(&t, size, DVec2::new(49.0, 0.0)), Grab { x: 1, y: 0 });
        assert_eq!(Grab::pick(&t, size, DVec2::new(-10.0, -24.0)), Grab { x: 0, y: -1 });
        assert_eq!(Grab::pick(&t, size, DVec2::new(-45.0, 22.0)), Grab { x: -1, y: 1 });
        // Outside the raster still grabs the nearest side
        assert_eq!(Grab::pick(&t, size, DVec2::new(80.0, 5.0)), Grab { x: 1, y: 0 });
    }

    #[test]
    fn test_drag_right_side() {
        let dir = tempfile::tempdir().unwrap();
        let layer = ready_layer(dir.path(), 100, 50);
        let mut tool = AdjustTool::default();

        tool.press(&layer, DVec2::new(50.0, 0.0), Modifiers::NONE);
        let commit = tool.release(&layer, DVec2::new(150.0, 10.0), Modifiers::NONE).unwrap();
        let t = commit.transform;
        assert_eq!(t.scale(), DVec2::new(2.0, 1.0));
        assert!(close(t.center(), DVec2::new(50.0, 0.0)));
        // Left side unchanged
        let e = t.extent((100, 50));
        assert!((e.min.x - -50.0).abs() < 1e-9);
        assert!((e.max.x - 150.0).abs() < 1e-9);
        assert_eq!(commit.entry, HistoryEntry::Adjust { center: DVec2::ZERO, x_scale: 1.0, y_scale: 1.0 });
    }

    #[test]
    fn test_drag_corner_on_rotated_raster() {
        let dir = tempfile::tempdir().unwrap();
        let mut layer = ready_layer(dir.path(), 100, 50);
        layer.commit_with(HistoryKind::Rotation, |t| t.set_rotation(30.0));
        let base = *layer.transform();
        let before = base.corner_coordinates((100, 50));

        let mut tool = AdjustTool::default();
        tool.press(&layer, before.top_right, Modifiers::NONE);
        assert_eq!(tool.grab(), Some(Grab { x: 1, y: 1 }));

        // Pull the corner out to twice the size
        let target = base.pixel_to_map((100, 50), DVec2::new(200.0, -50.0));
        let commit = tool.release(&layer, target, Modifiers::NONE).unwrap();
        let after = commit.transform.corner_coordinates((100, 50));

        assert!((commit.transform.x_scale() - 2.0).abs() < 1e-9);
        assert!((commit.transform.y_scale() - 2.0).abs() < 1e-9);
        assert!(close(after.bottom_left, before.bottom_left));
        assert!(close(after.top_right, target));
        assert!((commit.transform.rotation() - 30.0).abs() < 1e-9);
    }
}
