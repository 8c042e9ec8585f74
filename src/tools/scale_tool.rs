//! Scale tool.
//!
//! Scales about the raster center. The factor on each raster axis is the
//! ratio of the pointer's distance from the center to the press point's
//! distance, both measured along that axis. Shift uses the plain distance
//! ratio on both axes and keeps the aspect ratio.

use glam::DVec2;

use super::tool::{Commit, Gesture, MapTool, Modifiers, Preview, ToolMode};
use crate::entities::history::HistoryKind;
use crate::entities::layer::GeorefLayer;
use crate::entities::transform::MIN_SCALE;

/// Press closer than this to the center along an axis leaves that axis alone.
const MIN_ARM: f64 = 1e-9;

#[derive(Debug, Clone, Default)]
pub struct ScaleTool {
    gesture: Option<Gesture>,
}

fn axis_ratio(from: f64, to: f64) -> f64 {
    if from.abs() < MIN_ARM {
        1.0
    } else {
        to.abs() / from.abs()
    }
}

impl MapTool for ScaleTool {
    fn mode(&self) -> ToolMode {
        ToolMode::Scale
    }

    fn press(&mut self, layer: &GeorefLayer, point: DVec2, _modifiers: Modifiers) {
        self.gesture = Gesture::begin(layer, point);
    }

    fn drag(&mut self, _layer: &GeorefLayer, point: DVec2, modifiers: Modifiers) {
        let Some(g) = self.gesture.as_mut() else {
            return;
        };
        g.current = point;
        let base = g.baseline;
        let center = base.center();

        let (fx, fy) = if modifiers.shift {
            let f = axis_ratio((g.press - center).length(), (point - center).length());
            (f, f)
        } else {
            let from = base.to_raster_axes(g.press - center);
            let to = base.to_raster_axes(point - center);
            (axis_ratio(from.x, to.x), axis_ratio(from.y, to.y))
        };
        let fx = fx.max(MIN_SCALE / base.x_scale());
        let fy = fy.max(MIN_SCALE / base.y_scale());

        g.provisional = base.transformed_about(g.size, center, 0.0, fx, fy);
    }

    fn release(&mut self, layer: &GeorefLayer, point: DVec2, modifiers: Modifiers) -> Option<Commit> {
        self.drag(layer, point, modifiers);
        self.gesture.take()?.finish(HistoryKind::Scale)
    }

    fn reset(&mut self) {
        self.gesture = None;
    }

    fn preview(&self) -> Option<Preview> {
        self.gesture.as_ref().map(Gesture::preview)
    }
}
