//! Rotate tool.
//!
//! The angle swept by the pointer around the pivot is added to the
//! rotation. The pivot is the raster center, or with Shift held at press
//! the corner nearest to the press point.

use glam::DVec2;

use super::tool::{Commit, Gesture, MapTool, Modifiers, Preview, ToolMode};
use crate::entities::history::HistoryKind;
use crate::entities::layer::GeorefLayer;
use crate::entities::transform::cw_angle_between;

/// Pointer closer than this to the pivot does not define an angle.
const MIN_ARM: f64 = 1e-12;

#[derive(Debug, Clone, Default)]
pub struct RotateTool {
    gesture: Option<Gesture>,
    pivot: DVec2,
}

impl RotateTool {
    pub fn pivot(&self) -> Option<DVec2> {
        self.gesture.map(|_| self.pivot)
    }
}

impl MapTool for RotateTool {
    fn mode(&self) -> ToolMode {
        ToolMode::Rotate
    }

    fn press(&mut self, layer: &GeorefLayer, point: DVec2, modifiers: Modifiers) {
        self.gesture = Gesture::begin(layer, point);
        let Some(g) = self.gesture.as_ref() else {
            return;
        };
        self.pivot = if modifiers.shift {
            let corners = g.baseline.corner_coordinates(g.size).points();
            corners
                .into_iter()
                .min_by(|a, b| a.distance_squared(point).total_cmp(&b.distance_squared(point)))
                .unwrap_or(g.baseline.center())
        } else {
            g.baseline.center()
        };
        log::debug!("rotate pivot: ({:.3}, {:.3})", self.pivot.x, self.pivot.y);
    }

    fn drag(&mut self, _layer: &GeorefLayer, point: DVec2, _modifiers: Modifiers) {
        let pivot = self.pivot;
        let Some(g) = self.gesture.as_mut() else {
            return;
        };
        g.current = point;
        let (from, to) = (g.press - pivot, point - pivot);
        if from.length() < MIN_ARM || to.length() < MIN_ARM {
            g.provisional = g.baseline;
            return;
        }
        let delta = cw_angle_between(from, to);
        g.provisional = g.baseline.transformed_about(g.size, pivot, delta, 1.0, 1.0);
    }

    fn release(&mut self, layer: &GeorefLayer, point: DVec2, modifiers: Modifiers) -> Option<Commit> {
        self.drag(layer, point, modifiers);
        self.gesture.take()?.finish(HistoryKind::Rotation)
    }

    fn reset(&mut self) {
        self.gesture = None;
    }

    fn preview(&self) -> Option<Preview> {
        self.gesture.as_ref().map(Gesture::preview)
    }
}
