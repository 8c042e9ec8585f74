//! Two-point tool and solver.
//!
//! Phase A: press on a raster feature, release on where it belongs on the
//! map. The raster is translated. The release point becomes the anchor.
//!
//! Phase B: press on a second raster feature, release on its map position.
//! The raster is rotated and uniformly scaled about the anchor so the second
//! feature lands on the pointer while the first stays put. The tool then
//! goes back to phase A.

use glam::DVec2;

use super::tool::{Commit, Gesture, MapTool, Modifiers, Preview, ToolMode};
use crate::entities::history::HistoryKind;
use crate::entities::layer::GeorefLayer;
use crate::entities::transform::{cw_angle_between, ImageSize, Transform, MIN_SCALE};
use crate::error::{GeorefError, Result};

/// Shorter arms than this cannot define a rotation or a ratio.
const MIN_ARM: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Phase {
    #[default]
    A,
    B { anchor: DVec2 },
}

#[derive(Debug, Clone, Default)]
pub struct TwoPointTool {
    phase: Phase,
    gesture: Option<Gesture>,
}

impl TwoPointTool {
    pub fn phase(&self) -> Phase {
        self.phase
    }
}

/// Rotation (clockwise degrees) and uniform factor taking `from` onto `to`.
fn similarity(from: DVec2, to: DVec2) -> Option<(f64, f64)> {
    if from.length() < MIN_ARM || to.length() < MIN_ARM {
        return None;
    }
    Some((cw_angle_between(from, to), to.length() / from.length()))
}

impl MapTool for TwoPointTool {
    fn mode(&self) -> ToolMode {
        ToolMode::TwoPoints
    }

    fn press(&mut self, layer: &GeorefLayer, point: DVec2, _modifiers: Modifiers) {
        self.gesture = Gesture::begin(layer, point);
    }

    fn drag(&mut self, _layer: &GeorefLayer, point: DVec2, _modifiers: Modifiers) {
        let phase = self.phase;
        let Some(g) = self.gesture.as_mut() else {
            return;
        };
        g.current = point;
        let base = g.baseline;
        g.provisional = match phase {
            Phase::A => {
                let mut t = base;
                t.set_center(base.center() + (point - g.press));
                t
            }
            Phase::B { anchor } => match similarity(g.press - anchor, point - anchor) {
                Some((delta, f)) => {
                    let f = f.max(MIN_SCALE / base.x_scale().min(base.y_scale()));
                    base.transformed_about(g.size, anchor, delta, f, f)
                }
                None => base,
            },
        };
    }

    fn release(&mut self, layer: &GeorefLayer, point: DVec2, modifiers: Modifiers) -> Option<Commit> {
        self.drag(layer, point, modifiers);
        let g = self.gesture.take()?;
        match self.phase {
            Phase::A => {
                self.phase = Phase::B { anchor: point };
                log::debug!("two points: anchor at ({:.3}, {:.3})", point.x, point.y);
                Some(g.commit(HistoryKind::TwoPointsA))
            }
            Phase::B { .. } => {
                self.phase = Phase::A;
                Some(g.commit(HistoryKind::TwoPointsB))
            }
        }
    }

    fn reset(&mut self) {
        self.gesture = None;
        self.phase = Phase::A;
    }

    fn preview(&self) -> Option<Preview> {
        let g = self.gesture.as_ref()?;
        let mut p = g.preview();
        if let Phase::B { anchor } = self.phase {
            p.guide = Some([anchor, g.current]);
        }
        Some(p)
    }
}

/// Placement of a `size` raster that puts pixel `a1` on map point `p1` and
/// pixel `a2` on `p2` exactly, with the same scale on both axes.
///
/// This is the two-pick similarity the tool performs, without the pointer.
pub fn solve_two_points(size: ImageSize, a1: DVec2, a2: DVec2, p1: DVec2, p2: DVec2) -> Result<Transform> {
    let unit = Transform::default();
    let m1 = unit.pixel_to_map(size, a1);
    let m2 = unit.pixel_to_map(size, a2);
    let (delta, f) = similarity(m2 - m1, p2 - p1).ok_or(GeorefError::DegenerateGeotransform)?;

    let mut moved = unit;
    moved.set_center(unit.center() + (p1 - m1));
    Ok(moved.transformed_about(size, p1, delta, f, f))
}
