//! Move tool: the raster follows the pointer.

use glam::DVec2;

use super::tool::{Commit, Gesture, MapTool, Modifiers, Preview, ToolMode};
use crate::entities::history::HistoryKind;
use crate::entities::layer::GeorefLayer;

#[derive(Debug, Clone, Default)]
pub struct MoveTool {
    gesture: Option<Gesture>,
}

impl MapTool for MoveTool {
    fn mode(&self) -> ToolMode {
        ToolMode::Move
    }

    fn press(&mut self, layer: &GeorefLayer, point: DVec2, _modifiers: Modifiers) {
        self.gesture = Gesture::begin(layer, point);
    }

    fn drag(&mut self, _layer: &GeorefLayer, point: DVec2, _modifiers: Modifiers) {
        let Some(g) = self.gesture.as_mut() else {
            return;
        };
        g.current = point;
        g.provisional = g.baseline;
        g.provisional.set_center(g.baseline.center() + (point - g.press));
    }

    fn release(&mut self, layer: &GeorefLayer, point: DVec2, modifiers: Modifiers) -> Option<Commit> {
        self.drag(layer, point, modifiers);
        self.gesture.take()?.finish(HistoryKind::Move)
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

    #[test]
    fn test_move_commit() {
        let dir = tempfile::tempdir().unwrap();
        let layer = ready_layer(dir.path(), 100, 50);
        let mut tool = MoveTool::default();

        tool.press(&layer, DVec2::new(5.0, 5.0), Modifiers::NONE);
        tool.drag(&layer, DVec2::new(15.0, 20.0), Modifiers::NONE);
        let preview = tool.preview().unwrap();
        assert_eq!(preview.transform.center(), DVec2::new(10.0, 15.0));
        // Committed transform untouched while dragging
        assert_eq!(layer.transform().center(), DVec2::ZERO);

        let commit = tool.release(&layer, DVec2::new(25.0, 35.0), Modifiers::NONE).unwrap();
        assert_eq!(commit.entry, HistoryEntry::Move { center: DVec2::ZERO });
        assert_eq!(commit.transform.center(), DVec2::new(20.0, 30.0));
        let e = commit.transform.extent(preview.size);
        assert_eq!(e.min, DVec2::new(-30.0, 5.0));
        assert_eq!(e.max, DVec2::new(70.0, 55.0));
        assert!(tool.preview().is_none());
    }

    #[test]
    fn test_click_without_motion_commits_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let layer = ready_layer(dir.path(), 10, 10);
        let mut tool = MoveTool::default();
        tool.press(&layer, DVec2::new(1.0, 1.0), Modifiers::NONE);
        assert!(tool.release(&layer, DVec2::new(1.0, 1.0), Modifiers::NONE).is_none());
    }

    #[test]
    fn test_reset_drops_gesture() {
        let dir = tempfile::tempdir().unwrap();
        let layer = ready_layer(dir.path(), 10, 10);
        let mut tool = MoveTool::default();
        tool.press(&layer, DVec2::ZERO, Modifiers::NONE);
        tool.drag(&layer, DVec2::ONE, Modifiers::NONE);
        tool.reset();
        assert!(tool.release(&layer, DVec2::new(3.0, 3.0), Modifiers::NONE).is_none());
    }
}
