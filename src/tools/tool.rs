//! Map tool modes and the shared gesture contract.
//!
//! Tools control how pointer input reshapes the active layer:
//! - Move: translate
//! - Rotate: turn about the center (Shift: about the nearest corner)
//! - Scale: stretch about the center (Shift: keep aspect)
//! - Adjust: drag an edge or corner, the opposite one stays put
//! - TwoPoints: pin one raster point, then rotate/scale about it
//!
//! Every tool works on a snapshot of the committed transform taken at
//! press. Drags only update a provisional transform; release hands back a
//! single [`Commit`] that the session applies to the layer in one step.

use enum_dispatch::enum_dispatch;
use glam::DVec2;

use super::adjust_tool::AdjustTool;
use super::move_tool::MoveTool;
use super::rotate_tool::RotateTool;
use super::scale_tool::ScaleTool;
use super::two_point_tool::TwoPointTool;
use crate::entities::history::{HistoryEntry, HistoryKind};
use crate::entities::layer::GeorefLayer;
use crate::entities::transform::{CornerSet, ImageSize, Transform};

/// Active tool mode for layer manipulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolMode {
    Move,      // M
    Rotate,    // R
    Scale,     // S
    Adjust,    // A
    TwoPoints, // T
}

impl ToolMode {
    /// All tool modes in toolbar order.
    pub const ALL: [ToolMode; 5] = [
        ToolMode::Move,
        ToolMode::Rotate,
        ToolMode::Scale,
        ToolMode::Adjust,
        ToolMode::TwoPoints,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolMode::Move => "move",
            ToolMode::Rotate => "rotate",
            ToolMode::Scale => "scale",
            ToolMode::Adjust => "adjust",
            ToolMode::TwoPoints => "2points",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "move" => Some(ToolMode::Move),
            "rotate" => Some(ToolMode::Rotate),
            "scale" => Some(ToolMode::Scale),
            "adjust" => Some(ToolMode::Adjust),
            "2points" => Some(ToolMode::TwoPoints),
            _ => None,
        }
    }

    /// Display name for UI.
    pub fn display_name(&self) -> &'static str {
        match self {
            ToolMode::Move => "Move",
            ToolMode::Rotate => "Rotate",
            ToolMode::Scale => "Scale",
            ToolMode::Adjust => "Adjust sides",
            ToolMode::TwoPoints => "2-points",
        }
    }

    pub fn hotkey(&self) -> &'static str {
        match self {
            ToolMode::Move => "M",
            ToolMode::Rotate => "R",
            ToolMode::Scale => "S",
            ToolMode::Adjust => "A",
            ToolMode::TwoPoints => "T",
        }
    }

    /// Fresh tool for this mode.
    pub fn create(&self) -> ActiveTool {
        match self {
            ToolMode::Move => MoveTool::default().into(),
            ToolMode::Rotate => RotateTool::default().into(),
            ToolMode::Scale => ScaleTool::default().into(),
            ToolMode::Adjust => AdjustTool::default().into(),
            ToolMode::TwoPoints => TwoPointTool::default().into(),
        }
    }
}

/// Keyboard modifiers held during a gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub shift: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers { shift: false };
    pub const SHIFT: Modifiers = Modifiers { shift: true };
}

/// Result of a finished gesture: the undo entry and the new transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Commit {
    pub entry: HistoryEntry,
    pub transform: Transform,
}

/// Provisional placement to draw while a gesture is in progress.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Preview {
    pub transform: Transform,
    pub size: ImageSize,
    /// Rubber band from the press point to the pointer
    pub guide: Option<[DVec2; 2]>,
}

impl Preview {
    pub fn corners(&self) -> CornerSet {
        self.transform.corner_coordinates(self.size)
    }
}

/// Gesture state machine for one tool.
#[enum_dispatch]
pub trait MapTool {
    fn mode(&self) -> ToolMode;

    /// Start a gesture on `layer`. Ignored when the layer is not ready.
    fn press(&mut self, layer: &GeorefLayer, point: DVec2, modifiers: Modifiers);

    /// Update the provisional transform. Never touches the layer.
    fn drag(&mut self, layer: &GeorefLayer, point: DVec2, modifiers: Modifiers);

    /// Finish the gesture. `None` when nothing changed or no gesture was active.
    fn release(&mut self, layer: &GeorefLayer, point: DVec2, modifiers: Modifiers) -> Option<Commit>;

    /// Drop any provisional state without committing.
    fn reset(&mut self);

    fn preview(&self) -> Option<Preview>;

    fn is_active(&self) -> bool {
        self.preview().is_some()
    }
}

/// Currently selected tool, one variant per mode.
#[enum_dispatch(MapTool)]
#[derive(Debug, Clone)]
pub enum ActiveTool {
    Move(MoveTool),
    Rotate(RotateTool),
    Scale(ScaleTool),
    Adjust(AdjustTool),
    TwoPoints(TwoPointTool),
}

// =============================================================================
// Gesture helper
// =============================================================================

/// Press-time snapshot shared by the tools.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gesture {
    pub size: ImageSize,
    /// Committed transform at press
    pub baseline: Transform,
    pub press: DVec2,
    pub current: DVec2,
    pub provisional: Transform,
}

impl Gesture {
    pub fn begin(layer: &GeorefLayer, press: DVec2) -> Option<Self> {
        if !layer.is_ready() {
            return None;
        }
        let size = layer.size()?;
        let baseline = *layer.transform();
        Some(Self {
            size,
            baseline,
            press,
            current: press,
            provisional: baseline,
        })
    }

    /// Commit tagged `kind`, or `None` if the placement did not change.
    pub fn finish(&self, kind: HistoryKind) -> Option<Commit> {
        if self.provisional == self.baseline {
            return None;
        }
        Some(self.commit(kind))
    }

    /// Commit tagged `kind` even when nothing moved.
    pub fn commit(&self, kind: HistoryKind) -> Commit {
        Commit {
            entry: HistoryEntry::capture(kind, &self.baseline),
            transform: self.provisional,
        }
    }

    pub fn preview(&self) -> Preview {
        Preview {
            transform: self.provisional,
            size: self.size,
            guide: Some([self.press, self.current]),
        }
    }
}
