//! Undo history for layer transforms.
//!
//! Each committed action pushes one [`HistoryEntry`] holding the
//! pre-mutation values of exactly the fields that action changes. Undo pops
//! the newest entry and writes those values back. There is no redo.

use glam::DVec2;

use super::transform::Transform;

/// Which action produced a history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryKind {
    Move,
    Scale,
    Rotation,
    Adjust,
    TwoPointsA,
    TwoPointsB,
}

impl HistoryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryKind::Move => "move",
            HistoryKind::Scale => "scale",
            HistoryKind::Rotation => "rotation",
            HistoryKind::Adjust => "adjust",
            HistoryKind::TwoPointsA => "2pointsA",
            HistoryKind::TwoPointsB => "2pointsB",
        }
    }
}

/// Pre-mutation snapshot of the transform fields one action touches.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HistoryEntry {
    Move { center: DVec2 },
    Scale { x_scale: f64, y_scale: f64 },
    Rotation { rotation: f64, center: DVec2 },
    Adjust { center: DVec2, x_scale: f64, y_scale: f64 },
    TwoPointsA { center: DVec2 },
    TwoPointsB { rotation: f64, center: DVec2, x_scale: f64, y_scale: f64 },
}

impl HistoryEntry {
    /// Snapshot the fields `kind` will change, taken before the change.
    pub fn capture(kind: HistoryKind, t: &Transform) -> Self {
        let center = t.center();
        let (x_scale, y_scale) = (t.x_scale(), t.y_scale());
        let rotation = t.rotation();
        match kind {
            HistoryKind::Move => HistoryEntry::Move { center },
            HistoryKind::Scale => HistoryEntry::Scale { x_scale, y_scale },
            HistoryKind::Rotation => HistoryEntry::Rotation { rotation, center },
            HistoryKind::Adjust => HistoryEntry::Adjust { center, x_scale, y_scale },
            HistoryKind::TwoPointsA => HistoryEntry::TwoPointsA { center },
            HistoryKind::TwoPointsB => HistoryEntry::TwoPointsB { rotation, center, x_scale, y_scale },
        }
    }

    pub fn kind(&self) -> HistoryKind {
        match self {
            HistoryEntry::Move { .. } => HistoryKind::Move,
            HistoryEntry::Scale { .. } => HistoryKind::Scale,
            HistoryEntry::Rotation { .. } => HistoryKind::Rotation,
            HistoryEntry::Adjust { .. } => HistoryKind::Adjust,
            HistoryEntry::TwoPointsA { .. } => HistoryKind::TwoPointsA,
            HistoryEntry::TwoPointsB { .. } => HistoryKind::TwoPointsB,
        }
    }

    /// Write the saved fields back into `t`. Untouched fields stay as they are.
    pub fn restore(&self, t: &mut Transform) {
        match *self {
            HistoryEntry::Move { center } | HistoryEntry::TwoPointsA { center } => {
                t.set_center(center);
            }
            HistoryEntry::Scale { x_scale, y_scale } => t.set_scale(x_scale, y_scale),
            HistoryEntry::Rotation { rotation, center } => {
                t.set_rotation(rotation);
                t.set_center(center);
            }
            HistoryEntry::Adjust { center, x_scale, y_scale } => {
                t.set_center(center);
                t.set_scale(x_scale, y_scale);
            }
            HistoryEntry::TwoPointsB { rotation, center, x_scale, y_scale } => {
                t.set_rotation(rotation);
                t.set_center(center);
                t.set_scale(x_scale, y_scale);
            }
        }
    }
}

/// Append-only LIFO stack of entries, one per layer.
#[derive(Debug, Clone, Default)]
pub struct History {
    entries: Vec<HistoryEntry>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: HistoryEntry) {
        log::trace!("history push: {}", entry.kind().as_str());
        self.entries.push(entry);
    }

    pub fn pop(&mut self) -> Option<HistoryEntry> {
        self.entries.pop()
    }

    pub fn peek(&self) -> Option<&HistoryEntry> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Transform {
        Transform::new(DVec2::new(1.0, 2.0), 30.0, 0.5, 2.0)
    }

    #[test]
    fn test_capture_restore_only_touched_fields() {
        let before = sample();
        let entry = HistoryEntry::capture(HistoryKind::Scale, &before);

        let mut t = before;
        t.set_scale(9.0, 9.0);
        t.set_center(DVec2::new(50.0, 50.0));
        entry.restore(&mut t);

        // Scale restored, center left alone
        assert_eq!(t.x_scale(), 0.5);
        assert_eq!(t.y_scale(), 2.0);
        assert_eq!(t.center(), DVec2::new(50.0, 50.0));
    }

    #[test]
    fn test_two_points_b_restores_everything() {
        let before = sample();
        let entry = HistoryEntry::capture(HistoryKind::TwoPointsB, &before);
        let mut t = Transform::new(DVec2::new(-4.0, 8.0), 271.0, 3.0, 3.0);
        entry.restore(&mut t);
        assert_eq!(t, before);
        // Applying twice is harmless
        entry.restore(&mut t);
        assert_eq!(t, before);
    }

    #[test]
    fn test_lifo() {
        let mut h = History::new();
        assert!(h.pop().is_none());
        h.push(HistoryEntry::capture(HistoryKind::Move, &sample()));
        h.push(HistoryEntry::capture(HistoryKind::Rotation, &sample()));
        assert_eq!(h.len(), 2);
        assert_eq!(h.pop().map(|e| e.kind()), Some(HistoryKind::Rotation));
        assert_eq!(h.peek().map(|e| e.kind()), Some(HistoryKind::Move));
        h.clear();
        assert!(h.is_empty());
    }
}
