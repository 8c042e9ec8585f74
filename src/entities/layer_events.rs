//! Layer events for repaint, dirty tracking and UI sync.
//!
//! All of these are fire-and-forget notifications emitted through the
//! session [`EventBus`](crate::core::event_bus::EventBus). The core never
//! waits on a handler.
//!
//! ## [`RepaintRequestedEvent`]
//! A layer's committed or provisional placement changed and the map needs
//! to be redrawn.
//!
//! ## [`TransformParametersChangedEvent`]
//! A commit or undo changed rotation/scale. Numeric controls listen to
//! this to refresh their displayed values.
//!
//! ## [`ProjectDirtyEvent`]
//! Session content changed since the last save.

use uuid::Uuid;

use super::transform::Transform;

// === Layer State Events ===

#[derive(Clone, Debug)]
pub struct RepaintRequestedEvent {
    pub layer_id: Uuid,
}

#[derive(Clone, Debug)]
pub struct TransformParametersChangedEvent {
    pub layer_id: Uuid,
    pub transform: Transform,
}

#[derive(Clone, Debug)]
pub struct ProjectDirtyEvent;

// === Registry Events ===

#[derive(Clone, Debug)]
pub struct LayerAddedEvent {
    pub layer_id: Uuid,
}

#[derive(Clone, Debug)]
pub struct LayerRemovedEvent {
    pub layer_id: Uuid,
}

#[derive(Clone, Debug)]
pub struct ActiveLayerChangedEvent {
    pub layer_id: Option<Uuid>,
}

// === User Notices ===

/// Severity of a status message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageLevel {
    Info,
    Warning,
    Critical,
}

/// Transient notice for the user (message bar / status line).
#[derive(Clone, Debug)]
pub struct StatusMessageEvent {
    pub title: String,
    pub text: String,
    pub level: MessageLevel,
    /// Suggested display time in seconds
    pub duration: u32,
}

impl StatusMessageEvent {
    pub fn info(title: &str, text: &str) -> Self {
        Self {
            title: title.to_string(),
            text: text.to_string(),
            level: MessageLevel::Info,
            duration: 3,
        }
    }

    pub fn warning(title: &str, text: &str) -> Self {
        Self {
            title: title.to_string(),
            text: text.to_string(),
            level: MessageLevel::Warning,
            duration: 5,
        }
    }

    pub fn critical(title: &str, text: &str) -> Self {
        Self {
            title: title.to_string(),
            text: text.to_string(),
            level: MessageLevel::Critical,
            duration: 0,
        }
    }
}
