//! FREEHAND - freehand raster georeferencing library
//!
//! Re-exports all modules for use by binary targets.

// Core infrastructure (events)
pub mod core;

// Data model and interaction
pub mod entities;
pub mod tools;

// Outer surfaces
pub mod cli;
pub mod config;
pub mod crs;
pub mod error;
pub mod export;
pub mod paths;
pub mod render;

// Re-export commonly used types
pub use core::event_bus::{downcast_event, BoxedEvent, EventBus};
pub use entities::{GeoTransform, GeorefLayer, Session, Transform};
pub use error::{GeorefError, Result};
pub use tools::{ActiveTool, MapTool, ToolMode};
