//! Interactive map tools turning pointer gestures into layer commits.

pub mod adjust_tool;
pub mod move_tool;
pub mod rotate_tool;
pub mod scale_tool;
pub mod tool;
pub mod two_point_tool;

pub use tool::{ActiveTool, Commit, MapTool, Modifiers, Preview, ToolMode};
pub use two_point_tool::solve_two_points;
