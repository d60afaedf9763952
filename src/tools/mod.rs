//! Tools module - the planner-facing surface
//!
//! The tool registry and the browser-backed page providers it drives.

pub mod browser;
pub mod registry;

pub use registry::{Tool, ToolRegistry};
