//! Core module - shared types, configuration, and error handling

pub mod config;
pub mod error;
pub mod logging;
pub mod types;

pub use config::Config;
pub use error::{PilotError, Result};
pub use types::{FunctionDefinition, ToolCall, ToolDefinition, ToolObservation};
