//! CLI module - command-line interface
//!
//! Contains the REPL, command parsing, session wiring, shared terminal
//! input and the terminal consent prompt.

pub mod commands;
pub mod consent;
pub mod input;
pub mod repl;
pub mod session;

pub use input::LineSource;
pub use repl::Repl;
pub use session::Session;
