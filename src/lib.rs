//! pagepilot - guarded page automation for planners
//!
//! Lets an external planner (typically an LLM) drive a web page through a
//! closed set of semantic tools, with a permission policy, a consent gate
//! and an audit trail between the planner and the page.
//!
//! # Architecture
//!
//! - **Core**: Shared wire types, configuration, errors and logging
//! - **Automation**: Locators and actions, policy, audit log, consent, the
//!   in-page runtime with its bridge, and the per-tab page agent
//! - **Tools**: The tool registry and the agent-browser page provider
//! - **CLI**: Session wiring, REPL and terminal consent prompt
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use pagepilot::automation::{AuditLog, ConsentBroker, PageAgent, PermissionPolicy};
//! use pagepilot::tools::{browser::AgentBrowserPage, ToolRegistry};
//! use pagepilot::{Config, ToolCall};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::load();
//!     let agent = PageAgent::new(
//!         Arc::new(AgentBrowserPage::from_config(&config.browser)),
//!         &config,
//!         PermissionPolicy::from_config(&config.policy),
//!         Arc::new(AuditLog::open(config.audit_path()).unwrap()),
//!         Arc::new(ConsentBroker::unattended()),
//!     );
//!     let registry = ToolRegistry::new(Arc::new(agent));
//!
//!     let call = ToolCall::new("navigate", serde_json::json!({"url": "https://example.com"}));
//!     let observation = registry.execute_tool(&call).await;
//!     println!("{:?}", observation);
//! }
//! ```

pub mod automation;
pub mod cli;
pub mod core;
pub mod tools;

// Re-export commonly used items
pub use automation::PageAgent;
pub use cli::Repl;
pub use core::{Config, PilotError, Result, ToolCall, ToolObservation};
pub use tools::ToolRegistry;
