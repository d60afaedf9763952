//! Browser-backed page providers
//!
//! Wraps the agent-browser CLI as a [`PageProvider`](crate::automation::PageProvider).

mod agent_browser;

pub use agent_browser::AgentBrowserPage;
