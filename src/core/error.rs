//! Custom error types for pagepilot
//!
//! Provides a unified error handling system across all modules. The tool
//! registry converts every variant into a failed observation, so none of
//! these ever reach a planner as an error.

use thiserror::Error;

/// Main error type for pagepilot operations
#[derive(Error, Debug)]
pub enum PilotError {
    /// Malformed or missing tool arguments
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// Tool name outside the closed set
    #[error("unknown tool")]
    UnknownTool(String),

    /// No element (or no usable element) matched the locator
    #[error("{0}")]
    LocatorNotFound(String),

    /// The permission policy refused the action
    #[error("policy denied: {reason}")]
    PolicyDenied { reason: String },

    /// A script evaluation did not answer in time
    #[error("bridge timeout: {0}")]
    BridgeTimeout(String),

    /// The in-page runtime never became ready
    #[error("page runtime not ready after {0} ms")]
    RuntimeNotReady(u64),

    /// Nobody answered a consent prompt before its deadline
    #[error("consent request timed out")]
    ConsentTimeout,

    /// The user (or the absence of a consent surface) declined
    #[error("consent denied: {0}")]
    ConsentDenied(String),

    /// Page provider failures (navigation, evaluation, capture)
    #[error("page error: {0}")]
    Page(String),

    /// Audit log load or persist failures
    #[error("audit log error: {0}")]
    Audit(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Agent-browser not installed
    #[error("agent-browser not found. Install with: npm install -g agent-browser && agent-browser install")]
    AgentBrowserNotFound,

    /// Generic error for other cases
    #[error("{0}")]
    Other(String),
}

/// Convenience Result type for pagepilot operations
pub type Result<T> = std::result::Result<T, PilotError>;

impl PilotError {
    /// Create an invalid-arguments error
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArguments(msg.into())
    }

    /// Create a locator-not-found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::LocatorNotFound(msg.into())
    }

    /// Create a policy denial
    pub fn denied(reason: impl Into<String>) -> Self {
        Self::PolicyDenied {
            reason: reason.into(),
        }
    }

    /// Create a page provider error
    pub fn page(msg: impl Into<String>) -> Self {
        Self::Page(msg.into())
    }

    /// Create an audit error
    pub fn audit(msg: impl Into<String>) -> Self {
        Self::Audit(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether this is a policy denial (the caller may escalate via consent)
    pub fn is_policy_denial(&self) -> bool {
        matches!(self, Self::PolicyDenied { .. })
    }
}
