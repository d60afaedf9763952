//! Host-side description of the in-page runtime
//!
//! The script itself lives in `runtime.js`. This module names its entry
//! points so the bridge can only ever call functions that exist.

/// Script that installs the runtime into a document
pub const RUNTIME_SCRIPT: &str = include_str!("runtime.js");

/// Global the runtime installs itself under
pub const RUNTIME_GLOBAL: &str = "__pagepilot";

/// Version reported by `ping`
pub const RUNTIME_VERSION: u64 = 1;

/// Entry points of the in-page runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuntimeCall {
    Ping,
    FindElements,
    Click,
    TypeText,
    Select,
    Scroll,
    WaitFor,
    Extract,
    Rect,
}

impl RuntimeCall {
    /// Every entry point; readiness requires all of them
    pub const ALL: [RuntimeCall; 9] = [
        RuntimeCall::Ping,
        RuntimeCall::FindElements,
        RuntimeCall::Click,
        RuntimeCall::TypeText,
        RuntimeCall::Select,
        RuntimeCall::Scroll,
        RuntimeCall::WaitFor,
        RuntimeCall::Extract,
        RuntimeCall::Rect,
    ];

    /// Function name inside the runtime namespace
    pub fn function_name(&self) -> &'static str {
        match self {
            RuntimeCall::Ping => "ping",
            RuntimeCall::FindElements => "findElements",
            RuntimeCall::Click => "click",
            RuntimeCall::TypeText => "typeText",
            RuntimeCall::Select => "select",
            RuntimeCall::Scroll => "scroll",
            RuntimeCall::WaitFor => "waitFor",
            RuntimeCall::Extract => "extract",
            RuntimeCall::Rect => "rect",
        }
    }

    pub fn from_function_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|call| call.function_name() == name)
    }
}
