//! Page automation
//!
//! Data model, policy, audit trail, in-page runtime and the per-tab agent
//! that ties them together.

pub mod action;
pub mod agent;
pub mod audit;
pub mod bridge;
pub mod consent;
pub mod locator;
pub mod page;
pub mod policy;
pub mod retry;
pub mod runtime;

#[cfg(test)]
pub(crate) mod testing;

pub use action::{Action, ActionKind, BoundingBox, ElementSummary, StepOutcome, WaitCondition};
pub use agent::PageAgent;
pub use audit::{AuditEntry, AuditLog};
pub use bridge::{ExecutionBridge, RuntimeReply};
pub use consent::{ConsentBroker, ConsentRequest, ConsentResolution, ConsentResponse};
pub use locator::{Locator, ScrollDirection};
pub use page::PageProvider;
pub use policy::{PermissionPolicy, PolicyDecision};
pub use retry::RetryPolicy;
