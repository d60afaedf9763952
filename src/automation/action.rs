//! Action model
//!
//! Plain data describing what the page agent should do. Actions are built
//! per invocation (from a tool call or a plan file) and discarded after use.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::automation::locator::{Locator, ScrollDirection};

/// One step of automation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Action {
    Navigate {
        url: String,
    },
    FindElements {
        #[serde(default)]
        locator: Option<Locator>,
    },
    /// Sample the page's interactive elements by category
    Observe {
        #[serde(default)]
        sample: Option<usize>,
    },
    Click {
        locator: Locator,
    },
    TypeText {
        #[serde(default)]
        locator: Option<Locator>,
        text: String,
        #[serde(default)]
        submit: bool,
    },
    Scroll {
        #[serde(default)]
        locator: Option<Locator>,
        #[serde(default)]
        direction: ScrollDirection,
        #[serde(default)]
        amount_px: Option<u32>,
    },
    Select {
        locator: Locator,
        value: String,
    },
    WaitFor {
        #[serde(flatten)]
        condition: WaitCondition,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },
    Extract {
        #[serde(default)]
        locator: Option<Locator>,
        #[serde(default)]
        max_length: Option<usize>,
    },
    SwitchTab {
        target: String,
    },
    AskUser {
        question: String,
        #[serde(default)]
        choices: Vec<String>,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },
    Snapshot {
        #[serde(default)]
        locator: Option<Locator>,
    },
}

impl Action {
    /// Payload-free discriminant
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Navigate { .. } => ActionKind::Navigate,
            Action::FindElements { .. } => ActionKind::FindElements,
            Action::Observe { .. } => ActionKind::Observe,
            Action::Click { .. } => ActionKind::Click,
            Action::TypeText { .. } => ActionKind::TypeText,
            Action::Scroll { .. } => ActionKind::Scroll,
            Action::Select { .. } => ActionKind::Select,
            Action::WaitFor { .. } => ActionKind::WaitFor,
            Action::Extract { .. } => ActionKind::Extract,
            Action::SwitchTab { .. } => ActionKind::SwitchTab,
            Action::AskUser { .. } => ActionKind::AskUser,
            Action::Snapshot { .. } => ActionKind::Snapshot,
        }
    }

    /// Parameters as recorded in the audit log
    pub fn audit_parameters(&self) -> Value {
        let raw = serde_json::to_value(self).unwrap_or(Value::Null);
        let mut value = redact_parameters(self.kind(), raw);
        if let Value::Object(map) = &mut value {
            map.remove("type");
        }
        value
    }
}

/// Audit form of an action's parameters. Typed text never reaches the log,
/// only its length does.
pub fn redact_parameters(kind: ActionKind, mut parameters: Value) -> Value {
    if kind == ActionKind::TypeText {
        if let Value::Object(map) = &mut parameters {
            if let Some(text) = map.remove("text") {
                if let Some(text) = text.as_str() {
                    map.insert("textLength".to_string(), Value::from(text.chars().count()));
                }
            }
        }
    }
    parameters
}

/// Kind of action, used by the policy engine and the audit log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionKind {
    Navigate,
    FindElements,
    Observe,
    Click,
    TypeText,
    Scroll,
    Select,
    WaitFor,
    Extract,
    SwitchTab,
    AskUser,
    Snapshot,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Navigate => "navigate",
            ActionKind::FindElements => "findElements",
            ActionKind::Observe => "observe",
            ActionKind::Click => "click",
            ActionKind::TypeText => "typeText",
            ActionKind::Scroll => "scroll",
            ActionKind::Select => "select",
            ActionKind::WaitFor => "waitFor",
            ActionKind::Extract => "extract",
            ActionKind::SwitchTab => "switchTab",
            ActionKind::AskUser => "askUser",
            ActionKind::Snapshot => "snapshot",
        }
    }

    /// Actions that change page state and are therefore throttled
    pub fn is_throttled(&self) -> bool {
        matches!(
            self,
            ActionKind::Click | ActionKind::TypeText | ActionKind::Select | ActionKind::Scroll
        )
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What `waitFor` should wait for. Every field that is set is waited on,
/// in order: delay, ready state, selector, network idle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitCondition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_ms: Option<u64>,
    /// `"interactive"` or `"complete"`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ready_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub network_idle: bool,
}

impl WaitCondition {
    pub fn delay(ms: u64) -> Self {
        Self {
            delay_ms: Some(ms),
            ..Self::default()
        }
    }

    pub fn selector(selector: impl Into<String>) -> Self {
        Self {
            selector: Some(selector.into()),
            ..Self::default()
        }
    }

    pub fn ready_state(state: impl Into<String>) -> Self {
        Self {
            ready_state: Some(state.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.delay_ms.is_none()
            && self.ready_state.is_none()
            && self.selector.is_none()
            && !self.network_idle
    }
}

/// Viewport rectangle in CSS pixels
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// Element description returned by discovery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementSummary {
    pub id: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub visible: bool,
    #[serde(default)]
    pub bounding_box: BoundingBox,
    /// Locator that finds this element again
    #[serde(default)]
    pub locator_hint: Locator,
}

/// Upper bound on `ElementSummary::text`
pub const MAX_SUMMARY_TEXT: usize = 160;

impl ElementSummary {
    /// Enforce the text bound on data coming back from the page
    pub fn bounded(mut self) -> Self {
        if self.text.chars().count() > MAX_SUMMARY_TEXT {
            self.text = self.text.chars().take(MAX_SUMMARY_TEXT).collect();
        }
        self
    }
}

/// Result of one plan step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepOutcome {
    pub index: usize,
    pub action: ActionKind,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
