//! Tool registry - decodes and dispatches tool calls
//!
//! The single public contract for a planner: `execute_tool(call)` always
//! yields a [`ToolObservation`]. Names are matched against the closed
//! [`Tool`] set, arguments are decoded into an [`Action`] (locators lose any
//! raw selector on the way), and the page agent runs it under policy and
//! audit. No error crosses this boundary.

use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::automation::action::{Action, ActionKind, WaitCondition};
use crate::automation::agent::{PageAgent, DEFAULT_OBSERVE_SAMPLE, MAX_OBSERVE_SAMPLE};
use crate::automation::locator::{Locator, ScrollDirection};
use crate::core::{PilotError, Result, ToolCall, ToolDefinition, ToolObservation};

/// Every tool a planner may call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
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

impl Tool {
    pub const ALL: [Tool; 12] = [
        Tool::Navigate,
        Tool::FindElements,
        Tool::Observe,
        Tool::Click,
        Tool::TypeText,
        Tool::Scroll,
        Tool::Select,
        Tool::WaitFor,
        Tool::Extract,
        Tool::SwitchTab,
        Tool::AskUser,
        Tool::Snapshot,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Tool::Navigate => "navigate",
            Tool::FindElements => "findElements",
            Tool::Observe => "observe",
            Tool::Click => "click",
            Tool::TypeText => "typeText",
            Tool::Scroll => "scroll",
            Tool::Select => "select",
            Tool::WaitFor => "waitFor",
            Tool::Extract => "extract",
            Tool::SwitchTab => "switchTab",
            Tool::AskUser => "askUser",
            Tool::Snapshot => "snapshot",
        }
    }

    /// Action kind the tool decodes into
    pub fn kind(&self) -> ActionKind {
        match self {
            Tool::Navigate => ActionKind::Navigate,
            Tool::FindElements => ActionKind::FindElements,
            Tool::Observe => ActionKind::Observe,
            Tool::Click => ActionKind::Click,
            Tool::TypeText => ActionKind::TypeText,
            Tool::Scroll => ActionKind::Scroll,
            Tool::Select => ActionKind::Select,
            Tool::WaitFor => ActionKind::WaitFor,
            Tool::Extract => ActionKind::Extract,
            Tool::SwitchTab => ActionKind::SwitchTab,
            Tool::AskUser => ActionKind::AskUser,
            Tool::Snapshot => ActionKind::Snapshot,
        }
    }

    /// Exact, case-sensitive lookup
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tool| tool.name() == name)
    }

    /// JSON-schema definition handed to a planner
    pub fn definition(&self) -> ToolDefinition {
        match self {
            Tool::Navigate => ToolDefinition::function(
                "navigate",
                "Load a URL in the current tab (http, https, file or about)",
                json!({
                    "type": "object",
                    "properties": {
                        "url": {
                            "type": "string",
                            "description": "Absolute URL to load"
                        }
                    },
                    "required": ["url"]
                }),
            ),
            Tool::FindElements => ToolDefinition::function(
                "findElements",
                "Find elements matching a semantic locator. Without a locator, lists the page's interactive elements.",
                json!({
                    "type": "object",
                    "properties": {
                        "locator": locator_schema()
                    }
                }),
            ),
            Tool::Observe => ToolDefinition::function(
                "observe",
                "Summarize the page: a sample of buttons, links, textboxes, comboboxes and checkboxes, each with the locator that finds them",
                json!({
                    "type": "object",
                    "properties": {
                        "sample": {
                            "type": "integer",
                            "minimum": 1,
                            "maximum": MAX_OBSERVE_SAMPLE,
                            "description": format!("Elements per category (default {})", DEFAULT_OBSERVE_SAMPLE)
                        }
                    }
                }),
            ),
            Tool::Click => ToolDefinition::function(
                "click",
                "Click the first visible element matching the locator",
                json!({
                    "type": "object",
                    "properties": {
                        "locator": locator_schema()
                    },
                    "required": ["locator"]
                }),
            ),
            Tool::TypeText => ToolDefinition::function(
                "typeText",
                "Type text into an input. Without a locator the first textbox is used. Password and other credential fields are refused.",
                json!({
                    "type": "object",
                    "properties": {
                        "locator": locator_schema(),
                        "text": {
                            "type": "string",
                            "description": "Text to enter; replaces the current value"
                        },
                        "submit": {
                            "type": "boolean",
                            "description": "Press Enter and submit the form afterwards"
                        }
                    },
                    "required": ["text"]
                }),
            ),
            Tool::Scroll => ToolDefinition::function(
                "scroll",
                "Scroll the page, or the element matching the locator",
                json!({
                    "type": "object",
                    "properties": {
                        "locator": locator_schema(),
                        "direction": {
                            "type": "string",
                            "enum": ["up", "down", "left", "right"]
                        },
                        "amountPx": {
                            "type": "integer",
                            "description": "Distance in CSS pixels (default: most of the viewport)"
                        }
                    }
                }),
            ),
            Tool::Select => ToolDefinition::function(
                "select",
                "Choose an option of a select element by value or label",
                json!({
                    "type": "object",
                    "properties": {
                        "locator": locator_schema(),
                        "value": {
                            "type": "string",
                            "description": "Option value or visible label"
                        }
                    },
                    "required": ["locator", "value"]
                }),
            ),
            Tool::WaitFor => ToolDefinition::function(
                "waitFor",
                "Wait for a delay, a document ready state, a visible selector or network idle",
                json!({
                    "type": "object",
                    "properties": {
                        "delayMs": {"type": "integer"},
                        "readyState": {"type": "string", "enum": ["interactive", "complete"]},
                        "selector": {"type": "string"},
                        "networkIdle": {"type": "boolean"},
                        "timeoutMs": {
                            "type": "integer",
                            "description": "Total budget for the wait"
                        }
                    }
                }),
            ),
            Tool::Extract => ToolDefinition::function(
                "extract",
                "Read the visible text of an element, or of the whole page",
                json!({
                    "type": "object",
                    "properties": {
                        "locator": locator_schema(),
                        "maxLength": {"type": "integer", "minimum": 1}
                    }
                }),
            ),
            Tool::SwitchTab => ToolDefinition::function(
                "switchTab",
                "Bring another tab to the front",
                json!({
                    "type": "object",
                    "properties": {
                        "target": {
                            "type": ["string", "integer"],
                            "description": "Tab index or identifier"
                        }
                    },
                    "required": ["target"]
                }),
            ),
            Tool::AskUser => ToolDefinition::function(
                "askUser",
                "Ask the user a question. Use it to get consent when an action is denied by policy; approval allows one retry.",
                json!({
                    "type": "object",
                    "properties": {
                        "question": {"type": "string"},
                        "choices": {
                            "type": "array",
                            "items": {"type": "string"},
                            "description": "Options to pick from; the first one means consent (default: Allow, Deny)"
                        },
                        "timeoutMs": {"type": "integer"}
                    },
                    "required": ["question"]
                }),
            ),
            Tool::Snapshot => ToolDefinition::function(
                "snapshot",
                "Capture a PNG of the viewport, or of one element, as base64",
                json!({
                    "type": "object",
                    "properties": {
                        "locator": locator_schema()
                    }
                }),
            ),
        }
    }
}

fn locator_schema() -> Value {
    json!({
        "type": "object",
        "description": "Semantic element locator",
        "properties": {
            "role": {"type": "string", "description": "ARIA role, e.g. button, link, textbox"},
            "name": {"type": "string", "description": "Accessible name substring"},
            "text": {"type": "string", "description": "Visible text substring"},
            "near": {"type": "string", "description": "Text of a nearby label or heading"},
            "nth": {"type": "integer", "minimum": 0, "description": "Pick the nth match"}
        }
    })
}

/// Dispatcher for one tab
pub struct ToolRegistry {
    agent: Arc<PageAgent>,
    /// One tool call at a time per tab
    busy: Mutex<()>,
}

impl ToolRegistry {
    pub fn new(agent: Arc<PageAgent>) -> Self {
        Self {
            agent,
            busy: Mutex::new(()),
        }
    }

    pub fn agent(&self) -> &PageAgent {
        &self.agent
    }

    /// Get all tool definitions
    pub fn definitions() -> Vec<ToolDefinition> {
        Tool::ALL.iter().map(Tool::definition).collect()
    }

    /// Execute a tool call
    pub async fn execute_tool(&self, call: &ToolCall) -> ToolObservation {
        let Some(tool) = Tool::from_name(&call.name) else {
            warn!("Unknown tool: {}", call.name);
            return ToolObservation::failure(&call.name, PilotError::UnknownTool(call.name.clone()).to_string());
        };

        let _turn = self.busy.lock().await;
        info!("Tool call: {}", tool.name());

        let action = match decode_action(tool, call) {
            Ok(action) => action,
            Err(e) => {
                self.agent
                    .record_rejected(tool.kind(), &call.arguments, &e)
                    .await;
                return ToolObservation::failure(tool.name(), e.to_string());
            }
        };

        match self.agent.perform(&action).await {
            Ok(data) => ToolObservation::success(tool.name(), data),
            Err(e) => failure_observation(tool, e),
        }
    }
}

fn failure_observation(tool: Tool, error: PilotError) -> ToolObservation {
    let observation = ToolObservation::failure(tool.name(), error.to_string());
    match (&error, tool) {
        (PilotError::PolicyDenied { .. }, _) => observation.with_data(json!({ "policyDenied": true })),
        (PilotError::ConsentTimeout | PilotError::ConsentDenied(_), Tool::AskUser) => observation
            .with_data(json!({
                "answer": null,
                "choiceIndex": null,
                "consent": false,
            })),
        _ => observation,
    }
}

/// Decode a tool call's arguments into an action
pub fn decode_action(tool: Tool, call: &ToolCall) -> Result<Action> {
    let action = match tool {
        Tool::Navigate => Action::Navigate {
            url: required_string(call, "url")?,
        },
        Tool::FindElements => Action::FindElements {
            locator: locator_arg(call)?,
        },
        Tool::Observe => Action::Observe {
            sample: call.get_u64("sample").map(|n| n as usize),
        },
        Tool::Click => Action::Click {
            locator: required_locator(call, tool)?,
        },
        Tool::TypeText => Action::TypeText {
            locator: locator_arg(call)?,
            text: required_string(call, "text")?,
            submit: call.get_bool("submit").unwrap_or(false),
        },
        Tool::Scroll => Action::Scroll {
            locator: locator_arg(call)?,
            direction: match call.get_string("direction") {
                Some(raw) => ScrollDirection::parse(&raw)
                    .ok_or_else(|| PilotError::invalid(format!("unknown scroll direction {:?}", raw)))?,
                None => ScrollDirection::default(),
            },
            amount_px: call
                .get_u64("amountPx")
                .map(|px| px.min(u32::MAX as u64) as u32),
        },
        Tool::Select => Action::Select {
            locator: required_locator(call, tool)?,
            value: required_string(call, "value")?,
        },
        Tool::WaitFor => Action::WaitFor {
            condition: WaitCondition {
                delay_ms: call.get_u64("delayMs"),
                ready_state: call.get_string("readyState"),
                selector: call.get_string("selector"),
                network_idle: call.get_bool("networkIdle").unwrap_or(false),
            },
            timeout_ms: call.get_u64("timeoutMs"),
        },
        Tool::Extract => Action::Extract {
            locator: locator_arg(call)?,
            max_length: call.get_u64("maxLength").map(|n| n as usize),
        },
        Tool::SwitchTab => Action::SwitchTab {
            target: match call.get("target") {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Number(n)) => n.to_string(),
                _ => return Err(PilotError::invalid("switchTab requires a target")),
            },
        },
        Tool::AskUser => Action::AskUser {
            question: required_string(call, "question")?,
            choices: match call.get("choices") {
                None => Vec::new(),
                Some(Value::Array(items)) => items
                    .iter()
                    .map(|item| {
                        item.as_str()
                            .map(str::to_string)
                            .ok_or_else(|| PilotError::invalid("choices must be strings"))
                    })
                    .collect::<Result<Vec<_>>>()?,
                Some(_) => return Err(PilotError::invalid("choices must be an array")),
            },
            timeout_ms: call.get_u64("timeoutMs"),
        },
        Tool::Snapshot => Action::Snapshot {
            locator: locator_arg(call)?,
        },
    };
    Ok(action)
}

fn required_string(call: &ToolCall, key: &str) -> Result<String> {
    call.get_string(key)
        .ok_or_else(|| PilotError::invalid(format!("{} requires {}", call.name, key)))
}

fn locator_arg(call: &ToolCall) -> Result<Option<Locator>> {
    match call.get("locator") {
        Some(value) => Locator::from_external(value),
        None => Ok(None),
    }
}

fn required_locator(call: &ToolCall, tool: Tool) -> Result<Locator> {
    locator_arg(call)?
        .filter(|l| !l.is_empty())
        .ok_or_else(|| PilotError::invalid(format!("{} requires a locator", tool.name())))
}
