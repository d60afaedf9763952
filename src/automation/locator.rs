//! Semantic element locators
//!
//! A locator describes an element by role, accessible name, visible text and
//! position instead of by selector. Callers may still put `css`/`xpath` on
//! the wire; decoding drops them, and `Locator` has nowhere to keep them, so
//! no selector from outside ever reaches the page.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::{PilotError, Result};

/// Description of the element(s) to act on
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "WireLocator")]
pub struct Locator {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Text of a nearby landmark, used as a tie breaker in the page
    #[serde(skip_serializing_if = "Option::is_none")]
    pub near: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nth: Option<usize>,
}

/// Everything a caller may put on the wire, selectors included.
#[derive(Debug, Default, Deserialize)]
struct WireLocator {
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    near: Option<String>,
    #[serde(default)]
    nth: Option<usize>,
    #[serde(default, rename = "css")]
    _css: Option<String>,
    #[serde(default, rename = "xpath")]
    _xpath: Option<String>,
}

impl From<WireLocator> for Locator {
    fn from(wire: WireLocator) -> Self {
        Locator {
            role: clean(wire.role).map(|r| r.to_lowercase()),
            name: clean(wire.name),
            text: clean(wire.text),
            near: clean(wire.near),
            nth: wire.nth,
        }
    }
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|s| !s.trim().is_empty())
}

impl Locator {
    /// Locator matching a role
    pub fn role(role: impl Into<String>) -> Self {
        Self {
            role: Some(role.into().to_lowercase()),
            ..Self::default()
        }
    }

    /// Locator matching visible text
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    /// Decode a locator supplied by an external caller.
    ///
    /// `null` and blank strings mean "no locator". Selector fields are
    /// always discarded.
    pub fn from_external(value: &Value) -> Result<Option<Self>> {
        match value {
            Value::Null => Ok(None),
            Value::Object(_) => serde_json::from_value::<Locator>(value.clone())
                .map(Some)
                .map_err(|e| PilotError::invalid(format!("locator: {}", e))),
            Value::String(text) => Ok(clean(Some(text.clone())).map(Locator::text)),
            other => Err(PilotError::invalid(format!(
                "locator must be an object, got {}",
                other
            ))),
        }
    }

    /// True when the locator narrows the page down semantically.
    /// Blank strings do not count.
    pub fn is_semantic(&self) -> bool {
        present(&self.role) || present(&self.name) || present(&self.text) || self.nth.is_some()
    }

    /// True when nothing at all is specified
    pub fn is_empty(&self) -> bool {
        !self.is_semantic() && !present(&self.near)
    }

    /// Short human description for messages and logs
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if let Some(role) = &self.role {
            parts.push(format!("role={}", role));
        }
        if let Some(name) = &self.name {
            parts.push(format!("name=\"{}\"", name));
        }
        if let Some(text) = &self.text {
            parts.push(format!("text=\"{}\"", text));
        }
        if let Some(near) = &self.near {
            parts.push(format!("near=\"{}\"", near));
        }
        if let Some(nth) = self.nth {
            parts.push(format!("nth={}", nth));
        }
        if parts.is_empty() {
            "any element".to_string()
        } else {
            parts.join(" ")
        }
    }
}

/// Scroll direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollDirection {
    Up,
    #[default]
    Down,
    Left,
    Right,
}

impl ScrollDirection {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}
