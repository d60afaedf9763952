//! Scripted page for unit tests
//!
//! `FakePage` implements [`PageProvider`] by decoding the scripts the bridge
//! produces and answering them from a tiny in-memory DOM, so agent and
//! registry behavior can be tested without a browser.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

use crate::automation::action::BoundingBox;
use crate::automation::bridge::readiness_script;
use crate::automation::page::PageProvider;
use crate::automation::runtime::{RuntimeCall, RUNTIME_SCRIPT, RUNTIME_VERSION};
use crate::core::{PilotError, Result};

#[derive(Debug, Clone)]
pub struct FakeElement {
    pub role: String,
    pub name: String,
    pub text: String,
    pub input_type: Option<String>,
    /// `name` attribute
    pub field_name: Option<String>,
    pub id: Option<String>,
    pub aria_label: Option<String>,
    pub autocomplete: Option<String>,
    pub style: FakeStyle,
    pub value: String,
    pub options: Vec<String>,
    /// Element is absent from the document until this instant
    pub appears_at: Option<Instant>,
}

impl FakeElement {
    fn new(role: &str, name: &str) -> Self {
        Self {
            role: role.to_string(),
            name: name.to_string(),
            text: String::new(),
            input_type: None,
            field_name: None,
            id: None,
            aria_label: None,
            autocomplete: None,
            style: FakeStyle::default(),
            value: String::new(),
            options: Vec::new(),
            appears_at: None,
        }
    }

    pub fn button(label: &str) -> Self {
        let mut el = Self::new("button", label);
        el.text = label.to_string();
        el
    }

    pub fn link(label: &str) -> Self {
        let mut el = Self::new("link", label);
        el.text = label.to_string();
        el
    }

    pub fn textbox(name: &str) -> Self {
        let mut el = Self::new("textbox", name);
        el.input_type = Some("text".into());
        el
    }

    pub fn password(name: &str) -> Self {
        let mut el = Self::new("textbox", name);
        el.input_type = Some("password".into());
        el
    }

    pub fn checkbox(name: &str) -> Self {
        Self::new("checkbox", name)
    }

    pub fn combobox(name: &str, options: &[&str]) -> Self {
        let mut el = Self::new("combobox", name);
        el.options = options.iter().map(|o| o.to_string()).collect();
        el
    }

    pub fn hidden(mut self) -> Self {
        self.style.hidden = true;
        self
    }

    pub fn styled(mut self, style: FakeStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_field_name(mut self, name: &str) -> Self {
        self.field_name = Some(name.to_string());
        self
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn with_aria_label(mut self, label: &str) -> Self {
        self.aria_label = Some(label.to_string());
        self
    }

    pub fn with_autocomplete(mut self, autocomplete: &str) -> Self {
        self.autocomplete = Some(autocomplete.to_string());
        self
    }

    pub fn is_visible(&self) -> bool {
        let style = &self.style;
        style.width > 0.0
            && style.height > 0.0
            && !style.hidden
            && style.display != "none"
            && style.visibility != "hidden"
            && style.visibility != "collapse"
            && style.opacity > 0.0
    }

    pub fn appearing_after(mut self, delay: Duration) -> Self {
        self.appears_at = Some(Instant::now() + delay);
        self
    }

    fn is_input_like(&self) -> bool {
        self.role == "textbox" || self.role == "searchbox"
    }

    /// Same credential rules the in-page runtime applies
    pub fn is_sensitive(&self) -> bool {
        if self.input_type.as_deref() == Some("password") {
            return true;
        }
        let autocomplete = self.autocomplete.as_deref().unwrap_or_default().to_lowercase();
        if autocomplete.split_whitespace().any(|t| {
            matches!(t, "current-password" | "new-password" | "one-time-code")
                || (t.len() > 3 && t.starts_with("cc-"))
        }) {
            return true;
        }
        [&self.field_name, &self.id, &self.aria_label]
            .into_iter()
            .flatten()
            .flat_map(|v| attribute_tokens(v))
            .any(|word| {
                SENSITIVE_TOKENS.contains(&word.as_str())
                    || SENSITIVE_PREFIXES.iter().any(|p| word.starts_with(p))
            })
    }

    fn role_matches(&self, role: &str) -> bool {
        self.role == role
            || (role == "textbox" && self.role == "searchbox")
            || (role == "input" && self.is_input_like())
    }
}

const SENSITIVE_PREFIXES: [&str; 7] =
    ["password", "passwd", "passcode", "secret", "token", "iban", "card"];
const SENSITIVE_TOKENS: [&str; 8] = ["otp", "ssn", "cvv", "cvc", "csc", "pin", "pwd", "cc"];

/// Split `cardNumber` or `otp_code` into lowercase words
fn attribute_tokens(value: &str) -> Vec<String> {
    let mut spaced = String::with_capacity(value.len() + 4);
    let mut prev_lower = false;
    for c in value.chars() {
        if prev_lower && c.is_ascii_uppercase() {
            spaced.push(' ');
        }
        prev_lower = c.is_ascii_lowercase();
        spaced.push(c);
    }
    spaced
        .to_ascii_lowercase()
        .split(|c: char| !c.is_ascii_lowercase() && !c.is_ascii_digit())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

/// Layout and computed style, as far as visibility is concerned
#[derive(Debug, Clone)]
pub struct FakeStyle {
    pub width: f64,
    pub height: f64,
    /// `hidden` attribute
    pub hidden: bool,
    pub display: String,
    pub visibility: String,
    pub opacity: f64,
}

impl Default for FakeStyle {
    fn default() -> Self {
        Self {
            width: 100.0,
            height: 20.0,
            hidden: false,
            display: "block".into(),
            visibility: "visible".into(),
            opacity: 1.0,
        }
    }
}

/// A runtime call the page received
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub call: RuntimeCall,
    pub args: Value,
    pub at: Instant,
}

#[derive(Debug)]
struct PageState {
    elements: Vec<FakeElement>,
    installed: bool,
    ready_after_checks: Option<usize>,
    checks: usize,
    injections: usize,
    calls: Vec<RecordedCall>,
    url: Option<String>,
    navigations: Vec<String>,
    tabs: Vec<String>,
    captures: Vec<Option<BoundingBox>>,
    fail_capture: bool,
    ready_state: String,
    selectors: Vec<(String, Instant)>,
    body_text: String,
    title: String,
}

pub struct FakePage {
    state: Mutex<PageState>,
    eval_delay: Duration,
}

impl Default for FakePage {
    fn default() -> Self {
        Self::new()
    }
}

impl FakePage {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(PageState {
                elements: Vec::new(),
                installed: true,
                ready_after_checks: None,
                checks: 0,
                injections: 0,
                calls: Vec::new(),
                url: Some("https://example.com/".into()),
                navigations: Vec::new(),
                tabs: Vec::new(),
                captures: Vec::new(),
                fail_capture: false,
                ready_state: "complete".into(),
                selectors: Vec::new(),
                body_text: String::new(),
                title: "Example".into(),
            }),
            eval_delay: Duration::ZERO,
        }
    }

    pub fn without_runtime(self) -> Self {
        self.state().installed = false;
        self
    }

    /// Runtime shows up on its own after `checks` readiness pings
    pub fn runtime_after_checks(self, checks: usize) -> Self {
        {
            let mut state = self.state();
            state.installed = false;
            state.ready_after_checks = Some(checks);
        }
        self
    }

    pub fn with_eval_delay(mut self, delay: Duration) -> Self {
        self.eval_delay = delay;
        self
    }

    pub fn with_elements(self, elements: Vec<FakeElement>) -> Self {
        self.state().elements = elements;
        self
    }

    pub fn with_url(self, url: Option<&str>) -> Self {
        self.state().url = url.map(str::to_string);
        self
    }

    pub fn with_body_text(self, text: &str) -> Self {
        self.state().body_text = text.to_string();
        self
    }

    pub fn with_ready_state(self, ready_state: &str) -> Self {
        self.state().ready_state = ready_state.to_string();
        self
    }

    /// A visible element matching `selector` appears after `delay`
    pub fn with_selector_after(self, selector: &str, delay: Duration) -> Self {
        self.state()
            .selectors
            .push((selector.to_string(), Instant::now() + delay));
        self
    }

    pub fn failing_capture(self) -> Self {
        self.state().fail_capture = true;
        self
    }

    pub fn injections(&self) -> usize {
        self.state().injections
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state().calls.clone()
    }

    pub fn calls_of(&self, call: RuntimeCall) -> Vec<RecordedCall> {
        self.calls().into_iter().filter(|c| c.call == call).collect()
    }

    /// Number of evaluations, navigations, captures and tab switches seen
    pub fn side_effects(&self) -> usize {
        let state = self.state();
        state.calls.len()
            + state.checks
            + state.injections
            + state.navigations.len()
            + state.captures.len()
            + state.tabs.len()
    }

    pub fn value_of(&self, name: &str) -> Option<String> {
        self.state()
            .elements
            .iter()
            .find(|el| el.name == name)
            .map(|el| el.value.clone())
    }

    pub fn navigations(&self) -> Vec<String> {
        self.state().navigations.clone()
    }

    pub fn captures(&self) -> Vec<Option<BoundingBox>> {
        self.state().captures.clone()
    }

    pub fn tabs(&self) -> Vec<String> {
        self.state().tabs.clone()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, PageState> {
        self.state.lock().unwrap()
    }

    fn handle(&self, script: &str) -> Value {
        let mut state = self.state();

        if script == RUNTIME_SCRIPT {
            state.injections += 1;
            state.installed = true;
            return Value::Null;
        }

        if script == readiness_script() {
            state.checks += 1;
            if let Some(needed) = state.ready_after_checks {
                if state.checks >= needed {
                    state.installed = true;
                }
            }
            return json!({ "ok": state.installed }).to_string().into();
        }

        let Some((call, args)) = decode_call(script) else {
            return json!("not a runtime call");
        };
        if !state.installed {
            return json!({"ok": false, "error": "runtime not installed"})
                .to_string()
                .into();
        }

        state.calls.push(RecordedCall {
            call,
            args: args.clone(),
            at: Instant::now(),
        });
        state.run(call, &args).to_string().into()
    }
}

impl PageState {
    fn present(&self) -> Vec<usize> {
        let now = Instant::now();
        (0..self.elements.len())
            .filter(|&i| self.elements[i].appears_at.map_or(true, |at| at <= now))
            .collect()
    }

    fn candidates(&self, locator: &Value) -> Vec<usize> {
        let lower = |key: &str| {
            locator
                .get(key)
                .and_then(Value::as_str)
                .map(str::to_lowercase)
        };
        let mut list = self.present();
        if let Some(text) = lower("text") {
            list.retain(|&i| {
                let el = &self.elements[i];
                el.text.to_lowercase().contains(&text) || el.name.to_lowercase().contains(&text)
            });
        }
        if let Some(name) = lower("name") {
            list.retain(|&i| self.elements[i].name.to_lowercase().contains(&name));
        }
        if let Some(role) = lower("role") {
            list.retain(|&i| self.elements[i].role_matches(&role));
        }
        if let Some(nth) = locator.get("nth").and_then(Value::as_u64) {
            list = list.get(nth as usize).map(|&i| vec![i]).unwrap_or_default();
        }
        list
    }

    fn first_visible(&self, locator: &Value) -> Option<usize> {
        self.candidates(locator)
            .into_iter()
            .find(|&i| self.elements[i].is_visible())
    }

    fn summary(&self, i: usize) -> Value {
        let el = &self.elements[i];
        json!({
            "id": format!("pp-{}", i + 1),
            "role": el.role,
            "name": el.name,
            "text": el.text,
            "visible": el.is_visible(),
            "boundingBox": {"x": 0.0, "y": (i * 20) as f64, "width": 100.0, "height": 20.0},
            "locatorHint": {"role": el.role, "name": el.name},
        })
    }

    fn run(&mut self, call: RuntimeCall, args: &Value) -> Value {
        let arg = |n: usize| args.get(n).cloned().unwrap_or(Value::Null);
        let locator = arg(0);
        let fail = |msg: &str| json!({"ok": false, "error": msg});

        match call {
            RuntimeCall::Ping => json!({
                "ok": true,
                "version": RUNTIME_VERSION,
                "readyState": self.ready_state,
            }),
            RuntimeCall::FindElements => {
                let list = self.candidates(&locator);
                let elements: Vec<Value> = list.iter().map(|&i| self.summary(i)).collect();
                json!({"ok": true, "total": list.len(), "elements": elements})
            }
            RuntimeCall::Click => match self.first_visible(&locator) {
                Some(i) => json!({"ok": true, "element": self.summary(i)}),
                None => fail("no visible element matches"),
            },
            RuntimeCall::TypeText => {
                let Some(i) = self.first_visible(&locator) else {
                    return fail("no visible element matches");
                };
                if !self.elements[i].is_input_like() {
                    return fail("element is not a text input");
                }
                if self.elements[i].is_sensitive() {
                    return fail("refusing to type into a sensitive field");
                }
                self.elements[i].value = arg(1).as_str().unwrap_or_default().to_string();
                let submitted = arg(2).as_bool().unwrap_or(false);
                json!({"ok": true, "submitted": submitted, "element": self.summary(i)})
            }
            RuntimeCall::Select => {
                let Some(i) = self.first_visible(&locator) else {
                    return fail("no visible select element matches");
                };
                let wanted = arg(1).as_str().unwrap_or_default().to_lowercase();
                let el = &mut self.elements[i];
                match el.options.iter().find(|o| o.to_lowercase() == wanted).cloned() {
                    Some(option) => {
                        el.value = option.clone();
                        json!({"ok": true, "value": option, "label": option})
                    }
                    None => fail("no option matches"),
                }
            }
            RuntimeCall::Scroll => {
                if !locator.is_null() && self.first_visible(&locator).is_none() {
                    return fail("no visible element matches");
                }
                json!({"ok": true, "scrollX": 0, "scrollY": arg(2).as_u64().unwrap_or(600)})
            }
            RuntimeCall::WaitFor => {
                let satisfied = if let Some(state) = locator.get("readyState").and_then(Value::as_str) {
                    if state == "interactive" {
                        self.ready_state != "loading"
                    } else {
                        self.ready_state == "complete"
                    }
                } else if let Some(selector) = locator.get("selector").and_then(Value::as_str) {
                    let now = Instant::now();
                    self.selectors.iter().any(|(s, at)| s == selector && *at <= now)
                } else {
                    true
                };
                json!({"ok": true, "satisfied": satisfied})
            }
            RuntimeCall::Extract => {
                let max = arg(1).as_u64().unwrap_or(4000) as usize;
                let text = if locator.is_null() {
                    self.body_text.clone()
                } else {
                    match self.first_visible(&locator) {
                        Some(i) if self.elements[i].is_sensitive() => {
                            return fail("refusing to read a sensitive field")
                        }
                        Some(i) if self.elements[i].is_input_like() => self.elements[i].value.clone(),
                        Some(i) => self.elements[i].text.clone(),
                        None => return fail("no element matches"),
                    }
                };
                let truncated = text.chars().count() > max;
                json!({
                    "ok": true,
                    "text": text.chars().take(max).collect::<String>(),
                    "truncated": truncated,
                    "title": self.title,
                    "url": self.url,
                })
            }
            RuntimeCall::Rect => match self.first_visible(&locator) {
                Some(i) => json!({
                    "ok": true,
                    "rect": {"x": 0.0, "y": (i * 20) as f64, "width": 100.0, "height": 20.0},
                    "devicePixelRatio": 1,
                }),
                None => fail("no visible element matches"),
            },
        }
    }
}

/// Recover the function name and arguments from a bridge script
fn decode_call(script: &str) -> Option<(RuntimeCall, Value)> {
    let name_start = script.find("var r=rt.")? + "var r=rt.".len();
    let name_end = name_start + script[name_start..].find(".apply")?;
    let call = RuntimeCall::from_function_name(&script[name_start..name_end])?;

    let payload_start = script.find("JSON.parse(\"")? + "JSON.parse(\"".len();
    let payload_end = script.rfind("\");var r=rt.")?;
    let literal = format!("\"{}\"", &script[payload_start..payload_end]);
    let json_text: String = serde_json::from_str(&literal).ok()?;
    let args = serde_json::from_str(&json_text).ok()?;
    Some((call, args))
}

#[async_trait]
impl PageProvider for FakePage {
    async fn navigate(&self, url: &str) -> Result<()> {
        let mut state = self.state();
        state.navigations.push(url.to_string());
        state.url = Some(url.to_string());
        Ok(())
    }

    async fn evaluate_script(&self, script: &str) -> Result<Value> {
        if !self.eval_delay.is_zero() {
            tokio::time::sleep(self.eval_delay).await;
        }
        Ok(self.handle(script))
    }

    async fn capture_image(&self, rect: Option<BoundingBox>) -> Result<Vec<u8>> {
        let mut state = self.state();
        state.captures.push(rect);
        if state.fail_capture {
            return Err(PilotError::page("capture failed"));
        }
        Ok(b"\x89PNG fake".to_vec())
    }

    async fn current_url(&self) -> Result<Option<String>> {
        Ok(self.state().url.clone())
    }

    async fn switch_tab(&self, target: &str) -> Result<()> {
        self.state().tabs.push(target.to_string());
        Ok(())
    }
}
