//! Execution bridge into the in-page runtime
//!
//! The only place in the crate that turns data into executable script text.
//! Arguments are JSON-encoded, escaped into a string literal, parsed back by
//! the page, and every call is wrapped so the page always answers with a
//! JSON string. Replies are parsed defensively: anything malformed becomes a
//! failed reply instead of an error.

use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::automation::page::PageProvider;
use crate::automation::retry::RetryPolicy;
use crate::automation::runtime::{RuntimeCall, RUNTIME_GLOBAL, RUNTIME_SCRIPT, RUNTIME_VERSION};
use crate::core::{PilotError, Result};

/// Interval between readiness checks
const READY_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Parsed answer from the runtime. Always an object with an `ok` flag.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeReply(Value);

impl RuntimeReply {
    pub fn failure(message: impl Into<String>) -> Self {
        Self(json!({ "ok": false, "error": message.into() }))
    }

    /// Interpret whatever the page returned
    pub fn parse(raw: Value) -> Self {
        match raw {
            Value::Object(_) => Self(raw),
            Value::String(text) => match serde_json::from_str::<Value>(&text) {
                Ok(value @ Value::Object(_)) => Self(value),
                Ok(Value::Null) => Self::failure("runtime returned no result"),
                Ok(_) | Err(_) => Self::failure("malformed runtime reply"),
            },
            Value::Null => Self::failure("runtime returned no result"),
            _ => Self::failure("malformed runtime reply"),
        }
    }

    pub fn ok(&self) -> bool {
        self.0.get("ok").and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn error(&self) -> Option<&str> {
        self.0.get("error").and_then(Value::as_str)
    }

    /// Error text, or a generic fallback
    pub fn error_message(&self) -> String {
        self.error().unwrap_or("runtime call failed").to_string()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }
}

/// Escape text for embedding inside a double-quoted script string literal.
///
/// Every escape used is valid in both JavaScript and JSON.
pub fn escape_for_script(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 16);
    for ch in raw.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\'' => out.push_str("\\u0027"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            '<' => out.push_str("\\u003c"),
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out
}

/// Build the script for one runtime call. `args` is the positional argument list.
pub fn build_call_script(call: RuntimeCall, args: &Value) -> String {
    let args = match args {
        Value::Array(_) => args.clone(),
        other => Value::Array(vec![other.clone()]),
    };
    let payload = escape_for_script(&args.to_string());
    let name = call.function_name();
    format!(
        concat!(
            "(function(){{try{{",
            "var rt=window.{global};",
            "if(!rt||typeof rt.{name}!==\"function\"){{return JSON.stringify({{ok:false,error:\"runtime not installed\"}});}}",
            "var args=JSON.parse(\"{payload}\");",
            "var r=rt.{name}.apply(rt,args);",
            "if(r&&typeof r.then===\"function\"){{return r.then(function(v){{return JSON.stringify(v===undefined?null:v);}},",
            "function(e){{return JSON.stringify({{ok:false,error:String(e&&e.message||e)}});}});}}",
            "return JSON.stringify(r===undefined?null:r);",
            "}}catch(e){{return JSON.stringify({{ok:false,error:String(e&&e.message||e)}});}}}})()"
        ),
        global = RUNTIME_GLOBAL,
        name = name,
        payload = payload,
    )
}

/// Script reporting whether every runtime function is present
pub(crate) fn readiness_script() -> String {
    let names = RuntimeCall::ALL
        .iter()
        .map(|call| format!("\"{}\"", call.function_name()))
        .collect::<Vec<_>>()
        .join(",");
    format!(
        "(function(){{var rt=window.{global};return JSON.stringify({{ok:!!rt&&rt.version==={version}&&[{names}].every(function(n){{return typeof rt[n]===\"function\";}})}});}})()",
        global = RUNTIME_GLOBAL,
        version = RUNTIME_VERSION,
        names = names,
    )
}

/// Channel from the host into one page's runtime
pub struct ExecutionBridge {
    page: Arc<dyn PageProvider>,
    eval_timeout: Duration,
    ready_timeout: Duration,
    inject_runtime: bool,
    ready: AtomicBool,
}

impl ExecutionBridge {
    pub fn new(page: Arc<dyn PageProvider>, eval_timeout: Duration, ready_timeout: Duration) -> Self {
        Self {
            page,
            eval_timeout,
            ready_timeout,
            inject_runtime: true,
            ready: AtomicBool::new(false),
        }
    }

    /// Whether to install the runtime when a page does not carry it
    pub fn with_injection(mut self, inject: bool) -> Self {
        self.inject_runtime = inject;
        self
    }

    /// Call a runtime function. Never fails; problems come back as a failed reply.
    pub async fn call(&self, call: RuntimeCall, args: Value) -> RuntimeReply {
        let script = build_call_script(call, &args);
        debug!("Bridge call {} ({} bytes)", call.function_name(), script.len());

        match timeout(self.eval_timeout, self.page.evaluate_script(&script)).await {
            Err(_) => {
                warn!(
                    "Bridge call {} timed out after {:?}",
                    call.function_name(),
                    self.eval_timeout
                );
                RuntimeReply::failure(
                    PilotError::BridgeTimeout(call.function_name().to_string()).to_string(),
                )
            }
            Ok(Err(e)) => RuntimeReply::failure(e.to_string()),
            Ok(Ok(raw)) => RuntimeReply::parse(raw),
        }
    }

    /// Make sure the runtime is installed and complete before first use.
    ///
    /// Page load and injection order are not guaranteed, so this polls. If
    /// the first check finds nothing and injection is enabled, the runtime
    /// script is evaluated once.
    pub async fn ensure_runtime_ready(&self) -> Result<()> {
        if self.ready.load(Ordering::SeqCst) {
            return Ok(());
        }

        if self.ping_runtime().await {
            self.ready.store(true, Ordering::SeqCst);
            return Ok(());
        }
        if self.inject_runtime {
            debug!("Runtime missing, injecting");
            match timeout(self.eval_timeout, self.page.evaluate_script(RUNTIME_SCRIPT)).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => warn!("Runtime injection failed: {}", e),
                Err(_) => warn!("Runtime injection timed out"),
            }
        }

        let policy = RetryPolicy::new(READY_POLL_INTERVAL, self.ready_timeout);
        if policy.poll_until(|| self.ping_runtime()).await {
            self.ready.store(true, Ordering::SeqCst);
            Ok(())
        } else {
            Err(PilotError::RuntimeNotReady(self.ready_timeout.as_millis() as u64))
        }
    }

    /// Forget readiness, e.g. after the document changed
    pub fn reset(&self) {
        self.ready.store(false, Ordering::SeqCst);
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn ping_runtime(&self) -> bool {
        match timeout(self.eval_timeout, self.page.evaluate_script(&readiness_script())).await {
            Ok(Ok(raw)) => RuntimeReply::parse(raw).ok(),
            _ => false,
        }
    }
}
