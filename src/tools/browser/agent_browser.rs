//! Page provider backed by the agent-browser CLI
//!
//! Each operation shells out to `agent-browser` within one named session.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use crate::automation::action::BoundingBox;
use crate::automation::page::PageProvider;
use crate::core::config::BrowserConfig;
use crate::core::{PilotError, Result};

/// `--json` output of agent-browser
#[derive(Debug, Deserialize)]
struct CliEnvelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

/// One agent-browser session, driven as a page
pub struct AgentBrowserPage {
    /// Session name for isolation
    session_name: String,
    /// Whether to run in headed mode
    headed: bool,
    /// Wait for network idle after `open`
    wait_for_load: bool,
}

impl AgentBrowserPage {
    pub fn new(session_name: impl Into<String>) -> Self {
        Self {
            session_name: session_name.into(),
            headed: false,
            wait_for_load: true,
        }
    }

    pub fn from_config(config: &BrowserConfig) -> Self {
        let mut page = Self::new(config.session_name.clone());
        page.headed = config.headed;
        page
    }

    pub fn set_headed(&mut self, headed: bool) {
        self.headed = headed;
    }

    pub fn session_name(&self) -> &str {
        &self.session_name
    }

    /// Check if agent-browser is installed
    pub async fn is_available() -> bool {
        Command::new("agent-browser")
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    fn command_args<'a>(&'a self, args: &[&'a str]) -> Vec<&'a str> {
        let mut full = vec!["--session", self.session_name.as_str()];
        if self.headed {
            full.push("--headed");
        }
        full.extend_from_slice(args);
        full
    }

    async fn run_command(&self, args: &[&str]) -> Result<String> {
        let full = self.command_args(args);
        debug!("agent-browser {}", args.first().copied().unwrap_or_default());

        let output = Command::new("agent-browser")
            .args(&full)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    PilotError::AgentBrowserNotFound
                } else {
                    PilotError::page(format!("failed to run agent-browser: {}", e))
                }
            })?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            Err(PilotError::page(format!(
                "agent-browser {} failed: {}",
                args.first().copied().unwrap_or_default(),
                String::from_utf8_lossy(&output.stderr).trim()
            )))
        }
    }

    async fn run_json_command(&self, args: &[&str]) -> Result<Option<Value>> {
        let mut full: Vec<&str> = args.to_vec();
        full.push("--json");
        let stdout = self.run_command(&full).await?;
        parse_envelope(&stdout)
    }
}

impl Default for AgentBrowserPage {
    fn default() -> Self {
        Self::new("pagepilot")
    }
}

/// Unwrap a `--json` envelope. Output that is not an envelope is returned
/// as-is, parsed as JSON when possible.
fn parse_envelope(stdout: &str) -> Result<Option<Value>> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    match serde_json::from_str::<CliEnvelope>(trimmed) {
        Ok(envelope) if envelope.success => Ok(envelope.data),
        Ok(envelope) if envelope.error.is_some() => Err(PilotError::page(
            envelope.error.unwrap_or_default(),
        )),
        _ => Ok(Some(
            serde_json::from_str(trimmed).unwrap_or_else(|_| Value::String(trimmed.to_string())),
        )),
    }
}

/// Pull the evaluation result out of `eval --json` data
fn eval_result(data: Option<Value>) -> Value {
    match data {
        Some(Value::Object(mut map)) if map.contains_key("result") => {
            map.remove("result").unwrap_or(Value::Null)
        }
        Some(other) => other,
        None => Value::Null,
    }
}

fn screenshot_path() -> PathBuf {
    std::env::temp_dir().join(format!("pagepilot-{}.png", uuid::Uuid::new_v4()))
}

#[async_trait]
impl PageProvider for AgentBrowserPage {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.run_command(&["open", url]).await?;
        if self.wait_for_load {
            if let Err(e) = self.run_command(&["wait", "--load", "networkidle"]).await {
                debug!("Waiting for network idle failed: {}", e);
            }
        }
        Ok(())
    }

    async fn evaluate_script(&self, script: &str) -> Result<Value> {
        let data = self.run_json_command(&["eval", script]).await?;
        Ok(eval_result(data))
    }

    async fn capture_image(&self, rect: Option<BoundingBox>) -> Result<Vec<u8>> {
        if rect.is_some() {
            // the CLI only captures whole viewports
            return Err(PilotError::page(
                "agent-browser cannot capture a region of the page",
            ));
        }

        let path = screenshot_path();
        let path_arg = path.to_string_lossy().into_owned();
        self.run_command(&["screenshot", &path_arg]).await?;

        let bytes = tokio::fs::read(&path).await;
        if let Err(e) = tokio::fs::remove_file(&path).await {
            debug!("Could not remove {}: {}", path.display(), e);
        }
        Ok(bytes?)
    }

    async fn current_url(&self) -> Result<Option<String>> {
        let url = self.run_command(&["get", "url"]).await?;
        let url = url.trim();
        Ok((!url.is_empty()).then(|| url.to_string()))
    }

    async fn switch_tab(&self, target: &str) -> Result<()> {
        self.run_command(&["tab", target]).await.map(|_| ())
    }
}
