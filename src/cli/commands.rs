//! CLI commands
//!
//! Input handling for the REPL: special commands, plus tool calls written
//! either as a full JSON object or as `<tool> <json arguments>`.

use serde_json::Value;

use crate::automation::AuditEntry;
use crate::core::{Config, PilotError, Result, ToolCall};
use crate::tools::{Tool, ToolRegistry};

/// Result of parsing a line of input
#[derive(Debug)]
pub enum CommandResult {
    /// Run this tool call
    Call(ToolCall),
    /// Command was handled, show output
    Handled(String),
    /// Exit the REPL
    Exit,
    /// No output needed
    None,
}

/// Parse and handle one line of REPL input
pub fn handle_command(input: &str, registry: &ToolRegistry, config: &Config) -> Result<CommandResult> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(CommandResult::None);
    }
    if input.starts_with('{') {
        return parse_tool_call(input).map(CommandResult::Call);
    }

    let (cmd, args) = match input.split_once(char::is_whitespace) {
        Some((cmd, args)) => (cmd, args.trim()),
        None => (input, ""),
    };

    match cmd {
        "exit" | "quit" | "q" => Ok(CommandResult::Exit),

        "help" | "?" => Ok(CommandResult::Handled(help_text())),

        "tools" => Ok(CommandResult::Handled(tools_text())),

        "audit" => {
            let limit = if args.is_empty() {
                10
            } else {
                args.parse()
                    .map_err(|_| PilotError::invalid(format!("not a number: {}", args)))?
            };
            Ok(CommandResult::Handled(audit_text(
                &registry.agent().audit().entries(),
                limit,
            )))
        }

        "config" => Ok(CommandResult::Handled(format!(
            "Config file: {}\nAudit log:   {}",
            Config::config_file().display(),
            config.audit_path().display()
        ))),

        name => match Tool::from_name(name) {
            Some(tool) => {
                let arguments = if args.is_empty() {
                    Value::Object(Default::default())
                } else {
                    serde_json::from_str(args)
                        .map_err(|e| PilotError::invalid(format!("arguments: {}", e)))?
                };
                Ok(CommandResult::Call(ToolCall::new(tool.name(), arguments)))
            }
            None => Ok(CommandResult::Handled(format!(
                "Unknown command: {}. Type 'help' for available commands.",
                name
            ))),
        },
    }
}

/// Parse a `{"name": ..., "arguments": {...}}` tool call
pub fn parse_tool_call(input: &str) -> Result<ToolCall> {
    let call: ToolCall = serde_json::from_str(input)
        .map_err(|e| PilotError::invalid(format!("tool call: {}", e)))?;
    if !call.arguments.is_object() {
        return Err(PilotError::invalid("tool call arguments must be an object"));
    }
    Ok(call)
}

/// Render the last `limit` audit entries, oldest first
pub fn audit_text(entries: &[AuditEntry], limit: usize) -> String {
    if entries.is_empty() {
        return "Audit log is empty".to_string();
    }
    let start = entries.len().saturating_sub(limit);
    entries[start..]
        .iter()
        .map(|entry| {
            let verdict = if entry.policy_allowed { "allowed" } else { "denied" };
            let outcome = match entry.outcome_success {
                Some(true) => "ok".to_string(),
                Some(false) => format!(
                    "failed: {}",
                    entry.outcome_message.as_deref().unwrap_or("unknown error")
                ),
                None => "not run".to_string(),
            };
            let consent = match (entry.requested_consent, entry.user_consented) {
                (true, Some(true)) => " [consent given]",
                (true, _) => " [consent refused]",
                (false, Some(true)) => " [consent grant used]",
                _ => "",
            };
            format!(
                "{} {:<12} {:<28} {} / {}{}",
                entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                entry.action.as_str(),
                entry.host.as_deref().unwrap_or("-"),
                verdict,
                outcome,
                consent
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn tools_text() -> String {
    ToolRegistry::definitions()
        .iter()
        .map(|def| format!("  {:<14} {}", def.function.name, def.function.description))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Generate help text
fn help_text() -> String {
    r#"pagepilot commands:
─────────────────────────────────────────────
  help, ?          Show this help message
  exit, quit, q    Exit
  tools            List available tools
  audit [n]        Show the last n audit entries
  config           Show config and audit log paths

Tool calls:
  {"name": "navigate", "arguments": {"url": "https://example.com"}}
  click {"locator": {"role": "button", "text": "Sign in"}}
  observe
─────────────────────────────────────────────"#
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::{ActionKind, PolicyDecision};
    use serde_json::json;

    #[test]
    fn test_parse_full_tool_call() {
        let call = parse_tool_call(r#"{"name": "click", "arguments": {"locator": {"text": "OK"}}}"#)
            .unwrap();
        assert_eq!(call.name, "click");
        assert_eq!(call.arguments, json!({"locator": {"text": "OK"}}));

        let call = parse_tool_call(r#"{"name": "observe"}"#).unwrap();
        assert_eq!(call.arguments, json!({}));

        assert!(parse_tool_call(r#"{"name": "click", "arguments": [1]}"#).is_err());
        assert!(parse_tool_call("{nope").is_err());
    }

    #[test]
    fn test_audit_text_shows_latest_entries() {
        let entries: Vec<AuditEntry> = (0..3)
            .map(|i| {
                AuditEntry::new(
                    Some("example.com"),
                    ActionKind::Click,
                    json!({"n": i}),
                    &PolicyDecision::allow(),
                )
                .with_outcome(i != 1, Some("boom".into()))
            })
            .collect();

        let text = audit_text(&entries, 2);
        assert_eq!(text.lines().count(), 2);
        assert!(text.lines().next().unwrap().contains("failed: boom"));
        assert_eq!(audit_text(&[], 5), "Audit log is empty");
    }

    #[test]
    fn test_tools_text_lists_every_tool() {
        let text = tools_text();
        for tool in Tool::ALL {
            assert!(text.contains(tool.name()));
        }
    }
}
