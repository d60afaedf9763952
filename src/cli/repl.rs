//! Interactive REPL for pagepilot
//!
//! Reads tool calls (or commands) line by line and prints each observation
//! as pretty JSON.

use std::io::{self, Write};

use crate::cli::commands::{handle_command, CommandResult};
use crate::cli::input::LineSource;
use crate::cli::session::Session;
use crate::core::{Config, Result, ToolObservation};

/// Interactive REPL (Read-Eval-Print Loop)
pub struct Repl {
    session: Session,
    lines: LineSource,
}

impl Repl {
    /// Start a session with an interactive consent prompt
    pub async fn with_config(config: Config) -> Result<Self> {
        let lines = LineSource::stdin();
        Ok(Self {
            session: Session::start(config, Some(lines.clone())).await?,
            lines,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Run the REPL
    pub async fn run(&mut self) -> Result<()> {
        self.print_banner();

        let mut stdout = io::stdout();

        loop {
            print!("pagepilot> ");
            stdout.flush()?;

            let Some(input) = self.lines.next_line().await else {
                // EOF (Ctrl+D)
                println!();
                break;
            };

            match handle_command(&input, self.session.registry(), self.session.config()) {
                Ok(CommandResult::Exit) => break,
                Ok(CommandResult::Handled(output)) => println!("{}\n", output),
                Ok(CommandResult::None) => continue,
                Ok(CommandResult::Call(call)) => {
                    let observation = self.session.registry().execute_tool(&call).await;
                    println!("{}\n", render(&observation));
                }
                Err(e) => eprintln!("{}\n", e),
            }
        }

        Ok(())
    }

    fn print_banner(&self) {
        let config = self.session.config();
        println!("pagepilot {}", env!("CARGO_PKG_VERSION"));
        println!("Session:    {}", config.browser.session_name);
        println!("Audit log:  {}", config.audit_path().display());
        println!("Commands: help, tools, audit, config, exit");
        println!("─────────────────────────────────────────────");
    }
}

/// Pretty JSON for an observation
pub fn render(observation: &ToolObservation) -> String {
    serde_json::to_string_pretty(observation).unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))
}
