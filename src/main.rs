//! pagepilot - guarded page automation for planners
//!
//! Main entry point for the CLI application.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use pagepilot::automation::{Action, AuditLog};
use pagepilot::cli::commands::{audit_text, parse_tool_call};
use pagepilot::cli::repl::render;
use pagepilot::cli::{LineSource, Repl, Session};
use pagepilot::core::logging;
use pagepilot::tools::ToolRegistry;
use pagepilot::Config;

/// pagepilot - drive a web page through audited, policy-checked tools
#[derive(Parser, Debug)]
#[command(name = "pagepilot")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Enable debug logging
    #[arg(long, short = 'd', global = true)]
    debug: bool,

    /// Run in headed browser mode (visible window)
    #[arg(long, global = true)]
    headed: bool,

    /// agent-browser session name
    #[arg(long, global = true)]
    session: Option<String>,

    /// Audit profile
    #[arg(long, global = true)]
    profile: Option<String>,

    /// Deny consent prompts instead of asking on the terminal
    #[arg(long, global = true)]
    no_consent: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Interactive session (default)
    Repl,
    /// Execute one tool call given as JSON
    Call {
        /// e.g. '{"name":"navigate","arguments":{"url":"https://example.com"}}'
        json: String,
    },
    /// Run a JSON plan file (an array of actions) step by step
    Plan { file: PathBuf },
    /// Print tool definitions as JSON
    Tools,
    /// Show recent audit entries
    Audit {
        #[arg(long, short = 'n', default_value_t = 20)]
        limit: usize,
    },
    /// Show or initialize the configuration file
    Config {
        /// Write the default configuration if none exists
        #[arg(long)]
        init: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logging::init(args.debug);

    // Build configuration
    let mut config = Config::load();

    // Apply CLI overrides
    if args.headed {
        config.browser.headed = true;
    }
    if let Some(session) = args.session {
        config.browser.session_name = session;
    }
    if let Some(profile) = args.profile {
        config.audit.profile = profile;
    }
    let no_consent = args.no_consent;
    // stdin is only read when a consent prompt may need it
    let consent_input = || (!no_consent).then(LineSource::stdin);

    match args.command.unwrap_or(Command::Repl) {
        Command::Repl => {
            if no_consent {
                anyhow::bail!("--no-consent is only meaningful for call and plan");
            }
            let mut repl = Repl::with_config(config).await?;
            repl.run().await?;
        }
        Command::Call { json } => {
            let call = parse_tool_call(&json)?;
            let session = Session::start(config, consent_input()).await?;
            let observation = session.registry().execute_tool(&call).await;
            println!("{}", render(&observation));
            if !observation.ok {
                std::process::exit(1);
            }
        }
        Command::Plan { file } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let plan: Vec<Action> = serde_json::from_str(&content)
                .with_context(|| format!("{} is not a valid plan", file.display()))?;
            let session = Session::start(config, consent_input()).await?;
            let outcomes = session.registry().agent().execute(&plan).await;
            println!("{}", serde_json::to_string_pretty(&outcomes)?);
            if outcomes.iter().any(|o| !o.ok) {
                std::process::exit(1);
            }
        }
        Command::Tools => {
            println!(
                "{}",
                serde_json::to_string_pretty(&ToolRegistry::definitions())?
            );
        }
        Command::Audit { limit } => {
            let path = config.audit_path();
            let audit = AuditLog::open(&path)?;
            println!("{}", path.display());
            println!("{}", audit_text(&audit.entries(), limit));
        }
        Command::Config { init } => {
            let path = Config::config_file();
            if init && !path.exists() {
                let written = config.save()?;
                println!("Wrote {}", written.display());
            } else {
                println!("# {}", path.display());
                println!("{}", toml::to_string_pretty(&config)?);
            }
        }
    }

    Ok(())
}
