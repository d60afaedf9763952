//! Session wiring
//!
//! Builds the service graph for one browser tab: page provider, audit log,
//! consent broker, policy, page agent and tool registry.

use std::sync::Arc;
use tracing::info;

use crate::automation::{AuditLog, ConsentBroker, PageAgent, PermissionPolicy};
use crate::cli::consent::spawn_terminal_consent;
use crate::cli::input::LineSource;
use crate::core::{Config, PilotError, Result};
use crate::tools::browser::AgentBrowserPage;
use crate::tools::ToolRegistry;

/// A live automation session
pub struct Session {
    config: Config,
    registry: ToolRegistry,
}

impl Session {
    /// Start a session against agent-browser.
    ///
    /// With `consent_input` the terminal answers consent prompts from those
    /// lines; otherwise every prompt is denied.
    pub async fn start(config: Config, consent_input: Option<LineSource>) -> Result<Self> {
        if !AgentBrowserPage::is_available().await {
            return Err(PilotError::AgentBrowserNotFound);
        }

        let audit_path = config.audit_path();
        let audit = Arc::new(AuditLog::open(&audit_path)?);
        info!("Audit log: {} ({} entries)", audit_path.display(), audit.len());

        let consent = match consent_input {
            Some(lines) => {
                let (broker, requests) = ConsentBroker::new(config.consent.timeout());
                let broker = Arc::new(broker);
                spawn_terminal_consent(broker.clone(), requests, lines);
                broker
            }
            None => Arc::new(ConsentBroker::unattended()),
        };

        let page = Arc::new(AgentBrowserPage::from_config(&config.browser));
        let agent = PageAgent::new(
            page,
            &config,
            PermissionPolicy::from_config(&config.policy),
            audit,
            consent,
        );

        Ok(Self {
            registry: ToolRegistry::new(Arc::new(agent)),
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }
}
