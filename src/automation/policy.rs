//! Permission policy engine
//!
//! A pure decision over (action kind, origin host). Read-only and
//! navigational actions always pass. Mutating actions are refused on
//! sensitive domains; the refusal is the caller's cue to ask the user.

use serde::{Deserialize, Serialize};

use crate::automation::action::ActionKind;
use crate::core::config::PolicyConfig;

/// Allow/deny verdict
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDecision {
    pub allowed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl PolicyDecision {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
        }
    }
}

/// Stateless policy over a fixed set of sensitive domains
#[derive(Debug, Clone)]
pub struct PermissionPolicy {
    sensitive_domains: Vec<String>,
}

impl PermissionPolicy {
    pub fn new<I, S>(sensitive_domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            sensitive_domains: sensitive_domains
                .into_iter()
                .map(|d| normalize_host(d.as_ref()))
                .filter(|d| !d.is_empty())
                .collect(),
        }
    }

    pub fn from_config(config: &PolicyConfig) -> Self {
        Self::new(&config.sensitive_domains)
    }

    /// Decide whether `kind` may run on a page served from `origin_host`
    pub fn evaluate(&self, kind: ActionKind, origin_host: Option<&str>) -> PolicyDecision {
        match kind {
            ActionKind::Navigate
            | ActionKind::FindElements
            | ActionKind::Observe
            | ActionKind::Scroll
            | ActionKind::WaitFor
            | ActionKind::Extract
            | ActionKind::SwitchTab
            | ActionKind::Snapshot
            | ActionKind::AskUser => PolicyDecision::allow(),
            ActionKind::Click | ActionKind::Select | ActionKind::TypeText => {
                match origin_host.and_then(|host| self.sensitive_match(host)) {
                    Some(domain) => PolicyDecision::deny(format!(
                        "{} is blocked on {} (sensitive domain {}); ask the user for consent with askUser before retrying",
                        kind,
                        origin_host.unwrap_or_default(),
                        domain
                    )),
                    None => PolicyDecision::allow(),
                }
            }
        }
    }

    /// Whether `host` is, or is a subdomain of, a sensitive domain
    pub fn is_sensitive(&self, host: &str) -> bool {
        self.sensitive_match(host).is_some()
    }

    fn sensitive_match(&self, host: &str) -> Option<&str> {
        let host = normalize_host(host);
        if host.is_empty() {
            return None;
        }
        self.sensitive_domains
            .iter()
            .find(|domain| {
                host == **domain
                    || (host.len() > domain.len()
                        && host.ends_with(domain.as_str())
                        && host.as_bytes()[host.len() - domain.len() - 1] == b'.')
            })
            .map(String::as_str)
    }
}

impl Default for PermissionPolicy {
    fn default() -> Self {
        Self::from_config(&PolicyConfig::default())
    }
}

fn normalize_host(host: &str) -> String {
    host.trim().trim_end_matches('.').to_ascii_lowercase()
}
