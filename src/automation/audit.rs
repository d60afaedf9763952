//! Append-only audit log
//!
//! Every policy evaluation and execution attempt becomes one entry. The whole
//! log is loaded at startup and the full JSON array is rewritten after each
//! append (temp file + rename). Writes are synchronous.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::automation::action::ActionKind;
use crate::automation::policy::PolicyDecision;
use crate::core::{PilotError, Result};

/// One persisted record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub host: Option<String>,
    pub action: ActionKind,
    pub parameters: Value,
    pub policy_allowed: bool,
    pub policy_reason: Option<String>,
    pub requested_consent: bool,
    pub user_consented: Option<bool>,
    pub outcome_success: Option<bool>,
    pub outcome_message: Option<String>,
}

impl AuditEntry {
    /// Start an entry for a policy decision
    pub fn new(
        host: Option<&str>,
        action: ActionKind,
        parameters: Value,
        decision: &PolicyDecision,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            host: host.map(str::to_string),
            action,
            parameters,
            policy_allowed: decision.allowed,
            policy_reason: decision.reason.clone(),
            requested_consent: false,
            user_consented: None,
            outcome_success: None,
            outcome_message: None,
        }
    }

    pub fn with_consent(mut self, requested: bool, granted: Option<bool>) -> Self {
        self.requested_consent = requested;
        self.user_consented = granted;
        self
    }

    pub fn with_outcome(mut self, success: bool, message: Option<String>) -> Self {
        self.outcome_success = Some(success);
        self.outcome_message = message;
        self
    }
}

/// Ordered, append-only collection of entries
pub struct AuditLog {
    path: Option<PathBuf>,
    entries: Mutex<Vec<AuditEntry>>,
}

impl AuditLog {
    /// Load the log at `path`. A missing file is an empty log; an unreadable
    /// or corrupt one is an error rather than a fresh start.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = if path.exists() {
            let content = fs::read_to_string(&path).map_err(|e| {
                PilotError::audit(format!("failed to read {}: {}", path.display(), e))
            })?;
            if content.trim().is_empty() {
                Vec::new()
            } else {
                serde_json::from_str(&content).map_err(|e| {
                    PilotError::audit(format!("corrupt audit log {}: {}", path.display(), e))
                })?
            }
        } else {
            Vec::new()
        };

        debug!("Loaded {} audit entries from {}", entries.len(), path.display());
        Ok(Self {
            path: Some(path),
            entries: Mutex::new(entries),
        })
    }

    /// A log that is never persisted
    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: Mutex::new(Vec::new()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Append an entry and persist the full collection.
    ///
    /// The entry stays in memory even if persisting fails; the error is
    /// returned so the caller can surface it.
    pub fn append(&self, entry: AuditEntry) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| PilotError::audit("audit log lock poisoned"))?;
        entries.push(entry);

        if let Some(path) = &self.path {
            if let Err(e) = persist(path, &entries) {
                warn!("Failed to persist audit log to {}: {}", path.display(), e);
                return Err(e);
            }
        }
        Ok(())
    }

    /// Snapshot of all entries in append order
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn persist(path: &Path, entries: &[AuditEntry]) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    let content = serde_json::to_vec_pretty(entries)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, content)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
