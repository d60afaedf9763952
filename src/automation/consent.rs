//! Human-in-the-loop consent
//!
//! A consent prompt is an async request/response pair. The broker hands
//! each request to whatever UI surface holds the receiving end of its
//! channel and parks the caller on a oneshot until that surface calls
//! [`ConsentBroker::resolve`], or until the timeout resolves it as denied.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::core::{PilotError, Result};

/// Choices offered when the caller gives none
pub const DEFAULT_CHOICES: [&str; 2] = ["Allow", "Deny"];

/// A prompt waiting for a human
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentRequest {
    pub id: u64,
    pub question: String,
    pub choices: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// How long the broker waits for this answer; `None` waits forever
    #[serde(
        rename = "timeoutMs",
        serialize_with = "millis::serialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub timeout: Option<Duration>,
}

mod millis {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_u64(d.as_millis() as u64),
            None => s.serialize_none(),
        }
    }
}

/// How the UI answered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsentResolution {
    /// Index into the request's choices
    Choice(usize),
    /// Dismissed without picking anything
    Dismissed,
}

/// Answer handed back to the caller. The first choice is the consenting one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentResponse {
    pub answer: String,
    pub choice_index: usize,
    pub consent: bool,
}

/// Routes consent requests to a UI and waits for the answers
pub struct ConsentBroker {
    next_id: AtomicU64,
    pending: Mutex<HashMap<u64, PendingConsent>>,
    requests: mpsc::UnboundedSender<ConsentRequest>,
    timeout: Option<Duration>,
}

struct PendingConsent {
    choices: Vec<String>,
    reply: oneshot::Sender<ConsentResolution>,
}

impl ConsentBroker {
    /// Create a broker plus the receiving end the UI listens on.
    /// `timeout` of `None` waits for an answer indefinitely.
    pub fn new(timeout: Option<Duration>) -> (Self, mpsc::UnboundedReceiver<ConsentRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let broker = Self {
            next_id: AtomicU64::new(1),
            pending: Mutex::new(HashMap::new()),
            requests: tx,
            timeout,
        };
        (broker, rx)
    }

    /// Broker with no UI attached; every request is denied at once
    pub fn unattended() -> Self {
        let (broker, _rx) = Self::new(Some(Duration::ZERO));
        broker
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Ask the user and wait for the answer.
    ///
    /// `timeout` overrides the broker default for this request. Timeouts
    /// return [`PilotError::ConsentTimeout`]; a dismissed prompt or a missing
    /// UI returns [`PilotError::ConsentDenied`].
    pub async fn ask(
        &self,
        question: &str,
        choices: &[String],
        host: Option<&str>,
        timeout: Option<Duration>,
    ) -> Result<ConsentResponse> {
        let choices: Vec<String> = if choices.is_empty() {
            DEFAULT_CHOICES.iter().map(|c| c.to_string()).collect()
        } else {
            choices.to_vec()
        };

        let limit = timeout.or(self.timeout);
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.lock_pending().insert(
            id,
            PendingConsent {
                choices: choices.clone(),
                reply: tx,
            },
        );

        let request = ConsentRequest {
            id,
            question: question.to_string(),
            choices: choices.clone(),
            host: host.map(str::to_string),
            timeout: limit,
        };
        if self.requests.send(request).is_err() {
            self.lock_pending().remove(&id);
            debug!("Consent request {} has no listener", id);
            return Err(PilotError::ConsentDenied("no consent surface attached".into()));
        }

        let resolution = match limit {
            Some(limit) => match tokio::time::timeout(limit, rx).await {
                Ok(received) => received,
                Err(_) => {
                    self.lock_pending().remove(&id);
                    warn!("Consent request {} timed out after {:?}", id, limit);
                    return Err(PilotError::ConsentTimeout);
                }
            },
            None => rx.await,
        };

        match resolution {
            Ok(ConsentResolution::Choice(index)) if index < choices.len() => Ok(ConsentResponse {
                answer: choices[index].clone(),
                choice_index: index,
                consent: index == 0,
            }),
            Ok(_) => Err(PilotError::ConsentDenied("prompt dismissed".into())),
            Err(_) => Err(PilotError::ConsentDenied("consent surface went away".into())),
        }
    }

    /// Answer a pending request. Returns false if it is unknown or already
    /// resolved, or if the choice index is out of range.
    pub fn resolve(&self, id: u64, resolution: ConsentResolution) -> bool {
        let mut pending = self.lock_pending();
        if let ConsentResolution::Choice(index) = resolution {
            match pending.get(&id) {
                Some(entry) if index < entry.choices.len() => {}
                _ => return false,
            }
        }
        match pending.remove(&id) {
            Some(entry) => entry.reply.send(resolution).is_ok(),
            None => false,
        }
    }

    /// Number of prompts still waiting for an answer
    pub fn pending(&self) -> usize {
        self.lock_pending().len()
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, HashMap<u64, PendingConsent>> {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// One-shot permissions granted by an approved consent prompt.
///
/// A grant lets the next mutating action on its host through the policy
/// once, and lapses after its time-to-live.
#[derive(Debug, Default)]
pub struct ConsentGrants {
    grants: Mutex<HashMap<String, Instant>>,
}

impl ConsentGrants {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(&self, host: &str, ttl: Duration) {
        let expires = Instant::now() + ttl;
        self.lock().insert(normalize(host), expires);
    }

    /// Consume the grant for `host`, if one is live
    pub fn take(&self, host: &str) -> bool {
        match self.lock().remove(&normalize(host)) {
            Some(expires) => Instant::now() < expires,
            None => false,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Instant>> {
        self.grants
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn normalize(host: &str) -> String {
    host.trim().trim_end_matches('.').to_ascii_lowercase()
}
