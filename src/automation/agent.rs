//! Page agent
//!
//! Per-tab coordinator. Owns the bridge into one page and the services the
//! guarded entry point [`PageAgent::perform`] consults: permission policy,
//! audit log, consent broker. The individual operations (`click`,
//! `wait_for`, ...) run unguarded and unthrottled; callers outside this
//! module go through `perform` or the tool registry.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, warn};
use url::Url;

use crate::automation::action::{
    redact_parameters, Action, ActionKind, BoundingBox, ElementSummary, StepOutcome,
    WaitCondition,
};
use crate::automation::audit::{AuditEntry, AuditLog};
use crate::automation::bridge::{ExecutionBridge, RuntimeReply};
use crate::automation::consent::{ConsentBroker, ConsentGrants, ConsentResponse};
use crate::automation::locator::{Locator, ScrollDirection};
use crate::automation::page::PageProvider;
use crate::automation::policy::PermissionPolicy;
use crate::automation::retry::RetryPolicy;
use crate::automation::runtime::RuntimeCall;
use crate::core::config::AgentConfig;
use crate::core::{Config, PilotError, Result};

/// Element categories reported by `observe`, with the role each one queries
pub const OBSERVE_CATEGORIES: [(&str, &str); 5] = [
    ("buttons", "button"),
    ("links", "link"),
    ("textboxes", "textbox"),
    ("comboboxes", "combobox"),
    ("checkboxes", "checkbox"),
];

/// Default elements sampled per `observe` category
pub const DEFAULT_OBSERVE_SAMPLE: usize = 8;

/// Upper bound on elements sampled per `observe` category
pub const MAX_OBSERVE_SAMPLE: usize = 25;

const ALLOWED_SCHEMES: [&str; 4] = ["http", "https", "file", "about"];

pub struct PageAgent {
    page: Arc<dyn PageProvider>,
    bridge: ExecutionBridge,
    config: AgentConfig,
    policy: PermissionPolicy,
    audit: Arc<AuditLog>,
    consent: Arc<ConsentBroker>,
    grants: ConsentGrants,
    grant_ttl: Duration,
    last_mutation: Mutex<Option<Instant>>,
}

impl PageAgent {
    pub fn new(
        page: Arc<dyn PageProvider>,
        config: &Config,
        policy: PermissionPolicy,
        audit: Arc<AuditLog>,
        consent: Arc<ConsentBroker>,
    ) -> Self {
        let bridge = ExecutionBridge::new(
            page.clone(),
            Duration::from_millis(config.browser.eval_timeout_ms),
            config.agent.runtime_ready_timeout(),
        )
        .with_injection(config.browser.inject_runtime);

        Self {
            page,
            bridge,
            config: config.agent.clone(),
            policy,
            audit,
            consent,
            grants: ConsentGrants::new(),
            grant_ttl: config.consent.grant_ttl(),
            last_mutation: Mutex::new(None),
        }
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    pub fn bridge(&self) -> &ExecutionBridge {
        &self.bridge
    }

    /// Host of the document currently loaded, lowercased
    pub async fn current_host(&self) -> Option<String> {
        let url = match self.page.current_url().await {
            Ok(Some(url)) => url,
            Ok(None) => return None,
            Err(e) => {
                debug!("Could not read current URL: {}", e);
                return None;
            }
        };
        Url::parse(&url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
    }

    // ========================================================================
    // Guarded entry points
    // ========================================================================

    /// Run one action through policy, consent grants and the audit log.
    ///
    /// Exactly one audit entry is written per call, whether the action was
    /// denied, failed or succeeded.
    pub async fn perform(&self, action: &Action) -> Result<Value> {
        let kind = action.kind();
        let host = self.current_host().await;
        let decision = self.policy.evaluate(kind, host.as_deref());
        let mut entry = AuditEntry::new(
            host.as_deref(),
            kind,
            action.audit_parameters(),
            &decision,
        );

        if !decision.allowed {
            let granted = host.as_deref().is_some_and(|h| self.grants.take(h));
            if !granted {
                let reason = decision.reason.unwrap_or_default();
                warn!("Policy denied {} on {:?}: {}", kind, host, reason);
                self.record(entry);
                return Err(PilotError::denied(reason));
            }
            debug!("Consent grant used for {} on {:?}", kind, host);
            entry = entry.with_consent(false, Some(true));
        }

        if kind.is_throttled() {
            self.throttle().await;
        }
        let result = self.run(action).await;

        if let Action::AskUser { .. } = action {
            let consented = result
                .as_ref()
                .ok()
                .and_then(|v| v.get("consent"))
                .and_then(Value::as_bool)
                .unwrap_or(false);
            entry = entry.with_consent(true, Some(consented));
        }
        entry = match &result {
            Ok(_) => entry.with_outcome(true, None),
            Err(e) => entry.with_outcome(false, Some(e.to_string())),
        };
        self.record(entry);
        result
    }

    /// Run a plan strictly in order, one outcome per step.
    /// A failed step does not stop the plan.
    pub async fn execute(&self, plan: &[Action]) -> Vec<StepOutcome> {
        let mut outcomes = Vec::with_capacity(plan.len());
        for (index, action) in plan.iter().enumerate() {
            let outcome = match self.perform(action).await {
                Ok(data) => StepOutcome {
                    index,
                    action: action.kind(),
                    ok: true,
                    data: Some(data),
                    message: None,
                },
                Err(e) => StepOutcome {
                    index,
                    action: action.kind(),
                    ok: false,
                    data: e
                        .is_policy_denial()
                        .then(|| json!({ "policyDenied": true })),
                    message: Some(e.to_string()),
                },
            };
            outcomes.push(outcome);
        }
        outcomes
    }

    /// Record a call whose arguments never decoded into an action. The entry
    /// carries the verdict the action would have met on the current host.
    pub async fn record_rejected(&self, kind: ActionKind, arguments: &Value, error: &PilotError) {
        let host = self.current_host().await;
        let decision = self.policy.evaluate(kind, host.as_deref());
        let entry = AuditEntry::new(
            host.as_deref(),
            kind,
            redact_parameters(kind, arguments.clone()),
            &decision,
        )
        .with_outcome(false, Some(error.to_string()));
        self.record(entry);
    }

    fn record(&self, entry: AuditEntry) {
        if let Err(e) = self.audit.append(entry) {
            warn!("Audit entry not persisted: {}", e);
        }
    }

    async fn run(&self, action: &Action) -> Result<Value> {
        match action {
            Action::Navigate { url } => self.navigate(url).await,
            Action::FindElements { locator } => {
                let elements = self.request_elements(locator.as_ref()).await?;
                Ok(json!({ "count": elements.len(), "elements": elements }))
            }
            Action::Observe { sample } => self.observe(sample.unwrap_or(DEFAULT_OBSERVE_SAMPLE)).await,
            Action::Click { locator } => self.click(locator).await,
            Action::TypeText {
                locator,
                text,
                submit,
            } => self.type_text(locator.as_ref(), text, *submit).await,
            Action::Scroll {
                locator,
                direction,
                amount_px,
            } => self.scroll(locator.as_ref(), *direction, *amount_px).await,
            Action::Select { locator, value } => self.select(locator, value).await,
            Action::WaitFor {
                condition,
                timeout_ms,
            } => {
                let budget = timeout_ms
                    .map(Duration::from_millis)
                    .unwrap_or_else(|| Duration::from_millis(self.config.default_wait_timeout_ms));
                let started = Instant::now();
                if self.wait_for(condition, budget).await? {
                    Ok(json!({
                        "satisfied": true,
                        "waitedMs": started.elapsed().as_millis() as u64,
                    }))
                } else {
                    Err(PilotError::Other(format!(
                        "condition not met within {} ms",
                        budget.as_millis()
                    )))
                }
            }
            Action::Extract {
                locator,
                max_length,
            } => self.extract(locator.as_ref(), *max_length).await,
            Action::SwitchTab { target } => self.switch_tab(target).await,
            Action::AskUser {
                question,
                choices,
                timeout_ms,
            } => {
                let response = self
                    .ask_user(question, choices, timeout_ms.map(Duration::from_millis))
                    .await?;
                Ok(serde_json::to_value(response)?)
            }
            Action::Snapshot { locator } => match self.take_snapshot_base64(locator.as_ref()).await {
                Some(image) => Ok(json!({
                    "image": image,
                    "mimeType": "image/png",
                    "cropped": locator.as_ref().is_some_and(|l| !l.is_empty()),
                })),
                None => Err(PilotError::page("snapshot could not be captured")),
            },
        }
    }

    // ========================================================================
    // Discovery
    // ========================================================================

    /// Poll for elements matching `locator` until some show up or the
    /// discovery budget runs out. `None` or an empty locator enumerates the
    /// page's interactive elements.
    ///
    /// Returns no later than the discovery timeout plus one poll interval,
    /// however slowly the page answers.
    pub async fn request_elements(&self, locator: Option<&Locator>) -> Result<Vec<ElementSummary>> {
        let budget = self.config.discovery_timeout();
        let deadline = Instant::now() + budget;
        self.bridge.ensure_runtime_ready().await?;
        let locator = locator.filter(|l| !l.is_empty());
        let policy = RetryPolicy::new(self.config.poll_interval(), budget).until(deadline);

        let found = policy
            .poll(|| async move {
                match self.find_once(locator).await {
                    Ok(list) if !list.is_empty() => Some(list),
                    Ok(_) => None,
                    Err(e) => {
                        debug!("Discovery attempt failed: {}", e);
                        None
                    }
                }
            })
            .await;

        match found {
            Some(list) => Ok(list),
            // one last look, given a single interval
            None => match timeout(self.config.poll_interval(), self.find_once(locator)).await {
                Ok(result) => result,
                Err(_) => {
                    debug!("Final discovery attempt ran out of time");
                    Ok(Vec::new())
                }
            },
        }
    }

    /// Sample each element category once
    pub async fn observe(&self, sample: usize) -> Result<Value> {
        self.bridge.ensure_runtime_ready().await?;
        let sample = sample.clamp(1, MAX_OBSERVE_SAMPLE);

        let mut categories = serde_json::Map::new();
        for (category, role) in OBSERVE_CATEGORIES {
            let locator = Locator::role(role);
            let (total, elements) = self.find_with_total(Some(&locator)).await?;
            let elements: Vec<ElementSummary> = elements.into_iter().take(sample).collect();
            categories.insert(
                category.to_string(),
                json!({
                    "locator": locator,
                    "total": total,
                    "elements": elements,
                }),
            );
        }
        Ok(json!({ "sample": sample, "categories": categories }))
    }

    async fn find_once(&self, locator: Option<&Locator>) -> Result<Vec<ElementSummary>> {
        self.find_with_total(locator).await.map(|(_, list)| list)
    }

    async fn find_with_total(&self, locator: Option<&Locator>) -> Result<(usize, Vec<ElementSummary>)> {
        let reply = self
            .bridge
            .call(RuntimeCall::FindElements, json!([locator]))
            .await;
        if !reply.ok() {
            return Err(reply_error(&reply));
        }
        let elements: Vec<ElementSummary> = match reply.get("elements") {
            Some(list) => serde_json::from_value(list.clone())
                .map_err(|e| PilotError::page(format!("unexpected element list: {}", e)))?,
            None => Vec::new(),
        };
        let total = reply
            .get("total")
            .and_then(Value::as_u64)
            .map(|t| t as usize)
            .unwrap_or(elements.len());
        Ok((total, elements.into_iter().map(ElementSummary::bounded).collect()))
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Sleep off whatever is left of the minimum spacing since the last
    /// mutating action, then claim the slot. `perform` calls this for every
    /// throttled action kind that passed the policy.
    async fn throttle(&self) {
        let mut last = self.last_mutation.lock().await;
        let min = self.config.min_action_interval();
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < min {
                let wait = min - elapsed;
                debug!("Throttling mutation for {:?}", wait);
                sleep(wait).await;
            }
        }
        *last = Some(Instant::now());
    }

    pub async fn click(&self, locator: &Locator) -> Result<Value> {
        require_locator(locator, ActionKind::Click)?;
        self.bridge.ensure_runtime_ready().await?;
        debug!("Clicking {}", locator.describe());

        let reply = self.bridge.call(RuntimeCall::Click, json!([locator])).await;
        if !reply.ok() {
            return Err(reply_error(&reply));
        }
        Ok(json!({ "element": reply.get("element") }))
    }

    /// Type into a field. Without a semantic locator the first textbox is
    /// used, then the first generic input.
    pub async fn type_text(&self, locator: Option<&Locator>, text: &str, submit: bool) -> Result<Value> {
        self.bridge.ensure_runtime_ready().await?;

        let target = match locator {
            Some(l) if l.is_semantic() => l.clone(),
            other => self.auto_input(other).await?,
        };
        debug!("Typing {} chars into {}", text.chars().count(), target.describe());

        let reply = self
            .bridge
            .call(RuntimeCall::TypeText, json!([target, text, submit]))
            .await;
        if !reply.ok() {
            return Err(reply_error(&reply));
        }
        Ok(json!({
            "submitted": reply.get("submitted").and_then(Value::as_bool).unwrap_or(submit),
            "locator": target,
            "element": reply.get("element"),
        }))
    }

    async fn auto_input(&self, hint: Option<&Locator>) -> Result<Locator> {
        for role in ["textbox", "input"] {
            let mut candidate = Locator::role(role);
            candidate.near = hint.and_then(|h| h.near.clone());
            match self.find_once(Some(&candidate)).await {
                Ok(list) if list.iter().any(|el| el.visible) => return Ok(candidate),
                Ok(_) => {}
                Err(e) => debug!("Input lookup by role {} failed: {}", role, e),
            }
        }
        Err(PilotError::not_found("no input found"))
    }

    pub async fn select(&self, locator: &Locator, value: &str) -> Result<Value> {
        require_locator(locator, ActionKind::Select)?;
        self.bridge.ensure_runtime_ready().await?;
        debug!("Selecting {:?} in {}", value, locator.describe());

        let reply = self
            .bridge
            .call(RuntimeCall::Select, json!([locator, value]))
            .await;
        if !reply.ok() {
            return Err(reply_error(&reply));
        }
        Ok(json!({
            "value": reply.get("value"),
            "label": reply.get("label"),
        }))
    }

    /// Scroll the page, or the element `locator` points at
    pub async fn scroll(
        &self,
        locator: Option<&Locator>,
        direction: ScrollDirection,
        amount_px: Option<u32>,
    ) -> Result<Value> {
        self.bridge.ensure_runtime_ready().await?;

        let locator = locator.filter(|l| !l.is_empty());
        let reply = self
            .bridge
            .call(
                RuntimeCall::Scroll,
                json!([locator, direction.as_str(), amount_px]),
            )
            .await;
        if !reply.ok() {
            return Err(reply_error(&reply));
        }
        Ok(json!({
            "direction": direction.as_str(),
            "scrollX": reply.get("scrollX"),
            "scrollY": reply.get("scrollY"),
        }))
    }

    // ========================================================================
    // Waiting and reading
    // ========================================================================

    /// Wait for `condition` within `budget`.
    ///
    /// Every branch that is set runs in order against one shared deadline:
    /// delay, ready state, selector visibility, network idle. A condition
    /// with nothing set gets a short stabilization sleep instead. A delay
    /// always resolves true after `min(delay, budget)`; a later branch that
    /// does not hold in the time left makes the whole wait false.
    pub async fn wait_for(&self, condition: &WaitCondition, budget: Duration) -> Result<bool> {
        let deadline = Instant::now() + budget;

        if condition.is_empty() {
            sleep(Duration::from_millis(self.config.stabilize_ms).min(budget)).await;
            return Ok(true);
        }
        if let Some(delay) = condition.delay_ms {
            sleep(Duration::from_millis(delay).min(budget)).await;
        }

        let mut predicates = Vec::new();
        if let Some(state) = &condition.ready_state {
            predicates.push(json!({ "readyState": state }));
        }
        if let Some(selector) = &condition.selector {
            predicates.push(json!({ "selector": selector }));
        }
        if condition.network_idle {
            predicates.push(json!({ "networkIdle": true }));
        }
        if predicates.is_empty() {
            return Ok(true);
        }

        let left = deadline.saturating_duration_since(Instant::now());
        match timeout(left, self.bridge.ensure_runtime_ready()).await {
            Ok(ready) => ready?,
            Err(_) => return Ok(false),
        }

        for predicate in &predicates {
            let policy = RetryPolicy::new(self.config.poll_interval(), budget).until(deadline);
            let held = policy
                .poll_until(|| async move {
                    let reply = self
                        .bridge
                        .call(RuntimeCall::WaitFor, json!([predicate, 0]))
                        .await;
                    reply.ok()
                        && reply
                            .get("satisfied")
                            .and_then(Value::as_bool)
                            .unwrap_or(false)
                })
                .await;
            if !held {
                debug!("Wait predicate {} did not hold", predicate);
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Visible text of the matched element, or of the whole page
    pub async fn extract(&self, locator: Option<&Locator>, max_length: Option<usize>) -> Result<Value> {
        self.bridge.ensure_runtime_ready().await?;
        let limit = max_length
            .unwrap_or(self.config.max_extract_chars)
            .clamp(1, self.config.max_extract_chars.max(1));
        let locator = locator.filter(|l| !l.is_empty());

        let reply = self
            .bridge
            .call(RuntimeCall::Extract, json!([locator, limit]))
            .await;
        if !reply.ok() {
            return Err(reply_error(&reply));
        }
        Ok(json!({
            "text": reply.get("text").and_then(Value::as_str).unwrap_or_default(),
            "truncated": reply.get("truncated").and_then(Value::as_bool).unwrap_or(false),
            "title": reply.get("title"),
            "url": reply.get("url"),
        }))
    }

    /// Capture the viewport, or only the element `locator` resolves to,
    /// as base64 PNG. Any failure along the way yields `None`.
    pub async fn take_snapshot_base64(&self, locator: Option<&Locator>) -> Option<String> {
        let rect = match locator.filter(|l| !l.is_empty()) {
            Some(locator) => Some(self.measure(locator).await?),
            None => None,
        };

        match self.page.capture_image(rect).await {
            Ok(bytes) if !bytes.is_empty() => Some(STANDARD.encode(bytes)),
            Ok(_) => {
                warn!("Snapshot capture returned no data");
                None
            }
            Err(e) => {
                warn!("Snapshot capture failed: {}", e);
                None
            }
        }
    }

    async fn measure(&self, locator: &Locator) -> Option<BoundingBox> {
        if let Err(e) = self.bridge.ensure_runtime_ready().await {
            warn!("Snapshot measurement skipped: {}", e);
            return None;
        }
        let reply = self.bridge.call(RuntimeCall::Rect, json!([locator])).await;
        if !reply.ok() {
            debug!("Snapshot measurement failed: {}", reply.error_message());
            return None;
        }
        let rect: BoundingBox = serde_json::from_value(reply.get("rect")?.clone()).ok()?;
        (!rect.is_empty()).then_some(rect)
    }

    // ========================================================================
    // Navigation and consent
    // ========================================================================

    pub async fn navigate(&self, url: &str) -> Result<Value> {
        let parsed = Url::parse(url.trim())
            .map_err(|e| PilotError::invalid(format!("url {:?}: {}", url, e)))?;
        if !ALLOWED_SCHEMES.contains(&parsed.scheme()) {
            return Err(PilotError::invalid(format!(
                "url scheme {} is not allowed",
                parsed.scheme()
            )));
        }

        self.page.navigate(parsed.as_str()).await?;
        self.bridge.reset();
        Ok(json!({ "url": parsed.as_str() }))
    }

    pub async fn switch_tab(&self, target: &str) -> Result<Value> {
        let target = target.trim();
        if target.is_empty() {
            return Err(PilotError::invalid("switchTab needs a target"));
        }
        self.page.switch_tab(target).await?;
        self.bridge.reset();
        Ok(json!({ "target": target, "url": self.page.current_url().await.ok().flatten() }))
    }

    /// Ask the user a question. An approval (first choice) also grants the
    /// next mutating action on the current host a one-shot pass through
    /// the policy.
    pub async fn ask_user(
        &self,
        question: &str,
        choices: &[String],
        timeout: Option<Duration>,
    ) -> Result<ConsentResponse> {
        if question.trim().is_empty() {
            return Err(PilotError::invalid("askUser needs a question"));
        }
        let host = self.current_host().await;
        let response = self
            .consent
            .ask(question, choices, host.as_deref(), timeout)
            .await?;

        if response.consent {
            if let Some(host) = &host {
                self.grants.grant(host, self.grant_ttl);
            }
        }
        Ok(response)
    }
}

fn require_locator(locator: &Locator, kind: ActionKind) -> Result<()> {
    if locator.is_empty() {
        return Err(PilotError::invalid(format!("{} needs a locator", kind)));
    }
    Ok(())
}

fn reply_error(reply: &RuntimeReply) -> PilotError {
    let message = reply.error_message();
    if message.starts_with("no ") {
        PilotError::not_found(message)
    } else {
        PilotError::Other(message)
    }
}
