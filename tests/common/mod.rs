//! Shared helpers for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

use pagepilot::automation::{
    AuditLog, BoundingBox, ConsentBroker, PageAgent, PageProvider, PermissionPolicy,
};
use pagepilot::{Config, Result, ToolRegistry};

/// Page that records everything and answers every script with success
pub struct RecordingPage {
    pub scripts: Mutex<Vec<String>>,
    pub navigations: Mutex<Vec<String>>,
    pub captures: Mutex<Vec<Option<BoundingBox>>>,
    url: Mutex<Option<String>>,
}

impl RecordingPage {
    pub fn at(url: &str) -> Self {
        Self {
            scripts: Mutex::new(Vec::new()),
            navigations: Mutex::new(Vec::new()),
            captures: Mutex::new(Vec::new()),
            url: Mutex::new(Some(url.to_string())),
        }
    }

    pub fn scripts(&self) -> Vec<String> {
        self.scripts.lock().unwrap().clone()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.navigations.lock().unwrap().clone()
    }

    pub fn side_effects(&self) -> usize {
        self.scripts.lock().unwrap().len()
            + self.navigations.lock().unwrap().len()
            + self.captures.lock().unwrap().len()
    }
}

#[async_trait]
impl PageProvider for RecordingPage {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.navigations.lock().unwrap().push(url.to_string());
        *self.url.lock().unwrap() = Some(url.to_string());
        Ok(())
    }

    async fn evaluate_script(&self, script: &str) -> Result<Value> {
        self.scripts.lock().unwrap().push(script.to_string());
        let reply = json!({
            "ok": true,
            "satisfied": true,
            "total": 0,
            "elements": [],
            "rect": {"x": 10.0, "y": 10.0, "width": 50.0, "height": 20.0},
        });
        Ok(Value::String(reply.to_string()))
    }

    async fn capture_image(&self, rect: Option<BoundingBox>) -> Result<Vec<u8>> {
        self.captures.lock().unwrap().push(rect);
        Ok(vec![1, 2, 3])
    }

    async fn current_url(&self) -> Result<Option<String>> {
        Ok(self.url.lock().unwrap().clone())
    }
}

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.agent.min_action_interval_ms = 50;
    config.agent.discovery_timeout_ms = 200;
    config.agent.poll_interval_ms = 50;
    config
}

pub fn registry(page: Arc<RecordingPage>, audit: AuditLog) -> ToolRegistry {
    let config = test_config();
    let agent = PageAgent::new(
        page,
        &config,
        PermissionPolicy::from_config(&config.policy),
        Arc::new(audit),
        Arc::new(ConsentBroker::unattended()),
    );
    ToolRegistry::new(Arc::new(agent))
}
