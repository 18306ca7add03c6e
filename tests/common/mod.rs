#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use phoneclaw_lib::agent_engine::history::SessionHistory;
use phoneclaw_lib::agent_engine::{AgentConfig, AgentModels, PhoneAgent};
use phoneclaw_lib::config::AgentMode;
use phoneclaw_lib::device::{DeviceDriver, Screenshot};
use phoneclaw_lib::errors::{PhoneClawError, PhoneClawResult};
use phoneclaw_lib::executor::safety::AutoInteraction;
use phoneclaw_lib::llm::provider::ModelClient;
use phoneclaw_lib::llm::types::{ChatMessage, ModelResponse};
use phoneclaw_lib::protocol::split_response;

/// A model reply as the transport would produce it.
pub fn reply(text: &str) -> ModelResponse {
    let (thinking, action) = split_response(text);
    ModelResponse {
        thinking,
        action,
        raw_content: text.to_string(),
        ..ModelResponse::default()
    }
}

/// Plays back queued replies and records every request it receives.
pub struct ScriptedModel {
    name: String,
    replies: Mutex<VecDeque<PhoneClawResult<ModelResponse>>>,
    /// Replayed forever once the queue is empty.
    repeat: Option<String>,
    requests: Mutex<Vec<Vec<ChatMessage>>>,
    hang: bool,
}

impl ScriptedModel {
    pub fn new(name: &str, replies: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            replies: Mutex::new(replies.iter().map(|r| Ok(reply(r))).collect()),
            repeat: None,
            requests: Mutex::new(Vec::new()),
            hang: false,
        })
    }

    pub fn repeating(name: &str, text: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            replies: Mutex::new(VecDeque::new()),
            repeat: Some(text.into()),
            requests: Mutex::new(Vec::new()),
            hang: false,
        })
    }

    pub fn failing(name: &str, message: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            replies: Mutex::new(VecDeque::from([Err(PhoneClawError::LlmProvider(
                message.into(),
            ))])),
            repeat: None,
            requests: Mutex::new(Vec::new()),
            hang: false,
        })
    }

    /// Never answers.
    pub fn hanging(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            replies: Mutex::new(VecDeque::new()),
            repeat: None,
            requests: Mutex::new(Vec::new()),
            hang: true,
        })
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn request_at(&self, idx: usize) -> Vec<ChatMessage> {
        self.requests.lock().unwrap()[idx].clone()
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn request(&self, messages: &[ChatMessage]) -> PhoneClawResult<ModelResponse> {
        self.requests.lock().unwrap().push(messages.to_vec());
        if self.hang {
            std::future::pending::<()>().await;
        }
        if let Some(next) = self.replies.lock().unwrap().pop_front() {
            return next;
        }
        match &self.repeat {
            Some(text) => Ok(reply(text)),
            None => Err(PhoneClawError::LlmProvider(format!(
                "{}: script exhausted",
                self.name
            ))),
        }
    }
}

/// Records gestures as strings; screenshots are the 1080×2400 placeholder.
#[derive(Default)]
pub struct FakeDevice {
    pub calls: Mutex<Vec<String>>,
    pub fail_gestures: bool,
    pub screenshots: AtomicUsize,
}

impl FakeDevice {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn gesture(&self, entry: String) -> PhoneClawResult<()> {
        if self.fail_gestures {
            return Err(PhoneClawError::Device("device offline".into()));
        }
        self.calls.lock().unwrap().push(entry);
        Ok(())
    }
}

#[async_trait]
impl DeviceDriver for FakeDevice {
    async fn tap(&self, x: i32, y: i32) -> PhoneClawResult<()> {
        self.gesture(format!("tap {x} {y}"))
    }

    async fn double_tap(&self, x: i32, y: i32) -> PhoneClawResult<()> {
        self.gesture(format!("double_tap {x} {y}"))
    }

    async fn long_press(&self, x: i32, y: i32, duration_ms: u64) -> PhoneClawResult<()> {
        self.gesture(format!("long_press {x} {y} {duration_ms}"))
    }

    async fn swipe(
        &self,
        x1: i32,
        y1: i32,
        x2: i32,
        y2: i32,
        _duration_ms: Option<u64>,
    ) -> PhoneClawResult<()> {
        self.gesture(format!("swipe {x1} {y1} {x2} {y2}"))
    }

    async fn back(&self) -> PhoneClawResult<()> {
        self.gesture("back".into())
    }

    async fn home(&self) -> PhoneClawResult<()> {
        self.gesture("home".into())
    }

    async fn type_text(&self, text: &str) -> PhoneClawResult<()> {
        self.gesture(format!("type {text}"))
    }

    async fn launch(&self, app: &str) -> PhoneClawResult<bool> {
        self.gesture(format!("launch {app}"))?;
        Ok(true)
    }

    async fn current_app(&self) -> String {
        "System Home".into()
    }

    async fn screenshot(&self, _timeout: Duration) -> PhoneClawResult<Screenshot> {
        self.screenshots.fetch_add(1, Ordering::SeqCst);
        Ok(Screenshot::fallback(false))
    }
}

pub fn config(mode: AgentMode, max_steps: u32) -> AgentConfig {
    let mut config = AgentConfig {
        max_steps,
        mode,
        ..AgentConfig::default()
    };
    if mode == AgentMode::TwoTier {
        config.history_limit = Some(5);
    }
    config
}

pub fn agent(
    config: AgentConfig,
    models: AgentModels,
    device: Arc<FakeDevice>,
    sessions: &std::path::Path,
) -> PhoneAgent {
    PhoneAgent::with_session(
        config,
        models,
        device,
        Arc::new(AutoInteraction),
        SessionHistory::in_dir(sessions),
    )
}
