use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::{AgentMode, AgentSection, Lang};
use crate::protocol::action::Action;

/// Where the orchestrator is within one step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepPhase {
    #[default]
    Idle,
    CaptureScreen,
    DescribeScreen,
    Plan,
    ResolveCoordinates,
    Dispatch,
    RecordHistory,
    Continue,
    Finished,
    Failed,
}

/// Outcome of one orchestration step, terminal when `finished` is set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub success: bool,
    pub finished: bool,
    /// The validated action, absent when the call could not be turned into one.
    pub action: Option<Action>,
    pub thinking: String,
    pub message: String,
}

impl StepResult {
    /// A step that ends the run without having dispatched anything.
    pub fn terminal_failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            finished: true,
            message: message.into(),
            ..Self::default()
        }
    }
}

/// One entry of the action history shown to the planner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    pub action_label: String,
    /// At most 100 characters of the reasoning, with `...` appended when cut.
    pub reason_summary: String,
    pub success: bool,
}

/// Runtime settings of one agent instance.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub max_steps: u32,
    pub lang: Lang,
    pub mode: AgentMode,
    pub history_limit: Option<usize>,
    pub screenshot_timeout: Duration,
    pub verbose: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self::from(&AgentSection::default())
    }
}

impl From<&AgentSection> for AgentConfig {
    fn from(section: &AgentSection) -> Self {
        Self {
            max_steps: section.max_steps,
            lang: section.lang,
            mode: section.mode,
            history_limit: section.effective_history_limit(),
            screenshot_timeout: Duration::from_secs(section.screenshot_timeout_secs),
            verbose: section.verbose,
        }
    }
}
