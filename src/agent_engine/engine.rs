use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::agent_engine::history::{summarize_reason, ActionHistory, SessionHistory};
use crate::agent_engine::loop_control::LoopController;
use crate::agent_engine::prompts;
use crate::agent_engine::state::{AgentConfig, StepPhase, StepRecord, StepResult};
use crate::config::AgentMode;
use crate::device::{DeviceDriver, Screenshot};
use crate::errors::{PhoneClawError, PhoneClawResult};
use crate::executor::dispatcher::{ActionDispatcher, DispatchOutcome};
use crate::executor::safety::Interaction;
use crate::llm::provider::ModelClient;
use crate::llm::registry::{ProviderRegistry, Role};
use crate::llm::types::{ChatMessage, ModelResponse};
use crate::protocol::action::ActionCall;
use crate::protocol::coordinates::resolve;
use crate::protocol::decoder::parse_call;
use crate::protocol::plan::decode_plan;

pub const MAX_STEPS_MESSAGE: &str = "Max steps reached";
pub const TASK_REQUIRED_MESSAGE: &str = "Task is required for first step";

/// The models an agent talks to, one set per mode.
#[derive(Clone)]
pub enum AgentModels {
    /// One vision model answers with `do(...)` / `finish(...)`.
    Single { agent: Arc<dyn ModelClient> },
    /// Describer summarizes the screen, planner decides, locator finds coordinates.
    TwoTier {
        describer: Arc<dyn ModelClient>,
        planner: Arc<dyn ModelClient>,
        locator: Arc<dyn ModelClient>,
    },
}

impl AgentModels {
    pub fn from_registry(registry: &ProviderRegistry, mode: AgentMode) -> PhoneClawResult<Self> {
        Ok(match mode {
            AgentMode::Single => Self::Single {
                agent: registry.client_for_role(Role::Agent)?,
            },
            AgentMode::TwoTier => Self::TwoTier {
                describer: registry.client_for_role(Role::Describer)?,
                planner: registry.client_for_role(Role::Planner)?,
                locator: registry.client_for_role(Role::Locator)?,
            },
        })
    }

    pub fn mode(&self) -> AgentMode {
        match self {
            Self::Single { .. } => AgentMode::Single,
            Self::TwoTier { .. } => AgentMode::TwoTier,
        }
    }
}

/// What the models decided for one step, before dispatch.
struct Decision {
    call: ActionCall,
    thinking: String,
    /// Model text the call came from, kept for the conversation context.
    answer: String,
}

/// Drives one device through the capture, decide, dispatch, record loop.
///
/// An instance owns its session state and must not be stepped concurrently;
/// run parallel tasks on separate instances with separate devices.
pub struct PhoneAgent {
    config: AgentConfig,
    models: AgentModels,
    device: Arc<dyn DeviceDriver>,
    dispatcher: ActionDispatcher,
    loop_ctrl: LoopController,
    history: ActionHistory,
    session: SessionHistory,
    context: Vec<ChatMessage>,
    task: String,
    phase: StepPhase,
    span: tracing::Span,
}

impl PhoneAgent {
    pub fn new(
        config: AgentConfig,
        models: AgentModels,
        device: Arc<dyn DeviceDriver>,
        interaction: Arc<dyn Interaction>,
    ) -> Self {
        Self::with_session(config, models, device, interaction, SessionHistory::new())
    }

    pub fn with_session(
        config: AgentConfig,
        models: AgentModels,
        device: Arc<dyn DeviceDriver>,
        interaction: Arc<dyn Interaction>,
        session: SessionHistory,
    ) -> Self {
        let span = session_span(&session, models.mode());
        Self {
            loop_ctrl: LoopController::new(config.max_steps),
            dispatcher: ActionDispatcher::new(Arc::clone(&device), interaction),
            config,
            models,
            device,
            history: ActionHistory::default(),
            session,
            context: Vec::new(),
            task: String::new(),
            phase: StepPhase::Idle,
            span,
        }
    }

    pub fn step_count(&self) -> u32 {
        self.loop_ctrl.steps()
    }

    pub fn history(&self) -> &ActionHistory {
        &self.history
    }

    pub fn phase(&self) -> StepPhase {
        self.phase
    }

    pub fn session_id(&self) -> &str {
        &self.session.session_id
    }

    /// Conversation sent to the single model. Empty in two-tier mode.
    pub fn context(&self) -> &[ChatMessage] {
        &self.context
    }

    /// Cancelling the token ends the current step with "Task cancelled".
    pub fn cancellation_token(&self) -> CancellationToken {
        self.loop_ctrl.token()
    }

    /// Clears conversation, counters, task and history, and opens a new session file.
    pub fn reset(&mut self) {
        self.context.clear();
        self.loop_ctrl.reset();
        self.history.clear();
        self.task.clear();
        self.phase = StepPhase::Idle;
        self.session.restart();
        self.span = session_span(&self.session, self.models.mode());
    }

    /// Runs `task` until a step finishes or the step limit is hit.
    pub async fn run(&mut self, task: &str) -> String {
        self.reset();
        self.task = task.to_string();
        let span = self.span.clone();
        async move {
            tracing::info!(task, max_steps = self.config.max_steps, "task started");
            let result = self.execute_step(Some(task), true).await;
            if result.finished {
                return result.message;
            }
            while !self.loop_ctrl.reached_limit() {
                let result = self.execute_step(None, false).await;
                if result.finished {
                    return result.message;
                }
            }
            tracing::warn!(steps = self.loop_ctrl.steps(), "step limit reached");
            MAX_STEPS_MESSAGE.to_string()
        }
        .instrument(span)
        .await
    }

    /// Runs a single step. The first step of a session needs the task.
    pub async fn step(&mut self, task: Option<&str>) -> StepResult {
        let task = task.filter(|t| !t.trim().is_empty());
        let is_first = self.loop_ctrl.steps() == 0;
        if is_first {
            let Some(task) = task else {
                return StepResult::terminal_failure(TASK_REQUIRED_MESSAGE);
            };
            self.task = task.to_string();
        }
        let span = self.span.clone();
        self.execute_step(task, is_first).instrument(span).await
    }

    fn enter(&mut self, phase: StepPhase) {
        self.phase = phase;
        tracing::debug!(?phase, step = self.loop_ctrl.steps(), "phase");
    }

    async fn execute_step(&mut self, prompt: Option<&str>, is_first: bool) -> StepResult {
        let step = match self.loop_ctrl.begin_step() {
            Ok(step) => step,
            Err(e) => return self.fail(e),
        };
        self.enter(StepPhase::CaptureScreen);
        let screenshot = self.capture().await;
        let current_app = self.device.current_app().await;
        let screen_info = prompts::screen_info(&current_app);
        tracing::info!(step, app = %current_app, fallback = screenshot.is_fallback, "screen captured");

        let models = self.models.clone();
        let decided = match &models {
            AgentModels::Single { agent } => {
                self.decide_single(agent.as_ref(), prompt, &screen_info, &screenshot, is_first)
                    .await
            }
            AgentModels::TwoTier {
                describer,
                planner,
                locator,
            } => {
                self.decide_two_tier(
                    describer.as_ref(),
                    planner.as_ref(),
                    locator.as_ref(),
                    step,
                    &screen_info,
                    &screenshot,
                )
                .await
            }
        };
        for message in &mut self.context {
            message.strip_images();
        }

        let Decision {
            mut call,
            thinking,
            answer,
        } = match decided {
            Ok(decision) => decision,
            Err(PhoneClawError::Cancelled) => return self.fail(PhoneClawError::Cancelled),
            Err(e) => {
                tracing::error!(step, error = %e, "model error");
                return self.fail_with(format!("Model error: {e}"));
            }
        };

        self.enter(StepPhase::Dispatch);
        let outcome = match self
            .dispatcher
            .execute(&call, screenshot.width, screenshot.height)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(step, error = %e, "dispatch failed, finishing");
                call = ActionCall::finish(e.to_string());
                let mut outcome = self
                    .dispatcher
                    .execute(&call, screenshot.width, screenshot.height)
                    .await
                    .unwrap_or_else(|e| DispatchOutcome {
                        success: false,
                        should_finish: true,
                        message: e.to_string(),
                    });
                outcome.success = false;
                outcome
            }
        };

        self.enter(StepPhase::RecordHistory);
        let record = StepRecord {
            action_label: call.label().to_string(),
            reason_summary: summarize_reason(&thinking),
            success: outcome.success,
        };
        if let Err(e) = self.session.append(step, &self.task, &record) {
            tracing::warn!(error = %e, "could not persist step");
        }
        self.history.push(record);

        if matches!(self.models, AgentModels::Single { .. }) {
            self.context.push(ChatMessage::assistant(format!(
                "<thinking>{thinking}</thinking>\n<answer>{answer}</answer>"
            )));
        }

        let finished = call.is_finish() || outcome.should_finish;
        self.enter(if finished {
            StepPhase::Finished
        } else {
            StepPhase::Continue
        });
        tracing::info!(
            step,
            action = call.label(),
            success = outcome.success,
            finished,
            message = %outcome.message,
            "step complete"
        );

        StepResult {
            success: outcome.success,
            finished,
            action: call.to_action().ok(),
            thinking,
            message: outcome.message,
        }
    }

    async fn capture(&self) -> Screenshot {
        match self.device.screenshot(self.config.screenshot_timeout).await {
            Ok(shot) => {
                if shot.is_sensitive {
                    tracing::warn!("screen is protected, using placeholder");
                }
                shot
            }
            Err(e) => {
                tracing::warn!(error = %e, "screenshot failed, using placeholder");
                Screenshot::fallback(false)
            }
        }
    }

    async fn decide_single(
        &mut self,
        agent: &dyn ModelClient,
        prompt: Option<&str>,
        screen_info: &str,
        screenshot: &Screenshot,
        is_first: bool,
    ) -> PhoneClawResult<Decision> {
        let image = screenshot.to_base64();
        if is_first {
            self.context
                .push(ChatMessage::system(prompts::agent_prompt(self.config.lang)));
            let task = prompt.unwrap_or(&self.task);
            self.context.push(ChatMessage::user(
                prompts::first_turn(task, screen_info),
                Some(&image),
            ));
        } else {
            self.context.push(ChatMessage::user(
                prompts::followup_turn(screen_info),
                Some(&image),
            ));
        }

        self.enter(StepPhase::Plan);
        let response = self.request(agent, &self.context).await?;
        let call = parse_call(&response.action).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "unparseable action, finishing with raw text");
            ActionCall::finish(response.action.clone())
        });
        Ok(Decision {
            call,
            thinking: response.thinking,
            answer: response.action,
        })
    }

    async fn decide_two_tier(
        &mut self,
        describer: &dyn ModelClient,
        planner: &dyn ModelClient,
        locator: &dyn ModelClient,
        step: u32,
        screen_info: &str,
        screenshot: &Screenshot,
    ) -> PhoneClawResult<Decision> {
        let lang = self.config.lang;
        let image = screenshot.to_base64();

        self.enter(StepPhase::DescribeScreen);
        let describe = [
            ChatMessage::system(prompts::describer_prompt(lang)),
            ChatMessage::user(screen_info, Some(&image)),
        ];
        let description = match self.request(describer, &describe).await {
            Ok(response) => response.raw_content,
            Err(PhoneClawError::Cancelled) => return Err(PhoneClawError::Cancelled),
            Err(e) => {
                tracing::warn!(error = %e, "screen description failed");
                prompts::describe_failed(lang).to_string()
            }
        };
        if self.config.verbose {
            tracing::info!(description = %description, "screen described");
        }

        self.loop_ctrl.check_cancelled()?;
        self.enter(StepPhase::Plan);
        let context = prompts::planner_context(
            lang,
            &self.task,
            step,
            self.config.max_steps,
            &description,
            &self.history.trail(self.config.history_limit),
        );
        let planning = [
            ChatMessage::system(prompts::planner_prompt(lang)),
            ChatMessage::user(context, None),
        ];
        let response = self.request(planner, &planning).await?;
        let plan = decode_plan(&response.raw_content);
        if self.config.verbose {
            tracing::info!(
                action = %plan.action_type,
                reason = %plan.reason,
                params = %serde_json::Value::Object(plan.parameters.clone()),
                "plan"
            );
        }

        let points = if plan.needs_coordinates() && !plan.is_terminal() {
            self.loop_ctrl.check_cancelled()?;
            self.enter(StepPhase::ResolveCoordinates);
            let target = plan.target_description(lang.as_str());
            let locate = [
                ChatMessage::system(prompts::locator_prompt(lang, &target)),
                ChatMessage::user(prompts::locator_request(lang, screen_info), Some(&image)),
            ];
            let answer = self.request(locator, &locate).await?;
            let text = if answer.action.trim().is_empty() {
                &answer.raw_content
            } else {
                &answer.action
            };
            let points = resolve(text)?;
            tracing::info!(description = %target, points = ?points, "located");
            points
        } else {
            Vec::new()
        };

        Ok(Decision {
            call: plan.to_call(&points)?,
            thinking: plan.thought,
            answer: response.raw_content,
        })
    }

    /// A model request that yields `Cancelled` as soon as the token fires.
    async fn request(
        &self,
        model: &dyn ModelClient,
        messages: &[ChatMessage],
    ) -> PhoneClawResult<ModelResponse> {
        self.loop_ctrl.check_cancelled()?;
        tracing::debug!(model = model.name(), messages = messages.len(), "model request");
        cancellable(self.loop_ctrl.token(), model.request(messages)).await
    }

    fn fail(&mut self, error: PhoneClawError) -> StepResult {
        self.fail_with(error.to_string())
    }

    fn fail_with(&mut self, message: String) -> StepResult {
        self.enter(StepPhase::Failed);
        StepResult::terminal_failure(message)
    }
}

fn session_span(session: &SessionHistory, mode: AgentMode) -> tracing::Span {
    tracing::info_span!("agent", session = %session.session_id, %mode)
}

async fn cancellable<T>(
    token: CancellationToken,
    fut: impl Future<Output = PhoneClawResult<T>>,
) -> PhoneClawResult<T> {
    tokio::select! {
        _ = token.cancelled() => Err(PhoneClawError::Cancelled),
        result = fut => result,
    }
}
