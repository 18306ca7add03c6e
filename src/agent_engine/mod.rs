pub mod engine;
pub mod history;
pub mod loop_control;
pub mod prompts;
pub mod state;

pub use engine::{AgentModels, PhoneAgent};
pub use state::{AgentConfig, StepPhase, StepRecord, StepResult};
