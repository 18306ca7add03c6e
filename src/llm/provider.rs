use async_trait::async_trait;

use crate::errors::PhoneClawResult;
use crate::llm::types::{ChatMessage, ModelResponse};

/// A chat model bound to one role's provider, model and sampling settings.
/// The orchestrator only talks to models through this trait.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Identifier used in logs.
    fn name(&self) -> &str;

    /// Sends the conversation and returns the reply split into thinking and action.
    async fn request(&self, messages: &[ChatMessage]) -> PhoneClawResult<ModelResponse>;
}
