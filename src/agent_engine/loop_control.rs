use tokio_util::sync::CancellationToken;

use crate::errors::{PhoneClawError, PhoneClawResult};

/// Step budget and cancellation for one agent.
pub struct LoopController {
    max_steps: u32,
    steps: u32,
    cancel: CancellationToken,
}

impl LoopController {
    pub fn new(max_steps: u32) -> Self {
        Self {
            max_steps,
            steps: 0,
            cancel: CancellationToken::new(),
        }
    }

    /// Checks for cancellation, then counts the step. Returns the new step number.
    pub fn begin_step(&mut self) -> PhoneClawResult<u32> {
        self.check_cancelled()?;
        self.steps += 1;
        Ok(self.steps)
    }

    pub fn check_cancelled(&self) -> PhoneClawResult<()> {
        if self.cancel.is_cancelled() {
            return Err(PhoneClawError::Cancelled);
        }
        Ok(())
    }

    pub fn steps(&self) -> u32 {
        self.steps
    }

    pub fn max_steps(&self) -> u32 {
        self.max_steps
    }

    pub fn reached_limit(&self) -> bool {
        self.steps >= self.max_steps
    }

    /// Zeroes the counter. A token that already fired is replaced so the next
    /// task can run; a live one is kept so outstanding clones stay valid.
    pub fn reset(&mut self) {
        self.steps = 0;
        if self.cancel.is_cancelled() {
            self.cancel = CancellationToken::new();
        }
    }

    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}
