// Human-in-the-loop hooks for sensitive taps and manual takeovers.
use std::io::{BufRead, Write};

/// Blocking prompts the dispatcher can raise. Calls run on a blocking thread,
/// so implementations may wait on stdin or a UI.
pub trait Interaction: Send + Sync {
    /// Returns true when the user approves the sensitive operation.
    fn confirm(&self, message: &str) -> bool;

    /// Returns once the user has finished the manual step.
    fn request_takeover(&self, message: &str);
}

/// Prompts on the terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleInteraction;

impl ConsoleInteraction {
    fn read_line() -> String {
        let mut line = String::new();
        if let Err(e) = std::io::stdin().lock().read_line(&mut line) {
            tracing::warn!(error = %e, "failed to read from stdin");
        }
        line.trim().to_string()
    }
}

impl Interaction for ConsoleInteraction {
    fn confirm(&self, message: &str) -> bool {
        print!("Sensitive operation: {message}\nConfirm? (y/N): ");
        let _ = std::io::stdout().flush();
        is_affirmative(&Self::read_line())
    }

    fn request_takeover(&self, message: &str) {
        println!("Manual step required: {message}");
        print!("Press Enter when done...");
        let _ = std::io::stdout().flush();
        Self::read_line();
    }
}

/// Approves everything and only logs takeovers. For unattended runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoInteraction;

impl Interaction for AutoInteraction {
    fn confirm(&self, message: &str) -> bool {
        tracing::info!(message, "auto-confirming sensitive operation");
        true
    }

    fn request_takeover(&self, message: &str) {
        tracing::warn!(message, "takeover requested in unattended mode, continuing");
    }
}

fn is_affirmative(answer: &str) -> bool {
    matches!(answer.to_ascii_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_explicit_yes_confirms() {
        assert!(is_affirmative("Y"));
        assert!(is_affirmative("yes"));
        assert!(!is_affirmative(""));
        assert!(!is_affirmative("n"));
        assert!(!is_affirmative("sure"));
    }

    #[test]
    fn auto_interaction_approves() {
        assert!(AutoInteraction.confirm("pay 10 yuan"));
        AutoInteraction.request_takeover("enter captcha");
    }
}
