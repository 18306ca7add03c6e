use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::device::DeviceDriver;
use crate::errors::{PhoneClawError, PhoneClawResult};
use crate::executor::coordinator::point_to_pixels;
use crate::executor::safety::Interaction;
use crate::protocol::action::{Action, ActionCall, LONG_PRESS_MS};

/// What happened when an action was handed to the device.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DispatchOutcome {
    pub success: bool,
    pub should_finish: bool,
    pub message: String,
}

impl DispatchOutcome {
    fn ok() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            should_finish: false,
            message: message.into(),
        }
    }
}

/// Validates decoded calls and drives the device.
///
/// Problems with the call itself (unknown action, missing parameter, unknown
/// app) come back as unsuccessful outcomes. Device failures come back as
/// [`PhoneClawError::Dispatch`].
pub struct ActionDispatcher {
    device: Arc<dyn DeviceDriver>,
    interaction: Arc<dyn Interaction>,
}

impl ActionDispatcher {
    pub fn new(device: Arc<dyn DeviceDriver>, interaction: Arc<dyn Interaction>) -> Self {
        Self {
            device,
            interaction,
        }
    }

    pub async fn execute(
        &self,
        call: &ActionCall,
        width: u32,
        height: u32,
    ) -> PhoneClawResult<DispatchOutcome> {
        match call.to_action() {
            Ok(action) => self.perform(&action, width, height).await,
            Err(e) => {
                tracing::warn!(action = call.label(), error = %e, "action rejected");
                Ok(DispatchOutcome::failed(e.to_string()))
            }
        }
    }

    pub async fn perform(
        &self,
        action: &Action,
        width: u32,
        height: u32,
    ) -> PhoneClawResult<DispatchOutcome> {
        let kind = action.kind().wire_name();
        tracing::info!(action = %action, width, height, "dispatching");
        let device_err = |e: PhoneClawError| PhoneClawError::Dispatch(format!("{kind} failed: {e}"));

        match action {
            Action::Finish { message } => Ok(DispatchOutcome {
                success: true,
                should_finish: true,
                message: message.clone(),
            }),

            Action::Launch { app } => {
                if self.device.launch(app).await.map_err(device_err)? {
                    Ok(DispatchOutcome::ok())
                } else {
                    Ok(DispatchOutcome::failed(format!("App not found: {app}")))
                }
            }

            Action::Tap { point, message } => {
                if let Some(message) = message {
                    if !self.confirm(message).await? {
                        tracing::info!(message = %message, "sensitive tap refused");
                        return Ok(DispatchOutcome {
                            success: false,
                            should_finish: true,
                            message: "User cancelled sensitive operation".into(),
                        });
                    }
                }
                let (x, y) = point_to_pixels(*point, width, height);
                self.device.tap(x, y).await.map_err(device_err)?;
                Ok(DispatchOutcome::ok())
            }

            Action::Type { text } => {
                self.device.type_text(text).await.map_err(device_err)?;
                Ok(DispatchOutcome::ok())
            }

            Action::Swipe { start, end } => {
                let (x1, y1) = point_to_pixels(*start, width, height);
                let (x2, y2) = point_to_pixels(*end, width, height);
                self.device
                    .swipe(x1, y1, x2, y2, None)
                    .await
                    .map_err(device_err)?;
                Ok(DispatchOutcome::ok())
            }

            Action::Back => {
                self.device.back().await.map_err(device_err)?;
                Ok(DispatchOutcome::ok())
            }

            Action::Home => {
                self.device.home().await.map_err(device_err)?;
                Ok(DispatchOutcome::ok())
            }

            Action::DoubleTap { point } => {
                let (x, y) = point_to_pixels(*point, width, height);
                self.device.double_tap(x, y).await.map_err(device_err)?;
                Ok(DispatchOutcome::ok())
            }

            Action::LongPress { point } => {
                let (x, y) = point_to_pixels(*point, width, height);
                self.device
                    .long_press(x, y, LONG_PRESS_MS)
                    .await
                    .map_err(device_err)?;
                Ok(DispatchOutcome::ok())
            }

            Action::Wait { seconds } => {
                if *seconds > 0.0 {
                    match Duration::try_from_secs_f64(*seconds) {
                        Ok(pause) => tokio::time::sleep(pause).await,
                        Err(_) => {
                            return Ok(DispatchOutcome::failed(format!(
                                "Invalid wait duration: {seconds} seconds"
                            )))
                        }
                    }
                }
                Ok(DispatchOutcome::ok())
            }

            Action::TakeOver { message } => {
                self.takeover(message).await?;
                Ok(DispatchOutcome::ok())
            }
        }
    }

    async fn confirm(&self, message: &str) -> PhoneClawResult<bool> {
        let interaction = Arc::clone(&self.interaction);
        let message = message.to_string();
        tokio::task::spawn_blocking(move || interaction.confirm(&message))
            .await
            .map_err(|e| PhoneClawError::Dispatch(format!("confirmation prompt failed: {e}")))
    }

    async fn takeover(&self, message: &str) -> PhoneClawResult<()> {
        let interaction = Arc::clone(&self.interaction);
        let message = message.to_string();
        tokio::task::spawn_blocking(move || interaction.request_takeover(&message))
            .await
            .map_err(|e| PhoneClawError::Dispatch(format!("takeover prompt failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::device::Screenshot;
    use crate::protocol::decoder::parse_call;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
        fail: bool,
    }

    impl Recorder {
        fn log(&self, entry: String) -> PhoneClawResult<()> {
            if self.fail {
                return Err(PhoneClawError::Device("adb offline".into()));
            }
            self.calls.lock().unwrap().push(entry);
            Ok(())
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DeviceDriver for Recorder {
        async fn tap(&self, x: i32, y: i32) -> PhoneClawResult<()> {
            self.log(format!("tap {x} {y}"))
        }
        async fn double_tap(&self, x: i32, y: i32) -> PhoneClawResult<()> {
            self.log(format!("double_tap {x} {y}"))
        }
        async fn long_press(&self, x: i32, y: i32, ms: u64) -> PhoneClawResult<()> {
            self.log(format!("long_press {x} {y} {ms}"))
        }
        async fn swipe(&self, x1: i32, y1: i32, x2: i32, y2: i32, ms: Option<u64>) -> PhoneClawResult<()> {
            self.log(format!("swipe {x1} {y1} {x2} {y2} {ms:?}"))
        }
        async fn back(&self) -> PhoneClawResult<()> {
            self.log("back".into())
        }
        async fn home(&self) -> PhoneClawResult<()> {
            self.log("home".into())
        }
        async fn type_text(&self, text: &str) -> PhoneClawResult<()> {
            self.log(format!("type {text}"))
        }
        async fn launch(&self, app: &str) -> PhoneClawResult<bool> {
            self.log(format!("launch {app}"))?;
            Ok(app == "微信")
        }
        async fn current_app(&self) -> String {
            "微信".into()
        }
        async fn screenshot(&self, _timeout: Duration) -> PhoneClawResult<Screenshot> {
            Ok(Screenshot::fallback(false))
        }
    }

    struct Scripted {
        approve: bool,
        took_over: AtomicBool,
    }

    impl Interaction for Scripted {
        fn confirm(&self, _message: &str) -> bool {
            self.approve
        }
        fn request_takeover(&self, _message: &str) {
            self.took_over.store(true, Ordering::SeqCst);
        }
    }

    fn dispatcher(device: Arc<Recorder>, approve: bool) -> (ActionDispatcher, Arc<Scripted>) {
        let interaction = Arc::new(Scripted {
            approve,
            took_over: AtomicBool::new(false),
        });
        (ActionDispatcher::new(device, interaction.clone()), interaction)
    }

    async fn run(text: &str, device: Arc<Recorder>, approve: bool) -> PhoneClawResult<DispatchOutcome> {
        let (d, _) = dispatcher(device, approve);
        d.execute(&parse_call(text).unwrap(), 1080, 2400).await
    }

    #[tokio::test]
    async fn tap_maps_to_pixels() {
        let dev = Arc::new(Recorder::default());
        let out = run(r#"do(action="Tap", element=[500,500])"#, dev.clone(), true).await.unwrap();
        assert!(out.success && !out.should_finish);
        assert_eq!(dev.calls(), vec!["tap 540 1200"]);
    }

    #[tokio::test]
    async fn swipe_uses_auto_duration() {
        let dev = Arc::new(Recorder::default());
        run(r#"do(action="Swipe", start=[500,800], end=[500,200])"#, dev.clone(), true)
            .await
            .unwrap();
        assert_eq!(dev.calls(), vec!["swipe 540 1920 540 480 None"]);
    }

    #[tokio::test]
    async fn long_press_holds_three_seconds() {
        let dev = Arc::new(Recorder::default());
        run(r#"do(action="Long Press", element=[100,100])"#, dev.clone(), true)
            .await
            .unwrap();
        assert_eq!(dev.calls(), vec!["long_press 108 240 3000"]);
    }

    #[tokio::test]
    async fn unknown_action_is_non_terminal_failure() {
        let out = run(r#"do(action="Scroll")"#, Arc::new(Recorder::default()), true)
            .await
            .unwrap();
        assert_eq!(out, DispatchOutcome::failed("Unknown action: Scroll"));
    }

    #[tokio::test]
    async fn missing_parameter_is_reported() {
        let out = run(r#"do(action="Tap")"#, Arc::new(Recorder::default()), true)
            .await
            .unwrap();
        assert!(!out.success && !out.should_finish);
        assert_eq!(out.message, "No element coordinates");
    }

    #[tokio::test]
    async fn unknown_app() {
        let out = run(r#"do(action="Launch", app="Nope")"#, Arc::new(Recorder::default()), true)
            .await
            .unwrap();
        assert_eq!(out.message, "App not found: Nope");
        assert!(!out.success);
    }

    #[tokio::test]
    async fn refused_sensitive_tap_finishes() {
        let dev = Arc::new(Recorder::default());
        let out = run(r#"do(action="Tap", element=[1,1], message="pay")"#, dev.clone(), false)
            .await
            .unwrap();
        assert!(!out.success && out.should_finish);
        assert_eq!(out.message, "User cancelled sensitive operation");
        assert!(dev.calls().is_empty());
    }

    #[tokio::test]
    async fn takeover_calls_hook_and_continues() {
        let (d, hooks) = dispatcher(Arc::new(Recorder::default()), true);
        let out = d
            .execute(&parse_call(r#"do(action="Take_over", message="login")"#).unwrap(), 1080, 2400)
            .await
            .unwrap();
        assert!(out.success && !out.should_finish);
        assert!(hooks.took_over.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn finish_is_terminal_success() {
        let out = run(r#"finish(message="done")"#, Arc::new(Recorder::default()), true)
            .await
            .unwrap();
        assert!(out.success && out.should_finish);
        assert_eq!(out.message, "done");
    }

    #[tokio::test]
    async fn device_failure_is_dispatch_error() {
        let dev = Arc::new(Recorder {
            fail: true,
            ..Recorder::default()
        });
        let err = run(r#"do(action="Back")"#, dev, true).await.unwrap_err();
        assert!(matches!(err, PhoneClawError::Dispatch(_)));
        assert!(err.to_string().contains("adb offline"));
    }

    #[tokio::test]
    async fn oversized_wait_is_a_failed_outcome() {
        let device = Arc::new(Recorder::default());
        let out = run(r#"do(action="Wait", duration="1e30 seconds")"#, device, true)
            .await
            .unwrap();
        assert!(!out.success);
        assert!(!out.should_finish);
        assert!(out.message.starts_with("Invalid wait duration"));
    }
}
