use std::process::Output;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use tokio::process::Command;

use crate::device::apps;
use crate::device::screenshot::Screenshot;
use crate::device::traits::{auto_swipe_duration_ms, DeviceDriver, HOME_LABEL};
use crate::errors::{PhoneClawError, PhoneClawResult};

const ADB_KEYBOARD_IME: &str = "com.android.adbkeyboard/.AdbIME";
const DOUBLE_TAP_GAP: Duration = Duration::from_millis(100);
/// Upper bound on a single adb invocation unless configured otherwise.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Android device driven through the `adb` binary on `PATH`.
pub struct AdbDevice {
    device_id: Option<String>,
    settle: Duration,
    launch_settle: Duration,
    command_timeout: Duration,
}

impl AdbDevice {
    pub fn new(device_id: Option<String>) -> Self {
        Self {
            device_id: device_id.filter(|id| !id.is_empty()),
            settle: Duration::from_millis(500),
            launch_settle: Duration::from_millis(2000),
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Pause after each gesture, and after an app launch.
    pub fn with_settle_delays(mut self, settle: Duration, launch_settle: Duration) -> Self {
        self.settle = settle;
        self.launch_settle = launch_settle;
        self
    }

    pub fn device_id(&self) -> Option<&str> {
        self.device_id.as_deref()
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new("adb");
        if let Some(id) = &self.device_id {
            cmd.arg("-s").arg(id);
        }
        cmd
    }

    async fn raw(&self, args: &[&str]) -> PhoneClawResult<Output> {
        self.raw_within(args, self.command_timeout).await
    }

    async fn raw_within(&self, args: &[&str], limit: Duration) -> PhoneClawResult<Output> {
        let mut cmd = self.command();
        cmd.args(args);
        output_within(cmd, limit, &args.join(" ")).await
    }

    /// Runs `adb [-s id] <args>` and fails on a non-zero exit.
    async fn run(&self, args: &[&str]) -> PhoneClawResult<String> {
        let output = self.raw(args).await?;
        if !output.status.success() {
            return Err(PhoneClawError::Device(format!(
                "adb {} exited with {}: {}",
                args.join(" "),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn shell(&self, args: &[&str]) -> PhoneClawResult<String> {
        let mut full = Vec::with_capacity(args.len() + 1);
        full.push("shell");
        full.extend_from_slice(args);
        self.run(&full).await
    }

    async fn settle(&self) {
        tokio::time::sleep(self.settle).await;
    }

    pub async fn has_adb_keyboard(&self) -> bool {
        match self.shell(&["ime", "list", "-s"]).await {
            Ok(out) => out.contains(ADB_KEYBOARD_IME),
            Err(e) => {
                tracing::debug!(error = %e, "ime list failed");
                false
            }
        }
    }

    /// Switches to ADB Keyboard and returns the IME that was active before.
    async fn switch_to_adb_keyboard(&self) -> PhoneClawResult<String> {
        let current = self
            .shell(&["settings", "get", "secure", "default_input_method"])
            .await?
            .trim()
            .to_string();
        if !current.contains(ADB_KEYBOARD_IME) {
            self.shell(&["ime", "set", ADB_KEYBOARD_IME]).await?;
        }
        Ok(current)
    }

    async fn restore_keyboard(&self, ime: &str) {
        if ime.is_empty() || ime.contains(ADB_KEYBOARD_IME) || ime == "null" {
            return;
        }
        if let Err(e) = self.shell(&["ime", "set", ime]).await {
            tracing::warn!(error = %e, ime, "failed to restore input method");
        }
    }
}

#[async_trait]
impl DeviceDriver for AdbDevice {
    async fn tap(&self, x: i32, y: i32) -> PhoneClawResult<()> {
        self.shell(&["input", "tap", &x.to_string(), &y.to_string()]).await?;
        self.settle().await;
        Ok(())
    }

    async fn double_tap(&self, x: i32, y: i32) -> PhoneClawResult<()> {
        let (xs, ys) = (x.to_string(), y.to_string());
        self.shell(&["input", "tap", &xs, &ys]).await?;
        tokio::time::sleep(DOUBLE_TAP_GAP).await;
        self.shell(&["input", "tap", &xs, &ys]).await?;
        self.settle().await;
        Ok(())
    }

    async fn long_press(&self, x: i32, y: i32, duration_ms: u64) -> PhoneClawResult<()> {
        let (xs, ys) = (x.to_string(), y.to_string());
        self.shell(&["input", "swipe", &xs, &ys, &xs, &ys, &duration_ms.to_string()])
            .await?;
        self.settle().await;
        Ok(())
    }

    async fn swipe(
        &self,
        x1: i32,
        y1: i32,
        x2: i32,
        y2: i32,
        duration_ms: Option<u64>,
    ) -> PhoneClawResult<()> {
        let duration = duration_ms.unwrap_or_else(|| auto_swipe_duration_ms(x1, y1, x2, y2));
        self.shell(&[
            "input",
            "swipe",
            &x1.to_string(),
            &y1.to_string(),
            &x2.to_string(),
            &y2.to_string(),
            &duration.to_string(),
        ])
        .await?;
        self.settle().await;
        Ok(())
    }

    async fn back(&self) -> PhoneClawResult<()> {
        self.shell(&["input", "keyevent", "4"]).await?;
        self.settle().await;
        Ok(())
    }

    async fn home(&self) -> PhoneClawResult<()> {
        self.shell(&["input", "keyevent", "KEYCODE_HOME"]).await?;
        self.settle().await;
        Ok(())
    }

    async fn type_text(&self, text: &str) -> PhoneClawResult<()> {
        let original = self.switch_to_adb_keyboard().await?;
        let result = async {
            self.shell(&["am", "broadcast", "-a", "ADB_CLEAR_TEXT"]).await?;
            let encoded = base64::engine::general_purpose::STANDARD.encode(text.as_bytes());
            self.shell(&["am", "broadcast", "-a", "ADB_INPUT_B64", "--es", "msg", &encoded])
                .await?;
            Ok::<(), PhoneClawError>(())
        }
        .await;
        self.restore_keyboard(&original).await;
        result?;
        self.settle().await;
        Ok(())
    }

    async fn launch(&self, app: &str) -> PhoneClawResult<bool> {
        let Some(package) = apps::package_for(app) else {
            tracing::warn!(app, "app not in catalog");
            return Ok(false);
        };
        self.shell(&[
            "monkey",
            "-p",
            package,
            "-c",
            "android.intent.category.LAUNCHER",
            "1",
        ])
        .await?;
        tokio::time::sleep(self.launch_settle).await;
        Ok(true)
    }

    async fn current_app(&self) -> String {
        match self.shell(&["dumpsys", "window"]).await {
            Ok(out) => app_from_dumpsys(&out).to_string(),
            Err(e) => {
                tracing::debug!(error = %e, "dumpsys window failed");
                HOME_LABEL.to_string()
            }
        }
    }

    async fn screenshot(&self, timeout: Duration) -> PhoneClawResult<Screenshot> {
        let output = match self.raw_within(&["exec-out", "screencap", "-p"], timeout).await {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!(error = %e, "screencap failed to run, using fallback");
                return Ok(Screenshot::fallback(false));
            }
        };

        let stderr = String::from_utf8_lossy(&output.stderr);
        if is_secure_screen_failure(&stderr) {
            tracing::info!("screen is capture-protected, using sensitive fallback");
            return Ok(Screenshot::fallback(true));
        }
        if !output.status.success() || output.stdout.is_empty() {
            tracing::warn!(status = %output.status, stderr = %stderr.trim(), "screencap failed, using fallback");
            return Ok(Screenshot::fallback(false));
        }

        match Screenshot::from_png(output.stdout) {
            Ok(shot) => Ok(shot),
            Err(e) => {
                tracing::warn!(error = %e, "screencap output unreadable, using fallback");
                Ok(Screenshot::fallback(false))
            }
        }
    }
}

/// Runs `cmd` to completion, killing it once `limit` passes.
async fn output_within(mut cmd: Command, limit: Duration, label: &str) -> PhoneClawResult<Output> {
    cmd.kill_on_drop(true);
    match tokio::time::timeout(limit, cmd.output()).await {
        Ok(result) => {
            result.map_err(|e| PhoneClawError::Device(format!("failed to run adb {label}: {e}")))
        }
        Err(_) => Err(PhoneClawError::Device(format!(
            "adb {label} timed out after {} ms",
            limit.as_millis()
        ))),
    }
}

fn is_secure_screen_failure(stderr: &str) -> bool {
    stderr.contains("Status: -1") || stderr.contains("Failed")
}

/// Foreground app from `dumpsys window`, looking at focus lines first.
fn app_from_dumpsys(output: &str) -> &'static str {
    let focus: String = output
        .lines()
        .filter(|l| l.contains("mCurrentFocus") || l.contains("mFocusedApp"))
        .collect::<Vec<_>>()
        .join("\n");
    let haystack = if focus.is_empty() { output } else { focus.as_str() };
    apps::app_in_text(haystack).unwrap_or(HOME_LABEL)
}

/// Serials in the `device` state from `adb devices` output.
fn parse_devices(output: &str) -> Vec<String> {
    output
        .lines()
        .skip(1)
        .filter_map(|line| {
            let mut parts = line.trim().split('\t');
            match (parts.next(), parts.next()) {
                (Some(serial), Some("device")) if !serial.is_empty() => Some(serial.to_string()),
                _ => None,
            }
        })
        .collect()
}

async fn adb_global(args: &[&str]) -> PhoneClawResult<String> {
    let mut cmd = Command::new("adb");
    cmd.args(args);
    let output = output_within(cmd, DEFAULT_COMMAND_TIMEOUT, &args.join(" ")).await?;
    if !output.status.success() {
        return Err(PhoneClawError::Device(format!(
            "adb {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

pub async fn list_devices() -> PhoneClawResult<Vec<String>> {
    Ok(parse_devices(&adb_global(&["devices"]).await?))
}

/// `adb connect` exits 0 even when the connection fails, so its output is checked too.
pub async fn connect(address: &str) -> PhoneClawResult<String> {
    let out = adb_global(&["connect", address]).await?;
    if out.contains("failed") || out.contains("cannot") {
        return Err(PhoneClawError::Device(out.trim().to_string()));
    }
    Ok(out.trim().to_string())
}

pub async fn disconnect(address: &str) -> PhoneClawResult<String> {
    Ok(adb_global(&["disconnect", address]).await?.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn devices_output() {
        let out = "List of devices attached\nemulator-5554\tdevice\n192.168.1.9:5555\toffline\nR58M\tdevice\n\n";
        assert_eq!(parse_devices(out), vec!["emulator-5554", "R58M"]);
        assert!(parse_devices("List of devices attached\n").is_empty());
    }

    #[test]
    fn focus_line_wins_over_other_mentions() {
        let out = "  recent: com.tencent.mm\n  mCurrentFocus=Window{42 u0 com.taobao.taobao/com.taobao.MainActivity}\n";
        assert_eq!(app_from_dumpsys(out), "淘宝");
        assert_eq!(app_from_dumpsys("mCurrentFocus=Window{1 u0 com.android.launcher3/.Launcher}"), HOME_LABEL);
        assert_eq!(app_from_dumpsys("no focus info, but com.tencent.mm is here"), "微信");
    }

    #[test]
    fn secure_screen_detection() {
        assert!(is_secure_screen_failure("Status: -1\n"));
        assert!(is_secure_screen_failure("Capturing failed: Failed to take screenshot"));
        assert!(!is_secure_screen_failure(""));
    }

    #[test]
    fn empty_device_id_is_ignored() {
        assert_eq!(AdbDevice::new(Some(String::new())).device_id(), None);
        assert_eq!(AdbDevice::new(Some("emu".into())).device_id(), Some("emu"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn hung_command_times_out_as_device_error() {
        let mut cmd = Command::new("sleep");
        cmd.arg("5");
        let started = std::time::Instant::now();
        let err = output_within(cmd, Duration::from_millis(50), "shell input tap 1 1")
            .await
            .unwrap_err();
        assert!(started.elapsed() < Duration::from_secs(4));
        match err {
            PhoneClawError::Device(msg) => assert!(msg.contains("timed out"), "{msg}"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn quick_command_completes_within_limit() {
        let mut cmd = Command::new("echo");
        cmd.arg("ok");
        let output = output_within(cmd, Duration::from_secs(5), "echo").await.unwrap();
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "ok");
    }
}
