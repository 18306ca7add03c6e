use std::time::Duration;

use async_trait::async_trait;

use crate::device::screenshot::Screenshot;
use crate::errors::PhoneClawResult;

/// Label reported when the foreground app is not in the catalog.
pub const HOME_LABEL: &str = "System Home";

/// A phone the agent can see and touch. Coordinates are physical pixels.
#[async_trait]
pub trait DeviceDriver: Send + Sync {
    async fn tap(&self, x: i32, y: i32) -> PhoneClawResult<()>;

    async fn double_tap(&self, x: i32, y: i32) -> PhoneClawResult<()>;

    async fn long_press(&self, x: i32, y: i32, duration_ms: u64) -> PhoneClawResult<()>;

    /// `None` picks a duration from the swipe length, see [`auto_swipe_duration_ms`].
    async fn swipe(
        &self,
        x1: i32,
        y1: i32,
        x2: i32,
        y2: i32,
        duration_ms: Option<u64>,
    ) -> PhoneClawResult<()>;

    async fn back(&self) -> PhoneClawResult<()>;

    async fn home(&self) -> PhoneClawResult<()>;

    async fn type_text(&self, text: &str) -> PhoneClawResult<()>;

    /// `Ok(false)` when the app is unknown to the device.
    async fn launch(&self, app: &str) -> PhoneClawResult<bool>;

    /// Human-readable foreground app, [`HOME_LABEL`] when unknown.
    async fn current_app(&self) -> String;

    /// Implementations return a flagged fallback image rather than failing
    /// where they can; an `Err` is still tolerated by callers.
    async fn screenshot(&self, timeout: Duration) -> PhoneClawResult<Screenshot>;
}

/// `dist² / 1000` milliseconds, clamped to `[500, 2000]`.
pub fn auto_swipe_duration_ms(x1: i32, y1: i32, x2: i32, y2: i32) -> u64 {
    let dx = i64::from(x1) - i64::from(x2);
    let dy = i64::from(y1) - i64::from(y2);
    let dist_sq = (dx * dx + dy * dy) as u64;
    (dist_sq / 1000).clamp(500, 2000)
}
