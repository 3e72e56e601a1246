//! "Bot is working" indicator shown before the real reply.
//!
//! The wait length is banded by message length. Two mechanisms exist:
//! the platform's native loading animation, or a visible status message
//! picked from a fixed phrase list. Indicator failures never reach the
//! caller; the wait still happens so reply timing stays the same. The
//! platform call is bounded by the wait, so a hanging call cannot stretch it.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

use crate::platform::ChatPlatform;
use crate::random::{pick, Chooser};
use crate::Error;

/// Visible "thinking" messages for [`IndicatorMode::StatusMessage`].
pub const THINKING_PHRASES: &[&str] = &[
    "กำลังคิดอยู่นะครับ... 🤔",
    "รอสักครู่นะครับ ⏳",
    "กำลังหาคำตอบให้ครับ 🔍",
    "ขอคิดแป๊บนึงนะครับ 💭",
];

/// Status-message mode waits this many units after posting the phrase.
const STATUS_MESSAGE_WAIT_UNITS: f64 = 1.5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorMode {
    /// Platform loading animation, no visible message
    #[default]
    Native,
    /// One visible status message from [`THINKING_PHRASES`]
    StatusMessage,
}

impl FromStr for IndicatorMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "native" | "loading" => Ok(IndicatorMode::Native),
            "status_message" | "status" | "typing" => Ok(IndicatorMode::StatusMessage),
            other => Err(Error::Config(format!("unknown INDICATOR_MODE '{}'", other))),
        }
    }
}

/// Number of time units to show the indicator for a message.
pub fn duration_units(text: &str) -> u32 {
    match text.chars().count() {
        0..=10 => 3,
        11..=30 => 4,
        31..=100 => 5,
        _ => 6,
    }
}

pub struct IndicatorPolicy {
    mode: IndicatorMode,
    unit: Duration,
    chooser: Arc<dyn Chooser>,
}

impl IndicatorPolicy {
    pub fn new(mode: IndicatorMode, unit: Duration, chooser: Arc<dyn Chooser>) -> Self {
        Self { mode, unit, chooser }
    }

    pub fn mode(&self) -> IndicatorMode {
        self.mode
    }

    /// Wall-clock length of the indicator for `text`.
    pub fn duration_for(&self, text: &str) -> Duration {
        self.unit * duration_units(text)
    }

    /// Show the indicator to `user_id` and wait. Never fails.
    pub async fn run(&self, platform: &dyn ChatPlatform, user_id: Option<&str>, text: &str) {
        match self.mode {
            IndicatorMode::Native => {
                let started = tokio::time::Instant::now();
                let wait = self.duration_for(text);
                let seconds = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
                let Some(user_id) = user_id else {
                    debug!("No user to show a loading indicator to");
                    tokio::time::sleep(wait).await;
                    return;
                };

                let loading = platform.start_loading(user_id, seconds);
                match tokio::time::timeout(wait, loading).await {
                    Ok(Ok(())) => debug!(user_id, seconds, "Loading indicator started"),
                    Ok(Err(e)) => warn!(user_id, "Loading indicator failed, waiting instead: {}", e),
                    Err(_) => warn!(user_id, "Loading indicator did not answer in time"),
                }
                tokio::time::sleep_until(started + wait).await;
            }
            IndicatorMode::StatusMessage => {
                let phrase = pick(self.chooser.as_ref(), THINKING_PHRASES)
                    .copied()
                    .unwrap_or(THINKING_PHRASES[0]);
                let started = tokio::time::Instant::now();
                let wait = self.unit.mul_f64(STATUS_MESSAGE_WAIT_UNITS);
                match user_id {
                    Some(user_id) => {
                        match tokio::time::timeout(wait, platform.send_push(user_id, phrase)).await {
                            Ok(Ok(())) => {}
                            Ok(Err(e)) => warn!(user_id, "Status message failed: {}", e),
                            Err(_) => warn!(user_id, "Status message did not go out in time"),
                        }
                    }
                    None => debug!("No user to send a status message to"),
                }
                tokio::time::sleep_until(started + wait).await;
            }
        }
    }
}
