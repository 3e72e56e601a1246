//! Chat platform seam used by the message pipeline.

use async_trait::async_trait;
use thiserror::Error;

/// Failures talking to the chat platform.
#[derive(Error, Debug)]
pub enum PlatformError {
    /// The platform answered with a non-success status
    #[error("platform rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },

    /// The request never got an answer
    #[error("transport error: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for PlatformError {
    fn from(e: reqwest::Error) -> Self {
        PlatformError::Transport(e.to_string())
    }
}

/// Outbound operations the relay needs from a messaging platform.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Answer an event through its single-use reply token.
    async fn send_reply(&self, reply_token: &str, text: &str) -> Result<(), PlatformError>;

    /// Send an unsolicited message to a user.
    async fn send_push(&self, user_id: &str, text: &str) -> Result<(), PlatformError>;

    /// Show the platform's native "working" animation for `seconds`.
    async fn start_loading(&self, user_id: &str, seconds: u64) -> Result<(), PlatformError>;
}
