//! LINE Messaging API client.

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, error};

use crate::platform::{ChatPlatform, PlatformError};

pub const LINE_API_BASE: &str = "https://api.line.me";

/// LINE rejects text messages longer than this many characters.
const MAX_TEXT_CHARS: usize = 5000;

/// Loading animation bounds; the API only accepts multiples of 5.
const MIN_LOADING_SECONDS: u64 = 5;
const MAX_LOADING_SECONDS: u64 = 60;

#[derive(Debug, Serialize)]
struct TextMessage<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReplyRequest<'a> {
    reply_token: &'a str,
    messages: Vec<TextMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct PushRequest<'a> {
    to: &'a str,
    messages: Vec<TextMessage<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LoadingRequest<'a> {
    chat_id: &'a str,
    loading_seconds: u64,
}

/// Client for the subset of the LINE bot API the relay uses.
pub struct LineClient {
    http_client: reqwest::Client,
    channel_access_token: String,
}

impl LineClient {
    pub fn new(http_client: reqwest::Client, channel_access_token: String) -> Self {
        Self {
            http_client,
            channel_access_token,
        }
    }

    async fn post<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<(), PlatformError> {
        let url = format!("{}{}", LINE_API_BASE, path);

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.channel_access_token)
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            error!("LINE API {} failed: {} - {}", path, status, body);
            return Err(PlatformError::Rejected { status, body });
        }

        debug!("LINE API {} succeeded", path);
        Ok(())
    }
}

#[async_trait]
impl ChatPlatform for LineClient {
    async fn send_reply(&self, reply_token: &str, text: &str) -> Result<(), PlatformError> {
        let text = truncate_text(text);
        let request = ReplyRequest {
            reply_token,
            messages: vec![TextMessage { kind: "text", text: &text }],
        };
        self.post("/v2/bot/message/reply", &request).await
    }

    async fn send_push(&self, user_id: &str, text: &str) -> Result<(), PlatformError> {
        let text = truncate_text(text);
        let request = PushRequest {
            to: user_id,
            messages: vec![TextMessage { kind: "text", text: &text }],
        };
        self.post("/v2/bot/message/push", &request).await
    }

    async fn start_loading(&self, user_id: &str, seconds: u64) -> Result<(), PlatformError> {
        let request = LoadingRequest {
            chat_id: user_id,
            loading_seconds: loading_seconds(seconds),
        };
        self.post("/v2/bot/chat/loading/start", &request).await
    }
}

/// Round up to the next accepted loading duration.
pub fn loading_seconds(seconds: u64) -> u64 {
    let rounded = seconds.div_ceil(5) * 5;
    rounded.clamp(MIN_LOADING_SECONDS, MAX_LOADING_SECONDS)
}

fn truncate_text(text: &str) -> String {
    if text.chars().count() <= MAX_TEXT_CHARS {
        return text.to_string();
    }
    text.chars().take(MAX_TEXT_CHARS).collect()
}
