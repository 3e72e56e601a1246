//! Webhook payloads and per-event outcomes.

use serde::{Deserialize, Serialize};

/// One webhook POST from the LINE platform. May carry zero or more events.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookDelivery {
    /// Bot user ID the delivery is addressed to
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub events: Vec<InboundEvent>,
}

/// A single user action (message, follow, postback, ...).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundEvent {
    #[serde(rename = "type")]
    pub kind: String,
    /// Single-use token for answering this event
    #[serde(default)]
    pub reply_token: Option<String>,
    #[serde(default)]
    pub source: Option<EventSource>,
    #[serde(default)]
    pub message: Option<MessageContent>,
    #[serde(default)]
    pub webhook_event_id: Option<String>,
    #[serde(default)]
    pub delivery_context: Option<DeliveryContext>,
}

/// Who sent the event.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSource {
    #[serde(rename = "type")]
    pub kind: String,
    /// Absent for group and room members who have not added the bot
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryContext {
    #[serde(default)]
    pub is_redelivery: bool,
}

/// Message body, discriminated by content type.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MessageContent {
    Text { text: String },
    #[serde(other)]
    Other,
}

impl InboundEvent {
    /// The body of a text message event; `None` for anything else.
    pub fn text(&self) -> Option<&str> {
        if self.kind != "message" {
            return None;
        }
        match &self.message {
            Some(MessageContent::Text { text }) => Some(text),
            _ => None,
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        self.source.as_ref().and_then(|s| s.user_id.as_deref())
    }

    pub fn is_redelivery(&self) -> bool {
        self.delivery_context
            .as_ref()
            .is_some_and(|c| c.is_redelivery)
    }
}

/// Where the text of a sent reply came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplySource {
    Nlu,
    Fallback,
}

/// Terminal state of one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// Not a text message; nothing sent
    Ignored,
    /// The resolved reply was delivered
    Replied(ReplySource),
    /// The reply failed but the apology went through
    Apologized,
    /// Neither the reply nor the apology could be delivered
    Failed(String),
}

/// Per-delivery tally returned to the platform.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliverySummary {
    pub received: usize,
    pub replied: usize,
    pub apologized: usize,
    pub ignored: usize,
    pub failed: usize,
}

impl DeliverySummary {
    pub fn record(&mut self, outcome: &EventOutcome) {
        self.received += 1;
        match outcome {
            EventOutcome::Ignored => self.ignored += 1,
            EventOutcome::Replied(_) => self.replied += 1,
            EventOutcome::Apologized => self.apologized += 1,
            EventOutcome::Failed(_) => self.failed += 1,
        }
    }
}
