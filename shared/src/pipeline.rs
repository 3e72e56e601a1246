//! Message intake and response resolution.
//!
//! Each inbound event goes through: filter (text messages only) →
//! indicator → NLU query or fallback → exactly one reply. A failed reply
//! gets one apology attempt on the same reply token and nothing more.

use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::fallback::FallbackResponder;
use crate::indicator::IndicatorPolicy;
use crate::models::{DeliverySummary, EventOutcome, InboundEvent, ReplySource};
use crate::nlu::{session_key, NluGateway};
use crate::platform::ChatPlatform;
use crate::{Error, Result};

/// Sent when the resolved reply could not be delivered.
pub const APOLOGY_REPLY: &str = "ขออภัยครับ ระบบขัดข้องชั่วคราว กรุณาลองใหม่อีกครั้งนะครับ 🙏";

pub struct MessagePipeline {
    platform: Arc<dyn ChatPlatform>,
    nlu: NluGateway,
    indicator: IndicatorPolicy,
    fallback: FallbackResponder,
}

impl MessagePipeline {
    pub fn new(
        platform: Arc<dyn ChatPlatform>,
        nlu: NluGateway,
        indicator: IndicatorPolicy,
        fallback: FallbackResponder,
    ) -> Self {
        Self {
            platform,
            nlu,
            indicator,
            fallback,
        }
    }

    pub fn nlu(&self) -> &NluGateway {
        &self.nlu
    }

    pub fn indicator(&self) -> &IndicatorPolicy {
        &self.indicator
    }

    /// Run every event of a delivery concurrently and tally the outcomes.
    ///
    /// Per-event failures are counted, not returned; only a crashed task
    /// makes the whole delivery fail.
    pub async fn handle_delivery(self: &Arc<Self>, events: Vec<InboundEvent>) -> Result<DeliverySummary> {
        let mut tasks = JoinSet::new();
        for event in events {
            let pipeline = Arc::clone(self);
            tasks.spawn(async move { pipeline.handle_event(&event).await });
        }

        // Every task is drained before a crash is reported.
        let mut summary = DeliverySummary::default();
        let mut crashed = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => summary.record(&outcome),
                Err(e) => {
                    error!("Event task crashed: {}", e);
                    crashed.push(e.to_string());
                }
            }
        }

        info!(
            received = summary.received,
            replied = summary.replied,
            apologized = summary.apologized,
            ignored = summary.ignored,
            failed = summary.failed,
            crashed = crashed.len(),
            "Delivery processed"
        );

        if !crashed.is_empty() {
            return Err(Error::Internal(format!(
                "{} event task(s) crashed: {}",
                crashed.len(),
                crashed.join("; ")
            )));
        }
        Ok(summary)
    }

    pub async fn handle_event(&self, event: &InboundEvent) -> EventOutcome {
        let Some(text) = event.text() else {
            info!(event_type = %event.kind, "Ignoring non-text event");
            return EventOutcome::Ignored;
        };

        let user_id = event.user_id();
        info!(
            user_id = user_id.unwrap_or("-"),
            source = event.source.as_ref().map_or("-", |s| s.kind.as_str()),
            webhook_event_id = event.webhook_event_id.as_deref().unwrap_or("-"),
            redelivery = event.is_redelivery(),
            chars = text.chars().count(),
            "Processing text message"
        );

        let Some(reply_token) = event.reply_token.as_deref() else {
            warn!(user_id = user_id.unwrap_or("-"), "Text message without reply token");
            return EventOutcome::Failed("missing reply token".to_string());
        };

        self.indicator
            .run(self.platform.as_ref(), user_id, text)
            .await;

        let (reply, source) = self.resolve(text, user_id).await;
        self.deliver(reply_token, &reply, source).await
    }

    fn fall_back(&self, text: &str) -> (String, ReplySource) {
        info!(keyword_group = self.fallback.classify(text), "Answering from local fallback");
        (self.fallback.respond(text), ReplySource::Fallback)
    }

    /// Pick the reply text: the NLU answer when there is a non-empty one,
    /// the local fallback otherwise.
    async fn resolve(&self, text: &str, user_id: Option<&str>) -> (String, ReplySource) {
        if !self.nlu.is_ready() {
            info!("NLU gateway not ready, using fallback");
            return self.fall_back(text);
        }

        let session = session_key(user_id);
        match self.nlu.query(text.trim(), &session).await {
            Ok(result) => {
                let answer = result
                    .fulfillment_text
                    .as_deref()
                    .map(str::trim)
                    .filter(|t| !t.is_empty());
                match answer {
                    Some(answer) => {
                        info!(
                            intent = result.intent.as_deref().unwrap_or("-"),
                            confidence = result.confidence.unwrap_or_default(),
                            "Resolved via NLU"
                        );
                        (answer.to_string(), ReplySource::Nlu)
                    }
                    None => {
                        info!(
                            intent = result.intent.as_deref().unwrap_or("-"),
                            "NLU returned no fulfillment text, using fallback"
                        );
                        self.fall_back(text)
                    }
                }
            }
            Err(e) => {
                warn!(error_class = e.class(), "NLU query failed, using fallback: {}", e);
                self.fall_back(text)
            }
        }
    }

    async fn deliver(&self, reply_token: &str, reply: &str, source: ReplySource) -> EventOutcome {
        let first = match self.platform.send_reply(reply_token, reply).await {
            Ok(()) => {
                info!(?source, "Reply sent");
                return EventOutcome::Replied(source);
            }
            Err(e) => e,
        };

        warn!("Reply failed, sending apology: {}", first);
        match self.platform.send_reply(reply_token, APOLOGY_REPLY).await {
            Ok(()) => EventOutcome::Apologized,
            Err(second) => {
                error!("Apology failed too: {}", second);
                EventOutcome::Failed(format!("reply: {}; apology: {}", first, second))
            }
        }
    }
}
