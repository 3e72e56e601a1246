//! LINE Webhook Lambda - Relays LINE chat messages to Dialogflow.
//!
//! Endpoints:
//! - POST /webhook - LINE deliveries (signature-verified)
//! - GET /webhook - Liveness probe
//! - GET /health - Service status
//! - GET / - Service info

use lambda_http::{run, service_fn, Body, Error, Request, Response};
use serde::Serialize;
use shared::http::{error_response, header, json_response, ApiResponse};
use shared::signature::{self, SIGNATURE_HEADER};
use shared::{
    Config, FallbackResponder, IndicatorMode, IndicatorPolicy, LineClient, MessagePipeline,
    NluGateway, ThreadRngChooser, WebhookDelivery,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const SERVICE_NAME: &str = "line-dialogflow-relay";

/// Timeout for outbound LINE and Google calls at the transport level.
const HTTP_TIMEOUT_SECS: u64 = 15;

/// Health response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    nlu_ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    project_id: Option<String>,
    indicator_mode: IndicatorMode,
}

/// Service info response
#[derive(Debug, Serialize)]
struct InfoResponse {
    name: &'static str,
    version: &'static str,
    webhook: &'static str,
}

/// Application state
struct AppState {
    pipeline: Arc<MessagePipeline>,
    channel_secret: String,
}

impl AppState {
    async fn new() -> Result<Self, Error> {
        let config = Config::from_env()?;

        let http_client = reqwest_client()?;
        let chooser = Arc::new(ThreadRngChooser);

        let nlu = NluGateway::from_config(&config, http_client.clone()).await;
        let platform = Arc::new(LineClient::new(
            http_client,
            config.line_channel_access_token.clone(),
        ));

        let pipeline = MessagePipeline::new(
            platform,
            nlu,
            IndicatorPolicy::new(config.indicator_mode, config.indicator_unit, chooser.clone()),
            FallbackResponder::new(chooser),
        );

        info!(
            nlu_ready = pipeline.nlu().is_ready(),
            indicator_mode = ?config.indicator_mode,
            "Relay initialized"
        );

        Ok(Self {
            pipeline: Arc::new(pipeline),
            channel_secret: config.line_channel_secret,
        })
    }
}

fn reqwest_client() -> Result<reqwest::Client, Error> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
        .build()
        .map_err(|e| format!("Failed to build HTTP client: {}", e).into())
}

async fn handler(state: Arc<AppState>, event: Request) -> Result<Response<Body>, Error> {
    let method = event.method().as_str();
    let path = match event.uri().path().trim_end_matches('/') {
        "" => "/",
        p => p,
    };

    info!("Relay request: {} {}", method, path);

    match (method, path) {
        ("POST", "/webhook") => handle_webhook(&state, &event).await,

        ("GET", "/webhook") => json_response(200, &serde_json::json!({"status": "ok"})),

        ("GET", "/health") => {
            let nlu = state.pipeline.nlu();
            json_response(
                200,
                &HealthResponse {
                    status: "ok",
                    nlu_ready: nlu.is_ready(),
                    project_id: nlu.project_id().map(String::from),
                    indicator_mode: state.pipeline.indicator().mode(),
                },
            )
        }

        ("GET", "/") => json_response(
            200,
            &InfoResponse {
                name: SERVICE_NAME,
                version: env!("CARGO_PKG_VERSION"),
                webhook: "/webhook",
            },
        ),

        _ => error_response(404, "Not found"),
    }
}

/// Verify, parse and dispatch one LINE delivery.
async fn handle_webhook(state: &AppState, event: &Request) -> Result<Response<Body>, Error> {
    let body = event.body().as_ref();

    if let Err(e) = signature::verify(
        &state.channel_secret,
        header(event, SIGNATURE_HEADER),
        body,
    ) {
        warn!("Rejected webhook: {}", e);
        return error_response(e.status_code(), "Invalid signature");
    }

    let delivery: WebhookDelivery = match serde_json::from_slice(body) {
        Ok(d) => d,
        Err(e) => {
            error!("Failed to parse webhook body: {}", e);
            return error_response(500, "Invalid webhook payload");
        }
    };

    info!(
        destination = delivery.destination.as_deref().unwrap_or("-"),
        events = delivery.events.len(),
        "Webhook delivery received"
    );

    match state.pipeline.handle_delivery(delivery.events).await {
        Ok(summary) => json_response(200, &ApiResponse::success(summary)),
        Err(e) => {
            error!("Delivery failed: {}", e);
            error_response(e.status_code(), "Failed to process events")
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let state = Arc::new(AppState::new().await?);

    run(service_fn(move |event| {
        let state = Arc::clone(&state);
        async move { handler(state, event).await }
    }))
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use shared::fallback::GREETING_REPLY;
    use shared::random::FixedChooser;
    use shared::{ChatPlatform, PlatformError};
    use std::sync::Mutex;

    const SECRET: &str = "channel-secret";

    #[derive(Default)]
    struct MockLine {
        replies: Mutex<Vec<(String, String)>>,
        broken_token: Option<String>,
    }

    #[async_trait]
    impl ChatPlatform for MockLine {
        async fn send_reply(&self, reply_token: &str, text: &str) -> Result<(), PlatformError> {
            self.replies
                .lock()
                .unwrap()
                .push((reply_token.to_string(), text.to_string()));
            if self.broken_token.as_deref() == Some(reply_token) {
                return Err(PlatformError::Transport("connection reset".to_string()));
            }
            Ok(())
        }

        async fn send_push(&self, _: &str, _: &str) -> Result<(), PlatformError> {
            Ok(())
        }

        async fn start_loading(&self, _: &str, _: u64) -> Result<(), PlatformError> {
            Err(PlatformError::Rejected {
                status: 403,
                body: "loading animation not allowed".to_string(),
            })
        }
    }

    fn state(platform: Arc<MockLine>) -> Arc<AppState> {
        let chooser = Arc::new(FixedChooser(0));
        let pipeline = MessagePipeline::new(
            platform,
            NluGateway::not_ready(),
            IndicatorPolicy::new(IndicatorMode::Native, Duration::from_secs(1), chooser.clone()),
            FallbackResponder::new(chooser),
        );
        Arc::new(AppState {
            pipeline: Arc::new(pipeline),
            channel_secret: SECRET.to_string(),
        })
    }

    fn request(method: &str, path: &str, body: &str, signature: Option<String>) -> Request {
        let mut builder = lambda_http::http::Request::builder().method(method).uri(path);
        if let Some(signature) = signature {
            builder = builder.header("X-Line-Signature", signature);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn signed_post(body: &str) -> Request {
        let signature = signature::sign(SECRET, body.as_bytes()).unwrap();
        request("POST", "/webhook", body, Some(signature))
    }

    fn body_json(response: &Response<Body>) -> serde_json::Value {
        serde_json::from_slice(response.body().as_ref()).unwrap()
    }

    fn text_event(reply_token: &str, text: &str) -> serde_json::Value {
        serde_json::json!({
            "type": "message",
            "replyToken": reply_token,
            "source": {"type": "user", "userId": "U1"},
            "message": {"type": "text", "id": "1", "text": text}
        })
    }

    #[tokio::test]
    async fn test_info_and_health_routes() {
        let state = state(Arc::new(MockLine::default()));

        let response = handler(state.clone(), request("GET", "/", "", None)).await.unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(body_json(&response)["name"], SERVICE_NAME);

        let response = handler(state.clone(), request("GET", "/health", "", None)).await.unwrap();
        assert_eq!(response.status(), 200);
        let health = body_json(&response);
        assert_eq!(health["nluReady"], false);
        assert_eq!(health["indicatorMode"], "native");

        let response = handler(state.clone(), request("GET", "/webhook/", "", None)).await.unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(body_json(&response)["status"], "ok");

        let response = handler(state, request("DELETE", "/webhook", "", None)).await.unwrap();
        assert_eq!(response.status(), 404);
    }

    #[tokio::test]
    async fn test_unsigned_delivery_rejected() {
        let platform = Arc::new(MockLine::default());
        let body = serde_json::json!({"events": [text_event("tok", "hello")]}).to_string();

        let response = handler(state(platform.clone()), request("POST", "/webhook", &body, None))
            .await
            .unwrap();
        assert_eq!(response.status(), 401);

        let forged = signature::sign("not-the-secret", body.as_bytes()).unwrap();
        let response = handler(
            state(platform.clone()),
            request("POST", "/webhook", &body, Some(forged)),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), 401);
        assert!(platform.replies.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_body_is_server_error() {
        let response = handler(state(Arc::new(MockLine::default())), signed_post("{\"events\": ["))
            .await
            .unwrap();
        assert_eq!(response.status(), 500);
    }

    #[tokio::test]
    async fn test_verification_delivery_without_events() {
        let body = r#"{"destination": "Uabc", "events": []}"#;
        let response = handler(state(Arc::new(MockLine::default())), signed_post(body))
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(body_json(&response)["data"]["received"], 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delivery_replies_and_summarizes() {
        let platform = Arc::new(MockLine {
            broken_token: Some("broken".to_string()),
            ..Default::default()
        });
        let body = serde_json::json!({
            "destination": "Uabc",
            "events": [
                text_event("tok-1", "สวัสดี"),
                text_event("broken", "hello"),
                {"type": "follow", "replyToken": "tok-3", "source": {"type": "user", "userId": "U2"}}
            ]
        })
        .to_string();

        let response = handler(state(platform.clone()), signed_post(&body)).await.unwrap();
        assert_eq!(response.status(), 200);

        let json = body_json(&response);
        let summary = &json["data"];
        assert_eq!(summary["received"], 3);
        assert_eq!(summary["replied"], 1);
        assert_eq!(summary["failed"], 1);
        assert_eq!(summary["ignored"], 1);

        let replies = platform.replies.lock().unwrap();
        assert!(replies.contains(&("tok-1".to_string(), GREETING_REPLY.to_string())));
        assert_eq!(replies.iter().filter(|(t, _)| t == "broken").count(), 2);
        assert!(!replies.iter().any(|(t, _)| t == "tok-3"));
    }
}
