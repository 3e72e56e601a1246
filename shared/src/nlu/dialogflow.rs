//! Dialogflow ES `detectIntent` over REST.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{AccessTokenProvider, NluBackend, NluError, NluResult};

pub const DIALOGFLOW_API_BASE: &str = "https://dialogflow.googleapis.com";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DetectIntentRequest<'a> {
    query_input: QueryInput<'a>,
}

#[derive(Debug, Serialize)]
struct QueryInput<'a> {
    text: TextInput<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TextInput<'a> {
    text: &'a str,
    language_code: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DetectIntentResponse {
    #[serde(default)]
    query_result: Option<QueryResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResult {
    #[serde(default)]
    fulfillment_text: Option<String>,
    #[serde(default)]
    intent: Option<Intent>,
    #[serde(default)]
    intent_detection_confidence: Option<f32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Intent {
    #[serde(default)]
    display_name: Option<String>,
}

impl From<DetectIntentResponse> for NluResult {
    fn from(response: DetectIntentResponse) -> Self {
        match response.query_result {
            Some(result) => NluResult {
                fulfillment_text: result.fulfillment_text,
                intent: result.intent.and_then(|i| i.display_name),
                confidence: result.intent_detection_confidence,
            },
            None => NluResult::default(),
        }
    }
}

/// Map a non-success HTTP status to an NLU failure class.
pub fn classify_status(status: u16, body: &str) -> NluError {
    let detail = format!("HTTP {}: {}", status, body);
    match status {
        401 | 403 => NluError::PermissionDenied(detail),
        400 | 404 | 412 => NluError::InvalidConfig(detail),
        _ => NluError::Unavailable(detail),
    }
}

pub struct DialogflowClient {
    http_client: reqwest::Client,
    tokens: AccessTokenProvider,
}

impl DialogflowClient {
    pub fn new(http_client: reqwest::Client, tokens: AccessTokenProvider) -> Self {
        Self { http_client, tokens }
    }
}

fn detect_intent_url(session_path: &str) -> String {
    format!("{}/v2/{}:detectIntent", DIALOGFLOW_API_BASE, session_path)
}

#[async_trait]
impl NluBackend for DialogflowClient {
    async fn detect_intent(
        &self,
        session_path: &str,
        text: &str,
        language_code: &str,
    ) -> Result<NluResult, NluError> {
        let token = self.tokens.access_token().await?;
        let url = detect_intent_url(session_path);

        let request = DetectIntentRequest {
            query_input: QueryInput {
                text: TextInput { text, language_code },
            },
        };

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(token)
            .json(&request)
            .send()
            .await
            .map_err(|e| NluError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status.as_u16(), &body));
        }

        let parsed: DetectIntentResponse = response
            .json()
            .await
            .map_err(|e| NluError::Unavailable(format!("Malformed detectIntent response: {}", e)))?;

        let result = NluResult::from(parsed);
        debug!(
            intent = result.intent.as_deref().unwrap_or("-"),
            confidence = result.confidence.unwrap_or_default(),
            "Dialogflow answered"
        );
        Ok(result)
    }
}
