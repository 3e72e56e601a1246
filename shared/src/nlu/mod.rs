//! Natural-language-understanding gateway.
//!
//! The gateway wraps one request/response exchange with the NLU backend.
//! Whether it is usable is decided once at startup: a gateway built
//! without a backend reports `is_ready() == false` and must not be queried.

pub mod credentials;
pub mod dialogflow;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Config;

pub use credentials::{AccessTokenProvider, ServiceAccountKey};
pub use dialogflow::DialogflowClient;

/// Locale sent with every query.
pub const LANGUAGE_CODE: &str = "th";

/// Failure classes surfaced by the NLU backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NluError {
    /// Backend unreachable, timed out or failing server-side
    #[error("NLU backend unavailable: {0}")]
    Unavailable(String),

    /// Bad credentials, unknown project or disabled API
    #[error("NLU backend misconfigured: {0}")]
    InvalidConfig(String),

    /// Credentials valid but not allowed to call the agent
    #[error("NLU permission denied: {0}")]
    PermissionDenied(String),
}

impl NluError {
    /// Short label for structured logs.
    pub fn class(&self) -> &'static str {
        match self {
            NluError::Unavailable(_) => "unavailable",
            NluError::InvalidConfig(_) => "invalid_config",
            NluError::PermissionDenied(_) => "permission_denied",
        }
    }
}

/// What the backend made of one message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NluResult {
    pub fulfillment_text: Option<String>,
    pub intent: Option<String>,
    pub confidence: Option<f32>,
}

/// A backend able to resolve free text within a session.
#[async_trait]
pub trait NluBackend: Send + Sync {
    async fn detect_intent(
        &self,
        session_path: &str,
        text: &str,
        language_code: &str,
    ) -> Result<NluResult, NluError>;
}

/// Session correlation key: the user id, or a fresh id when there is none.
pub fn session_key(user_id: Option<&str>) -> String {
    match user_id {
        Some(id) if !id.trim().is_empty() => id.to_string(),
        _ => Uuid::new_v4().to_string(),
    }
}

/// Startup-fixed handle on the NLU backend.
#[derive(Clone)]
pub struct NluGateway {
    backend: Option<Arc<dyn NluBackend>>,
    project_id: String,
    timeout: Duration,
}

impl NluGateway {
    /// A gateway with no backend; the pipeline always falls back.
    pub fn not_ready() -> Self {
        Self {
            backend: None,
            project_id: String::new(),
            timeout: Duration::ZERO,
        }
    }

    pub fn ready(backend: Arc<dyn NluBackend>, project_id: String, timeout: Duration) -> Self {
        Self {
            backend: Some(backend),
            project_id,
            timeout,
        }
    }

    /// Build the gateway from startup configuration.
    ///
    /// Missing or unusable credentials leave the gateway not ready; they are
    /// logged but never fail startup.
    pub async fn from_config(config: &Config, http_client: reqwest::Client) -> Self {
        let Some(source) = config.credentials.as_ref() else {
            info!("No Dialogflow credentials configured, replies will use the local fallback");
            return Self::not_ready();
        };

        let key = match ServiceAccountKey::load(source).await {
            Ok(key) => key,
            Err(e) => {
                warn!("Dialogflow credentials unusable, replies will use the local fallback: {}", e);
                return Self::not_ready();
            }
        };

        let Some(project_id) = config
            .dialogflow_project_id
            .clone()
            .or_else(|| key.project_id.clone())
        else {
            warn!("No Dialogflow project id configured or present in the credentials");
            return Self::not_ready();
        };

        let tokens = match AccessTokenProvider::new(http_client.clone(), &key) {
            Ok(tokens) => tokens,
            Err(e) => {
                warn!("Dialogflow credentials unusable, replies will use the local fallback: {}", e);
                return Self::not_ready();
            }
        };

        info!(project_id = %project_id, "Dialogflow gateway ready");
        Self::ready(
            Arc::new(DialogflowClient::new(http_client, tokens)),
            project_id,
            config.nlu_timeout,
        )
    }

    pub fn is_ready(&self) -> bool {
        self.backend.is_some()
    }

    pub fn project_id(&self) -> Option<&str> {
        self.backend.as_ref().map(|_| self.project_id.as_str())
    }

    pub fn session_path(&self, session_key: &str) -> String {
        format!("projects/{}/agent/sessions/{}", self.project_id, session_key)
    }

    /// Resolve `text` within the session identified by `session_key`.
    pub async fn query(&self, text: &str, session_key: &str) -> Result<NluResult, NluError> {
        let backend = self
            .backend
            .as_ref()
            .ok_or_else(|| NluError::InvalidConfig("gateway is not ready".to_string()))?;

        let session_path = self.session_path(session_key);
        match tokio::time::timeout(
            self.timeout,
            backend.detect_intent(&session_path, text, LANGUAGE_CODE),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(NluError::Unavailable(format!(
                "no answer within {:?}",
                self.timeout
            ))),
        }
    }
}
