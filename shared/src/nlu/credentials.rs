//! Google service-account credentials and OAuth access tokens.

use std::fmt;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::NluError;
use crate::config::CredentialSource;
use crate::{secrets, Error, Result};

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Assertions are valid for one hour, the maximum Google accepts.
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Refresh tokens this long before they expire.
const REFRESH_MARGIN_SECS: i64 = 60;

/// The fields of a service-account key file the relay needs.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key", &"[redacted]")
            .field("project_id", &self.project_id)
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccountKey {
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw)
            .map_err(|e| Error::Credentials(format!("Invalid service-account JSON: {}", e)))
    }

    /// Resolve key material from whichever source was configured.
    pub async fn load(source: &CredentialSource) -> Result<Self> {
        let raw = match source {
            CredentialSource::Inline(json) => json.clone(),
            CredentialSource::SecretArn(arn) => secrets::load_secret(arn).await?,
            CredentialSource::File(path) => tokio::fs::read_to_string(path).await.map_err(|e| {
                Error::Credentials(format!("Failed to read {}: {}", path.display(), e))
            })?,
        };
        Self::from_json(&raw)
    }
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    ASSERTION_LIFETIME_SECS
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + ChronoDuration::seconds(REFRESH_MARGIN_SECS) < self.expires_at
    }
}

/// Mints and caches OAuth access tokens via the JWT-bearer grant.
pub struct AccessTokenProvider {
    http_client: reqwest::Client,
    client_email: String,
    token_uri: String,
    encoding_key: EncodingKey,
    cache: RwLock<Option<CachedToken>>,
}

impl AccessTokenProvider {
    /// Fails if the private key is not a usable RSA PEM.
    pub fn new(http_client: reqwest::Client, key: &ServiceAccountKey) -> Result<Self> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| Error::Credentials(format!("Invalid private key: {}", e)))?;

        Ok(Self {
            http_client,
            client_email: key.client_email.clone(),
            token_uri: key.token_uri.clone(),
            encoding_key,
            cache: RwLock::new(None),
        })
    }

    /// A valid bearer token, refreshed when close to expiry.
    pub async fn access_token(&self) -> std::result::Result<String, NluError> {
        let now = Utc::now();
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref().filter(|c| c.is_fresh(now)) {
                return Ok(cached.token.clone());
            }
        }

        let mut cache = self.cache.write().await;
        // Another task may have refreshed while we waited for the lock.
        if let Some(cached) = cache.as_ref().filter(|c| c.is_fresh(now)) {
            return Ok(cached.token.clone());
        }

        let fresh = self.fetch_token(now).await?;
        let token = fresh.token.clone();
        *cache = Some(fresh);
        Ok(token)
    }

    fn assertion(&self, now: DateTime<Utc>) -> std::result::Result<String, NluError> {
        let claims = AssertionClaims {
            iss: &self.client_email,
            scope: CLOUD_PLATFORM_SCOPE,
            aud: &self.token_uri,
            iat: now.timestamp(),
            exp: now.timestamp() + ASSERTION_LIFETIME_SECS,
        };
        encode(&Header::new(Algorithm::RS256), &claims, &self.encoding_key)
            .map_err(|e| NluError::InvalidConfig(format!("Failed to sign assertion: {}", e)))
    }

    async fn fetch_token(&self, now: DateTime<Utc>) -> std::result::Result<CachedToken, NluError> {
        let assertion = self.assertion(now)?;

        let response = self
            .http_client
            .post(&self.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| NluError::Unavailable(format!("Token endpoint unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(if status.is_server_error() {
                NluError::Unavailable(format!("Token endpoint returned {}: {}", status, body))
            } else {
                NluError::InvalidConfig(format!("Token request rejected ({}): {}", status, body))
            });
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| NluError::Unavailable(format!("Malformed token response: {}", e)))?;

        debug!(expires_in = token.expires_in, "Fetched access token");
        info!("Refreshed Dialogflow access token for {}", self.client_email);

        Ok(CachedToken {
            token: token.access_token,
            expires_at: now + ChronoDuration::seconds(token.expires_in),
        })
    }
}
