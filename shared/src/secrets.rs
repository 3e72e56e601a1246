//! AWS Secrets Manager integration.

use aws_sdk_secretsmanager::Client as SecretsClient;
use std::collections::HashMap;
use std::sync::OnceLock;
use tokio::sync::RwLock;

use crate::{Error, Result};

/// Cached secrets with lazy initialization.
static SECRETS_CACHE: OnceLock<RwLock<HashMap<String, String>>> = OnceLock::new();

fn get_cache() -> &'static RwLock<HashMap<String, String>> {
    SECRETS_CACHE.get_or_init(|| RwLock::new(HashMap::new()))
}

async fn cached(secret_arn: &str) -> Option<String> {
    get_cache().read().await.get(secret_arn).cloned()
}

async fn remember(secret_arn: &str, value: &str) {
    get_cache()
        .write()
        .await
        .insert(secret_arn.to_string(), value.to_string());
}

/// Get a secret value from Secrets Manager with caching.
pub async fn get_secret(client: &SecretsClient, secret_arn: &str) -> Result<String> {
    if let Some(value) = cached(secret_arn).await {
        return Ok(value);
    }

    let response = client
        .get_secret_value()
        .secret_id(secret_arn)
        .send()
        .await
        .map_err(|e| Error::Aws(format!("Failed to get secret: {}", e)))?;

    let secret_string = response
        .secret_string()
        .ok_or_else(|| Error::Aws("Secret has no string value".to_string()))?
        .to_string();

    remember(secret_arn, &secret_string).await;
    Ok(secret_string)
}

/// Fetch a secret using the ambient AWS configuration of the Lambda.
pub async fn load_secret(secret_arn: &str) -> Result<String> {
    if let Some(value) = cached(secret_arn).await {
        return Ok(value);
    }
    let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let client = SecretsClient::new(&config);
    get_secret(&client, secret_arn).await
}

/// Clear the secrets cache (useful for testing or credential rotation).
pub async fn clear_cache() {
    let mut cache = get_cache().write().await;
    cache.clear();
}
