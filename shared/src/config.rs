//! Configuration management for the relay Lambda.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::indicator::IndicatorMode;
use crate::{Error, Result};

/// Default bound on a single NLU round trip.
const DEFAULT_NLU_TIMEOUT_SECS: u64 = 10;

/// Default length of one indicator time unit.
const DEFAULT_INDICATOR_UNIT_MS: u64 = 1000;

/// Where the Dialogflow service-account key comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// Service-account JSON supplied directly in the environment
    Inline(String),
    /// ARN of a Secrets Manager secret holding the JSON
    SecretArn(String),
    /// Path to a JSON key file
    File(PathBuf),
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// LINE channel access token (bearer)
    pub line_channel_access_token: String,
    /// LINE channel secret used to verify webhook signatures
    pub line_channel_secret: String,
    /// Dialogflow project; falls back to the key's `project_id`
    pub dialogflow_project_id: Option<String>,
    /// Service-account key source, if any
    pub credentials: Option<CredentialSource>,
    /// Indicator mechanism
    pub indicator_mode: IndicatorMode,
    /// Length of one indicator time unit
    pub indicator_unit: Duration,
    /// Bound on each NLU call
    pub nlu_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let line_channel_access_token = non_empty("LINE_CHANNEL_ACCESS_TOKEN")
            .ok_or_else(|| Error::Config("LINE_CHANNEL_ACCESS_TOKEN not set".to_string()))?;
        let line_channel_secret = non_empty("LINE_CHANNEL_SECRET")
            .ok_or_else(|| Error::Config("LINE_CHANNEL_SECRET not set".to_string()))?;

        // Inline JSON wins over a secret, which wins over a key file.
        let credentials = non_empty("GOOGLE_CREDENTIALS_JSON")
            .map(CredentialSource::Inline)
            .or_else(|| non_empty("GOOGLE_CREDENTIALS_SECRET_ARN").map(CredentialSource::SecretArn))
            .or_else(|| {
                non_empty("GOOGLE_APPLICATION_CREDENTIALS")
                    .map(|p| CredentialSource::File(PathBuf::from(p)))
            });

        let indicator_mode = match non_empty("INDICATOR_MODE") {
            Some(raw) => raw.parse()?,
            None => IndicatorMode::default(),
        };

        let indicator_unit = Duration::from_millis(parse_number(
            non_empty("INDICATOR_UNIT_MS"),
            "INDICATOR_UNIT_MS",
            DEFAULT_INDICATOR_UNIT_MS,
        )?);

        let nlu_timeout = Duration::from_secs(parse_number(
            non_empty("NLU_TIMEOUT_SECS"),
            "NLU_TIMEOUT_SECS",
            DEFAULT_NLU_TIMEOUT_SECS,
        )?);
        if nlu_timeout.is_zero() {
            return Err(Error::Config("NLU_TIMEOUT_SECS must be positive".to_string()));
        }

        Ok(Self {
            line_channel_access_token,
            line_channel_secret,
            dialogflow_project_id: non_empty("DIALOGFLOW_PROJECT_ID"),
            credentials,
            indicator_mode,
            indicator_unit,
            nlu_timeout,
        })
    }
}

fn parse_number(raw: Option<String>, key: &str, default: u64) -> Result<u64> {
    match raw {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("{} must be a non-negative integer", key))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 2] = [
        ("LINE_CHANNEL_ACCESS_TOKEN", "token"),
        ("LINE_CHANNEL_SECRET", "secret"),
    ];

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&REQUIRED)).unwrap();
        assert_eq!(config.indicator_mode, IndicatorMode::Native);
        assert_eq!(config.indicator_unit, Duration::from_secs(1));
        assert_eq!(config.nlu_timeout, Duration::from_secs(10));
        assert!(config.credentials.is_none());
        assert!(config.dialogflow_project_id.is_none());
    }

    #[test]
    fn test_channel_secret_is_required() {
        let err = Config::from_lookup(lookup(&[("LINE_CHANNEL_ACCESS_TOKEN", "token")]))
            .unwrap_err();
        assert!(err.to_string().contains("LINE_CHANNEL_SECRET"));
    }

    #[test]
    fn test_inline_credentials_take_priority() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("GOOGLE_APPLICATION_CREDENTIALS", "/tmp/key.json"));
        vars.push(("GOOGLE_CREDENTIALS_SECRET_ARN", "arn:aws:secretsmanager:x"));
        vars.push(("GOOGLE_CREDENTIALS_JSON", "{\"type\":\"service_account\"}"));
        let config = Config::from_lookup(lookup(&vars)).unwrap();
        assert!(matches!(config.credentials, Some(CredentialSource::Inline(_))));
    }

    #[test]
    fn test_secret_arn_beats_file() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("GOOGLE_APPLICATION_CREDENTIALS", "/tmp/key.json"));
        vars.push(("GOOGLE_CREDENTIALS_SECRET_ARN", "arn:aws:secretsmanager:x"));
        let config = Config::from_lookup(lookup(&vars)).unwrap();
        assert_eq!(
            config.credentials,
            Some(CredentialSource::SecretArn("arn:aws:secretsmanager:x".to_string()))
        );
    }

    #[test]
    fn test_blank_values_are_ignored() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("GOOGLE_CREDENTIALS_JSON", "   "));
        vars.push(("GOOGLE_APPLICATION_CREDENTIALS", "/tmp/key.json"));
        let config = Config::from_lookup(lookup(&vars)).unwrap();
        assert_eq!(
            config.credentials,
            Some(CredentialSource::File(PathBuf::from("/tmp/key.json")))
        );
    }

    #[test]
    fn test_indicator_settings() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("INDICATOR_MODE", "status_message"));
        vars.push(("INDICATOR_UNIT_MS", "250"));
        let config = Config::from_lookup(lookup(&vars)).unwrap();
        assert_eq!(config.indicator_mode, IndicatorMode::StatusMessage);
        assert_eq!(config.indicator_unit, Duration::from_millis(250));
    }

    #[test]
    fn test_invalid_numbers_rejected() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("NLU_TIMEOUT_SECS", "soon"));
        assert!(Config::from_lookup(lookup(&vars)).is_err());

        let mut vars = REQUIRED.to_vec();
        vars.push(("NLU_TIMEOUT_SECS", "0"));
        assert!(Config::from_lookup(lookup(&vars)).is_err());
    }
}
