//! Typed configuration structures
//!
//! Every section has defaults so a partial (or absent) file still yields a
//! usable configuration; credentials are checked only when a client is built.

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::generation::{
    AwsCredentials, GenerationConfig, DEFAULT_MAX_TOKENS, DEFAULT_MODEL_ID, DEFAULT_TEMPERATURE,
    DEFAULT_TOP_P,
};
use crate::generation::bedrock::DEFAULT_CONNECT_TIMEOUT_SECS;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// AWS region and credentials
    pub aws: AwsConfig,
    /// Model selection and sampling parameters
    pub model: ModelConfig,
    /// HTTP transport settings
    pub http: HttpConfig,
    /// Log output
    pub logging: LoggingConfig,
}

impl Config {
    /// Check the values that can be checked without contacting AWS.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.id.trim().is_empty() {
            return Err(ConfigError::Invalid("model.id must not be empty".to_string()));
        }
        self.model
            .generation()
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if self.http.connect_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "http.connectTimeoutSecs must be greater than zero".to_string(),
            ));
        }
        if self.http.timeout_secs == Some(0) {
            return Err(ConfigError::Invalid(
                "http.timeoutSecs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// AWS access configuration
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AwsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_key_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_access_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,
}

impl std::fmt::Debug for AwsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsConfig")
            .field("region", &self.region)
            .field("access_key_id", &self.access_key_id.as_ref().map(|_| "***"))
            .field("secret_access_key", &self.secret_access_key.as_ref().map(|_| "***"))
            .field("session_token", &self.session_token.is_some())
            .finish()
    }
}

impl AwsConfig {
    /// Resolve the region and credentials, failing on the first missing value.
    pub fn credentials(&self) -> Result<(String, AwsCredentials), ConfigError> {
        let region = non_blank(&self.region).ok_or(ConfigError::MissingCredentials("region"))?;
        let access_key_id =
            non_blank(&self.access_key_id).ok_or(ConfigError::MissingCredentials("accessKeyId"))?;
        let secret_access_key = non_blank(&self.secret_access_key)
            .ok_or(ConfigError::MissingCredentials("secretAccessKey"))?;

        let mut credentials = AwsCredentials::new(access_key_id, secret_access_key);
        if let Some(token) = non_blank(&self.session_token) {
            credentials = credentials.with_session_token(token);
        }
        Ok((region.to_string(), credentials))
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

/// Model configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModelConfig {
    /// Bedrock model identifier
    pub id: String,
    /// Maximum generated tokens
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f64,
    /// Nucleus sampling probability
    pub top_p: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            id: DEFAULT_MODEL_ID.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            top_p: DEFAULT_TOP_P,
        }
    }
}

impl ModelConfig {
    pub fn generation(&self) -> GenerationConfig {
        GenerationConfig {
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            top_p: self.top_p,
        }
    }
}

/// HTTP transport configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HttpConfig {
    pub connect_timeout_secs: u64,
    /// Total request timeout. Unset means no limit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    /// Override for the regional Bedrock runtime endpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            timeout_secs: None,
            base_url: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `bedrock_preview=debug`
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: LogFormat::Text,
        }
    }
}

/// Log line format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}
