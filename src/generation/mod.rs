//! Text generation against a hosted model.
//!
//! A [`GenerationRequest`] is validated up front (an empty prompt never leaves
//! the process), then handed to a [`TextGenerator`]. Whatever goes wrong after
//! that point is folded into [`GenerationResult::Failure`] so the caller can
//! show it without unwinding.

pub mod bedrock;
pub mod sigv4;

pub use bedrock::{BedrockClient, DEFAULT_MODEL_ID};
pub use sigv4::AwsCredentials;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub const DEFAULT_MAX_TOKENS: u32 = 512;
pub const DEFAULT_TEMPERATURE: f64 = 0.5;
pub const DEFAULT_TOP_P: f64 = 0.9;

/// Sampling parameters sent with every request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerationConfig {
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
    /// Randomness, in `[0, 1]`.
    pub temperature: f64,
    /// Nucleus sampling probability, in `[0, 1]`.
    pub top_p: f64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            top_p: DEFAULT_TOP_P,
        }
    }
}

impl GenerationConfig {
    pub fn validate(&self) -> Result<(), GenerationError> {
        if self.max_tokens == 0 {
            return Err(GenerationError::InvalidConfig(
                "maxTokens must be greater than zero".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(GenerationError::InvalidConfig(format!(
                "temperature must be within [0, 1], got {}",
                self.temperature
            )));
        }
        if !(0.0..=1.0).contains(&self.top_p) {
            return Err(GenerationError::InvalidConfig(format!(
                "topP must be within [0, 1], got {}",
                self.top_p
            )));
        }
        Ok(())
    }
}

/// A single, immutable generation request.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    prompt: String,
    config: GenerationConfig,
}

impl GenerationRequest {
    /// Build a request, rejecting an empty prompt and out-of-range parameters.
    ///
    /// Whitespace is content: a prompt of only spaces is sent as-is.
    pub fn new(prompt: impl Into<String>, config: GenerationConfig) -> Result<Self, GenerationError> {
        let prompt = prompt.into();
        if prompt.is_empty() {
            return Err(GenerationError::EmptyPrompt);
        }
        config.validate()?;
        Ok(Self { prompt, config })
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }
}

/// Outcome of one generation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationResult {
    /// Output of the first candidate, verbatim.
    Text(String),
    /// Human-readable description of why no text was produced.
    Failure(String),
}

impl GenerationResult {
    pub fn is_text(&self) -> bool {
        matches!(self, GenerationResult::Text(_))
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            GenerationResult::Text(text) => Some(text.as_str()),
            GenerationResult::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&str> {
        match self {
            GenerationResult::Text(_) => None,
            GenerationResult::Failure(reason) => Some(reason.as_str()),
        }
    }
}

/// Generation errors
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("prompt must not be empty")]
    EmptyPrompt,

    #[error("invalid generation config: {0}")]
    InvalidConfig(String),

    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),

    #[error("failed to build HTTP client: {0}")]
    Client(String),

    #[error("failed to serialize request body: {0}")]
    Serialize(String),

    #[error("HTTP request failed: {0}")]
    Transport(String),

    #[error("Bedrock API returned {status}{}: {message}", error_code_suffix(.code))]
    Service {
        status: u16,
        /// Bedrock exception name, e.g. `ThrottlingException`
        code: Option<String>,
        message: String,
    },

    #[error("malformed Bedrock response: {0}")]
    MalformedResponse(String),
}

impl GenerationError {
    /// Whether the caller misused the API, as opposed to the remote call failing.
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            GenerationError::EmptyPrompt | GenerationError::InvalidConfig(_)
        )
    }
}

fn error_code_suffix(code: &Option<String>) -> String {
    match code {
        Some(code) => format!(" ({code})"),
        None => String::new(),
    }
}

/// Message shown to the user when a model call fails.
pub fn failure_reason(model_id: &str, err: &GenerationError) -> String {
    format!("ERROR: Can't invoke '{model_id}'. Reason: {err}")
}

/// A hosted text-generation model.
///
/// `invoke` performs exactly one remote call; there are no retries and no
/// cancellation.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Identifier of the model this generator calls.
    fn model_id(&self) -> &str;

    /// Send the request and return the first candidate's text.
    async fn invoke(&self, request: &GenerationRequest) -> Result<String, GenerationError>;

    /// Like [`TextGenerator::invoke`], but reports failures as a value.
    async fn generate(&self, request: &GenerationRequest) -> GenerationResult {
        match self.invoke(request).await {
            Ok(text) => {
                info!(model = %self.model_id(), chars = text.len(), "generation succeeded");
                GenerationResult::Text(text)
            }
            Err(e) => {
                let reason = failure_reason(self.model_id(), &e);
                warn!(model = %self.model_id(), error = %e, "generation failed");
                GenerationResult::Failure(reason)
            }
        }
    }
}

/// Validate `prompt` and run one generation.
///
/// Returns `Err` only for usage errors, which are detected before any
/// network traffic. Remote failures come back as `Ok(GenerationResult::Failure)`.
pub async fn generate<G>(
    generator: &G,
    prompt: &str,
    config: &GenerationConfig,
) -> Result<GenerationResult, GenerationError>
where
    G: TextGenerator + ?Sized,
{
    let request = GenerationRequest::new(prompt, *config)?;
    Ok(generator.generate(&request).await)
}
