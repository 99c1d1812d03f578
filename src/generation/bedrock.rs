//! AWS Bedrock Titan Text client.
//!
//! Calls the `InvokeModel` endpoint with the native Titan request body:
//!
//! ```json
//! {"inputText": "...", "textGenerationConfig": {"maxTokenCount": 512, "temperature": 0.5, "topP": 0.9}}
//! ```
//!
//! and returns `results[0].outputText` from the response. Requests are signed
//! with SigV4 using static credentials; one request per call, no retries.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::sigv4::{percent_encode_path_segment, AwsCredentials, SigV4Signer, AMZ_DATE_FORMAT};
use super::{GenerationError, GenerationRequest, TextGenerator};
use crate::config::Config;

/// Amazon Titan Text G1 - Lite.
pub const DEFAULT_MODEL_ID: &str = "amazon.titan-text-lite-v1";

/// Connect timeout applied to the HTTP client; the request itself is unbounded
/// unless a total timeout is configured.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TitanRequest<'a> {
    input_text: &'a str,
    text_generation_config: TitanTextConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TitanTextConfig {
    max_token_count: u32,
    temperature: f64,
    top_p: f64,
}

impl<'a> From<&'a GenerationRequest> for TitanRequest<'a> {
    fn from(request: &'a GenerationRequest) -> Self {
        let config = request.config();
        Self {
            input_text: request.prompt(),
            text_generation_config: TitanTextConfig {
                max_token_count: config.max_tokens,
                temperature: config.temperature,
                top_p: config.top_p,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TitanResponse {
    #[serde(default)]
    input_text_token_count: Option<u64>,
    results: Vec<TitanResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TitanResult {
    output_text: String,
    #[serde(default)]
    token_count: Option<u64>,
    #[serde(default)]
    completion_reason: Option<String>,
}

/// Response header carrying the Bedrock exception name.
const ERROR_TYPE_HEADER: &str = "x-amzn-errortype";

/// Bedrock runtime client bound to one region, credential pair and model.
pub struct BedrockClient {
    http: reqwest::Client,
    signer: SigV4Signer,
    region: String,
    model_id: String,
    base_url: String,
    /// Path of `base_url`, without a trailing slash; empty for a bare host.
    path_prefix: String,
    connect_timeout: Duration,
    timeout: Option<Duration>,
}

impl std::fmt::Debug for BedrockClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BedrockClient")
            .field("region", &self.region)
            .field("model_id", &self.model_id)
            .field("base_url", &self.base_url)
            .field("connect_timeout", &self.connect_timeout)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl BedrockClient {
    /// Create a client for `region` using the default Titan model.
    ///
    /// Rejects a blank region or an incomplete key pair.
    pub fn new(region: impl Into<String>, credentials: AwsCredentials) -> Result<Self, GenerationError> {
        let region = region.into();
        if region.trim().is_empty() {
            return Err(GenerationError::InvalidConfig(
                "AWS region must not be empty".to_string(),
            ));
        }
        if !credentials.has_access_key_id() {
            return Err(GenerationError::InvalidConfig(
                "AWS access key ID must not be empty".to_string(),
            ));
        }
        if !credentials.has_secret_access_key() {
            return Err(GenerationError::InvalidConfig(
                "AWS secret access key must not be empty".to_string(),
            ));
        }
        let connect_timeout = Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS);
        let http = build_http_client(connect_timeout, None)?;
        let host = format!("bedrock-runtime.{region}.amazonaws.com");
        let base_url = format!("https://{host}");
        Ok(Self {
            http,
            signer: SigV4Signer::new(region.clone(), host, credentials),
            region,
            model_id: DEFAULT_MODEL_ID.to_string(),
            base_url,
            path_prefix: String::new(),
            connect_timeout,
            timeout: None,
        })
    }

    /// Build a client from loaded configuration.
    pub fn from_config(config: &Config) -> Result<Self, GenerationError> {
        let (region, credentials) = config
            .aws
            .credentials()
            .map_err(|e| GenerationError::InvalidConfig(e.to_string()))?;
        let mut client = Self::new(region, credentials)?
            .with_model(config.model.id.clone())?
            .with_timeouts(
                Duration::from_secs(config.http.connect_timeout_secs),
                config.http.timeout_secs.map(Duration::from_secs),
            )?;
        if let Some(ref url) = config.http.base_url {
            client = client.with_base_url(url)?;
        }
        Ok(client)
    }

    /// Use a different model identifier.
    pub fn with_model(mut self, model_id: impl Into<String>) -> Result<Self, GenerationError> {
        let model_id = model_id.into();
        if model_id.trim().is_empty() {
            return Err(GenerationError::InvalidConfig(
                "model ID must not be empty".to_string(),
            ));
        }
        self.model_id = model_id;
        Ok(self)
    }

    /// Point the client at another endpoint (VPC endpoint, FIPS endpoint, or a
    /// local stand-in). Both `http` and `https` are accepted.
    ///
    /// A path such as `https://proxy.internal/bedrock` is kept as a prefix of
    /// every request path and is covered by the signature. Query strings and
    /// fragments are rejected.
    pub fn with_base_url(mut self, url: &str) -> Result<Self, GenerationError> {
        let parsed = url::Url::parse(url)
            .map_err(|e| GenerationError::InvalidBaseUrl(format!("invalid URL \"{url}\": {e}")))?;
        let scheme = parsed.scheme();
        if scheme != "http" && scheme != "https" {
            return Err(GenerationError::InvalidBaseUrl(format!(
                "base URL must use http or https scheme, got \"{scheme}\""
            )));
        }
        let host = match (parsed.host_str(), parsed.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => {
                return Err(GenerationError::InvalidBaseUrl(format!(
                    "base URL has no host: \"{url}\""
                )))
            }
        };
        if parsed.query().is_some() || parsed.fragment().is_some() {
            return Err(GenerationError::InvalidBaseUrl(format!(
                "base URL must not carry a query or fragment: \"{url}\""
            )));
        }
        let path_prefix = parsed.path().trim_end_matches('/').to_string();
        self.base_url = format!("{scheme}://{host}{path_prefix}");
        self.path_prefix = path_prefix;
        self.signer = self.signer.with_host(host);
        Ok(self)
    }

    /// Replace the HTTP client's timeouts. `None` leaves the request unbounded.
    pub fn with_timeouts(
        mut self,
        connect: Duration,
        total: Option<Duration>,
    ) -> Result<Self, GenerationError> {
        self.http = build_http_client(connect, total)?;
        self.connect_timeout = connect;
        self.timeout = total;
        Ok(self)
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Connect timeout and optional total request timeout.
    pub fn timeouts(&self) -> (Duration, Option<Duration>) {
        (self.connect_timeout, self.timeout)
    }

    /// Serialize the native Titan request body.
    fn build_body(&self, request: &GenerationRequest) -> Result<Vec<u8>, GenerationError> {
        serde_json::to_vec(&TitanRequest::from(request))
            .map_err(|e| GenerationError::Serialize(e.to_string()))
    }

    /// Request path as sent and signed, including any base URL prefix.
    fn invoke_path(&self) -> String {
        format!(
            "{}/model/{}/invoke",
            self.path_prefix,
            percent_encode_path_segment(&self.model_id)
        )
    }

    /// Full request URL. `base_url` already carries `path_prefix`.
    fn invoke_url(&self) -> String {
        format!(
            "{}/model/{}/invoke",
            self.base_url,
            percent_encode_path_segment(&self.model_id)
        )
    }
}

#[async_trait]
impl TextGenerator for BedrockClient {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn invoke(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let body = self.build_body(request)?;
        let uri_path = self.invoke_path();
        let url = self.invoke_url();

        let datetime = chrono::Utc::now().format(AMZ_DATE_FORMAT).to_string();
        let sig_headers = self.signer.sign("POST", &uri_path, &body, &datetime);

        let mut http_request = self
            .http
            .post(&url)
            .header("content-type", "application/json")
            .header("accept", "application/json");
        for (name, value) in &sig_headers {
            http_request = http_request.header(name.as_str(), value.as_str());
        }

        debug!(model = %self.model_id, url = %url, bytes = body.len(), "invoking Bedrock model");

        let response = http_request
            .body(body)
            .send()
            .await
            .map_err(|e| GenerationError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let header_code = response
                .headers()
                .get(ERROR_TYPE_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(String::from);
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable>".to_string());
            return Err(GenerationError::Service {
                status: status.as_u16(),
                code: service_error_code(header_code.as_deref(), &body),
                message: service_error_message(&body),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| GenerationError::Transport(format!("failed to read response body: {e}")))?;
        parse_invoke_response(&bytes)
    }
}

fn build_http_client(
    connect: Duration,
    total: Option<Duration>,
) -> Result<reqwest::Client, GenerationError> {
    let mut builder = reqwest::Client::builder().connect_timeout(connect);
    if let Some(total) = total {
        builder = builder.timeout(total);
    }
    builder
        .build()
        .map_err(|e| GenerationError::Client(e.to_string()))
}

/// Extract `results[0].outputText` from an `InvokeModel` response body.
pub fn parse_invoke_response(body: &[u8]) -> Result<String, GenerationError> {
    let response: TitanResponse = serde_json::from_slice(body)
        .map_err(|e| GenerationError::MalformedResponse(e.to_string()))?;

    let input_tokens = response.input_text_token_count;
    let first = response
        .results
        .into_iter()
        .next()
        .ok_or_else(|| GenerationError::MalformedResponse("response contained no results".to_string()))?;

    debug!(
        input_tokens = ?input_tokens,
        output_tokens = ?first.token_count,
        completion_reason = first.completion_reason.as_deref().unwrap_or("unknown"),
        "decoded Titan response"
    );
    Ok(first.output_text)
}

/// Exception name from `x-amzn-ErrorType`, else the body's `__type`.
///
/// Both may carry a `:`-separated suffix or a `#`-separated namespace, e.g.
/// `ThrottlingException:http://internal.amazon.com/coral/...`.
fn service_error_code(header: Option<&str>, body: &str) -> Option<String> {
    let raw = match header {
        Some(value) => value.to_string(),
        None => serde_json::from_str::<serde_json::Value>(body)
            .ok()?
            .get("__type")?
            .as_str()?
            .to_string(),
    };
    let name = raw.split(':').next().unwrap_or("");
    let name = name.rsplit('#').next().unwrap_or("").trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Bedrock errors carry `{"message": "..."}`; fall back to the raw body.
fn service_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("Message"))
                .and_then(|m| m.as_str())
                .map(String::from)
        })
        .unwrap_or_else(|| body.trim().to_string())
}
