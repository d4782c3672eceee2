//! Minimal Anthropic Claude API client.
//!
//! This crate provides a focused client for Claude's Messages API:
//! - Non-streaming completions with a system prompt and a single user turn
//! - Token usage reporting on every response
//! - A helper for extracting JSON payloads from markdown-fenced replies

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const API_BASE: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Errors that can occur when using the Claude client.
#[derive(Debug, Error)]
pub enum Error {
    #[error("API key not configured")]
    NoApiKey,

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Claude API client.
#[derive(Clone)]
pub struct Claude {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl Claude {
    /// Create a new Claude client with the given API key.
    pub fn new(api_key: impl Into<String>) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .connect_timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
        })
    }

    /// Create a Claude client from the ANTHROPIC_API_KEY environment variable.
    pub fn from_env() -> Result<Self, Error> {
        let api_key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| Error::NoApiKey)?;
        Self::new(api_key)
    }

    /// Set the default model for this client.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// The model completions default to.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send a completion request and return the full response.
    pub async fn complete(&self, request: Request) -> Result<Response, Error> {
        let api_request = ApiRequest {
            model: request.model.unwrap_or_else(|| self.model.clone()),
            max_tokens: request.max_tokens,
            system: request.system,
            messages: vec![ApiMessage {
                role: "user".to_string(),
                content: request.user,
            }],
            temperature: request.temperature,
        };
        let headers = self.build_headers()?;

        let response = self
            .client
            .post(format!("{API_BASE}/messages"))
            .headers(headers)
            .json(&api_request)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                status,
                message: body,
            });
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| Error::Parse(e.to_string()))?;

        let text = api_response
            .content
            .iter()
            .filter_map(|block| match block {
                ApiContent::Text { text } => Some(text.as_str()),
                ApiContent::Other => None,
            })
            .collect::<Vec<_>>()
            .join("");

        if text.is_empty() {
            return Err(Error::Parse(
                "response contained no text content".to_string(),
            ));
        }

        Ok(Response {
            model: api_response.model,
            text,
            usage: Usage {
                input_tokens: api_response.usage.input_tokens,
                output_tokens: api_response.usage.output_tokens,
            },
        })
    }

    fn build_headers(&self) -> Result<HeaderMap, Error> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&self.api_key)
                .map_err(|e| Error::Config(format!("Invalid API key: {e}")))?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static(API_VERSION));
        Ok(headers)
    }
}

// ============================================================================
// Public types
// ============================================================================

/// A completion request to send to Claude.
#[derive(Debug, Clone)]
pub struct Request {
    pub model: Option<String>,
    pub max_tokens: usize,
    pub system: Option<String>,
    pub user: String,
    pub temperature: Option<f32>,
}

impl Request {
    /// Create a new request with the given user message.
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            model: None,
            max_tokens: 2048,
            system: None,
            user: user.into(),
            temperature: None,
        }
    }

    /// Set the system prompt.
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Set the maximum number of tokens to generate.
    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Override the model for this request.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// A completed response from Claude.
#[derive(Debug, Clone)]
pub struct Response {
    /// The model that produced the response.
    pub model: String,

    /// Concatenated text content of the response.
    pub text: String,

    /// Token usage for this call.
    pub usage: Usage,
}

/// Token usage for a single API call.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl Usage {
    pub fn total_tokens(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

/// Strip markdown code fences from a reply that is expected to carry JSON.
///
/// Models sometimes wrap JSON in ```json fences despite instructions not to.
pub fn extract_json(text: &str) -> &str {
    let mut text = text.trim();

    if let Some(rest) = text.strip_prefix("```json") {
        text = rest;
    } else if let Some(rest) = text.strip_prefix("```") {
        text = rest;
    }

    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }

    text.trim()
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Serialize)]
struct ApiRequest {
    model: String,
    max_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ApiResponse {
    model: String,
    content: Vec<ApiContent>,
    usage: ApiUsage,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApiContent {
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct ApiUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let request = Request::new("Hello")
            .with_system("You are a narrator.")
            .with_max_tokens(512)
            .with_temperature(0.8);

        assert_eq!(request.user, "Hello");
        assert_eq!(request.system.as_deref(), Some("You are a narrator."));
        assert_eq!(request.max_tokens, 512);
        assert_eq!(request.temperature, Some(0.8));
        assert!(request.model.is_none());
    }

    #[test]
    fn test_extract_json_plain() {
        assert_eq!(extract_json(r#"{"a": 1}"#), r#"{"a": 1}"#);
    }

    #[test]
    fn test_extract_json_fenced() {
        let fenced = "```json\n{\"a\": 1}\n```";
        assert_eq!(extract_json(fenced), "{\"a\": 1}");

        let bare_fence = "```\n{\"a\": 1}\n```";
        assert_eq!(extract_json(bare_fence), "{\"a\": 1}");
    }

    #[test]
    fn test_extract_json_untouched_interior() {
        // Fences inside the payload are preserved.
        let text = "{\"note\": \"use ``` for code\"}";
        assert_eq!(extract_json(text), text);
    }

    #[test]
    fn test_usage_total() {
        let usage = Usage {
            input_tokens: 100,
            output_tokens: 50,
        };
        assert_eq!(usage.total_tokens(), 150);
    }
}
