//! HTTP judge client for messages-style APIs.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

use super::client::{JudgeClient, JudgeError, JudgeRequest};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1/messages";
const DEFAULT_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 500;

/// Configuration for the HTTP judge client.
#[derive(Debug, Clone)]
pub struct HttpJudgeConfig {
    pub base_url: String,
    pub api_key_env: String,
    pub model: String,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl Default for HttpJudgeConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout: Duration::from_secs(120),
        }
    }
}

impl HttpJudgeConfig {
    /// Config for a specific model, everything else default.
    pub fn with_model(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }
}

/// Judge client backed by a messages-style HTTP API.
pub struct HttpJudgeClient {
    client: Client,
    api_key: String,
    config: HttpJudgeConfig,
}

impl HttpJudgeClient {
    /// Create a client, reading the API key from the configured
    /// environment variable.
    pub fn new(config: HttpJudgeConfig) -> Result<Self, JudgeError> {
        let api_key =
            std::env::var(&config.api_key_env).map_err(|_| JudgeError::MissingApiKey {
                env_var: config.api_key_env.clone(),
            })?;
        Self::with_api_key(api_key, config)
    }

    /// Create a client with an explicit API key.
    pub fn with_api_key(api_key: String, config: HttpJudgeConfig) -> Result<Self, JudgeError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(JudgeError::Network)?;

        Ok(Self {
            client,
            api_key,
            config,
        })
    }

    fn build_body(&self, request: &JudgeRequest) -> Value {
        let mut body = json!({
            "model": self.config.model,
            "max_tokens": request.max_tokens.unwrap_or(self.config.max_tokens),
            "messages": [
                { "role": "user", "content": request.text }
            ]
        });

        if let Some(system) = &request.system_prompt {
            body["system"] = json!(system);
        }
        if let Some(temperature) = request.temperature {
            body["temperature"] = json!(temperature);
        }

        body
    }

    /// Concatenated text content blocks from a messages-API response.
    fn extract_text(body: &Value) -> Result<String, JudgeError> {
        let mut text = String::new();

        if let Some(blocks) = body["content"].as_array() {
            for block in blocks {
                if block["type"].as_str() == Some("text")
                    && let Some(chunk) = block["text"].as_str()
                {
                    if !text.is_empty() {
                        text.push('\n');
                    }
                    text.push_str(chunk);
                }
            }
        }

        if text.is_empty() {
            return Err(JudgeError::InvalidResponse(
                "no text content in response".to_string(),
            ));
        }
        Ok(text)
    }
}

#[async_trait]
impl JudgeClient for HttpJudgeClient {
    async fn query(&self, request: JudgeRequest) -> Result<String, JudgeError> {
        let body = self.build_body(&request);

        let response = self
            .client
            .post(&self.config.base_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();

        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(JudgeError::RateLimited {
                retry_after: Duration::from_secs(retry_after),
            });
        }

        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(JudgeError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: Value = response
            .json()
            .await
            .map_err(|e| JudgeError::InvalidResponse(e.to_string()))?;
        Self::extract_text(&parsed)
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

impl std::fmt::Debug for HttpJudgeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpJudgeClient")
            .field("model", &self.config.model)
            .field("base_url", &self.config.base_url)
            .finish()
    }
}
