use crate::config::Settings;
use crate::domain::error::AnalysisError;
use crate::llm::{CompletionRequest, LlmClient, Provider};
use anyhow::Context;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

impl AnthropicConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        let base_url =
            std::env::var("ANTHROPIC_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let model = std::env::var("ANTHROPIC_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let timeout_secs = std::env::var("ANTHROPIC_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Self {
            api_key: settings.anthropic_api_key.clone(),
            base_url,
            model,
            timeout: Duration::from_secs(timeout_secs),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnthropicClient {
    http: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
}

impl AnthropicClient {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        Self::new(AnthropicConfig::from_settings(settings))
    }

    pub fn new(config: AnthropicConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            http,
            api_key: config.api_key,
            base_url: config.base_url,
            model: config.model,
        })
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn create_message(
        &self,
        api_key: &str,
        req: CreateMessageRequest,
    ) -> Result<CreateMessageResponse, AnalysisError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(api_key).map_err(|_| AnalysisError::UpstreamAuth)?,
        );
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );

        let url = format!("{}/v1/messages", self.base_url.trim_end_matches('/'));
        let res = self
            .http
            .post(url)
            .headers(headers)
            .json(&req)
            .send()
            .await
            .map_err(|e| AnalysisError::UpstreamOther(format!("Anthropic request failed: {e}")))?;

        let status = res.status();
        let text = res.text().await.map_err(|e| {
            AnalysisError::UpstreamOther(format!("failed to read Anthropic response body: {e}"))
        })?;

        if !status.is_success() {
            tracing::warn!(%status, body = %text, "Anthropic call rejected");
            return Err(map_status_error(status, &text));
        }

        serde_json::from_str::<CreateMessageResponse>(&text).map_err(|e| {
            AnalysisError::UpstreamOther(format!("failed to decode Anthropic response: {e}"))
        })
    }

    fn response_text(res: &CreateMessageResponse) -> Option<String> {
        res.content.iter().find_map(|block| match block {
            ContentBlock::Text { text } if !text.trim().is_empty() => Some(text.clone()),
            _ => None,
        })
    }
}

fn map_status_error(status: StatusCode, body: &str) -> AnalysisError {
    match status {
        StatusCode::UNAUTHORIZED => AnalysisError::UpstreamAuth,
        StatusCode::TOO_MANY_REQUESTS => AnalysisError::UpstreamRateLimited,
        _ => {
            let detail = serde_json::from_str::<ErrorResponse>(body)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| body.to_string());
            AnalysisError::UpstreamOther(format!("Anthropic API error {status}: {detail}"))
        }
    }
}

#[async_trait::async_trait]
impl LlmClient for AnthropicClient {
    fn provider(&self) -> Provider {
        Provider::Anthropic
    }

    async fn complete(&self, req: CompletionRequest) -> Result<Option<String>, AnalysisError> {
        let Some(api_key) = self.api_key.as_deref() else {
            tracing::error!("ANTHROPIC_API_KEY is not configured");
            return Err(AnalysisError::Configuration);
        };

        let body = CreateMessageRequest {
            model: self.model.clone(),
            max_tokens: req.max_tokens,
            messages: vec![Message {
                role: "user",
                content: req.prompt,
            }],
        };

        let res = self.create_message(api_key, body).await?;
        if matches!(res.stop_reason.as_deref(), Some("max_tokens")) {
            tracing::warn!(max_tokens = req.max_tokens, "Anthropic stop_reason=max_tokens");
        }
        Ok(Self::response_text(&res))
    }
}

#[derive(Debug, Clone, Serialize)]
struct CreateMessageRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<Message>,
}

#[derive(Debug, Clone, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Clone, Deserialize)]
struct CreateMessageResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,

    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },

    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Clone, Deserialize)]
struct ErrorDetail {
    message: String,
}
