use crate::domain::contract;
use crate::domain::error::AnalysisError;
use crate::domain::recommendation::{AnalysisRequest, AnalysisResult};
use crate::driver::Analyzer;
use anyhow::Context;
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:3000/api/analyze";
const DEFAULT_TIMEOUT_SECS: u64 = 90;

/// Calls a remote `POST /api/analyze` endpoint.
#[derive(Debug, Clone)]
pub struct HttpAnalyzer {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpAnalyzer {
    pub fn new(endpoint: impl Into<String>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .context("failed to build analyze http client")?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait::async_trait]
impl Analyzer for HttpAnalyzer {
    async fn analyze(
        &self,
        query: &str,
        card_catalog: &str,
    ) -> Result<AnalysisResult, AnalysisError> {
        let body = AnalysisRequest {
            query: query.to_string(),
            card_info: card_catalog.to_string(),
        };

        let res = self
            .http
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| AnalysisError::Network(e.to_string()))?;

        let status = res.status();
        let text = res
            .text()
            .await
            .map_err(|e| AnalysisError::Network(e.to_string()))?;
        let payload = serde_json::from_str::<Value>(&text).unwrap_or(Value::Null);

        if status == StatusCode::TOO_MANY_REQUESTS {
            tracing::warn!(body = %payload, "analyze endpoint rate limited");
            return Err(AnalysisError::UpstreamRateLimited);
        }
        if !status.is_success() {
            let error = payload
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            tracing::warn!(%status, body = %payload, "analyze endpoint returned an error");
            return Err(AnalysisError::UpstreamOther(format!(
                "API error {status}: {error}"
            )));
        }

        contract::validate_cards(payload)
    }
}
