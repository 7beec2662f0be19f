use crate::domain::error::AnalysisError;

pub mod anthropic;
pub mod json;

/// Output budget for a single recommendation completion.
pub const DEFAULT_MAX_TOKENS: u32 = 1800;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Anthropic,
}

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub prompt: String,
    pub max_tokens: u32,
}

#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    fn provider(&self) -> Provider;

    /// Issues one completion call. `Ok(None)` means the call succeeded but produced no text.
    async fn complete(&self, req: CompletionRequest) -> Result<Option<String>, AnalysisError>;
}
