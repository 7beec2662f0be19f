use crate::domain::contract;
use crate::domain::error::AnalysisError;
use crate::domain::recommendation::AnalysisResult;
use crate::llm::{json, CompletionRequest, LlmClient, DEFAULT_MAX_TOKENS};
use std::sync::Arc;

/// Picks the best two cards for a purchase by asking the model and validating its answer.
#[derive(Clone)]
pub struct RecommendationService {
    llm: Arc<dyn LlmClient>,
    max_tokens: u32,
}

impl RecommendationService {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            llm,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub async fn analyze(
        &self,
        query: &str,
        card_catalog: &str,
    ) -> Result<AnalysisResult, AnalysisError> {
        if query.trim().is_empty() {
            return Err(AnalysisError::InvalidInput("query"));
        }
        if card_catalog.trim().is_empty() {
            return Err(AnalysisError::InvalidInput("cardInfo"));
        }

        let req = CompletionRequest {
            prompt: build_prompt(query, card_catalog),
            max_tokens: self.max_tokens,
        };

        let text = self
            .llm
            .complete(req)
            .await?
            .filter(|t| !t.trim().is_empty())
            .ok_or(AnalysisError::UpstreamEmptyResponse)?;

        let Some(value) = json::recover_json(&text) else {
            tracing::warn!(raw_output = %text, "could not recover JSON from model output");
            return Err(AnalysisError::malformed(
                "could not extract valid JSON from response",
            ));
        };

        let result = contract::validate_cards(value)?;
        tracing::info!(
            provider = ?self.llm.provider(),
            cards = result.cards.len(),
            "recommendation ready"
        );
        Ok(result)
    }
}

fn build_prompt(query: &str, card_catalog: &str) -> String {
    format!(
        "Analyze this purchase: \"{query}\"\n\n\
Cards available:\n{card_catalog}\n\n\
CRITICAL: You must respond with ONLY valid JSON. No explanatory text before or after.\n\n\
Provide the TOP 2 best cards for this purchase in this EXACT format:\n\
{{\"cards\":[{{\"card\":\"exact card name\",\"rate\":\"#x points/miles/% cash back\",\"reason\":\"brief explanation\"}},\
{{\"card\":\"exact card name\",\"rate\":\"#x points/miles/% cash back\",\"reason\":\"brief explanation\"}}]}}\n\n\
DO NOT include markdown, code fences, or any text outside the JSON object."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Provider;
    use std::sync::Mutex;

    /// Replays canned completions in order and records the prompts it received.
    struct ScriptedLlm {
        replies: Mutex<Vec<Result<Option<String>, AnalysisError>>>,
        prompts: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedLlm {
        fn new(replies: Vec<Result<Option<String>, AnalysisError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into_iter().rev().collect()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn text(text: &str) -> Arc<Self> {
            Self::new(vec![Ok(Some(text.to_string()))])
        }
    }

    #[async_trait::async_trait]
    impl LlmClient for ScriptedLlm {
        fn provider(&self) -> Provider {
            Provider::Anthropic
        }

        async fn complete(&self, req: CompletionRequest) -> Result<Option<String>, AnalysisError> {
            self.prompts.lock().unwrap().push(req);
            self.replies
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(AnalysisError::UpstreamOther("script exhausted".into())))
        }
    }

    const TWO_CARDS: &str = r#"{"cards":[{"card":"Bilt Mastercard","rate":"3x points","reason":"Dining"},{"card":"Citi Strata Premier","rate":"3x points","reason":"Restaurants"}]}"#;

    #[tokio::test]
    async fn returns_two_cards_and_embeds_inputs_in_prompt() {
        let llm = ScriptedLlm::text(TWO_CARDS);
        let service = RecommendationService::new(llm.clone());

        let result = service
            .analyze("coffee shop", "\nBilt Mastercard:\n- Dining: 3x points\n")
            .await
            .unwrap();
        assert_eq!(result.cards.len(), 2);
        assert_eq!(result.cards[0].card, "Bilt Mastercard");

        let prompts = llm.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts[0].max_tokens, DEFAULT_MAX_TOKENS);
        assert!(prompts[0].prompt.contains("Analyze this purchase: \"coffee shop\""));
        assert!(prompts[0].prompt.contains("- Dining: 3x points"));
        assert!(prompts[0].prompt.contains("DO NOT include markdown, code fences"));
        assert!(prompts[0].prompt.contains(r#"{"cards":[{"card":"exact card name""#));
    }

    #[tokio::test]
    async fn rejects_blank_inputs_without_calling_model() {
        let llm = ScriptedLlm::text(TWO_CARDS);
        let service = RecommendationService::new(llm.clone());

        assert_eq!(
            service.analyze("  ", "catalog").await.unwrap_err(),
            AnalysisError::InvalidInput("query")
        );
        assert_eq!(
            service.analyze("gas", "").await.unwrap_err(),
            AnalysisError::InvalidInput("cardInfo")
        );
        assert!(llm.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_completion_is_reported() {
        for reply in [None, Some("   ".to_string())] {
            let service = RecommendationService::new(ScriptedLlm::new(vec![Ok(reply)]));
            let err = service.analyze("gas", "catalog").await.unwrap_err();
            assert_eq!(err, AnalysisError::UpstreamEmptyResponse);
        }
    }

    #[tokio::test]
    async fn unrecoverable_text_is_malformed() {
        let service = RecommendationService::new(ScriptedLlm::text("I recommend the Bilt card."));
        let err = service.analyze("rent", "catalog").await.unwrap_err();
        assert!(matches!(err, AnalysisError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn fenced_reply_with_extra_cards_is_truncated() {
        let reply = r#"```json
{"cards":[
  {"card":"A","rate":"5x","reason":"r"},
  {"card":"B"},
  {"card":"C","rate":"2x","reason":"r"},
  {"card":"D","rate":"1x","reason":"r"}
]}
```"#;
        let service = RecommendationService::new(ScriptedLlm::text(reply));
        let result = service.analyze("hotel", "catalog").await.unwrap();
        let names: Vec<_> = result.cards.iter().map(|c| c.card.as_str()).collect();
        assert_eq!(names, ["A", "C"]);
    }

    #[tokio::test]
    async fn upstream_errors_pass_through() {
        for err in [
            AnalysisError::Configuration,
            AnalysisError::UpstreamAuth,
            AnalysisError::UpstreamRateLimited,
        ] {
            let service = RecommendationService::new(ScriptedLlm::new(vec![Err(err.clone())]));
            assert_eq!(service.analyze("gas", "catalog").await.unwrap_err(), err);
        }
    }
}
