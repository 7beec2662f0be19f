//! Client-side retry loop that always hands back something renderable.

use crate::analyze::RecommendationService;
use crate::domain::error::AnalysisError;
use crate::domain::recommendation::AnalysisResult;
use crate::retry::{exponential_delay, retry_with_backoff};
use std::sync::Arc;
use std::time::Duration;

pub const MAX_ATTEMPTS: u32 = 3;

pub const RATE_LIMITED_MESSAGE: &str = "Rate limit exceeded. Please wait a moment and try again.";
pub const UPSTREAM_MESSAGE: &str = "API temporarily unavailable. Please wait and try again.";
pub const NETWORK_MESSAGE: &str = "Network error. Please check your connection and try again.";
pub const GENERIC_MESSAGE: &str = "Unable to analyze. Please try again in a few seconds.";

#[async_trait::async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(&self, query: &str, card_catalog: &str)
        -> Result<AnalysisResult, AnalysisError>;
}

#[async_trait::async_trait]
impl Analyzer for RecommendationService {
    async fn analyze(
        &self,
        query: &str,
        card_catalog: &str,
    ) -> Result<AnalysisResult, AnalysisError> {
        RecommendationService::analyze(self, query, card_catalog).await
    }
}

pub struct RetryDriver {
    analyzer: Arc<dyn Analyzer>,
    max_attempts: u32,
    delay: fn(u32) -> Duration,
}

impl RetryDriver {
    pub fn new(analyzer: Arc<dyn Analyzer>) -> Self {
        Self {
            analyzer,
            max_attempts: MAX_ATTEMPTS,
            delay: exponential_delay,
        }
    }

    /// Never fails: after the last attempt, the failure is folded into an error card.
    pub async fn run(&self, query: &str, card_catalog: &str) -> AnalysisResult {
        let outcome = retry_with_backoff(self.max_attempts, self.delay, |attempt| {
            let analyzer = Arc::clone(&self.analyzer);
            async move {
                tracing::info!(attempt, max_attempts = self.max_attempts, %query, "analyzing purchase");
                analyzer.analyze(query, card_catalog).await
            }
        })
        .await;

        match outcome {
            Ok(result) => result,
            Err(err) => {
                tracing::error!(error = %err, "all analysis attempts failed");
                AnalysisResult::error_card(error_message(&err))
            }
        }
    }
}

/// User-facing text for the final failure of a retry cycle.
pub fn error_message(err: &AnalysisError) -> &'static str {
    match err {
        AnalysisError::UpstreamRateLimited => RATE_LIMITED_MESSAGE,
        AnalysisError::Network(_) => NETWORK_MESSAGE,
        e if e.is_upstream() => UPSTREAM_MESSAGE,
        _ => GENERIC_MESSAGE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::recommendation::CardRecommendation;
    use std::sync::Mutex;
    use tokio::time::Instant;

    struct FlakyAnalyzer {
        failures: Mutex<Vec<AnalysisError>>,
        calls: Mutex<Vec<Duration>>,
        started: Instant,
    }

    impl FlakyAnalyzer {
        fn new(failures: Vec<AnalysisError>) -> Arc<Self> {
            Arc::new(Self {
                failures: Mutex::new(failures.into_iter().rev().collect()),
                calls: Mutex::new(Vec::new()),
                started: Instant::now(),
            })
        }
    }

    #[async_trait::async_trait]
    impl Analyzer for FlakyAnalyzer {
        async fn analyze(
            &self,
            _query: &str,
            _card_catalog: &str,
        ) -> Result<AnalysisResult, AnalysisError> {
            self.calls.lock().unwrap().push(self.started.elapsed());
            match self.failures.lock().unwrap().pop() {
                Some(err) => Err(err),
                None => Ok(AnalysisResult {
                    cards: vec![CardRecommendation {
                        card: "Citi Custom Cash".into(),
                        rate: "5% cash back".into(),
                        reason: "Top category".into(),
                    }],
                }),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_third_attempt_after_backoff() {
        let analyzer = FlakyAnalyzer::new(vec![
            AnalysisError::Network("connection reset".into()),
            AnalysisError::malformed("no valid cards in response"),
        ]);
        let driver = RetryDriver::new(analyzer.clone());

        let result = driver.run("gas station", "catalog").await;
        assert!(!result.is_error_card());
        assert_eq!(result.cards[0].card, "Citi Custom Cash");

        let calls = analyzer.calls.lock().unwrap();
        assert_eq!(calls.len(), 3);
        let first_gap = calls[1] - calls[0];
        let second_gap = calls[2] - calls[1];
        assert!(first_gap >= Duration::from_secs(2) && first_gap < Duration::from_millis(2_100));
        assert!(second_gap >= Duration::from_secs(4) && second_gap < Duration::from_millis(4_100));
    }

    #[tokio::test(start_paused = true)]
    async fn network_exhaustion_yields_network_error_card() {
        let analyzer = FlakyAnalyzer::new(vec![
            AnalysisError::Network("dns".into()),
            AnalysisError::Network("dns".into()),
            AnalysisError::Network("dns".into()),
        ]);
        let result = RetryDriver::new(analyzer.clone()).run("gas", "catalog").await;

        assert!(result.is_error_card());
        assert_eq!(result.cards.len(), 1);
        assert_eq!(result.cards[0].card, "Analysis Error");
        assert_eq!(result.cards[0].rate, "N/A");
        assert_eq!(result.cards[0].reason, NETWORK_MESSAGE);
        assert_eq!(analyzer.calls.lock().unwrap().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_is_retried_then_reported() {
        let analyzer = FlakyAnalyzer::new(vec![AnalysisError::UpstreamRateLimited; 3]);
        let result = RetryDriver::new(analyzer.clone()).run("gas", "catalog").await;
        assert_eq!(analyzer.calls.lock().unwrap().len(), 3);
        assert_eq!(result.cards[0].reason, RATE_LIMITED_MESSAGE);
    }

    #[tokio::test(start_paused = true)]
    async fn last_failure_picks_the_message() {
        let analyzer = FlakyAnalyzer::new(vec![
            AnalysisError::UpstreamRateLimited,
            AnalysisError::Network("reset".into()),
            AnalysisError::UpstreamOther("API error 500 Internal Server Error: Analysis failed".into()),
        ]);
        let result = RetryDriver::new(analyzer).run("gas", "catalog").await;
        assert_eq!(result.cards[0].reason, UPSTREAM_MESSAGE);
    }

    #[test]
    fn message_per_error_kind() {
        assert_eq!(error_message(&AnalysisError::UpstreamRateLimited), RATE_LIMITED_MESSAGE);
        assert_eq!(error_message(&AnalysisError::Network("x".into())), NETWORK_MESSAGE);
        assert_eq!(error_message(&AnalysisError::UpstreamAuth), UPSTREAM_MESSAGE);
        assert_eq!(error_message(&AnalysisError::Configuration), UPSTREAM_MESSAGE);
        assert_eq!(error_message(&AnalysisError::UpstreamEmptyResponse), UPSTREAM_MESSAGE);
        assert_eq!(error_message(&AnalysisError::malformed("x")), GENERIC_MESSAGE);
        assert_eq!(error_message(&AnalysisError::InvalidInput("query")), GENERIC_MESSAGE);
    }
}
