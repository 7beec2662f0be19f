pub mod analyze;
pub mod catalog;
pub mod domain;
pub mod driver;
pub mod http_client;
pub mod llm;
pub mod rate_limit;
pub mod retry;

pub mod config {
    use crate::llm::DEFAULT_MAX_TOKENS;
    use crate::rate_limit::{DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW_SECS};
    use anyhow::Context;
    use std::time::Duration;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub anthropic_api_key: Option<String>,
        pub sentry_dsn: Option<String>,
        pub llm_max_tokens: u32,
        pub rate_limit_max_requests: usize,
        pub rate_limit_window: Duration,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            let rate_limit_max_requests = match std::env::var("RATE_LIMIT_MAX_REQUESTS") {
                Ok(s) => s
                    .parse::<usize>()
                    .with_context(|| format!("invalid RATE_LIMIT_MAX_REQUESTS: {s}"))?,
                Err(_) => DEFAULT_MAX_REQUESTS,
            };
            let window_secs = match std::env::var("RATE_LIMIT_WINDOW_SECS") {
                Ok(s) => s
                    .parse::<u64>()
                    .with_context(|| format!("invalid RATE_LIMIT_WINDOW_SECS: {s}"))?,
                Err(_) => DEFAULT_WINDOW_SECS.unsigned_abs(),
            };
            anyhow::ensure!(rate_limit_max_requests > 0, "RATE_LIMIT_MAX_REQUESTS must be > 0");
            anyhow::ensure!(window_secs > 0, "RATE_LIMIT_WINDOW_SECS must be > 0");

            Ok(Self {
                anthropic_api_key: std::env::var("ANTHROPIC_API_KEY")
                    .ok()
                    .filter(|s| !s.trim().is_empty()),
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
                llm_max_tokens: std::env::var("ANTHROPIC_MAX_TOKENS")
                    .ok()
                    .and_then(|s| s.parse::<u32>().ok())
                    .unwrap_or(DEFAULT_MAX_TOKENS),
                rate_limit_max_requests,
                rate_limit_window: Duration::from_secs(window_secs),
            })
        }

        pub fn require_anthropic_api_key(&self) -> anyhow::Result<&str> {
            self.anthropic_api_key
                .as_deref()
                .context("ANTHROPIC_API_KEY is required")
        }
    }
}
