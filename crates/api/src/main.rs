use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use card_optimizer_core::analyze::RecommendationService;
use card_optimizer_core::llm::anthropic::AnthropicClient;
use card_optimizer_core::rate_limit::{RateLimitPolicy, SlidingWindowLimiter};

mod routes;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = card_optimizer_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let llm = AnthropicClient::from_settings(&settings)?;
    if !llm.is_configured() {
        let err = anyhow::anyhow!("ANTHROPIC_API_KEY missing; analyze requests will fail");
        sentry_anyhow::capture_anyhow(&err);
        tracing::error!(error = %err, "starting API in degraded mode");
    }
    let service =
        RecommendationService::new(Arc::new(llm)).with_max_tokens(settings.llm_max_tokens);

    let policy = RateLimitPolicy {
        max_requests: settings.rate_limit_max_requests,
        window: chrono::Duration::from_std(settings.rate_limit_window)
            .context("RATE_LIMIT_WINDOW_SECS out of range")?,
    };
    let limiter = Arc::new(SlidingWindowLimiter::in_memory(policy));
    spawn_rate_limit_sweeper(Arc::clone(&limiter), settings.rate_limit_window);

    let app = routes::router(routes::AppState { service, limiter });

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

/// Evicts clients that have gone quiet for a full window.
fn spawn_rate_limit_sweeper(limiter: Arc<SlidingWindowLimiter>, every: std::time::Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = limiter.prune(chrono::Utc::now());
            if removed > 0 {
                tracing::debug!(removed, "pruned idle rate-limit clients");
            }
        }
    });
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(
    settings: &card_optimizer_core::config::Settings,
) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
