use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use card_optimizer_core::analyze::RecommendationService;
use card_optimizer_core::catalog::{quick_category, CardCatalog, QUICK_CATEGORIES};
use card_optimizer_core::domain::recommendation::AnalysisResult;
use card_optimizer_core::driver::{Analyzer, RetryDriver};
use card_optimizer_core::http_client::{HttpAnalyzer, DEFAULT_ENDPOINT};
use card_optimizer_core::llm::anthropic::AnthropicClient;

#[derive(Debug, Parser)]
#[command(name = "card_optimizer", about = "Pick the best credit card for a purchase")]
struct Args {
    /// Free-text description of the purchase.
    #[arg(long, conflicts_with = "category")]
    query: Option<String>,

    /// Quick category shortcut (dining, grocery, gas, online, hotel, flight, streaming, rent).
    #[arg(long)]
    category: Option<String>,

    /// Only consider direct earning rates; drop issuer travel/shopping portal rewards.
    #[arg(long)]
    exclude_portals: bool,

    /// Analyze endpoint to call.
    #[arg(long, env = "CARD_OPTIMIZER_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    /// Call the model in-process (needs ANTHROPIC_API_KEY) instead of the endpoint.
    #[arg(long)]
    direct: bool,

    /// Print the card catalog and exit.
    #[arg(long)]
    list_cards: bool,

    /// Print the quick categories and exit.
    #[arg(long)]
    list_categories: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = card_optimizer_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    let catalog = if args.exclude_portals {
        CardCatalog::builtin().without_portal_rewards()
    } else {
        CardCatalog::builtin()
    };

    if args.list_categories {
        for c in QUICK_CATEGORIES {
            println!("{:<10} {:<10} \"{}\"", c.id, c.label, c.query);
        }
        return Ok(());
    }
    if args.list_cards {
        print_catalog(&catalog);
        return Ok(());
    }

    let query = resolve_query(&args)?;

    let analyzer: Arc<dyn Analyzer> = if args.direct {
        settings.require_anthropic_api_key()?;
        let llm = AnthropicClient::from_settings(&settings)?;
        Arc::new(
            RecommendationService::new(Arc::new(llm)).with_max_tokens(settings.llm_max_tokens),
        )
    } else {
        Arc::new(HttpAnalyzer::new(&args.endpoint)?)
    };

    tracing::info!(%query, direct = args.direct, exclude_portals = args.exclude_portals, "analyzing");
    let result = RetryDriver::new(analyzer).run(&query, &catalog.render()).await;
    print_result(&result);

    if result.is_error_card() {
        let err = anyhow::anyhow!("analysis failed: {}", result.cards[0].reason);
        sentry_anyhow::capture_anyhow(&err);
        return Err(err);
    }
    Ok(())
}

fn resolve_query(args: &Args) -> anyhow::Result<String> {
    if let Some(id) = args.category.as_deref() {
        let category = quick_category(id).with_context(|| {
            let ids: Vec<_> = QUICK_CATEGORIES.iter().map(|c| c.id).collect();
            format!("unknown category {id:?}; expected one of {}", ids.join(", "))
        })?;
        return Ok(category.query.to_string());
    }

    let query = args
        .query
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .context("describe the purchase with --query or pick a --category")?;
    Ok(query.to_string())
}

fn print_result(result: &AnalysisResult) {
    for (i, rec) in result.cards.iter().enumerate() {
        let badge = match (result.is_error_card(), i) {
            (true, _) => "ERROR",
            (false, 0) => "BEST CHOICE",
            _ => "RUNNER UP",
        };
        println!("[{badge}] {}", rec.card);
        println!("  {}", rec.rate);
        println!("  {}", rec.reason);
        if i + 1 < result.cards.len() {
            println!();
        }
    }
}

fn print_catalog(catalog: &CardCatalog) {
    for card in &catalog.cards {
        println!("{}", card.name);
        for r in &card.rewards {
            println!("  {:<50} {}", r.category, r.multiplier);
        }
        if let Some(rules) = &card.special_rules {
            println!("  * {rules}");
        }
        println!();
    }
}

fn init_sentry(settings: &card_optimizer_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
