//! Tradesim Simulator
//!
//! Renders a portfolio in the user's preferred currency on an interval, the
//! way the trading dashboard does, to exercise the FX cache end to end.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tradesim_common::Currency;
use tradesim_fx::{
    CurrencyConverter, FxConfig, HttpRateProvider, RateProvider, RateStore, StaticRateProvider,
};

mod dashboard;

use dashboard::{default_portfolio, Dashboard, Holding};

/// Tradesim Simulator CLI
#[derive(Parser, Debug)]
#[command(name = "simulator")]
#[command(about = "Render a portfolio through the tradesim FX cache")]
struct Args {
    /// Rate provider endpoint (overrides RATES_ENDPOINT)
    #[arg(long)]
    endpoint: Option<String>,

    /// Serve fixed rates instead of calling an endpoint, e.g. USD=0.012,EUR=0.011
    #[arg(long, value_delimiter = ',')]
    static_rates: Vec<String>,

    /// Pivot currency all rates are quoted against (overrides RATES_PIVOT)
    #[arg(long)]
    pivot: Option<String>,

    /// The user's preferred display currency
    #[arg(short, long, default_value = "USD")]
    currency: String,

    /// Display locale
    #[arg(short, long, default_value = "en-US")]
    locale: String,

    /// Holding as AMOUNT:CURRENCY; repeatable
    #[arg(long = "holding")]
    holdings: Vec<Holding>,

    /// Rate cache TTL in seconds (overrides RATES_TTL_SECS)
    #[arg(long)]
    ttl_secs: Option<u64>,

    /// Seconds between render passes
    #[arg(long, default_value = "5")]
    interval_secs: u64,

    /// Number of render passes (0 = until Ctrl+C)
    #[arg(long, default_value = "1")]
    renders: u64,

    /// Emit JSON logs
    #[arg(long)]
    json_logs: bool,
}

fn init_logging(config: &FxConfig) {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone()),
    );

    if config.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Flags override the environment, which overrides defaults.
    let mut config = FxConfig::from_env();
    if let Some(endpoint) = args.endpoint.clone() {
        config.endpoint = Some(endpoint);
    }
    if let Some(pivot) = &args.pivot {
        config.store.pivot = Currency::new(pivot);
    }
    if let Some(ttl) = args.ttl_secs {
        config.store.ttl = Duration::from_secs(ttl);
    }
    config.json_logs |= args.json_logs;

    init_logging(&config);

    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        return Err(anyhow::anyhow!("Configuration error: {}", e));
    }

    let preferred = Currency::parse(&args.currency)?;

    let provider: Arc<dyn RateProvider> = if !args.static_rates.is_empty() {
        Arc::new(StaticRateProvider::from_pairs(
            args.static_rates.iter().map(String::as_str),
        )?)
    } else if let Some(endpoint) = &config.endpoint {
        Arc::new(HttpRateProvider::new(endpoint.clone(), config.store.fetch_timeout)?)
    } else {
        return Err(anyhow::anyhow!(
            "No rate source: pass --endpoint, set RATES_ENDPOINT, or use --static-rates"
        ));
    };

    info!(
        provider = provider.name(),
        pivot = %config.store.pivot,
        ttl_secs = config.store.ttl.as_secs(),
        preferred = %preferred,
        locale = %args.locale,
        "Starting tradesim simulator"
    );

    let store = Arc::new(RateStore::new(provider, config.store.clone()));
    let converter = Arc::new(CurrencyConverter::new(store.clone()));

    let holdings = if args.holdings.is_empty() {
        default_portfolio()
    } else {
        args.holdings.clone()
    };
    let dashboard = Dashboard::new(converter, preferred, args.locale.clone(), holdings);

    let interval = Duration::from_secs(args.interval_secs);
    let mut pass = 0u64;

    loop {
        pass += 1;

        match dashboard.render().await {
            Ok(rendered) => {
                for (holding, shown) in &rendered.lines {
                    info!(pass, holding = %holding, shown = %shown, "Holding");
                }
                match &rendered.total {
                    Some(total) => info!(pass, total = %total.text, "Portfolio total"),
                    None => warn!(
                        pass,
                        unavailable = rendered.fallback_count(),
                        "Portfolio total unavailable"
                    ),
                }
            }
            Err(e) => error!(pass, error = %e, "Render failed"),
        }

        if args.renders != 0 && pass >= args.renders {
            break;
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    let metrics = store.metrics().snapshot();
    info!(
        cache_state = ?store.state(),
        cache_hits = metrics.cache_hits,
        fetches_started = metrics.fetches_started,
        fetches_succeeded = metrics.fetches_succeeded,
        fetches_failed = metrics.fetches_failed,
        coalesced_waits = metrics.coalesced_waits,
        stale_served = metrics.stale_served,
        "Simulation complete"
    );

    Ok(())
}
