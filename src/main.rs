use anyhow::{bail, Context};
use std::sync::Arc;
use trade_journal::{
    config::Config, db::init_db, AccountId, FeeRecalculator, InstrumentSource, KeyedLocks,
    MemoryCache, MicroHintResolver, Repository, YahooInstrumentSource,
};

const USAGE: &str = "usage: trade-journal recalc <account-id>";

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    // Load configuration
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let args: Vec<String> = std::env::args().skip(1).collect();
    if let Err(e) = run(config, &args).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(config: Config, args: &[String]) -> anyhow::Result<()> {
    let account_id = match args {
        [command, id] if command == "recalc" => AccountId::new(id.as_str()),
        _ => bail!(USAGE),
    };

    let pool = init_db(&config.database_path)
        .await
        .context("Failed to initialize database")?;
    let repo = Arc::new(Repository::new(pool));

    let hints = match &config.instrument_lookup_url {
        Some(url) => {
            let source: Arc<dyn InstrumentSource> =
                Arc::new(YahooInstrumentSource::new(url.clone(), config.lookup_timeout));
            MicroHintResolver::new(
                source,
                Arc::new(MemoryCache::<bool>::new()),
                config.lookup_timeout,
                config.micro_hint_ttl,
            )
        }
        None => MicroHintResolver::disabled(),
    };

    let recalculator = FeeRecalculator::new(
        repo,
        Arc::new(hints),
        Arc::new(KeyedLocks::new()),
        config.recalc_concurrency,
    );

    let updated = recalculator
        .recalc_account(&account_id, config.recalc_scope)
        .await
        .with_context(|| format!("Fee recalculation failed for account {}", account_id))?;

    tracing::info!(account_id = %account_id, updated, "Recalculation finished");
    Ok(())
}
