pub mod cli;
pub mod core;
pub mod providers;
pub mod store;

use crate::core::config::AppConfig;
use crate::core::scan::ScanCaches;
use crate::providers::index_list::ConfigIndexProvider;
use crate::providers::yahoo_finance::{YahooCurrencyProvider, YahooFundamentalsProvider};
use crate::store::CacheStore;
use anyhow::Result;
use tracing::{debug, info};

pub enum AppCommand {
    Scan(cli::scan::ScanOptions),
    Universe,
}

/// Opens the cache collections a scan uses, on disk unless persistence is
/// turned off.
fn open_caches(config: &AppConfig) -> Result<ScanCaches> {
    let store = if config.cache.persist {
        CacheStore::open(&config.data_path()?)
    } else {
        CacheStore::in_memory()
    };
    debug!(persistent = store.is_persistent(), "Cache store ready");

    Ok(ScanCaches {
        rates: store.collection("rates"),
        fundamentals: store.collection("fundamentals"),
        universe: store.collection("universe"),
        ttl: Some(config.cache.ttl()),
    })
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("fatpitch starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let caches = open_caches(&config)?;
    let index_provider = ConfigIndexProvider::new(config.universe.indices.clone());

    match command {
        AppCommand::Scan(options) => {
            let base_url = config.providers.yahoo_base_url();
            let fundamentals = YahooFundamentalsProvider::new(
                base_url,
                config.providers.yahoo_cookie_url(),
                &config.currency,
            );
            let rates = YahooCurrencyProvider::new(base_url);
            cli::scan::run(
                &config,
                &options,
                &fundamentals,
                &rates,
                &index_provider,
                &caches,
            )
            .await
        }
        AppCommand::Universe => {
            cli::universe::run(&index_provider, &config.universe.symbols, &caches).await
        }
    }
}
