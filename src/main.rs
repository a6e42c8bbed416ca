//! COVID-19 Updater daemon entrypoint.
//! Loads config once, opens the ledger, and runs the update scheduler until
//! ctrl-c.

use std::process;
use std::sync::Arc;

use anyhow::{Context, Result};
use covid19_updater::config::{AppConfig, RuntimeSettings};
use covid19_updater::notify::{EmailTexter, LogNotifier, TextNotifier};
use covid19_updater::scheduler::{self, SchedulerCfg};
use covid19_updater::source::county_html::CountyHtmlProvider;
use covid19_updater::source::SourceReader;
use covid19_updater::store::SnapshotStore;
use covid19_updater::updater::{Updater, UpdaterSettings};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const EXIT_MISSING_FILE: i32 = 1;
const EXIT_BAD_CONFIG: i32 = 2;

/// Compact logs by default; `LOG_FORMAT=json` for structured output.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("covid19_updater=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .ok()
        .is_some_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

fn build_updater(settings: &RuntimeSettings) -> Result<Updater> {
    let config = AppConfig::load_from_file(&settings.config_path)?;
    let recipients = config.recipients()?;

    let store = SnapshotStore::open_existing(&settings.db_path)
        .with_context(|| format!("opening ledger {}", settings.db_path.display()))?;

    let provider = CountyHtmlProvider::from_url(&config.source.url, config.source.timeout())?;

    let notifier: Arc<dyn TextNotifier> = if settings.dry_run {
        Arc::new(LogNotifier)
    } else {
        Arc::new(EmailTexter::new(
            &config.email_credentials,
            config.notify.timeout(),
        )?)
    };

    Ok(Updater::new(
        store,
        SourceReader::new(Box::new(provider)).with_timeout(config.source.timeout()),
        notifier,
        recipients,
        UpdaterSettings::from(&config),
    ))
}

#[tokio::main]
async fn main() {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let settings = RuntimeSettings::from_env();
    tracing::info!(
        config = %settings.config_path.display(),
        db = %settings.db_path.display(),
        interval_secs = settings.interval.as_secs(),
        dry_run = settings.dry_run,
        "COVID-19 Updater"
    );

    if !settings.config_path.exists() {
        tracing::error!("config file not found");
        process::exit(EXIT_MISSING_FILE);
    }
    if !settings.db_path.exists() {
        tracing::error!("SQLite ledger not found; create it with `init-db`");
        process::exit(EXIT_MISSING_FILE);
    }

    let updater = match build_updater(&settings) {
        Ok(u) => u,
        Err(e) => {
            tracing::error!("{e:#}");
            process::exit(EXIT_BAD_CONFIG);
        }
    };

    if let Ok(addr) = std::env::var("METRICS_ADDR") {
        match addr.parse() {
            Ok(addr) => {
                if let Err(e) = covid19_updater::metrics::install_prometheus(addr) {
                    tracing::warn!("metrics disabled: {e:#}");
                }
            }
            Err(e) => tracing::warn!(%addr, "metrics disabled, bad METRICS_ADDR: {e}"),
        }
    }

    let cfg = SchedulerCfg {
        interval: settings.interval,
        force_first: settings.force_first,
    };
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("ctrl-c handler failed: {e}");
            std::future::pending::<()>().await;
        }
    };
    let updater = scheduler::run(updater, cfg, shutdown).await;

    match updater.store().count() {
        Ok(rows) => tracing::info!(rows, "stopped"),
        Err(e) => tracing::warn!("stopped; ledger unreadable: {e}"),
    }
}
