use std::net::SocketAddr;

use anyhow::{Context, Result};
use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "updater_cycles_total",
            "Update cycles run, labelled by outcome."
        );
        describe_counter!(
            "source_errors_total",
            "Source fetch/parse failures (freshness checks included)."
        );
        describe_counter!("store_inserts_total", "Snapshots appended to the ledger.");
        describe_counter!("notify_sent_total", "Texts handed to the transport.");
        describe_counter!("notify_failed_total", "Texts that failed or timed out.");
        describe_gauge!(
            "updater_updating",
            "1 while an update cycle is in flight, 0 when idle."
        );
        describe_gauge!(
            "updater_last_cycle_ts",
            "Unix ts when the last update cycle finished."
        );
    });
}

/// Install the Prometheus recorder with its own HTTP listener on `addr`.
/// Must be called from inside a tokio runtime.
pub fn install_prometheus(addr: SocketAddr) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("prometheus: install recorder")?;
    ensure_described();
    Ok(())
}
