//! # Ingestion Orchestrator
//! One update cycle: freshness check → fetch → derive `new_cases` →
//! persist → analyze → text the update and the analysis.
//!
//! Every failure inside a cycle is logged and reported as a
//! [`CycleOutcome`]; none of them propagate to the caller.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use metrics::{counter, gauge};
use serde::Serialize;
use tracing::Instrument;

use crate::analysis::TrendAnalyzer;
use crate::config::AppConfig;
use crate::notify::{deliver, DispatchReport, TextNotifier};
use crate::report::{analysis_message, update_message, DEFAULT_LINK};
use crate::snapshot::{Snapshot, ValidationError};
use crate::source::SourceReader;
use crate::store::{SnapshotStore, StoreError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdaterSettings {
    pub trend_days: i64,
    pub average_days: i64,
    pub link: String,
    pub batch_gap: Duration,
    pub send_timeout: Duration,
}

impl Default for UpdaterSettings {
    fn default() -> Self {
        Self {
            trend_days: 3,
            average_days: 7,
            link: DEFAULT_LINK.to_string(),
            batch_gap: Duration::from_secs(5),
            send_timeout: Duration::from_secs(30),
        }
    }
}

impl From<&AppConfig> for UpdaterSettings {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            trend_days: cfg.analysis.trend_days,
            average_days: cfg.analysis.average_days,
            link: cfg.notify.link.clone(),
            batch_gap: cfg.notify.batch_gap(),
            send_timeout: cfg.notify.timeout(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CycleOutcome {
    /// Source has nothing newer than the ledger.
    NoNewData,
    /// Source could not be fetched or parsed.
    SourceUnavailable,
    /// Candidate failed validation; nothing stored.
    Rejected { reason: String },
    /// Ledger already has this date.
    Duplicate { date: NaiveDate },
    /// Storage layer failed; nothing stored.
    PersistFailed { reason: String },
    /// Stored and handed to the notifier.
    Notified {
        snapshot: Snapshot,
        report: DispatchReport,
    },
}

impl CycleOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            CycleOutcome::NoNewData => "no_new_data",
            CycleOutcome::SourceUnavailable => "source_unavailable",
            CycleOutcome::Rejected { .. } => "rejected",
            CycleOutcome::Duplicate { .. } => "duplicate",
            CycleOutcome::PersistFailed { .. } => "persist_failed",
            CycleOutcome::Notified { .. } => "notified",
        }
    }
}

/// `total_cases` delta against the previous latest row, or the total
/// itself for an empty ledger.
pub fn derive_new_cases(
    current: &Snapshot,
    previous: Option<&Snapshot>,
) -> Result<i64, ValidationError> {
    let today = current
        .total_cases
        .ok_or(ValidationError::MissingValue("total_cases"))?;
    match previous {
        None => Ok(today),
        Some(prev) => {
            let before = prev
                .total_cases
                .ok_or(ValidationError::MissingValue("previous total_cases"))?;
            today
                .checked_sub(before)
                .ok_or(ValidationError::OutOfRange("new_cases"))
        }
    }
}

pub struct Updater {
    store: SnapshotStore,
    reader: SourceReader,
    notifier: Arc<dyn TextNotifier>,
    recipients: Vec<String>,
    settings: UpdaterSettings,
}

impl Updater {
    pub fn new(
        store: SnapshotStore,
        reader: SourceReader,
        notifier: Arc<dyn TextNotifier>,
        recipients: Vec<String>,
        settings: UpdaterSettings,
    ) -> Self {
        Self {
            store,
            reader,
            notifier,
            recipients,
            settings,
        }
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    /// Run one full cycle. `force` skips the freshness check.
    ///
    /// While a cycle is in flight `updater_updating` reads 1 and log lines
    /// carry the `update_cycle` span.
    pub async fn run_cycle(&mut self, force: bool) -> CycleOutcome {
        crate::metrics::ensure_described();

        gauge!("updater_updating").set(1.0);
        let span = tracing::info_span!(target: "updater", "update_cycle", force);
        let outcome = self.update(force).instrument(span).await;
        gauge!("updater_updating").set(0.0);

        counter!("updater_cycles_total", "outcome" => outcome.label()).increment(1);
        gauge!("updater_last_cycle_ts").set(Utc::now().timestamp() as f64);
        outcome
    }

    async fn update(&mut self, force: bool) -> CycleOutcome {
        let previous = match self.store.latest() {
            Ok(p) => p,
            Err(e) => {
                tracing::error!(target: "updater", error = %e, "reading latest snapshot failed");
                return CycleOutcome::PersistFailed {
                    reason: e.to_string(),
                };
            }
        };

        if !force && !self.reader.is_newer(previous.as_ref().map(|s| s.date)).await {
            tracing::trace!(target: "updater", "no new data");
            return CycleOutcome::NoNewData;
        }

        let Some(mut snapshot) = self.reader.fetch_latest().await else {
            tracing::warn!(
                target: "updater",
                provider = self.reader.provider_name(),
                "no snapshot from source; skipping cycle"
            );
            return CycleOutcome::SourceUnavailable;
        };

        match derive_new_cases(&snapshot, previous.as_ref()) {
            Ok(n) => snapshot.new_cases = Some(n),
            Err(e) => {
                tracing::warn!(target: "updater", date = %snapshot.date, error = %e, "cannot derive new cases");
                return CycleOutcome::Rejected {
                    reason: e.to_string(),
                };
            }
        }

        if let Err(e) = self.store.insert(&snapshot) {
            tracing::warn!(target: "updater", date = %snapshot.date, error = %e, "failed to persist snapshot");
            return match e {
                StoreError::AlreadyExists(date) => CycleOutcome::Duplicate { date },
                StoreError::Invalid(v) => CycleOutcome::Rejected {
                    reason: v.to_string(),
                },
                StoreError::Persistence(p) => CycleOutcome::PersistFailed {
                    reason: p.to_string(),
                },
            };
        }

        let messages = self.messages(&snapshot);
        let report = deliver(
            self.notifier.as_ref(),
            &self.recipients,
            &messages,
            self.settings.batch_gap,
            self.settings.send_timeout,
        )
        .await;

        tracing::info!(
            target: "updater",
            date = %snapshot.date,
            new_cases = ?snapshot.new_cases,
            sent = report.sent,
            failed = report.failed,
            "update published"
        );
        CycleOutcome::Notified { snapshot, report }
    }

    /// Update message first, then the analysis (skipped if analysis fails).
    fn messages(&self, snapshot: &Snapshot) -> Vec<String> {
        let mut out = vec![update_message(snapshot, &self.settings.link)];
        let analyzer = TrendAnalyzer::new(&self.store);
        match analyzer.summary(self.settings.trend_days, self.settings.average_days) {
            Ok(summary) => out.push(analysis_message(&summary)),
            Err(e) => {
                tracing::warn!(target: "updater", error = %e, "analysis failed; sending update only")
            }
        }
        out
    }
}
