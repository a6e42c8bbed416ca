// src/lib.rs
// Public library surface for the daemon, the init-db tool, and integration tests.

pub mod analysis;
pub mod config;
pub mod metrics;
pub mod notify;
pub mod report;
pub mod scheduler;
pub mod snapshot;
pub mod source;
pub mod store;
pub mod updater;

// ---- Re-exports for stable public API ----
pub use crate::analysis::{AnalysisSummary, TrendAnalyzer};
pub use crate::config::{AppConfig, RuntimeSettings};
pub use crate::notify::{LogNotifier, TextNotifier};
pub use crate::snapshot::Snapshot;
pub use crate::source::{SnapshotProvider, SourceReader};
pub use crate::store::{SnapshotStore, StoreError};
pub use crate::updater::{CycleOutcome, Updater, UpdaterSettings};
