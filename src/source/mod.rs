// src/source/mod.rs
pub mod county_html;

use std::future::Future;
use std::time::Duration;

use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use metrics::counter;

use crate::snapshot::Snapshot;

/// Anything that can publish the day's figures.
#[async_trait::async_trait]
pub trait SnapshotProvider: Send + Sync {
    /// Only the publication date; expected to be cheaper than a full fetch.
    async fn fetch_published_date(&self) -> Result<NaiveDate>;
    /// Full figures. `new_cases` is not sourced and is ignored.
    async fn fetch_snapshot(&self) -> Result<Snapshot>;
    fn name(&self) -> &'static str;
}

/// Bound on a single provider call unless configured otherwise.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(20);

/// Wraps a provider with the reader policy: failures become "nothing".
pub struct SourceReader {
    provider: Box<dyn SnapshotProvider>,
    timeout: Duration,
}

impl SourceReader {
    pub fn new(provider: Box<dyn SnapshotProvider>) -> Self {
        Self {
            provider,
            timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    /// Every provider call is cut off after `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn bounded<T>(&self, call: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(res) => res,
            Err(_) => Err(anyhow!(
                "{} did not answer within {}ms",
                self.provider.name(),
                self.timeout.as_millis()
            )),
        }
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// Current published figures, or `None` on any fetch/parse failure.
    pub async fn fetch_latest(&self) -> Option<Snapshot> {
        match self.bounded(self.provider.fetch_snapshot()).await {
            Ok(mut snapshot) => {
                snapshot.new_cases = None;
                Some(snapshot)
            }
            Err(e) => {
                tracing::warn!(
                    target: "source",
                    provider = self.provider.name(),
                    error = %format!("{e:#}"),
                    "source fetch failed"
                );
                counter!("source_errors_total").increment(1);
                None
            }
        }
    }

    /// Whether the source has published a date after `store_latest`.
    ///
    /// An empty store always wants data. An unreachable or unparsable
    /// source reads as "nothing new" so an outage cannot trigger duplicate
    /// notifications; every such miss is logged and counted.
    pub async fn is_newer(&self, store_latest: Option<NaiveDate>) -> bool {
        let Some(latest) = store_latest else {
            return true;
        };
        match self.bounded(self.provider.fetch_published_date()).await {
            Ok(published) => {
                tracing::debug!(target: "source", %published, %latest, "freshness check");
                published > latest
            }
            Err(e) => {
                tracing::warn!(
                    target: "source",
                    provider = self.provider.name(),
                    error = %format!("{e:#}"),
                    "freshness check failed; treating as no update"
                );
                counter!("source_errors_total").increment(1);
                false
            }
        }
    }
}

/// Decode entities, drop tags, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    let decoded = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    let stripped = re_tags.replace_all(&decoded, " ");

    static RE_WS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    re_ws.replace_all(&stripped, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_text_strips_tags_and_entities() {
        let s = "  <b>Total&nbsp;Positives</b>\n\t<sup>*</sup> ";
        assert_eq!(normalize_text(s), "Total Positives *");
    }
}
