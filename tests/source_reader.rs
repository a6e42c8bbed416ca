// tests/source_reader.rs
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use covid19_updater::source::county_html::CountyHtmlProvider;
use covid19_updater::source::{SnapshotProvider, SourceReader};
use covid19_updater::Snapshot;

fn date(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 4, d).unwrap()
}

/// Always fails, and counts how often it was asked.
struct Offline {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl SnapshotProvider for Offline {
    async fn fetch_published_date(&self) -> Result<NaiveDate> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        bail!("connection refused")
    }
    async fn fetch_snapshot(&self) -> Result<Snapshot> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        bail!("connection refused")
    }
    fn name(&self) -> &'static str {
        "offline"
    }
}

/// Accepts the connection and then never answers.
struct Hung;

#[async_trait]
impl SnapshotProvider for Hung {
    async fn fetch_published_date(&self) -> Result<NaiveDate> {
        std::future::pending().await
    }
    async fn fetch_snapshot(&self) -> Result<Snapshot> {
        std::future::pending().await
    }
    fn name(&self) -> &'static str {
        "hung"
    }
}

fn fixture_reader() -> SourceReader {
    let html = fs::read_to_string("tests/fixtures/county_status.html")
        .expect("missing tests/fixtures/county_status.html");
    SourceReader::new(Box::new(CountyHtmlProvider::from_fixture_str(&html)))
}

#[tokio::test]
async fn fixture_page_yields_canonical_snapshot() {
    let snap = fixture_reader().fetch_latest().await.expect("fixture parses");
    assert_eq!(snap.date, date(25));
    assert_eq!(snap.total_cases, Some(3000));
    assert_eq!(snap.new_tests, Some(2153));
    assert_eq!(snap.hospitalizations, Some(680));
    assert_eq!(snap.intensive_care, Some(214));
    assert_eq!(snap.deaths, Some(111));
    assert_eq!(snap.new_cases, None, "new_cases is derived, never sourced");
}

#[tokio::test]
async fn freshness_uses_calendar_dates() {
    let reader = fixture_reader();
    assert!(reader.is_newer(Some(date(24))).await);
    assert!(!reader.is_newer(Some(date(25))).await);
    assert!(!reader.is_newer(Some(date(26))).await);
    let last_year = NaiveDate::from_ymd_opt(2019, 12, 31).unwrap();
    assert!(reader.is_newer(Some(last_year)).await);
}

#[tokio::test]
async fn empty_store_is_always_newer_even_when_offline() {
    let calls = Arc::new(AtomicUsize::new(0));
    let reader = SourceReader::new(Box::new(Offline {
        calls: calls.clone(),
    }));
    assert!(reader.is_newer(None).await);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn offline_source_fails_closed() {
    let calls = Arc::new(AtomicUsize::new(0));
    let reader = SourceReader::new(Box::new(Offline {
        calls: calls.clone(),
    }));
    assert!(!reader.is_newer(Some(date(24))).await);
    assert!(reader.fetch_latest().await.is_none());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn restructured_page_reads_as_unavailable() {
    let reader = SourceReader::new(Box::new(CountyHtmlProvider::from_fixture_str(
        "<html><body><p>We moved! See the new dashboard.</p></body></html>",
    )));
    assert!(reader.fetch_latest().await.is_none());
    assert!(!reader.is_newer(Some(date(1))).await);
}

#[tokio::test(start_paused = true)]
async fn hung_source_is_cut_off_at_the_fetch_timeout() {
    let reader = SourceReader::new(Box::new(Hung)).with_timeout(Duration::from_secs(20));

    let started = tokio::time::Instant::now();
    assert!(!reader.is_newer(Some(date(24))).await);
    assert!(reader.fetch_latest().await.is_none());
    let waited = started.elapsed();
    assert!(waited >= Duration::from_secs(40) && waited < Duration::from_secs(41), "{waited:?}");
}
