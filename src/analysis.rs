//! # Trend Analyzer
//! Read-only statistics over the most recent rows of the ledger.
//!
//! Rows whose `new_cases` is absent are dropped from a window, never
//! counted as zero, and the window is not widened to make up for them.
//! An empty window yields 0 rather than an error.

use serde::Serialize;

use crate::store::{SnapshotStore, StoreResult};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisSummary {
    pub latest_is_high: bool,
    pub trend_days: i64,
    pub trend: f64,
    pub average_days: i64,
    pub average: f64,
}

pub struct TrendAnalyzer<'a> {
    store: &'a SnapshotStore,
}

impl<'a> TrendAnalyzer<'a> {
    pub fn new(store: &'a SnapshotStore) -> Self {
        Self { store }
    }

    /// True when the newest row is also the all-time `new_cases` high.
    /// Compared by date, so a tie at the maximum counts.
    pub fn is_latest_record_high(&self) -> StoreResult<bool> {
        let latest = self.store.latest()?;
        let max = self.store.max_new_cases()?;
        Ok(match (latest, max) {
            (Some(l), Some(m)) => l.date == m.date,
            _ => false,
        })
    }

    /// Mean day-over-day change over the last `days` rows. Positive means
    /// the more recent day of each pair was higher.
    pub fn trend(&self, days: i64) -> StoreResult<f64> {
        if days < 2 {
            return Ok(0.0);
        }
        Ok(trend_of(&self.window(days)?))
    }

    /// Mean `new_cases` over the last `days` rows.
    pub fn moving_average(&self, days: i64) -> StoreResult<f64> {
        if days < 1 {
            return Ok(0.0);
        }
        Ok(mean_of(&self.window(days)?))
    }

    pub fn summary(&self, trend_days: i64, average_days: i64) -> StoreResult<AnalysisSummary> {
        Ok(AnalysisSummary {
            latest_is_high: self.is_latest_record_high()?,
            trend_days,
            trend: self.trend(trend_days)?,
            average_days,
            average: self.moving_average(average_days)?,
        })
    }

    /// Present `new_cases` of the last `days` rows, newest first.
    fn window(&self, days: i64) -> StoreResult<Vec<i64>> {
        let n = usize::try_from(days).unwrap_or(0);
        Ok(self
            .store
            .recent(n)?
            .into_iter()
            .filter_map(|s| s.new_cases)
            .collect())
    }
}

/// Mean of adjacent differences `v[i] - v[i+1]`; 0 with fewer than two values.
pub fn trend_of(newest_first: &[i64]) -> f64 {
    if newest_first.len() < 2 {
        return 0.0;
    }
    let diffs: Vec<i64> = newest_first.windows(2).map(|w| w[0] - w[1]).collect();
    mean_of(&diffs)
}

/// Arithmetic mean; 0 for an empty slice.
pub fn mean_of(values: &[i64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let sum: i64 = values.iter().sum();
    sum as f64 / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::Snapshot;
    use chrono::NaiveDate;

    /// Store whose rows carry `new_cases` given newest first, one per day.
    fn store_with(newest_first: &[Option<i64>]) -> SnapshotStore {
        let mut store = SnapshotStore::open_in_memory().unwrap();
        let newest = NaiveDate::from_ymd_opt(2020, 4, 25).unwrap();
        for (i, nc) in newest_first.iter().enumerate() {
            let date = newest - chrono::Duration::days(i as i64);
            let s = Snapshot {
                new_cases: *nc,
                ..Snapshot::empty(date)
            };
            store.insert(&s).unwrap();
        }
        store
    }

    #[test]
    fn trend_degenerate_windows_are_zero() {
        let store = store_with(&[Some(4), Some(3), Some(1)]);
        let a = TrendAnalyzer::new(&store);
        assert_eq!(a.trend(-1).unwrap(), 0.0);
        assert_eq!(a.trend(0).unwrap(), 0.0);
        assert_eq!(a.trend(1).unwrap(), 0.0);
    }

    #[test]
    fn trend_is_mean_of_adjacent_differences() {
        let store = store_with(&[Some(4), Some(3), Some(1)]);
        assert_eq!(TrendAnalyzer::new(&store).trend(3).unwrap(), 1.5);
    }

    #[test]
    fn trend_drops_absent_values_without_widening() {
        let store = store_with(&[None, Some(3), Some(1), Some(100)]);
        assert_eq!(TrendAnalyzer::new(&store).trend(3).unwrap(), 2.0);

        let sparse = store_with(&[None, Some(3), None]);
        assert_eq!(TrendAnalyzer::new(&sparse).trend(3).unwrap(), 0.0);
    }

    #[test]
    fn average_degenerate_windows_are_zero() {
        let store = store_with(&[Some(45), Some(30), Some(15)]);
        let a = TrendAnalyzer::new(&store);
        assert_eq!(a.moving_average(0).unwrap(), 0.0);
        assert_eq!(a.moving_average(-1).unwrap(), 0.0);
    }

    #[test]
    fn average_over_window() {
        let store = store_with(&[Some(45), Some(30), Some(15), Some(1000)]);
        assert_eq!(TrendAnalyzer::new(&store).moving_average(3).unwrap(), 30.0);
    }

    #[test]
    fn all_absent_window_averages_to_zero() {
        let store = store_with(&[None, None]);
        assert_eq!(TrendAnalyzer::new(&store).moving_average(7).unwrap(), 0.0);

        let empty = SnapshotStore::open_in_memory().unwrap();
        assert_eq!(TrendAnalyzer::new(&empty).moving_average(7).unwrap(), 0.0);
    }

    #[test]
    fn latest_high_counts_ties_and_needs_data() {
        let tie = store_with(&[Some(50), Some(50), Some(10)]);
        assert!(TrendAnalyzer::new(&tie).is_latest_record_high().unwrap());

        let below = store_with(&[Some(49), Some(50), Some(10)]);
        assert!(!TrendAnalyzer::new(&below).is_latest_record_high().unwrap());

        let high = store_with(&[Some(57), None, Some(10)]);
        assert!(TrendAnalyzer::new(&high).is_latest_record_high().unwrap());

        let empty = SnapshotStore::open_in_memory().unwrap();
        assert!(!TrendAnalyzer::new(&empty).is_latest_record_high().unwrap());
    }

    #[test]
    fn summary_bundles_all_three() {
        let store = store_with(&[Some(4), Some(3), Some(1)]);
        let s = TrendAnalyzer::new(&store).summary(3, 7).unwrap();
        assert!(s.latest_is_high);
        assert_eq!(s.trend, 1.5);
        assert!((s.average - 8.0 / 3.0).abs() < 1e-9);
    }
}
