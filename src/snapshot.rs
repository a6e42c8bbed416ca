//! # Snapshot
//! One calendar day's published figures plus the derived day-over-day
//! `new_cases` count.
//!
//! Two shapes live here: the strongly typed [`Snapshot`] that the store and
//! the analyzer work with, and the loose [`SnapshotRecord`] used by JSON
//! datasets (where counts may arrive as strings, `""` or `null`).

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Date formats accepted from datasets and source pages.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m%d%Y", "%m/%d/%Y"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub date: NaiveDate,
    pub total_cases: Option<i64>,
    /// Derived at ingestion, never sourced.
    pub new_cases: Option<i64>,
    pub new_tests: Option<i64>,
    pub hospitalizations: Option<i64>,
    pub intensive_care: Option<i64>,
    pub deaths: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("field `{field}` is not a count: {value:?}")]
    NotNumeric { field: &'static str, value: String },
    #[error("field `{field}` is negative: {value}")]
    Negative { field: &'static str, value: i64 },
    #[error("field `{0}` is required here but absent")]
    MissingValue(&'static str),
    #[error("unrecognized date: {0:?}")]
    BadDate(String),
    #[error("field `{0}` is out of range")]
    OutOfRange(&'static str),
}

impl Snapshot {
    /// A snapshot with only the date set; handy for sources and tests.
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            total_cases: None,
            new_cases: None,
            new_tests: None,
            hospitalizations: None,
            intensive_care: None,
            deaths: None,
        }
    }

    /// Metric columns in storage order, paired with their names.
    pub fn metrics(&self) -> [(&'static str, Option<i64>); 6] {
        [
            ("total_cases", self.total_cases),
            ("new_cases", self.new_cases),
            ("new_tests", self.new_tests),
            ("hospitalizations", self.hospitalizations),
            ("intensive_care", self.intensive_care),
            ("deaths", self.deaths),
        ]
    }

    /// Every present count must be non-negative.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (field, value) in self.metrics() {
            if let Some(v) = value {
                if v < 0 {
                    return Err(ValidationError::Negative { field, value: v });
                }
            }
        }
        Ok(())
    }
}

/// A count as it appears in hand-maintained datasets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawCount {
    Int(i64),
    Text(String),
}

/// Dataset row. All seven keys must be present; values may be null.
#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotRecord {
    pub date: String,
    #[serde(deserialize_with = "present")]
    pub total_cases: Option<RawCount>,
    #[serde(deserialize_with = "present")]
    pub new_cases: Option<RawCount>,
    #[serde(deserialize_with = "present")]
    pub new_tests: Option<RawCount>,
    #[serde(deserialize_with = "present")]
    pub hospitalizations: Option<RawCount>,
    #[serde(deserialize_with = "present")]
    pub intensive_care: Option<RawCount>,
    #[serde(deserialize_with = "present")]
    pub deaths: Option<RawCount>,
}

// With an explicit `deserialize_with`, serde reports a missing key as an
// error instead of silently defaulting the Option to None.
fn present<'de, D>(d: D) -> Result<Option<RawCount>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<RawCount>::deserialize(d)
}

impl TryFrom<SnapshotRecord> for Snapshot {
    type Error = ValidationError;

    fn try_from(r: SnapshotRecord) -> Result<Self, Self::Error> {
        let snapshot = Snapshot {
            date: parse_date(&r.date)?,
            total_cases: parse_count("total_cases", r.total_cases.as_ref())?,
            new_cases: parse_count("new_cases", r.new_cases.as_ref())?,
            new_tests: parse_count("new_tests", r.new_tests.as_ref())?,
            hospitalizations: parse_count("hospitalizations", r.hospitalizations.as_ref())?,
            intensive_care: parse_count("intensive_care", r.intensive_care.as_ref())?,
            deaths: parse_count("deaths", r.deaths.as_ref())?,
        };
        snapshot.validate()?;
        Ok(snapshot)
    }
}

/// Parse `YYYY-MM-DD`, `MMDDYYYY` or `MM/DD/YYYY`.
pub fn parse_date(s: &str) -> Result<NaiveDate, ValidationError> {
    let t = s.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(t, fmt).ok())
        .ok_or_else(|| ValidationError::BadDate(t.to_string()))
}

/// `""` means unknown; thousands separators are tolerated.
pub fn parse_count(
    field: &'static str,
    raw: Option<&RawCount>,
) -> Result<Option<i64>, ValidationError> {
    match raw {
        None => Ok(None),
        Some(RawCount::Int(v)) => Ok(Some(*v)),
        Some(RawCount::Text(t)) => {
            let cleaned = t.trim().replace(',', "");
            if cleaned.is_empty() {
                return Ok(None);
            }
            cleaned
                .parse::<i64>()
                .map(Some)
                .map_err(|_| ValidationError::NotNumeric {
                    field,
                    value: t.clone(),
                })
        }
    }
}

#[derive(Debug, Deserialize)]
struct Dataset {
    data: Vec<SnapshotRecord>,
}

/// Load a `{ "data": [ ... ] }` dataset file used to seed a fresh ledger.
pub fn load_dataset(path: &Path) -> Result<Vec<Snapshot>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading dataset from {}", path.display()))?;
    parse_dataset(&content)
}

pub fn parse_dataset(s: &str) -> Result<Vec<Snapshot>> {
    let dataset: Dataset = serde_json::from_str(s).context("parsing dataset JSON")?;
    dataset
        .data
        .into_iter()
        .enumerate()
        .map(|(i, rec)| Snapshot::try_from(rec).with_context(|| format!("dataset entry #{i}")))
        .collect()
}
