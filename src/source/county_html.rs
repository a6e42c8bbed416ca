// src/source/county_html.rs
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::snapshot::Snapshot;
use crate::source::{normalize_text, SnapshotProvider};

pub const DEFAULT_SOURCE_URL: &str = "https://www.sandiegocounty.gov/content/sdc/hhsa/programs/phs/community_epidemiology/dc/2019-nCoV/status.html";

static RE_UPDATED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)updated\s*(?:on|as of)?\s*:?\s*([a-z]+\.?\s+\d{1,2},?\s+\d{4}|\d{1,2}/\d{1,2}/\d{4})",
    )
    .unwrap()
});
static RE_ROW: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<tr\b[^>]*>(.*?)</tr>").unwrap());
static RE_CELL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<t[dh]\b[^>]*>(.*?)</t[dh]>").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    TotalCases,
    NewTests,
    Hospitalizations,
    IntensiveCare,
    Deaths,
}

/// Row labels the county has used for each figure, lowercased.
const LABELS: &[(&str, Field)] = &[
    ("total positives", Field::TotalCases),
    ("total positive cases", Field::TotalCases),
    ("total cases", Field::TotalCases),
    ("confirmed cases", Field::TotalCases),
    ("new tests", Field::NewTests),
    ("daily tests", Field::NewTests),
    ("tests reported today", Field::NewTests),
    ("hospitalizations", Field::Hospitalizations),
    ("hospitalized", Field::Hospitalizations),
    ("total hospitalizations", Field::Hospitalizations),
    ("intensive care", Field::IntensiveCare),
    ("intensive care patients", Field::IntensiveCare),
    ("icu", Field::IntensiveCare),
    ("deaths", Field::Deaths),
    ("total deaths", Field::Deaths),
];

/// Scrapes the county's COVID-19 status page.
pub struct CountyHtmlProvider {
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http { url: String, client: reqwest::Client },
}

impl CountyHtmlProvider {
    pub fn from_fixture_str(s: &str) -> Self {
        Self {
            mode: Mode::Fixture(s.to_string()),
        }
    }

    /// HTTP mode; `timeout` bounds the whole request.
    pub fn from_url(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("covid19-updater/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("building source http client")?;
        Ok(Self {
            mode: Mode::Http {
                url: url.into(),
                client,
            },
        })
    }

    async fn page(&self) -> Result<String> {
        match &self.mode {
            Mode::Fixture(s) => Ok(s.clone()),
            Mode::Http { url, client } => {
                let body = client
                    .get(url)
                    .send()
                    .await
                    .context("county http get()")?
                    .error_for_status()
                    .context("county http status")?
                    .text()
                    .await
                    .context("county http .text()")?;
                Ok(body)
            }
        }
    }
}

#[async_trait]
impl SnapshotProvider for CountyHtmlProvider {
    async fn fetch_published_date(&self) -> Result<NaiveDate> {
        parse_published_date(&self.page().await?)
    }

    async fn fetch_snapshot(&self) -> Result<Snapshot> {
        parse_snapshot(&self.page().await?)
    }

    fn name(&self) -> &'static str {
        "county-html"
    }
}

/// Date from the first "Updated <Month> <d>, <yyyy>" phrase on the page.
pub fn parse_published_date(html: &str) -> Result<NaiveDate> {
    let text = normalize_text(html);
    let caps = RE_UPDATED
        .captures(&text)
        .ok_or_else(|| anyhow!("no 'Updated <date>' phrase on page"))?;
    let raw = &caps[1];
    let mut cleaned = raw.replace([',', '.'], "");
    // chrono's %b only knows three-letter months; the county writes "Sept".
    if cleaned
        .get(..5)
        .is_some_and(|head| head.eq_ignore_ascii_case("sept "))
    {
        cleaned.replace_range(..4, "Sep");
    }
    ["%B %d %Y", "%b %d %Y", "%m/%d/%Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(&cleaned, fmt).ok())
        .ok_or_else(|| anyhow!("unrecognized published date {raw:?}"))
}

/// Full figures from the status table. Date and total cases are required;
/// other rows are optional.
pub fn parse_snapshot(html: &str) -> Result<Snapshot> {
    let date = parse_published_date(html)?;
    let mut snapshot = Snapshot::empty(date);

    for row in RE_ROW.captures_iter(html) {
        let cells: Vec<String> = RE_CELL
            .captures_iter(&row[1])
            .map(|c| normalize_text(&c[1]))
            .collect();
        if cells.len() < 2 {
            continue;
        }
        let Some(field) = label_field(&cells[0]) else {
            continue;
        };
        let Some(value) = cells[1..].iter().find_map(|c| parse_cell_count(c)) else {
            continue;
        };
        let slot = match field {
            Field::TotalCases => &mut snapshot.total_cases,
            Field::NewTests => &mut snapshot.new_tests,
            Field::Hospitalizations => &mut snapshot.hospitalizations,
            Field::IntensiveCare => &mut snapshot.intensive_care,
            Field::Deaths => &mut snapshot.deaths,
        };
        // First matching row wins; later tables repeat figures by region.
        if slot.is_none() {
            *slot = Some(value);
        }
    }

    if snapshot.total_cases.is_none() {
        return Err(anyhow!("status table has no total cases row"));
    }
    Ok(snapshot)
}

fn label_field(cell: &str) -> Option<Field> {
    let label = cell
        .trim_end_matches([':', '*', ' '])
        .to_ascii_lowercase();
    LABELS
        .iter()
        .find(|(alias, _)| *alias == label)
        .map(|(_, f)| *f)
}

/// Leading count of a cell such as `"2,943"` or `"57 (1.9%)"`.
fn parse_cell_count(cell: &str) -> Option<i64> {
    let token = cell.split_whitespace().next()?;
    let digits = token.replace(',', "");
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}
