//! Plain-text bodies for the two SMS batches.

use crate::analysis::AnalysisSummary;
use crate::snapshot::Snapshot;

/// Short link to the county status page.
pub const DEFAULT_LINK: &str = "https://bit.ly/2W8uQJM";

fn count(v: Option<i64>) -> String {
    v.map(|n| n.to_string()).unwrap_or_else(|| "unknown".to_string())
}

pub fn update_message(snapshot: &Snapshot, link: &str) -> String {
    let mut out = String::from("LATEST SD COVID19 UPDATE:\n");
    out.push_str(&format!("New Cases: {}\n", count(snapshot.new_cases)));
    out.push_str(&format!("Total Cases: {}\n", count(snapshot.total_cases)));
    out.push_str(link);
    out
}

/// Up to three facts, most important first. Zero-valued stats are omitted.
pub fn analysis_message(summary: &AnalysisSummary) -> String {
    let mut facts = vec!["Analysis:".to_string()];
    if summary.latest_is_high {
        facts.push("- Today is the highest number of new cases so far".to_string());
    }
    if summary.trend != 0.0 {
        facts.push(format!(
            "- The {}-day trend of new cases is {:.2}",
            summary.trend_days, summary.trend
        ));
    }
    if summary.average != 0.0 {
        facts.push(format!(
            "- The {}-day average of new cases is {:.2}",
            summary.average_days, summary.average
        ));
    }
    facts.join("\n")
}
