//! Period and Summary Types
//!
//! `PeriodSummary` is a node in the daily → weekly → monthly reduction tree.
//! Day-level nodes hold the contributing commits; coarser nodes hold their
//! child summaries. Children always partition the parent period: every daily
//! summary belongs to exactly one weekly summary, every weekly summary to
//! exactly one monthly summary.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::types::commit::{CommitRecord, TechnologySet};
use crate::types::error::{CvError, Result};

// =============================================================================
// Date Range
// =============================================================================

/// Inclusive date range, validated on construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Fails with `InvalidDateRange` if `start > end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(CvError::InvalidDateRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Iterate every calendar day in the range, in order.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.start.iter_days().take_while(|d| *d <= self.end)
    }
}

// =============================================================================
// Period
// =============================================================================

/// Granularity of a summary bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodKind {
    Day,
    Week,
    Month,
}

/// A time bucket with inclusive calendar boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Period {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub kind: PeriodKind,
}

impl Period {
    /// Single calendar day.
    pub fn day(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
            kind: PeriodKind::Day,
        }
    }

    /// ISO week (Monday through Sunday) containing `date`.
    pub fn week_of(date: NaiveDate) -> Self {
        let days_from_monday = date.weekday().num_days_from_monday() as i64;
        let start = date - chrono::Duration::days(days_from_monday);
        Self {
            start,
            end: start + chrono::Duration::days(6),
            kind: PeriodKind::Week,
        }
    }

    /// Calendar month containing `date`.
    pub fn month_of(date: NaiveDate) -> Self {
        let start = date.with_day(1).unwrap_or(date);
        Self {
            start,
            end: last_day_of_month(start),
            kind: PeriodKind::Month,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Human-readable bucket label: `2024-03-01`, `2024-W11`, or `2024-03`.
    pub fn label(&self) -> String {
        match self.kind {
            PeriodKind::Day => self.start.format("%Y-%m-%d").to_string(),
            PeriodKind::Week => {
                let iso = self.start.iso_week();
                format!("{}-W{:02}", iso.year(), iso.week())
            }
            PeriodKind::Month => self.start.format("%Y-%m").to_string(),
        }
    }
}

/// Last day of the month containing `date`.
pub fn last_day_of_month(date: NaiveDate) -> NaiveDate {
    let (next_year, next_month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .unwrap_or(date)
}

/// Monday of the ISO week containing `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    Period::week_of(date).start
}

// =============================================================================
// Period Summary
// =============================================================================

/// A node in the hierarchical reduction tree.
///
/// Empty periods inside the requested range are emitted (not elided) so that
/// gaps in activity are visible to downstream narrative generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodSummary {
    pub period: Period,
    /// Total commits in this period (sum over children for coarse levels)
    pub commit_count: u32,
    /// Contributing commits; populated at `Day` granularity only
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub commits: Vec<CommitRecord>,
    /// Child summaries; populated at `Week` and `Month` granularity
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<PeriodSummary>,
    /// Union of child technology sets with summed occurrence counts
    pub technologies: TechnologySet,
    /// Narrative text, filled in by the generation stage (never by the
    /// summarizers themselves)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narrative: Option<String>,
}

impl PeriodSummary {
    /// An explicit empty bucket for a period with no activity.
    pub fn empty(period: Period) -> Self {
        Self {
            period,
            commit_count: 0,
            commits: Vec::new(),
            children: Vec::new(),
            technologies: TechnologySet::new(),
            narrative: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.commit_count == 0
    }

    /// Commit messages of every leaf commit under this node, in order.
    pub fn commit_messages(&self) -> Vec<&str> {
        let mut messages = Vec::new();
        self.collect_messages(&mut messages);
        messages
    }

    fn collect_messages<'a>(&'a self, out: &mut Vec<&'a str>) {
        for commit in &self.commits {
            out.push(commit.message.as_str());
        }
        for child in &self.children {
            child.collect_messages(out);
        }
    }

    /// All leaf commit hashes under this node.
    pub fn commit_hashes(&self) -> Vec<&str> {
        let mut hashes: Vec<&str> = self.commits.iter().map(|c| c.hash.as_str()).collect();
        for child in &self.children {
            hashes.extend(child.commit_hashes());
        }
        hashes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_date_range_rejects_inverted() {
        let err = DateRange::new(date(2024, 4, 1), date(2024, 3, 1)).unwrap_err();
        assert!(matches!(err, CvError::InvalidDateRange { .. }));
    }

    #[test]
    fn test_date_range_days() {
        let range = DateRange::new(date(2024, 2, 27), date(2024, 3, 2)).unwrap();
        let days: Vec<_> = range.days().collect();
        assert_eq!(days.len(), 5); // leap year: Feb 27, 28, 29, Mar 1, 2
        assert_eq!(days[2], date(2024, 2, 29));
    }

    #[test]
    fn test_week_boundaries() {
        // 2024-03-15 is a Friday; ISO week runs Mon 2024-03-11 .. Sun 2024-03-17
        let week = Period::week_of(date(2024, 3, 15));
        assert_eq!(week.start, date(2024, 3, 11));
        assert_eq!(week.end, date(2024, 3, 17));
        assert_eq!(week.start.weekday(), Weekday::Mon);
        assert_eq!(week.label(), "2024-W11");
    }

    #[test]
    fn test_week_of_monday_is_identity() {
        let week = Period::week_of(date(2024, 3, 11));
        assert_eq!(week.start, date(2024, 3, 11));
    }

    #[test]
    fn test_month_boundaries() {
        let month = Period::month_of(date(2024, 2, 15));
        assert_eq!(month.start, date(2024, 2, 1));
        assert_eq!(month.end, date(2024, 2, 29));
        assert_eq!(month.label(), "2024-02");

        let december = Period::month_of(date(2023, 12, 31));
        assert_eq!(december.end, date(2023, 12, 31));
    }

    #[test]
    fn test_empty_summary() {
        let summary = PeriodSummary::empty(Period::day(date(2024, 3, 5)));
        assert!(summary.is_empty());
        assert!(summary.commit_messages().is_empty());
        assert_eq!(summary.period.label(), "2024-03-05");
    }
}
