//! Daily Summarization
//!
//! The only stage that sees raw commits. Buckets them by calendar day in the
//! run's timezone and annotates each day with detected technologies.

use std::collections::BTreeMap;

use chrono::{FixedOffset, NaiveDate};

use super::Summarize;
use crate::detector::TechnologyDetector;
use crate::types::{CommitRecord, DateRange, Period, PeriodSummary, TechnologySet};

pub struct DailySummarizer<'a> {
    detector: &'a TechnologyDetector,
    timezone: FixedOffset,
}

impl<'a> DailySummarizer<'a> {
    pub fn new(detector: &'a TechnologyDetector, timezone: FixedOffset) -> Self {
        Self { detector, timezone }
    }

    /// Produce one summary per calendar day in the range, empty days
    /// included. Commits outside the range are ignored.
    pub fn bucket(&self, commits: Vec<CommitRecord>, range: DateRange) -> Vec<PeriodSummary> {
        let mut by_day: BTreeMap<NaiveDate, Vec<CommitRecord>> = BTreeMap::new();
        for commit in commits {
            let day = commit.timestamp.with_timezone(&self.timezone).date_naive();
            if range.contains(day) {
                by_day.entry(day).or_default().push(commit);
            }
        }

        range
            .days()
            .map(|day| {
                let commits = by_day.remove(&day).unwrap_or_default();
                self.summarize(Period::day(day), commits)
            })
            .collect()
    }
}

impl Summarize for DailySummarizer<'_> {
    type Unit = CommitRecord;

    fn summarize(&self, period: Period, children: Vec<CommitRecord>) -> PeriodSummary {
        let mut technologies = TechnologySet::new();
        for commit in &children {
            technologies.merge(&self.detector.detect(&commit.files));
        }

        PeriodSummary {
            period,
            commit_count: children.len() as u32,
            commits: children,
            children: Vec::new(),
            technologies,
            narrative: None,
        }
    }
}
