//! Monthly Summarization
//!
//! Buckets weekly summaries into calendar months. ISO weeks do not nest in
//! months, so a week is anchored to the month of its first contributing day
//! (its first daily child, already clamped to the run range), falling back
//! to the week's calendar start. Every week has exactly one parent.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};

use super::Summarize;
use crate::types::{Period, PeriodSummary, TechnologySet};

pub struct MonthlySummarizer;

impl MonthlySummarizer {
    /// Group weekly summaries into calendar months.
    pub fn bucket(&self, weeks: Vec<PeriodSummary>) -> Vec<PeriodSummary> {
        let mut by_month: BTreeMap<NaiveDate, Vec<PeriodSummary>> = BTreeMap::new();
        for week in weeks {
            let anchor = week
                .children
                .first()
                .map(|day| day.period.start)
                .unwrap_or(week.period.start);
            let month_key = anchor.with_day(1).unwrap_or(anchor);
            by_month.entry(month_key).or_default().push(week);
        }

        by_month
            .into_iter()
            .map(|(start, weeks)| self.summarize(Period::month_of(start), weeks))
            .collect()
    }
}

impl Summarize for MonthlySummarizer {
    type Unit = PeriodSummary;

    fn summarize(&self, period: Period, children: Vec<PeriodSummary>) -> PeriodSummary {
        let mut technologies = TechnologySet::new();
        let mut commit_count = 0;
        for child in &children {
            technologies.merge(&child.technologies);
            commit_count += child.commit_count;
        }

        PeriodSummary {
            period,
            commit_count,
            commits: Vec::new(),
            children,
            technologies,
            narrative: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PeriodKind;

    fn week(start: NaiveDate, commits: u32) -> PeriodSummary {
        let mut summary = PeriodSummary::empty(Period::week_of(start));
        summary.commit_count = commits;
        summary
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_straddling_week_assigned_by_start() {
        // Week of 2024-04-29 runs into May; it belongs to April.
        let months = MonthlySummarizer.bucket(vec![
            week(date(2024, 4, 22), 1),
            week(date(2024, 4, 29), 2),
            week(date(2024, 5, 6), 3),
        ]);

        let labels: Vec<_> = months.iter().map(|m| m.period.label()).collect();
        assert_eq!(labels, vec!["2024-04", "2024-05"]);
        assert_eq!(months[0].commit_count, 3);
        assert_eq!(months[1].commit_count, 3);
    }

    #[test]
    fn test_week_with_clamped_children_anchors_to_first_day() {
        // Week of Mon 2024-02-26 clamped to a range starting 2024-03-01: its
        // first daily child is March 1, so the week belongs to March.
        let mut clamped = week(date(2024, 2, 26), 2);
        clamped.children = vec![PeriodSummary::empty(Period::day(date(2024, 3, 1)))];

        let months = MonthlySummarizer.bucket(vec![clamped]);
        assert_eq!(months.len(), 1);
        assert_eq!(months[0].period.label(), "2024-03");
    }

    #[test]
    fn test_month_boundaries_and_kind() {
        let months = MonthlySummarizer.bucket(vec![week(date(2024, 2, 12), 1)]);
        assert_eq!(months[0].period.kind, PeriodKind::Month);
        assert_eq!(months[0].period.start, date(2024, 2, 1));
        assert_eq!(months[0].period.end, date(2024, 2, 29));
    }

    #[test]
    fn test_every_week_has_one_parent() {
        let weeks: Vec<_> = (0..8)
            .map(|i| week(date(2024, 3, 4) + chrono::Duration::weeks(i), 1))
            .collect();
        let months = MonthlySummarizer.bucket(weeks);

        let total_weeks: usize = months.iter().map(|m| m.children.len()).sum();
        assert_eq!(total_weeks, 8);
    }
}
