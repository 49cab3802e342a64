//! Weekly Summarization
//!
//! Buckets daily summaries into ISO weeks (Monday through Sunday). Operates
//! only on daily summaries, never on raw commits.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use super::Summarize;
use crate::types::{Period, PeriodSummary, TechnologySet, week_start};

pub struct WeeklySummarizer;

impl WeeklySummarizer {
    /// Group daily summaries into their ISO weeks. Because the daily stage
    /// emits every day in the range, every week touching the range appears
    /// here, empty weeks included.
    pub fn bucket(&self, dailies: Vec<PeriodSummary>) -> Vec<PeriodSummary> {
        let mut by_week: BTreeMap<NaiveDate, Vec<PeriodSummary>> = BTreeMap::new();
        for daily in dailies {
            by_week
                .entry(week_start(daily.period.start))
                .or_default()
                .push(daily);
        }

        by_week
            .into_iter()
            .map(|(start, days)| self.summarize(Period::week_of(start), days))
            .collect()
    }
}

impl Summarize for WeeklySummarizer {
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
    use crate::types::DateRange;

    fn daily(y: i32, m: u32, d: u32, commits: u32) -> PeriodSummary {
        let date = NaiveDate::from_ymd_opt(y, m, d).unwrap();
        let mut summary = PeriodSummary::empty(Period::day(date));
        summary.commit_count = commits;
        summary
    }

    fn dailies_for_range(y: i32, m: u32, d1: u32, d2: u32) -> Vec<PeriodSummary> {
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(y, m, d1).unwrap(),
            NaiveDate::from_ymd_opt(y, m, d2).unwrap(),
        )
        .unwrap();
        range
            .days()
            .map(|d| PeriodSummary::empty(Period::day(d)))
            .collect()
    }

    #[test]
    fn test_weeks_partition_days() {
        // 2024-03-01 .. 2024-03-14 covers ISO weeks 9, 10, 11
        let dailies = dailies_for_range(2024, 3, 1, 14);
        let weeks = WeeklySummarizer.bucket(dailies);

        let labels: Vec<_> = weeks.iter().map(|w| w.period.label()).collect();
        assert_eq!(labels, vec!["2024-W09", "2024-W10", "2024-W11"]);

        let total_days: usize = weeks.iter().map(|w| w.children.len()).sum();
        assert_eq!(total_days, 14);

        // Each daily belongs to the week whose boundaries contain it.
        for week in &weeks {
            for day in &week.children {
                assert!(week.period.contains(day.period.start));
            }
        }
    }

    #[test]
    fn test_commit_counts_summed() {
        let weeks = WeeklySummarizer.bucket(vec![
            daily(2024, 3, 4, 2),
            daily(2024, 3, 5, 3),
            daily(2024, 3, 11, 1),
        ]);
        assert_eq!(weeks.len(), 2);
        assert_eq!(weeks[0].commit_count, 5);
        assert_eq!(weeks[1].commit_count, 1);
    }

    #[test]
    fn test_technology_union() {
        let mut monday = daily(2024, 3, 4, 1);
        monday.technologies.record("Rust", 2);
        let mut tuesday = daily(2024, 3, 5, 1);
        tuesday.technologies.record("Rust", 1);
        tuesday.technologies.record("Docker", 1);

        let weeks = WeeklySummarizer.bucket(vec![monday, tuesday]);
        let counts: BTreeMap<_, _> = weeks[0]
            .technologies
            .iter()
            .map(|(n, c)| (n.to_string(), c))
            .collect();
        assert_eq!(counts["Rust"], 3);
        assert_eq!(counts["Docker"], 1);
    }
}
