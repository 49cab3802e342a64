//! Summarizer Chain
//!
//! Three stages forming a strict hierarchical reduction: Daily consumes
//! commit records, Weekly consumes daily summaries, Monthly consumes weekly
//! summaries. A coarser stage never re-reads raw commits.
//!
//! Stages are pure: they bucket, aggregate technology tags, and count
//! commits. Narrative generation is deferred to the prompt/provider layer so
//! summarization stays cache-key-stable and side-effect-free.
//!
//! Empty periods inside the requested range are emitted as explicit empty
//! summaries at every level (not elided), so gaps in activity remain visible
//! downstream.

mod daily;
mod monthly;
mod weekly;

pub use daily::DailySummarizer;
pub use monthly::MonthlySummarizer;
pub use weekly::WeeklySummarizer;

use chrono::FixedOffset;

use crate::detector::TechnologyDetector;
use crate::types::{CommitRecord, DateRange, Period, PeriodSummary};

/// Common contract shared by all three stages.
///
/// `children` are the finer-grained units belonging to the bucket: commits
/// for the daily stage, summaries one level down for the coarser stages.
pub trait Summarize {
    type Unit;

    fn summarize(&self, period: Period, children: Vec<Self::Unit>) -> PeriodSummary;
}

/// Runs the full daily → weekly → monthly reduction.
pub struct SummarizerChain<'a> {
    daily: DailySummarizer<'a>,
    weekly: WeeklySummarizer,
    monthly: MonthlySummarizer,
}

impl<'a> SummarizerChain<'a> {
    pub fn new(detector: &'a TechnologyDetector, timezone: FixedOffset) -> Self {
        Self {
            daily: DailySummarizer::new(detector, timezone),
            weekly: WeeklySummarizer,
            monthly: MonthlySummarizer,
        }
    }

    /// Reduce commits to monthly summaries (weekly children, daily
    /// grandchildren) covering the requested range.
    pub fn run(&self, commits: Vec<CommitRecord>, range: DateRange) -> Vec<PeriodSummary> {
        let daily = self.daily.bucket(commits, range);
        let weekly = self.weekly.bucket(daily);
        self.monthly.bucket(weekly)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};

    use crate::types::TechnologySet;

    fn commit(hash: &str, y: i32, m: u32, d: u32, files: &[&str]) -> CommitRecord {
        CommitRecord {
            hash: hash.to_string(),
            author_name: "Alice".into(),
            author_email: "alice@example.com".into(),
            timestamp: Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap(),
            message: format!("Work on {}", hash),
            files: files.iter().map(|f| f.to_string()).collect(),
            branch: "main".into(),
        }
    }

    fn march_range() -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
        )
        .unwrap()
    }

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    // The end-to-end scenario: commits on 2024-03-01, 2024-03-02, 2024-03-15,
    // range covering March 2024.
    #[test]
    fn test_march_scenario() {
        let detector = TechnologyDetector::new();
        let chain = SummarizerChain::new(&detector, utc());

        let commits = vec![
            commit("c1", 2024, 3, 1, &["src/main.rs"]),
            commit("c2", 2024, 3, 2, &["app.py"]),
            commit("c3", 2024, 3, 15, &["Dockerfile"]),
        ];

        let monthly = chain.run(commits, march_range());

        // Exactly one monthly bucket for March 2024.
        assert_eq!(monthly.len(), 1);
        let march = &monthly[0];
        assert_eq!(march.period.label(), "2024-03");
        assert_eq!(march.commit_count, 3);

        // Its technology set is the union of all three commits' detections.
        let techs: Vec<_> = march.technologies.iter().map(|(n, _)| n).collect();
        assert_eq!(techs, vec!["Docker", "Python", "Rust"]);

        // Weekly children cover every ISO week touching March; the weeks of
        // the three commits are non-empty.
        let non_empty_weeks: Vec<_> = march
            .children
            .iter()
            .filter(|w| !w.is_empty())
            .map(|w| w.period.label())
            .collect();
        assert_eq!(non_empty_weeks, vec!["2024-W09", "2024-W11"]);

        // Daily grandchildren: 31 buckets for March, 3 of them non-empty.
        let dailies: Vec<&PeriodSummary> =
            march.children.iter().flat_map(|w| &w.children).collect();
        assert_eq!(dailies.len(), 31);
        let non_empty_days: Vec<_> = dailies
            .iter()
            .filter(|d| !d.is_empty())
            .map(|d| d.period.label())
            .collect();
        assert_eq!(non_empty_days, vec!["2024-03-01", "2024-03-02", "2024-03-15"]);
    }

    // Hierarchical consistency: each weekly summary holds exactly the
    // commits whose dates fall in that week; same for monthly over weekly.
    #[test]
    fn test_hierarchical_consistency() {
        let detector = TechnologyDetector::new();
        let chain = SummarizerChain::new(&detector, utc());

        let commits = vec![
            commit("a", 2024, 3, 4, &["a.rs"]),
            commit("b", 2024, 3, 5, &["b.rs"]),
            commit("c", 2024, 3, 12, &["c.go"]),
            commit("d", 2024, 3, 28, &["d.py"]),
        ];

        let monthly = chain.run(commits.clone(), march_range());
        assert_eq!(monthly.len(), 1);

        for week in &monthly[0].children {
            let expected: Vec<&str> = commits
                .iter()
                .filter(|c| week.period.contains(c.timestamp.date_naive()))
                .map(|c| c.hash.as_str())
                .collect();
            let mut actual = week.commit_hashes();
            actual.sort();
            let mut expected = expected;
            expected.sort();
            assert_eq!(actual, expected, "week {}", week.period.label());
            assert_eq!(week.commit_count as usize, actual.len());
        }

        let monthly_hashes: std::collections::BTreeSet<_> =
            monthly[0].commit_hashes().into_iter().collect();
        let all_hashes: std::collections::BTreeSet<_> =
            commits.iter().map(|c| c.hash.as_str()).collect();
        assert_eq!(monthly_hashes, all_hashes);
    }

    // A range spanning two months yields one bucket per calendar month, with
    // empty months emitted.
    #[test]
    fn test_empty_months_emitted() {
        let detector = TechnologyDetector::new();
        let chain = SummarizerChain::new(&detector, utc());

        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 5, 31).unwrap(),
        )
        .unwrap();

        let commits = vec![commit("only", 2024, 3, 10, &["x.rs"])];
        let monthly = chain.run(commits, range);

        let labels: Vec<_> = monthly.iter().map(|m| m.period.label()).collect();
        assert_eq!(labels, vec!["2024-03", "2024-04", "2024-05"]);
        assert!(!monthly[0].is_empty());
        assert!(monthly[1].is_empty());
        assert!(monthly[2].is_empty());
    }

    // Timezone shifts day membership: 23:30 UTC on March 1 is March 2 in
    // UTC+2.
    #[test]
    fn test_timezone_day_bucketing() {
        let detector = TechnologyDetector::new();
        let chain = SummarizerChain::new(&detector, FixedOffset::east_opt(2 * 3600).unwrap());

        let late_commit = CommitRecord {
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 23, 30, 0).unwrap(),
            ..commit("late", 2024, 3, 1, &["x.rs"])
        };

        let monthly = chain.run(vec![late_commit], march_range());
        let day: Vec<_> = monthly[0]
            .children
            .iter()
            .flat_map(|w| &w.children)
            .filter(|d| !d.is_empty())
            .map(|d| d.period.label())
            .collect();
        assert_eq!(day, vec!["2024-03-02"]);
    }

    #[test]
    fn test_technology_counts_sum_up_the_tree() {
        let detector = TechnologyDetector::new();
        let chain = SummarizerChain::new(&detector, utc());

        let commits = vec![
            commit("a", 2024, 3, 4, &["a.rs", "b.rs"]),
            commit("b", 2024, 3, 20, &["c.rs"]),
        ];
        let monthly = chain.run(commits, march_range());

        let mut expected = TechnologySet::new();
        expected.record("Rust", 3);
        assert_eq!(monthly[0].technologies, expected);
    }
}
