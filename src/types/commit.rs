//! Commit and Technology Types
//!
//! `CommitRecord` is the immutable unit produced by the extractor; everything
//! downstream only reads it. `TechnologySet` is the aggregated form of the
//! per-commit technology tags, merged up the summary tree.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single extracted commit. Created by the extractor, read-only thereafter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    /// Full commit id (hex)
    pub hash: String,
    pub author_name: String,
    pub author_email: String,
    /// Commit time, normalized to UTC
    pub timestamp: DateTime<Utc>,
    /// Trimmed commit message
    pub message: String,
    /// Paths changed by this commit, relative to the repository root
    pub files: Vec<String>,
    /// Branch the commit was reached from (first match wins on branch union)
    pub branch: String,
}

impl CommitRecord {
    /// First line of the commit message.
    pub fn summary_line(&self) -> &str {
        self.message.lines().next().unwrap_or_default()
    }
}

/// A detected technology with its occurrence count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TechnologyTag {
    pub name: String,
    pub occurrences: u32,
}

/// Aggregated technology occurrences, ordered by name for deterministic
/// serialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TechnologySet(BTreeMap<String, u32>);

impl TechnologySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `count` additional occurrences of a technology.
    pub fn record(&mut self, name: impl Into<String>, count: u32) {
        *self.0.entry(name.into()).or_insert(0) += count;
    }

    /// Union with another set, summing occurrence counts.
    pub fn merge(&mut self, other: &TechnologySet) {
        for (name, count) in &other.0 {
            *self.0.entry(name.clone()).or_insert(0) += count;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.0.iter().map(|(name, count)| (name.as_str(), *count))
    }

    pub fn tags(&self) -> Vec<TechnologyTag> {
        self.0
            .iter()
            .map(|(name, count)| TechnologyTag {
                name: name.clone(),
                occurrences: *count,
            })
            .collect()
    }

    /// Convert occurrence counts to percentage weights.
    ///
    /// Weights are rounded to two decimals and adjusted by largest remainder
    /// so the total is exactly 100.0. Empty sets yield an empty map.
    pub fn percentages(&self) -> BTreeMap<String, f64> {
        let total: u32 = self.0.values().sum();
        if total == 0 {
            return BTreeMap::new();
        }

        let raw: Vec<(&String, f64)> = self
            .0
            .iter()
            .map(|(name, count)| (name, *count as f64 / total as f64 * 100.0))
            .collect();

        let mut rounded: BTreeMap<String, f64> = raw
            .iter()
            .map(|(name, pct)| ((*name).clone(), (pct * 100.0).round() / 100.0))
            .collect();

        // Largest remainder: give the rounding residue to the entry that lost
        // the biggest fractional part.
        let sum: f64 = rounded.values().sum();
        let diff = ((100.0 - sum) * 100.0).round() / 100.0;
        if diff.abs() > f64::EPSILON
            && let Some((name, _)) = raw.iter().max_by(|(na, a), (nb, b)| {
                let fa = a - (a * 100.0).floor() / 100.0;
                let fb = b - (b * 100.0).floor() / 100.0;
                fa.partial_cmp(&fb)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(nb.cmp(na))
            })
        {
            if let Some(value) = rounded.get_mut(*name) {
                *value = ((*value + diff) * 100.0).round() / 100.0;
            }
        }

        rounded
    }
}

impl FromIterator<(String, u32)> for TechnologySet {
    fn from_iter<I: IntoIterator<Item = (String, u32)>>(iter: I) -> Self {
        let mut set = Self::new();
        for (name, count) in iter {
            set.record(name, count);
        }
        set
    }
}
