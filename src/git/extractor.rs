//! Commit Extraction
//!
//! Reads a repository (local path or remote URL) and produces a
//! chronologically ordered, de-duplicated sequence of `CommitRecord`s
//! matching the configured filters. Remote repositories are cloned into a
//! deterministic scratch directory keyed by the URL, so re-running fetches
//! instead of re-cloning.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use git2::{BranchType, Oid, Repository, Sort};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::constants;
use crate::types::{CommitRecord, CvError, DateRange, Result};

/// Commit filter settings for one extraction run.
#[derive(Debug, Clone, Default)]
pub struct CommitFilter {
    /// Branches to union; empty means all local branches
    pub branches: Vec<String>,
    /// Author emails to include; empty means all authors
    pub authors: Vec<String>,
    /// Inclusive window start (calendar date in the run timezone)
    pub start_date: Option<NaiveDate>,
    /// Inclusive window end
    pub end_date: Option<NaiveDate>,
    /// Case-insensitive keywords that disqualify a commit message
    pub ignore_keywords: Vec<String>,
    /// Messages shorter than this are dropped as noise
    pub min_message_len: usize,
}

impl CommitFilter {
    /// Check a single commit against every predicate.
    fn matches(&self, email: &str, local_date: NaiveDate, message: &str) -> bool {
        if !self.authors.is_empty() && !self.authors.iter().any(|a| a == email) {
            return false;
        }
        if let Some(start) = self.start_date
            && local_date < start
        {
            return false;
        }
        if let Some(end) = self.end_date
            && local_date > end
        {
            return false;
        }
        if message.trim().len() < self.min_message_len {
            return false;
        }
        let lower = message.to_lowercase();
        if self
            .ignore_keywords
            .iter()
            .any(|kw| !kw.is_empty() && lower.contains(&kw.to_lowercase()))
        {
            return false;
        }
        true
    }
}

/// Extracts commit records from local or remote repositories.
pub struct CommitExtractor {
    timezone: FixedOffset,
    scratch_root: PathBuf,
}

impl CommitExtractor {
    pub fn new(timezone: FixedOffset, scratch_root: PathBuf) -> Self {
        Self {
            timezone,
            scratch_root,
        }
    }

    /// Extract all commits matching the filter, ordered by (timestamp, id).
    ///
    /// Branches are unioned; a commit reachable from several branches is
    /// recorded once, attributed to the first branch that reached it. Merge
    /// commits are skipped. Fails with `InvalidDateRange` before the
    /// repository is touched, and `RepositoryUnavailable` if it cannot be
    /// opened.
    pub fn extract(&self, location: &str, filter: &CommitFilter) -> Result<Vec<CommitRecord>> {
        if let (Some(start), Some(end)) = (filter.start_date, filter.end_date) {
            DateRange::new(start, end)?;
        }

        let repo = self.open(location)?;
        let branches = self.resolve_branches(&repo, location, &filter.branches)?;

        let mut seen: HashSet<Oid> = HashSet::new();
        let mut records = Vec::new();

        for (branch_name, head) in branches {
            debug!(branch = %branch_name, "walking branch");

            let mut walk = repo.revwalk()?;
            walk.set_sorting(Sort::TIME)?;
            walk.push(head)?;

            for oid in walk {
                let oid = oid?;
                if !seen.insert(oid) {
                    continue;
                }

                let commit = repo.find_commit(oid)?;
                if commit.parent_count() > 1 {
                    continue;
                }

                let author = commit.author();
                let email = author.email().unwrap_or_default().to_string();
                let name = author.name().unwrap_or_default().to_string();
                let message = commit.message().unwrap_or_default().trim().to_string();

                let Some(timestamp) = DateTime::<Utc>::from_timestamp(commit.time().seconds(), 0)
                else {
                    warn!(commit = %oid, "commit has out-of-range timestamp, skipping");
                    continue;
                };
                let local_date = timestamp.with_timezone(&self.timezone).date_naive();

                if !filter.matches(&email, local_date, &message) {
                    continue;
                }

                records.push(CommitRecord {
                    hash: oid.to_string(),
                    author_name: name,
                    author_email: email,
                    timestamp,
                    message,
                    files: changed_files(&repo, &commit)?,
                    branch: branch_name.clone(),
                });
            }
        }

        records.sort_by(|a, b| (a.timestamp, &a.hash).cmp(&(b.timestamp, &b.hash)));
        info!(commits = records.len(), "extraction complete");
        Ok(records)
    }

    /// Timestamp of the most recent commit on HEAD.
    ///
    /// Used in the run fingerprint so cached artifacts reflect repository
    /// state.
    pub fn head_commit_time(&self, location: &str) -> Result<DateTime<Utc>> {
        let repo = self.open(location)?;
        let head = repo
            .head()
            .and_then(|h| h.peel_to_commit())
            .map_err(|e| CvError::repository_unavailable(location, &e))?;
        DateTime::<Utc>::from_timestamp(head.time().seconds(), 0).ok_or_else(|| {
            CvError::Storage(format!("head commit of '{}' has invalid timestamp", location))
        })
    }

    /// First-level listing of the repository tree at HEAD.
    pub fn project_structure(&self, location: &str) -> Result<String> {
        let repo = self.open(location)?;
        let tree = repo
            .head()
            .and_then(|h| h.peel_to_tree())
            .map_err(|e| CvError::repository_unavailable(location, &e))?;

        let mut items = Vec::new();
        for entry in tree.iter() {
            let name = entry.name().unwrap_or_default();
            match entry.kind() {
                Some(git2::ObjectType::Tree) => items.push(format!("[DIR] {}", name)),
                Some(git2::ObjectType::Blob) => items.push(format!("[FILE] {}", name)),
                _ => {}
            }
        }
        Ok(items.join("\n"))
    }

    /// Contents of root-level README*/CHANGELOG* files at HEAD.
    pub fn readme_files(&self, location: &str) -> Result<BTreeMap<String, String>> {
        const KNOWN_EXTENSIONS: &[&str] = &["md", "txt", "rst", "markdown"];

        let repo = self.open(location)?;
        let tree = repo
            .head()
            .and_then(|h| h.peel_to_tree())
            .map_err(|e| CvError::repository_unavailable(location, &e))?;

        let mut contents = BTreeMap::new();
        for entry in tree.iter() {
            if entry.kind() != Some(git2::ObjectType::Blob) {
                continue;
            }
            let Some(name) = entry.name() else { continue };
            let upper = name.to_uppercase();
            if !upper.starts_with("README") && !upper.starts_with("CHANGELOG") {
                continue;
            }
            let extension_ok = match name.rsplit_once('.') {
                Some((_, ext)) => KNOWN_EXTENSIONS.contains(&ext.to_lowercase().as_str()),
                None => true,
            };
            if !extension_ok {
                continue;
            }
            let blob = repo.find_blob(entry.id())?;
            if let Ok(text) = std::str::from_utf8(blob.content()) {
                contents.insert(name.to_string(), text.to_string());
            }
        }
        Ok(contents)
    }

    // =========================================================================
    // Repository access
    // =========================================================================

    /// Open a local repository, or clone/fetch a remote one into the scratch
    /// directory.
    fn open(&self, location: &str) -> Result<Repository> {
        if is_remote(location) {
            return self.open_remote(location);
        }

        if !Path::new(location).is_dir() {
            return Err(CvError::RepositoryUnavailable {
                location: location.to_string(),
                reason: "path does not exist or is not a directory".to_string(),
            });
        }

        Repository::open(location).map_err(|e| CvError::repository_unavailable(location, &e))
    }

    fn open_remote(&self, url: &str) -> Result<Repository> {
        let checkout = self.scratch_dir(url);

        if checkout.join(".git").exists() {
            debug!(path = %checkout.display(), "reusing scratch clone, fetching");
            let repo = Repository::open(&checkout)
                .map_err(|e| CvError::repository_unavailable(url, &e))?;
            {
                let mut remote = repo
                    .find_remote("origin")
                    .map_err(|e| CvError::repository_unavailable(url, &e))?;
                remote
                    .fetch(&[] as &[&str], None, None)
                    .map_err(|e| CvError::repository_unavailable(url, &e))?;
            }
            return Ok(repo);
        }

        info!(url, "cloning repository into scratch directory");
        std::fs::create_dir_all(&checkout)?;
        Repository::clone(url, &checkout).map_err(|e| CvError::repository_unavailable(url, &e))
    }

    /// Deterministic scratch location for a remote URL, so re-runs are
    /// idempotent.
    fn scratch_dir(&self, url: &str) -> PathBuf {
        let digest = Sha256::digest(url.as_bytes());
        self.scratch_root
            .join(constants::extractor::SCRATCH_SUBDIR)
            .join(&hex::encode(digest)[..16])
    }

    /// Resolve the requested branch names (or all local branches) to their
    /// head commits. Unknown branches are skipped with a warning.
    fn resolve_branches(
        &self,
        repo: &Repository,
        location: &str,
        requested: &[String],
    ) -> Result<Vec<(String, Oid)>> {
        let mut resolved = Vec::new();

        if requested.is_empty() {
            for branch in repo.branches(Some(BranchType::Local))? {
                let (branch, _) = branch?;
                let name = branch.name()?.unwrap_or_default().to_string();
                if let Ok(commit) = branch.get().peel_to_commit() {
                    resolved.push((name, commit.id()));
                }
            }
        } else {
            for name in requested {
                let local = repo.find_branch(name, BranchType::Local);
                let found = match local {
                    Ok(branch) => Some(branch),
                    Err(_) => repo
                        .find_branch(&format!("origin/{}", name), BranchType::Remote)
                        .ok(),
                };
                match found.and_then(|b| b.get().peel_to_commit().ok()) {
                    Some(commit) => resolved.push((name.clone(), commit.id())),
                    None => warn!(branch = %name, "branch not found in repository, skipping"),
                }
            }
        }

        if resolved.is_empty() {
            return Err(CvError::RepositoryUnavailable {
                location: location.to_string(),
                reason: "repository has no matching branches or no commits".to_string(),
            });
        }
        Ok(resolved)
    }
}

/// Paths changed by a commit, relative to the repository root.
fn changed_files(repo: &Repository, commit: &git2::Commit) -> Result<Vec<String>> {
    let tree = commit.tree()?;
    let parent_tree = match commit.parent(0) {
        Ok(parent) => Some(parent.tree()?),
        Err(_) => None, // root commit diffs against the empty tree
    };

    let diff = repo.diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), None)?;
    let mut files: Vec<String> = diff
        .deltas()
        .filter_map(|delta| delta.new_file().path().or_else(|| delta.old_file().path()))
        .map(|p| p.to_string_lossy().to_string())
        .collect();
    files.sort();
    files.dedup();
    Ok(files)
}

fn is_remote(location: &str) -> bool {
    location.starts_with("http://")
        || location.starts_with("https://")
        || location.starts_with("ssh://")
        || location.starts_with("git@")
}
