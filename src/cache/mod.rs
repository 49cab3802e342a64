//! Artifact File Cache
//!
//! Coarse second-level cache persisting expensive intermediate pipeline
//! artifacts (the summary tree, the computed CV) as JSON files. Artifacts
//! are named by stage and run fingerprint, so re-exporting the same history
//! in a different format costs nothing, while any change to the repository
//! or the filter configuration produces fresh artifacts.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::types::Result;

/// File-backed artifact cache.
pub struct FileCache {
    root: PathBuf,
}

impl FileCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, stage: &str, fingerprint: &str) -> PathBuf {
        self.root.join(format!("{}-{}.json", stage, fingerprint))
    }

    /// Load the artifact for (stage, fingerprint), or compute and persist it.
    ///
    /// An unreadable or corrupt artifact file is treated as a miss.
    pub async fn load_or_compute<T, F, Fut>(
        &self,
        stage: &str,
        fingerprint: &str,
        compute: F,
    ) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let path = self.path_for(stage, fingerprint);

        match tokio::fs::read_to_string(&path).await {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(value) => {
                    debug!(stage, path = %path.display(), "artifact cache hit");
                    return Ok(value);
                }
                Err(e) => {
                    debug!(stage, error = %e, "corrupt artifact, recomputing");
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let value = compute().await?;

        tokio::fs::create_dir_all(&self.root).await?;
        let content = serde_json::to_string_pretty(&value)?;
        tokio::fs::write(&path, &content).await?;
        info!(stage, path = %path.display(), bytes = content.len(), "artifact saved");

        Ok(value)
    }

    /// Remove every artifact file; returns the count.
    pub async fn clear(&self) -> Result<usize> {
        let mut count = 0;

        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|e| e == "json") {
                tokio::fs::remove_file(&path).await?;
                count += 1;
            }
        }

        info!(count, "cleared artifact cache");
        Ok(count)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Fingerprint of a run: hashes the filter-relevant configuration together
/// with the repository head state, so cached artifacts are reused only when
/// both are unchanged.
pub fn run_fingerprint(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update([0]);
    }
    hex::encode(hasher.finalize())[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_load_or_compute_round_trip() {
        let dir = TempDir::new().unwrap();
        let cache = FileCache::new(dir.path());
        let calls = AtomicU32::new(0);
        let calls = &calls;

        for _ in 0..2 {
            let value: Vec<u32> = cache
                .load_or_compute("monthly", "abc123", || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(vec![1, 2, 3])
                })
                .await
                .unwrap();
            assert_eq!(value, vec![1, 2, 3]);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(dir.path().join("monthly-abc123.json").exists());
    }

    #[tokio::test]
    async fn test_different_fingerprint_recomputes() {
        let dir = TempDir::new().unwrap();
        let cache = FileCache::new(dir.path());
        let calls = AtomicU32::new(0);
        let calls = &calls;

        let mut compute = || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok("x".to_string())
        };
        let _: String = cache.load_or_compute("cv", "aaa", &mut compute).await.unwrap();
        let _: String = cache.load_or_compute("cv", "bbb", &mut compute).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_corrupt_artifact_recomputed() {
        let dir = TempDir::new().unwrap();
        let cache = FileCache::new(dir.path());
        tokio::fs::write(dir.path().join("cv-abc.json"), "{not json")
            .await
            .unwrap();

        let value: String = cache
            .load_or_compute("cv", "abc", || async move { Ok("fresh".to_string()) })
            .await
            .unwrap();
        assert_eq!(value, "fresh");
    }

    #[tokio::test]
    async fn test_clear() {
        let dir = TempDir::new().unwrap();
        let cache = FileCache::new(dir.path());

        let _: u32 = cache
            .load_or_compute("a", "1", || async move { Ok(1) })
            .await
            .unwrap();
        let _: u32 = cache
            .load_or_compute("b", "2", || async move { Ok(2) })
            .await
            .unwrap();

        assert_eq!(cache.clear().await.unwrap(), 2);
        assert_eq!(cache.clear().await.unwrap(), 0);
    }

    #[test]
    fn test_run_fingerprint_stable() {
        let a = run_fingerprint(&["repo", "alice@example.com", "2024-03-01"]);
        let b = run_fingerprint(&["repo", "alice@example.com", "2024-03-01"]);
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
        assert_ne!(a, run_fingerprint(&["repo", "bob@example.com", "2024-03-01"]));
    }
}
