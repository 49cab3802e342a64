//! Cache Manager
//!
//! Content-addressed `get_or_compute` in front of the key-value store, with
//! two guarantees the raw store does not give:
//!
//! 1. **Single-flight**: concurrent requests for the same key collapse to
//!    one upstream computation. An in-flight registry maps each key to a
//!    shared `OnceCell`; late arrivals await the first caller's result
//!    instead of paying the LLM cost again.
//! 2. **Degrade on outage**: if the backing store is unreachable, the
//!    manager logs a warning and computes directly. A cache outage never
//!    turns into a request failure.
//!
//! A value is committed to the store only after the computation fully
//! succeeds; failed or cancelled computations write nothing.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::ai::prompt::PromptEnvelope;
use crate::ai::provider::SamplingParams;
use crate::constants;
use crate::storage::SharedStore;
use crate::types::Result;

/// Derive the content-addressed key for one generation request.
///
/// The fingerprint hashes the canonical serialization of every semantically
/// relevant field: provider identity, model identity, the envelope, and the
/// sampling parameters. Identical requests therefore always map to the same
/// key, across runs and processes.
pub fn fingerprint(
    provider: &str,
    model: &str,
    envelope: &PromptEnvelope,
    params: &SamplingParams,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(provider.as_bytes());
    hasher.update([0]);
    hasher.update(model.as_bytes());
    hasher.update([0]);
    hasher.update(envelope.canonical_bytes());
    hasher.update([0]);
    hasher.update(serde_json::to_vec(params).unwrap_or_default());
    format!(
        "{}{}",
        constants::cache::KEY_NAMESPACE,
        hex::encode(hasher.finalize())
    )
}

/// Cache manager wrapping the shared key-value store.
pub struct CacheManager {
    store: SharedStore,
    inflight: DashMap<String, Arc<OnceCell<serde_json::Value>>>,
}

impl CacheManager {
    pub fn new(store: SharedStore) -> Self {
        Self {
            store,
            inflight: DashMap::new(),
        }
    }

    /// Return the cached value for `key`, or run `compute` exactly once and
    /// cache its result with the given TTL.
    pub async fn get_or_compute<T, F, Fut>(&self, key: &str, ttl: Duration, compute: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        // Fast path: live entry in the store.
        match self.store.get(key) {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => {
                    debug!(key, "cache hit");
                    return Ok(value);
                }
                Err(e) => warn!(key, error = %e, "corrupt cache entry, recomputing"),
            },
            Ok(None) => {}
            Err(e) => warn!(key, error = %e, "cache unavailable, degrading to direct compute"),
        }

        // Miss: join (or start) the in-flight computation for this key.
        let cell = self
            .inflight
            .entry(key.to_string())
            .or_default()
            .value()
            .clone();

        let result = cell
            .get_or_try_init(|| async move {
                // Another task may have finished while we waited for the cell.
                if let Ok(Some(raw)) = self.store.get(key)
                    && let Ok(value) = serde_json::from_str::<serde_json::Value>(&raw)
                {
                    debug!(key, "cache hit after wait");
                    return Ok(value);
                }

                let value = compute().await?;
                let json = serde_json::to_value(&value)?;

                // Commit only after full success; a write failure degrades
                // to an uncached result instead of failing the request.
                if let Err(e) = self.store.put(key, &json.to_string(), ttl) {
                    warn!(key, error = %e, "cache write failed, result not persisted");
                }

                Ok::<_, crate::types::CvError>(json)
            })
            .await
            .map(|value| value.clone());

        self.inflight.remove(key);

        let value = result?;
        Ok(serde_json::from_value(value)?)
    }

    // =========================================================================
    // Administrative surface
    // =========================================================================

    /// List live keys matching a glob-style pattern.
    pub fn list(&self, pattern: &str) -> Result<Vec<String>> {
        self.store.keys(pattern)
    }

    /// Invalidate entries matching a glob-style pattern; returns the count.
    pub fn invalidate(&self, pattern: &str) -> Result<usize> {
        self.store.remove(pattern)
    }
}
