//! `commitcv cache` - operational cache maintenance
//!
//! Lists and invalidates response-cache entries by glob pattern over the
//! same key namespace the pipeline uses, and clears the artifact files.

use console::style;

use crate::cache::FileCache;
use crate::config::ConfigLoader;
use crate::storage::{CacheStore, SqliteStore};
use crate::types::Result;

/// List cache keys matching a glob-style pattern.
pub fn list(pattern: &str) -> Result<()> {
    let config = ConfigLoader::load()?;
    let store = SqliteStore::open(&config.cache.db_path)?;

    let keys = store.keys(pattern)?;
    if keys.is_empty() {
        println!("no cache entries match {:?}", pattern);
        return Ok(());
    }
    for key in &keys {
        println!("{}", key);
    }
    println!(
        "{} {} entries",
        style("✓").green(),
        style(keys.len()).bold()
    );
    Ok(())
}

/// Invalidate cache entries matching a pattern, and clear the artifact
/// files so stale intermediates cannot outlive their responses.
pub fn invalidate(pattern: &str) -> Result<()> {
    let config = ConfigLoader::load()?;
    let store = SqliteStore::open(&config.cache.db_path)?;

    let removed = store.remove(pattern)?;
    if removed == 0 {
        println!("no cache entries match {:?}", pattern);
    } else {
        println!(
            "{} {} entries matching {:?} invalidated",
            style("✓").green(),
            removed,
            pattern
        );
    }

    let artifacts = FileCache::new(&config.cache.artifacts_dir);
    let rt = tokio::runtime::Runtime::new()?;
    let cleared = rt.block_on(artifacts.clear())?;
    if cleared > 0 {
        println!(
            "{} {} artifact files cleared",
            style("✓").green(),
            cleared
        );
    }
    Ok(())
}

/// Drop every cache entry and artifact.
pub fn clear() -> Result<()> {
    invalidate("*")
}
