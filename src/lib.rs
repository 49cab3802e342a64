//! commitcv - Git History to Resume Generator
//!
//! Converts a developer's Git commit history into a structured resume by
//! summarizing activity hierarchically and delegating natural-language
//! generation to a pluggable LLM backend.
//!
//! ## Core Pipeline
//!
//! Extractor → Technology Detector → Summarizer Chain (daily → weekly →
//! monthly) → Prompt Builder → Model Provider (via Cache Manager) →
//! [`CvDocument`] → (external) exporter.
//!
//! - Summarization and prompt building are pure and deterministic, so
//!   identical runs produce identical intermediate artifacts.
//! - Provider responses are cached content-addressed (SHA-256 over provider,
//!   model, envelope, and sampling parameters) in SQLite, with per-key
//!   single-flight so concurrent identical requests pay the LLM cost once.
//! - Provider backends translate their error vocabularies into two abstract
//!   outcomes, retryable and fatal; the bounded exponential-backoff retry
//!   loop knows nothing backend-specific.
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use commitcv::ai::{CacheManager, Generator, SamplingParams, create_provider};
//! use commitcv::config::ConfigLoader;
//! use commitcv::cv::{CancelToken, Pipeline};
//! use commitcv::storage::SqliteStore;
//!
//! let config = ConfigLoader::load()?;
//! let store = Arc::new(SqliteStore::open(&config.cache.db_path)?);
//! let cache = Arc::new(CacheManager::new(store));
//! let provider = create_provider(&config.llm)?;
//! let generator = Generator::new(
//!     provider,
//!     cache,
//!     SamplingParams::default(),
//!     Duration::from_secs(config.cache.ttl_secs),
//! );
//! let pipeline = Pipeline::new(config, generator)?;
//! let document = pipeline.run(CancelToken::none()).await?;
//! ```
//!
//! ## Modules
//!
//! - [`git`]: commit extraction and repository inspection
//! - [`detector`]: file-path based technology detection
//! - [`summarizer`]: the daily/weekly/monthly reduction chain
//! - [`ai`]: prompt construction, response caching, provider abstraction
//! - [`storage`]: the SQLite key-value store behind the response cache
//! - [`cache`]: file-backed artifact cache for pipeline intermediates
//! - [`cv`]: run orchestration and cancellation

pub mod ai;
pub mod cache;
pub mod cli;
pub mod config;
pub mod constants;
pub mod cv;
pub mod detector;
pub mod git;
pub mod storage;
pub mod summarizer;
pub mod types;

// =============================================================================
// Core Re-exports
// =============================================================================

// Configuration
pub use config::{Config, ConfigLoader};

// Error types
pub use types::error::{CvError, ProviderError, Result};

// Data model
pub use types::{CommitRecord, CvDocument, CvEntry, DateRange, Period, PeriodSummary, TechnologySet};

// =============================================================================
// Pipeline Re-exports
// =============================================================================

pub use cv::{CancelHandle, CancelToken, Pipeline, cancel_pair};
pub use detector::TechnologyDetector;
pub use git::{CommitExtractor, CommitFilter};
pub use summarizer::{
    DailySummarizer, MonthlySummarizer, Summarize, SummarizerChain, WeeklySummarizer,
};

// =============================================================================
// AI Re-exports
// =============================================================================

pub use ai::{
    CacheManager,
    Generator,
    GrammaticalPerson,
    ModelProvider,
    PromptBuilder,
    PromptEnvelope,
    ProviderResponse,
    RetryPolicy,
    SamplingParams,
    SharedProvider,
    create_provider,
    fingerprint,
};
pub use storage::{CacheStore, SharedStore, SqliteStore};
