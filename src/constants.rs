//! Global Constants
//!
//! Centralized constants for configuration and tuning.
//! All magic numbers should be defined here with documentation.

/// Commit extraction constants
pub mod extractor {
    /// Commit messages shorter than this are treated as noise and dropped
    pub const MIN_MESSAGE_LEN: usize = 10;

    /// Subdirectory of the user cache dir used for remote repository clones
    pub const SCRATCH_SUBDIR: &str = "repos";
}

/// Retry/backoff constants for provider calls
pub mod retry {
    /// Maximum attempts per provider call (first attempt included)
    pub const MAX_ATTEMPTS: u32 = 4;

    /// Base delay for exponential backoff (milliseconds)
    pub const BASE_DELAY_MS: u64 = 500;

    /// Maximum delay between attempts (seconds)
    pub const MAX_DELAY_SECS: u64 = 30;

    /// Backoff multiplier
    pub const BACKOFF_FACTOR: f32 = 2.0;

    /// Cap applied to server-suggested retry-after hints (seconds)
    pub const MAX_RETRY_AFTER_SECS: u64 = 300;
}

/// Response cache constants
pub mod cache {
    /// Namespace prefix for generation cache keys
    pub const KEY_NAMESPACE: &str = "llm:";

    /// Default time-to-live for cached provider responses (one week)
    pub const DEFAULT_TTL_SECS: u64 = 7 * 24 * 3600;
}

/// Pipeline constants
pub mod pipeline {
    /// Concurrent monthly-narrative generations in flight at once
    pub const NARRATIVE_CONCURRENCY: usize = 4;

    /// Maximum README characters included in the resume prompt context
    pub const MAX_README_CHARS: usize = 4000;

    /// Technologies listed as project context in the resume prompt
    pub const PROJECT_CONTEXT_TECHS: usize = 8;
}

/// HTTP/Network constants
pub mod network {
    /// Default request timeout (seconds)
    pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
}
