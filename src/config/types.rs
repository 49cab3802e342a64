//! Configuration Types
//!
//! All configuration structures with sensible defaults. A single `Config`
//! value is constructed once at process start and passed by reference to
//! every component that needs it; there is no global lookup.

use chrono::{FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::constants;
use crate::types::{CvError, DateRange, Result};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Configuration version
    pub version: String,

    /// Repository location and branch selection
    pub repo: RepoConfig,

    /// Commit filtering settings
    pub filter: FilterConfig,

    /// LLM provider settings
    pub llm: LlmConfig,

    /// Response and artifact cache settings
    pub cache: CacheConfig,

    /// Resume output settings
    pub output: OutputConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            repo: RepoConfig::default(),
            filter: FilterConfig::default(),
            llm: LlmConfig::default(),
            cache: CacheConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl Config {
    /// Validate configuration values are within acceptable ranges.
    /// Returns `CvError::Config` on validation failure.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(CvError::Config(format!(
                "LLM temperature must be between 0.0 and 2.0, got {}",
                self.llm.temperature
            )));
        }

        if self.llm.timeout_secs == 0 {
            return Err(CvError::Config(
                "LLM timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.llm.max_attempts == 0 {
            return Err(CvError::Config(
                "LLM max_attempts must be greater than 0".to_string(),
            ));
        }

        self.filter.timezone_offset()?;

        if let (Some(start), Some(end)) = (self.filter.start_date, self.filter.end_date) {
            DateRange::new(start, end)?;
        }

        Ok(())
    }
}

// =============================================================================
// Repository Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RepoConfig {
    /// Local path or remote URL of the repository to analyze
    pub location: String,

    /// Branches to union; empty means all local branches
    pub branches: Vec<String>,
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            location: ".".to_string(),
            branches: Vec::new(),
        }
    }
}

// =============================================================================
// Filter Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Author email addresses to include; empty means all authors
    pub authors: Vec<String>,

    /// Inclusive start of the extraction window
    pub start_date: Option<NaiveDate>,

    /// Inclusive end of the extraction window
    pub end_date: Option<NaiveDate>,

    /// strftime format used when parsing and displaying dates
    pub date_format: String,

    /// Case-insensitive keywords that disqualify a commit (e.g. "typo")
    pub ignore_keywords: Vec<String>,

    /// Commit messages shorter than this are dropped as noise
    pub min_message_len: usize,

    /// UTC offset for day bucketing, e.g. "+00:00" or "-05:00"
    pub timezone: String,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            authors: Vec::new(),
            start_date: None,
            end_date: None,
            date_format: "%Y-%m-%d".to_string(),
            ignore_keywords: Vec::new(),
            min_message_len: constants::extractor::MIN_MESSAGE_LEN,
            timezone: "+00:00".to_string(),
        }
    }
}

impl FilterConfig {
    /// Parse the configured timezone into a fixed UTC offset.
    pub fn timezone_offset(&self) -> Result<FixedOffset> {
        parse_utc_offset(&self.timezone).ok_or_else(|| {
            CvError::Config(format!(
                "invalid timezone offset {:?} (expected e.g. \"+02:00\")",
                self.timezone
            ))
        })
    }

    /// The configured extraction window, if both bounds are set.
    pub fn date_range(&self) -> Result<Option<DateRange>> {
        match (self.start_date, self.end_date) {
            (Some(start), Some(end)) => Ok(Some(DateRange::new(start, end)?)),
            _ => Ok(None),
        }
    }
}

/// Parse an offset of the form `+HH:MM` / `-HH:MM` (or `+HH`).
fn parse_utc_offset(value: &str) -> Option<FixedOffset> {
    let value = value.trim();
    let (sign, rest) = match *value.as_bytes().first()? {
        b'+' => (1, &value[1..]),
        b'-' => (-1, &value[1..]),
        _ => return None,
    };

    let (hours, minutes) = match rest.split_once(':') {
        Some((h, m)) => (h.parse::<i32>().ok()?, m.parse::<i32>().ok()?),
        None => (rest.parse::<i32>().ok()?, 0),
    };
    if hours > 14 || !(0..60).contains(&minutes) {
        return None;
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

// =============================================================================
// LLM Configuration
// =============================================================================

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider type: "openai" or "ollama"
    pub provider: String,

    /// Model name (provider-specific); provider default when unset
    pub model: Option<String>,

    /// API key; never serialized to output
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// API base URL (for custom endpoints)
    pub api_base: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Sampling temperature
    pub temperature: f32,

    /// Maximum tokens to generate per call
    pub max_tokens: u32,

    /// Maximum attempts per provider call, first attempt included
    pub max_attempts: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: None,
            api_key: None,
            api_base: None,
            timeout_secs: constants::network::DEFAULT_TIMEOUT_SECS,
            temperature: 0.3,
            max_tokens: 1500,
            max_attempts: constants::retry::MAX_ATTEMPTS,
        }
    }
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("api_base", &self.api_base)
            .field("timeout_secs", &self.timeout_secs)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_attempts", &self.max_attempts)
            .finish()
    }
}

// =============================================================================
// Cache Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Time-to-live for cached provider responses, in seconds
    pub ttl_secs: u64,

    /// SQLite database backing the response cache
    pub db_path: String,

    /// Directory for coarse pipeline artifacts (summary tree, computed CV)
    pub artifacts_dir: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: constants::cache::DEFAULT_TTL_SECS,
            db_path: ".commitcv/cache.db".to_string(),
            artifacts_dir: ".commitcv/artifacts".to_string(),
        }
    }
}

// =============================================================================
// Output Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Author's full name, printed on the resume
    pub author_name: String,

    /// Language the model should write in
    pub target_language: String,

    /// "first" or "third"
    pub grammatical_person: String,

    /// Output path for the generated CV (JSON)
    pub path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            author_name: String::new(),
            target_language: "english".to_string(),
            grammatical_person: "third".to_string(),
            path: "resume.json".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validates() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn test_temperature_out_of_range() {
        let mut config = Config::default();
        config.llm.temperature = 3.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_inverted_date_range_rejected() {
        let mut config = Config::default();
        config.filter.start_date = NaiveDate::from_ymd_opt(2024, 4, 1);
        config.filter.end_date = NaiveDate::from_ymd_opt(2024, 3, 1);
        assert!(matches!(
            config.validate(),
            Err(CvError::InvalidDateRange { .. })
        ));
    }

    #[test]
    fn test_timezone_parsing() {
        let mut filter = FilterConfig::default();
        assert_eq!(
            filter.timezone_offset().unwrap(),
            FixedOffset::east_opt(0).unwrap()
        );

        filter.timezone = "+02:00".to_string();
        assert_eq!(
            filter.timezone_offset().unwrap(),
            FixedOffset::east_opt(2 * 3600).unwrap()
        );

        filter.timezone = "-05:30".to_string();
        assert_eq!(
            filter.timezone_offset().unwrap(),
            FixedOffset::west_opt(5 * 3600 + 1800).unwrap()
        );

        filter.timezone = "utc".to_string();
        assert!(filter.timezone_offset().is_err());
    }

    #[test]
    fn test_llm_config_debug_redacts_key() {
        let config = LlmConfig {
            api_key: Some("sk-secret".to_string()),
            ..Default::default()
        };
        let debug = format!("{:?}", config);
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
