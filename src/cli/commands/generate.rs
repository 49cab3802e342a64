//! `commitcv generate` - run the full pipeline and write the CV

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use console::style;
use tracing::warn;

use crate::ai::{CacheManager, Generator, RetryPolicy, SamplingParams, create_provider};
use crate::config::{Config, ConfigLoader};
use crate::cv::{Pipeline, cancel_pair};
use crate::storage::{SharedStore, SqliteStore};
use crate::types::{CvError, Result};

/// Command-line overrides layered on top of the loaded configuration.
#[derive(Debug, Default)]
pub struct GenerateOptions {
    pub config_file: Option<PathBuf>,
    pub repo: Option<String>,
    pub branches: Vec<String>,
    pub authors: Vec<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub ignore_keywords: Vec<String>,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub language: Option<String>,
    pub person: Option<String>,
    pub author_name: Option<String>,
    pub output: Option<PathBuf>,
}

pub fn run(options: GenerateOptions) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run_async(options))
}

async fn run_async(options: GenerateOptions) -> Result<()> {
    let mut config = match &options.config_file {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load()?,
    };
    apply_overrides(&mut config, &options)?;
    config.validate()?;

    let output_path = options
        .output
        .unwrap_or_else(|| PathBuf::from(&config.output.path));

    // The response cache is best-effort: an unusable database degrades to an
    // in-memory store for this run instead of refusing to work.
    let store: SharedStore = match SqliteStore::open(&config.cache.db_path) {
        Ok(store) => {
            if let Err(e) = store.purge_expired() {
                warn!(error = %e, "could not purge expired cache entries");
            }
            Arc::new(store)
        }
        Err(e) => {
            warn!(error = %e, "response cache unavailable, using in-memory store");
            Arc::new(SqliteStore::open_in_memory()?)
        }
    };
    let cache = Arc::new(CacheManager::new(store));

    let provider = create_provider(&config.llm)?;
    let params = SamplingParams {
        temperature: config.llm.temperature,
        max_tokens: config.llm.max_tokens,
    };
    let retry = RetryPolicy {
        max_attempts: config.llm.max_attempts,
        ..Default::default()
    };
    let generator = Generator::new(
        provider,
        cache,
        params,
        Duration::from_secs(config.cache.ttl_secs),
    )
    .with_retry(retry);

    println!(
        "{} extracting history from {}",
        style("→").cyan(),
        style(&config.repo.location).bold()
    );

    let (handle, token) = cancel_pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\ninterrupt received, cancelling run...");
            handle.cancel();
        }
    });

    let pipeline = Pipeline::new(config, generator)?;
    if !pipeline.health_check().await {
        warn!("LLM backend is not reachable; generation may fail after retries");
    }
    let document = pipeline.run(token).await?;

    if let Some(parent) = output_path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&output_path, serde_json::to_string_pretty(&document)?).await?;

    println!(
        "{} CV generated at {} ({} entries, {} technologies)",
        style("✓").green(),
        style(output_path.display()).bold(),
        document.entries.len(),
        document.technologies.len()
    );
    Ok(())
}

fn apply_overrides(config: &mut Config, options: &GenerateOptions) -> Result<()> {
    if let Some(repo) = &options.repo {
        config.repo.location = repo.clone();
    }
    if !options.branches.is_empty() {
        config.repo.branches = options.branches.clone();
    }
    if !options.authors.is_empty() {
        config.filter.authors = options.authors.clone();
    }
    if !options.ignore_keywords.is_empty() {
        config.filter.ignore_keywords = options.ignore_keywords.clone();
    }
    if let Some(provider) = &options.provider {
        config.llm.provider = provider.clone();
    }
    if let Some(model) = &options.model {
        config.llm.model = Some(model.clone());
    }
    if let Some(language) = &options.language {
        config.output.target_language = language.clone();
    }
    if let Some(person) = &options.person {
        config.output.grammatical_person = person.clone();
    }
    if let Some(name) = &options.author_name {
        config.output.author_name = name.clone();
    }

    let format = config.filter.date_format.clone();
    if let Some(start) = &options.start_date {
        config.filter.start_date = Some(parse_date(start, &format)?);
    }
    if let Some(end) = &options.end_date {
        config.filter.end_date = Some(parse_date(end, &format)?);
    }
    Ok(())
}

fn parse_date(value: &str, format: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, format).map_err(|e| {
        CvError::Config(format!(
            "invalid date {:?} for format {:?}: {}",
            value, format, e
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date_respects_format() {
        assert_eq!(
            parse_date("2024-03-01", "%Y-%m-%d").unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
        );
        assert_eq!(
            parse_date("01/03/2024", "%d/%m/%Y").unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
        );
        assert!(parse_date("March 1st", "%Y-%m-%d").is_err());
    }

    #[test]
    fn test_overrides_replace_config_values() {
        let mut config = Config::default();
        let options = GenerateOptions {
            repo: Some("https://github.com/acme/repo.git".to_string()),
            authors: vec!["alice@example.com".to_string()],
            start_date: Some("2024-03-01".to_string()),
            end_date: Some("2024-03-31".to_string()),
            person: Some("first".to_string()),
            ..Default::default()
        };

        apply_overrides(&mut config, &options).unwrap();
        assert_eq!(config.repo.location, "https://github.com/acme/repo.git");
        assert_eq!(config.filter.authors, vec!["alice@example.com"]);
        assert_eq!(
            config.filter.start_date,
            NaiveDate::from_ymd_opt(2024, 3, 1)
        );
        assert_eq!(config.output.grammatical_person, "first");
    }
}
