//! Pipeline Orchestration
//!
//! One run: validate configuration, extract commits, reduce daily → weekly
//! → monthly, generate monthly narratives (concurrent fan-out), build the
//! resume prompt, and parse the provider's JSON into a `CvDocument`.
//!
//! Expensive stages are wrapped in the artifact file cache keyed by the run
//! fingerprint, so re-running against an unchanged repository and
//! configuration costs no extraction and no LLM calls.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use super::cancel::CancelToken;
use super::response::extract_json;
use crate::ai::{Generator, PromptBuilder, ResumeContext};
use crate::cache::{FileCache, run_fingerprint};
use crate::config::{Config, ConfigLoader};
use crate::constants;
use crate::detector::TechnologyDetector;
use crate::git::{CommitExtractor, CommitFilter};
use crate::summarizer::SummarizerChain;
use crate::types::{CvDocument, CvError, DateRange, PeriodSummary, Result, ResumePayload};

/// The summarization-and-generation pipeline for one repository.
pub struct Pipeline {
    config: Config,
    extractor: CommitExtractor,
    detector: TechnologyDetector,
    generator: Generator,
    artifacts: FileCache,
}

impl Pipeline {
    pub fn new(config: Config, generator: Generator) -> Result<Self> {
        let timezone = config.filter.timezone_offset()?;
        let scratch = ConfigLoader::global_cache_dir()
            .unwrap_or_else(|| PathBuf::from(".commitcv/scratch"));

        Ok(Self {
            extractor: CommitExtractor::new(timezone, scratch),
            detector: TechnologyDetector::new(),
            generator,
            artifacts: FileCache::new(&config.cache.artifacts_dir),
            config,
        })
    }

    /// Run the full pipeline. Validation failures surface before any LLM
    /// cost; provider failures after retry exhaustion abort the run but
    /// leave already-cached months intact for the next attempt.
    pub async fn run(&self, cancel: CancelToken) -> Result<CvDocument> {
        if cancel.is_cancelled() {
            return Err(CvError::Cancelled);
        }

        // Stage 0: input validation, before the repository is even opened.
        let builder = PromptBuilder::new(
            &self.config.output.target_language,
            &self.config.output.grammatical_person,
        )?;
        let filter = self.commit_filter()?;

        // Stage 1: repository state pins the run fingerprint.
        let location = self.config.repo.location.clone();
        let head_time = self.extractor.head_commit_time(&location)?;
        let fingerprint = self.fingerprint(&head_time);
        info!(%location, %fingerprint, "starting CV generation run");

        // Stages 2-3: extraction and hierarchical summarization.
        let months: Vec<PeriodSummary> = self
            .artifacts
            .load_or_compute("summaries", &fingerprint, move || {
                self.summarize(location, filter)
            })
            .await?;

        if cancel.is_cancelled() {
            return Err(CvError::Cancelled);
        }

        // Stages 4-5: narrative generation and resume synthesis.
        let token = cancel.clone();
        self.artifacts
            .load_or_compute("cv", &fingerprint, move || {
                self.generate_cv(months, builder, token)
            })
            .await
    }

    /// Stage the provider health check for status-style commands.
    pub async fn health_check(&self) -> bool {
        self.generator.health_check().await
    }

    // =========================================================================
    // Stages
    // =========================================================================

    async fn summarize(
        &self,
        location: String,
        filter: CommitFilter,
    ) -> Result<Vec<PeriodSummary>> {
        let commits = self.extractor.extract(&location, &filter)?;
        if commits.is_empty() {
            return Err(CvError::Config(
                "no commits matched the configured filters".to_string(),
            ));
        }

        // The bucketing range: configured window, or the extremes of the
        // extracted history.
        let timezone = self.config.filter.timezone_offset()?;
        let range = match (filter.start_date, filter.end_date) {
            (Some(start), Some(end)) => DateRange::new(start, end)?,
            _ => {
                let first = commits[0].timestamp.with_timezone(&timezone).date_naive();
                let last = commits[commits.len() - 1]
                    .timestamp
                    .with_timezone(&timezone)
                    .date_naive();
                DateRange::new(
                    filter.start_date.unwrap_or(first),
                    filter.end_date.unwrap_or(last),
                )?
            }
        };

        let chain = SummarizerChain::new(&self.detector, timezone);
        let months = chain.run(commits, range);
        info!(months = months.len(), "summarization complete");
        Ok(months)
    }

    async fn generate_cv(
        &self,
        mut months: Vec<PeriodSummary>,
        builder: PromptBuilder,
        cancel: CancelToken,
    ) -> Result<CvDocument> {
        // Concurrent fan-out: one narrative per non-empty month. The cache
        // collapses repeated envelopes, so this is safe to re-run.
        let tasks: Vec<(usize, crate::ai::PromptEnvelope)> = months
            .iter()
            .enumerate()
            .filter(|(_, month)| !month.is_empty())
            .map(|(index, month)| (index, builder.monthly_narrative(month)))
            .collect();

        info!(narratives = tasks.len(), "generating monthly narratives");
        let generator = &self.generator;
        let fanout = async move {
            let mut stream = stream::iter(tasks.into_iter().map(move |(index, envelope)| {
                async move {
                    let response = generator.generate(&envelope).await?;
                    Ok::<_, CvError>((index, response.text))
                }
            }))
            .buffer_unordered(constants::pipeline::NARRATIVE_CONCURRENCY);

            let mut narratives = Vec::new();
            while let Some(result) = stream.next().await {
                narratives.push(result?);
            }
            Ok::<_, CvError>(narratives)
        };

        for (index, text) in race_cancel(&cancel, fanout).await? {
            months[index].narrative = Some(text.trim().to_string());
        }

        // Resume synthesis over the full summary tree.
        let context = self.resume_context(&months);
        let envelope = builder.resume(&months, &context);
        let response = race_cancel(&cancel, self.generator.generate(&envelope)).await?;

        let payload: ResumePayload = serde_json::from_value(extract_json(&response.text)?)
            .map_err(|e| CvError::MalformedResponse(format!("CV payload: {}", e)))?;

        let technologies = total_technologies(&months);
        Ok(CvDocument::from_payload(
            payload,
            self.config.output.author_name.clone(),
            technologies,
        ))
    }

    /// Repository-level context for the resume prompt. Failures here only
    /// degrade prompt quality, so they are logged and tolerated.
    fn resume_context(&self, months: &[PeriodSummary]) -> ResumeContext {
        let location = &self.config.repo.location;

        let mut totals = crate::types::TechnologySet::new();
        for month in months {
            totals.merge(&month.technologies);
        }
        let mut ranked: Vec<(String, u32)> =
            totals.iter().map(|(n, c)| (n.to_string(), c)).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        let main_technologies: Vec<String> = ranked
            .into_iter()
            .take(constants::pipeline::PROJECT_CONTEXT_TECHS)
            .map(|(name, _)| name)
            .collect();

        let project_structure = self.extractor.project_structure(location).unwrap_or_else(|e| {
            warn!(error = %e, "could not read project structure");
            String::new()
        });

        let readme_excerpt = match self.extractor.readme_files(location) {
            Ok(readmes) => {
                let mut excerpt: String = readmes.values().cloned().collect::<Vec<_>>().join("\n---\n");
                excerpt.truncate(
                    excerpt
                        .char_indices()
                        .nth(constants::pipeline::MAX_README_CHARS)
                        .map(|(idx, _)| idx)
                        .unwrap_or(excerpt.len()),
                );
                excerpt
            }
            Err(e) => {
                warn!(error = %e, "could not read README files");
                String::new()
            }
        };

        ResumeContext {
            main_technologies,
            project_structure,
            readme_excerpt,
        }
    }

    // =========================================================================
    // Run identity
    // =========================================================================

    fn commit_filter(&self) -> Result<CommitFilter> {
        let filter = &self.config.filter;
        // Surfaces InvalidDateRange before anything else runs.
        filter.date_range()?;

        Ok(CommitFilter {
            branches: self.config.repo.branches.clone(),
            authors: filter.authors.clone(),
            start_date: filter.start_date,
            end_date: filter.end_date,
            ignore_keywords: filter.ignore_keywords.clone(),
            min_message_len: filter.min_message_len,
        })
    }

    /// Hash of everything that shapes the output: filters, provider/model,
    /// prompt configuration, and the repository head state.
    fn fingerprint(&self, head_time: &DateTime<Utc>) -> String {
        let cfg = &self.config;
        let parts: Vec<String> = vec![
            cfg.repo.location.clone(),
            cfg.repo.branches.join(","),
            cfg.filter.authors.join(","),
            cfg.filter.start_date.map(|d| d.to_string()).unwrap_or_default(),
            cfg.filter.end_date.map(|d| d.to_string()).unwrap_or_default(),
            cfg.filter.ignore_keywords.join(","),
            cfg.filter.timezone.clone(),
            self.generator.provider_name().to_string(),
            self.generator.model().to_string(),
            cfg.output.target_language.clone(),
            cfg.output.grammatical_person.clone(),
            head_time.timestamp().to_string(),
        ];
        let refs: Vec<&str> = parts.iter().map(String::as_str).collect();
        run_fingerprint(&refs)
    }
}

/// Aggregate technology weights across all months.
fn total_technologies(months: &[PeriodSummary]) -> BTreeMap<String, f64> {
    let mut totals = crate::types::TechnologySet::new();
    for month in months {
        totals.merge(&month.technologies);
    }
    totals.percentages()
}

/// Race a stage against run cancellation. Dropping the stage future aborts
/// any in-flight provider call without committing a cache entry.
async fn race_cancel<T>(
    cancel: &CancelToken,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    let mut token = cancel.clone();
    tokio::select! {
        _ = token.cancelled() => Err(CvError::Cancelled),
        result = fut => result,
    }
}
