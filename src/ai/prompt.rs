//! Prompt Builder
//!
//! Renders provider-agnostic prompt envelopes from period summaries and
//! configuration. Building is a pure function: identical summaries and
//! identical configuration always yield byte-identical envelopes — the
//! envelope's canonical serialization is the input to cache-key derivation,
//! so any nondeterminism here would defeat the response cache.

use serde::{Deserialize, Serialize};

use crate::types::{CvError, PeriodSummary, Result};

// =============================================================================
// Grammatical Person
// =============================================================================

/// Voice the generated text is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GrammaticalPerson {
    First,
    Third,
}

impl GrammaticalPerson {
    /// Parse a configured value; anything outside the recognized set fails
    /// with `UnsupportedPerson`.
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "first" => Ok(Self::First),
            "third" => Ok(Self::Third),
            other => Err(CvError::UnsupportedPerson(other.to_string())),
        }
    }

    fn guidance(&self) -> &'static str {
        match self {
            Self::First => {
                "Write in active first person (\"I developed a platform...\"), using \
                 \"I\"/\"my\" consistently to describe the work."
            }
            Self::Third => {
                "Write in passive or impersonal third person (\"They developed a \
                 platform...\" or \"A platform was developed...\")."
            }
        }
    }
}

impl std::fmt::Display for GrammaticalPerson {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::First => write!(f, "first"),
            Self::Third => write!(f, "third"),
        }
    }
}

// =============================================================================
// Prompt Envelope
// =============================================================================

/// What a prompt asks the model to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptKind {
    /// Plain-text narrative for one month of activity
    MonthlyNarrative,
    /// Strict-JSON CV over all monthly summaries
    Resume,
}

/// Provider-independent request. Field order is fixed; `canonical_bytes` is
/// the deterministic serialization used for cache-key derivation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptEnvelope {
    pub kind: PromptKind,
    /// System persona
    pub role: String,
    /// Task instructions
    pub instructions: String,
    /// Content body (summaries, context)
    pub body: String,
    pub target_language: String,
    pub person: GrammaticalPerson,
}

impl PromptEnvelope {
    /// Deterministic serialization for fingerprinting.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        // Struct serialization order is fixed; this cannot realistically
        // fail for plain strings.
        serde_json::to_vec(self).unwrap_or_default()
    }

    /// Flattened single-prompt form for providers without role separation.
    pub fn flattened(&self) -> String {
        format!("{}\n\n{}\n\n{}", self.role, self.instructions, self.body)
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Repository-level context woven into the resume prompt.
#[derive(Debug, Clone, Default)]
pub struct ResumeContext {
    /// Dominant technologies across the extraction window
    pub main_technologies: Vec<String>,
    /// First-level tree listing
    pub project_structure: String,
    /// Truncated root README content
    pub readme_excerpt: String,
}

const ROLE: &str =
    "You are an expert in software development with mastery of all technologies.";

pub struct PromptBuilder {
    target_language: String,
    person: GrammaticalPerson,
}

impl PromptBuilder {
    /// Validates the configured language and person. The language set is
    /// open (any name the downstream model accepts), so only blank values
    /// are rejected.
    pub fn new(target_language: &str, person: &str) -> Result<Self> {
        let language = target_language.trim();
        if language.is_empty() {
            return Err(CvError::UnsupportedLanguage(target_language.to_string()));
        }
        Ok(Self {
            target_language: language.to_lowercase(),
            person: GrammaticalPerson::parse(person)?,
        })
    }

    pub fn person(&self) -> GrammaticalPerson {
        self.person
    }

    /// Envelope asking for a plain-text narrative of one month's activity.
    pub fn monthly_narrative(&self, month: &PeriodSummary) -> PromptEnvelope {
        let instructions = format!(
            "The following is a collection of commit messages corresponding to a \
             specific month.\n\
             Summarize the information in clear, concise language, highlighting the \
             key technical and functional milestones.\n\
             Avoid excessive detail or mentions of individual files.\n\
             Do not exceed 450 characters.\n\
             Respond in {language}, in plain text, and start the summary directly \
             without headers such as 'During this month'.",
            language = self.target_language
        );

        let mut body = format!(
            "Month: {}\nTotal commits: {}\nTechnologies: {}\nCommit messages:\n",
            month.period.label(),
            month.commit_count,
            format_technologies(month)
        );
        for message in month.commit_messages() {
            body.push_str("  - ");
            body.push_str(&message.replace('\n', " "));
            body.push('\n');
        }

        PromptEnvelope {
            kind: PromptKind::MonthlyNarrative,
            role: ROLE.to_string(),
            instructions,
            body,
            target_language: self.target_language.clone(),
            person: self.person,
        }
    }

    /// Envelope asking for the final CV as strict JSON.
    pub fn resume(&self, months: &[PeriodSummary], context: &ResumeContext) -> PromptEnvelope {
        let main_technologies = if context.main_technologies.is_empty() {
            "not defined".to_string()
        } else {
            context.main_technologies.join(", ")
        };

        let instructions = format!(
            r#"Below, enclosed in ^^^, is a monthly chronological summary of the commits made by a developer.

Your task is:
- Summarize the technical achievements and tasks performed, grouping information by functional areas or projects.
- Use the technologies and their weights (field: "Technologies") provided in the input without recalculating or inferring additional ones.
- Consolidate projects that span multiple months into a single block, with "date_start" on the first month of activity and "date_end" on the last.
- Generate a professional CV structure in JSON format strictly using the following shape:
{{
  "extract": "Summarized overview of the CV, highlighting the most relevant skills, achievements, and experiences",
  "project_description": "Describes the project as a whole, taking into account that the main technologies are {main_technologies}",
  "cv": [
    {{
      "name": "Employer, client, or specific project worked on",
      "position": "Professional title or role (e.g. 'Backend Developer')",
      "title": "Brief name of the milestone or project",
      "description": "Detailed description of the project, milestone, or position",
      "domain": "Knowledge domain (e.g. E-Commerce, DevOps, API, Data Analytics, AI, Testing)",
      "technologies": {{"Technology name": 40}},
      "date_start": "YYYY-MM",
      "date_end": "YYYY-MM",
      "highlights": ["Specific accomplishment or result achieved in this project"]
    }}
  ]
}}

IMPORTANT:
- Write all response content, including JSON strings, in "{language}".
- Keep technology names consistent (always "PHP", never "Php").
- Format dates strictly as "YYYY-MM".
- {person_guidance}
- "highlights" holds a short list of the most relevant achievements, concise and impactful, focusing on measurable results.
- If the input contains irrelevant or unclear information, process only the meaningful content.

Respond with nothing but the JSON object: no delimiters (such as ```json), no additional commentary, and not the word 'json'."#,
            main_technologies = main_technologies,
            language = self.target_language,
            person_guidance = self.person.guidance(),
        );

        let mut body = String::from("^^^\n");
        for month in months {
            if month.is_empty() {
                body.push_str(&format!(
                    "Month: {} (no recorded activity)\n\n",
                    month.period.label()
                ));
                continue;
            }
            body.push_str(&format!(
                "Month: {}\nTotal commits: {}\nTechnologies: {}\nSummary:\n",
                month.period.label(),
                month.commit_count,
                format_technologies(month)
            ));
            match &month.narrative {
                Some(narrative) => {
                    body.push_str(narrative.trim());
                    body.push('\n');
                }
                None => {
                    for message in month.commit_messages() {
                        body.push_str("  - ");
                        body.push_str(&message.replace('\n', " "));
                        body.push('\n');
                    }
                }
            }
            body.push('\n');
        }
        body.push_str("^^^\n");

        if !context.project_structure.is_empty() {
            body.push_str(&format!(
                "\nProject structure (first level):\n{}\n",
                context.project_structure
            ));
        }
        if !context.readme_excerpt.is_empty() {
            body.push_str(&format!("\nProject README excerpt:\n{}\n", context.readme_excerpt));
        }

        PromptEnvelope {
            kind: PromptKind::Resume,
            role: ROLE.to_string(),
            instructions,
            body,
            target_language: self.target_language.clone(),
            person: self.person,
        }
    }
}

/// `Rust 66.67%, Docker 33.33%` — stable, name-ordered weight listing.
fn format_technologies(summary: &PeriodSummary) -> String {
    let percentages = summary.technologies.percentages();
    if percentages.is_empty() {
        return "none detected".to_string();
    }
    percentages
        .iter()
        .map(|(name, pct)| format!("{} {:.2}%", name, pct))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    use crate::types::{CommitRecord, Period};

    fn march_summary() -> PeriodSummary {
        let period = Period::month_of(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        let mut summary = PeriodSummary::empty(period);
        summary.commit_count = 2;
        summary.technologies.record("Rust", 2);
        summary.technologies.record("Docker", 1);
        summary.commits = vec![CommitRecord {
            hash: "c1".into(),
            author_name: "Alice".into(),
            author_email: "alice@example.com".into(),
            timestamp: chrono::Utc::now(),
            message: "Implement extraction pipeline".into(),
            files: vec![],
            branch: "main".into(),
        }];
        summary
    }

    #[test]
    fn test_person_parsing() {
        assert_eq!(
            GrammaticalPerson::parse("First").unwrap(),
            GrammaticalPerson::First
        );
        assert_eq!(
            GrammaticalPerson::parse(" third ").unwrap(),
            GrammaticalPerson::Third
        );
        assert!(matches!(
            GrammaticalPerson::parse("second"),
            Err(CvError::UnsupportedPerson(_))
        ));
    }

    #[test]
    fn test_blank_language_rejected() {
        assert!(matches!(
            PromptBuilder::new("  ", "third"),
            Err(CvError::UnsupportedLanguage(_))
        ));
    }

    // Byte-identical envelopes for identical inputs: the property the cache
    // key depends on.
    #[test]
    fn test_builder_is_deterministic() {
        let builder = PromptBuilder::new("english", "third").unwrap();
        let summary = march_summary();

        let a = builder.monthly_narrative(&summary);
        let b = builder.monthly_narrative(&summary);
        assert_eq!(a, b);
        assert_eq!(a.canonical_bytes(), b.canonical_bytes());

        let context = ResumeContext {
            main_technologies: vec!["Rust".into()],
            project_structure: "[FILE] Cargo.toml".into(),
            readme_excerpt: "A demo".into(),
        };
        let ra = builder.resume(std::slice::from_ref(&summary), &context);
        let rb = builder.resume(std::slice::from_ref(&summary), &context);
        assert_eq!(ra.canonical_bytes(), rb.canonical_bytes());
    }

    #[test]
    fn test_envelopes_differ_by_content() {
        let builder = PromptBuilder::new("english", "third").unwrap();
        let summary = march_summary();
        let mut other = march_summary();
        other.commit_count = 5;

        assert_ne!(
            builder.monthly_narrative(&summary).canonical_bytes(),
            builder.monthly_narrative(&other).canonical_bytes()
        );
    }

    #[test]
    fn test_monthly_narrative_contents() {
        let builder = PromptBuilder::new("spanish", "first").unwrap();
        let envelope = builder.monthly_narrative(&march_summary());

        assert_eq!(envelope.kind, PromptKind::MonthlyNarrative);
        assert!(envelope.body.contains("Month: 2024-03"));
        assert!(envelope.body.contains("Total commits: 2"));
        assert!(envelope.body.contains("Docker 33.33%, Rust 66.67%"));
        assert!(envelope.body.contains("- Implement extraction pipeline"));
        assert!(envelope.instructions.contains("spanish"));
    }

    #[test]
    fn test_resume_includes_context_and_person() {
        let builder = PromptBuilder::new("english", "first").unwrap();
        let mut summary = march_summary();
        summary.narrative = Some("Built the extraction pipeline.".into());

        let context = ResumeContext {
            main_technologies: vec!["Rust".into(), "Docker".into()],
            project_structure: "[DIR] src".into(),
            readme_excerpt: "The demo project".into(),
        };
        let envelope = builder.resume(&[summary], &context);

        assert_eq!(envelope.kind, PromptKind::Resume);
        assert!(envelope.instructions.contains("Rust, Docker"));
        assert!(envelope.instructions.contains("first person"));
        assert!(envelope.body.contains("Built the extraction pipeline."));
        assert!(envelope.body.contains("[DIR] src"));
        assert!(envelope.body.contains("The demo project"));
    }

    #[test]
    fn test_empty_month_visible_in_resume_body() {
        let builder = PromptBuilder::new("english", "third").unwrap();
        let empty =
            PeriodSummary::empty(Period::month_of(NaiveDate::from_ymd_opt(2024, 4, 1).unwrap()));
        let envelope = builder.resume(&[empty], &ResumeContext::default());
        assert!(envelope.body.contains("Month: 2024-04 (no recorded activity)"));
    }
}
