//! CV Output Types
//!
//! The fully populated data structure handed to the exporter layer. Exporters
//! (Markdown, PDF, LinkedIn, …) are external consumers; this crate serializes
//! the document as JSON.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One experience block in the generated CV.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CvEntry {
    /// Employer, client, or project the work belongs to
    pub name: String,
    /// Professional title or role (e.g. "Backend Developer")
    pub position: String,
    /// Short milestone or project name
    pub title: String,
    pub description: String,
    /// Knowledge domain (e.g. "DevOps", "Data Integration")
    pub domain: String,
    /// Technology name -> relative weight in percent
    #[serde(default)]
    pub technologies: BTreeMap<String, f64>,
    /// `YYYY-MM`
    pub date_start: String,
    /// `YYYY-MM`
    pub date_end: String,
    #[serde(default)]
    pub highlights: Vec<String>,
}

/// The complete CV handed to the exporter layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CvDocument {
    pub author_name: String,
    /// Summarized overview of the whole CV
    pub extract: String,
    /// One-paragraph description of the project as a whole
    #[serde(default)]
    pub project_description: String,
    pub entries: Vec<CvEntry>,
    /// Aggregated technology weights across the entire extraction window
    #[serde(default)]
    pub technologies: BTreeMap<String, f64>,
}

/// Shape of the model's resume response before it is joined with run
/// metadata into a `CvDocument`.
#[derive(Debug, Clone, Deserialize)]
pub struct ResumePayload {
    pub extract: String,
    #[serde(default)]
    pub project_description: String,
    #[serde(default)]
    pub cv: Vec<CvEntry>,
}

impl CvDocument {
    pub fn from_payload(
        payload: ResumePayload,
        author_name: impl Into<String>,
        technologies: BTreeMap<String, f64>,
    ) -> Self {
        Self {
            author_name: author_name.into(),
            extract: payload.extract,
            project_description: payload.project_description,
            entries: payload.cv,
            technologies,
        }
    }
}
