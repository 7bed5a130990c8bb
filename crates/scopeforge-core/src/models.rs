//! Core data models used throughout ScopeForge.
//!
//! These types represent the chunks, retrieval results, drafts, and
//! assessments that flow through the ingestion and analysis pipeline.
//! Everything the export collaborator consumes is plain `serde` data.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A unit of ingested text plus its embedding.
///
/// Immutable once inserted. A later ingest under the same `document_key`
/// hides (soft-replaces) older chunks instead of mutating them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub id: String,
    pub source_project_id: String,
    /// Origin of the text, e.g. `"example"`, `"document"`, `"feedback"`.
    pub source_type: String,
    /// Logical document this chunk belongs to.
    pub document_key: String,
    /// Ingest call that produced this chunk.
    pub ingest_id: String,
    pub chunk_index: i64,
    pub text: String,
    #[serde(skip_serializing, default)]
    pub embedding: Vec<f32>,
    pub tags: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
    /// SHA-256 of `text`.
    pub hash: String,
}

/// Caller-supplied context for an ingest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestMetadata {
    pub project_id: String,
    pub source_type: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Reusing a key soft-replaces the previous ingest. `None` generates a fresh key.
    #[serde(default)]
    pub document_key: Option<String>,
}

impl IngestMetadata {
    pub fn new(project_id: impl Into<String>, source_type: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            source_type: source_type.into(),
            tags: BTreeSet::new(),
            document_key: None,
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn with_document_key(mut self, key: impl Into<String>) -> Self {
        self.document_key = Some(key.into());
        self
    }
}

/// One retrieved chunk and its similarity to the query, in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalHit {
    pub chunk: DocumentChunk,
    pub similarity: f32,
}

/// Hits sorted by non-increasing similarity. May be empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub hits: Vec<RetrievalHit>,
}

impl RetrievalResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn top_similarity(&self) -> Option<f32> {
        self.hits.first().map(|h| h.similarity)
    }

    pub fn chunk_ids(&self) -> Vec<String> {
        self.hits.iter().map(|h| h.chunk.id.clone()).collect()
    }
}

/// Area of project information a gap refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapCategory {
    Navigation,
    Feature,
    Stakeholder,
    Technical,
    ScopeBoundary,
}

impl GapCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            GapCategory::Navigation => "navigation",
            GapCategory::Feature => "feature",
            GapCategory::Stakeholder => "stakeholder",
            GapCategory::Technical => "technical",
            GapCategory::ScopeBoundary => "scope_boundary",
        }
    }
}

impl fmt::Display for GapCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GapCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm: String = s
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c == '-' || c == ' ' { '_' } else { c })
            .collect();
        match norm.as_str() {
            "navigation" => Ok(GapCategory::Navigation),
            "feature" => Ok(GapCategory::Feature),
            "stakeholder" => Ok(GapCategory::Stakeholder),
            "technical" => Ok(GapCategory::Technical),
            "scope_boundary" | "scope" => Ok(GapCategory::ScopeBoundary),
            _ => Err(format!("unknown gap category: '{}'", s)),
        }
    }
}

/// Gap severity. Ordered `Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" | "l" => Ok(Severity::Low),
            "medium" | "med" | "m" => Ok(Severity::Medium),
            "high" | "h" => Ok(Severity::High),
            _ => Err(format!("unknown severity: '{}'", s)),
        }
    }
}

/// A missing piece of project information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gap {
    pub category: GapCategory,
    pub description: String,
    pub severity: Severity,
}

impl Gap {
    pub fn new(category: GapCategory, description: impl Into<String>, severity: Severity) -> Self {
        Self {
            category,
            description: description.into(),
            severity,
        }
    }
}

/// Structured output of one reasoning provider.
///
/// `sections` is ordered by name so merged output is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
    pub sections: BTreeMap<String, String>,
    pub gaps: Vec<Gap>,
}

impl Draft {
    pub fn section(&self, name: &str) -> Option<&str> {
        self.sections.get(name).map(String::as_str)
    }
}

/// A draft tagged with the provider that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderDraft {
    pub provider: String,
    pub draft: Draft,
}

/// Output of the hybrid reconciliation step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciledDraft {
    pub draft: Draft,
    /// Providers whose drafts contributed, in slot order (A before B).
    pub providers: Vec<String>,
}

/// Verdict category derived from the maturity score alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaturityStatus {
    Ready,
    NeedsDetail,
    HighRisk,
}

impl fmt::Display for MaturityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MaturityStatus::Ready => "ready",
            MaturityStatus::NeedsDetail => "needs_detail",
            MaturityStatus::HighRisk => "high_risk",
        };
        f.write_str(s)
    }
}

/// What an assessment was based on, for auditability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentBasis {
    pub chunk_ids: Vec<String>,
    pub providers: Vec<String>,
    pub top_similarity: Option<f32>,
    /// True when the no-precedent penalty was applied.
    pub no_precedent: bool,
}

/// Scored verdict for one request. Immutable after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaturityAssessment {
    pub score: u32,
    pub status: MaturityStatus,
    pub gaps: Vec<Gap>,
    pub basis: AssessmentBasis,
}

/// Stakeholder feedback pushed back into the knowledge base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub project_id: String,
    pub reviewer_comment: String,
    #[serde(default)]
    pub reviewer: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl FeedbackRecord {
    pub fn new(project_id: impl Into<String>, reviewer_comment: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            reviewer_comment: reviewer_comment.into(),
            reviewer: None,
            timestamp: Utc::now(),
        }
    }
}
