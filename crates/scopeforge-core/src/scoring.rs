//! Maturity scoring.
//!
//! [`score`] is a pure function of the reconciled draft, the retrieval
//! result, and [`ScoringParams`]:
//!
//! ```text
//! score = 100
//!       - Σ deduction(gap.severity)              (floored at 0)
//!       - no_precedent_penalty, if retrieval is empty or its
//!         top similarity is below the threshold  (floored at 0)
//! ```
//!
//! Status is derived from the final score alone via [`status_for`].

use serde::{Deserialize, Serialize};

use crate::models::{
    AssessmentBasis, MaturityAssessment, MaturityStatus, ReconciledDraft, RetrievalResult,
    Severity,
};

/// Starting score before deductions.
pub const BASE_SCORE: u32 = 100;
/// Lowest score that maps to [`MaturityStatus::Ready`].
pub const READY_THRESHOLD: u32 = 80;
/// Lowest score that maps to [`MaturityStatus::NeedsDetail`].
pub const NEEDS_DETAIL_THRESHOLD: u32 = 50;

/// Deduction amounts and the precedent threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringParams {
    pub high_deduction: u32,
    pub medium_deduction: u32,
    pub low_deduction: u32,
    pub no_precedent_penalty: u32,
    /// Top similarity below this counts as "no precedent".
    pub similarity_threshold: f32,
}

impl Default for ScoringParams {
    fn default() -> Self {
        Self {
            high_deduction: 15,
            medium_deduction: 8,
            low_deduction: 3,
            no_precedent_penalty: 20,
            similarity_threshold: 0.5,
        }
    }
}

impl ScoringParams {
    pub fn deduction(&self, severity: Severity) -> u32 {
        match severity {
            Severity::High => self.high_deduction,
            Severity::Medium => self.medium_deduction,
            Severity::Low => self.low_deduction,
        }
    }

    /// Whether the retrieval result fails to supply usable precedent.
    pub fn lacks_precedent(&self, retrieval: &RetrievalResult) -> bool {
        match retrieval.top_similarity() {
            None => true,
            Some(top) => top < self.similarity_threshold,
        }
    }
}

/// Map a final score to its status.
pub fn status_for(score: u32) -> MaturityStatus {
    if score >= READY_THRESHOLD {
        MaturityStatus::Ready
    } else if score >= NEEDS_DETAIL_THRESHOLD {
        MaturityStatus::NeedsDetail
    } else {
        MaturityStatus::HighRisk
    }
}

/// Score a reconciled draft against its retrieval result.
pub fn score(
    merged: &ReconciledDraft,
    retrieval: &RetrievalResult,
    params: &ScoringParams,
) -> MaturityAssessment {
    let mut value = BASE_SCORE;
    for gap in &merged.draft.gaps {
        value = value.saturating_sub(params.deduction(gap.severity));
    }

    let no_precedent = params.lacks_precedent(retrieval);
    if no_precedent {
        value = value.saturating_sub(params.no_precedent_penalty);
    }

    MaturityAssessment {
        score: value,
        status: status_for(value),
        gaps: merged.draft.gaps.clone(),
        basis: AssessmentBasis {
            chunk_ids: retrieval.chunk_ids(),
            providers: merged.providers.clone(),
            top_similarity: retrieval.top_similarity(),
            no_precedent,
        },
    }
}
