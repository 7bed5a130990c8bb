//! Comparison metrics between a generated draft and an expected document.

use std::collections::HashSet;

use serde::Serialize;

use crate::embedding::cosine_similarity;
use crate::models::Draft;

/// Marker that opens the input half of a seeded example document.
pub const INPUT_MARKER: &str = "INPUT:\n";
/// Marker that opens the expected-output half of a seeded example document.
pub const EXPECTED_OUTPUT_MARKER: &str = "EXPECTED_OUTPUT:\n";

/// Cosine at or above this passes.
pub const PASS_COSINE: f32 = 0.80;
/// Token overlap at or above this passes.
pub const PASS_OVERLAP: f64 = 0.50;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationMetrics {
    pub cosine_similarity: f32,
    pub token_overlap: f64,
    pub pass: bool,
}

impl EvaluationMetrics {
    pub fn new(cosine_similarity: f32, token_overlap: f64) -> Self {
        Self {
            cosine_similarity,
            token_overlap,
            pass: cosine_similarity >= PASS_COSINE || token_overlap >= PASS_OVERLAP,
        }
    }

    /// Build metrics from the two texts' embeddings and raw text.
    pub fn compare(generated: &str, expected: &str, gen_vec: &[f32], exp_vec: &[f32]) -> Self {
        Self::new(
            cosine_similarity(gen_vec, exp_vec),
            token_overlap(generated, expected),
        )
    }
}

/// Jaccard overlap of lowercase whitespace-separated tokens.
pub fn token_overlap(a: &str, b: &str) -> f64 {
    let ta: HashSet<String> = a.split_whitespace().map(str::to_lowercase).collect();
    let tb: HashSet<String> = b.split_whitespace().map(str::to_lowercase).collect();
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }
    let inter = ta.intersection(&tb).count();
    let union = ta.union(&tb).count();
    inter as f64 / union as f64
}

/// Text after the first [`EXPECTED_OUTPUT_MARKER`], or the whole
/// document when the marker is absent.
pub fn expected_output_of(document: &str) -> &str {
    match document.split_once(EXPECTED_OUTPUT_MARKER) {
        Some((_, expected)) => expected,
        None => document,
    }
}

/// Flatten a draft into plain text, one `name:` header per section.
pub fn draft_text(draft: &Draft) -> String {
    draft
        .sections
        .iter()
        .map(|(name, text)| format!("{}:\n{}", name, text))
        .collect::<Vec<_>>()
        .join("\n\n")
}
