//! `sfg evaluate`: produce a text for each example's input and compare it
//! with the example's expected output.
//!
//! In [`EvaluationMode::Generate`] the text is the merged draft followed
//! by its content framework. In [`EvaluationMode::AutoRef`] no provider is
//! called: the text is the expected output of the closest document in the
//! knowledge base, which measures how well retrieval alone recovers a
//! known answer.

use anyhow::anyhow;
use serde::Serialize;

use scopeforge_core::evaluate::{draft_text, EvaluationMetrics};

use crate::embedding::embed_one;
use crate::orchestrator::Analyzer;
use crate::seed::Example;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluationMode {
    Generate,
    AutoRef,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExampleEvaluation {
    pub name: String,
    #[serde(flatten)]
    pub metrics: Option<EvaluationMetrics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExampleEvaluation {
    pub fn passed(&self) -> bool {
        self.metrics.as_ref().map(|m| m.pass).unwrap_or(false)
    }
}

/// Evaluate every example with non-empty input. One failure does not stop the run.
pub async fn evaluate_examples(
    analyzer: &Analyzer,
    examples: &[Example],
    mode: EvaluationMode,
) -> Vec<ExampleEvaluation> {
    let mut results = Vec::new();
    for ex in examples.iter().filter(|e| !e.input.trim().is_empty()) {
        let outcome = evaluate_one(analyzer, ex, mode).await;
        match &outcome {
            Ok(m) => tracing::info!(
                example = %ex.name,
                cosine = m.cosine_similarity,
                overlap = m.token_overlap,
                pass = m.pass,
                "evaluated"
            ),
            Err(e) => tracing::warn!(example = %ex.name, "evaluation failed: {:#}", e),
        }
        results.push(match outcome {
            Ok(m) => ExampleEvaluation {
                name: ex.name.clone(),
                metrics: Some(m),
                error: None,
            },
            Err(e) => ExampleEvaluation {
                name: ex.name.clone(),
                metrics: None,
                error: Some(format!("{:#}", e)),
            },
        });
    }
    results
}

async fn generated_text(analyzer: &Analyzer, ex: &Example) -> anyhow::Result<String> {
    let analysis = analyzer.analyze(&ex.input).await?;
    let mut text = draft_text(&analysis.draft);
    // The framework enriches the comparison but is not required for it.
    match analyzer.frame(&ex.input, &analysis.draft).await {
        Ok(f) => {
            let framework = f.framework.to_text();
            if !framework.is_empty() {
                text.push_str("\n\n");
                text.push_str(&framework);
            }
        }
        Err(e) => tracing::warn!(example = %ex.name, "framework skipped: {}", e),
    }
    Ok(text)
}

async fn evaluate_one(
    analyzer: &Analyzer,
    ex: &Example,
    mode: EvaluationMode,
) -> anyhow::Result<EvaluationMetrics> {
    let kb = analyzer.knowledge_base();
    let generated = match mode {
        EvaluationMode::Generate => generated_text(analyzer, ex).await?,
        EvaluationMode::AutoRef => kb
            .best_expected_output(&ex.input)
            .await?
            .ok_or_else(|| anyhow!("no knowledge-base document matches the input"))?,
    };
    let embedder = kb.embedder();
    let gen_vec = embed_one(embedder, &generated).await?;
    let exp_vec = embed_one(embedder, &ex.output).await?;
    Ok(EvaluationMetrics::compare(
        &generated, &ex.output, &gen_vec, &exp_vec,
    ))
}
