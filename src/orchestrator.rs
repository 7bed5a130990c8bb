//! Request orchestration: retrieve, fan out to both reasoning providers,
//! reconcile, score.
//!
//! ```text
//! notes ─► retrieve ─► ┌─ provider A (timeout) ─┐
//!                      └─ provider B (timeout) ─┴─► reconcile ─► score
//! ```
//!
//! Providers A and B run concurrently under one deadline each. A timeout
//! or error in one slot degrades the request to the other slot's draft;
//! only when both slots produce nothing does the request fail with
//! `ProviderUnavailable`.
//!
//! The content-framework stage ([`Analyzer::frame`]) follows the same
//! shape for an accepted draft and is checked with `check_framework`.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use scopeforge_core::framework::{
    build_framework_prompt, reconcile_frameworks, ContentFramework, ProviderFramework,
};
use scopeforge_core::models::{Draft, MaturityAssessment, ProviderDraft, RetrievalResult};
use scopeforge_core::quality::{check_draft, check_framework, FrameworkReport, QualityReport};
use scopeforge_core::reasoning::{build_prompt, ReasoningProvider};
use scopeforge_core::reconcile::reconcile;
use scopeforge_core::scoring::{score, ScoringParams};
use scopeforge_core::{Error, Result};

use crate::config::{Config, ProviderConfig};
use crate::knowledge::KnowledgeBase;
use crate::providers::create_reasoning_provider;
use crate::trace::{TraceLog, TraceStep};

type SlotFuture<'a, T> = Pin<Box<dyn Future<Output = anyhow::Result<T>> + Send + 'a>>;

/// Everything one analysis request produced.
#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    pub draft: Draft,
    pub assessment: MaturityAssessment,
    pub retrieval: RetrievalResult,
    pub quality: QualityReport,
    /// Some step finished with a warning (missing precedent, a failed slot).
    pub degraded: bool,
    pub trace: Vec<TraceStep>,
}

/// Content framework for an accepted draft.
#[derive(Debug, Clone, Serialize)]
pub struct FrameworkAnalysis {
    pub framework: ContentFramework,
    pub providers: Vec<String>,
    pub quality: FrameworkReport,
    pub degraded: bool,
    pub trace: Vec<TraceStep>,
}

pub struct Analyzer {
    kb: Arc<KnowledgeBase>,
    provider_a: Option<Arc<dyn ReasoningProvider>>,
    provider_b: Option<Arc<dyn ReasoningProvider>>,
    timeout: Duration,
    params: ScoringParams,
}

fn build_slot(
    slot: &str,
    config: Option<&ProviderConfig>,
    timeout_ms: u64,
) -> Option<Arc<dyn ReasoningProvider>> {
    let config = config?;
    match create_reasoning_provider(config, timeout_ms) {
        Ok(p) => Some(p),
        Err(e) => {
            tracing::warn!(slot, kind = %config.kind, "reasoning provider unavailable: {:#}", e);
            None
        }
    }
}

impl Analyzer {
    pub fn new(
        kb: Arc<KnowledgeBase>,
        provider_a: Option<Arc<dyn ReasoningProvider>>,
        provider_b: Option<Arc<dyn ReasoningProvider>>,
        timeout: Duration,
        params: ScoringParams,
    ) -> Self {
        Self {
            kb,
            provider_a,
            provider_b,
            timeout,
            params,
        }
    }

    /// Build both provider slots from `[reasoning]`.
    ///
    /// A slot whose provider cannot be constructed (e.g. missing API key)
    /// is left empty and logged; requests then run in single-provider mode.
    pub fn from_config(config: &Config, kb: Arc<KnowledgeBase>) -> Self {
        let r = &config.reasoning;
        Self::new(
            kb,
            build_slot("provider_a", r.provider_a.as_ref(), r.timeout_ms),
            build_slot("provider_b", r.provider_b.as_ref(), r.timeout_ms),
            Duration::from_millis(r.timeout_ms),
            config.scoring_params(),
        )
    }

    pub fn knowledge_base(&self) -> &Arc<KnowledgeBase> {
        &self.kb
    }

    pub async fn analyze(&self, notes: &str) -> Result<Analysis> {
        self.analyze_traced(notes, &TraceLog::new()).await
    }

    /// Run one request, recording each step into `trace`.
    pub async fn analyze_traced(&self, notes: &str, trace: &TraceLog) -> Result<Analysis> {
        let retrieval = self.retrieve_step(notes, trace).await?;

        let prompt = build_prompt(notes);
        let (a, b) = tokio::join!(
            self.run_slot("provider_a", self.provider_a.as_ref(), trace, |p| {
                p.generate(&prompt, &retrieval)
            }),
            self.run_slot("provider_b", self.provider_b.as_ref(), trace, |p| {
                p.generate(&prompt, &retrieval)
            }),
        );
        let to_draft = |(provider, draft): (String, Draft)| ProviderDraft { provider, draft };
        let (a, b) = (a.map(to_draft), b.map(to_draft));

        let step = trace.start("reconcile");
        let merged = match (a, b) {
            (Err(ea), Err(eb)) => {
                let err = Error::unavailable(format!("provider_a: {}; provider_b: {}", ea, eb));
                step.fail(err.to_string());
                return Err(err);
            }
            (a, b) => {
                let merged = reconcile(a.ok(), b.ok())?;
                if merged.providers.len() == 1 {
                    step.warn(format!("single-provider mode: {}", merged.providers[0]));
                } else {
                    step.ok();
                }
                merged
            }
        };

        let step = trace.start("score");
        let assessment = score(&merged, &retrieval, &self.params);
        let quality = check_draft(&merged.draft);
        step.ok();
        tracing::info!(
            score = assessment.score,
            status = %assessment.status,
            gaps = assessment.gaps.len(),
            providers = ?assessment.basis.providers,
            "analysis complete"
        );

        Ok(Analysis {
            draft: merged.draft,
            assessment,
            retrieval,
            quality,
            degraded: trace.has_warnings(),
            trace: trace.steps(),
        })
    }

    pub async fn frame(&self, notes: &str, draft: &Draft) -> Result<FrameworkAnalysis> {
        self.frame_traced(notes, draft, &TraceLog::new()).await
    }

    /// Ask both slots for a content framework for `draft` and merge them.
    pub async fn frame_traced(
        &self,
        notes: &str,
        draft: &Draft,
        trace: &TraceLog,
    ) -> Result<FrameworkAnalysis> {
        let retrieval = self.retrieve_step(notes, trace).await?;

        let prompt = build_framework_prompt(draft, notes);
        let (a, b) = tokio::join!(
            self.run_slot("framework_a", self.provider_a.as_ref(), trace, |p| {
                p.frame(&prompt, &retrieval)
            }),
            self.run_slot("framework_b", self.provider_b.as_ref(), trace, |p| {
                p.frame(&prompt, &retrieval)
            }),
        );
        let to_framework = |(provider, framework): (String, ContentFramework)| {
            ProviderFramework { provider, framework }
        };
        let (a, b) = (a.map(to_framework), b.map(to_framework));

        let step = trace.start("reconcile_framework");
        let merged = match (a, b) {
            (Err(ea), Err(eb)) => {
                let err = Error::unavailable(format!("framework_a: {}; framework_b: {}", ea, eb));
                step.fail(err.to_string());
                return Err(err);
            }
            (a, b) => {
                let merged = reconcile_frameworks(a.ok(), b.ok())?;
                if merged.providers.len() == 1 {
                    step.warn(format!("single-provider mode: {}", merged.providers[0]));
                } else {
                    step.ok();
                }
                merged
            }
        };

        let step = trace.start("check_framework");
        let quality = check_framework(&merged.framework);
        if quality.complete {
            step.ok();
        } else {
            step.warn(format!("{} framework issue(s)", quality.issues.len()));
        }
        tracing::info!(
            pages = merged.framework.sitemap.len(),
            status = ?quality.status,
            providers = ?merged.providers,
            "framework complete"
        );

        Ok(FrameworkAnalysis {
            framework: merged.framework,
            providers: merged.providers,
            quality,
            degraded: trace.has_warnings(),
            trace: trace.steps(),
        })
    }

    async fn retrieve_step(&self, notes: &str, trace: &TraceLog) -> Result<RetrievalResult> {
        let step = trace.start("retrieve");
        match self.kb.retrieve(notes, self.kb.top_k()).await {
            Ok(r) => {
                if r.is_empty() {
                    step.warn("no precedent found");
                } else {
                    step.ok();
                }
                Ok(r)
            }
            Err(e) => {
                step.fail(e.to_string());
                Err(e)
            }
        }
    }

    /// Run one provider call for `slot` under the request deadline.
    ///
    /// Returns the provider's name with its output; a missing provider,
    /// an error, or a timeout is recorded as a warning and returned as
    /// a non-fatal error.
    async fn run_slot<'a, T>(
        &self,
        slot: &str,
        provider: Option<&'a Arc<dyn ReasoningProvider>>,
        trace: &TraceLog,
        call: impl FnOnce(&'a dyn ReasoningProvider) -> SlotFuture<'a, T>,
    ) -> Result<(String, T)> {
        let step = trace.start(slot);
        let Some(provider) = provider else {
            let err = Error::ProviderFailed {
                provider: slot.to_string(),
                message: "not configured".to_string(),
            };
            step.warn(err.to_string());
            return Err(err);
        };

        let name = provider.name().to_string();
        match tokio::time::timeout(self.timeout, call(&**provider)).await {
            Ok(Ok(output)) => {
                step.ok();
                Ok((name, output))
            }
            Ok(Err(e)) => {
                let err = Error::ProviderFailed {
                    provider: name,
                    message: format!("{:#}", e),
                };
                step.warn(err.to_string());
                Err(err)
            }
            Err(_) => {
                let err = Error::ProviderTimeout {
                    provider: name,
                    timeout_ms: self.timeout.as_millis() as u64,
                };
                step.warn(err.to_string());
                Err(err)
            }
        }
    }
}
