//! End-to-end analyzer tests with in-process reasoning providers.

use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use async_trait::async_trait;
use scopeforge::config::Config;
use scopeforge::index::VectorIndex;
use scopeforge::knowledge::KnowledgeBase;
use scopeforge::orchestrator::Analyzer;
use scopeforge::trace::{StepOutcome, TraceLog};
use scopeforge::core::embedding::HashedTermEmbedder;
use scopeforge::core::framework::{ContentFramework, PageDetail, SitemapItem};
use scopeforge::core::models::{
    Draft, FeedbackRecord, Gap, GapCategory, IngestMetadata, MaturityStatus, RetrievalResult,
    Severity,
};
use scopeforge::core::reasoning::ReasoningProvider;
use scopeforge::core::scoring::ScoringParams;
use scopeforge::core::store::memory::InMemoryChunkStore;
use scopeforge::core::quality::QualityStatus;
use scopeforge::core::ErrorKind;

const DIMS: usize = 64;

struct FixedProvider {
    name: &'static str,
    draft: Draft,
}

#[async_trait]
impl ReasoningProvider for FixedProvider {
    fn name(&self) -> &str {
        self.name
    }
    async fn generate(&self, _prompt: &str, _context: &RetrievalResult) -> anyhow::Result<Draft> {
        Ok(self.draft.clone())
    }
}

struct FramingProvider {
    name: &'static str,
    framework: ContentFramework,
}

#[async_trait]
impl ReasoningProvider for FramingProvider {
    fn name(&self) -> &str {
        self.name
    }
    async fn generate(&self, _prompt: &str, _context: &RetrievalResult) -> anyhow::Result<Draft> {
        Ok(draft("Bakery Website", vec![]))
    }
    async fn frame(
        &self,
        _prompt: &str,
        _context: &RetrievalResult,
    ) -> anyhow::Result<ContentFramework> {
        Ok(self.framework.clone())
    }
}

fn framework(pages: &[&str], cta: &str) -> ContentFramework {
    ContentFramework {
        sitemap: pages
            .iter()
            .map(|p| SitemapItem {
                page: p.to_string(),
                description: format!("{} page", p),
            })
            .collect(),
        page_details: pages
            .iter()
            .map(|p| PageDetail {
                page: p.to_string(),
                requirements: format!("{} copy", p),
            })
            .collect(),
        cta_strategy: cta.to_string(),
    }
}

struct SlowProvider;

#[async_trait]
impl ReasoningProvider for SlowProvider {
    fn name(&self) -> &str {
        "slow"
    }
    async fn generate(&self, _prompt: &str, _context: &RetrievalResult) -> anyhow::Result<Draft> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(Draft::default())
    }
}

struct FailingProvider;

#[async_trait]
impl ReasoningProvider for FailingProvider {
    fn name(&self) -> &str {
        "failing"
    }
    async fn generate(&self, _prompt: &str, _context: &RetrievalResult) -> anyhow::Result<Draft> {
        bail!("HTTP 500: upstream exploded")
    }
}

fn draft(title: &str, gaps: Vec<Gap>) -> Draft {
    let mut d = Draft::default();
    d.sections.insert("project_title".into(), title.into());
    d.sections
        .insert("objectives".into(), "Launch online ordering".into());
    d.gaps = gaps;
    d
}

fn fixed(name: &'static str, draft: Draft) -> Option<Arc<dyn ReasoningProvider>> {
    Some(Arc::new(FixedProvider { name, draft }))
}

fn knowledge_base() -> Arc<KnowledgeBase> {
    let index = Arc::new(VectorIndex::new(DIMS, Arc::new(InMemoryChunkStore::new())));
    Arc::new(KnowledgeBase::new(Arc::new(HashedTermEmbedder::new(DIMS)), index, 2000, 3).unwrap())
}

fn analyzer(
    kb: Arc<KnowledgeBase>,
    a: Option<Arc<dyn ReasoningProvider>>,
    b: Option<Arc<dyn ReasoningProvider>>,
) -> Analyzer {
    Analyzer::new(kb, a, b, Duration::from_millis(200), ScoringParams::default())
}

#[tokio::test]
async fn timed_out_provider_degrades_to_survivor_verbatim() {
    let survivor = draft(
        "Bakery Website",
        vec![Gap::new(GapCategory::Navigation, "No footer links", Severity::Medium)],
    );
    let analyzer = analyzer(
        knowledge_base(),
        fixed("groq", survivor.clone()),
        Some(Arc::new(SlowProvider)),
    );

    let trace = TraceLog::new();
    let analysis = analyzer
        .analyze_traced("bakery wants online ordering", &trace)
        .await
        .unwrap();

    assert_eq!(analysis.draft, survivor);
    assert_eq!(analysis.assessment.basis.providers, vec!["groq".to_string()]);

    let b_step = analysis
        .trace
        .iter()
        .find(|s| s.step == "provider_b")
        .unwrap();
    match &b_step.outcome {
        StepOutcome::Warning(msg) => assert!(msg.contains("timed out"), "{}", msg),
        other => panic!("expected warning, got {:?}", other),
    }
    assert!(trace.has_warnings());
    assert!(analysis.degraded);
}

#[tokio::test]
async fn failing_provider_degrades_to_other_slot() {
    let survivor = draft("Clinic Portal", vec![]);
    let analyzer = analyzer(
        knowledge_base(),
        Some(Arc::new(FailingProvider)),
        fixed("gemini", survivor.clone()),
    );

    let analysis = analyzer.analyze("clinic portal notes").await.unwrap();
    assert_eq!(analysis.draft, survivor);
    assert_eq!(analysis.assessment.basis.providers, vec!["gemini".to_string()]);
}

#[tokio::test]
async fn both_providers_down_is_unavailable() {
    let analyzer = analyzer(
        knowledge_base(),
        Some(Arc::new(FailingProvider)),
        Some(Arc::new(SlowProvider)),
    );

    let err = analyzer.analyze("any notes").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ProviderUnavailable);
    assert!(err.is_fatal());
}

#[tokio::test]
async fn empty_index_without_gaps_scores_ready_at_eighty() {
    let analyzer = analyzer(
        knowledge_base(),
        fixed("a", draft("Bakery Website", vec![])),
        fixed("b", draft("Bakery", vec![])),
    );

    let analysis = analyzer.analyze("bakery website").await.unwrap();
    assert!(analysis.retrieval.is_empty());
    assert!(analysis.assessment.basis.no_precedent);
    assert_eq!(analysis.assessment.score, 80);
    assert_eq!(analysis.assessment.status, MaturityStatus::Ready);
    // Missing precedent is itself a warning.
    assert!(analysis.degraded);
    assert_eq!(
        analysis.assessment.basis.providers,
        vec!["a".to_string(), "b".to_string()]
    );
}

#[tokio::test]
async fn merged_gaps_drive_the_score() {
    let kb = knowledge_base();
    kb.ingest(
        "bakery website with online ordering and a menu page",
        &IngestMetadata::new("bakery", "example"),
    )
    .await
    .unwrap();

    let a = draft(
        "Bakery Website",
        vec![
            Gap::new(GapCategory::Navigation, "No footer links", Severity::Medium),
            Gap::new(GapCategory::Feature, "Payment provider unknown", Severity::High),
        ],
    );
    let b = draft(
        "Bakery",
        vec![Gap::new(GapCategory::Navigation, "no footer links ", Severity::High)],
    );
    let analyzer = analyzer(kb, fixed("a", a), fixed("b", b));

    let analysis = analyzer
        .analyze("bakery website with online ordering and a menu page")
        .await
        .unwrap();

    // Duplicate footer gap collapses and escalates to high: 100 - 15 - 15.
    assert!(!analysis.assessment.basis.no_precedent);
    assert_eq!(analysis.assessment.gaps.len(), 2);
    assert_eq!(analysis.assessment.score, 70);
    assert_eq!(analysis.assessment.status, MaturityStatus::NeedsDetail);
    assert_eq!(
        analysis.draft.section("project_title"),
        Some("Bakery Website")
    );
}

#[tokio::test]
async fn reindexed_feedback_is_visible_to_the_next_request() {
    let kb = knowledge_base();
    let analyzer = analyzer(kb.clone(), fixed("a", draft("Clinic Portal", vec![])), None);

    let before = analyzer
        .analyze("patient portal login flow")
        .await
        .unwrap();
    assert!(before.retrieval.is_empty());

    let report = kb
        .reindex_feedback(&FeedbackRecord::new(
            "clinic",
            "Missing patient portal login flow",
        ))
        .await
        .unwrap();

    let after = analyzer
        .analyze("patient portal login flow")
        .await
        .unwrap();
    assert_eq!(after.retrieval.hits[0].chunk.id, report.chunk_ids[0]);
    assert!(after.retrieval.hits[0].chunk.tags.contains("feedback"));
    assert_eq!(after.assessment.basis.chunk_ids[0], report.chunk_ids[0]);
}

#[tokio::test]
async fn sqlite_knowledge_base_survives_reopen() {
    let tmp = tempfile::tempdir().unwrap();
    let config = Config::with_db_path(tmp.path().join("data/sfg.sqlite"));

    let live_id = {
        let kb = KnowledgeBase::open(&config).await.unwrap();
        let meta = IngestMetadata::new("bakery", "document").with_document_key("doc:menu");
        kb.ingest("croissant and baguette menu", &meta).await.unwrap();
        let report = kb
            .ingest("sourdough and rye menu", &meta)
            .await
            .unwrap();
        report.chunk_ids[0].clone()
    };

    // Both versions are persisted; only the later one is live.
    let kb = KnowledgeBase::open(&config).await.unwrap();
    assert_eq!(kb.index().len(), 2);
    let result = kb.retrieve("croissant menu", 5).await.unwrap();
    assert_eq!(result.len(), 1);
    assert_eq!(result.hits[0].chunk.id, live_id);
    assert!(result.hits[0].chunk.text.contains("sourdough"));

    assert_eq!(kb.index().rebuild().await.unwrap(), 2);
}

#[tokio::test]
async fn rebuild_of_empty_store_reports_empty_index() {
    let tmp = tempfile::tempdir().unwrap();
    let config = Config::with_db_path(tmp.path().join("sfg.sqlite"));
    let kb = KnowledgeBase::open(&config).await.unwrap();

    let err = kb.index().rebuild().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EmptyIndex);
}

#[tokio::test]
async fn framework_merges_both_slots_and_is_checked() {
    let a = FramingProvider {
        name: "groq",
        framework: framework(&["Home", "Menu"], "Order online"),
    };
    let b = FramingProvider {
        name: "gemini",
        framework: framework(&["Home", "Contact"], "Call the bakery"),
    };
    let analyzer = analyzer(knowledge_base(), Some(Arc::new(a)), Some(Arc::new(b)));

    let analysis = analyzer.analyze("bakery website").await.unwrap();
    let result = analyzer
        .frame("bakery website", &analysis.draft)
        .await
        .unwrap();

    let pages: Vec<_> = result
        .framework
        .sitemap
        .iter()
        .map(|s| s.page.as_str())
        .collect();
    assert_eq!(pages, vec!["Home", "Menu", "Contact"]);
    assert_eq!(result.framework.cta_strategy, "Order online | Call the bakery");
    assert_eq!(result.providers, vec!["groq".to_string(), "gemini".to_string()]);
    assert!(result.quality.complete, "{:?}", result.quality.issues);
    assert_eq!(result.quality.status, QualityStatus::Pass);
    // home and contact out of 13 glossary pages.
    assert_eq!(result.quality.glossary_coverage, 0.15);
    assert!(result.trace.iter().any(|s| s.step == "framework_b"));
}

#[tokio::test]
async fn framework_degrades_when_one_slot_cannot_frame() {
    let b = FramingProvider {
        name: "gemini",
        framework: framework(&["Home"], "Buy"),
    };
    let analyzer = analyzer(
        knowledge_base(),
        fixed("groq", draft("Bakery Website", vec![])),
        Some(Arc::new(b)),
    );

    let trace = TraceLog::new();
    let result = analyzer
        .frame_traced("bakery", &draft("Bakery Website", vec![]), &trace)
        .await
        .unwrap();
    assert_eq!(result.providers, vec!["gemini".to_string()]);
    assert!(result.degraded);
    assert_eq!(result.quality.status, QualityStatus::Warning);

    let a_step = result.trace.iter().find(|s| s.step == "framework_a").unwrap();
    match &a_step.outcome {
        StepOutcome::Warning(msg) => assert!(msg.contains("content frameworks"), "{}", msg),
        other => panic!("expected warning, got {:?}", other),
    }
}
