//! Thin HTTP surface over the analyzer and knowledge base.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (version, chunk count) |
//! | `POST` | `/analyze` | Draft, score, and trace for project notes |
//! | `POST` | `/analyze/framework` | Content framework for an accepted draft |
//! | `POST` | `/retrieve` | Top-k precedent for a query |
//! | `POST` | `/feedback` | Re-index a reviewer comment |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "provider_unavailable", "message": "..." } }
//! ```
//!
//! `code` is `bad_request` for invalid input, otherwise the snake_case
//! error kind.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};

use scopeforge_core::models::{Draft, FeedbackRecord, RetrievalResult};
use scopeforge_core::{Error, ErrorKind};

use crate::config::Config;
use crate::knowledge::IngestReport;
use crate::orchestrator::{Analysis, Analyzer, FrameworkAnalysis};

#[derive(Clone)]
pub struct AppState {
    pub analyzer: Arc<Analyzer>,
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/analyze", post(handle_analyze))
        .route("/analyze/framework", post(handle_framework))
        .route("/retrieve", post(handle_retrieve))
        .route("/feedback", post(handle_feedback))
        .layer(cors)
        .with_state(state)
}

/// Bind to `[server].bind` and serve until the process is terminated.
pub async fn run_server(config: &Config, analyzer: Arc<Analyzer>) -> anyhow::Result<()> {
    let app = router(AppState { analyzer });
    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(bind = %config.server.bind, "http server listening");
    axum::serve(listener, app).await?;
    Ok(())
}

// ============ Error response ============

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        let failure = err.failure();
        let status = match failure.kind {
            ErrorKind::EmptyIndex => StatusCode::NOT_FOUND,
            ErrorKind::ProviderTimeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorKind::ProviderFailed | ErrorKind::Embedding => StatusCode::BAD_GATEWAY,
            ErrorKind::ProviderUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::IngestFailure => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::DimensionMismatch | ErrorKind::Storage => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        if err.is_fatal() {
            tracing::error!(kind = failure.kind.as_str(), "{}", failure.message);
        } else {
            tracing::warn!(kind = failure.kind.as_str(), "{}", failure.message);
        }
        AppError {
            status,
            code: failure.kind.as_str().to_string(),
            message: failure.message,
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    chunks: usize,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        chunks: state.analyzer.knowledge_base().index().len(),
    })
}

// ============ POST /analyze ============

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub notes: String,
}

async fn handle_analyze(
    State(state): State<AppState>,
    Json(req): Json<AnalyzeRequest>,
) -> Result<Json<Analysis>, AppError> {
    if req.notes.trim().is_empty() {
        return Err(bad_request("notes must not be empty"));
    }
    Ok(Json(state.analyzer.analyze(&req.notes).await?))
}

// ============ POST /analyze/framework ============

#[derive(Debug, Deserialize)]
pub struct FrameworkRequest {
    pub notes: String,
    pub draft: Draft,
}

async fn handle_framework(
    State(state): State<AppState>,
    Json(req): Json<FrameworkRequest>,
) -> Result<Json<FrameworkAnalysis>, AppError> {
    if req.draft.sections.is_empty() {
        return Err(bad_request("draft must have at least one section"));
    }
    Ok(Json(state.analyzer.frame(&req.notes, &req.draft).await?))
}

// ============ POST /retrieve ============

#[derive(Debug, Deserialize)]
pub struct RetrieveRequest {
    pub query: String,
    #[serde(default)]
    pub k: Option<usize>,
}

async fn handle_retrieve(
    State(state): State<AppState>,
    Json(req): Json<RetrieveRequest>,
) -> Result<Json<RetrievalResult>, AppError> {
    if req.query.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }
    let kb = state.analyzer.knowledge_base();
    let k = req.k.unwrap_or_else(|| kb.top_k());
    Ok(Json(kb.retrieve(&req.query, k).await?))
}

// ============ POST /feedback ============

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    pub project_id: String,
    pub comment: String,
    #[serde(default)]
    pub reviewer: Option<String>,
}

async fn handle_feedback(
    State(state): State<AppState>,
    Json(req): Json<FeedbackRequest>,
) -> Result<Json<IngestReport>, AppError> {
    if req.project_id.trim().is_empty() {
        return Err(bad_request("project_id must not be empty"));
    }
    if req.comment.trim().is_empty() {
        return Err(bad_request("comment must not be empty"));
    }
    let record = FeedbackRecord {
        project_id: req.project_id,
        reviewer_comment: req.comment,
        reviewer: req.reviewer,
        timestamp: Utc::now(),
    };
    let report = state
        .analyzer
        .knowledge_base()
        .reindex_feedback(&record)
        .await?;
    Ok(Json(report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::VectorIndex;
    use crate::knowledge::KnowledgeBase;
    use scopeforge_core::embedding::HashedTermEmbedder;
    use scopeforge_core::scoring::ScoringParams;
    use scopeforge_core::store::memory::InMemoryChunkStore;
    use std::time::Duration;

    fn state() -> AppState {
        let index = Arc::new(VectorIndex::new(64, Arc::new(InMemoryChunkStore::new())));
        let kb = KnowledgeBase::new(Arc::new(HashedTermEmbedder::new(64)), index, 2000, 3).unwrap();
        AppState {
            analyzer: Arc::new(Analyzer::new(
                Arc::new(kb),
                None,
                None,
                Duration::from_millis(100),
                ScoringParams::default(),
            )),
        }
    }

    #[test]
    fn core_errors_map_to_status_and_code() {
        let e = AppError::from(Error::unavailable("both down"));
        assert_eq!(e.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(e.code, "provider_unavailable");

        let e = AppError::from(Error::DimensionMismatch { expected: 3, actual: 4 });
        assert_eq!(e.status, StatusCode::INTERNAL_SERVER_ERROR);

        let e = AppError::from(Error::embedding("connection refused"));
        assert_eq!(e.status, StatusCode::BAD_GATEWAY);
        assert_eq!(e.code, "embedding");
    }

    #[tokio::test]
    async fn feedback_then_retrieve_round_trip() {
        let state = state();
        let Json(report) = handle_feedback(
            State(state.clone()),
            Json(FeedbackRequest {
                project_id: "clinic".into(),
                comment: "Missing patient portal login flow".into(),
                reviewer: None,
            }),
        )
        .await
        .unwrap();

        let Json(result) = handle_retrieve(
            State(state),
            Json(RetrieveRequest {
                query: "patient portal login".into(),
                k: Some(1),
            }),
        )
        .await
        .unwrap();
        assert_eq!(result.hits[0].chunk.id, report.chunk_ids[0]);
    }

    #[tokio::test]
    async fn empty_fields_are_bad_requests() {
        let err = handle_retrieve(
            State(state()),
            Json(RetrieveRequest {
                query: "  ".into(),
                k: None,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn analyze_without_providers_is_unavailable() {
        let err = handle_analyze(
            State(state()),
            Json(AnalyzeRequest {
                notes: "Client wants a bakery website".into(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.code, "provider_unavailable");
    }

    #[tokio::test]
    async fn framework_needs_a_draft_and_a_provider() {
        let err = handle_framework(
            State(state()),
            Json(FrameworkRequest {
                notes: "bakery".into(),
                draft: Draft::default(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        let mut draft = Draft::default();
        draft
            .sections
            .insert("project_title".into(), "Bakery Website".into());
        let err = handle_framework(
            State(state()),
            Json(FrameworkRequest {
                notes: "bakery".into(),
                draft,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, "provider_unavailable");
    }
}
