//! API 모듈 - axum HTTP 서버
//!
//! RAG 시스템을 HTTP로 노출합니다:
//! - POST /api/query : RAG 쿼리 (세션 유지)
//! - GET  /api/courses : 코스 분석 정보
//! - DELETE /api/sessions/:session_id : 세션 비우기
//! - GET  /health : 헬스체크

use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::rag::RagSystem;
use crate::tools::Source;

// ============================================================================
// Error Type
// ============================================================================

/// API 에러
///
/// JSON `{ "error": <message> }` 본문과 상태 코드로 변환됩니다.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn internal<E: std::fmt::Display>(err: E) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = Json(json!({ "error": message }));
        (status, body).into_response()
    }
}

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, serde::Serialize)]
pub struct QueryResponse {
    pub answer: String,
    pub sources: Vec<Source>,
    pub session_id: String,
}

// ============================================================================
// Router
// ============================================================================

/// API 라우터 구성
pub fn router(state: Arc<RagSystem>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/query", post(query))
        .route("/api/courses", get(courses))
        .route("/api/sessions/:session_id", delete(clear_session))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// 서버 실행
pub async fn serve(rag: Arc<RagSystem>, host: &str, port: u16) -> Result<()> {
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Listening on http://{}", addr);
    axum::serve(listener, router(rag)).await?;

    Ok(())
}

// ============================================================================
// Handlers
// ============================================================================

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn query(
    State(state): State<Arc<RagSystem>>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    if request.query.trim().is_empty() {
        return Err(ApiError::BadRequest("query must not be empty".to_string()));
    }

    let result = state
        .query(&request.query, request.session_id)
        .await
        .map_err(ApiError::internal)?;

    Ok(Json(QueryResponse {
        answer: result.answer,
        sources: result.sources,
        session_id: result.session_id,
    }))
}

async fn courses(
    State(state): State<Arc<RagSystem>>,
) -> Result<impl IntoResponse, ApiError> {
    let analytics = state.analytics().map_err(ApiError::internal)?;
    Ok(Json(analytics))
}

async fn clear_session(
    State(state): State<Arc<RagSystem>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.clear_session(&session_id) {
        return Err(ApiError::NotFound(format!(
            "session '{}' not found",
            session_id
        )));
    }

    Ok(Json(json!({ "status": "cleared" })))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_messages() {
        let err = ApiError::BadRequest("query must not be empty".to_string());
        assert_eq!(err.to_string(), "bad request: query must not be empty");

        let err = ApiError::internal(anyhow::anyhow!("boom"));
        assert!(matches!(err, ApiError::Internal(_)));
    }

    #[test]
    fn test_query_request_deserializes_without_session() {
        let request: QueryRequest =
            serde_json::from_str(r#"{ "query": "What is RAG?" }"#).unwrap();
        assert_eq!(request.query, "What is RAG?");
        assert!(request.session_id.is_none());
    }

    #[test]
    fn test_query_request_deserializes_with_session() {
        let request: QueryRequest =
            serde_json::from_str(r#"{ "query": "more", "session_id": "abc" }"#).unwrap();
        assert_eq!(request.session_id.as_deref(), Some("abc"));
    }
}
