//! HTTP API
//!
//! `GET /health` and `POST /ask` over a shared [`RequestRouter`].

use crate::conductor::{AskResponse, RequestRouter};
use anyhow::Context;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

#[derive(Clone)]
struct AppState {
    router: Arc<RequestRouter>,
}

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

/// Build the application with CORS and request tracing
pub fn app(router: Arc<RequestRouter>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ask", post(ask))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(AppState { router })
}

/// Bind and serve until the process is stopped
pub async fn serve(router: Arc<RequestRouter>, addr: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app(router))
        .await
        .context("HTTP server stopped")
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn ask(State(state): State<AppState>, Json(body): Json<AskRequest>) -> Response {
    if body.question.trim().is_empty() {
        let error = ErrorBody {
            code: "VALIDATION_ERROR",
            message: "question must not be empty".to_string(),
        };
        return (StatusCode::BAD_REQUEST, Json(error)).into_response();
    }

    let response: AskResponse = state
        .router
        .ask(&body.question, body.session_id.as_deref())
        .await;
    Json(response).into_response()
}
