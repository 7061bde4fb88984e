//! HTTP handlers.
//!
//! Request and response bodies follow the chat UI's JSON. Validation
//! failures are 400s; anything unexpected is a 500. Provider failures on
//! `/api/llm` are not errors here: the router already turned them into a
//! degraded response with `modelUsed == "error"`.

use std::convert::Infallible;

use axum::Json;
use axum::body::Body;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use futures_util::{StreamExt, future};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, warn};

use super::error::ApiError;
use super::state::AppState;
use crate::conversation;
use crate::store::Interaction;
use crate::types::{ModelRequest, ModelResponse, ProviderStatus};
use crate::vector::{DEFAULT_SEARCH_LIMIT, SimilarItem};

// ============================================================================
// Completions
// ============================================================================

/// `POST /api/llm`
pub async fn llm(
    State(state): State<AppState>,
    payload: Result<Json<ModelRequest>, JsonRejection>,
) -> Result<Json<ModelResponse>, ApiError> {
    let Json(request) = payload?;
    let request = prepare(request)?;

    let response = state.gateway.route_request(&request).await;
    record(&state, request, response.clone());
    Ok(Json(response))
}

/// `POST /api/llm/stream`
///
/// Answers with a chunked `text/plain` body of concatenated deltas. A
/// failure after the first delta ends the body with a blank line and the
/// failure's user-facing text.
pub async fn llm_stream(
    State(state): State<AppState>,
    payload: Result<Json<ModelRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;
    let request = prepare(request)?;

    let deltas = state.gateway.stream_request(&request).await;
    let body = deltas.scan(false, |failed, item| {
        if *failed {
            return future::ready(None);
        }
        let chunk = match item {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "stream failed mid-response");
                *failed = true;
                format!("\n\n{}", e.user_message())
            }
        };
        future::ready(Some(Ok::<_, Infallible>(chunk)))
    });

    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(body),
    )
        .into_response())
}

/// `GET /api/llm/status`
pub async fn status(State(state): State<AppState>) -> Json<ProviderStatus> {
    Json(state.gateway.status())
}

/// Validate and, when the caller sent bare history, attach the
/// conversation analysis.
fn prepare(mut request: ModelRequest) -> Result<ModelRequest, ApiError> {
    request.validate()?;
    if let Some(context) = request.context.as_mut()
        && conversation::enrich_context(&request.prompt, context)
    {
        debug!("attached conversation analysis");
    }
    Ok(request)
}

/// Log the exchange without holding up the reply.
fn record(state: &AppState, request: ModelRequest, response: ModelResponse) {
    let store = state.interactions.clone();
    tokio::spawn(async move {
        if let Err(e) = store.record(Interaction::new(request, response)).await {
            warn!(error = %e, "failed to record interaction");
        }
    });
}

// ============================================================================
// Embeddings and similarity
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct EmbeddingRequest {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EmbeddingResponse {
    pub id: String,
    pub embedding: Vec<f32>,
}

/// `POST /api/embeddings`: embed a text and add it to the vector store.
pub async fn embeddings(
    State(state): State<AppState>,
    payload: Result<Json<EmbeddingRequest>, JsonRejection>,
) -> Result<Json<EmbeddingResponse>, ApiError> {
    let Json(body) = payload?;
    let text = body
        .text
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("Text is required"))?;

    let embedding = state.gateway.embed(&text).await?;
    let id = state.vectors.add(text, embedding.values.clone());
    Ok(Json(EmbeddingResponse {
        id,
        embedding: embedding.values,
    }))
}

#[derive(Debug, Deserialize)]
pub struct SimilarityRequest {
    #[serde(default)]
    pub embedding: Option<Value>,
    #[serde(default)]
    pub limit: Option<usize>,
}

/// `POST /api/similarity`: nearest stored texts to a query vector.
pub async fn similarity(
    State(state): State<AppState>,
    payload: Result<Json<SimilarityRequest>, JsonRejection>,
) -> Result<Json<Vec<SimilarItem>>, ApiError> {
    let Json(body) = payload?;
    let query: Vec<f32> = body
        .embedding
        .and_then(|v| serde_json::from_value(v).ok())
        .ok_or_else(|| ApiError::bad_request("Valid embedding array is required"))?;

    let limit = body.limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
    Ok(Json(state.vectors.search_similar(&query, limit)))
}

// ============================================================================
// Health
// ============================================================================

/// `GET /api/health`
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": crate::version_string(),
    }))
}
