//! # API Endpoint Handlers
//!
//! Engine calls are synchronous and run on the blocking pool.

use super::{
    AppState,
    types::{
        ApiError, BatchRequest, BatchResponse, GraphSummary, HealthResponse, StatusResponse,
        VoteBody, VoteJson, VoteResponse,
    },
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use curio_core::{
    CurationEngine, CurioError, EdgeId, GraphId, GraphSnapshot, IngestReport, LearnerGraphDoc,
};

/// Run an engine call on the blocking pool.
async fn with_engine<T, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&CurationEngine) -> Result<T, CurioError> + Send + 'static,
{
    let engine = state.engine.clone();
    tokio::task::spawn_blocking(move || f(&engine))
        .await
        .map_err(|e| ApiError(CurioError::Storage(format!("engine task failed: {}", e))))?
        .map_err(ApiError)
}

// =============================================================================
// HEALTH & STATUS
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

/// Row counts of the store.
pub async fn status_handler(
    State(state): State<AppState>,
) -> Result<Json<StatusResponse>, ApiError> {
    let response = with_engine(&state, |engine| {
        let stats = engine.stats()?;
        Ok(StatusResponse::new(
            stats,
            engine.store().is_persistent(),
            engine.config().consensus.as_str(),
        ))
    })
    .await?;
    Ok(Json(response))
}

// =============================================================================
// GRAPHS
// =============================================================================

/// List every graph.
pub async fn graphs_handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<GraphSummary>>, ApiError> {
    let graphs = with_engine(&state, |engine| engine.graphs()).await?;
    Ok(Json(graphs.into_iter().map(GraphSummary::from).collect()))
}

/// Nodes and edges of one graph.
pub async fn graph_handler(
    State(state): State<AppState>,
    Path(graph_id): Path<u64>,
) -> Result<Json<GraphSnapshot>, ApiError> {
    let snapshot = with_engine(&state, move |engine| {
        engine.graph_snapshot(GraphId(graph_id))
    })
    .await?;
    Ok(Json(snapshot))
}

// =============================================================================
// INGESTION
// =============================================================================

/// Store an already-extracted learner graph.
pub async fn ingest_handler(
    State(state): State<AppState>,
    Json(doc): Json<LearnerGraphDoc>,
) -> Result<(StatusCode, Json<IngestReport>), ApiError> {
    let report = with_engine(&state, move |engine| engine.ingest(&doc)).await?;
    Ok((StatusCode::CREATED, Json(report)))
}

// =============================================================================
// CURATION
// =============================================================================

/// Apply a batch of curator decisions.
///
/// Unknown actions fail the whole request before any item is applied;
/// missing edges only skip their own item.
pub async fn batch_handler(
    State(state): State<AppState>,
    Json(request): Json<BatchRequest>,
) -> Result<Json<BatchResponse>, ApiError> {
    let batch = request.into_batch()?;
    let diff_id = batch.diff_id.clone();
    let summary = with_engine(&state, move |engine| engine.process_batch(&batch)).await?;
    Ok(Json(BatchResponse { diff_id, summary }))
}

// =============================================================================
// VOTING
// =============================================================================

/// Cast or replace the caller's vote on an edge.
pub async fn cast_vote_handler(
    State(state): State<AppState>,
    Path(edge_id): Path<u64>,
    Json(body): Json<VoteBody>,
) -> Result<Json<VoteResponse>, ApiError> {
    let request = body.into_request(EdgeId(edge_id))?;
    let outcome = with_engine(&state, move |engine| engine.cast_vote(request)).await?;
    Ok(Json(VoteResponse {
        edge_id: outcome.edge_id.0,
        confidence_bp: outcome.confidence.bp(),
        confidence: outcome.confidence.to_string(),
        up: outcome.tally.up,
        down: outcome.tally.down,
        neutral: outcome.tally.neutral,
    }))
}

/// Live votes on an edge.
pub async fn list_votes_handler(
    State(state): State<AppState>,
    Path(edge_id): Path<u64>,
) -> Result<Json<Vec<VoteJson>>, ApiError> {
    let votes = with_engine(&state, move |engine| engine.votes_for(EdgeId(edge_id))).await?;
    Ok(Json(votes.into_iter().map(VoteJson::from).collect()))
}
