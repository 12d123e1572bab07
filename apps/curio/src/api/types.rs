//! # API Request/Response Types
//!
//! This module defines the JSON structures for the HTTP API.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use curio_core::{
    BatchItem, BatchSummary, CurationAction, CurationBatch, CurioError, EdgeId, GraphRole,
    Graph, Scope, StoreStats, UserId, Vote, VoteRequest, VoteValue,
};
use serde::{Deserialize, Serialize};

// =============================================================================
// ERRORS
// =============================================================================

/// Error body returned by every failing endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// An engine error on its way out of a handler.
#[derive(Debug)]
pub struct ApiError(pub CurioError);

impl From<CurioError> for ApiError {
    fn from(err: CurioError) -> Self {
        Self(err)
    }
}

impl ApiError {
    /// HTTP status an engine error maps to.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self.0 {
            CurioError::Validation(_) => StatusCode::BAD_REQUEST,
            CurioError::NotFound { .. } => StatusCode::NOT_FOUND,
            CurioError::Conflict(_) => StatusCode::CONFLICT,
            CurioError::Storage(_) | CurioError::Serialization(_) | CurioError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

// =============================================================================
// HEALTH & STATUS
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Store status response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub graphs: u64,
    pub nodes: u64,
    pub edges: u64,
    pub evidence: u64,
    pub votes: u64,
    pub persistent: bool,
    pub consensus: String,
}

impl StatusResponse {
    pub fn new(stats: StoreStats, persistent: bool, consensus: &str) -> Self {
        Self {
            graphs: stats.graphs,
            nodes: stats.nodes,
            edges: stats.edges,
            evidence: stats.evidence,
            votes: stats.votes,
            persistent,
            consensus: consensus.to_string(),
        }
    }
}

// =============================================================================
// GRAPHS
// =============================================================================

/// One row of `GET /graphs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSummary {
    pub id: u64,
    pub role: GraphRole,
    pub scope: Scope,
    pub created_at: i64,
}

impl From<Graph> for GraphSummary {
    fn from(graph: Graph) -> Self {
        Self {
            id: graph.id.0,
            role: graph.key.role,
            scope: graph.key.scope,
            created_at: graph.created_at.0,
        }
    }
}

// =============================================================================
// CURATION
// =============================================================================

/// One decision as it arrives on the wire. The action is parsed in
/// [`BatchRequest::into_batch`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchItemRequest {
    pub edge_id: u64,
    pub action: String,
}

/// `POST /curation/batches` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRequest {
    pub diff_id: String,
    pub curator: String,
    pub items: Vec<BatchItemRequest>,
}

impl BatchRequest {
    /// Parse every action and build the engine batch.
    pub fn into_batch(self) -> Result<CurationBatch, CurioError> {
        let items = self
            .items
            .into_iter()
            .map(|item| {
                Ok(BatchItem {
                    edge_id: EdgeId(item.edge_id),
                    action: item.action.parse::<CurationAction>()?,
                })
            })
            .collect::<Result<Vec<_>, CurioError>>()?;
        Ok(CurationBatch {
            diff_id: self.diff_id,
            curator: UserId::new(self.curator),
            items,
        })
    }
}

/// `POST /curation/batches` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResponse {
    pub diff_id: String,
    #[serde(flatten)]
    pub summary: BatchSummary,
}

// =============================================================================
// VOTING
// =============================================================================

/// `POST /edges/{id}/votes` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteBody {
    pub user_id: String,
    /// -1, 0 or 1.
    pub vote: i64,
    #[serde(default)]
    pub comment: Option<String>,
}

impl VoteBody {
    pub fn into_request(self, edge_id: EdgeId) -> Result<VoteRequest, CurioError> {
        Ok(VoteRequest {
            user_id: UserId::new(self.user_id),
            edge_id,
            value: VoteValue::try_from(self.vote)?,
            comment: self.comment,
        })
    }
}

/// `POST /edges/{id}/votes` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteResponse {
    pub edge_id: u64,
    pub confidence_bp: u16,
    /// Decimal rendering, e.g. `"0.8000"`.
    pub confidence: String,
    pub up: u32,
    pub down: u32,
    pub neutral: u32,
}

/// One row of `GET /edges/{id}/votes`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteJson {
    pub user_id: String,
    pub vote: i8,
    pub comment: Option<String>,
    pub cast_at: i64,
}

impl From<Vote> for VoteJson {
    fn from(vote: Vote) -> Self {
        Self {
            user_id: vote.user_id.0,
            vote: vote.value.value(),
            comment: vote.comment,
            cast_at: vote.cast_at.0,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_action_fails_to_parse() {
        let request = BatchRequest {
            diff_id: "d".to_string(),
            curator: "c".to_string(),
            items: vec![BatchItemRequest {
                edge_id: 1,
                action: "ARCHIVE".to_string(),
            }],
        };
        let err = request.into_batch().expect_err("unknown action");
        assert_eq!(ApiError::from(err).status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn vote_outside_range_fails_to_parse() {
        let body = VoteBody {
            user_id: "ana".to_string(),
            vote: 2,
            comment: None,
        };
        assert!(body.into_request(EdgeId(1)).is_err());
    }

    #[test]
    fn errors_map_to_statuses() {
        assert_eq!(
            ApiError(CurioError::edge_not_found(EdgeId(3))).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError(CurioError::Conflict("slug".to_string())).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError(CurioError::Storage("disk".to_string())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError(CurioError::Io("socket".to_string())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
