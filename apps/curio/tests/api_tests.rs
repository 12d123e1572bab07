//! Integration tests for the Curio HTTP API.
//!
//! Uses axum-test to exercise the router without binding a socket.

#![allow(clippy::unwrap_used, clippy::panic)]

use axum::http::StatusCode;
use axum_test::TestServer;
use curio::api::{
    AppState, BatchResponse, ErrorResponse, GraphSummary, HealthResponse, StatusResponse,
    VoteJson, VoteResponse, create_router, run_server,
};
use curio::config::ServerConfig;
use curio_core::{
    CurationEngine, CurioError, DisplayStatus, EngineConfig, GraphRole, GraphSnapshot, IngestReport,
    StorageBackend,
};
use serde_json::json;

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

fn open_settings() -> ServerConfig {
    ServerConfig {
        rate_limit: 0,
        ..ServerConfig::default()
    }
}

fn server_with(settings: &ServerConfig) -> TestServer {
    let engine = CurationEngine::new(StorageBackend::in_memory(), EngineConfig::default());
    TestServer::new(create_router(AppState::new(engine), settings)).unwrap()
}

fn create_test_server() -> TestServer {
    server_with(&open_settings())
}

fn learner_graph() -> serde_json::Value {
    json!({
        "scope": {"scope_type": "INSTITUTION", "scope_id": "uni-1", "content_id": "bio-101"},
        "nodes": [
            {"label": "Cell"},
            {"label": "Nucleus"},
            {"label": "Membrane"}
        ],
        "edges": [
            {
                "from": "nucleus",
                "to": "cell",
                "edge_type": "PART_OF",
                "confidence_bp": 8500,
                "evidence": [
                    {"anchor": {"content_id": "bio-101", "page": 4}, "excerpt": "The nucleus sits inside the cell."}
                ]
            },
            {"from": "membrane", "to": "cell", "edge_type": "PART_OF", "confidence_bp": 5000}
        ]
    })
}

async fn seed(server: &TestServer) -> IngestReport {
    let response = server.post("/learner-graphs").json(&learner_graph()).await;
    response.assert_status(StatusCode::CREATED);
    response.json()
}

// =============================================================================
// HEALTH & STATUS
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let server = create_test_server();

    let response = server.get("/health").await;

    response.assert_status_ok();
    let health: HealthResponse = response.json();
    assert_eq!(health.status, "ok");
    assert_eq!(health.version, env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_status_counts_rows() {
    let server = create_test_server();

    let empty: StatusResponse = server.get("/status").await.json();
    assert_eq!(empty.graphs, 0);
    assert!(!empty.persistent);
    assert_eq!(empty.consensus, "fixed_base");

    seed(&server).await;

    let status: StatusResponse = server.get("/status").await.json();
    assert_eq!(status.graphs, 1);
    assert_eq!(status.nodes, 3);
    assert_eq!(status.edges, 2);
    assert_eq!(status.evidence, 1);
}

// =============================================================================
// INGESTION & GRAPHS
// =============================================================================

#[tokio::test]
async fn test_ingest_and_show_graph() {
    let server = create_test_server();
    let report = seed(&server).await;
    assert_eq!(report.nodes_created, 3);
    assert_eq!(report.edges.len(), 2);

    let graphs: Vec<GraphSummary> = server.get("/graphs").await.json();
    assert_eq!(graphs.len(), 1);
    assert_eq!(graphs[0].role, GraphRole::Learner);

    let snapshot: GraphSnapshot = server
        .get(&format!("/graphs/{}", report.graph_id.0))
        .await
        .json();
    assert_eq!(snapshot.nodes.len(), 3);
    assert_eq!(snapshot.edges.len(), 2);
}

#[tokio::test]
async fn test_ingest_undeclared_endpoint_is_bad_request() {
    let server = create_test_server();

    let response = server
        .post("/learner-graphs")
        .json(&json!({
            "scope": {"scope_type": "USER", "scope_id": "ana"},
            "nodes": [{"label": "Cell"}],
            "edges": [{"from": "ghost", "to": "cell", "edge_type": "PART_OF"}]
        }))
        .await;

    response.assert_status_bad_request();
    let error: ErrorResponse = response.json();
    assert!(!error.error.is_empty());
}

#[tokio::test]
async fn test_missing_graph_is_not_found() {
    let server = create_test_server();
    server.get("/graphs/404").await.assert_status_not_found();
}

// =============================================================================
// CURATION
// =============================================================================

#[tokio::test]
async fn test_batch_promotes_and_skips_missing_edges() {
    let server = create_test_server();
    let report = seed(&server).await;

    let response = server
        .post("/curation/batches")
        .json(&json!({
            "diff_id": "diff-42",
            "curator": "curator-1",
            "items": [
                {"edge_id": report.edges[0].0, "action": "PROMOTE"},
                {"edge_id": 9999, "action": "PROMOTE"},
                {"edge_id": report.edges[1].0, "action": "REJECT"}
            ]
        }))
        .await;

    response.assert_status_ok();
    let result: BatchResponse = response.json();
    assert_eq!(result.diff_id, "diff-42");
    assert_eq!(result.summary.promoted, 1);
    assert_eq!(result.summary.rejected, 1);
    assert_eq!(result.summary.skipped.len(), 1);

    let graphs: Vec<GraphSummary> = server.get("/graphs").await.json();
    let curated = graphs
        .iter()
        .find(|g| g.role == GraphRole::Curated)
        .expect("curated graph");
    let snapshot: GraphSnapshot = server.get(&format!("/graphs/{}", curated.id)).await.json();
    assert_eq!(snapshot.edges.len(), 1);
    assert_eq!(snapshot.edges[0].edge.confidence.bp(), 9_000);
    assert_eq!(snapshot.edges[0].evidence_count, 1);

    let learner: GraphSnapshot = server
        .get(&format!("/graphs/{}", report.graph_id.0))
        .await
        .json();
    let rejected = learner
        .edges
        .iter()
        .find(|e| e.edge.id == report.edges[1])
        .expect("rejected edge");
    assert_eq!(rejected.status, DisplayStatus::Rejected);
}

#[tokio::test]
async fn test_unknown_action_rejects_whole_batch() {
    let server = create_test_server();
    let report = seed(&server).await;

    let response = server
        .post("/curation/batches")
        .json(&json!({
            "diff_id": "diff-1",
            "curator": "curator-1",
            "items": [
                {"edge_id": report.edges[0].0, "action": "PROMOTE"},
                {"edge_id": report.edges[1].0, "action": "ARCHIVE"}
            ]
        }))
        .await;

    response.assert_status_bad_request();
    let status: StatusResponse = server.get("/status").await.json();
    assert_eq!(status.graphs, 1);
}

// =============================================================================
// VOTING
// =============================================================================

#[tokio::test]
async fn test_votes_upsert_and_recompute_confidence() {
    let server = create_test_server();
    let report = seed(&server).await;
    let path = format!("/edges/{}/votes", report.edges[0].0);

    for (user, vote) in [("ana", 1), ("ben", 1), ("cai", 1), ("dee", -1), ("ana", 1)] {
        server
            .post(&path)
            .json(&json!({"user_id": user, "vote": vote}))
            .await
            .assert_status_ok();
    }

    let last: VoteResponse = server
        .post(&path)
        .json(&json!({"user_id": "dee", "vote": -1, "comment": "still unsure"}))
        .await
        .json();
    assert_eq!(last.up, 3);
    assert_eq!(last.down, 1);
    assert_eq!(last.confidence_bp, 8_000);
    assert_eq!(last.confidence, "0.8000");

    let votes: Vec<VoteJson> = server.get(&path).await.json();
    assert_eq!(votes.len(), 4);
    let dee = votes.iter().find(|v| v.user_id == "dee").expect("dee");
    assert_eq!(dee.vote, -1);
    assert_eq!(dee.comment.as_deref(), Some("still unsure"));
}

#[tokio::test]
async fn test_vote_out_of_range_is_bad_request() {
    let server = create_test_server();
    let report = seed(&server).await;

    server
        .post(&format!("/edges/{}/votes", report.edges[0].0))
        .json(&json!({"user_id": "ana", "vote": 2}))
        .await
        .assert_status_bad_request();
}

#[tokio::test]
async fn test_vote_on_missing_edge_is_not_found() {
    let server = create_test_server();

    server
        .post("/edges/9999/votes")
        .json(&json!({"user_id": "ana", "vote": 1}))
        .await
        .assert_status_not_found();
    server.get("/edges/9999/votes").await.assert_status_not_found();
}

// =============================================================================
// SECURITY LAYERS
// =============================================================================

#[tokio::test]
async fn test_api_key_required_except_health() {
    let server = server_with(&ServerConfig {
        api_key: Some("s3cret".to_string()),
        ..open_settings()
    });

    server.get("/health").await.assert_status_ok();
    server.get("/status").await.assert_status_unauthorized();
    server
        .get("/status")
        .authorization_bearer("wrong")
        .await
        .assert_status_unauthorized();
    server
        .get("/status")
        .authorization_bearer("s3cret")
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_rate_limit_returns_429() {
    let server = server_with(&ServerConfig {
        rate_limit: 1,
        ..ServerConfig::default()
    });

    server.get("/health").await.assert_status_ok();
    server
        .get("/health")
        .await
        .assert_status(StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_body_limit_rejects_large_documents() {
    let server = server_with(&ServerConfig {
        body_limit_bytes: 64,
        ..open_settings()
    });

    server
        .post("/learner-graphs")
        .json(&learner_graph())
        .await
        .assert_status(StatusCode::PAYLOAD_TOO_LARGE);
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

#[tokio::test]
async fn test_bind_failure_is_io_error() {
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = taken.local_addr().unwrap().port();
    let engine = CurationEngine::new(StorageBackend::in_memory(), EngineConfig::default());

    let result = run_server(
        engine,
        &ServerConfig {
            port,
            ..open_settings()
        },
    )
    .await;

    assert!(matches!(result, Err(CurioError::Io(_))));
}
