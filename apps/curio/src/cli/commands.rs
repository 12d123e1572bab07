//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use crate::api;
use crate::config::{BackendKind, CurioConfig};
use curio_core::{
    CurationBatch, CurationEngine, CurioError, EdgeId, GraphId, LearnerGraphDoc,
    UserId, VoteRequest, VoteValue,
};
use serde::Serialize;
use std::path::{Path, PathBuf};

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum size of an input document (100 MB).
const MAX_INPUT_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Validate file size before reading.
fn validate_file_size(path: &Path, max_size: u64) -> Result<(), CurioError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| CurioError::Io(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(CurioError::Validation(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Canonicalize an input path and make sure it names a regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, CurioError> {
    let canonical = path.canonicalize().map_err(|e| {
        CurioError::Io(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(CurioError::Validation(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

/// Read and parse a JSON input document.
fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, CurioError> {
    let path = validate_file_path(path)?;
    validate_file_size(&path, MAX_INPUT_FILE_SIZE)?;
    let contents = std::fs::read(&path)
        .map_err(|e| CurioError::Io(format!("Cannot read '{}': {}", path.display(), e)))?;
    serde_json::from_slice(&contents)
        .map_err(|e| CurioError::Validation(format!("Invalid JSON in '{}': {}", path.display(), e)))
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CurioError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| CurioError::Serialization(e.to_string()))?;
    println!("{}", text);
    Ok(())
}

fn open_engine(config: &CurioConfig) -> Result<CurationEngine, CurioError> {
    let backend = config.open_backend()?;
    Ok(CurationEngine::new(backend, config.engine_config()))
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Create an empty database.
pub fn cmd_init(config: &CurioConfig, force: bool, json: bool) -> Result<(), CurioError> {
    let path = &config.storage.path;
    if config.storage.backend == BackendKind::Redb && path.exists() {
        if !force {
            return Err(CurioError::Conflict(format!(
                "Database '{}' already exists (use --force to replace it)",
                path.display()
            )));
        }
        std::fs::remove_file(path).map_err(|e| {
            CurioError::Io(format!("Cannot remove '{}': {}", path.display(), e))
        })?;
        tracing::warn!(path = %path.display(), "replaced existing database");
    }

    let engine = open_engine(config)?;
    let stats = engine.stats()?;

    if json {
        return print_json(&serde_json::json!({
            "database": path.display().to_string(),
            "backend": config.storage.backend.as_str(),
            "stats": stats,
        }));
    }

    println!("Initialized {} database at {}", config.storage.backend.as_str(), path.display());
    Ok(())
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Show store row counts.
pub fn cmd_status(config: &CurioConfig, json: bool) -> Result<(), CurioError> {
    let engine = open_engine(config)?;
    let stats = engine.stats()?;
    let consensus = config.consensus.policy.as_str();

    if json {
        return print_json(&serde_json::json!({
            "database": config.storage.path.display().to_string(),
            "backend": config.storage.backend.as_str(),
            "consensus": consensus,
            "stats": stats,
        }));
    }

    println!("Curio Store Status");
    println!("==================");
    println!("Database:  {}", config.storage.path.display());
    println!("Backend:   {}", config.storage.backend.as_str());
    println!("Consensus: {}", consensus);
    println!();
    println!("Graphs:    {}", stats.graphs);
    println!("Nodes:     {}", stats.nodes);
    println!("Edges:     {}", stats.edges);
    println!("Evidence:  {}", stats.evidence);
    println!("Votes:     {}", stats.votes);
    Ok(())
}

// =============================================================================
// GRAPH COMMANDS
// =============================================================================

/// List every graph.
pub fn cmd_graphs(config: &CurioConfig, json: bool) -> Result<(), CurioError> {
    let engine = open_engine(config)?;
    let graphs = engine.graphs()?;

    if json {
        let rows: Vec<api::GraphSummary> =
            graphs.into_iter().map(api::GraphSummary::from).collect();
        return print_json(&rows);
    }

    if graphs.is_empty() {
        println!("No graphs");
        return Ok(());
    }
    for graph in graphs {
        println!("{:>6}  {:?}  {}", graph.id.0, graph.key.role, graph.key.scope);
    }
    Ok(())
}

/// Show the nodes and edges of one graph.
pub fn cmd_show(config: &CurioConfig, graph_id: u64, json: bool) -> Result<(), CurioError> {
    let engine = open_engine(config)?;
    let snapshot = engine.graph_snapshot(GraphId(graph_id))?;

    if json {
        return print_json(&snapshot);
    }

    println!(
        "Graph {} ({:?}, {})",
        snapshot.graph.id.0, snapshot.graph.key.role, snapshot.graph.key.scope
    );
    println!();
    println!("Nodes: {}", snapshot.nodes.len());
    for node in &snapshot.nodes {
        println!(
            "  [{}] {} ({}) confidence {} {}",
            node.id.0,
            node.label,
            node.slug,
            node.confidence,
            node.source.as_str()
        );
    }
    println!("Edges: {}", snapshot.edges.len());
    for view in &snapshot.edges {
        println!(
            "  [{}] {} -{}-> {} confidence {} evidence {} {:?}",
            view.edge.id.0,
            view.edge.from.0,
            view.edge.edge_type,
            view.edge.to.0,
            view.edge.confidence,
            view.evidence_count,
            view.status
        );
    }
    Ok(())
}

// =============================================================================
// INGEST COMMAND
// =============================================================================

/// Ingest a learner graph document.
pub fn cmd_ingest(config: &CurioConfig, file: &Path, json: bool) -> Result<(), CurioError> {
    let doc: LearnerGraphDoc = read_json(file)?;
    let engine = open_engine(config)?;
    let report = engine.ingest(&doc)?;

    if json {
        return print_json(&report);
    }

    println!("Ingested learner graph {} ({})", report.graph_id.0, doc.scope);
    println!(
        "  Nodes: {} created, {} reused",
        report.nodes_created, report.nodes_reused
    );
    println!(
        "  Edges: {} created, {} reused",
        report.edges_created, report.edges_reused
    );
    Ok(())
}

// =============================================================================
// CURATE COMMAND
// =============================================================================

/// Apply a batch document of curator decisions.
pub fn cmd_curate(config: &CurioConfig, file: &Path, json: bool) -> Result<(), CurioError> {
    let request: api::BatchRequest = read_json(file)?;
    let batch: CurationBatch = request.into_batch()?;
    let engine = open_engine(config)?;
    let summary = engine.process_batch(&batch)?;

    if json {
        return print_json(&api::BatchResponse {
            diff_id: batch.diff_id,
            summary,
        });
    }

    println!("Batch {} by {}", batch.diff_id, batch.curator);
    println!(
        "  Promoted:     {} ({} already curated)",
        summary.promoted, summary.already_curated
    );
    println!("  Rejected:     {}", summary.rejected);
    println!("  Needs review: {}", summary.needs_review);
    if !summary.skipped.is_empty() {
        println!("  Skipped:      {}", summary.skipped.len());
        for item in &summary.skipped {
            println!("    edge {}: {}", item.edge_id.0, item.reason);
        }
    }
    Ok(())
}

// =============================================================================
// VOTE COMMAND
// =============================================================================

/// Cast or replace a vote.
pub fn cmd_vote(
    config: &CurioConfig,
    user: String,
    edge: u64,
    value: i64,
    comment: Option<String>,
    json: bool,
) -> Result<(), CurioError> {
    let request = VoteRequest {
        user_id: UserId::new(user),
        edge_id: EdgeId(edge),
        value: VoteValue::try_from(value)?,
        comment,
    };
    let engine = open_engine(config)?;
    let outcome = engine.cast_vote(request)?;

    if json {
        return print_json(&outcome);
    }

    println!(
        "Edge {} confidence {} (up {}, down {}, neutral {})",
        outcome.edge_id.0,
        outcome.confidence,
        outcome.tally.up,
        outcome.tally.down,
        outcome.tally.neutral
    );
    Ok(())
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_server(config: &CurioConfig) -> Result<(), CurioError> {
    let engine = open_engine(config)?;

    println!("Curio Curation Server Starting...");
    println!();
    println!("Configuration:");
    println!("  Host:      {}", config.server.host);
    println!("  Port:      {}", config.server.port);
    println!("  Backend:   {}", config.storage.backend.as_str());
    println!("  Database:  {}", config.storage.path.display());
    println!("  Consensus: {}", config.consensus.policy.as_str());
    println!();
    println!("Endpoints:");
    println!("  GET  /health              - Health check");
    println!("  GET  /status              - Store row counts");
    println!("  GET  /graphs              - List graphs");
    println!("  GET  /graphs/{{id}}         - Show one graph");
    println!("  POST /learner-graphs      - Ingest a learner graph");
    println!("  POST /curation/batches    - Apply curator decisions");
    println!("  POST /edges/{{id}}/votes    - Cast a vote");
    println!("  GET  /edges/{{id}}/votes    - List votes");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    api::run_server(engine, &config.server).await
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;
    use std::io::Write;

    fn redb_config(dir: &tempfile::TempDir) -> CurioConfig {
        CurioConfig {
            storage: StorageConfig {
                backend: BackendKind::Redb,
                path: dir.path().join("cli.redb"),
            },
            ..CurioConfig::default()
        }
    }

    fn write_file(dir: &tempfile::TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).expect("create");
        file.write_all(body.as_bytes()).expect("write");
        path
    }

    #[test]
    fn init_refuses_to_overwrite_without_force() {
        let dir = tempfile::tempdir().expect("temp dir");
        let config = redb_config(&dir);

        cmd_init(&config, false, true).expect("first init");
        assert!(matches!(
            cmd_init(&config, false, true),
            Err(CurioError::Conflict(_))
        ));
        cmd_init(&config, true, true).expect("forced init");
    }

    #[test]
    fn ingest_curate_and_vote_persist_across_commands() {
        let dir = tempfile::tempdir().expect("temp dir");
        let config = redb_config(&dir);

        let doc = write_file(
            &dir,
            "graph.json",
            r#"{
                "scope": {"scope_type": "USER", "scope_id": "ana"},
                "nodes": [{"label": "Cell"}, {"label": "Nucleus"}],
                "edges": [{"from": "nucleus", "to": "cell", "edge_type": "PART_OF", "confidence_bp": 8500}]
            }"#,
        );
        cmd_ingest(&config, &doc, true).expect("ingest");

        let engine = open_engine(&config).expect("engine");
        let learner = engine.graphs().expect("graphs")[0].id;
        let edge_id = engine.graph_snapshot(learner).expect("graph").edges[0]
            .edge
            .id;
        drop(engine);

        let batch = write_file(
            &dir,
            "batch.json",
            &format!(
                r#"{{"diff_id": "d-1", "curator": "cur", "items": [{{"edge_id": {}, "action": "PROMOTE"}}]}}"#,
                edge_id.0
            ),
        );
        cmd_curate(&config, &batch, true).expect("curate");
        cmd_vote(&config, "ben".to_string(), edge_id.0, -1, None, true).expect("vote");

        let engine = open_engine(&config).expect("engine");
        let stats = engine.stats().expect("stats");
        assert_eq!(stats.graphs, 2);
        assert_eq!(stats.edges, 2);
        assert_eq!(stats.votes, 1);
    }

    #[test]
    fn directory_is_not_an_input_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        assert!(validate_file_path(dir.path()).is_err());
    }

    #[test]
    fn malformed_batch_document_is_a_validation_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let config = redb_config(&dir);
        let batch = write_file(&dir, "batch.json", r#"{"diff_id": "d-1"}"#);
        assert!(matches!(
            cmd_curate(&config, &batch, true),
            Err(CurioError::Validation(_))
        ));
    }
}
