//! # Curation Engine
//!
//! The facade the outer surfaces talk to. Owns the store and the engine
//! configuration and scopes every operation into store transactions.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use curio_core::{CurationEngine, EngineConfig, StorageBackend};
//!
//! let engine = CurationEngine::new(StorageBackend::in_memory(), EngineConfig::default());
//! let report = engine.ingest(&doc)?;
//! let outcome = engine.promote(report.edges[0], &UserId::new("curator"))?;
//! ```

use crate::confidence::ConsensusPolicy;
use crate::curation::{BatchSummary, CurationBatch, CurationOrchestrator};
use crate::ingest::{IngestReport, Ingestor, LearnerGraphDoc};
use crate::merge::{MergeEngine, PromotionOutcome};
use crate::store::{CurationStore, StorageBackend, StoreStats};
use crate::types::{
    CurioError, DisplayStatus, Edge, EdgeId, Evidence, Graph, GraphId, GraphKey, Node, UserId,
    Vote,
};
use crate::voting::{VoteOutcome, VoteRequest, VotingService};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Runtime settings of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    pub consensus: ConsensusPolicy,
}

/// An edge with its evidence count and collapsed status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeView {
    pub edge: Edge,
    pub evidence_count: usize,
    pub status: DisplayStatus,
}

/// Flat read of one graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub graph: Graph,
    pub nodes: Vec<Node>,
    pub edges: Vec<EdgeView>,
}

/// The curation engine over a store `S`.
///
/// Cloning is cheap: clones share the store.
#[derive(Debug)]
pub struct CurationEngine<S: CurationStore = StorageBackend> {
    store: Arc<S>,
    config: EngineConfig,
}

impl<S: CurationStore> Clone for CurationEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: self.config,
        }
    }
}

impl<S: CurationStore> CurationEngine<S> {
    /// Create an engine owning `store`.
    pub fn new(store: S, config: EngineConfig) -> Self {
        Self {
            store: Arc::new(store),
            config,
        }
    }

    /// The engine configuration.
    #[must_use]
    pub fn config(&self) -> EngineConfig {
        self.config
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    // =========================================================================
    // MERGE
    // =========================================================================

    /// Find or create the graph of a `(role, scope)` key.
    pub fn ensure_graph(&self, key: &GraphKey) -> Result<Graph, CurioError> {
        self.store.write(|tx| MergeEngine::ensure_graph(tx, key))
    }

    /// Promote one edge into the curated graph of its scope.
    pub fn promote(&self, edge_id: EdgeId, curator: &UserId) -> Result<PromotionOutcome, CurioError> {
        Self::check_user(curator, "curator")?;
        let outcome = self
            .store
            .write(|tx| MergeEngine::promote(tx, edge_id, curator))?;
        tracing::info!(edge_id = %edge_id, curator = %curator, outcome = ?outcome, "promotion");
        Ok(outcome)
    }

    /// Mark an edge as rejected.
    pub fn reject(&self, edge_id: EdgeId, curator: &UserId) -> Result<Edge, CurioError> {
        Self::check_user(curator, "curator")?;
        self.store
            .write(|tx| MergeEngine::reject(tx, edge_id, curator))
    }

    /// Flag an edge for review.
    pub fn flag_for_review(&self, edge_id: EdgeId, curator: &UserId) -> Result<Edge, CurioError> {
        Self::check_user(curator, "curator")?;
        self.store
            .write(|tx| MergeEngine::flag_for_review(tx, edge_id, curator))
    }

    // =========================================================================
    // CURATION & VOTING
    // =========================================================================

    /// Apply a batch of curator decisions.
    pub fn process_batch(&self, batch: &CurationBatch) -> Result<BatchSummary, CurioError> {
        CurationOrchestrator::process_batch(self.store.as_ref(), batch)
    }

    /// Cast or replace a vote and recompute the edge's confidence.
    pub fn cast_vote(&self, request: VoteRequest) -> Result<VoteOutcome, CurioError> {
        VotingService::cast_vote(self.store.as_ref(), self.config.consensus, request)
    }

    /// Live votes on an edge.
    pub fn votes_for(&self, edge_id: EdgeId) -> Result<Vec<Vote>, CurioError> {
        VotingService::votes_for(self.store.as_ref(), edge_id)
    }

    // =========================================================================
    // INGESTION
    // =========================================================================

    /// Write a learner graph document in one transaction.
    pub fn ingest(&self, doc: &LearnerGraphDoc) -> Result<IngestReport, CurioError> {
        Ingestor::validate(doc)?;
        self.store.write(|tx| Ingestor::ingest(tx, doc))
    }

    // =========================================================================
    // READS
    // =========================================================================

    /// All graphs, ordered by id.
    pub fn graphs(&self) -> Result<Vec<Graph>, CurioError> {
        self.store.read(|tx| tx.graphs())
    }

    /// Get an edge by id.
    pub fn edge(&self, edge_id: EdgeId) -> Result<Edge, CurioError> {
        self.store
            .read(|tx| tx.edge(edge_id))?
            .ok_or_else(|| CurioError::edge_not_found(edge_id))
    }

    /// Evidence attached to an edge.
    pub fn evidence_for(&self, edge_id: EdgeId) -> Result<Vec<Evidence>, CurioError> {
        self.store.read(|tx| {
            if tx.edge(edge_id)?.is_none() {
                return Err(CurioError::edge_not_found(edge_id));
            }
            tx.evidence_for(edge_id)
        })
    }

    /// Nodes and edges of one graph.
    pub fn graph_snapshot(&self, graph_id: GraphId) -> Result<GraphSnapshot, CurioError> {
        self.store.read(|tx| {
            let graph = tx
                .graph(graph_id)?
                .ok_or_else(|| CurioError::graph_not_found(graph_id))?;
            let nodes = tx.nodes_in_graph(graph_id)?;
            let mut edges = Vec::new();
            for edge in tx.edges_in_graph(graph_id)? {
                let evidence_count = tx.evidence_for(edge.id)?.len();
                let status = edge.status.display_status();
                edges.push(EdgeView {
                    edge,
                    evidence_count,
                    status,
                });
            }
            Ok(GraphSnapshot {
                graph,
                nodes,
                edges,
            })
        })
    }

    /// Row counts of the store.
    pub fn stats(&self) -> Result<StoreStats, CurioError> {
        self.store.read(|tx| tx.stats())
    }

    fn check_user(user: &UserId, role: &str) -> Result<(), CurioError> {
        if user.as_str().trim().is_empty() {
            return Err(CurioError::Validation(format!("{} id is empty", role)));
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curation::{BatchItem, CurationAction};
    use crate::ingest::{EdgeDoc, NodeDoc};
    use crate::types::{EdgeType, GraphRole, Scope, ScopeType, Source, VoteValue};
    use std::collections::BTreeMap;

    fn engine() -> CurationEngine {
        CurationEngine::new(StorageBackend::in_memory(), EngineConfig::default())
    }

    fn seed(engine: &CurationEngine) -> IngestReport {
        let node = |label: &str| NodeDoc {
            label: label.to_string(),
            slug: None,
            confidence_bp: 5_000,
            source: Source::User,
        };
        engine
            .ingest(&LearnerGraphDoc {
                scope: Scope::new(ScopeType::Institution, "uni").with_content("bio"),
                nodes: vec![node("Cell"), node("Nucleus")],
                edges: vec![EdgeDoc {
                    from: "nucleus".to_string(),
                    to: "cell".to_string(),
                    edge_type: EdgeType::PartOf,
                    confidence_bp: 5_000,
                    source: Source::Ai,
                    rationale: BTreeMap::new(),
                    evidence: Vec::new(),
                }],
            })
            .expect("ingest")
    }

    #[test]
    fn snapshot_reflects_status_and_promotion() {
        let engine = engine();
        let report = seed(&engine);
        let curator = UserId::new("curator");

        let outcome = engine.promote(report.edges[0], &curator).expect("promote");
        engine.reject(report.edges[0], &curator).expect("reject");

        let learner = engine.graph_snapshot(report.graph_id).expect("learner");
        assert_eq!(learner.edges[0].status, DisplayStatus::Rejected);

        let curated_edge = engine.edge(outcome.edge_id()).expect("curated edge");
        let curated = engine
            .graph_snapshot(curated_edge.graph_id)
            .expect("curated");
        assert_eq!(curated.graph.key.role, GraphRole::Curated);
        assert_eq!(curated.nodes.len(), 2);
        assert_eq!(curated.edges[0].status, DisplayStatus::Active);
    }

    #[test]
    fn batch_then_vote() {
        let engine = engine();
        let report = seed(&engine);

        let summary = engine
            .process_batch(&CurationBatch {
                diff_id: "diff-1".to_string(),
                curator: UserId::new("curator"),
                items: vec![BatchItem {
                    edge_id: report.edges[0],
                    action: CurationAction::Promote,
                }],
            })
            .expect("batch");
        assert_eq!(summary.promoted, 1);

        let outcome = engine
            .cast_vote(VoteRequest {
                user_id: UserId::new("ana"),
                edge_id: report.edges[0],
                value: VoteValue::Up,
                comment: Some("clear".to_string()),
            })
            .expect("vote");
        assert_eq!(outcome.confidence.bp(), 7_500);
        assert_eq!(engine.votes_for(report.edges[0]).expect("votes").len(), 1);
        assert_eq!(engine.stats().expect("stats").graphs, 2);
    }

    #[test]
    fn missing_graph_snapshot_is_not_found() {
        assert!(engine().graph_snapshot(GraphId(7)).is_err_and(|e| e.is_not_found()));
    }

    #[test]
    fn blank_curator_is_rejected() {
        let engine = engine();
        let report = seed(&engine);
        let result = engine.promote(report.edges[0], &UserId::new(" "));
        assert!(matches!(result, Err(CurioError::Validation(_))));
    }

    #[test]
    fn ensure_graph_rejects_blank_scope_and_is_idempotent() {
        let engine = engine();
        let blank = GraphKey::new(GraphRole::Curated, Scope::new(ScopeType::User, "  "));
        assert!(matches!(
            engine.ensure_graph(&blank),
            Err(CurioError::Validation(_))
        ));
        assert_eq!(engine.stats().expect("stats").graphs, 0);

        let key = GraphKey::new(GraphRole::Curated, Scope::new(ScopeType::User, "ana"));
        let first = engine.ensure_graph(&key).expect("first");
        let second = engine.ensure_graph(&key).expect("second");
        assert_eq!(first.id, second.id);
    }
}
