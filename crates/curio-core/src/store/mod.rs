//! # Graph Store
//!
//! The repository interface the engine persists through, and its backends.
//!
//! - `StoreRead`: lookups by id and by unique key
//! - `StoreWrite`: inserts, in-place edge updates, vote upserts
//! - `CurationStore`: the transaction-scoping primitive
//!
//! A `write` closure either commits as a whole or leaves no trace: returning
//! `Err` from it discards every write made inside it.
//!
//! ## Unique keys
//!
//! Every backend enforces these structurally, on insert:
//! - graphs: `(role, scope)`
//! - nodes: `(graph, slug)`
//! - edges: `(graph, from, to, edge type)`
//! - votes: `(edge, user)`, upserted
//!
//! An insert whose key is taken returns `CurioError::Conflict` and writes
//! nothing.

mod memory;
mod redb_store;

pub use memory::MemoryStore;
pub use redb_store::RedbStore;

use crate::confidence::Confidence;
use crate::types::{
    CurioError, Edge, EdgeId, EdgeKey, EdgeType, Evidence, EvidenceAnchor, Graph, GraphId,
    GraphKey, Node, NodeId, Provenance, Slug, Source, Vote,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

// =============================================================================
// INSERT PAYLOADS
// =============================================================================

/// A node to be created; the store assigns its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNode {
    pub graph_id: GraphId,
    pub label: String,
    pub slug: Slug,
    pub confidence: Confidence,
    pub source: Source,
}

/// An edge to be created; the store assigns its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEdge {
    pub graph_id: GraphId,
    pub from: NodeId,
    pub to: NodeId,
    pub edge_type: EdgeType,
    pub confidence: Confidence,
    pub source: Source,
    pub rationale: BTreeMap<String, String>,
    pub provenance: Option<Provenance>,
}

impl NewEdge {
    #[must_use]
    pub fn key(&self) -> EdgeKey {
        EdgeKey {
            graph_id: self.graph_id,
            from: self.from,
            to: self.to,
            edge_type: self.edge_type,
        }
    }
}

/// Evidence to be attached to an edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct NewEvidence {
    #[serde(default)]
    pub anchor: EvidenceAnchor,
    pub excerpt: String,
    #[serde(default)]
    pub highlight_id: Option<String>,
    #[serde(default)]
    pub note_id: Option<String>,
}

impl From<&Evidence> for NewEvidence {
    fn from(evidence: &Evidence) -> Self {
        Self {
            anchor: evidence.anchor.clone(),
            excerpt: evidence.excerpt.clone(),
            highlight_id: evidence.highlight_id.clone(),
            note_id: evidence.note_id.clone(),
        }
    }
}

/// Row counts of a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StoreStats {
    pub graphs: u64,
    pub nodes: u64,
    pub edges: u64,
    pub evidence: u64,
    pub votes: u64,
}

// =============================================================================
// STORE TRAITS
// =============================================================================

/// Read access inside a transaction.
pub trait StoreRead {
    /// Get a graph by id.
    fn graph(&self, id: GraphId) -> Result<Option<Graph>, CurioError>;

    /// Get the graph holding a `(role, scope)` key.
    fn graph_by_key(&self, key: &GraphKey) -> Result<Option<Graph>, CurioError>;

    /// All graphs, ordered by id.
    fn graphs(&self) -> Result<Vec<Graph>, CurioError>;

    /// Get a node by id.
    fn node(&self, id: NodeId) -> Result<Option<Node>, CurioError>;

    /// Get the node of a graph holding a slug.
    fn node_by_slug(&self, graph: GraphId, slug: &Slug) -> Result<Option<Node>, CurioError>;

    /// All nodes of a graph.
    fn nodes_in_graph(&self, graph: GraphId) -> Result<Vec<Node>, CurioError>;

    /// Get an edge by id.
    fn edge(&self, id: EdgeId) -> Result<Option<Edge>, CurioError>;

    /// Get the edge holding a deduplication key.
    fn edge_by_key(&self, key: &EdgeKey) -> Result<Option<Edge>, CurioError>;

    /// All edges of a graph.
    fn edges_in_graph(&self, graph: GraphId) -> Result<Vec<Edge>, CurioError>;

    /// Evidence attached to an edge, ordered by id.
    fn evidence_for(&self, edge: EdgeId) -> Result<Vec<Evidence>, CurioError>;

    /// Live votes on an edge, ordered by user.
    fn votes_for(&self, edge: EdgeId) -> Result<Vec<Vote>, CurioError>;

    /// Row counts.
    fn stats(&self) -> Result<StoreStats, CurioError>;
}

/// Write access inside a transaction.
pub trait StoreWrite: StoreRead {
    /// Create a graph. `Conflict` if the key is taken.
    fn insert_graph(&mut self, key: GraphKey) -> Result<Graph, CurioError>;

    /// Create a node. `Conflict` if the slug is taken in that graph.
    fn insert_node(&mut self, node: NewNode) -> Result<Node, CurioError>;

    /// Create an edge. `Conflict` if the dedup key is taken; `Validation` if
    /// an endpoint is missing or lives in another graph.
    fn insert_edge(&mut self, edge: NewEdge) -> Result<Edge, CurioError>;

    /// Overwrite the mutable fields of an existing edge.
    ///
    /// The dedup key of an edge is immutable; changing it is a `Validation`
    /// error.
    fn update_edge(&mut self, edge: &Edge) -> Result<(), CurioError>;

    /// Attach evidence to an existing edge.
    fn insert_evidence(
        &mut self,
        edge: EdgeId,
        evidence: NewEvidence,
    ) -> Result<Evidence, CurioError>;

    /// Insert or replace the vote of `(vote.edge_id, vote.user_id)`.
    fn upsert_vote(&mut self, vote: Vote) -> Result<(), CurioError>;
}

/// A store that scopes reads and writes into transactions.
pub trait CurationStore: Send + Sync {
    /// Run `f` against a consistent read view.
    fn read<T, F>(&self, f: F) -> Result<T, CurioError>
    where
        F: FnOnce(&dyn StoreRead) -> Result<T, CurioError>;

    /// Run `f` in a write transaction, committing only if it returns `Ok`.
    fn write<T, F>(&self, f: F) -> Result<T, CurioError>
    where
        F: FnOnce(&mut dyn StoreWrite) -> Result<T, CurioError>;
}

// =============================================================================
// SHARED CHECKS
// =============================================================================

/// Reject a node whose graph does not exist.
pub(crate) fn check_new_node<S: StoreRead + ?Sized>(
    store: &S,
    node: &NewNode,
) -> Result<(), CurioError> {
    if store.graph(node.graph_id)?.is_none() {
        return Err(CurioError::graph_not_found(node.graph_id));
    }
    Ok(())
}

/// Reject an edge whose endpoints are missing or belong to another graph.
pub(crate) fn check_new_edge<S: StoreRead + ?Sized>(
    store: &S,
    edge: &NewEdge,
) -> Result<(), CurioError> {
    if store.graph(edge.graph_id)?.is_none() {
        return Err(CurioError::graph_not_found(edge.graph_id));
    }
    for endpoint in [edge.from, edge.to] {
        match store.node(endpoint)? {
            Some(node) if node.graph_id == edge.graph_id => {}
            Some(node) => {
                return Err(CurioError::Validation(format!(
                    "node {} belongs to graph {}, not graph {}",
                    endpoint, node.graph_id, edge.graph_id
                )));
            }
            None => {
                return Err(CurioError::Validation(format!(
                    "edge endpoint {} does not exist",
                    endpoint
                )));
            }
        }
    }
    Ok(())
}

/// Reject an update that would move an edge to another dedup key.
pub(crate) fn check_edge_update(existing: &Edge, updated: &Edge) -> Result<(), CurioError> {
    if existing.key() != updated.key() {
        return Err(CurioError::Validation(format!(
            "edge {} key is immutable",
            updated.id
        )));
    }
    Ok(())
}

pub(crate) fn conflict_graph(key: &GraphKey) -> CurioError {
    CurioError::Conflict(format!("{} graph already exists for {}", key.role.as_str(), key.scope))
}

pub(crate) fn conflict_node(graph: GraphId, slug: &Slug) -> CurioError {
    CurioError::Conflict(format!("node '{}' already exists in graph {}", slug, graph))
}

pub(crate) fn conflict_edge(key: &EdgeKey) -> CurioError {
    CurioError::Conflict(format!(
        "edge {} -[{}]-> {} already exists in graph {}",
        key.from, key.edge_type, key.to, key.graph_id
    ))
}

// =============================================================================
// STORAGE BACKEND
// =============================================================================

/// Runtime choice of store.
#[derive(Debug)]
pub enum StorageBackend {
    /// In-memory maps (fast, volatile).
    InMemory(MemoryStore),
    /// Disk-backed store using redb (ACID, persistent).
    Persistent(RedbStore),
}

impl StorageBackend {
    /// A fresh in-memory backend.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::InMemory(MemoryStore::new())
    }

    /// Open or create a redb database at the given path.
    pub fn open_redb(path: impl AsRef<Path>) -> Result<Self, CurioError> {
        Ok(Self::Persistent(RedbStore::open(path)?))
    }

    /// Check if using persistent storage.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        matches!(self, Self::Persistent(_))
    }
}

impl Default for StorageBackend {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl CurationStore for StorageBackend {
    fn read<T, F>(&self, f: F) -> Result<T, CurioError>
    where
        F: FnOnce(&dyn StoreRead) -> Result<T, CurioError>,
    {
        match self {
            Self::InMemory(store) => store.read(f),
            Self::Persistent(store) => store.read(f),
        }
    }

    fn write<T, F>(&self, f: F) -> Result<T, CurioError>
    where
        F: FnOnce(&mut dyn StoreWrite) -> Result<T, CurioError>,
    {
        match self {
            Self::InMemory(store) => store.write(f),
            Self::Persistent(store) => store.write(f),
        }
    }
}
