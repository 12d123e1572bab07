//! # redb-backed Store
//!
//! A disk-backed curation store using the redb embedded database, providing:
//! - ACID transactions
//! - Crash safety (copy-on-write B-trees)
//! - MVCC (concurrent readers, single writer)
//!
//! redb admits one write transaction at a time, so the read-then-write
//! sequences of promotion and voting cannot interleave with another writer.
//! The unique-key tables below make the dedup invariants structural.
//!
//! Records are encoded with postcard.

use super::{
    CurationStore, NewEdge, NewEvidence, NewNode, StoreRead, StoreStats, StoreWrite,
    check_edge_update, check_new_edge, check_new_node, conflict_edge, conflict_graph,
    conflict_node,
};
use crate::types::{
    CurioError, Edge, EdgeId, EdgeKey, EdgeStatus, Evidence, EvidenceId, Graph, GraphId, GraphKey,
    Node, NodeId, Slug, Timestamp, Vote,
};
use redb::{
    Database, ReadTransaction, ReadableDatabase, ReadableTable, ReadableTableMetadata,
    TableDefinition, WriteTransaction,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;

/// Table for graphs: GraphId(u64) -> serialized Graph bytes
const GRAPHS: TableDefinition<u64, &[u8]> = TableDefinition::new("graphs");

/// Unique index: serialized GraphKey -> GraphId
const GRAPH_KEYS: TableDefinition<&[u8], u64> = TableDefinition::new("graph_keys");

/// Table for nodes: NodeId(u64) -> serialized Node bytes
const NODES: TableDefinition<u64, &[u8]> = TableDefinition::new("nodes");

/// Unique index: (graph_id, slug) -> NodeId
const NODE_SLUGS: TableDefinition<(u64, &str), u64> = TableDefinition::new("node_slugs");

/// Table for edges: EdgeId(u64) -> serialized Edge bytes
const EDGES: TableDefinition<u64, &[u8]> = TableDefinition::new("edges");

/// Unique index: (graph_id, from, to, edge_type code) -> EdgeId
const EDGE_KEYS: TableDefinition<(u64, u64, u64, u8), u64> = TableDefinition::new("edge_keys");

/// Table for evidence: (edge_id, evidence_id) -> serialized Evidence bytes
const EVIDENCE: TableDefinition<(u64, u64), &[u8]> = TableDefinition::new("evidence");

/// Table for votes: (edge_id, user_id) -> serialized Vote bytes
const VOTES: TableDefinition<(u64, &str), &[u8]> = TableDefinition::new("votes");

/// Table for metadata: key string -> value u64
const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

const NEXT_GRAPH_ID: &str = "next_graph_id";
const NEXT_NODE_ID: &str = "next_node_id";
const NEXT_EDGE_ID: &str = "next_edge_id";
const NEXT_EVIDENCE_ID: &str = "next_evidence_id";

fn storage<E: std::fmt::Display>(e: E) -> CurioError {
    CurioError::Storage(e.to_string())
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, CurioError> {
    postcard::to_allocvec(value).map_err(|e| CurioError::Serialization(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CurioError> {
    postcard::from_bytes(bytes).map_err(|e| CurioError::Serialization(e.to_string()))
}

fn edge_index_key(key: &EdgeKey) -> (u64, u64, u64, u8) {
    (key.graph_id.0, key.from.0, key.to.0, key.edge_type.code())
}

// =============================================================================
// TABLE HELPERS
// =============================================================================

fn get_record<T: DeserializeOwned>(
    table: &impl ReadableTable<u64, &'static [u8]>,
    id: u64,
) -> Result<Option<T>, CurioError> {
    match table.get(id).map_err(storage)? {
        Some(guard) => Ok(Some(decode(guard.value())?)),
        None => Ok(None),
    }
}

fn all_records<T: DeserializeOwned>(
    table: &impl ReadableTable<u64, &'static [u8]>,
) -> Result<Vec<T>, CurioError> {
    let mut out = Vec::new();
    for entry in table.iter().map_err(storage)? {
        let (_, value) = entry.map_err(storage)?;
        out.push(decode(value.value())?);
    }
    Ok(out)
}

/// Implements `StoreRead` for a transaction wrapper with a `txn` field.
///
/// Read-only and write transactions expose the same `open_table` shape but
/// return different table types, both `ReadableTable`.
macro_rules! impl_store_read {
    ($ty:ident) => {
        impl StoreRead for $ty<'_> {
            fn graph(&self, id: GraphId) -> Result<Option<Graph>, CurioError> {
                let table = self.txn.open_table(GRAPHS).map_err(storage)?;
                get_record(&table, id.0)
            }

            fn graph_by_key(&self, key: &GraphKey) -> Result<Option<Graph>, CurioError> {
                let encoded = encode(key)?;
                let id = {
                    let index = self.txn.open_table(GRAPH_KEYS).map_err(storage)?;
                    index
                        .get(encoded.as_slice())
                        .map_err(storage)?
                        .map(|v| v.value())
                };
                match id {
                    Some(id) => self.graph(GraphId(id)),
                    None => Ok(None),
                }
            }

            fn graphs(&self) -> Result<Vec<Graph>, CurioError> {
                let table = self.txn.open_table(GRAPHS).map_err(storage)?;
                all_records(&table)
            }

            fn node(&self, id: NodeId) -> Result<Option<Node>, CurioError> {
                let table = self.txn.open_table(NODES).map_err(storage)?;
                get_record(&table, id.0)
            }

            fn node_by_slug(
                &self,
                graph: GraphId,
                slug: &Slug,
            ) -> Result<Option<Node>, CurioError> {
                let id = {
                    let index = self.txn.open_table(NODE_SLUGS).map_err(storage)?;
                    index
                        .get((graph.0, slug.as_str()))
                        .map_err(storage)?
                        .map(|v| v.value())
                };
                match id {
                    Some(id) => self.node(NodeId(id)),
                    None => Ok(None),
                }
            }

            fn nodes_in_graph(&self, graph: GraphId) -> Result<Vec<Node>, CurioError> {
                let ids = {
                    let index = self.txn.open_table(NODE_SLUGS).map_err(storage)?;
                    let mut ids = Vec::new();
                    for entry in index
                        .range((graph.0, "")..(graph.0.saturating_add(1), ""))
                        .map_err(storage)?
                    {
                        let (_, value) = entry.map_err(storage)?;
                        ids.push(value.value());
                    }
                    ids
                };
                let table = self.txn.open_table(NODES).map_err(storage)?;
                let mut nodes = Vec::with_capacity(ids.len());
                for id in ids {
                    if let Some(node) = get_record(&table, id)? {
                        nodes.push(node);
                    }
                }
                nodes.sort_by_key(|n: &Node| n.id);
                Ok(nodes)
            }

            fn edge(&self, id: EdgeId) -> Result<Option<Edge>, CurioError> {
                let table = self.txn.open_table(EDGES).map_err(storage)?;
                get_record(&table, id.0)
            }

            fn edge_by_key(&self, key: &EdgeKey) -> Result<Option<Edge>, CurioError> {
                let id = {
                    let index = self.txn.open_table(EDGE_KEYS).map_err(storage)?;
                    index
                        .get(edge_index_key(key))
                        .map_err(storage)?
                        .map(|v| v.value())
                };
                match id {
                    Some(id) => self.edge(EdgeId(id)),
                    None => Ok(None),
                }
            }

            fn edges_in_graph(&self, graph: GraphId) -> Result<Vec<Edge>, CurioError> {
                let ids = {
                    let index = self.txn.open_table(EDGE_KEYS).map_err(storage)?;
                    let mut ids = Vec::new();
                    for entry in index
                        .range((graph.0, 0u64, 0u64, 0u8)..=(graph.0, u64::MAX, u64::MAX, u8::MAX))
                        .map_err(storage)?
                    {
                        let (_, value) = entry.map_err(storage)?;
                        ids.push(value.value());
                    }
                    ids
                };
                let table = self.txn.open_table(EDGES).map_err(storage)?;
                let mut edges = Vec::with_capacity(ids.len());
                for id in ids {
                    if let Some(edge) = get_record(&table, id)? {
                        edges.push(edge);
                    }
                }
                edges.sort_by_key(|e: &Edge| e.id);
                Ok(edges)
            }

            fn evidence_for(&self, edge: EdgeId) -> Result<Vec<Evidence>, CurioError> {
                let table = self.txn.open_table(EVIDENCE).map_err(storage)?;
                let mut out = Vec::new();
                for entry in table
                    .range((edge.0, 0u64)..=(edge.0, u64::MAX))
                    .map_err(storage)?
                {
                    let (_, value) = entry.map_err(storage)?;
                    out.push(decode(value.value())?);
                }
                Ok(out)
            }

            fn votes_for(&self, edge: EdgeId) -> Result<Vec<Vote>, CurioError> {
                let table = self.txn.open_table(VOTES).map_err(storage)?;
                let mut out = Vec::new();
                for entry in table
                    .range((edge.0, "")..(edge.0.saturating_add(1), ""))
                    .map_err(storage)?
                {
                    let (_, value) = entry.map_err(storage)?;
                    out.push(decode(value.value())?);
                }
                Ok(out)
            }

            fn stats(&self) -> Result<StoreStats, CurioError> {
                Ok(StoreStats {
                    graphs: self.txn.open_table(GRAPHS).map_err(storage)?.len().map_err(storage)?,
                    nodes: self.txn.open_table(NODES).map_err(storage)?.len().map_err(storage)?,
                    edges: self.txn.open_table(EDGES).map_err(storage)?.len().map_err(storage)?,
                    evidence: self
                        .txn
                        .open_table(EVIDENCE)
                        .map_err(storage)?
                        .len()
                        .map_err(storage)?,
                    votes: self.txn.open_table(VOTES).map_err(storage)?.len().map_err(storage)?,
                })
            }
        }
    };
}

// =============================================================================
// TRANSACTION WRAPPERS
// =============================================================================

struct RedbReader<'t> {
    txn: &'t ReadTransaction,
}

struct RedbWriter<'t> {
    txn: &'t WriteTransaction,
}

impl_store_read!(RedbReader);
impl_store_read!(RedbWriter);

impl RedbWriter<'_> {
    /// Allocate the next id of a counter inside this transaction.
    fn next_id(&self, counter: &str) -> Result<u64, CurioError> {
        let mut meta = self.txn.open_table(METADATA).map_err(storage)?;
        let id = meta
            .get(counter)
            .map_err(storage)?
            .map(|v| v.value())
            .unwrap_or(0);
        meta.insert(counter, id.saturating_add(1))
            .map_err(storage)?;
        Ok(id)
    }

    fn put_edge(&self, edge: &Edge) -> Result<(), CurioError> {
        let bytes = encode(edge)?;
        let mut table = self.txn.open_table(EDGES).map_err(storage)?;
        table
            .insert(edge.id.0, bytes.as_slice())
            .map_err(storage)?;
        Ok(())
    }
}

impl StoreWrite for RedbWriter<'_> {
    fn insert_graph(&mut self, key: GraphKey) -> Result<Graph, CurioError> {
        let encoded_key = encode(&key)?;
        {
            let index = self.txn.open_table(GRAPH_KEYS).map_err(storage)?;
            if index
                .get(encoded_key.as_slice())
                .map_err(storage)?
                .is_some()
            {
                return Err(conflict_graph(&key));
            }
        }

        let graph = Graph {
            id: GraphId(self.next_id(NEXT_GRAPH_ID)?),
            key,
            created_at: Timestamp::now(),
        };
        let bytes = encode(&graph)?;
        {
            let mut table = self.txn.open_table(GRAPHS).map_err(storage)?;
            table
                .insert(graph.id.0, bytes.as_slice())
                .map_err(storage)?;
        }
        {
            let mut index = self.txn.open_table(GRAPH_KEYS).map_err(storage)?;
            index
                .insert(encoded_key.as_slice(), graph.id.0)
                .map_err(storage)?;
        }
        Ok(graph)
    }

    fn insert_node(&mut self, node: NewNode) -> Result<Node, CurioError> {
        check_new_node(&*self, &node)?;
        if self.node_by_slug(node.graph_id, &node.slug)?.is_some() {
            return Err(conflict_node(node.graph_id, &node.slug));
        }

        let created = Node {
            id: NodeId(self.next_id(NEXT_NODE_ID)?),
            graph_id: node.graph_id,
            label: node.label,
            slug: node.slug,
            confidence: node.confidence,
            source: node.source,
        };
        let bytes = encode(&created)?;
        {
            let mut table = self.txn.open_table(NODES).map_err(storage)?;
            table
                .insert(created.id.0, bytes.as_slice())
                .map_err(storage)?;
        }
        {
            let mut index = self.txn.open_table(NODE_SLUGS).map_err(storage)?;
            index
                .insert((created.graph_id.0, created.slug.as_str()), created.id.0)
                .map_err(storage)?;
        }
        Ok(created)
    }

    fn insert_edge(&mut self, edge: NewEdge) -> Result<Edge, CurioError> {
        check_new_edge(&*self, &edge)?;
        let key = edge.key();
        if self.edge_by_key(&key)?.is_some() {
            return Err(conflict_edge(&key));
        }

        let created = Edge {
            id: EdgeId(self.next_id(NEXT_EDGE_ID)?),
            graph_id: edge.graph_id,
            from: edge.from,
            to: edge.to,
            edge_type: edge.edge_type,
            confidence: edge.confidence,
            source: edge.source,
            rationale: edge.rationale,
            provenance: edge.provenance,
            status: EdgeStatus::default(),
            vote_baseline: None,
        };
        self.put_edge(&created)?;
        {
            let mut index = self.txn.open_table(EDGE_KEYS).map_err(storage)?;
            index
                .insert(edge_index_key(&key), created.id.0)
                .map_err(storage)?;
        }
        Ok(created)
    }

    fn update_edge(&mut self, edge: &Edge) -> Result<(), CurioError> {
        let existing = self
            .edge(edge.id)?
            .ok_or_else(|| CurioError::edge_not_found(edge.id))?;
        check_edge_update(&existing, edge)?;
        self.put_edge(edge)
    }

    fn insert_evidence(
        &mut self,
        edge: EdgeId,
        evidence: NewEvidence,
    ) -> Result<Evidence, CurioError> {
        if self.edge(edge)?.is_none() {
            return Err(CurioError::edge_not_found(edge));
        }
        let created = Evidence {
            id: EvidenceId(self.next_id(NEXT_EVIDENCE_ID)?),
            edge_id: edge,
            anchor: evidence.anchor,
            excerpt: evidence.excerpt,
            highlight_id: evidence.highlight_id,
            note_id: evidence.note_id,
        };
        let bytes = encode(&created)?;
        let mut table = self.txn.open_table(EVIDENCE).map_err(storage)?;
        table
            .insert((edge.0, created.id.0), bytes.as_slice())
            .map_err(storage)?;
        Ok(created)
    }

    fn upsert_vote(&mut self, vote: Vote) -> Result<(), CurioError> {
        if self.edge(vote.edge_id)?.is_none() {
            return Err(CurioError::edge_not_found(vote.edge_id));
        }
        let bytes = encode(&vote)?;
        let mut table = self.txn.open_table(VOTES).map_err(storage)?;
        table
            .insert((vote.edge_id.0, vote.user_id.as_str()), bytes.as_slice())
            .map_err(storage)?;
        Ok(())
    }
}

// =============================================================================
// STORE
// =============================================================================

/// A disk-backed curation store using redb.
pub struct RedbStore {
    db: Database,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create a curation database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CurioError> {
        let db = Database::create(path.as_ref()).map_err(storage)?;

        // Initialize tables if they don't exist
        {
            let write_txn = db.begin_write().map_err(storage)?;
            let _ = write_txn.open_table(GRAPHS).map_err(storage)?;
            let _ = write_txn.open_table(GRAPH_KEYS).map_err(storage)?;
            let _ = write_txn.open_table(NODES).map_err(storage)?;
            let _ = write_txn.open_table(NODE_SLUGS).map_err(storage)?;
            let _ = write_txn.open_table(EDGES).map_err(storage)?;
            let _ = write_txn.open_table(EDGE_KEYS).map_err(storage)?;
            let _ = write_txn.open_table(EVIDENCE).map_err(storage)?;
            let _ = write_txn.open_table(VOTES).map_err(storage)?;
            let _ = write_txn.open_table(METADATA).map_err(storage)?;
            write_txn.commit().map_err(storage)?;
        }

        tracing::debug!(path = %path.as_ref().display(), "opened curation database");
        Ok(Self { db })
    }
}

impl CurationStore for RedbStore {
    fn read<T, F>(&self, f: F) -> Result<T, CurioError>
    where
        F: FnOnce(&dyn StoreRead) -> Result<T, CurioError>,
    {
        let txn = self.db.begin_read().map_err(storage)?;
        let reader = RedbReader { txn: &txn };
        f(&reader)
    }

    fn write<T, F>(&self, f: F) -> Result<T, CurioError>
    where
        F: FnOnce(&mut dyn StoreWrite) -> Result<T, CurioError>,
    {
        let txn = self.db.begin_write().map_err(storage)?;
        let result = {
            let mut writer = RedbWriter { txn: &txn };
            f(&mut writer)
        };
        match result {
            Ok(value) => {
                txn.commit().map_err(storage)?;
                Ok(value)
            }
            Err(e) => {
                if let Err(abort_err) = txn.abort() {
                    tracing::warn!(error = %abort_err, "failed to abort write transaction");
                }
                Err(e)
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
