//! # In-memory Store
//!
//! `BTreeMap` state behind a mutex. A write transaction runs against a copy
//! of the state; the copy replaces the live state only when the transaction
//! closure returns `Ok`. Holding the mutex for the whole transaction
//! serializes writers.
//!
//! Every write clones the whole state, so a write costs O(total rows). This
//! backend is meant for tests, demos and small scratch sessions; use the
//! redb backend for real workloads.

use super::{
    CurationStore, NewEdge, NewEvidence, NewNode, StoreRead, StoreStats, StoreWrite,
    check_edge_update, check_new_edge, check_new_node, conflict_edge, conflict_graph,
    conflict_node,
};
use crate::types::{
    CurioError, Edge, EdgeId, EdgeKey, EdgeStatus, Evidence, EvidenceId, Graph, GraphId, GraphKey,
    Node, NodeId, Slug, Timestamp, UserId, Vote,
};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    graphs: BTreeMap<GraphId, Graph>,
    graph_index: BTreeMap<GraphKey, GraphId>,
    nodes: BTreeMap<NodeId, Node>,
    slug_index: BTreeMap<(GraphId, Slug), NodeId>,
    edges: BTreeMap<EdgeId, Edge>,
    edge_index: BTreeMap<EdgeKey, EdgeId>,
    evidence: BTreeMap<(EdgeId, EvidenceId), Evidence>,
    votes: BTreeMap<(EdgeId, UserId), Vote>,
    next_graph_id: u64,
    next_node_id: u64,
    next_edge_id: u64,
    next_evidence_id: u64,
}

/// Volatile store for tests, demos and the `memory` backend.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, CurioError> {
        self.state
            .lock()
            .map_err(|_| CurioError::Storage("memory store lock poisoned".to_string()))
    }
}

impl CurationStore for MemoryStore {
    fn read<T, F>(&self, f: F) -> Result<T, CurioError>
    where
        F: FnOnce(&dyn StoreRead) -> Result<T, CurioError>,
    {
        let guard = self.lock()?;
        f(&*guard)
    }

    fn write<T, F>(&self, f: F) -> Result<T, CurioError>
    where
        F: FnOnce(&mut dyn StoreWrite) -> Result<T, CurioError>,
    {
        let mut guard = self.lock()?;
        let mut draft = guard.clone();
        let out = f(&mut draft)?;
        *guard = draft;
        Ok(out)
    }
}

fn take_id(counter: &mut u64) -> u64 {
    let id = *counter;
    *counter = counter.saturating_add(1);
    id
}

impl StoreRead for MemoryState {
    fn graph(&self, id: GraphId) -> Result<Option<Graph>, CurioError> {
        Ok(self.graphs.get(&id).cloned())
    }

    fn graph_by_key(&self, key: &GraphKey) -> Result<Option<Graph>, CurioError> {
        Ok(self
            .graph_index
            .get(key)
            .and_then(|id| self.graphs.get(id))
            .cloned())
    }

    fn graphs(&self) -> Result<Vec<Graph>, CurioError> {
        Ok(self.graphs.values().cloned().collect())
    }

    fn node(&self, id: NodeId) -> Result<Option<Node>, CurioError> {
        Ok(self.nodes.get(&id).cloned())
    }

    fn node_by_slug(&self, graph: GraphId, slug: &Slug) -> Result<Option<Node>, CurioError> {
        Ok(self
            .slug_index
            .get(&(graph, slug.clone()))
            .and_then(|id| self.nodes.get(id))
            .cloned())
    }

    fn nodes_in_graph(&self, graph: GraphId) -> Result<Vec<Node>, CurioError> {
        Ok(self
            .nodes
            .values()
            .filter(|n| n.graph_id == graph)
            .cloned()
            .collect())
    }

    fn edge(&self, id: EdgeId) -> Result<Option<Edge>, CurioError> {
        Ok(self.edges.get(&id).cloned())
    }

    fn edge_by_key(&self, key: &EdgeKey) -> Result<Option<Edge>, CurioError> {
        Ok(self
            .edge_index
            .get(key)
            .and_then(|id| self.edges.get(id))
            .cloned())
    }

    fn edges_in_graph(&self, graph: GraphId) -> Result<Vec<Edge>, CurioError> {
        Ok(self
            .edges
            .values()
            .filter(|e| e.graph_id == graph)
            .cloned()
            .collect())
    }

    fn evidence_for(&self, edge: EdgeId) -> Result<Vec<Evidence>, CurioError> {
        Ok(self
            .evidence
            .range((edge, EvidenceId(0))..=(edge, EvidenceId(u64::MAX)))
            .map(|(_, ev)| ev.clone())
            .collect())
    }

    fn votes_for(&self, edge: EdgeId) -> Result<Vec<Vote>, CurioError> {
        Ok(self
            .votes
            .range((edge, UserId::new(""))..)
            .take_while(|((e, _), _)| *e == edge)
            .map(|(_, vote)| vote.clone())
            .collect())
    }

    fn stats(&self) -> Result<StoreStats, CurioError> {
        Ok(StoreStats {
            graphs: self.graphs.len() as u64,
            nodes: self.nodes.len() as u64,
            edges: self.edges.len() as u64,
            evidence: self.evidence.len() as u64,
            votes: self.votes.len() as u64,
        })
    }
}

impl StoreWrite for MemoryState {
    fn insert_graph(&mut self, key: GraphKey) -> Result<Graph, CurioError> {
        if self.graph_index.contains_key(&key) {
            return Err(conflict_graph(&key));
        }
        let graph = Graph {
            id: GraphId(take_id(&mut self.next_graph_id)),
            key: key.clone(),
            created_at: Timestamp::now(),
        };
        self.graph_index.insert(key, graph.id);
        self.graphs.insert(graph.id, graph.clone());
        Ok(graph)
    }

    fn insert_node(&mut self, node: NewNode) -> Result<Node, CurioError> {
        check_new_node(&*self, &node)?;
        let index_key = (node.graph_id, node.slug.clone());
        if self.slug_index.contains_key(&index_key) {
            return Err(conflict_node(node.graph_id, &node.slug));
        }
        let created = Node {
            id: NodeId(take_id(&mut self.next_node_id)),
            graph_id: node.graph_id,
            label: node.label,
            slug: node.slug,
            confidence: node.confidence,
            source: node.source,
        };
        self.slug_index.insert(index_key, created.id);
        self.nodes.insert(created.id, created.clone());
        Ok(created)
    }

    fn insert_edge(&mut self, edge: NewEdge) -> Result<Edge, CurioError> {
        check_new_edge(&*self, &edge)?;
        let key = edge.key();
        if self.edge_index.contains_key(&key) {
            return Err(conflict_edge(&key));
        }
        let created = Edge {
            id: EdgeId(take_id(&mut self.next_edge_id)),
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
        self.edge_index.insert(key, created.id);
        self.edges.insert(created.id, created.clone());
        Ok(created)
    }

    fn update_edge(&mut self, edge: &Edge) -> Result<(), CurioError> {
        let existing = self
            .edges
            .get_mut(&edge.id)
            .ok_or_else(|| CurioError::edge_not_found(edge.id))?;
        check_edge_update(existing, edge)?;
        *existing = edge.clone();
        Ok(())
    }

    fn insert_evidence(
        &mut self,
        edge: EdgeId,
        evidence: NewEvidence,
    ) -> Result<Evidence, CurioError> {
        if !self.edges.contains_key(&edge) {
            return Err(CurioError::edge_not_found(edge));
        }
        let created = Evidence {
            id: EvidenceId(take_id(&mut self.next_evidence_id)),
            edge_id: edge,
            anchor: evidence.anchor,
            excerpt: evidence.excerpt,
            highlight_id: evidence.highlight_id,
            note_id: evidence.note_id,
        };
        self.evidence.insert((edge, created.id), created.clone());
        Ok(created)
    }

    fn upsert_vote(&mut self, vote: Vote) -> Result<(), CurioError> {
        if !self.edges.contains_key(&vote.edge_id) {
            return Err(CurioError::edge_not_found(vote.edge_id));
        }
        self.votes
            .insert((vote.edge_id, vote.user_id.clone()), vote);
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confidence::Confidence;
    use crate::types::{EdgeType, GraphRole, Scope, ScopeType, Source, VoteValue};
    use std::collections::BTreeMap;

    fn learner_key() -> GraphKey {
        GraphKey::new(GraphRole::Learner, Scope::new(ScopeType::User, "u-1"))
    }

    fn new_node(graph: GraphId, label: &str) -> NewNode {
        NewNode {
            graph_id: graph,
            label: label.to_string(),
            slug: Slug::normalize(label).expect("slug"),
            confidence: Confidence::from_bp(5_000).expect("bp"),
            source: Source::Ai,
        }
    }

    #[test]
    fn failed_write_leaves_no_trace() {
        let store = MemoryStore::new();
        let result: Result<(), CurioError> = store.write(|tx| {
            tx.insert_graph(learner_key())?;
            Err(CurioError::Validation("abort".to_string()))
        });
        assert!(result.is_err());

        let stats = store.read(|tx| tx.stats()).expect("stats");
        assert_eq!(stats.graphs, 0);
    }

    #[test]
    fn duplicate_graph_key_conflicts() {
        let store = MemoryStore::new();
        store
            .write(|tx| tx.insert_graph(learner_key()))
            .expect("first");
        let second = store.write(|tx| tx.insert_graph(learner_key()));
        assert!(matches!(second, Err(CurioError::Conflict(_))));
    }

    #[test]
    fn duplicate_slug_conflicts_within_graph_only() {
        let store = MemoryStore::new();
        store
            .write(|tx| {
                let a = tx.insert_graph(learner_key())?;
                let b = tx.insert_graph(GraphKey::new(
                    GraphRole::Curated,
                    Scope::new(ScopeType::User, "u-1"),
                ))?;
                tx.insert_node(new_node(a.id, "Cell"))?;
                tx.insert_node(new_node(b.id, "Cell"))?;
                let dup = tx.insert_node(new_node(a.id, "cell"));
                assert!(matches!(dup, Err(CurioError::Conflict(_))));
                Ok(())
            })
            .expect("write");
    }

    #[test]
    fn cross_graph_edge_is_rejected() {
        let store = MemoryStore::new();
        let result = store.write(|tx| {
            let a = tx.insert_graph(learner_key())?;
            let b = tx.insert_graph(GraphKey::new(
                GraphRole::Curated,
                Scope::new(ScopeType::User, "u-1"),
            ))?;
            let x = tx.insert_node(new_node(a.id, "x"))?;
            let y = tx.insert_node(new_node(b.id, "y"))?;
            tx.insert_edge(NewEdge {
                graph_id: a.id,
                from: x.id,
                to: y.id,
                edge_type: EdgeType::Explains,
                confidence: Confidence::ZERO,
                source: Source::User,
                rationale: BTreeMap::new(),
                provenance: None,
            })
        });
        assert!(matches!(result, Err(CurioError::Validation(_))));
    }

    #[test]
    fn votes_are_grouped_per_edge() {
        let store = MemoryStore::new();
        let (e1, e2) = store
            .write(|tx| {
                let g = tx.insert_graph(learner_key())?;
                let x = tx.insert_node(new_node(g.id, "x"))?;
                let y = tx.insert_node(new_node(g.id, "y"))?;
                let mk = |edge_type| NewEdge {
                    graph_id: g.id,
                    from: x.id,
                    to: y.id,
                    edge_type,
                    confidence: Confidence::ZERO,
                    source: Source::User,
                    rationale: BTreeMap::new(),
                    provenance: None,
                };
                let e1 = tx.insert_edge(mk(EdgeType::Explains))?;
                let e2 = tx.insert_edge(mk(EdgeType::PartOf))?;
                for (edge, user) in [(e1.id, "a"), (e1.id, "b"), (e2.id, "a")] {
                    tx.upsert_vote(Vote {
                        edge_id: edge,
                        user_id: UserId::new(user),
                        value: VoteValue::Up,
                        comment: None,
                        cast_at: Timestamp(0),
                    })?;
                }
                Ok((e1.id, e2.id))
            })
            .expect("write");

        let (v1, v2) = store
            .read(|tx| Ok((tx.votes_for(e1)?, tx.votes_for(e2)?)))
            .expect("read");
        assert_eq!(v1.len(), 2);
        assert_eq!(v2.len(), 1);
    }
}
