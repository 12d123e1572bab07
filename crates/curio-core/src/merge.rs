//! # Merge Engine
//!
//! Moves vetted learner edges into the curated graph of their scope.
//!
//! - Graphs are resolved by `(role, scope)` and created lazily
//! - Nodes are deduplicated across graphs by slug
//! - Edges are deduplicated by `(graph, from, to, edge type)`
//! - Evidence is deep-copied onto every newly promoted edge
//!
//! Every function here runs inside a caller-provided write transaction, so
//! a promotion either lands completely (nodes, edge, evidence) or not at all.
//!
//! Inserts go first and lookups follow only on `Conflict`: the store's unique
//! keys decide who wins, and the loser reads the winner's row.

use crate::confidence::promoted_confidence;
use crate::store::{NewEdge, NewEvidence, NewNode, StoreWrite};
use crate::types::{
    CurioError, Edge, EdgeId, Graph, GraphId, GraphKey, GraphRole, Node, NodeId, Provenance,
    Source, StatusMark, Timestamp, UserId,
};
use serde::{Deserialize, Serialize};

/// Result of promoting one edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PromotionOutcome {
    /// A new curated edge was created.
    Created { edge_id: EdgeId },
    /// The curated graph already holds this relation; nothing was written.
    Skipped { existing_edge_id: EdgeId },
}

impl PromotionOutcome {
    /// The curated edge the promotion resolved to.
    #[must_use]
    pub fn edge_id(&self) -> EdgeId {
        match self {
            Self::Created { edge_id } => *edge_id,
            Self::Skipped { existing_edge_id } => *existing_edge_id,
        }
    }

    #[must_use]
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }
}

/// Graph merge operations.
pub struct MergeEngine;

impl MergeEngine {
    /// Find the graph of a `(role, scope)` key, creating it if absent.
    pub fn ensure_graph(tx: &mut dyn StoreWrite, key: &GraphKey) -> Result<Graph, CurioError> {
        key.scope.validate()?;

        match tx.insert_graph(key.clone()) {
            Ok(graph) => {
                tracing::debug!(
                    graph_id = %graph.id,
                    role = key.role.as_str(),
                    scope = %key.scope,
                    "created graph"
                );
                Ok(graph)
            }
            Err(e) if e.is_conflict() => tx.graph_by_key(key)?.ok_or(e),
            Err(e) => Err(e),
        }
    }

    /// Find the node of `target` sharing the slug of `node_id`, or copy it there.
    ///
    /// A copy keeps the original label and confidence and is tagged
    /// `Source::Curated`.
    pub fn find_or_copy_node(
        tx: &mut dyn StoreWrite,
        node_id: NodeId,
        target: GraphId,
    ) -> Result<Node, CurioError> {
        let node = tx
            .node(node_id)?
            .ok_or_else(|| CurioError::node_not_found(node_id))?;

        if node.graph_id == target {
            return Ok(node);
        }

        let copy = NewNode {
            graph_id: target,
            label: node.label.clone(),
            slug: node.slug.clone(),
            confidence: node.confidence,
            source: Source::Curated,
        };
        match tx.insert_node(copy) {
            Ok(created) => {
                tracing::debug!(
                    node_id = %created.id,
                    slug = %created.slug,
                    graph_id = %target,
                    "copied node"
                );
                Ok(created)
            }
            Err(e) if e.is_conflict() => tx.node_by_slug(target, &node.slug)?.ok_or(e),
            Err(e) => Err(e),
        }
    }

    /// Promote a learner edge into the curated graph of its scope.
    ///
    /// Idempotent: if the curated graph already holds the same
    /// `(from, to, edge type)` relation the call returns `Skipped` and writes
    /// nothing new. An edge that already lives in a curated graph is likewise
    /// `Skipped`.
    pub fn promote(
        tx: &mut dyn StoreWrite,
        edge_id: EdgeId,
        curator: &UserId,
    ) -> Result<PromotionOutcome, CurioError> {
        let source = tx
            .edge(edge_id)?
            .ok_or_else(|| CurioError::edge_not_found(edge_id))?;
        let source_graph = tx
            .graph(source.graph_id)?
            .ok_or_else(|| CurioError::graph_not_found(source.graph_id))?;

        if source_graph.key.role == GraphRole::Curated {
            return Ok(PromotionOutcome::Skipped {
                existing_edge_id: source.id,
            });
        }

        let target = Self::ensure_graph(
            tx,
            &GraphKey::new(GraphRole::Curated, source_graph.key.scope.clone()),
        )?;
        let from = Self::find_or_copy_node(tx, source.from, target.id)?;
        let to = Self::find_or_copy_node(tx, source.to, target.id)?;

        let candidate = NewEdge {
            graph_id: target.id,
            from: from.id,
            to: to.id,
            edge_type: source.edge_type,
            confidence: promoted_confidence(source.confidence),
            source: Source::Curated,
            rationale: source.rationale.clone(),
            provenance: Some(Provenance {
                curated_by: curator.clone(),
                curated_at: Timestamp::now(),
                original_edge_id: source.id,
            }),
        };
        let key = candidate.key();

        let created = match tx.insert_edge(candidate) {
            Ok(edge) => edge,
            Err(e) if e.is_conflict() => {
                let existing = tx.edge_by_key(&key)?.ok_or(e)?;
                tracing::debug!(
                    edge_id = %source.id,
                    existing_edge_id = %existing.id,
                    "edge already curated"
                );
                return Ok(PromotionOutcome::Skipped {
                    existing_edge_id: existing.id,
                });
            }
            Err(e) => return Err(e),
        };

        let evidence = tx.evidence_for(source.id)?;
        for record in &evidence {
            tx.insert_evidence(created.id, NewEvidence::from(record))?;
        }

        tracing::debug!(
            edge_id = %source.id,
            curated_edge_id = %created.id,
            graph_id = %target.id,
            confidence = %created.confidence,
            evidence = evidence.len(),
            "promoted edge"
        );
        Ok(PromotionOutcome::Created {
            edge_id: created.id,
        })
    }

    /// Mark an edge as rejected. Leaves the review flag untouched.
    pub fn reject(
        tx: &mut dyn StoreWrite,
        edge_id: EdgeId,
        curator: &UserId,
    ) -> Result<Edge, CurioError> {
        Self::mark(tx, edge_id, |edge| {
            edge.status.rejected = Some(StatusMark::now(curator.clone()));
        })
    }

    /// Flag an edge for review. Leaves the rejection flag untouched.
    pub fn flag_for_review(
        tx: &mut dyn StoreWrite,
        edge_id: EdgeId,
        curator: &UserId,
    ) -> Result<Edge, CurioError> {
        Self::mark(tx, edge_id, |edge| {
            edge.status.needs_review = Some(StatusMark::now(curator.clone()));
        })
    }

    fn mark(
        tx: &mut dyn StoreWrite,
        edge_id: EdgeId,
        apply: impl FnOnce(&mut Edge),
    ) -> Result<Edge, CurioError> {
        let mut edge = tx
            .edge(edge_id)?
            .ok_or_else(|| CurioError::edge_not_found(edge_id))?;
        apply(&mut edge);
        tx.update_edge(&edge)?;
        tracing::debug!(
            edge_id = %edge_id,
            status = ?edge.status.display_status(),
            "updated edge status"
        );
        Ok(edge)
    }
}

// =============================================================================
// TESTS
// =============================================================================
