//! # Ingestor Module
//!
//! Loads already-extracted learner graphs into the store.
//!
//! - Validate documents before any store access
//! - Reject malformed input
//! - Deduplicate nodes by slug and edges by `(from, to, edge type)`
//! - No semantic inference or enrichment

use crate::confidence::Confidence;
use crate::merge::MergeEngine;
use crate::primitives::{
    DEFAULT_CONFIDENCE_BP, MAX_DOCUMENT_ITEMS, MAX_EXCERPT_LENGTH, MAX_LABEL_LENGTH,
};
use crate::store::{NewEdge, NewEvidence, NewNode, StoreWrite};
use crate::types::{
    CurioError, EdgeId, EdgeType, GraphId, GraphKey, GraphRole, NodeId, Scope, Slug, Source,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

fn default_confidence_bp() -> u16 {
    DEFAULT_CONFIDENCE_BP
}

fn default_source() -> Source {
    Source::Ai
}

/// A node of a learner graph document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDoc {
    pub label: String,
    /// Explicit slug; derived from the label when absent.
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default = "default_confidence_bp")]
    pub confidence_bp: u16,
    #[serde(default = "default_source")]
    pub source: Source,
}

impl NodeDoc {
    /// The normalized slug of this node.
    pub fn slug(&self) -> Result<Slug, CurioError> {
        Slug::normalize(self.slug.as_deref().unwrap_or(&self.label))
    }
}

/// An edge of a learner graph document. Endpoints are node slugs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeDoc {
    pub from: String,
    pub to: String,
    pub edge_type: EdgeType,
    #[serde(default = "default_confidence_bp")]
    pub confidence_bp: u16,
    #[serde(default = "default_source")]
    pub source: Source,
    #[serde(default)]
    pub rationale: BTreeMap<String, String>,
    #[serde(default)]
    pub evidence: Vec<NewEvidence>,
}

/// An extracted learner graph for one scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearnerGraphDoc {
    pub scope: Scope,
    #[serde(default)]
    pub nodes: Vec<NodeDoc>,
    #[serde(default)]
    pub edges: Vec<EdgeDoc>,
}

/// What an ingestion wrote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    pub graph_id: GraphId,
    /// Node ids keyed by slug.
    pub nodes: BTreeMap<String, NodeId>,
    /// Edge ids in document order.
    pub edges: Vec<EdgeId>,
    pub nodes_created: u32,
    pub nodes_reused: u32,
    pub edges_created: u32,
    pub edges_reused: u32,
}

/// The Ingestor validates learner graph documents and writes them.
pub struct Ingestor;

impl Ingestor {
    /// Validate a document.
    ///
    /// A document is valid if:
    /// - The scope identifies an owner
    /// - It holds at most `MAX_DOCUMENT_ITEMS` nodes and as many edges
    /// - Every label is non-empty and within length limits
    /// - Every slug and endpoint normalizes to a non-empty slug
    /// - Every confidence lies in `0..=10000` bp
    /// - Every evidence excerpt is within length limits
    pub fn validate(doc: &LearnerGraphDoc) -> Result<(), CurioError> {
        doc.scope.validate()?;

        if doc.nodes.len() > MAX_DOCUMENT_ITEMS || doc.edges.len() > MAX_DOCUMENT_ITEMS {
            return Err(CurioError::Validation(format!(
                "document holds {} nodes and {} edges, limit is {} each",
                doc.nodes.len(),
                doc.edges.len(),
                MAX_DOCUMENT_ITEMS
            )));
        }

        for node in &doc.nodes {
            let label = node.label.trim();
            if label.is_empty() {
                return Err(CurioError::Validation("node label is empty".to_string()));
            }
            if label.len() > MAX_LABEL_LENGTH {
                return Err(CurioError::Validation(format!(
                    "node label is {} bytes, limit is {}",
                    label.len(),
                    MAX_LABEL_LENGTH
                )));
            }
            node.slug()?;
            Confidence::from_bp(node.confidence_bp)?;
        }

        for edge in &doc.edges {
            Slug::normalize(&edge.from)?;
            Slug::normalize(&edge.to)?;
            Confidence::from_bp(edge.confidence_bp)?;
            if let Some(evidence) = edge
                .evidence
                .iter()
                .find(|e| e.excerpt.len() > MAX_EXCERPT_LENGTH)
            {
                return Err(CurioError::Validation(format!(
                    "evidence excerpt is {} bytes, limit is {}",
                    evidence.excerpt.len(),
                    MAX_EXCERPT_LENGTH
                )));
            }
        }

        Ok(())
    }

    /// Validate and write a document into the learner graph of its scope.
    ///
    /// Existing nodes and edges are reused; evidence is attached only to
    /// edges this call creates. An edge endpoint must be declared in the
    /// document or already exist in the graph.
    pub fn ingest(
        tx: &mut dyn StoreWrite,
        doc: &LearnerGraphDoc,
    ) -> Result<IngestReport, CurioError> {
        Self::validate(doc)?;

        let graph = MergeEngine::ensure_graph(
            tx,
            &GraphKey::new(GraphRole::Learner, doc.scope.clone()),
        )?;
        let mut report = IngestReport {
            graph_id: graph.id,
            nodes: BTreeMap::new(),
            edges: Vec::with_capacity(doc.edges.len()),
            nodes_created: 0,
            nodes_reused: 0,
            edges_created: 0,
            edges_reused: 0,
        };

        for node in &doc.nodes {
            let slug = node.slug()?;
            let id = match tx.node_by_slug(graph.id, &slug)? {
                Some(existing) => {
                    report.nodes_reused = report.nodes_reused.saturating_add(1);
                    existing.id
                }
                None => {
                    let created = tx.insert_node(NewNode {
                        graph_id: graph.id,
                        label: node.label.trim().to_string(),
                        slug: slug.clone(),
                        confidence: Confidence::from_bp(node.confidence_bp)?,
                        source: node.source,
                    })?;
                    report.nodes_created = report.nodes_created.saturating_add(1);
                    created.id
                }
            };
            report.nodes.insert(slug.as_str().to_string(), id);
        }

        for edge in &doc.edges {
            let from = Self::resolve_endpoint(tx, &report, &edge.from)?;
            let to = Self::resolve_endpoint(tx, &report, &edge.to)?;
            let candidate = NewEdge {
                graph_id: graph.id,
                from,
                to,
                edge_type: edge.edge_type,
                confidence: Confidence::from_bp(edge.confidence_bp)?,
                source: edge.source,
                rationale: edge.rationale.clone(),
                provenance: None,
            };

            let id = match tx.edge_by_key(&candidate.key())? {
                Some(existing) => {
                    report.edges_reused = report.edges_reused.saturating_add(1);
                    existing.id
                }
                None => {
                    let created = tx.insert_edge(candidate)?;
                    for evidence in &edge.evidence {
                        tx.insert_evidence(created.id, evidence.clone())?;
                    }
                    report.edges_created = report.edges_created.saturating_add(1);
                    created.id
                }
            };
            report.edges.push(id);
        }

        tracing::info!(
            graph_id = %graph.id,
            scope = %doc.scope,
            nodes_created = report.nodes_created,
            edges_created = report.edges_created,
            "ingested learner graph"
        );
        Ok(report)
    }

    fn resolve_endpoint(
        tx: &dyn StoreWrite,
        report: &IngestReport,
        endpoint: &str,
    ) -> Result<NodeId, CurioError> {
        let slug = Slug::normalize(endpoint)?;
        if let Some(id) = report.nodes.get(slug.as_str()) {
            return Ok(*id);
        }
        tx.node_by_slug(report.graph_id, &slug)?
            .map(|node| node.id)
            .ok_or_else(|| {
                CurioError::Validation(format!("edge endpoint '{}' is not declared", endpoint))
            })
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{CurationStore, MemoryStore};
    use crate::types::{EvidenceAnchor, ScopeType};

    fn node(label: &str) -> NodeDoc {
        NodeDoc {
            label: label.to_string(),
            slug: None,
            confidence_bp: 6_000,
            source: Source::User,
        }
    }

    fn edge(from: &str, to: &str) -> EdgeDoc {
        EdgeDoc {
            from: from.to_string(),
            to: to.to_string(),
            edge_type: EdgeType::PrerequisiteOf,
            confidence_bp: 5_500,
            source: Source::Ai,
            rationale: BTreeMap::new(),
            evidence: vec![NewEvidence {
                anchor: EvidenceAnchor {
                    page: Some(3),
                    ..EvidenceAnchor::default()
                },
                excerpt: "Limits come first.".to_string(),
                highlight_id: None,
                note_id: Some("n-9".to_string()),
            }],
        }
    }

    fn doc() -> LearnerGraphDoc {
        LearnerGraphDoc {
            scope: Scope::new(ScopeType::User, "learner-1").with_content("calc-1"),
            nodes: vec![node("Limits"), node("Derivatives")],
            edges: vec![edge("limits", "Derivatives")],
        }
    }

    #[test]
    fn validate_rejects_empty_label() {
        let mut d = doc();
        d.nodes.push(node("   "));
        assert!(matches!(Ingestor::validate(&d), Err(CurioError::Validation(_))));
    }

    #[test]
    fn validate_rejects_confidence_above_certainty() {
        let mut d = doc();
        d.edges[0].confidence_bp = 10_001;
        assert!(Ingestor::validate(&d).is_err());
    }

    #[test]
    fn validate_rejects_oversized_excerpt() {
        let mut d = doc();
        d.edges[0].evidence[0].excerpt = "x".repeat(MAX_EXCERPT_LENGTH + 1);
        assert!(Ingestor::validate(&d).is_err());
    }

    #[test]
    fn validate_accepts_valid_document() {
        assert!(Ingestor::validate(&doc()).is_ok());
    }

    #[test]
    fn ingest_creates_graph_nodes_edges_and_evidence() {
        let store = MemoryStore::new();
        let report = store
            .write(|tx| Ingestor::ingest(tx, &doc()))
            .expect("ingest");

        assert_eq!(report.nodes_created, 2);
        assert_eq!(report.edges_created, 1);
        assert!(report.nodes.contains_key("limits"));

        let stats = store.read(|tx| tx.stats()).expect("stats");
        assert_eq!(stats.graphs, 1);
        assert_eq!(stats.evidence, 1);
    }

    #[test]
    fn reingest_reuses_rows() {
        let store = MemoryStore::new();
        let first = store
            .write(|tx| Ingestor::ingest(tx, &doc()))
            .expect("first");
        let second = store
            .write(|tx| Ingestor::ingest(tx, &doc()))
            .expect("second");

        assert_eq!(first.graph_id, second.graph_id);
        assert_eq!(first.edges, second.edges);
        assert_eq!(second.nodes_reused, 2);
        assert_eq!(second.edges_reused, 1);
        assert_eq!(store.read(|tx| tx.stats()).expect("stats").evidence, 1);
    }

    #[test]
    fn undeclared_endpoint_aborts_whole_document() {
        let store = MemoryStore::new();
        let mut d = doc();
        d.edges.push(edge("limits", "integrals"));

        let result = store.write(|tx| Ingestor::ingest(tx, &d));
        assert!(matches!(result, Err(CurioError::Validation(_))));
        assert_eq!(
            store.read(|tx| tx.stats()).expect("stats"),
            crate::store::StoreStats::default()
        );
    }

    #[test]
    fn endpoint_may_reference_existing_node() {
        let store = MemoryStore::new();
        store
            .write(|tx| Ingestor::ingest(tx, &doc()))
            .expect("seed");

        let follow_up = LearnerGraphDoc {
            scope: doc().scope,
            nodes: vec![node("Integrals")],
            edges: vec![edge("derivatives", "integrals")],
        };
        let report = store
            .write(|tx| Ingestor::ingest(tx, &follow_up))
            .expect("follow up");
        assert_eq!(report.edges_created, 1);
    }

    #[test]
    fn reported_slug_resolves_in_follow_up_document() {
        let store = MemoryStore::new();
        let first = LearnerGraphDoc {
            scope: doc().scope,
            nodes: vec![node("İstanbul"), node("Byzantium")],
            edges: vec![edge("byzantium", "İstanbul")],
        };
        let report = store
            .write(|tx| Ingestor::ingest(tx, &first))
            .expect("seed");
        let key = "istanbul".to_string();
        assert!(report.nodes.contains_key(&key));

        let explicit = NodeDoc {
            slug: Some(key.clone()),
            ..node("Istanbul")
        };
        let follow_up = LearnerGraphDoc {
            scope: doc().scope,
            nodes: vec![explicit, node("Constantinople")],
            edges: vec![edge(&key, "constantinople")],
        };
        let second = store
            .write(|tx| Ingestor::ingest(tx, &follow_up))
            .expect("follow up");

        assert_eq!(second.nodes[&key], report.nodes[&key]);
        assert_eq!(second.nodes_reused, 1);
        assert_eq!(second.edges_created, 1);
    }
}
