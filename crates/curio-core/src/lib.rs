//! # curio-core
//!
//! The collaborative curation engine for Curio - THE LOGIC.
//!
//! Learners build working graphs of topic relations. Curators promote vetted
//! relations into the single shared curated graph of a scope, and the
//! community votes on curated edges to move their confidence.
//!
//! ## Components (leaves first)
//!
//! - `store`: the graph store traits and their in-memory and redb backends
//! - `confidence`: pure promotion and consensus policies
//! - `merge`: graph resolution, node and edge dedup, evidence copying
//! - `curation`: partial-failure tolerant batches of curator decisions
//! - `voting`: vote upserts and consensus recalculation
//! - `ingest`: loading already-extracted learner graphs
//! - `engine`: the facade tying them together
//!
//! ## Architectural Constraints
//!
//! - Has NO async, NO network dependencies (pure Rust)
//! - Integer basis-point confidence; no floating-point arithmetic
//! - Every write spanning more than one row runs in one store transaction
//! - Not a general-purpose graph database: no query language, no traversal

// =============================================================================
// MODULES
// =============================================================================

pub mod confidence;
pub mod curation;
pub mod engine;
pub mod ingest;
pub mod merge;
pub mod primitives;
pub mod store;
pub mod types;
pub mod voting;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    CurioError, DisplayStatus, Edge, EdgeId, EdgeKey, EdgeStatus, EdgeType, EntityKind, Evidence,
    EvidenceAnchor, EvidenceId, Graph, GraphId, GraphKey, GraphRole, Node, NodeId, Provenance,
    Scope, ScopeType, Slug, Source, StatusMark, Timestamp, UserId, Vote, VoteValue,
};

// =============================================================================
// RE-EXPORTS: Engine
// =============================================================================

pub use confidence::{Confidence, ConsensusPolicy, VoteTally};
pub use curation::{
    BatchItem, BatchSummary, CurationAction, CurationBatch, CurationOrchestrator, SkippedItem,
};
pub use engine::{CurationEngine, EdgeView, EngineConfig, GraphSnapshot};
pub use ingest::{EdgeDoc, IngestReport, Ingestor, LearnerGraphDoc, NodeDoc};
pub use merge::{MergeEngine, PromotionOutcome};
pub use store::{
    CurationStore, MemoryStore, NewEdge, NewEvidence, NewNode, RedbStore, StorageBackend,
    StoreRead, StoreStats, StoreWrite,
};
pub use voting::{VoteOutcome, VoteRequest, VotingService};
