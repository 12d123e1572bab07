//! # Policy Constants
//!
//! Hardcoded constants of the curation engine.
//!
//! Confidence values are expressed in basis points (1 bp = 0.0001), so
//! `10_000` is full certainty. These constants are compiled into the binary
//! and are immutable at runtime.

/// Full certainty, in basis points.
pub const CONFIDENCE_SCALE: u16 = 10_000;

// =============================================================================
// PROMOTION
// =============================================================================

/// Confidence gained by an edge when it is promoted into the curated graph.
pub const PROMOTION_BOOST_BP: u16 = 1_000;

/// Highest confidence promotion alone can produce.
///
/// Curated status increases trust but never reaches certainty.
pub const PROMOTION_CAP_BP: u16 = 9_000;

// =============================================================================
// CONSENSUS
// =============================================================================

/// Starting point of the fixed-base consensus formula.
pub const CONSENSUS_BASE_BP: u16 = 7_000;

/// Confidence moved by one net vote.
pub const VOTE_STEP_BP: u16 = 500;

/// Lowest confidence votes can push an edge to.
pub const CONSENSUS_FLOOR_BP: u16 = 1_000;

/// Highest confidence votes can push an edge to.
pub const CONSENSUS_CEILING_BP: u16 = CONFIDENCE_SCALE;

// =============================================================================
// INGESTION
// =============================================================================

/// Confidence assumed for an ingested node or edge that states none.
pub const DEFAULT_CONFIDENCE_BP: u16 = 5_000;

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum number of decisions in a single curation batch.
pub const MAX_BATCH_ITEMS: usize = 1_000;

/// Maximum length of a vote comment, in bytes.
pub const MAX_COMMENT_LENGTH: usize = 2_000;

/// Maximum length of a node label, in bytes.
pub const MAX_LABEL_LENGTH: usize = 256;

/// Maximum length of an evidence excerpt (64KB).
pub const MAX_EXCERPT_LENGTH: usize = 65_536;

/// Maximum number of nodes or edges in one learner graph document.
pub const MAX_DOCUMENT_ITEMS: usize = 10_000;
