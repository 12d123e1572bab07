//! # Core Type Definitions
//!
//! This module contains the data model of the curation engine:
//! - Identifiers (`GraphId`, `NodeId`, `EdgeId`, `EvidenceId`, `UserId`)
//! - Graph roles and scopes (`GraphRole`, `ScopeType`, `Scope`, `GraphKey`)
//! - Graph content (`Graph`, `Node`, `Edge`, `Evidence`, `Vote`)
//! - Edge status and provenance (`EdgeStatus`, `Provenance`)
//! - Error types (`CurioError`)
//!
//! ## Determinism Guarantees
//!
//! All identifiers implement `Ord` so that stores can keep them in
//! `BTreeMap`/`BTreeSet`. Confidence is integer basis points (see
//! [`crate::confidence`]); no type in this module holds a float.

use crate::confidence::Confidence;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Identifier of a graph instance (learner or curated).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GraphId(pub u64);

/// Identifier of a concept node. Unique across all graphs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u64);

/// Identifier of a directed, typed edge. Unique across all graphs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EdgeId(pub u64);

/// Identifier of an evidence record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EvidenceId(pub u64);

impl fmt::Display for GraphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for EvidenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque identifier of a user (learner, curator or voter).
///
/// Authentication happens outside the engine; the engine only records who
/// acted.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    /// Create a new user identifier.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// TIMESTAMP
// =============================================================================

/// Milliseconds since the Unix epoch, UTC.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// The current wall-clock time.
    #[must_use]
    pub fn now() -> Self {
        Self(chrono::Utc::now().timestamp_millis())
    }

    /// Raw milliseconds since the epoch.
    #[must_use]
    pub const fn millis(self) -> i64 {
        self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match chrono::DateTime::from_timestamp_millis(self.0) {
            Some(dt) => f.write_str(&dt.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)),
            None => write!(f, "{}ms", self.0),
        }
    }
}

// =============================================================================
// GRAPH ROLES & SCOPES
// =============================================================================

/// The role a graph plays within its scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GraphRole {
    /// Per-author working graph, not yet vetted.
    Learner,
    /// The single shared, vetted graph of a scope.
    Curated,
}

impl GraphRole {
    /// Wire name of the role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Learner => "LEARNER",
            Self::Curated => "CURATED",
        }
    }
}

/// Kind of owner a scope belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScopeType {
    User,
    Institution,
    StudyGroup,
}

impl ScopeType {
    /// Wire name of the scope type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "USER",
            Self::Institution => "INSTITUTION",
            Self::StudyGroup => "STUDY_GROUP",
        }
    }
}

impl FromStr for ScopeType {
    type Err = CurioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "USER" => Ok(Self::User),
            "INSTITUTION" => Ok(Self::Institution),
            "STUDY_GROUP" => Ok(Self::StudyGroup),
            other => Err(CurioError::Validation(format!(
                "unknown scope type '{}'",
                other
            ))),
        }
    }
}

/// The `(scopeType, scopeId, contentId?)` tuple a graph belongs to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Scope {
    pub scope_type: ScopeType,
    pub scope_id: String,
    #[serde(default)]
    pub content_id: Option<String>,
}

impl Scope {
    /// Create a scope without a content anchor.
    #[must_use]
    pub fn new(scope_type: ScopeType, scope_id: impl Into<String>) -> Self {
        Self {
            scope_type,
            scope_id: scope_id.into(),
            content_id: None,
        }
    }

    /// Narrow the scope to a single piece of content.
    #[must_use]
    pub fn with_content(mut self, content_id: impl Into<String>) -> Self {
        self.content_id = Some(content_id.into());
        self
    }

    /// Reject scopes that cannot identify an owner.
    pub fn validate(&self) -> Result<(), CurioError> {
        if self.scope_id.trim().is_empty() {
            return Err(CurioError::Validation("scope id is empty".to_string()));
        }
        if self.content_id.as_deref().is_some_and(|c| c.trim().is_empty()) {
            return Err(CurioError::Validation("content id is empty".to_string()));
        }
        Ok(())
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.scope_type.as_str(), self.scope_id)?;
        if let Some(content) = &self.content_id {
            write!(f, "/{}", content)?;
        }
        Ok(())
    }
}

/// Unique key of a graph: at most one graph exists per `(role, scope)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GraphKey {
    pub role: GraphRole,
    pub scope: Scope,
}

impl GraphKey {
    #[must_use]
    pub fn new(role: GraphRole, scope: Scope) -> Self {
        Self { role, scope }
    }
}

/// A graph instance. Created lazily, never deleted by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Graph {
    pub id: GraphId,
    pub key: GraphKey,
    pub created_at: Timestamp,
}

// =============================================================================
// NODES
// =============================================================================

/// Who produced a node or edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Source {
    Ai,
    User,
    Curated,
}

impl Source {
    /// Wire name of the source tag.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ai => "AI",
            Self::User => "USER",
            Self::Curated => "CURATED",
        }
    }
}

/// Lowercase, graph-scoped deduplication key of a node.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Slug(String);

impl Slug {
    /// Normalize free text into a slug.
    ///
    /// Lowercases, collapses every run of non-alphanumeric characters into a
    /// single `-` and trims dashes at both ends. Fails if nothing remains.
    ///
    /// Marks produced by lowercasing (`İ` becomes `i` + U+0307) are dropped,
    /// so a slug always normalizes to itself.
    pub fn normalize(text: &str) -> Result<Self, CurioError> {
        let mut out = String::with_capacity(text.len());
        let mut pending_dash = false;
        for ch in text.chars() {
            if !ch.is_alphanumeric() {
                pending_dash = true;
                continue;
            }
            let mut lowered = ch.to_lowercase().filter(|c| c.is_alphanumeric()).peekable();
            if lowered.peek().is_none() {
                continue;
            }
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.extend(lowered);
        }
        if out.is_empty() {
            return Err(CurioError::Validation(format!(
                "cannot derive a slug from '{}'",
                text
            )));
        }
        Ok(Self(out))
    }

    /// Get the slug as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A concept within exactly one graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub graph_id: GraphId,
    /// Canonical display label.
    pub label: String,
    pub slug: Slug,
    pub confidence: Confidence,
    pub source: Source,
}

// =============================================================================
// EDGES
// =============================================================================

/// The fixed relation vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeType {
    Explains,
    PrerequisiteOf,
    PartOf,
    ExampleOf,
    Defines,
    ContrastsWith,
    RelatedTo,
}

impl EdgeType {
    /// Every edge type, in code order.
    pub const ALL: [Self; 7] = [
        Self::Explains,
        Self::PrerequisiteOf,
        Self::PartOf,
        Self::ExampleOf,
        Self::Defines,
        Self::ContrastsWith,
        Self::RelatedTo,
    ];

    /// Stable one-byte code used in storage keys.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Explains => 1,
            Self::PrerequisiteOf => 2,
            Self::PartOf => 3,
            Self::ExampleOf => 4,
            Self::Defines => 5,
            Self::ContrastsWith => 6,
            Self::RelatedTo => 7,
        }
    }

    /// Inverse of [`EdgeType::code`].
    #[must_use]
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.code() == code)
    }

    /// Wire name of the edge type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Explains => "EXPLAINS",
            Self::PrerequisiteOf => "PREREQUISITE_OF",
            Self::PartOf => "PART_OF",
            Self::ExampleOf => "EXAMPLE_OF",
            Self::Defines => "DEFINES",
            Self::ContrastsWith => "CONTRASTS_WITH",
            Self::RelatedTo => "RELATED_TO",
        }
    }
}

impl FromStr for EdgeType {
    type Err = CurioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| CurioError::Validation(format!("unknown edge type '{}'", s)))
    }
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deduplication key of an edge: no two edges of a graph share it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EdgeKey {
    pub graph_id: GraphId,
    pub from: NodeId,
    pub to: NodeId,
    pub edge_type: EdgeType,
}

/// Who set a status flag, and when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMark {
    pub by: UserId,
    pub at: Timestamp,
}

impl StatusMark {
    #[must_use]
    pub fn now(by: UserId) -> Self {
        Self {
            by,
            at: Timestamp::now(),
        }
    }
}

/// Curator status flags of an edge.
///
/// The two flags are independent: an edge may be both rejected and flagged
/// for review. Setting one never touches the other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct EdgeStatus {
    pub rejected: Option<StatusMark>,
    pub needs_review: Option<StatusMark>,
}

/// Single status for display, with `Rejected` taking precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DisplayStatus {
    Active,
    NeedsReview,
    Rejected,
}

impl EdgeStatus {
    #[must_use]
    pub fn is_rejected(&self) -> bool {
        self.rejected.is_some()
    }

    #[must_use]
    pub fn needs_review(&self) -> bool {
        self.needs_review.is_some()
    }

    /// Collapse both flags into one status. A rejection is terminal.
    #[must_use]
    pub fn display_status(&self) -> DisplayStatus {
        if self.rejected.is_some() {
            DisplayStatus::Rejected
        } else if self.needs_review.is_some() {
            DisplayStatus::NeedsReview
        } else {
            DisplayStatus::Active
        }
    }
}

/// Where a curated edge came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub curated_by: UserId,
    pub curated_at: Timestamp,
    pub original_edge_id: EdgeId,
}

/// A directed, typed relation between two nodes of the same graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub graph_id: GraphId,
    pub from: NodeId,
    pub to: NodeId,
    pub edge_type: EdgeType,
    pub confidence: Confidence,
    pub source: Source,
    /// Free-form justification notes supplied by the author.
    pub rationale: BTreeMap<String, String>,
    /// Set only on edges created by promotion.
    pub provenance: Option<Provenance>,
    pub status: EdgeStatus,
    /// Pre-vote confidence, recorded on the first vote under the anchored
    /// consensus policy.
    pub vote_baseline: Option<Confidence>,
}

impl Edge {
    /// The deduplication key of this edge.
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

// =============================================================================
// EVIDENCE
// =============================================================================

/// Location inside the source content that an evidence record points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct EvidenceAnchor {
    #[serde(default)]
    pub content_id: Option<String>,
    #[serde(default)]
    pub chunk_id: Option<String>,
    #[serde(default)]
    pub page: Option<u32>,
    /// Media offset in milliseconds.
    #[serde(default)]
    pub timestamp_ms: Option<u64>,
}

/// A content-anchored justification attached to exactly one edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    pub id: EvidenceId,
    pub edge_id: EdgeId,
    pub anchor: EvidenceAnchor,
    pub excerpt: String,
    pub highlight_id: Option<String>,
    pub note_id: Option<String>,
}

impl Evidence {
    /// True if both records carry the same justification, ignoring identity.
    #[must_use]
    pub fn same_content(&self, other: &Self) -> bool {
        self.anchor == other.anchor
            && self.excerpt == other.excerpt
            && self.highlight_id == other.highlight_id
            && self.note_id == other.note_id
    }
}

// =============================================================================
// VOTES
// =============================================================================

/// A single user's judgement of an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum VoteValue {
    Down,
    Neutral,
    Up,
}

impl VoteValue {
    /// Signed value of the vote.
    #[must_use]
    pub const fn value(self) -> i8 {
        match self {
            Self::Down => -1,
            Self::Neutral => 0,
            Self::Up => 1,
        }
    }
}

impl TryFrom<i64> for VoteValue {
    type Error = CurioError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(Self::Down),
            0 => Ok(Self::Neutral),
            1 => Ok(Self::Up),
            other => Err(CurioError::Validation(format!(
                "vote must be -1, 0 or 1, got {}",
                other
            ))),
        }
    }
}

/// The live vote of one user on one edge. Upserted, never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub edge_id: EdgeId,
    pub user_id: UserId,
    pub value: VoteValue,
    pub comment: Option<String>,
    pub cast_at: Timestamp,
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Kind of record an id refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Graph,
    Node,
    Edge,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Graph => "Graph",
            Self::Node => "Node",
            Self::Edge => "Edge",
        })
    }
}

/// Errors that can occur in the curation engine.
///
/// - No silent failures
/// - Use `Result<T, CurioError>` for fallible operations
/// - The engine never panics; all errors are recoverable
#[derive(Debug, Error)]
pub enum CurioError {
    /// A record referenced by id does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },

    /// A unique key is already taken.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Input was rejected before reaching the store.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The store failed to read, write or commit.
    #[error("Storage error: {0}")]
    Storage(String),

    /// A stored record could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A file or socket operation outside the store failed.
    #[error("I/O error: {0}")]
    Io(String),
}

impl CurioError {
    #[must_use]
    pub fn graph_not_found(id: GraphId) -> Self {
        Self::NotFound {
            kind: EntityKind::Graph,
            id: id.to_string(),
        }
    }

    #[must_use]
    pub fn node_not_found(id: NodeId) -> Self {
        Self::NotFound {
            kind: EntityKind::Node,
            id: id.to_string(),
        }
    }

    #[must_use]
    pub fn edge_not_found(id: EdgeId) -> Self {
        Self::NotFound {
            kind: EntityKind::Edge,
            id: id.to_string(),
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

// =============================================================================
// TESTS
// =============================================================================
