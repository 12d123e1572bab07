//! # Voting Service
//!
//! One live vote per `(edge, user)`, and consensus confidence recomputed from
//! all live votes after every cast.
//!
//! The upsert and the recalculation share one write transaction: a vote is
//! never recorded without its confidence update.

use crate::confidence::{
    Confidence, ConsensusPolicy, VoteTally, anchored_confidence, consensus_confidence,
};
use crate::primitives::MAX_COMMENT_LENGTH;
use crate::store::{CurationStore, StoreWrite};
use crate::types::{CurioError, Edge, EdgeId, Timestamp, UserId, Vote, VoteValue};
use serde::{Deserialize, Serialize};

/// A vote to be cast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteRequest {
    pub user_id: UserId,
    pub edge_id: EdgeId,
    pub value: VoteValue,
    pub comment: Option<String>,
}

impl VoteRequest {
    /// Reject requests that cannot be attributed or carry an oversized comment.
    pub fn validate(&self) -> Result<(), CurioError> {
        if self.user_id.as_str().trim().is_empty() {
            return Err(CurioError::Validation("user id is empty".to_string()));
        }
        if let Some(len) = self
            .comment
            .as_ref()
            .map(String::len)
            .filter(|len| *len > MAX_COMMENT_LENGTH)
        {
            return Err(CurioError::Validation(format!(
                "comment is {} bytes, limit is {}",
                len, MAX_COMMENT_LENGTH
            )));
        }
        Ok(())
    }
}

/// Confidence of an edge right after a vote landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteOutcome {
    pub edge_id: EdgeId,
    pub confidence: Confidence,
    pub tally: VoteTally,
}

/// Voting and consensus recalculation.
pub struct VotingService;

impl VotingService {
    /// Upsert a vote and recompute the edge's confidence.
    ///
    /// Voting on a missing edge is `NotFound`.
    pub fn cast_vote<S: CurationStore>(
        store: &S,
        policy: ConsensusPolicy,
        request: VoteRequest,
    ) -> Result<VoteOutcome, CurioError> {
        request.validate()?;

        let edge_id = request.edge_id;
        let outcome = store.write(|tx| {
            let edge = tx
                .edge(edge_id)?
                .ok_or_else(|| CurioError::edge_not_found(edge_id))?;

            let comment = request.comment.filter(|c| !c.trim().is_empty());
            tx.upsert_vote(Vote {
                edge_id,
                user_id: request.user_id,
                value: request.value,
                comment,
                cast_at: Timestamp::now(),
            })?;

            Self::recalculate(tx, edge, policy)
        })?;

        tracing::info!(
            edge_id = %edge_id,
            confidence = %outcome.confidence,
            up = outcome.tally.up,
            down = outcome.tally.down,
            "recorded vote"
        );
        Ok(outcome)
    }

    /// Recompute and persist the confidence of `edge` from its live votes.
    pub fn recalculate(
        tx: &mut dyn StoreWrite,
        mut edge: Edge,
        policy: ConsensusPolicy,
    ) -> Result<VoteOutcome, CurioError> {
        let votes = tx.votes_for(edge.id)?;
        let tally = VoteTally::from_values(votes.iter().map(|v| v.value));

        edge.confidence = match policy {
            ConsensusPolicy::FixedBase => consensus_confidence(&tally),
            ConsensusPolicy::Anchored => {
                let baseline = *edge.vote_baseline.get_or_insert(edge.confidence);
                anchored_confidence(baseline, &tally)
            }
        };
        tx.update_edge(&edge)?;

        Ok(VoteOutcome {
            edge_id: edge.id,
            confidence: edge.confidence,
            tally,
        })
    }

    /// Live votes on an edge. `NotFound` if the edge does not exist.
    pub fn votes_for<S: CurationStore>(store: &S, edge_id: EdgeId) -> Result<Vec<Vote>, CurioError> {
        store.read(|tx| {
            if tx.edge(edge_id)?.is_none() {
                return Err(CurioError::edge_not_found(edge_id));
            }
            tx.votes_for(edge_id)
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================
