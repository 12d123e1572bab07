//! # Confidence Module
//!
//! Confidence values and the pure policies that update them.
//!
//! - Promotion: a fixed boost, capped below certainty
//! - Consensus: recomputed from the current votes after every cast vote
//!
//! Uses integer basis points (0-10000) so every formula is exact.
//! No floating-point arithmetic.

use crate::primitives::{
    CONFIDENCE_SCALE, CONSENSUS_BASE_BP, CONSENSUS_CEILING_BP, CONSENSUS_FLOOR_BP,
    PROMOTION_BOOST_BP, PROMOTION_CAP_BP, VOTE_STEP_BP,
};
use crate::types::{CurioError, VoteValue};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Trust in a node or edge, in basis points (`10_000` = 1.0).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct Confidence(u16);

impl Confidence {
    /// Zero confidence.
    pub const ZERO: Self = Self(0);

    /// Full certainty.
    pub const CERTAIN: Self = Self(CONFIDENCE_SCALE);

    /// Create a confidence from basis points, rejecting values above 10000.
    pub fn from_bp(bp: u16) -> Result<Self, CurioError> {
        if bp > CONFIDENCE_SCALE {
            return Err(CurioError::Validation(format!(
                "confidence {} bp exceeds {} bp",
                bp, CONFIDENCE_SCALE
            )));
        }
        Ok(Self(bp))
    }

    /// Create a confidence from any integer, clamping into `[floor, ceiling]`.
    #[must_use]
    pub fn clamped(bp: i64, floor: u16, ceiling: u16) -> Self {
        Self(bp.clamp(i64::from(floor), i64::from(ceiling)) as u16)
    }

    /// Raw basis points.
    #[must_use]
    pub const fn bp(self) -> u16 {
        self.0
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{:04}",
            self.0 / CONFIDENCE_SCALE,
            self.0 % CONFIDENCE_SCALE
        )
    }
}

// =============================================================================
// PROMOTION POLICY
// =============================================================================

/// Confidence of a freshly promoted edge: `min(c + 0.10, 0.90)`.
#[must_use]
pub fn promoted_confidence(source: Confidence) -> Confidence {
    Confidence(
        source
            .0
            .saturating_add(PROMOTION_BOOST_BP)
            .min(PROMOTION_CAP_BP),
    )
}

// =============================================================================
// CONSENSUS POLICY
// =============================================================================

/// Counts of the current votes on one edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VoteTally {
    pub up: u32,
    pub down: u32,
    pub neutral: u32,
}

impl VoteTally {
    /// Count a sequence of votes.
    pub fn from_values(values: impl IntoIterator<Item = VoteValue>) -> Self {
        values.into_iter().fold(Self::default(), |mut tally, v| {
            match v {
                VoteValue::Up => tally.up = tally.up.saturating_add(1),
                VoteValue::Down => tally.down = tally.down.saturating_add(1),
                VoteValue::Neutral => tally.neutral = tally.neutral.saturating_add(1),
            }
            tally
        })
    }

    /// Upvotes minus downvotes.
    #[must_use]
    pub fn net(&self) -> i64 {
        i64::from(self.up) - i64::from(self.down)
    }

    /// Total number of live votes, neutral included.
    #[must_use]
    pub fn total(&self) -> u64 {
        u64::from(self.up) + u64::from(self.down) + u64::from(self.neutral)
    }
}

/// How vote-driven confidence is anchored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsensusPolicy {
    /// `clamp(0.70 + 0.05 * (up - down), 0.10, 1.00)`.
    ///
    /// Every recalculation starts from the fixed base, so whatever the edge
    /// held before voting began (a promotion boost, manual tuning) is
    /// replaced on the first vote.
    #[default]
    FixedBase,
    /// `clamp(baseline + 0.05 * (up - down), 0.10, 1.00)`, where the baseline
    /// is the edge's confidence right before its first vote.
    Anchored,
}

impl ConsensusPolicy {
    /// Config name of the policy.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FixedBase => "fixed_base",
            Self::Anchored => "anchored",
        }
    }
}

impl std::str::FromStr for ConsensusPolicy {
    type Err = CurioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fixed_base" => Ok(Self::FixedBase),
            "anchored" => Ok(Self::Anchored),
            other => Err(CurioError::Validation(format!(
                "unknown consensus policy '{}'",
                other
            ))),
        }
    }
}

/// Fixed-base consensus confidence for a tally.
#[must_use]
pub fn consensus_confidence(tally: &VoteTally) -> Confidence {
    anchored_confidence(Confidence(CONSENSUS_BASE_BP), tally)
}

/// Consensus confidence starting from an explicit baseline.
#[must_use]
pub fn anchored_confidence(baseline: Confidence, tally: &VoteTally) -> Confidence {
    let shift = tally.net().saturating_mul(i64::from(VOTE_STEP_BP));
    Confidence::clamped(
        i64::from(baseline.0).saturating_add(shift),
        CONSENSUS_FLOOR_BP,
        CONSENSUS_CEILING_BP,
    )
}

// =============================================================================
// TESTS
// =============================================================================
