//! # Property-Based Tests
//!
//! Verification tests using proptest.
//!
//! These tests check the confidence policy bounds and the dedup invariants
//! over generated inputs.

use curio_core::confidence::{
    anchored_confidence, consensus_confidence, promoted_confidence,
};
use curio_core::primitives::{CONFIDENCE_SCALE, CONSENSUS_FLOOR_BP, PROMOTION_CAP_BP};
use curio_core::{
    Confidence, CurationEngine, EdgeDoc, EdgeType, EngineConfig, LearnerGraphDoc, NodeDoc, Scope,
    ScopeType, Slug, Source, StorageBackend, UserId, VoteRequest, VoteTally, VoteValue,
};
use proptest::collection::vec;
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

fn vote_value() -> impl Strategy<Value = VoteValue> {
    prop_oneof![
        Just(VoteValue::Down),
        Just(VoteValue::Neutral),
        Just(VoteValue::Up),
    ]
}

fn single_edge_engine(confidence_bp: u16) -> (CurationEngine, curio_core::EdgeId) {
    let engine = CurationEngine::new(StorageBackend::in_memory(), EngineConfig::default());
    let node = |label: &str| NodeDoc {
        label: label.to_string(),
        slug: None,
        confidence_bp: 5_000,
        source: Source::User,
    };
    let report = engine
        .ingest(&LearnerGraphDoc {
            scope: Scope::new(ScopeType::User, "learner"),
            nodes: vec![node("Vector"), node("Matrix")],
            edges: vec![EdgeDoc {
                from: "vector".to_string(),
                to: "matrix".to_string(),
                edge_type: EdgeType::PrerequisiteOf,
                confidence_bp,
                source: Source::Ai,
                rationale: BTreeMap::new(),
                evidence: Vec::new(),
            }],
        })
        .expect("ingest");
    (engine, report.edges[0])
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// Promotion adds the boost and never exceeds the cap.
    #[test]
    fn promotion_boost_is_bounded(bp in 0u16..=CONFIDENCE_SCALE) {
        let source = Confidence::from_bp(bp).expect("bp");
        let promoted = promoted_confidence(source);

        prop_assert_eq!(promoted.bp(), bp.saturating_add(1_000).min(PROMOTION_CAP_BP));
        prop_assert!(promoted.bp() <= PROMOTION_CAP_BP);
    }

    /// Consensus stays inside the clamp range and follows the net vote count.
    #[test]
    fn consensus_follows_net_votes(up in 0u32..200, down in 0u32..200, neutral in 0u32..50) {
        let tally = VoteTally { up, down, neutral };
        let confidence = consensus_confidence(&tally);

        let expected = (7_000i64 + 500 * (i64::from(up) - i64::from(down)))
            .clamp(i64::from(CONSENSUS_FLOOR_BP), i64::from(CONFIDENCE_SCALE));
        prop_assert_eq!(i64::from(confidence.bp()), expected);
    }

    /// Anchored consensus with a baseline of 0.70 matches the fixed base.
    #[test]
    fn anchored_at_base_matches_fixed(up in 0u32..50, down in 0u32..50) {
        let tally = VoteTally { up, down, neutral: 0 };
        let base = Confidence::from_bp(7_000).expect("bp");
        prop_assert_eq!(anchored_confidence(base, &tally), consensus_confidence(&tally));
    }

    /// Normalizing a slug twice gives the same slug.
    #[test]
    fn slug_normalization_is_idempotent(label in "[\\p{L}\\p{N}\\p{M} _()-]{1,40}") {
        if let Ok(slug) = Slug::normalize(&label) {
            let again = Slug::normalize(slug.as_str()).expect("renormalize");
            prop_assert_eq!(slug, again);
        }
    }

    /// Any sequence of votes leaves one vote per user, holding the last value.
    #[test]
    fn votes_are_upserted_per_user(
        casts in vec((0usize..4, vote_value()), 1..30)
    ) {
        let (engine, edge_id) = single_edge_engine(5_000);
        let users = ["ana", "ben", "cai", "dee"];
        let mut last = BTreeMap::new();

        for (user, value) in &casts {
            engine
                .cast_vote(VoteRequest {
                    user_id: UserId::new(users[*user]),
                    edge_id,
                    value: *value,
                    comment: None,
                })
                .expect("vote");
            last.insert(users[*user], *value);
        }

        let votes = engine.votes_for(edge_id).expect("votes");
        let voters: BTreeSet<&str> = votes.iter().map(|v| v.user_id.as_str()).collect();
        prop_assert_eq!(votes.len(), last.len());
        prop_assert_eq!(voters.len(), last.len());
        for vote in &votes {
            prop_assert_eq!(Some(&vote.value), last.get(vote.user_id.as_str()));
        }

        let tally = VoteTally::from_values(last.values().copied());
        let edge = engine.edge(edge_id).expect("edge");
        prop_assert_eq!(edge.confidence, consensus_confidence(&tally));
    }

    /// Promoting any learner edge any number of times yields one curated edge.
    #[test]
    fn repeated_promotion_creates_one_edge(bp in 0u16..=CONFIDENCE_SCALE, repeats in 1usize..5) {
        let (engine, edge_id) = single_edge_engine(bp);
        let curator = UserId::new("curator");

        let mut curated = BTreeSet::new();
        for _ in 0..repeats {
            curated.insert(engine.promote(edge_id, &curator).expect("promote").edge_id());
        }

        prop_assert_eq!(curated.len(), 1);
        let stats = engine.stats().expect("stats");
        prop_assert_eq!(stats.edges, 2);
        prop_assert_eq!(stats.nodes, 4);
    }
}
