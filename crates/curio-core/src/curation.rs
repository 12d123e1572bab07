//! # Curation Orchestrator
//!
//! Applies a batch of curator decisions, one edge at a time.
//!
//! - The whole batch is validated before any store access
//! - Each item runs in its own write transaction
//! - A failing item is logged and skipped; it never aborts the batch and never
//!   rolls back items processed before it

use crate::merge::MergeEngine;
use crate::primitives::MAX_BATCH_ITEMS;
use crate::store::CurationStore;
use crate::types::{CurioError, EdgeId, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A curator decision on one edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CurationAction {
    Promote,
    Reject,
    NeedsReview,
}

impl CurationAction {
    /// Wire name of the action.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Promote => "PROMOTE",
            Self::Reject => "REJECT",
            Self::NeedsReview => "NEEDS_REVIEW",
        }
    }
}

impl FromStr for CurationAction {
    type Err = CurioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PROMOTE" => Ok(Self::Promote),
            "REJECT" => Ok(Self::Reject),
            "NEEDS_REVIEW" => Ok(Self::NeedsReview),
            other => Err(CurioError::Validation(format!(
                "unknown curation action '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for CurationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One decision of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchItem {
    pub edge_id: EdgeId,
    pub action: CurationAction,
}

/// Decisions surfaced together in one diff, made by one curator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurationBatch {
    /// Groups the decisions for traceability; not checked against storage.
    pub diff_id: String,
    pub curator: UserId,
    pub items: Vec<BatchItem>,
}

impl CurationBatch {
    /// Reject a batch that cannot be attributed or is too large.
    pub fn validate(&self) -> Result<(), CurioError> {
        if self.diff_id.trim().is_empty() {
            return Err(CurioError::Validation("diff id is empty".to_string()));
        }
        if self.curator.as_str().trim().is_empty() {
            return Err(CurioError::Validation("curator id is empty".to_string()));
        }
        if self.items.len() > MAX_BATCH_ITEMS {
            return Err(CurioError::Validation(format!(
                "batch holds {} items, limit is {}",
                self.items.len(),
                MAX_BATCH_ITEMS
            )));
        }
        Ok(())
    }
}

/// An item that was not applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedItem {
    pub edge_id: EdgeId,
    pub reason: String,
}

/// Counts of a processed batch.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Successful promotions, idempotent no-ops included.
    pub promoted: u32,
    pub rejected: u32,
    pub needs_review: u32,
    /// Promotions that found the edge already curated.
    pub already_curated: u32,
    pub skipped: Vec<SkippedItem>,
}

/// Batch curation.
pub struct CurationOrchestrator;

impl CurationOrchestrator {
    /// Apply every item of a batch, isolating per-item failures.
    ///
    /// Only batch-level validation errors are returned as `Err`.
    pub fn process_batch<S: CurationStore>(
        store: &S,
        batch: &CurationBatch,
    ) -> Result<BatchSummary, CurioError> {
        batch.validate()?;

        let span = tracing::info_span!(
            "curation_batch",
            diff_id = %batch.diff_id,
            curator = %batch.curator,
            items = batch.items.len()
        );
        let _guard = span.enter();

        let mut summary = BatchSummary::default();
        for item in &batch.items {
            let result = store.write(|tx| match item.action {
                CurationAction::Promote => {
                    MergeEngine::promote(tx, item.edge_id, &batch.curator).map(|o| o.is_skipped())
                }
                CurationAction::Reject => {
                    MergeEngine::reject(tx, item.edge_id, &batch.curator).map(|_| false)
                }
                CurationAction::NeedsReview => {
                    MergeEngine::flag_for_review(tx, item.edge_id, &batch.curator).map(|_| false)
                }
            });

            match result {
                Ok(already_curated) => match item.action {
                    CurationAction::Promote => {
                        summary.promoted = summary.promoted.saturating_add(1);
                        if already_curated {
                            summary.already_curated = summary.already_curated.saturating_add(1);
                        }
                    }
                    CurationAction::Reject => {
                        summary.rejected = summary.rejected.saturating_add(1);
                    }
                    CurationAction::NeedsReview => {
                        summary.needs_review = summary.needs_review.saturating_add(1);
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        edge_id = %item.edge_id,
                        action = %item.action,
                        error = %e,
                        "skipping curation item"
                    );
                    summary.skipped.push(SkippedItem {
                        edge_id: item.edge_id,
                        reason: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            promoted = summary.promoted,
            rejected = summary.rejected,
            needs_review = summary.needs_review,
            already_curated = summary.already_curated,
            skipped = summary.skipped.len(),
            "processed curation batch"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actions_parse_from_wire_names() {
        for action in [
            CurationAction::Promote,
            CurationAction::Reject,
            CurationAction::NeedsReview,
        ] {
            assert_eq!(action.as_str().parse::<CurationAction>().expect("parse"), action);
        }
        assert!(matches!(
            "promote".parse::<CurationAction>(),
            Err(CurioError::Validation(_))
        ));
    }

    #[test]
    fn batch_validation_runs_before_storage() {
        let batch = CurationBatch {
            diff_id: " ".to_string(),
            curator: UserId::new("c"),
            items: Vec::new(),
        };
        assert!(batch.validate().is_err());

        let batch = CurationBatch {
            diff_id: "d-1".to_string(),
            curator: UserId::new(""),
            items: Vec::new(),
        };
        assert!(batch.validate().is_err());

        let batch = CurationBatch {
            diff_id: "d-1".to_string(),
            curator: UserId::new("c"),
            items: vec![
                BatchItem {
                    edge_id: EdgeId(1),
                    action: CurationAction::Reject,
                };
                MAX_BATCH_ITEMS + 1
            ],
        };
        assert!(batch.validate().is_err());
    }
}
