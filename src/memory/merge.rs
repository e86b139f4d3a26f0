//! Merge pipeline: fuse two elements into one behind a verification gate
//!
//! Stages run strictly in order and any failure aborts the rest:
//!
//! 1. fetch both elements (and the pending merge candidate)
//! 2. fuse their contents with the completion backend
//! 3. build the merged element (type of the first element)
//! 4. embed the fused content
//! 5. verify; a rejection annotates the candidate and stops here
//! 6. commit in one transaction: persist, redirect associations,
//!    tombstone both originals, delete the candidate
//!
//! Nothing is written before stage 5, so failures up to there leave the
//! graph untouched. Merges sharing a participant are serialized through
//! per-element locks held for the whole run.

use super::error::{MemoryError, MemoryResult};
use super::processor::{checkpoint, until_cancelled, MemoryProcessor};
use super::prompts::{merge_messages, strip_code_fence, verify_messages};
use crate::cancel::CancellationToken;
use crate::graph::{Element, ElementId, ElementPair};
use crate::llm::Message;
use crate::storage::{MergeOutcome, MergePlan};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

/// Structured judgement returned by the verification stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeVerification {
    pub success: bool,
    /// In [0, 1]
    pub confidence: f64,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

/// Result of a committed merge
#[derive(Debug, Clone)]
pub struct MergeReport {
    /// The new element, as persisted
    pub merged: Element,
    /// The superseded pair
    pub pair: ElementPair,
    pub verification: MergeVerification,
    pub outcome: MergeOutcome,
}

impl MemoryProcessor {
    /// Merge two elements believed to hold overlapping information.
    ///
    /// Requires a pending merge candidate for the pair, so repeating a
    /// committed merge fails with `NotFound`. Fails with `Conflict` if a
    /// participant was already merged away by another pair, and with
    /// `VerificationRejected` (leaving only a note on the candidate) when
    /// the verification stage judges the fused content unsuccessful.
    pub async fn merge_elements(
        &self,
        first: ElementId,
        second: ElementId,
        cancel: &CancellationToken,
    ) -> MemoryResult<MergeReport> {
        let pair = ElementPair::new(first, second);
        if pair.is_degenerate() {
            return Err(MemoryError::Validation(format!(
                "cannot merge element {first} with itself"
            )));
        }

        let guard = until_cancelled(cancel, async {
            Ok::<_, MemoryError>(self.locks.acquire(pair).await)
        })
        .await?;
        debug!(pair = %guard.pair(), "merge: participants locked");
        let result = self.merge_locked(first, second, cancel).await;
        drop(guard);
        self.locks.prune();
        result
    }

    async fn merge_locked(
        &self,
        first_id: ElementId,
        second_id: ElementId,
        cancel: &CancellationToken,
    ) -> MemoryResult<MergeReport> {
        let pair = ElementPair::new(first_id, second_id);
        checkpoint(cancel)?;

        debug!(%pair, "merge: fetch");
        let first = self.store.get_element(&first_id)?;
        let second = self.store.get_element(&second_id)?;
        self.store.get_merge_candidate(&pair)?;
        for element in [&first, &second] {
            if let Some(successor) = element.merged_into() {
                return Err(MemoryError::Conflict(format!(
                    "element {} was already merged into {successor}",
                    element.id
                )));
            }
        }
        if first.element_type != second.element_type {
            return Err(MemoryError::Validation(format!(
                "cannot merge {} element with {} element",
                first.element_type, second.element_type
            )));
        }

        debug!(%pair, "merge: fuse");
        let fused = self
            .complete_json(merge_messages(&first.content, &second.content), "fused content", cancel)
            .await?;

        debug!(%pair, "merge: embed");
        let fused_text = fused.to_string();
        let embedding = until_cancelled(cancel, async {
            self.embedder.embed(&fused_text).await.map_err(MemoryError::from)
        })
        .await?;
        let mut merged = Element::new(first.element_type, fused.clone()).with_embedding(embedding);

        debug!(%pair, "merge: verify");
        let verification = self
            .verify(&first.content, &second.content, &fused, cancel)
            .await?;

        if !verification.success {
            self.store
                .annotate_merge_candidate(&pair, &json!({ "merge_verification_failed": verification }))?;
            info!(
                %pair,
                confidence = verification.confidence,
                issues = verification.issues.len(),
                "merge rejected by verification"
            );
            return Err(MemoryError::VerificationRejected {
                confidence: verification.confidence,
                issues: verification.issues,
            });
        }

        merged.content = json!({
            "content": fused,
            "merge_verification": verification,
        });

        checkpoint(cancel)?;
        let plan = MergePlan {
            pair,
            merged,
            merged_at: Utc::now(),
        };
        let outcome = self.store.apply_merge(&plan, cancel)?;

        info!(
            %pair,
            merged = %plan.merged.id,
            redirected = outcome.redirected_sources + outcome.redirected_targets,
            "merge committed"
        );
        Ok(MergeReport {
            merged: plan.merged,
            pair,
            verification,
            outcome,
        })
    }

    /// Run a completion to the end and parse its text as JSON
    async fn complete_json(
        &self,
        messages: Vec<Message>,
        what: &str,
        cancel: &CancellationToken,
    ) -> MemoryResult<Value> {
        let output = until_cancelled(cancel, async {
            let completion = self.completion.complete(&messages).await?;
            completion.collect().await.map_err(MemoryError::from)
        })
        .await?;
        debug!(tokens = ?output.tokens, chars = output.text.len(), "completion collected");

        serde_json::from_str(strip_code_fence(&output.text))
            .map_err(|e| MemoryError::Validation(format!("{what} is not valid JSON: {e}")))
    }

    async fn verify(
        &self,
        first: &Value,
        second: &Value,
        merged: &Value,
        cancel: &CancellationToken,
    ) -> MemoryResult<MergeVerification> {
        let judgement = self
            .complete_json(verify_messages(first, second, merged), "verification", cancel)
            .await?;
        let verification: MergeVerification = serde_json::from_value(judgement)
            .map_err(|e| MemoryError::Validation(format!("malformed verification: {e}")))?;
        if !(0.0..=1.0).contains(&verification.confidence) {
            return Err(MemoryError::Validation(format!(
                "verification confidence {} outside [0, 1]",
                verification.confidence
            )));
        }
        Ok(verification)
    }
}
