//! Caller-owned review session.
//!
//! Holds what an operator is currently looking at: the last analyzed case,
//! its decision, and every justification review applied since. The engine
//! stays stateless; the UI (or CLI) owns one of these per operator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pipeline::authorization::{
    clamp_confidence, Decision, DecisionBody, DecisionCore, DecisionResult, JustificationReview,
    ProcedureDecision,
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("No analysis result in this session")]
    NoActiveResult,

    #[error("Procedure index {index} out of range ({count} procedures)")]
    ProcedureOutOfRange { index: usize, count: usize },

    #[error("Multi-procedure result: a procedure index is required")]
    ProcedureIndexRequired,
}

/// What applying a justification review did to the stored decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewOutcome {
    /// Decision changed to APPROVED and was merged.
    Approved,
    /// Model reported a change, but the result is still DENIED.
    StillDenied,
    /// Model reported a change, but more information is still needed.
    StillPending,
    Unchanged,
}

/// One justification submitted against a procedure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JustificationEntry {
    /// `None` for a single-procedure result.
    pub procedure_index: Option<usize>,
    pub justification: String,
    pub review: JustificationReview,
    pub outcome: ReviewOutcome,
    pub submitted_at: DateTime<Utc>,
}

/// Decision counts across the current result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DecisionSummary {
    pub total: usize,
    pub approved: usize,
    pub denied: usize,
    pub pending: usize,
}

impl DecisionSummary {
    /// Procedures that still need operator attention.
    pub fn needs_attention(&self) -> usize {
        self.denied + self.pending
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaseSession {
    case_text: Option<String>,
    result: Option<DecisionResult>,
    analyzed_at: Option<DateTime<Utc>>,
    history: Vec<JustificationEntry>,
}

impl CaseSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a fresh analysis. Clears any earlier justification history.
    pub fn record_analysis(&mut self, case_text: impl Into<String>, result: DecisionResult) {
        self.analyzed_at = Some(result.analyzed_at);
        self.case_text = Some(case_text.into());
        self.result = Some(result);
        self.history.clear();
    }

    pub fn case_text(&self) -> Option<&str> {
        self.case_text.as_deref()
    }

    pub fn result(&self) -> Option<&DecisionResult> {
        self.result.as_ref()
    }

    pub fn analyzed_at(&self) -> Option<DateTime<Utc>> {
        self.analyzed_at
    }

    pub fn history(&self) -> &[JustificationEntry] {
        &self.history
    }

    /// The decision a justification for `index` would be reviewed against.
    pub fn decision_for(&self, index: Option<usize>) -> Result<&DecisionCore, SessionError> {
        let result = self.result.as_ref().ok_or(SessionError::NoActiveResult)?;
        match (&result.body, index) {
            (DecisionBody::Single(single), _) => Ok(&single.core),
            (DecisionBody::Multiple(multi), Some(i)) => multi
                .procedures
                .get(i)
                .map(|p| &p.core)
                .ok_or(SessionError::ProcedureOutOfRange {
                    index: i,
                    count: multi.procedures.len(),
                }),
            (DecisionBody::Multiple(_), None) => Err(SessionError::ProcedureIndexRequired),
        }
    }

    /// Record a review and apply the merge policy: only a change to APPROVED
    /// overwrites the stored decision, reasoning and confidence.
    pub fn apply_review(
        &mut self,
        index: Option<usize>,
        justification: impl Into<String>,
        review: JustificationReview,
    ) -> Result<ReviewOutcome, SessionError> {
        // Validates the index before anything is mutated.
        self.decision_for(index)?;

        let outcome = match (review.decision_changed, &review.new_decision) {
            (true, Decision::Approved) => ReviewOutcome::Approved,
            (true, Decision::Denied) => ReviewOutcome::StillDenied,
            (true, _) => ReviewOutcome::StillPending,
            (false, _) => ReviewOutcome::Unchanged,
        };

        if outcome == ReviewOutcome::Approved {
            if let Some(core) = self.core_mut(index) {
                core.decision = Decision::Approved;
                if !review.reasoning.trim().is_empty() {
                    core.reasoning = review.reasoning.clone();
                }
                core.confidence = clamp_confidence(review.confidence);
            }
        }

        tracing::debug!(
            procedure_index = ?index,
            ?outcome,
            history_len = self.history.len() + 1,
            "Justification review applied"
        );

        self.history.push(JustificationEntry {
            procedure_index: index,
            justification: justification.into(),
            review,
            outcome,
            submitted_at: Utc::now(),
        });

        Ok(outcome)
    }

    fn core_mut(&mut self, index: Option<usize>) -> Option<&mut DecisionCore> {
        match (&mut self.result.as_mut()?.body, index) {
            (DecisionBody::Single(single), _) => Some(&mut single.core),
            (DecisionBody::Multiple(multi), Some(i)) => {
                multi.procedures.get_mut(i).map(|p| &mut p.core)
            }
            (DecisionBody::Multiple(_), None) => None,
        }
    }

    /// Counts recomputed from the current (possibly merged) decisions.
    pub fn summary(&self) -> DecisionSummary {
        let Some(result) = &self.result else {
            return DecisionSummary::default();
        };

        result
            .body
            .cores()
            .into_iter()
            .fold(DecisionSummary::default(), |mut acc, core| {
                acc.total += 1;
                match core.decision {
                    Decision::Approved => acc.approved += 1,
                    Decision::Denied => acc.denied += 1,
                    Decision::PendingAdditionalInfo => acc.pending += 1,
                    Decision::Unrecognized(_) => {}
                }
                acc
            })
    }

    /// Procedures of a multi-procedure result with the given decision.
    pub fn procedures_with(&self, decision: &Decision) -> Vec<&ProcedureDecision> {
        self.result
            .as_ref()
            .map(|r| {
                r.procedures()
                    .iter()
                    .filter(|p| &p.core.decision == decision)
                    .collect()
            })
            .unwrap_or_default()
    }
}
