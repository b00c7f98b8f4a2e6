//! Stage transition engine: the funnel's finite-state machine.
//!
//! At most one transition fires per message: the first rule whose condition
//! holds for the current stage. `Converted` is terminal, and the
//! `Interest → Objections` detour never leads back to `Interest`.

use serde::{Deserialize, Serialize};

use crate::funnel::types::{Intent, Stage};

/// Numeric gates for the transition table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StageThresholds {
    /// Messages needed before leaving `Initial`.
    pub qualification_min_messages: u64,
    /// Score above which `Qualification` moves to `Interest`.
    pub interest_score: f64,
    /// Score above which `Interest` moves to `Closing`.
    pub closing_score: f64,
    /// Score above which `Objections` moves to `Closing`.
    pub objections_recovery_score: f64,
    /// Score above which `Closing` moves to `Converted`.
    pub conversion_score: f64,
}

impl Default for StageThresholds {
    fn default() -> Self {
        Self {
            qualification_min_messages: 2,
            interest_score: 0.4,
            closing_score: 0.6,
            objections_recovery_score: 0.5,
            conversion_score: 0.8,
        }
    }
}

/// Everything a transition decision looks at.
#[derive(Debug, Clone, Copy)]
pub struct TransitionInput<'a> {
    pub current: &'a Stage,
    /// Score after this message was scored.
    pub score: f64,
    pub intent: &'a Intent,
    /// Count including this message.
    pub message_count: u64,
    /// Turns already answered in `Closing`, not counting this one.
    pub closing_turns: u64,
}

/// Decides the next stage.
#[derive(Debug, Clone, Default)]
pub struct StageTransitionEngine {
    thresholds: StageThresholds,
}

impl StageTransitionEngine {
    pub fn new(thresholds: StageThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &StageThresholds {
        &self.thresholds
    }

    /// Next stage for this input, or the current one if no rule fires.
    pub fn next_stage(&self, input: TransitionInput<'_>) -> Stage {
        let t = &self.thresholds;
        let intent = input.intent;
        let score = input.score;

        match input.current {
            Stage::Initial if input.message_count >= t.qualification_min_messages => {
                Stage::Qualification
            }
            Stage::Qualification if intent.meeting_interest || score > t.interest_score => {
                Stage::Interest
            }
            Stage::Interest if intent.trust_concern => Stage::Objections,
            Stage::Interest if score > t.closing_score || intent.price_question => Stage::Closing,
            Stage::Objections if score > t.objections_recovery_score => Stage::Closing,
            // The closing pitch has to have been seen at least once.
            Stage::Closing if score > t.conversion_score && input.closing_turns > 0 => {
                Stage::Converted
            }
            other => other.clone(),
        }
    }
}

/// Whether `from → to` is an edge of the transition table (self-loops included).
pub fn is_allowed_transition(from: &Stage, to: &Stage) -> bool {
    use Stage::*;
    from == to
        || matches!(
            (from, to),
            (Initial, Qualification)
                | (Qualification, Interest)
                | (Interest, Objections)
                | (Interest, Closing)
                | (Objections, Closing)
                | (Closing, Converted)
        )
}
