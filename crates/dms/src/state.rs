//! Drowsiness state tracking

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::classifier::EyeVerdict;

/// Monotonic time since session start
pub type Timestamp = Duration;

/// Edges produced by one call to [`DrowsinessState::advance`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateTransition {
    /// Eyes went from open to closed; counted as one blink
    pub blink_started: bool,
    /// Sustained closure crossed the alert threshold
    pub alert_raised: bool,
    /// Eyes reopened while the alert was active
    pub alert_cleared: bool,
}

/// Session-scoped blink and closure state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrowsinessState {
    blink_count: u64,
    closed_since: Option<Timestamp>,
    alert_active: bool,
}

impl DrowsinessState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blinks counted this session
    pub fn blink_count(&self) -> u64 {
        self.blink_count
    }

    pub fn eyes_closed(&self) -> bool {
        self.closed_since.is_some()
    }

    /// Start of the current closure
    pub fn closed_since(&self) -> Option<Timestamp> {
        self.closed_since
    }

    pub fn alert_active(&self) -> bool {
        self.alert_active
    }

    /// How long the eyes have been closed at `now`
    pub fn closed_for(&self, now: Timestamp) -> Option<Duration> {
        self.closed_since.map(|since| now.saturating_sub(since))
    }

    /// Fold one frame into the state.
    ///
    /// A blink is counted on the transition into closed only, so the count
    /// does not depend on frame rate. The alert fires once the closure
    /// lasts strictly longer than `alert_threshold` and clears on the first
    /// frame that is not both-eyes-closed.
    pub fn advance(
        &mut self,
        both_eyes_closed: bool,
        now: Timestamp,
        alert_threshold: Duration,
    ) -> StateTransition {
        let mut transition = StateTransition::default();

        match (self.closed_since, both_eyes_closed) {
            (None, true) => {
                self.closed_since = Some(now);
                self.blink_count += 1;
                transition.blink_started = true;
            }
            (None, false) => {}
            (Some(since), true) => {
                if !self.alert_active && now.saturating_sub(since) > alert_threshold {
                    self.alert_active = true;
                    transition.alert_raised = true;
                }
            }
            (Some(_), false) => {
                self.closed_since = None;
                transition.alert_cleared = self.alert_active;
                self.alert_active = false;
            }
        }

        transition
    }

    /// Reset state (new session or subject change)
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// True iff at least two eyes were observed and every one of them is
/// closed. Fewer than two observations is inconclusive and reads as open.
pub fn both_eyes_closed(verdicts: &[EyeVerdict]) -> bool {
    verdicts.len() >= 2 && verdicts.iter().all(|v| v.is_closed())
}
