//! DMS analysis results and events

use serde::{Deserialize, Serialize};

use crate::classifier::EyeVerdict;
use crate::detector::Region;

/// State-machine edges worth reporting to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DmsEvent {
    /// Eyes just closed; `count` is the session total including this one
    Blink { count: u64 },

    /// Eyes have stayed closed past the alert threshold
    DrowsinessAlertRaised { closed_for_ms: u64 },

    /// Eyes reopened after an alert
    DrowsinessAlertCleared { closed_for_ms: u64 },
}

/// One classified eye
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EyeObservation {
    pub region: Region,
    pub verdict: EyeVerdict,
}

/// Complete per-frame DMS result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DmsAnalysis {
    /// Whether a face was detected
    pub face_detected: bool,

    /// Primary face bounding box (if detected)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub face_bbox: Option<Region>,

    /// Eyes of the primary face and their verdicts
    pub eyes: Vec<EyeObservation>,

    /// At least two eyes observed and all closed
    pub both_eyes_closed: bool,

    /// Session blink total after this frame
    pub blink_count: u64,

    /// Eyes considered closed after this frame
    pub eyes_closed: bool,

    /// Drowsiness alert active after this frame
    pub alert_active: bool,

    /// Length of the current closure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_for_ms: Option<u64>,

    /// Edges produced by this frame
    pub events: Vec<DmsEvent>,
}

impl DmsAnalysis {
    /// Fewer than two eyes were seen, so the frame could not show closure
    pub fn is_inconclusive(&self) -> bool {
        self.eyes.len() < 2
    }

    pub fn alert_raised(&self) -> bool {
        self.events
            .iter()
            .any(|e| matches!(e, DmsEvent::DrowsinessAlertRaised { .. }))
    }

    pub fn alert_cleared(&self) -> bool {
        self.events
            .iter()
            .any(|e| matches!(e, DmsEvent::DrowsinessAlertCleared { .. }))
    }

    pub fn blink_started(&self) -> bool {
        self.events.iter().any(|e| matches!(e, DmsEvent::Blink { .. }))
    }
}
