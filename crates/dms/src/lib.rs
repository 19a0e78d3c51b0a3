//! Driver Monitoring System (DMS)
//!
//! Real-time driver drowsiness analysis from camera frames:
//! - Face and eye region extraction through a pluggable detector
//! - Eye open/closed classification by fusing darkness, edge and shape signals
//! - Blink counting and sustained-closure (drowsiness) alerts

pub mod analysis;
pub mod classifier;
pub mod config;
pub mod detector;
pub mod state;

pub use analysis::{DmsAnalysis, DmsEvent, EyeObservation};
pub use classifier::{EyeClassifier, EyeSignals, EyeVerdict};
pub use config::{AnalysisRegion, DetectorConfig, DmsConfig, EyeClassifierConfig};
pub use detector::{
    primary_face, FaceObservation, ProportionalEyeDetector, ProportionalFaceDetector, Region,
    RegionDetector, RegionExtractor, RelativeRect,
};
pub use state::{both_eyes_closed, DrowsinessState, StateTransition, Timestamp};

use std::time::Duration;

use image::GrayImage;
use thiserror::Error;
use tracing::{debug, info, warn};

/// DMS error types
#[derive(Error, Debug)]
pub enum DmsError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Detection failed: {0}")]
    Detection(String),
}

/// Driver monitoring module; owns one session's state
pub struct DmsModule {
    config: DmsConfig,
    alert_threshold: Duration,
    classifier: EyeClassifier,
    extractor: RegionExtractor,
    state: DrowsinessState,
    inconclusive_frames: u32,
}

impl DmsModule {
    /// Create a new DMS module with configuration
    pub fn new(config: DmsConfig, extractor: RegionExtractor) -> Result<Self, DmsError> {
        config.validate()?;
        let alert_threshold = config.alert_threshold()?;

        info!(
            "DMS ready: alert after {:.1}s of closure, analysis region {:?}",
            config.alert_threshold_secs, config.classifier.analysis_region
        );

        Ok(Self {
            alert_threshold,
            classifier: EyeClassifier::new(config.classifier.clone())?,
            extractor,
            state: DrowsinessState::default(),
            inconclusive_frames: 0,
            config,
        })
    }

    pub fn config(&self) -> &DmsConfig {
        &self.config
    }

    pub fn state(&self) -> &DrowsinessState {
        &self.state
    }

    /// Analyze a single grayscale frame captured at `now`
    pub fn analyze(&mut self, frame: &GrayImage, now: Timestamp) -> Result<DmsAnalysis, DmsError> {
        let faces = self.extractor.extract(frame)?;
        let primary = primary_face(&faces);

        let eyes: Vec<EyeObservation> = primary
            .map(|face| {
                let search = face.face.upper_half();
                face.eyes
                    .iter()
                    .map(|region| EyeObservation {
                        region: *region,
                        verdict: if search.contains(region) {
                            self.classifier.classify_region(frame, region)
                        } else {
                            debug!("Eye region {:?} outside face, assuming open", region);
                            EyeVerdict::Open
                        },
                    })
                    .collect()
            })
            .unwrap_or_default();

        self.track_inconclusive(eyes.len());

        let verdicts: Vec<EyeVerdict> = eyes.iter().map(|e| e.verdict).collect();
        let closed = both_eyes_closed(&verdicts);

        let closed_before = self.state.closed_for(now);
        let transition = self.state.advance(closed, now, self.alert_threshold);
        let closed_for = self.state.closed_for(now);

        let mut events = Vec::new();
        if transition.blink_started {
            info!("Blink detected! Count: {}", self.state.blink_count());
            events.push(DmsEvent::Blink {
                count: self.state.blink_count(),
            });
        }
        if transition.alert_raised {
            let closed_for_ms = millis(closed_for.unwrap_or_default());
            warn!("Drowsiness alert: eyes closed for {} ms", closed_for_ms);
            events.push(DmsEvent::DrowsinessAlertRaised { closed_for_ms });
        }
        if transition.alert_cleared {
            let closed_for_ms = millis(closed_before.unwrap_or_default());
            info!("Drowsiness alert cleared after {} ms of closure", closed_for_ms);
            events.push(DmsEvent::DrowsinessAlertCleared { closed_for_ms });
        }

        Ok(DmsAnalysis {
            face_detected: primary.is_some(),
            face_bbox: primary.map(|f| f.face),
            eyes,
            both_eyes_closed: closed,
            blink_count: self.state.blink_count(),
            eyes_closed: self.state.eyes_closed(),
            alert_active: self.state.alert_active(),
            closed_for_ms: closed_for.map(millis),
            events,
        })
    }

    fn track_inconclusive(&mut self, eyes_seen: usize) {
        if eyes_seen >= 2 {
            if self.inconclusive_frames > 0 {
                debug!("Eyes visible again after {} inconclusive frames", self.inconclusive_frames);
            }
            self.inconclusive_frames = 0;
            return;
        }

        if self.inconclusive_frames == 0 {
            info!("Only {} eye(s) detected; treating frames as open until both are visible", eyes_seen);
        } else {
            debug!("Inconclusive frame ({} eye(s) detected)", eyes_seen);
        }
        self.inconclusive_frames = self.inconclusive_frames.saturating_add(1);
    }

    /// Reset driver state (new session or driver change)
    pub fn reset_state(&mut self) {
        self.state.reset();
        self.inconclusive_frames = 0;
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
