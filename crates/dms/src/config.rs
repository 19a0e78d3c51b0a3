//! DMS configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::detector::RelativeRect;
use crate::DmsError;

/// Which part of a detected eye box the classifier measures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisRegion {
    /// The whole eye box
    #[default]
    Full,
    /// Central band of the eye box where the pupil sits
    Pupil,
}

/// Eye-state classifier calibration.
///
/// The numeric defaults were tuned for a 640x480 cabin camera under
/// indoor lighting and are expected to be re-tuned per deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EyeClassifierConfig {
    /// Pixels strictly below this intensity count as dark
    pub dark_pixel_threshold: u8,

    /// Minimum dark pixels for an open (pupil visible) eye
    pub min_dark_pixels: u32,

    /// Canny hysteresis low threshold
    pub edge_low_threshold: f32,

    /// Canny hysteresis high threshold
    pub edge_high_threshold: f32,

    /// Minimum edge pixels for an open eye
    pub min_edge_pixels: u32,

    /// Minimum contour-area / hull-area ratio for an open eye
    pub min_area_ratio: f64,

    /// Part of the eye box to analyze
    pub analysis_region: AnalysisRegion,
}

impl Default for EyeClassifierConfig {
    fn default() -> Self {
        Self {
            dark_pixel_threshold: 50,
            min_dark_pixels: 100,
            edge_low_threshold: 100.0,
            edge_high_threshold: 200.0,
            min_edge_pixels: 30,
            min_area_ratio: 0.2,
            analysis_region: AnalysisRegion::Full,
        }
    }
}

impl EyeClassifierConfig {
    pub fn validate(&self) -> Result<(), DmsError> {
        for (name, value) in [
            ("edge_low_threshold", self.edge_low_threshold),
            ("edge_high_threshold", self.edge_high_threshold),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(DmsError::Config(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }

        if self.edge_low_threshold > self.edge_high_threshold {
            return Err(DmsError::Config(format!(
                "edge_low_threshold ({}) must not exceed edge_high_threshold ({})",
                self.edge_low_threshold, self.edge_high_threshold
            )));
        }

        if !self.min_area_ratio.is_finite() || !(0.0..=1.0).contains(&self.min_area_ratio) {
            return Err(DmsError::Config(format!(
                "min_area_ratio must be within [0, 1], got {}",
                self.min_area_ratio
            )));
        }

        Ok(())
    }
}

/// Placement of the built-in proportional face and eye detectors.
///
/// The face box is relative to the whole frame, the eye boxes to the upper
/// half of the face box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub face: RelativeRect,
    pub left_eye: RelativeRect,
    pub right_eye: RelativeRect,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            face: RelativeRect::new(0.3, 0.2, 0.4, 0.5),
            left_eye: RelativeRect::new(0.15, 0.35, 0.3, 0.5),
            right_eye: RelativeRect::new(0.55, 0.35, 0.3, 0.5),
        }
    }
}

impl DetectorConfig {
    pub fn validate(&self) -> Result<(), DmsError> {
        self.face.validate("face")?;
        self.left_eye.validate("left_eye")?;
        self.right_eye.validate("right_eye")
    }
}

/// DMS configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DmsConfig {
    /// Eye-state classifier parameters
    pub classifier: EyeClassifierConfig,

    /// Continuous eye closure before the drowsiness alert fires (seconds)
    pub alert_threshold_secs: f64,
}

impl Default for DmsConfig {
    fn default() -> Self {
        Self {
            classifier: EyeClassifierConfig::default(),
            alert_threshold_secs: 4.0,
        }
    }
}

impl DmsConfig {
    /// Create strict config (alerts sooner)
    pub fn strict() -> Self {
        Self {
            alert_threshold_secs: 3.0,
            ..Default::default()
        }
    }

    /// Create lenient config (alerts later)
    pub fn lenient() -> Self {
        Self {
            alert_threshold_secs: 5.0,
            ..Default::default()
        }
    }

    /// Reject invalid settings; values are never clamped
    pub fn validate(&self) -> Result<(), DmsError> {
        self.classifier.validate()?;
        self.alert_threshold().map(|_| ())
    }

    /// Alert threshold as a duration
    pub fn alert_threshold(&self) -> Result<Duration, DmsError> {
        if !self.alert_threshold_secs.is_finite() || self.alert_threshold_secs <= 0.0 {
            return Err(DmsError::Config(format!(
                "alert_threshold_secs must be a positive number, got {}",
                self.alert_threshold_secs
            )));
        }
        Duration::try_from_secs_f64(self.alert_threshold_secs)
            .map_err(|e| DmsError::Config(format!("alert_threshold_secs: {e}")))
    }
}
