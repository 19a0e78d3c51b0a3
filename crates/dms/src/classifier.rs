//! Eye-state classification.
//!
//! A single eye region is judged open or closed by fusing three
//! measurements:
//! - darkness: how many pixels are dark enough to be pupil or iris
//! - edge density: how much eyelid / iris structure the Canny detector finds
//! - shape ratio: largest foreground contour area over its convex hull area
//!
//! The eye is `Open` only when all three agree. A false "closed" costs at
//! most a spurious blink, while a false "open" could hide a real alert.

use image::GrayImage;
use imageproc::contours::{find_contours, BorderType};
use imageproc::edges::canny;
use imageproc::geometry::convex_hull;
use imageproc::point::Point;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::config::{AnalysisRegion, EyeClassifierConfig};
use crate::detector::Region;
use crate::DmsError;

/// Open/closed verdict for one eye in one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EyeVerdict {
    Open,
    Closed,
}

impl EyeVerdict {
    pub fn is_closed(self) -> bool {
        self == EyeVerdict::Closed
    }
}

/// Raw measurements behind a verdict
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EyeSignals {
    /// Pixels below the darkness threshold
    pub dark_pixels: u32,
    /// Pixels marked by the edge detector
    pub edge_pixels: u32,
    /// Largest contour area over its hull area, 0.0 when undefined
    pub area_ratio: f64,
}

/// Eye-state classifier
#[derive(Debug, Clone)]
pub struct EyeClassifier {
    config: EyeClassifierConfig,
}

impl EyeClassifier {
    pub fn new(config: EyeClassifierConfig) -> Result<Self, DmsError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &EyeClassifierConfig {
        &self.config
    }

    /// Classify the pixels of one eye region.
    ///
    /// Empty input is `Open`: malformed detector output must never count
    /// as a blink.
    pub fn classify(&self, eye: &GrayImage) -> EyeVerdict {
        let (w, h) = eye.dimensions();
        if w == 0 || h == 0 {
            return EyeVerdict::Open;
        }

        match self.config.analysis_region {
            AnalysisRegion::Full => self.fuse(&self.measure(eye)),
            AnalysisRegion::Pupil => {
                let band = Region::new(0, 0, w, h).pupil_band();
                if band.is_empty() {
                    return EyeVerdict::Open;
                }
                self.fuse(&self.measure(&band.crop(eye)))
            }
        }
    }

    /// Classify `region` of `frame`; empty or out-of-frame regions are `Open`
    pub fn classify_region(&self, frame: &GrayImage, region: &Region) -> EyeVerdict {
        let (w, h) = frame.dimensions();
        if !region.fits_within(w, h) {
            debug!("Eye region {:?} invalid for {}x{} frame, assuming open", region, w, h);
            return EyeVerdict::Open;
        }
        self.classify(&region.crop(frame))
    }

    /// Compute the three signals for an eye image
    pub fn measure(&self, eye: &GrayImage) -> EyeSignals {
        let signals = EyeSignals {
            dark_pixels: count_dark_pixels(eye, self.config.dark_pixel_threshold),
            edge_pixels: count_edge_pixels(
                eye,
                self.config.edge_low_threshold,
                self.config.edge_high_threshold,
            ),
            area_ratio: contour_hull_ratio(eye),
        };
        trace!(?signals, "eye signals");
        signals
    }

    /// Conjunctive fusion: open only if every signal says open
    pub fn fuse(&self, signals: &EyeSignals) -> EyeVerdict {
        let c = &self.config;
        let dark_open = signals.dark_pixels >= c.min_dark_pixels;
        let edge_open = signals.edge_pixels >= c.min_edge_pixels;
        let shape_open = signals.area_ratio >= c.min_area_ratio;

        if dark_open && edge_open && shape_open {
            EyeVerdict::Open
        } else {
            EyeVerdict::Closed
        }
    }
}

/// Count pixels strictly below `threshold`
pub fn count_dark_pixels(image: &GrayImage, threshold: u8) -> u32 {
    image.pixels().filter(|p| p[0] < threshold).count() as u32
}

/// Count pixels the Canny hysteresis detector marks as edges
pub fn count_edge_pixels(image: &GrayImage, low: f32, high: f32) -> u32 {
    if image.width() == 0 || image.height() == 0 {
        return 0;
    }
    canny(image, low, high).pixels().filter(|p| p[0] > 0).count() as u32
}

/// Area of the largest outer contour of non-zero pixels divided by the
/// area of its convex hull.
///
/// Returns 0.0 when there is no contour or the hull has no area.
pub fn contour_hull_ratio(image: &GrayImage) -> f64 {
    if image.width() == 0 || image.height() == 0 {
        return 0.0;
    }

    let contours = find_contours::<i32>(image);
    let largest = contours
        .iter()
        .filter(|c| matches!(c.border_type, BorderType::Outer))
        .map(|c| (polygon_area(&c.points), c))
        .max_by(|a, b| a.0.total_cmp(&b.0));

    let Some((area, contour)) = largest else {
        return 0.0;
    };
    if area <= 0.0 {
        return 0.0;
    }

    let hull = convex_hull(contour.points.as_slice());
    let hull_area = polygon_area(&hull);
    if hull_area <= 0.0 {
        return 0.0;
    }

    area / hull_area
}

/// Shoelace area of a closed polygon
fn polygon_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let twice: i64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| i64::from(a.x) * i64::from(b.y) - i64::from(b.x) * i64::from(a.y))
        .sum();
    twice.unsigned_abs() as f64 / 2.0
}
