//! Face and eye region detection

use image::{imageops, GrayImage};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::DetectorConfig;
use crate::DmsError;

/// Axis-aligned rectangle in image coordinates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Non-empty and fully inside an image of the given size
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        if self.is_empty() {
            return false;
        }
        match (self.x.checked_add(self.width), self.y.checked_add(self.height)) {
            (Some(right), Some(bottom)) => right <= width && bottom <= height,
            _ => false,
        }
    }

    /// Shift by an offset, saturating so an overflowing region stays out of frame
    pub fn translate(&self, dx: u32, dy: u32) -> Region {
        Region {
            x: self.x.saturating_add(dx),
            y: self.y.saturating_add(dy),
            ..*self
        }
    }

    /// `other` is non-empty and lies entirely inside this region
    pub fn contains(&self, other: &Region) -> bool {
        match (other.x.checked_sub(self.x), other.y.checked_sub(self.y)) {
            (Some(dx), Some(dy)) => {
                let relative = Region { x: dx, y: dy, ..*other };
                relative.fits_within(self.width, self.height)
            }
            _ => false,
        }
    }

    /// Top half of the region, where the eyes of a face box are searched
    pub fn upper_half(&self) -> Region {
        Region {
            height: self.height / 2,
            ..*self
        }
    }

    /// Central band of an eye box: rows 1/2..3/4, columns 1/4..3/4
    pub fn pupil_band(&self) -> Region {
        let (w, h) = (self.width, self.height);
        Region {
            x: self.x + w / 4,
            y: self.y + 2 * h / 4,
            width: 3 * w / 4 - w / 4,
            height: 3 * h / 4 - 2 * h / 4,
        }
    }

    /// Copy the region's pixels out of `image`; caller checks bounds first
    pub(crate) fn crop(&self, image: &GrayImage) -> GrayImage {
        imageops::crop_imm(image, self.x, self.y, self.width, self.height).to_image()
    }
}

/// Rectangle expressed as fractions of the image it is placed in
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RelativeRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl RelativeRect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn validate(&self, name: &str) -> Result<(), DmsError> {
        let fractions = [self.x, self.y, self.width, self.height];
        if fractions.iter().any(|f| !f.is_finite() || !(0.0..=1.0).contains(f)) {
            return Err(DmsError::Config(format!(
                "{name}: fractions must be within [0, 1], got {self:?}"
            )));
        }
        if self.x + self.width > 1.0 || self.y + self.height > 1.0 {
            return Err(DmsError::Config(format!(
                "{name}: rectangle extends past the image, got {self:?}"
            )));
        }
        Ok(())
    }

    /// Place the rectangle in an image of the given size
    pub fn to_region(&self, width: u32, height: u32) -> Region {
        let (w, h) = (width as f32, height as f32);
        Region {
            x: (self.x * w) as u32,
            y: (self.y * h) as u32,
            width: (self.width * w) as u32,
            height: (self.height * h) as u32,
        }
    }
}

/// Region-of-interest detector capability.
///
/// Any backend (cascade classifier, neural network, fixed layout) that can
/// propose rectangles in a grayscale image plugs in here.
pub trait RegionDetector: Send + Sync {
    fn detect(&self, image: &GrayImage) -> Result<Vec<Region>, DmsError>;
}

impl<F> RegionDetector for F
where
    F: Fn(&GrayImage) -> Result<Vec<Region>, DmsError> + Send + Sync,
{
    fn detect(&self, image: &GrayImage) -> Result<Vec<Region>, DmsError> {
        self(image)
    }
}

/// Face detector for a fixed cabin camera: the face sits at a known
/// fraction of the frame.
pub struct ProportionalFaceDetector {
    face: RelativeRect,
}

impl ProportionalFaceDetector {
    pub fn new(face: RelativeRect) -> Self {
        Self { face }
    }
}

impl RegionDetector for ProportionalFaceDetector {
    fn detect(&self, image: &GrayImage) -> Result<Vec<Region>, DmsError> {
        let face = self.face.to_region(image.width(), image.height());
        Ok(if face.is_empty() { vec![] } else { vec![face] })
    }
}

/// Eye detector placing two eye boxes at fixed fractions of the searched
/// face area.
pub struct ProportionalEyeDetector {
    left: RelativeRect,
    right: RelativeRect,
}

impl ProportionalEyeDetector {
    pub fn new(left: RelativeRect, right: RelativeRect) -> Self {
        Self { left, right }
    }
}

impl RegionDetector for ProportionalEyeDetector {
    fn detect(&self, image: &GrayImage) -> Result<Vec<Region>, DmsError> {
        let (w, h) = image.dimensions();
        Ok([self.left, self.right]
            .iter()
            .map(|rect| rect.to_region(w, h))
            .filter(|region| !region.is_empty())
            .collect())
    }
}

/// One detected face and the eyes found inside it, in frame coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceObservation {
    pub face: Region,
    pub eyes: Vec<Region>,
}

/// Runs the face detector on the frame and the eye detector inside each
/// face.
pub struct RegionExtractor {
    face_detector: Box<dyn RegionDetector>,
    eye_detector: Box<dyn RegionDetector>,
}

impl RegionExtractor {
    pub fn new(
        face_detector: Box<dyn RegionDetector>,
        eye_detector: Box<dyn RegionDetector>,
    ) -> Self {
        Self {
            face_detector,
            eye_detector,
        }
    }

    /// Extractor backed by the proportional detectors
    pub fn proportional(config: &DetectorConfig) -> Result<Self, DmsError> {
        config.validate()?;
        Ok(Self::new(
            Box::new(ProportionalFaceDetector::new(config.face)),
            Box::new(ProportionalEyeDetector::new(config.left_eye, config.right_eye)),
        ))
    }

    /// Detect faces, then eyes within the upper half of each face.
    ///
    /// Faces that are empty or fall outside the frame are dropped. Eye
    /// regions are only translated to frame coordinates, never filtered:
    /// a malformed eye box stays in the observation and is classified
    /// `Open` downstream.
    pub fn extract(&self, frame: &GrayImage) -> Result<Vec<FaceObservation>, DmsError> {
        let (frame_w, frame_h) = frame.dimensions();
        let mut observations = Vec::new();

        for face in self.face_detector.detect(frame)? {
            if !face.fits_within(frame_w, frame_h) {
                debug!("Dropping face region {:?} outside {}x{} frame", face, frame_w, frame_h);
                continue;
            }

            let search = face.upper_half();
            if search.is_empty() {
                observations.push(FaceObservation { face, eyes: vec![] });
                continue;
            }

            let roi = search.crop(frame);
            let eyes = self
                .eye_detector
                .detect(&roi)?
                .into_iter()
                .map(|eye| {
                    if !eye.fits_within(search.width, search.height) {
                        debug!("Eye region {:?} malformed for face {:?}", eye, face);
                    }
                    eye.translate(search.x, search.y)
                })
                .collect();

            observations.push(FaceObservation { face, eyes });
        }

        Ok(observations)
    }
}

/// Largest face by area; the first one wins ties
pub fn primary_face(faces: &[FaceObservation]) -> Option<&FaceObservation> {
    faces
        .iter()
        .reduce(|best, f| if f.face.area() > best.face.area() { f } else { best })
}
