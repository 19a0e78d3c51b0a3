//! Video frame types and processing

use std::time::Duration;

use image::{imageops, GrayImage, RgbImage};

use crate::CameraError;

/// Decoded RGB video frame
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// RGB pixel data (width * height * 3)
    pub data: Vec<u8>,
    /// Frame width
    pub width: u32,
    /// Frame height
    pub height: u32,
    /// Capture timestamp (nanoseconds since session start)
    pub timestamp_ns: u64,
    /// Frame sequence number
    pub sequence: u32,
}

impl VideoFrame {
    /// Create a new video frame from raw RGB data
    pub fn new(data: Vec<u8>, width: u32, height: u32, timestamp_ns: u64, sequence: u32) -> Self {
        Self {
            data,
            width,
            height,
            timestamp_ns,
            sequence,
        }
    }

    /// Wrap a decoded image buffer
    pub fn from_rgb_image(img: RgbImage, timestamp_ns: u64, sequence: u32) -> Self {
        let (width, height) = img.dimensions();
        Self {
            data: img.into_raw(),
            width,
            height,
            timestamp_ns,
            sequence,
        }
    }

    /// Capture time as an offset from session start
    pub fn timestamp(&self) -> Duration {
        Duration::from_nanos(self.timestamp_ns)
    }

    /// Convert to grayscale luma bytes
    pub fn to_grayscale(&self) -> Vec<u8> {
        let mut gray = Vec::with_capacity((self.width * self.height) as usize);
        for pixel in self.data.chunks_exact(3) {
            // Luminance formula: 0.299*R + 0.587*G + 0.114*B
            let y = (pixel[0] as f32 * 0.299
                   + pixel[1] as f32 * 0.587
                   + pixel[2] as f32 * 0.114) as u8;
            gray.push(y);
        }
        gray
    }

    /// Convert to a grayscale image buffer for analysis
    pub fn to_gray_image(&self) -> Result<GrayImage, CameraError> {
        let expected = self.width as usize * self.height as usize * 3;
        if self.data.len() != expected {
            return Err(CameraError::Format(format!(
                "frame {} has {} bytes, expected {} for {}x{} RGB",
                self.sequence,
                self.data.len(),
                expected,
                self.width,
                self.height
            )));
        }

        GrayImage::from_raw(self.width, self.height, self.to_grayscale())
            .ok_or_else(|| CameraError::Format("grayscale buffer size mismatch".into()))
    }

    fn to_rgb_image(&self) -> Option<RgbImage> {
        RgbImage::from_raw(self.width, self.height, self.data.clone())
    }

    /// Resize frame using bilinear (triangle) filtering
    pub fn resize(&self, new_width: u32, new_height: u32) -> Result<VideoFrame, CameraError> {
        let img = self
            .to_rgb_image()
            .ok_or_else(|| CameraError::Format("frame buffer does not match its size".into()))?;
        let resized = imageops::resize(&img, new_width, new_height, imageops::FilterType::Triangle);
        Ok(VideoFrame::from_rgb_image(resized, self.timestamp_ns, self.sequence))
    }
}
