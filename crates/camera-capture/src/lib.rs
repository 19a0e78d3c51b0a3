//! Camera Capture Library for the Drowsiness Monitor
//!
//! Provides the frame side of the pipeline:
//! - RGB video frames with grayscale conversion, crop and resize
//! - Noise-reduction preprocessing (median / gaussian blur)
//! - A `FrameSource` seam with an image-sequence replay source

pub mod frame;
pub mod preprocess;
pub mod sequence;

pub use frame::VideoFrame;
pub use preprocess::Preprocessing;
pub use sequence::ImageSequenceSource;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Camera error types
#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Failed to open frame source: {0}")]
    Open(String),

    #[error("Invalid format: {0}")]
    Format(String),

    #[error("Failed to decode frame: {0}")]
    Decode(String),

    #[error("Streaming error: {0}")]
    Stream(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Anything that yields frames one at a time.
///
/// `Ok(None)` marks the end of the stream.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<Option<VideoFrame>, CameraError>;
}

/// Camera configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Directory holding the recorded frames to replay
    pub source_dir: PathBuf,
    /// Capture width
    pub width: u32,
    /// Capture height
    pub height: u32,
    /// Nominal FPS, drives frame timestamps and pacing
    pub fps: u32,
    /// Pace playback to `fps` instead of running as fast as possible
    pub realtime: bool,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("frames"),
            width: 640,
            height: 480,
            fps: 30,
            realtime: true,
        }
    }
}

impl CameraConfig {
    /// Reject settings that would make the replay timeline meaningless
    pub fn validate(&self) -> Result<(), CameraError> {
        if self.fps == 0 {
            return Err(CameraError::Config("fps must be greater than 0".into()));
        }
        if self.width == 0 || self.height == 0 {
            return Err(CameraError::Config(format!(
                "frame size must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        Ok(())
    }

    /// Nanoseconds between two consecutive frames at the nominal FPS
    pub fn frame_interval_ns(&self) -> u64 {
        1_000_000_000 / u64::from(self.fps.max(1))
    }
}
