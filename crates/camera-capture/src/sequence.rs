//! Replay of recorded frames from a directory of images

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::{CameraConfig, CameraError, FrameSource, VideoFrame};

const SUPPORTED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

/// Frame source that decodes image files in lexical order.
///
/// Frames are stamped on a synthetic timeline at the configured FPS, so a
/// replay produces the same timestamps however fast it is consumed.
pub struct ImageSequenceSource {
    paths: Vec<PathBuf>,
    next_index: usize,
    sequence: u32,
    width: u32,
    height: u32,
    interval_ns: u64,
}

impl ImageSequenceSource {
    /// Scan `config.source_dir` for supported image files
    pub fn open(config: &CameraConfig) -> Result<Self, CameraError> {
        config.validate()?;

        let dir = &config.source_dir;
        let entries = std::fs::read_dir(dir)
            .map_err(|e| CameraError::Open(format!("{}: {e}", dir.display())))?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && is_supported(path))
            .collect();
        paths.sort();

        if paths.is_empty() {
            return Err(CameraError::Open(format!(
                "no image frames found in {}",
                dir.display()
            )));
        }

        info!("Opened {} frames from {}", paths.len(), dir.display());

        Ok(Self {
            paths,
            next_index: 0,
            sequence: 0,
            width: config.width,
            height: config.height,
            interval_ns: config.frame_interval_ns(),
        })
    }

    /// Number of files still to be read
    pub fn remaining(&self) -> usize {
        self.paths.len() - self.next_index
    }
}

impl FrameSource for ImageSequenceSource {
    fn next_frame(&mut self) -> Result<Option<VideoFrame>, CameraError> {
        while let Some(path) = self.paths.get(self.next_index) {
            self.next_index += 1;

            let img = match image::open(path) {
                Ok(img) => img.to_rgb8(),
                Err(e) => {
                    warn!("Skipping unreadable frame {}: {}", path.display(), e);
                    continue;
                }
            };

            let timestamp_ns = u64::from(self.sequence) * self.interval_ns;
            let mut frame = VideoFrame::from_rgb_image(img, timestamp_ns, self.sequence);
            if frame.width != self.width || frame.height != self.height {
                debug!(
                    "Resizing frame {} from {}x{} to {}x{}",
                    self.sequence, frame.width, frame.height, self.width, self.height
                );
                frame = frame.resize(self.width, self.height)?;
            }

            self.sequence += 1;
            return Ok(Some(frame));
        }

        Ok(None)
    }
}

fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}
