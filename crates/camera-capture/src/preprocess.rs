//! Frame noise reduction applied before detection

use image::GrayImage;
use imageproc::filter::{gaussian_blur_f32, median_filter};
use serde::{Deserialize, Serialize};

use crate::CameraError;

/// Blur settings applied to every grayscale frame
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Preprocessing {
    /// Median blur kernel size (odd, >= 3); `None` disables it
    pub median_blur_kernel: Option<u32>,
    /// Gaussian blur sigma; `None` disables it
    pub gaussian_sigma: Option<f32>,
}

impl Default for Preprocessing {
    fn default() -> Self {
        Self {
            median_blur_kernel: Some(5),
            gaussian_sigma: None,
        }
    }
}

impl Preprocessing {
    /// No filtering at all
    pub fn none() -> Self {
        Self {
            median_blur_kernel: None,
            gaussian_sigma: None,
        }
    }

    pub fn validate(&self) -> Result<(), CameraError> {
        if let Some(k) = self.median_blur_kernel {
            if k < 3 || k % 2 == 0 {
                return Err(CameraError::Config(format!(
                    "median_blur_kernel must be odd and >= 3, got {k}"
                )));
            }
        }
        if let Some(sigma) = self.gaussian_sigma {
            if !sigma.is_finite() || sigma <= 0.0 {
                return Err(CameraError::Config(format!(
                    "gaussian_sigma must be a positive number, got {sigma}"
                )));
            }
        }
        Ok(())
    }

    /// Apply the enabled filters, median first
    pub fn apply(&self, image: &GrayImage) -> GrayImage {
        let mut out = match self.median_blur_kernel {
            Some(k) => {
                let radius = k / 2;
                median_filter(image, radius, radius)
            }
            None => image.clone(),
        };

        if let Some(sigma) = self.gaussian_sigma {
            out = gaussian_blur_f32(&out, sigma);
        }

        out
    }
}
