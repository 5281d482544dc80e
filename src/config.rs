use std::path::{Path, PathBuf};

use serde_derive::Deserialize;

use crate::error::Error;

/// How the four free-form corners of a plate are put in
/// top-left, top-right, bottom-right, bottom-left order.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CornerOrder {
    /// Polar angle around the centroid.
    Angular,
    /// Extremes of `x + y` and `y - x`.
    #[default]
    SumDiff,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum UpscaleFilter {
    #[default]
    Bicubic,
    Bilinear,
    Lanczos,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct UpscaleConfig {
    pub filter: UpscaleFilter,
    pub factor: u32,
}

impl Default for UpscaleConfig {
    fn default() -> Self {
        Self {
            filter: UpscaleFilter::Bicubic,
            factor: 2,
        }
    }
}

/// Image clean-up applied to a plate crop right before recognition.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct ProcessingConfig {
    pub grayscale: bool,
    /// Gaussian blur sigma, `None` disables denoising.
    pub denoise_sigma: Option<f32>,
    /// Histogram equalization, needs `grayscale`.
    pub equalize: bool,
    /// Binary threshold level, needs `grayscale`.
    pub threshold: Option<u8>,
    /// Level the plate outline after thresholding.
    pub rotation: bool,
    /// Steeper tilts, in degrees, are left uncorrected.
    pub max_rotation_angle: f32,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            grayscale: false,
            denoise_sigma: None,
            equalize: false,
            threshold: None,
            rotation: false,
            max_rotation_angle: 15.0,
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct CropConfig {
    pub enabled: bool,
    pub dir: PathBuf,
}

impl Default for CropConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            dir: PathBuf::from("static/uploads"),
        }
    }
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct TrackerConfig {
    /// Missed updates a confirmed track survives.
    pub max_age: u32,
    /// Consecutive hits before a track is confirmed.
    pub n_init: u32,
    pub min_iou: f32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_age: 20,
            n_init: 3,
            min_iou: 0.3,
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Only every `frame_interval`-th frame is processed.
    pub frame_interval: u64,
    /// Used when the source reports no usable frame rate.
    pub default_fps: f64,
    pub corner_order: CornerOrder,
    /// Recognizer output containing this marker is a failed recognition.
    pub failure_marker: String,
    /// Confidence handed to the tracker with every detection.
    pub detection_confidence: f32,
    pub upscale: UpscaleConfig,
    pub processing: ProcessingConfig,
    pub crops: CropConfig,
    pub tracker: TrackerConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            frame_interval: 5,
            default_fps: 30.0,
            corner_order: CornerOrder::default(),
            failure_marker: String::from("OCR failed"),
            detection_confidence: 1.0,
            upscale: UpscaleConfig::default(),
            processing: ProcessingConfig::default(),
            crops: CropConfig::default(),
            tracker: TrackerConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path)?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, Error> {
        let config: Self = toml::from_str(content)?;

        if !(config.default_fps.is_finite() && config.default_fps > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "default_fps must be positive, got {}",
                config.default_fps
            )));
        }

        let max_angle = config.processing.max_rotation_angle;
        if max_angle.is_nan() || max_angle < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "max_rotation_angle must not be negative, got {}",
                max_angle
            )));
        }

        Ok(config)
    }

    /// Sampling interval, never zero.
    #[inline]
    pub fn interval(&self) -> u64 {
        self.frame_interval.max(1)
    }

    /// `fps` if it is usable, `default_fps` otherwise.
    pub fn effective_fps(&self, fps: Option<f64>) -> f64 {
        match fps {
            Some(fps) if fps.is_finite() && fps > 0.0 => fps,
            _ => self.default_fps,
        }
    }
}
