use image::RgbImage;

pub struct Frame {
    pub index: u64,
    pub image: RgbImage,
}

impl Frame {
    #[inline]
    pub fn new(index: u64, image: RgbImage) -> Self {
        Self { index, image }
    }

    /// Whole seconds since the start of the input, from the absolute frame index.
    #[inline]
    pub fn seconds(&self, fps: f64) -> u64 {
        seconds_at(self.index, fps)
    }

    #[inline]
    pub fn timestamp(&self, fps: f64) -> String {
        format_timestamp(self.seconds(fps))
    }
}

/// `floor(index / fps)`; `fps` must be positive and finite.
#[inline]
pub fn seconds_at(index: u64, fps: f64) -> u64 {
    (index as f64 / fps).floor() as u64
}

/// Zero-padded `HH:MM:SS`.
pub fn format_timestamp(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let seconds = seconds % 60;

    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}
