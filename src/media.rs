use std::collections::VecDeque;
use std::path::Path;

use image::RgbImage;
use tracing::debug;

use crate::error::Error;

/// Ordered frame source. Implementations are opened by their constructors;
/// `release` frees the underlying handle and must tolerate repeated calls.
pub trait MediaSource {
    /// Frames per second as reported by the source, if any.
    fn fps(&self) -> Option<f64>;

    /// Total frame count as reported by the source, if known.
    fn frame_count(&self) -> Option<u64>;

    /// Next frame in order, `None` once exhausted.
    fn next_frame(&mut self) -> Result<Option<RgbImage>, Error>;

    fn release(&mut self);
}

/// Frames held in memory, e.g. decoded stills or a pre-split clip.
#[derive(Debug, Default)]
pub struct ImageSequence {
    frames: VecDeque<RgbImage>,
    total: u64,
    fps: Option<f64>,
    released: bool,
}

impl ImageSequence {
    pub fn new(frames: Vec<RgbImage>) -> Self {
        Self {
            total: frames.len() as u64,
            frames: frames.into(),
            fps: None,
            released: false,
        }
    }

    pub fn with_fps(mut self, fps: f64) -> Self {
        self.fps = Some(fps);
        self
    }

    /// Decodes every file up front; any unreadable file fails the open.
    pub fn from_paths<P: AsRef<Path>>(paths: &[P]) -> Result<Self, Error> {
        let mut frames = Vec::with_capacity(paths.len());

        for path in paths {
            let path = path.as_ref();
            let image = image::open(path)
                .map_err(|e| Error::MediaOpen(format!("{}: {}", path.display(), e)))?;

            frames.push(image.to_rgb8());
        }

        debug!(frames = frames.len(), "image sequence decoded");

        Ok(Self::new(frames))
    }

    #[inline]
    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl MediaSource for ImageSequence {
    #[inline]
    fn fps(&self) -> Option<f64> {
        self.fps
    }

    #[inline]
    fn frame_count(&self) -> Option<u64> {
        Some(self.total)
    }

    fn next_frame(&mut self) -> Result<Option<RgbImage>, Error> {
        if self.released {
            return Ok(None);
        }

        Ok(self.frames.pop_front())
    }

    fn release(&mut self) {
        self.frames.clear();
        self.released = true;
    }
}

#[cfg(feature = "opencv")]
pub use video::VideoSource;

#[cfg(feature = "opencv")]
mod video {
    use image::RgbImage;
    use opencv::{core::Mat, imgproc, prelude::*, videoio};
    use tracing::info;

    use super::MediaSource;
    use crate::error::Error;

    /// Video file decoded through OpenCV.
    pub struct VideoSource {
        path: String,
        capture: videoio::VideoCapture,
        fps: Option<f64>,
        frame_count: Option<u64>,
    }

    impl VideoSource {
        pub fn open(path: &str) -> Result<Self, Error> {
            let capture = videoio::VideoCapture::from_file(path, videoio::CAP_ANY)?;
            if !capture.is_opened()? {
                return Err(Error::MediaOpen(path.to_string()));
            }

            let fps = capture.get(videoio::CAP_PROP_FPS)?;
            let count = capture.get(videoio::CAP_PROP_FRAME_COUNT)?;

            info!(path, fps, count, "video opened");

            Ok(Self {
                path: path.to_string(),
                capture,
                fps: Some(fps).filter(|f| f.is_finite() && *f > 0.0),
                frame_count: Some(count).filter(|c| *c >= 0.0).map(|c| c as u64),
            })
        }
    }

    impl MediaSource for VideoSource {
        #[inline]
        fn fps(&self) -> Option<f64> {
            self.fps
        }

        #[inline]
        fn frame_count(&self) -> Option<u64> {
            self.frame_count
        }

        fn next_frame(&mut self) -> Result<Option<RgbImage>, Error> {
            let mut bgr = Mat::default();
            if !self.capture.read(&mut bgr)? || bgr.rows() <= 0 || bgr.cols() <= 0 {
                return Ok(None);
            }

            let mut rgb = Mat::default();
            imgproc::cvt_color(&bgr, &mut rgb, imgproc::COLOR_BGR2RGB, 0)?;

            let (w, h) = (rgb.cols() as u32, rgb.rows() as u32);
            let data = rgb.data_bytes()?.to_vec();

            RgbImage::from_raw(w, h, data)
                .map(Some)
                .ok_or_else(|| Error::MediaOpen(format!("{}: unexpected frame layout", self.path)))
        }

        fn release(&mut self) {
            if let Err(err) = self.capture.release() {
                tracing::warn!(path = %self.path, %err, "video release failed");
            }
        }
    }
}
