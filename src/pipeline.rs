use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use image::RgbImage;
use serde_derive::Serialize;
use tracing::{debug, info, warn};

use crate::associate::associate;
use crate::config::PipelineConfig;
use crate::detection::{Detection, DetectionBox};
use crate::error::Error;
use crate::frame::{format_timestamp, Frame};
use crate::media::MediaSource;
use crate::preprocess;
use crate::rectify::{self, Rectifier};
use crate::score::{self, ScoringRecord};
use crate::text;
use crate::Tracking;

pub trait Detector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<DetectionBox>, Error>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Recognition {
    pub text: String,
    pub confidence: Option<f32>,
}

impl Recognition {
    pub fn new(text: impl Into<String>, confidence: Option<f32>) -> Self {
        Self {
            text: text.into(),
            confidence,
        }
    }
}

/// Reads the text off an upright plate image. Failure is signalled either by
/// an error or by a text containing the configured failure marker.
pub trait Recognizer {
    fn recognize(&mut self, image: &RgbImage) -> Result<Recognition, Error>;
}

/// Receives `0..=100` after every sampled frame.
pub trait ProgressSink {
    fn notify(&mut self, percent: u8);
}

impl<F: FnMut(u8)> ProgressSink for F {
    #[inline]
    fn notify(&mut self, percent: u8) {
        self(percent)
    }
}

/// Destination for plate crops. Returns a locator for the stored image.
pub trait CropStore {
    fn store(&mut self, name: &str, image: &RgbImage) -> Result<String, Error>;
}

/// Stores crops as `<dir>/<name>.png`.
#[derive(Debug, Clone)]
pub struct DirCropStore {
    dir: PathBuf,
}

impl DirCropStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl CropStore for DirCropStore {
    fn store(&mut self, name: &str, image: &RgbImage) -> Result<String, Error> {
        fs::create_dir_all(&self.dir)?;

        let path = self.dir.join(format!("{}.png", name));
        image.save(&path)?;

        Ok(path.display().to_string())
    }
}

/// Cooperative cancellation, checked before every frame read.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RecognitionResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track_id: Option<u64>,
    pub frame_index: u64,
    pub timestamp: String,
    pub raw_text: String,
    pub canonical_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub box_index: Option<usize>,
    /// Detector box as `[left, top, right, bottom]`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<[f32; 4]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crop: Option<String>,
}

impl RecognitionResult {
    fn new(frame_index: u64, timestamp: &str) -> Self {
        Self {
            track_id: None,
            frame_index,
            timestamp: timestamp.to_string(),
            raw_text: String::new(),
            canonical_text: String::new(),
            confidence: None,
            error: None,
            box_index: None,
            bbox: None,
            crop: None,
        }
    }

    fn failure(frame_index: u64, timestamp: &str, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::new(frame_index, timestamp)
        }
    }

    #[inline]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Streaming,
    Finished,
    Cancelled,
    Failed,
}

#[derive(Serialize, Debug, Clone)]
pub struct RunReport {
    pub results: Vec<RecognitionResult>,
    pub state: RunState,
    pub frames_read: u64,
    pub frames_sampled: u64,
}

// releases the media when the run returns, whichever way it returns
struct Opened<'m, M: MediaSource + ?Sized>(&'m mut M);

impl<'m, M: MediaSource + ?Sized> Drop for Opened<'m, M> {
    fn drop(&mut self) {
        self.0.release();
        debug!("media released");
    }
}

#[inline]
fn percent(index: u64, total: u64) -> u8 {
    (index.saturating_mul(100) / total).min(100) as u8
}

/// Samples every `frame_interval`-th frame, reads each detected box and
/// re-reads the boxes of confirmed tracks. Per-box and per-frame failures
/// become error records.
pub struct Pipeline<'a> {
    config: PipelineConfig,
    rectifier: Rectifier,
    state: RunState,
    progress: Option<Box<dyn ProgressSink + 'a>>,
    crops: Option<Box<dyn CropStore + 'a>>,
    cancel: CancelToken,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: PipelineConfig) -> Self {
        let crops: Option<Box<dyn CropStore + 'a>> = if config.crops.enabled {
            Some(Box::new(DirCropStore::new(config.crops.dir.clone())))
        } else {
            None
        };

        Self {
            rectifier: Rectifier::new(config.corner_order),
            config,
            state: RunState::Idle,
            progress: None,
            crops,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_progress<P: ProgressSink + 'a>(mut self, sink: P) -> Self {
        self.progress = Some(Box::new(sink));
        self
    }

    pub fn with_crop_store<S: CropStore + 'a>(mut self, store: S) -> Self {
        self.crops = Some(Box::new(store));
        self
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    #[inline]
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    #[inline]
    pub fn state(&self) -> RunState {
        self.state
    }

    #[inline]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Streams `media` to exhaustion or cancellation.
    ///
    /// Fails with [`Error::MediaOpen`] when the input holds no frames, and
    /// with the underlying error when a frame cannot be read. Everything
    /// else ends up as error records in the report.
    pub fn run<M, D, R, T>(
        &mut self,
        media: &mut M,
        detector: &mut D,
        recognizer: &mut R,
        tracker: &mut T,
    ) -> Result<RunReport, Error>
    where
        M: MediaSource + ?Sized,
        D: Detector + ?Sized,
        R: Recognizer + ?Sized,
        T: Tracking + ?Sized,
    {
        let result = self.stream(media, detector, recognizer, tracker);

        self.state = match &result {
            Ok(report) => report.state,
            Err(err) => {
                warn!(%err, "run failed");
                RunState::Failed
            }
        };

        result
    }

    fn stream<M, D, R, T>(
        &mut self,
        media: &mut M,
        detector: &mut D,
        recognizer: &mut R,
        tracker: &mut T,
    ) -> Result<RunReport, Error>
    where
        M: MediaSource + ?Sized,
        D: Detector + ?Sized,
        R: Recognizer + ?Sized,
        T: Tracking + ?Sized,
    {
        let mut media = Opened(media);

        let total = media.0.frame_count();
        if total == Some(0) {
            return Err(Error::MediaOpen("input holds no frames".into()));
        }

        let fps = self.config.effective_fps(media.0.fps());
        if media.0.fps() != Some(fps) {
            warn!(fps, "source reports no usable frame rate, using default");
        }

        let interval = self.config.interval();
        self.state = RunState::Streaming;
        info!(fps, interval, ?total, "streaming started");

        let mut report = RunReport {
            results: Vec::new(),
            state: RunState::Streaming,
            frames_read: 0,
            frames_sampled: 0,
        };

        loop {
            if self.cancel.is_cancelled() {
                info!(frames = report.frames_read, "run cancelled");
                report.state = RunState::Cancelled;
                return Ok(report);
            }

            let image = match media.0.next_frame()? {
                Some(image) => image,
                None => break,
            };

            let index = report.frames_read;
            report.frames_read += 1;

            if index % interval != 0 {
                continue;
            }

            let frame = Frame::new(index, image);
            self.process_frame(&frame, fps, detector, recognizer, tracker, &mut report.results);
            report.frames_sampled += 1;

            if let (Some(total), Some(sink)) = (total, self.progress.as_mut()) {
                sink.notify(percent(index, total));
            }
        }

        if report.frames_read == 0 {
            return Err(Error::MediaOpen("input holds no frames".into()));
        }

        info!(
            frames = report.frames_read,
            sampled = report.frames_sampled,
            results = report.results.len(),
            "streaming finished"
        );

        report.state = RunState::Finished;
        Ok(report)
    }

    fn process_frame<D, R, T>(
        &mut self,
        frame: &Frame,
        fps: f64,
        detector: &mut D,
        recognizer: &mut R,
        tracker: &mut T,
        results: &mut Vec<RecognitionResult>,
    ) where
        D: Detector + ?Sized,
        R: Recognizer + ?Sized,
        T: Tracking + ?Sized,
    {
        let timestamp = frame.timestamp(fps);

        let boxes = match detector.detect(frame) {
            Ok(boxes) => boxes,
            Err(err) => {
                warn!(frame = frame.index, %err, "detection failed, frame skipped");
                results.push(RecognitionResult::failure(frame.index, &timestamp, err.to_string()));
                return;
            }
        };

        debug!(frame = frame.index, boxes = boxes.len(), "plates detected");

        for (idx, det) in boxes.iter().enumerate() {
            let name = format!("plate_frame_{}_box_{}", frame.index, idx);
            let mut record = self.read_box(frame, &timestamp, det, &name, recognizer);
            record.box_index = Some(idx);
            results.push(record);
        }

        let detections: Vec<Detection> = boxes
            .iter()
            .map(|b| b.to_detection(self.config.detection_confidence))
            .collect();

        if let Err(err) = tracker.update(&detections, frame) {
            warn!(frame = frame.index, %err, "tracker update failed");
            results.push(RecognitionResult::failure(frame.index, &timestamp, err.to_string()));
            return;
        }

        let tracks = tracker.tracks();
        for assoc in associate(&tracks, &boxes) {
            let name = format!("tracked_plate_{}_frame_{}", assoc.track_id, frame.index);
            let mut record = self.read_box(frame, &timestamp, &boxes[assoc.detection], &name, recognizer);
            record.track_id = Some(assoc.track_id);
            record.box_index = Some(assoc.detection);
            results.push(record);
        }
    }

    /// One record for one box; failures land in `error`.
    fn read_box<R: Recognizer + ?Sized>(
        &mut self,
        frame: &Frame,
        timestamp: &str,
        det: &DetectionBox,
        name: &str,
        recognizer: &mut R,
    ) -> RecognitionResult {
        let mut record = RecognitionResult::new(frame.index, timestamp);
        record.bbox = Some(det.bbox().into());

        if let Err(err) = self.recognize_box(&frame.image, det, name, recognizer, &mut record) {
            warn!(frame = frame.index, name, %err, "plate not read");
            record.error = Some(err.to_string());
        }

        record
    }

    fn recognize_box<R: Recognizer + ?Sized>(
        &mut self,
        image: &RgbImage,
        det: &DetectionBox,
        name: &str,
        recognizer: &mut R,
        record: &mut RecognitionResult,
    ) -> Result<(), Error> {
        let bbox = det.bbox();
        let (crop, (x, y)) = rectify::crop(image, &bbox).ok_or_else(|| {
            Error::Geometry(format!("box {:?} lies outside the frame", bbox.as_slice()))
        })?;

        record.crop = self.persist(name, &crop);

        let (upscaled, scale) = preprocess::upscale(&crop, &self.config.upscale);
        let local = det.region.translated(x as f32, y as f32);

        let plate = match self.rectifier.rectify(&upscaled, &local, Some(scale)) {
            Ok(plate) => {
                self.persist(&format!("{}_rectified", name), &plate);
                plate
            }
            Err(err) => {
                debug!(name, %err, "using unrectified crop");
                upscaled
            }
        };

        let plate = preprocess::process(&plate, &self.config.processing);
        let recognition = recognizer.recognize(&plate)?;

        record.raw_text = recognition.text;
        record.confidence = recognition.confidence;

        let marker = &self.config.failure_marker;
        if !marker.is_empty() && record.raw_text.contains(marker.as_str()) {
            return Err(Error::Recognition(format!(
                "recognizer reported `{}`",
                record.raw_text
            )));
        }

        record.canonical_text = text::canonicalize(&record.raw_text);

        Ok(())
    }

    fn persist(&mut self, name: &str, image: &RgbImage) -> Option<String> {
        let store = self.crops.as_mut()?;

        match store.store(name, image) {
            Ok(locator) => Some(locator),
            Err(err) => {
                warn!(name, %err, "crop not persisted");
                None
            }
        }
    }

    /// Detection and recognition on a single still, without tracking.
    /// `index` tells stills of one batch apart in records and crop names.
    pub fn process_image<D, R>(
        &mut self,
        index: u64,
        image: RgbImage,
        detector: &mut D,
        recognizer: &mut R,
    ) -> Vec<RecognitionResult>
    where
        D: Detector + ?Sized,
        R: Recognizer + ?Sized,
    {
        let frame = Frame::new(index, image);
        let timestamp = format_timestamp(0);

        let boxes = match detector.detect(&frame) {
            Ok(boxes) => boxes,
            Err(err) => {
                warn!(image = index, %err, "detection failed");
                return vec![RecognitionResult::failure(index, &timestamp, err.to_string())];
            }
        };

        if boxes.is_empty() {
            return vec![RecognitionResult::failure(
                index,
                &timestamp,
                "no license plates detected",
            )];
        }

        boxes
            .iter()
            .enumerate()
            .map(|(idx, det)| {
                let name = format!("plate_image_{}_box_{}", index, idx);
                let mut record = self.read_box(&frame, &timestamp, det, &name, recognizer);
                record.box_index = Some(idx);
                record
            })
            .collect()
    }

    /// Scores the best box of one still against its label. `Ok(None)` when
    /// nothing on the image could be read, so the image is not scored.
    pub fn evaluate_image<D, R>(
        &mut self,
        index: u64,
        image: RgbImage,
        ground_truth: &str,
        detector: &mut D,
        recognizer: &mut R,
    ) -> Result<Option<ScoringRecord>, Error>
    where
        D: Detector + ?Sized,
        R: Recognizer + ?Sized,
    {
        let gt = score::canonical_ground_truth(ground_truth);
        if gt.is_empty() {
            return Err(Error::EmptyGroundTruth);
        }

        let candidates: Vec<String> = self
            .process_image(index, image, detector, recognizer)
            .into_iter()
            .filter(|r| !r.is_error())
            .map(|r| r.canonical_text)
            .collect();

        if candidates.is_empty() {
            debug!(image = index, "nothing read, image not scored");
        }

        ScoringRecord::best_of(&gt, &candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_is_floored_percentage() {
        assert_eq!(percent(0, 11), 0);
        assert_eq!(percent(5, 11), 45);
        assert_eq!(percent(10, 11), 90);
        assert_eq!(percent(12, 11), 100);
    }

    #[test]
    fn cancel_token_is_shared() {
        let token = CancelToken::new();
        let other = token.clone();

        assert!(!other.is_cancelled());
        token.cancel();
        assert!(other.is_cancelled());
    }

    #[test]
    fn failure_record_serializes_without_empty_fields() {
        let record = RecognitionResult::failure(5, "00:00:00", "detection failed: boom");
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["frame_index"], 5);
        assert_eq!(json["error"], "detection failed: boom");
        assert!(json.get("track_id").is_none());
        assert!(json.get("confidence").is_none());
    }

    #[test]
    fn new_pipeline_is_idle() {
        let pipeline = Pipeline::new(PipelineConfig::default());
        assert_eq!(pipeline.state(), RunState::Idle);
        assert!(pipeline.crops.is_none());
    }
}
