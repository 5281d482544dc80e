pub mod associate;
pub mod bbox;
pub mod config;
pub mod detection;
pub mod error;
pub mod frame;
pub mod math;
pub mod media;
pub mod pipeline;
pub mod preprocess;
pub mod rectify;
pub mod score;
pub mod text;
pub mod tracker;

mod track;

pub use config::PipelineConfig;
pub use detection::{Detection, DetectionBox, Region};
pub use error::Error;
pub use frame::Frame;
pub use pipeline::{
    CancelToken, CropStore, Detector, Pipeline, ProgressSink, Recognition, RecognitionResult,
    Recognizer, RunReport, RunState,
};
pub use track::{Track, TrackState};
pub use tracker::IouTracker;

use std::rc::Rc;

/// Multi-object tracker fed with center-form detections once per processed frame.
pub trait Tracking {
    fn update(&mut self, detections: &[Detection], frame: &Frame) -> Result<(), Error>;

    /// Current identities, confirmed or not, each with its box for the last
    /// updated frame.
    fn tracks(&self) -> Rc<[Track]>;
}
