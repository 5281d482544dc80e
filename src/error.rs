use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The input cannot be opened or holds no frames. Fatal to a run.
    #[error("cannot open media `{0}`")]
    MediaOpen(String),

    /// Degenerate quadrilateral: zero area or coincident corners.
    #[error("degenerate plate geometry: {0}")]
    Geometry(String),

    #[error("recognition failed: {0}")]
    Recognition(String),

    #[error("detection failed: {0}")]
    Detection(String),

    #[error("tracker update failed: {0}")]
    Tracking(String),

    /// Error rates are undefined for an empty ground truth.
    #[error("ground truth is empty")]
    EmptyGroundTruth,

    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image Error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Config Error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[cfg(feature = "opencv")]
    #[error("OpenCV Error: {0}")]
    OpenCv(#[from] opencv::Error),
}
