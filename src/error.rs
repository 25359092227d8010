// error.rs — error types shared across the viewer

use std::path::PathBuf;

use thiserror::Error;

/// Rejected scale input.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScaleError {
    #[error("scale input is empty")]
    Empty,
    #[error("scale input {0:?} is not a number")]
    NotANumber(String),
    #[error("scale must be a positive finite number, got {0}")]
    OutOfRange(f32),
}

/// Failures from the media element.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("video source is empty")]
    EmptySource,
    #[error("video source {0} does not exist")]
    NotFound(PathBuf),
    #[error("unsupported video source scheme in {0:?}")]
    UnsupportedScheme(String),
    #[error("no image frames found in {0}")]
    NoFrames(PathBuf),
    #[error("failed to decode frame {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("failed to open video {path}: {source}")]
    VideoOpen {
        path: PathBuf,
        #[source]
        source: ffmpeg_next::Error,
    },
    #[error("no video stream in {0}")]
    NoVideoStream(PathBuf),
    #[error("failed to decode video {path}: {source}")]
    VideoDecode {
        path: PathBuf,
        #[source]
        source: ffmpeg_next::Error,
    },
    #[error("autoplay was rejected by the playback policy")]
    AutoplayRejected,
    #[error("no video source is loaded")]
    NoSource,
}

/// Failures while reading the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
