// config.rs — startup configuration (JSON file + command line)
//
// Load order: defaults -> --config <file.json> -> --video / --scale.
// Nothing is ever written back.

use crate::error::ConfigError;
use crate::fisheye::UvEdge;
use crate::media::AutoplayPolicy;
use crate::scene::Scale;
use crate::ui::ControlKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DomeConfig {
    /// Source loaded at startup: a video file, a frame directory or a still image.
    pub video_source: Option<String>,
    /// Used when the requested source is missing or empty.
    pub placeholder_source: Option<String>,
    pub scale: f32,
    pub uv_edge: UvEdge,

    pub dome_radius: f32,
    pub width_segments: usize,
    pub height_segments: usize,

    pub frame_rate: f64,
    pub looping: bool,
    pub muted: bool,
    pub autoplay: AutoplayPolicy,

    pub fov_degrees: f32,
    pub outside_distance: f32,
    /// Dome tilt about the X axis applied while viewing from outside.
    pub outside_tilt_degrees: f32,
    pub rotate_speed: f32,
    /// Orbit damping factor in (0, 1]; `None` applies rotation at once.
    pub damping: Option<f32>,

    pub minimap_standoff: f32,
    pub minimap_size: f32,
    pub minimap_margin: f32,

    /// Controls shown in the overlay, in order.
    pub controls: Vec<String>,
}

impl Default for DomeConfig {
    fn default() -> Self {
        Self {
            video_source: Some("assets/fisheye/shot03_04_v2_fish5.mp4".to_string()),
            placeholder_source: None,
            scale: 1.0,
            uv_edge: UvEdge::default(),
            dome_radius: 100.0,
            width_segments: 64,
            height_segments: 64,
            frame_rate: 30.0,
            looping: true,
            muted: true,
            autoplay: AutoplayPolicy::default(),
            fov_degrees: 75.0,
            outside_distance: 200.0,
            outside_tilt_degrees: 0.0,
            rotate_speed: 1.0,
            damping: None,
            minimap_standoff: 200.0,
            minimap_size: 150.0,
            minimap_margin: 10.0,
            controls: ControlKind::ALL.iter().map(|c| c.name().to_string()).collect(),
        }
    }
}

impl DomeConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Build the effective configuration from command-line arguments.
    /// Unreadable files and bad values are logged and skipped.
    pub fn from_args<I>(args: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut config_path: Option<PathBuf> = None;
        let mut video: Option<String> = None;
        let mut scale: Option<String> = None;

        let mut it = args.into_iter();
        while let Some(a) = it.next() {
            match a.as_str() {
                "--config" => config_path = it.next().map(PathBuf::from),
                "--video" => video = it.next(),
                "--scale" => scale = it.next(),
                _ => {}
            }
        }

        let mut config = match config_path {
            Some(path) => match Self::load(&path) {
                Ok(c) => {
                    log::info!("loaded config from {}", path.display());
                    c
                }
                Err(e) => {
                    log::error!("{e}; using defaults");
                    Self::default()
                }
            },
            None => Self::default(),
        };

        if let Some(v) = video {
            config.video_source = Some(v);
        }

        if let Some(s) = scale {
            match Scale::parse(&s) {
                Ok(s) => config.scale = s.get(),
                Err(e) => log::warn!("ignoring --scale: {e}"),
            }
        }

        if Scale::new(config.scale).is_err() {
            log::warn!("configured scale {} is invalid, falling back to 1.0", config.scale);
            config.scale = 1.0;
        }

        config
    }
}
