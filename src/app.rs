// app.rs — application state driven by the render loop and the controls
//
// Everything here runs on the event-loop thread. Controls and input mutate
// state between frames; `frame()` advances the cameras once per redraw.

use crate::config::DomeConfig;
use crate::controls::CameraPose;
use crate::media::{MediaElement, VideoSource};
use crate::minimap::{MinimapCompositor, Viewport};
use crate::scene::{DomeScene, ScaleOutcome};
use crate::ui::{parse_controls, Overlay, UiAction, UiState};
use crate::view::{ViewController, ViewMode};
use winit::event::VirtualKeyCode;

/// Camera state for one redraw.
#[derive(Debug, Clone, Copy)]
pub struct FramePlan {
    pub main: glam::Mat4,
    pub model: glam::Mat4,
    /// Minimap view-projection, `None` while hidden.
    pub minimap: Option<glam::Mat4>,
}

pub struct App {
    pub scene: DomeScene,
    pub view: ViewController,
    pub minimap: MinimapCompositor,
    pub media: Box<dyn MediaElement>,
    pub ui: UiState,
    /// A source is set but no frame has reached the texture yet.
    pub loading: bool,
}

impl App {
    pub fn new(config: &DomeConfig, mut media: Box<dyn MediaElement>) -> Self {
        media.set_looping(config.looping);
        media.set_muted(config.muted);

        let scene = DomeScene::new(config);
        let ui = UiState::new(
            parse_controls(&config.controls),
            scene.scale(),
            scene.default_source(),
        );

        let mut app = Self {
            view: ViewController::new(config),
            minimap: MinimapCompositor::new(config),
            scene,
            media,
            ui,
            loading: false,
        };

        let startup = app.scene.default_source().map(str::to_string);
        app.load_source(startup.as_deref());
        app
    }

    /// Swap the video source. Blank or unusable sources fall back to the
    /// placeholder; with no placeholder the media is left empty.
    pub fn load_source(&mut self, requested: Option<&str>) {
        let Some(location) = self.scene.resolve_source(requested) else {
            self.media.clear_source();
            self.loading = false;
            return;
        };

        let source = match VideoSource::resolve(&location) {
            Ok(s) => Some(s),
            Err(e) => {
                log::error!("cannot open video source {location:?}: {e}");
                match self.scene.placeholder_source() {
                    Some(p) if p != location => VideoSource::resolve(p)
                        .map_err(|e| log::error!("placeholder {p:?} is unusable too: {e}"))
                        .ok(),
                    _ => None,
                }
            }
        };

        let Some(source) = source else {
            self.media.clear_source();
            self.loading = false;
            return;
        };

        if let Err(e) = self.media.set_source(source) {
            log::error!("cannot play {location:?}: {e}");
            self.media.clear_source();
            self.loading = false;
            return;
        }
        self.loading = true;
        if let Err(e) = self.media.request_autoplay() {
            log::warn!("video autoplay prevented: {e}; press play to start");
        }
    }

    pub fn apply(&mut self, action: &UiAction) {
        match action {
            UiAction::Play => {
                if let Err(e) = self.media.play() {
                    log::warn!("play: {e}");
                }
            }
            UiAction::Pause => self.media.pause(),
            UiAction::Stop => self.media.stop(),
            UiAction::ToggleView => {
                self.view.toggle(self.scene.dome_material_mut());
            }
            UiAction::RotateLeft => {
                self.view.rotate_left();
            }
            UiAction::RotateRight => {
                self.view.rotate_right();
            }
            UiAction::RotateUp => {
                self.view.rotate_up();
            }
            UiAction::RotateDown => {
                self.view.rotate_down();
            }
            UiAction::ApplyScale => {
                if let ScaleOutcome::Applied(scale) = self.scene.apply_scale_input(&mut self.ui.scale_field) {
                    self.ui.scale_field = scale.to_string();
                }
            }
            UiAction::LoadSource => {
                let requested = self.ui.source_field.clone();
                self.load_source(Some(&requested));
            }
            // window-level actions are handled by the event loop
            UiAction::BrowseSource | UiAction::ToggleFullscreen => {}
        }
    }

    /// Advance the orbit controls and derive both cameras.
    pub fn frame(&mut self) -> FramePlan {
        self.view.update();
        let minimap = self
            .minimap
            .compose(&self.view)
            .map(|pose: CameraPose| self.minimap.view_projection(&pose));
        FramePlan {
            main: self.view.view_projection(),
            model: self.view.model_matrix(),
            minimap,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.view.set_aspect(width, height);
    }

    pub fn minimap_viewport(&self, width: u32, height: u32, scale_factor: f32) -> Option<Viewport> {
        if self.view.mode() == ViewMode::Outside {
            return None;
        }
        self.minimap.viewport(width, height, scale_factor)
    }

    pub fn overlay(&self, minimap: Option<Viewport>) -> Overlay {
        Overlay {
            mode: self.view.mode(),
            rotation_visible: self.view.rotation_controls_visible(),
            toggle_label_key: self.view.toggle_label_key(),
            paused: self.media.is_paused(),
            has_source: self.media.has_source(),
            current_time: self.media.current_time(),
            scale: self.scene.scale(),
            minimap,
            loading: self.loading,
        }
    }

    /// Keyboard shortcuts mirroring the overlay buttons.
    pub fn key_action(&self, key: VirtualKeyCode) -> Option<UiAction> {
        match key {
            VirtualKeyCode::Space if self.media.is_paused() => Some(UiAction::Play),
            VirtualKeyCode::Space => Some(UiAction::Pause),
            VirtualKeyCode::S => Some(UiAction::Stop),
            VirtualKeyCode::V => Some(UiAction::ToggleView),
            VirtualKeyCode::Left => Some(UiAction::RotateLeft),
            VirtualKeyCode::Right => Some(UiAction::RotateRight),
            VirtualKeyCode::Up => Some(UiAction::RotateUp),
            VirtualKeyCode::Down => Some(UiAction::RotateDown),
            VirtualKeyCode::O => Some(UiAction::BrowseSource),
            VirtualKeyCode::F11 => Some(UiAction::ToggleFullscreen),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MediaError;
    use crate::scene::Side;
    use image::RgbaImage;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Log {
        source: Option<VideoSource>,
        playing: bool,
        time: f64,
        reject_autoplay: bool,
    }

    struct FakeMedia(Rc<RefCell<Log>>);

    impl MediaElement for FakeMedia {
        fn set_source(&mut self, source: VideoSource) -> Result<(), MediaError> {
            if let VideoSource::File(path) = &source {
                return Err(MediaError::NoVideoStream(path.clone()));
            }
            self.0.borrow_mut().source = Some(source);
            Ok(())
        }
        fn clear_source(&mut self) {
            self.0.borrow_mut().source = None;
        }
        fn has_source(&self) -> bool {
            self.0.borrow().source.is_some()
        }
        fn set_looping(&mut self, _: bool) {}
        fn set_muted(&mut self, _: bool) {}
        fn play(&mut self) -> Result<(), MediaError> {
            let mut log = self.0.borrow_mut();
            if log.source.is_none() {
                return Err(MediaError::NoSource);
            }
            log.playing = true;
            log.time = 3.0;
            Ok(())
        }
        fn request_autoplay(&mut self) -> Result<(), MediaError> {
            if self.0.borrow().reject_autoplay {
                return Err(MediaError::AutoplayRejected);
            }
            self.play()
        }
        fn pause(&mut self) {
            self.0.borrow_mut().playing = false;
        }
        fn is_paused(&self) -> bool {
            !self.0.borrow().playing
        }
        fn seek(&mut self, seconds: f64) {
            self.0.borrow_mut().time = seconds;
        }
        fn current_time(&self) -> f64 {
            self.0.borrow().time
        }
        fn take_frame(&mut self) -> Option<RgbaImage> {
            None
        }
    }

    fn frames_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        RgbaImage::new(2, 2).save(dir.path().join("0001.png")).unwrap();
        dir
    }

    fn app_with(config: DomeConfig, reject_autoplay: bool) -> (App, Rc<RefCell<Log>>) {
        let log = Rc::new(RefCell::new(Log {
            reject_autoplay,
            ..Log::default()
        }));
        let config = DomeConfig {
            width_segments: 16,
            height_segments: 8,
            ..config
        };
        (App::new(&config, Box::new(FakeMedia(log.clone()))), log)
    }

    #[test]
    fn autoplay_rejection_is_not_fatal() {
        let dir = frames_dir();
        let config = DomeConfig {
            video_source: Some(dir.path().display().to_string()),
            ..DomeConfig::default()
        };
        let (mut app, log) = app_with(config, true);
        assert!(app.media.has_source());
        assert!(app.media.is_paused());

        app.apply(&UiAction::Play);
        assert!(log.borrow().playing);
    }

    #[test]
    fn stop_pauses_and_rewinds() {
        let dir = frames_dir();
        let config = DomeConfig {
            video_source: Some(dir.path().display().to_string()),
            ..DomeConfig::default()
        };
        let (mut app, log) = app_with(config, false);
        assert!(log.borrow().playing);

        app.apply(&UiAction::Stop);
        assert!(!log.borrow().playing);
        assert_eq!(log.borrow().time, 0.0);
    }

    #[test]
    fn missing_source_uses_placeholder() {
        let dir = frames_dir();
        let placeholder = dir.path().join("0001.png");
        let config = DomeConfig {
            video_source: Some("/no/such/clip".into()),
            placeholder_source: Some(placeholder.display().to_string()),
            ..DomeConfig::default()
        };
        let (app, log) = app_with(config, false);
        assert!(app.loading);
        assert_eq!(log.borrow().source, Some(VideoSource::Still(placeholder)));
    }

    #[test]
    fn unplayable_video_leaves_media_empty() {
        let dir = tempfile::tempdir().unwrap();
        let clip = dir.path().join("clip.mp4");
        std::fs::write(&clip, b"not really a video").unwrap();
        let config = DomeConfig {
            video_source: Some(clip.display().to_string()),
            ..DomeConfig::default()
        };
        let (app, log) = app_with(config, false);
        assert!(log.borrow().source.is_none());
        assert!(!app.loading);
    }

    #[test]
    fn missing_source_without_placeholder_leaves_media_empty() {
        let config = DomeConfig {
            video_source: Some("/no/such/clip".into()),
            ..DomeConfig::default()
        };
        let (mut app, _) = app_with(config, false);
        assert!(!app.media.has_source());
        assert!(!app.loading);

        // the rest keeps working
        app.apply(&UiAction::Play);
        app.apply(&UiAction::ToggleView);
        assert_eq!(app.view.mode(), ViewMode::Outside);
    }

    #[test]
    fn toggle_hides_and_restores_rotation_controls() {
        let (mut app, _) = app_with(DomeConfig::default(), false);
        app.apply(&UiAction::ToggleView);
        let overlay = app.overlay(None);
        assert!(!overlay.rotation_visible);
        assert_eq!(overlay.toggle_label_key, "view.inside");
        assert_eq!(app.scene.dome_material().side(), Side::Front);

        app.apply(&UiAction::ToggleView);
        assert!(app.overlay(None).rotation_visible);
        assert_eq!(app.scene.dome_material().side(), Side::Back);
    }

    #[test]
    fn rotate_up_outside_is_a_no_op() {
        let (mut app, _) = app_with(DomeConfig::default(), false);
        app.apply(&UiAction::ToggleView);
        let pose = *app.view.pose();
        let target = app.view.controls().target;

        app.apply(&UiAction::RotateUp);
        assert_eq!(*app.view.pose(), pose);
        assert_eq!(app.view.controls().target, target);
    }

    #[test]
    fn scale_field_round_trip() {
        let (mut app, _) = app_with(DomeConfig::default(), false);
        let generation = app.scene.mesh().uv_generation();

        app.ui.scale_field = "2.5".into();
        app.apply(&UiAction::ApplyScale);
        assert_eq!(app.scene.scale().get(), 2.5);
        assert_eq!(app.scene.mesh().uv_generation(), generation + 1);

        app.apply(&UiAction::ApplyScale);
        assert_eq!(app.scene.mesh().uv_generation(), generation + 1);

        app.ui.scale_field = "".into();
        app.apply(&UiAction::ApplyScale);
        assert_eq!(app.ui.scale_field, "2.5");
        assert_eq!(app.scene.mesh().uv_generation(), generation + 1);
    }

    #[test]
    fn minimap_only_rendered_inside() {
        let (mut app, _) = app_with(DomeConfig::default(), false);
        let plan = app.frame();
        assert!(plan.minimap.is_some());
        assert!(app.minimap_viewport(1280, 720, 1.0).is_some());

        app.apply(&UiAction::ToggleView);
        let plan = app.frame();
        assert!(plan.minimap.is_none());
        assert!(app.minimap_viewport(1280, 720, 1.0).is_none());
    }

    #[test]
    fn space_toggles_playback() {
        let dir = frames_dir();
        let config = DomeConfig {
            video_source: Some(dir.path().display().to_string()),
            ..DomeConfig::default()
        };
        let (mut app, _) = app_with(config, true);
        assert_eq!(app.key_action(VirtualKeyCode::Space), Some(UiAction::Play));
        app.apply(&UiAction::Play);
        assert_eq!(app.key_action(VirtualKeyCode::Space), Some(UiAction::Pause));
        assert_eq!(app.key_action(VirtualKeyCode::Q), None);
    }
}
