// media.rs — video source and playback
//
// A source is a video file (decoded with FFmpeg), a directory of image
// frames played in file-name order at a fixed frame rate, or a single still
// image. Frames are decoded on a background thread; the render loop picks up
// the newest one without blocking and keeps showing the previous texture
// until then.

use crate::decoder::{DecodedFrame, FrameDecoder, SequenceDecoder, VideoDecoder};
use crate::error::MediaError;
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const FRAME_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

/// Whether playback may start without a user action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoplayPolicy {
    Allowed,
    /// Unattended playback only while muted.
    #[default]
    MutedOnly,
    Blocked,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoSource {
    /// Container file such as `.mp4`; decoded with FFmpeg.
    File(PathBuf),
    Frames { dir: PathBuf, frames: Vec<PathBuf> },
    Still(PathBuf),
}

impl VideoSource {
    /// Resolve a user-supplied location. `file://` prefixes are accepted,
    /// other schemes are not.
    pub fn resolve(location: &str) -> Result<Self, MediaError> {
        let location = location.trim();
        if location.is_empty() {
            return Err(MediaError::EmptySource);
        }
        let location = location.strip_prefix("file://").unwrap_or(location);
        if location.contains("://") {
            return Err(MediaError::UnsupportedScheme(location.to_string()));
        }

        let path = PathBuf::from(location);
        if path.is_dir() {
            let frames = collect_frames(&path)?;
            Ok(VideoSource::Frames { dir: path, frames })
        } else if path.is_file() && is_frame(&path) {
            Ok(VideoSource::Still(path))
        } else if path.is_file() {
            Ok(VideoSource::File(path))
        } else {
            Err(MediaError::NotFound(path))
        }
    }

    pub fn location(&self) -> &Path {
        match self {
            VideoSource::File(path) | VideoSource::Still(path) => path,
            VideoSource::Frames { dir, .. } => dir,
        }
    }

    /// Open a decoder for this source. `frame_rate` paces image sequences;
    /// video files carry their own.
    fn open(&self, frame_rate: f64) -> Result<Box<dyn FrameDecoder>, MediaError> {
        Ok(match self {
            VideoSource::File(path) => Box::new(VideoDecoder::open(path)?),
            VideoSource::Frames { frames, .. } => {
                Box::new(SequenceDecoder::new(frames.clone(), frame_rate)?)
            }
            VideoSource::Still(path) => Box::new(SequenceDecoder::new(vec![path.clone()], frame_rate)?),
        })
    }
}

fn collect_frames(dir: &Path) -> Result<Vec<PathBuf>, MediaError> {
    let entries = std::fs::read_dir(dir).map_err(|_| MediaError::NotFound(dir.to_path_buf()))?;
    let mut frames: Vec<PathBuf> = entries
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && is_frame(p))
        .collect();
    if frames.is_empty() {
        return Err(MediaError::NoFrames(dir.to_path_buf()));
    }
    frames.sort();
    Ok(frames)
}

fn is_frame(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| FRAME_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Playback surface the render loop and the controls talk to.
pub trait MediaElement {
    fn set_source(&mut self, source: VideoSource) -> Result<(), MediaError>;
    fn clear_source(&mut self);
    fn has_source(&self) -> bool;
    fn set_looping(&mut self, looping: bool);
    fn set_muted(&mut self, muted: bool);
    /// Start or resume playback; after the end of a non-looping source,
    /// playback restarts from zero.
    fn play(&mut self) -> Result<(), MediaError>;
    /// Start playback without a user gesture; may be rejected by policy.
    fn request_autoplay(&mut self) -> Result<(), MediaError>;
    fn pause(&mut self);
    fn is_paused(&self) -> bool;
    fn seek(&mut self, seconds: f64);
    /// Presentation time of the last frame shown, in seconds.
    fn current_time(&self) -> f64;
    /// Newest decoded frame since the last call, if any.
    fn take_frame(&mut self) -> Option<RgbaImage>;

    fn stop(&mut self) {
        self.pause();
        self.seek(0.0);
    }
}

/// State shared between the decode thread and the render loop.
struct SharedState {
    current_frame: Mutex<Option<RgbaImage>>,
    new_frame_available: AtomicBool,
    running: AtomicBool,
    paused: AtomicBool,
    looping: AtomicBool,
    /// Reached the end of a non-looping source.
    ended: AtomicBool,
    seek_requested: AtomicBool,
    /// `f64` bits, seconds.
    seek_target: AtomicU64,
    /// `f64` bits, seconds.
    position: AtomicU64,
}

impl SharedState {
    fn new(looping: bool) -> Self {
        Self {
            current_frame: Mutex::new(None),
            new_frame_available: AtomicBool::new(false),
            running: AtomicBool::new(true),
            paused: AtomicBool::new(true),
            looping: AtomicBool::new(looping),
            ended: AtomicBool::new(false),
            seek_requested: AtomicBool::new(false),
            seek_target: AtomicU64::new(0),
            position: AtomicU64::new(0),
        }
    }

    fn publish(&self, frame: DecodedFrame) {
        if let Ok(mut current) = self.current_frame.lock() {
            *current = Some(frame.image);
            self.new_frame_available.store(true, Ordering::Release);
            self.position.store(frame.pts.to_bits(), Ordering::Release);
        }
    }

    fn publish_result(&self, result: Result<Option<DecodedFrame>, MediaError>) {
        match result {
            Ok(Some(frame)) => self.publish(frame),
            Ok(None) => {}
            Err(e) => log::error!("{e}"),
        }
    }

    fn request_seek(&self, seconds: f64) {
        self.seek_target.store(seconds.to_bits(), Ordering::Release);
        self.position.store(seconds.to_bits(), Ordering::Release);
        self.seek_requested.store(true, Ordering::Release);
    }
}

struct Worker {
    state: Arc<SharedState>,
    handle: Option<JoinHandle<()>>,
    /// Seek bound in seconds, 0 when the length is unknown.
    duration: f64,
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.state.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Player with a background decode thread per source.
pub struct FramePlayer {
    frame_rate: f64,
    looping: bool,
    muted: bool,
    autoplay: AutoplayPolicy,
    source: Option<VideoSource>,
    worker: Option<Worker>,
}

impl FramePlayer {
    pub fn new(frame_rate: f64, autoplay: AutoplayPolicy) -> Self {
        Self {
            frame_rate: if frame_rate > 0.0 { frame_rate } else { 30.0 },
            looping: true,
            muted: true,
            autoplay,
            source: None,
            worker: None,
        }
    }

    fn decode_loop(state: Arc<SharedState>, source: VideoSource, frame_rate: f64) {
        // FFmpeg contexts stay on the thread that opened them
        let mut decoder = match source.open(frame_rate) {
            Ok(d) => d,
            Err(e) => {
                log::error!("decode thread: {e}");
                return;
            }
        };
        let still = matches!(source, VideoSource::Still(_));
        let frame_duration = Duration::from_secs_f64(1.0 / decoder.frame_rate());
        let mut next_frame_time = Instant::now();

        // Poster frame, visible before playback starts
        state.publish_result(decoder.next_frame());

        while state.running.load(Ordering::Acquire) {
            if state.seek_requested.swap(false, Ordering::AcqRel) {
                let target = f64::from_bits(state.seek_target.load(Ordering::Acquire));
                state.publish_result(decoder.seek(target));
                next_frame_time = Instant::now() + frame_duration;
            }

            if state.paused.load(Ordering::Acquire) || still {
                thread::sleep(Duration::from_millis(10));
                next_frame_time = Instant::now() + frame_duration;
                continue;
            }

            let now = Instant::now();
            if now < next_frame_time {
                thread::sleep(next_frame_time - now);
                continue;
            }

            match decoder.next_frame() {
                Ok(Some(frame)) => state.publish(frame),
                Ok(None) if state.looping.load(Ordering::Acquire) => {
                    log::debug!("frame player: looping");
                    state.publish_result(decoder.seek(0.0));
                }
                Ok(None) => {
                    state.ended.store(true, Ordering::Release);
                    state.paused.store(true, Ordering::Release);
                    log::debug!("frame player: ended");
                    continue;
                }
                Err(e) => log::error!("{e}"),
            }

            next_frame_time += frame_duration;
            // fell behind: don't try to catch up
            if Instant::now() > next_frame_time + frame_duration {
                next_frame_time = Instant::now();
            }
        }
    }
}

impl MediaElement for FramePlayer {
    fn set_source(&mut self, source: VideoSource) -> Result<(), MediaError> {
        // join the old decode thread before starting the new one
        self.worker = None;
        self.source = None;

        // open once here so a broken source is reported to the caller
        let (duration, frame_rate) = {
            let decoder = source.open(self.frame_rate)?;
            (decoder.duration(), decoder.frame_rate())
        };
        log::info!(
            "video source {} ({:.2}s @ {:.2}fps)",
            source.location().display(),
            duration,
            frame_rate
        );

        let state = Arc::new(SharedState::new(self.looping));
        let thread_state = Arc::clone(&state);
        let thread_source = source.clone();
        let sequence_rate = self.frame_rate;
        let handle =
            thread::spawn(move || Self::decode_loop(thread_state, thread_source, sequence_rate));

        self.worker = Some(Worker {
            state,
            handle: Some(handle),
            duration,
        });
        self.source = Some(source);
        Ok(())
    }

    fn clear_source(&mut self) {
        self.worker = None;
        self.source = None;
    }

    fn has_source(&self) -> bool {
        self.source.is_some()
    }

    fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
        if let Some(w) = &self.worker {
            w.state.looping.store(looping, Ordering::Release);
        }
    }

    fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    fn play(&mut self) -> Result<(), MediaError> {
        let worker = self.worker.as_ref().ok_or(MediaError::NoSource)?;
        if worker.state.ended.swap(false, Ordering::AcqRel) {
            worker.state.request_seek(0.0);
        }
        worker.state.paused.store(false, Ordering::Release);
        Ok(())
    }

    fn request_autoplay(&mut self) -> Result<(), MediaError> {
        let allowed = match self.autoplay {
            AutoplayPolicy::Allowed => true,
            AutoplayPolicy::MutedOnly => self.muted,
            AutoplayPolicy::Blocked => false,
        };
        if !allowed {
            return Err(MediaError::AutoplayRejected);
        }
        self.play()
    }

    fn pause(&mut self) {
        if let Some(w) = &self.worker {
            w.state.paused.store(true, Ordering::Release);
        }
    }

    fn is_paused(&self) -> bool {
        self.worker
            .as_ref()
            .map_or(true, |w| w.state.paused.load(Ordering::Acquire))
    }

    fn seek(&mut self, seconds: f64) {
        if let Some(w) = &self.worker {
            let mut target = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
            if w.duration > 0.0 {
                target = target.min(w.duration);
            }
            w.state.ended.store(false, Ordering::Release);
            w.state.request_seek(target);
        }
    }

    fn current_time(&self) -> f64 {
        self.worker.as_ref().map_or(0.0, |w| {
            f64::from_bits(w.state.position.load(Ordering::Acquire))
        })
    }

    fn take_frame(&mut self) -> Option<RgbaImage> {
        let worker = self.worker.as_ref()?;
        if !worker.state.new_frame_available.swap(false, Ordering::AcqRel) {
            return None;
        }
        worker.state.current_frame.lock().ok()?.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn write_frames(dir: &Path, count: usize) {
        for i in 0..count {
            let img = RgbaImage::from_pixel(4, 4, Rgba([i as u8 * 40, 0, 0, 255]));
            img.save(dir.join(format!("frame_{i:03}.png"))).unwrap();
        }
        std::fs::write(dir.join("notes.txt"), "not a frame").unwrap();
    }

    fn wait_for<T>(mut f: impl FnMut() -> Option<T>) -> Option<T> {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if let Some(v) = f() {
                return Some(v);
            }
            thread::sleep(Duration::from_millis(5));
        }
        None
    }

    fn player_with_frames(dir: &Path, count: usize, frame_rate: f64) -> FramePlayer {
        write_frames(dir, count);
        let mut player = FramePlayer::new(frame_rate, AutoplayPolicy::Allowed);
        player
            .set_source(VideoSource::resolve(dir.to_str().unwrap()).unwrap())
            .unwrap();
        player
    }

    #[test]
    fn resolves_frame_directory_in_order() {
        let dir = tempfile::tempdir().unwrap();
        write_frames(dir.path(), 3);
        let location = format!("file://{}", dir.path().display());

        let Ok(VideoSource::Frames { frames, .. }) = VideoSource::resolve(&location) else {
            panic!("expected a frame directory");
        };
        assert_eq!(frames.len(), 3);
        assert!(frames[0].ends_with("frame_000.png"));
        assert!(frames[2].ends_with("frame_002.png"));
    }

    #[test]
    fn resolve_errors() {
        assert!(matches!(VideoSource::resolve("  "), Err(MediaError::EmptySource)));
        assert!(matches!(
            VideoSource::resolve("https://example.com/a.mp4"),
            Err(MediaError::UnsupportedScheme(_))
        ));
        assert!(matches!(
            VideoSource::resolve("/definitely/not/here"),
            Err(MediaError::NotFound(_))
        ));

        let empty = tempfile::tempdir().unwrap();
        assert!(matches!(
            VideoSource::resolve(empty.path().to_str().unwrap()),
            Err(MediaError::NoFrames(_))
        ));
    }

    #[test]
    fn images_are_stills_and_other_files_are_videos() {
        let dir = tempfile::tempdir().unwrap();
        write_frames(dir.path(), 1);
        let still = dir.path().join("frame_000.png");
        assert_eq!(
            VideoSource::resolve(still.to_str().unwrap()).unwrap(),
            VideoSource::Still(still)
        );

        let clip = dir.path().join("shot03_04_v2_fish5.mp4");
        std::fs::write(&clip, b"\x00\x00\x00\x18ftypmp42").unwrap();
        assert_eq!(
            VideoSource::resolve(clip.to_str().unwrap()).unwrap(),
            VideoSource::File(clip)
        );
    }

    #[test]
    fn unreadable_video_is_reported_not_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let clip = dir.path().join("broken.mp4");
        std::fs::write(&clip, b"\x00\x00\x00\x18ftypmp42\x00\x00\x00\x00").unwrap();

        let mut player = FramePlayer::new(30.0, AutoplayPolicy::Allowed);
        assert!(player.set_source(VideoSource::File(clip)).is_err());
        assert!(!player.has_source());
        assert!(matches!(player.play(), Err(MediaError::NoSource)));
    }

    #[test]
    fn poster_frame_arrives_while_paused() {
        let dir = tempfile::tempdir().unwrap();
        let mut player = player_with_frames(dir.path(), 3, 30.0);

        assert!(player.is_paused());
        let frame = wait_for(|| player.take_frame()).expect("poster frame");
        assert_eq!(frame.dimensions(), (4, 4));
    }

    #[test]
    fn stop_rewinds_and_pauses() {
        let dir = tempfile::tempdir().unwrap();
        let mut player = player_with_frames(dir.path(), 4, 60.0);

        player.play().unwrap();
        assert!(!player.is_paused());
        wait_for(|| (player.current_time() > 0.0).then_some(()));

        player.stop();
        assert!(player.is_paused());
        assert!(wait_for(|| (player.current_time() == 0.0).then_some(())).is_some());
    }

    #[test]
    fn play_after_end_restarts_from_zero() {
        let dir = tempfile::tempdir().unwrap();
        let mut player = player_with_frames(dir.path(), 3, 60.0);
        player.set_looping(false);

        player.play().unwrap();
        thread::sleep(Duration::from_millis(20));
        assert!(wait_for(|| player.is_paused().then_some(())).is_some(), "never ended");
        while player.take_frame().is_some() {}

        player.play().unwrap();
        assert!(!player.is_paused());
        assert!(wait_for(|| player.take_frame()).is_some());
    }

    #[test]
    fn seek_is_clamped_to_the_source() {
        let dir = tempfile::tempdir().unwrap();
        let mut player = player_with_frames(dir.path(), 3, 10.0);

        player.seek(f64::MAX);
        assert!(player.current_time() <= 0.3);
        assert!(wait_for(|| (player.current_time() == 0.2).then_some(())).is_some());

        player.seek(f64::NAN);
        assert_eq!(player.current_time(), 0.0);
    }

    #[test]
    fn play_without_source_fails() {
        let mut player = FramePlayer::new(30.0, AutoplayPolicy::Allowed);
        assert!(matches!(player.play(), Err(MediaError::NoSource)));
        assert_eq!(player.current_time(), 0.0);
        assert!(player.take_frame().is_none());
    }

    #[test]
    fn autoplay_policy() {
        let dir = tempfile::tempdir().unwrap();
        write_frames(dir.path(), 2);
        let source = VideoSource::resolve(dir.path().to_str().unwrap()).unwrap();

        let mut blocked = FramePlayer::new(30.0, AutoplayPolicy::Blocked);
        blocked.set_source(source.clone()).unwrap();
        assert!(matches!(blocked.request_autoplay(), Err(MediaError::AutoplayRejected)));
        assert!(blocked.is_paused());
        blocked.play().unwrap();
        assert!(!blocked.is_paused());

        let mut muted_only = FramePlayer::new(30.0, AutoplayPolicy::MutedOnly);
        muted_only.set_source(source).unwrap();
        muted_only.set_muted(false);
        assert!(muted_only.request_autoplay().is_err());
        muted_only.set_muted(true);
        assert!(muted_only.request_autoplay().is_ok());
    }
}
