// decoder.rs — 解码器: video files through FFmpeg, image sequences through `image`
//
// Both produce RGBA frames stamped with their presentation time in seconds.
// Decoders are created on the thread that uses them.

use crate::error::MediaError;
use image::RgbaImage;
use std::path::{Path, PathBuf};

use ffmpeg_next as ffmpeg;

pub struct DecodedFrame {
    pub image: RgbaImage,
    /// Presentation time in seconds.
    pub pts: f64,
}

pub trait FrameDecoder {
    fn frame_rate(&self) -> f64;
    /// Length in seconds, 0 when unknown.
    fn duration(&self) -> f64;
    /// Next frame in presentation order, `None` at the end of the stream.
    fn next_frame(&mut self) -> Result<Option<DecodedFrame>, MediaError>;
    /// Jump to `seconds` and return the frame shown there.
    fn seek(&mut self, seconds: f64) -> Result<Option<DecodedFrame>, MediaError>;
}

/// Video file decoded with FFmpeg to RGBA (software path).
pub struct VideoDecoder {
    path: PathBuf,
    input: ffmpeg::format::context::Input,
    stream_index: usize,
    decoder: ffmpeg::decoder::Video,
    scaler: Option<ffmpeg::software::scaling::Context>,
    time_base: f64,
    frame_rate: f64,
    duration: f64,
    /// All packets have been sent; the decoder is draining.
    packets_done: bool,
}

impl VideoDecoder {
    pub fn open(path: &Path) -> Result<Self, MediaError> {
        let open_err = |source| MediaError::VideoOpen {
            path: path.to_path_buf(),
            source,
        };

        ffmpeg::init().map_err(open_err)?;
        let input = ffmpeg::format::input(&path).map_err(open_err)?;

        let (stream_index, time_base, frame_rate, stream_duration, parameters) = {
            let stream = input
                .streams()
                .best(ffmpeg::media::Type::Video)
                .ok_or_else(|| MediaError::NoVideoStream(path.to_path_buf()))?;
            let tb = stream.time_base();
            let time_base = tb.numerator() as f64 / tb.denominator().max(1) as f64;
            let rate = stream.avg_frame_rate();
            let frame_rate = if rate.numerator() > 0 && rate.denominator() > 0 {
                rate.numerator() as f64 / rate.denominator() as f64
            } else {
                30.0
            };
            (
                stream.index(),
                time_base,
                frame_rate,
                stream.duration() as f64 * time_base,
                stream.parameters(),
            )
        };

        let duration = if stream_duration > 0.0 {
            stream_duration
        } else if input.duration() > 0 {
            input.duration() as f64 / ffmpeg::ffi::AV_TIME_BASE as f64
        } else {
            0.0
        };

        let context = ffmpeg::codec::context::Context::from_parameters(parameters).map_err(open_err)?;
        let decoder = context.decoder().video().map_err(open_err)?;

        log::info!(
            "opened video {}: {}x{} @ {:.2}fps, {:.2}s",
            path.display(),
            decoder.width(),
            decoder.height(),
            frame_rate,
            duration
        );

        Ok(Self {
            path: path.to_path_buf(),
            input,
            stream_index,
            decoder,
            scaler: None,
            time_base,
            frame_rate,
            duration,
            packets_done: false,
        })
    }

    fn decode_err(&self, source: ffmpeg::Error) -> MediaError {
        MediaError::VideoDecode {
            path: self.path.clone(),
            source,
        }
    }

    fn to_rgba(&mut self, frame: &ffmpeg::frame::Video) -> Result<DecodedFrame, MediaError> {
        let (width, height, format) = (frame.width(), frame.height(), frame.format());
        let stale = self.scaler.as_ref().map_or(true, |s| {
            let input = s.input();
            input.format != format || input.width != width || input.height != height
        });
        if stale {
            let scaler = ffmpeg::software::scaling::Context::get(
                format,
                width,
                height,
                ffmpeg::format::Pixel::RGBA,
                width,
                height,
                ffmpeg::software::scaling::Flags::BILINEAR,
            )
            .map_err(|e| self.decode_err(e))?;
            self.scaler = Some(scaler);
        }

        let mut rgba = ffmpeg::frame::Video::empty();
        if let Some(scaler) = self.scaler.as_mut() {
            scaler
                .run(frame, &mut rgba)
                .map_err(|source| MediaError::VideoDecode {
                    path: self.path.clone(),
                    source,
                })?;
        }

        // 按行拷贝, stride may include padding
        let row = width as usize * 4;
        let stride = rgba.stride(0);
        let data = rgba.data(0);
        let mut pixels = Vec::with_capacity(row * height as usize);
        for y in 0..height as usize {
            pixels.extend_from_slice(&data[y * stride..y * stride + row]);
        }
        let image = RgbaImage::from_raw(width, height, pixels)
            .ok_or_else(|| self.decode_err(ffmpeg::Error::InvalidData))?;

        let pts = frame.timestamp().or_else(|| frame.pts()).unwrap_or(0) as f64 * self.time_base;
        Ok(DecodedFrame { image, pts })
    }

    /// Feed one packet of our stream, or signal end of input.
    fn feed(&mut self) -> Result<(), MediaError> {
        let mut sent = false;
        while let Some((stream, packet)) = self.input.packets().next() {
            if stream.index() == self.stream_index {
                self.decoder
                    .send_packet(&packet)
                    .map_err(|source| MediaError::VideoDecode {
                        path: self.path.clone(),
                        source,
                    })?;
                sent = true;
                break;
            }
        }
        if !sent {
            self.decoder.send_eof().map_err(|e| self.decode_err(e))?;
            self.packets_done = true;
        }
        Ok(())
    }
}

impl FrameDecoder for VideoDecoder {
    fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    fn duration(&self) -> f64 {
        self.duration
    }

    fn next_frame(&mut self) -> Result<Option<DecodedFrame>, MediaError> {
        let mut decoded = ffmpeg::frame::Video::empty();
        loop {
            match self.decoder.receive_frame(&mut decoded) {
                Ok(()) => return self.to_rgba(&decoded).map(Some),
                Err(ffmpeg::Error::Other {
                    errno: ffmpeg::error::EAGAIN,
                }) => {}
                Err(ffmpeg::Error::Eof) => return Ok(None),
                Err(e) => return Err(self.decode_err(e)),
            }
            if self.packets_done {
                return Ok(None);
            }
            self.feed()?;
        }
    }

    fn seek(&mut self, seconds: f64) -> Result<Option<DecodedFrame>, MediaError> {
        // AV_TIME_BASE units; lands on the keyframe at or before the target
        let ts = (seconds.max(0.0) * 1_000_000.0) as i64;
        self.input.seek(ts, ..ts).map_err(|e| self.decode_err(e))?;
        self.decoder.flush();
        self.packets_done = false;

        // decode forward from the keyframe to the requested time
        let half_frame = 0.5 / self.frame_rate;
        let mut last = None;
        while let Some(frame) = self.next_frame()? {
            let reached = frame.pts + half_frame >= seconds;
            last = Some(frame);
            if reached {
                break;
            }
        }
        Ok(last)
    }
}

/// Image files played back in name order at a fixed rate. A still image is
/// a sequence of one.
pub struct SequenceDecoder {
    frames: Vec<PathBuf>,
    frame_rate: f64,
    next: usize,
}

impl SequenceDecoder {
    pub fn new(frames: Vec<PathBuf>, frame_rate: f64) -> Result<Self, MediaError> {
        if frames.is_empty() {
            return Err(MediaError::NoFrames(PathBuf::new()));
        }
        Ok(Self {
            frames,
            frame_rate,
            next: 0,
        })
    }

    fn decode(&self, index: usize) -> Result<DecodedFrame, MediaError> {
        let path = &self.frames[index];
        let image = image::open(path)
            .map(|img| img.to_rgba8())
            .map_err(|source| MediaError::Decode {
                path: path.clone(),
                source,
            })?;
        Ok(DecodedFrame {
            image,
            pts: index as f64 / self.frame_rate,
        })
    }
}

impl FrameDecoder for SequenceDecoder {
    fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    fn duration(&self) -> f64 {
        self.frames.len() as f64 / self.frame_rate
    }

    fn next_frame(&mut self) -> Result<Option<DecodedFrame>, MediaError> {
        if self.next >= self.frames.len() {
            return Ok(None);
        }
        let index = self.next;
        self.next += 1;
        self.decode(index).map(Some)
    }

    fn seek(&mut self, seconds: f64) -> Result<Option<DecodedFrame>, MediaError> {
        // float-to-int casts saturate; the min keeps the index in range
        let index = ((seconds.max(0.0) * self.frame_rate).round() as usize).min(self.frames.len() - 1);
        self.next = index + 1;
        self.decode(index).map(Some)
    }
}
