//! Frame sources feeding the render loop
//!
//! A source only has to answer "what are your dimensions" and "give me the
//! current RGBA frame". Returning `None` means the frame is not available yet
//! (still decoding, empty stream); the render loop simply tries again next tick.

use crate::adjust::MediaAdjustments;
use crate::error::{DitherError, DitherResult};
use image::codecs::gif::GifDecoder;
use image::{AnimationDecoder, RgbaImage};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

/// Delay used for frames that declare none (GIFs commonly store 0)
pub const DEFAULT_FRAME_DELAY: Duration = Duration::from_millis(100);

pub trait FrameSource {
    /// Dimensions of the frame that `current_frame` would return
    fn dimensions(&self) -> (u32, u32);

    /// Current frame at host time `now_ms`, if one is available
    fn current_frame(&mut self, now_ms: u64) -> Option<&RgbaImage>;
}

/// A single still frame
#[derive(Debug, Clone)]
pub struct StillImage {
    image: RgbaImage,
}

impl StillImage {
    pub fn new(image: RgbaImage) -> Self {
        Self { image }
    }

    pub fn with_adjustments(mut image: RgbaImage, adjustments: &MediaAdjustments) -> Self {
        adjustments.apply(&mut image);
        Self { image }
    }

    /// Decode any format the `image` crate understands
    pub fn open(path: impl AsRef<Path>, adjustments: &MediaAdjustments) -> DitherResult<Self> {
        let image = image::open(path)?.to_rgba8();
        Ok(Self::with_adjustments(image, adjustments))
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }
}

impl FrameSource for StillImage {
    fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    fn current_frame(&mut self, _now_ms: u64) -> Option<&RgbaImage> {
        Some(&self.image)
    }
}

/// Timed frames played back against the host clock
///
/// Stands in for a video element: the playback position is derived from the
/// time of the first request, scaled by `playback_speed`, and either loops or
/// holds the last frame.
#[derive(Debug, Clone)]
pub struct FrameSequence {
    frames: Vec<(RgbaImage, Duration)>,
    total_ms: u64,
    pub loop_playback: bool, // default true
    pub playback_speed: f32, // default 1.0
    started_ms: Option<u64>,
    current: usize,
}

impl FrameSequence {
    pub fn new(frames: Vec<(RgbaImage, Duration)>) -> Self {
        let frames: Vec<(RgbaImage, Duration)> = frames
            .into_iter()
            .map(|(img, delay)| {
                let delay = if delay.is_zero() {
                    DEFAULT_FRAME_DELAY
                } else {
                    delay
                };
                (img, delay)
            })
            .collect();
        let total_ms = frames.iter().map(|(_, d)| d.as_millis() as u64).sum();

        Self {
            frames,
            total_ms,
            loop_playback: true,
            playback_speed: 1.0,
            started_ms: None,
            current: 0,
        }
    }

    pub fn with_adjustments(
        mut frames: Vec<(RgbaImage, Duration)>,
        adjustments: &MediaAdjustments,
    ) -> Self {
        for (img, _) in &mut frames {
            adjustments.apply(img);
        }
        Self::new(frames)
    }

    /// Decode every frame of an animated GIF up front
    pub fn open_gif(path: impl AsRef<Path>, adjustments: &MediaAdjustments) -> DitherResult<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| DitherError::source(format!("{}: {e}", path.display())))?;
        let decoder = GifDecoder::new(BufReader::new(file))?;
        let frames = decoder
            .into_frames()
            .collect_frames()?
            .into_iter()
            .map(|frame| {
                let (numer, denom) = frame.delay().numer_denom_ms();
                let delay_ms = if denom == 0 { 0 } else { numer / denom };
                (frame.into_buffer(), Duration::from_millis(delay_ms as u64))
            })
            .collect();

        let sequence = Self::with_adjustments(frames, adjustments);
        log::debug!(
            "decoded {} frames ({} ms) from {}",
            sequence.len(),
            sequence.total_ms,
            path.display()
        );
        Ok(sequence)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.total_ms)
    }

    /// Restart playback from the first frame on the next request
    pub fn rewind(&mut self) {
        self.started_ms = None;
        self.current = 0;
    }

    /// Index of the frame showing `position_ms` into the sequence
    fn frame_at(&self, position_ms: u64) -> usize {
        let mut acc = 0u64;
        for (i, (_, delay)) in self.frames.iter().enumerate() {
            acc += delay.as_millis() as u64;
            if position_ms < acc {
                return i;
            }
        }
        self.frames.len().saturating_sub(1)
    }

    fn advance(&mut self, now_ms: u64) {
        let started = *self.started_ms.get_or_insert(now_ms);
        let speed = if self.playback_speed.is_finite() {
            self.playback_speed.max(0.0)
        } else {
            1.0
        };
        let elapsed = (now_ms.saturating_sub(started) as f64 * speed as f64) as u64;
        let position = if self.loop_playback && self.total_ms > 0 {
            elapsed % self.total_ms
        } else {
            elapsed
        };
        self.current = self.frame_at(position);
    }
}

impl FrameSource for FrameSequence {
    fn dimensions(&self) -> (u32, u32) {
        self.frames
            .get(self.current)
            .map(|(img, _)| img.dimensions())
            .unwrap_or((0, 0))
    }

    fn current_frame(&mut self, now_ms: u64) -> Option<&RgbaImage> {
        if self.frames.is_empty() {
            return None;
        }
        self.advance(now_ms);
        self.frames.get(self.current).map(|(img, _)| img)
    }
}
