//! Dither Renderer - block-level error diffusion for stills and animations
//!
//! Quantizes frames to a two-colour palette with one of eight classic error
//! diffusion kernels, throttles recomputation against wall-clock time and
//! presents the result through a GPU path (`gpu` feature) or a CPU surface.
//!
//! # Example
//! ```no_run
//! use dither_rendr::{DitherSettings, DitherPattern, process_frame};
//!
//! let input = image::open("photo.jpg").unwrap().to_rgba8();
//! let settings = DitherSettings {
//!     pattern: DitherPattern::Atkinson,
//!     ..Default::default()
//! };
//! let output = process_frame(&input, &settings);
//! output.image.save("dithered.png").unwrap();
//! ```

pub mod adjust;
pub mod backend;
pub mod config;
pub mod engine;
pub mod error;
pub mod governor;
pub mod palette;
pub mod patterns;
pub mod processor;
pub mod source;

// Re-export main types for convenience
pub use adjust::MediaAdjustments;
pub use backend::{BackendKind, ProbeOutcome, probe_accelerated};
pub use config::{BackendPreference, DitherOverrides, DitherSettings, EngineConfig};
pub use engine::{DitherEngine, TickOutcome};
pub use error::{DitherError, DitherResult};
pub use governor::FrameRateGovernor;
pub use palette::{Palette, parse_hex_color};
pub use patterns::{DitherPattern, kernel_by_name};
pub use processor::{ProcessedFrame, process_frame, process_frame_named};
pub use source::{FrameSequence, FrameSource, StillImage};
