use crate::error::{DitherError, DitherResult};
use crate::palette::{Palette, parse_hex_color};
use crate::patterns::DitherPattern;
use std::time::Duration;

/// Default wall-clock spacing between two diffusion passes
pub const DEFAULT_RECOMPUTE_INTERVAL: Duration = Duration::from_millis(50);

/// Per-frame dithering parameters
#[derive(Debug, Clone, PartialEq)]
pub struct DitherSettings {
    /// Error diffusion kernel
    pub pattern: DitherPattern,

    /// Palette
    pub color1: [u8; 3],         // default #050505
    pub color2: [u8; 3],         // default #fafafa

    /// Block size in source pixels, floored to an integer >= 1 before use
    pub pixelation: f32,         // default 2

    /// Tone
    pub contrast: f32,           // default 1.0
    pub brightness: f32,         // default 1.0

    /// Raw multiplier on propagated error. Not clamped: values above 1.0
    /// amplify the error and keeping them sane is up to the caller.
    pub threshold: f32,          // default 1.0
}

impl Default for DitherSettings {
    fn default() -> Self {
        Self {
            pattern: DitherPattern::FloydSteinberg,

            color1: [0x05, 0x05, 0x05],
            color2: [0xfa, 0xfa, 0xfa],

            pixelation: 2.0,

            contrast: 1.0,
            brightness: 1.0,

            threshold: 1.0,
        }
    }
}

impl DitherSettings {
    /// Effective block size: `floor(pixelation)`, at least 1
    pub fn block_size(&self) -> u32 {
        if self.pixelation.is_finite() && self.pixelation >= 1.0 {
            self.pixelation.floor().min(u32::MAX as f32) as u32
        } else {
            1
        }
    }

    pub fn palette(&self) -> Palette {
        Palette::new(self.color1, self.color2)
    }

    /// Set both palette colours from `#rrggbb` strings; unparsable strings become black
    pub fn with_hex_colors(mut self, color1: &str, color2: &str) -> Self {
        self.color1 = parse_hex_color(color1);
        self.color2 = parse_hex_color(color2);
        self
    }

    /// Validates the configuration parameters
    ///
    /// `threshold` has no upper bound; only non-finite values are rejected.
    /// `pixelation` is never rejected, [`block_size`](Self::block_size)
    /// clamps it.
    pub fn validate(&self) -> DitherResult<()> {
        if !self.contrast.is_finite() {
            return Err(DitherError::invalid_settings(format!(
                "contrast must be finite, got {}",
                self.contrast
            )));
        }
        if !self.brightness.is_finite() {
            return Err(DitherError::invalid_settings(format!(
                "brightness must be finite, got {}",
                self.brightness
            )));
        }
        if !self.threshold.is_finite() {
            return Err(DitherError::invalid_settings(format!(
                "threshold must be finite, got {}",
                self.threshold
            )));
        }
        Ok(())
    }
}

/// Partial settings coming from a controls layer.
///
/// Unset fields keep the base value. Colours are hex strings and patterns are
/// names, both resolved the same way as everywhere else in the crate.
#[derive(Debug, Clone, Default)]
pub struct DitherOverrides {
    pub pattern: Option<String>,
    pub color1: Option<String>,
    pub color2: Option<String>,
    pub pixelation: Option<f32>,
    pub contrast: Option<f32>,
    pub brightness: Option<f32>,
    pub threshold: Option<f32>,
}

impl DitherOverrides {
    pub fn apply(&self, base: &DitherSettings) -> DitherSettings {
        let mut merged = base.clone();

        if let Some(name) = &self.pattern {
            match name.parse::<DitherPattern>() {
                Ok(pattern) => merged.pattern = pattern,
                Err(e) => log::warn!("ignoring pattern override: {e}"),
            }
        }
        if let Some(hex) = &self.color1 {
            merged.color1 = parse_hex_color(hex);
        }
        if let Some(hex) = &self.color2 {
            merged.color2 = parse_hex_color(hex);
        }
        if let Some(v) = self.pixelation {
            merged.pixelation = v;
        }
        if let Some(v) = self.contrast {
            merged.contrast = v;
        }
        if let Some(v) = self.brightness {
            merged.brightness = v;
        }
        if let Some(v) = self.threshold {
            merged.threshold = v;
        }

        merged
    }
}

/// Which presentation path an engine may negotiate
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BackendPreference {
    /// Probe for the accelerated path, fall back to software when unavailable
    #[default]
    Auto,
    /// Never probe
    SoftwareOnly,
}

/// Engine-wide configuration, fixed for the lifetime of one engine instance
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub recompute_interval: Duration,  // default 50ms
    pub backend: BackendPreference,    // default Auto
    pub clear_color: [u8; 4],          // default opaque black
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            recompute_interval: DEFAULT_RECOMPUTE_INTERVAL,
            backend: BackendPreference::Auto,
            clear_color: [0, 0, 0, 255],
        }
    }
}
