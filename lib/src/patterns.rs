//! Error diffusion kernels
//!
//! Each pattern spreads the quantization error of one block to the blocks that
//! the raster sweep has not reached yet. Offsets are in block units and are
//! scaled by the pixelation at diffusion time.

use crate::error::{DitherError, DitherResult};
use std::fmt;
use std::str::FromStr;

/// One error propagation target, relative to the current sample
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct KernelOffset {
    pub dx: i32,
    pub dy: i32,
    pub weight: u32,
}

/// Weighted neighbour offsets plus the divisor that normalizes the weights
#[derive(Debug, PartialEq, Eq)]
pub struct DiffusionKernel {
    pub offsets: &'static [KernelOffset],
    pub divisor: u32,
}

impl DiffusionKernel {
    /// Sum of all weights. Equal to `divisor` for every kernel except Atkinson.
    pub fn weight_sum(&self) -> u32 {
        self.offsets.iter().map(|o| o.weight).sum()
    }
}

const fn o(dx: i32, dy: i32, weight: u32) -> KernelOffset {
    KernelOffset { dx, dy, weight }
}

#[rustfmt::skip]
pub const FLOYD_STEINBERG: DiffusionKernel = DiffusionKernel {
    offsets: &[
                              o(1, 0, 7),
        o(-1, 1, 3), o(0, 1, 5), o(1, 1, 1),
    ],
    divisor: 16,
};

#[rustfmt::skip]
pub const JARVIS_JUDICE_NINKE: DiffusionKernel = DiffusionKernel {
    offsets: &[
                                          o(1, 0, 7), o(2, 0, 5),
        o(-2, 1, 3), o(-1, 1, 5), o(0, 1, 7), o(1, 1, 5), o(2, 1, 3),
        o(-2, 2, 1), o(-1, 2, 3), o(0, 2, 5), o(1, 2, 3), o(2, 2, 1),
    ],
    divisor: 48,
};

#[rustfmt::skip]
pub const STUCKI: DiffusionKernel = DiffusionKernel {
    offsets: &[
                                          o(1, 0, 8), o(2, 0, 4),
        o(-2, 1, 2), o(-1, 1, 4), o(0, 1, 8), o(1, 1, 4), o(2, 1, 2),
        o(-2, 2, 1), o(-1, 2, 2), o(0, 2, 4), o(1, 2, 2), o(2, 2, 1),
    ],
    divisor: 42,
};

/// Only 6/8 of the error is diffused; the remaining quarter is dropped.
#[rustfmt::skip]
pub const ATKINSON: DiffusionKernel = DiffusionKernel {
    offsets: &[
                              o(1, 0, 1), o(2, 0, 1),
        o(-1, 1, 1), o(0, 1, 1), o(1, 1, 1),
                     o(0, 2, 1),
    ],
    divisor: 8,
};

#[rustfmt::skip]
pub const BURKES: DiffusionKernel = DiffusionKernel {
    offsets: &[
                                          o(1, 0, 8), o(2, 0, 4),
        o(-2, 1, 2), o(-1, 1, 4), o(0, 1, 8), o(1, 1, 4), o(2, 1, 2),
    ],
    divisor: 32,
};

#[rustfmt::skip]
pub const SIERRA: DiffusionKernel = DiffusionKernel {
    offsets: &[
                                          o(1, 0, 5), o(2, 0, 3),
        o(-2, 1, 2), o(-1, 1, 4), o(0, 1, 5), o(1, 1, 4), o(2, 1, 2),
                     o(-1, 2, 2), o(0, 2, 3), o(1, 2, 2),
    ],
    divisor: 32,
};

#[rustfmt::skip]
pub const TWO_ROW_SIERRA: DiffusionKernel = DiffusionKernel {
    offsets: &[
                                          o(1, 0, 4), o(2, 0, 3),
        o(-2, 1, 1), o(-1, 1, 2), o(0, 1, 3), o(1, 1, 2), o(2, 1, 1),
    ],
    divisor: 16,
};

#[rustfmt::skip]
pub const SIERRA_LITE: DiffusionKernel = DiffusionKernel {
    offsets: &[
                     o(1, 0, 2),
        o(-1, 1, 1), o(0, 1, 1),
    ],
    divisor: 4,
};

/// Named error diffusion pattern
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum DitherPattern {
    #[default]
    FloydSteinberg,
    JarvisJudiceNinke,
    Stucki,
    Atkinson,
    Burkes,
    Sierra,
    TwoRowSierra,
    SierraLite,
}

impl DitherPattern {
    pub const ALL: [DitherPattern; 8] = [
        DitherPattern::FloydSteinberg,
        DitherPattern::JarvisJudiceNinke,
        DitherPattern::Stucki,
        DitherPattern::Atkinson,
        DitherPattern::Burkes,
        DitherPattern::Sierra,
        DitherPattern::TwoRowSierra,
        DitherPattern::SierraLite,
    ];

    pub fn kernel(self) -> &'static DiffusionKernel {
        match self {
            DitherPattern::FloydSteinberg => &FLOYD_STEINBERG,
            DitherPattern::JarvisJudiceNinke => &JARVIS_JUDICE_NINKE,
            DitherPattern::Stucki => &STUCKI,
            DitherPattern::Atkinson => &ATKINSON,
            DitherPattern::Burkes => &BURKES,
            DitherPattern::Sierra => &SIERRA,
            DitherPattern::TwoRowSierra => &TWO_ROW_SIERRA,
            DitherPattern::SierraLite => &SIERRA_LITE,
        }
    }

    /// Identifier used in settings overrides and logs
    pub fn id(self) -> &'static str {
        match self {
            DitherPattern::FloydSteinberg => "floydSteinberg",
            DitherPattern::JarvisJudiceNinke => "jarvisJudiceNinke",
            DitherPattern::Stucki => "stucki",
            DitherPattern::Atkinson => "atkinson",
            DitherPattern::Burkes => "burkes",
            DitherPattern::Sierra => "sierra",
            DitherPattern::TwoRowSierra => "twoRowSierra",
            DitherPattern::SierraLite => "sierraLite",
        }
    }

    /// Human readable name for UI
    pub fn label(self) -> &'static str {
        match self {
            DitherPattern::FloydSteinberg => "Floyd-Steinberg",
            DitherPattern::JarvisJudiceNinke => "Jarvis-Judice-Ninke",
            DitherPattern::Stucki => "Stucki",
            DitherPattern::Atkinson => "Atkinson",
            DitherPattern::Burkes => "Burkes",
            DitherPattern::Sierra => "Sierra",
            DitherPattern::TwoRowSierra => "Two-Row Sierra",
            DitherPattern::SierraLite => "Sierra Lite",
        }
    }
}

impl fmt::Display for DitherPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for DitherPattern {
    type Err = DitherError;

    /// Accepts `floydSteinberg`, `floyd_steinberg`, `floyd-steinberg`, any case.
    fn from_str(name: &str) -> DitherResult<Self> {
        let norm: String = name
            .trim()
            .chars()
            .filter(|c| *c != '_' && *c != '-' && *c != ' ')
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match norm.as_str() {
            "floydsteinberg" | "fs" => Ok(DitherPattern::FloydSteinberg),
            "jarvisjudiceninke" | "jjn" => Ok(DitherPattern::JarvisJudiceNinke),
            "stucki" => Ok(DitherPattern::Stucki),
            "atkinson" => Ok(DitherPattern::Atkinson),
            "burkes" => Ok(DitherPattern::Burkes),
            "sierra" | "sierra3" => Ok(DitherPattern::Sierra),
            "tworowsierra" | "sierra2" => Ok(DitherPattern::TwoRowSierra),
            "sierralite" | "sierra1" => Ok(DitherPattern::SierraLite),
            _ => Err(DitherError::unknown_pattern(name)),
        }
    }
}

/// Look up a kernel by pattern identifier
pub fn kernel_by_name(name: &str) -> DitherResult<&'static DiffusionKernel> {
    name.parse::<DitherPattern>().map(DitherPattern::kernel)
}
