//! Block-level error diffusion over a single RGBA frame

use crate::config::DitherSettings;
use crate::palette::denormalize;
use crate::patterns::{DiffusionKernel, DitherPattern};
use image::RgbaImage;

/// Result of one diffusion pass
#[derive(Debug, Clone)]
pub struct ProcessedFrame {
    /// Quantized pixels, or the untouched source when `dithered` is false
    pub image: RgbaImage,
    /// Whether a diffusion pass actually ran
    pub dithered: bool,
}

impl ProcessedFrame {
    /// Wrap a frame that was not dithered (throttled before the first pass, or a no-op)
    pub fn passthrough(image: RgbaImage) -> Self {
        Self {
            image,
            dithered: false,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

/// Accumulated per-pixel error, three channels wide.
///
/// Allocated fresh for every pass and dropped afterwards, so a resized source
/// can never see a buffer of the wrong size.
pub struct ErrorBuffer {
    width: u32,
    height: u32,
    data: Vec<f32>,
}

impl ErrorBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0.0; width as usize * height as usize * 3],
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * 3
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> [f32; 3] {
        let i = self.index(x, y);
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }

    /// Add `error * scale` at `(x, y)`; targets outside the frame are skipped
    #[inline]
    pub fn spread(&mut self, x: i64, y: i64, error: [f32; 3], scale: f32) {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return;
        }
        let i = self.index(x as u32, y as u32);
        self.data[i] += error[0] * scale;
        self.data[i + 1] += error[1] * scale;
        self.data[i + 2] += error[2] * scale;
    }
}

/// Contrast around mid-gray, then brightness, clamped to [0, 1]
#[inline]
fn apply_tone(channel: f32, contrast: f32, brightness: f32) -> f32 {
    (((channel - 0.5) * contrast + 0.5) * brightness).clamp(0.0, 1.0)
}

/// Dither `source` with the pattern named in `settings`
///
/// Block-level error diffusion:
/// 1. Sweep block origins in raster order with stride `pixelation`
/// 2. Sample one pixel near each block centre (clamped to the frame)
/// 3. Apply contrast/brightness and the accumulated error
/// 4. Quantize against the two-colour palette and fill the block
/// 5. Push the weighted error to not-yet-visited blocks
///
/// # Returns
/// The dithered frame. A zero-sized source is returned unchanged with
/// `dithered == false`.
pub fn process_frame(source: &RgbaImage, settings: &DitherSettings) -> ProcessedFrame {
    diffuse(source, settings, settings.pattern.kernel())
}

/// Like [`process_frame`], but with the pattern given by identifier.
///
/// An unknown identifier makes the pass a no-op rather than an error, so the
/// render loop always has something to display.
pub fn process_frame_named(
    source: &RgbaImage,
    settings: &DitherSettings,
    pattern: &str,
) -> ProcessedFrame {
    match pattern.parse::<DitherPattern>() {
        Ok(pattern) => diffuse(source, settings, pattern.kernel()),
        Err(e) => {
            log::warn!("skipping diffusion pass: {e}");
            ProcessedFrame::passthrough(source.clone())
        }
    }
}

fn diffuse(source: &RgbaImage, settings: &DitherSettings, kernel: &DiffusionKernel) -> ProcessedFrame {
    let (width, height) = source.dimensions();
    if width == 0 || height == 0 || source.as_raw().is_empty() {
        return ProcessedFrame::passthrough(source.clone());
    }

    let palette = settings.palette();
    let block = settings.block_size();
    let half = block / 2;
    let mut errors = ErrorBuffer::new(width, height);
    let mut output = source.clone();

    // Pre-scale the weights once. threshold is not clamped here
    let scales: Vec<f32> = kernel
        .offsets
        .iter()
        .map(|o| o.weight as f32 / kernel.divisor as f32 * settings.threshold)
        .collect();

    for y in (0..height).step_by(block as usize) {
        for x in (0..width).step_by(block as usize) {
            let sample_x = x.saturating_add(half).min(width - 1);
            let sample_y = y.saturating_add(half).min(height - 1);

            let px = source.get_pixel(sample_x, sample_y);
            let acc = errors.get(sample_x, sample_y);
            let mut adjusted = [0.0f32; 3];
            for c in 0..3 {
                let toned = apply_tone(px[c] as f32 / 255.0, settings.contrast, settings.brightness);
                adjusted[c] = (toned + acc[c]).clamp(0.0, 1.0);
            }

            let quantized = palette.nearest(adjusted);
            let rgb = denormalize(quantized);

            // Edge blocks are truncated, never wrapped
            let x_end = x.saturating_add(block).min(width);
            let y_end = y.saturating_add(block).min(height);
            for by in y..y_end {
                for bx in x..x_end {
                    let out = output.get_pixel_mut(bx, by);
                    out[0] = rgb[0];
                    out[1] = rgb[1];
                    out[2] = rgb[2];
                }
            }

            let error = [
                adjusted[0] - quantized[0],
                adjusted[1] - quantized[1],
                adjusted[2] - quantized[2],
            ];
            for (offset, scale) in kernel.offsets.iter().zip(&scales) {
                let tx = sample_x as i64 + offset.dx as i64 * block as i64;
                let ty = sample_y as i64 + offset.dy as i64 * block as i64;
                errors.spread(tx, ty, error, *scale);
            }
        }
    }

    ProcessedFrame {
        image: output,
        dithered: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::palette::normalize;
    use image::Rgba;

    fn mono(pattern: DitherPattern, pixelation: f32) -> DitherSettings {
        DitherSettings {
            pattern,
            color1: [0, 0, 0],
            color2: [255, 255, 255],
            pixelation,
            ..Default::default()
        }
    }

    fn gradient(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            let v = ((x * 255) / width.max(1)) as u8;
            Rgba([v, (y * 7 % 256) as u8, 255 - v, 255])
        })
    }

    #[test]
    fn test_zero_sized_source_is_noop() {
        let img = RgbaImage::new(0, 10);
        let out = process_frame(&img, &DitherSettings::default());
        assert!(!out.dithered);
        assert_eq!(out.dimensions(), (0, 10));
    }

    #[test]
    fn test_unknown_pattern_name_is_noop() {
        let img = gradient(8, 8);
        let out = process_frame_named(&img, &DitherSettings::default(), "bayer4");
        assert!(!out.dithered);
        assert_eq!(out.image, img);
    }

    #[test]
    fn test_named_pattern_matches_enum() {
        let img = gradient(24, 16);
        let settings = mono(DitherPattern::Stucki, 1.0);
        let a = process_frame_named(&img, &settings, "stucki");
        let b = process_frame(&img, &settings);
        assert!(a.dithered);
        assert_eq!(a.image, b.image);
    }

    #[test]
    fn test_output_only_uses_palette_colors() {
        let img = gradient(37, 23);
        for pattern in DitherPattern::ALL {
            let settings = DitherSettings {
                pattern,
                ..Default::default()
            };
            let out = process_frame(&img, &settings);
            for px in out.image.pixels() {
                let rgb = [px[0], px[1], px[2]];
                assert!(rgb == settings.color1 || rgb == settings.color2, "{pattern}: {rgb:?}");
            }
        }
    }

    #[test]
    fn test_alpha_is_preserved() {
        let img = RgbaImage::from_pixel(6, 6, Rgba([90, 90, 90, 33]));
        let out = process_frame(&img, &mono(DitherPattern::FloydSteinberg, 2.0));
        assert!(out.image.pixels().all(|p| p[3] == 33));
    }

    #[test]
    fn test_requantizing_output_is_stable() {
        let img = gradient(64, 48);
        for pattern in DitherPattern::ALL {
            let settings = DitherSettings {
                pattern,
                pixelation: 1.0,
                color1: [20, 40, 200],
                color2: [240, 200, 10],
                ..Default::default()
            };
            let palette = settings.palette();
            let out = process_frame(&img, &settings);
            for px in out.image.pixels() {
                let rgb = [px[0], px[1], px[2]];
                assert_eq!(denormalize(palette.nearest(normalize(rgb))), rgb);
            }
        }
    }

    #[test]
    fn test_uniform_color1_source_stays_color1() {
        let color1 = [0x05, 0x05, 0x05];
        let img = RgbaImage::from_pixel(40, 30, Rgba([color1[0], color1[1], color1[2], 255]));
        for threshold in [0.0, 1.0, 3.5] {
            let settings = DitherSettings {
                threshold,
                ..Default::default()
            };
            let out = process_frame(&img, &settings);
            assert!(out.image.pixels().all(|p| [p[0], p[1], p[2]] == color1));
        }
    }

    #[test]
    fn test_mid_gray_floyd_steinberg_is_balanced() {
        let img = RgbaImage::from_pixel(128, 128, Rgba([128, 128, 128, 255]));
        let out = process_frame(&img, &mono(DitherPattern::FloydSteinberg, 1.0));

        let white = out.image.pixels().filter(|p| p[0] == 255).count();
        let black = out.image.pixels().filter(|p| p[0] == 0).count();
        let total = (128 * 128) as f32;
        assert_eq!(white + black, 128 * 128);
        assert!(white > 0 && black > 0);
        assert!(((white as f32 / total) - 0.5).abs() < 0.1, "white ratio {}", white as f32 / total);
    }

    #[test]
    fn test_zero_threshold_disables_diffusion() {
        let img = RgbaImage::from_pixel(32, 32, Rgba([128, 128, 128, 255]));
        let settings = DitherSettings {
            threshold: 0.0,
            ..mono(DitherPattern::FloydSteinberg, 1.0)
        };
        let out = process_frame(&img, &settings);
        // 128/255 is just above the midpoint, every block quantizes to white
        assert!(out.image.pixels().all(|p| p[0] == 255));
    }

    #[test]
    fn test_threshold_is_not_clamped() {
        let img = RgbaImage::from_pixel(64, 64, Rgba([100, 100, 100, 255]));
        let normal = process_frame(&img, &mono(DitherPattern::FloydSteinberg, 1.0));
        let amplified = process_frame(
            &img,
            &DitherSettings {
                threshold: 8.0,
                ..mono(DitherPattern::FloydSteinberg, 1.0)
            },
        );
        assert!(amplified.dithered);
        assert_ne!(normal.image, amplified.image);
    }

    #[test]
    fn test_blocks_are_uniform() {
        let img = gradient(20, 20);
        let out = process_frame(&img, &mono(DitherPattern::Atkinson, 4.0));
        for by in (0..20).step_by(4) {
            for bx in (0..20).step_by(4) {
                let first = *out.image.get_pixel(bx, by);
                for y in by..by + 4 {
                    for x in bx..bx + 4 {
                        assert_eq!(*out.image.get_pixel(x, y), first);
                    }
                }
            }
        }
    }

    #[test]
    fn test_partial_edge_blocks_are_truncated() {
        // 10 is not a multiple of 4: the last column/row of blocks is 2px wide
        let img = gradient(10, 10);
        let out = process_frame(&img, &mono(DitherPattern::SierraLite, 4.0));
        assert_eq!(out.dimensions(), (10, 10));
        let corner = *out.image.get_pixel(8, 8);
        assert_eq!(*out.image.get_pixel(9, 9), corner);
    }

    #[test]
    fn test_pixelation_larger_than_frame() {
        let img = gradient(3, 2);
        let out = process_frame(&img, &mono(DitherPattern::Burkes, 50.0));
        let first = *out.image.get_pixel(0, 0);
        assert!(out.image.pixels().all(|p| *p == first));
    }

    #[test]
    fn test_error_buffer_skips_out_of_bounds() {
        let mut buf = ErrorBuffer::new(2, 2);
        buf.spread(-1, 0, [1.0; 3], 1.0);
        buf.spread(2, 1, [1.0; 3], 1.0);
        buf.spread(1, 1, [0.5, 0.25, 1.0], 2.0);
        assert_eq!(buf.get(0, 0), [0.0; 3]);
        assert_eq!(buf.get(1, 1), [1.0, 0.5, 2.0]);
        assert_eq!(buf.dimensions(), (2, 2));
    }
}
