use image::RgbaImage;
use rayon::prelude::*;

/// Source-side tone adjustments, applied to media before it reaches the engine
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MediaAdjustments {
    pub brightness: f32, // default 1.0
    pub contrast: f32,   // default 1.0
    pub saturation: f32, // default 1.0
}

impl Default for MediaAdjustments {
    fn default() -> Self {
        Self {
            brightness: 1.0,
            contrast: 1.0,
            saturation: 1.0,
        }
    }
}

impl MediaAdjustments {
    pub fn is_identity(&self) -> bool {
        *self == Self::default()
    }

    /// Adjust a single normalized colour: brightness, then contrast, then saturation
    pub fn adjust_color(&self, color: [f32; 3]) -> [f32; 3] {
        let mut c = color.map(|v| (v * self.brightness - 0.5) * self.contrast + 0.5);

        // Rec. 601 luma
        let gray = 0.299 * c[0] + 0.587 * c[1] + 0.114 * c[2];
        for v in &mut c {
            *v = (gray + (*v - gray) * self.saturation).clamp(0.0, 1.0);
        }
        c
    }

    /// Apply in place, row-parallel. Alpha is untouched.
    pub fn apply(&self, img: &mut RgbaImage) {
        if self.is_identity() {
            return;
        }
        let row_len = img.width() as usize * 4;
        if row_len == 0 {
            return;
        }

        img.par_chunks_mut(row_len).for_each(|row| {
            for px in row.chunks_exact_mut(4) {
                let c = self.adjust_color([
                    px[0] as f32 / 255.0,
                    px[1] as f32 / 255.0,
                    px[2] as f32 / 255.0,
                ]);
                px[0] = (c[0] * 255.0).round() as u8;
                px[1] = (c[1] * 255.0).round() as u8;
                px[2] = (c[2] * 255.0).round() as u8;
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_identity_leaves_pixels_alone() {
        let mut img = RgbaImage::from_pixel(4, 4, Rgba([12, 200, 99, 128]));
        MediaAdjustments::default().apply(&mut img);
        assert_eq!(img.get_pixel(3, 3), &Rgba([12, 200, 99, 128]));
    }

    #[test]
    fn test_zero_saturation_is_gray() {
        let adj = MediaAdjustments {
            saturation: 0.0,
            ..Default::default()
        };
        let c = adj.adjust_color([1.0, 0.0, 0.0]);
        assert!((c[0] - c[1]).abs() < 1e-6);
        assert!((c[1] - c[2]).abs() < 1e-6);
        assert!((c[0] - 0.299).abs() < 1e-4);
    }

    #[test]
    fn test_brightness_darkens_and_keeps_alpha() {
        let mut img = RgbaImage::from_pixel(3, 2, Rgba([200, 200, 200, 77]));
        let adj = MediaAdjustments {
            brightness: 0.5,
            ..Default::default()
        };
        adj.apply(&mut img);
        for px in img.pixels() {
            assert_eq!(px[0], 100);
            assert_eq!(px[3], 77);
        }
    }

    #[test]
    fn test_contrast_is_clamped() {
        let adj = MediaAdjustments {
            contrast: 10.0,
            ..Default::default()
        };
        let c = adj.adjust_color([0.9, 0.1, 0.5]);
        assert_eq!(c[0], 1.0);
        assert_eq!(c[1], 0.0);
        assert!((c[2] - 0.5).abs() < 1e-5);
    }
}
