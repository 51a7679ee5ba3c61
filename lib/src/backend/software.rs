use crate::processor::ProcessedFrame;
use image::{Rgba, RgbaImage};

/// CPU-side output surface: processed frames are copied straight into an
/// owned RGBA canvas, no GPU involved.
#[derive(Debug, Clone)]
pub struct SoftwareSurface {
    canvas: RgbaImage,
    clear_color: Rgba<u8>,
}

impl SoftwareSurface {
    pub fn new(clear_color: [u8; 4]) -> Self {
        Self {
            canvas: RgbaImage::new(0, 0),
            clear_color: Rgba(clear_color),
        }
    }

    /// Reallocate the canvas if the size changed. Contents are discarded.
    pub fn resize(&mut self, width: u32, height: u32) {
        if self.canvas.dimensions() != (width, height) {
            self.canvas = RgbaImage::from_pixel(width, height, self.clear_color);
        }
    }

    /// Resize to the frame if needed and replace the canvas with it.
    ///
    /// Pixels are copied as-is, alpha included, matching what the accelerated
    /// path writes with blending disabled.
    pub fn present(&mut self, frame: &ProcessedFrame) {
        let (width, height) = frame.dimensions();
        self.resize(width, height);
        self.canvas.copy_from_slice(frame.image.as_raw());
    }

    pub fn canvas(&self) -> &RgbaImage {
        &self.canvas
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.canvas.dimensions()
    }
}
