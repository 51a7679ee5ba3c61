/// Drive the render loop with a source that changes size mid-stream
///
/// Shows the governor skipping passes between 50 ms windows and the output
/// surface following the source to its new size on the very next tick.
use dither_rendr::{
    BackendPreference, DitherEngine, DitherSettings, EngineConfig, FrameSource, TickOutcome,
};
use image::{Rgba, RgbaImage};

/// Synthetic camera that switches resolution at a fixed time
struct SwitchingSource {
    small: RgbaImage,
    large: RgbaImage,
    switch_at_ms: u64,
    current_large: bool,
}

impl SwitchingSource {
    fn new(switch_at_ms: u64) -> Self {
        Self {
            small: gradient(640, 360),
            large: gradient(1280, 720),
            switch_at_ms,
            current_large: false,
        }
    }
}

impl FrameSource for SwitchingSource {
    fn dimensions(&self) -> (u32, u32) {
        if self.current_large {
            self.large.dimensions()
        } else {
            self.small.dimensions()
        }
    }

    fn current_frame(&mut self, now_ms: u64) -> Option<&RgbaImage> {
        self.current_large = now_ms >= self.switch_at_ms;
        Some(if self.current_large {
            &self.large
        } else {
            &self.small
        })
    }
}

fn gradient(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        let gray = ((x + y) % 256) as u8;
        Rgba([gray, gray, gray, 255])
    })
}

fn main() {
    println!("Dither Renderer - Resize Demo");
    println!("=============================\n");

    let backend = if std::env::args().any(|a| a == "--software") {
        BackendPreference::SoftwareOnly
    } else {
        BackendPreference::Auto
    };
    let mut engine = DitherEngine::new(EngineConfig {
        backend,
        ..Default::default()
    });
    let settings = DitherSettings::default();
    let mut source = SwitchingSource::new(100);

    // Simulated 60 Hz host clock
    for frame in 0..12u64 {
        let now_ms = frame * 16;
        match engine.tick(&mut source, &settings, now_ms) {
            TickOutcome::Presented {
                recomputed,
                backend,
            } => {
                let (w, h) = source.dimensions();
                println!(
                    "t={:>4} ms  source {}x{}  {}  via {:?}",
                    now_ms,
                    w,
                    h,
                    if recomputed { "recomputed" } else { "reused    " },
                    backend
                );
            }
            other => println!("t={:>4} ms  {:?}", now_ms, other),
        }
    }

    if let Some(snapshot) = engine.snapshot() {
        println!("\nOutput surface: {}x{}", snapshot.width(), snapshot.height());
        snapshot
            .save("resize_demo_output.png")
            .expect("Failed to save output");
        println!("✓ Saved output to: resize_demo_output.png");
    }

    engine.release();
}
