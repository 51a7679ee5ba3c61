mod app;

use app::DitherApp;
use dither_rendr::{DitherSettings, process_frame};
use eframe::egui;
use image::{Rgba, RgbaImage};

fn main() -> Result<(), eframe::Error> {
    // RUST_LOG=dither_rendr=debug shows backend negotiation
    env_logger::init();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 720.0])
            .with_min_inner_size([800.0, 600.0])
            .with_title("Dither Renderer")
            .with_icon(load_icon()),
        ..Default::default()
    };

    eframe::run_native(
        "Dither Renderer",
        options,
        Box::new(|cc| Ok(Box::new(DitherApp::new(cc)))),
    )
}

/// Application icon: a diagonal gradient run through the default dither
fn load_icon() -> egui::IconData {
    let size = 32;
    let gradient = RgbaImage::from_fn(size, size, |x, y| {
        let v = ((x + y) * 255 / (2 * (size - 1))) as u8;
        Rgba([v, v, v, 255])
    });
    let icon = process_frame(&gradient, &DitherSettings::default());

    egui::IconData {
        rgba: icon.image.into_raw(),
        width: size,
        height: size,
    }
}
