use dither_rendr::palette::to_hex_color;
use dither_rendr::{
    BackendKind, DitherEngine, DitherPattern, DitherSettings, EngineConfig, FrameSequence,
    FrameSource, MediaAdjustments, StillImage, TickOutcome,
};
use eframe::egui;
use image::RgbaImage;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Whatever the user opened
enum Media {
    Still(StillImage),
    Sequence(FrameSequence),
}

impl Media {
    fn open(path: &Path, adjustments: &MediaAdjustments) -> dither_rendr::DitherResult<Self> {
        let is_gif = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("gif"));

        if is_gif {
            let sequence = FrameSequence::open_gif(path, adjustments)?;
            // A single-frame GIF behaves like any other still
            if sequence.len() > 1 {
                return Ok(Media::Sequence(sequence));
            }
        }
        StillImage::open(path, adjustments).map(Media::Still)
    }

    fn source(&mut self) -> &mut dyn FrameSource {
        match self {
            Media::Still(still) => still,
            Media::Sequence(sequence) => sequence,
        }
    }
}

/// Main application state for the dither renderer GUI
pub struct DitherApp {
    engine: DitherEngine,
    settings: DitherSettings,
    adjustments: MediaAdjustments,

    media: Option<Media>,
    /// Path of the open media, kept so adjustments can be re-applied
    media_path: Option<PathBuf>,
    /// Adjustments changed since the media was decoded
    adjustments_dirty: bool,

    /// Texture showing the engine output
    output_texture: Option<egui::TextureHandle>,
    output_size: (u32, u32),

    /// Wall time of the last diffusion pass
    last_pass: Option<Instant>,
    passes_per_second: f32,

    /// Error message to display (if any)
    error_message: Option<String>,
}

impl DitherApp {
    pub fn new(_cc: &eframe::CreationContext<'_>) -> Self {
        Self {
            engine: DitherEngine::new(EngineConfig::default()),
            settings: DitherSettings::default(),
            adjustments: MediaAdjustments::default(),
            media: None,
            media_path: None,
            adjustments_dirty: false,
            output_texture: None,
            output_size: (0, 0),
            last_pass: None,
            passes_per_second: 0.0,
            error_message: None,
        }
    }

    /// Load a still image or GIF from file path
    pub fn load_media(&mut self, path: &Path) {
        let (loop_playback, playback_speed) = match &self.media {
            Some(Media::Sequence(seq)) => (seq.loop_playback, seq.playback_speed),
            _ => (true, 1.0),
        };

        match Media::open(path, &self.adjustments) {
            Ok(mut media) => {
                if let Media::Sequence(seq) = &mut media {
                    seq.loop_playback = loop_playback;
                    seq.playback_speed = playback_speed;
                }
                log::info!("opened {}", path.display());
                self.media = Some(media);
                self.media_path = Some(path.to_path_buf());
                self.adjustments_dirty = false;
                self.output_texture = None;
                self.error_message = None;
            }
            Err(e) => {
                self.error_message = Some(format!("Failed to load media: {e}"));
            }
        }
    }

    fn reapply_adjustments(&mut self) {
        if let Some(path) = self.media_path.clone() {
            self.load_media(&path);
        }
    }

    /// Save what the output surface currently shows
    pub fn save_output(&mut self, path: &Path) -> Result<(), String> {
        match self.engine.snapshot() {
            Some(img) if img.width() > 0 && img.height() > 0 => {
                img.save(path).map_err(|e| format!("Failed to save: {e}"))
            }
            _ => Err("No output image to save".to_string()),
        }
    }

    fn color_picker(ui: &mut egui::Ui, color: &mut [u8; 3], label: &str) {
        ui.horizontal(|ui| {
            ui.color_edit_button_srgb(color);
            ui.label(format!("{label} {}", to_hex_color(*color)));
        });
    }

    /// Render the control panel UI
    fn render_controls(&mut self, ui: &mut egui::Ui) {
        ui.heading("Controls");
        ui.separator();

        ui.collapsing("Dither", |ui| {
            egui::ComboBox::from_label("Pattern")
                .selected_text(self.settings.pattern.label())
                .show_ui(ui, |ui| {
                    for pattern in DitherPattern::ALL {
                        ui.selectable_value(&mut self.settings.pattern, pattern, pattern.label());
                    }
                });

            ui.add(egui::Slider::new(&mut self.settings.pixelation, 1.0..=32.0).text("Pixelation"))
                .on_hover_text("Block size in source pixels");

            ui.add(egui::Slider::new(&mut self.settings.threshold, 0.0..=2.0).text("Threshold"))
                .on_hover_text("Multiplier on the diffused error; above 1 amplifies it");

            ui.add(egui::Slider::new(&mut self.settings.contrast, 0.0..=3.0).text("Contrast"));
            ui.add(egui::Slider::new(&mut self.settings.brightness, 0.0..=3.0).text("Brightness"));

            if ui.button("Reset").clicked() {
                self.settings = DitherSettings::default();
            }
        });

        ui.add_space(8.0);

        ui.collapsing("Palette", |ui| {
            Self::color_picker(ui, &mut self.settings.color1, "Dark");
            Self::color_picker(ui, &mut self.settings.color2, "Light");

            if ui.button("Swap").clicked() {
                std::mem::swap(&mut self.settings.color1, &mut self.settings.color2);
            }
        });

        ui.add_space(8.0);

        ui.collapsing("Media Adjustments", |ui| {
            let mut changed = false;
            changed |= ui
                .add(egui::Slider::new(&mut self.adjustments.brightness, 0.0..=3.0).text("Brightness"))
                .changed();
            changed |= ui
                .add(egui::Slider::new(&mut self.adjustments.contrast, 0.0..=3.0).text("Contrast"))
                .changed();
            changed |= ui
                .add(egui::Slider::new(&mut self.adjustments.saturation, 0.0..=3.0).text("Saturation"))
                .changed();
            self.adjustments_dirty |= changed;

            ui.add_enabled_ui(self.adjustments_dirty && self.media_path.is_some(), |ui| {
                if ui
                    .button("Apply")
                    .on_hover_text("Re-decode the media with these adjustments")
                    .clicked()
                {
                    self.reapply_adjustments();
                }
            });
        });

        if let Some(Media::Sequence(seq)) = &mut self.media {
            ui.add_space(8.0);
            ui.collapsing("Playback", |ui| {
                ui.checkbox(&mut seq.loop_playback, "Loop");
                ui.add(egui::Slider::new(&mut seq.playback_speed, 0.1..=4.0).text("Speed"));
                if ui.button("Restart").clicked() {
                    seq.rewind();
                }
                ui.label(format!(
                    "{} frames, {:.1} s",
                    seq.len(),
                    seq.duration().as_secs_f32()
                ));
            });
        }

        ui.add_space(16.0);
        ui.separator();

        let backend = match self.engine.backend_kind() {
            Some(BackendKind::Accelerated) => "GPU",
            Some(BackendKind::Software) if self.engine.is_negotiating() => "Software (probing GPU)",
            Some(BackendKind::Software) => "Software",
            None => "Released",
        };
        ui.label(format!("Backend: {backend}"));
        if self.passes_per_second > 0.0 {
            ui.label(format!("Passes: {:.1}/s", self.passes_per_second));
        }
    }

    /// Convert RgbaImage to egui ColorImage
    fn rgba_to_color_image(img: &RgbaImage) -> egui::ColorImage {
        let (width, height) = img.dimensions();
        let pixels = img
            .pixels()
            .map(|p| egui::Color32::from_rgba_unmultiplied(p[0], p[1], p[2], p[3]))
            .collect();

        egui::ColorImage {
            size: [width as usize, height as usize],
            source_size: egui::Vec2::new(width as f32, height as f32),
            pixels,
        }
    }

    /// Run one engine tick and refresh the texture when a new pass ran
    fn advance(&mut self, ctx: &egui::Context) {
        let Some(media) = self.media.as_mut() else {
            return;
        };

        match self.engine.tick_now(media.source(), &self.settings) {
            TickOutcome::Presented { recomputed, .. } => {
                if recomputed {
                    let now = Instant::now();
                    if let Some(last) = self.last_pass {
                        let dt = now.duration_since(last).as_secs_f32();
                        if dt > 0.0 {
                            self.passes_per_second = 0.9 * self.passes_per_second + 0.1 / dt;
                        }
                    }
                    self.last_pass = Some(now);
                }
                if (recomputed || self.output_texture.is_none())
                    && let Some(img) = self.engine.snapshot()
                {
                    self.output_size = img.dimensions();
                    let color_image = Self::rgba_to_color_image(&img);
                    match &mut self.output_texture {
                        Some(tex) => tex.set(color_image, egui::TextureOptions::NEAREST),
                        None => {
                            self.output_texture = Some(ctx.load_texture(
                                "dither_output",
                                color_image,
                                egui::TextureOptions::NEAREST,
                            ))
                        }
                    }
                }
            }
            TickOutcome::SourcePending => {}
            TickOutcome::Released => {
                self.error_message = Some("Renderer released".to_string());
            }
        }

        ctx.request_repaint();
    }

    fn display_output(&self, ui: &mut egui::Ui) {
        let Some(tex) = &self.output_texture else {
            ui.centered_and_justified(|ui| {
                ui.label("Open an image or GIF (File > Open...)");
            });
            return;
        };

        let size = tex.size_vec2();
        let max_size = ui.available_size();
        // Allow upscaling for small images, but limit to reasonable max scale
        let scale = ((max_size.x / size.x).min(max_size.y / size.y)).min(4.0);

        ui.vertical_centered(|ui| {
            ui.image((tex.id(), size * scale));
            ui.label(format!(
                "{}x{} (scale: {:.1}x)",
                self.output_size.0, self.output_size.1, scale
            ));
        });
    }
}

impl eframe::App for DitherApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
            egui::MenuBar::new().ui(ui, |ui| {
                ui.menu_button("File", |ui| {
                    if ui.button("Open...").clicked() {
                        if let Some(path) = rfd::FileDialog::new()
                            .add_filter("Media", &["png", "jpg", "jpeg", "bmp", "webp", "gif"])
                            .pick_file()
                        {
                            self.load_media(&path);
                        }
                        ui.close();
                    }

                    if ui.button("Save Output...").clicked() {
                        if let Some(path) = rfd::FileDialog::new()
                            .add_filter("PNG", &["png"])
                            .save_file()
                            && let Err(e) = self.save_output(&path)
                        {
                            self.error_message = Some(e);
                        }
                        ui.close();
                    }

                    ui.separator();

                    if ui.button("Quit").clicked() {
                        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                    }
                });
            });
        });

        egui::SidePanel::left("control_panel")
            .resizable(true)
            .default_width(260.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| {
                    self.render_controls(ui);
                });
            });

        self.advance(ctx);

        egui::CentralPanel::default().show(ctx, |ui| {
            if let Some(ref msg) = self.error_message {
                ui.colored_label(egui::Color32::RED, msg);
                if ui.button("Clear Error").clicked() {
                    self.error_message = None;
                }
                ui.separator();
            }

            self.display_output(ui);
        });
    }
}
