use crate::backend::{BackendKind, BackendNegotiator, ProbeOutcome, probe_accelerated};
use crate::config::{BackendPreference, DitherSettings, EngineConfig};
use crate::governor::FrameRateGovernor;
use crate::processor::{ProcessedFrame, process_frame};
use crate::source::FrameSource;
use image::RgbaImage;
use std::time::Instant;

/// What one [`DitherEngine::tick`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The source had no frame yet; nothing was processed or presented
    SourcePending,
    Presented {
        /// A fresh diffusion pass ran on this tick
        recomputed: bool,
        backend: BackendKind,
    },
    /// The engine's backend has been released
    Released,
}

/// Per-instance render loop state.
///
/// Owns the governor, the last processed frame and the presentation
/// backend. Nothing is shared between instances.
pub struct DitherEngine {
    config: EngineConfig,
    governor: FrameRateGovernor,
    current: Option<ProcessedFrame>,
    source_size: Option<(u32, u32)>,
    negotiator: BackendNegotiator,
    clock: Instant,
}

impl DitherEngine {
    /// Create an engine. With [`BackendPreference::Auto`] the accelerated
    /// backend is probed in the background.
    pub fn new(config: EngineConfig) -> Self {
        let clear = config.clear_color;
        let negotiator = match config.backend {
            BackendPreference::Auto => {
                BackendNegotiator::spawn(move || probe_accelerated(clear), clear)
            }
            BackendPreference::SoftwareOnly => BackendNegotiator::software(clear),
        };
        Self::with_negotiator(config, negotiator)
    }

    /// Create an engine whose backend probe is `probe` instead of the real one
    pub fn with_probe<F>(config: EngineConfig, probe: F) -> Self
    where
        F: FnOnce() -> ProbeOutcome + Send + 'static,
    {
        let negotiator = BackendNegotiator::spawn(probe, config.clear_color);
        Self::with_negotiator(config, negotiator)
    }

    fn with_negotiator(config: EngineConfig, negotiator: BackendNegotiator) -> Self {
        Self {
            governor: FrameRateGovernor::new(config.recompute_interval),
            config,
            current: None,
            source_size: None,
            negotiator,
            clock: Instant::now(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Advance the render loop once at host time `now_ms`
    pub fn tick(
        &mut self,
        source: &mut dyn FrameSource,
        settings: &DitherSettings,
        now_ms: u64,
    ) -> TickOutcome {
        if self.negotiator.kind().is_none() {
            return TickOutcome::Released;
        }

        let Some(frame) = source.current_frame(now_ms) else {
            return TickOutcome::SourcePending;
        };
        let size = frame.dimensions();

        if self.source_size != Some(size) {
            if let Some((w, h)) = self.source_size {
                log::debug!("source resized from {w}x{h} to {}x{}", size.0, size.1);
            }
            self.source_size = Some(size);
            self.current = None;
            self.governor.reset();
        }
        self.negotiator.resize_output(size.0, size.1);

        let recomputed = self.governor.should_recompute(now_ms);
        if recomputed {
            self.current = Some(Self::run_pass(frame, settings));
        }

        self.negotiator.poll();
        let presented = match &self.current {
            Some(processed) => self.negotiator.present(processed),
            None => self
                .negotiator
                .present(&ProcessedFrame::passthrough(frame.clone())),
        };

        match presented {
            Some(backend) => TickOutcome::Presented {
                recomputed,
                backend,
            },
            None => TickOutcome::Released,
        }
    }

    fn run_pass(frame: &RgbaImage, settings: &DitherSettings) -> ProcessedFrame {
        match settings.validate() {
            Ok(()) => process_frame(frame, settings),
            Err(e) => {
                log::debug!("presenting source unprocessed: {e}");
                ProcessedFrame::passthrough(frame.clone())
            }
        }
    }

    /// [`tick`](Self::tick) against the engine's own monotonic clock
    pub fn tick_now(
        &mut self,
        source: &mut dyn FrameSource,
        settings: &DitherSettings,
    ) -> TickOutcome {
        let now_ms = self.clock.elapsed().as_millis().min(u64::MAX as u128) as u64;
        self.tick(source, settings, now_ms)
    }

    /// Last processed frame, if a pass has run since the last resize
    pub fn current_frame(&self) -> Option<&ProcessedFrame> {
        self.current.as_ref()
    }

    /// Read back what the output surface currently shows
    pub fn snapshot(&mut self) -> Option<RgbaImage> {
        self.negotiator.snapshot()
    }

    /// `None` once released
    pub fn backend_kind(&self) -> Option<BackendKind> {
        self.negotiator.kind()
    }

    pub fn is_negotiating(&self) -> bool {
        self.negotiator.is_probing()
    }

    /// Release every backend resource. No rendering can happen afterwards.
    pub fn release(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.current = None;
        self.negotiator.release();
    }
}

impl Drop for DitherEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}
