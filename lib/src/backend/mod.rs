//! Presentation backends and the negotiation between them
//!
//! The accelerated path is probed once, off the render thread. Until the
//! probe answers, frames go to an interim software surface; afterwards the
//! negotiator holds exactly one [`PresentationBackend`] for its lifetime
//! (or until an accelerated failure demotes it to software).

#[cfg(feature = "gpu")]
pub mod accelerated;
pub mod software;

#[cfg(feature = "gpu")]
pub use accelerated::AcceleratedBackend;
pub use software::SoftwareSurface;

use crate::processor::ProcessedFrame;
use image::RgbaImage;
use std::mem;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::thread;
use std::time::Duration;

/// Which kind of backend presented a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Accelerated,
    Software,
}

/// Result of probing for the accelerated path
pub enum ProbeOutcome {
    #[cfg(feature = "gpu")]
    Accelerated(Box<AcceleratedBackend>),
    Unavailable(String),
}

impl std::fmt::Debug for ProbeOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            #[cfg(feature = "gpu")]
            ProbeOutcome::Accelerated(_) => f.write_str("Accelerated"),
            ProbeOutcome::Unavailable(reason) => write!(f, "Unavailable({reason})"),
        }
    }
}

/// Try to bring up the accelerated backend
#[cfg(feature = "gpu")]
pub fn probe_accelerated(clear_color: [u8; 4]) -> ProbeOutcome {
    match AcceleratedBackend::probe(clear_color) {
        Ok(backend) => ProbeOutcome::Accelerated(Box::new(backend)),
        Err(e) => ProbeOutcome::Unavailable(e.to_string()),
    }
}

/// Try to bring up the accelerated backend
#[cfg(not(feature = "gpu"))]
pub fn probe_accelerated(_clear_color: [u8; 4]) -> ProbeOutcome {
    ProbeOutcome::Unavailable("built without the `gpu` feature".to_string())
}

/// The backend chosen from a probe outcome
pub enum PresentationBackend {
    #[cfg(feature = "gpu")]
    Accelerated(Box<AcceleratedBackend>),
    Fallback(SoftwareSurface),
}

impl PresentationBackend {
    pub fn kind(&self) -> BackendKind {
        match self {
            #[cfg(feature = "gpu")]
            PresentationBackend::Accelerated(_) => BackendKind::Accelerated,
            PresentationBackend::Fallback(_) => BackendKind::Software,
        }
    }
}

enum Phase {
    Probing {
        pending: Receiver<ProbeOutcome>,
        interim: SoftwareSurface,
    },
    Ready(PresentationBackend),
    Released,
}

pub struct BackendNegotiator {
    phase: Phase,
    #[cfg_attr(not(feature = "gpu"), allow(dead_code))]
    clear_color: [u8; 4],
}

impl BackendNegotiator {
    /// Run `probe` on a background thread and present through software until it answers
    pub fn spawn<F>(probe: F, clear_color: [u8; 4]) -> Self
    where
        F: FnOnce() -> ProbeOutcome + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let spawned = thread::Builder::new()
            .name("dither-backend-probe".to_string())
            .spawn(move || {
                // The negotiator may be gone by now; the outcome then drops
                // here and releases whatever it acquired.
                if let Err(mpsc::SendError(outcome)) = tx.send(probe()) {
                    log::debug!("discarding late probe result: {outcome:?}");
                }
            });

        match spawned {
            Ok(_) => {
                log::debug!("accelerated backend probe started");
                Self {
                    phase: Phase::Probing {
                        pending: rx,
                        interim: SoftwareSurface::new(clear_color),
                    },
                    clear_color,
                }
            }
            Err(e) => {
                log::warn!("could not start backend probe, using software: {e}");
                Self::software(clear_color)
            }
        }
    }

    /// Skip probing entirely
    pub fn software(clear_color: [u8; 4]) -> Self {
        Self {
            phase: Phase::Ready(PresentationBackend::Fallback(SoftwareSurface::new(
                clear_color,
            ))),
            clear_color,
        }
    }

    /// Pick up the probe result if it has arrived. Returns true once settled.
    pub fn poll(&mut self) -> bool {
        let outcome = match &self.phase {
            Phase::Probing { pending, .. } => match pending.try_recv() {
                Ok(outcome) => Some(outcome),
                Err(TryRecvError::Empty) => return false,
                Err(TryRecvError::Disconnected) => None,
            },
            Phase::Ready(_) | Phase::Released => return true,
        };
        self.settle(outcome);
        true
    }

    /// Block up to `timeout` for the probe result
    pub fn wait(&mut self, timeout: Duration) -> bool {
        let outcome = match &self.phase {
            Phase::Probing { pending, .. } => match pending.recv_timeout(timeout) {
                Ok(outcome) => Some(outcome),
                Err(RecvTimeoutError::Timeout) => return false,
                Err(RecvTimeoutError::Disconnected) => None,
            },
            Phase::Ready(_) | Phase::Released => return true,
        };
        self.settle(outcome);
        true
    }

    /// `None` means the probe thread went away without answering
    fn settle(&mut self, outcome: Option<ProbeOutcome>) {
        let Phase::Probing { interim, .. } = mem::replace(&mut self.phase, Phase::Released) else {
            return;
        };

        let backend = match outcome {
            #[cfg(feature = "gpu")]
            Some(ProbeOutcome::Accelerated(mut backend)) => {
                let (width, height) = interim.dimensions();
                match backend.resize_output(width, height) {
                    Ok(()) => {
                        log::debug!("using accelerated presentation");
                        PresentationBackend::Accelerated(backend)
                    }
                    Err(e) => {
                        log::warn!("accelerated backend unusable, using software: {e}");
                        PresentationBackend::Fallback(interim)
                    }
                }
            }
            Some(ProbeOutcome::Unavailable(reason)) => {
                log::warn!("accelerated backend unavailable, using software: {reason}");
                PresentationBackend::Fallback(interim)
            }
            None => {
                log::warn!("backend probe ended without a result, using software");
                PresentationBackend::Fallback(interim)
            }
        };
        self.phase = Phase::Ready(backend);
    }

    pub fn is_probing(&self) -> bool {
        matches!(self.phase, Phase::Probing { .. })
    }

    /// `None` after release
    pub fn kind(&self) -> Option<BackendKind> {
        match &self.phase {
            Phase::Probing { .. } => Some(BackendKind::Software),
            Phase::Ready(backend) => Some(backend.kind()),
            Phase::Released => None,
        }
    }

    /// Replace the accelerated backend with a fresh software surface for good
    #[cfg(feature = "gpu")]
    fn demote_with<R>(&mut self, f: impl FnOnce(&mut SoftwareSurface) -> R) -> R {
        let mut surface = SoftwareSurface::new(self.clear_color);
        let result = f(&mut surface);
        self.phase = Phase::Ready(PresentationBackend::Fallback(surface));
        result
    }

    /// Size the output surface
    pub fn resize_output(&mut self, width: u32, height: u32) {
        match &mut self.phase {
            Phase::Probing { interim, .. } => interim.resize(width, height),
            Phase::Ready(PresentationBackend::Fallback(surface)) => surface.resize(width, height),
            #[cfg(feature = "gpu")]
            Phase::Ready(PresentationBackend::Accelerated(backend)) => {
                if let Err(e) = backend.resize_output(width, height) {
                    log::warn!("accelerated resize failed, switching to software: {e}");
                    self.demote_with(|s| s.resize(width, height));
                }
            }
            Phase::Released => {}
        }
    }

    /// Draw `frame` on the active surface. `None` once released.
    pub fn present(&mut self, frame: &ProcessedFrame) -> Option<BackendKind> {
        match &mut self.phase {
            Phase::Probing { interim, .. } => {
                interim.present(frame);
                Some(BackendKind::Software)
            }
            Phase::Ready(PresentationBackend::Fallback(surface)) => {
                surface.present(frame);
                Some(BackendKind::Software)
            }
            #[cfg(feature = "gpu")]
            Phase::Ready(PresentationBackend::Accelerated(backend)) => match backend.present(frame) {
                Ok(()) => Some(BackendKind::Accelerated),
                Err(e) => {
                    log::warn!("accelerated present failed, switching to software: {e}");
                    self.demote_with(|s| s.present(frame));
                    Some(BackendKind::Software)
                }
            },
            Phase::Released => None,
        }
    }

    /// Copy of whatever the active surface shows
    pub fn snapshot(&mut self) -> Option<RgbaImage> {
        match &mut self.phase {
            Phase::Probing { interim, .. } => Some(interim.canvas().clone()),
            Phase::Ready(PresentationBackend::Fallback(surface)) => Some(surface.canvas().clone()),
            #[cfg(feature = "gpu")]
            Phase::Ready(PresentationBackend::Accelerated(backend)) => match backend.read_output() {
                Ok(image) => image,
                Err(e) => {
                    log::warn!("accelerated readback failed: {e}");
                    None
                }
            },
            Phase::Released => None,
        }
    }

    /// Drop the active backend and any pending probe. Idempotent.
    pub fn release(&mut self) {
        if !matches!(self.phase, Phase::Released) {
            self.phase = Phase::Released;
            log::debug!("presentation backend released");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    const BLACK: [u8; 4] = [0, 0, 0, 255];

    fn frame(w: u32, h: u32) -> ProcessedFrame {
        ProcessedFrame::passthrough(RgbaImage::from_pixel(w, h, Rgba([200, 100, 50, 255])))
    }

    #[test]
    fn test_forced_probe_failure_falls_back() {
        let mut negotiator =
            BackendNegotiator::spawn(|| ProbeOutcome::Unavailable("forced".into()), BLACK);
        assert!(negotiator.wait(Duration::from_secs(5)));
        assert!(!negotiator.is_probing());
        assert_eq!(negotiator.kind(), Some(BackendKind::Software));
        assert_eq!(negotiator.present(&frame(4, 4)), Some(BackendKind::Software));
        assert_eq!(negotiator.snapshot().unwrap(), frame(4, 4).image);
    }

    #[test]
    fn test_presents_while_probe_pending() {
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let mut negotiator = BackendNegotiator::spawn(
            move || {
                let _ = release_rx.recv();
                ProbeOutcome::Unavailable("late".into())
            },
            BLACK,
        );
        assert!(!negotiator.poll());
        assert!(negotiator.is_probing());
        assert_eq!(negotiator.present(&frame(3, 2)), Some(BackendKind::Software));
        assert_eq!(negotiator.snapshot().unwrap().dimensions(), (3, 2));

        release_tx.send(()).unwrap();
        assert!(negotiator.wait(Duration::from_secs(5)));
        // The interim surface is kept, contents included
        assert_eq!(negotiator.snapshot().unwrap(), frame(3, 2).image);
    }

    #[test]
    fn test_panicking_probe_falls_back() {
        let mut negotiator = BackendNegotiator::spawn(|| panic!("probe crashed"), BLACK);
        assert!(negotiator.wait(Duration::from_secs(5)));
        assert_eq!(negotiator.kind(), Some(BackendKind::Software));
    }

    #[test]
    fn test_software_only_is_settled() {
        let mut negotiator = BackendNegotiator::software(BLACK);
        assert!(negotiator.poll());
        negotiator.resize_output(8, 8);
        assert_eq!(negotiator.snapshot().unwrap().dimensions(), (8, 8));
    }

    #[test]
    fn test_released_negotiator_presents_nothing() {
        let mut negotiator = BackendNegotiator::software(BLACK);
        negotiator.release();
        negotiator.release();
        assert_eq!(negotiator.kind(), None);
        assert_eq!(negotiator.present(&frame(2, 2)), None);
        assert!(negotiator.snapshot().is_none());
    }

    #[test]
    fn test_dropping_while_probing_is_fine() {
        let negotiator = BackendNegotiator::spawn(
            || {
                thread::sleep(Duration::from_millis(20));
                ProbeOutcome::Unavailable("after drop".into())
            },
            BLACK,
        );
        drop(negotiator);
    }

    #[cfg(not(feature = "gpu"))]
    #[test]
    fn test_probe_without_gpu_feature() {
        assert!(matches!(
            probe_accelerated(BLACK),
            ProbeOutcome::Unavailable(_)
        ));
    }
}
