use dither_rendr::{
    BackendKind, BackendPreference, DitherEngine, DitherSettings, EngineConfig, FrameSequence,
    FrameSource, ProbeOutcome, StillImage, TickOutcome,
};
use image::{Rgba, RgbaImage};
use std::thread;
use std::time::{Duration, Instant};

fn gradient(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, _| {
        let v = (x * 255 / width.max(2).saturating_sub(1)) as u8;
        Rgba([v, v, v, 255])
    })
}

fn software_config() -> EngineConfig {
    EngineConfig {
        backend: BackendPreference::SoftwareOnly,
        ..Default::default()
    }
}

/// Source whose frame can be swapped between ticks
struct SwappableSource {
    frame: Option<RgbaImage>,
}

impl FrameSource for SwappableSource {
    fn dimensions(&self) -> (u32, u32) {
        self.frame.as_ref().map_or((0, 0), |f| f.dimensions())
    }

    fn current_frame(&mut self, _now_ms: u64) -> Option<&RgbaImage> {
        self.frame.as_ref()
    }
}

fn presented(outcome: TickOutcome) -> (bool, BackendKind) {
    match outcome {
        TickOutcome::Presented {
            recomputed,
            backend,
        } => (recomputed, backend),
        other => panic!("expected a presented frame, got {other:?}"),
    }
}

#[test]
fn test_forced_probe_failure_keeps_rendering() {
    let mut engine = DitherEngine::with_probe(EngineConfig::default(), || {
        ProbeOutcome::Unavailable("forced failure".into())
    });
    let settings = DitherSettings::default();
    let mut source = StillImage::new(gradient(32, 8));

    let deadline = Instant::now() + Duration::from_secs(5);
    let mut now_ms = 0;
    while engine.is_negotiating() && Instant::now() < deadline {
        presented(engine.tick(&mut source, &settings, now_ms));
        now_ms += 16;
        thread::sleep(Duration::from_millis(1));
    }
    assert!(!engine.is_negotiating());
    assert_eq!(engine.backend_kind(), Some(BackendKind::Software));

    for _ in 0..5 {
        now_ms += 50;
        let (recomputed, backend) = presented(engine.tick(&mut source, &settings, now_ms));
        assert!(recomputed);
        assert_eq!(backend, BackendKind::Software);
    }
    assert_eq!(engine.snapshot().unwrap().dimensions(), (32, 8));
}

#[test]
fn test_resize_reallocates_on_next_tick() {
    let mut engine = DitherEngine::new(software_config());
    let settings = DitherSettings::default();
    let mut source = SwappableSource {
        frame: Some(gradient(640, 4)),
    };

    presented(engine.tick(&mut source, &settings, 0));
    assert_eq!(engine.current_frame().unwrap().dimensions(), (640, 4));

    // Well inside the governor window, yet the new size must be processed now
    source.frame = Some(gradient(1280, 4));
    let (recomputed, _) = presented(engine.tick(&mut source, &settings, 10));
    assert!(recomputed);
    assert_eq!(engine.current_frame().unwrap().dimensions(), (1280, 4));
    assert_eq!(engine.snapshot().unwrap().dimensions(), (1280, 4));
}

#[test]
fn test_throttled_ticks_show_last_pass() {
    let mut engine = DitherEngine::new(software_config());
    let mut settings = DitherSettings {
        color1: [0, 0, 0],
        color2: [255, 255, 255],
        ..Default::default()
    };
    let mut source = StillImage::new(gradient(64, 4));

    presented(engine.tick(&mut source, &settings, 0));
    let first = engine.snapshot().unwrap();

    // New settings are picked up by the next pass, not before
    settings.color2 = [255, 0, 0];
    let (recomputed, _) = presented(engine.tick(&mut source, &settings, 30));
    assert!(!recomputed);
    assert_eq!(engine.snapshot().unwrap(), first);

    let (recomputed, _) = presented(engine.tick(&mut source, &settings, 60));
    assert!(recomputed);
    assert!(
        engine
            .snapshot()
            .unwrap()
            .pixels()
            .any(|p| *p == Rgba([255, 0, 0, 255]))
    );
}

#[test]
fn test_pending_source_presents_nothing() {
    let mut engine = DitherEngine::new(software_config());
    let settings = DitherSettings::default();
    let mut source = SwappableSource { frame: None };

    assert_eq!(
        engine.tick(&mut source, &settings, 0),
        TickOutcome::SourcePending
    );
    assert!(engine.current_frame().is_none());

    source.frame = Some(gradient(8, 8));
    let (recomputed, _) = presented(engine.tick(&mut source, &settings, 5));
    assert!(recomputed);
}

#[test]
fn test_empty_sequence_is_pending() {
    let mut engine = DitherEngine::new(software_config());
    let mut source = FrameSequence::new(Vec::new());
    assert_eq!(
        engine.tick(&mut source, &DitherSettings::default(), 0),
        TickOutcome::SourcePending
    );
}

#[test]
fn test_sequence_frame_change_recomputes_at_new_size() {
    let mut engine = DitherEngine::new(software_config());
    let settings = DitherSettings::default();
    let mut source = FrameSequence::new(vec![
        (gradient(16, 4), Duration::from_millis(40)),
        (gradient(32, 4), Duration::from_millis(40)),
    ]);

    presented(engine.tick(&mut source, &settings, 0));
    assert_eq!(engine.snapshot().unwrap().dimensions(), (16, 4));
    let (recomputed, _) = presented(engine.tick(&mut source, &settings, 45));
    assert!(recomputed);
    assert_eq!(engine.snapshot().unwrap().dimensions(), (32, 4));
}

#[test]
fn test_engines_are_independent() {
    let mut a = DitherEngine::new(software_config());
    let mut b = DitherEngine::new(software_config());
    let settings = DitherSettings::default();
    let mut source = StillImage::new(gradient(8, 8));

    presented(a.tick(&mut source, &settings, 0));
    // b has never run, so its governor is still open
    let (recomputed, _) = presented(b.tick(&mut source, &settings, 1));
    assert!(recomputed);
    a.release();
    presented(b.tick(&mut source, &settings, 100));
}

#[cfg(feature = "gpu")]
#[test]
fn test_auto_backend_presents_either_way() {
    let mut engine = DitherEngine::new(EngineConfig::default());
    let settings = DitherSettings::default();
    let mut source = StillImage::new(gradient(64, 16));

    let deadline = Instant::now() + Duration::from_secs(20);
    let mut now_ms = 0;
    while engine.is_negotiating() && Instant::now() < deadline {
        presented(engine.tick(&mut source, &settings, now_ms));
        now_ms += 16;
        thread::sleep(Duration::from_millis(5));
    }

    now_ms += 50;
    let (recomputed, backend) = presented(engine.tick(&mut source, &settings, now_ms));
    assert!(recomputed);
    eprintln!("presented via {backend:?}");
    assert_eq!(engine.snapshot().unwrap().dimensions(), (64, 16));
}
