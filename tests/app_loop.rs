use std::{cell::RefCell, rc::Rc, time::Duration};

use wavegrid::{
    Control, EncodeConfig, EncoderBackend, FrameRGBA, GridConfig, Recorder, RecordingState,
    Scheduler, VideoEncoder, VirtualTime, WaveGridApp, WaveGridError, WaveGridResult,
    recorder::ChunkSender,
};

#[derive(Default)]
struct Capture {
    frames: u64,
    distinct: Vec<Vec<u8>>,
    size: Option<(u32, u32)>,
}

/// Stores distinct frames and emits one byte per encoded frame.
struct MemoryBackend {
    capture: Rc<RefCell<Capture>>,
}

struct MemoryEncoder {
    capture: Rc<RefCell<Capture>>,
    tx: ChunkSender,
}

impl EncoderBackend for MemoryBackend {
    fn open(
        &self,
        cfg: &EncodeConfig,
        chunks: ChunkSender,
    ) -> WaveGridResult<Box<dyn VideoEncoder>> {
        self.capture.borrow_mut().size = Some((cfg.width, cfg.height));
        Ok(Box::new(MemoryEncoder {
            capture: self.capture.clone(),
            tx: chunks,
        }))
    }
}

impl VideoEncoder for MemoryEncoder {
    fn encode_frame(&mut self, frame: &FrameRGBA) -> WaveGridResult<()> {
        let mut cap = self.capture.borrow_mut();
        cap.frames += 1;
        if cap.distinct.last() != Some(&frame.data) {
            cap.distinct.push(frame.data.clone());
        }
        self.tx
            .send(vec![0x1A])
            .map_err(|e| WaveGridError::encode(e.to_string()))
    }

    fn finish(self: Box<Self>) -> WaveGridResult<()> {
        Ok(())
    }
}

struct Unsupported;

impl EncoderBackend for Unsupported {
    fn open(
        &self,
        _cfg: &EncodeConfig,
        _chunks: ChunkSender,
    ) -> WaveGridResult<Box<dyn VideoEncoder>> {
        Err(WaveGridError::capture_unsupported("stream capture missing"))
    }
}

fn small_grid() -> GridConfig {
    GridConfig {
        rows: 4,
        cols: 6,
        cell_size: 8.0,
        gap: 1.0,
        ..GridConfig::default()
    }
}

fn app_with(
    cfg: GridConfig,
    backend: Box<dyn EncoderBackend>,
) -> WaveGridApp<VirtualTime> {
    WaveGridApp::new(cfg, Scheduler::new(VirtualTime::new()), Recorder::new(backend))
}

fn memory_app(cfg: GridConfig) -> (WaveGridApp<VirtualTime>, Rc<RefCell<Capture>>) {
    let capture = Rc::new(RefCell::new(Capture::default()));
    let backend = MemoryBackend {
        capture: capture.clone(),
    };
    (app_with(cfg, Box::new(backend)), capture)
}

fn secs(v: f64) -> Duration {
    Duration::from_secs_f64(v)
}

#[test]
fn palette_advances_every_five_seconds_and_wraps() {
    let (mut app, _) = memory_app(small_grid());
    app.start();

    app.run_for(secs(14.9)).unwrap();
    assert_eq!(app.config().palette_index, 2);
    app.run_for(secs(0.1)).unwrap();
    assert_eq!(app.config().palette_index, 3);
    app.run_for(secs(5.0)).unwrap();
    assert_eq!(app.config().palette_index, 0);
}

#[test]
fn palette_keeps_cycling_while_paused() {
    let (mut app, _) = memory_app(small_grid());
    app.mount(1.0);
    app.start();
    app.apply(Control::ToggleRunning);
    assert!(!app.is_running());

    app.run_for(secs(10.0)).unwrap();
    assert_eq!(app.config().palette_index, 2);
    assert_eq!(app.clock().sim_time(), 0.0);
    assert!(app.frames_drawn() > 500);
}

#[test]
fn manual_palette_selection_does_not_reset_the_timer() {
    let (mut app, _) = memory_app(small_grid());
    app.start();
    app.run_for(secs(3.0)).unwrap();
    app.apply(Control::Palette(3));
    app.run_for(secs(2.0)).unwrap();
    assert_eq!(app.config().palette_index, 0);
}

#[test]
fn clock_follows_frame_timestamps() {
    let (mut app, _) = memory_app(small_grid());
    app.mount(1.0);
    app.start();
    app.run_for(secs(1.0)).unwrap();
    assert!((app.clock().sim_time() - 1.0).abs() < 0.02);
    assert!((59..=61).contains(&app.frames_drawn()));
}

#[test]
fn zero_speed_keeps_the_canvas_static() {
    let (mut app, _) = memory_app(small_grid());
    app.mount(1.0);
    app.apply(Control::Speed(0.0));
    app.start();

    app.run_for(secs(0.5)).unwrap();
    let a = app.snapshot().unwrap();
    app.run_for(secs(1.5)).unwrap();
    let b = app.snapshot().unwrap();
    assert_eq!(app.config().palette_index, 0);
    assert_eq!(a.data, b.data);
}

#[test]
fn recording_length_tracks_elapsed_time() {
    let (mut app, capture) = memory_app(small_grid());
    app.mount(1.0);
    app.start();
    app.run_for(secs(0.25)).unwrap();

    app.start_recording().unwrap();
    assert_eq!(app.recording_state(), RecordingState::Recording);
    app.run_for(secs(2.0)).unwrap();
    let video = app.stop_recording().unwrap().unwrap().clone();

    assert_eq!(app.recording_state(), RecordingState::Stopped);
    assert!(!video.is_empty());
    assert_eq!(video.len() as u64, video.frames);
    assert!((video.duration().as_secs_f64() - 2.0).abs() < 0.05);
    assert_eq!(capture.borrow().frames, video.frames);
    // 6*9+1 = 55 wide, 4*9+1 = 37 high, rounded up to even
    assert_eq!(capture.borrow().size, Some((56, 38)));
}

#[test]
fn paused_canvas_is_still_recorded() {
    let (mut app, capture) = memory_app(small_grid());
    app.mount(1.0);
    app.start();
    app.run_for(secs(0.1)).unwrap();
    app.apply(Control::ToggleRunning);

    app.start_recording().unwrap();
    app.run_for(secs(1.0)).unwrap();
    let video = app.stop_recording().unwrap().unwrap().clone();

    assert!(video.frames >= 60);
    assert_eq!(capture.borrow().distinct.len(), 1);
}

#[test]
fn download_uses_current_rows_and_cols() {
    let dir = tempfile::tempdir().unwrap();
    let (mut app, _) = memory_app(small_grid());
    assert!(app.download(dir.path()).unwrap().is_none());

    app.mount(1.0);
    app.start();
    app.start_recording().unwrap();
    app.run_for(secs(0.2)).unwrap();
    app.stop_recording().unwrap();

    let path = app.download(dir.path()).unwrap().unwrap();
    assert_eq!(path, dir.path().join("wave-grid-4x6.webm"));
    assert!(std::fs::metadata(&path).unwrap().len() > 0);
}

#[test]
fn resizing_mid_recording_keeps_capture_size() {
    let (mut app, capture) = memory_app(small_grid());
    app.mount(1.0);
    app.start();
    app.start_recording().unwrap();
    app.run_for(secs(0.2)).unwrap();
    app.apply(Control::Cols(12));
    app.run_for(secs(0.2)).unwrap();
    app.stop_recording().unwrap();

    assert_eq!(capture.borrow().size, Some((56, 38)));
    assert_eq!(app.surface().unwrap().layout().device_size(), (109, 37));
}

#[test]
fn unsupported_platform_shows_notice_and_stays_usable() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = app_with(small_grid(), Box::new(Unsupported));
    app.mount(1.0);
    app.start();

    assert!(app.start_recording().is_err());
    assert_eq!(app.recording_state(), RecordingState::Idle);
    assert_eq!(app.take_notices().len(), 1);

    app.run_for(secs(0.5)).unwrap();
    assert!(app.frames_drawn() > 0);
    assert!(app.stop_recording().unwrap().is_none());
    assert!(app.download(dir.path()).unwrap().is_none());
}
