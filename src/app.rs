use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{
    canvas::{CanvasLayout, Surface},
    clock::AnimationClock,
    config::{Control, GridConfig},
    error::WaveGridResult,
    palette::PALETTE_CYCLE_PERIOD,
    recorder::{RecordedVideo, Recorder, RecordingState},
    render::{DrawStats, FrameRGBA, GridRenderer},
    scheduler::{FrameHandle, IntervalHandle, Scheduler, Tick, TimeSource},
};

/// Owns every piece of mutable state and reacts to scheduler ticks.
///
/// Lifecycle: `mount` attaches a drawing surface, `start` registers the frame
/// loop and the palette timer, `shutdown` (or drop) cancels both. Frames
/// arriving while no surface is mounted are skipped.
pub struct WaveGridApp<T: TimeSource> {
    config: GridConfig,
    clock: AnimationClock,
    dpr: f64,
    surface: Option<Surface>,
    renderer: GridRenderer,
    recorder: Recorder,
    scheduler: Scheduler<T>,
    frame_request: Option<FrameHandle>,
    palette_timer: Option<IntervalHandle>,
    notices: Vec<String>,
    frames_drawn: u64,
    last_stats: DrawStats,
}

impl<T: TimeSource> WaveGridApp<T> {
    pub fn new(config: GridConfig, scheduler: Scheduler<T>, recorder: Recorder) -> Self {
        let mut config = config;
        config.palette_index = crate::palette::wrap_index(config.palette_index);
        Self {
            config,
            clock: AnimationClock::new(),
            dpr: 1.0,
            surface: None,
            renderer: GridRenderer::new(),
            recorder,
            scheduler,
            frame_request: None,
            palette_timer: None,
            notices: Vec::new(),
            frames_drawn: 0,
            last_stats: DrawStats::default(),
        }
    }

    pub fn mount(&mut self, dpr: f64) {
        let layout = CanvasLayout::new(&self.config, dpr);
        self.dpr = layout.dpr;
        tracing::debug!(
            width = layout.device_width,
            height = layout.device_height,
            dpr = layout.dpr,
            "surface mounted"
        );
        self.surface = Some(Surface::new(layout));
    }

    pub fn unmount(&mut self) {
        self.surface = None;
    }

    pub fn start(&mut self) {
        if self.frame_request.is_none() {
            self.clock.reset_reference(self.scheduler.now());
            self.frame_request = Some(self.scheduler.request_frame());
        }
        if self.palette_timer.is_none() {
            self.palette_timer = Some(self.scheduler.set_interval(PALETTE_CYCLE_PERIOD));
        }
    }

    pub fn shutdown(&mut self) {
        if let Some(handle) = self.frame_request.take() {
            self.scheduler.cancel_frame(handle);
        }
        if let Some(handle) = self.palette_timer.take() {
            self.scheduler.clear_interval(handle);
        }
    }

    pub fn is_started(&self) -> bool {
        self.frame_request.is_some()
    }

    pub fn apply(&mut self, control: Control) {
        if control == Control::ToggleRunning {
            let running = self.clock.toggle();
            tracing::debug!(running, "animation toggled");
            return;
        }
        if self.config.apply(control) {
            self.resize();
        }
        tracing::debug!(?control, "control applied");
    }

    fn resize(&mut self) {
        let layout = CanvasLayout::new(&self.config, self.dpr);
        if let Some(surface) = self.surface.as_mut() {
            tracing::debug!(
                width = layout.device_width,
                height = layout.device_height,
                "surface resized"
            );
            surface.resize(layout);
        }
    }

    /// Waits for and handles the next scheduler tick. `None` once nothing is
    /// scheduled.
    pub fn step(&mut self) -> WaveGridResult<Option<Tick>> {
        let Some(tick) = self.scheduler.next_tick() else {
            return Ok(None);
        };
        match tick {
            Tick::Frame { handle, timestamp } if self.frame_request == Some(handle) => {
                self.on_frame(timestamp)?;
            }
            Tick::Interval { handle, .. } if self.palette_timer == Some(handle) => {
                self.config.advance_palette();
                tracing::debug!(palette = self.config.palette().name, "palette advanced");
            }
            _ => {}
        }
        Ok(Some(tick))
    }

    pub fn run_for(&mut self, duration: Duration) -> WaveGridResult<()> {
        let deadline = self.scheduler.now() + duration;
        self.run_until(deadline)
    }

    pub fn run_until(&mut self, deadline: Duration) -> WaveGridResult<()> {
        while self
            .scheduler
            .next_deadline()
            .is_some_and(|next| next <= deadline)
        {
            self.step()?;
        }
        self.scheduler.time().sleep_until(deadline);
        Ok(())
    }

    fn on_frame(&mut self, timestamp: Duration) -> WaveGridResult<()> {
        self.frame_request = Some(self.scheduler.request_frame());
        self.clock.advance(timestamp);

        let Some(surface) = self.surface.as_mut() else {
            tracing::trace!("no surface mounted, frame skipped");
            return Ok(());
        };
        self.last_stats = self
            .renderer
            .draw(surface, &self.config, self.clock.wave_time())?;
        self.frames_drawn += 1;

        if self.recorder.is_recording() {
            let frame = self.renderer.read_frame(surface);
            if let Err(err) = self.recorder.capture(&frame, timestamp) {
                self.notices.push(format!("Recording stopped: {err}"));
            }
        }
        Ok(())
    }

    /// Starts capturing the canvas. Without a mounted surface this does
    /// nothing. An unsupported platform leaves a notice and returns the error;
    /// the app keeps running either way.
    pub fn start_recording(&mut self) -> WaveGridResult<()> {
        let Some(surface) = self.surface.as_ref() else {
            tracing::debug!("no surface mounted, recording not started");
            return Ok(());
        };
        let size = surface.layout().device_size();
        let now = self.scheduler.now();
        if let Err(err) = self.recorder.start(size, now) {
            if err.is_capture_unsupported() {
                tracing::warn!(error = %err, "recording not supported");
                self.notices
                    .push(format!("Recording not supported on this platform: {err}"));
            } else {
                self.notices.push(format!("Recording failed to start: {err}"));
            }
            return Err(err);
        }
        Ok(())
    }

    /// Finalizes the recording. A failed finalize leaves a notice and
    /// nothing to download.
    pub fn stop_recording(&mut self) -> WaveGridResult<Option<&RecordedVideo>> {
        let now = self.scheduler.now();
        match self.recorder.stop(now) {
            Ok(video) => Ok(video),
            Err(err) => {
                tracing::warn!(error = %err, "recording failed to finalize");
                self.notices.push(format!("Recording failed: {err}"));
                Err(err)
            }
        }
    }

    /// Saves the finalized recording as `wave-grid-{rows}x{cols}.webm` in `dir`.
    pub fn download(&self, dir: &Path) -> WaveGridResult<Option<PathBuf>> {
        self.recorder
            .download(dir, self.config.rows, self.config.cols)
    }

    pub fn take_notices(&mut self) -> Vec<String> {
        std::mem::take(&mut self.notices)
    }

    pub fn snapshot(&self) -> Option<FrameRGBA> {
        self.surface.as_ref().map(|s| self.renderer.read_frame(s))
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    pub fn clock(&self) -> &AnimationClock {
        &self.clock
    }

    pub fn is_running(&self) -> bool {
        self.clock.is_running()
    }

    pub fn surface(&self) -> Option<&Surface> {
        self.surface.as_ref()
    }

    pub fn recording_state(&self) -> RecordingState {
        self.recorder.state()
    }

    pub fn recording(&self) -> Option<&RecordedVideo> {
        self.recorder.recording()
    }

    pub fn scheduler(&self) -> &Scheduler<T> {
        &self.scheduler
    }

    pub fn now(&self) -> Duration {
        self.scheduler.now()
    }

    pub fn frames_drawn(&self) -> u64 {
        self.frames_drawn
    }

    pub fn last_stats(&self) -> DrawStats {
        self.last_stats
    }
}

impl<T: TimeSource> Drop for WaveGridApp<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
