//! Video capture of the rendered canvas.
//!
//! The recorder turns the stream of rendered frames into a fixed-rate capture
//! stream, hands it to an encoder backend, and collects the encoded chunks the
//! backend pushes through a channel. `stop` finalizes the chunks into a single
//! downloadable [`RecordedVideo`].

use std::{
    path::{Path, PathBuf},
    sync::mpsc::{self, Receiver, Sender},
    time::Duration,
};

use crate::{
    encode_ffmpeg::{EncodeConfig, WEBM_MIME, even_size},
    error::{WaveGridError, WaveGridResult},
    render::FrameRGBA,
};

pub const CAPTURE_FPS: u32 = 60;

pub type Chunk = Vec<u8>;
pub type ChunkSender = Sender<Chunk>;

pub trait VideoEncoder {
    fn encode_frame(&mut self, frame: &FrameRGBA) -> WaveGridResult<()>;

    /// Flushes the encoder. Every chunk must have been sent when this returns.
    fn finish(self: Box<Self>) -> WaveGridResult<()>;
}

pub trait EncoderBackend {
    fn open(
        &self,
        cfg: &EncodeConfig,
        chunks: ChunkSender,
    ) -> WaveGridResult<Box<dyn VideoEncoder>>;
}

pub fn recording_file_name(rows: u32, cols: u32) -> String {
    format!("wave-grid-{rows}x{cols}.webm")
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordingState {
    Idle,
    Recording,
    Stopped,
}

/// A finalized recording: the concatenated encoder output.
#[derive(Clone, Debug)]
pub struct RecordedVideo {
    pub bytes: Vec<u8>,
    pub mime: &'static str,
    pub frames: u64,
    pub fps: u32,
    pub width: u32,
    pub height: u32,
}

impl RecordedVideo {
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.frames as f64 / f64::from(self.fps.max(1)))
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Paces rendered frames onto a fixed-rate timeline. Each offer writes as many
/// copies of the frame as the timeline is behind, so a frozen canvas still
/// fills the recording.
struct CaptureStream {
    cfg: EncodeConfig,
    started_at: Duration,
    frames_written: u64,
    last_frame: Option<FrameRGBA>,
}

impl CaptureStream {
    fn frames_due(&self, now: Duration) -> u64 {
        let elapsed = now.saturating_sub(self.started_at).as_secs_f64();
        (elapsed * f64::from(self.cfg.fps)).floor() as u64 + 1
    }

    fn offer(
        &mut self,
        encoder: &mut dyn VideoEncoder,
        frame: &FrameRGBA,
        now: Duration,
    ) -> WaveGridResult<u64> {
        let fitted = frame.fit_to(self.cfg.width, self.cfg.height, self.cfg.bg_rgba);
        self.last_frame = Some(fitted);
        self.pad_to(encoder, now)
    }

    fn pad_to(&mut self, encoder: &mut dyn VideoEncoder, now: Duration) -> WaveGridResult<u64> {
        let Some(frame) = self.last_frame.as_ref() else {
            return Ok(0);
        };
        let due = self.frames_due(now);
        let mut written = 0;
        while self.frames_written < due {
            encoder.encode_frame(frame)?;
            self.frames_written += 1;
            written += 1;
        }
        Ok(written)
    }
}

struct Session {
    encoder: Box<dyn VideoEncoder>,
    capture: CaptureStream,
    rx: Receiver<Chunk>,
    chunks: Vec<Chunk>,
}

impl Session {
    fn drain(&mut self) {
        self.chunks.extend(self.rx.try_iter());
    }
}

pub struct Recorder {
    backend: Box<dyn EncoderBackend>,
    fps: u32,
    session: Option<Session>,
    result: Option<RecordedVideo>,
}

impl Recorder {
    pub fn new(backend: Box<dyn EncoderBackend>) -> Self {
        Self::with_fps(backend, CAPTURE_FPS)
    }

    pub fn with_fps(backend: Box<dyn EncoderBackend>, fps: u32) -> Self {
        Self {
            backend,
            fps,
            session: None,
            result: None,
        }
    }

    pub fn state(&self) -> RecordingState {
        match (&self.session, &self.result) {
            (Some(_), _) => RecordingState::Recording,
            (None, Some(_)) => RecordingState::Stopped,
            (None, None) => RecordingState::Idle,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.session.is_some()
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    /// Starts a new recording of a canvas of `frame_size` device pixels.
    /// Clears the previous result. A no-op while already recording.
    pub fn start(&mut self, frame_size: (u32, u32), now: Duration) -> WaveGridResult<()> {
        if self.session.is_some() {
            tracing::debug!("recording already in progress");
            return Ok(());
        }
        self.result = None;

        let (width, height) = even_size(frame_size.0, frame_size.1);
        let cfg = EncodeConfig::webm(width, height, self.fps);
        let (tx, rx) = mpsc::channel();
        let encoder = self.backend.open(&cfg, tx)?;

        tracing::info!(width, height, fps = self.fps, "recording started");
        self.session = Some(Session {
            encoder,
            capture: CaptureStream {
                cfg,
                started_at: now,
                frames_written: 0,
                last_frame: None,
            },
            rx,
            chunks: Vec::new(),
        });
        Ok(())
    }

    /// Feeds the current canvas contents. Ignored while not recording. An
    /// encoder failure aborts the recording.
    pub fn capture(&mut self, frame: &FrameRGBA, now: Duration) -> WaveGridResult<()> {
        let Some(session) = self.session.as_mut() else {
            return Ok(());
        };
        let res = session
            .capture
            .offer(session.encoder.as_mut(), frame, now);
        session.drain();
        if let Err(err) = res {
            tracing::error!(error = %err, "recording aborted");
            self.session = None;
            return Err(err);
        }
        Ok(())
    }

    /// Finalizes the current recording. Returns `None` when nothing was
    /// being recorded.
    pub fn stop(&mut self, now: Duration) -> WaveGridResult<Option<&RecordedVideo>> {
        let Some(mut session) = self.session.take() else {
            return Ok(None);
        };

        session.capture.pad_to(session.encoder.as_mut(), now)?;
        let frames = session.capture.frames_written;
        let (width, height) = (session.capture.cfg.width, session.capture.cfg.height);

        let Session {
            encoder,
            rx,
            mut chunks,
            ..
        } = session;
        encoder.finish()?;
        chunks.extend(rx.try_iter());

        let bytes = chunks.concat();
        if bytes.is_empty() {
            return Err(WaveGridError::encode("encoder produced no output"));
        }

        let video = RecordedVideo {
            bytes,
            mime: WEBM_MIME,
            frames,
            fps: self.fps,
            width,
            height,
        };
        tracing::info!(
            bytes = video.len(),
            frames,
            seconds = video.duration().as_secs_f64(),
            "recording finalized"
        );
        self.result = Some(video);
        Ok(self.result.as_ref())
    }

    pub fn recording(&self) -> Option<&RecordedVideo> {
        self.result.as_ref()
    }

    /// Saves the finalized recording as `dir/wave-grid-{rows}x{cols}.webm`.
    pub fn download(&self, dir: &Path, rows: u32, cols: u32) -> WaveGridResult<Option<PathBuf>> {
        use anyhow::Context as _;

        let Some(video) = self.result.as_ref() else {
            return Ok(None);
        };
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create output directory '{}'", dir.display()))?;
        let path = dir.join(recording_file_name(rows, cols));
        std::fs::write(&path, &video.bytes)
            .with_context(|| format!("failed to write recording '{}'", path.display()))?;
        tracing::info!(path = %path.display(), bytes = video.len(), "recording saved");
        Ok(Some(path))
    }
}
