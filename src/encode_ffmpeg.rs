use std::{
    ffi::OsString,
    io::{Read as _, Write as _},
    process::{Child, ChildStdin, ChildStdout, Command, Stdio},
    thread::JoinHandle,
};

use crate::{
    error::{WaveGridError, WaveGridResult},
    recorder::{ChunkSender, EncoderBackend, VideoEncoder},
    render::{BACKGROUND, FrameRGBA},
};

/// Env var overriding the ffmpeg executable.
pub const FFMPEG_ENV: &str = "WAVEGRID_FFMPEG";

pub const WEBM_MIME: &str = "video/webm";
const VP9_ENCODER: &str = "libvpx-vp9";
const READ_CHUNK_BYTES: usize = 64 * 1024;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodeConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub bg_rgba: [u8; 4],
}

impl EncodeConfig {
    pub fn webm(width: u32, height: u32, fps: u32) -> Self {
        let [r, g, b, _] = BACKGROUND.to_rgba8_premul();
        Self {
            width,
            height,
            fps,
            bg_rgba: [r, g, b, 255],
        }
    }

    pub fn validate(&self) -> WaveGridResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(WaveGridError::validation(
                "encode width/height must be non-zero",
            ));
        }
        if self.fps == 0 {
            return Err(WaveGridError::validation("encode fps must be non-zero"));
        }
        if !self.width.is_multiple_of(2) || !self.height.is_multiple_of(2) {
            // yuv420p chroma subsampling
            return Err(WaveGridError::validation(
                "encode width/height must be even (required for yuv420p output)",
            ));
        }
        Ok(())
    }

    pub fn frame_bytes(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

/// Rounds a capture size up to even dimensions.
pub fn even_size(width: u32, height: u32) -> (u32, u32) {
    (
        width.max(1).next_multiple_of(2),
        height.max(1).next_multiple_of(2),
    )
}

pub fn ffmpeg_program() -> OsString {
    std::env::var_os(FFMPEG_ENV)
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| OsString::from("ffmpeg"))
}

/// Encodes WebM/VP9 through the system `ffmpeg`. Raw RGBA frames go in on
/// stdin; the muxed stream comes back on stdout and is forwarded as chunks.
#[derive(Clone, Debug)]
pub struct FfmpegBackend {
    program: OsString,
}

impl Default for FfmpegBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl FfmpegBackend {
    pub fn new() -> Self {
        Self {
            program: ffmpeg_program(),
        }
    }

    pub fn with_program(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn is_available(&self) -> bool {
        Command::new(&self.program)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    /// Fails with `CaptureUnsupported` when ffmpeg is missing or was built
    /// without the VP9 encoder.
    pub fn check_support(&self) -> WaveGridResult<()> {
        let output = Command::new(&self.program)
            .args(["-hide_banner", "-encoders"])
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .map_err(|e| {
                WaveGridError::capture_unsupported(format!(
                    "ffmpeg ('{}') could not be started: {e}",
                    self.program.to_string_lossy()
                ))
            })?;
        if !output.status.success() {
            return Err(WaveGridError::capture_unsupported(format!(
                "ffmpeg exited with status {} while listing encoders",
                output.status
            )));
        }
        let listing = String::from_utf8_lossy(&output.stdout);
        if !listing.contains(VP9_ENCODER) {
            return Err(WaveGridError::capture_unsupported(format!(
                "ffmpeg has no {VP9_ENCODER} encoder"
            )));
        }
        Ok(())
    }
}

impl EncoderBackend for FfmpegBackend {
    fn open(
        &self,
        cfg: &EncodeConfig,
        chunks: ChunkSender,
    ) -> WaveGridResult<Box<dyn VideoEncoder>> {
        cfg.validate()?;
        self.check_support()?;

        let mut cmd = Command::new(&self.program);
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd.args([
            "-hide_banner",
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "-s",
            &format!("{}x{}", cfg.width, cfg.height),
            "-r",
            &cfg.fps.to_string(),
            "-i",
            "pipe:0",
            "-an",
            "-c:v",
            VP9_ENCODER,
            "-pix_fmt",
            "yuv420p",
            "-deadline",
            "realtime",
            "-cpu-used",
            "8",
            "-row-mt",
            "1",
            "-b:v",
            "0",
            "-crf",
            "33",
            "-f",
            "webm",
            "pipe:1",
        ]);

        let mut child = cmd.spawn().map_err(|e| {
            WaveGridError::capture_unsupported(format!("failed to spawn ffmpeg: {e}"))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| WaveGridError::encode("failed to open ffmpeg stdin (unexpected)"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| WaveGridError::encode("failed to open ffmpeg stdout (unexpected)"))?;

        let reader = std::thread::Builder::new()
            .name("wavegrid-webm-reader".to_string())
            .spawn(move || forward_chunks(stdout, chunks))
            .map_err(|e| WaveGridError::encode(format!("failed to spawn chunk reader: {e}")))?;

        tracing::debug!(
            width = cfg.width,
            height = cfg.height,
            fps = cfg.fps,
            "ffmpeg webm encoder started"
        );

        Ok(Box::new(FfmpegEncoder {
            scratch: vec![0u8; cfg.frame_bytes()],
            cfg: cfg.clone(),
            child: Some(child),
            stdin: Some(stdin),
            reader: Some(reader),
        }))
    }
}

// Keeps draining after the receiver is gone so ffmpeg never blocks on a full pipe.
fn forward_chunks(mut stdout: ChildStdout, chunks: ChunkSender) -> std::io::Result<u64> {
    let mut buf = vec![0u8; READ_CHUNK_BYTES];
    let mut total = 0u64;
    let mut forwarding = true;
    loop {
        let n = match stdout.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        total += n as u64;
        if forwarding && chunks.send(buf[..n].to_vec()).is_err() {
            forwarding = false;
        }
    }
    Ok(total)
}

pub struct FfmpegEncoder {
    cfg: EncodeConfig,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    reader: Option<JoinHandle<std::io::Result<u64>>>,
    scratch: Vec<u8>,
}

impl VideoEncoder for FfmpegEncoder {
    fn encode_frame(&mut self, frame: &FrameRGBA) -> WaveGridResult<()> {
        if frame.width != self.cfg.width || frame.height != self.cfg.height {
            return Err(WaveGridError::validation(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width, frame.height, self.cfg.width, self.cfg.height
            )));
        }
        if frame.data.len() != self.scratch.len() {
            return Err(WaveGridError::validation(
                "frame.data size mismatch with width*height*4",
            ));
        }

        crate::composite::flatten_to_opaque_rgba8(
            &mut self.scratch,
            &frame.data,
            frame.premultiplied,
            self.cfg.bg_rgba,
        )?;

        let Some(stdin) = self.stdin.as_mut() else {
            return Err(WaveGridError::encode("ffmpeg encoder is already finalized"));
        };
        stdin.write_all(&self.scratch).map_err(|e| {
            WaveGridError::encode(format!("failed to write frame to ffmpeg stdin: {e}"))
        })?;
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> WaveGridResult<()> {
        drop(self.stdin.take());

        let child = self
            .child
            .take()
            .ok_or_else(|| WaveGridError::encode("ffmpeg encoder is already finalized"))?;
        // stderr is drained here while the reader thread drains stdout.
        let output = child.wait_with_output().map_err(|e| {
            WaveGridError::encode(format!("failed to wait for ffmpeg to finish: {e}"))
        })?;

        let streamed = match self.reader.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| WaveGridError::encode("chunk reader thread panicked"))?
                .map_err(|e| WaveGridError::encode(format!("failed to read ffmpeg output: {e}")))?,
            None => 0,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(WaveGridError::encode(format!(
                "ffmpeg exited with status {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        tracing::debug!(bytes = streamed, "ffmpeg webm encoder finished");
        Ok(())
    }
}

impl Drop for FfmpegEncoder {
    fn drop(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        if let Some(handle) = self.reader.take() {
            let _ = handle.join();
        }
    }
}
