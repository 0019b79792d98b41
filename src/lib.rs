#![forbid(unsafe_code)]

pub mod app;
pub mod canvas;
pub mod clock;
pub mod color;
pub mod composite;
pub mod config;
pub mod encode_ffmpeg;
pub mod error;
pub mod glow;
pub mod palette;
pub mod recorder;
pub mod render;
pub mod scheduler;
pub mod wave;

pub use app::WaveGridApp;
pub use canvas::{CanvasLayout, Surface};
pub use clock::AnimationClock;
pub use color::{CellColor, color_for};
pub use config::{Control, GridConfig};
pub use encode_ffmpeg::{EncodeConfig, FfmpegBackend};
pub use error::{WaveGridError, WaveGridResult};
pub use palette::{PALETTE_CYCLE_PERIOD, PALETTES, Palette};
pub use recorder::{
    CAPTURE_FPS, EncoderBackend, RecordedVideo, Recorder, RecordingState, VideoEncoder,
};
pub use render::{DrawStats, FrameRGBA, GridRenderer};
pub use scheduler::{Scheduler, SystemTime, Tick, TimeSource, VirtualTime};
pub use wave::WaveParams;
