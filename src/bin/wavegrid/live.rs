//! Interactive window: the running grid plus keyboard controls.
//!
//! Keys: Space run/pause, Up/Down rows, Left/Right columns, `[`/`]` cell size,
//! `-`/`=` gap, `,`/`.` speed, Z/X wave width, P next palette, 1-4 pick a
//! palette, R start/stop recording, D save the last recording, Esc quit.

use std::path::Path;

use minifb::{Key, KeyRepeat, Window, WindowOptions};
use wavegrid::{
    Control, FfmpegBackend, GridConfig, Recorder, RecordingState, Scheduler, SystemTime, Tick,
    TimeSource, WaveGridApp, WaveGridResult, config, palette, render::BACKGROUND,
};

const SPEED_STEP: f64 = 0.1;
const WAVE_WIDTH_STEP: f64 = 0.5;

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum LiveAction {
    Control(Control),
    ToggleRecording,
    Download,
    Quit,
}

/// Maps a key press to an action against the current settings. Stepped
/// values stay inside the control ranges.
pub(crate) fn action_for(key: Key, cfg: &GridConfig) -> Option<LiveAction> {
    let control = match key {
        Key::Escape => return Some(LiveAction::Quit),
        Key::R => return Some(LiveAction::ToggleRecording),
        Key::D => return Some(LiveAction::Download),
        Key::Space => Control::ToggleRunning,
        Key::Up => Control::Rows(step_u32(cfg.rows, 1, &config::ROWS_RANGE)),
        Key::Down => Control::Rows(step_u32(cfg.rows, -1, &config::ROWS_RANGE)),
        Key::Right => Control::Cols(step_u32(cfg.cols, 1, &config::COLS_RANGE)),
        Key::Left => Control::Cols(step_u32(cfg.cols, -1, &config::COLS_RANGE)),
        Key::RightBracket => {
            Control::CellSize(step_f64(cfg.cell_size, 1.0, &config::CELL_SIZE_RANGE))
        }
        Key::LeftBracket => {
            Control::CellSize(step_f64(cfg.cell_size, -1.0, &config::CELL_SIZE_RANGE))
        }
        Key::Equal => Control::Gap(step_f64(cfg.gap, 1.0, &config::GAP_RANGE)),
        Key::Minus => Control::Gap(step_f64(cfg.gap, -1.0, &config::GAP_RANGE)),
        Key::Period => Control::Speed(step_f64(cfg.speed, SPEED_STEP, &config::SPEED_RANGE)),
        Key::Comma => Control::Speed(step_f64(cfg.speed, -SPEED_STEP, &config::SPEED_RANGE)),
        Key::X => Control::WaveWidth(step_f64(
            cfg.wave_width,
            WAVE_WIDTH_STEP,
            &config::WAVE_WIDTH_RANGE,
        )),
        Key::Z => Control::WaveWidth(step_f64(
            cfg.wave_width,
            -WAVE_WIDTH_STEP,
            &config::WAVE_WIDTH_RANGE,
        )),
        Key::P => Control::Palette(palette::next_index(cfg.palette_index)),
        Key::Key1 => Control::Palette(0),
        Key::Key2 => Control::Palette(1),
        Key::Key3 => Control::Palette(2),
        Key::Key4 => Control::Palette(3),
        _ => return None,
    };
    Some(LiveAction::Control(control))
}

fn step_u32(value: u32, delta: i64, range: &std::ops::RangeInclusive<u32>) -> u32 {
    let stepped = i64::from(value) + delta;
    stepped.clamp(i64::from(*range.start()), i64::from(*range.end())) as u32
}

fn step_f64(value: f64, delta: f64, range: &std::ops::RangeInclusive<f64>) -> f64 {
    // keep one decimal so repeated steps do not drift
    let stepped = ((value + delta) * 10.0).round() / 10.0;
    stepped.clamp(*range.start(), *range.end())
}

/// Premultiplied-over-opaque RGBA8 to minifb's 0RGB.
pub(crate) fn rgba_to_0rgb(rgba: &[u8], out: &mut Vec<u32>) {
    out.clear();
    out.extend(
        rgba.chunks_exact(4)
            .map(|p| (u32::from(p[0]) << 16) | (u32::from(p[1]) << 8) | u32::from(p[2])),
    );
}

pub(crate) fn status_title<T: TimeSource>(app: &WaveGridApp<T>, notice: Option<&str>) -> String {
    let cfg = app.config();
    let mut title = format!(
        "wavegrid {}x{} - {} - {}",
        cfg.rows,
        cfg.cols,
        cfg.palette().name,
        if app.is_running() { "running" } else { "paused" }
    );
    match app.recording_state() {
        RecordingState::Recording => title.push_str(" - REC"),
        RecordingState::Stopped => title.push_str(" - recording ready (D to save)"),
        RecordingState::Idle => {}
    }
    if let Some(notice) = notice {
        title.push_str(" - ");
        title.push_str(notice);
    }
    title
}

/// Steps the app until one frame tick has been handled.
pub(crate) fn pump_frame<T: TimeSource>(app: &mut WaveGridApp<T>) -> WaveGridResult<()> {
    while let Some(tick) = app.step()? {
        if matches!(tick, Tick::Frame { .. }) {
            break;
        }
    }
    Ok(())
}

fn toggle_recording<T: TimeSource>(app: &mut WaveGridApp<T>) {
    if app.recording_state() == RecordingState::Recording {
        match app.stop_recording() {
            Ok(Some(video)) => eprintln!(
                "recording ready ({} frames, {:.2}s); press D to save",
                video.frames,
                video.duration().as_secs_f64()
            ),
            Ok(None) => {}
            Err(err) => tracing::debug!(error = %err, "recording stop failed"),
        }
        return;
    }
    match app.start_recording() {
        Ok(()) if app.recording_state() == RecordingState::Recording => {
            eprintln!("recording started; press R to stop")
        }
        Ok(()) => {}
        Err(err) => tracing::debug!(error = %err, "recording start failed"),
    }
}

fn save<T: TimeSource>(app: &WaveGridApp<T>, out_dir: &Path) -> String {
    match app.download(out_dir) {
        Ok(Some(path)) => format!("saved {}", path.display()),
        Ok(None) => "no finished recording to save".to_string(),
        Err(err) => format!("save failed: {err}"),
    }
}

pub(crate) fn run(cfg: GridConfig, dpr: f64, out_dir: &Path) -> anyhow::Result<()> {
    let mut app = WaveGridApp::new(
        cfg,
        Scheduler::new(SystemTime::new()),
        Recorder::new(Box::new(FfmpegBackend::new())),
    );
    app.mount(dpr);
    let (width, height) = app
        .surface()
        .map(|s| s.layout().device_size())
        .unwrap_or((1, 1));

    let mut window = Window::new(
        "wavegrid",
        width as usize,
        height as usize,
        WindowOptions {
            resize: true,
            ..WindowOptions::default()
        },
    )
    .map_err(|e| anyhow::anyhow!("open window: {e}"))?;

    app.start();
    let mut framebuf: Vec<u32> = Vec::new();
    let mut notice: Option<String> = None;
    let mut title = String::new();

    'frames: while window.is_open() {
        for key in window.get_keys_pressed(KeyRepeat::No) {
            let Some(action) = action_for(key, app.config()) else {
                continue;
            };
            match action {
                LiveAction::Quit => break 'frames,
                LiveAction::Control(control) => app.apply(control),
                LiveAction::ToggleRecording => toggle_recording(&mut app),
                LiveAction::Download => {
                    let msg = save(&app, out_dir);
                    eprintln!("{msg}");
                    notice = Some(msg);
                }
            }
        }

        for msg in app.take_notices() {
            eprintln!("{msg}");
            notice = Some(msg);
        }

        pump_frame(&mut app)?;

        let next_title = status_title(&app, notice.as_deref());
        if next_title != title {
            window.set_title(&next_title);
            title = next_title;
        }

        match app.snapshot() {
            Some(frame) => {
                let rgba = frame.to_opaque_rgba8(BACKGROUND.to_rgba8_premul())?;
                rgba_to_0rgb(&rgba, &mut framebuf);
                window
                    .update_with_buffer(&framebuf, frame.width as usize, frame.height as usize)
                    .map_err(|e| anyhow::anyhow!("present frame: {e}"))?;
            }
            None => window.update(),
        }
    }

    if app.recording_state() == RecordingState::Recording {
        eprintln!("window closed while recording; recording discarded");
    }
    app.shutdown();
    Ok(())
}
