use std::{
    fmt::Display,
    ops::RangeInclusive,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use wavegrid::{
    AnimationClock, CanvasLayout, Control, FfmpegBackend, GridConfig, GridRenderer, PALETTES,
    Recorder, Scheduler, Surface, SystemTime, TimeSource, VirtualTime, WaveGridApp, config,
    palette,
};

mod live;

/// Upper bound for `--seconds` and `--pause-at`.
const MAX_RECORD_SECONDS: f64 = 3600.0;

#[derive(Parser, Debug)]
#[command(name = "wavegrid", version, about = "Animated wave grid renderer")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a single frame as a PNG.
    Frame(FrameArgs),
    /// Run the animation and record it to a WebM file (requires `ffmpeg` with libvpx-vp9).
    Record(RecordArgs),
    /// Open a window with the running animation and keyboard controls.
    Live(LiveArgs),
    /// List the available palettes.
    Palettes,
}

#[derive(Args, Debug)]
struct GridArgs {
    /// JSON file with initial grid settings; flags override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of rows (4-80).
    #[arg(long, value_parser = parse_rows)]
    rows: Option<u32>,

    /// Number of columns (4-120).
    #[arg(long, value_parser = parse_cols)]
    cols: Option<u32>,

    /// Cell size in pixels (8-40).
    #[arg(long, value_parser = parse_cell_size)]
    cell_size: Option<f64>,

    /// Gap between cells in pixels (0-6).
    #[arg(long, value_parser = parse_gap)]
    gap: Option<f64>,

    /// Animation speed (0.2-3).
    #[arg(long, value_parser = parse_speed)]
    speed: Option<f64>,

    /// Wave width in columns (1-8).
    #[arg(long, value_parser = parse_wave_width)]
    wave_width: Option<f64>,

    /// Palette index or name.
    #[arg(long, value_parser = parse_palette)]
    palette: Option<usize>,

    /// Device pixel ratio of the output.
    #[arg(long, default_value_t = 1.0)]
    dpr: f64,
}

#[derive(Parser, Debug)]
struct FrameArgs {
    #[command(flatten)]
    grid: GridArgs,

    /// Simulation time in seconds.
    #[arg(long, default_value_t = 0.0, value_parser = parse_sim_time)]
    time: f64,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct RecordArgs {
    #[command(flatten)]
    grid: GridArgs,

    /// Directory the `wave-grid-{rows}x{cols}.webm` file is written to.
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// Recording length in seconds.
    #[arg(long, default_value = "5", value_parser = parse_record_seconds)]
    seconds: Duration,

    /// Pause the animation after this many seconds (recording continues).
    #[arg(long, value_parser = parse_pause_at)]
    pause_at: Option<Duration>,

    /// Pace frames against the wall clock instead of rendering as fast as possible.
    #[arg(long)]
    realtime: bool,
}

#[derive(Parser, Debug)]
struct LiveArgs {
    #[command(flatten)]
    grid: GridArgs,

    /// Directory recordings are saved to.
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,
}

impl GridArgs {
    fn resolve(&self) -> anyhow::Result<GridConfig> {
        let mut cfg = match &self.config {
            Some(path) => GridConfig::from_json_file(path)?,
            None => GridConfig::default(),
        };

        let controls = [
            self.rows.map(Control::Rows),
            self.cols.map(Control::Cols),
            self.cell_size.map(Control::CellSize),
            self.gap.map(Control::Gap),
            self.speed.map(Control::Speed),
            self.wave_width.map(Control::WaveWidth),
            self.palette.map(Control::Palette),
        ];
        for control in controls.into_iter().flatten() {
            cfg.apply(control);
        }
        Ok(cfg)
    }
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Frame(args) => cmd_frame(args),
        Command::Record(args) => cmd_record(args),
        Command::Live(args) => cmd_live(args),
        Command::Palettes => cmd_palettes(),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("WAVEGRID_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let cfg = args.grid.resolve()?;
    let mut surface = Surface::new(CanvasLayout::new(&cfg, args.grid.dpr));
    let mut renderer = GridRenderer::new();
    let clock = AnimationClock::at(args.time);

    let frame = renderer.render_frame(&mut surface, &cfg, clock.wave_time())?;
    let rgba = frame.to_opaque_rgba8(wavegrid::render::BACKGROUND.to_rgba8_premul())?;

    if let Some(parent) = args.out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }

    image::save_buffer_with_format(
        &args.out,
        &rgba,
        frame.width,
        frame.height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_record(args: RecordArgs) -> anyhow::Result<()> {
    let cfg = args.grid.resolve()?;
    let recorder = Recorder::new(Box::new(FfmpegBackend::new()));

    if args.realtime {
        let app = WaveGridApp::new(cfg, Scheduler::new(SystemTime::new()), recorder);
        record_with(app, &args)
    } else {
        let app = WaveGridApp::new(cfg, Scheduler::new(VirtualTime::new()), recorder);
        record_with(app, &args)
    }
}

fn record_with<T: TimeSource>(mut app: WaveGridApp<T>, args: &RecordArgs) -> anyhow::Result<()> {
    app.mount(args.grid.dpr);
    app.start();

    if let Err(err) = app.start_recording() {
        print_notices(&mut app);
        return Err(err).context("recording could not start");
    }

    let total = args.seconds;
    match args.pause_at {
        Some(pause) if pause < total => {
            app.run_for(pause)?;
            app.apply(Control::ToggleRunning);
            app.run_for(total - pause)?;
        }
        _ => app.run_for(total)?,
    }

    let finalized = app.stop_recording()?.is_some();
    print_notices(&mut app);
    anyhow::ensure!(finalized, "recording was aborted before it could be finalized");

    let path = save_recording(&app, &args.out_dir)?;
    if let Some(video) = app.recording() {
        eprintln!(
            "wrote {} ({} frames, {:.2}s, {} bytes)",
            path.display(),
            video.frames,
            video.duration().as_secs_f64(),
            video.len()
        );
    }
    app.shutdown();
    Ok(())
}

fn save_recording<T: TimeSource>(app: &WaveGridApp<T>, dir: &Path) -> anyhow::Result<PathBuf> {
    app.download(dir)?
        .context("no finalized recording to download")
}

fn print_notices<T: TimeSource>(app: &mut WaveGridApp<T>) {
    for notice in app.take_notices() {
        eprintln!("{notice}");
    }
}

fn cmd_live(args: LiveArgs) -> anyhow::Result<()> {
    let cfg = args.grid.resolve()?;
    live::run(cfg, args.grid.dpr, &args.out_dir)
}

fn cmd_palettes() -> anyhow::Result<()> {
    for (idx, p) in PALETTES.iter().enumerate() {
        println!(
            "{idx}  {:<12} from rgb({}, {}, {})  to rgb({}, {}, {})",
            p.name, p.from[0], p.from[1], p.from[2], p.to[0], p.to[1], p.to[2]
        );
    }
    Ok(())
}

fn parse_ranged<T>(s: &str, range: &RangeInclusive<T>) -> Result<T, String>
where
    T: FromStr + PartialOrd + Display,
    T::Err: Display,
{
    let v: T = s.trim().parse().map_err(|e| format!("{e}"))?;
    if !range.contains(&v) {
        return Err(format!(
            "{v} is not in {}..={}",
            range.start(),
            range.end()
        ));
    }
    Ok(v)
}

fn parse_rows(s: &str) -> Result<u32, String> {
    parse_ranged(s, &config::ROWS_RANGE)
}

fn parse_cols(s: &str) -> Result<u32, String> {
    parse_ranged(s, &config::COLS_RANGE)
}

fn parse_cell_size(s: &str) -> Result<f64, String> {
    parse_ranged(s, &config::CELL_SIZE_RANGE)
}

fn parse_gap(s: &str) -> Result<f64, String> {
    parse_ranged(s, &config::GAP_RANGE)
}

fn parse_speed(s: &str) -> Result<f64, String> {
    parse_ranged(s, &config::SPEED_RANGE)
}

fn parse_wave_width(s: &str) -> Result<f64, String> {
    parse_ranged(s, &config::WAVE_WIDTH_RANGE)
}

fn parse_sim_time(s: &str) -> Result<f64, String> {
    let v: f64 = s.trim().parse().map_err(|e| format!("{e}"))?;
    if !v.is_finite() {
        return Err(format!("{v} is not a finite number of seconds"));
    }
    Ok(v)
}

fn parse_seconds(s: &str, allow_zero: bool) -> Result<Duration, String> {
    let v: f64 = s.trim().parse().map_err(|e| format!("{e}"))?;
    let lower_ok = if allow_zero { v >= 0.0 } else { v > 0.0 };
    if !v.is_finite() || !lower_ok || v > MAX_RECORD_SECONDS {
        let lower = if allow_zero { "0" } else { "above 0" };
        return Err(format!(
            "{v} is not a duration in seconds ({lower} up to {MAX_RECORD_SECONDS})"
        ));
    }
    Duration::try_from_secs_f64(v).map_err(|e| format!("{e}"))
}

fn parse_record_seconds(s: &str) -> Result<Duration, String> {
    parse_seconds(s, false)
}

fn parse_pause_at(s: &str) -> Result<Duration, String> {
    parse_seconds(s, true)
}

fn parse_palette(s: &str) -> Result<usize, String> {
    if let Ok(idx) = s.trim().parse::<usize>() {
        if idx < palette::palette_count() {
            return Ok(idx);
        }
        return Err(format!(
            "palette index must be below {}",
            palette::palette_count()
        ));
    }
    palette::find_by_name(s).ok_or_else(|| {
        let names: Vec<&str> = PALETTES.iter().map(|p| p.name).collect();
        format!("unknown palette '{s}' (expected one of: {})", names.join(", "))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_must_be_finite_and_bounded() {
        assert_eq!(parse_record_seconds("2.5"), Ok(Duration::from_millis(2500)));
        assert_eq!(parse_pause_at("0"), Ok(Duration::ZERO));
        for bad in ["0", "-1", "nan", "inf", "1e300", "abc"] {
            assert!(parse_record_seconds(bad).is_err(), "{bad}");
        }
        for bad in ["-1", "NaN", "3601"] {
            assert!(parse_pause_at(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn rows_and_cols_use_config_ranges() {
        assert_eq!(parse_rows("80"), Ok(80));
        assert!(parse_rows("81").is_err());
        assert!(parse_cols("3").is_err());
        assert_eq!(parse_cols(" 120 "), Ok(120));
    }
}
