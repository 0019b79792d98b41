use std::{path::PathBuf, time::Duration};

use wavegrid::{
    FfmpegBackend, GridConfig, Recorder, RecordingState, Scheduler, VirtualTime, WaveGridApp,
};

const EBML_MAGIC: [u8; 4] = [0x1A, 0x45, 0xDF, 0xA3];

fn vp9_available() -> bool {
    FfmpegBackend::new().check_support().is_ok()
}

fn small_grid() -> GridConfig {
    GridConfig {
        rows: 6,
        cols: 8,
        cell_size: 10.0,
        gap: 2.0,
        ..GridConfig::default()
    }
}

#[test]
fn ffmpeg_recording_produces_webm() {
    if !vp9_available() {
        eprintln!("skipping: ffmpeg with libvpx-vp9 not available");
        return;
    }

    let dir = tempfile::tempdir().unwrap();
    let mut app = WaveGridApp::new(
        small_grid(),
        Scheduler::new(VirtualTime::new()),
        Recorder::new(Box::new(FfmpegBackend::new())),
    );
    app.mount(1.0);
    app.start();
    app.start_recording().unwrap();
    app.run_for(Duration::from_secs(1)).unwrap();

    let video = app.stop_recording().unwrap().unwrap().clone();
    assert_eq!(app.recording_state(), RecordingState::Stopped);
    assert!(video.bytes.starts_with(&EBML_MAGIC));
    assert_eq!(video.frames, 61);

    let path = app.download(dir.path()).unwrap().unwrap();
    assert_eq!(path.file_name().unwrap(), "wave-grid-6x8.webm");
    assert_eq!(std::fs::read(&path).unwrap(), video.bytes);
}

#[test]
fn cli_record_writes_webm() {
    if !vp9_available() {
        eprintln!("skipping: ffmpeg with libvpx-vp9 not available");
        return;
    }

    let dir = tempfile::tempdir().unwrap();
    let exe = std::env::var_os("CARGO_BIN_EXE_wavegrid")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("target").join("debug").join("wavegrid"));

    let status = std::process::Command::new(exe)
        .args([
            "record",
            "--rows",
            "4",
            "--cols",
            "6",
            "--seconds",
            "0.5",
            "--pause-at",
            "0.25",
            "--out-dir",
        ])
        .arg(dir.path())
        .status()
        .unwrap();

    assert!(status.success());
    let bytes = std::fs::read(dir.path().join("wave-grid-4x6.webm")).unwrap();
    assert!(bytes.starts_with(&EBML_MAGIC));
}
