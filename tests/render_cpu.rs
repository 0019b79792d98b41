use wavegrid::{AnimationClock, CanvasLayout, Control, GridConfig, GridRenderer, Surface};

fn mix64(mut z: u64) -> u64 {
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

fn digest_u64(bytes: &[u8]) -> u64 {
    let mut state = 0x9E37_79B9_7F4A_7C15u64;
    for chunk in bytes.chunks(8) {
        let mut v = 0u64;
        for (i, &b) in chunk.iter().enumerate() {
            v |= (b as u64) << (i * 8);
        }
        state = mix64(state ^ v);
    }
    state
}

fn render(cfg: &GridConfig, dpr: f64, sim_time: f64) -> wavegrid::FrameRGBA {
    let mut surface = Surface::new(CanvasLayout::new(cfg, dpr));
    let mut renderer = GridRenderer::new();
    renderer
        .render_frame(&mut surface, cfg, AnimationClock::at(sim_time).wave_time())
        .unwrap()
}

#[test]
fn frame_has_logical_grid_size() {
    let frame = render(&GridConfig::default(), 1.0, 0.0);
    assert_eq!((frame.width, frame.height), (482, 362));
    assert_eq!(frame.data.len(), 482 * 362 * 4);
    assert!(frame.premultiplied);
}

#[test]
fn density_scales_the_pixel_buffer() {
    let frame = render(&GridConfig::default(), 2.0, 0.0);
    assert_eq!((frame.width, frame.height), (964, 724));
}

#[test]
fn background_and_crest_cells() {
    let frame = render(&GridConfig::default(), 1.0, 0.0);

    // Corner pixel sits in the gap: plain background.
    let bg = frame.pixel(0, 0).unwrap();
    assert_eq!(bg[3], 255);
    assert!(bg[0] <= 16 && bg[1] <= 16 && bg[2] <= 16, "{bg:?}");

    // Middle row, column next to the crest: green palette, clearly lit.
    let lit = frame.pixel(2 + 9 * 24 + 11, 2 + 7 * 24 + 11).unwrap();
    assert!(lit[1] > 100, "{lit:?}");
    assert!(u16::from(lit[1]) > u16::from(lit[0]) * 2, "{lit:?}");
    assert!(lit[2] < 40, "{lit:?}");
}

#[test]
fn bright_cells_glow_into_the_gaps() {
    let frame = render(&GridConfig::default(), 1.0, 0.0);
    let gap_near_crest = frame.pixel(2 + 9 * 24 + 22, 2 + 7 * 24 + 11).unwrap();
    let gap_far_away = frame.pixel(2 + 19 * 24 + 22, 2 + 7 * 24 + 11).unwrap();
    assert!(
        u16::from(gap_near_crest[1]) > u16::from(gap_far_away[1]) + 10,
        "{gap_near_crest:?} vs {gap_far_away:?}"
    );
}

#[test]
fn zero_speed_renders_identical_frames() {
    let mut cfg = GridConfig::default();
    cfg.apply(Control::Speed(0.0));
    let a = render(&cfg, 1.0, 0.0);
    let b = render(&cfg, 1.0, 42.0);
    assert_eq!(digest_u64(&a.data), digest_u64(&b.data));
}

#[test]
fn moving_wave_changes_the_frame() {
    let cfg = GridConfig::default();
    let a = render(&cfg, 1.0, 0.0);
    let b = render(&cfg, 1.0, 0.7);
    assert_ne!(digest_u64(&a.data), digest_u64(&b.data));
}

#[test]
fn palette_changes_cell_colors() {
    let mut cfg = GridConfig::default();
    let green = render(&cfg, 1.0, 0.0);
    cfg.apply(Control::Palette(2));
    let fire = render(&cfg, 1.0, 0.0);

    let (x, y) = (2 + 9 * 24 + 11, 2 + 7 * 24 + 11);
    let g = green.pixel(x, y).unwrap();
    let f = fire.pixel(x, y).unwrap();
    assert!(g[1] > g[0]);
    assert!(f[0] > f[1]);
}

#[test]
fn rendering_is_deterministic() {
    let cfg = GridConfig::default();
    let a = render(&cfg, 1.0, 1.25);
    let b = render(&cfg, 1.0, 1.25);
    assert_eq!(a.data, b.data);
}

#[test]
fn single_row_grid_renders() {
    let cfg = GridConfig {
        rows: 1,
        ..GridConfig::default()
    };
    let frame = render(&cfg, 1.0, 0.0);
    assert_eq!(frame.height, 26);
    let lit = frame.pixel(2 + 9 * 24 + 11, 13).unwrap();
    assert!(lit[1] > 100, "{lit:?}");
}

#[test]
fn surface_is_reused_across_resizes() {
    let mut cfg = GridConfig::default();
    let mut surface = Surface::new(CanvasLayout::new(&cfg, 1.0));
    let mut renderer = GridRenderer::new();
    renderer.render_frame(&mut surface, &cfg, 0.0).unwrap();

    cfg.apply(Control::Rows(4));
    surface.resize(CanvasLayout::new(&cfg, 1.0));
    let frame = renderer.render_frame(&mut surface, &cfg, 0.0).unwrap();
    assert_eq!((frame.width, frame.height), (482, 98));
}
