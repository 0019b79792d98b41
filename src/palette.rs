use std::time::Duration;

/// A named two-color gradient. Cells interpolate from `to` (intensity 0)
/// towards `from` (intensity 1).
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub struct Palette {
    pub name: &'static str,
    pub from: [u8; 3],
    pub to: [u8; 3],
}

pub const PALETTES: [Palette; 4] = [
    Palette {
        name: "Green Glow",
        from: [30, 200, 30],
        to: [0, 120, 0],
    },
    Palette {
        name: "Blue Glow",
        from: [30, 120, 200],
        to: [0, 40, 120],
    },
    Palette {
        name: "Fire",
        from: [255, 140, 0],
        to: [120, 10, 0],
    },
    Palette {
        name: "Purple",
        from: [180, 80, 220],
        to: [50, 10, 100],
    },
];

/// Wall-clock period of the automatic palette advance.
pub const PALETTE_CYCLE_PERIOD: Duration = Duration::from_millis(5000);

pub fn palette_count() -> usize {
    PALETTES.len()
}

/// Wraps any index into the palette list.
pub fn wrap_index(index: usize) -> usize {
    index % PALETTES.len()
}

pub fn palette_at(index: usize) -> &'static Palette {
    &PALETTES[wrap_index(index)]
}

pub fn next_index(index: usize) -> usize {
    wrap_index(wrap_index(index) + 1)
}

pub fn find_by_name(name: &str) -> Option<usize> {
    PALETTES
        .iter()
        .position(|p| p.name.eq_ignore_ascii_case(name.trim()))
}
