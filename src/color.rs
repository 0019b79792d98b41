use std::fmt;

use crate::palette::Palette;

/// Straight (non-premultiplied) cell color with a fractional alpha.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CellColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f64,
}

impl CellColor {
    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: f64) -> Self {
        Self { r, g, b, a }
    }

    pub fn alpha_u8(self) -> u8 {
        (self.a.clamp(0.0, 1.0) * 255.0).round() as u8
    }

    pub fn to_rgba8_premul(self) -> [u8; 4] {
        let a = self.a.clamp(0.0, 1.0);
        let premul = |c: u8| -> u8 { (f64::from(c) * a).round() as u8 };
        [premul(self.r), premul(self.g), premul(self.b), self.alpha_u8()]
    }

    pub fn to_paint(self) -> vello_cpu::peniko::Color {
        vello_cpu::peniko::Color::from_rgba8(self.r, self.g, self.b, self.alpha_u8())
    }
}

impl fmt::Display for CellColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rgba({}, {}, {}, {})", self.r, self.g, self.b, self.a)
    }
}

/// Maps an intensity in `[0, 1]` to a palette color.
///
/// Channels interpolate linearly from `to` (x = 0) to `from` (x = 1). Alpha has
/// a floor of 0.25 and grows with `sqrt(x)` so dim cells stay faintly visible.
pub fn color_for(intensity: f64, palette: &Palette) -> CellColor {
    let x = if intensity.is_nan() {
        0.0
    } else {
        intensity.clamp(0.0, 1.0)
    };
    let mix = |from: u8, to: u8| -> u8 {
        (f64::from(from) * x + f64::from(to) * (1.0 - x))
            .round()
            .clamp(0.0, 255.0) as u8
    };
    CellColor {
        r: mix(palette.from[0], palette.to[0]),
        g: mix(palette.from[1], palette.to[1]),
        b: mix(palette.from[2], palette.to[2]),
        a: (0.25 + x.sqrt() * 0.85).min(1.0),
    }
}
