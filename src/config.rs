use std::{ops::RangeInclusive, path::Path};

use crate::{
    error::{WaveGridError, WaveGridResult},
    palette,
};

// Input hints for front ends. The library itself does not enforce them.
pub const ROWS_RANGE: RangeInclusive<u32> = 4..=80;
pub const COLS_RANGE: RangeInclusive<u32> = 4..=120;
pub const CELL_SIZE_RANGE: RangeInclusive<f64> = 8.0..=40.0;
pub const GAP_RANGE: RangeInclusive<f64> = 0.0..=6.0;
pub const SPEED_RANGE: RangeInclusive<f64> = 0.2..=3.0;
pub const WAVE_WIDTH_RANGE: RangeInclusive<f64> = 1.0..=8.0;

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub rows: u32,
    pub cols: u32,
    pub cell_size: f64,
    pub gap: f64,
    pub speed: f64,
    pub wave_width: f64,
    pub palette_index: usize,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            rows: 15,
            cols: 20,
            cell_size: 22.0,
            gap: 2.0,
            speed: 1.2,
            wave_width: 3.5,
            palette_index: 0,
        }
    }
}

/// A single user control. Each variant sets exactly one field.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Control {
    Rows(u32),
    Cols(u32),
    CellSize(f64),
    Gap(f64),
    Speed(f64),
    WaveWidth(f64),
    Palette(usize),
    ToggleRunning,
}

impl Control {
    pub fn changes_geometry(&self) -> bool {
        matches!(
            self,
            Control::Rows(_) | Control::Cols(_) | Control::CellSize(_) | Control::Gap(_)
        )
    }
}

impl GridConfig {
    pub fn from_json_file(path: &Path) -> WaveGridResult<Self> {
        use anyhow::Context as _;

        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read config '{}'", path.display()))?;
        let mut cfg: GridConfig = serde_json::from_slice(&bytes).map_err(|e| {
            WaveGridError::validation(format!("invalid config '{}': {e}", path.display()))
        })?;
        cfg.palette_index = palette::wrap_index(cfg.palette_index);
        Ok(cfg)
    }

    /// Applies a configuration control. `ToggleRunning` is owned by the clock
    /// and leaves the config untouched. Returns true if the grid geometry changed.
    pub fn apply(&mut self, control: Control) -> bool {
        match control {
            Control::Rows(v) => self.rows = v,
            Control::Cols(v) => self.cols = v,
            Control::CellSize(v) => self.cell_size = v,
            Control::Gap(v) => self.gap = v,
            Control::Speed(v) => self.speed = v,
            Control::WaveWidth(v) => self.wave_width = v,
            Control::Palette(i) => self.palette_index = palette::wrap_index(i),
            Control::ToggleRunning => {}
        }
        control.changes_geometry()
    }

    pub fn advance_palette(&mut self) {
        self.palette_index = palette::next_index(self.palette_index);
    }

    pub fn palette(&self) -> &'static palette::Palette {
        palette::palette_at(self.palette_index)
    }

    pub fn recording_file_name(&self) -> String {
        crate::recorder::recording_file_name(self.rows, self.cols)
    }
}
