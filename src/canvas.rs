use crate::config::GridConfig;

/// Pixel geometry of the grid canvas.
///
/// Logical sizes are what the grid math works in; the device pixmap is the
/// logical size scaled by the display density and drawing happens through a
/// `scale(dpr)` transform.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
pub struct CanvasLayout {
    pub rows: u32,
    pub cols: u32,
    pub cell_size: f64,
    pub gap: f64,
    pub logical_width: f64,
    pub logical_height: f64,
    pub dpr: f64,
    pub device_width: u16,
    pub device_height: u16,
}

impl CanvasLayout {
    pub fn new(cfg: &GridConfig, dpr: f64) -> Self {
        let dpr = if dpr.is_finite() && dpr > 0.0 {
            dpr
        } else {
            1.0
        };
        let pitch = cfg.cell_size + cfg.gap;
        let logical_width = f64::from(cfg.cols) * pitch + cfg.gap;
        let logical_height = f64::from(cfg.rows) * pitch + cfg.gap;

        Self {
            rows: cfg.rows,
            cols: cfg.cols,
            cell_size: cfg.cell_size,
            gap: cfg.gap,
            logical_width,
            logical_height,
            dpr,
            device_width: device_extent(logical_width, dpr),
            device_height: device_extent(logical_height, dpr),
        }
    }

    pub fn logical_size(&self) -> (f64, f64) {
        (self.logical_width, self.logical_height)
    }

    pub fn device_size(&self) -> (u32, u32) {
        (u32::from(self.device_width), u32::from(self.device_height))
    }

    /// Logical rectangle of cell `(row, col)`.
    pub fn cell_rect(&self, row: u32, col: u32) -> kurbo::Rect {
        let pitch = self.cell_size + self.gap;
        let x = self.gap + f64::from(col) * pitch;
        let y = self.gap + f64::from(row) * pitch;
        kurbo::Rect::new(x, y, x + self.cell_size, y + self.cell_size)
    }

    /// Rectangle a 1px border is stroked on: inset by half a pixel so the
    /// line stays inside the cell.
    pub fn border_rect(&self, row: u32, col: u32) -> kurbo::Rect {
        let r = self.cell_rect(row, col);
        kurbo::Rect::new(r.x0 + 0.5, r.y0 + 0.5, r.x1 - 0.5, r.y1 - 0.5)
    }

    pub fn to_device(&self, r: kurbo::Rect) -> kurbo::Rect {
        kurbo::Rect::new(
            r.x0 * self.dpr,
            r.y0 * self.dpr,
            r.x1 * self.dpr,
            r.y1 * self.dpr,
        )
    }
}

// Degenerate geometry still yields a drawable 1x1 pixmap.
fn device_extent(logical: f64, dpr: f64) -> u16 {
    let v = (logical * dpr).round();
    if v.is_nan() {
        return 1;
    }
    v.clamp(1.0, f64::from(u16::MAX)) as u16
}

/// The mounted drawing surface: layout plus its device pixmap.
pub struct Surface {
    layout: CanvasLayout,
    pixmap: vello_cpu::Pixmap,
}

impl Surface {
    pub fn new(layout: CanvasLayout) -> Self {
        Self {
            pixmap: vello_cpu::Pixmap::new(layout.device_width, layout.device_height),
            layout,
        }
    }

    pub fn layout(&self) -> &CanvasLayout {
        &self.layout
    }

    /// Re-lays out the surface. The pixmap is reallocated only when the device
    /// size actually changes.
    pub fn resize(&mut self, layout: CanvasLayout) {
        if layout.device_width != self.layout.device_width
            || layout.device_height != self.layout.device_height
        {
            self.pixmap = vello_cpu::Pixmap::new(layout.device_width, layout.device_height);
        }
        self.layout = layout;
    }

    pub fn pixmap(&self) -> &vello_cpu::Pixmap {
        &self.pixmap
    }

    pub fn pixmap_mut(&mut self) -> &mut vello_cpu::Pixmap {
        &mut self.pixmap
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_preview_grid_is_482_by_362() {
        let cfg = GridConfig::default();
        let layout = CanvasLayout::new(&cfg, 1.0);
        assert_eq!(layout.logical_size(), (482.0, 362.0));
        assert_eq!(layout.device_size(), (482, 362));
    }

    #[test]
    fn device_pixels_scale_with_density() {
        let cfg = GridConfig::default();
        let layout = CanvasLayout::new(&cfg, 2.0);
        assert_eq!(layout.logical_size(), (482.0, 362.0));
        assert_eq!(layout.device_size(), (964, 724));

        let fractional = CanvasLayout::new(&cfg, 1.25);
        assert_eq!(fractional.device_size(), (603, 453));
    }

    #[test]
    fn invalid_density_falls_back_to_one() {
        let cfg = GridConfig::default();
        assert_eq!(CanvasLayout::new(&cfg, 0.0).dpr, 1.0);
        assert_eq!(CanvasLayout::new(&cfg, f64::NAN).dpr, 1.0);
    }

    #[test]
    fn cells_are_laid_out_on_a_pitch() {
        let layout = CanvasLayout::new(&GridConfig::default(), 1.0);
        assert_eq!(layout.cell_rect(0, 0), kurbo::Rect::new(2.0, 2.0, 24.0, 24.0));
        assert_eq!(
            layout.cell_rect(1, 2),
            kurbo::Rect::new(50.0, 26.0, 72.0, 48.0)
        );
        assert_eq!(
            layout.border_rect(0, 0),
            kurbo::Rect::new(2.5, 2.5, 23.5, 23.5)
        );
        let last = layout.cell_rect(14, 19);
        assert_eq!((last.x1 + 2.0, last.y1 + 2.0), (482.0, 362.0));
    }

    #[test]
    fn degenerate_geometry_clamps_device_size() {
        let cfg = GridConfig {
            cell_size: -30.0,
            gap: 0.0,
            ..GridConfig::default()
        };
        let layout = CanvasLayout::new(&cfg, 1.0);
        assert_eq!(layout.device_size(), (1, 1));
    }

    #[test]
    fn resize_reallocates_only_on_device_change() {
        let mut surface = Surface::new(CanvasLayout::new(&GridConfig::default(), 1.0));
        let bigger = GridConfig {
            rows: 20,
            ..GridConfig::default()
        };
        surface.resize(CanvasLayout::new(&bigger, 1.0));
        assert_eq!(surface.pixmap().height(), 482);
        assert_eq!(surface.layout().rows, 20);
    }
}
