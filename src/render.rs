use crate::{
    canvas::{CanvasLayout, Surface},
    color::{CellColor, color_for},
    composite,
    config::GridConfig,
    error::{WaveGridError, WaveGridResult},
    glow::{GlowCache, paint_rect_glow},
    palette::Palette,
    wave::{WaveParams, cell_intensity, row_factor},
};

pub const BACKGROUND: CellColor = CellColor::opaque(0x0a, 0x0a, 0x0a);
const BASE_CELL: CellColor = CellColor::opaque(0x0c, 0x0c, 0x0c);
const BASE_BORDER: CellColor = CellColor::rgba(0, 0, 0, 0.5);
const BASE_LAYER_OPACITY: f32 = 0.12;
const CELL_BORDER: CellColor = CellColor::rgba(0, 0, 0, 0.6);

/// Cells at or below this intensity are left as base texture.
pub const VISIBLE_THRESHOLD: f64 = 0.02;
/// Cells above this intensity cast a glow.
pub const GLOW_THRESHOLD: f64 = 0.15;
const GLOW_MIN_BLUR: f64 = 6.0;
const GLOW_BLUR_SCALE: f64 = 18.0;

#[derive(Clone, Debug)]
pub struct FrameRGBA {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
    pub premultiplied: bool,
}

impl FrameRGBA {
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = ((y * self.width + x) * 4) as usize;
        Some([
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ])
    }

    /// Straight, fully opaque RGBA8 over `bg_rgba` (PNG export, encoding).
    pub fn to_opaque_rgba8(&self, bg_rgba: [u8; 4]) -> WaveGridResult<Vec<u8>> {
        let mut out = vec![0u8; self.data.len()];
        composite::flatten_to_opaque_rgba8(&mut out, &self.data, self.premultiplied, bg_rgba)?;
        Ok(out)
    }

    /// Copies this frame onto a `width x height` frame filled with `bg_rgba`,
    /// anchored top-left and cropped where it does not fit.
    pub fn fit_to(&self, width: u32, height: u32, bg_rgba: [u8; 4]) -> FrameRGBA {
        if width == self.width && height == self.height {
            return self.clone();
        }
        let mut data = bg_rgba.repeat(width as usize * height as usize);
        let copy_w = self.width.min(width) as usize * 4;
        for y in 0..self.height.min(height) as usize {
            let src = y * self.width as usize * 4;
            let dst = y * width as usize * 4;
            data[dst..dst + copy_w].copy_from_slice(&self.data[src..src + copy_w]);
        }
        FrameRGBA {
            width,
            height,
            data,
            premultiplied: self.premultiplied,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DrawStats {
    pub lit: usize,
    pub glowing: usize,
}

/// Row-major per-cell intensities for the given layout at wave time `t`.
pub fn cell_intensities(layout: &CanvasLayout, cfg: &GridConfig, t: f64) -> Vec<f64> {
    let params = WaveParams {
        cols: layout.cols,
        speed: cfg.speed,
        wave_width: cfg.wave_width,
    };
    let rows = layout.rows as usize;
    let cols = layout.cols as usize;
    let mut out = vec![0.0; rows * cols];
    for j in 0..layout.cols {
        let col = params.column_intensity(j, t);
        for i in 0..layout.rows {
            out[i as usize * cols + j as usize] = cell_intensity(col, row_factor(i, layout.rows));
        }
    }
    out
}

pub fn glow_blur(intensity: f64) -> f64 {
    (intensity * GLOW_BLUR_SCALE).max(GLOW_MIN_BLUR)
}

/// CPU renderer for the wave grid.
#[derive(Default)]
pub struct GridRenderer {
    glow: GlowCache,
    cells_layer: Option<vello_cpu::Pixmap>,
}

impl GridRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Draws one frame onto `surface`. `wave_time` is the already scaled time
    /// argument of the wave field.
    #[tracing::instrument(skip_all, fields(rows = cfg.rows, cols = cfg.cols))]
    pub fn draw(
        &mut self,
        surface: &mut Surface,
        cfg: &GridConfig,
        wave_time: f64,
    ) -> WaveGridResult<DrawStats> {
        let layout = *surface.layout();
        let palette = cfg.palette();
        let intensities = cell_intensities(&layout, cfg, wave_time);

        draw_base(&layout, surface.pixmap_mut());

        let stats = self.draw_glow(&layout, surface.pixmap_mut(), &intensities, palette)?;

        let layer = self.cells_layer_for(&layout);
        clear_pixmap(layer, [0, 0, 0, 0]);
        draw_cells(&layout, layer, &intensities, palette);
        composite::over_in_place(
            surface.pixmap_mut().data_as_u8_slice_mut(),
            layer.data_as_u8_slice(),
        )?;

        tracing::trace!(lit = stats.lit, glowing = stats.glowing, "frame drawn");
        Ok(stats)
    }

    pub fn read_frame(&self, surface: &Surface) -> FrameRGBA {
        let (width, height) = surface.layout().device_size();
        FrameRGBA {
            width,
            height,
            data: surface.pixmap().data_as_u8_slice().to_vec(),
            premultiplied: true,
        }
    }

    pub fn render_frame(
        &mut self,
        surface: &mut Surface,
        cfg: &GridConfig,
        wave_time: f64,
    ) -> WaveGridResult<FrameRGBA> {
        self.draw(surface, cfg, wave_time)?;
        Ok(self.read_frame(surface))
    }

    fn draw_glow(
        &mut self,
        layout: &CanvasLayout,
        pixmap: &mut vello_cpu::Pixmap,
        intensities: &[f64],
        palette: &Palette,
    ) -> WaveGridResult<DrawStats> {
        let (width, height) = layout.device_size();
        let dst = pixmap.data_as_u8_slice_mut();
        let mut stats = DrawStats::default();

        for (idx, &intensity) in intensities.iter().enumerate() {
            if intensity <= VISIBLE_THRESHOLD {
                continue;
            }
            stats.lit += 1;
            if intensity <= GLOW_THRESHOLD {
                continue;
            }
            stats.glowing += 1;

            let (i, j) = cell_index(layout, idx)?;
            let color = color_for(intensity, palette).to_rgba8_premul();
            let rect = layout.to_device(layout.cell_rect(i, j));
            let kernel = self.glow.kernel_for(glow_blur(intensity) * layout.dpr)?;
            paint_rect_glow(dst, width, height, rect, color, kernel)?;
        }
        Ok(stats)
    }

    fn cells_layer_for(&mut self, layout: &CanvasLayout) -> &mut vello_cpu::Pixmap {
        let stale = self.cells_layer.as_ref().is_none_or(|p| {
            p.width() != layout.device_width || p.height() != layout.device_height
        });
        if stale {
            self.cells_layer = None;
        }
        self.cells_layer.get_or_insert_with(|| {
            vello_cpu::Pixmap::new(layout.device_width, layout.device_height)
        })
    }
}

fn cell_index(layout: &CanvasLayout, idx: usize) -> WaveGridResult<(u32, u32)> {
    let cols = layout.cols as usize;
    if cols == 0 {
        return Err(WaveGridError::render("cell index on a grid without columns"));
    }
    Ok(((idx / cols) as u32, (idx % cols) as u32))
}

fn draw_base(layout: &CanvasLayout, pixmap: &mut vello_cpu::Pixmap) {
    let mut ctx = new_context(layout);
    ctx.set_paint(BACKGROUND.to_paint());
    ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
        0.0,
        0.0,
        layout.logical_width,
        layout.logical_height,
    ));

    ctx.push_opacity_layer(BASE_LAYER_OPACITY);
    for i in 0..layout.rows {
        for j in 0..layout.cols {
            ctx.set_paint(BASE_CELL.to_paint());
            ctx.fill_rect(&rect_to_cpu(layout.cell_rect(i, j)));
            ctx.set_paint(BASE_BORDER.to_paint());
            ctx.stroke_rect(&rect_to_cpu(layout.border_rect(i, j)));
        }
    }
    ctx.pop_layer();

    ctx.flush();
    ctx.render_to_pixmap(pixmap);
}

fn draw_cells(
    layout: &CanvasLayout,
    pixmap: &mut vello_cpu::Pixmap,
    intensities: &[f64],
    palette: &Palette,
) {
    let mut ctx = new_context(layout);
    let cols = layout.cols as usize;
    for i in 0..layout.rows {
        for j in 0..layout.cols {
            let intensity = intensities[i as usize * cols + j as usize];
            if intensity <= VISIBLE_THRESHOLD {
                continue;
            }
            ctx.set_paint(color_for(intensity, palette).to_paint());
            ctx.fill_rect(&rect_to_cpu(layout.cell_rect(i, j)));
            ctx.set_paint(CELL_BORDER.to_paint());
            ctx.stroke_rect(&rect_to_cpu(layout.border_rect(i, j)));
        }
    }
    ctx.flush();
    ctx.render_to_pixmap(pixmap);
}

fn new_context(layout: &CanvasLayout) -> vello_cpu::RenderContext {
    let mut ctx = vello_cpu::RenderContext::new(layout.device_width, layout.device_height);
    ctx.set_transform(vello_cpu::kurbo::Affine::scale(layout.dpr));
    ctx.set_stroke(vello_cpu::kurbo::Stroke::new(1.0));
    ctx
}

fn rect_to_cpu(r: kurbo::Rect) -> vello_cpu::kurbo::Rect {
    vello_cpu::kurbo::Rect::new(r.x0, r.y0, r.x1, r.y1)
}

fn clear_pixmap(pixmap: &mut vello_cpu::Pixmap, rgba: [u8; 4]) {
    for px in pixmap.data_as_u8_slice_mut().chunks_exact_mut(4) {
        px.copy_from_slice(&rgba);
    }
}
