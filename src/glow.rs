//! Soft glow behind bright cells.
//!
//! A glow is the Gaussian blur of a solid rectangle. The blur is separable and
//! the rectangle is a product of two box functions, so the blurred coverage is
//! `profile_x(x) * profile_y(y)`: two short 1D convolutions per cell instead
//! of a full-image blur pass.

use std::collections::HashMap;

use crate::{
    composite::{PremulRgba8, mul_div255, over},
    error::{WaveGridError, WaveGridResult},
};

/// Normalized Gaussian weights in Q16 fixed point.
#[derive(Clone, Debug)]
pub struct GlowKernel {
    weights: Vec<u32>,
}

impl GlowKernel {
    pub fn new(radius: u32, sigma: f32) -> WaveGridResult<Self> {
        if radius == 0 {
            return Ok(Self {
                weights: vec![1 << 16],
            });
        }
        if !sigma.is_finite() || sigma <= 0.0 {
            return Err(WaveGridError::validation("glow sigma must be > 0"));
        }

        let r = radius as i32;
        let denom = 2.0 * f64::from(sigma) * f64::from(sigma);
        let raw: Vec<f64> = (-r..=r)
            .map(|i| (-f64::from(i * i) / denom).exp())
            .collect();
        let sum: f64 = raw.iter().sum();
        if sum <= 0.0 {
            return Err(WaveGridError::render("gaussian kernel sum is zero"));
        }

        let mut weights: Vec<u32> = raw
            .iter()
            .map(|w| ((w / sum) * 65536.0).round().clamp(0.0, 65536.0) as u32)
            .collect();

        // Push the rounding error into the center tap so weights sum to 1.0.
        let acc: i64 = weights.iter().map(|&w| i64::from(w)).sum();
        let mid = weights.len() / 2;
        let fixed = (i64::from(weights[mid]) + (65536 - acc)).clamp(0, 65536);
        weights[mid] = fixed as u32;

        Ok(Self { weights })
    }

    pub fn radius(&self) -> usize {
        self.weights.len() / 2
    }

    pub fn weights(&self) -> &[u32] {
        &self.weights
    }

    /// Blurred coverage (Q16) of the span `[lo, hi)` for pixels
    /// `start..start + len`.
    fn profile(&self, lo: f64, hi: f64, start: i64, len: usize) -> Vec<u32> {
        let radius = self.radius() as i64;
        let box_cov = |p: i64| -> f64 {
            let p0 = p as f64;
            (hi.min(p0 + 1.0) - lo.max(p0)).clamp(0.0, 1.0)
        };

        (0..len as i64)
            .map(|o| {
                let p = start + o;
                let acc: f64 = self
                    .weights
                    .iter()
                    .enumerate()
                    .map(|(k, &w)| f64::from(w) * box_cov(p + k as i64 - radius))
                    .sum();
                acc.round().clamp(0.0, 65536.0) as u32
            })
            .collect()
    }
}

/// Glow kernels keyed by blur size in half-pixel steps.
#[derive(Default)]
pub struct GlowCache {
    kernels: HashMap<u32, GlowKernel>,
}

impl GlowCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kernel matching a canvas-style `shadowBlur` of `blur_px` device pixels
    /// (sigma is half the blur).
    pub fn kernel_for(&mut self, blur_px: f64) -> WaveGridResult<&GlowKernel> {
        let key = (blur_px.max(0.0) * 2.0).round() as u32;
        if !self.kernels.contains_key(&key) {
            let blur = f64::from(key) / 2.0;
            let sigma = (blur / 2.0) as f32;
            let radius = (blur * 1.5).ceil() as u32;
            let kernel = if sigma > 0.0 {
                GlowKernel::new(radius, sigma)?
            } else {
                GlowKernel::new(0, 1.0)?
            };
            self.kernels.insert(key, kernel);
        }
        self.kernels
            .get(&key)
            .ok_or_else(|| WaveGridError::render("glow kernel cache miss"))
    }

    pub fn len(&self) -> usize {
        self.kernels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kernels.is_empty()
    }
}

/// Composites the blurred shadow of `rect` (device pixels) in `color` onto a
/// premultiplied RGBA8 buffer.
pub fn paint_rect_glow(
    dst: &mut [u8],
    width: u32,
    height: u32,
    rect: kurbo::Rect,
    color: PremulRgba8,
    kernel: &GlowKernel,
) -> WaveGridResult<()> {
    let expected_len = (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(4))
        .ok_or_else(|| WaveGridError::render("glow buffer size overflow"))?;
    if dst.len() != expected_len {
        return Err(WaveGridError::render(
            "paint_rect_glow expects dst matching width*height*4",
        ));
    }
    if color[3] == 0 || rect.width() <= 0.0 || rect.height() <= 0.0 {
        return Ok(());
    }

    let radius = kernel.radius() as i64;
    let x_start = (rect.x0.floor() as i64 - radius).max(0);
    let y_start = (rect.y0.floor() as i64 - radius).max(0);
    let x_end = (rect.x1.ceil() as i64 + radius).min(i64::from(width));
    let y_end = (rect.y1.ceil() as i64 + radius).min(i64::from(height));
    if x_end <= x_start || y_end <= y_start {
        return Ok(());
    }

    let px = kernel.profile(rect.x0, rect.x1, x_start, (x_end - x_start) as usize);
    let py = kernel.profile(rect.y0, rect.y1, y_start, (y_end - y_start) as usize);

    let stride = width as usize * 4;
    for (row, &cy) in py.iter().enumerate() {
        if cy == 0 {
            continue;
        }
        let row_off = (y_start as usize + row) * stride;
        for (col, &cx) in px.iter().enumerate() {
            let coverage = ((u64::from(cx) * u64::from(cy)) >> 16) as u32;
            if coverage == 0 {
                continue;
            }
            let src = scale_premul(color, coverage);
            let idx = row_off + (x_start as usize + col) * 4;
            let d = [dst[idx], dst[idx + 1], dst[idx + 2], dst[idx + 3]];
            dst[idx..idx + 4].copy_from_slice(&over(d, src));
        }
    }
    Ok(())
}

fn scale_premul(color: PremulRgba8, coverage_q16: u32) -> PremulRgba8 {
    let cov = ((coverage_q16.min(65536) * 255 + 32768) >> 16) as u16;
    [
        mul_div255(u16::from(color[0]), cov),
        mul_div255(u16::from(color[1]), cov),
        mul_div255(u16::from(color[2]), cov),
        mul_div255(u16::from(color[3]), cov),
    ]
}
