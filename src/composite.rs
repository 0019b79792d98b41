use crate::error::{WaveGridError, WaveGridResult};

pub type PremulRgba8 = [u8; 4];

/// Source-over for premultiplied RGBA8.
pub fn over(dst: PremulRgba8, src: PremulRgba8) -> PremulRgba8 {
    let sa = src[3];
    if sa == 0 {
        return dst;
    }
    if sa == 255 {
        return src;
    }

    let inv = 255u16 - u16::from(sa);
    let mut out = [0u8; 4];
    out[3] = sa.saturating_add(mul_div255(u16::from(dst[3]), inv));
    for i in 0..3 {
        out[i] = src[i].saturating_add(mul_div255(u16::from(dst[i]), inv));
    }
    out
}

/// Composites a whole layer onto `dst`. Both buffers are premultiplied RGBA8
/// of identical dimensions.
pub fn over_in_place(dst: &mut [u8], src: &[u8]) -> WaveGridResult<()> {
    if dst.len() != src.len() || !dst.len().is_multiple_of(4) {
        return Err(WaveGridError::render(
            "over_in_place expects equal-length rgba8 buffers",
        ));
    }
    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        if s[3] == 0 {
            continue;
        }
        let out = over([d[0], d[1], d[2], d[3]], [s[0], s[1], s[2], s[3]]);
        d.copy_from_slice(&out);
    }
    Ok(())
}

/// Flattens premultiplied (or straight) RGBA8 onto an opaque background.
pub fn flatten_to_opaque_rgba8(
    dst: &mut [u8],
    src: &[u8],
    src_is_premul: bool,
    bg_rgba: [u8; 4],
) -> WaveGridResult<()> {
    if dst.len() != src.len() || !dst.len().is_multiple_of(4) {
        return Err(WaveGridError::render(
            "flatten_to_opaque_rgba8 expects equal-length rgba8 buffers",
        ));
    }

    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let a = u16::from(s[3]);
        if a == 255 {
            d.copy_from_slice(s);
            continue;
        }

        let inv = 255u16 - a;
        for c in 0..3 {
            let fg = if src_is_premul {
                s[c]
            } else {
                mul_div255(u16::from(s[c]), a)
            };
            d[c] = fg.saturating_add(mul_div255(u16::from(bg_rgba[c]), inv));
        }
        d[3] = 255;
    }

    Ok(())
}

pub(crate) fn mul_div255(x: u16, y: u16) -> u8 {
    (((u32::from(x) * u32::from(y)) + 127) / 255).min(255) as u8
}
