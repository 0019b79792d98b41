//! Closed-form wave field evaluated independently per cell.

/// Parameters of the wave field that come from the grid configuration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WaveParams {
    pub cols: u32,
    pub speed: f64,
    pub wave_width: f64,
}

impl WaveParams {
    pub fn phase(&self, t: f64) -> f64 {
        t * self.speed
    }

    /// Column position of the wave crest, oscillating across `[0, cols-1]`.
    pub fn center(&self, t: f64) -> f64 {
        let span = f64::from(self.cols.max(1) - 1);
        ((self.phase(t) * 0.8).sin() * 0.5 + 0.5) * span
    }

    /// Column intensity in `[0, 1]` for column `j` at time `t`.
    pub fn column_intensity(&self, j: u32, t: f64) -> f64 {
        let phase = self.phase(t);
        let j = f64::from(j);
        let dist = (j - self.center(t)).abs();
        let base = (1.0 - (dist / self.wave_width).powi(2)).max(0.0);
        let shimmer = 0.6 + 0.4 * (phase * 2.0 + j).sin();
        clamp01(base * shimmer)
    }
}

/// Triangular row shaping: 1 at the middle, 0 at the first and last rows.
pub fn row_factor(i: u32, rows: u32) -> f64 {
    if rows <= 1 {
        return 1.0;
    }
    let half = f64::from(rows - 1) / 2.0;
    1.0 - ((f64::from(i) - half) / half).abs()
}

pub fn cell_intensity(column_intensity: f64, row_factor: f64) -> f64 {
    clamp01(column_intensity * (0.5 + 0.5 * row_factor))
}

// NaN (e.g. a zero wave width at the crest) collapses to 0 like a dark cell.
fn clamp01(v: f64) -> f64 {
    if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) }
}

#[cfg(test)]
mod tests {
    use std::f64::consts::PI;

    use proptest::prelude::*;

    use super::*;

    fn params(cols: u32, speed: f64, wave_width: f64) -> WaveParams {
        WaveParams {
            cols,
            speed,
            wave_width,
        }
    }

    #[test]
    fn row_factor_peaks_in_the_middle_and_vanishes_at_edges() {
        assert_eq!(row_factor(0, 15), 0.0);
        assert_eq!(row_factor(14, 15), 0.0);
        assert_eq!(row_factor(7, 15), 1.0);

        let a = row_factor(1, 4);
        let b = row_factor(2, 4);
        assert!((a - b).abs() < 1e-12);
        assert!(a > row_factor(0, 4));
        assert_eq!(row_factor(3, 4), 0.0);
    }

    #[test]
    fn single_row_has_full_factor() {
        assert_eq!(row_factor(0, 1), 1.0);
        assert_eq!(row_factor(0, 0), 1.0);
    }

    #[test]
    fn zero_speed_freezes_the_field() {
        let p = params(20, 0.0, 3.5);
        for j in 0..20 {
            assert_eq!(p.column_intensity(j, 0.0), p.column_intensity(j, 123.4));
        }
    }

    #[test]
    fn crest_column_is_brightest_when_shimmer_is_neutral() {
        // phase = 0: center sits mid-grid, shimmer is 0.6 + 0.4*sin(j).
        let p = params(21, 1.0, 3.0);
        assert_eq!(p.center(0.0), 10.0);
        let at_crest = p.column_intensity(10, 0.0);
        let expected = 0.6 + 0.4 * 10f64.sin();
        assert!((at_crest - expected).abs() < 1e-12);
        assert_eq!(p.column_intensity(0, 0.0), 0.0);
    }

    #[test]
    fn zero_wave_width_does_not_produce_nan() {
        let p = params(21, 1.0, 0.0);
        for j in 0..21 {
            let v = p.column_intensity(j, 0.0);
            assert!((0.0..=1.0).contains(&v));
        }
    }

    proptest! {
        #[test]
        fn column_intensity_is_in_unit_range(
            j in 0u32..120,
            cols in 4u32..120,
            t in -1.0e4f64..1.0e4,
            speed in 0.2f64..3.0,
            width in 1.0f64..8.0,
        ) {
            let v = params(cols, speed, width).column_intensity(j, t);
            prop_assert!((0.0..=1.0).contains(&v));
        }

        #[test]
        fn center_repeats_every_center_period(t in 0.0f64..100.0, speed in 0.2f64..3.0) {
            let p = params(20, speed, 3.5);
            let period_t = (2.0 * PI / 0.8) / speed;
            prop_assert!((p.center(t) - p.center(t + period_t)).abs() < 1e-6);
        }

        #[test]
        fn full_field_repeats_every_common_period(j in 0u32..20, t in 0.0f64..100.0) {
            // lcm(2pi/0.8, pi) = 5pi in phase units
            let p = params(20, 1.0, 3.5);
            let a = p.column_intensity(j, t);
            let b = p.column_intensity(j, t + 5.0 * PI);
            prop_assert!((a - b).abs() < 1e-6);
        }

        #[test]
        fn cell_intensity_never_exceeds_column_intensity(
            col in 0.0f64..=1.0,
            i in 0u32..80,
            rows in 1u32..80,
        ) {
            let v = cell_intensity(col, row_factor(i.min(rows - 1), rows));
            prop_assert!(v <= col + 1e-12);
            prop_assert!(v >= 0.5 * col - 1e-12);
        }
    }
}
