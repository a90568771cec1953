//! Lowpass FIR tap design (component J): an equiripple Remez exchange that
//! can fail to converge, with a windowed-sinc fallback that cannot.

use crate::error::DesignError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LowpassSpec {
    pub sample_rate: f64,
    pub pass_edge: f64,
    pub stop_edge: f64,
    /// Linear passband ripple, used to weight the Remez exchange.
    pub pass_ripple: f64,
    /// Linear stopband ripple, used to weight the Remez exchange.
    pub stop_ripple: f64,
}

/// Bellanger's length estimate for an equiripple lowpass, shared by both
/// design paths so their outputs are comparable in length.
fn estimate_length(spec: &LowpassSpec) -> usize {
    let delta_p = spec.pass_ripple.max(1e-6);
    let delta_s = spec.stop_ripple.max(1e-9);
    let transition = ((spec.stop_edge - spec.pass_edge) / spec.sample_rate).max(1e-6);
    let n = -2.0 / 3.0 * (10.0 * delta_p * delta_s).log10() / transition;
    let n = n.ceil().max(3.0) as usize;
    if n % 2 == 0 {
        n + 1
    } else {
        n
    }
}

/// Windowed-sinc lowpass design with a Hamming window. Always succeeds.
pub fn windowed_sinc_lowpass(spec: &LowpassSpec) -> Vec<f32> {
    let len = estimate_length(spec);
    let cutoff = (spec.pass_edge + spec.stop_edge) / 2.0 / spec.sample_rate;
    let order = (len - 1) as f64;

    let mut taps = Vec::with_capacity(len);
    for n in 0..len {
        let k = n as f64 - order / 2.0;
        let sinc = if k.abs() < 1e-9 {
            2.0 * cutoff
        } else {
            (2.0 * std::f64::consts::PI * cutoff * k).sin() / (std::f64::consts::PI * k)
        };
        let window = 0.54 - 0.46 * (2.0 * std::f64::consts::PI * n as f64 / order).cos();
        taps.push((sinc * window) as f32);
    }
    normalize_dc_gain(&mut taps);
    taps
}

/// Parks-McClellan style equiripple lowpass design via a Remez exchange.
/// Fails if the grid can't support enough extremal points or the exchange
/// doesn't settle within the iteration budget.
pub fn remez_lowpass(spec: &LowpassSpec) -> Result<Vec<f32>, DesignError> {
    let len = estimate_length(spec);
    remez_exchange(len, spec).ok_or(DesignError::DidNotConverge)
}

fn normalize_dc_gain(taps: &mut [f32]) {
    let sum: f32 = taps.iter().sum();
    if sum.abs() > 1e-9 {
        for t in taps.iter_mut() {
            *t /= sum;
        }
    }
}

fn remez_exchange(num_taps: usize, spec: &LowpassSpec) -> Option<Vec<f32>> {
    let fp = spec.pass_edge / spec.sample_rate;
    let fs = spec.stop_edge / spec.sample_rate;
    if !(fp > 0.0 && fp < fs && fs < 0.5) {
        return None;
    }

    let m = (num_taps - 1) / 2;
    let r = m + 2;

    let delta_p = spec.pass_ripple.max(1e-6);
    let delta_s = spec.stop_ripple.max(1e-9);
    let weight = |f: f64| -> f64 { if f <= fp { 1.0 } else { delta_p / delta_s } };
    let desired = |f: f64| -> f64 { if f <= fp { 1.0 } else { 0.0 } };

    let grid_points = (r * 16).max(64);
    let pass_width = fp;
    let stop_width = 0.5 - fs;
    let total_width = pass_width + stop_width;
    let mut grid = Vec::with_capacity(grid_points);
    for i in 0..grid_points {
        let t = i as f64 / (grid_points - 1) as f64;
        let pos = t * total_width;
        let f = if pos <= pass_width { pos } else { fs + (pos - pass_width) };
        grid.push(f);
    }
    grid.dedup_by(|a, b| (*a - *b).abs() < 1e-12);
    if grid.len() < r {
        return None;
    }

    let mut extrema: Vec<usize> = (0..r).map(|i| i * (grid.len() - 1) / (r - 1)).collect();

    let mut coeffs = vec![0.0f64; m + 1];
    let mut delta = 0.0f64;

    const MAX_ITERATIONS: usize = 30;
    for _ in 0..MAX_ITERATIONS {
        let mut a = vec![vec![0.0f64; r]; r];
        let mut b = vec![0.0f64; r];
        for (row, &idx) in extrema.iter().enumerate() {
            let f = grid[idx];
            for k in 0..=m {
                a[row][k] = (2.0 * std::f64::consts::PI * f * k as f64).cos();
            }
            let sign = if row % 2 == 0 { 1.0 } else { -1.0 };
            a[row][m + 1] = sign / weight(f);
            b[row] = desired(f);
        }
        let solution = solve_linear(a, b)?;
        coeffs = solution[..=m].to_vec();
        delta = solution[m + 1];

        let amplitude = |f: f64| -> f64 {
            coeffs
                .iter()
                .enumerate()
                .map(|(k, &a_k)| a_k * (2.0 * std::f64::consts::PI * f * k as f64).cos())
                .sum()
        };
        let error: Vec<f64> = grid.iter().map(|&f| weight(f) * (desired(f) - amplitude(f))).collect();

        let mut candidates = Vec::new();
        for i in 0..grid.len() {
            let left_ok = i == 0 || error[i].abs() >= error[i - 1].abs();
            let right_ok = i + 1 == grid.len() || error[i].abs() >= error[i + 1].abs();
            if left_ok && right_ok {
                candidates.push(i);
            }
        }
        if candidates.len() < r {
            return None;
        }
        candidates.sort_by(|&x, &y| error[y].abs().partial_cmp(&error[x].abs()).unwrap());
        let mut chosen: Vec<usize> = candidates.into_iter().take(r).collect();
        chosen.sort_unstable();

        let converged = chosen == extrema;
        extrema = chosen;
        if converged {
            break;
        }
    }

    if delta.abs() < 1e-9 {
        return None;
    }

    let len = 2 * m + 1;
    let mut taps = vec![0.0f32; len];
    taps[m] = coeffs[0] as f32;
    for k in 1..=m {
        let v = (coeffs[k] / 2.0) as f32;
        taps[m - k] = v;
        taps[m + k] = v;
    }
    Some(taps)
}

/// Gaussian elimination with partial pivoting, for the Remez interpolation system.
fn solve_linear(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let mut pivot = col;
        let mut best = a[col][col].abs();
        for row in (col + 1)..n {
            if a[row][col].abs() > best {
                best = a[row][col].abs();
                pivot = row;
            }
        }
        if best < 1e-12 {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        let diag = a[col][col];
        for row in (col + 1)..n {
            let factor = a[row][col] / diag;
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let mut sum = b[row];
        for k in (row + 1)..n {
            sum -= a[row][k] * x[k];
        }
        x[row] = sum / a[row][row];
    }
    Some(x)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn narrowband_spec() -> LowpassSpec {
        LowpassSpec {
            sample_rate: 48_000.0,
            pass_edge: 5_500.0,
            stop_edge: 6_500.0,
            pass_ripple: 0.01,
            stop_ripple: 0.028,
        }
    }

    #[test]
    fn windowed_sinc_produces_odd_length_unit_dc_gain_taps() {
        let taps = windowed_sinc_lowpass(&narrowband_spec());
        assert_eq!(taps.len() % 2, 1);
        let dc_gain: f32 = taps.iter().sum();
        assert!((dc_gain - 1.0).abs() < 1e-3);
    }

    #[test]
    fn windowed_sinc_taps_are_symmetric() {
        let taps = windowed_sinc_lowpass(&narrowband_spec());
        let n = taps.len();
        for i in 0..n / 2 {
            assert!((taps[i] - taps[n - 1 - i]).abs() < 1e-6);
        }
    }

    #[test]
    fn remez_design_rejects_edges_outside_nyquist() {
        let spec = LowpassSpec {
            sample_rate: 10_000.0,
            pass_edge: 4_000.0,
            stop_edge: 6_000.0,
            ..narrowband_spec()
        };
        assert!(remez_lowpass(&spec).is_err());
    }

    #[test]
    fn remez_design_produces_symmetric_taps_when_it_converges() {
        if let Ok(taps) = remez_lowpass(&narrowband_spec()) {
            let n = taps.len();
            assert_eq!(n % 2, 1);
            for i in 0..n / 2 {
                assert!((taps[i] - taps[n - 1 - i]).abs() < 1e-4);
            }
        }
    }
}
