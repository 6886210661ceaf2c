//! SPM canonical hemodynamic response function
//!
//! Double-gamma shape: a positive response peaking near 6 s minus a smaller
//! undershoot peaking near 16 s, truncated at 32 s and normalized to unit
//! sum so convolution preserves regressor scale.

use crate::math::probability::ln_gamma;

const PEAK_DELAY: f64 = 6.0;
const UNDERSHOOT_DELAY: f64 = 16.0;
const UNDERSHOOT_RATIO: f64 = 1.0 / 6.0;
const DURATION_SECS: f64 = 32.0;

// Gamma density with unit scale
fn gamma_pdf(t: f64, shape: f64) -> f64 {
    if t <= 0.0 {
        return 0.0;
    }
    ((shape - 1.0) * t.ln() - t - ln_gamma(shape)).exp()
}

/// Sample the canonical HRF at the scan repetition time
///
/// Returns one tap per scan covering the 32 s response window; always at
/// least one tap even for pathological repetition times.
pub fn spm_canonical(t_r: f64) -> Vec<f64> {
    let n_taps = ((DURATION_SECS / t_r).ceil() as usize).max(1);
    let mut taps: Vec<f64> = (0..n_taps)
        .map(|i| {
            let t = i as f64 * t_r;
            gamma_pdf(t, PEAK_DELAY) - UNDERSHOOT_RATIO * gamma_pdf(t, UNDERSHOOT_DELAY)
        })
        .collect();

    let sum: f64 = taps.iter().sum();
    if sum.abs() > f64::EPSILON {
        for tap in &mut taps {
            *tap /= sum;
        }
    }
    taps
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hrf_peaks_near_five_seconds() {
        let t_r = 1.0;
        let taps = spm_canonical(t_r);
        let peak_idx = taps
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap_or(0);
        let peak_time = peak_idx as f64 * t_r;
        assert!(
            (4.0..=6.0).contains(&peak_time),
            "peak at {peak_time}s, expected near 5s"
        );
    }

    #[test]
    fn test_hrf_has_undershoot() {
        let taps = spm_canonical(1.0);
        assert!(taps.iter().any(|&v| v < 0.0), "expected a late undershoot");
    }

    #[test]
    fn test_hrf_unit_sum() {
        let taps = spm_canonical(2.02697);
        let sum: f64 = taps.iter().sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_hrf_starts_at_zero() {
        let taps = spm_canonical(2.0);
        assert!(taps[0].abs() < 1e-12);
    }
}
