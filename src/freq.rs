//! Cepstral-domain DSP: conversion from Bark-scale cepstral features to
//! linear-prediction coefficients.
//!
//! The synthesis loop derives one LPC set per frame from the first
//! [`NB_BANDS`] feature slots: inverse DCT back to log band energies,
//! exponentiation with per-band compensation, interpolation to a full
//! spectrum, inverse transform to an autocorrelation, and a
//! Levinson-Durbin recursion.

use std::sync::{Arc, OnceLock};

use num_complex::Complex32;
use rustfft::{Fft, FftPlanner};

// --- Constants ---

/// LPC order of the short-term predictor.
pub const LPC_ORDER: usize = 16;

/// Samples per synthesis frame (10 ms at 16 kHz).
pub const FRAME_SIZE: usize = 160;

/// Analysis window size in samples.
pub const WINDOW_SIZE: usize = 2 * FRAME_SIZE;

/// Frequency bins (half window + 1).
pub const FREQ_SIZE: usize = WINDOW_SIZE / 2 + 1;

/// Number of Bark-scale frequency bands.
pub const NB_BANDS: usize = 18;

/// Width of one band unit in frequency bins.
const BAND_BIN_STRIDE: usize = 4;

/// Band edges in band units.
static EBAND5MS: [usize; NB_BANDS] = [
    0, 1, 2, 3, 4, 5, 6, 7, 8, 10, 12, 14, 16, 20, 24, 28, 34, 40,
];

/// Compensation factors per band.
static COMPENSATION: [f32; NB_BANDS] = [
    0.8, 1., 1., 1., 1., 1., 1., 1., 0.666667, 0.5, 0.5, 0.5, 0.333333, 0.25, 0.25, 0.2, 0.166667,
    0.173913,
];

// --- DCT ---

fn dct_table() -> &'static [f32] {
    static TABLE: OnceLock<Vec<f32>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut t = vec![0.0f32; NB_BANDS * NB_BANDS];
        for i in 0..NB_BANDS {
            for j in 0..NB_BANDS {
                let mut v =
                    ((i as f64 + 0.5) * j as f64 * std::f64::consts::PI / NB_BANDS as f64).cos();
                if j == 0 {
                    v *= 0.5f64.sqrt();
                }
                t[i * NB_BANDS + j] = v as f32;
            }
        }
        t
    })
}

/// Inverse DCT (type-III) over NB_BANDS values.
fn idct(out: &mut [f32], input: &[f32]) {
    let table = dct_table();
    let scale = (2.0f64 / NB_BANDS as f64).sqrt();
    for i in 0..NB_BANDS {
        let mut sum = 0.0f32;
        for j in 0..NB_BANDS {
            sum += input[j] * table[i * NB_BANDS + j];
        }
        out[i] = (sum as f64 * scale) as f32;
    }
}

// --- Spectrum ---

/// Interpolate band gains to per-bin gains with triangular overlap.
fn interp_band_gain(g: &mut [f32], band_e: &[f32]) {
    for x in g[..FREQ_SIZE].iter_mut() {
        *x = 0.0;
    }
    for i in 0..NB_BANDS - 1 {
        let band_size = (EBAND5MS[i + 1] - EBAND5MS[i]) * BAND_BIN_STRIDE;
        for j in 0..band_size {
            let frac = j as f32 / band_size as f32;
            g[EBAND5MS[i] * BAND_BIN_STRIDE + j] = (1.0 - frac) * band_e[i] + frac * band_e[i + 1];
        }
    }
}

/// Inverse real transform: FREQ_SIZE half-spectrum -> WINDOW_SIZE samples.
///
/// Output carries the window-size scale factor (an unnormalized inverse
/// DFT), which the autocorrelation conditioning below expects.
fn inverse_transform(out: &mut [f32], input: &[Complex32]) {
    static INVERSE_FFT: OnceLock<Arc<dyn Fft<f32>>> = OnceLock::new();
    let fft = INVERSE_FFT.get_or_init(|| FftPlanner::new().plan_fft_inverse(WINDOW_SIZE));

    let mut x = vec![Complex32::new(0.0, 0.0); WINDOW_SIZE];
    x[..FREQ_SIZE].copy_from_slice(&input[..FREQ_SIZE]);
    // Mirror conjugate for a real-valued result
    for i in FREQ_SIZE..WINDOW_SIZE {
        x[i] = x[WINDOW_SIZE - i].conj();
    }
    fft.process(&mut x);
    for i in 0..WINDOW_SIZE {
        out[i] = x[i].re;
    }
}

// --- LPC ---

/// Levinson-Durbin recursion from autocorrelation.
///
/// Returns the residual prediction error.
fn levinson(lpc: &mut [f32], ac: &[f32], p: usize) -> f32 {
    for x in lpc[..p].iter_mut() {
        *x = 0.0;
    }
    let mut error = ac[0];
    if ac[0] == 0.0 {
        return error;
    }
    for i in 0..p {
        // This iteration's reflection coefficient
        let mut rr: f32 = 0.0;
        for j in 0..i {
            rr += lpc[j] * ac[i - j];
        }
        rr += ac[i + 1];
        let r = -rr / error;
        lpc[i] = r;
        for j in 0..(i + 1) >> 1 {
            let tmp1 = lpc[j];
            let tmp2 = lpc[i - 1 - j];
            lpc[j] = tmp1 + r * tmp2;
            lpc[i - 1 - j] = tmp2 + r * tmp1;
        }

        error -= r * r * error;
        // Bail out once we get 30 dB gain
        if error < 0.001 * ac[0] {
            break;
        }
    }
    error
}

/// Compute LPC coefficients from linear band energies.
fn lpc_from_bands(lpc: &mut [f32], ex: &[f32]) -> f32 {
    let mut xr = [0.0f32; FREQ_SIZE];
    interp_band_gain(&mut xr, ex);
    xr[FREQ_SIZE - 1] = 0.0;
    let mut spectrum = vec![Complex32::new(0.0, 0.0); FREQ_SIZE];
    for i in 0..FREQ_SIZE {
        spectrum[i].re = xr[i];
    }
    let mut x_auto = [0.0f32; WINDOW_SIZE];
    inverse_transform(&mut x_auto, &spectrum);
    let mut ac = [0.0f32; LPC_ORDER + 1];
    ac[..LPC_ORDER + 1].copy_from_slice(&x_auto[..LPC_ORDER + 1]);

    // -40 dB noise floor
    ac[0] += ac[0] * 1e-4 + 320.0 / 12.0 / 38.0;
    // Lag windowing
    for i in 1..LPC_ORDER + 1 {
        ac[i] *= 1.0 - 6e-5 * (i * i) as f32;
    }
    levinson(lpc, &ac, LPC_ORDER)
}

/// Compute LPC coefficients from cepstral features.
///
/// `cepstrum` holds at least [`NB_BANDS`] coefficients; `lpc` receives
/// [`LPC_ORDER`] coefficients. Returns the residual prediction error.
pub fn lpc_from_cepstrum(lpc: &mut [f32], cepstrum: &[f32]) -> f32 {
    let mut tmp = [0.0f32; NB_BANDS];
    tmp[..NB_BANDS].copy_from_slice(&cepstrum[..NB_BANDS]);
    tmp[0] += 4.0;
    let mut ex = [0.0f32; NB_BANDS];
    idct(&mut ex, &tmp);
    for i in 0..NB_BANDS {
        ex[i] = (10.0f32).powf(ex[i]) * COMPENSATION[i];
    }
    lpc_from_bands(lpc, &ex)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Forward type-II DCT, for checking the inverse.
    fn dct(out: &mut [f32], input: &[f32]) {
        let table = dct_table();
        let scale = (2.0f64 / NB_BANDS as f64).sqrt();
        for i in 0..NB_BANDS {
            let mut sum = 0.0f32;
            for j in 0..NB_BANDS {
                sum += input[j] * table[j * NB_BANDS + i];
            }
            out[i] = (sum as f64 * scale) as f32;
        }
    }

    #[test]
    fn idct_inverts_dct() {
        let input: Vec<f32> = (0..NB_BANDS).map(|i| (i as f32 * 0.7).sin()).collect();
        let mut coeffs = [0.0f32; NB_BANDS];
        let mut back = [0.0f32; NB_BANDS];
        dct(&mut coeffs, &input);
        idct(&mut back, &coeffs);
        for i in 0..NB_BANDS {
            assert!((back[i] - input[i]).abs() < 1e-4, "band {i}");
        }
    }

    #[test]
    fn interp_band_gain_is_piecewise_linear() {
        let mut bands = [0.0f32; NB_BANDS];
        bands[0] = 1.0;
        bands[1] = 3.0;
        let mut g = [0.0f32; FREQ_SIZE];
        interp_band_gain(&mut g, &bands);
        // First band spans 4 bins, ramping 1.0 -> 3.0
        assert_eq!(g[0], 1.0);
        assert_eq!(g[2], 2.0);
        assert_eq!(g[4], 3.0);
    }

    #[test]
    fn inverse_transform_of_flat_spectrum_is_impulse() {
        // A constant spectrum transforms to an impulse of height WINDOW_SIZE
        // at lag zero (unnormalized inverse DFT).
        let mut spectrum = vec![Complex32::new(1.0, 0.0); FREQ_SIZE];
        // Zero the Nyquist bin like the LPC path does.
        spectrum[FREQ_SIZE - 1] = Complex32::new(0.0, 0.0);
        let mut out = [0.0f32; WINDOW_SIZE];
        inverse_transform(&mut out, &spectrum);
        assert!((out[0] - (WINDOW_SIZE as f32 - 1.0)).abs() < 1e-2);
        for (i, &v) in out.iter().enumerate().skip(1) {
            assert!(v.abs() < 1.01, "lag {i}");
        }
    }

    #[test]
    fn levinson_recovers_first_order_predictor() {
        // AR(1): x[n] = a*x[n-1] + e[n] has autocorrelation a^k.
        let a = 0.9f32;
        let mut ac = [0.0f32; LPC_ORDER + 1];
        for (k, v) in ac.iter_mut().enumerate() {
            *v = a.powi(k as i32);
        }
        let mut lpc = [0.0f32; LPC_ORDER];
        levinson(&mut lpc, &ac, LPC_ORDER);
        assert!((lpc[0] - (-a)).abs() < 1e-3);
        for &c in &lpc[1..] {
            assert!(c.abs() < 1e-2);
        }
    }

    #[test]
    fn lpc_from_flat_cepstrum_is_finite_and_stable() {
        let cepstrum = [0.0f32; NB_BANDS];
        let mut lpc = [0.0f32; LPC_ORDER];
        let err = lpc_from_cepstrum(&mut lpc, &cepstrum);
        assert!(err.is_finite());
        for &c in &lpc {
            assert!(c.is_finite());
            assert!(c.abs() < 2.0);
        }
    }
}
