//! Mu-law companding between linear 16-bit amplitude and a 256-symbol
//! alphabet.
//!
//! The round trip is lossy by design: the quantizer is a fixed monotonic
//! piecewise-logarithmic compressor, and the recurrent model consumes and
//! produces the companded codes directly.

/// Compand a linear sample (nominally in ±32768) to a mu-law code.
///
/// Zero maps to code 128; the extremes saturate at 0 and 255.
pub fn lin2ulaw(x: f32) -> u8 {
    let scale = 255.0f64 / 32768.0;
    let s = if x >= 0.0 { 1.0f64 } else { -1.0 };
    let x = (x as f64).abs();
    let mut u = 128.0 + s * (128.0 * (1.0 + scale * x).ln() / 256.0f64.ln());
    if u < 0.0 {
        u = 0.0;
    }
    if u > 255.0 {
        u = 255.0;
    }
    (0.5 + u).floor() as u8
}

/// Expand a mu-law code back to a linear sample.
pub fn ulaw2lin(u: u8) -> f32 {
    let scale_1 = 32768.0f64 / 255.0;
    let u = u as f64 - 128.0;
    let s = if u >= 0.0 { 1.0f64 } else { -1.0 };
    let u = u.abs();
    (s * scale_1 * ((u / 128.0 * 256.0f64.ln()).exp() - 1.0)) as f32
}
