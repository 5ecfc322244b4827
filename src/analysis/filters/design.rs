// Design module - IIR coefficient design for the filter bank
//
// Both designs produce transfer functions in b/a polynomial form with the
// frequency axis normalized to Nyquist, matching the classic iirnotch and
// butter(..., btype='band') conventions so artifacts trained on signals
// conditioned that way see the same input.
//
// Bandpass: analog Butterworth prototype → lowpass-to-bandpass transform →
// bilinear transform with pre-warped band edges → zpk to polynomials.

use rustfft::num_complex::Complex64;
use std::f64::consts::PI;

/// Discrete-time transfer function H(z) = B(z) / A(z)
#[derive(Debug, Clone, PartialEq)]
pub struct TransferFunction {
    /// Numerator coefficients of z^0, z^-1, ...
    pub b: Vec<f64>,
    /// Denominator coefficients, `a[0]` is 1 for every designed filter
    pub a: Vec<f64>,
}

impl TransferFunction {
    /// Magnitude response at `freq_hz` for a stream sampled at `sample_rate_hz`
    pub fn gain_at(&self, freq_hz: f64, sample_rate_hz: f64) -> f64 {
        let omega = 2.0 * PI * freq_hz / sample_rate_hz;
        let eval = |coeffs: &[f64]| {
            coeffs
                .iter()
                .enumerate()
                .map(|(k, &c)| c * Complex64::from_polar(1.0, -omega * k as f64))
                .sum::<Complex64>()
        };
        (eval(&self.b) / eval(&self.a)).norm()
    }

    /// Number of taps of the longer polynomial
    pub fn order_len(&self) -> usize {
        self.a.len().max(self.b.len())
    }
}

/// Second-order IIR notch centered on `center_hz`
///
/// The -3 dB bandwidth is `center / quality`. Callers validate that the
/// center lies strictly between 0 and Nyquist and that `quality > 0`.
pub fn iir_notch(center_hz: f64, quality: f64, sample_rate_hz: f64) -> TransferFunction {
    let w0 = center_hz / (sample_rate_hz / 2.0);
    let bw = w0 / quality;

    let w0 = w0 * PI;
    let bw = bw * PI;

    let beta = (bw / 2.0).tan();
    let gain = 1.0 / (1.0 + beta);
    let cos_w0 = w0.cos();

    TransferFunction {
        b: vec![gain, -2.0 * gain * cos_w0, gain],
        a: vec![1.0, -2.0 * gain * cos_w0, 2.0 * gain - 1.0],
    }
}

/// Butterworth bandpass of prototype order `order` (2·order + 1 taps)
///
/// Callers validate `0 < low_hz < high_hz < sample_rate_hz / 2` and
/// `order >= 1`.
pub fn butter_bandpass(
    order: usize,
    low_hz: f64,
    high_hz: f64,
    sample_rate_hz: f64,
) -> TransferFunction {
    let n = order as f64;

    // Analog prototype: poles evenly spaced on the left half of the unit circle
    let prototype: Vec<Complex64> = (0..order)
        .map(|i| {
            let m = -n + 1.0 + 2.0 * i as f64;
            -Complex64::from_polar(1.0, PI * m / (2.0 * n))
        })
        .collect();

    // Pre-warp the band edges for a bilinear transform at fs = 2
    let nyquist = sample_rate_hz / 2.0;
    let warp = |hz: f64| 4.0 * (PI * (hz / nyquist) / 2.0).tan();
    let low = warp(low_hz);
    let high = warp(high_hz);
    let bandwidth = high - low;
    let center = (low * high).sqrt();

    // Lowpass → bandpass: each prototype pole splits into a conjugate pair,
    // and `order` zeros land on the origin
    let mut analog_poles = Vec::with_capacity(2 * order);
    for pole in &prototype {
        let scaled = *pole * (bandwidth / 2.0);
        let offset = (scaled * scaled - center * center).sqrt();
        analog_poles.push(scaled + offset);
        analog_poles.push(scaled - offset);
    }
    let analog_gain = bandwidth.powi(order as i32);

    // Bilinear transform (fs2 = 2 * fs = 4): analog zeros at the origin map
    // to z = +1, the remaining degree goes to z = -1
    let fs2: f64 = 4.0;
    let digital_poles: Vec<Complex64> = analog_poles
        .iter()
        .map(|&p| (fs2 + p) / (fs2 - p))
        .collect();
    let mut digital_zeros = vec![Complex64::new(1.0, 0.0); order];
    digital_zeros.extend(std::iter::repeat(Complex64::new(-1.0, 0.0)).take(order));

    let zero_factor = Complex64::new(fs2.powi(order as i32), 0.0);
    let pole_factor: Complex64 = analog_poles.iter().map(|&p| fs2 - p).product();
    let digital_gain = analog_gain * (zero_factor / pole_factor).re;

    TransferFunction {
        b: poly(&digital_zeros)
            .iter()
            .map(|c| digital_gain * c.re)
            .collect(),
        a: poly(&digital_poles).iter().map(|c| c.re).collect(),
    }
}

/// Expand roots into monic polynomial coefficients (highest degree first)
fn poly(roots: &[Complex64]) -> Vec<Complex64> {
    let mut coeffs = vec![Complex64::new(1.0, 0.0)];
    for &root in roots {
        let mut next = vec![Complex64::new(0.0, 0.0); coeffs.len() + 1];
        for (i, slot) in next.iter_mut().enumerate() {
            let carried = coeffs.get(i).copied().unwrap_or_default();
            let shifted = if i > 0 {
                coeffs[i - 1] * root
            } else {
                Complex64::new(0.0, 0.0)
            };
            *slot = carried - shifted;
        }
        coeffs = next;
    }
    coeffs
}
