// Zero-phase filtering - forward-backward IIR filtering of a finite window
//
// The window is extended at both ends by odd reflection, filtered forward
// with steady-state initial conditions scaled by the first sample, filtered
// again backwards the same way, and the extension is cut off. The result has
// zero phase distortion and squared magnitude response.

use super::design::TransferFunction;
use crate::error::PipelineError;

/// Samples of odd extension added on each side of the window
pub fn pad_len(tf: &TransferFunction) -> usize {
    3 * tf.order_len()
}

/// Filter `x` forward and backward with odd-extension padding
///
/// The input must be strictly longer than [`pad_len`].
pub fn filtfilt(tf: &TransferFunction, x: &[f64]) -> Result<Vec<f64>, PipelineError> {
    let edge = pad_len(tf);
    if x.len() <= edge {
        return Err(PipelineError::DegenerateWindow {
            len: x.len(),
            required: edge,
        });
    }

    let extended = odd_extend(x, edge);
    let zi = lfilter_zi(tf);

    let first = extended[0];
    let initial: Vec<f64> = zi.iter().map(|z| z * first).collect();
    let mut forward = lfilter(tf, &extended, &initial);

    forward.reverse();
    let first = forward[0];
    let initial: Vec<f64> = zi.iter().map(|z| z * first).collect();
    let mut backward = lfilter(tf, &forward, &initial);
    backward.reverse();

    Ok(backward[edge..backward.len() - edge].to_vec())
}

/// Point-symmetric extension about both end samples
fn odd_extend(x: &[f64], edge: usize) -> Vec<f64> {
    let n = x.len();
    let first = x[0];
    let last = x[n - 1];

    let mut out = Vec::with_capacity(n + 2 * edge);
    out.extend((1..=edge).rev().map(|i| 2.0 * first - x[i]));
    out.extend_from_slice(x);
    out.extend((0..edge).map(|i| 2.0 * last - x[n - 2 - i]));
    out
}

/// Coefficients padded to equal length and normalized so `a[0] == 1`
fn normalized(tf: &TransferFunction) -> (Vec<f64>, Vec<f64>) {
    let n = tf.order_len();
    let a0 = tf.a.first().copied().unwrap_or(1.0);
    let mut b: Vec<f64> = tf.b.iter().map(|v| v / a0).collect();
    let mut a: Vec<f64> = tf.a.iter().map(|v| v / a0).collect();
    b.resize(n, 0.0);
    a.resize(n, 0.0);
    (b, a)
}

/// Direct form II transposed IIR filter with initial state `zi`
pub fn lfilter(tf: &TransferFunction, x: &[f64], zi: &[f64]) -> Vec<f64> {
    let (b, a) = normalized(tf);
    let n = b.len();
    if n < 2 {
        let gain = b.first().copied().unwrap_or(0.0);
        return x.iter().map(|v| v * gain).collect();
    }

    let mut state = vec![0.0; n - 1];
    for (slot, value) in state.iter_mut().zip(zi) {
        *slot = *value;
    }

    let mut y = Vec::with_capacity(x.len());
    for &xi in x {
        let yi = b[0] * xi + state[0];
        for j in 0..n - 2 {
            state[j] = b[j + 1] * xi + state[j + 1] - a[j + 1] * yi;
        }
        state[n - 2] = b[n - 1] * xi - a[n - 1] * yi;
        y.push(yi);
    }
    y
}

/// Initial state for which a unit step input produces the steady-state output
///
/// Solves `(I - Aᵀ) zi = b[1..] - a[1..] · b[0]` where `A` is the companion
/// matrix of the denominator.
pub fn lfilter_zi(tf: &TransferFunction) -> Vec<f64> {
    let (b, a) = normalized(tf);
    let n = b.len();
    if n < 2 {
        return Vec::new();
    }
    let dim = n - 1;

    let mut matrix = vec![vec![0.0; dim]; dim];
    for (i, row) in matrix.iter_mut().enumerate() {
        row[i] += 1.0;
        row[0] += a[i + 1];
        if i + 1 < dim {
            row[i + 1] -= 1.0;
        }
    }
    let rhs: Vec<f64> = (0..dim).map(|i| b[i + 1] - a[i + 1] * b[0]).collect();

    solve(matrix, rhs).unwrap_or_else(|| vec![0.0; dim])
}

/// Gaussian elimination with partial pivoting; `None` for singular systems
fn solve(mut matrix: Vec<Vec<f64>>, mut rhs: Vec<f64>) -> Option<Vec<f64>> {
    let n = rhs.len();
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| matrix[i][col].abs().total_cmp(&matrix[j][col].abs()))?;
        if matrix[pivot][col].abs() < 1e-300 {
            return None;
        }
        matrix.swap(col, pivot);
        rhs.swap(col, pivot);

        for row in col + 1..n {
            let factor = matrix[row][col] / matrix[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                matrix[row][k] -= factor * matrix[col][k];
            }
            rhs[row] -= factor * rhs[col];
        }
    }

    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let tail: f64 = (i + 1..n).map(|j| matrix[i][j] * x[j]).sum();
        x[i] = (rhs[i] - tail) / matrix[i][i];
    }
    Some(x)
}

#[cfg(test)]
mod tests {
    use super::super::design::{butter_bandpass, iir_notch};
    use super::*;

    fn sine(freq_hz: f64, fs: f64, len: usize) -> Vec<f64> {
        (0..len)
            .map(|i| (2.0 * std::f64::consts::PI * freq_hz * i as f64 / fs).sin())
            .collect()
    }

    #[test]
    fn pad_len_follows_filter_length() {
        assert_eq!(pad_len(&iir_notch(50.0, 30.0, 512.0)), 9);
        assert_eq!(pad_len(&butter_bandpass(4, 0.5, 30.0, 512.0)), 27);
    }

    #[test]
    fn odd_extension_reflects_about_end_points() {
        let ext = odd_extend(&[1.0, 2.0, 4.0, 7.0], 2);
        assert_eq!(ext, vec![-2.0, 0.0, 1.0, 2.0, 4.0, 7.0, 10.0, 12.0]);
    }

    #[test]
    fn zi_gives_steady_state_step_response() {
        let notch = iir_notch(50.0, 30.0, 512.0);
        let zi = lfilter_zi(&notch);
        let y = lfilter(&notch, &[1.0; 16], &zi);
        for value in y {
            assert!((value - 1.0).abs() < 1e-9, "notch step drifted: {value}");
        }

        let bandpass = butter_bandpass(4, 0.5, 30.0, 512.0);
        let zi = lfilter_zi(&bandpass);
        let y = lfilter(&bandpass, &[1.0; 16], &zi);
        for value in y {
            assert!(value.abs() < 1e-5, "bandpass step should settle at 0, got {value}");
        }
    }

    #[test]
    fn lfilter_without_state_is_causal() {
        let tf = TransferFunction {
            b: vec![0.5, 0.5],
            a: vec![1.0],
        };
        let y = lfilter(&tf, &[1.0, 0.0, 0.0], &[0.0]);
        assert_eq!(y, vec![0.5, 0.5, 0.0]);
    }

    #[test]
    fn filtfilt_preserves_length_and_is_deterministic() {
        let tf = butter_bandpass(4, 0.5, 30.0, 512.0);
        let x = sine(10.0, 512.0, 512);
        let first = filtfilt(&tf, &x).unwrap();
        let second = filtfilt(&tf, &x).unwrap();
        assert_eq!(first.len(), 512);
        assert_eq!(first, second);
    }

    #[test]
    fn filtfilt_removes_powerline_component() {
        let notch = iir_notch(50.0, 30.0, 512.0);
        let x = sine(50.0, 512.0, 512);
        let y = filtfilt(&notch, &x).unwrap();
        let centre_peak = y[128..384].iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
        assert!(centre_peak < 0.2, "50 Hz residue {centre_peak}");
    }

    #[test]
    fn filtfilt_has_no_phase_shift() {
        let notch = iir_notch(50.0, 30.0, 512.0);
        let x = sine(10.0, 512.0, 512);
        let y = filtfilt(&notch, &x).unwrap();
        for i in 128..384 {
            assert!((y[i] - x[i]).abs() < 0.01, "sample {i}: {} vs {}", y[i], x[i]);
        }
    }

    #[test]
    fn filtfilt_rejects_short_input() {
        let tf = butter_bandpass(4, 0.5, 30.0, 512.0);
        let err = filtfilt(&tf, &[0.0; 27]).unwrap_err();
        assert_eq!(
            err,
            PipelineError::DegenerateWindow {
                len: 27,
                required: 27
            }
        );
        assert!(filtfilt(&tf, &[0.0; 28]).is_ok());
    }

    #[test]
    fn solve_handles_pivoting() {
        let x = solve(vec![vec![0.0, 1.0], vec![2.0, 0.0]], vec![3.0, 4.0]).unwrap();
        assert!((x[0] - 2.0).abs() < 1e-12);
        assert!((x[1] - 3.0).abs() < 1e-12);
        assert!(solve(vec![vec![0.0, 0.0], vec![0.0, 0.0]], vec![1.0, 1.0]).is_none());
    }
}
