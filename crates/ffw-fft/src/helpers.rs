use std::f64::consts::PI;

use num_complex::Complex;

use crate::transforms::FftError;

/// Smallest length `>= target` the native kernels factor efficiently.
///
/// Fast lengths have only factors 2, 3, 5 and 7, plus at most one factor
/// of 11 or 13.
pub fn next_fast_len(target: usize) -> Result<usize, FftError> {
    if target == 0 {
        return Err(FftError::InvalidArgument {
            detail: "target length must be greater than zero".to_owned(),
        });
    }
    (target..=usize::MAX)
        .find(|&candidate| is_fast_len(candidate))
        .ok_or_else(|| FftError::InvalidArgument {
            detail: format!("no fast length at or above {target}"),
        })
}

fn is_fast_len(mut n: usize) -> bool {
    for radix in [2, 3, 5, 7] {
        while n % radix == 0 {
            n /= radix;
        }
    }
    matches!(n, 1 | 11 | 13)
}

/// Unscaled O(n²) DFT used as a reference when validating native kernels.
#[must_use]
pub fn naive_dft(input: &[Complex<f64>], inverse: bool) -> Vec<Complex<f64>> {
    let n = input.len();
    if n == 0 {
        return Vec::new();
    }
    let sign = if inverse { 1.0 } else { -1.0 };
    (0..n)
        .map(|k| {
            input
                .iter()
                .enumerate()
                .map(|(t, &value)| {
                    let angle = sign * 2.0 * PI * ((k * t) % n) as f64 / n as f64;
                    value * Complex::from_polar(1.0, angle)
                })
                .sum()
        })
        .collect()
}

/// Applies [`naive_dft`] along each of `axes` of a C-ordered array.
#[must_use]
pub fn naive_dftn(
    input: &[Complex<f64>],
    shape: &[usize],
    axes: &[usize],
    inverse: bool,
) -> Vec<Complex<f64>> {
    let mut data = input.to_vec();
    for &axis in axes {
        apply_axis_transform(&mut data, shape, axis, inverse);
    }
    data
}

fn apply_axis_transform(data: &mut [Complex<f64>], shape: &[usize], axis: usize, inverse: bool) {
    let len = shape[axis];
    let stride: usize = shape[axis + 1..].iter().product();
    if len == 0 || stride == 0 {
        return;
    }
    let outer = data.len() / (len * stride);
    let mut line = vec![Complex::new(0.0, 0.0); len];
    for outer_idx in 0..outer {
        for inner_idx in 0..stride {
            let base = outer_idx * len * stride + inner_idx;
            for (i, slot) in line.iter_mut().enumerate() {
                *slot = data[base + i * stride];
            }
            for (i, value) in naive_dft(&line, inverse).into_iter().enumerate() {
                data[base + i * stride] = value;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use num_complex::Complex;

    use super::{naive_dft, naive_dftn, next_fast_len};
    use crate::FftError;

    #[test]
    fn next_fast_len_skips_large_primes() {
        assert_eq!(next_fast_len(1), Ok(1));
        assert_eq!(next_fast_len(17), Ok(18));
        assert_eq!(next_fast_len(97), Ok(98));
        assert_eq!(next_fast_len(143), Ok(144));
        assert_eq!(next_fast_len(1021), Ok(1024));
    }

    #[test]
    fn next_fast_len_allows_one_eleven_or_thirteen() {
        assert_eq!(next_fast_len(11), Ok(11));
        assert_eq!(next_fast_len(26), Ok(26));
        // 121 = 11 * 11 is not fast; 125 = 5^3 is.
        assert_eq!(next_fast_len(121), Ok(125));
    }

    #[test]
    fn next_fast_len_rejects_zero() {
        assert!(matches!(
            next_fast_len(0),
            Err(FftError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn naive_dft_of_impulse_is_flat() {
        let mut impulse = vec![Complex::new(0.0, 0.0); 5];
        impulse[0] = Complex::new(1.0, 0.0);
        for value in naive_dft(&impulse, false) {
            assert!((value - Complex::new(1.0, 0.0)).norm() < 1e-12);
        }
    }

    #[test]
    fn naive_dftn_over_all_axes_matches_sum() {
        let input: Vec<Complex<f64>> = (0..6).map(|i| Complex::new(f64::from(i), 0.0)).collect();
        let output = naive_dftn(&input, &[2, 3], &[0, 1], false);
        assert!((output[0] - Complex::new(15.0, 0.0)).norm() < 1e-12);
    }
}
