//! SIMD alignment detection and aligned allocation.

use std::sync::OnceLock;

use crate::array::{StridedArray, c_strides, checked_len, layout_extent};
use crate::dtype::{DType, Storage};
use crate::error::{BufferError, BufferResult};

/// Alignment reported when no SIMD extension is detected.
pub const NO_SIMD_ALIGNMENT: usize = 4;

static SIMD_ALIGNMENT: OnceLock<usize> = OnceLock::new();

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
fn detect_simd_alignment() -> usize {
    if std::arch::is_x86_feature_detected!("avx") {
        32
    } else if std::arch::is_x86_feature_detected!("sse2") {
        16
    } else {
        NO_SIMD_ALIGNMENT
    }
}

#[cfg(any(target_arch = "aarch64", target_arch = "arm"))]
fn detect_simd_alignment() -> usize {
    16
}

#[cfg(not(any(
    target_arch = "x86",
    target_arch = "x86_64",
    target_arch = "aarch64",
    target_arch = "arm"
)))]
fn detect_simd_alignment() -> usize {
    NO_SIMD_ALIGNMENT
}

/// Preferred SIMD byte alignment of the host, detected once per process.
pub fn simd_alignment() -> usize {
    *SIMD_ALIGNMENT.get_or_init(detect_simd_alignment)
}

/// Alignments a plan may require, most demanding first.
pub fn valid_simd_alignments() -> &'static [usize] {
    match simd_alignment() {
        32 => &[32, 16],
        16 => &[16],
        _ => &[],
    }
}

/// Fill applied by [`allocate_aligned`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Fill {
    #[default]
    Zeros,
    Ones,
}

fn check_power_of_two(n: usize) -> BufferResult<()> {
    if n.is_power_of_two() {
        Ok(())
    } else {
        Err(BufferError::invalid(format!(
            "alignment must be a positive power of two, got {n}"
        )))
    }
}

#[must_use]
pub fn is_byte_aligned(array: &StridedArray, n: usize) -> bool {
    n != 0 && array.base_address() % n == 0
}

#[must_use]
pub fn is_simd_aligned(array: &StridedArray) -> bool {
    is_byte_aligned(array, simd_alignment())
}

fn aligned_storage(dtype: DType, extent: usize, n: usize) -> BufferResult<(Storage, usize)> {
    let scalar = dtype.scalar_size();
    let padding = if n > scalar { n / scalar } else { 0 };
    let scalars = extent
        .checked_mul(dtype.components())
        .and_then(|len| len.checked_add(padding))
        .ok_or_else(|| BufferError::invalid("aligned allocation overflows usize"))?;
    let storage = Storage::zeros(dtype.is_double(), scalars);
    let misalignment = storage.base_address() % n;
    let offset = if misalignment == 0 {
        0
    } else {
        (n - misalignment) / scalar
    };
    Ok((storage, offset))
}

/// Allocates an array with an explicit element layout whose element 0 sits
/// on an `n`-byte boundary.
pub fn allocate_layout_aligned(
    shape: &[usize],
    strides: &[usize],
    dtype: DType,
    n: usize,
) -> BufferResult<StridedArray> {
    check_power_of_two(n)?;
    if shape.len() != strides.len() {
        return Err(BufferError::invalid(format!(
            "{} strides for a shape of rank {}",
            strides.len(),
            shape.len()
        )));
    }
    checked_len(shape)?;
    let extent = layout_extent(shape, strides)
        .ok_or_else(|| BufferError::invalid("layout extent overflows usize"))?;
    let (storage, offset) = aligned_storage(dtype, extent, n)?;
    Ok(StridedArray::from_storage(
        storage,
        dtype,
        offset,
        shape.to_vec(),
        strides.to_vec(),
    ))
}

/// Allocates a contiguous array aligned to `n` bytes, or to
/// [`simd_alignment`] when `n` is `None`.
pub fn allocate_aligned(
    shape: &[usize],
    dtype: DType,
    n: Option<usize>,
    fill: Fill,
) -> BufferResult<StridedArray> {
    let n = n.unwrap_or_else(simd_alignment);
    let array = allocate_layout_aligned(shape, &c_strides(shape), dtype, n)?;
    if fill == Fill::Ones {
        fill_ones(&array)?;
    }
    Ok(array)
}

fn fill_ones(array: &StridedArray) -> BufferResult<()> {
    crate::with_element_type!(array.dtype(), T => {
        array.fill(<T as crate::Element>::from_complex128(num_complex::Complex::new(1.0, 0.0)))
    })
}

/// Safe Rust never hands out uninitialized memory, so "empty" arrays are
/// zero-filled.
pub fn empty_aligned(shape: &[usize], dtype: DType, n: Option<usize>) -> BufferResult<StridedArray> {
    allocate_aligned(shape, dtype, n, Fill::Zeros)
}

pub fn zeros_aligned(shape: &[usize], dtype: DType, n: Option<usize>) -> BufferResult<StridedArray> {
    allocate_aligned(shape, dtype, n, Fill::Zeros)
}

pub fn ones_aligned(shape: &[usize], dtype: DType, n: Option<usize>) -> BufferResult<StridedArray> {
    allocate_aligned(shape, dtype, n, Fill::Ones)
}

/// Returns `array` unchanged when it is already `n`-aligned with the wanted
/// dtype; otherwise a contiguous aligned copy.
pub fn byte_align(
    array: &StridedArray,
    n: Option<usize>,
    dtype: Option<DType>,
) -> BufferResult<StridedArray> {
    let n = n.unwrap_or_else(simd_alignment);
    check_power_of_two(n)?;
    let dtype = dtype.unwrap_or(array.dtype());
    if dtype == array.dtype() && is_byte_aligned(array, n) {
        return Ok(array.clone());
    }
    let copy = allocate_aligned(array.shape(), dtype, Some(n), Fill::Zeros)?;
    copy.copy_from(array)?;
    Ok(copy)
}

#[cfg(test)]
mod tests {
    use num_complex::Complex;

    use super::{
        allocate_layout_aligned, byte_align, is_byte_aligned, ones_aligned, simd_alignment,
        valid_simd_alignments, zeros_aligned,
    };
    use crate::{BufferError, DType};

    #[test]
    fn detection_is_stable() {
        assert_eq!(simd_alignment(), simd_alignment());
        for &n in valid_simd_alignments() {
            assert!(n.is_power_of_two());
            assert!(n <= simd_alignment());
        }
    }

    #[test]
    fn zeros_aligned_honours_every_power_of_two() {
        for dtype in DType::ALL {
            for n in [1, 2, 4, 8, 16, 32, 64, 128] {
                let array = zeros_aligned(&[7, 3], dtype, Some(n)).expect("alloc");
                assert!(is_byte_aligned(&array, n), "{dtype} n={n}");
                assert_eq!(array.len(), 21);
            }
        }
    }

    #[test]
    fn non_power_of_two_alignment_is_rejected() {
        assert!(matches!(
            zeros_aligned(&[4], DType::F32, Some(24)),
            Err(BufferError::InvalidArgument { .. })
        ));
        assert!(matches!(
            zeros_aligned(&[4], DType::F32, Some(0)),
            Err(BufferError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn ones_fill_complex_with_unit_real_part() {
        let array = ones_aligned(&[3], DType::C32, Some(16)).expect("alloc");
        assert_eq!(
            array.to_vec::<Complex<f32>>().expect("read"),
            vec![Complex::new(1.0, 0.0); 3]
        );
    }

    #[test]
    fn byte_align_reuses_aligned_input() {
        let array = zeros_aligned(&[8], DType::F64, Some(32)).expect("alloc");
        let aligned = byte_align(&array, Some(32), None).expect("align");
        assert!(aligned.shares_memory(&array));
    }

    #[test]
    fn byte_align_copies_misaligned_view() {
        let array = zeros_aligned(&[9], DType::F32, Some(64)).expect("alloc");
        array
            .assign(&[0.0_f32, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0])
            .expect("assign");
        let shifted = array.slice_axis(0, 1, 9, 1).expect("slice");
        assert!(!is_byte_aligned(&shifted, 16));
        let aligned = byte_align(&shifted, Some(16), None).expect("align");
        assert!(!aligned.shares_memory(&array));
        assert!(is_byte_aligned(&aligned, 16));
        assert_eq!(aligned.to_vec::<f32>().expect("read"), shifted.to_vec::<f32>().expect("read"));
    }

    #[test]
    fn byte_align_converts_dtype() {
        let array = zeros_aligned(&[2], DType::F32, Some(16)).expect("alloc");
        array.assign(&[1.0_f32, 2.0]).expect("assign");
        let widened = byte_align(&array, Some(16), Some(DType::F64)).expect("align");
        assert_eq!(widened.dtype(), DType::F64);
        assert_eq!(widened.to_vec::<f64>().expect("read"), vec![1.0, 2.0]);
    }

    #[test]
    fn layout_allocation_keeps_requested_strides() {
        let array = allocate_layout_aligned(&[2, 3], &[1, 4], DType::C64, 32).expect("alloc");
        assert_eq!(array.strides(), &[1, 4]);
        assert_eq!(array.extent(), 10);
        assert!(is_byte_aligned(&array, 32));
    }
}
