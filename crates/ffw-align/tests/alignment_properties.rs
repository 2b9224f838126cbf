#![forbid(unsafe_code)]

//! Alignment and strided-buffer properties.
//!
//! Seed replay: `PROPTEST_SEED=<seed> cargo test -p ffw-align --test alignment_properties`

use ffw_align::num_complex::Complex;
use ffw_align::{
    BufferError, DType, StridedArray, allocate_layout_aligned, byte_align, empty_aligned,
    is_byte_aligned, is_simd_aligned, simd_alignment, strided_offsets, valid_simd_alignments,
    zeros_aligned,
};
use ffw_runtime::{TestLogEntry, TestResult};
use proptest::prelude::*;

fn dtype_strategy() -> impl Strategy<Value = DType> {
    prop::sample::select(DType::ALL.to_vec())
}

fn alignment_strategy() -> impl Strategy<Value = usize> {
    (0_u32..8).prop_map(|shift| 1_usize << shift)
}

// ═══════════════════════════════════════════════════════════════════
// §1  Host detection
// ═══════════════════════════════════════════════════════════════════

#[test]
fn valid_alignments_are_descending_and_bounded() {
    let candidates = valid_simd_alignments();
    assert!(candidates.windows(2).all(|pair| pair[0] > pair[1]));
    if let Some(&first) = candidates.first() {
        assert_eq!(first, simd_alignment());
    }
    let entry = TestLogEntry::new(
        "align::detect",
        "ffw_align::align",
        format!("simd_alignment={} candidates={candidates:?}", simd_alignment()),
    )
    .with_result(TestResult::Pass);
    assert!(entry.to_json_line().contains("simd_alignment"));
}

#[test]
fn default_allocation_is_simd_aligned() {
    let array = empty_aligned(&[5, 5], DType::C64, None).expect("alloc should succeed");
    assert!(is_simd_aligned(&array));
}

// ═══════════════════════════════════════════════════════════════════
// §2  Byte alignment of views
// ═══════════════════════════════════════════════════════════════════

#[test]
fn interior_view_alignment_follows_byte_offset() {
    let array = zeros_aligned(&[16], DType::C32, Some(32)).expect("alloc should succeed");
    let second = array.slice_axis(0, 1, 16, 1).expect("slice should succeed");
    assert!(is_byte_aligned(&second, 8));
    assert!(!is_byte_aligned(&second, 16));
    let fourth = array.slice_axis(0, 4, 16, 1).expect("slice should succeed");
    assert!(is_byte_aligned(&fourth, 32));
}

#[test]
fn byte_align_rejects_complex_to_real() {
    let array = StridedArray::from_elements(&[Complex::new(1.0_f32, 0.0)], &[1])
        .expect("alloc should succeed");
    let err = byte_align(&array, Some(16), Some(DType::F32)).expect_err("cast refused");
    assert_eq!(
        err,
        BufferError::UnsafeCast {
            from: DType::C32,
            to: DType::F32
        }
    );
}

#[test]
fn strided_layout_allocation_reads_back_logical_order() {
    let array =
        allocate_layout_aligned(&[2, 2], &[1, 2], DType::F64, 16).expect("alloc should succeed");
    array.assign(&[1.0, 2.0, 3.0, 4.0]).expect("assign should succeed");
    array
        .with_elements(|data: &[f64]| assert_eq!(data, &[1.0, 3.0, 2.0, 4.0]))
        .expect("view should succeed");
}

// ═══════════════════════════════════════════════════════════════════
// §3  Properties
// ═══════════════════════════════════════════════════════════════════

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_aligned_allocation_meets_boundary(
        dtype in dtype_strategy(),
        n in alignment_strategy(),
        shape in prop::collection::vec(0_usize..6, 0..4),
    ) {
        let array = zeros_aligned(&shape, dtype, Some(n)).expect("alloc should succeed");
        prop_assert!(is_byte_aligned(&array, n));
        prop_assert_eq!(array.shape(), &shape[..]);
        prop_assert!(array.is_contiguous());
    }

    #[test]
    fn prop_byte_align_preserves_values(
        values in prop::collection::vec(-1.0e3_f64..1.0e3, 2..40),
        skip in 0_usize..2,
        n in alignment_strategy(),
    ) {
        let source = StridedArray::from_elements(&values, &[values.len()]).expect("alloc should succeed");
        let view = source.slice_axis(0, skip, values.len(), 1).expect("slice should succeed");
        let aligned = byte_align(&view, Some(n), None).expect("align should succeed");
        prop_assert!(is_byte_aligned(&aligned, n));
        prop_assert_eq!(aligned.to_vec::<f64>().expect("read"), values[skip..].to_vec());
    }

    #[test]
    fn prop_offsets_are_distinct_for_c_layout(
        shape in prop::collection::vec(1_usize..5, 1..4),
    ) {
        let array = StridedArray::zeros(&shape, DType::F32).expect("alloc should succeed");
        let offsets = strided_offsets(array.shape(), array.strides());
        let expected: Vec<usize> = (0..array.len()).collect();
        prop_assert_eq!(offsets, expected);
    }
}
