#![forbid(unsafe_code)]

//! Strided buffers and SIMD alignment utilities for FrankenFFTW.
//!
//! Arrays are shared handles over `f32`/`f64` scalar storage. Complex
//! element types are viewed through the same storage as interleaved pairs,
//! and element 0 may sit at any scalar offset so an allocation can be
//! placed on an arbitrary power-of-two byte boundary.

pub mod align;
pub mod array;
pub mod dtype;
pub mod error;

pub use align::{
    Fill, NO_SIMD_ALIGNMENT, allocate_aligned, allocate_layout_aligned, byte_align,
    empty_aligned, is_byte_aligned, is_simd_aligned, ones_aligned, simd_alignment,
    valid_simd_alignments, zeros_aligned,
};
pub use array::{StridedArray, c_strides, layout_extent, strided_offsets};
pub use dtype::{DType, Element, Storage};
pub use error::{BufferError, BufferResult};
pub use num_complex;
