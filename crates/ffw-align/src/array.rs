//! Shared strided array handles.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use num_complex::Complex;

use crate::dtype::{DType, Element, Storage};
use crate::error::{BufferError, BufferResult};

/// Row-major element strides for `shape`.
#[must_use]
pub fn c_strides(shape: &[usize]) -> Vec<usize> {
    let mut strides = vec![0; shape.len()];
    let mut step = 1_usize;
    for (slot, &len) in strides.iter_mut().zip(shape).rev() {
        *slot = step;
        step = step.saturating_mul(len.max(1));
    }
    strides
}

/// Element offsets of every index of `shape`, in row-major index order.
#[must_use]
pub fn strided_offsets(shape: &[usize], strides: &[usize]) -> Vec<usize> {
    let total: usize = shape.iter().product();
    let mut offsets = Vec::with_capacity(total);
    if total == 0 {
        return offsets;
    }
    let mut index = vec![0_usize; shape.len()];
    let mut current = 0_usize;
    loop {
        offsets.push(current);
        let mut axis = shape.len();
        loop {
            if axis == 0 {
                return offsets;
            }
            axis -= 1;
            index[axis] += 1;
            current += strides[axis];
            if index[axis] < shape[axis] {
                break;
            }
            current -= strides[axis] * shape[axis];
            index[axis] = 0;
        }
    }
}

/// Number of elements between element 0 and one past the furthest element.
#[must_use]
pub fn layout_extent(shape: &[usize], strides: &[usize]) -> Option<usize> {
    if shape.contains(&0) {
        return Some(0);
    }
    shape
        .iter()
        .zip(strides)
        .try_fold(1_usize, |acc, (&len, &stride)| {
            acc.checked_add((len - 1).checked_mul(stride)?)
        })
}

pub(crate) fn checked_len(shape: &[usize]) -> BufferResult<usize> {
    shape
        .iter()
        .try_fold(1_usize, |acc, &len| acc.checked_mul(len))
        .ok_or_else(|| BufferError::invalid(format!("shape {shape:?} overflows usize")))
}

/// A typed, strided view over shared scalar storage.
///
/// Clones are cheap and alias the same storage, so a clone written through
/// one handle is visible through every other. Strides are counted in
/// elements and are never negative.
#[derive(Debug, Clone)]
pub struct StridedArray {
    storage: Arc<RwLock<Storage>>,
    dtype: DType,
    offset: usize,
    shape: Vec<usize>,
    strides: Vec<usize>,
}

impl StridedArray {
    pub(crate) fn from_storage(
        storage: Storage,
        dtype: DType,
        offset: usize,
        shape: Vec<usize>,
        strides: Vec<usize>,
    ) -> Self {
        Self {
            storage: Arc::new(RwLock::new(storage)),
            dtype,
            offset,
            shape,
            strides,
        }
    }

    /// Contiguous zero-filled array with natural alignment.
    pub fn zeros(shape: &[usize], dtype: DType) -> BufferResult<Self> {
        let len = checked_len(shape)?;
        let scalars = len
            .checked_mul(dtype.components())
            .ok_or_else(|| BufferError::invalid("element count overflows usize"))?;
        Ok(Self::from_storage(
            Storage::zeros(dtype.is_double(), scalars),
            dtype,
            0,
            shape.to_vec(),
            c_strides(shape),
        ))
    }

    /// Contiguous array of ones (`1 + 0i` for complex types).
    pub fn ones(shape: &[usize], dtype: DType) -> BufferResult<Self> {
        let array = Self::zeros(shape, dtype)?;
        crate::with_element_type!(dtype, T => {
            array.fill(T::from_complex128(Complex::new(1.0, 0.0)))?;
        });
        Ok(array)
    }

    pub fn from_vec<T: Element>(values: Vec<T>, shape: &[usize]) -> BufferResult<Self> {
        Self::from_elements(&values, shape)
    }

    /// Contiguous array holding `values` in row-major order.
    pub fn from_elements<T: Element>(values: &[T], shape: &[usize]) -> BufferResult<Self> {
        let array = Self::zeros(shape, T::DTYPE)?;
        array.assign(values)?;
        Ok(array)
    }

    #[must_use]
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Strides in elements.
    #[must_use]
    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    #[must_use]
    pub fn byte_strides(&self) -> Vec<usize> {
        self.strides
            .iter()
            .map(|&stride| stride * self.dtype.itemsize())
            .collect()
    }

    #[must_use]
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Span in elements that the layout touches, starting at element 0.
    #[must_use]
    pub fn extent(&self) -> usize {
        layout_extent(&self.shape, &self.strides).unwrap_or(usize::MAX)
    }

    /// Address of element 0.
    #[must_use]
    pub fn base_address(&self) -> usize {
        let storage = self.read();
        storage.base_address() + self.offset * storage.scalar_size()
    }

    #[must_use]
    pub fn is_contiguous(&self) -> bool {
        let expected = c_strides(&self.shape);
        self.shape
            .iter()
            .zip(self.strides.iter().zip(&expected))
            .all(|(&len, (&stride, &want))| len <= 1 || stride == want)
    }

    /// True when both handles view the same storage.
    #[must_use]
    pub fn shares_memory(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.storage, &other.storage)
    }

    /// Offsets of every element relative to element 0, in row-major order.
    #[must_use]
    pub fn element_offsets(&self) -> Vec<usize> {
        strided_offsets(&self.shape, &self.strides)
    }

    fn read(&self) -> RwLockReadGuard<'_, Storage> {
        self.storage.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Storage> {
        self.storage.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn expect_dtype(&self, expected: DType) -> BufferResult<()> {
        if self.dtype == expected {
            Ok(())
        } else {
            Err(BufferError::DtypeMismatch {
                expected,
                actual: self.dtype,
            })
        }
    }

    /// Runs `f` over the elements spanned by this layout, element 0 first.
    ///
    /// Index the slice with [`Self::element_offsets`] or with offsets built
    /// from [`Self::strides`].
    pub fn with_elements<T: Element, R>(&self, f: impl FnOnce(&[T]) -> R) -> BufferResult<R> {
        self.expect_dtype(T::DTYPE)?;
        let extent = self.extent();
        let storage = self.read();
        let view = T::view(&storage, self.offset, extent)
            .ok_or_else(|| BufferError::invalid("array layout exceeds its storage"))?;
        Ok(f(view))
    }

    pub fn with_elements_mut<T: Element, R>(
        &self,
        f: impl FnOnce(&mut [T]) -> R,
    ) -> BufferResult<R> {
        self.expect_dtype(T::DTYPE)?;
        let extent = self.extent();
        let mut storage = self.write();
        let view = T::view_mut(&mut storage, self.offset, extent)
            .ok_or_else(|| BufferError::invalid("array layout exceeds its storage"))?;
        Ok(f(view))
    }

    /// Logical elements in row-major order.
    pub fn to_vec<T: Element>(&self) -> BufferResult<Vec<T>> {
        let offsets = self.element_offsets();
        self.with_elements(|data: &[T]| offsets.iter().map(|&offset| data[offset]).collect())
    }

    pub fn get<T: Element>(&self, index: &[usize]) -> BufferResult<T> {
        if index.len() != self.ndim() {
            return Err(BufferError::invalid(format!(
                "index of rank {} for array of rank {}",
                index.len(),
                self.ndim()
            )));
        }
        if let Some((axis, _)) = index
            .iter()
            .zip(&self.shape)
            .enumerate()
            .find(|(_, (i, len))| i >= len)
        {
            return Err(BufferError::InvalidAxis {
                axis,
                rank: self.ndim(),
            });
        }
        let offset: usize = index
            .iter()
            .zip(&self.strides)
            .map(|(&i, &stride)| i * stride)
            .sum();
        self.with_elements(|data: &[T]| data[offset])
    }

    /// Writes `values` in row-major order.
    pub fn assign<T: Element>(&self, values: &[T]) -> BufferResult<()> {
        if values.len() != self.len() {
            return Err(BufferError::LengthMismatch {
                expected: self.len(),
                actual: values.len(),
            });
        }
        let offsets = self.element_offsets();
        self.with_elements_mut(|data: &mut [T]| {
            for (&offset, &value) in offsets.iter().zip(values) {
                data[offset] = value;
            }
        })
    }

    pub fn fill<T: Element>(&self, value: T) -> BufferResult<()> {
        let offsets = self.element_offsets();
        self.with_elements_mut(|data: &mut [T]| {
            for &offset in &offsets {
                data[offset] = value;
            }
        })
    }

    /// Every element widened to double precision complex.
    pub fn to_complex128_vec(&self) -> BufferResult<Vec<Complex<f64>>> {
        crate::with_element_type!(self.dtype, T => self
            .to_vec::<T>()
            .map(|values| values.into_iter().map(Element::to_complex128).collect()))
    }

    fn assign_complex128(&self, values: &[Complex<f64>]) -> BufferResult<()> {
        crate::with_element_type!(self.dtype, T => {
            let converted: Vec<T> = values.iter().map(|&value| T::from_complex128(value)).collect();
            self.assign(&converted)
        })
    }

    /// Copies `source` into this array, casting between element types.
    ///
    /// Complex to real casts are refused with [`BufferError::UnsafeCast`].
    pub fn copy_from(&self, source: &Self) -> BufferResult<()> {
        if source.shape != self.shape {
            return Err(BufferError::ShapeMismatch {
                expected: self.shape.clone(),
                actual: source.shape.clone(),
            });
        }
        if source.dtype.is_complex() && !self.dtype.is_complex() {
            return Err(BufferError::UnsafeCast {
                from: source.dtype,
                to: self.dtype,
            });
        }
        let values = source.to_complex128_vec()?;
        self.assign_complex128(&values)
    }

    /// Multiplies every element by `factor` in place.
    pub fn scale(&self, factor: f64) -> BufferResult<()> {
        let offsets = self.element_offsets();
        crate::with_element_type!(self.dtype, T => self.with_elements_mut(|data: &mut [T]| {
            for &offset in &offsets {
                data[offset] = data[offset].scaled(factor);
            }
        }))
    }

    pub fn all_finite(&self) -> BufferResult<bool> {
        let offsets = self.element_offsets();
        crate::with_element_type!(self.dtype, T => self.with_elements(|data: &[T]| {
            offsets.iter().all(|&offset| data[offset].is_finite())
        }))
    }

    /// View of `start..stop` with `step` along `axis`, sharing storage.
    pub fn slice_axis(
        &self,
        axis: usize,
        start: usize,
        stop: usize,
        step: usize,
    ) -> BufferResult<Self> {
        let rank = self.ndim();
        if axis >= rank {
            return Err(BufferError::InvalidAxis { axis, rank });
        }
        if step == 0 {
            return Err(BufferError::invalid("slice step must be positive"));
        }
        let stop = stop.min(self.shape[axis]);
        let start = start.min(stop);
        let count = (stop - start).div_ceil(step);
        let mut view = self.clone();
        if count > 0 {
            view.offset += start * self.strides[axis] * self.dtype.components();
        }
        view.shape[axis] = count;
        view.strides[axis] = self.strides[axis] * step;
        Ok(view)
    }

    /// View with axes reordered so that new axis `i` is old axis `order[i]`.
    pub fn permuted(&self, order: &[usize]) -> BufferResult<Self> {
        let rank = self.ndim();
        let mut seen = vec![false; rank];
        for &axis in order {
            if axis >= rank {
                return Err(BufferError::InvalidAxis { axis, rank });
            }
            if std::mem::replace(&mut seen[axis], true) {
                return Err(BufferError::invalid(format!("axis {axis} repeated in permutation")));
            }
        }
        if order.len() != rank {
            return Err(BufferError::invalid("permutation must name every axis"));
        }
        let mut view = self.clone();
        view.shape = order.iter().map(|&axis| self.shape[axis]).collect();
        view.strides = order.iter().map(|&axis| self.strides[axis]).collect();
        Ok(view)
    }
}

#[cfg(test)]
mod tests {
    use num_complex::Complex;

    use super::{StridedArray, c_strides, layout_extent, strided_offsets};
    use crate::{BufferError, DType};

    #[test]
    fn c_strides_are_row_major() {
        assert_eq!(c_strides(&[2, 3, 4]), vec![12, 4, 1]);
        assert_eq!(c_strides(&[]), Vec::<usize>::new());
    }

    #[test]
    fn strided_offsets_walk_last_axis_fastest() {
        assert_eq!(strided_offsets(&[2, 2], &[1, 2]), vec![0, 2, 1, 3]);
        assert_eq!(strided_offsets(&[], &[]), vec![0]);
        assert!(strided_offsets(&[3, 0], &[1, 1]).is_empty());
    }

    #[test]
    fn extent_covers_furthest_element() {
        assert_eq!(layout_extent(&[3, 4], &[8, 2]), Some(23));
        assert_eq!(layout_extent(&[0, 4], &[4, 1]), Some(0));
    }

    #[test]
    fn clones_alias_storage() {
        let array = StridedArray::zeros(&[4], DType::F64).expect("alloc");
        let alias = array.clone();
        alias.assign(&[1.0, 2.0, 3.0, 4.0]).expect("assign");
        assert_eq!(array.to_vec::<f64>().expect("read"), vec![1.0, 2.0, 3.0, 4.0]);
        assert!(array.shares_memory(&alias));
    }

    #[test]
    fn slice_axis_produces_strided_view() {
        let array =
            StridedArray::from_elements(&[0.0_f32, 1.0, 2.0, 3.0, 4.0, 5.0], &[6]).expect("alloc");
        let view = array.slice_axis(0, 1, 6, 2).expect("slice");
        assert_eq!(view.shape(), &[3]);
        assert_eq!(view.strides(), &[2]);
        assert!(!view.is_contiguous());
        assert_eq!(view.to_vec::<f32>().expect("read"), vec![1.0, 3.0, 5.0]);
    }

    #[test]
    fn complex_to_real_copy_is_refused() {
        let source = StridedArray::from_elements(&[Complex::new(1.0_f64, 1.0)], &[1]).expect("alloc");
        let target = StridedArray::zeros(&[1], DType::F64).expect("alloc");
        assert_eq!(
            target.copy_from(&source),
            Err(BufferError::UnsafeCast {
                from: DType::C64,
                to: DType::F64
            })
        );
    }

    #[test]
    fn real_to_complex_copy_widens() {
        let source = StridedArray::from_elements(&[1.5_f32, -2.0], &[2]).expect("alloc");
        let target = StridedArray::zeros(&[2], DType::C64).expect("alloc");
        target.copy_from(&source).expect("copy");
        assert_eq!(
            target.to_vec::<Complex<f64>>().expect("read"),
            vec![Complex::new(1.5, 0.0), Complex::new(-2.0, 0.0)]
        );
    }

    #[test]
    fn typed_access_checks_dtype() {
        let array = StridedArray::zeros(&[2], DType::C32).expect("alloc");
        assert_eq!(
            array.to_vec::<f32>(),
            Err(BufferError::DtypeMismatch {
                expected: DType::F32,
                actual: DType::C32
            })
        );
    }

    #[test]
    fn permuted_view_transposes() {
        let array = StridedArray::from_elements(&[1.0_f64, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3])
            .expect("alloc");
        let transposed = array.permuted(&[1, 0]).expect("permute");
        assert_eq!(transposed.shape(), &[3, 2]);
        assert_eq!(
            transposed.to_vec::<f64>().expect("read"),
            vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]
        );
        assert_eq!(transposed.get::<f64>(&[2, 1]).expect("get"), 6.0);
    }

    #[test]
    fn scale_and_finite_checks() {
        let array = StridedArray::from_elements(&[2.0_f64, f64::NAN], &[2]).expect("alloc");
        assert!(!array.all_finite().expect("scan"));
        array.assign(&[2.0_f64, 4.0]).expect("assign");
        array.scale(0.5).expect("scale");
        assert_eq!(array.to_vec::<f64>().expect("read"), vec![1.0, 2.0]);
        assert!(array.all_finite().expect("scan"));
    }
}
