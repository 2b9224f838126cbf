//! Element types and the scalar storage they are viewed through.

use std::fmt::{Debug, Display, Formatter};

use num_complex::Complex;
use serde::{Deserialize, Serialize};

/// Element type of a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DType {
    /// Single precision real.
    F32,
    /// Double precision real.
    F64,
    /// Single precision complex (two `f32`).
    C32,
    /// Double precision complex (two `f64`).
    C64,
}

impl DType {
    pub const ALL: [Self; 4] = [Self::F32, Self::F64, Self::C32, Self::C64];

    /// Bytes per element.
    #[must_use]
    pub const fn itemsize(self) -> usize {
        self.scalar_size() * self.components()
    }

    /// Bytes per scalar component.
    #[must_use]
    pub const fn scalar_size(self) -> usize {
        match self {
            Self::F32 | Self::C32 => 4,
            Self::F64 | Self::C64 => 8,
        }
    }

    #[must_use]
    pub const fn components(self) -> usize {
        if self.is_complex() { 2 } else { 1 }
    }

    /// Byte boundary every element of this type already satisfies.
    #[must_use]
    pub const fn natural_alignment(self) -> usize {
        self.scalar_size()
    }

    #[must_use]
    pub const fn is_complex(self) -> bool {
        matches!(self, Self::C32 | Self::C64)
    }

    #[must_use]
    pub const fn is_double(self) -> bool {
        matches!(self, Self::F64 | Self::C64)
    }

    #[must_use]
    pub const fn to_complex(self) -> Self {
        if self.is_double() { Self::C64 } else { Self::C32 }
    }

    #[must_use]
    pub const fn to_real(self) -> Self {
        if self.is_double() { Self::F64 } else { Self::F32 }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::F32 => "float32",
            Self::F64 => "float64",
            Self::C32 => "complex64",
            Self::C64 => "complex128",
        }
    }
}

impl Display for DType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Raw scalar storage. Complex elements are interleaved `(re, im)` pairs.
#[derive(Debug, Clone, PartialEq)]
pub enum Storage {
    Single(Vec<f32>),
    Double(Vec<f64>),
}

impl Storage {
    pub(crate) fn zeros(double: bool, scalars: usize) -> Self {
        if double {
            Self::Double(vec![0.0; scalars])
        } else {
            Self::Single(vec![0.0; scalars])
        }
    }

    /// Number of scalars held.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Single(values) => values.len(),
            Self::Double(values) => values.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Address of the first scalar.
    #[must_use]
    pub fn base_address(&self) -> usize {
        match self {
            Self::Single(values) => values.as_ptr() as usize,
            Self::Double(values) => values.as_ptr() as usize,
        }
    }

    #[must_use]
    pub const fn scalar_size(&self) -> usize {
        match self {
            Self::Single(_) => 4,
            Self::Double(_) => 8,
        }
    }
}

/// Rust element types that can live in a [`Storage`].
pub trait Element: Copy + Default + PartialEq + Debug + Send + Sync + 'static {
    const DTYPE: DType;

    /// Typed view of `extent` elements starting at scalar index `scalar_offset`.
    fn view(storage: &Storage, scalar_offset: usize, extent: usize) -> Option<&[Self]>;

    fn view_mut(storage: &mut Storage, scalar_offset: usize, extent: usize)
    -> Option<&mut [Self]>;

    fn to_complex128(self) -> Complex<f64>;

    /// Real element types keep only the real part.
    fn from_complex128(value: Complex<f64>) -> Self;

    fn is_finite(self) -> bool;

    #[must_use]
    fn scaled(self, factor: f64) -> Self;
}

macro_rules! real_element {
    ($t:ty, $dtype:expr, $variant:ident) => {
        impl Element for $t {
            const DTYPE: DType = $dtype;

            fn view(storage: &Storage, scalar_offset: usize, extent: usize) -> Option<&[Self]> {
                match storage {
                    Storage::$variant(values) => {
                        values.get(scalar_offset..scalar_offset.checked_add(extent)?)
                    }
                    _ => None,
                }
            }

            fn view_mut(
                storage: &mut Storage,
                scalar_offset: usize,
                extent: usize,
            ) -> Option<&mut [Self]> {
                match storage {
                    Storage::$variant(values) => {
                        values.get_mut(scalar_offset..scalar_offset.checked_add(extent)?)
                    }
                    _ => None,
                }
            }

            fn to_complex128(self) -> Complex<f64> {
                Complex::new(f64::from(self), 0.0)
            }

            fn from_complex128(value: Complex<f64>) -> Self {
                value.re as $t
            }

            fn is_finite(self) -> bool {
                <$t>::is_finite(self)
            }

            fn scaled(self, factor: f64) -> Self {
                (f64::from(self) * factor) as $t
            }
        }
    };
}

macro_rules! complex_element {
    ($t:ty, $dtype:expr, $variant:ident) => {
        impl Element for Complex<$t> {
            const DTYPE: DType = $dtype;

            fn view(storage: &Storage, scalar_offset: usize, extent: usize) -> Option<&[Self]> {
                match storage {
                    Storage::$variant(values) => values
                        .get(scalar_offset..scalar_offset.checked_add(extent.checked_mul(2)?)?)
                        .map(bytemuck::cast_slice),
                    _ => None,
                }
            }

            fn view_mut(
                storage: &mut Storage,
                scalar_offset: usize,
                extent: usize,
            ) -> Option<&mut [Self]> {
                match storage {
                    Storage::$variant(values) => values
                        .get_mut(scalar_offset..scalar_offset.checked_add(extent.checked_mul(2)?)?)
                        .map(bytemuck::cast_slice_mut),
                    _ => None,
                }
            }

            fn to_complex128(self) -> Complex<f64> {
                Complex::new(f64::from(self.re), f64::from(self.im))
            }

            fn from_complex128(value: Complex<f64>) -> Self {
                Complex::new(value.re as $t, value.im as $t)
            }

            fn is_finite(self) -> bool {
                self.re.is_finite() && self.im.is_finite()
            }

            fn scaled(self, factor: f64) -> Self {
                Complex::new(
                    (f64::from(self.re) * factor) as $t,
                    (f64::from(self.im) * factor) as $t,
                )
            }
        }
    };
}

real_element!(f32, DType::F32, Single);
real_element!(f64, DType::F64, Double);
complex_element!(f32, DType::C32, Single);
complex_element!(f64, DType::C64, Double);

/// Runs `$body` with `$t` bound to the Rust element type of `$dtype`.
#[macro_export]
macro_rules! with_element_type {
    ($dtype:expr, $t:ident => $body:expr) => {
        match $dtype {
            $crate::DType::F32 => {
                type $t = f32;
                $body
            }
            $crate::DType::F64 => {
                type $t = f64;
                $body
            }
            $crate::DType::C32 => {
                type $t = $crate::num_complex::Complex<f32>;
                $body
            }
            $crate::DType::C64 => {
                type $t = $crate::num_complex::Complex<f64>;
                $body
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use num_complex::Complex;

    use super::{DType, Element, Storage};

    #[test]
    fn itemsize_and_alignment_follow_scalar_width() {
        assert_eq!(DType::F32.itemsize(), 4);
        assert_eq!(DType::C32.itemsize(), 8);
        assert_eq!(DType::C64.itemsize(), 16);
        assert_eq!(DType::C64.natural_alignment(), 8);
        assert_eq!(DType::F32.to_complex(), DType::C32);
        assert_eq!(DType::C64.to_real(), DType::F64);
    }

    #[test]
    fn complex_view_starts_at_any_scalar_offset() {
        let storage = Storage::Single(vec![9.0, 1.0, 2.0, 3.0, 4.0]);
        let view = Complex::<f32>::view(&storage, 1, 2).expect("view in range");
        assert_eq!(view, &[Complex::new(1.0, 2.0), Complex::new(3.0, 4.0)]);
        assert!(Complex::<f32>::view(&storage, 2, 2).is_none());
        assert!(f64::view(&storage, 0, 1).is_none());
    }

    #[test]
    fn real_from_complex_keeps_real_part() {
        assert_eq!(f32::from_complex128(Complex::new(2.5, -1.0)), 2.5);
        assert_eq!(Complex::<f64>::from_complex128(Complex::new(1.0, 2.0)).im, 2.0);
    }
}
