//! Scheme registry: dtype pairs, valid directions, shape validators.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use ffw_align::DType;
use serde::{Deserialize, Serialize};

use crate::transforms::FftError;

/// Transform family selected by the (input, output) dtype pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SchemeKind {
    ComplexToComplex,
    RealToComplex,
    ComplexToReal,
    RealToReal,
}

impl SchemeKind {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ComplexToComplex => "c2c",
            Self::RealToComplex => "r2c",
            Self::ComplexToReal => "c2r",
            Self::RealToReal => "r2r",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Precision {
    Single,
    Double,
}

impl Precision {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Double => "double",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransformScheme {
    pub kind: SchemeKind,
    pub precision: Precision,
}

impl TransformScheme {
    #[must_use]
    pub const fn new(kind: SchemeKind, precision: Precision) -> Self {
        Self { kind, precision }
    }

    #[must_use]
    pub fn input_dtype(self) -> DType {
        let real = self.real_dtype();
        match self.kind {
            SchemeKind::ComplexToComplex | SchemeKind::ComplexToReal => real.to_complex(),
            SchemeKind::RealToComplex | SchemeKind::RealToReal => real,
        }
    }

    #[must_use]
    pub fn output_dtype(self) -> DType {
        let real = self.real_dtype();
        match self.kind {
            SchemeKind::ComplexToComplex | SchemeKind::RealToComplex => real.to_complex(),
            SchemeKind::ComplexToReal | SchemeKind::RealToReal => real,
        }
    }

    fn real_dtype(self) -> DType {
        match self.precision {
            Precision::Single => DType::F32,
            Precision::Double => DType::F64,
        }
    }

    #[must_use]
    pub fn valid_directions(self) -> &'static [DirectionCode] {
        valid_directions(self.kind)
    }
}

impl Display for TransformScheme {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}", self.kind.name(), self.precision.name())
    }
}

const SCHEME_TABLE: [(DType, DType, TransformScheme); 8] = [
    (
        DType::C32,
        DType::C32,
        TransformScheme::new(SchemeKind::ComplexToComplex, Precision::Single),
    ),
    (
        DType::C64,
        DType::C64,
        TransformScheme::new(SchemeKind::ComplexToComplex, Precision::Double),
    ),
    (
        DType::F32,
        DType::C32,
        TransformScheme::new(SchemeKind::RealToComplex, Precision::Single),
    ),
    (
        DType::F64,
        DType::C64,
        TransformScheme::new(SchemeKind::RealToComplex, Precision::Double),
    ),
    (
        DType::C32,
        DType::F32,
        TransformScheme::new(SchemeKind::ComplexToReal, Precision::Single),
    ),
    (
        DType::C64,
        DType::F64,
        TransformScheme::new(SchemeKind::ComplexToReal, Precision::Double),
    ),
    (
        DType::F32,
        DType::F32,
        TransformScheme::new(SchemeKind::RealToReal, Precision::Single),
    ),
    (
        DType::F64,
        DType::F64,
        TransformScheme::new(SchemeKind::RealToReal, Precision::Double),
    ),
];

/// Exact-match lookup of the scheme serving `input -> output`.
pub fn resolve_scheme(input: DType, output: DType) -> Result<TransformScheme, FftError> {
    SCHEME_TABLE
        .iter()
        .find(|(from, to, _)| *from == input && *to == output)
        .map(|&(_, _, scheme)| scheme)
        .ok_or(FftError::UnsupportedScheme { input, output })
}

/// Every supported scheme, in registry order.
pub fn supported_schemes() -> impl Iterator<Item = TransformScheme> {
    SCHEME_TABLE.iter().map(|&(_, _, scheme)| scheme)
}

/// Transform direction, or symmetry code for real-to-real transforms.
///
/// `native_code` gives the integer the classic guru interface uses for each
/// value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DirectionCode {
    Forward,
    Backward,
    /// DCT-I.
    Redft00,
    /// DCT-III.
    Redft01,
    /// DCT-II.
    Redft10,
    /// DCT-IV.
    Redft11,
    /// DST-I.
    Rodft00,
    /// DST-III.
    Rodft01,
    /// DST-II.
    Rodft10,
    /// DST-IV.
    Rodft11,
}

impl DirectionCode {
    pub const REAL_TO_REAL: [Self; 8] = [
        Self::Redft00,
        Self::Redft01,
        Self::Redft10,
        Self::Redft11,
        Self::Rodft00,
        Self::Rodft01,
        Self::Rodft10,
        Self::Rodft11,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Forward => "forward",
            Self::Backward => "backward",
            Self::Redft00 => "redft00",
            Self::Redft01 => "redft01",
            Self::Redft10 => "redft10",
            Self::Redft11 => "redft11",
            Self::Rodft00 => "rodft00",
            Self::Rodft01 => "rodft01",
            Self::Rodft10 => "rodft10",
            Self::Rodft11 => "rodft11",
        }
    }

    #[must_use]
    pub const fn native_code(self) -> i32 {
        match self {
            Self::Forward => -1,
            Self::Backward => 1,
            Self::Redft00 => 3,
            Self::Redft01 => 4,
            Self::Redft10 => 5,
            Self::Redft11 => 6,
            Self::Rodft00 => 7,
            Self::Rodft01 => 8,
            Self::Rodft10 => 9,
            Self::Rodft11 => 10,
        }
    }

    #[must_use]
    pub const fn is_real_to_real(self) -> bool {
        !matches!(self, Self::Forward | Self::Backward)
    }

    /// Contribution of an axis of length `n` to the transform size `N`.
    pub fn logical_length(self, n: usize) -> Result<usize, FftError> {
        if n < 1 {
            return Err(FftError::InvalidShape {
                detail: "transformed axis lengths must be at least 1".to_owned(),
            });
        }
        let length = match self {
            Self::Forward | Self::Backward => Some(n),
            Self::Redft00 => {
                if n < 2 {
                    return Err(FftError::InvalidShape {
                        detail: "redft00 needs an axis length of at least 2".to_owned(),
                    });
                }
                (n - 1).checked_mul(2)
            }
            Self::Rodft00 => n.checked_add(1).and_then(|m| m.checked_mul(2)),
            _ => n.checked_mul(2),
        };
        length.ok_or(FftError::DimensionTooLarge {
            value: n,
            limit: usize::MAX / 2,
        })
    }
}

impl Display for DirectionCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DirectionCode {
    type Err = FftError;

    /// Accepts `"forward"` style names, case-insensitively, with or without
    /// an `FFTW_` prefix.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        let name = lowered.strip_prefix("fftw_").unwrap_or(&lowered);
        [Self::Forward, Self::Backward]
            .into_iter()
            .chain(Self::REAL_TO_REAL)
            .find(|code| code.name() == name)
            .ok_or_else(|| FftError::InvalidDirection {
                detail: format!("unknown direction {s:?}"),
            })
    }
}

/// Directions a scheme accepts.
#[must_use]
pub fn valid_directions(kind: SchemeKind) -> &'static [DirectionCode] {
    match kind {
        SchemeKind::ComplexToComplex => &[DirectionCode::Forward, DirectionCode::Backward],
        SchemeKind::RealToComplex => &[DirectionCode::Forward],
        SchemeKind::ComplexToReal => &[DirectionCode::Backward],
        SchemeKind::RealToReal => &DirectionCode::REAL_TO_REAL,
    }
}

/// Checks input/output shapes of a plan given its axis partition.
///
/// Arguments: input shape, output shape, transformed axes, batch axes.
pub type ShapeValidator = fn(&[usize], &[usize], &[usize], &[usize]) -> Result<(), FftError>;

/// `None` means the shapes must be identical.
#[must_use]
pub fn shape_validator(kind: SchemeKind) -> Option<ShapeValidator> {
    match kind {
        SchemeKind::RealToComplex => Some(validate_real_forward_shapes),
        SchemeKind::ComplexToReal => Some(validate_real_backward_shapes),
        SchemeKind::ComplexToComplex | SchemeKind::RealToReal => None,
    }
}

/// Shape check used when a scheme has no validator of its own.
pub fn validate_equal_shapes(input: &[usize], output: &[usize]) -> Result<(), FftError> {
    if input == output {
        Ok(())
    } else {
        Err(FftError::InvalidShape {
            detail: format!("input shape {input:?} and output shape {output:?} must match"),
        })
    }
}

/// Logical transform shape: the real side of a real/complex pair.
#[must_use]
pub fn implied_fft_shape<'a>(
    kind: SchemeKind,
    input_shape: &'a [usize],
    output_shape: &'a [usize],
) -> &'a [usize] {
    match kind {
        SchemeKind::ComplexToReal => output_shape,
        _ => input_shape,
    }
}

fn validate_real_forward_shapes(
    input: &[usize],
    output: &[usize],
    axes: &[usize],
    batch_axes: &[usize],
) -> Result<(), FftError> {
    check_packed_shapes(input, output, axes, batch_axes, "output")
}

fn validate_real_backward_shapes(
    input: &[usize],
    output: &[usize],
    axes: &[usize],
    batch_axes: &[usize],
) -> Result<(), FftError> {
    check_packed_shapes(output, input, axes, batch_axes, "input")
}

/// `full` is the real-side shape, `packed` the complex side whose last
/// transformed axis holds `full / 2 + 1` entries.
fn check_packed_shapes(
    full: &[usize],
    packed: &[usize],
    axes: &[usize],
    batch_axes: &[usize],
    packed_role: &str,
) -> Result<(), FftError> {
    for &axis in batch_axes {
        if full[axis] != packed[axis] {
            return Err(FftError::InvalidShape {
                detail: format!(
                    "batch axis {axis} has length {} on the real side but {} on the complex side",
                    full[axis], packed[axis]
                ),
            });
        }
    }
    let Some((&last, leading)) = axes.split_last() else {
        return Err(FftError::InvalidAxis {
            detail: "no transformed axes".to_owned(),
        });
    };
    for &axis in leading {
        if full[axis] != packed[axis] {
            return Err(FftError::InvalidShape {
                detail: format!(
                    "transformed axis {axis} has length {} on the real side but {} on the complex side",
                    full[axis], packed[axis]
                ),
            });
        }
    }
    let expected = full[last] / 2 + 1;
    if packed[last] != expected {
        return Err(FftError::InvalidShape {
            detail: format!(
                "{packed_role} length on axis {last} must be {expected} (= {} // 2 + 1), got {}",
                full[last], packed[last]
            ),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use ffw_align::DType;

    use super::{
        DirectionCode, Precision, SchemeKind, TransformScheme, implied_fft_shape, resolve_scheme,
        shape_validator, supported_schemes, valid_directions,
    };
    use crate::FftError;

    #[test]
    fn registry_covers_every_dtype_pair_exactly_once() {
        for scheme in supported_schemes() {
            let resolved = resolve_scheme(scheme.input_dtype(), scheme.output_dtype())
                .expect("registered pair should resolve");
            assert_eq!(resolved, scheme);
        }
        assert_eq!(supported_schemes().count(), 8);
    }

    #[test]
    fn mixed_precision_pairs_are_unsupported() {
        assert_eq!(
            resolve_scheme(DType::F32, DType::C64),
            Err(FftError::UnsupportedScheme {
                input: DType::F32,
                output: DType::C64
            })
        );
    }

    #[test]
    fn scheme_display_names_kind_and_precision() {
        let scheme = TransformScheme::new(SchemeKind::RealToComplex, Precision::Double);
        assert_eq!(scheme.to_string(), "r2c_double");
    }

    #[test]
    fn direction_names_parse_with_or_without_prefix() {
        assert_eq!("FFTW_REDFT10".parse::<DirectionCode>(), Ok(DirectionCode::Redft10));
        assert_eq!("backward".parse::<DirectionCode>(), Ok(DirectionCode::Backward));
        assert!(matches!(
            "sideways".parse::<DirectionCode>(),
            Err(FftError::InvalidDirection { .. })
        ));
    }

    #[test]
    fn real_schemes_accept_one_direction() {
        assert_eq!(
            valid_directions(SchemeKind::RealToComplex),
            &[DirectionCode::Forward]
        );
        assert_eq!(
            valid_directions(SchemeKind::ComplexToReal),
            &[DirectionCode::Backward]
        );
        assert!(
            valid_directions(SchemeKind::RealToReal)
                .iter()
                .all(|code| code.is_real_to_real())
        );
    }

    #[test]
    fn logical_lengths_follow_symmetry_codes() {
        assert_eq!(DirectionCode::Rodft00.logical_length(5), Ok(12));
        assert_eq!(DirectionCode::Redft00.logical_length(5), Ok(8));
        assert_eq!(DirectionCode::Redft11.logical_length(5), Ok(10));
        assert_eq!(DirectionCode::Forward.logical_length(5), Ok(5));
        assert!(matches!(
            DirectionCode::Redft00.logical_length(1),
            Err(FftError::InvalidShape { .. })
        ));
        assert!(matches!(
            DirectionCode::Backward.logical_length(0),
            Err(FftError::InvalidShape { .. })
        ));
    }

    #[test]
    fn packed_axis_uses_floor_division() {
        let validator = shape_validator(SchemeKind::RealToComplex).expect("r2c has a validator");
        assert!(validator(&[4, 7], &[4, 4], &[1], &[0]).is_ok());
        assert!(validator(&[4, 8], &[4, 5], &[1], &[0]).is_ok());
        assert!(validator(&[4, 8], &[4, 4], &[1], &[0]).is_err());
        assert!(validator(&[4, 8], &[3, 5], &[1], &[0]).is_err());
        let inverse = shape_validator(SchemeKind::ComplexToReal).expect("c2r has a validator");
        assert!(inverse(&[3, 5], &[3, 9], &[0, 1], &[]).is_ok());
        assert!(shape_validator(SchemeKind::ComplexToComplex).is_none());
    }

    #[test]
    fn implied_shape_is_the_real_side() {
        let input = [4, 8];
        let output = [4, 5];
        assert_eq!(
            implied_fft_shape(SchemeKind::RealToComplex, &input, &output),
            &input
        );
        assert_eq!(
            implied_fft_shape(SchemeKind::ComplexToReal, &output, &input),
            &input
        );
    }
}
