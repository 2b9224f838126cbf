//! Planner flags and their normalization.

use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::plan::PlanningStrategy;
use crate::scheme::SchemeKind;
use crate::transforms::FftError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PlanFlag {
    Estimate,
    Measure,
    Patient,
    Exhaustive,
    WisdomOnly,
    DestroyInput,
    Unaligned,
    /// Added by normalization; never accepted from callers.
    PreserveInput,
}

impl PlanFlag {
    /// Flags a caller may ask for.
    pub const REQUESTABLE: [Self; 7] = [
        Self::Estimate,
        Self::Measure,
        Self::Patient,
        Self::Exhaustive,
        Self::WisdomOnly,
        Self::DestroyInput,
        Self::Unaligned,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Estimate => "FFTW_ESTIMATE",
            Self::Measure => "FFTW_MEASURE",
            Self::Patient => "FFTW_PATIENT",
            Self::Exhaustive => "FFTW_EXHAUSTIVE",
            Self::WisdomOnly => "FFTW_WISDOM_ONLY",
            Self::DestroyInput => "FFTW_DESTROY_INPUT",
            Self::Unaligned => "FFTW_UNALIGNED",
            Self::PreserveInput => "FFTW_PRESERVE_INPUT",
        }
    }

    /// Bit of the flag in the classic guru interface.
    #[must_use]
    pub const fn native_bit(self) -> u32 {
        match self {
            Self::Measure => 0,
            Self::DestroyInput => 1,
            Self::Unaligned => 1 << 1,
            Self::Exhaustive => 1 << 3,
            Self::PreserveInput => 1 << 4,
            Self::Patient => 1 << 5,
            Self::Estimate => 1 << 6,
            Self::WisdomOnly => 1 << 21,
        }
    }

    const fn rigor(self) -> Option<PlanningStrategy> {
        match self {
            Self::Estimate => Some(PlanningStrategy::EstimateOnly),
            Self::Measure => Some(PlanningStrategy::Measure),
            Self::Patient => Some(PlanningStrategy::Patient),
            Self::Exhaustive => Some(PlanningStrategy::Exhaustive),
            _ => None,
        }
    }
}

impl Display for PlanFlag {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PlanFlag {
    type Err = FftError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        let wanted = if upper.starts_with("FFTW_") {
            upper
        } else {
            format!("FFTW_{upper}")
        };
        Self::REQUESTABLE
            .into_iter()
            .find(|flag| flag.name() == wanted)
            .ok_or_else(|| FftError::InvalidFlag { name: s.to_owned() })
    }
}

/// The normalized flag set a plan is built with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlagSet {
    flags: BTreeSet<PlanFlag>,
}

impl FlagSet {
    /// Builds the effective flag set from the caller's request.
    ///
    /// `unaligned_fallback` is set when neither buffer met a SIMD alignment.
    /// Preserve-input is added unless input destruction was requested, or
    /// the transform is complex-to-real over more than one axis, which can
    /// only run destructively.
    pub fn normalize(
        requested: &[PlanFlag],
        kind: SchemeKind,
        transformed_axes: usize,
        unaligned_fallback: bool,
    ) -> Result<Self, FftError> {
        let mut flags = BTreeSet::new();
        for &flag in requested {
            if flag == PlanFlag::PreserveInput {
                return Err(FftError::InvalidFlag {
                    name: flag.name().to_owned(),
                });
            }
            flags.insert(flag);
        }
        if unaligned_fallback {
            flags.insert(PlanFlag::Unaligned);
        }
        if !flags.contains(&PlanFlag::DestroyInput) {
            if kind == SchemeKind::ComplexToReal && transformed_axes > 1 {
                flags.insert(PlanFlag::DestroyInput);
            } else {
                flags.insert(PlanFlag::PreserveInput);
            }
        }
        Ok(Self { flags })
    }

    #[must_use]
    pub fn contains(&self, flag: PlanFlag) -> bool {
        self.flags.contains(&flag)
    }

    pub fn iter(&self) -> impl Iterator<Item = PlanFlag> + '_ {
        self.flags.iter().copied()
    }

    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.iter().map(PlanFlag::name).collect()
    }

    #[must_use]
    pub fn bits(&self) -> u32 {
        self.iter().fold(0, |bits, flag| bits | flag.native_bit())
    }

    /// Most rigorous planning effort requested; `Measure` when none is named.
    #[must_use]
    pub fn rigor(&self) -> PlanningStrategy {
        self.iter()
            .filter_map(PlanFlag::rigor)
            .max()
            .unwrap_or(PlanningStrategy::Measure)
    }

    #[must_use]
    pub fn preserves_input(&self) -> bool {
        self.contains(PlanFlag::PreserveInput)
    }

    #[must_use]
    pub fn is_unaligned(&self) -> bool {
        self.contains(PlanFlag::Unaligned)
    }

    #[must_use]
    pub fn wisdom_only(&self) -> bool {
        self.contains(PlanFlag::WisdomOnly)
    }
}
