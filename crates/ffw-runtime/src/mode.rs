#![forbid(unsafe_code)]

//! Runtime mode definitions for Strict (library-compatible) and Hardened operation.

use serde::{Deserialize, Serialize};

/// Operational mode governing compatibility/safety trade-offs.
///
/// - **Strict**: Match the guru-interface library behavior exactly; buffers are
///   trusted to hold finite values and execution performs no value checks.
/// - **Hardened**: Extra safety layer on top; the call path rejects non-finite
///   input values before any native execution runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RuntimeMode {
    #[default]
    Strict,
    Hardened,
}

impl RuntimeMode {
    /// Whether value-level checks are on regardless of per-call options.
    #[must_use]
    pub const fn checks_values(self) -> bool {
        matches!(self, Self::Hardened)
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Strict => "Strict",
            Self::Hardened => "Hardened",
        }
    }
}
