#![forbid(unsafe_code)]

//! FrankenFFTW runtime: operating mode, bounded audit ledger, and the shared
//! structured-logging and tolerance helpers used by every crate's tests.
//!
//! ## Module layout
//!
//! | Module      | Contents                                      |
//! |-------------|-----------------------------------------------|
//! | `mode`      | [`RuntimeMode`] enum (Strict / Hardened)      |
//! | `evidence`  | [`BoundedLedger`] bounded FIFO record buffer  |

pub mod evidence;
pub mod mode;

// ── Re-exports: preserve the flat public API ────────────────────────
pub use evidence::BoundedLedger;
pub use mode::RuntimeMode;

use std::time::{SystemTime, UNIX_EPOCH};

use num_complex::Complex;
use serde::{Deserialize, Serialize};

/// Wall-clock timestamp for trace and log entries.
#[must_use]
pub fn now_unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as u64)
}

// ═══════════════════════════════════════════════════════════════════
// Test helpers: shared assertion and logging utilities
// ═══════════════════════════════════════════════════════════════════

/// One JSON log line per test step, so runs with different seeds or modes
/// can be compared after the fact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestLogEntry {
    pub test_id: String,
    pub timestamp_ms: u64,
    pub level: TestLogLevel,
    pub module: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixture_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<RuntimeMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<TestResult>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestLogLevel {
    Info,
    Warn,
    Error,
    Debug,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestResult {
    Pass,
    Fail,
    Skip,
    Warn,
}

impl TestLogEntry {
    #[must_use]
    pub fn new(
        test_id: impl Into<String>,
        module: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            test_id: test_id.into(),
            timestamp_ms: now_unix_ms(),
            level: TestLogLevel::Info,
            module: module.into(),
            message: message.into(),
            seed: None,
            fixture_id: None,
            mode: None,
            result: None,
        }
    }

    #[must_use]
    pub fn with_level(mut self, level: TestLogLevel) -> Self {
        self.level = level;
        self
    }

    #[must_use]
    pub fn with_result(mut self, result: TestResult) -> Self {
        self.result = Some(result);
        self
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    #[must_use]
    pub fn with_mode(mut self, mode: RuntimeMode) -> Self {
        self.mode = Some(mode);
        self
    }

    #[must_use]
    pub fn with_fixture(mut self, fixture_id: impl Into<String>) -> Self {
        self.fixture_id = Some(fixture_id.into());
        self
    }

    #[must_use]
    pub fn to_json_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// `|actual - expected| <= atol + rtol * |expected|`.
#[must_use]
pub fn within_tolerance(actual: f64, expected: f64, atol: f64, rtol: f64) -> bool {
    (actual - expected).abs() <= atol + rtol * expected.abs()
}

/// Panics unless `actual` is within tolerance of `expected`.
pub fn assert_close(actual: f64, expected: f64, atol: f64, rtol: f64) {
    assert!(
        within_tolerance(actual, expected, atol, rtol),
        "assert_close failed: actual={actual} expected={expected} diff={} (atol={atol}, rtol={rtol})",
        (actual - expected).abs()
    );
}

/// Element-wise [`assert_close`] over real samples.
pub fn assert_close_slice(actual: &[f64], expected: &[f64], atol: f64, rtol: f64) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "assert_close_slice: length mismatch"
    );
    for (idx, (&a, &e)) in actual.iter().zip(expected).enumerate() {
        assert!(
            within_tolerance(a, e, atol, rtol),
            "assert_close_slice[{idx}]: actual={a} expected={e} diff={} (atol={atol}, rtol={rtol})",
            (a - e).abs()
        );
    }
}

/// Element-wise closeness of two spectra, measured on the complex modulus
/// of the difference.
pub fn assert_close_spectrum(actual: &[Complex<f64>], expected: &[Complex<f64>], atol: f64, rtol: f64) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "assert_close_spectrum: length mismatch"
    );
    for (idx, (a, e)) in actual.iter().zip(expected).enumerate() {
        let diff = (a - e).norm();
        assert!(
            diff <= atol + rtol * e.norm(),
            "assert_close_spectrum[{idx}]: actual={a} expected={e} diff={diff}"
        );
    }
}
