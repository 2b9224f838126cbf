//! Runtime crate property suite: mode serialization, ledger bounds, and the
//! shared tolerance helpers.
//!
//! Seed replay: `PROPTEST_SEED=<seed> cargo test -p ffw-runtime --test runtime_properties`

use ffw_runtime::{
    BoundedLedger, RuntimeMode, TestLogEntry, TestLogLevel, TestResult, assert_close,
    assert_close_slice, now_unix_ms, within_tolerance,
};
use proptest::prelude::*;

// ═══════════════════════════════════════════════════════════════════
// §1  RuntimeMode
// ═══════════════════════════════════════════════════════════════════

#[test]
fn mode_serde_strict_json_value() {
    let json = serde_json::to_string(&RuntimeMode::Strict).unwrap();
    assert_eq!(json, "\"Strict\"");
}

#[test]
fn mode_serde_hardened_roundtrip() {
    let json = serde_json::to_string(&RuntimeMode::Hardened).unwrap();
    let back: RuntimeMode = serde_json::from_str(&json).unwrap();
    assert_eq!(back, RuntimeMode::Hardened);
}

#[test]
fn mode_names_match_debug() {
    for mode in [RuntimeMode::Strict, RuntimeMode::Hardened] {
        assert_eq!(mode.name(), format!("{mode:?}"));
    }
}

// ═══════════════════════════════════════════════════════════════════
// §2  BoundedLedger
// ═══════════════════════════════════════════════════════════════════

#[test]
fn ledger_latest_tracks_last_record() {
    let mut ledger = BoundedLedger::new(3);
    assert!(ledger.latest().is_none());
    for i in 0..5 {
        ledger.record(i);
        assert_eq!(ledger.latest(), Some(&i));
    }
    assert_eq!(ledger.len(), 3);
    assert_eq!(ledger.evicted(), 2);
}

#[test]
fn ledger_roundtrips_through_json() {
    let mut ledger = BoundedLedger::new(2);
    ledger.record(String::from("plan"));
    ledger.record(String::from("execute"));
    let json = serde_json::to_string(&ledger).unwrap();
    let back: BoundedLedger<String> = serde_json::from_str(&json).unwrap();
    assert_eq!(back, ledger);
}

// ═══════════════════════════════════════════════════════════════════
// §3  Log entries and tolerance helpers
// ═══════════════════════════════════════════════════════════════════

#[test]
fn log_entry_timestamp_is_recent() {
    let before = now_unix_ms();
    let entry = TestLogEntry::new("ts", "ffw_runtime", "timestamp");
    assert!(entry.timestamp_ms >= before);
    assert_eq!(entry.level, TestLogLevel::Info);
}

#[test]
fn log_entry_parses_back_as_json() {
    let line = TestLogEntry::new("json", "ffw_runtime", "roundtrip")
        .with_result(TestResult::Skip)
        .to_json_line();
    let value: serde_json::Value = serde_json::from_str(&line).unwrap();
    assert_eq!(value["result"], "skip");
    assert_eq!(value["module"], "ffw_runtime");
}

#[test]
fn assert_close_slice_accepts_equal_slices() {
    assert_close_slice(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0 + 1e-13], 1e-12, 0.0);
}

#[test]
#[should_panic(expected = "length mismatch")]
fn assert_close_slice_rejects_length_mismatch() {
    assert_close_slice(&[1.0], &[1.0, 2.0], 1e-12, 0.0);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn prop_ledger_never_exceeds_capacity(
        capacity in 0usize..16,
        records in proptest::collection::vec(any::<u32>(), 0..64),
    ) {
        let mut ledger = BoundedLedger::new(capacity);
        for &record in &records {
            ledger.record(record);
            prop_assert!(ledger.len() <= ledger.capacity());
        }
        let kept = records.len().min(capacity.max(1));
        prop_assert_eq!(ledger.len(), kept);
        prop_assert_eq!(ledger.evicted() as usize, records.len() - kept);
        let drained = ledger.drain();
        prop_assert_eq!(&drained[..], &records[records.len() - kept..]);
    }

    #[test]
    fn prop_within_tolerance_is_reflexive(value in -1e12f64..1e12) {
        prop_assert!(within_tolerance(value, value, 0.0, 0.0));
        assert_close(value, value, 0.0, 0.0);
    }
}
