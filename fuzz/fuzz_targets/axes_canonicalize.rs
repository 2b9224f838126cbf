#![no_main]

use arbitrary::Arbitrary;
use ffw_fft::canonicalize_axes;
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct AxesInput {
    rank: u8,
    axes: Vec<i8>,
}

fuzz_target!(|input: AxesInput| {
    let rank = usize::from(input.rank % 16);
    let axes: Vec<isize> = input.axes.iter().take(32).map(|&axis| isize::from(axis)).collect();
    if let Ok(partition) = canonicalize_axes(&axes, rank) {
        assert!(!partition.axes.is_empty());
        assert_eq!(partition.axes.len() + partition.batch_axes.len(), rank);
        assert_eq!(partition.axes.len(), partition.kept.len());
        assert!(partition.axes.iter().all(|&axis| axis < rank));
    }
});
