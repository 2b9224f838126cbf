#![no_main]

use arbitrary::Arbitrary;
use ffw_align::{DType, StridedArray};
use ffw_fft::{
    DirectionCode, PlanFlag, PlanOptions, PlanningCoordinator, TransformDirection, TransformPlan,
};
use ffw_runtime::RuntimeMode;
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct PlanInput {
    input_dtype: u8,
    output_dtype: u8,
    input_shape: Vec<u8>,
    output_shape: Vec<u8>,
    axes: Vec<i8>,
    directions: Vec<u8>,
    flags: Vec<u8>,
    threads: u8,
    ortho: bool,
    normalise_inverse: bool,
    hardened: bool,
    execute: bool,
}

fn dtype(tag: u8) -> DType {
    DType::ALL[usize::from(tag) % DType::ALL.len()]
}

fn shape(dims: &[u8]) -> Vec<usize> {
    dims.iter().take(3).map(|&n| usize::from(n % 9)).collect()
}

fn direction_code(tag: u8) -> DirectionCode {
    match tag % 10 {
        0 => DirectionCode::Forward,
        1 => DirectionCode::Backward,
        other => DirectionCode::REAL_TO_REAL[usize::from(other - 2)],
    }
}

fuzz_target!(|input: PlanInput| {
    let (Ok(source), Ok(target)) = (
        StridedArray::zeros(&shape(&input.input_shape), dtype(input.input_dtype)),
        StridedArray::zeros(&shape(&input.output_shape), dtype(input.output_dtype)),
    ) else {
        return;
    };
    let codes: Vec<DirectionCode> = input.directions.iter().take(4).map(|&d| direction_code(d)).collect();
    let direction = if codes.len() == 1 {
        TransformDirection::Single(codes[0])
    } else {
        TransformDirection::PerAxis(codes)
    };
    let flags: Vec<PlanFlag> = input
        .flags
        .iter()
        .take(4)
        .map(|&f| PlanFlag::REQUESTABLE[usize::from(f) % PlanFlag::REQUESTABLE.len()])
        .filter(|&flag| flag != PlanFlag::Measure && flag != PlanFlag::Patient && flag != PlanFlag::Exhaustive)
        .chain(std::iter::once(PlanFlag::Estimate))
        .collect();
    let options = PlanOptions::default()
        .with_axes(input.axes.iter().take(4).map(|&a| isize::from(a)).collect::<Vec<_>>())
        .with_direction(direction)
        .with_flags(flags)
        .with_threads(usize::from(input.threads % 3))
        .with_ortho(input.ortho)
        .with_normalise_inverse(input.normalise_inverse)
        .with_mode(if input.hardened {
            RuntimeMode::Hardened
        } else {
            RuntimeMode::Strict
        });
    let coordinator = PlanningCoordinator::new();
    if let Ok(mut plan) = TransformPlan::new_in(&coordinator, &source, &target, &options) {
        assert!(plan.n() >= 1);
        if input.execute {
            let _ = plan.call();
        }
    }
});
