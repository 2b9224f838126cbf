use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use ffw_align::{DType, zeros_aligned};
use ffw_fft::{DirectionCode, PlanFlag, PlanOptions, PlanningCoordinator, TransformDirection, TransformPlan};

fn bench_plan_estimate(c: &mut Criterion) {
    let coordinator = PlanningCoordinator::new();
    let input = zeros_aligned(&[1024], DType::C64, None).expect("allocation");
    let output = zeros_aligned(&[1024], DType::C64, None).expect("allocation");
    let options = PlanOptions::default().with_flags(vec![PlanFlag::Estimate]);
    c.bench_function("plan_c2c_1024_estimate", |b| {
        b.iter(|| {
            TransformPlan::new_in(&coordinator, &input, &output, &options)
                .expect("plan")
                .n()
        });
    });
}

fn bench_execute_c2c(c: &mut Criterion) {
    let coordinator = PlanningCoordinator::new();
    let mut group = c.benchmark_group("execute_c2c");
    for len in [64_usize, 1000, 4096] {
        let input = zeros_aligned(&[len], DType::C64, None).expect("allocation");
        let output = zeros_aligned(&[len], DType::C64, None).expect("allocation");
        let plan = TransformPlan::new_in(&coordinator, &input, &output, &PlanOptions::default())
            .expect("plan");
        group.bench_with_input(BenchmarkId::from_parameter(len), &plan, |b, plan| {
            b.iter(|| plan.execute().expect("execute"));
        });
    }
    group.finish();
}

fn bench_execute_batched_threads(c: &mut Criterion) {
    let coordinator = PlanningCoordinator::new();
    let input = zeros_aligned(&[64, 256], DType::F64, None).expect("allocation");
    let output = zeros_aligned(&[64, 129], DType::C64, None).expect("allocation");
    let mut group = c.benchmark_group("execute_r2c_64x256");
    for threads in [1_usize, 4] {
        let options = PlanOptions::default().with_threads(threads);
        let plan = TransformPlan::new_in(&coordinator, &input, &output, &options).expect("plan");
        group.bench_with_input(BenchmarkId::new("threads", threads), &plan, |b, plan| {
            b.iter(|| plan.execute().expect("execute"));
        });
    }
    group.finish();
}

fn bench_execute_r2r(c: &mut Criterion) {
    let coordinator = PlanningCoordinator::new();
    let input = zeros_aligned(&[256], DType::F64, None).expect("allocation");
    let output = zeros_aligned(&[256], DType::F64, None).expect("allocation");
    let options = PlanOptions::default()
        .with_direction(TransformDirection::PerAxis(vec![DirectionCode::Redft10]))
        .with_normalise_inverse(false);
    let plan = TransformPlan::new_in(&coordinator, &input, &output, &options).expect("plan");
    c.bench_function("execute_redft10_256", |b| {
        b.iter(|| plan.execute().expect("execute"));
    });
}

criterion_group!(
    benches,
    bench_plan_estimate,
    bench_execute_c2c,
    bench_execute_batched_threads,
    bench_execute_r2r
);
criterion_main!(benches);
