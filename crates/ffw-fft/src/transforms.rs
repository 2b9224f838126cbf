use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Instant;

use ffw_align::{
    BufferError, DType, StridedArray, allocate_layout_aligned, is_byte_aligned,
    valid_simd_alignments,
};
use ffw_runtime::{BoundedLedger, RuntimeMode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::axes::{AxisPartition, canonicalize_axes};
use crate::flags::{FlagSet, PlanFlag};
use crate::guru::{GuruDim, GuruProblem, NativePlan};
use crate::plan::{PlanFingerprint, PlanningCoordinator, WisdomKey};
use crate::scheme::{
    DirectionCode, SchemeKind, TransformScheme, implied_fft_shape, resolve_scheme,
    shape_validator, validate_equal_shapes,
};

/// Which of a plan's two buffers an error or check refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArrayRole {
    Input,
    Output,
}

impl Display for ArrayRole {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Input => "input",
            Self::Output => "output",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FftError {
    #[error("invalid argument: {detail}")]
    InvalidArgument { detail: String },
    #[error("no transform scheme maps {input} to {output}")]
    UnsupportedScheme { input: DType, output: DType },
    #[error("{role} array is not aligned to its natural {alignment}-byte boundary")]
    InvalidAlignment { role: ArrayRole, alignment: usize },
    #[error("invalid axes: {detail}")]
    InvalidAxis { detail: String },
    #[error("invalid shape: {detail}")]
    InvalidShape { detail: String },
    #[error("unknown planner flag `{name}`")]
    InvalidFlag { name: String },
    #[error("invalid direction: {detail}")]
    InvalidDirection { detail: String },
    #[error("dimension value {value} exceeds the guru limit {limit}")]
    DimensionTooLarge { value: usize, limit: usize },
    #[error("no plan available: wisdom-only planning found no usable wisdom")]
    NoPlanAvailable,
    #[error("native planner failed: {detail}")]
    PlannerFailed { detail: String },
    #[error("{role} array must be aligned to {required} bytes")]
    AlignmentMismatch { role: ArrayRole, required: usize },
    #[error("{role} array dtype mismatch: expected {expected}, got {actual}")]
    DtypeMismatch {
        role: ArrayRole,
        expected: DType,
        actual: DType,
    },
    #[error("{role} array shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        role: ArrayRole,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
    #[error("{role} array stride mismatch: expected {expected:?}, got {actual:?}")]
    StrideMismatch {
        role: ArrayRole,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
    #[error("invalid thread count: {requested}")]
    InvalidThreads { requested: usize },
    #[error("non-finite input rejected by policy")]
    NonFiniteInput,
    #[error("invalid wisdom: {detail}")]
    InvalidWisdom { detail: String },
    #[error(transparent)]
    Buffer(#[from] BufferError),
}

/// Requested transform direction: one code for complex schemes, one code
/// per transformed axis for real-to-real.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransformDirection {
    Single(DirectionCode),
    PerAxis(Vec<DirectionCode>),
}

impl Default for TransformDirection {
    fn default() -> Self {
        Self::Single(DirectionCode::Forward)
    }
}

impl From<DirectionCode> for TransformDirection {
    fn from(code: DirectionCode) -> Self {
        Self::Single(code)
    }
}

impl TransformDirection {
    #[must_use]
    pub fn codes(&self) -> &[DirectionCode] {
        match self {
            Self::Single(code) => std::slice::from_ref(code),
            Self::PerAxis(codes) => codes,
        }
    }

    /// True only for a single complex backward transform, the one case
    /// inverse normalization applies to.
    #[must_use]
    pub fn is_backward(&self) -> bool {
        matches!(self, Self::Single(DirectionCode::Backward))
    }
}

impl Display for TransformDirection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.codes().iter().map(|code| code.name()).collect();
        f.write_str(&names.join(","))
    }
}

/// Construction options for [`TransformPlan`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanOptions {
    pub axes: Vec<isize>,
    pub direction: TransformDirection,
    pub flags: Vec<PlanFlag>,
    pub threads: usize,
    /// Planning budget in seconds; `None` is unlimited.
    pub planning_timelimit: Option<f64>,
    pub normalise_inverse: bool,
    pub ortho: bool,
    pub mode: RuntimeMode,
    pub check_finite: bool,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            axes: vec![-1],
            direction: TransformDirection::default(),
            flags: vec![PlanFlag::Measure],
            threads: 1,
            planning_timelimit: None,
            normalise_inverse: true,
            ortho: false,
            mode: RuntimeMode::Strict,
            check_finite: false,
        }
    }
}

impl PlanOptions {
    #[must_use]
    pub fn with_axes(mut self, axes: impl Into<Vec<isize>>) -> Self {
        self.axes = axes.into();
        self
    }

    #[must_use]
    pub fn with_direction(mut self, direction: impl Into<TransformDirection>) -> Self {
        self.direction = direction.into();
        self
    }

    #[must_use]
    pub fn with_flags(mut self, flags: impl Into<Vec<PlanFlag>>) -> Self {
        self.flags = flags.into();
        self
    }

    /// Parses flag names such as `"FFTW_MEASURE"` or `"destroy_input"`.
    pub fn with_flag_names(mut self, names: &[&str]) -> Result<Self, FftError> {
        self.flags = names
            .iter()
            .map(|name| name.parse())
            .collect::<Result<_, _>>()?;
        Ok(self)
    }

    #[must_use]
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    #[must_use]
    pub fn with_planning_timelimit(mut self, seconds: Option<f64>) -> Self {
        self.planning_timelimit = seconds;
        self
    }

    #[must_use]
    pub fn with_normalise_inverse(mut self, normalise_inverse: bool) -> Self {
        self.normalise_inverse = normalise_inverse;
        self
    }

    #[must_use]
    pub fn with_ortho(mut self, ortho: bool) -> Self {
        self.ortho = ortho;
        self
    }

    #[must_use]
    pub fn with_mode(mut self, mode: RuntimeMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn with_check_finite(mut self, check_finite: bool) -> Self {
        self.check_finite = check_finite;
        self
    }
}

/// Per-call overrides for [`TransformPlan::call_with`].
#[derive(Debug, Clone, Default)]
pub struct CallRequest {
    pub input: Option<StridedArray>,
    pub output: Option<StridedArray>,
    pub normalise_inverse: Option<bool>,
    pub ortho: Option<bool>,
}

impl CallRequest {
    #[must_use]
    pub fn with_input(mut self, input: StridedArray) -> Self {
        self.input = Some(input);
        self
    }

    #[must_use]
    pub fn with_output(mut self, output: StridedArray) -> Self {
        self.output = Some(output);
        self
    }

    #[must_use]
    pub fn with_normalise_inverse(mut self, normalise_inverse: bool) -> Self {
        self.normalise_inverse = Some(normalise_inverse);
        self
    }

    #[must_use]
    pub fn with_ortho(mut self, ortho: bool) -> Self {
        self.ortho = Some(ortho);
        self
    }
}

/// Guru descriptors a plan was built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanParameters {
    pub dims: Vec<GuruDim>,
    pub howmany_dims: Vec<GuruDim>,
}

impl PlanParameters {
    fn from_partition(
        partition: &AxisPartition,
        fft_shape: &[usize],
        input: &StridedArray,
        output: &StridedArray,
    ) -> Self {
        let describe = |axis: usize, n: usize| GuruDim {
            n,
            is: input.strides()[axis],
            os: output.strides()[axis],
        };
        Self {
            dims: partition
                .axes
                .iter()
                .map(|&axis| describe(axis, fft_shape[axis]))
                .collect(),
            howmany_dims: partition
                .batch_axes
                .iter()
                .map(|&axis| describe(axis, input.shape()[axis]))
                .collect(),
        }
    }

    #[must_use]
    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    #[must_use]
    pub fn howmany_rank(&self) -> usize {
        self.howmany_dims.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceEvent {
    Plan,
    Execute,
    UpdateArrays,
    Call,
    Release,
}

/// One structured record per plan lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformTrace {
    pub operation_id: String,
    pub plan_id: Arc<str>,
    pub event: TraceEvent,
    pub scheme: Arc<str>,
    pub direction: Arc<str>,
    pub n: usize,
    pub flags: Arc<[String]>,
    pub wisdom_hit: bool,
    pub threads: usize,
    pub mode: RuntimeMode,
    pub timing_ns: u64,
}

impl TransformTrace {
    #[must_use]
    pub fn to_json_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

const TRACE_CAPACITY: usize = 4096;

static TRACE_LOG: OnceLock<Mutex<BoundedLedger<TransformTrace>>> = OnceLock::new();
static TRACE_ENABLED: AtomicBool = AtomicBool::new(true);
static OPERATION_COUNTER: AtomicU64 = AtomicU64::new(1);
static PLAN_COUNTER: AtomicU64 = AtomicU64::new(1);

fn trace_log() -> &'static Mutex<BoundedLedger<TransformTrace>> {
    TRACE_LOG.get_or_init(|| Mutex::new(BoundedLedger::new(TRACE_CAPACITY)))
}

fn next_operation_id() -> String {
    let next = OPERATION_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("fft-op-{next:016x}")
}

fn next_plan_id() -> String {
    let next = PLAN_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("fft-plan-{next:016x}")
}

/// Turns trace recording on or off for every plan in the process.
///
/// While off, plan events skip the shared trace log entirely.
pub fn set_transform_tracing(enabled: bool) {
    TRACE_ENABLED.store(enabled, Ordering::Relaxed);
}

#[must_use]
pub fn transform_tracing_enabled() -> bool {
    TRACE_ENABLED.load(Ordering::Relaxed)
}

fn record_trace(trace: TransformTrace) {
    if let Ok(mut log) = trace_log().lock() {
        log.record(trace);
    }
}

/// Drains every trace recorded so far, oldest first.
#[must_use]
pub fn take_transform_traces() -> Vec<TransformTrace> {
    if let Ok(mut log) = trace_log().lock() {
        return log.drain();
    }
    Vec::new()
}

/// Drains the traces of one plan, oldest first, leaving other plans' traces.
#[must_use]
pub fn take_plan_traces(plan_id: &str) -> Vec<TransformTrace> {
    if let Ok(mut log) = trace_log().lock() {
        return log.drain_where(|trace| &*trace.plan_id == plan_id);
    }
    Vec::new()
}

/// Trace fields fixed at construction and shared by every record of a plan.
#[derive(Debug, Clone)]
struct TraceLabels {
    plan_id: Arc<str>,
    scheme: Arc<str>,
    direction: Arc<str>,
    flags: Arc<[String]>,
}

impl TraceLabels {
    fn new(scheme: TransformScheme, direction: &TransformDirection, flags: &FlagSet) -> Self {
        Self {
            plan_id: next_plan_id().into(),
            scheme: scheme.to_string().into(),
            direction: direction.to_string().into(),
            flags: flags.names().into_iter().map(str::to_owned).collect(),
        }
    }
}

/// Alignment each buffer is held to for the life of the plan.
#[derive(Debug, Clone, Copy)]
struct AlignmentClass {
    input: usize,
    output: usize,
    simd: bool,
    fallback: bool,
}

impl AlignmentClass {
    fn detect(
        input: &StridedArray,
        output: &StridedArray,
        unaligned_requested: bool,
    ) -> Result<Self, FftError> {
        for (role, array) in [(ArrayRole::Input, input), (ArrayRole::Output, output)] {
            let alignment = array.dtype().natural_alignment();
            if !is_byte_aligned(array, alignment) {
                return Err(FftError::InvalidAlignment { role, alignment });
            }
        }
        let natural = Self {
            input: input.dtype().natural_alignment(),
            output: output.dtype().natural_alignment(),
            simd: false,
            fallback: false,
        };
        if unaligned_requested {
            return Ok(natural);
        }
        let shared = valid_simd_alignments()
            .iter()
            .copied()
            .find(|&n| is_byte_aligned(input, n) && is_byte_aligned(output, n));
        Ok(match shared {
            Some(n) => Self {
                input: n,
                output: n,
                simd: true,
                fallback: false,
            },
            None => {
                tracing::debug!("buffers share no SIMD alignment, planning unaligned");
                Self {
                    fallback: true,
                    ..natural
                }
            }
        })
    }
}

fn validate_planner_settings(options: &PlanOptions) -> Result<(), FftError> {
    if options.threads == 0 {
        return Err(FftError::InvalidThreads { requested: 0 });
    }
    if let Some(limit) = options.planning_timelimit
        && !(limit.is_finite() && limit >= 0.0)
    {
        return Err(FftError::InvalidArgument {
            detail: format!("planning time limit must be a non-negative number of seconds, got {limit}"),
        });
    }
    Ok(())
}

fn validate_directions(
    scheme: TransformScheme,
    direction: &TransformDirection,
    axis_count: usize,
) -> Result<Vec<DirectionCode>, FftError> {
    let codes = direction.codes();
    if let Some(code) = codes
        .iter()
        .find(|code| !scheme.valid_directions().contains(*code))
    {
        return Err(FftError::InvalidDirection {
            detail: format!("{code} is not valid for {scheme}"),
        });
    }
    match scheme.kind {
        SchemeKind::RealToReal if codes.len() != axis_count => Err(FftError::InvalidDirection {
            detail: format!(
                "{} real-to-real codes given for {axis_count} axes",
                codes.len()
            ),
        }),
        SchemeKind::RealToReal => Ok(codes.to_vec()),
        _ if codes.len() != 1 => Err(FftError::InvalidDirection {
            detail: format!("{scheme} takes exactly one direction"),
        }),
        _ => Ok(codes.to_vec()),
    }
}

/// Logical transform size `N`, the product of per-axis logical lengths.
fn transform_size(
    kind: SchemeKind,
    axes: &[usize],
    fft_shape: &[usize],
    codes: &[DirectionCode],
) -> Result<usize, FftError> {
    axes.iter().enumerate().try_fold(1usize, |total, (i, &axis)| {
        let code = if kind == SchemeKind::RealToReal {
            codes[i]
        } else {
            DirectionCode::Forward
        };
        let length = code.logical_length(fft_shape[axis])?;
        total
            .checked_mul(length)
            .ok_or(FftError::DimensionTooLarge {
                value: usize::MAX,
                limit: crate::guru::MAX_GURU_DIMENSION,
            })
    })
}

fn ortho_conflict() -> FftError {
    FftError::InvalidDirection {
        detail: "ortho and normalise_inverse cannot both be set".to_owned(),
    }
}

/// A planned transform bound to an input and an output buffer.
///
/// The plan owns its native plan and keeps the bound buffers alive. It is
/// `Send + Sync`; execution only takes shared locks on the buffers it
/// reads.
#[derive(Debug)]
pub struct TransformPlan {
    labels: TraceLabels,
    native: NativePlan,
    scheme: TransformScheme,
    direction: TransformDirection,
    axes: Vec<usize>,
    batch_axes: Vec<usize>,
    flags: FlagSet,
    parameters: PlanParameters,
    n: usize,
    input: StridedArray,
    output: StridedArray,
    input_shape: Vec<usize>,
    output_shape: Vec<usize>,
    input_strides: Vec<usize>,
    output_strides: Vec<usize>,
    input_alignment: usize,
    output_alignment: usize,
    simd_aligned: bool,
    normalise_inverse: bool,
    ortho: bool,
    mode: RuntimeMode,
    check_finite: bool,
    threads: usize,
    planning_timelimit: Option<f64>,
}

struct Binding<'a> {
    role: ArrayRole,
    array: &'a StridedArray,
    dtype: DType,
    alignment: usize,
    shape: &'a [usize],
    strides: &'a [usize],
}

impl TransformPlan {
    /// Plans a transform from `input` to `output` through the process-wide
    /// planning coordinator.
    pub fn new(
        input: &StridedArray,
        output: &StridedArray,
        options: &PlanOptions,
    ) -> Result<Self, FftError> {
        Self::new_in(PlanningCoordinator::global(), input, output, options)
    }

    /// Plans through an explicit coordinator and its wisdom store.
    pub fn new_in(
        coordinator: &PlanningCoordinator,
        input: &StridedArray,
        output: &StridedArray,
        options: &PlanOptions,
    ) -> Result<Self, FftError> {
        let started = Instant::now();
        if options.ortho && options.normalise_inverse {
            return Err(ortho_conflict());
        }
        validate_planner_settings(options)?;
        let scheme = resolve_scheme(input.dtype(), output.dtype())?;
        let alignment = AlignmentClass::detect(
            input,
            output,
            options.flags.contains(&PlanFlag::Unaligned),
        )?;
        let codes = validate_directions(scheme, &options.direction, options.axes.len())?;

        if input.ndim() != output.ndim() {
            return Err(FftError::InvalidShape {
                detail: format!(
                    "input rank {} and output rank {} must match",
                    input.ndim(),
                    output.ndim()
                ),
            });
        }
        let partition = canonicalize_axes(&options.axes, input.ndim())?;
        let (codes, direction) = if scheme.kind == SchemeKind::RealToReal {
            let kept: Vec<DirectionCode> = partition.kept.iter().map(|&i| codes[i]).collect();
            (kept.clone(), TransformDirection::PerAxis(kept))
        } else {
            (codes.clone(), TransformDirection::Single(codes[0]))
        };

        let fft_shape = implied_fft_shape(scheme.kind, input.shape(), output.shape());
        let n = transform_size(scheme.kind, &partition.axes, fft_shape, &codes)?;
        match shape_validator(scheme.kind) {
            Some(validate) => validate(
                input.shape(),
                output.shape(),
                &partition.axes,
                &partition.batch_axes,
            )?,
            None => validate_equal_shapes(input.shape(), output.shape())?,
        }

        let parameters = PlanParameters::from_partition(&partition, fft_shape, input, output);
        let mut problem = GuruProblem {
            scheme,
            dims: parameters.dims.clone(),
            howmany_dims: parameters.howmany_dims.clone(),
            directions: codes,
            flags: FlagSet::default(),
        };
        problem.check_representable()?;
        problem.flags = FlagSet::normalize(
            &options.flags,
            scheme.kind,
            partition.axes.len(),
            alignment.fallback,
        )?;

        let native = coordinator
            .plan(&problem, options.threads, options.planning_timelimit)?
            .ok_or(FftError::NoPlanAvailable)?;
        let plan = Self {
            labels: TraceLabels::new(scheme, &direction, &problem.flags),
            native,
            scheme,
            direction,
            axes: partition.axes,
            batch_axes: partition.batch_axes,
            flags: problem.flags,
            parameters,
            n,
            input: input.clone(),
            output: output.clone(),
            input_shape: input.shape().to_vec(),
            output_shape: output.shape().to_vec(),
            input_strides: input.strides().to_vec(),
            output_strides: output.strides().to_vec(),
            input_alignment: alignment.input,
            output_alignment: alignment.output,
            simd_aligned: alignment.simd,
            normalise_inverse: options.normalise_inverse,
            ortho: options.ortho,
            mode: options.mode,
            check_finite: options.check_finite,
            threads: options.threads,
            planning_timelimit: options.planning_timelimit,
        };
        tracing::debug!(
            plan_id = %plan.labels.plan_id,
            scheme = %scheme,
            n,
            kernel = plan.native.kernel_name(),
            wisdom_hit = plan.native.wisdom_hit(),
            "transform plan built"
        );
        plan.record(TraceEvent::Plan, started);
        Ok(plan)
    }

    /// Runs the plan on the bound buffers without normalization.
    pub fn execute(&self) -> Result<(), FftError> {
        let started = Instant::now();
        self.native.execute(&self.input, &self.output)?;
        self.record(TraceEvent::Execute, started);
        Ok(())
    }

    /// Rebinds the plan to new buffers with the exact planned layout.
    ///
    /// Checks run in order: dtype, alignment, shape, then strides. On error
    /// the previous binding is kept.
    pub fn update_arrays(
        &mut self,
        input: &StridedArray,
        output: &StridedArray,
    ) -> Result<(), FftError> {
        let started = Instant::now();
        self.check_bindings(input, output)?;
        self.input = input.clone();
        self.output = output.clone();
        self.record(TraceEvent::UpdateArrays, started);
        Ok(())
    }

    /// Executes on the bound buffers with the plan's normalization defaults.
    pub fn call(&mut self) -> Result<StridedArray, FftError> {
        self.call_with(CallRequest::default())
    }

    /// Optionally rebinds, executes, and normalizes, returning the output.
    ///
    /// A replacement input whose dtype, strides or alignment differ from
    /// the plan is copied into a fresh buffer of the planned layout; its
    /// shape must still match. A replacement output is bound as is. The
    /// replacements are bound only once every check, including the
    /// finite-value scan, has passed.
    pub fn call_with(&mut self, request: CallRequest) -> Result<StridedArray, FftError> {
        let started = Instant::now();
        let ortho = request.ortho.unwrap_or(self.ortho);
        let normalise_inverse = request.normalise_inverse.unwrap_or(self.normalise_inverse);
        if ortho && normalise_inverse {
            return Err(ortho_conflict());
        }

        let rebinding = request.input.is_some() || request.output.is_some();
        let input = match request.input {
            Some(array) => self.coerce_input(array)?,
            None => self.input.clone(),
        };
        let output = request.output.unwrap_or_else(|| self.output.clone());
        if rebinding {
            self.check_bindings(&input, &output)?;
        }
        if (self.mode.checks_values() || self.check_finite) && !input.all_finite()? {
            return Err(FftError::NonFiniteInput);
        }
        if rebinding {
            self.input = input;
            self.output = output;
            self.record(TraceEvent::UpdateArrays, started);
        }
        self.execute()?;
        if ortho {
            self.output.scale(self.sqrt_normalisation_scaling())?;
        } else if normalise_inverse && self.direction.is_backward() {
            self.output.scale(self.normalisation_scaling())?;
        }
        self.record(TraceEvent::Call, started);
        Ok(self.output.clone())
    }

    fn coerce_input(&self, array: StridedArray) -> Result<StridedArray, FftError> {
        let compatible = array.dtype() == self.scheme.input_dtype()
            && array.strides() == self.input_strides.as_slice()
            && is_byte_aligned(&array, self.input_alignment);
        if compatible {
            return Ok(array);
        }
        if array.shape() != self.input_shape.as_slice() {
            return Err(FftError::InvalidShape {
                detail: format!(
                    "replacement input shape {:?} does not match planned shape {:?}",
                    array.shape(),
                    self.input_shape
                ),
            });
        }
        let copy = allocate_layout_aligned(
            &self.input_shape,
            &self.input_strides,
            self.scheme.input_dtype(),
            self.input_alignment,
        )?;
        copy.copy_from(&array)?;
        tracing::trace!(plan_id = %self.labels.plan_id, "replacement input copied into planned layout");
        Ok(copy)
    }

    fn check_bindings(&self, input: &StridedArray, output: &StridedArray) -> Result<(), FftError> {
        let bindings = [
            Binding {
                role: ArrayRole::Input,
                array: input,
                dtype: self.scheme.input_dtype(),
                alignment: self.input_alignment,
                shape: &self.input_shape,
                strides: &self.input_strides,
            },
            Binding {
                role: ArrayRole::Output,
                array: output,
                dtype: self.scheme.output_dtype(),
                alignment: self.output_alignment,
                shape: &self.output_shape,
                strides: &self.output_strides,
            },
        ];
        for binding in &bindings {
            if binding.array.dtype() != binding.dtype {
                return Err(FftError::DtypeMismatch {
                    role: binding.role,
                    expected: binding.dtype,
                    actual: binding.array.dtype(),
                });
            }
        }
        for binding in &bindings {
            if !is_byte_aligned(binding.array, binding.alignment) {
                return Err(FftError::AlignmentMismatch {
                    role: binding.role,
                    required: binding.alignment,
                });
            }
        }
        for binding in &bindings {
            if binding.array.shape() != binding.shape {
                return Err(FftError::ShapeMismatch {
                    role: binding.role,
                    expected: binding.shape.to_vec(),
                    actual: binding.array.shape().to_vec(),
                });
            }
        }
        for binding in &bindings {
            if binding.array.strides() != binding.strides {
                return Err(FftError::StrideMismatch {
                    role: binding.role,
                    expected: binding.strides.to_vec(),
                    actual: binding.array.strides().to_vec(),
                });
            }
        }
        Ok(())
    }

    fn record(&self, event: TraceEvent, started: Instant) {
        if !transform_tracing_enabled() {
            return;
        }
        record_trace(TransformTrace {
            operation_id: next_operation_id(),
            plan_id: Arc::clone(&self.labels.plan_id),
            event,
            scheme: Arc::clone(&self.labels.scheme),
            direction: Arc::clone(&self.labels.direction),
            n: self.n,
            flags: Arc::clone(&self.labels.flags),
            wisdom_hit: self.native.wisdom_hit(),
            threads: self.threads,
            mode: self.mode,
            timing_ns: u64::try_from(started.elapsed().as_nanos()).unwrap_or(u64::MAX),
        });
    }

    #[must_use]
    pub fn plan_id(&self) -> &str {
        &self.labels.plan_id
    }

    #[must_use]
    pub fn scheme(&self) -> TransformScheme {
        self.scheme
    }

    #[must_use]
    pub fn direction(&self) -> &TransformDirection {
        &self.direction
    }

    /// Canonical transformed axes, non-negative and deduplicated.
    #[must_use]
    pub fn axes(&self) -> &[usize] {
        &self.axes
    }

    /// Axes iterated over as a batch of independent transforms.
    #[must_use]
    pub fn batch_axes(&self) -> &[usize] {
        &self.batch_axes
    }

    #[must_use]
    pub fn flags(&self) -> &FlagSet {
        &self.flags
    }

    #[must_use]
    pub fn parameters(&self) -> &PlanParameters {
        &self.parameters
    }

    /// Key this plan's wisdom is stored under.
    #[must_use]
    pub fn wisdom_key(&self) -> WisdomKey {
        WisdomKey {
            scheme: self.scheme,
            dims: self.parameters.dims.clone(),
            howmany_dims: self.parameters.howmany_dims.clone(),
            directions: self.direction.codes().to_vec(),
            unaligned: self.flags.is_unaligned(),
            preserve_input: self.flags.preserves_input(),
        }
    }

    /// Logical transform size.
    #[must_use]
    pub fn n(&self) -> usize {
        self.n
    }

    #[must_use]
    pub fn normalisation_scaling(&self) -> f64 {
        1.0 / self.n as f64
    }

    #[must_use]
    pub fn sqrt_normalisation_scaling(&self) -> f64 {
        1.0 / (self.n as f64).sqrt()
    }

    #[must_use]
    pub fn input_array(&self) -> &StridedArray {
        &self.input
    }

    #[must_use]
    pub fn output_array(&self) -> &StridedArray {
        &self.output
    }

    #[must_use]
    pub fn input_shape(&self) -> &[usize] {
        &self.input_shape
    }

    #[must_use]
    pub fn output_shape(&self) -> &[usize] {
        &self.output_shape
    }

    /// Input strides in elements.
    #[must_use]
    pub fn input_strides(&self) -> &[usize] {
        &self.input_strides
    }

    /// Output strides in elements.
    #[must_use]
    pub fn output_strides(&self) -> &[usize] {
        &self.output_strides
    }

    #[must_use]
    pub fn input_dtype(&self) -> DType {
        self.scheme.input_dtype()
    }

    #[must_use]
    pub fn output_dtype(&self) -> DType {
        self.scheme.output_dtype()
    }

    #[must_use]
    pub fn input_alignment(&self) -> usize {
        self.input_alignment
    }

    #[must_use]
    pub fn output_alignment(&self) -> usize {
        self.output_alignment
    }

    /// True when both buffers met a SIMD alignment at planning time.
    #[must_use]
    pub fn simd_aligned(&self) -> bool {
        self.simd_aligned
    }

    #[must_use]
    pub fn normalise_inverse(&self) -> bool {
        self.normalise_inverse
    }

    #[must_use]
    pub fn ortho(&self) -> bool {
        self.ortho
    }

    #[must_use]
    pub fn mode(&self) -> RuntimeMode {
        self.mode
    }

    #[must_use]
    pub fn threads(&self) -> usize {
        self.threads
    }

    #[must_use]
    pub fn planning_timelimit(&self) -> Option<f64> {
        self.planning_timelimit
    }

    #[must_use]
    pub fn kernel_name(&self) -> &'static str {
        self.native.kernel_name()
    }

    #[must_use]
    pub fn fingerprint(&self) -> &PlanFingerprint {
        self.native.fingerprint()
    }

    /// True when planning reused stored wisdom.
    #[must_use]
    pub fn wisdom_hit(&self) -> bool {
        self.native.wisdom_hit()
    }
}

impl Drop for TransformPlan {
    fn drop(&mut self) {
        self.record(TraceEvent::Release, Instant::now());
    }
}
