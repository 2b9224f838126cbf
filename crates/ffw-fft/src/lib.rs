#![forbid(unsafe_code)]

//! Planning and execution of guru-interface Fourier transforms.
//!
//! A [`TransformPlan`] binds an input and an output [`StridedArray`], picks
//! the transform scheme from their element types, and plans a native kernel
//! through a [`PlanningCoordinator`], the single lock that serializes all
//! planning and owns the wisdom store. Plans then execute freely from any
//! thread.
//!
//! - `scheme`: the supported dtype pairs, direction codes and shape rules
//! - `flags`: planner flags and their normalization
//! - `axes`: axis canonicalization
//! - `guru`: guru descriptors and the native kernels
//! - `plan`: coordinator, wisdom keys and the wisdom store
//! - `transforms`: the plan engine, errors and trace records

pub mod axes;
pub mod flags;
pub mod guru;
pub mod helpers;
pub mod plan;
pub mod scheme;
pub mod transforms;

pub use ffw_align::{DType, StridedArray};
pub use ffw_runtime::RuntimeMode;

pub use axes::{AxisPartition, canonicalize_axes};
pub use flags::{FlagSet, PlanFlag};
pub use guru::{GuruDim, GuruProblem, MAX_GURU_DIMENSION};
pub use helpers::{naive_dft, naive_dftn, next_fast_len};
pub use plan::{
    CacheAdmissionPolicy, PlanCacheBackend, PlanCacheConfig, PlanFingerprint, PlanMetadata,
    PlanningCoordinator, PlanningStrategy, WISDOM_FORMAT, WisdomKey, WisdomStore,
};
pub use scheme::{
    DirectionCode, Precision, SchemeKind, TransformScheme, resolve_scheme, supported_schemes,
};
pub use transforms::{
    ArrayRole, CallRequest, FftError, PlanOptions, PlanParameters, TraceEvent, TransformDirection,
    TransformPlan, TransformTrace, set_transform_tracing, take_plan_traces, take_transform_traces,
    transform_tracing_enabled,
};
