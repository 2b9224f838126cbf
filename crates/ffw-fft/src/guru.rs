//! Guru-interface native layer.
//!
//! A [`GuruProblem`] describes a batched, strided transform the way the
//! classic guru planner does: `dims` are the transformed dimensions and
//! `howmany_dims` the batch loops, each with an element stride on the input
//! (`is`) and output (`os`) side. Planning turns a problem into a
//! [`NativePlan`] that owns one closed-variant kernel plus the precomputed
//! gather/scatter offsets it runs with.

use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use std::time::{Duration, Instant};

use ffw_align::{Element, StridedArray, strided_offsets};
use num_complex::Complex;
use num_traits::Zero;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use rustfft::{Fft, FftDirection, FftNum, FftPlanner};
use serde::{Deserialize, Serialize};

use crate::flags::FlagSet;
use crate::plan::{PlanCacheBackend, PlanFingerprint, PlanMetadata, PlanningStrategy, WisdomKey};
use crate::scheme::{DirectionCode, Precision, SchemeKind, TransformScheme};
use crate::transforms::FftError;

/// Largest length or stride the guru descriptors can carry.
pub const MAX_GURU_DIMENSION: usize = i32::MAX as usize;

/// One guru dimension: length plus input and output element strides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GuruDim {
    pub n: usize,
    pub is: usize,
    pub os: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuruProblem {
    pub scheme: TransformScheme,
    /// Transformed dimensions, lengths taken from the logical FFT shape.
    pub dims: Vec<GuruDim>,
    pub howmany_dims: Vec<GuruDim>,
    /// One code for complex schemes, one per dimension for real-to-real.
    pub directions: Vec<DirectionCode>,
    pub flags: FlagSet,
}

impl GuruProblem {
    #[must_use]
    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    #[must_use]
    pub fn howmany_rank(&self) -> usize {
        self.howmany_dims.len()
    }

    /// Rejects lengths and strides the descriptors cannot represent.
    pub fn check_representable(&self) -> Result<(), FftError> {
        for dim in self.dims.iter().chain(&self.howmany_dims) {
            for value in [dim.n, dim.is, dim.os] {
                if value > MAX_GURU_DIMENSION {
                    return Err(FftError::DimensionTooLarge {
                        value,
                        limit: MAX_GURU_DIMENSION,
                    });
                }
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn logical_shape(&self) -> Vec<usize> {
        self.dims.iter().map(|dim| dim.n).collect()
    }

    fn input_block_shape(&self) -> Vec<usize> {
        let shape = self.logical_shape();
        match self.scheme.kind {
            SchemeKind::ComplexToReal => packed_shape(&shape),
            _ => shape,
        }
    }

    fn output_block_shape(&self) -> Vec<usize> {
        let shape = self.logical_shape();
        match self.scheme.kind {
            SchemeKind::RealToComplex => packed_shape(&shape),
            _ => shape,
        }
    }

    fn batch_count(&self) -> usize {
        self.howmany_dims.iter().map(|dim| dim.n).product()
    }
}

/// Shape of the conjugate-symmetric half spectrum of a real `shape`.
#[must_use]
pub fn packed_shape(shape: &[usize]) -> Vec<usize> {
    let mut packed = shape.to_vec();
    if let Some(last) = packed.last_mut() {
        *last = *last / 2 + 1;
    }
    packed
}

/// Element offsets of every block and of every element within a block.
#[derive(Debug, Clone, PartialEq, Eq)]
struct GuruLayout {
    input_offsets: Vec<usize>,
    output_offsets: Vec<usize>,
    batch_input: Vec<usize>,
    batch_output: Vec<usize>,
}

impl GuruLayout {
    fn new(problem: &GuruProblem) -> Self {
        let is: Vec<usize> = problem.dims.iter().map(|dim| dim.is).collect();
        let os: Vec<usize> = problem.dims.iter().map(|dim| dim.os).collect();
        let batch_shape: Vec<usize> = problem.howmany_dims.iter().map(|dim| dim.n).collect();
        let batch_is: Vec<usize> = problem.howmany_dims.iter().map(|dim| dim.is).collect();
        let batch_os: Vec<usize> = problem.howmany_dims.iter().map(|dim| dim.os).collect();
        Self {
            input_offsets: strided_offsets(&problem.input_block_shape(), &is),
            output_offsets: strided_offsets(&problem.output_block_shape(), &os),
            batch_input: strided_offsets(&batch_shape, &batch_is),
            batch_output: strided_offsets(&batch_shape, &batch_os),
        }
    }
}

/// Float types the native kernels run in.
pub trait NativeFloat: FftNum + Element {
    fn widen(self) -> f64;
    fn narrow(value: f64) -> Self;
}

impl NativeFloat for f32 {
    fn widen(self) -> f64 {
        f64::from(self)
    }

    fn narrow(value: f64) -> Self {
        value as f32
    }
}

impl NativeFloat for f64 {
    fn widen(self) -> f64 {
        self
    }

    fn narrow(value: f64) -> Self {
        value
    }
}

/// A transform over one contiguous row-major block.
pub trait BlockKernel: Send + Sync {
    type In: Element;
    type Out: Element;
    type Scratch;

    fn input_len(&self) -> usize;
    fn output_len(&self) -> usize;
    fn make_scratch(&self) -> Self::Scratch;
    /// `input` may be clobbered.
    fn transform(
        &self,
        input: &mut [Self::In],
        output: &mut [Self::Out],
        scratch: &mut Self::Scratch,
    );
}

/// Buffers for transforming one axis of a block at a time.
pub struct AxisScratch<T> {
    line: Vec<Complex<T>>,
    fft: Vec<Complex<T>>,
}

impl<T: FftNum> AxisScratch<T> {
    fn new(line_len: usize, fft_len: usize) -> Self {
        Self {
            line: vec![Complex::zero(); line_len],
            fft: vec![Complex::zero(); fft_len],
        }
    }
}

fn plan_axes<T: FftNum>(shape: &[usize], direction: FftDirection) -> Vec<Arc<dyn Fft<T>>> {
    let mut planner = FftPlanner::<T>::new();
    shape
        .iter()
        .map(|&len| planner.plan_fft(len, direction))
        .collect()
}

fn axis_scratch<T: FftNum>(shape: &[usize], ffts: &[Arc<dyn Fft<T>>]) -> AxisScratch<T> {
    let line = shape.iter().copied().max().unwrap_or(0);
    let fft = ffts
        .iter()
        .map(|fft| fft.get_inplace_scratch_len())
        .max()
        .unwrap_or(0);
    AxisScratch::new(line, fft)
}

/// Unnormalized 1-D transform of every line of `data` along `axis`.
fn transform_axis<T: FftNum>(
    data: &mut [Complex<T>],
    shape: &[usize],
    axis: usize,
    fft: &dyn Fft<T>,
    scratch: &mut AxisScratch<T>,
) {
    let len = shape[axis];
    if len <= 1 || data.is_empty() {
        return;
    }
    let fft_scratch = &mut scratch.fft[..fft.get_inplace_scratch_len()];
    let stride: usize = shape[axis + 1..].iter().product();
    if stride == 1 {
        fft.process_with_scratch(data, fft_scratch);
        return;
    }
    let line = &mut scratch.line[..len];
    for outer in data.chunks_mut(len * stride) {
        for offset in 0..stride {
            for (index, slot) in line.iter_mut().enumerate() {
                *slot = outer[index * stride + offset];
            }
            fft.process_with_scratch(line, fft_scratch);
            for (index, &value) in line.iter().enumerate() {
                outer[index * stride + offset] = value;
            }
        }
    }
}

pub struct ComplexKernel<T: FftNum> {
    shape: Vec<usize>,
    ffts: Vec<Arc<dyn Fft<T>>>,
    len: usize,
}

impl<T: FftNum> ComplexKernel<T> {
    fn new(shape: &[usize], direction: FftDirection) -> Self {
        Self {
            shape: shape.to_vec(),
            ffts: plan_axes(shape, direction),
            len: shape.iter().product(),
        }
    }
}

impl<T: NativeFloat> BlockKernel for ComplexKernel<T>
where
    Complex<T>: Element,
{
    type In = Complex<T>;
    type Out = Complex<T>;
    type Scratch = AxisScratch<T>;

    fn input_len(&self) -> usize {
        self.len
    }

    fn output_len(&self) -> usize {
        self.len
    }

    fn make_scratch(&self) -> Self::Scratch {
        axis_scratch(&self.shape, &self.ffts)
    }

    fn transform(&self, input: &mut [Complex<T>], output: &mut [Complex<T>], scratch: &mut Self::Scratch) {
        output.copy_from_slice(input);
        for (axis, fft) in self.ffts.iter().enumerate() {
            transform_axis(output, &self.shape, axis, fft.as_ref(), scratch);
        }
    }
}

pub struct RealScratch<T> {
    full: Vec<Complex<T>>,
    axis: AxisScratch<T>,
}

/// Last-axis real transform of one row.
enum RealRow<T: FftNum> {
    /// Even length: the row is packed as `len / 2` complex pairs and the half
    /// spectrum is split back out with one twiddle per bin.
    Paired {
        fft: Arc<dyn Fft<T>>,
        twiddles: Vec<Complex<T>>,
    },
    /// Odd or empty length: promoted to a full complex transform.
    Promoted { fft: Arc<dyn Fft<T>> },
}

impl<T: NativeFloat> RealRow<T> {
    fn new(len: usize, planner: &mut FftPlanner<T>) -> Self {
        if len == 0 || len % 2 != 0 {
            return Self::Promoted {
                fft: planner.plan_fft_forward(len),
            };
        }
        let twiddles = (0..=len / 2)
            .map(|k| {
                let angle = -2.0 * std::f64::consts::PI * k as f64 / len as f64;
                Complex::new(T::narrow(angle.cos()), T::narrow(angle.sin()))
            })
            .collect();
        Self::Paired {
            fft: planner.plan_fft_forward(len / 2),
            twiddles,
        }
    }

    fn fft(&self) -> &dyn Fft<T> {
        match self {
            Self::Paired { fft, .. } | Self::Promoted { fft } => fft.as_ref(),
        }
    }

    fn process(
        &self,
        row: &[T],
        packed: &mut [Complex<T>],
        buffer: &mut [Complex<T>],
        scratch: &mut [Complex<T>],
    ) {
        let fft = self.fft();
        let scratch = &mut scratch[..fft.get_inplace_scratch_len()];
        match self {
            Self::Promoted { .. } => {
                let buffer = &mut buffer[..row.len()];
                for (slot, &value) in buffer.iter_mut().zip(row) {
                    *slot = Complex::new(value, T::zero());
                }
                fft.process_with_scratch(buffer, scratch);
                packed.copy_from_slice(&buffer[..packed.len()]);
            }
            Self::Paired { twiddles, .. } => {
                let m = row.len() / 2;
                let buffer = &mut buffer[..m];
                for (slot, pair) in buffer.iter_mut().zip(row.chunks_exact(2)) {
                    *slot = Complex::new(pair[0], pair[1]);
                }
                fft.process_with_scratch(buffer, scratch);
                let half = T::narrow(0.5);
                let minus_half_i = Complex::new(T::zero(), T::narrow(-0.5));
                for (k, (slot, &twiddle)) in packed.iter_mut().zip(twiddles).enumerate() {
                    let z = buffer[k % m];
                    let mirrored = buffer[(m - k % m) % m].conj();
                    let even = (z + mirrored) * half;
                    let odd = (z - mirrored) * minus_half_i;
                    *slot = even + twiddle * odd;
                }
            }
        }
    }
}

pub struct RealForwardScratch<T> {
    row: Vec<Complex<T>>,
    fft: Vec<Complex<T>>,
    axis: AxisScratch<T>,
}

/// Real input, half spectrum output.
///
/// The last axis is transformed row by row into the packed spectrum, then
/// the leading axes run as complex transforms over the packed block.
pub struct RealForwardKernel<T: FftNum> {
    shape: Vec<usize>,
    packed: Vec<usize>,
    row: Option<RealRow<T>>,
    leading: Vec<Arc<dyn Fft<T>>>,
}

impl<T: NativeFloat> RealForwardKernel<T> {
    fn new(shape: &[usize]) -> Self {
        let mut planner = FftPlanner::new();
        let row = shape.last().map(|&len| RealRow::new(len, &mut planner));
        let leading = shape[..shape.len().saturating_sub(1)]
            .iter()
            .map(|&len| planner.plan_fft_forward(len))
            .collect();
        Self {
            shape: shape.to_vec(),
            packed: packed_shape(shape),
            row,
            leading,
        }
    }
}

impl<T: NativeFloat> BlockKernel for RealForwardKernel<T>
where
    Complex<T>: Element,
{
    type In = T;
    type Out = Complex<T>;
    type Scratch = RealForwardScratch<T>;

    fn input_len(&self) -> usize {
        self.shape.iter().product()
    }

    fn output_len(&self) -> usize {
        self.packed.iter().product()
    }

    fn make_scratch(&self) -> Self::Scratch {
        let row = self.shape.last().copied().unwrap_or(0);
        let fft = self
            .row
            .as_ref()
            .map_or(0, |row| row.fft().get_inplace_scratch_len());
        RealForwardScratch {
            row: vec![Complex::zero(); row],
            fft: vec![Complex::zero(); fft],
            axis: axis_scratch(&self.packed, &self.leading),
        }
    }

    fn transform(&self, input: &mut [T], output: &mut [Complex<T>], scratch: &mut Self::Scratch) {
        let (Some(row), Some(&len), Some(&half)) =
            (&self.row, self.shape.last(), self.packed.last())
        else {
            return;
        };
        for (packed_row, real_row) in output.chunks_mut(half).zip(input.chunks(len)) {
            row.process(real_row, packed_row, &mut scratch.row, &mut scratch.fft);
        }
        for (axis, fft) in self.leading.iter().enumerate() {
            transform_axis(output, &self.packed, axis, fft.as_ref(), &mut scratch.axis);
        }
    }
}

/// Half spectrum input, real output.
///
/// Leading axes are inverted on the packed spectrum, then each row along the
/// last axis is completed by conjugate symmetry before its final inverse.
pub struct RealBackwardKernel<T: FftNum> {
    shape: Vec<usize>,
    packed: Vec<usize>,
    ffts: Vec<Arc<dyn Fft<T>>>,
}

impl<T: FftNum> RealBackwardKernel<T> {
    fn new(shape: &[usize]) -> Self {
        Self {
            shape: shape.to_vec(),
            packed: packed_shape(shape),
            ffts: plan_axes(shape, FftDirection::Inverse),
        }
    }
}

impl<T: NativeFloat> BlockKernel for RealBackwardKernel<T>
where
    Complex<T>: Element,
{
    type In = Complex<T>;
    type Out = T;
    type Scratch = RealScratch<T>;

    fn input_len(&self) -> usize {
        self.packed.iter().product()
    }

    fn output_len(&self) -> usize {
        self.shape.iter().product()
    }

    fn make_scratch(&self) -> Self::Scratch {
        RealScratch {
            full: vec![Complex::zero(); self.output_len()],
            axis: axis_scratch(&self.shape, &self.ffts),
        }
    }

    fn transform(&self, input: &mut [Complex<T>], output: &mut [T], scratch: &mut Self::Scratch) {
        let Some((last_fft, leading)) = self.ffts.split_last() else {
            return;
        };
        for (axis, fft) in leading.iter().enumerate() {
            transform_axis(input, &self.packed, axis, fft.as_ref(), &mut scratch.axis);
        }
        let last_axis = leading.len();
        let row = self.shape[last_axis];
        let half = self.packed[last_axis];
        for (full_row, packed_row) in scratch.full.chunks_mut(row).zip(input.chunks(half)) {
            full_row[..half].copy_from_slice(packed_row);
            for k in half..row {
                let mirrored = full_row[row - k].conj();
                full_row[k] = mirrored;
            }
        }
        transform_axis(
            &mut scratch.full,
            &self.shape,
            last_axis,
            last_fft.as_ref(),
            &mut scratch.axis,
        );
        for (slot, value) in output.iter_mut().zip(&scratch.full) {
            *slot = value.re;
        }
    }
}

/// One real-to-real axis, evaluated as a complex DFT of the sequence's
/// symmetric extension over one period.
///
/// Input element `j` sits at `placement(j)` and its mirror `period - p`, with
/// the sign of the symmetry; output `k` reads bin `frequency(k)`.
struct SymmetricAxis {
    kind: DirectionCode,
    n: usize,
    period: usize,
    sine: bool,
    fft: Arc<dyn Fft<f64>>,
}

impl SymmetricAxis {
    fn new(
        kind: DirectionCode,
        n: usize,
        planner: &mut FftPlanner<f64>,
    ) -> Result<Self, FftError> {
        let (period, sine) = match kind {
            DirectionCode::Redft00 => (2 * n.saturating_sub(1), false),
            DirectionCode::Rodft00 => (2 * (n + 1), true),
            DirectionCode::Redft01 | DirectionCode::Redft10 => (4 * n, false),
            DirectionCode::Rodft01 | DirectionCode::Rodft10 => (4 * n, true),
            DirectionCode::Redft11 => (8 * n, false),
            DirectionCode::Rodft11 => (8 * n, true),
            DirectionCode::Forward | DirectionCode::Backward => {
                return Err(FftError::PlannerFailed {
                    detail: format!("{kind} is not a real-to-real kind"),
                });
            }
        };
        if period == 0 {
            return Err(FftError::PlannerFailed {
                detail: format!("{kind} of length {n} has no period"),
            });
        }
        Ok(Self {
            kind,
            n,
            period,
            sine,
            fft: planner.plan_fft_forward(period),
        })
    }

    fn placement(&self, j: usize) -> usize {
        match self.kind {
            DirectionCode::Redft10
            | DirectionCode::Redft11
            | DirectionCode::Rodft10
            | DirectionCode::Rodft11 => 2 * j + 1,
            DirectionCode::Rodft00 | DirectionCode::Rodft01 => j + 1,
            _ => j,
        }
    }

    fn frequency(&self, k: usize) -> usize {
        match self.kind {
            DirectionCode::Redft01
            | DirectionCode::Redft11
            | DirectionCode::Rodft01
            | DirectionCode::Rodft11 => 2 * k + 1,
            DirectionCode::Rodft00 | DirectionCode::Rodft10 => k + 1,
            _ => k,
        }
    }

    fn extended_len(&self) -> usize {
        self.period
    }

    fn scratch_len(&self) -> usize {
        self.fft.get_inplace_scratch_len()
    }

    fn apply(
        &self,
        x: &[f64],
        y: &mut [f64],
        extended: &mut [Complex<f64>],
        fft_scratch: &mut [Complex<f64>],
    ) {
        let period = self.period;
        let extended = &mut extended[..period];
        extended.fill(Complex::zero());
        let mirror_sign = if self.sine { -1.0 } else { 1.0 };
        for (j, &value) in x.iter().enumerate() {
            // The RODFT01 endpoint enters once, its mirror image doubles it.
            let value = if self.kind == DirectionCode::Rodft01 && j + 1 == self.n {
                0.5 * value
            } else {
                value
            };
            let p = self.placement(j);
            let mirror = (period - p) % period;
            extended[p].re += value;
            if mirror != p {
                extended[mirror].re += mirror_sign * value;
            }
        }
        self.fft
            .process_with_scratch(extended, &mut fft_scratch[..self.scratch_len()]);
        for (k, out) in y.iter_mut().enumerate() {
            let bin = extended[self.frequency(k)];
            *out = if self.sine { -bin.im } else { bin.re };
        }
    }
}

pub struct SymmetricScratch {
    data: Vec<f64>,
    line_in: Vec<f64>,
    line_out: Vec<f64>,
    extended: Vec<Complex<f64>>,
    fft: Vec<Complex<f64>>,
}

/// Separable real-to-real transform, one symmetry kind per axis.
pub struct RealToRealKernel<T> {
    shape: Vec<usize>,
    axes: Vec<SymmetricAxis>,
    len: usize,
    _float: std::marker::PhantomData<fn() -> T>,
}

impl<T> RealToRealKernel<T> {
    fn new(shape: &[usize], kinds: &[DirectionCode]) -> Result<Self, FftError> {
        if kinds.len() != shape.len() {
            return Err(FftError::PlannerFailed {
                detail: format!(
                    "{} real-to-real kinds for {} dimensions",
                    kinds.len(),
                    shape.len()
                ),
            });
        }
        let mut planner = FftPlanner::new();
        let axes = kinds
            .iter()
            .zip(shape)
            .map(|(&kind, &n)| SymmetricAxis::new(kind, n, &mut planner))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            shape: shape.to_vec(),
            axes,
            len: shape.iter().product(),
            _float: std::marker::PhantomData,
        })
    }
}

fn symmetric_transform_axis(
    shape: &[usize],
    axis: usize,
    rule: &SymmetricAxis,
    scratch: &mut SymmetricScratch,
) {
    let len = shape[axis];
    let stride: usize = shape[axis + 1..].iter().product();
    let SymmetricScratch {
        data,
        line_in,
        line_out,
        extended,
        fft,
    } = scratch;
    let line_in = &mut line_in[..len];
    let line_out = &mut line_out[..len];
    for outer in data.chunks_mut(len * stride) {
        for offset in 0..stride {
            for (index, slot) in line_in.iter_mut().enumerate() {
                *slot = outer[index * stride + offset];
            }
            rule.apply(line_in, line_out, extended.as_mut_slice(), fft.as_mut_slice());
            for (index, &value) in line_out.iter().enumerate() {
                outer[index * stride + offset] = value;
            }
        }
    }
}

impl<T: NativeFloat> BlockKernel for RealToRealKernel<T> {
    type In = T;
    type Out = T;
    type Scratch = SymmetricScratch;

    fn input_len(&self) -> usize {
        self.len
    }

    fn output_len(&self) -> usize {
        self.len
    }

    fn make_scratch(&self) -> Self::Scratch {
        let line = self.shape.iter().copied().max().unwrap_or(0);
        let extended = self.axes.iter().map(SymmetricAxis::extended_len).max().unwrap_or(0);
        let fft = self.axes.iter().map(SymmetricAxis::scratch_len).max().unwrap_or(0);
        SymmetricScratch {
            data: vec![0.0; self.len],
            line_in: vec![0.0; line],
            line_out: vec![0.0; line],
            extended: vec![Complex::zero(); extended],
            fft: vec![Complex::zero(); fft],
        }
    }

    fn transform(&self, input: &mut [T], output: &mut [T], scratch: &mut Self::Scratch) {
        for (slot, &value) in scratch.data.iter_mut().zip(input.iter()) {
            *slot = value.widen();
        }
        for (axis, rule) in self.axes.iter().enumerate() {
            symmetric_transform_axis(&self.shape, axis, rule, scratch);
        }
        for (slot, &value) in output.iter_mut().zip(&scratch.data) {
            *slot = T::narrow(value);
        }
    }
}

/// Gathers every batch block, transforms the blocks, then scatters them.
///
/// Gathering completes before the output is locked, so input and output may
/// share storage.
fn run_blocks<K: BlockKernel>(
    kernel: &K,
    layout: &GuruLayout,
    pool: Option<&ThreadPool>,
    input: &StridedArray,
    output: &StridedArray,
) -> Result<(), FftError> {
    let in_len = kernel.input_len();
    let out_len = kernel.output_len();
    let blocks = layout.batch_input.len();
    if blocks == 0 || in_len == 0 || out_len == 0 {
        return Ok(());
    }
    let mut source = vec![K::In::default(); blocks * in_len];
    input.with_elements(|data: &[K::In]| {
        for (block, &base) in source.chunks_mut(in_len).zip(&layout.batch_input) {
            for (slot, &offset) in block.iter_mut().zip(&layout.input_offsets) {
                *slot = data[base + offset];
            }
        }
    })?;

    let mut target = vec![K::Out::default(); blocks * out_len];
    match pool {
        Some(pool) => pool.install(|| {
            source
                .par_chunks_mut(in_len)
                .zip(target.par_chunks_mut(out_len))
                .for_each_init(
                    || kernel.make_scratch(),
                    |scratch, (src, dst)| kernel.transform(src, dst, scratch),
                );
        }),
        None => {
            let mut scratch = kernel.make_scratch();
            for (src, dst) in source
                .chunks_mut(in_len)
                .zip(target.chunks_mut(out_len))
            {
                kernel.transform(src, dst, &mut scratch);
            }
        }
    }

    output.with_elements_mut(|data: &mut [K::Out]| {
        for (block, &base) in target.chunks(out_len).zip(&layout.batch_output) {
            for (&value, &offset) in block.iter().zip(&layout.output_offsets) {
                data[base + offset] = value;
            }
        }
    })?;
    Ok(())
}

/// Best time of `trials` runs over one scratch block.
fn time_trials<K: BlockKernel>(kernel: &K, trials: usize, deadline: Option<Instant>) -> Option<u64> {
    let mut source = vec![K::In::default(); kernel.input_len()];
    let mut target = vec![K::Out::default(); kernel.output_len()];
    let mut scratch = kernel.make_scratch();
    let mut best: Option<u64> = None;
    for _ in 0..trials {
        let started = Instant::now();
        kernel.transform(&mut source, &mut target, &mut scratch);
        let elapsed = u64::try_from(started.elapsed().as_nanos()).unwrap_or(u64::MAX);
        best = Some(best.map_or(elapsed, |current| current.min(elapsed)));
        if deadline.is_some_and(|limit| Instant::now() >= limit) {
            break;
        }
    }
    best
}

/// Closed set of kernels, one per scheme kind and precision.
pub enum NativeKernel {
    ComplexSingle(ComplexKernel<f32>),
    ComplexDouble(ComplexKernel<f64>),
    RealForwardSingle(RealForwardKernel<f32>),
    RealForwardDouble(RealForwardKernel<f64>),
    RealBackwardSingle(RealBackwardKernel<f32>),
    RealBackwardDouble(RealBackwardKernel<f64>),
    RealToRealSingle(RealToRealKernel<f32>),
    RealToRealDouble(RealToRealKernel<f64>),
}

macro_rules! with_kernel {
    ($kernel:expr, $k:ident => $body:expr) => {
        match $kernel {
            NativeKernel::ComplexSingle($k) => $body,
            NativeKernel::ComplexDouble($k) => $body,
            NativeKernel::RealForwardSingle($k) => $body,
            NativeKernel::RealForwardDouble($k) => $body,
            NativeKernel::RealBackwardSingle($k) => $body,
            NativeKernel::RealBackwardDouble($k) => $body,
            NativeKernel::RealToRealSingle($k) => $body,
            NativeKernel::RealToRealDouble($k) => $body,
        }
    };
}

impl NativeKernel {
    fn build(problem: &GuruProblem) -> Result<Self, FftError> {
        let shape = problem.logical_shape();
        let kernel = match (problem.scheme.kind, problem.scheme.precision) {
            (SchemeKind::ComplexToComplex, Precision::Single) => {
                Self::ComplexSingle(ComplexKernel::new(&shape, complex_direction(problem)?))
            }
            (SchemeKind::ComplexToComplex, Precision::Double) => {
                Self::ComplexDouble(ComplexKernel::new(&shape, complex_direction(problem)?))
            }
            (SchemeKind::RealToComplex, Precision::Single) => {
                Self::RealForwardSingle(RealForwardKernel::new(&shape))
            }
            (SchemeKind::RealToComplex, Precision::Double) => {
                Self::RealForwardDouble(RealForwardKernel::new(&shape))
            }
            (SchemeKind::ComplexToReal, Precision::Single) => {
                Self::RealBackwardSingle(RealBackwardKernel::new(&shape))
            }
            (SchemeKind::ComplexToReal, Precision::Double) => {
                Self::RealBackwardDouble(RealBackwardKernel::new(&shape))
            }
            (SchemeKind::RealToReal, Precision::Single) => {
                Self::RealToRealSingle(RealToRealKernel::new(&shape, &problem.directions)?)
            }
            (SchemeKind::RealToReal, Precision::Double) => {
                Self::RealToRealDouble(RealToRealKernel::new(&shape, &problem.directions)?)
            }
        };
        Ok(kernel)
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::ComplexSingle(_) => "c2c_single",
            Self::ComplexDouble(_) => "c2c_double",
            Self::RealForwardSingle(_) => "r2c_single",
            Self::RealForwardDouble(_) => "r2c_double",
            Self::RealBackwardSingle(_) => "c2r_single",
            Self::RealBackwardDouble(_) => "c2r_double",
            Self::RealToRealSingle(_) => "r2r_single",
            Self::RealToRealDouble(_) => "r2r_double",
        }
    }

    fn block_bytes(&self) -> usize {
        with_kernel!(self, k => block_bytes_of(k))
    }
}

fn block_bytes_of<K: BlockKernel>(kernel: &K) -> usize {
    kernel.input_len() * K::In::DTYPE.itemsize() + kernel.output_len() * K::Out::DTYPE.itemsize()
}

fn complex_direction(problem: &GuruProblem) -> Result<FftDirection, FftError> {
    match problem.directions.as_slice() {
        [DirectionCode::Forward] => Ok(FftDirection::Forward),
        [DirectionCode::Backward] => Ok(FftDirection::Inverse),
        other => Err(FftError::PlannerFailed {
            detail: format!("complex transform needs one forward/backward code, got {other:?}"),
        }),
    }
}

fn factorize_radix_path(mut n: usize) -> Vec<usize> {
    if n <= 1 {
        return vec![1];
    }
    let mut factors = Vec::new();
    let mut p = 2_usize;
    while p * p <= n {
        while n.is_multiple_of(p) {
            factors.push(p);
            n /= p;
        }
        p += if p == 2 { 1 } else { 2 };
    }
    if n > 1 {
        factors.push(n);
    }
    factors
}

fn estimate_fingerprint(problem: &GuruProblem, kernel: &NativeKernel) -> PlanFingerprint {
    let shape = problem.logical_shape();
    let total = shape.iter().product::<usize>() as u64;
    let batches = problem.batch_count() as u64;
    let per_block = if problem.scheme.kind == SchemeKind::RealToReal {
        total.saturating_mul(shape.iter().sum::<usize>() as u64)
    } else {
        let log2 = u64::from(u64::BITS - total.max(1).leading_zeros());
        total.saturating_mul(5).saturating_mul(log2.max(1))
    };
    PlanFingerprint {
        radix_path: shape.iter().flat_map(|&n| factorize_radix_path(n)).collect(),
        estimated_flops: per_block.saturating_mul(batches),
        scratch_bytes: kernel.block_bytes(),
        measured_ns: None,
    }
}

fn build_pool(threads: usize) -> Result<Option<ThreadPool>, FftError> {
    if threads <= 1 {
        return Ok(None);
    }
    ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|index| format!("ffw-plan-{index}"))
        .build()
        .map(Some)
        .map_err(|err| FftError::PlannerFailed {
            detail: err.to_string(),
        })
}

/// Planner settings applied under the planning lock before each call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlannerSettings {
    pub threads: usize,
    /// Seconds; `None` plans without a limit.
    pub timelimit: Option<f64>,
}

impl Default for PlannerSettings {
    fn default() -> Self {
        Self {
            threads: 1,
            timelimit: None,
        }
    }
}

/// An executable plan. Dropping it releases the kernel and its pool.
pub struct NativePlan {
    kernel: NativeKernel,
    layout: GuruLayout,
    pool: Option<ThreadPool>,
    fingerprint: PlanFingerprint,
    wisdom_hit: bool,
}

impl Debug for NativePlan {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativePlan")
            .field("kernel", &self.kernel.name())
            .field("blocks", &self.layout.batch_input.len())
            .field("threads", &self.threads())
            .field("fingerprint", &self.fingerprint)
            .field("wisdom_hit", &self.wisdom_hit)
            .finish()
    }
}

impl NativePlan {
    /// Runs the plan on `input`, overwriting `output`. Buffers must match the
    /// layout the plan was built for.
    pub fn execute(&self, input: &StridedArray, output: &StridedArray) -> Result<(), FftError> {
        with_kernel!(&self.kernel, k => run_blocks(k, &self.layout, self.pool.as_ref(), input, output))
    }

    #[must_use]
    pub fn kernel_name(&self) -> &'static str {
        self.kernel.name()
    }

    #[must_use]
    pub fn fingerprint(&self) -> &PlanFingerprint {
        &self.fingerprint
    }

    /// True when planning reused wisdom instead of running trials.
    #[must_use]
    pub fn wisdom_hit(&self) -> bool {
        self.wisdom_hit
    }

    #[must_use]
    pub fn threads(&self) -> usize {
        self.pool
            .as_ref()
            .map_or(1, ThreadPool::current_num_threads)
    }
}

impl Drop for NativePlan {
    fn drop(&mut self) {
        tracing::trace!(kernel = self.kernel.name(), "native plan released");
    }
}

fn planning_deadline(timelimit: Option<f64>) -> Option<Instant> {
    let limit = Duration::try_from_secs_f64(timelimit?).ok()?;
    Instant::now().checked_add(limit)
}

/// Builds a native plan for `problem`.
///
/// Returns `Ok(None)` when wisdom-only planning finds no entry of at least
/// the requested rigor.
pub(crate) fn plan_problem(
    problem: &GuruProblem,
    settings: PlannerSettings,
    wisdom: &mut dyn PlanCacheBackend,
) -> Result<Option<NativePlan>, FftError> {
    problem.check_representable()?;
    let key = WisdomKey::from_problem(problem);
    let rigor = problem.flags.rigor();
    let remembered = wisdom
        .lookup(&key)
        .filter(|entry| entry.generated_by >= rigor);
    if problem.flags.wisdom_only() && remembered.is_none() {
        tracing::debug!(scheme = %problem.scheme, "wisdom-only planning found no entry");
        return Ok(None);
    }

    let kernel = NativeKernel::build(problem)?;
    let layout = GuruLayout::new(problem);
    let pool = build_pool(settings.threads)?;
    let wisdom_hit = remembered.is_some();
    let fingerprint = match remembered {
        Some(entry) => {
            tracing::debug!(scheme = %problem.scheme, rigor = entry.generated_by.name(), "wisdom hit");
            entry.fingerprint
        }
        None => {
            let mut fingerprint = estimate_fingerprint(problem, &kernel);
            if rigor > PlanningStrategy::EstimateOnly {
                let deadline = planning_deadline(settings.timelimit);
                fingerprint.measured_ns =
                    with_kernel!(&kernel, k => time_trials(k, rigor.trial_count(), deadline));
            }
            let stored = wisdom.store(PlanMetadata {
                key,
                fingerprint: fingerprint.clone(),
                generated_by: rigor,
            });
            tracing::debug!(scheme = %problem.scheme, rigor = rigor.name(), stored, "wisdom miss");
            fingerprint
        }
    };

    Ok(Some(NativePlan {
        kernel,
        layout,
        pool,
        fingerprint,
        wisdom_hit,
    }))
}
