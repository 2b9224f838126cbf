use std::collections::{HashMap, VecDeque};
use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};

use serde::{Deserialize, Serialize};

use crate::guru::{GuruDim, GuruProblem, NativePlan, PlannerSettings, plan_problem};
use crate::scheme::{DirectionCode, TransformScheme};
use crate::transforms::FftError;

/// How much effort the planner spends before committing to a plan.
///
/// Ordered by rigor so wisdom recorded at one level satisfies every level
/// below it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub enum PlanningStrategy {
    /// Static estimate only; cheapest and deterministic.
    EstimateOnly,
    /// One timed trial.
    #[default]
    Measure,
    Patient,
    Exhaustive,
}

impl PlanningStrategy {
    /// Timed trial executions run while planning.
    #[must_use]
    pub const fn trial_count(self) -> usize {
        match self {
            Self::EstimateOnly => 0,
            Self::Measure => 1,
            Self::Patient => 3,
            Self::Exhaustive => 6,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::EstimateOnly => "estimate",
            Self::Measure => "measure",
            Self::Patient => "patient",
            Self::Exhaustive => "exhaustive",
        }
    }
}

/// Admission mode controlling what enters the wisdom store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CacheAdmissionPolicy {
    Disabled,
    /// Only plans chosen by timed trials are remembered.
    #[default]
    MeasuredOnly,
    AlwaysInsert,
}

/// Stable wisdom key for a planning problem.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WisdomKey {
    pub scheme: TransformScheme,
    pub dims: Vec<GuruDim>,
    pub howmany_dims: Vec<GuruDim>,
    pub directions: Vec<DirectionCode>,
    pub unaligned: bool,
    pub preserve_input: bool,
}

impl WisdomKey {
    #[must_use]
    pub fn from_problem(problem: &GuruProblem) -> Self {
        Self {
            scheme: problem.scheme,
            dims: problem.dims.clone(),
            howmany_dims: problem.howmany_dims.clone(),
            directions: problem.directions.clone(),
            unaligned: problem.flags.is_unaligned(),
            preserve_input: problem.flags.preserves_input(),
        }
    }
}

/// Fingerprint proving how a concrete plan was selected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanFingerprint {
    pub radix_path: Vec<usize>,
    pub estimated_flops: u64,
    pub scratch_bytes: usize,
    /// Best trial time, absent for estimated plans.
    pub measured_ns: Option<u64>,
}

/// Persistent metadata associated with a wisdom entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanMetadata {
    pub key: WisdomKey,
    pub fingerprint: PlanFingerprint,
    pub generated_by: PlanningStrategy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanCacheConfig {
    pub capacity: usize,
    pub admission_policy: CacheAdmissionPolicy,
}

impl Default for PlanCacheConfig {
    fn default() -> Self {
        Self {
            capacity: 128,
            admission_policy: CacheAdmissionPolicy::MeasuredOnly,
        }
    }
}

impl PlanCacheConfig {
    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    #[must_use]
    pub fn with_admission_policy(mut self, admission_policy: CacheAdmissionPolicy) -> Self {
        self.admission_policy = admission_policy;
        self
    }
}

/// Storage interface to decouple planning from wisdom storage details.
pub trait PlanCacheBackend {
    fn lookup(&self, key: &WisdomKey) -> Option<PlanMetadata>;
    /// Returns whether the entry was admitted.
    fn store(&mut self, metadata: PlanMetadata) -> bool;
    fn config(&self) -> &PlanCacheConfig;
    /// Entries in insertion order.
    fn entries(&self) -> Vec<PlanMetadata>;
    fn forget(&mut self);
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Bounded in-memory wisdom; the oldest entry is evicted first.
#[derive(Debug, Clone, Default)]
pub struct WisdomStore {
    config: PlanCacheConfig,
    entries: HashMap<WisdomKey, PlanMetadata>,
    order: VecDeque<WisdomKey>,
}

impl WisdomStore {
    #[must_use]
    pub fn new(config: PlanCacheConfig) -> Self {
        Self {
            config,
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    fn admits(&self, metadata: &PlanMetadata) -> bool {
        match self.config.admission_policy {
            CacheAdmissionPolicy::Disabled => false,
            CacheAdmissionPolicy::MeasuredOnly => {
                metadata.generated_by > PlanningStrategy::EstimateOnly
            }
            CacheAdmissionPolicy::AlwaysInsert => true,
        }
    }
}

impl PlanCacheBackend for WisdomStore {
    fn lookup(&self, key: &WisdomKey) -> Option<PlanMetadata> {
        self.entries.get(key).cloned()
    }

    fn store(&mut self, metadata: PlanMetadata) -> bool {
        if self.config.capacity == 0 || !self.admits(&metadata) {
            return false;
        }
        if let Some(existing) = self.entries.get_mut(&metadata.key) {
            if existing.generated_by > metadata.generated_by {
                return false;
            }
            *existing = metadata;
            return true;
        }
        while self.order.len() >= self.config.capacity {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            self.entries.remove(&oldest);
        }
        self.order.push_back(metadata.key.clone());
        self.entries.insert(metadata.key.clone(), metadata);
        true
    }

    fn config(&self) -> &PlanCacheConfig {
        &self.config
    }

    fn entries(&self) -> Vec<PlanMetadata> {
        self.order
            .iter()
            .filter_map(|key| self.entries.get(key).cloned())
            .collect()
    }

    fn forget(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Tag written at the head of exported wisdom.
pub const WISDOM_FORMAT: &str = "frankenfftw-wisdom/1";

#[derive(Debug, Serialize, Deserialize)]
struct WisdomDocument {
    format: String,
    checksum: String,
    entries: Vec<PlanMetadata>,
}

fn wisdom_checksum(entries: &[PlanMetadata]) -> Result<String, FftError> {
    let encoded = serde_json::to_string(entries).map_err(|err| FftError::InvalidWisdom {
        detail: err.to_string(),
    })?;
    Ok(blake3::hash(encoded.as_bytes()).to_hex().to_string())
}

struct PlannerState {
    settings: PlannerSettings,
    backend: Box<dyn PlanCacheBackend + Send>,
}

impl PlannerState {
    fn set_threads(&mut self, threads: usize) {
        self.settings.threads = threads;
    }

    fn set_timelimit(&mut self, timelimit: Option<f64>) {
        self.settings.timelimit = timelimit;
    }
}

/// Serializes every native planner call behind one mutex and owns the
/// wisdom the planner consults.
///
/// Execution never takes this lock.
pub struct PlanningCoordinator {
    state: Mutex<PlannerState>,
    invocations: AtomicU64,
}

static GLOBAL_COORDINATOR: OnceLock<PlanningCoordinator> = OnceLock::new();

impl Default for PlanningCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for PlanningCoordinator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlanningCoordinator")
            .field("planner_invocations", &self.planner_invocations())
            .field("wisdom_len", &self.wisdom_len())
            .finish()
    }
}

impl PlanningCoordinator {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(PlanCacheConfig::default())
    }

    #[must_use]
    pub fn with_config(config: PlanCacheConfig) -> Self {
        Self::with_backend(Box::new(WisdomStore::new(config)))
    }

    #[must_use]
    pub fn with_backend(backend: Box<dyn PlanCacheBackend + Send>) -> Self {
        Self {
            state: Mutex::new(PlannerState {
                settings: PlannerSettings::default(),
                backend,
            }),
            invocations: AtomicU64::new(0),
        }
    }

    /// The process-wide coordinator used by [`crate::TransformPlan::new`].
    pub fn global() -> &'static Self {
        GLOBAL_COORDINATOR.get_or_init(Self::new)
    }

    fn lock(&self) -> MutexGuard<'_, PlannerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Native planner calls made through this coordinator.
    #[must_use]
    pub fn planner_invocations(&self) -> u64 {
        self.invocations.load(Ordering::Relaxed)
    }

    /// Runs the native planner under the planning lock.
    ///
    /// `Ok(None)` means wisdom-only planning found nothing to reuse.
    pub(crate) fn plan(
        &self,
        problem: &GuruProblem,
        threads: usize,
        timelimit: Option<f64>,
    ) -> Result<Option<NativePlan>, FftError> {
        let mut state = self.lock();
        state.set_threads(threads);
        state.set_timelimit(timelimit);
        self.invocations.fetch_add(1, Ordering::Relaxed);
        let settings = state.settings;
        plan_problem(problem, settings, state.backend.as_mut())
    }

    #[must_use]
    pub fn lookup_wisdom(&self, key: &WisdomKey) -> Option<PlanMetadata> {
        self.lock().backend.lookup(key)
    }

    #[must_use]
    pub fn wisdom_len(&self) -> usize {
        self.lock().backend.len()
    }

    #[must_use]
    pub fn cache_config(&self) -> PlanCacheConfig {
        self.lock().backend.config().clone()
    }

    pub fn forget_wisdom(&self) {
        self.lock().backend.forget();
        tracing::debug!("wisdom forgotten");
    }

    /// Serializes all wisdom as JSON guarded by a blake3 checksum.
    pub fn export_wisdom(&self) -> Result<String, FftError> {
        let entries = self.lock().backend.entries();
        let document = WisdomDocument {
            format: WISDOM_FORMAT.to_owned(),
            checksum: wisdom_checksum(&entries)?,
            entries,
        };
        serde_json::to_string(&document).map_err(|err| FftError::InvalidWisdom {
            detail: err.to_string(),
        })
    }

    /// Loads exported wisdom and returns how many entries were admitted.
    pub fn import_wisdom(&self, text: &str) -> Result<usize, FftError> {
        let document: WisdomDocument =
            serde_json::from_str(text).map_err(|err| FftError::InvalidWisdom {
                detail: err.to_string(),
            })?;
        if document.format != WISDOM_FORMAT {
            return Err(FftError::InvalidWisdom {
                detail: format!("unknown wisdom format {:?}", document.format),
            });
        }
        if wisdom_checksum(&document.entries)? != document.checksum {
            return Err(FftError::InvalidWisdom {
                detail: "wisdom checksum mismatch".to_owned(),
            });
        }
        let mut state = self.lock();
        let admitted = document
            .entries
            .into_iter()
            .map(|entry| state.backend.store(entry))
            .filter(|&stored| stored)
            .count();
        tracing::debug!(admitted, "wisdom imported");
        Ok(admitted)
    }
}

#[cfg(test)]
mod tests {
    use super::{
        CacheAdmissionPolicy, PlanCacheBackend, PlanCacheConfig, PlanFingerprint, PlanMetadata,
        PlanningCoordinator, PlanningStrategy, WisdomKey, WisdomStore,
    };
    use crate::guru::GuruDim;
    use crate::scheme::{DirectionCode, Precision, SchemeKind, TransformScheme};
    use crate::FftError;

    fn metadata(n: usize, generated_by: PlanningStrategy) -> PlanMetadata {
        PlanMetadata {
            key: WisdomKey {
                scheme: TransformScheme::new(SchemeKind::ComplexToComplex, Precision::Double),
                dims: vec![GuruDim { n, is: 1, os: 1 }],
                howmany_dims: Vec::new(),
                directions: vec![DirectionCode::Forward],
                unaligned: false,
                preserve_input: true,
            },
            fingerprint: PlanFingerprint {
                radix_path: vec![n],
                estimated_flops: (n * n) as u64,
                scratch_bytes: n * 16,
                measured_ns: Some(100),
            },
            generated_by,
        }
    }

    #[test]
    fn default_cache_config_is_bounded() {
        let config = PlanCacheConfig::default();
        assert_eq!(config.capacity, 128);
        assert_eq!(config.admission_policy, CacheAdmissionPolicy::MeasuredOnly);
    }

    #[test]
    fn rigor_orders_strategies() {
        assert!(PlanningStrategy::EstimateOnly < PlanningStrategy::Measure);
        assert!(PlanningStrategy::Patient < PlanningStrategy::Exhaustive);
        assert_eq!(PlanningStrategy::Exhaustive.trial_count(), 6);
    }

    #[test]
    fn measured_only_rejects_estimates() {
        let mut store = WisdomStore::new(PlanCacheConfig::default());
        assert!(!store.store(metadata(8, PlanningStrategy::EstimateOnly)));
        assert!(store.store(metadata(8, PlanningStrategy::Measure)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn weaker_wisdom_never_replaces_stronger() {
        let mut store = WisdomStore::new(PlanCacheConfig::default());
        assert!(store.store(metadata(8, PlanningStrategy::Patient)));
        assert!(!store.store(metadata(8, PlanningStrategy::Measure)));
        let entry = store.lookup(&metadata(8, PlanningStrategy::Measure).key);
        assert_eq!(
            entry.map(|found| found.generated_by),
            Some(PlanningStrategy::Patient)
        );
    }

    #[test]
    fn oldest_entry_is_evicted_first() {
        let mut store = WisdomStore::new(PlanCacheConfig::default().with_capacity(2));
        for n in [2, 3, 4] {
            assert!(store.store(metadata(n, PlanningStrategy::Measure)));
        }
        assert_eq!(store.len(), 2);
        assert!(store.lookup(&metadata(2, PlanningStrategy::Measure).key).is_none());
        let kept: Vec<usize> = store
            .entries()
            .iter()
            .map(|entry| entry.key.dims[0].n)
            .collect();
        assert_eq!(kept, vec![3, 4]);
    }

    #[test]
    fn disabled_admission_stores_nothing() {
        let mut store = WisdomStore::new(
            PlanCacheConfig::default().with_admission_policy(CacheAdmissionPolicy::Disabled),
        );
        assert!(!store.store(metadata(8, PlanningStrategy::Exhaustive)));
        assert!(store.is_empty());
    }

    #[test]
    fn import_rejects_unknown_format() {
        let coordinator = PlanningCoordinator::new();
        let err = coordinator
            .import_wisdom(r#"{"format":"other","checksum":"","entries":[]}"#)
            .expect_err("foreign wisdom should be rejected");
        assert!(matches!(err, FftError::InvalidWisdom { .. }));
    }

    #[test]
    fn export_of_empty_store_reimports_nothing() {
        let coordinator = PlanningCoordinator::new();
        let text = coordinator.export_wisdom().expect("export should succeed");
        assert_eq!(coordinator.import_wisdom(&text), Ok(0));
    }
}
