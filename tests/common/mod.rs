#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cext_bridge::{
    Bridge, BridgeConfig, GcCoordinator, LoadError, ManagedSingletons, NativeError, NativeId,
    NativeLoader, NativeOps, ObjectRef, PassStats, SentinelKind,
};

pub const FALSE_ID: NativeId = NativeId::new(0x10);
pub const TRUE_ID: NativeId = NativeId::new(0x20);
pub const NIL_ID: NativeId = NativeId::new(0x30);

/// Scripted native extension.
///
/// Hands out sequential ids, records frees and marks, and reports whatever
/// objects the test queued with `reclaim()` on the next pass.
pub struct FakeNative {
    next_id: AtomicU64,
    created: AtomicUsize,
    freed: Mutex<Vec<NativeId>>,
    marked: Mutex<HashSet<NativeId>>,
    reclaimable: Mutex<VecDeque<ObjectRef>>,
    steps: AtomicUsize,
    fail_next_step: AtomicBool,
    initialized: AtomicBool,
}

impl FakeNative {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            next_id: AtomicU64::new(1000),
            created: AtomicUsize::new(0),
            freed: Mutex::new(Vec::new()),
            marked: Mutex::new(HashSet::new()),
            reclaimable: Mutex::new(VecDeque::new()),
            steps: AtomicUsize::new(0),
            fail_next_step: AtomicBool::new(false),
            initialized: AtomicBool::new(false),
        })
    }

    /// Queue `object` to be reported dead by the next pass.
    pub fn reclaim(&self, object: &ObjectRef) {
        self.reclaimable.lock().unwrap().push_back(object.clone());
    }

    pub fn fail_next_step(&self) {
        self.fail_next_step.store(true, Ordering::SeqCst);
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn steps(&self) -> usize {
        self.steps.load(Ordering::SeqCst)
    }

    pub fn freed(&self) -> Vec<NativeId> {
        self.freed.lock().unwrap().clone()
    }

    pub fn is_marked(&self, id: NativeId) -> bool {
        self.marked.lock().unwrap().contains(&id)
    }

    pub fn initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }
}

impl NativeOps for FakeNative {
    fn create(&self, _object: &ObjectRef) -> Result<NativeId, NativeError> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(NativeId::new(self.next_id.fetch_add(1, Ordering::SeqCst)))
    }

    fn free(&self, id: NativeId) {
        self.freed.lock().unwrap().push(id);
    }

    fn mark(&self, id: NativeId) {
        self.marked.lock().unwrap().insert(id);
    }

    fn unmark(&self, id: NativeId) {
        self.marked.lock().unwrap().remove(&id);
    }

    fn run_reclamation_step(&self) -> Result<(), NativeError> {
        self.steps.fetch_add(1, Ordering::SeqCst);
        if self.fail_next_step.swap(false, Ordering::SeqCst) {
            return Err(NativeError::Reclamation("simulated failure".into()));
        }
        Ok(())
    }

    fn poll_reclaimed(&self) -> Option<ObjectRef> {
        self.reclaimable.lock().unwrap().pop_front()
    }

    fn sentinel_id(&self, kind: SentinelKind) -> NativeId {
        match kind {
            SentinelKind::False => FALSE_ID,
            SentinelKind::True => TRUE_ID,
            SentinelKind::Nil => NIL_ID,
        }
    }

    fn initialize(&self) -> Result<(), NativeError> {
        self.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn call_init(&self, init: NativeId) -> Result<NativeId, NativeError> {
        Ok(NativeId::new(init.raw() + 1))
    }

    fn call_method(
        &self,
        _function: NativeId,
        receiver: &ObjectRef,
        args: &[ObjectRef],
    ) -> Result<ObjectRef, NativeError> {
        Ok(args.first().cloned().unwrap_or_else(|| receiver.clone()))
    }
}

/// Loader that only finds the library at one path.
pub struct FakeLoader {
    pub native: Arc<FakeNative>,
    pub found_at: PathBuf,
    pub attempts: Mutex<Vec<PathBuf>>,
}

impl FakeLoader {
    pub fn new(native: Arc<FakeNative>, found_at: impl Into<PathBuf>) -> Self {
        Self {
            native,
            found_at: found_at.into(),
            attempts: Mutex::new(Vec::new()),
        }
    }

    pub fn attempts(&self) -> Vec<PathBuf> {
        self.attempts.lock().unwrap().clone()
    }
}

impl NativeLoader for FakeLoader {
    fn load(&self, path: &Path) -> Result<Arc<dyn NativeOps>, LoadError> {
        self.attempts.lock().unwrap().push(path.to_path_buf());
        if path == self.found_at {
            let ops: Arc<dyn NativeOps> = self.native.clone();
            Ok(ops)
        } else {
            Err(LoadError::NotFound {
                name: path.display().to_string(),
                tried: vec![path.to_path_buf()],
            })
        }
    }
}

/// Start a bridge over a fresh fake native extension.
pub fn start_bridge() -> (Bridge, Arc<FakeNative>) {
    start_bridge_with(BridgeConfig::default())
}

pub fn start_bridge_with(config: BridgeConfig) -> (Bridge, Arc<FakeNative>) {
    let native = FakeNative::new();
    let ops: Arc<dyn NativeOps> = native.clone();
    let bridge = Bridge::with_native(ops, ManagedSingletons::new(), config).unwrap();
    (bridge, native)
}

/// Wait until at least `passes` passes have run.
pub async fn wait_for_passes(coordinator: &GcCoordinator, passes: u64) -> PassStats {
    let mut rx = coordinator.subscribe();
    let stats = tokio::time::timeout(
        Duration::from_secs(5),
        rx.wait_for(|stats| stats.passes_run() >= passes),
    )
    .await
    .expect("timed out waiting for reclamation pass")
    .expect("reclamation worker stopped");
    (*stats).clone()
}
