//! Single-instance worker slots with atomic try-set/clear (spec §4.4).
//!
//! One slot per worker kind. A worker is "live" iff its OS thread has
//! started and has not yet exited, which `std::thread::JoinHandle::
//! is_finished` answers directly — no teacher analog is needed here since
//! the teacher's transcoding workers are Tokio tasks (`ferrex-server/src/
//! stream/transcoding/worker.rs`) where this spec mandates real OS threads
//! (spec §5: "every worker is a real OS thread").

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::Mutex;

/// The four mutually-exclusive worker kinds named in spec §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerKind {
    Transcription,
    Batch,
    Realtime,
    FolderMonitor,
}

/// Shared cooperative-cancellation flag, handed to a worker at spawn time
/// and checked at the worker's own checkpoint boundaries (spec §5).
#[derive(Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Idempotent: calling this N times has the
    /// same effect as calling it once (spec §8 property 7).
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A running worker occupying a slot.
pub struct Occupant {
    handle: JoinHandle<()>,
    cancel: CancelFlag,
}

impl Occupant {
    pub fn new(handle: JoinHandle<()>, cancel: CancelFlag) -> Self {
        Self { handle, cancel }
    }

    /// A worker is live iff its thread has started and not yet exited.
    pub fn is_live(&self) -> bool {
        !self.handle.is_finished()
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Joins the underlying thread, bounded by `timeout`. Returns `false`
    /// (and logs) on timeout rather than raising, per spec §5.
    pub fn join_bounded(self, timeout: std::time::Duration) -> bool {
        // `JoinHandle` has no native timed join, so we poll `is_finished`
        // at a short interval up to the bound, then join unconditionally
        // once finished (or give up and detach on timeout).
        let deadline = std::time::Instant::now() + timeout;
        while !self.handle.is_finished() {
            if std::time::Instant::now() >= deadline {
                tracing::warn!("worker join timed out after {:?}", timeout);
                return false;
            }
            std::thread::sleep(std::time::Duration::from_millis(20));
        }
        let _ = self.handle.join();
        true
    }
}

/// One half of a one-shot rendezvous that closes the race between
/// spawning a worker thread and registering it in a [`WorkerSlot`].
///
/// `std::thread::spawn` starts running immediately, but a [`WorkerSlot`]
/// can only be reserved after the `JoinHandle` exists — so a losing
/// `try_set` would otherwise leave an already-running, unsupervised
/// thread behind. The spawned thread calls [`StartGate::wait`] as its
/// first action and blocks until the caller resolves the `try_set`,
/// proceeding only if the slot was actually won (spec §8 property 5,
/// "Worker exclusion").
pub struct StartGate(std::sync::mpsc::Receiver<bool>);

impl StartGate {
    /// Blocks until released. Returns `true` iff the caller secured the
    /// worker slot and the thread should proceed with real work.
    pub fn wait(self) -> bool {
        self.0.recv().unwrap_or(false)
    }
}

/// The caller-held half of a [`StartGate`] rendezvous.
pub struct StartGateHandle(std::sync::mpsc::Sender<bool>);

impl StartGateHandle {
    /// Resolves the gate. `proceed = false` tells the waiting thread to
    /// exit immediately without doing any work.
    pub fn release(self, proceed: bool) {
        let _ = self.0.send(proceed);
    }
}

/// Creates a fresh start-gate pair for one worker spawn.
pub fn start_gate() -> (StartGate, StartGateHandle) {
    let (tx, rx) = std::sync::mpsc::channel();
    (StartGate(rx), StartGateHandle(tx))
}

/// One slot, holding at most one live worker at a time.
#[derive(Default)]
pub struct WorkerSlot {
    occupant: Mutex<Option<Occupant>>,
}

impl WorkerSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomic compare-and-set: succeeds only if the slot is empty, or the
    /// current occupant is no longer live. On success the slot holds
    /// `occupant`; on failure the caller's `occupant` is returned so it
    /// can be dropped (and its thread joined, or simply abandoned if it
    /// was never started).
    pub fn try_set(&self, occupant: Occupant) -> Result<(), Occupant> {
        let mut guard = self.occupant.lock();
        let vacant = guard.as_ref().map(|o| !o.is_live()).unwrap_or(true);
        if vacant {
            *guard = Some(occupant);
            Ok(())
        } else {
            Err(occupant)
        }
    }

    /// Unconditional replacement. Only used where the caller has already
    /// established exclusivity (e.g. inside the worker itself).
    pub fn set(&self, occupant: Occupant) {
        *self.occupant.lock() = Some(occupant);
    }

    /// Unconditional clear.
    pub fn clear(&self) {
        self.occupant.lock().take();
    }

    pub fn cancel_flag(&self) -> Option<CancelFlag> {
        self.occupant.lock().as_ref().map(|o| o.cancel_flag())
    }

    pub fn is_occupied_and_live(&self) -> bool {
        self.occupant
            .lock()
            .as_ref()
            .map(|o| o.is_live())
            .unwrap_or(false)
    }

    /// Takes the occupant out (for joining on shutdown), leaving the slot
    /// empty.
    pub fn take(&self) -> Option<Occupant> {
        self.occupant.lock().take()
    }
}

/// Process-wide registry, one slot per kind (spec §4.4: "lazily created,
/// process-wide").
pub struct WorkerRegistry {
    transcription: WorkerSlot,
    batch: WorkerSlot,
    realtime: WorkerSlot,
    folder_monitor: WorkerSlot,
}

impl Default for WorkerRegistry {
    fn default() -> Self {
        Self {
            transcription: WorkerSlot::new(),
            batch: WorkerSlot::new(),
            realtime: WorkerSlot::new(),
            folder_monitor: WorkerSlot::new(),
        }
    }
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slot(&self, kind: WorkerKind) -> &WorkerSlot {
        match kind {
            WorkerKind::Transcription => &self.transcription,
            WorkerKind::Batch => &self.batch,
            WorkerKind::Realtime => &self.realtime,
            WorkerKind::FolderMonitor => &self.folder_monitor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn spawn_occupant(run_for: Duration) -> Occupant {
        let cancel = CancelFlag::new();
        let handle = std::thread::spawn(move || std::thread::sleep(run_for));
        Occupant::new(handle, cancel)
    }

    #[test]
    fn try_set_fails_while_occupant_is_live() {
        let slot = WorkerSlot::new();
        slot.try_set(spawn_occupant(Duration::from_millis(200)))
            .expect("first set should succeed");
        let second = spawn_occupant(Duration::from_millis(0));
        assert!(slot.try_set(second).is_err());
    }

    #[test]
    fn try_set_succeeds_after_occupant_finishes() {
        let slot = WorkerSlot::new();
        slot.try_set(spawn_occupant(Duration::from_millis(10)))
            .unwrap();
        std::thread::sleep(Duration::from_millis(50));
        assert!(slot.try_set(spawn_occupant(Duration::from_millis(0))).is_ok());
    }

    #[test]
    fn clear_empties_slot_unconditionally() {
        let slot = WorkerSlot::new();
        slot.try_set(spawn_occupant(Duration::from_millis(200)))
            .unwrap();
        slot.clear();
        assert!(slot.try_set(spawn_occupant(Duration::from_millis(0))).is_ok());
    }

    #[test]
    fn cancel_flag_is_idempotent() {
        let flag = CancelFlag::new();
        flag.cancel();
        flag.cancel();
        assert!(flag.is_cancelled());
    }

    #[test]
    fn start_gate_blocks_work_until_released() {
        let (gate, gate_handle) = start_gate();
        let ran = Arc::new(AtomicBool::new(false));
        let ran_in_thread = ran.clone();
        let handle = std::thread::spawn(move || {
            if !gate.wait() {
                return;
            }
            ran_in_thread.store(true, Ordering::SeqCst);
        });
        std::thread::sleep(Duration::from_millis(20));
        assert!(!ran.load(Ordering::SeqCst), "thread must not run before release");
        gate_handle.release(true);
        handle.join().unwrap();
        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn start_gate_refusal_skips_the_work() {
        let (gate, gate_handle) = start_gate();
        let ran = Arc::new(AtomicBool::new(false));
        let ran_in_thread = ran.clone();
        let handle = std::thread::spawn(move || {
            if !gate.wait() {
                return;
            }
            ran_in_thread.store(true, Ordering::SeqCst);
        });
        gate_handle.release(false);
        handle.join().unwrap();
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[test]
    fn registry_exposes_one_independent_slot_per_kind() {
        let registry = WorkerRegistry::new();
        registry
            .slot(WorkerKind::Transcription)
            .try_set(spawn_occupant(Duration::from_millis(50)))
            .unwrap();
        // A different kind's slot is unaffected.
        assert!(registry
            .slot(WorkerKind::Batch)
            .try_set(spawn_occupant(Duration::from_millis(0)))
            .is_ok());
    }
}
