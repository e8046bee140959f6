use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::claim::{ClaimDecision, NameLocks};
use crate::error::Result;
use crate::registry::NamespaceRegistry;
use crate::types::{OwnershipTagSet, Tenant};

/// Ownership tags that a publish could not write.
#[derive(Debug, Clone)]
pub struct RepairTask {
    pub script_name: String,
    pub tenant: Tenant,
}

#[derive(Debug, Clone)]
pub struct RepairConfig {
    pub capacity: usize,
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            capacity: 256,
            max_attempts: 5,
            base_delay: Duration::from_millis(500),
        }
    }
}

struct Queued {
    epoch: u64,
    task: RepairTask,
}

enum Outcome {
    Done,
    Superseded,
    Abandoned,
}

/// Latest publish of a name that still has tasks queued.
#[derive(Debug, Clone, Copy)]
struct NameEpoch {
    epoch: u64,
    queued: usize,
}

type EpochTable = DashMap<String, NameEpoch>;

/// Drops one queued task for `name`, forgetting the name once none are left.
fn release(epochs: &EpochTable, name: &str) {
    if let Entry::Occupied(mut entry) = epochs.entry(name.to_string()) {
        let state = entry.get_mut();
        state.queued = state.queued.saturating_sub(1);
        if state.queued == 0 {
            entry.remove();
        }
    }
}

/// Background re-application of ownership tags that failed after upload.
///
/// Every publish of a name bumps that name's epoch. A queued task only runs
/// while its epoch is still the latest, so a stale repair never overwrites a
/// newer publish. Repairs re-check the claim under the name lock. Names are
/// tracked only while they have queued tasks.
#[derive(Clone)]
pub struct RepairQueue {
    tx: mpsc::Sender<Queued>,
    pending: Arc<AtomicUsize>,
    epochs: Arc<EpochTable>,
    next_epoch: Arc<AtomicU64>,
}

struct Worker {
    registry: Arc<dyn NamespaceRegistry>,
    locks: NameLocks,
    epochs: Arc<EpochTable>,
    pending: Arc<AtomicUsize>,
    config: RepairConfig,
}

impl RepairQueue {
    pub fn spawn(
        registry: Arc<dyn NamespaceRegistry>,
        locks: NameLocks,
        config: RepairConfig,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(config.capacity.max(1));
        let pending = Arc::new(AtomicUsize::new(0));
        let epochs = Arc::new(DashMap::new());

        let worker = Worker {
            registry,
            locks,
            epochs: Arc::clone(&epochs),
            pending: Arc::clone(&pending),
            config,
        };
        let handle = tokio::spawn(worker.run(rx));

        let queue = Self {
            tx,
            pending,
            epochs,
            next_epoch: Arc::new(AtomicU64::new(1)),
        };
        (queue, handle)
    }

    /// Marks the start of a publish of `script_name`; returns its epoch.
    /// Callers hold the name lock.
    pub fn begin(&self, script_name: &str) -> u64 {
        let epoch = self.next_epoch.fetch_add(1, Ordering::SeqCst);
        if let Some(mut state) = self.epochs.get_mut(script_name) {
            state.epoch = epoch;
        }
        epoch
    }

    /// Returns false when the queue is full or closed; the task is dropped.
    /// Callers hold the name lock.
    pub fn enqueue(&self, epoch: u64, task: RepairTask) -> bool {
        let script = task.script_name.clone();
        self.pending.fetch_add(1, Ordering::SeqCst);
        self.epochs
            .entry(script.clone())
            .and_modify(|state| {
                state.epoch = epoch;
                state.queued += 1;
            })
            .or_insert(NameEpoch { epoch, queued: 1 });

        match self.tx.try_send(Queued { epoch, task }) {
            Ok(()) => {
                tracing::info!(script = %script, "Queued repair of ownership tags");
                true
            }
            Err(e) => {
                release(&self.epochs, &script);
                self.pending.fetch_sub(1, Ordering::SeqCst);
                tracing::error!(script = %script, "Could not queue repair of ownership tags: {e}");
                false
            }
        }
    }

    /// Tasks queued or in progress.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Names with at least one queued task.
    #[must_use]
    pub fn tracked_names(&self) -> usize {
        self.epochs.len()
    }
}

impl Worker {
    async fn run(self, mut rx: mpsc::Receiver<Queued>) {
        while let Some(queued) = rx.recv().await {
            self.process(&queued).await;
            release(&self.epochs, &queued.task.script_name);
            self.pending.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn is_current(&self, name: &str, epoch: u64) -> bool {
        self.epochs.get(name).is_some_and(|state| state.epoch == epoch)
    }

    async fn process(&self, queued: &Queued) {
        let name = queued.task.script_name.as_str();

        for attempt in 0..self.config.max_attempts {
            let delay = self.config.base_delay.saturating_mul(1 << attempt.min(16));
            tokio::time::sleep(delay).await;

            match self.attempt(queued.epoch, &queued.task).await {
                Ok(Outcome::Done) => {
                    tracing::info!(script = name, "Repaired ownership tags after {} attempt(s)", attempt + 1);
                    return;
                }
                Ok(Outcome::Superseded) => {
                    tracing::info!(script = name, "Dropped tag repair: superseded by a newer publish");
                    return;
                }
                Ok(Outcome::Abandoned) => {
                    tracing::warn!(script = name, "Abandoned tag repair: name is claimed by another tenant");
                    return;
                }
                Err(e) => {
                    tracing::warn!(script = name, "Tag repair failed (attempt {}): {e}", attempt + 1);
                }
            }
        }

        tracing::error!(
            script = name,
            "Giving up on tag repair after {} attempts",
            self.config.max_attempts
        );
    }

    async fn attempt(&self, epoch: u64, task: &RepairTask) -> Result<Outcome> {
        let _guard = self.locks.acquire(&task.script_name).await;
        if !self.is_current(&task.script_name, epoch) {
            return Ok(Outcome::Superseded);
        }

        let current = self.registry.get_tags(&task.script_name).await?;
        if ClaimDecision::evaluate(&current, &task.tenant) == ClaimDecision::Reserved {
            return Ok(Outcome::Abandoned);
        }
        self.registry
            .put_tags(&task.script_name, &OwnershipTagSet::for_owner(&task.tenant))
            .await?;
        Ok(Outcome::Done)
    }
}
