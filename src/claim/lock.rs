use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

type LockTable = DashMap<String, Arc<Mutex<()>>>;

/// Per-script-name critical sections.
///
/// Publishing holds the guard from the ownership check through the tag write,
/// so two claims of the same name in this process cannot interleave. Locks are
/// process-local; running several control-plane replicas needs an external
/// lock service keyed the same way.
#[derive(Clone, Default)]
pub struct NameLocks {
    table: Arc<LockTable>,
}

pub struct NameLockGuard {
    name: String,
    table: Arc<LockTable>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl NameLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, name: &str) -> NameLockGuard {
        let mutex = self
            .table
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let guard = mutex.lock_owned().await;

        NameLockGuard {
            name: name.to_string(),
            table: Arc::clone(&self.table),
            guard: Some(guard),
        }
    }

    /// Number of names with a holder or a waiter.
    #[must_use]
    pub fn active(&self) -> usize {
        self.table.len()
    }
}

impl NameLockGuard {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for NameLockGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Only the table holds the mutex now when nobody else is waiting.
        self.table
            .remove_if(&self.name, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_entry_is_pruned_after_release() {
        let locks = NameLocks::new();
        {
            let guard = locks.acquire("s").await;
            assert_eq!(guard.name(), "s");
            assert_eq!(locks.active(), 1);
        }
        assert_eq!(locks.active(), 0);
    }

    #[tokio::test]
    async fn test_same_name_is_serialized() {
        let locks = NameLocks::new();
        let inside = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let locks = locks.clone();
            let inside = Arc::clone(&inside);
            let max_seen = Arc::clone(&max_seen);
            handles.push(tokio::spawn(async move {
                let _guard = locks.acquire("shared").await;
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        assert_eq!(locks.active(), 0);
    }

    #[tokio::test]
    async fn test_different_names_do_not_block() {
        let locks = NameLocks::new();
        let _a = locks.acquire("a").await;
        let b = tokio::time::timeout(Duration::from_millis(100), locks.acquire("b")).await;
        assert!(b.is_ok());
    }
}
