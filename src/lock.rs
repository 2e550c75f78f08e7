//! Process-wide guard against overlapping transaction pipelines.
//!
//! Destructive actions (another migration, a manual deposit) must not start
//! while a pipeline is moving funds. A [`TransactionLock`] hands out at most one
//! [`TransactionGuard`] at a time; the guard releases the lock when dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared flag marking that a transaction pipeline owns the user's funds.
///
/// Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct TransactionLock {
    locked: Arc<AtomicBool>,
}

impl TransactionLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of the lock, or `None` if another pipeline holds it.
    pub fn try_acquire(&self) -> Option<TransactionGuard> {
        self.locked
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| {
                tracing::debug!("Transaction lock acquired");
                TransactionGuard {
                    locked: Arc::clone(&self.locked),
                }
            })
    }

    /// Whether a pipeline currently holds the lock.
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Acquire)
    }
}

/// Ownership token for a [`TransactionLock`]; releases it exactly once on drop.
#[must_use = "the lock is released as soon as the guard is dropped"]
#[derive(Debug)]
pub struct TransactionGuard {
    locked: Arc<AtomicBool>,
}

impl Drop for TransactionGuard {
    fn drop(&mut self) {
        self.locked.store(false, Ordering::Release);
        tracing::debug!("Transaction lock released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_holder() {
        let lock = TransactionLock::new();
        assert!(!lock.is_locked());

        let guard = lock.try_acquire().expect("first acquire succeeds");
        assert!(lock.is_locked());
        assert!(lock.try_acquire().is_none());
        assert!(lock.clone().try_acquire().is_none());

        drop(guard);
        assert!(!lock.is_locked());
        assert!(lock.try_acquire().is_some());
    }

    #[test]
    fn test_clones_share_state() {
        let lock = TransactionLock::new();
        let other = lock.clone();

        let _guard = other.try_acquire().unwrap();
        assert!(lock.is_locked());
    }

    #[test]
    fn test_contended_acquire_has_one_winner() {
        let lock = TransactionLock::new();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let lock = lock.clone();
                std::thread::spawn(move || lock.try_acquire())
            })
            .collect();

        let guards: Vec<_> = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .collect();
        let winners = guards.iter().filter(|g| g.is_some()).count();
        assert_eq!(winners, 1);
        assert!(lock.is_locked());
        drop(guards);
        assert!(!lock.is_locked());
    }
}
