//! Keyed async operation locks
//!
//! CloudControl returns `UNEXPECTED_ERROR` when more than one asynchronous
//! mutating operation is outstanding against the same domain. Handlers
//! therefore take an [`AsyncOperationLock`] for the affected key around each
//! remote call.
//!
//! The registry is an ordinary object: construct it once, share it through an
//! `Arc`, and every handler holding that `Arc` is serialized per key. Keys are
//! independent of each other and waiters are not ordered.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::OwnedMutexGuard;

/// Registry of per-key locks
#[derive(Debug, Default)]
pub struct AsyncOperationLocks {
    entries: Mutex<HashMap<String, Arc<LockEntry>>>,
}

#[derive(Debug, Default)]
struct LockEntry {
    gate: Arc<tokio::sync::Mutex<()>>,
    holder: Mutex<Option<LockHolder>>,
}

/// Who holds a key, and since when
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockHolder {
    pub description: String,
    pub acquired_at: DateTime<Utc>,
}

impl LockEntry {
    fn holder(&self) -> MutexGuard<'_, Option<LockHolder>> {
        self.holder.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl AsyncOperationLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, key: &str) -> Arc<LockEntry> {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(entries.entry(key.to_string()).or_default())
    }

    /// Wait until `key` is free, then hold it.
    ///
    /// The returned handle's description is the key itself.
    pub async fn acquire(&self, key: impl Into<String>) -> AsyncOperationLock {
        let key = key.into();
        let holder = key.clone();
        self.acquire_as(key, holder).await
    }

    /// Wait until `key` is free, then hold it on behalf of `holder`.
    pub async fn acquire_as(
        &self,
        key: impl Into<String>,
        holder: impl Into<String>,
    ) -> AsyncOperationLock {
        let key = key.into();
        let holder = holder.into();
        let entry = self.entry(&key);

        let guard = match Arc::clone(&entry.gate).try_lock_owned() {
            Ok(guard) => guard,
            Err(_) => {
                let current = entry.holder().clone();
                match current {
                    Some(current) => tracing::debug!(
                        "'{}' waiting for async operation lock '{}' (held by '{}' since {})",
                        holder,
                        key,
                        current.description,
                        current.acquired_at
                    ),
                    None => tracing::debug!(
                        "'{}' waiting for async operation lock '{}'",
                        holder,
                        key
                    ),
                }
                Arc::clone(&entry.gate).lock_owned().await
            }
        };

        *entry.holder() = Some(LockHolder {
            description: holder.clone(),
            acquired_at: Utc::now(),
        });
        tracing::debug!("'{}' acquired async operation lock '{}'", holder, key);

        AsyncOperationLock {
            key,
            holder,
            entry,
            released: AtomicBool::new(false),
            guard: Mutex::new(Some(guard)),
        }
    }

    /// Current holder of `key`, if any
    pub fn holder(&self, key: &str) -> Option<LockHolder> {
        let entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.get(key).and_then(|entry| entry.holder().clone())
    }

    pub fn is_held(&self, key: &str) -> bool {
        self.holder(key).is_some()
    }

    /// Number of keys seen so far
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Handle for a held key
///
/// [`release`](Self::release) may be called any number of times; only the
/// first call unlocks. Dropping the handle releases it as well, so a handler
/// can release early before a long completion wait and still rely on drop on
/// every other path.
#[derive(Debug)]
pub struct AsyncOperationLock {
    key: String,
    holder: String,
    entry: Arc<LockEntry>,
    released: AtomicBool,
    guard: Mutex<Option<OwnedMutexGuard<()>>>,
}

impl AsyncOperationLock {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn holder(&self) -> &str {
        &self.holder
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// Free the key for the next waiter. No-op after the first call.
    pub fn release(&self) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }

        *self.entry.holder() = None;
        let guard = self
            .guard
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        drop(guard);

        tracing::debug!(
            "'{}' released async operation lock '{}'",
            self.holder,
            self.key
        );
    }
}

impl Drop for AsyncOperationLock {
    fn drop(&mut self) {
        self.release();
    }
}
