//! Minimal in-process keyed store used for every process-wide map in this
//! crate (sandboxes, sessions, download tokens).
//!
//! The teacher implementation backed this abstraction with a persistent
//! on-disk database so sandbox state survived process restarts. That
//! dependency pulled in a blockchain-framework crate with no other use here,
//! and the orchestration plane does not need restart durability — sessions
//! silently re-mint JWTs on the next call. This keeps the same method
//! surface (`get`/`find`/`values`/`insert`/`remove`/`update`) backed by a
//! [`dashmap::DashMap`] instead, so callers elsewhere in this crate did not
//! need to change shape.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::error::{Result, SandboxError};

/// A process-wide, thread-safe keyed store of `V` values.
#[derive(Clone)]
pub struct PersistentStore<V: Clone> {
    inner: Arc<DashMap<String, V>>,
}

impl<V: Clone> PersistentStore<V> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
        }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        self.inner.get(key).map(|entry| entry.clone())
    }

    pub fn find<P>(&self, mut predicate: P) -> Option<V>
    where
        P: FnMut(&V) -> bool,
    {
        self.inner
            .iter()
            .find(|entry| predicate(entry.value()))
            .map(|entry| entry.clone())
    }

    pub fn values(&self) -> Vec<V> {
        self.inner.iter().map(|entry| entry.clone()).collect()
    }

    pub fn insert(&self, key: impl Into<String>, value: V) {
        self.inner.insert(key.into(), value);
    }

    pub fn remove(&self, key: &str) -> Option<V> {
        self.inner.remove(key).map(|(_, v)| v)
    }

    /// Mutate an existing entry in place. Errors with `NotFound` if absent.
    pub fn update<F>(&self, key: &str, f: F) -> Result<()>
    where
        F: FnOnce(&mut V),
    {
        match self.inner.get_mut(key) {
            Some(mut entry) => {
                f(entry.value_mut());
                Ok(())
            }
            None => Err(SandboxError::NotFound(key.to_string())),
        }
    }

    /// Reads and, if needed, writes a key under a single shard lock, so two
    /// concurrent callers for the same key can never both observe a miss and
    /// each insert their own value. `f` sees the current entry (`None` if
    /// absent) and decides what the entry should become; its return value is
    /// stored and handed back to the caller. The shard stays locked for the
    /// duration of `f`, including any fallible work it does.
    pub fn upsert<F>(&self, key: &str, f: F) -> Result<V>
    where
        F: FnOnce(Option<&V>) -> Result<V>,
    {
        match self.inner.entry(key.to_string()) {
            Entry::Occupied(mut entry) => {
                let next = f(Some(entry.get()))?;
                entry.insert(next.clone());
                Ok(next)
            }
            Entry::Vacant(entry) => {
                let next = f(None)?;
                entry.insert(next.clone());
                Ok(next)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl<V: Clone> Default for PersistentStore<V> {
    fn default() -> Self {
        Self::new()
    }
}
