//! Thread-safe create-or-fetch store for live upload sessions.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use dashmap::DashMap;

use crate::receive::session::{SessionHandle, SessionKey, UploadSession};

/// Maps a transfer identity to its live session handle.
///
/// The map guards lookups/inserts/removes; each session's mutable state
/// sits behind its own lock so writes for different transfers proceed in
/// parallel. Handles are cloned out and the map guard dropped immediately
/// so concurrent requests never block on the map while a chunk is written.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<SessionKey, Arc<SessionHandle>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// Atomically return the existing session for `key` or create and
    /// register one via `create`. Never yields two distinct handles for
    /// the same identity while one is live.
    pub fn resolve<F>(&self, key: SessionKey, create: F) -> Result<Arc<SessionHandle>>
    where
        F: FnOnce() -> Result<UploadSession>,
    {
        let handle = self
            .sessions
            .entry(key)
            .or_try_insert_with(|| -> Result<Arc<SessionHandle>> {
                Ok(Arc::new(SessionHandle::new(create()?)))
            })?
            .value()
            .clone();
        Ok(handle)
    }

    /// Fetch without creating.
    pub fn get(&self, key: &SessionKey) -> Option<Arc<SessionHandle>> {
        self.sessions.get(key).map(|entry| entry.value().clone())
    }

    /// Remove an entry; idempotent if already absent.
    pub fn remove(&self, key: &SessionKey) -> Option<Arc<SessionHandle>> {
        self.sessions.remove(key).map(|(_, handle)| handle)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Keys of sessions idle longer than `ttl`. Reads only the activity
    /// timestamps, never the per-session state locks.
    pub fn idle_keys(&self, ttl: Duration) -> Vec<SessionKey> {
        self.sessions
            .iter()
            .filter(|entry| entry.value().idle_for() > ttl)
            .map(|entry| entry.key().clone())
            .collect()
    }
}
