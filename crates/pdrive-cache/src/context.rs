//! Serialized access to the cache.
//!
//! A `CacheContext` is a cheap handle around one store behind a FIFO-fair
//! `tokio::sync::Mutex`. Blocks passed to [`CacheContext::perform`] are
//! synchronous, so once a block is admitted it runs to completion; a caller
//! dropped while waiting for admission applies nothing.

use pdrive_core::config::CacheConfig;
use pdrive_core::DriveResult;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

use crate::backend::{open_backend, CacheBackend, MemoryBackend};
use crate::store::CacheStore;

#[derive(Clone)]
pub struct CacheContext {
    store: Arc<Mutex<CacheStore>>,
    changes: Arc<watch::Sender<u64>>,
}

impl CacheContext {
    pub fn new(store: CacheStore) -> Self {
        let changes = store.change_notifier();
        Self {
            store: Arc::new(Mutex::new(store)),
            changes,
        }
    }

    /// Open the cache described by the `[cache]` config section.
    pub fn open(config: &CacheConfig) -> DriveResult<Self> {
        Self::with_backend(open_backend(config)?)
    }

    pub fn with_backend(backend: Box<dyn CacheBackend>) -> DriveResult<Self> {
        Ok(Self::new(CacheStore::load(backend)?))
    }

    /// Empty process-local cache.
    pub fn in_memory() -> Self {
        Self::new(CacheStore::with_tables(
            Box::new(MemoryBackend::new()),
            Default::default(),
        ))
    }

    /// Run `block` with exclusive access to the store.
    pub async fn perform<R>(&self, block: impl FnOnce(&mut CacheStore) -> R) -> R {
        let mut store = self.store.lock().await;
        block(&mut store)
    }

    /// Synchronous variant of [`perform`](Self::perform).
    ///
    /// Blocks the current thread; call it only from blocking-pool threads
    /// (`spawn_blocking`) or outside any runtime. Calling it from an async
    /// task panics.
    pub fn perform_blocking<R>(&self, block: impl FnOnce(&mut CacheStore) -> R) -> R {
        let mut store = self.store.blocking_lock();
        block(&mut store)
    }

    /// Receiver notified with a new generation after every committed save.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::VolumeRecord;
    use pdrive_core::types::VolumeType;

    fn volume(id: &str) -> VolumeRecord {
        VolumeRecord {
            id: id.into(),
            kind: VolumeType::Main,
            max_space: 0,
            used_space: 0,
        }
    }

    #[tokio::test]
    async fn perform_serializes_access() {
        let context = CacheContext::in_memory();
        let mut handles = Vec::new();
        for i in 0..16 {
            let context = context.clone();
            handles.push(tokio::spawn(async move {
                context
                    .perform(|store| {
                        store.upsert_volume(volume(&format!("vol-{i}")));
                        store.save_or_rollback()
                    })
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        let count = context.perform(|store| store.tables().volumes.len()).await;
        assert_eq!(count, 16);
    }

    #[tokio::test]
    async fn subscribers_see_commits() {
        let context = CacheContext::in_memory();
        let mut changes = context.subscribe();
        context
            .perform(|store| {
                store.upsert_volume(volume("vol-1"));
                store.save_or_rollback()
            })
            .await
            .unwrap();
        changes.changed().await.unwrap();
        assert_eq!(*changes.borrow(), 1);
    }

    #[tokio::test]
    async fn perform_blocking_from_blocking_pool() {
        let context = CacheContext::in_memory();
        let blocking = context.clone();
        tokio::task::spawn_blocking(move || {
            blocking.perform_blocking(|store| {
                store.upsert_volume(volume("vol-1"));
                store.save_or_rollback()
            })
        })
        .await
        .unwrap()
        .unwrap();
        let found = context.perform(|store| store.volume("vol-1").is_some()).await;
        assert!(found);
    }

    #[tokio::test]
    async fn json_context_reopens_committed_state() {
        let tmp = tempfile::tempdir().unwrap();
        let config = CacheConfig {
            path: tmp.path().join("cache.json"),
            backend: pdrive_core::config::CacheBackendKind::Json,
        };
        let context = CacheContext::open(&config).unwrap();
        context
            .perform(|store| {
                store.upsert_volume(volume("vol-1"));
                store.save_or_rollback()
            })
            .await
            .unwrap();
        drop(context);

        let reopened = CacheContext::open(&config).unwrap();
        let found = reopened.perform(|store| store.volume("vol-1").cloned()).await;
        assert_eq!(found, Some(volume("vol-1")));
    }
}
