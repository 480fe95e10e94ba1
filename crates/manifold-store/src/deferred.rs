use std::sync::Mutex;

use manifold_types::Key;
use tracing::debug;

use crate::error::StoreResult;
use crate::memory::InMemoryContentStore;
use crate::object::StoredObject;
use crate::traits::ContentStore;
use crate::wait::{StoreWait, WriteCompleter};

struct PendingWrite {
    object: StoredObject,
    encrypt: bool,
    completer: WriteCompleter,
}

/// A content store whose writes only land when [`flush`](Self::flush) runs.
///
/// Keys are returned immediately, but the blocks stay unreadable and their
/// [`StoreWait`]s stay unsatisfied until the next flush. Useful to observe that
/// callers never publish a key before its writes are durable.
pub struct DeferredContentStore {
    inner: InMemoryContentStore,
    pending: Mutex<Vec<PendingWrite>>,
}

impl DeferredContentStore {
    pub fn new() -> Self {
        Self {
            inner: InMemoryContentStore::new(),
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Number of writes waiting for a flush.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().expect("lock poisoned").len()
    }

    /// Number of blocks that have landed.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Land every pending write and signal its completion.
    pub fn flush(&self) -> usize {
        let drained: Vec<PendingWrite> = {
            let mut pending = self.pending.lock().expect("lock poisoned");
            pending.drain(..).collect()
        };
        let count = drained.len();
        for write in drained {
            self.inner.insert(write.object, write.encrypt);
            write.completer.complete(Ok(()));
        }
        debug!(count, "flushed deferred writes");
        count
    }

    /// Drop every pending write; their waits fail with `WriteAborted`.
    pub fn abort(&self) -> usize {
        let mut pending = self.pending.lock().expect("lock poisoned");
        let count = pending.len();
        pending.clear();
        count
    }
}

impl Default for DeferredContentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentStore for DeferredContentStore {
    fn store(&self, object: StoredObject, encrypt: bool) -> StoreResult<(Key, StoreWait)> {
        let key = object.compute_key();
        let (wait, completer) = StoreWait::pending(key);
        self.pending
            .lock()
            .expect("lock poisoned")
            .push(PendingWrite {
                object,
                encrypt,
                completer,
            });
        Ok((key, wait))
    }

    fn read(&self, key: &Key) -> StoreResult<Option<StoredObject>> {
        self.inner.read(key)
    }

    fn is_encrypted(&self, key: &Key) -> StoreResult<Option<bool>> {
        self.inner.is_encrypted(key)
    }
}

impl std::fmt::Debug for DeferredContentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredContentStore")
            .field("landed", &self.inner.len())
            .field("pending", &self.pending_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;

    #[tokio::test]
    async fn writes_land_on_flush() {
        let store = DeferredContentStore::new();
        let (key, wait) = store.store(StoredObject::chunk(&b"later"[..]), false).unwrap();
        assert_eq!(store.pending_count(), 1);
        assert!(store.read(&key).unwrap().is_none());

        assert_eq!(store.flush(), 1);
        wait.wait().await.unwrap();
        assert!(store.read(&key).unwrap().is_some());
        assert_eq!(store.pending_count(), 0);
    }

    #[tokio::test]
    async fn abort_fails_waiters() {
        let store = DeferredContentStore::new();
        let (key, wait) = store.store(StoredObject::chunk(&b"lost"[..]), false).unwrap();
        assert_eq!(store.abort(), 1);
        let err = wait.wait().await.unwrap_err();
        assert!(matches!(err, StoreError::WriteAborted(k) if k == key));
        assert!(store.is_empty());
    }
}
