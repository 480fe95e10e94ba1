use manifold_types::Key;

use crate::error::StoreResult;
use crate::object::StoredObject;
use crate::wait::StoreWait;

/// Content-addressed block store.
///
/// All implementations must satisfy these invariants:
/// - Blocks are immutable once written; the same kind and bytes always
///   produce the same key.
/// - `store` returns the key as soon as it is known. The block is only
///   guaranteed readable once the returned [`StoreWait`] has completed.
/// - Concurrent reads are always safe.
/// - All backend errors are propagated, never silently ignored.
pub trait ContentStore: Send + Sync {
    /// Write a block and return its key plus a completion signal.
    ///
    /// Writing a block that already exists is a no-op (idempotent).
    fn store(&self, object: StoredObject, encrypt: bool) -> StoreResult<(Key, StoreWait)>;

    /// Read a block by key.
    ///
    /// Returns `Ok(None)` if the block does not exist.
    fn read(&self, key: &Key) -> StoreResult<Option<StoredObject>>;

    /// Whether the block was stored encrypted. `Ok(None)` if it is unknown.
    fn is_encrypted(&self, key: &Key) -> StoreResult<Option<bool>>;

    /// Check whether a block exists.
    fn exists(&self, key: &Key) -> StoreResult<bool> {
        Ok(self.read(key)?.is_some())
    }
}
