use std::collections::HashMap;
use std::sync::RwLock;

use manifold_types::Key;
use tracing::trace;

use crate::error::StoreResult;
use crate::object::StoredObject;
use crate::traits::ContentStore;
use crate::wait::StoreWait;

struct Slot {
    object: StoredObject,
    encrypted: bool,
}

/// In-memory, HashMap-based content store.
///
/// Intended for tests and embedding. All blocks are held in memory behind a
/// `RwLock` for safe concurrent access. Writes complete synchronously, so the
/// returned [`StoreWait`] is always already satisfied.
pub struct InMemoryContentStore {
    objects: RwLock<HashMap<Key, Slot>>,
}

impl InMemoryContentStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
        }
    }

    /// Number of blocks currently stored.
    pub fn len(&self) -> usize {
        self.objects.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.objects.read().expect("lock poisoned").is_empty()
    }

    /// Total bytes across all stored blocks.
    pub fn total_bytes(&self) -> u64 {
        self.objects
            .read()
            .expect("lock poisoned")
            .values()
            .map(|slot| slot.object.size)
            .sum()
    }

    /// Return a sorted list of all keys in the store.
    pub fn all_keys(&self) -> Vec<Key> {
        let map = self.objects.read().expect("lock poisoned");
        let mut keys: Vec<Key> = map.keys().copied().collect();
        keys.sort();
        keys
    }

    /// Insert a block and return its key without producing a completion.
    pub(crate) fn insert(&self, object: StoredObject, encrypt: bool) -> Key {
        let key = object.compute_key();
        let mut map = self.objects.write().expect("lock poisoned");
        // Idempotent: content-addressing guarantees the same key always maps
        // to the same bytes.
        map.entry(key).or_insert_with(|| {
            trace!(key = %key.short_hex(), kind = %object.kind, size = object.size, "stored block");
            Slot {
                object,
                encrypted: encrypt,
            }
        });
        key
    }
}

impl Default for InMemoryContentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentStore for InMemoryContentStore {
    fn store(&self, object: StoredObject, encrypt: bool) -> StoreResult<(Key, StoreWait)> {
        let key = self.insert(object, encrypt);
        Ok((key, StoreWait::ready()))
    }

    fn read(&self, key: &Key) -> StoreResult<Option<StoredObject>> {
        let map = self.objects.read().expect("lock poisoned");
        Ok(map.get(key).map(|slot| slot.object.clone()))
    }

    fn is_encrypted(&self, key: &Key) -> StoreResult<Option<bool>> {
        let map = self.objects.read().expect("lock poisoned");
        Ok(map.get(key).map(|slot| slot.encrypted))
    }

    fn exists(&self, key: &Key) -> StoreResult<bool> {
        let map = self.objects.read().expect("lock poisoned");
        Ok(map.contains_key(key))
    }
}

impl std::fmt::Debug for InMemoryContentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.len();
        f.debug_struct("InMemoryContentStore")
            .field("block_count", &count)
            .finish()
    }
}
