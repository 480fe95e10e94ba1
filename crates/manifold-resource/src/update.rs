//! The stored form of a resource update.

use manifold_store::{ContentStore, ObjectKind, StoreError};
use manifold_types::Key;
use serde::{Deserialize, Serialize};

use crate::error::{ResourceError, ResourceResult};

/// One update of a resource, stored as a resource block (bincode).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceUpdate {
    /// Name hash of the resource.
    pub name_hash: [u8; 32],
    pub period: u32,
    pub version: u32,
    /// Set when `data` is a multihash record.
    pub multihash: bool,
    pub data: Vec<u8>,
}

impl ResourceUpdate {
    pub fn encode(&self) -> ResourceResult<Vec<u8>> {
        bincode::serialize(self).map_err(|e| ResourceError::Serialization(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> ResourceResult<Self> {
        bincode::deserialize(bytes).map_err(|e| ResourceError::Serialization(e.to_string()))
    }

    /// Read and decode the update block stored under `key`.
    pub fn load(store: &dyn ContentStore, key: Key) -> ResourceResult<Self> {
        let object = store.read(&key)?.ok_or(StoreError::NotFound(key))?;
        object.expect_kind(ObjectKind::Resource)?;
        Self::decode(&object.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoding_is_stable() {
        let update = ResourceUpdate {
            name_hash: [1; 32],
            period: 3,
            version: 2,
            multihash: false,
            data: b"payload".to_vec(),
        };
        let bytes = update.encode().unwrap();
        assert_eq!(bytes, update.encode().unwrap());
        assert_eq!(ResourceUpdate::decode(&bytes).unwrap(), update);
    }

    #[test]
    fn load_reads_resource_blocks_only() {
        use manifold_store::{InMemoryContentStore, StoredObject};

        let store = InMemoryContentStore::new();
        let update = ResourceUpdate {
            name_hash: [2; 32],
            period: 1,
            version: 1,
            multihash: true,
            data: vec![9; 4],
        };
        let object = StoredObject::new(ObjectKind::Resource, update.encode().unwrap());
        let (key, _) = store.store(object, false).unwrap();
        assert_eq!(ResourceUpdate::load(&store, key).unwrap(), update);

        let (chunk, _) = store.store(StoredObject::chunk(b"raw".to_vec()), false).unwrap();
        assert!(ResourceUpdate::load(&store, chunk).is_err());
        assert!(matches!(
            ResourceUpdate::load(&store, Key::from_hash([7; 32])),
            Err(ResourceError::Store(StoreError::NotFound(_)))
        ));
    }

    #[test]
    fn garbage_fails_to_decode() {
        assert!(matches!(
            ResourceUpdate::decode(&[1, 2, 3]),
            Err(ResourceError::Serialization(_))
        ));
    }
}
