use bytes::Bytes;
use manifold_crypto::ContentHasher;
use manifold_types::Key;

/// The kind of block stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// Raw content bytes.
    Chunk,
    /// A manifest trie page.
    Manifest,
    /// An encoded resource update.
    Resource,
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Chunk => write!(f, "chunk"),
            Self::Manifest => write!(f, "manifest"),
            Self::Resource => write!(f, "resource"),
        }
    }
}

/// A stored block: kind tag + bytes + cached size.
///
/// `StoredObject` is the unit of storage. The store never interprets the
/// contents of the data; it is a plain key-value store keyed by content hash.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredObject {
    /// The type of this block.
    pub kind: ObjectKind,
    /// The block bytes.
    pub data: Bytes,
    /// The size of `data` in bytes.
    pub size: u64,
}

impl StoredObject {
    /// Create a new stored object from kind and data.
    pub fn new(kind: ObjectKind, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        let size = data.len() as u64;
        Self { kind, data, size }
    }

    /// A raw content block.
    pub fn chunk(data: impl Into<Bytes>) -> Self {
        Self::new(ObjectKind::Chunk, data)
    }

    /// Compute the content-addressed key for this block.
    pub fn compute_key(&self) -> Key {
        let hasher = match self.kind {
            ObjectKind::Chunk => &ContentHasher::CHUNK,
            ObjectKind::Manifest => &ContentHasher::MANIFEST,
            ObjectKind::Resource => &ContentHasher::RESOURCE,
        };
        hasher.hash(&self.data)
    }

    /// Fail with `CorruptObject` unless this block has the expected kind.
    pub fn expect_kind(&self, kind: ObjectKind) -> crate::StoreResult<()> {
        if self.kind != kind {
            return Err(crate::StoreError::CorruptObject {
                key: self.compute_key(),
                reason: format!("expected {kind}, got {}", self.kind),
            });
        }
        Ok(())
    }
}
