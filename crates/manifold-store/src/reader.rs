use std::io;
use std::sync::Arc;

use bytes::Bytes;
use manifold_types::Key;

use crate::error::{StoreError, StoreResult};
use crate::traits::ContentStore;

/// Lazy reader over a stored block.
///
/// Nothing is fetched until the first read; a missing block surfaces as
/// [`StoreError::NotFound`] at that point rather than when the reader is
/// created.
pub struct ContentReader {
    store: Arc<dyn ContentStore>,
    key: Key,
    data: Option<Bytes>,
    pos: usize,
}

impl ContentReader {
    pub fn new(store: Arc<dyn ContentStore>, key: Key) -> Self {
        Self {
            store,
            key,
            data: None,
            pos: 0,
        }
    }

    /// Key of the block behind this reader.
    pub fn key(&self) -> Key {
        self.key
    }

    fn load(&mut self) -> StoreResult<&Bytes> {
        if self.data.is_none() {
            let object = self
                .store
                .read(&self.key)?
                .ok_or(StoreError::NotFound(self.key))?;
            self.data = Some(object.data);
        }
        Ok(self.data.get_or_insert_with(Bytes::new))
    }

    /// Size of the block in bytes.
    pub fn size(&mut self) -> StoreResult<u64> {
        Ok(self.load()?.len() as u64)
    }

    /// Copy bytes starting at `offset` into `buf`; returns the count copied.
    pub fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> StoreResult<usize> {
        let data = self.load()?;
        let start = usize::try_from(offset).unwrap_or(usize::MAX).min(data.len());
        let n = buf.len().min(data.len() - start);
        buf[..n].copy_from_slice(&data[start..start + n]);
        Ok(n)
    }

    /// The whole block.
    pub fn read_all(mut self) -> StoreResult<Bytes> {
        self.load()?;
        Ok(self.data.unwrap_or_default())
    }
}

impl io::Read for ContentReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let pos = self.pos as u64;
        let n = self.read_at(pos, buf).map_err(|e| match e {
            StoreError::Io(io) => io,
            StoreError::NotFound(_) => io::Error::new(io::ErrorKind::NotFound, e),
            other => io::Error::other(other),
        })?;
        self.pos += n;
        Ok(n)
    }
}

impl std::fmt::Debug for ContentReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentReader")
            .field("key", &self.key)
            .field("loaded", &self.data.is_some())
            .field("pos", &self.pos)
            .finish()
    }
}

/// Open a lazy reader over `key`, plus whether the block was stored encrypted.
pub fn retrieve(store: &Arc<dyn ContentStore>, key: Key) -> StoreResult<(ContentReader, bool)> {
    let encrypted = store.is_encrypted(&key)?.unwrap_or(false);
    Ok((ContentReader::new(Arc::clone(store), key), encrypted))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryContentStore;
    use crate::object::StoredObject;
    use std::io::Read;

    fn store_with(data: &'static [u8]) -> (Arc<dyn ContentStore>, Key) {
        let store: Arc<dyn ContentStore> = Arc::new(InMemoryContentStore::new());
        let (key, _) = store.store(StoredObject::chunk(data), true).unwrap();
        (store, key)
    }

    #[test]
    fn reads_whole_block() {
        let (store, key) = store_with(b"hello reader");
        let (mut reader, encrypted) = retrieve(&store, key).unwrap();
        assert!(encrypted);
        let mut out = String::new();
        reader.read_to_string(&mut out).unwrap();
        assert_eq!(out, "hello reader");
    }

    #[test]
    fn read_at_offsets() {
        let (store, key) = store_with(b"0123456789");
        let mut reader = ContentReader::new(store, key);
        let mut buf = [0u8; 4];
        assert_eq!(reader.read_at(3, &mut buf).unwrap(), 4);
        assert_eq!(&buf, b"3456");
        assert_eq!(reader.read_at(8, &mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"89");
        assert_eq!(reader.read_at(50, &mut buf).unwrap(), 0);
        assert_eq!(reader.size().unwrap(), 10);
    }

    #[test]
    fn missing_block_fails_on_first_read() {
        let store: Arc<dyn ContentStore> = Arc::new(InMemoryContentStore::new());
        let (mut reader, encrypted) = retrieve(&store, Key::from_hash([4; 32])).unwrap();
        assert!(!encrypted);
        let err = reader.read(&mut [0u8; 8]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn read_all_returns_bytes() {
        let (store, key) = store_with(b"all of it");
        let bytes = ContentReader::new(store, key).read_all().unwrap();
        assert_eq!(&bytes[..], b"all of it");
    }
}
