use std::sync::Arc;

use manifold_store::{ContentStore, StoreWait, StoredObject};
use manifold_types::Key;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::entry::ManifestEntry;
use crate::error::ManifestResult;
use crate::trie::ManifestTrie;

/// Batches content writes and manifest edits against one root.
///
/// Content is stored as entries are added; [`store`](Self::store) waits for
/// those writes as well as the manifest pages before returning the new root.
pub struct ManifestWriter {
    trie: ManifestTrie,
    encrypt: bool,
    cancel: CancellationToken,
    pending: Vec<StoreWait>,
}

impl ManifestWriter {
    /// Start editing the manifest stored under `root`.
    ///
    /// Content is encrypted if `encrypt` is set or the root page itself was
    /// stored encrypted.
    pub fn open(store: Arc<dyn ContentStore>, root: Key, encrypt: bool) -> ManifestResult<Self> {
        let cancel = CancellationToken::new();
        let trie = ManifestTrie::load(store, root, &cancel)?;
        let encrypt = encrypt || trie.is_encrypted();
        Ok(Self {
            trie,
            encrypt,
            cancel,
            pending: Vec::new(),
        })
    }

    /// Start a manifest from scratch.
    pub fn create(store: Arc<dyn ContentStore>, encrypt: bool) -> Self {
        Self {
            trie: ManifestTrie::new(store, encrypt),
            encrypt,
            cancel: CancellationToken::new(),
            pending: Vec::new(),
        }
    }

    /// Use `cancel` for every later edit.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Store `content` and record it at `entry.path`. Returns the content key.
    pub fn add_entry(&mut self, content: &[u8], mut entry: ManifestEntry) -> ManifestResult<Key> {
        let (key, wait) = self
            .trie
            .store()
            .store(StoredObject::chunk(content.to_vec()), self.encrypt)?;
        self.pending.push(wait);
        entry.hash = key.to_hex();
        debug!(path = %entry.path, key = %key.short_hex(), size = content.len(), "added manifest entry");
        self.trie.add_entry(entry, &self.cancel)?;
        Ok(key)
    }

    /// Remove the entry at `path`; returns `false` if there was none.
    pub fn remove_entry(&mut self, path: &str) -> ManifestResult<bool> {
        let removed = self.trie.delete_entry(path, &self.cancel)?;
        debug!(%path, removed, "removed manifest entry");
        Ok(removed)
    }

    /// Wait for the content written so far, then store the manifest and
    /// return its new root.
    pub async fn store(&mut self) -> ManifestResult<Key> {
        let content = StoreWait::all(std::mem::take(&mut self.pending));
        content.wait().await?;
        self.trie.recalc_and_store().await
    }

    /// The trie being edited.
    pub fn trie(&mut self) -> &mut ManifestTrie {
        &mut self.trie
    }
}

impl std::fmt::Debug for ManifestWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManifestWriter")
            .field("trie", &self.trie)
            .field("encrypt", &self.encrypt)
            .field("pending", &self.pending.len())
            .finish()
    }
}
