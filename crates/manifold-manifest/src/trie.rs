//! Copy-on-write manifest trie.
//!
//! Each page holds at most one entry per leading character plus one entry
//! for the empty path (the page's index entry). Entries sharing a leading
//! character are split on their common prefix into an internal edge whose
//! page holds the differing suffixes.

use std::collections::btree_map::Entry as SlotEntry;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use manifold_store::{ContentStore, ObjectKind, StoreWait, StoredObject};
use manifold_types::Key;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::entry::{EntryStatus, ManifestEntry};
use crate::error::{ManifestError, ManifestResult};
use crate::page::ManifestPage;

/// Link from an internal edge to the page below it.
enum Child {
    Unloaded(Key),
    Loaded(Box<ManifestTrie>),
}

impl Child {
    fn load(
        &mut self,
        store: &Arc<dyn ContentStore>,
        cancel: &CancellationToken,
    ) -> ManifestResult<&mut ManifestTrie> {
        if let Child::Unloaded(key) = *self {
            trace!(key = %key.short_hex(), "loading subtrie");
            let trie = ManifestTrie::load(Arc::clone(store), key, cancel)?;
            *self = Child::Loaded(Box::new(trie));
        }
        match self {
            Child::Loaded(trie) => Ok(trie),
            Child::Unloaded(key) => Err(ManifestError::NotFound(*key)),
        }
    }
}

struct TrieEntry {
    entry: ManifestEntry,
    child: Option<Child>,
}

impl TrieEntry {
    /// Wrap an entry; entries typed as manifests become edges to the page
    /// named by their hash.
    fn new(entry: ManifestEntry) -> Result<Self, String> {
        let child = if entry.is_manifest() {
            let key = Key::from_hex(&entry.hash).map_err(|e| e.to_string())?;
            Some(Child::Unloaded(key))
        } else {
            None
        };
        Ok(Self { entry, child })
    }

    fn is_edge(&self) -> bool {
        self.child.is_some()
    }
}

fn check(cancel: &CancellationToken) -> ManifestResult<()> {
    if cancel.is_cancelled() {
        return Err(ManifestError::Cancelled);
    }
    Ok(())
}

/// Length in bytes of the longest common prefix of `a` and `b`, on a
/// character boundary.
fn common_prefix_len(a: &str, b: &str) -> usize {
    a.char_indices()
        .zip(b.chars())
        .take_while(|((_, x), y)| x == y)
        .last()
        .map(|((i, c), _)| i + c.len_utf8())
        .unwrap_or(0)
}

fn normalize(path: &str) -> String {
    path.replace('\\', "/")
}

/// One page of a manifest trie, plus the pages below it that have been
/// loaded so far.
pub struct ManifestTrie {
    store: Arc<dyn ContentStore>,
    encrypted: bool,
    slots: BTreeMap<char, TrieEntry>,
    index: Option<TrieEntry>,
    /// Key of the stored page; `None` while the page has unsaved edits.
    key: Option<Key>,
}

impl ManifestTrie {
    /// An empty trie. Nothing is stored until [`recalc_and_store`](Self::recalc_and_store).
    pub fn new(store: Arc<dyn ContentStore>, encrypted: bool) -> Self {
        Self {
            store,
            encrypted,
            slots: BTreeMap::new(),
            index: None,
            key: None,
        }
    }

    /// Load the root page stored under `key`. Deeper pages stay unloaded.
    pub fn load(
        store: Arc<dyn ContentStore>,
        key: Key,
        cancel: &CancellationToken,
    ) -> ManifestResult<Self> {
        check(cancel)?;
        let object = store.read(&key)?.ok_or(ManifestError::NotFound(key))?;
        if object.kind != ObjectKind::Manifest {
            return Err(ManifestError::Decode {
                key,
                reason: format!("block is a {} object", object.kind),
            });
        }
        let page = ManifestPage::decode(&object.data).map_err(|e| ManifestError::Decode {
            key,
            reason: e.to_string(),
        })?;
        let encrypted = store.is_encrypted(&key)?.unwrap_or(false);

        let mut trie = Self::new(store, encrypted);
        for entry in page.entries {
            let path = entry.path.clone();
            let slot = TrieEntry::new(entry).map_err(|reason| ManifestError::Decode {
                key,
                reason: format!("entry {path:?}: {reason}"),
            })?;
            trie.place(slot);
        }
        trie.key = Some(key);
        trace!(key = %key.short_hex(), entries = trie.len(), "loaded manifest page");
        Ok(trie)
    }

    /// Key of the stored root page, or `None` if there are unsaved edits.
    pub fn key(&self) -> Option<Key> {
        self.key
    }

    pub fn is_dirty(&self) -> bool {
        self.key.is_none()
    }

    pub fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    pub fn store(&self) -> &Arc<dyn ContentStore> {
        &self.store
    }

    /// Number of entries on the root page.
    pub fn len(&self) -> usize {
        self.slots.len() + usize::from(self.index.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn place(&mut self, slot: TrieEntry) {
        match slot.entry.path.chars().next() {
            Some(first) => {
                self.slots.insert(first, slot);
            }
            None => self.index = Some(slot),
        }
    }

    fn take_single(&mut self) -> Option<TrieEntry> {
        self.index
            .take()
            .or_else(|| self.slots.pop_first().map(|(_, slot)| slot))
    }

    // ---------------------------------------------------------------
    // Lookup
    // ---------------------------------------------------------------

    /// Find the entry for `path`, returning it with the part of `path` that
    /// matched.
    ///
    /// - An exact leaf match returns that leaf.
    /// - A path whose leading character has no entry returns the page's index
    ///   entry, if any.
    /// - A path ending at or inside an internal edge returns the index entry
    ///   of the page below, or else a copy of the edge marked
    ///   [`EntryStatus::Ambiguous`].
    ///
    /// Backslashes in `path` are treated as `/`.
    pub fn get_entry(
        &mut self,
        path: &str,
        cancel: &CancellationToken,
    ) -> ManifestResult<(Option<ManifestEntry>, String)> {
        let path = normalize(path);
        let (entry, matched) = self.find_prefix_of(&path, cancel)?;
        Ok((entry, path[..matched].to_string()))
    }

    fn find_prefix_of(
        &mut self,
        path: &str,
        cancel: &CancellationToken,
    ) -> ManifestResult<(Option<ManifestEntry>, usize)> {
        check(cancel)?;
        let index = || self.index.as_ref().map(|slot| slot.entry.clone());
        let Some(first) = path.chars().next() else {
            return Ok((index(), 0));
        };
        if !self.slots.contains_key(&first) {
            return Ok((index(), 0));
        }

        let store = Arc::clone(&self.store);
        let Some(slot) = self.slots.get_mut(&first) else {
            return Ok((None, 0));
        };
        let edge_len = slot.entry.path.len();

        if path.len() <= edge_len {
            if !slot.entry.path.starts_with(path) {
                return Ok((None, 0));
            }
            if let Some(child) = slot.child.as_mut() {
                let sub = child.load(&store, cancel)?;
                if let Some(index) = &sub.index {
                    return Ok((Some(index.entry.clone()), path.len()));
                }
                let mut edge = slot.entry.clone();
                edge.status = EntryStatus::Ambiguous;
                return Ok((Some(edge), path.len()));
            }
            if slot.entry.path == path {
                return Ok((Some(slot.entry.clone()), path.len()));
            }
            return Ok((None, 0));
        }

        if !path.starts_with(slot.entry.path.as_str()) {
            return Ok((None, 0));
        }
        match slot.child.as_mut() {
            Some(child) => {
                let sub = child.load(&store, cancel)?;
                match sub.find_prefix_of(&path[edge_len..], cancel)? {
                    (Some(found), pos) => Ok((Some(found), pos + edge_len)),
                    (None, _) => Ok((None, 0)),
                }
            }
            None => Ok((None, 0)),
        }
    }

    // ---------------------------------------------------------------
    // Editing
    // ---------------------------------------------------------------

    /// Insert `entry` at `entry.path`, replacing an existing leaf there.
    pub fn add_entry(&mut self, entry: ManifestEntry, cancel: &CancellationToken) -> ManifestResult<()> {
        let entry = ManifestEntry {
            path: normalize(&entry.path),
            ..entry
        };
        let path = entry.path.clone();
        let slot = TrieEntry::new(entry).map_err(|reason| ManifestError::InvalidEntry { path, reason })?;
        self.insert(slot, cancel)
    }

    fn insert(&mut self, mut new: TrieEntry, cancel: &CancellationToken) -> ManifestResult<()> {
        check(cancel)?;
        let Some(first) = new.entry.path.chars().next() else {
            self.key = None;
            self.index = Some(new);
            return Ok(());
        };

        let mut occupied = match self.slots.entry(first) {
            SlotEntry::Vacant(vacant) => {
                vacant.insert(new);
                self.key = None;
                return Ok(());
            }
            SlotEntry::Occupied(occupied) => occupied,
        };

        let old = occupied.get_mut();
        if old.entry.path == new.entry.path && !old.is_edge() {
            *old = new;
            self.key = None;
            return Ok(());
        }

        let cpl = common_prefix_len(&old.entry.path, &new.entry.path);
        if cpl == old.entry.path.len() {
            if let Some(child) = old.child.as_mut() {
                let sub = child.load(&self.store, cancel)?;
                new.entry.path.drain(..cpl);
                sub.insert(new, cancel)?;
                self.key = None;
                return Ok(());
            }
        }

        // Split on the common prefix: both entries move one page down.
        let mut old = occupied.remove();
        let common = new.entry.path[..cpl].to_string();
        old.entry.path.drain(..cpl);
        new.entry.path.drain(..cpl);
        let mut sub = ManifestTrie::new(Arc::clone(&self.store), self.encrypted);
        sub.place(old);
        sub.place(new);
        self.slots.insert(
            first,
            TrieEntry {
                entry: ManifestEntry::edge(common),
                child: Some(Child::Loaded(Box::new(sub))),
            },
        );
        self.key = None;
        Ok(())
    }

    /// Remove the leaf at `path`. Returns `false` if there was none.
    ///
    /// Deleting at an internal edge removes the index entry of the page below.
    /// A page left with fewer than two entries is folded into its parent.
    pub fn delete_entry(&mut self, path: &str, cancel: &CancellationToken) -> ManifestResult<bool> {
        self.remove(&normalize(path), cancel)
    }

    fn remove(&mut self, path: &str, cancel: &CancellationToken) -> ManifestResult<bool> {
        check(cancel)?;
        let Some(first) = path.chars().next() else {
            let removed = self.index.take().is_some();
            if removed {
                self.key = None;
            }
            return Ok(removed);
        };
        let SlotEntry::Occupied(mut occupied) = self.slots.entry(first) else {
            return Ok(false);
        };

        let slot = occupied.get_mut();
        if slot.entry.path == path && !slot.is_edge() {
            occupied.remove();
            self.key = None;
            return Ok(true);
        }
        if !path.starts_with(slot.entry.path.as_str()) {
            return Ok(false);
        }
        let edge_len = slot.entry.path.len();
        let Some(child) = slot.child.as_mut() else {
            return Ok(false);
        };

        let sub = child.load(&self.store, cancel)?;
        if !sub.remove(&path[edge_len..], cancel)? {
            return Ok(false);
        }
        self.key = None;

        if sub.len() < 2 {
            match sub.take_single() {
                Some(mut last) => {
                    last.entry.path.insert_str(0, &slot.entry.path);
                    *slot = last;
                }
                None => {
                    occupied.remove();
                }
            }
        }
        Ok(true)
    }

    // ---------------------------------------------------------------
    // Storing
    // ---------------------------------------------------------------

    /// Store every page with unsaved edits, bottom-up, and return the root key.
    ///
    /// The key is only returned once every page write has completed.
    pub async fn recalc_and_store(&mut self) -> ManifestResult<Key> {
        let mut waits = Vec::new();
        let written = self.write_dirty(&mut waits);
        let key = match written {
            Ok(key) => key,
            Err(e) => {
                self.forget_keys();
                return Err(e);
            }
        };
        let pages = waits.len();
        if let Err(e) = StoreWait::all(waits).wait().await {
            self.forget_keys();
            return Err(e.into());
        }
        debug!(root = %key.short_hex(), pages, "stored manifest");
        Ok(key)
    }

    fn write_dirty(&mut self, waits: &mut Vec<StoreWait>) -> ManifestResult<Key> {
        if let Some(key) = self.key {
            return Ok(key);
        }
        let mut entries = Vec::with_capacity(self.len());
        for slot in self.slots.values_mut().chain(self.index.iter_mut()) {
            if let Some(Child::Loaded(sub)) = slot.child.as_mut() {
                slot.entry.hash = sub.write_dirty(waits)?.to_hex();
            }
            entries.push(slot.entry.clone());
        }

        let data = ManifestPage::new(entries)
            .encode()
            .map_err(|e| ManifestError::Serialization(e.to_string()))?;
        let (key, wait) = self
            .store
            .store(StoredObject::new(ObjectKind::Manifest, data), self.encrypted)?;
        waits.push(wait);
        self.key = Some(key);
        trace!(key = %key.short_hex(), "wrote manifest page");
        Ok(key)
    }

    fn forget_keys(&mut self) {
        self.key = None;
        for slot in self.slots.values_mut().chain(self.index.iter_mut()) {
            if let Some(Child::Loaded(sub)) = slot.child.as_mut() {
                sub.forget_keys();
            }
        }
    }

    // ---------------------------------------------------------------
    // Listing
    // ---------------------------------------------------------------

    /// Visit every leaf whose path starts with `prefix`, depth-first.
    ///
    /// `visit` receives the entry (its `path` rewritten to the full path) and
    /// the path suffix relative to `prefix`. The walk stops with
    /// [`ManifestError::Cancelled`] as soon as `cancel` fires.
    pub fn list_with_prefix<F>(
        &mut self,
        prefix: &str,
        cancel: &CancellationToken,
        mut visit: F,
    ) -> ManifestResult<()>
    where
        F: FnMut(&ManifestEntry, &str),
    {
        self.walk(&normalize(prefix), "", "", cancel, &mut visit)
    }

    fn walk(
        &mut self,
        prefix: &str,
        base: &str,
        relative: &str,
        cancel: &CancellationToken,
        visit: &mut dyn FnMut(&ManifestEntry, &str),
    ) -> ManifestResult<()> {
        check(cancel)?;
        let store = Arc::clone(&self.store);
        let slots: Vec<&mut TrieEntry> = match prefix.chars().next() {
            Some(first) => self.slots.get_mut(&first).into_iter().collect(),
            None => self.slots.values_mut().chain(self.index.iter_mut()).collect(),
        };

        for slot in slots {
            check(cancel)?;
            let path = slot.entry.path.as_str();
            if slot.is_edge() {
                let l = prefix.len().min(path.len());
                if !prefix.is_char_boundary(l) || !path.is_char_boundary(l) || prefix[..l] != path[..l] {
                    continue;
                }
                let base = format!("{base}{path}");
                let relative = format!("{relative}{}", &path[l..]);
                let rest = &prefix[l..];
                if let Some(child) = slot.child.as_mut() {
                    let sub = child.load(&store, cancel)?;
                    sub.walk(rest, &base, &relative, cancel, visit)?;
                }
            } else if path.starts_with(prefix) {
                let mut entry = slot.entry.clone();
                entry.path = format!("{base}{path}");
                let suffix = format!("{relative}{}", &path[prefix.len()..]);
                visit(&entry, &suffix);
            }
        }
        Ok(())
    }

    /// All leaves under `prefix` as `(suffix, entry)` pairs, in walk order.
    pub fn entries_with_prefix(
        &mut self,
        prefix: &str,
        cancel: &CancellationToken,
    ) -> ManifestResult<Vec<(String, ManifestEntry)>> {
        let mut out = Vec::new();
        self.list_with_prefix(prefix, cancel, |entry, suffix| {
            out.push((suffix.to_string(), entry.clone()));
        })?;
        Ok(out)
    }
}

impl fmt::Debug for ManifestTrie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManifestTrie")
            .field("key", &self.key)
            .field("entries", &self.len())
            .field("encrypted", &self.encrypted)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use manifold_store::{DeferredContentStore, InMemoryContentStore};
    use proptest::prelude::*;

    fn store() -> Arc<dyn ContentStore> {
        Arc::new(InMemoryContentStore::new())
    }

    fn leaf(path: &str, b: u8) -> ManifestEntry {
        ManifestEntry::for_key(path, &Key::from_hash([b; 32]), "text/plain")
    }

    fn trie_with(paths: &[&str]) -> ManifestTrie {
        let cancel = CancellationToken::new();
        let mut trie = ManifestTrie::new(store(), false);
        for (i, path) in paths.iter().enumerate() {
            trie.add_entry(leaf(path, i as u8 + 1), &cancel).unwrap();
        }
        trie
    }

    fn hash_at(trie: &mut ManifestTrie, path: &str) -> Option<String> {
        let cancel = CancellationToken::new();
        trie.get_entry(path, &cancel).unwrap().0.map(|e| e.hash)
    }

    // --- lookup ---

    #[test]
    fn exact_leaf_lookup() {
        let mut trie = trie_with(&["index.html", "img/logo.png"]);
        let (entry, matched) = trie
            .get_entry("img/logo.png", &CancellationToken::new())
            .unwrap();
        assert_eq!(entry.unwrap().hash, Key::from_hash([2; 32]).to_hex());
        assert_eq!(matched, "img/logo.png");
    }

    #[test]
    fn shared_prefix_is_ambiguous() {
        let mut trie = trie_with(&["a/b", "a/c"]);
        let cancel = CancellationToken::new();

        let (entry, matched) = trie.get_entry("a/", &cancel).unwrap();
        let entry = entry.unwrap();
        assert_eq!(entry.status, EntryStatus::Ambiguous);
        assert!(entry.is_manifest());
        assert_eq!(matched, "a/");

        let (entry, _) = trie.get_entry("a/b", &cancel).unwrap();
        let entry = entry.unwrap();
        assert_eq!(entry.status, EntryStatus::Ok);
        assert_eq!(entry.hash, Key::from_hash([1; 32]).to_hex());
    }

    #[test]
    fn index_entry_beats_ambiguity() {
        let mut trie = trie_with(&["a/b", "a/c", "a/"]);
        let (entry, _) = trie.get_entry("a/", &CancellationToken::new()).unwrap();
        let entry = entry.unwrap();
        assert_eq!(entry.status, EntryStatus::Ok);
        assert_eq!(entry.hash, Key::from_hash([3; 32]).to_hex());
    }

    #[test]
    fn unmatched_path_falls_back_to_index() {
        let mut trie = trie_with(&["", "docs/a"]);
        assert_eq!(hash_at(&mut trie, "zzz"), Some(Key::from_hash([1; 32]).to_hex()));
        assert_eq!(hash_at(&mut trie, "docs/b"), None);
        assert_eq!(hash_at(&mut trie, "do"), None);

        let mut bare = trie_with(&["docs/a"]);
        assert_eq!(hash_at(&mut bare, "zzz"), None);
    }

    #[test]
    fn backslashes_are_normalised() {
        let mut trie = trie_with(&["dir/file"]);
        assert!(hash_at(&mut trie, "dir\\file").is_some());
    }

    #[test]
    fn multibyte_prefixes_split_cleanly() {
        let mut trie = trie_with(&["é", "Ã", "éa"]);
        assert_eq!(hash_at(&mut trie, "é"), Some(Key::from_hash([1; 32]).to_hex()));
        assert_eq!(hash_at(&mut trie, "Ã"), Some(Key::from_hash([2; 32]).to_hex()));
        assert_eq!(hash_at(&mut trie, "éa"), Some(Key::from_hash([3; 32]).to_hex()));
    }

    #[test]
    fn cancelled_lookup_fails() {
        let mut trie = trie_with(&["a"]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(matches!(trie.get_entry("a", &cancel), Err(ManifestError::Cancelled)));
    }

    // --- editing ---

    #[test]
    fn adding_existing_leaf_replaces_it() {
        let mut trie = trie_with(&["a"]);
        trie.add_entry(leaf("a", 9), &CancellationToken::new()).unwrap();
        assert_eq!(hash_at(&mut trie, "a"), Some(Key::from_hash([9; 32]).to_hex()));
        assert_eq!(trie.len(), 1);
    }

    #[test]
    fn prefix_of_existing_leaf_splits() {
        let mut trie = trie_with(&["abc", "ab"]);
        assert_eq!(trie.len(), 1);
        assert_eq!(hash_at(&mut trie, "abc"), Some(Key::from_hash([1; 32]).to_hex()));
        assert_eq!(hash_at(&mut trie, "ab"), Some(Key::from_hash([2; 32]).to_hex()));
    }

    #[test]
    fn delete_collapses_single_child_pages() {
        let mut trie = trie_with(&["a/b", "a/c"]);
        let cancel = CancellationToken::new();
        assert!(trie.delete_entry("a/b", &cancel).unwrap());
        assert_eq!(hash_at(&mut trie, "a/b"), None);
        assert_eq!(hash_at(&mut trie, "a/c"), Some(Key::from_hash([2; 32]).to_hex()));

        let (entry, _) = trie.get_entry("a/c", &cancel).unwrap();
        assert!(!entry.unwrap().is_manifest());
        assert!(!trie.delete_entry("a/b", &cancel).unwrap());
    }

    #[test]
    fn delete_at_edge_removes_index_only() {
        let mut trie = trie_with(&["a/", "a/b", "a/c"]);
        let cancel = CancellationToken::new();
        assert!(trie.delete_entry("a/", &cancel).unwrap());
        assert!(hash_at(&mut trie, "a/b").is_some());
        assert!(hash_at(&mut trie, "a/c").is_some());
        let (entry, _) = trie.get_entry("a/", &cancel).unwrap();
        assert_eq!(entry.unwrap().status, EntryStatus::Ambiguous);
    }

    #[test]
    fn invalid_edge_hash_is_rejected() {
        let mut trie = ManifestTrie::new(store(), false);
        let bad = ManifestEntry::new("x", "not-a-key", crate::entry::MANIFEST_TYPE);
        let err = trie.add_entry(bad, &CancellationToken::new()).unwrap_err();
        assert!(matches!(err, ManifestError::InvalidEntry { .. }));
    }

    // --- storing and loading ---

    #[tokio::test]
    async fn stored_trie_reloads_lazily() {
        let store = store();
        let cancel = CancellationToken::new();
        let mut trie = ManifestTrie::new(Arc::clone(&store), false);
        for (i, path) in ["a/b", "a/c", "x"].iter().enumerate() {
            trie.add_entry(leaf(path, i as u8 + 1), &cancel).unwrap();
        }
        let root = trie.recalc_and_store().await.unwrap();
        assert!(!trie.is_dirty());

        let mut loaded = ManifestTrie::load(Arc::clone(&store), root, &cancel).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(hash_at(&mut loaded, "a/c"), Some(Key::from_hash([2; 32]).to_hex()));
        assert_eq!(hash_at(&mut loaded, "x"), Some(Key::from_hash([3; 32]).to_hex()));
    }

    #[tokio::test]
    async fn edits_leave_old_snapshot_intact() {
        let store = store();
        let cancel = CancellationToken::new();
        let mut trie = ManifestTrie::new(Arc::clone(&store), false);
        trie.add_entry(leaf("a/b", 1), &cancel).unwrap();
        trie.add_entry(leaf("a/c", 2), &cancel).unwrap();
        let before = trie.recalc_and_store().await.unwrap();

        let mut edited = ManifestTrie::load(Arc::clone(&store), before, &cancel).unwrap();
        edited.add_entry(leaf("a/d", 3), &cancel).unwrap();
        let after = edited.recalc_and_store().await.unwrap();
        assert_ne!(before, after);

        let mut old = ManifestTrie::load(Arc::clone(&store), before, &cancel).unwrap();
        assert_eq!(hash_at(&mut old, "a/d"), None);
        let mut new = ManifestTrie::load(store, after, &cancel).unwrap();
        assert!(hash_at(&mut new, "a/d").is_some());
    }

    #[tokio::test]
    async fn identical_edits_give_identical_roots() {
        let store = store();
        let cancel = CancellationToken::new();
        let mut base = ManifestTrie::new(Arc::clone(&store), false);
        base.add_entry(leaf("a", 1), &cancel).unwrap();
        let root = base.recalc_and_store().await.unwrap();

        let mut roots = Vec::new();
        for _ in 0..2 {
            let mut trie = ManifestTrie::load(Arc::clone(&store), root, &cancel).unwrap();
            trie.add_entry(leaf("b/c", 2), &cancel).unwrap();
            roots.push(trie.recalc_and_store().await.unwrap());
        }
        assert_eq!(roots[0], roots[1]);
    }

    #[tokio::test]
    async fn root_is_withheld_until_pages_land() {
        let deferred = Arc::new(DeferredContentStore::new());
        let store: Arc<dyn ContentStore> = Arc::clone(&deferred) as Arc<dyn ContentStore>;
        let cancel = CancellationToken::new();
        let mut trie = ManifestTrie::new(store, false);
        trie.add_entry(leaf("a/b", 1), &cancel).unwrap();
        trie.add_entry(leaf("a/c", 2), &cancel).unwrap();

        let handle = tokio::spawn(async move { trie.recalc_and_store().await });
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!handle.is_finished());
        assert_eq!(deferred.pending_count(), 2);

        deferred.flush();
        let root = handle.await.unwrap().unwrap();
        assert!(deferred.read(&root).unwrap().is_some());
    }

    #[tokio::test]
    async fn aborted_pages_fail_the_store() {
        let deferred = Arc::new(DeferredContentStore::new());
        let store: Arc<dyn ContentStore> = Arc::clone(&deferred) as Arc<dyn ContentStore>;
        let mut trie = ManifestTrie::new(store, false);
        trie.add_entry(leaf("a", 1), &CancellationToken::new()).unwrap();

        deferred_abort_soon(Arc::clone(&deferred));
        let err = trie.recalc_and_store().await.unwrap_err();
        assert!(matches!(err, ManifestError::Store(_)));
        assert!(trie.is_dirty());
    }

    fn deferred_abort_soon(store: Arc<DeferredContentStore>) {
        tokio::spawn(async move {
            while store.pending_count() == 0 {
                tokio::task::yield_now().await;
            }
            store.abort();
        });
    }

    #[test]
    fn load_missing_root_is_not_found() {
        let key = Key::from_hash([7; 32]);
        let err = ManifestTrie::load(store(), key, &CancellationToken::new()).unwrap_err();
        assert!(matches!(err, ManifestError::NotFound(k) if k == key));
    }

    #[test]
    fn load_non_manifest_block_fails() {
        let store = store();
        let (key, _) = store.store(StoredObject::chunk(&b"plain"[..]), false).unwrap();
        let err = ManifestTrie::load(store, key, &CancellationToken::new()).unwrap_err();
        assert!(matches!(err, ManifestError::Decode { .. }));
    }

    // --- listing ---

    #[test]
    fn list_reports_suffixes_relative_to_prefix() {
        let mut trie = trie_with(&["docs/a.md", "docs/b.md", "docs/img/c.png", "readme"]);
        let cancel = CancellationToken::new();
        let listed = trie.entries_with_prefix("docs/", &cancel).unwrap();
        let suffixes: Vec<&str> = listed.iter().map(|(s, _)| s.as_str()).collect();
        assert_eq!(suffixes, vec!["a.md", "b.md", "img/c.png"]);
        assert_eq!(listed[2].1.path, "docs/img/c.png");

        let all = trie.entries_with_prefix("", &cancel).unwrap();
        assert_eq!(all.len(), 4);
    }

    #[test]
    fn list_prefix_inside_edge() {
        let mut trie = trie_with(&["docs/a.md", "docs/b.md"]);
        let listed = trie.entries_with_prefix("do", &CancellationToken::new()).unwrap();
        let suffixes: Vec<&str> = listed.iter().map(|(s, _)| s.as_str()).collect();
        assert_eq!(suffixes, vec!["cs/a.md", "cs/b.md"]);
    }

    #[test]
    fn cancelled_listing_yields_nothing() {
        let mut trie = trie_with(&["a", "b"]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut seen = 0;
        let result = trie.list_with_prefix("", &cancel, |_, _| seen += 1);
        assert!(matches!(result, Err(ManifestError::Cancelled)));
        assert_eq!(seen, 0);
    }

    /// Cancels `cancel` once `after` reads have gone through.
    struct CancelAfterReads {
        inner: InMemoryContentStore,
        reads: std::sync::atomic::AtomicUsize,
        after: usize,
        cancel: CancellationToken,
    }

    impl ContentStore for CancelAfterReads {
        fn store(
            &self,
            object: StoredObject,
            encrypt: bool,
        ) -> manifold_store::StoreResult<(Key, StoreWait)> {
            self.inner.store(object, encrypt)
        }

        fn read(&self, key: &Key) -> manifold_store::StoreResult<Option<StoredObject>> {
            let n = self.reads.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;
            if n >= self.after {
                self.cancel.cancel();
            }
            self.inner.read(key)
        }

        fn is_encrypted(&self, key: &Key) -> manifold_store::StoreResult<Option<bool>> {
            self.inner.is_encrypted(key)
        }
    }

    #[tokio::test]
    async fn listing_cancelled_between_page_loads_yields_nothing() {
        let cancel = CancellationToken::new();
        let store = Arc::new(CancelAfterReads {
            inner: InMemoryContentStore::new(),
            reads: Default::default(),
            after: 2,
            cancel: cancel.clone(),
        });
        let dyn_store: Arc<dyn ContentStore> = store.clone();

        // Root holds two edges and no leaves.
        let mut trie = ManifestTrie::new(Arc::clone(&dyn_store), false);
        for (i, path) in ["a/x", "a/y", "b/x", "b/y"].iter().enumerate() {
            trie.add_entry(leaf(path, i as u8 + 1), &CancellationToken::new()).unwrap();
        }
        let root = trie.recalc_and_store().await.unwrap();

        let mut loaded = ManifestTrie::load(dyn_store, root, &cancel).unwrap();
        assert!(!cancel.is_cancelled());

        let mut seen = 0;
        let result = loaded.list_with_prefix("", &cancel, |_, _| seen += 1);
        assert!(matches!(result, Err(ManifestError::Cancelled)));
        assert!(cancel.is_cancelled());
        assert_eq!(seen, 0);
        assert_eq!(store.reads.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    proptest! {
        #[test]
        fn every_added_path_is_found(paths in proptest::collection::btree_set("[a-c/]{1,6}", 1..12)) {
            let paths: Vec<&str> = paths.iter().map(String::as_str).collect();
            let mut trie = trie_with(&paths);
            for (i, path) in paths.iter().enumerate() {
                let (entry, _) = trie.get_entry(path, &CancellationToken::new()).unwrap();
                let entry = entry.unwrap();
                prop_assert_eq!(entry.hash, Key::from_hash([i as u8 + 1; 32]).to_hex());
            }
            let listed = trie.entries_with_prefix("", &CancellationToken::new()).unwrap();
            prop_assert_eq!(listed.len(), paths.len());
        }

        #[test]
        fn deleting_everything_empties_the_trie(paths in proptest::collection::btree_set("[a-c/]{1,6}", 1..12)) {
            let paths: Vec<&str> = paths.iter().map(String::as_str).collect();
            let mut trie = trie_with(&paths);
            let cancel = CancellationToken::new();
            for path in &paths {
                prop_assert!(trie.delete_entry(path, &cancel).unwrap());
            }
            prop_assert!(trie.is_empty());
        }
    }
}
