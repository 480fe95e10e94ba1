//! The Manifold API façade.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use manifold_crypto::{Multihash, MultihashError};
use manifold_manifest::{
    EntryStatus, ManifestEntry, ManifestError, ManifestPage, ManifestTrie, ManifestWriter,
};
use manifold_resolver::NameResolver;
use manifold_resource::{ResourceError, ResourceHandler, ResourceLookupParams, ResourceUpdate};
use manifold_store::{
    retrieve, ContentReader, ContentStore, ObjectKind, StoreError, StoreWait, StoredObject,
};
use manifold_types::{Context, Key, Uri};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::config::ApiConfig;
use crate::error::{ApiError, ApiResult};
use crate::outcome::{DecodeFailure, GetOutcome};

/// Permission bits recorded on files written through the API.
const FILE_MODE: u32 = 0o700;

/// High-level entry point over a content store, an optional name resolver
/// and a resource handler.
pub struct Api {
    store: Arc<dyn ContentStore>,
    resolver: Option<Arc<dyn NameResolver>>,
    resources: Arc<dyn ResourceHandler>,
    config: ApiConfig,
}

/// What following a resource pointer produced.
enum Followed {
    Entry(ManifestEntry),
    Outcome(GetOutcome),
}

impl Api {
    /// `resources` must write its update blocks to `store`; resource
    /// pointers are followed by reading those blocks directly.
    pub fn new(
        store: Arc<dyn ContentStore>,
        resolver: Option<Arc<dyn NameResolver>>,
        resources: Arc<dyn ResourceHandler>,
    ) -> Self {
        Self {
            store,
            resolver,
            resources,
            config: ApiConfig::default(),
        }
    }

    /// Build an API whose resolver chains come from `config`.
    ///
    /// As with [`Api::new`], `resources` must write its updates to `store`.
    pub fn from_config(
        config: ApiConfig,
        store: Arc<dyn ContentStore>,
        resources: Arc<dyn ResourceHandler>,
    ) -> ApiResult<Self> {
        let resolver = config
            .build_resolver()?
            .map(|r| Arc::new(r) as Arc<dyn NameResolver>);
        Ok(Self {
            store,
            resolver,
            resources,
            config,
        })
    }

    pub fn with_config(mut self, config: ApiConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    pub fn content_store(&self) -> &Arc<dyn ContentStore> {
        &self.store
    }

    // ---- Addressing ----

    /// Turn an address into a content key.
    ///
    /// Immutable addresses must already be keys. Names go through the
    /// resolver; if it fails, an address that is itself a key is used as is.
    pub async fn resolve(&self, uri: &Uri) -> ApiResult<Key> {
        trace!(address = uri.address(), scheme = %uri.scheme(), "resolving");
        if uri.is_immutable() {
            return uri.as_key().ok_or_else(|| {
                ApiError::InvalidAddress(format!("immutable address {:?} is not a key", uri.address()))
            });
        }
        let Some(resolver) = &self.resolver else {
            return uri.as_key().ok_or_else(|| {
                ApiError::InvalidAddress(format!(
                    "{:?} is not a key and no resolver is configured",
                    uri.address()
                ))
            });
        };
        match resolver.resolve(uri.address()).await {
            Ok(key) => Ok(key),
            Err(e) => match uri.as_key() {
                Some(key) => {
                    debug!(address = uri.address(), error = %e, "resolver failed, using address as key");
                    Ok(key)
                }
                None => Err(e.into()),
            },
        }
    }

    async fn resolve_name(&self, name: &str) -> ApiResult<(Uri, Key)> {
        let uri = Uri::parse(&format!("mfd:/{name}"))?;
        let key = self.resolve(&uri).await?;
        Ok((uri, key))
    }

    // ---- Content ----

    /// Store a raw block.
    pub fn store(&self, data: &[u8], encrypt: bool) -> ApiResult<(Key, StoreWait)> {
        debug!(size = data.len(), encrypt, "storing content");
        Ok(self.store.store(StoredObject::chunk(data.to_vec()), encrypt)?)
    }

    /// Open a lazy reader over the block at `key`.
    pub fn retrieve(&self, key: Key) -> ApiResult<(ContentReader, bool)> {
        Ok(retrieve(&self.store, key)?)
    }

    /// Store `content` under a single-entry manifest and return the manifest
    /// key. The returned signal covers both writes.
    pub fn put(&self, content: &[u8], content_type: &str, encrypt: bool) -> ApiResult<(Key, StoreWait)> {
        let (content_key, content_wait) = self.store(content, encrypt)?;
        let page = ManifestPage::single(ManifestEntry::for_key("", &content_key, content_type));
        let (key, manifest_wait) = self.store_page(&page, encrypt)?;
        debug!(key = %key.short_hex(), content = %content_key.short_hex(), %content_type, "put");
        Ok((key, content_wait.join(manifest_wait)))
    }

    fn store_page(&self, page: &ManifestPage, encrypt: bool) -> ApiResult<(Key, StoreWait)> {
        let data = page
            .encode()
            .map_err(|e| ManifestError::Serialization(e.to_string()))?;
        Ok(self
            .store
            .store(StoredObject::new(ObjectKind::Manifest, data), encrypt)?)
    }

    /// Read `path` under the manifest at `root`.
    ///
    /// A resource pointer is followed to its latest update. Raw update data
    /// is returned as [`GetOutcome::ResourceData`]; a multihash update names
    /// another manifest root, where `path` is looked up once more.
    pub async fn get(&self, root: Key, path: &str) -> ApiResult<GetOutcome> {
        debug!(root = %root.short_hex(), %path, "get");
        let cancel = CancellationToken::new();
        let Some(mut entry) = self.lookup_entry(root, path, &cancel)? else {
            return Ok(GetOutcome::not_found(format!("no entry for {path:?} under {root}")));
        };

        if entry.is_resource() {
            match self.follow_resource(&entry, path, &cancel).await? {
                Followed::Entry(found) => entry = found,
                Followed::Outcome(outcome) => return Ok(outcome),
            }
        }

        if entry.status == EntryStatus::Ambiguous {
            debug!(%path, "ambiguous path");
            return Ok(GetOutcome::Ambiguous {
                content_key: entry.key(),
                entry,
            });
        }
        let Some(content_key) = entry.key() else {
            return Ok(GetOutcome::not_found(format!(
                "entry for {path:?} does not point at content"
            )));
        };
        let (reader, _) = retrieve(&self.store, content_key)?;
        Ok(GetOutcome::Content {
            reader,
            mime: entry.content_type,
            content_key,
        })
    }

    /// Load `root` and look up `path`. A missing or unreadable manifest is
    /// reported as no entry.
    fn lookup_entry(
        &self,
        root: Key,
        path: &str,
        cancel: &CancellationToken,
    ) -> ApiResult<Option<ManifestEntry>> {
        let mut trie = match ManifestTrie::load(Arc::clone(&self.store), root, cancel) {
            Ok(trie) => trie,
            Err(e @ (ManifestError::NotFound(_) | ManifestError::Decode { .. })) => {
                debug!(root = %root.short_hex(), error = %e, "manifest not loaded");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        let (entry, _) = trie.get_entry(path, cancel)?;
        Ok(entry)
    }

    async fn follow_resource(
        &self,
        pointer: &ManifestEntry,
        path: &str,
        cancel: &CancellationToken,
    ) -> ApiResult<Followed> {
        let name = pointer.hash.as_str();
        let ctx = Context::with_timeout(self.config.lookup_timeout());
        let params = ResourceLookupParams::new(self.config.resource_max_periods);

        let resource = match self.resources.lookup_latest(&ctx, name, &params).await {
            Ok(resource) => resource,
            Err(e) => return resource_miss(name, e),
        };
        // The flag and the payload must come from the update this lookup
        // found; the handler's per-name cache can move under concurrent lookups.
        let Some(update_key) = resource.update_key else {
            return resource_miss(
                name,
                ResourceError::NotSynced {
                    name: name.to_string(),
                },
            );
        };
        let update = match ResourceUpdate::load(self.store.as_ref(), update_key) {
            Ok(update) => update,
            Err(e) => return resource_miss(name, e),
        };
        let data = update.data;

        if !update.multihash {
            debug!(%name, period = update.period, version = update.version, "returning resource data");
            return Ok(Followed::Outcome(GetOutcome::ResourceData {
                name: name.to_string(),
                data,
                content_type: pointer.content_type.clone(),
            }));
        }

        let root = match Multihash::decode(&data).and_then(|record| record.to_key()) {
            Ok(root) => root,
            Err(MultihashError::UnsupportedAlgorithm { code, .. }) => {
                warn!(%name, code, "resource points at an unsupported digest");
                return Ok(Followed::Outcome(GetOutcome::DecodeFailure(
                    DecodeFailure::Unsupported { code },
                )));
            }
            Err(e) => {
                warn!(%name, error = %e, "malformed multihash in resource update");
                return Ok(Followed::Outcome(GetOutcome::DecodeFailure(
                    DecodeFailure::Malformed(e.to_string()),
                )));
            }
        };
        debug!(%name, root = %root.short_hex(), "following resource to manifest");
        match self.lookup_entry(root, path, cancel)? {
            Some(entry) => Ok(Followed::Entry(entry)),
            None => Ok(Followed::Outcome(GetOutcome::not_found(format!(
                "no entry for {path:?} under resource {name}"
            )))),
        }
    }

    // ---- Manifest edits ----

    /// Upsert `path` when `content_hash` is non-empty, delete it otherwise,
    /// and return the new root.
    pub async fn modify(
        &self,
        root: Key,
        path: &str,
        content_hash: &str,
        content_type: &str,
    ) -> ApiResult<Key> {
        let cancel = CancellationToken::new();
        let mut trie = ManifestTrie::load(Arc::clone(&self.store), root, &cancel)?;
        if content_hash.is_empty() {
            trie.delete_entry(path, &cancel)?;
        } else {
            trie.add_entry(ManifestEntry::new(path, content_hash, content_type), &cancel)?;
        }
        let key = trie.recalc_and_store().await?;
        debug!(root = %root.short_hex(), new_root = %key.short_hex(), %path, "modified manifest");
        Ok(key)
    }

    /// Store `content` as `dir/file` under the manifest `name` resolves to.
    /// Returns the file key and the new root.
    pub async fn add_file(
        &self,
        name: &str,
        dir: &str,
        file: &str,
        content: &[u8],
    ) -> ApiResult<(Key, Key)> {
        let (_, root) = self.resolve_name(name).await?;
        let path = file_path(dir, file);
        let entry = self.file_entry(&path, file, content.len());

        let mut writer = self.new_manifest_writer(root, self.config.encrypt)?;
        let key = writer.add_entry(content, entry)?;
        let new_root = writer.store().await?;
        info!(%name, %path, key = %key.short_hex(), root = %new_root.short_hex(), "added file");
        Ok((key, new_root))
    }

    /// Remove `dir/file` from the manifest `name` resolves to and return the
    /// new root.
    pub async fn remove_file(&self, name: &str, dir: &str, file: &str) -> ApiResult<Key> {
        let (_, root) = self.resolve_name(name).await?;
        let path = file_path(dir, file);

        let mut writer = self.new_manifest_writer(root, self.config.encrypt)?;
        if !writer.remove_entry(&path)? {
            debug!(%name, %path, "nothing to remove");
        }
        let new_root = writer.store().await?;
        info!(%name, %path, root = %new_root.short_hex(), "removed file");
        Ok(new_root)
    }

    /// Write `add_size` bytes of `content` at `offset` into the file stored
    /// under `old_key`, replacing `dir/file`.
    ///
    /// Bytes before `offset` and after `offset + add_size` (up to
    /// `existing_size`) come from the old content; the file is never shorter
    /// than `existing_size`. Returns the file key and the new root.
    #[allow(clippy::too_many_arguments)]
    pub async fn append_file(
        &self,
        name: &str,
        dir: &str,
        file: &str,
        existing_size: u64,
        content: &[u8],
        old_key: Key,
        offset: u64,
        add_size: u64,
    ) -> ApiResult<(Key, Key)> {
        let existing = to_len(existing_size, "existing_size")?;
        let offset = to_len(offset, "offset")?;
        let add = to_len(add_size, "add_size")?;
        if add > content.len() {
            return Err(ApiError::InvalidArgument(format!(
                "add_size {add} exceeds the {} bytes supplied",
                content.len()
            )));
        }
        let end = offset
            .checked_add(add)
            .ok_or_else(|| ApiError::InvalidArgument("offset + add_size overflows".into()))?;

        let mut buf = vec![0u8; end.max(existing)];
        let (mut old, _) = retrieve(&self.store, old_key)?;
        if offset > 0 {
            old.read_at(0, &mut buf[..offset])?;
        }
        buf[offset..end].copy_from_slice(&content[..add]);
        if existing > end {
            old.read_at(end as u64, &mut buf[end..existing])?;
        }

        let (_, root) = self.resolve_name(name).await?;
        let path = file_path(dir, file);
        let entry = self.file_entry(&path, file, buf.len());

        let mut writer = self.new_manifest_writer(root, self.config.encrypt)?;
        writer.remove_entry(&path)?;
        let key = writer.add_entry(&buf, entry)?;
        let new_root = writer.store().await?;
        info!(%name, %path, size = buf.len(), key = %key.short_hex(), root = %new_root.short_hex(), "appended to file");
        Ok((key, new_root))
    }

    fn file_entry(&self, path: &str, file: &str, size: usize) -> ManifestEntry {
        let content_type = mime_guess::from_path(file)
            .first_raw()
            .map(str::to_string)
            .unwrap_or_else(|| self.config.default_content_type.clone());
        ManifestEntry::new(path, "", content_type)
            .with_mode(FILE_MODE)
            .with_size(size as u64)
            .with_mod_time(Utc::now())
    }

    /// Every leaf under the address `name` (which may carry a path), keyed
    /// by its path relative to that prefix. Returns the resolved root too.
    pub async fn build_directory_tree(
        &self,
        name: &str,
    ) -> ApiResult<(Key, BTreeMap<String, ManifestEntry>)> {
        let (uri, root) = self.resolve_name(name).await?;
        let cancel = CancellationToken::new();
        let mut trie = ManifestTrie::load(Arc::clone(&self.store), root, &cancel)?;
        let mut tree = BTreeMap::new();
        trie.list_with_prefix(uri.path(), &cancel, |entry, suffix| {
            tree.insert(suffix.to_string(), entry.clone());
        })?;
        debug!(%name, root = %root.short_hex(), entries = tree.len(), "built directory tree");
        Ok((root, tree))
    }

    /// Store a pathless manifest pointing at the resource `name` and return
    /// its key once written.
    pub async fn put_resource_manifest(&self, name: &str) -> ApiResult<Key> {
        let page = ManifestPage::single(ManifestEntry::resource_pointer(name));
        let (key, wait) = self.store_page(&page, false)?;
        wait.wait().await?;
        debug!(%name, key = %key.short_hex(), "stored resource manifest");
        Ok(key)
    }

    pub fn new_manifest_writer(&self, root: Key, encrypt: bool) -> ApiResult<ManifestWriter> {
        Ok(ManifestWriter::open(Arc::clone(&self.store), root, encrypt)?)
    }

    // ---- Resources ----

    /// Look up an update and return its key and data.
    ///
    /// A non-zero `version` selects that exact update and needs a `period`;
    /// a `period` alone selects its latest version; neither selects the
    /// latest update overall.
    pub async fn resource_lookup(
        &self,
        ctx: &Context,
        name: &str,
        period: u32,
        version: u32,
        params: &ResourceLookupParams,
    ) -> ApiResult<(Key, Vec<u8>)> {
        if version != 0 {
            if period == 0 {
                return Err(ResourceError::InvalidValue(
                    "a version lookup needs a period".into(),
                )
                .into());
            }
            self.resources
                .lookup_by_period_and_version(ctx, name, period, version, params)
                .await?;
        } else if period != 0 {
            self.resources
                .lookup_by_period(ctx, name, period, params)
                .await?;
        } else {
            self.resources.lookup_latest(ctx, name, params).await?;
        }
        Ok(self.resources.get_content(name)?)
    }

    /// Create a resource and return its name hash.
    pub async fn resource_create(&self, ctx: &Context, name: &str, frequency: u64) -> ApiResult<Key> {
        let resource = self.resources.new_resource(ctx, name, frequency).await?;
        info!(%name, frequency, start = resource.start_block, "created resource");
        Ok(resource.name_hash)
    }

    /// Publish raw data. Returns the update key, period and version.
    pub async fn resource_update(
        &self,
        ctx: &Context,
        name: &str,
        data: &[u8],
    ) -> ApiResult<(Key, u32, u32)> {
        let key = self.resources.update(ctx, name, data).await?;
        self.published(name, key)
    }

    /// Publish a multihash record. Returns the update key, period and version.
    pub async fn resource_update_multihash(
        &self,
        ctx: &Context,
        name: &str,
        data: &[u8],
    ) -> ApiResult<(Key, u32, u32)> {
        let key = self.resources.update_multihash(ctx, name, data).await?;
        self.published(name, key)
    }

    fn published(&self, name: &str, key: Key) -> ApiResult<(Key, u32, u32)> {
        let period = self.resources.last_period(name)?;
        let version = self.resources.last_version(name)?;
        Ok((key, period, version))
    }

    pub fn resource_hash_size(&self) -> usize {
        self.resources.hash_size()
    }

    pub fn resource_is_validated(&self) -> bool {
        self.resources.is_validated()
    }
}

impl std::fmt::Debug for Api {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Api")
            .field("resolver", &self.resolver.is_some())
            .field("config", &self.config)
            .finish()
    }
}

/// A failed resource lookup while reading a path is a miss unless the
/// request itself ended or the store failed.
fn resource_miss(name: &str, err: ResourceError) -> ApiResult<Followed> {
    match err {
        ResourceError::Context(ctx) => Err(ctx.into()),
        ResourceError::Store(e) if !matches!(e, StoreError::NotFound(_)) => Err(e.into()),
        other => {
            debug!(%name, error = %other, "resource lookup missed");
            Ok(Followed::Outcome(GetOutcome::not_found(format!(
                "resource {name}: {other}"
            ))))
        }
    }
}

/// `dir/file`, with one leading `/` dropped from `dir`.
fn file_path(dir: &str, file: &str) -> String {
    let dir = dir.strip_prefix('/').unwrap_or(dir).trim_end_matches('/');
    if dir.is_empty() {
        file.to_string()
    } else {
        format!("{dir}/{file}")
    }
}

fn to_len(value: u64, what: &str) -> ApiResult<usize> {
    usize::try_from(value).map_err(|_| ApiError::InvalidArgument(format!("{what} {value} is too large")))
}
