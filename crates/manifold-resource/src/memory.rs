//! In-memory resource handler.
//!
//! Updates are written to the content store as resource blocks; the handler
//! keeps only an index of which block holds which `(period, version)`.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use manifold_crypto::{name_hash, Multihash};
use manifold_store::{ContentStore, ObjectKind, StoredObject};
use manifold_types::key::KEY_LENGTH;
use manifold_types::{Address, Context, Key};
use tokio::sync::Mutex;
use tracing::{debug, trace};

use crate::error::{ResourceError, ResourceResult};
use crate::handler::{period_at, Resource, ResourceHandler, ResourceLookupParams};
use crate::update::ResourceUpdate;
use crate::validator::OwnerValidator;

/// Largest update payload accepted by default.
pub const DEFAULT_MAX_UPDATE_SIZE: usize = 4096;

struct Cached {
    period: u32,
    version: u32,
    multihash: bool,
    key: Key,
    data: Vec<u8>,
}

struct ResourceState {
    name_hash: [u8; 32],
    start_block: u64,
    frequency: u64,
    updates: BTreeMap<(u32, u32), Key>,
    cached: Option<Cached>,
}

impl ResourceState {
    fn latest_version(&self, period: u32) -> Option<(u32, Key)> {
        self.updates
            .range((period, 0)..=(period, u32::MAX))
            .next_back()
            .map(|(&(_, version), &key)| (version, key))
    }

    fn snapshot(&self, name: &str) -> Resource {
        let cached = self.cached.as_ref();
        Resource {
            name: name.to_string(),
            name_hash: Key::from_hash(self.name_hash),
            start_block: self.start_block,
            frequency: self.frequency,
            period: cached.map_or(0, |c| c.period),
            version: cached.map_or(0, |c| c.version),
            multihash: cached.is_some_and(|c| c.multihash),
            update_key: cached.map(|c| c.key),
        }
    }
}

/// A [`ResourceHandler`] keeping its index in memory and its updates in a
/// content store.
///
/// The current block height is set by the embedder. With a validator
/// configured, creation and updates require the signer to own the name, and
/// creation requires the registry to serve a header at the current height.
pub struct InMemoryResourceHandler {
    store: Arc<dyn ContentStore>,
    validator: Option<(Arc<dyn OwnerValidator>, Address)>,
    height: AtomicU64,
    max_update_size: usize,
    resources: RwLock<HashMap<String, ResourceState>>,
    writes: Mutex<()>,
}

impl InMemoryResourceHandler {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self {
            store,
            validator: None,
            height: AtomicU64::new(0),
            max_update_size: DEFAULT_MAX_UPDATE_SIZE,
            resources: RwLock::new(HashMap::new()),
            writes: Mutex::new(()),
        }
    }

    /// Check ownership of every write against `validator`, signing as `signer`.
    pub fn with_validator(mut self, validator: Arc<dyn OwnerValidator>, signer: Address) -> Self {
        self.validator = Some((validator, signer));
        self
    }

    pub fn with_max_update_size(mut self, max: usize) -> Self {
        self.max_update_size = max;
        self
    }

    pub fn block_height(&self) -> u64 {
        self.height.load(Ordering::SeqCst)
    }

    pub fn set_block_height(&self, height: u64) {
        self.height.store(height, Ordering::SeqCst);
    }

    /// Move the block height forward by `blocks`; returns the new height.
    pub fn advance_blocks(&self, blocks: u64) -> u64 {
        self.height.fetch_add(blocks, Ordering::SeqCst) + blocks
    }

    /// Snapshot of `name` as of its cached update.
    pub fn resource(&self, name: &str) -> ResourceResult<Resource> {
        let resources = self.resources.read().expect("lock poisoned");
        let state = resources.get(name).ok_or_else(|| not_found(name))?;
        Ok(state.snapshot(name))
    }

    async fn check_owner(&self, name: &str) -> ResourceResult<()> {
        if let Some((validator, signer)) = &self.validator {
            if !validator.validate_owner(name, signer).await? {
                return Err(ResourceError::Unauthorized {
                    name: name.to_string(),
                });
            }
        }
        Ok(())
    }

    async fn lookup(
        &self,
        ctx: &Context,
        name: &str,
        period: u32,
        version: Option<u32>,
        params: &ResourceLookupParams,
    ) -> ResourceResult<Resource> {
        ctx.check()?;
        let found = {
            let resources = self.resources.read().expect("lock poisoned");
            let state = resources.get(name).ok_or_else(|| not_found(name))?;
            match version {
                Some(version) => state
                    .updates
                    .get(&(period, version))
                    .map(|&key| (period, version, key)),
                None => walk_back(ctx, state, period, params)?,
            }
        };
        let (period, version, key) = found.ok_or_else(|| ResourceError::NoUpdate {
            name: name.to_string(),
            period,
        })?;

        let update = ResourceUpdate::load(self.store.as_ref(), key)?;
        trace!(%name, period, version, key = %key.short_hex(), "resource lookup hit");

        let mut resources = self.resources.write().expect("lock poisoned");
        let state = resources.get_mut(name).ok_or_else(|| not_found(name))?;
        state.cached = Some(Cached {
            period,
            version,
            multihash: update.multihash,
            key,
            data: update.data,
        });
        Ok(state.snapshot(name))
    }

    async fn publish(
        &self,
        ctx: &Context,
        name: &str,
        data: &[u8],
        multihash: bool,
    ) -> ResourceResult<Key> {
        ctx.check()?;
        if data.len() > self.max_update_size {
            return Err(ResourceError::DataTooLarge {
                size: data.len(),
                max: self.max_update_size,
            });
        }
        if multihash {
            Multihash::decode(data)?;
        }

        let _writing = self.writes.lock().await;
        let (name_hash, period, version) = {
            let resources = self.resources.read().expect("lock poisoned");
            let state = resources.get(name).ok_or_else(|| not_found(name))?;
            let period = period_at(state.start_block, state.frequency, self.block_height());
            if period == 0 {
                return Err(ResourceError::InvalidValue(
                    "current block precedes the resource start block".into(),
                ));
            }
            let version = match state.latest_version(period) {
                Some((last, _)) => last.checked_add(1).ok_or_else(|| {
                    ResourceError::InvalidValue(format!("period {period} has no versions left"))
                })?,
                None => 1,
            };
            (state.name_hash, period, version)
        };
        self.check_owner(name).await?;

        let update = ResourceUpdate {
            name_hash,
            period,
            version,
            multihash,
            data: data.to_vec(),
        };
        let object = StoredObject::new(ObjectKind::Resource, update.encode()?);
        let (key, wait) = self.store.store(object, false)?;
        ctx.run(wait.wait()).await??;

        let mut resources = self.resources.write().expect("lock poisoned");
        let state = resources.get_mut(name).ok_or_else(|| not_found(name))?;
        state.updates.insert((period, version), key);
        state.cached = Some(Cached {
            period,
            version,
            multihash,
            key,
            data: update.data,
        });
        debug!(%name, period, version, multihash, key = %key.short_hex(), "published resource update");
        Ok(key)
    }

    fn with_cached<T>(&self, name: &str, f: impl FnOnce(&Cached) -> T) -> ResourceResult<T> {
        let resources = self.resources.read().expect("lock poisoned");
        let state = resources.get(name).ok_or_else(|| not_found(name))?;
        let cached = state.cached.as_ref().ok_or_else(|| ResourceError::NotSynced {
            name: name.to_string(),
        })?;
        Ok(f(cached))
    }
}

fn not_found(name: &str) -> ResourceError {
    ResourceError::NotFound {
        name: name.to_string(),
    }
}

/// Newest update at or before `period`. With `params.max_periods` set, an
/// update `max_periods` or more periods back is out of reach.
fn walk_back(
    ctx: &Context,
    state: &ResourceState,
    period: u32,
    params: &ResourceLookupParams,
) -> ResourceResult<Option<(u32, u32, Key)>> {
    ctx.check()?;
    let Some((&(found, version), &key)) = state.updates.range(..=(period, u32::MAX)).next_back()
    else {
        return Ok(None);
    };
    if params.max_periods > 0 && period - found >= params.max_periods {
        return Err(ResourceError::LookupLimit {
            max: params.max_periods,
        });
    }
    Ok(Some((found, version, key)))
}

#[async_trait]
impl ResourceHandler for InMemoryResourceHandler {
    async fn lookup_latest(
        &self,
        ctx: &Context,
        name: &str,
        params: &ResourceLookupParams,
    ) -> ResourceResult<Resource> {
        let current = self.resource(name)?.period_at(self.block_height());
        self.lookup(ctx, name, current, None, params).await
    }

    async fn lookup_by_period(
        &self,
        ctx: &Context,
        name: &str,
        period: u32,
        params: &ResourceLookupParams,
    ) -> ResourceResult<Resource> {
        if period == 0 {
            return Err(ResourceError::InvalidValue("period must be at least 1".into()));
        }
        self.lookup(ctx, name, period, None, params).await
    }

    async fn lookup_by_period_and_version(
        &self,
        ctx: &Context,
        name: &str,
        period: u32,
        version: u32,
        params: &ResourceLookupParams,
    ) -> ResourceResult<Resource> {
        if period == 0 || version == 0 {
            return Err(ResourceError::InvalidValue(
                "period and version must be at least 1".into(),
            ));
        }
        self.lookup(ctx, name, period, Some(version), params).await
    }

    fn get_content(&self, name: &str) -> ResourceResult<(Key, Vec<u8>)> {
        self.with_cached(name, |c| (c.key, c.data.clone()))
    }

    async fn new_resource(&self, ctx: &Context, name: &str, frequency: u64) -> ResourceResult<Resource> {
        ctx.check()?;
        if name.is_empty() {
            return Err(ResourceError::InvalidValue("resource name is empty".into()));
        }
        if frequency == 0 {
            return Err(ResourceError::InvalidValue("frequency must be at least 1".into()));
        }

        let _writing = self.writes.lock().await;
        if self.resources.read().expect("lock poisoned").contains_key(name) {
            return Err(ResourceError::AlreadyExists {
                name: name.to_string(),
            });
        }
        let start_block = self.block_height();
        if let Some((validator, _)) = &self.validator {
            validator.header_by_number(ctx, name, start_block).await?;
        }
        self.check_owner(name).await?;

        let state = ResourceState {
            name_hash: name_hash(name),
            start_block,
            frequency,
            updates: BTreeMap::new(),
            cached: None,
        };
        let resource = state.snapshot(name);
        self.resources
            .write()
            .expect("lock poisoned")
            .insert(name.to_string(), state);
        debug!(%name, start_block, frequency, "created resource");
        Ok(resource)
    }

    async fn update(&self, ctx: &Context, name: &str, data: &[u8]) -> ResourceResult<Key> {
        self.publish(ctx, name, data, false).await
    }

    async fn update_multihash(&self, ctx: &Context, name: &str, data: &[u8]) -> ResourceResult<Key> {
        self.publish(ctx, name, data, true).await
    }

    fn last_period(&self, name: &str) -> ResourceResult<u32> {
        self.with_cached(name, |c| c.period)
    }

    fn last_version(&self, name: &str) -> ResourceResult<u32> {
        self.with_cached(name, |c| c.version)
    }

    fn hash_size(&self) -> usize {
        KEY_LENGTH
    }

    fn is_validated(&self) -> bool {
        self.validator.is_some()
    }
}

impl std::fmt::Debug for InMemoryResourceHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.resources.read().expect("lock poisoned").len();
        f.debug_struct("InMemoryResourceHandler")
            .field("resources", &count)
            .field("height", &self.block_height())
            .field("validated", &self.is_validated())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use manifold_crypto::KECCAK_256;
    use manifold_resolver::{MultiResolver, StaticResolver};
    use manifold_store::{DeferredContentStore, InMemoryContentStore};
    use manifold_types::{ContextError, Header};
    use std::time::Duration;

    fn handler() -> InMemoryResourceHandler {
        let handler = InMemoryResourceHandler::new(Arc::new(InMemoryContentStore::new()));
        handler.set_block_height(100);
        handler
    }

    fn any() -> ResourceLookupParams {
        ResourceLookupParams::default()
    }

    // --- create and update ---

    #[tokio::test]
    async fn update_then_lookup_latest() {
        let h = handler();
        let ctx = Context::background();
        let created = h.new_resource(&ctx, "site.eth", 10).await.unwrap();
        assert_eq!(created.name_hash, Key::from_hash(name_hash("site.eth")));
        assert_eq!(created.period, 0);

        let key = h.update(&ctx, "site.eth", b"v1").await.unwrap();
        let found = h.lookup_latest(&ctx, "site.eth", &any()).await.unwrap();
        assert_eq!((found.period, found.version), (1, 1));
        assert_eq!(found.update_key, Some(key));
        assert!(!found.multihash);
        assert_eq!(h.get_content("site.eth").unwrap(), (key, b"v1".to_vec()));
    }

    #[tokio::test]
    async fn versions_count_within_a_period() {
        let h = handler();
        let ctx = Context::background();
        h.new_resource(&ctx, "r", 10).await.unwrap();
        h.update(&ctx, "r", b"a").await.unwrap();
        h.update(&ctx, "r", b"b").await.unwrap();
        assert_eq!((h.last_period("r").unwrap(), h.last_version("r").unwrap()), (1, 2));

        h.advance_blocks(10);
        h.update(&ctx, "r", b"c").await.unwrap();
        assert_eq!((h.last_period("r").unwrap(), h.last_version("r").unwrap()), (2, 1));
    }

    #[tokio::test]
    async fn create_rejects_bad_input() {
        let h = handler();
        let ctx = Context::background();
        assert!(matches!(h.new_resource(&ctx, "", 1).await, Err(ResourceError::InvalidValue(_))));
        assert!(matches!(h.new_resource(&ctx, "r", 0).await, Err(ResourceError::InvalidValue(_))));
        h.new_resource(&ctx, "r", 1).await.unwrap();
        assert!(matches!(
            h.new_resource(&ctx, "r", 1).await,
            Err(ResourceError::AlreadyExists { .. })
        ));
    }

    #[tokio::test]
    async fn update_unknown_resource_fails() {
        let h = handler();
        let err = h.update(&Context::background(), "ghost", b"x").await.unwrap_err();
        assert!(matches!(err, ResourceError::NotFound { .. }));
    }

    #[tokio::test]
    async fn oversized_update_is_rejected() {
        let h = handler().with_max_update_size(4);
        let ctx = Context::background();
        h.new_resource(&ctx, "r", 1).await.unwrap();
        let err = h.update(&ctx, "r", b"too long").await.unwrap_err();
        assert!(matches!(err, ResourceError::DataTooLarge { size: 8, max: 4 }));
    }

    // --- multihash ---

    #[tokio::test]
    async fn multihash_updates_are_validated() {
        let h = handler();
        let ctx = Context::background();
        h.new_resource(&ctx, "r", 1).await.unwrap();
        assert!(matches!(
            h.update_multihash(&ctx, "r", &[0x1e, 0x20, 1]).await,
            Err(ResourceError::InvalidMultihash(_))
        ));

        // Any well-formed record is accepted on write.
        let record = Multihash::new(KECCAK_256, vec![0u8; 32]).encode();
        h.update_multihash(&ctx, "r", &record).await.unwrap();
        let found = h.lookup_latest(&ctx, "r", &any()).await.unwrap();
        assert!(found.multihash);
        assert_eq!(h.get_content("r").unwrap().1, record);
    }

    // --- lookups ---

    #[tokio::test]
    async fn historical_lookups() {
        let h = handler();
        let ctx = Context::background();
        h.new_resource(&ctx, "r", 10).await.unwrap();
        h.update(&ctx, "r", b"p1v1").await.unwrap();
        h.update(&ctx, "r", b"p1v2").await.unwrap();
        h.advance_blocks(30);
        h.update(&ctx, "r", b"p4v1").await.unwrap();

        h.lookup_by_period(&ctx, "r", 3, &any()).await.unwrap();
        assert_eq!(h.get_content("r").unwrap().1, b"p1v2");

        h.lookup_by_period_and_version(&ctx, "r", 1, 1, &any()).await.unwrap();
        assert_eq!(h.get_content("r").unwrap().1, b"p1v1");

        let missing = h.lookup_by_period_and_version(&ctx, "r", 2, 1, &any()).await;
        assert!(matches!(missing, Err(ResourceError::NoUpdate { period: 2, .. })));

        h.lookup_latest(&ctx, "r", &any()).await.unwrap();
        assert_eq!(h.get_content("r").unwrap().1, b"p4v1");
    }

    #[tokio::test]
    async fn lookup_respects_period_limit() {
        let h = handler();
        let ctx = Context::background();
        h.new_resource(&ctx, "r", 1).await.unwrap();
        h.update(&ctx, "r", b"old").await.unwrap();
        h.advance_blocks(5);

        let err = h
            .lookup_latest(&ctx, "r", &ResourceLookupParams::new(3))
            .await
            .unwrap_err();
        assert!(matches!(err, ResourceError::LookupLimit { max: 3 }));
        h.lookup_latest(&ctx, "r", &ResourceLookupParams::new(6)).await.unwrap();
    }

    #[tokio::test]
    async fn old_update_is_found_without_scanning_periods() {
        let h = handler();
        let ctx = Context::with_timeout(Duration::from_secs(2));
        h.new_resource(&ctx, "r", 1).await.unwrap();
        h.update(&ctx, "r", b"first").await.unwrap();
        h.set_block_height(4_000_000_000);

        let started = std::time::Instant::now();
        let found = h.lookup_latest(&ctx, "r", &any()).await.unwrap();
        assert!(started.elapsed() < Duration::from_millis(500));
        assert_eq!((found.period, found.version), (1, 1));
        assert_eq!(h.get_content("r").unwrap().1, b"first");

        let err = h
            .lookup_latest(&ctx, "r", &ResourceLookupParams::new(1_000))
            .await
            .unwrap_err();
        assert!(matches!(err, ResourceError::LookupLimit { max: 1_000 }));
    }

    #[tokio::test]
    async fn content_requires_sync() {
        let h = handler();
        let ctx = Context::background();
        h.new_resource(&ctx, "r", 1).await.unwrap();
        assert!(matches!(h.get_content("r"), Err(ResourceError::NotSynced { .. })));
        assert!(matches!(
            h.lookup_latest(&ctx, "r", &any()).await,
            Err(ResourceError::NoUpdate { .. })
        ));
        assert!(matches!(
            h.lookup_by_period(&ctx, "r", 0, &any()).await,
            Err(ResourceError::InvalidValue(_))
        ));
    }

    // --- context ---

    #[tokio::test]
    async fn cancelled_context_fails_fast() {
        let h = handler();
        let ctx = Context::background();
        h.new_resource(&ctx, "r", 1).await.unwrap();
        ctx.cancel();
        let err = h.update(&ctx, "r", b"x").await.unwrap_err();
        assert!(matches!(err, ResourceError::Context(ContextError::Cancelled)));
    }

    #[tokio::test]
    async fn stalled_write_hits_deadline() {
        let store = Arc::new(DeferredContentStore::new());
        let h = InMemoryResourceHandler::new(Arc::clone(&store) as Arc<dyn ContentStore>);
        h.new_resource(&Context::background(), "r", 1).await.unwrap();

        let ctx = Context::with_timeout(Duration::from_millis(20));
        let err = h.update(&ctx, "r", b"x").await.unwrap_err();
        assert!(matches!(err, ResourceError::Context(ContextError::DeadlineExceeded)));
        assert!(matches!(h.get_content("r"), Err(ResourceError::NotSynced { .. })));
    }

    // --- validation ---

    fn validated(owner: Address, signer: Address) -> InMemoryResourceHandler {
        let registry = Arc::new(StaticResolver::new());
        registry.set_owner("site.eth", owner);
        registry.push_header(Header::new(100, Key::from_hash([1; 32]), Key::null(), 0));
        let resolver = MultiResolver::builder().with_resolver(registry, "").build().unwrap();
        let h = handler().with_validator(Arc::new(resolver), signer);
        assert!(h.is_validated());
        h
    }

    #[tokio::test]
    async fn owner_may_write() {
        let owner = Address::new([1; 20]);
        let h = validated(owner, owner);
        let ctx = Context::background();
        h.new_resource(&ctx, "site.eth", 1).await.unwrap();
        h.update(&ctx, "site.eth", b"ok").await.unwrap();
    }

    #[tokio::test]
    async fn stranger_may_not_write() {
        let h = validated(Address::new([1; 20]), Address::new([2; 20]));
        let err = h.new_resource(&Context::background(), "site.eth", 1).await.unwrap_err();
        assert!(matches!(err, ResourceError::Unauthorized { .. }));
    }

    #[tokio::test]
    async fn creation_needs_registry_header() {
        let owner = Address::new([1; 20]);
        let h = validated(owner, owner);
        h.set_block_height(500);
        let err = h.new_resource(&Context::background(), "site.eth", 1).await.unwrap_err();
        assert!(matches!(err, ResourceError::Resolver(_)));
    }

    #[test]
    fn hash_size_is_key_length() {
        assert_eq!(handler().hash_size(), 32);
        assert!(!handler().is_validated());
    }
}
