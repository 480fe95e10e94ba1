//! The resource collaborator interface.

use async_trait::async_trait;
use manifold_types::{Context, Key};

use crate::error::ResourceResult;

/// Bounds for a lookup that walks back through periods.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResourceLookupParams {
    /// Maximum number of periods to examine; `0` means unbounded.
    pub max_periods: u32,
}

impl ResourceLookupParams {
    pub fn new(max_periods: u32) -> Self {
        Self { max_periods }
    }
}

/// Snapshot of a resource after a lookup, update or creation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resource {
    pub name: String,
    pub name_hash: Key,
    /// Block height at which the resource was created.
    pub start_block: u64,
    /// Update frequency in blocks.
    pub frequency: u64,
    /// Period of the update this snapshot describes; `0` before any update.
    pub period: u32,
    /// Version of that update within its period.
    pub version: u32,
    /// Whether that update's data is a multihash record.
    pub multihash: bool,
    /// Key of the update block, if there is one.
    pub update_key: Option<Key>,
}

impl Resource {
    /// Period that block `height` falls in. Heights before the start block
    /// are in period 0.
    pub fn period_at(&self, height: u64) -> u32 {
        period_at(self.start_block, self.frequency, height)
    }
}

pub(crate) fn period_at(start_block: u64, frequency: u64, height: u64) -> u32 {
    if height < start_block || frequency == 0 {
        return 0;
    }
    let period = (height - start_block) / frequency + 1;
    u32::try_from(period).unwrap_or(u32::MAX)
}

/// Mutable-resource collaborator.
///
/// Lookups cache the update they find; [`get_content`](Self::get_content),
/// [`last_period`](Self::last_period) and [`last_version`](Self::last_version)
/// report on that cached update.
#[async_trait]
pub trait ResourceHandler: Send + Sync {
    /// Latest update in the current period or, walking back, the most recent
    /// earlier period that has one.
    async fn lookup_latest(
        &self,
        ctx: &Context,
        name: &str,
        params: &ResourceLookupParams,
    ) -> ResourceResult<Resource>;

    /// Latest version in `period` or, walking back, an earlier period.
    async fn lookup_by_period(
        &self,
        ctx: &Context,
        name: &str,
        period: u32,
        params: &ResourceLookupParams,
    ) -> ResourceResult<Resource>;

    /// Exactly `version` of `period`.
    async fn lookup_by_period_and_version(
        &self,
        ctx: &Context,
        name: &str,
        period: u32,
        version: u32,
        params: &ResourceLookupParams,
    ) -> ResourceResult<Resource>;

    /// Key and data of the cached update.
    fn get_content(&self, name: &str) -> ResourceResult<(Key, Vec<u8>)>;

    /// Create a resource updated every `frequency` blocks.
    async fn new_resource(&self, ctx: &Context, name: &str, frequency: u64) -> ResourceResult<Resource>;

    /// Publish raw data as the next update.
    async fn update(&self, ctx: &Context, name: &str, data: &[u8]) -> ResourceResult<Key>;

    /// Publish a multihash record as the next update.
    async fn update_multihash(&self, ctx: &Context, name: &str, data: &[u8]) -> ResourceResult<Key>;

    fn last_period(&self, name: &str) -> ResourceResult<u32>;

    fn last_version(&self, name: &str) -> ResourceResult<u32>;

    /// Size in bytes of the hashes this handler produces.
    fn hash_size(&self) -> usize;

    /// Whether writes are checked against the name registry.
    fn is_validated(&self) -> bool;
}
