//! TLD-selected resolver chains.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use manifold_types::uri::tld_of;
use manifold_types::{Address, Context, Header, Key};
use tracing::{debug, trace};

use crate::error::{ResolverError, ResolverResult};
use crate::names::validate_tld;
use crate::traits::{NameResolver, ResolveValidator};

/// Hash function turning a name into the node used for ownership queries.
pub type NameHashFn = Arc<dyn Fn(&str) -> [u8; 32] + Send + Sync>;

type Chain = Vec<Arc<dyn ResolveValidator>>;

/// Resolver chains keyed by TLD token.
///
/// The chain for a name is the one registered for its exact TLD if any,
/// otherwise the default (`""`) chain. A TLD-specific chain that fails does
/// not fall back to the default chain.
pub struct MultiResolver {
    chains: BTreeMap<String, Chain>,
    name_hash: NameHashFn,
}

impl MultiResolver {
    pub fn builder() -> MultiResolverBuilder {
        MultiResolverBuilder::default()
    }

    /// Registered TLD tokens, in order.
    pub fn tlds(&self) -> impl Iterator<Item = &str> {
        self.chains.keys().map(String::as_str)
    }

    /// Replace the name hash used by [`validate_owner`](Self::validate_owner).
    pub fn set_name_hash(&mut self, name_hash: NameHashFn) {
        self.name_hash = name_hash;
    }

    fn chain_for(&self, name: &str) -> ResolverResult<&Chain> {
        let tld = tld_of(name);
        if !tld.is_empty() {
            if let Some(chain) = self.chains.get(tld) {
                trace!(%name, %tld, backends = chain.len(), "selected tld chain");
                return Ok(chain);
            }
        }
        match self.chains.get("") {
            Some(chain) if !chain.is_empty() => Ok(chain),
            _ => Err(ResolverError::NoResolver {
                tld: tld.to_string(),
            }),
        }
    }

    /// Resolve `name` to a content key.
    ///
    /// Backends are tried in order; when all fail the last error is returned.
    pub async fn resolve(&self, name: &str) -> ResolverResult<Key> {
        let chain = self.chain_for(name)?;
        let mut last_err = None;
        for backend in chain {
            match backend.resolve(name).await {
                Ok(key) => {
                    debug!(%name, key = %key.short_hex(), "resolved name");
                    return Ok(key);
                }
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap_or_else(|| ResolverError::NoResolver {
            tld: tld_of(name).to_string(),
        }))
    }

    /// Check whether `address` owns `name`.
    ///
    /// The first backend that answers decides; earlier errors are discarded.
    pub async fn validate_owner(&self, name: &str, address: &Address) -> ResolverResult<bool> {
        let chain = self.chain_for(name)?;
        let node = (self.name_hash)(name);
        let mut last_err = None;
        for backend in chain {
            match backend.owner(node).await {
                Ok(owner) => return Ok(owner == *address),
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap_or_else(|| ResolverError::NoResolver {
            tld: tld_of(name).to_string(),
        }))
    }

    /// Registry header at `number`, served by the chain for `name`.
    pub async fn header_by_number(
        &self,
        ctx: &Context,
        name: &str,
        number: u64,
    ) -> ResolverResult<Header> {
        let chain = self.chain_for(name)?;
        let mut last_err = None;
        for backend in chain {
            match backend.header_by_number(ctx, number).await {
                Ok(header) => return Ok(header),
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap_or_else(|| ResolverError::NoResolver {
            tld: tld_of(name).to_string(),
        }))
    }
}

#[async_trait]
impl NameResolver for MultiResolver {
    async fn resolve(&self, name: &str) -> ResolverResult<Key> {
        MultiResolver::resolve(self, name).await
    }
}

impl fmt::Debug for MultiResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let chains: BTreeMap<&str, usize> = self
            .chains
            .iter()
            .map(|(tld, chain)| (tld.as_str(), chain.len()))
            .collect();
        f.debug_struct("MultiResolver").field("chains", &chains).finish()
    }
}

/// Builder for [`MultiResolver`].
pub struct MultiResolverBuilder {
    chains: BTreeMap<String, Chain>,
    name_hash: NameHashFn,
    error: Option<ResolverError>,
}

impl Default for MultiResolverBuilder {
    fn default() -> Self {
        Self {
            chains: BTreeMap::new(),
            name_hash: Arc::new(manifold_crypto::name_hash),
            error: None,
        }
    }
}

impl MultiResolverBuilder {
    /// Append `resolver` to the chain for `tld` (`""` for the default chain).
    pub fn with_resolver(mut self, resolver: Arc<dyn ResolveValidator>, tld: &str) -> Self {
        if let Err(e) = validate_tld(tld) {
            self.error.get_or_insert(e);
            return self;
        }
        self.chains.entry(tld.to_string()).or_default().push(resolver);
        self
    }

    pub fn with_name_hash<F>(mut self, name_hash: F) -> Self
    where
        F: Fn(&str) -> [u8; 32] + Send + Sync + 'static,
    {
        self.name_hash = Arc::new(name_hash);
        self
    }

    /// Finish the builder; fails if any registered TLD was invalid.
    pub fn build(self) -> ResolverResult<MultiResolver> {
        if let Some(e) = self.error {
            return Err(e);
        }
        Ok(MultiResolver {
            chains: self.chains,
            name_hash: self.name_hash,
        })
    }
}
