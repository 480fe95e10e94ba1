//! In-memory registry backend for embedding and tests.
//!
//! [`StaticResolver`] keeps names, owners and headers in `HashMap`s behind
//! `RwLock`s. It can be switched offline to simulate an unreachable registry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use manifold_crypto::name_hash;
use manifold_types::{Address, Context, Header, Key};
use tracing::trace;

use crate::error::{ResolverError, ResolverResult};
use crate::traits::{NameResolver, ResolveValidator};

/// An in-memory implementation of [`ResolveValidator`].
#[derive(Debug, Default)]
pub struct StaticResolver {
    names: RwLock<HashMap<String, Key>>,
    owners: RwLock<HashMap<[u8; 32], Address>>,
    headers: RwLock<HashMap<u64, Header>>,
    offline: AtomicBool,
}

impl StaticResolver {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend pre-populated with `name → key` records.
    pub fn with_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = (S, Key)>,
        S: Into<String>,
    {
        let resolver = Self::new();
        for (name, key) in names {
            resolver.register(name, key);
        }
        resolver
    }

    /// Record (or replace) the key for `name`.
    pub fn register(&self, name: impl Into<String>, key: Key) {
        let name = name.into();
        trace!(%name, key = %key.short_hex(), "registered name");
        self.names.write().expect("lock poisoned").insert(name, key);
    }

    /// Record the owner of `name`, keyed by its default name hash.
    pub fn set_owner(&self, name: &str, owner: Address) {
        self.set_owner_node(name_hash(name), owner);
    }

    /// Record the owner of an already-hashed name.
    pub fn set_owner_node(&self, node: [u8; 32], owner: Address) {
        self.owners.write().expect("lock poisoned").insert(node, owner);
    }

    /// Record a registry header.
    pub fn push_header(&self, header: Header) {
        self.headers
            .write()
            .expect("lock poisoned")
            .insert(header.number, header);
    }

    /// While offline every query fails with [`ResolverError::Backend`].
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn ensure_online(&self) -> ResolverResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(ResolverError::Backend("registry unreachable".into()));
        }
        Ok(())
    }

    fn lookup(&self, name: &str) -> ResolverResult<Key> {
        self.ensure_online()?;
        self.names
            .read()
            .expect("lock poisoned")
            .get(name)
            .copied()
            .ok_or_else(|| ResolverError::NotFound {
                name: name.to_string(),
            })
    }
}

#[async_trait]
impl ResolveValidator for StaticResolver {
    async fn resolve(&self, name: &str) -> ResolverResult<Key> {
        self.lookup(name)
    }

    async fn owner(&self, node: [u8; 32]) -> ResolverResult<Address> {
        self.ensure_online()?;
        self.owners
            .read()
            .expect("lock poisoned")
            .get(&node)
            .copied()
            .ok_or_else(|| ResolverError::OwnerNotFound {
                node: Key::from_hash(node).short_hex(),
            })
    }

    async fn header_by_number(&self, ctx: &Context, number: u64) -> ResolverResult<Header> {
        ctx.check()?;
        self.ensure_online()?;
        self.headers
            .read()
            .expect("lock poisoned")
            .get(&number)
            .cloned()
            .ok_or(ResolverError::HeaderNotFound { number })
    }
}

#[async_trait]
impl NameResolver for StaticResolver {
    async fn resolve(&self, name: &str) -> ResolverResult<Key> {
        self.lookup(name)
    }
}
