use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use manifold_resolver::{MultiResolver, StaticResolver};
use manifold_types::Key;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ApiError, ApiResult};

/// A static `name → hex key` table.
pub type NameTable = BTreeMap<String, String>;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Encrypt content written by file edits.
    pub encrypt: bool,
    /// Seconds allowed for a resource lookup made while reading a path.
    pub resource_timeout: u64,
    /// Periods a lookup may walk back; `0` means unbounded.
    pub resource_max_periods: u32,
    /// Content type for files whose extension has no known type.
    pub default_content_type: String,
    /// Resolver chains by TLD (`""` is the default chain). Each table becomes
    /// one backend, queried in order.
    pub resolvers: BTreeMap<String, Vec<NameTable>>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            encrypt: false,
            resource_timeout: 30,
            resource_max_periods: 0,
            default_content_type: "application/octet-stream".to_string(),
            resolvers: BTreeMap::new(),
        }
    }
}

impl ApiConfig {
    pub fn from_toml_str(s: &str) -> ApiResult<Self> {
        toml::from_str(s).map_err(|e| ApiError::Config(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> ApiResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ApiError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> ApiResult<String> {
        toml::to_string(self).map_err(|e| ApiError::Config(e.to_string()))
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_secs(self.resource_timeout)
    }

    /// Build the configured resolver chains, or `None` if there are none.
    pub fn build_resolver(&self) -> ApiResult<Option<MultiResolver>> {
        if self.resolvers.is_empty() {
            return Ok(None);
        }
        let mut builder = MultiResolver::builder();
        for (tld, tables) in &self.resolvers {
            for table in tables {
                let mut names = Vec::with_capacity(table.len());
                for (name, hex) in table {
                    let key = Key::from_hex(hex)
                        .map_err(|e| ApiError::Config(format!("resolver entry {name:?}: {e}")))?;
                    names.push((name.clone(), key));
                }
                debug!(%tld, names = names.len(), "configured static resolver");
                builder = builder.with_resolver(Arc::new(StaticResolver::with_names(names)), tld);
            }
        }
        builder
            .build()
            .map(Some)
            .map_err(|e| ApiError::Config(e.to_string()))
    }
}
