//! Address parsing and classification.
//!
//! A reference has the text form `scheme:/[/]address[/path]`. The scheme
//! decides how the address is treated:
//!
//! - `mfd` — a resolvable name or a content key, served through its manifest
//! - `mfd-raw` — a content key served as raw bytes
//! - `mfd-immutable` — a content key that must never go through name resolution
//! - `mfd-list` — a manifest listing view
//! - `mfd-hash` — resolves the address and returns only the key
//! - `mfd-resource` — a mutable resource name
//!
//! The address of a name carries an optional dotted suffix (`site.eth`) that
//! selects the resolver chain for that TLD.

use std::fmt;
use std::str::FromStr;

use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::TypeError;
use crate::key::Key;

/// The kind of address a [`Uri`] carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scheme {
    Manifest,
    Raw,
    Immutable,
    List,
    Hash,
    Resource,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manifest => "mfd",
            Self::Raw => "mfd-raw",
            Self::Immutable => "mfd-immutable",
            Self::List => "mfd-list",
            Self::Hash => "mfd-hash",
            Self::Resource => "mfd-resource",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scheme {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mfd" => Ok(Self::Manifest),
            "mfd-raw" => Ok(Self::Raw),
            "mfd-immutable" => Ok(Self::Immutable),
            "mfd-list" => Ok(Self::List),
            "mfd-hash" => Ok(Self::Hash),
            "mfd-resource" => Ok(Self::Resource),
            other => Err(TypeError::UnknownScheme(other.to_string())),
        }
    }
}

/// A parsed reference: scheme, address and path.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Uri {
    scheme: Scheme,
    address: String,
    path: String,
}

impl Uri {
    pub fn new(scheme: Scheme, address: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            scheme,
            address: address.into(),
            path: path.into(),
        }
    }

    /// Parse `scheme:/address/path` or `scheme://address/path`.
    ///
    /// The path is percent-decoded. An empty address is allowed here; callers
    /// that need one must check [`Uri::address`].
    pub fn parse(raw: &str) -> Result<Self, TypeError> {
        let malformed = |reason: String| TypeError::MalformedAddress {
            input: raw.to_string(),
            reason,
        };
        let url = Url::parse(raw).map_err(|e| malformed(e.to_string()))?;
        let scheme: Scheme = url.scheme().parse()?;

        // `scheme://address/path`: the address landed in the host slot.
        if let Some(host) = url.host_str().filter(|h| !h.is_empty()) {
            let address = decode(host).map_err(malformed)?;
            let path = decode(url.path()).map_err(malformed)?;
            return Ok(Self::new(scheme, address, path.trim_start_matches('/')));
        }

        // `scheme:/address/path`: split the address off the raw path.
        let full = decode(url.path()).map_err(malformed)?;
        let trimmed = full.trim_start_matches('/');
        let (address, path) = trimmed.split_once('/').unwrap_or((trimmed, ""));
        Ok(Self::new(scheme, address, path))
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Addresses under this scheme are keys and are never resolved by name.
    pub fn is_immutable(&self) -> bool {
        self.scheme == Scheme::Immutable
    }

    pub fn is_raw(&self) -> bool {
        self.scheme == Scheme::Raw
    }

    pub fn is_list(&self) -> bool {
        self.scheme == Scheme::List
    }

    pub fn is_hash(&self) -> bool {
        self.scheme == Scheme::Hash
    }

    pub fn is_resource(&self) -> bool {
        self.scheme == Scheme::Resource
    }

    /// The address as a content key, if it is one.
    pub fn as_key(&self) -> Option<Key> {
        if !Key::is_hex_key(&self.address) {
            return None;
        }
        Key::from_hex(&self.address).ok()
    }

    /// The TLD token that selects a resolver chain: the text after the last
    /// dot of the address, or `""` when there is none.
    pub fn tld(&self) -> &str {
        tld_of(&self.address)
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:/{}", self.scheme, self.address)?;
        if !self.path.is_empty() {
            write!(f, "/{}", self.path)?;
        }
        Ok(())
    }
}

impl FromStr for Uri {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// The TLD token of a name: `"site.eth"` → `"eth"`, `"site"` → `""`.
pub fn tld_of(name: &str) -> &str {
    let last = name.rsplit('/').next().unwrap_or(name);
    match last.rsplit_once('.') {
        Some((_, tld)) => tld,
        None => "",
    }
}

fn decode(s: &str) -> Result<String, String> {
    percent_decode_str(s)
        .decode_utf8()
        .map(|cow| cow.into_owned())
        .map_err(|e| e.to_string())
}
