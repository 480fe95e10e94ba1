use manifold_types::Key;

/// Domain-separated BLAKE3 content hasher.
///
/// Each hasher carries a domain tag (e.g., `"mfd-chunk-v1"`,
/// `"mfd-manifest-v1"`) that is prepended to every hash computation. A content
/// block and a manifest page with identical bytes therefore get different keys.
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// Hasher for raw content blocks.
    pub const CHUNK: Self = Self {
        domain: "mfd-chunk-v1",
    };
    /// Hasher for manifest pages.
    pub const MANIFEST: Self = Self {
        domain: "mfd-manifest-v1",
    };
    /// Hasher for resource update blocks.
    pub const RESOURCE: Self = Self {
        domain: "mfd-resource-v1",
    };
    /// Hasher for name labels.
    pub const NAME: Self = Self {
        domain: "mfd-name-v1",
    };

    /// Create a hasher with a custom domain tag.
    pub const fn new(domain: &'static str) -> Self {
        Self { domain }
    }

    /// Hash raw bytes with domain separation.
    pub fn hash(&self, data: &[u8]) -> Key {
        self.hash_parts(&[data])
    }

    /// Hash the concatenation of `parts` with domain separation.
    pub fn hash_parts(&self, parts: &[&[u8]]) -> Key {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        for part in parts {
            hasher.update(part);
        }
        Key::from_hash(*hasher.finalize().as_bytes())
    }

    /// Verify that data produces the expected key.
    pub fn verify(&self, data: &[u8], expected: &Key) -> bool {
        self.hash(data) == *expected
    }

    /// The domain tag used by this hasher.
    pub fn domain(&self) -> &str {
        self.domain
    }
}
