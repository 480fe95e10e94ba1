use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Length in bytes of a content key.
pub const KEY_LENGTH: usize = 32;

/// Content-addressed identifier for a stored block.
///
/// A `Key` is produced once by the content store when a block is written and
/// is used both as the pointer to the data and as its equality key: storing
/// identical bytes twice yields the same `Key`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Key([u8; KEY_LENGTH]);

impl Key {
    /// Create a `Key` from a pre-computed digest.
    pub const fn from_hash(hash: [u8; KEY_LENGTH]) -> Self {
        Self(hash)
    }

    /// Create a `Key` from a digest slice, checking its length.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, TypeError> {
        let arr: [u8; KEY_LENGTH] = bytes.try_into().map_err(|_| TypeError::InvalidLength {
            expected: KEY_LENGTH,
            actual: bytes.len(),
        })?;
        Ok(Self(arr))
    }

    /// The null key (all zeros). Represents "no block".
    pub const fn null() -> Self {
        Self([0u8; KEY_LENGTH])
    }

    /// Returns `true` if this is the null key.
    pub fn is_null(&self) -> bool {
        self.0 == [0u8; KEY_LENGTH]
    }

    /// The raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.0
    }

    /// Hex-encoded string representation.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short hex representation (first 8 characters).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }

    /// Parse from a hex string.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        Self::from_slice(&bytes)
    }

    /// Returns `true` if `s` is exactly the hex form of a key.
    pub fn is_hex_key(s: &str) -> bool {
        s.len() == KEY_LENGTH * 2 && s.bytes().all(|b| b.is_ascii_hexdigit())
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({})", self.short_hex())
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl std::str::FromStr for Key {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<[u8; KEY_LENGTH]> for Key {
    fn from(bytes: [u8; KEY_LENGTH]) -> Self {
        Self(bytes)
    }
}

impl From<Key> for [u8; KEY_LENGTH] {
    fn from(key: Key) -> Self {
        key.0
    }
}

impl AsRef<[u8]> for Key {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn null_is_all_zeros() {
        let null = Key::null();
        assert!(null.is_null());
        assert_eq!(null.as_bytes(), &[0u8; 32]);
    }

    #[test]
    fn short_hex_is_8_chars() {
        let key = Key::from_hash([0xab; 32]);
        assert_eq!(key.short_hex(), "abababab");
    }

    #[test]
    fn display_is_full_hex() {
        let key = Key::from_hash([7; 32]);
        let display = format!("{key}");
        assert_eq!(display.len(), 64);
        assert_eq!(display, key.to_hex());
    }

    #[test]
    fn from_hex_rejects_wrong_length() {
        let err = Key::from_hex("abcd").unwrap_err();
        assert_eq!(err, TypeError::InvalidLength { expected: 32, actual: 2 });
    }

    #[test]
    fn from_hex_rejects_non_hex() {
        assert!(matches!(Key::from_hex("zz"), Err(TypeError::InvalidHex(_))));
    }

    #[test]
    fn is_hex_key_checks_length_and_digits() {
        assert!(Key::is_hex_key(&"a".repeat(64)));
        assert!(Key::is_hex_key(&"A".repeat(64)));
        assert!(!Key::is_hex_key(&"a".repeat(63)));
        assert!(!Key::is_hex_key(&"g".repeat(64)));
        assert!(!Key::is_hex_key("mysite.eth"));
    }

    #[test]
    fn serde_roundtrip() {
        let key = Key::from_hash([3; 32]);
        let json = serde_json::to_string(&key).unwrap();
        let parsed: Key = serde_json::from_str(&json).unwrap();
        assert_eq!(key, parsed);
    }

    proptest! {
        #[test]
        fn hex_text_parses_back(bytes in proptest::array::uniform32(any::<u8>())) {
            let key = Key::from_hash(bytes);
            prop_assert_eq!(key.to_hex().parse::<Key>().unwrap(), key);
        }
    }
}
