use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Length in bytes of an owner address.
pub const ADDRESS_LENGTH: usize = 20;

/// Account address that owns a registered name.
///
/// Addresses are compared for equality when validating name ownership. The
/// text form is `0x`-prefixed lowercase hex; parsing accepts the prefix as
/// optional.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address([u8; ADDRESS_LENGTH]);

impl Address {
    pub const fn new(bytes: [u8; ADDRESS_LENGTH]) -> Self {
        Self(bytes)
    }

    /// The zero address, used by registries for "no owner".
    pub const fn zero() -> Self {
        Self([0u8; ADDRESS_LENGTH])
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; ADDRESS_LENGTH]
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LENGTH] {
        &self.0
    }

    /// Parse from hex, with or without a leading `0x`.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(digits).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        let arr: [u8; ADDRESS_LENGTH] =
            bytes.as_slice().try_into().map_err(|_| TypeError::InvalidLength {
                expected: ADDRESS_LENGTH,
                actual: bytes.len(),
            })?;
        Ok(Self(arr))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl std::str::FromStr for Address {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}
