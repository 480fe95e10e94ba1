//! Self-describing digest records.
//!
//! A multihash record is `varint(code) ‖ varint(length) ‖ digest`. Resources
//! carry one when their payload is a pointer to a manifest root rather than
//! raw data. The record is only usable as a root if its algorithm matches the
//! content store's own hashing ([`BLAKE3_256`]).

use std::fmt;

use manifold_types::Key;
use thiserror::Error;

/// Multicodec code for SHA2-256.
pub const SHA2_256: u64 = 0x12;
/// Multicodec code for Keccak-256.
pub const KECCAK_256: u64 = 0x1b;
/// Multicodec code for BLAKE3 with a 256-bit output.
pub const BLAKE3_256: u64 = 0x1e;

/// Varints longer than this cannot encode a `u64`.
const MAX_VARINT_LEN: usize = 10;

/// Errors decoding a multihash record.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MultihashError {
    #[error("multihash record is empty")]
    Empty,

    #[error("multihash varint is truncated")]
    Truncated,

    #[error("multihash varint overflows u64")]
    VarintOverflow,

    #[error("multihash declares {declared} digest bytes but carries {actual}")]
    LengthMismatch { declared: u64, actual: usize },

    #[error("multihash algorithm {code:#x} is not {expected:#x}")]
    UnsupportedAlgorithm { code: u64, expected: u64 },
}

/// A decoded digest record.
#[derive(Clone, PartialEq, Eq)]
pub struct Multihash {
    code: u64,
    digest: Vec<u8>,
}

impl Multihash {
    pub fn new(code: u64, digest: impl Into<Vec<u8>>) -> Self {
        Self {
            code,
            digest: digest.into(),
        }
    }

    /// Wrap a content key as a BLAKE3 record.
    pub fn from_key(key: &Key) -> Self {
        Self::new(BLAKE3_256, key.as_bytes().to_vec())
    }

    pub fn code(&self) -> u64 {
        self.code
    }

    pub fn digest(&self) -> &[u8] {
        &self.digest
    }

    /// Serialize to `varint(code) ‖ varint(len) ‖ digest`.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.digest.len() + 4);
        put_uvarint(&mut out, self.code);
        put_uvarint(&mut out, self.digest.len() as u64);
        out.extend_from_slice(&self.digest);
        out
    }

    /// Parse a record, requiring the declared length to match exactly.
    pub fn decode(bytes: &[u8]) -> Result<Self, MultihashError> {
        if bytes.is_empty() {
            return Err(MultihashError::Empty);
        }
        let (code, n) = read_uvarint(bytes)?;
        let rest = &bytes[n..];
        let (declared, m) = read_uvarint(rest)?;
        let digest = &rest[m..];
        if declared != digest.len() as u64 {
            return Err(MultihashError::LengthMismatch {
                declared,
                actual: digest.len(),
            });
        }
        Ok(Self::new(code, digest.to_vec()))
    }

    /// Total encoded length of the record at the start of `bytes`, if it
    /// parses: header plus declared digest length.
    pub fn encoded_length(bytes: &[u8]) -> Result<usize, MultihashError> {
        let (_, n) = read_uvarint(bytes)?;
        let (declared, m) = read_uvarint(&bytes[n..])?;
        usize::try_from(declared)
            .ok()
            .and_then(|d| (n + m).checked_add(d))
            .ok_or(MultihashError::LengthMismatch {
                declared,
                actual: bytes.len() - n - m,
            })
    }

    /// Interpret the digest as a content key. The algorithm must be the store's.
    pub fn to_key(&self) -> Result<Key, MultihashError> {
        if self.code != BLAKE3_256 {
            return Err(MultihashError::UnsupportedAlgorithm {
                code: self.code,
                expected: BLAKE3_256,
            });
        }
        Key::from_slice(&self.digest).map_err(|_| MultihashError::LengthMismatch {
            declared: manifold_types::key::KEY_LENGTH as u64,
            actual: self.digest.len(),
        })
    }
}

impl fmt::Debug for Multihash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Multihash({:#x}, {})", self.code, hex::encode(&self.digest))
    }
}

fn put_uvarint(out: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        out.push((value as u8) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

fn read_uvarint(bytes: &[u8]) -> Result<(u64, usize), MultihashError> {
    let mut value: u64 = 0;
    for (i, &b) in bytes.iter().enumerate() {
        if i >= MAX_VARINT_LEN || (i == MAX_VARINT_LEN - 1 && b > 1) {
            return Err(MultihashError::VarintOverflow);
        }
        value |= u64::from(b & 0x7f) << (7 * i);
        if b < 0x80 {
            return Ok((value, i + 1));
        }
    }
    Err(MultihashError::Truncated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn key_record_layout() {
        let key = Key::from_hash([0xaa; 32]);
        let bytes = Multihash::from_key(&key).encode();
        assert_eq!(bytes[0], 0x1e);
        assert_eq!(bytes[1], 32);
        assert_eq!(&bytes[2..], key.as_bytes());
        assert_eq!(Multihash::encoded_length(&bytes).unwrap(), 34);
    }

    #[test]
    fn huge_declared_length_is_rejected() {
        let mut bytes = vec![0x1e];
        put_uvarint(&mut bytes, u64::MAX);
        bytes.extend_from_slice(&[1, 2, 3]);
        assert_eq!(
            Multihash::encoded_length(&bytes),
            Err(MultihashError::LengthMismatch { declared: u64::MAX, actual: 3 })
        );
    }

    #[test]
    fn decode_to_key() {
        let key = Key::from_hash([5; 32]);
        let decoded = Multihash::decode(&Multihash::from_key(&key).encode()).unwrap();
        assert_eq!(decoded.to_key().unwrap(), key);
    }

    #[test]
    fn empty_record_fails() {
        assert_eq!(Multihash::decode(&[]), Err(MultihashError::Empty));
    }

    #[test]
    fn truncated_varint_fails() {
        assert_eq!(Multihash::decode(&[0x80]), Err(MultihashError::Truncated));
        assert_eq!(Multihash::decode(&[0x1e]), Err(MultihashError::Truncated));
    }

    #[test]
    fn length_mismatch_fails() {
        let err = Multihash::decode(&[0x1e, 0x04, 1, 2]).unwrap_err();
        assert_eq!(err, MultihashError::LengthMismatch { declared: 4, actual: 2 });
    }

    #[test]
    fn varint_overflow_fails() {
        let bytes = [0xff; 11];
        assert_eq!(Multihash::decode(&bytes), Err(MultihashError::VarintOverflow));
    }

    #[test]
    fn foreign_algorithm_is_not_a_key() {
        let record = Multihash::new(KECCAK_256, vec![0u8; 32]);
        let err = record.to_key().unwrap_err();
        assert_eq!(
            err,
            MultihashError::UnsupportedAlgorithm { code: KECCAK_256, expected: BLAKE3_256 }
        );
    }

    #[test]
    fn multibyte_code_is_encoded_as_varint() {
        let record = Multihash::new(0x1234, vec![9, 9]);
        let bytes = record.encode();
        assert_eq!(&bytes[..2], &[0xb4, 0x24]);
        assert_eq!(Multihash::decode(&bytes).unwrap(), record);
    }

    proptest! {
        #[test]
        fn arbitrary_bytes_never_panic(bytes in proptest::collection::vec(any::<u8>(), 0..64)) {
            let _ = Multihash::decode(&bytes);
            let _ = Multihash::encoded_length(&bytes);
        }
    }
}
