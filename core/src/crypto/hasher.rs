//! Streaming hasher used for tag content hashes
//!
//! Entry headers and field lists are hashed by feeding raw leaf bytes into a
//! single running digest; this trait is the seam the tree walkers write into.

use sha3::{Digest, Keccak256};
use std::fmt::Debug;

/// SecureHasher trait for incremental hashing
pub trait SecureHasher: Debug + Send + Sync {
    /// Update the hasher with new data
    fn update(&mut self, data: &[u8]);

    /// Finalize the hash and return the result
    fn finalize(&mut self) -> [u8; 32];

    /// Hash several byte strings as one concatenated input
    fn hash_concat(&mut self, parts: &[&[u8]]) -> [u8; 32] {
        for part in parts {
            self.update(part);
        }
        self.finalize()
    }
}

/// Keccak-256 implementation of SecureHasher
#[derive(Debug, Clone, Default)]
pub struct KeccakHasher {
    inner: Keccak256,
}

impl KeccakHasher {
    /// Create a new Keccak-256 hasher
    pub fn new() -> Self {
        KeccakHasher {
            inner: Keccak256::new(),
        }
    }
}

impl SecureHasher for KeccakHasher {
    fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    /// Finalize and reset, so the same hasher can be reused
    fn finalize(&mut self) -> [u8; 32] {
        let result = self.inner.finalize_reset();
        let mut output = [0u8; 32];
        output.copy_from_slice(&result);
        output
    }
}
