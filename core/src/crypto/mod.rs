//! Cryptographic primitives for the TiesDB protocol
//!
//! Keccak-256 digests, constant-time digest comparison and secp256k1
//! signing/recovery of entry headers and cheques.

mod hasher;
mod signature;

pub use hasher::{KeccakHasher, SecureHasher};
pub use signature::{
    hash_personal_message, normalize_recovery_byte, recover_address, SignerKey,
    CHEQUE_V_OFFSET, ENTRY_V_OFFSET, SIGNATURE_LENGTH,
};

use constant_time_eq::constant_time_eq;

/// Keccak-256 of a byte string
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    KeccakHasher::new().hash_concat(&[data])
}

/// Keccak-256 of the concatenation of several byte strings
pub fn keccak256_concat(parts: &[&[u8]]) -> [u8; 32] {
    KeccakHasher::new().hash_concat(parts)
}

/// Verify a hash in constant time to prevent timing attacks
///
/// # Arguments
///
/// * `expected` - Expected hash value
/// * `actual` - Actual hash value to verify
///
/// # Returns
///
/// True if the hashes match, false otherwise
pub fn verify_hash(expected: &[u8], actual: &[u8]) -> bool {
    constant_time_eq(expected, actual)
}
