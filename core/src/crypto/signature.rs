//! secp256k1 signatures in the wire layout `r(32) ‖ s(32) ‖ v(1)`
//!
//! Entry headers are signed over their raw content hash with `v = recovery + 37`
//! (the legacy chain-id corrected form the nodes expect); cheques are signed as
//! personal messages with `v = recovery + 27`. Recovery accepts both.

use std::fmt::{Debug, Formatter, Result as FmtResult};

use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, Signature, H256, U256};
use ethers::utils::hash_message;

use crate::error::{to_crypto_error, CoreError, Result};

/// Length of an encoded signature
pub const SIGNATURE_LENGTH: usize = 65;

/// Recovery byte offset used for entry header signatures
pub const ENTRY_V_OFFSET: u8 = 37;

/// Recovery byte offset used for cheque signatures
pub const CHEQUE_V_OFFSET: u8 = 27;

/// Exclusively owned signing key. Never serialized, never printed.
pub struct SignerKey {
    wallet: LocalWallet,
}

impl Debug for SignerKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "SignerKey {{ address: {:?} }}", self.wallet.address())
    }
}

impl SignerKey {
    /// Load a key from 32 raw private key bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let wallet = LocalWallet::from_bytes(bytes).map_err(to_crypto_error)?;
        Ok(Self { wallet })
    }

    /// Load a key from its hex form, with or without `0x`
    pub fn from_hex(key: &str) -> Result<Self> {
        let bytes = hex::decode(key.trim_start_matches("0x"))?;
        Self::from_bytes(&bytes)
    }

    /// Generate a fresh random key
    pub fn random() -> Self {
        Self {
            wallet: LocalWallet::new(&mut rand::thread_rng()),
        }
    }

    /// Address derived from the public key
    pub fn address(&self) -> Address {
        self.wallet.address()
    }

    /// Sign a 32-byte digest, writing `recovery + v_offset` as the last byte
    pub fn sign_hash(&self, hash: &[u8; 32], v_offset: u8) -> Result<[u8; SIGNATURE_LENGTH]> {
        let signature = self
            .wallet
            .sign_hash(H256::from(*hash))
            .map_err(to_crypto_error)?;

        let recovery = signature
            .v
            .checked_sub(27)
            .filter(|id| *id <= 1)
            .ok_or_else(|| {
                CoreError::Crypto(format!("Unexpected recovery value {}", signature.v))
            })?;

        let mut output = [0u8; SIGNATURE_LENGTH];
        signature.r.to_big_endian(&mut output[0..32]);
        signature.s.to_big_endian(&mut output[32..64]);
        output[64] = recovery as u8 + v_offset;
        Ok(output)
    }
}

/// Reduce a legacy chain-id corrected recovery byte (37/38) to 27/28
pub fn normalize_recovery_byte(v: u8) -> Result<u8> {
    let v = if v > 28 { v - 10 } else { v };
    match v {
        27 | 28 => Ok(v),
        other => Err(CoreError::Crypto(format!("Invalid signature recovery byte {}", other))),
    }
}

/// Recover the signer address of a 32-byte digest from a wire signature
pub fn recover_address(hash: &[u8; 32], signature: &[u8]) -> Result<Address> {
    if signature.len() != SIGNATURE_LENGTH {
        return Err(CoreError::Crypto(format!(
            "Signature must be {} bytes, got {}",
            SIGNATURE_LENGTH,
            signature.len()
        )));
    }

    let v = normalize_recovery_byte(signature[64])?;
    let signature = Signature {
        r: U256::from_big_endian(&signature[0..32]),
        s: U256::from_big_endian(&signature[32..64]),
        v: v as u64,
    };

    signature
        .recover(H256::from(*hash))
        .map_err(to_crypto_error)
}

/// Hash a message the way `personal_sign` does:
/// `keccak256("\x19Ethereum Signed Message:\n" ‖ len ‖ message)`
pub fn hash_personal_message(message: &[u8]) -> [u8; 32] {
    hash_message(message).0
}
