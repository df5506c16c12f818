//! Payment cheques
//!
//! A cheque authorizes payment for one entry write against one table. Its hash
//! is keccak256 over the fixed-width concatenation
//!
//! ```text
//! contract(20) ‖ signer(20) ‖ session(16)
//!   ‖ keccak256(tablespace "#" table)(32) ‖ amount(32) ‖ nonce(32)
//! ```
//!
//! and it is signed as a personal message (`v` = 27/28). Cheques issued within
//! one session carry the running total, so each one supersedes the last.

mod context;
mod session;

pub use context::WriteContext;
pub use session::{ChequeSession, ChequeSigner, TrackingSession};

use ethers::types::{Address, U256};
use log::warn;

use crate::crypto::{
    hash_personal_message, keccak256_concat, recover_address, SignerKey, CHEQUE_V_OFFSET,
    SIGNATURE_LENGTH,
};
use crate::error::{CoreError, Result};
use crate::tag::Tag;

/// Length of a cheque session id
pub const SESSION_ID_LENGTH: usize = 16;

/// Session id of a cheque session
pub type SessionId = [u8; SESSION_ID_LENGTH];

/// keccak256 of `tablespace ‖ "#" ‖ table`
pub fn table_key(tablespace: &str, table: &str) -> [u8; 32] {
    keccak256_concat(&[tablespace.as_bytes(), b"#", table.as_bytes()])
}

fn u256_bytes(value: u64) -> [u8; 32] {
    let mut out = [0u8; 32];
    U256::from(value).to_big_endian(&mut out);
    out
}

/// Hash identifying a cheque
pub fn cheque_hash(
    contract: &Address,
    signer: &Address,
    session_id: &SessionId,
    tablespace: &str,
    table: &str,
    amount: u64,
    nonce: u64,
) -> [u8; 32] {
    keccak256_concat(&[
        contract.as_bytes(),
        signer.as_bytes(),
        session_id,
        &table_key(tablespace, table),
        &u256_bytes(amount),
        &u256_bytes(nonce),
    ])
}

/// Sign a cheque hash as a personal message
pub fn sign_cheque_hash(key: &SignerKey, hash: &[u8; 32]) -> Result<[u8; SIGNATURE_LENGTH]> {
    key.sign_hash(&hash_personal_message(hash), CHEQUE_V_OFFSET)
}

/// Recover the address that signed a cheque hash
pub fn recover_cheque_signer(hash: &[u8; 32], signature: &[u8]) -> Result<Address> {
    recover_address(&hash_personal_message(hash), signature)
}

/// Parse a 20-byte address from hex, with or without `0x`
pub fn parse_address(text: &str) -> Result<Address> {
    let bytes = hex::decode(text.trim_start_matches("0x"))?;
    if bytes.len() != 20 {
        return Err(CoreError::InvalidValue(format!(
            "Address must be 20 bytes, got {}",
            bytes.len()
        )));
    }
    Ok(Address::from_slice(&bytes))
}

/// Parse a 16-byte session id from hex
pub fn parse_session_id(text: &str) -> Result<SessionId> {
    let bytes = hex::decode(text.trim_start_matches("0x"))?;
    SessionId::try_from(bytes.as_slice()).map_err(|_| {
        CoreError::InvalidValue(format!(
            "Session id must be {} bytes, got {}",
            SESSION_ID_LENGTH,
            bytes.len()
        ))
    })
}

/// A cheque produced by a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedCheque {
    /// Payment channel contract
    pub contract: Address,
    /// Address of the paying key
    pub signer: Address,
    /// Session the cheque belongs to
    pub session_id: SessionId,
    /// Tablespace written to
    pub tablespace: String,
    /// Table written to
    pub table: String,
    /// Cumulative amount of the session
    pub amount: u64,
    /// Sequence number within the session
    pub nonce: u64,
    /// `r ‖ s ‖ v`
    pub signature: [u8; SIGNATURE_LENGTH],
}

impl SignedCheque {
    /// Hash the signature was made over
    pub fn hash(&self) -> [u8; 32] {
        cheque_hash(
            &self.contract,
            &self.signer,
            &self.session_id,
            &self.tablespace,
            &self.table,
            self.amount,
            self.nonce,
        )
    }

    /// Wire form; tablespace, table and signer are left to default from the
    /// enclosing entry
    pub fn to_tag(&self, version: u64) -> Result<Tag> {
        let mut tag = Tag::new("Cheque")?;
        tag.add_value("ChequeVersion", version)?;
        tag.add_data("ChequeSession", self.session_id.to_vec())?;
        tag.add_value("ChequeNumber", self.nonce)?;
        tag.add_value("ChequeCropAmount", self.amount)?;
        tag.add_data("Signature", self.signature.to_vec())?;
        Ok(tag)
    }
}

/// A cheque as read from the wire, with defaults resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireCheque {
    /// Cheque format version
    pub version: u64,
    /// Network the cheque is drawn on, if stated
    pub network: Option<u64>,
    /// Session the cheque belongs to
    pub session_id: SessionId,
    /// Tablespace written to
    pub tablespace: String,
    /// Table written to
    pub table: String,
    /// Declared signer
    pub signer: Address,
    /// Sequence number within the session
    pub nonce: u64,
    /// Cumulative amount of the session
    pub amount: u64,
    /// `r ‖ s ‖ v`
    pub signature: Vec<u8>,
}

impl WireCheque {
    /// Read a `Cheque` tag; missing tablespace, table and signer default from
    /// `header` when one is given
    pub fn from_tag(tag: &Tag, header: Option<&Tag>) -> Result<Self> {
        let defaulted = |name: &str| -> Result<&Tag> {
            tag.child(name)
                .or_else(|| header.and_then(|h| h.child(name)))
                .ok_or_else(|| CoreError::Parse(format!("Cheque has no {}", name)))
        };

        let session = tag.child_data("ChequeSession")?;
        let session_id = SessionId::try_from(session.as_slice()).map_err(|_| {
            CoreError::Parse(format!("ChequeSession must be 16 bytes, got {}", session.len()))
        })?;

        let signer = defaulted("Signer")?.data()?;
        if signer.len() != 20 {
            return Err(CoreError::Parse(format!(
                "Cheque signer must be 20 bytes, got {}",
                signer.len()
            )));
        }

        Ok(Self {
            version: tag.child_unsigned("ChequeVersion")?,
            network: tag.child("ChequeNetwork").map(Tag::unsigned).transpose()?,
            session_id,
            tablespace: defaulted("TablespaceName")?.text()?,
            table: defaulted("TableName")?.text()?,
            signer: Address::from_slice(&signer),
            nonce: tag.child_unsigned("ChequeNumber")?,
            amount: tag.child_unsigned("ChequeCropAmount")?,
            signature: tag.child_data("Signature")?,
        })
    }

    /// Hash of the cheque drawn on `contract`
    pub fn hash(&self, contract: &Address) -> [u8; 32] {
        cheque_hash(
            contract,
            &self.signer,
            &self.session_id,
            &self.tablespace,
            &self.table,
            self.amount,
            self.nonce,
        )
    }
}

/// Who a received cheque must be drawn on and signed by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChequeExpectation {
    /// Payment channel contract
    pub contract: Address,
    /// Counter-party expected to have signed
    pub signer: Address,
}

/// Recover the signer of a wire cheque and require it to be the expected one
pub fn verify_wire_cheque(cheque: &WireCheque, expected: &ChequeExpectation) -> Result<()> {
    let hash = cheque.hash(&expected.contract);
    let recovered = recover_cheque_signer(&hash, &cheque.signature)
        .map_err(|e| CoreError::Policy(format!("Cheque signature cannot be recovered: {}", e)))?;

    if recovered != expected.signer || recovered != cheque.signer {
        warn!(
            "Cheque #{} of session {} signed by {:?}, expected {:?}",
            cheque.nonce,
            hex::encode(cheque.session_id),
            recovered,
            expected.signer
        );
        return Err(CoreError::Policy(format!(
            "Cheque #{} is signed by {:?}, expected {:?}",
            cheque.nonce, recovered, expected.signer
        )));
    }
    Ok(())
}

/// Verify a cheque produced by a session against an expected counter-party
pub fn verify_cheque(cheque: &SignedCheque, expected_signer: &Address) -> Result<()> {
    let recovered = recover_cheque_signer(&cheque.hash(), &cheque.signature)
        .map_err(|e| CoreError::Policy(format!("Cheque signature cannot be recovered: {}", e)))?;
    if &recovered != expected_signer {
        return Err(CoreError::Policy(format!(
            "Cheque #{} is signed by {:?}, expected {:?}",
            cheque.nonce, recovered, expected_signer
        )));
    }
    Ok(())
}
