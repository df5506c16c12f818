//! Entry integrity
//!
//! An entry is authenticated by two digests:
//!
//! - the *fields hash* (`EntryFldHash`): keccak256 over the per-field hashes,
//!   in field list order, where a field's hash is either its `FieldHash` or
//!   `keccak256(FieldName ‖ FieldValue)`;
//! - the *header hash*: keccak256 over the raw data of every header leaf in
//!   order, skipping `Signature`. The header signature is made over this hash.
//!
//! A received entry is only usable after [`check_entry`] succeeds.

use ethers::types::Address;
use log::{debug, warn};

use crate::cheque::{verify_wire_cheque, ChequeExpectation, WireCheque};
use crate::crypto::{
    keccak256_concat, recover_address, verify_hash, KeccakHasher, SecureHasher, SignerKey,
    ENTRY_V_OFFSET,
};
use crate::error::{CoreError, Result};
use crate::tag::Tag;

/// Feed the raw data of every leaf under `tag` into `hasher`, depth first
pub fn hash_tag_data(tag: &Tag, hasher: &mut dyn SecureHasher) -> Result<()> {
    if tag.is_container() {
        for child in tag.children() {
            hash_tag_data(child, hasher)?;
        }
    } else {
        hasher.update(&tag.data()?);
    }
    Ok(())
}

/// Content hash of an `EntryHeader` (or any signed container): every child
/// except `Signature`
pub fn header_hash(header: &Tag) -> Result<[u8; 32]> {
    let mut hasher = KeccakHasher::new();
    for child in header.children() {
        if child.name() != "Signature" {
            hash_tag_data(child, &mut hasher)?;
        }
    }
    let hash = hasher.finalize();
    debug!("{} hash {}", header.name(), hex::encode(hash));
    Ok(hash)
}

/// Hash of one `Field` tag
pub fn field_hash(field: &Tag) -> Result<[u8; 32]> {
    if let Some(hash) = field.child("FieldHash") {
        let data = hash.data()?;
        return <[u8; 32]>::try_from(&data[..]).map_err(|_| {
            CoreError::Parse(format!("FieldHash must be 32 bytes, got {}", data.len()))
        });
    }

    let name = field.required_child("FieldName")?.data()?;
    let value = field.required_child("FieldValue")?.data()?;
    Ok(keccak256_concat(&[&name[..], &value[..]]))
}

/// Aggregate hash of a `FieldList`
pub fn fields_hash(list: &Tag) -> Result<[u8; 32]> {
    let mut hasher = KeccakHasher::new();
    for field in list.children_named("Field") {
        hasher.update(&field_hash(field)?);
    }
    Ok(hasher.finalize())
}

/// Sign a header in place, appending its `Signature`; returns the header hash
pub fn sign_header(header: &mut Tag, key: &SignerKey) -> Result<[u8; 32]> {
    let hash = header_hash(header)?;
    let signature = key.sign_hash(&hash, ENTRY_V_OFFSET)?;
    header.add_data("Signature", signature.to_vec())?;
    Ok(hash)
}

/// Recover the address that signed a header over `hash`
pub fn recover_signer(header: &Tag, hash: &[u8; 32]) -> Result<Address> {
    let signature = header.required_child("Signature")?.data()?;
    recover_address(hash, &signature)
}

/// Verify an entry's signature and fields hash; returns its header hash
pub fn check_entry(entry: &Tag) -> Result<[u8; 32]> {
    let header = entry.required_child("EntryHeader")?;
    let hash = header_hash(header)?;

    let recovered = recover_signer(header, &hash)
        .map_err(|e| CoreError::Integrity(format!("Entry signature cannot be recovered: {}", e)))?;
    let declared = header.child_data("Signer")?;
    if !verify_hash(recovered.as_bytes(), &declared) {
        warn!(
            "Entry signed by {:?} but declares signer 0x{}",
            recovered,
            hex::encode(&declared)
        );
        return Err(CoreError::Integrity(format!(
            "Entry signature check failed: recovered {:?}, declared 0x{}",
            recovered,
            hex::encode(&declared)
        )));
    }

    let declared_fields = header.child_data("EntryFldHash")?;
    let computed_fields = match entry.child("FieldList") {
        Some(list) => fields_hash(list)?,
        None => KeccakHasher::new().finalize(),
    };
    if !verify_hash(&declared_fields, &computed_fields) {
        warn!("Fields hash mismatch: declared 0x{}", hex::encode(&declared_fields));
        return Err(CoreError::Integrity(format!(
            "Fields hash does not match: declared 0x{}, computed 0x{}",
            hex::encode(&declared_fields),
            hex::encode(computed_fields)
        )));
    }

    Ok(hash)
}

/// Verify every entry of a `ModificationRequest`, and every cheque when an
/// expectation is given
pub fn check_modification_request(
    request: &Tag,
    cheques: Option<&ChequeExpectation>,
) -> Result<()> {
    if request.name() != "ModificationRequest" {
        return Err(CoreError::Protocol(format!(
            "Expected ModificationRequest, got {}",
            request.name()
        )));
    }

    for entry in request.children_named("Entry") {
        check_entry(entry)?;

        let (Some(expectation), Some(list)) = (cheques, entry.child("ChequeList")) else {
            continue;
        };
        let header = entry.required_child("EntryHeader")?;
        for cheque in list.children_named("Cheque") {
            let wire = WireCheque::from_tag(cheque, Some(header))?;
            verify_wire_cheque(&wire, expectation)?;
        }
    }
    Ok(())
}
