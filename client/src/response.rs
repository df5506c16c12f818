//! Response interpretation
//!
//! Responses are matched to requests by `MessageId`. Recollection results are
//! verified entry by entry before they become records; a single bad entry
//! rejects the whole response.

use log::{debug, warn};
use tiesdb_core::{ColumnsOrder, Record, Tag, ValueCodec, WireCheque};

use crate::error::{protocol_error, ClientError, Result};

/// Outcome of one entry of a modification request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryOutcome {
    /// The node stored the entry
    Applied {
        /// Hash of the stored entry header
        entry_hash: Vec<u8>,
    },
    /// The node refused the entry
    Rejected {
        /// Hash of the refused entry header, when the node names it
        entry_hash: Option<Vec<u8>>,
        /// Reasons given by the node
        messages: Vec<String>,
    },
}

impl EntryOutcome {
    /// Whether the entry was stored
    pub fn is_applied(&self) -> bool {
        matches!(self, EntryOutcome::Applied { .. })
    }
}

/// An interpreted response
#[derive(Debug)]
pub enum Response {
    /// Verified records, in result order
    Recollection(Vec<Record>),
    /// One outcome per entry, in request order
    Modification(Vec<EntryOutcome>),
    /// Cheques collected by the node
    Billing(Vec<WireCheque>),
}

/// Correlation id of a response; an `Error` root without one is turned into
/// a server error
pub fn message_id(response: &Tag) -> Result<u64> {
    match response.child("MessageId") {
        Some(id) => Ok(id.unsigned()?),
        None if response.name() == "Error" => Err(server_error(response)),
        None => Err(protocol_error(format!(
            "Invalid response without MessageId: {}",
            response.name()
        ))),
    }
}

/// Collect the messages of an `Error` root
pub fn server_error(response: &Tag) -> ClientError {
    let messages = response
        .children_named("ErrorMessage")
        .map(Tag::text)
        .collect::<tiesdb_core::Result<Vec<_>>>();
    match messages {
        Ok(messages) => ClientError::Server(messages.join("\n")),
        Err(err) => err.into(),
    }
}

/// Verify and load every `RecollectionResult`
pub fn read_recollection(
    response: &Tag,
    order: Option<&ColumnsOrder>,
    codec: ValueCodec,
) -> Result<Vec<Record>> {
    let mut records = Vec::new();
    for result in response.children_named("RecollectionResult") {
        let record = Record::from_recollection_result(result, order, codec).map_err(|err| {
            warn!("Rejecting recollection result #{}: {}", records.len(), err);
            err
        })?;
        records.push(record);
    }
    debug!("Recollection returned {} records", records.len());
    Ok(records)
}

/// Read the per-entry outcomes of a `ModificationResponse`
pub fn read_modification(response: &Tag) -> Result<Vec<EntryOutcome>> {
    let mut outcomes = Vec::new();
    for child in response.children() {
        match child.name() {
            "ModificationResult" => outcomes.push(EntryOutcome::Applied {
                entry_hash: child.child_data("EntryHash")?,
            }),
            "ModificationError" => {
                let entry_hash = child.child("EntryHash").map(|h| h.data().map(|d| d.into_owned()));
                let messages = child
                    .children_named("ErrorMessage")
                    .map(Tag::text)
                    .collect::<tiesdb_core::Result<Vec<_>>>()?;
                warn!("Entry rejected by the node: {}", messages.join("; "));
                outcomes.push(EntryOutcome::Rejected {
                    entry_hash: entry_hash.transpose()?,
                    messages,
                });
            }
            _ => {}
        }
    }
    Ok(outcomes)
}

/// Read the cheques of a `BillingResponse`; each one must name its
/// tablespace, table and signer
pub fn read_billing(response: &Tag) -> Result<Vec<WireCheque>> {
    let mut cheques = Vec::new();
    for list in response.children_named("ChequeList") {
        for cheque in list.children_named("Cheque") {
            cheques.push(WireCheque::from_tag(cheque, None)?);
        }
    }
    Ok(cheques)
}
