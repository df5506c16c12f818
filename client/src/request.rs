//! Request builders
//!
//! Each builder produces an unframed root tag. Requests that carry entries are
//! assembled completely before any cheque is issued, so a failing record never
//! consumes a cheque nonce.

use std::fmt;

use log::debug;
use serde::{Deserialize, Serialize};
use tiesdb_core::config::EntryConfig;
use tiesdb_core::{
    compile_select, compile_sql, ColumnsOrder, Record, SelectStatement, SignerKey, Tag, ValueCodec,
    WriteContext,
};

use crate::error::Result;

/// How many replicas must take part in answering a request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Consistency {
    /// A single node
    One,
    /// A majority of the replicas
    #[default]
    Quorum,
    /// Every replica
    All,
}

impl Consistency {
    /// Value of the `Consistency` tag
    pub fn wire_value(self) -> u64 {
        match self {
            Consistency::One => 0x01,
            Consistency::Quorum => 0x32,
            Consistency::All => 0x64,
        }
    }
}

/// Kind of an outgoing request, remembered until its response arrives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    /// Entry writes
    Modification,
    /// Queries
    Recollection,
    /// Cheque collection
    Billing,
}

impl RequestKind {
    /// Root tag name of the matching response
    pub fn response_name(self) -> &'static str {
        match self {
            RequestKind::Modification => "ModificationResponse",
            RequestKind::Recollection => "RecollectionResponse",
            RequestKind::Billing => "BillingResponse",
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestKind::Modification => write!(f, "modification"),
            RequestKind::Recollection => write!(f, "recollection"),
            RequestKind::Billing => write!(f, "billing"),
        }
    }
}

/// Query of a recollection request
#[derive(Debug, Clone, Copy)]
pub enum Query<'a> {
    /// SQL text
    Sql(&'a str),
    /// Already parsed statement
    Select(&'a SelectStatement),
}

/// Build a `ModificationRequest` holding one signed entry per record
pub fn build_modification(
    message_id: u64,
    consistency: Consistency,
    records: &mut [Record],
    key: &SignerKey,
    entry_config: &EntryConfig,
    cheques: Option<&mut WriteContext>,
) -> Result<Tag> {
    let mut entries = Vec::with_capacity(records.len());
    for record in records.iter_mut() {
        entries.push(record.get_entry(key, entry_config)?);
    }

    if let Some(context) = cheques {
        for entry in entries.iter_mut() {
            let cheque = context.write_entry_cheque(entry)?;
            debug!(
                "Cheque #{} for {}.{} pays {}",
                cheque.nonce, cheque.tablespace, cheque.table, cheque.amount
            );
        }
    }

    let mut request = Tag::new("ModificationRequest")?;
    request.add_value("Consistency", consistency.wire_value())?;
    request.add_value("MessageId", message_id)?;
    for entry in entries {
        request.add_child(entry)?;
    }
    Ok(request)
}

/// Build a `RecollectionRequest` and the column order of its results
pub fn build_recollection(
    message_id: u64,
    consistency: Consistency,
    query: Query<'_>,
    default_tablespace: Option<&str>,
    codec: &ValueCodec,
) -> Result<(Tag, Option<ColumnsOrder>)> {
    let mut request = Tag::new("RecollectionRequest")?;
    request.add_value("Consistency", consistency.wire_value())?;
    request.add_value("MessageId", message_id)?;

    let order = match query {
        Query::Sql(sql) => compile_sql(&mut request, sql, default_tablespace, codec)?,
        Query::Select(statement) => {
            compile_select(&mut request, statement, default_tablespace, codec)?
        }
    };
    Ok((request, order))
}

/// Build a `BillingRequest` asking for up to `count_limit` cheques worth at
/// least `amount_threshold`
pub fn build_billing(message_id: u64, count_limit: u64, amount_threshold: u64) -> Result<Tag> {
    let mut request = Tag::new("BillingRequest")?;
    request.add_value("MessageId", message_id)?;
    request.add_value("BillingCountLimit", count_limit)?;
    request.add_value("BillingAmountThreshold", amount_threshold)?;
    Ok(request)
}
