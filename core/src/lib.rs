//! # TiesDB Core
//!
//! Core data structures and codecs for the TiesDB client.
//! This crate provides the byte-exact parts of the protocol: the schema-driven
//! tag codec, the logical value codec, signed entries built from records, the
//! payment cheque engine and the query compiler.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod cheque;
pub mod config;
pub mod crypto;
pub mod error;
pub mod integrity;
pub mod models;
pub mod query;
pub mod schema;
pub mod tag;
pub mod types;

/// Re-export common types for ease of use
pub use cheque::{
    ChequeSession, ChequeSigner, SignedCheque, TrackingSession, WireCheque, WriteContext,
};
pub use config::CoreConfig;
pub use crypto::{keccak256, SecureHasher, SignerKey};
pub use error::{CoreError, Result};
pub use integrity::{check_entry, check_modification_request};
pub use models::{Field, Placement, Record};
pub use query::{compile_select, compile_sql, ColumnsOrder, SelectStatement};
pub use tag::{decode, encode, Tag, TagValue};
pub use types::{Value, ValueCodec, ValueType};

/// Version of the core crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EntryConfig;

    #[test]
    fn test_signed_record_survives_the_wire() {
        let key = SignerKey::random();
        let mut record = Record::new("client-dev.test", "all_types");
        record.put_value("Id", ValueType::Uuid, uuid::Uuid::new_v4());
        let decimal: bigdecimal::BigDecimal = "-1.235e-2318".parse().unwrap();
        record.put_value("fDecimal", ValueType::Decimal, decimal);

        let entry = record.get_entry(&key, &EntryConfig::default()).unwrap();
        let mut response = Tag::new("RecollectionResponse").unwrap();
        response.add_container("RecollectionResult").unwrap().add_child(entry).unwrap();

        let decoded = decode(&encode(&response).unwrap()).unwrap();
        let result = decoded.child("RecollectionResult").unwrap();
        let mut read =
            Record::from_recollection_result(result, None, ValueCodec::default()).unwrap();
        assert_eq!(read.signer(), Some(key.address()));
        assert_eq!(read.get_value("fDecimal").unwrap(), record.get_value("fDecimal").unwrap());
    }
}
