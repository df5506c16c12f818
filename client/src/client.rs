//! Sans-IO client
//!
//! [`Client`] turns records and queries into framed request bytes and framed
//! response bytes back into verified results. Moving the frames is left to
//! the caller's transport.

use std::collections::HashMap;

use log::{debug, info, warn};
use tiesdb_core::{ColumnsOrder, Record, SelectStatement, SignerKey, Tag, WriteContext};

use crate::config::ClientConfig;
use crate::envelope::{decode_message, encode_message};
use crate::error::{protocol_error, Result};
use crate::request::{
    build_billing, build_modification, build_recollection, Consistency, Query, RequestKind,
};
use crate::response::{
    message_id, read_billing, read_modification, read_recollection, server_error, Response,
};

/// A framed request ready for the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outgoing {
    /// Correlation id of the request
    pub message_id: u64,
    /// Envelope header followed by the encoded request
    pub frame: Vec<u8>,
}

#[derive(Debug)]
struct Pending {
    kind: RequestKind,
    order: Option<ColumnsOrder>,
}

/// Request/response state of one connection
#[derive(Debug)]
pub struct Client {
    config: ClientConfig,
    key: SignerKey,
    cheques: Option<WriteContext>,
    last_message_id: u64,
    pending: HashMap<u64, Pending>,
}

impl Client {
    /// Create a client signing entries with `key`
    pub fn new(key: SignerKey, config: ClientConfig) -> Self {
        info!("TiesDB client for {:?}", key.address());
        Self {
            config,
            key,
            cheques: None,
            last_message_id: 0,
            pending: HashMap::new(),
        }
    }

    /// Pay for every written entry through `context`
    pub fn with_cheques(mut self, context: WriteContext) -> Self {
        self.cheques = Some(context);
        self
    }

    /// The configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The cheque context, if one is configured
    pub fn cheques(&self) -> Option<&WriteContext> {
        self.cheques.as_ref()
    }

    /// Use `tablespace` for queries that name only a table
    pub fn use_tablespace(&mut self, tablespace: &str) {
        self.config.default_tablespace = Some(tablespace.to_string());
    }

    /// Set the consistency of subsequent requests
    pub fn set_consistency(&mut self, consistency: Consistency) {
        self.config.consistency = consistency;
    }

    /// Number of requests still waiting for a response
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Sign `records` as the next versions and frame them in a
    /// `ModificationRequest`
    pub fn modify(&mut self, records: &mut [Record]) -> Result<Outgoing> {
        let id = self.last_message_id + 1;
        let request = build_modification(
            id,
            self.config.consistency,
            records,
            &self.key,
            &self.config.core.entry,
            self.cheques.as_mut(),
        )?;
        self.send(request, RequestKind::Modification, None)
    }

    /// Compile `sql` into a `RecollectionRequest`
    pub fn recollect_sql(&mut self, sql: &str) -> Result<Outgoing> {
        self.recollect_query(Query::Sql(sql))
    }

    /// Compile a parsed statement into a `RecollectionRequest`
    pub fn recollect(&mut self, statement: &SelectStatement) -> Result<Outgoing> {
        self.recollect_query(Query::Select(statement))
    }

    fn recollect_query(&mut self, query: Query<'_>) -> Result<Outgoing> {
        let id = self.last_message_id + 1;
        let (request, order) = build_recollection(
            id,
            self.config.consistency,
            query,
            self.config.default_tablespace.as_deref(),
            &self.config.core.codec(),
        )?;
        self.send(request, RequestKind::Recollection, order)
    }

    /// Ask the node for collected cheques
    pub fn billing(&mut self, count_limit: u64, amount_threshold: u64) -> Result<Outgoing> {
        let id = self.last_message_id + 1;
        let request = build_billing(id, count_limit, amount_threshold)?;
        self.send(request, RequestKind::Billing, None)
    }

    fn send(
        &mut self,
        request: Tag,
        kind: RequestKind,
        order: Option<ColumnsOrder>,
    ) -> Result<Outgoing> {
        let frame = encode_message(&request)?;
        self.last_message_id += 1;
        let message_id = self.last_message_id;
        debug!("Sending {} request #{}", kind, message_id);
        self.pending.insert(message_id, Pending { kind, order });
        Ok(Outgoing { message_id, frame })
    }

    /// Interpret a framed response and retire its request
    pub fn receive(&mut self, frame: &[u8]) -> Result<(u64, Response)> {
        let response = decode_message(frame)?;
        let id = message_id(&response)?;
        let Some(pending) = self.pending.remove(&id) else {
            warn!("Dropping {} for unknown MessageId {}", response.name(), id);
            return Err(protocol_error(format!("Unknown response MessageId: {}", id)));
        };

        if response.name() == "Error" {
            return Err(server_error(&response));
        }
        if response.name() != pending.kind.response_name() {
            return Err(protocol_error(format!(
                "Expected {} for message #{}, got {}",
                pending.kind.response_name(),
                id,
                response.name()
            )));
        }

        let result = match pending.kind {
            RequestKind::Modification => Response::Modification(read_modification(&response)?),
            RequestKind::Recollection => Response::Recollection(read_recollection(
                &response,
                pending.order.as_ref(),
                self.config.core.codec(),
            )?),
            RequestKind::Billing => Response::Billing(read_billing(&response)?),
        };
        Ok((id, result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::frame;
    use crate::error::ClientError;
    use tiesdb_core::{CoreError, ValueType};

    const CAPTURED_RESPONSE: &str = include_str!("../../core/testdata/recollection_response.hex");

    fn captured_frame() -> Vec<u8> {
        frame(&hex::decode(CAPTURED_RESPONSE.trim()).unwrap())
    }

    fn client() -> Client {
        Client::new(
            SignerKey::random(),
            ClientConfig::new().with_tablespace("client-dev.test"),
        )
    }

    #[test]
    fn test_message_ids_increase() {
        let mut client = client();
        let first = client.recollect_sql("SELECT * FROM all_types").unwrap();
        let second = client.billing(10, 0).unwrap();
        assert_eq!((first.message_id, second.message_id), (1, 2));
        assert_eq!(client.pending(), 2);
    }

    #[test]
    fn test_failed_build_keeps_message_id() {
        let mut client = client();
        assert!(client.recollect_sql("DELETE FROM all_types").is_err());
        assert_eq!(client.pending(), 0);
        assert_eq!(client.billing(1, 0).unwrap().message_id, 1);
    }

    #[test]
    fn test_captured_response_resolves_request() {
        let mut client = client();
        client.recollect_sql("SELECT * FROM all_types").unwrap();
        client
            .recollect_sql("SELECT * FROM \"client-dev.test\".all_types")
            .unwrap();

        let (id, response) = client.receive(&captured_frame()).unwrap();
        assert_eq!(id, 2);
        assert_eq!(client.pending(), 1);
        match response {
            Response::Recollection(records) => {
                assert_eq!(records.len(), 1);
                assert_eq!(records[0].table(), "all_types");
            }
            other => panic!("Expected recollection, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_message_id() {
        let mut client = client();
        let err = client.receive(&captured_frame()).unwrap_err();
        assert!(matches!(err, ClientError::Core(CoreError::Protocol(_))));
    }

    #[test]
    fn test_response_kind_mismatch() {
        let mut client = client();
        client.billing(1, 0).unwrap();
        client.billing(1, 0).unwrap();
        let err = client.receive(&captured_frame()).unwrap_err();
        assert!(matches!(err, ClientError::Core(CoreError::Protocol(_))));
        assert_eq!(client.pending(), 1);
    }

    #[test]
    fn test_error_response_with_message_id() {
        let mut client = client();
        let outgoing = client.billing(1, 0).unwrap();

        let mut error = Tag::new("Error").unwrap();
        error.add_value("MessageId", outgoing.message_id).unwrap();
        error.add_value("ErrorMessage", "billing disabled").unwrap();
        let err = client.receive(&encode_message(&error).unwrap()).unwrap_err();

        assert!(matches!(err, ClientError::Server(ref m) if m == "billing disabled"));
        assert_eq!(client.pending(), 0);
    }

    #[test]
    fn test_modify_then_applied() {
        let mut client = client();
        let mut record = Record::new("client-dev.test", "all_types");
        record.put_value("Id", ValueType::Uuid, uuid::Uuid::new_v4());
        let outgoing = client.modify(std::slice::from_mut(&mut record)).unwrap();

        let request = decode_message(&outgoing.frame).unwrap();
        assert_eq!(request.child_unsigned("MessageId").unwrap(), outgoing.message_id);
        assert_eq!(request.children_named("Entry").count(), 1);

        let mut response = Tag::new("ModificationResponse").unwrap();
        response.add_value("MessageId", outgoing.message_id).unwrap();
        response
            .add_container("ModificationResult")
            .unwrap()
            .add_data("EntryHash", vec![0x11; 32])
            .unwrap();

        match client.receive(&encode_message(&response).unwrap()).unwrap() {
            (_, Response::Modification(outcomes)) => assert!(outcomes[0].is_applied()),
            other => panic!("Expected modification outcomes, got {:?}", other),
        }
    }
}
