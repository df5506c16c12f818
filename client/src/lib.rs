//! # TiesDB Client
//!
//! Sans-IO driver for TiesDB nodes. The [`Client`] signs records into
//! `ModificationRequest`s (paying for them with cheques when a cheque context
//! is configured), compiles queries into `RecollectionRequest`s and turns the
//! node's answers into verified records, per-entry outcomes or cheques. It
//! produces and consumes framed bytes; the transport belongs to the caller.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod config;
pub mod envelope;
pub mod error;
pub mod request;
pub mod response;

pub use client::{Client, Outgoing};
pub use config::ClientConfig;
pub use envelope::{frame, unframe, HEADER};
pub use error::{ClientError, Result};
pub use request::{Consistency, Query, RequestKind};
pub use response::{EntryOutcome, Response};
