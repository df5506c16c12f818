//! Data models for TiesDB rows
//!
//! This module provides the client-side view of a row: typed fields and the
//! records that are signed into entries.

mod field;
mod record;

pub use field::{Field, Representation};
pub use record::{Placement, Record};
