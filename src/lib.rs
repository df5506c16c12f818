//! TiesDB client driver
//!
//! Workspace-level documentation. The implementation lives in the member
//! crates:
//! - `tiesdb-core`: tag codec, type codec, signed records, payment cheques
//!   and the query compiler
//! - `tiesdb-client`: sans-IO driver building requests and interpreting
//!   responses

/// Returns the version of the package.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
