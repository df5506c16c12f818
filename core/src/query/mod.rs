//! Query compiler
//!
//! Turns a parsed SELECT into the children of a `RecollectionRequest`:
//! `TablespaceName`, `TableName`, an optional `RetrieveList` and an optional
//! `FilterList`. The [`ColumnsOrder`] it returns lets result rows be put back
//! into the requested column positions.

pub mod ast;
mod compiler;
mod literal;
mod order;
mod sql;

pub use ast::{
    Argument, Column, Columns, Comparator, FunctionCall, Literal, Predicate, SelectStatement,
    StaticValue, TableRef,
};
pub use compiler::compile_select;
pub use literal::{encode_static, natural_type};
pub use order::ColumnsOrder;
pub use sql::{compile_sql, parse_select};
