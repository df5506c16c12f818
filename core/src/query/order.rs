use std::collections::HashMap;

use crate::error::{CoreError, Result};
use crate::tag::Tag;

/// Positions of the columns a recollection request asked for
///
/// Plain fields are keyed by name; computed columns are listed in request
/// order. `total` is the number of requested columns, so positions at or
/// above it are free for fields the request did not name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnsOrder {
    /// Position of each requested field
    pub fields: HashMap<String, usize>,
    /// Position of each computed column
    pub computed: Vec<usize>,
    /// Number of requested columns
    pub total: usize,
}

impl ColumnsOrder {
    /// Read the order from a request's `RetrieveList`; `None` when the request
    /// has no explicit column list
    pub fn from_request(request: &Tag) -> Result<Option<Self>> {
        let Some(list) = request.child("RetrieveList") else {
            return Ok(None);
        };
        if list.children().is_empty() {
            return Ok(None);
        }

        let mut order = ColumnsOrder::default();
        for column in list.children() {
            match column.name() {
                "RetField" => {
                    order.fields.insert(column.text()?, order.total);
                }
                "RetCompute" => order.computed.push(order.total),
                other => {
                    return Err(CoreError::Compile(format!(
                        "Unknown column in RetrieveList: {}",
                        other
                    )))
                }
            }
            order.total += 1;
        }
        Ok(Some(order))
    }
}
