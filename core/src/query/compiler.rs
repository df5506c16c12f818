use log::debug;

use super::ast::{
    Argument, Column, Columns, FunctionCall, Literal, Predicate, SelectStatement, StaticValue,
    TableRef,
};
use super::literal::encode_static;
use super::order::ColumnsOrder;
use crate::error::{CoreError, Result};
use crate::tag::Tag;
use crate::types::ValueCodec;

/// Compile `statement` into `request` (a `RecollectionRequest`)
///
/// Nothing is added to `request` unless the whole statement compiles.
/// Returns the column order when the statement names its columns.
pub fn compile_select(
    request: &mut Tag,
    statement: &SelectStatement,
    default_tablespace: Option<&str>,
    codec: &ValueCodec,
) -> Result<Option<ColumnsOrder>> {
    let mut tags = Vec::new();

    let (tablespace, table) = match &statement.from {
        TableRef::Table(table) => {
            let tablespace = default_tablespace.ok_or_else(|| {
                CoreError::Compile(
                    "No tablespace specified and no default tablespace set".to_string(),
                )
            })?;
            (tablespace, table.as_str())
        }
        TableRef::Qualified { tablespace, table } => (tablespace.as_str(), table.as_str()),
    };
    tags.push(Tag::with_value("TablespaceName", tablespace)?);
    tags.push(Tag::with_value("TableName", table)?);

    if let Columns::List(columns) = &statement.columns {
        let mut list = Tag::new("RetrieveList")?;
        for column in columns {
            list.add_child(retrieve_column(column, codec)?)?;
        }
        tags.push(list);
    }

    if !statement.predicates.is_empty() {
        let mut filters = Tag::new("FilterList")?;
        for predicate in &statement.predicates {
            filters.add_child(filter(predicate, codec)?)?;
        }
        tags.push(filters);
    }

    for tag in tags {
        request.add_child(tag)?;
    }
    debug!("Compiled query on {}.{}", tablespace, table);
    ColumnsOrder::from_request(request)
}

fn retrieve_column(column: &Column, codec: &ValueCodec) -> Result<Tag> {
    match column {
        Column::Field(name) => Tag::with_value("RetField", name.as_str()),
        Column::Compute {
            function,
            alias,
            result_type,
        } => {
            let mut tag = Tag::new("RetCompute")?;
            if let Some(alias) = alias {
                tag.add_value("RetComputeAlias", alias.as_str())?;
            }
            if let Some(result_type) = result_type {
                tag.add_value("RetComputeType", result_type.as_str())?;
            }
            function_into(&mut tag, function, codec)?;
            Ok(tag)
        }
    }
}

fn filter(predicate: &Predicate, codec: &ValueCodec) -> Result<Tag> {
    let mut tag = Tag::new("Filter")?;
    match predicate {
        Predicate::In { field, values } => {
            tag.add_value("FilterField", field.as_str())?;
            tag.add_value("FunctionName", "IN")?;
            for value in values {
                argument_into(&mut tag, value, codec)?;
            }
        }
        Predicate::Compare {
            field,
            comparator,
            value,
        } => {
            tag.add_value("FilterField", field.as_str())?;
            tag.add_value("FunctionName", comparator.as_str())?;
            argument_into(&mut tag, value, codec)?;
        }
    }
    Ok(tag)
}

fn function_into(tag: &mut Tag, function: &FunctionCall, codec: &ValueCodec) -> Result<()> {
    match function {
        FunctionCall::Function { name, args } => {
            tag.add_value("FunctionName", name.as_str())?;
            for arg in args {
                argument_into(tag, arg, codec)?;
            }
        }
        FunctionCall::Cast {
            expression,
            data_type,
        } => {
            tag.add_value("FunctionName", "CAST")?;
            argument_into(tag, expression, codec)?;
            let target = StaticValue::new(Literal::String(data_type.clone()));
            static_into(tag, &target, codec)?;
        }
    }
    Ok(())
}

fn argument_into(tag: &mut Tag, argument: &Argument, codec: &ValueCodec) -> Result<()> {
    match argument {
        Argument::Reference(name) => {
            tag.add_value("FunArgumentReference", name.as_str())?;
        }
        Argument::Function(function) => {
            let mut nested = Tag::new("FunArgumentFunction")?;
            function_into(&mut nested, function, codec)?;
            tag.add_child(nested)?;
        }
        Argument::Static(value) => static_into(tag, value, codec)?,
    }
    Ok(())
}

fn static_into(tag: &mut Tag, value: &StaticValue, codec: &ValueCodec) -> Result<()> {
    let (value_type, bytes) = encode_static(value, codec)?;
    let arg = tag.add_container("FunArgumentStatic")?;
    arg.add_value("ArgStaticType", value_type.as_str())?;
    arg.add_data("ArgStaticValue", bytes)?;
    Ok(())
}
