//! SQL text front end
//!
//! Parses a single `SELECT` with `sqlparser` and lowers it to a
//! [`SelectStatement`]. Supported: `*` or a column list of fields and
//! function/`CAST` calls (optionally aliased), one optionally qualified table,
//! and a `WHERE` made of `AND`-joined comparisons and `IN` lists whose left
//! side is a field. Typed strings (`UUID '...'`, `TIMESTAMP '...'`) become
//! literals of that type.

use std::str::FromStr;

use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use sqlparser::ast::{
    BinaryOperator, DataType, Expr, FunctionArg, FunctionArgExpr, GroupByExpr, Ident, SelectItem,
    SetExpr, Statement, TableFactor, UnaryOperator, Value,
};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use uuid::Uuid;

use super::ast::{
    Argument, Column, Columns, Comparator, FunctionCall, Literal, Predicate, SelectStatement,
    StaticValue, TableRef,
};
use super::compiler::compile_select;
use super::order::ColumnsOrder;
use crate::error::{to_compile_error, CoreError, Result};
use crate::tag::Tag;
use crate::types::{ValueCodec, ValueType};

fn unsupported(what: impl std::fmt::Display) -> CoreError {
    CoreError::Compile(format!("Unsupported {}", what))
}

/// Parse SQL text into a [`SelectStatement`]
pub fn parse_select(sql: &str) -> Result<SelectStatement> {
    let mut statements = Parser::parse_sql(&GenericDialect {}, sql).map_err(to_compile_error)?;
    if statements.len() != 1 {
        return Err(CoreError::Compile(format!(
            "Expected one statement, got {}",
            statements.len()
        )));
    }
    let query = match statements.remove(0) {
        Statement::Query(query) => *query,
        other => return Err(unsupported(format_args!("statement: {}", other))),
    };
    if query.with.is_some()
        || !query.order_by.is_empty()
        || query.limit.is_some()
        || query.offset.is_some()
    {
        return Err(unsupported("query clause: only SELECT ... FROM ... WHERE is accepted"));
    }
    let select = match *query.body {
        SetExpr::Select(select) => *select,
        other => return Err(unsupported(format_args!("query body: {}", other))),
    };
    let grouped = !matches!(&select.group_by, GroupByExpr::Expressions(exprs) if exprs.is_empty());
    if select.distinct.is_some() || grouped || select.having.is_some() {
        return Err(unsupported("DISTINCT, GROUP BY or HAVING"));
    }

    if select.from.len() != 1 || !select.from[0].joins.is_empty() {
        return Err(unsupported("FROM: exactly one table without joins is accepted"));
    }
    let from = match &select.from[0].relation {
        TableFactor::Table { name, .. } => table_ref(&name.0)?,
        other => return Err(unsupported(format_args!("table: {}", other))),
    };

    let columns = columns(select.projection)?;

    let mut predicates = Vec::new();
    if let Some(selection) = select.selection {
        collect_predicates(selection, &mut predicates)?;
    }

    Ok(SelectStatement {
        from,
        columns,
        predicates,
    })
}

/// Parse SQL text and compile it into `request`
pub fn compile_sql(
    request: &mut Tag,
    sql: &str,
    default_tablespace: Option<&str>,
    codec: &ValueCodec,
) -> Result<Option<ColumnsOrder>> {
    let statement = parse_select(sql)?;
    compile_select(request, &statement, default_tablespace, codec)
}

fn table_ref(name: &[Ident]) -> Result<TableRef> {
    match name {
        [table] => Ok(TableRef::Table(table.value.clone())),
        [tablespace, table] => Ok(TableRef::Qualified {
            tablespace: tablespace.value.clone(),
            table: table.value.clone(),
        }),
        _ => Err(unsupported("table name: expected table or tablespace.table")),
    }
}

fn columns(projection: Vec<SelectItem>) -> Result<Columns> {
    if matches!(projection.as_slice(), [SelectItem::Wildcard(_)]) {
        return Ok(Columns::All);
    }
    projection
        .into_iter()
        .map(|item| match item {
            SelectItem::UnnamedExpr(Expr::Identifier(ident)) => Ok(Column::Field(ident.value)),
            SelectItem::UnnamedExpr(expr) => compute_column(expr, None),
            SelectItem::ExprWithAlias { expr, alias } => compute_column(expr, Some(alias.value)),
            other => Err(unsupported(format_args!("column: {}", other))),
        })
        .collect::<Result<Vec<_>>>()
        .map(Columns::List)
}

fn compute_column(expr: Expr, alias: Option<String>) -> Result<Column> {
    Ok(Column::Compute {
        function: function_call(expr)?,
        alias,
        result_type: None,
    })
}

fn function_call(expr: Expr) -> Result<FunctionCall> {
    match expr {
        Expr::Function(function) => {
            let name = function
                .name
                .0
                .iter()
                .map(|ident| ident.value.as_str())
                .collect::<Vec<_>>()
                .join(".");
            let args = function
                .args
                .into_iter()
                .map(|arg| match arg {
                    FunctionArg::Unnamed(FunctionArgExpr::Expr(expr)) => argument(expr),
                    other => Err(unsupported(format_args!("function argument: {}", other))),
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(FunctionCall::Function { name, args })
        }
        Expr::Cast {
            expr, data_type, ..
        } => Ok(FunctionCall::Cast {
            expression: Box::new(argument(*expr)?),
            data_type: data_type.to_string(),
        }),
        Expr::Nested(inner) => function_call(*inner),
        other => Err(unsupported(format_args!("expression: {}", other))),
    }
}

fn argument(expr: Expr) -> Result<Argument> {
    match expr {
        Expr::Identifier(ident) => Ok(Argument::Reference(ident.value)),
        Expr::Function(_) | Expr::Cast { .. } => Ok(Argument::Function(function_call(expr)?)),
        Expr::Nested(inner) => argument(*inner),
        other => Ok(Argument::Static(static_value(other)?)),
    }
}

fn static_value(expr: Expr) -> Result<StaticValue> {
    match expr {
        Expr::Value(value) => literal(value).map(StaticValue::new),
        Expr::UnaryOp {
            op: UnaryOperator::Minus,
            expr,
        } => match *expr {
            Expr::Value(Value::Number(text, _)) => {
                number(&format!("-{}", text)).map(StaticValue::new)
            }
            other => Err(unsupported(format_args!("negation of {}", other))),
        },
        Expr::TypedString { data_type, value } => typed_string(&data_type, value),
        other => Err(unsupported(format_args!("literal: {}", other))),
    }
}

fn literal(value: Value) -> Result<Literal> {
    match value {
        Value::Number(text, _) => number(&text),
        Value::SingleQuotedString(text) => Ok(Literal::String(text)),
        Value::Boolean(flag) => Ok(Literal::Boolean(flag)),
        other => Err(unsupported(format_args!("literal: {}", other))),
    }
}

fn number(text: &str) -> Result<Literal> {
    if text.contains(['.', 'e', 'E']) {
        BigDecimal::from_str(text)
            .map(Literal::Decimal)
            .map_err(to_compile_error)
    } else {
        BigInt::from_str(text)
            .map(Literal::Integer)
            .map_err(to_compile_error)
    }
}

fn typed_string(data_type: &DataType, value: String) -> Result<StaticValue> {
    if let DataType::Uuid = data_type {
        let uuid = Uuid::parse_str(&value).map_err(to_compile_error)?;
        return Ok(StaticValue::new(Literal::Uuid(uuid)));
    }
    let target = ValueType::from_str(&data_type.to_string())
        .map_err(|_| unsupported(format_args!("literal type: {}", data_type)))?;
    Ok(StaticValue::typed(Literal::String(value), target))
}

fn comparator(op: &BinaryOperator) -> Option<Comparator> {
    match op {
        BinaryOperator::Eq => Some(Comparator::Eq),
        BinaryOperator::NotEq => Some(Comparator::NotEq),
        BinaryOperator::Lt => Some(Comparator::Lt),
        BinaryOperator::LtEq => Some(Comparator::LtEq),
        BinaryOperator::Gt => Some(Comparator::Gt),
        BinaryOperator::GtEq => Some(Comparator::GtEq),
        _ => None,
    }
}

fn field_name(expr: Expr) -> Result<String> {
    match expr {
        Expr::Identifier(ident) => Ok(ident.value),
        other => Err(CoreError::Compile(format!(
            "Operator lvalue should be field identifier, got {}",
            other
        ))),
    }
}

fn collect_predicates(expr: Expr, out: &mut Vec<Predicate>) -> Result<()> {
    match expr {
        Expr::BinaryOp {
            left,
            op: BinaryOperator::And,
            right,
        } => {
            collect_predicates(*left, out)?;
            collect_predicates(*right, out)
        }
        Expr::Nested(inner) => collect_predicates(*inner, out),
        Expr::BinaryOp { left, op, right } => {
            let comparator = comparator(&op)
                .ok_or_else(|| unsupported(format_args!("operator: {}", op)))?;
            out.push(Predicate::Compare {
                field: field_name(*left)?,
                comparator,
                value: argument(*right)?,
            });
            Ok(())
        }
        Expr::InList {
            expr,
            list,
            negated: false,
        } => {
            out.push(Predicate::In {
                field: field_name(*expr)?,
                values: list.into_iter().map(argument).collect::<Result<Vec<_>>>()?,
            });
            Ok(())
        }
        other => Err(unsupported(format_args!("predicate: {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_in() {
        let statement = parse_select(concat!(
            r#"SELECT Id FROM "ts"."tbl" WHERE Id IN ("#,
            "UUID '1b4e28ba-2fa1-11d2-883f-0016d3cca427', ",
            "UUID '6ba7b810-9dad-11d1-80b4-00c04fd430c8')",
        ))
        .unwrap();
        assert_eq!(
            statement.from,
            TableRef::Qualified {
                tablespace: "ts".to_string(),
                table: "tbl".to_string()
            }
        );
        assert_eq!(statement.columns, Columns::List(vec![Column::Field("Id".to_string())]));
        match &statement.predicates[..] {
            [Predicate::In { field, values }] => {
                assert_eq!(field, "Id");
                assert_eq!(values.len(), 2);
                assert!(matches!(
                    &values[0],
                    Argument::Static(StaticValue { literal: Literal::Uuid(_), target: None })
                ));
            }
            other => panic!("unexpected predicates {:?}", other),
        }

        let mut request = Tag::new("RecollectionRequest").unwrap();
        let order = compile_select(&mut request, &statement, None, &ValueCodec::default())
            .unwrap()
            .unwrap();
        assert_eq!(order.fields["Id"], 0);
        let filter = request.child("FilterList").unwrap().child("Filter").unwrap();
        assert_eq!(filter.child_text("FunctionName").unwrap(), "IN");
        assert_eq!(filter.children_named("FunArgumentStatic").count(), 2);
    }

    #[test]
    fn test_select_star_with_comparisons() {
        let statement = parse_select(
            "SELECT * FROM all_types WHERE fLong >= -3 AND (fString = 'x' AND fDecimal < 1.5)",
        )
        .unwrap();
        assert_eq!(statement.from, TableRef::Table("all_types".to_string()));
        assert_eq!(statement.columns, Columns::All);
        assert_eq!(statement.predicates.len(), 3);
        assert_eq!(
            statement.predicates[0],
            Predicate::Compare {
                field: "fLong".to_string(),
                comparator: Comparator::GtEq,
                value: Literal::Integer(BigInt::from(-3)).into(),
            }
        );
        assert!(matches!(
            &statement.predicates[2],
            Predicate::Compare {
                comparator: Comparator::Lt,
                value: Argument::Static(StaticValue { literal: Literal::Decimal(_), .. }),
                ..
            }
        ));
    }

    #[test]
    fn test_functions_and_casts() {
        let statement = parse_select(
            "SELECT writeTime(fString) AS wt, CAST(fLong AS VARCHAR), Id FROM ts.tbl",
        )
        .unwrap();
        let Columns::List(columns) = &statement.columns else {
            panic!("expected a column list");
        };
        assert_eq!(columns.len(), 3);
        assert_eq!(
            columns[0],
            Column::Compute {
                function: FunctionCall::Function {
                    name: "writeTime".to_string(),
                    args: vec![Argument::Reference("fString".to_string())],
                },
                alias: Some("wt".to_string()),
                result_type: None,
            }
        );
        assert_eq!(
            columns[1],
            Column::Compute {
                function: FunctionCall::Cast {
                    expression: Box::new(Argument::Reference("fLong".to_string())),
                    data_type: "VARCHAR".to_string(),
                },
                alias: None,
                result_type: None,
            }
        );

        let mut request = Tag::new("RecollectionRequest").unwrap();
        let order = compile_sql(
            &mut request,
            "SELECT writeTime(fString) AS wt, CAST(fLong AS VARCHAR), Id FROM ts.tbl",
            None,
            &ValueCodec::default(),
        )
        .unwrap()
        .unwrap();
        assert_eq!(order.computed, [0, 1]);
        assert_eq!(order.fields["Id"], 2);
    }

    #[test]
    fn test_typed_string_literal() {
        let statement =
            parse_select("SELECT * FROM t WHERE fTime > TIMESTAMP '2001-01-01T00:00:01Z'").unwrap();
        assert!(matches!(
            &statement.predicates[0],
            Predicate::Compare {
                value: Argument::Static(StaticValue {
                    literal: Literal::String(_),
                    target: Some(ValueType::Time),
                }),
                ..
            }
        ));
    }

    #[test]
    fn test_rejected_queries() {
        for sql in [
            "INSERT INTO t VALUES (1)",
            "SELECT * FROM a, b",
            "SELECT * FROM t WHERE a = 1 OR b = 2",
            "SELECT * FROM t WHERE 1 = a",
            "SELECT * FROM t WHERE a NOT IN (1)",
            "SELECT * FROM t ORDER BY a",
            "SELECT * FROM t; SELECT * FROM u",
            "SELECT FROM WHERE",
        ] {
            assert!(
                matches!(parse_select(sql), Err(CoreError::Compile(_))),
                "{} should be rejected",
                sql
            );
        }
    }

    #[test]
    fn test_missing_tablespace() {
        let mut request = Tag::new("RecollectionRequest").unwrap();
        let err =
            compile_sql(&mut request, "SELECT * FROM t", None, &ValueCodec::default()).unwrap_err();
        assert!(matches!(err, CoreError::Compile(_)));
    }
}
