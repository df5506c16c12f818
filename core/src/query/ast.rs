//! Parsed query shape consumed by the compiler

use std::fmt::{Display, Formatter, Result as FmtResult};

use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use uuid::Uuid;

use crate::types::ValueType;

/// The table a query reads
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableRef {
    /// Table in the caller's default tablespace
    Table(String),
    /// Tablespace-qualified table
    Qualified {
        /// Tablespace name
        tablespace: String,
        /// Table name
        table: String,
    },
}

/// A single SELECT statement
#[derive(Debug, Clone, PartialEq)]
pub struct SelectStatement {
    /// Source table
    pub from: TableRef,
    /// Requested columns
    pub columns: Columns,
    /// Predicates, implicitly AND-ed
    pub predicates: Vec<Predicate>,
}

/// Projection of a statement
#[derive(Debug, Clone, PartialEq)]
pub enum Columns {
    /// `*`
    All,
    /// Explicit column list, in request order
    List(Vec<Column>),
}

/// One requested column
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    /// A stored field, by name
    Field(String),
    /// A computed column
    Compute {
        /// Function producing the column
        function: FunctionCall,
        /// Name the result is returned under
        alias: Option<String>,
        /// Type the result is converted to
        result_type: Option<String>,
    },
}

/// A function application
#[derive(Debug, Clone, PartialEq)]
pub enum FunctionCall {
    /// Named function
    Function {
        /// Function name
        name: String,
        /// Arguments, in order
        args: Vec<Argument>,
    },
    /// `CAST(expression AS data_type)`
    Cast {
        /// Converted expression
        expression: Box<Argument>,
        /// Target type as written
        data_type: String,
    },
}

/// A function or filter argument
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    /// Reference to a field
    Reference(String),
    /// Nested function
    Function(FunctionCall),
    /// Literal value
    Static(StaticValue),
}

/// Literal value as parsed
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// Integer literal
    Integer(BigInt),
    /// Decimal literal
    Decimal(BigDecimal),
    /// UUID literal
    Uuid(Uuid),
    /// `TRUE` / `FALSE`
    Boolean(bool),
    /// String literal
    String(String),
}

impl Literal {
    /// Kind name used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Literal::Integer(_) => "INTEGER",
            Literal::Decimal(_) => "DECIMAL",
            Literal::Uuid(_) => "UUID",
            Literal::Boolean(_) => "BOOLEAN",
            Literal::String(_) => "STRING",
        }
    }
}

impl Display for Literal {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Literal::Integer(value) => write!(f, "{}", value),
            Literal::Decimal(value) => write!(f, "{}", value),
            Literal::Uuid(value) => write!(f, "{}", value),
            Literal::Boolean(value) => write!(f, "{}", value),
            Literal::String(value) => write!(f, "'{}'", value),
        }
    }
}

/// A literal with an optional requested wire type
#[derive(Debug, Clone, PartialEq)]
pub struct StaticValue {
    /// The literal
    pub literal: Literal,
    /// Wire type; the literal's natural type when absent
    pub target: Option<ValueType>,
}

impl StaticValue {
    /// A literal sent in its natural type
    pub fn new(literal: Literal) -> Self {
        Self {
            literal,
            target: None,
        }
    }

    /// A literal converted to `target`
    pub fn typed(literal: Literal, target: ValueType) -> Self {
        Self {
            literal,
            target: Some(target),
        }
    }
}

impl From<Literal> for Argument {
    fn from(literal: Literal) -> Self {
        Argument::Static(StaticValue::new(literal))
    }
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    /// `=`
    Eq,
    /// `!=` or `<>`
    NotEq,
    /// `<`
    Lt,
    /// `<=`
    LtEq,
    /// `>`
    Gt,
    /// `>=`
    GtEq,
}

impl Comparator {
    /// Function name sent on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            Comparator::Eq => "=",
            Comparator::NotEq => "!=",
            Comparator::Lt => "<",
            Comparator::LtEq => "<=",
            Comparator::Gt => ">",
            Comparator::GtEq => ">=",
        }
    }
}

/// A WHERE predicate on a field
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// `field IN (values...)`
    In {
        /// Filtered field
        field: String,
        /// Candidate values
        values: Vec<Argument>,
    },
    /// `field <op> value`
    Compare {
        /// Filtered field
        field: String,
        /// Operator
        comparator: Comparator,
        /// Right-hand side
        value: Argument,
    },
}
