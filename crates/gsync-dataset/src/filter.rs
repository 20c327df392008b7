//! Subset filter expressions.
//!
//! A layer may carry a row filter that hides records from readers. The
//! expression grammar is deliberately small:
//!
//! ```text
//! <field> <op> <literal>        op: = != <> < <= > >=
//! <field> IS NULL
//! <field> IS NOT NULL
//! ```
//!
//! Literals are single-quoted text (`''` escapes a quote), a bare number, or
//! `NULL`. A literal is read with the declared type of its field before
//! comparison, so `date_maj >= '2024-01-01'` compares dates, not text.

use std::cmp::Ordering;
use std::fmt;

use crate::dataset::Record;
use crate::schema::Schema;
use crate::value::{ParseValueError, Value};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    IsNull,
    IsNotNull,
}

/// Parsed, schema-bound filter.
#[derive(Clone, Debug, PartialEq)]
pub struct SubsetFilter {
    field_index: usize,
    op: FilterOp,
    literal: Value,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FilterError {
    Empty,
    Syntax(String),
    UnknownField(String),
    Literal(ParseValueError),
}

impl fmt::Display for FilterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty filter expression"),
            Self::Syntax(msg) => write!(f, "filter syntax error: {msg}"),
            Self::UnknownField(name) => write!(f, "filter references unknown field '{name}'"),
            Self::Literal(e) => write!(f, "filter literal: {e}"),
        }
    }
}

impl std::error::Error for FilterError {}

impl SubsetFilter {
    pub fn parse(expr: &str, schema: &Schema) -> Result<Self, FilterError> {
        let expr = expr.trim();
        if expr.is_empty() {
            return Err(FilterError::Empty);
        }

        let (field, rest) = split_identifier(expr)?;
        let field_index = schema
            .index_of(&field)
            .ok_or_else(|| FilterError::UnknownField(field.clone()))?;
        let field_type = schema.fields()[field_index].field_type;
        let rest = rest.trim_start();

        let upper = rest.to_ascii_uppercase();
        if upper == "IS NULL" {
            return Ok(Self {
                field_index,
                op: FilterOp::IsNull,
                literal: Value::Null,
            });
        }
        if upper == "IS NOT NULL" {
            return Ok(Self {
                field_index,
                op: FilterOp::IsNotNull,
                literal: Value::Null,
            });
        }

        let (op, rest) = split_operator(rest)?;
        let literal = match parse_literal(rest.trim())? {
            Literal::Null => Value::Null,
            Literal::Raw(raw) => Value::parse_as(field_type, &raw).map_err(FilterError::Literal)?,
        };
        Ok(Self {
            field_index,
            op,
            literal,
        })
    }

    /// `true` if `record` is visible through this filter.
    ///
    /// Comparisons against null are never true, as in SQL.
    pub fn matches(&self, record: &Record) -> bool {
        let v = record.value_at(self.field_index);
        match self.op {
            FilterOp::IsNull => v.is_null(),
            FilterOp::IsNotNull => !v.is_null(),
            op => {
                if v.is_null() || self.literal.is_null() {
                    return false;
                }
                match v.compare(&self.literal) {
                    Some(ord) => op_accepts(op, ord),
                    None => false,
                }
            }
        }
    }
}

fn op_accepts(op: FilterOp, ord: Ordering) -> bool {
    match op {
        FilterOp::Eq => ord == Ordering::Equal,
        FilterOp::Ne => ord != Ordering::Equal,
        FilterOp::Lt => ord == Ordering::Less,
        FilterOp::Le => ord != Ordering::Greater,
        FilterOp::Gt => ord == Ordering::Greater,
        FilterOp::Ge => ord != Ordering::Less,
        FilterOp::IsNull | FilterOp::IsNotNull => false,
    }
}

/// Field name, optionally double-quoted.
fn split_identifier(s: &str) -> Result<(String, &str), FilterError> {
    if let Some(rest) = s.strip_prefix('"') {
        let end = rest
            .find('"')
            .ok_or_else(|| FilterError::Syntax("unterminated quoted field name".to_string()))?;
        return Ok((rest[..end].to_string(), &rest[end + 1..]));
    }
    let end = s
        .find(|c: char| !(c.is_alphanumeric() || c == '_'))
        .unwrap_or(s.len());
    if end == 0 {
        return Err(FilterError::Syntax(format!("expected field name in '{s}'")));
    }
    Ok((s[..end].to_string(), &s[end..]))
}

fn split_operator(s: &str) -> Result<(FilterOp, &str), FilterError> {
    // Two-character operators first.
    const OPS: &[(&str, FilterOp)] = &[
        ("!=", FilterOp::Ne),
        ("<>", FilterOp::Ne),
        ("<=", FilterOp::Le),
        (">=", FilterOp::Ge),
        ("=", FilterOp::Eq),
        ("<", FilterOp::Lt),
        (">", FilterOp::Gt),
    ];
    OPS.iter()
        .find_map(|(tok, op)| s.strip_prefix(tok).map(|rest| (*op, rest)))
        .ok_or_else(|| FilterError::Syntax(format!("expected comparison operator in '{s}'")))
}

enum Literal {
    Null,
    Raw(String),
}

fn parse_literal(s: &str) -> Result<Literal, FilterError> {
    if s.is_empty() {
        return Err(FilterError::Syntax("missing literal".to_string()));
    }
    if s.eq_ignore_ascii_case("null") {
        return Ok(Literal::Null);
    }
    if let Some(body) = s.strip_prefix('\'') {
        let body = body
            .strip_suffix('\'')
            .ok_or_else(|| FilterError::Syntax("unterminated text literal".to_string()))?;
        return Ok(Literal::Raw(body.replace("''", "'")));
    }
    if s.contains(char::is_whitespace) {
        return Err(FilterError::Syntax(format!("unexpected trailing input in '{s}'")));
    }
    Ok(Literal::Raw(s.to_string()))
}
