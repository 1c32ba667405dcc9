//! Lookup criteria - equality-style WHERE conditions understood by every engine

use std::fmt;

use serde_json::Value;

use crate::record::Record;
use crate::security::escape_identifier;

/// Condition operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equal,
    In,
    IsNull,
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operator::Equal => write!(f, "="),
            Operator::In => write!(f, "IN"),
            Operator::IsNull => write!(f, "IS NULL"),
        }
    }
}

/// A single column condition
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub column: String,
    pub operator: Operator,
    pub value: Option<Value>,
    /// Operands for `IN`
    pub values: Vec<Value>,
}

impl Condition {
    /// Evaluate against a record's columns
    pub fn matches(&self, record: &Record) -> bool {
        let actual = record.get(&self.column);
        match self.operator {
            Operator::Equal => match (actual, &self.value) {
                (Some(actual), Some(expected)) => values_equal(actual, expected),
                _ => false,
            },
            Operator::In => actual
                .map(|actual| self.values.iter().any(|expected| values_equal(actual, expected)))
                .unwrap_or(false),
            Operator::IsNull => actual.map(Value::is_null).unwrap_or(true),
        }
    }
}

/// A conjunction of conditions. An empty criteria matches every record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Criteria {
    conditions: Vec<Condition>,
}

impl Criteria {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add WHERE condition with equality
    pub fn where_eq<T>(mut self, column: &str, value: T) -> Self
    where
        T: Into<Value>,
    {
        self.conditions.push(Condition {
            column: column.to_string(),
            operator: Operator::Equal,
            value: Some(value.into()),
            values: Vec::new(),
        });
        self
    }

    /// Add WHERE IN condition
    pub fn where_in<T>(mut self, column: &str, values: Vec<T>) -> Self
    where
        T: Into<Value>,
    {
        self.conditions.push(Condition {
            column: column.to_string(),
            operator: Operator::In,
            value: None,
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Add WHERE IS NULL condition
    pub fn where_null(mut self, column: &str) -> Self {
        self.conditions.push(Condition {
            column: column.to_string(),
            operator: Operator::IsNull,
            value: None,
            values: Vec::new(),
        });
        self
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// True if every condition holds for the record
    pub fn matches(&self, record: &Record) -> bool {
        self.conditions.iter().all(|condition| condition.matches(record))
    }

    /// Render as a PostgreSQL WHERE clause with numbered placeholders
    /// starting at `$first_param`. Returns an empty clause for no conditions.
    pub fn to_sql(&self, first_param: usize) -> (String, Vec<Value>) {
        if self.conditions.is_empty() {
            return (String::new(), Vec::new());
        }

        let mut params = Vec::new();
        let mut clauses = Vec::with_capacity(self.conditions.len());

        for condition in &self.conditions {
            let column = escape_identifier(&condition.column);
            match condition.operator {
                Operator::Equal => {
                    let value = condition.value.clone().unwrap_or(Value::Null);
                    if value.is_null() {
                        clauses.push(format!("{} IS NULL", column));
                    } else {
                        params.push(value);
                        clauses.push(format!("{} = ${}", column, first_param + params.len() - 1));
                    }
                }
                Operator::In => {
                    if condition.values.is_empty() {
                        clauses.push("FALSE".to_string());
                        continue;
                    }
                    let placeholders: Vec<String> = condition
                        .values
                        .iter()
                        .map(|value| {
                            params.push(value.clone());
                            format!("${}", first_param + params.len() - 1)
                        })
                        .collect();
                    clauses.push(format!("{} IN ({})", column, placeholders.join(", ")));
                }
                Operator::IsNull => clauses.push(format!("{} IS NULL", column)),
            }
        }

        (format!(" WHERE {}", clauses.join(" AND ")), params)
    }
}

/// Column equality that tolerates numeric ids stored as text
pub fn values_equal(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => a == b,
        },
        (Value::String(s), Value::Number(n)) | (Value::Number(n), Value::String(s)) => {
            s == &n.to_string()
        }
        _ => actual == expected,
    }
}
