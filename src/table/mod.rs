// Tabular input module
// Loads inspection tables and flattens rows into text units for chunking

pub mod reader;


use std::collections::HashMap;
use std::fmt;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

pub use reader::{TableFormat, read_records};

/// A single scalar cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum CellValue {
    Text(String),
    Integer(i64),
    Number(f64),
    Bool(bool),
    #[default]
    Empty,
}

impl CellValue {
    #[inline]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(text) => text.is_empty(),
            Self::Number(n) => n.is_nan(),
            Self::Integer(_) | Self::Bool(_) => false,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Integer(n) => write!(f, "{}", n),
            // Spreadsheets hand back integers as floats; print 200 rather than 200.0
            Self::Number(n) if n.is_nan() => Ok(()),
            Self::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Self::Number(n) => write!(f, "{}", n),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Empty => Ok(()),
        }
    }
}

impl From<&str> for CellValue {
    #[inline]
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    #[inline]
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for CellValue {
    #[inline]
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for CellValue {
    #[inline]
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

/// One row of the source table, keyed by column name
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    pub fields: HashMap<String, CellValue>,
}

impl Record {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn with(mut self, column: impl Into<String>, value: impl Into<CellValue>) -> Self {
        self.insert(column, value);
        self
    }

    #[inline]
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<CellValue>) {
        self.fields.insert(column.into(), value.into());
    }

    #[inline]
    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.fields.get(column)
    }

    /// Rendered value, or an empty string for missing cells
    #[inline]
    pub fn value_or_empty(&self, column: &str) -> String {
        self.get(column).map(ToString::to_string).unwrap_or_default()
    }
}

impl<K: Into<String>, V: Into<CellValue>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Flattened text for one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextUnit {
    /// Zero-based position of the record in the source table
    pub row: usize,
    pub text: String,
    /// False when every selected field was missing or empty
    pub populated: bool,
}

impl TextUnit {
    #[inline]
    pub fn new(row: usize, text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            row,
            populated: !text.trim().is_empty(),
            text,
        }
    }
}

/// Render each record as `field: value` lines in the given field order.
///
/// Missing or empty cells render as empty values; records are never dropped
/// or reordered. Line breaks inside a value become single spaces so every
/// field stays on its own line.
#[inline]
pub fn flatten<S: AsRef<str>>(records: &[Record], fields: &[S]) -> Vec<TextUnit> {
    records
        .iter()
        .enumerate()
        .map(|(row, record)| {
            let mut populated = false;
            let lines: Vec<String> = fields
                .iter()
                .map(|field| {
                    let field = field.as_ref();
                    let value = single_line(&record.value_or_empty(field));
                    populated |= !value.trim().is_empty();
                    format!("{}: {}", field, value)
                })
                .collect();

            TextUnit {
                row,
                text: lines.join("\n"),
                populated,
            }
        })
        .collect()
}

fn single_line(value: &str) -> String {
    if !value.contains(['\r', '\n']) {
        return value.to_string();
    }
    value
        .split(['\r', '\n'])
        .filter(|part| !part.is_empty())
        .join(" ")
}
