//! Row-oriented table of records.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::FilterError;

/// One cell of a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Datum {
    Number(f64),
    Text(String),
}

impl Datum {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Datum::Number(n) => Some(*n),
            Datum::Text(_) => None,
        }
    }

    /// The label used when the datum is matched against a set of choices.
    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Datum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Datum::Number(n) => write!(f, "{n}"),
            Datum::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for Datum {
    fn from(value: f64) -> Self {
        Datum::Number(value)
    }
}

impl From<&str> for Datum {
    fn from(value: &str) -> Self {
        Datum::Text(value.to_owned())
    }
}

/// A row: column name to datum, in column order.
pub type Record = IndexMap<String, Datum>;

/// An ordered collection of records.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Table {
    rows: Vec<Record>,
}

impl Table {
    pub fn new(rows: Vec<Record>) -> Self {
        Self { rows }
    }

    /// Parse a JSON array of objects.
    pub fn from_json(source: &str) -> Result<Self, FilterError> {
        Ok(serde_json::from_str(source)?)
    }

    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column names in first-seen order across all rows.
    pub fn columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = Vec::new();
        for row in &self.rows {
            for name in row.keys() {
                if !columns.contains(name) {
                    columns.push(name.clone());
                }
            }
        }
        columns
    }

    /// Every value of `column`, failing if a row lacks it.
    pub fn column(&self, column: &str) -> Result<Vec<&Datum>, FilterError> {
        self.rows
            .iter()
            .map(|row| {
                row.get(column).ok_or_else(|| FilterError::MissingColumn {
                    column: column.to_owned(),
                })
            })
            .collect()
    }

    /// Whether `column` is non-empty and holds only numbers.
    pub fn is_numeric(&self, column: &str) -> Result<bool, FilterError> {
        let values = self.column(column)?;
        Ok(!values.is_empty() && values.iter().all(|d| d.as_number().is_some()))
    }

    /// Keep the rows for which `predicate` returns true.
    pub fn try_filter<F>(&self, mut predicate: F) -> Result<Table, FilterError>
    where
        F: FnMut(&Record) -> Result<bool, FilterError>,
    {
        let mut rows = Vec::new();
        for row in &self.rows {
            if predicate(row)? {
                rows.push(row.clone());
            }
        }
        Ok(Table { rows })
    }
}

impl FromIterator<Record> for Table {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        Table {
            rows: iter.into_iter().collect(),
        }
    }
}
