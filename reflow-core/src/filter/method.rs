//! Filter strategies.
//!
//! A strategy is picked once per column when a panel is built, never looked
//! up by name while filtering.

use serde::{Deserialize, Serialize};

use super::table::{Datum, Table};
use super::FilterError;

/// How a column is filtered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterMethod {
    /// Keep numbers within an inclusive range.
    Between,

    /// Keep values whose label is one of the selected choices.
    IsIn,
}

/// The user's current choice for one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selection {
    Range(f64, f64),
    Set(Vec<String>),
}

impl Selection {
    fn kind(&self) -> &'static str {
        match self {
            Selection::Range(..) => "range",
            Selection::Set(_) => "set",
        }
    }
}

impl FilterMethod {
    /// Whether `datum` passes `selection`.
    pub fn matches(self, datum: &Datum, selection: &Selection) -> Result<bool, FilterError> {
        match (self, selection) {
            (FilterMethod::Between, Selection::Range(low, high)) => {
                let value = datum.as_number().ok_or_else(|| FilterError::NotNumeric {
                    value: datum.label(),
                })?;
                Ok(*low <= value && value <= *high)
            }
            (FilterMethod::IsIn, Selection::Set(choices)) => {
                let label = datum.label();
                Ok(choices.iter().any(|choice| *choice == label))
            }
            (method, selection) => Err(FilterError::SelectionMismatch {
                method,
                selection: selection.kind(),
            }),
        }
    }
}

/// The filter for one column together with its initial selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnFilter {
    pub column: String,
    pub method: FilterMethod,
    pub initial: Selection,
}

impl ColumnFilter {
    /// Choose a strategy from the column's contents.
    ///
    /// Numeric columns get `Between` over their full range. Everything else
    /// gets `IsIn` over its sorted distinct labels. Either way the initial
    /// selection keeps every row.
    pub fn infer(table: &Table, column: &str) -> Result<Self, FilterError> {
        if table.is_numeric(column)? {
            let numbers: Vec<f64> = table
                .column(column)?
                .into_iter()
                .filter_map(Datum::as_number)
                .collect();
            let low = numbers.iter().copied().fold(f64::INFINITY, f64::min);
            let high = numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max);

            return Ok(Self {
                column: column.to_owned(),
                method: FilterMethod::Between,
                initial: Selection::Range(low, high),
            });
        }

        let mut labels: Vec<String> = table
            .column(column)?
            .into_iter()
            .map(Datum::label)
            .collect();
        labels.sort();
        labels.dedup();

        Ok(Self {
            column: column.to_owned(),
            method: FilterMethod::IsIn,
            initial: Selection::Set(labels),
        })
    }

    /// Infer a filter for each of `columns`.
    pub fn infer_all<S: AsRef<str>>(table: &Table, columns: &[S]) -> Result<Vec<Self>, FilterError> {
        columns
            .iter()
            .map(|column| Self::infer(table, column.as_ref()))
            .collect()
    }

    /// Name of the input cell holding this column's selection.
    pub fn input_name(&self) -> String {
        format!("filter_{}", self.column)
    }
}
