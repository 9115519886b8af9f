//! Column Filters
//!
//! The business logic of the filter-panel apps: a small table type, a
//! closed set of filter strategies, and a [`FilterPanel`] module that wires
//! one input cell per column into a memo of the filtered rows.
//!
//! None of this is special to the engine. The panel's memo is an ordinary
//! compute function that happens to read a handful of cells.

mod method;
mod panel;
mod table;

pub use method::{ColumnFilter, FilterMethod, Selection};
pub use panel::{FilterPanel, FILTERED};
pub use table::{Datum, Record, Table};

use thiserror::Error;

use crate::error::ReactiveError;

/// Errors raised while filtering.
#[derive(Debug, Error)]
pub enum FilterError {
    #[error("column `{column}` is missing from a row")]
    MissingColumn { column: String },

    #[error("`{value}` is not a number")]
    NotNumeric { value: String },

    #[error("{method:?} filter cannot use a {selection} selection")]
    SelectionMismatch {
        method: FilterMethod,
        selection: &'static str,
    },

    #[error("invalid table: {0}")]
    Parse(#[from] serde_json::Error),
}

impl From<FilterError> for ReactiveError {
    fn from(error: FilterError) -> Self {
        ReactiveError::compute(error)
    }
}
