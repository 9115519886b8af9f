//! The filter panel module: one input per column and a filtered table.

use super::method::{ColumnFilter, Selection};
use super::table::Table;
use super::FilterError;
use crate::error::Result;
use crate::module::{Module, Scope};
use crate::reactive::Cell;

/// Name of the exposed memo holding the filtered table.
pub const FILTERED: &str = "df";

/// A panel of column filters over a fixed table.
///
/// Instantiating the panel creates a `Cell<Selection>` named after
/// [`ColumnFilter::input_name`] for every filter and a memo named
/// [`FILTERED`] with the rows that pass all of them. All of these are
/// exposed.
#[derive(Debug, Clone)]
pub struct FilterPanel {
    filters: Vec<ColumnFilter>,
}

impl FilterPanel {
    pub fn new(filters: Vec<ColumnFilter>) -> Self {
        Self { filters }
    }

    /// Infer a filter for each of `columns` of `table`.
    pub fn for_columns<S: AsRef<str>>(table: &Table, columns: &[S]) -> Result<Self> {
        Ok(Self::new(ColumnFilter::infer_all(table, columns)?))
    }

    pub fn filters(&self) -> &[ColumnFilter] {
        &self.filters
    }
}

impl Module for FilterPanel {
    type Args = Table;

    fn build(&self, scope: &mut Scope, table: Table) -> Result<()> {
        let mut inputs: Vec<(ColumnFilter, Cell<Selection>)> = Vec::with_capacity(self.filters.len());

        for filter in &self.filters {
            let name = filter.input_name();
            let cell = scope.cell(&name, filter.initial.clone())?;
            scope.expose(&name, cell.clone())?;
            inputs.push((filter.clone(), cell));
        }

        let filtered = scope.memo(FILTERED, move || {
            // Read every selection up front so the dependencies do not
            // depend on the table's contents.
            let selections: Vec<Selection> = inputs.iter().map(|(_, cell)| cell.get()).collect();

            let rows = table.try_filter(|row| {
                for ((filter, _), selection) in inputs.iter().zip(&selections) {
                    let datum = row.get(&filter.column).ok_or_else(|| FilterError::MissingColumn {
                        column: filter.column.clone(),
                    })?;
                    if !filter.method.matches(datum, selection)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            })?;
            Ok(rows)
        })?;

        scope.expose(FILTERED, filtered)
    }
}
