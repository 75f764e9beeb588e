// src/values/mod.rs
use anyhow::Result;
use tracing::{debug, trace};

use crate::mapping::{
    utils::{cell_at, CellFilter},
    MappingTable,
};

mod duration;
mod key;
mod record;

pub use key::SegmentKey;
pub use record::SegmentRecord;

/// A cell handed back by [`MappingLookup::get_value`]; `None` is a null cell.
pub type Cell<'a> = Option<&'a str>;

/// Read-only lookups over a mapping table.
///
/// Every operation is a linear scan in row order and the first matching row
/// wins. Nothing here mutates the table.
#[derive(Debug, Clone, Copy)]
pub struct MappingLookup<'a> {
    table: &'a MappingTable,
}

impl<'a> MappingLookup<'a> {
    pub fn new(table: &'a MappingTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &'a MappingTable {
        self.table
    }

    /// Value of `target` in the first row where `first.0 == first.1` and,
    /// when given, `second.0 == second.1`.
    ///
    /// For the second condition the value `"unknown"` selects rows where
    /// that column is null. Returns `Ok(None)` when no row matches and
    /// `Ok(Some(None))` when the matching row's target cell is null.
    pub fn get_value(
        &self,
        first: (&str, &str),
        second: Option<(&str, &str)>,
        target: &str,
    ) -> Result<Option<Cell<'a>>> {
        let table = self.table;
        let target_col = table.column(target)?;
        let col1 = table.column(first.0)?;
        let filter1 = CellFilter::Equals(first.1);
        let second = match second {
            Some((name, value)) => Some((
                table.column(name)?,
                CellFilter::exact_or_unknown(value),
            )),
            None => None,
        };

        let found = (0..table.num_rows()).find(|&row| {
            filter1.matches(cell_at(col1, row))
                && second
                    .as_ref()
                    .map_or(true, |(col2, filter2)| filter2.matches(cell_at(col2, row)))
        });

        match found {
            Some(row) => {
                trace!(row, target, "get_value matched");
                Ok(Some(cell_at(target_col, row)))
            }
            None => {
                debug!(
                    column = first.0,
                    value = first.1,
                    second = %second_desc(second.as_ref().map(|(_, f)| *f)),
                    target,
                    "get_value found no row"
                );
                Ok(None)
            }
        }
    }
}

fn second_desc(filter: Option<CellFilter<'_>>) -> String {
    match filter {
        Some(CellFilter::Equals(v)) => v.to_string(),
        Some(CellFilter::IsNull) => "<null>".to_string(),
        None => "-".to_string(),
    }
}
