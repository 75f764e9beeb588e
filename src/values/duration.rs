use anyhow::{anyhow, Context, Result};
use std::collections::BTreeSet;
use tracing::{debug, info};

use super::MappingLookup;
use crate::mapping::{
    segments::cell_duration,
    utils::{cell_at, required_cell, CellFilter},
    MappingTable,
};

const START_PREFIX: &str = "start_time";
const END_PREFIX: &str = "end_time";

impl<'a> MappingLookup<'a> {
    /// Seconds of footage recorded for `city`/`state`.
    ///
    /// `state` equal to `unknown` in any casing selects the row with a null
    /// state. Only the first matching row counts. Returns `0` when no row
    /// matches.
    pub fn calculate_total_seconds_for_city(&self, city: &str, state: &str) -> Result<i64> {
        let table = self.table;
        let city_col = table.column("city")?;
        let state_col = table.column("state")?;
        let start_col = table.column(START_PREFIX)?;
        let end_col = table.column(END_PREFIX)?;
        let city_filter = CellFilter::Equals(city);
        let state_filter = CellFilter::state(state);

        let mut matches = (0..table.num_rows()).filter(|&row| {
            city_filter.matches(cell_at(city_col, row))
                && state_filter.matches(cell_at(state_col, row))
        });

        let Some(row) = matches.next() else {
            debug!(city, state, "no mapping row for city");
            return Ok(0);
        };
        if let Some(dup) = matches.next() {
            debug!(
                city,
                state,
                first = row,
                duplicate = dup,
                "several mapping rows for city; using the first"
            );
        }

        cell_duration(
            required_cell(start_col, START_PREFIX, row)?,
            required_cell(end_col, END_PREFIX, row)?,
            START_PREFIX,
            END_PREFIX,
        )
        .with_context(|| format!("summing durations for {} ({}) at row {}", city, state, row))
    }

    /// Copy of the table without the start/end column pairs whose footage,
    /// summed over every row, is below `threshold` seconds.
    ///
    /// Pairs are `start_time<suffix>`/`end_time<suffix>`; a column without
    /// its partner is never removed. A pair totalling exactly `threshold`
    /// is kept.
    pub fn remove_columns_below_threshold(&self, threshold: i64) -> Result<MappingTable> {
        let table = self.table;
        let mut checked: BTreeSet<String> = BTreeSet::new();
        let mut to_remove: BTreeSet<String> = BTreeSet::new();

        for col in table.column_names() {
            if !col.starts_with(START_PREFIX) && !col.starts_with(END_PREFIX) {
                continue;
            }
            let suffix = pair_suffix(&col);
            if !checked.insert(suffix.clone()) {
                continue;
            }

            let start_name = format!("{}{}", START_PREFIX, suffix);
            let end_name = format!("{}{}", END_PREFIX, suffix);
            if !table.has_column(&start_name) || !table.has_column(&end_name) {
                debug!(column = %col, "no start/end partner; keeping");
                continue;
            }

            let total = self
                .pair_total(&start_name, &end_name)
                .with_context(|| format!("summing {} / {}", start_name, end_name))?;
            debug!(start = %start_name, end = %end_name, total, threshold, "pair total");
            if total < threshold {
                to_remove.insert(start_name);
                to_remove.insert(end_name);
            }
        }

        if !to_remove.is_empty() {
            info!(removed = ?to_remove, threshold, "dropping low-footage columns");
        }
        let names: Vec<String> = to_remove.into_iter().collect();
        table.drop_columns(&names)
    }

    fn pair_total(&self, start_name: &str, end_name: &str) -> Result<i64> {
        let start_col = self.table.column(start_name)?;
        let end_col = self.table.column(end_name)?;
        let mut total: i64 = 0;
        for row in 0..self.table.num_rows() {
            let row_total = cell_duration(
                required_cell(start_col, start_name, row)?,
                required_cell(end_col, end_name, row)?,
                start_name,
                end_name,
            )
            .with_context(|| format!("at row {}", row))?;
            total = total.checked_add(row_total).ok_or_else(|| {
                anyhow!(
                    "total of `{}` / `{}` overflows at row {}",
                    start_name,
                    end_name,
                    row
                )
            })?;
        }
        Ok(total)
    }
}

/// What is left of a column name once every `start_time`/`end_time` is
/// taken out of it, e.g. `start_time_night` -> `_night`.
fn pair_suffix(column: &str) -> String {
    column.replace(START_PREFIX, "").replace(END_PREFIX, "")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::read_mapping;
    use crate::values::fixtures::sample_table;

    #[test]
    fn test_total_seconds_null_state() -> Result<()> {
        let table = sample_table();
        let lookup = MappingLookup::new(&table);
        // (5 - 0) + (20 - 10) + (90 - 30)
        assert_eq!(lookup.calculate_total_seconds_for_city("Springfield", "unknown")?, 75);
        assert_eq!(lookup.calculate_total_seconds_for_city("Springfield", "UNKNOWN")?, 75);
        assert_eq!(lookup.calculate_total_seconds_for_city("Shelbyville", "Unknown")?, 99);
        Ok(())
    }

    #[test]
    fn test_total_seconds_named_state() -> Result<()> {
        let table = sample_table();
        let lookup = MappingLookup::new(&table);
        assert_eq!(lookup.calculate_total_seconds_for_city("Springfield", "IL")?, 60);
        Ok(())
    }

    #[test]
    fn test_total_seconds_missing_city_is_zero() -> Result<()> {
        let table = sample_table();
        let lookup = MappingLookup::new(&table);
        assert_eq!(lookup.calculate_total_seconds_for_city("Ogdenville", "unknown")?, 0);
        assert_eq!(lookup.calculate_total_seconds_for_city("Shelbyville", "IL")?, 0);
        assert_eq!(lookup.calculate_total_seconds_for_city("springfield", "IL")?, 0);
        Ok(())
    }

    #[test]
    fn test_total_seconds_first_row_only() -> Result<()> {
        let table = read_mapping(
            "city,state,start_time,end_time\nX,,[[0]],[[10]]\nX,,[[0]],[[500]]\n".as_bytes(),
        )?;
        let lookup = MappingLookup::new(&table);
        assert_eq!(lookup.calculate_total_seconds_for_city("X", "unknown")?, 10);
        Ok(())
    }

    #[test]
    fn test_total_seconds_overflow_is_error() -> Result<()> {
        let table = read_mapping(
            "city,state,start_time,end_time\nX,,[[-9223372036854775808]],[[1]]\n".as_bytes(),
        )?;
        let err = MappingLookup::new(&table)
            .calculate_total_seconds_for_city("X", "unknown")
            .unwrap_err();
        assert!(format!("{:#}", err).contains("overflows"));
        Ok(())
    }

    #[test]
    fn test_total_seconds_needs_time_columns() -> Result<()> {
        let table = read_mapping("city,state\nX,\n".as_bytes())?;
        let lookup = MappingLookup::new(&table);
        assert!(lookup
            .calculate_total_seconds_for_city("Ogdenville", "unknown")
            .is_err());
        Ok(())
    }

    #[test]
    fn test_single_row_example() -> Result<()> {
        let table = read_mapping(
            "city,state,start_time,end_time\nCityX,,\"[[0,10]]\",\"[[5,20]]\"\n".as_bytes(),
        )?;
        let lookup = MappingLookup::new(&table);
        assert_eq!(lookup.calculate_total_seconds_for_city("CityX", "unknown")?, 15);
        Ok(())
    }

    #[test]
    fn test_prune_removes_pair_below_threshold() -> Result<()> {
        let table = sample_table();
        let lookup = MappingLookup::new(&table);
        // base pair: 75 + 60 + 99 = 234; night pair: 3 + 1 + 2 = 6
        let pruned = lookup.remove_columns_below_threshold(7)?;
        assert!(!pruned.has_column("start_time_night"));
        assert!(!pruned.has_column("end_time_night"));
        assert!(pruned.has_column("start_time"));
        assert!(pruned.has_column("end_time"));
        assert!(pruned.has_column("start_time_rain"));
        assert_eq!(pruned.column_names().len(), table.column_names().len() - 2);
        assert_eq!(pruned.num_rows(), table.num_rows());

        // the source table is untouched
        assert!(table.has_column("start_time_night"));
        Ok(())
    }

    #[test]
    fn test_prune_keeps_pair_equal_to_threshold() -> Result<()> {
        let table = sample_table();
        let lookup = MappingLookup::new(&table);
        let pruned = lookup.remove_columns_below_threshold(6)?;
        assert_eq!(pruned.column_names(), table.column_names());

        let everything = lookup.remove_columns_below_threshold(235)?;
        for gone in ["start_time", "end_time", "start_time_night", "end_time_night"] {
            assert!(!everything.has_column(gone), "{} should be dropped", gone);
        }
        assert!(everything.has_column("start_time_rain"));
        assert!(everything.has_column("videos"));
        Ok(())
    }

    #[test]
    fn test_prune_null_cell_is_error() -> Result<()> {
        let table = read_mapping("start_time,end_time\n[[0]],\n".as_bytes())?;
        assert!(MappingLookup::new(&table)
            .remove_columns_below_threshold(1)
            .is_err());
        Ok(())
    }

    #[test]
    fn test_prune_overflow_across_rows_is_error() -> Result<()> {
        let table = read_mapping(
            "start_time,end_time\n[[0]],[[9223372036854775807]]\n[[0]],[[1]]\n".as_bytes(),
        )?;
        let err = MappingLookup::new(&table)
            .remove_columns_below_threshold(1)
            .unwrap_err();
        assert!(format!("{:#}", err).contains("overflows at row 1"));
        Ok(())
    }

    #[test]
    fn test_pair_suffix() {
        assert_eq!(pair_suffix("start_time"), "");
        assert_eq!(pair_suffix("end_time_night"), "_night");
        assert_eq!(pair_suffix("start_time_end_time"), "_");
    }
}
