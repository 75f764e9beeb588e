use anyhow::{anyhow, Context, Result};
use arrow::array::{Array, StringArray};

/// Logical stand-in for a missing `state`.
pub const UNKNOWN_STATE: &str = "unknown";

/// Cell spellings that are read as missing values.
const NULL_SPELLINGS: &[&str] = &[
    "", "NaN", "nan", "-NaN", "-nan", "NA", "N/A", "n/a", "<NA>", "#N/A", "NULL", "null", "None",
];

pub fn is_null_cell(raw: &str) -> bool {
    NULL_SPELLINGS.contains(&raw.trim())
}

/// Read one cell out of a string column, `None` for null.
pub fn cell_at(col: &StringArray, row: usize) -> Option<&str> {
    if col.is_null(row) {
        None
    } else {
        Some(col.value(row))
    }
}

/// Like [`cell_at`] but a null cell is an error naming the column and row.
pub fn required_cell<'a>(col: &'a StringArray, column: &str, row: usize) -> Result<&'a str> {
    cell_at(col, row).ok_or_else(|| anyhow!("null `{}` at row {}", column, row))
}

/// Splits a `videos` cell such as `[abc, def_1]` into its ids.
///
/// This is not a literal parse: brackets are stripped from both ends, the
/// rest is split on commas and each id is trimmed.
pub fn parse_video_list(raw: &str) -> Vec<String> {
    raw.trim()
        .trim_matches(|c: char| c == '[' || c == ']')
        .split(',')
        .map(|id| id.trim().to_string())
        .collect()
}

/// A null state reads as [`UNKNOWN_STATE`].
pub fn normalize_state(state: Option<&str>) -> &str {
    state.unwrap_or(UNKNOWN_STATE)
}

/// Any casing of `unknown` selects rows whose state is null.
pub fn is_unknown_state(state: &str) -> bool {
    state.eq_ignore_ascii_case(UNKNOWN_STATE)
}

/// A single column condition used by the row filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellFilter<'a> {
    Equals(&'a str),
    IsNull,
}

impl<'a> CellFilter<'a> {
    /// Exact equality, except that the literal `unknown` means "cell is null".
    pub fn exact_or_unknown(value: &'a str) -> Self {
        if value == UNKNOWN_STATE {
            CellFilter::IsNull
        } else {
            CellFilter::Equals(value)
        }
    }

    /// Same as [`CellFilter::exact_or_unknown`] with the sentinel matched in
    /// any casing.
    pub fn state(value: &'a str) -> Self {
        if is_unknown_state(value) {
            CellFilter::IsNull
        } else {
            CellFilter::Equals(value)
        }
    }

    /// A null cell never equals a value.
    pub fn matches(&self, cell: Option<&str>) -> bool {
        match self {
            CellFilter::Equals(v) => cell == Some(*v),
            CellFilter::IsNull => cell.is_none(),
        }
    }
}

/// Parse a numeric cell as an integer: integers as-is, floats truncated
/// toward zero.
pub fn parse_int_cell(raw: &str, column: &str) -> Result<i64> {
    let s = raw.trim();
    if let Ok(v) = s.parse::<i64>() {
        return Ok(v);
    }
    let f = s
        .parse::<f64>()
        .with_context(|| format!("`{}` value {:?} is not a number", column, raw))?;
    if !f.is_finite() {
        return Err(anyhow!("`{}` value {:?} is not finite", column, raw));
    }
    Ok(f.trunc() as i64)
}

/// Parse an optional float cell; null stays `None`.
pub fn parse_float_cell(cell: Option<&str>, column: &str) -> Result<Option<f64>> {
    cell.map(|raw| {
        raw.trim()
            .parse::<f64>()
            .with_context(|| format!("`{}` value {:?} is not a number", column, raw))
    })
    .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_video_list() {
        assert_eq!(
            parse_video_list("[abc, def_1 ,ghi]"),
            vec!["abc", "def_1", "ghi"]
        );
        assert_eq!(parse_video_list("[single]"), vec!["single"]);
        assert_eq!(parse_video_list("[]"), vec![""]);
    }

    #[test]
    fn test_state_helpers() {
        assert_eq!(normalize_state(None), "unknown");
        assert_eq!(normalize_state(Some("Ohio")), "Ohio");
        assert!(is_unknown_state("Unknown"));
        assert!(is_unknown_state("UNKNOWN"));
        assert!(!is_unknown_state("Utah"));
    }

    #[test]
    fn test_cell_filter() {
        assert_eq!(CellFilter::exact_or_unknown("unknown"), CellFilter::IsNull);
        assert_eq!(
            CellFilter::exact_or_unknown("Unknown"),
            CellFilter::Equals("Unknown")
        );
        assert_eq!(CellFilter::state("Unknown"), CellFilter::IsNull);

        assert!(CellFilter::IsNull.matches(None));
        assert!(!CellFilter::IsNull.matches(Some("x")));
        assert!(CellFilter::Equals("x").matches(Some("x")));
        assert!(!CellFilter::Equals("x").matches(None));
    }

    #[test]
    fn test_numeric_cells() {
        assert_eq!(parse_int_cell("42", "population_city").unwrap(), 42);
        assert_eq!(parse_int_cell(" 1500000.0 ", "gmp").unwrap(), 1_500_000);
        assert_eq!(parse_int_cell("-2.7", "gmp").unwrap(), -2);
        assert!(parse_int_cell("many", "gmp").is_err());
        assert!(parse_int_cell("inf", "gmp").is_err());

        assert_eq!(parse_float_cell(None, "lat").unwrap(), None);
        assert_eq!(parse_float_cell(Some("12.5"), "lat").unwrap(), Some(12.5));
        assert!(parse_float_cell(Some("north"), "lat").is_err());
    }

    #[test]
    fn test_null_spellings() {
        assert!(is_null_cell(""));
        assert!(is_null_cell("NaN"));
        assert!(is_null_cell(" nan "));
        assert!(!is_null_cell("Nancy"));
    }
}
