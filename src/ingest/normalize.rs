//! Shared per-section cleanup: trimming, null-token coercion and typed coercion.
//!
//! Type policy lives with the callers. Nothing here coerces a column unless
//! its name is passed in, so the same helpers serve every section kind.

use tracing::warn;

use crate::ingest::table::{is_null_token, Cell, Table};

/// Strip surrounding whitespace from every text cell.
pub fn trim_text(table: &mut Table) {
    table.map_cells(|cell| match cell {
        Cell::Text(text) => Cell::Text(text.trim().to_string()),
        other => other.clone(),
    });
}

/// Map null-token text cells to [`Cell::Missing`].
pub fn coerce_nulls(table: &mut Table) {
    table.map_cells(|cell| match cell {
        Cell::Text(text) if is_null_token(text) => Cell::Missing,
        other => other.clone(),
    });
}

/// Trim then null-coerce; the common first step for every section.
pub fn normalize(table: &mut Table) {
    trim_text(table);
    coerce_nulls(table);
}

/// Parse the named columns as floating point after removing thousands
/// separators. Unparsable text becomes missing and is reported once per
/// column. Absent columns are skipped.
pub fn coerce_numeric(table: &mut Table, section: &str, columns: &[&str]) {
    for &column in columns {
        let mut rejected = 0usize;
        let mut example: Option<String> = None;
        table.map_column(column, |cell| match cell {
            Cell::Text(text) => match parse_number(text) {
                Some(value) => Cell::Number(value),
                None => {
                    rejected += 1;
                    example.get_or_insert_with(|| text.clone());
                    Cell::Missing
                }
            },
            Cell::Bool(_) => {
                rejected += 1;
                Cell::Missing
            }
            other => other.clone(),
        });
        if rejected > 0 {
            warn!(
                section,
                column,
                rejected,
                example = example.as_deref().unwrap_or(""),
                "non-numeric values coerced to missing"
            );
        }
    }
}

/// Map `YES`/`NO` (case-insensitive) to booleans in the named columns;
/// anything else becomes missing. Absent columns are skipped.
pub fn coerce_yes_no(table: &mut Table, section: &str, columns: &[&str]) {
    for &column in columns {
        let mut rejected = 0usize;
        table.map_column(column, |cell| match cell {
            Cell::Text(text) => match parse_yes_no(text) {
                Some(value) => Cell::Bool(value),
                None => {
                    rejected += 1;
                    Cell::Missing
                }
            },
            Cell::Number(_) => {
                rejected += 1;
                Cell::Missing
            }
            other => other.clone(),
        });
        if rejected > 0 {
            warn!(section, column, rejected, "non yes/no values coerced to missing");
        }
    }
}

/// `"1,234.5"` → `1234.5`. Blank or non-numeric text is `None`.
pub fn parse_number(text: &str) -> Option<f64> {
    let cleaned: String = text.chars().filter(|&c| c != ',').collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|value| value.is_finite())
}

pub fn parse_yes_no(text: &str) -> Option<bool> {
    let text = text.trim();
    if text.eq_ignore_ascii_case("YES") {
        Some(true)
    } else if text.eq_ignore_ascii_case("NO") {
        Some(false)
    } else {
        None
    }
}
