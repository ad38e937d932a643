//! Column-oriented view over one decoded section, plus the tab-delimited decoder.
//!
//! Every section of an export decodes into the same shape: a fixed list of
//! column names and rows of [`Cell`]s. Cells start as text and are coerced to
//! numbers or booleans only when a later stage asks for it.

use std::fmt;

use serde::Serialize;
use tracing::warn;

use crate::ingest::sections::SectionKind;

/// Literal cell values that mean "no value" in an export.
pub const NULL_TOKENS: [&str; 4] = ["--", "\u{2013}", "\u{2014}", ""];

static MISSING: Cell = Cell::Missing;

/// One table cell. Serializes as `null`, a string, a number or a boolean.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Missing,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl Cell {
    /// Decode a raw field, mapping null tokens to [`Cell::Missing`].
    pub fn from_raw(raw: &str) -> Self {
        if is_null_token(raw) {
            Cell::Missing
        } else {
            Cell::Text(raw.to_string())
        }
    }

    pub fn from_option(value: Option<f64>) -> Self {
        value.map_or(Cell::Missing, Cell::Number)
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Number(value) if !value.is_nan() => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Cell::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// Label used for grouping and display: text as-is, numbers and booleans
    /// formatted, missing as `None`.
    pub fn label(&self) -> Option<String> {
        match self {
            Cell::Missing => None,
            other => Some(other.to_string()),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Missing => Ok(()),
            Cell::Text(text) => f.write_str(text),
            Cell::Number(value) => write!(f, "{value}"),
            Cell::Bool(true) => f.write_str("YES"),
            Cell::Bool(false) => f.write_str("NO"),
        }
    }
}

pub fn is_null_token(raw: &str) -> bool {
    NULL_TOKENS.contains(&raw)
}

/// Ordered rows sharing one column schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    /// Zero-row table with the given columns.
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Build from rows; each row is padded with missing cells or truncated
    /// to the column count.
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, Cell::Missing);
                row
            })
            .collect();
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Cell at (`row`, `column`); missing when either is out of range.
    pub fn cell(&self, row: usize, column: &str) -> &Cell {
        self.column_index(column)
            .and_then(|index| self.rows.get(row).and_then(|cells| cells.get(index)))
            .unwrap_or(&MISSING)
    }

    pub fn text(&self, row: usize, column: &str) -> Option<&str> {
        self.cell(row, column).as_text()
    }

    pub fn number(&self, row: usize, column: &str) -> Option<f64> {
        self.cell(row, column).as_f64()
    }

    pub fn boolean(&self, row: usize, column: &str) -> Option<bool> {
        self.cell(row, column).as_bool()
    }

    /// All cells of one column in row order, or `None` if the column is absent.
    pub fn column(&self, name: &str) -> Option<Vec<&Cell>> {
        let index = self.column_index(name)?;
        Some(self.rows.iter().map(|row| &row[index]).collect())
    }

    /// Replace the column's values, or append it when absent.
    pub fn set_column(&mut self, name: &str, values: Vec<Cell>) {
        debug_assert_eq!(values.len(), self.rows.len());
        match self.column_index(name) {
            Some(index) => {
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row[index] = value;
                }
            }
            None => {
                self.columns.push(name.to_string());
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row.push(value);
                }
            }
        }
    }

    /// Rewrite every cell of one column in place. Returns false if absent.
    pub fn map_column<F>(&mut self, name: &str, mut f: F) -> bool
    where
        F: FnMut(&Cell) -> Cell,
    {
        let Some(index) = self.column_index(name) else {
            return false;
        };
        for row in &mut self.rows {
            row[index] = f(&row[index]);
        }
        true
    }

    /// Rewrite every cell of the table in place.
    pub fn map_cells<F>(&mut self, mut f: F)
    where
        F: FnMut(&Cell) -> Cell,
    {
        for row in &mut self.rows {
            for cell in row.iter_mut() {
                *cell = f(cell);
            }
        }
    }

    /// Rename columns via `(from, to)` pairs; unknown sources are ignored.
    pub fn rename_columns(&mut self, renames: &[(&str, &str)]) {
        for column in &mut self.columns {
            if let Some((_, to)) = renames.iter().find(|(from, _)| *from == column.as_str()) {
                *column = (*to).to_string();
            }
        }
    }

    /// Move the named columns to the front in the given order; every other
    /// column keeps its relative order after them. Unknown names are skipped.
    pub fn reorder_front(&mut self, front: &[&str]) {
        let mut order: Vec<usize> = front
            .iter()
            .filter_map(|name| self.column_index(name))
            .collect();
        for index in 0..self.columns.len() {
            if !order.contains(&index) {
                order.push(index);
            }
        }
        self.columns = order.iter().map(|&index| self.columns[index].clone()).collect();
        for row in &mut self.rows {
            let reordered = order.iter().map(|&index| row[index].clone()).collect();
            *row = reordered;
        }
    }

    pub fn push_row(&mut self, mut row: Vec<Cell>) {
        row.resize(self.columns.len(), Cell::Missing);
        self.rows.push(row);
    }

    /// Copy of the table restricted to the given row indices, in that order.
    pub fn select_rows(&self, indices: &[usize]) -> Table {
        Table {
            columns: self.columns.clone(),
            rows: indices
                .iter()
                .filter_map(|&index| self.rows.get(index).cloned())
                .collect(),
        }
    }

    /// Copy of the table with its columns reindexed to `columns`; absent
    /// columns are filled with missing values, extra columns dropped.
    pub fn reindex_columns(&self, columns: &[String]) -> Table {
        let sources: Vec<Option<usize>> =
            columns.iter().map(|column| self.column_index(column)).collect();
        let rows = self
            .rows
            .iter()
            .map(|row| {
                sources
                    .iter()
                    .map(|source| source.map_or(Cell::Missing, |index| row[index].clone()))
                    .collect()
            })
            .collect();
        Table {
            columns: columns.to_vec(),
            rows,
        }
    }

    /// Write the table as tab-separated text with a header line.
    pub fn write_tsv<W: std::io::Write>(&self, out: W) -> Result<(), csv::Error> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_writer(out);
        writer.write_record(&self.columns)?;
        for row in &self.rows {
            writer.write_record(row.iter().map(ToString::to_string))?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Decode one section's text into a table.
///
/// Absent or empty text yields a zero-row table with the columns of the
/// section's header prefix. Rows whose field count disagrees with the header
/// make the whole section unusable; that is logged and the same zero-row
/// table is returned.
pub fn decode_section(text: Option<&str>, kind: SectionKind) -> Table {
    let fallback = || Table::new(kind.header_prefix().split('\t'));
    let Some(text) = text.filter(|text| !text.trim().is_empty()) else {
        return fallback();
    };

    match read_tab_delimited(text) {
        Ok(table) => table,
        Err(err) => {
            warn!(
                section = kind.name(),
                error = %err,
                "failed to decode section, substituting empty table"
            );
            fallback()
        }
    }
}

fn read_tab_delimited(text: &str) -> Result<Table, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .flexible(false)
        .from_reader(text.as_bytes());

    let columns: Vec<String> = reader
        .headers()?
        .iter()
        .enumerate()
        .map(|(index, name)| {
            if name.is_empty() {
                format!("unnamed_{index}")
            } else {
                name.to_string()
            }
        })
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(Cell::from_raw).collect());
    }

    Ok(Table { columns, rows })
}
