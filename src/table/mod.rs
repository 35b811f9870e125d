//! # Feature Tables
//!
//! The row/column model shared by every stage. Extraction stages build
//! [`FeatureRow`]s (ordered column → [`Cell`] maps); a [`FeatureTable`] built
//! from them carries the union of their columns in first-seen order, with
//! absent cells null.
//!
//! Tables are persisted as Parquet artifacts in the project's `work/`
//! directory (see [`write_parquet`] / [`read_parquet`]) and merged by the
//! export stage with [`FeatureTable::left_join`], which never drops or
//! duplicates rows of the left table.

mod error;
mod io;
mod join;

#[cfg(test)]
mod tests;

pub use error::TableError;
pub use io::{read_csv, read_parquet, CsvCells, write_atomically, write_csv, write_parquet};

use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;

use serde_json::Value;

/// One scalar value of a feature table
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Cell {
    /// Missing value
    #[default]
    Null,
    /// Integer value
    Int(i64),
    /// Floating point value
    Float(f64),
    /// Text value
    Text(String),
}

impl Cell {
    /// Whether the cell holds no value
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    /// Whether the cell holds a number
    pub fn is_numeric(&self) -> bool {
        matches!(self, Cell::Int(_) | Cell::Float(_))
    }

    /// Numeric value, widening integers
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Int(v) => Some(*v as f64),
            Cell::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Text value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Convert a resolved JSON value.
    ///
    /// Scalars keep their type; booleans become `"true"`/`"false"`; objects
    /// and arrays are stored as compact JSON text.
    pub fn from_json(value: &Value) -> Cell {
        match value {
            Value::Null => Cell::Null,
            Value::Bool(b) => Cell::Text(b.to_string()),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Cell::Int(i),
                None => n.as_f64().map(Cell::Float).unwrap_or(Cell::Null),
            },
            Value::String(s) => Cell::Text(s.clone()),
            other => Cell::Text(other.to_string()),
        }
    }

    /// Parse a delimited-text cell: empty is null, numbers are numeric.
    pub fn parse(text: &str) -> Cell {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Cell::Null;
        }
        if let Ok(i) = trimmed.parse::<i64>() {
            return Cell::Int(i);
        }
        match trimmed.parse::<f64>() {
            Ok(f) if f.is_finite() => Cell::Float(f),
            _ => Cell::Text(text.to_string()),
        }
    }

    /// Render for delimited text output; null and NaN render empty.
    pub fn render(&self) -> String {
        match self {
            Cell::Null => String::new(),
            Cell::Int(v) => v.to_string(),
            Cell::Float(v) if v.is_nan() => String::new(),
            Cell::Float(v) => v.to_string(),
            Cell::Text(s) => s.clone(),
        }
    }

    /// Sort order used for key columns: nulls first, then by rendered text.
    fn key_cmp(&self, other: &Cell) -> Ordering {
        match (self.is_null(), other.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => self.render().cmp(&other.render()),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl From<i64> for Cell {
    fn from(v: i64) -> Self {
        Cell::Int(v)
    }
}

impl From<f64> for Cell {
    fn from(v: f64) -> Self {
        Cell::Float(v)
    }
}

impl From<&str> for Cell {
    fn from(v: &str) -> Self {
        Cell::Text(v.to_string())
    }
}

impl From<String> for Cell {
    fn from(v: String) -> Self {
        Cell::Text(v)
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Cell::Null)
    }
}

/// An ordered column-name → value mapping for one entity
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureRow {
    cells: Vec<(String, Cell)>,
}

impl FeatureRow {
    /// Create an empty row
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a row starting with its key column
    pub fn keyed(column: &str, value: impl Into<Cell>) -> Self {
        let mut row = Self::new();
        row.set(column, value);
        row
    }

    /// Set a column, replacing an existing value in place
    pub fn set(&mut self, column: &str, value: impl Into<Cell>) {
        let value = value.into();
        match self.cells.iter_mut().find(|(name, _)| name == column) {
            Some((_, cell)) => *cell = value,
            None => self.cells.push((column.to_string(), value)),
        }
    }

    /// Value of a column
    pub fn get(&self, column: &str) -> Option<&Cell> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, cell)| cell)
    }

    /// Iterate `(column, value)` in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Cell)> {
        self.cells.iter().map(|(name, cell)| (name.as_str(), cell))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Column-ordered table of cells
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureTable {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl FeatureTable {
    /// Create an empty table with the given columns
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Build a table from rows; columns are the union of row columns in
    /// first-seen order and absent cells are null.
    pub fn from_rows(rows: impl IntoIterator<Item = FeatureRow>) -> Self {
        let rows: Vec<FeatureRow> = rows.into_iter().collect();

        let mut columns: Vec<String> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        for row in &rows {
            for (name, _) in row.iter() {
                if seen.insert(name.to_string()) {
                    columns.push(name.to_string());
                }
            }
        }

        let data = rows
            .iter()
            .map(|row| {
                columns
                    .iter()
                    .map(|column| row.get(column).cloned().unwrap_or_default())
                    .collect()
            })
            .collect();

        Self {
            columns,
            rows: data,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Iterate the rows as cell slices
    pub fn rows(&self) -> impl Iterator<Item = &[Cell]> {
        self.rows.iter().map(|r| r.as_slice())
    }

    /// Values of one column, top to bottom
    pub fn column(&self, name: &str) -> Option<impl Iterator<Item = &Cell>> {
        let index = self.column_index(name)?;
        Some(self.rows.iter().map(move |row| &row[index]))
    }

    /// Value at a row and named column
    pub fn cell(&self, row: usize, column: &str) -> Option<&Cell> {
        let index = self.column_index(column)?;
        self.rows.get(row).map(|r| &r[index])
    }

    /// Append a row whose cells follow the column order
    pub fn push_row(&mut self, row: Vec<Cell>) -> Result<(), TableError> {
        if row.len() != self.columns.len() {
            return Err(TableError::RowWidth {
                expected: self.columns.len(),
                actual: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    /// Set one column to the same value on every row, appending it if absent
    pub fn fill_column(&mut self, name: &str, value: Cell) {
        match self.column_index(name) {
            Some(index) => {
                for row in &mut self.rows {
                    row[index] = value.clone();
                }
            }
            None => {
                self.columns.push(name.to_string());
                for row in &mut self.rows {
                    row.push(value.clone());
                }
            }
        }
    }

    /// Set a column from per-row values, appending it if absent
    pub fn set_column(&mut self, name: &str, values: Vec<Cell>) -> Result<(), TableError> {
        if values.len() != self.rows.len() {
            return Err(TableError::RowWidth {
                expected: self.rows.len(),
                actual: values.len(),
            });
        }
        let index = match self.column_index(name) {
            Some(index) => index,
            None => {
                self.columns.push(name.to_string());
                for row in &mut self.rows {
                    row.push(Cell::Null);
                }
                self.columns.len() - 1
            }
        };
        for (row, value) in self.rows.iter_mut().zip(values) {
            row[index] = value;
        }
        Ok(())
    }

    /// Project onto the named columns, in the given order
    pub fn select(&self, names: &[String]) -> Result<FeatureTable, TableError> {
        let indices = names
            .iter()
            .map(|name| {
                self.column_index(name)
                    .ok_or_else(|| TableError::ColumnNotFound(name.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(FeatureTable {
            columns: names.to_vec(),
            rows: self
                .rows
                .iter()
                .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
                .collect(),
        })
    }

    /// Keep only rows for which `keep` returns true
    pub fn retain_rows<F>(&mut self, column: &str, mut keep: F) -> Result<(), TableError>
    where
        F: FnMut(&Cell) -> bool,
    {
        let index = self
            .column_index(column)
            .ok_or_else(|| TableError::ColumnNotFound(column.to_string()))?;
        self.rows.retain(|row| keep(&row[index]));
        Ok(())
    }

    /// Rows whose `column` renders to `key`
    pub fn filter_eq(&self, column: &str, key: &str) -> Result<FeatureTable, TableError> {
        let mut filtered = self.clone();
        filtered.retain_rows(column, |cell| cell.render() == key)?;
        Ok(filtered)
    }

    /// Stable sort on a key column (nulls first, then lexicographic)
    pub fn sort_by_column(&mut self, column: &str) -> Result<(), TableError> {
        let index = self
            .column_index(column)
            .ok_or_else(|| TableError::ColumnNotFound(column.to_string()))?;
        self.rows.sort_by(|a, b| a[index].key_cmp(&b[index]));
        Ok(())
    }

    /// Replace every row whose key appears in `replacement`, then append the
    /// replacement rows. Columns are unioned; cells absent on either side are null.
    pub fn replace_rows(&self, key: &str, replacement: &FeatureTable) -> Result<FeatureTable, TableError> {
        let incoming: HashSet<String> = replacement
            .column(key)
            .ok_or_else(|| TableError::ColumnNotFound(key.to_string()))?
            .map(Cell::render)
            .collect();

        let mut kept = self.clone();
        if kept.has_column(key) {
            kept.retain_rows(key, |cell| !incoming.contains(&cell.render()))?;
        }
        Ok(kept.concat(replacement))
    }

    /// Append the rows of `other`, unioning columns
    pub fn concat(&self, other: &FeatureTable) -> FeatureTable {
        let mut columns = self.columns.clone();
        for column in &other.columns {
            if !columns.contains(column) {
                columns.push(column.clone());
            }
        }

        let project = |table: &FeatureTable| -> Vec<Vec<Cell>> {
            let indices: Vec<Option<usize>> =
                columns.iter().map(|c| table.column_index(c)).collect();
            table
                .rows
                .iter()
                .map(|row| {
                    indices
                        .iter()
                        .map(|i| i.map(|i| row[i].clone()).unwrap_or_default())
                        .collect()
                })
                .collect()
        };

        let mut rows = project(self);
        rows.extend(project(other));
        FeatureTable { columns, rows }
    }
}
