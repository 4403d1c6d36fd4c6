//! # Tabular data model
//!
//! Every file exchanged with the external tools is a delimited table: the
//! batch tool's quant table, the statistics package's fold-change, t-test
//! and normalized-abundance exports, the network tool's node table, and the
//! job table itself. [`Table`] is a minimal column-ordered container of
//! nullable [`Cell`]s that reads and writes those files through the `csv`
//! crate and offers the handful of operations the pipeline needs (column
//! lookup, row selection, column reordering).
//!
//! Cells are typed on read: empty fields become [`Cell::Null`], fields that
//! look numeric become [`Cell::Number`], anything else is [`Cell::Text`].

mod cell;


pub use cell::Cell;

use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;

use crate::error::{PipelineError, Result};

/// Field delimiter of a table file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    /// Comma-separated values
    Comma,
    /// Tab-separated values
    Tab,
}

impl Delimiter {
    /// Infer the delimiter from a file extension (`.tsv`/`.txt` are tab)
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("tsv") | Some("txt") | Some("tab") => Delimiter::Tab,
            _ => Delimiter::Comma,
        }
    }

    fn as_byte(self) -> u8 {
        match self {
            Delimiter::Comma => b',',
            Delimiter::Tab => b'\t',
        }
    }
}

/// Column-ordered table of nullable cells
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    /// Human readable origin, used in error messages
    name: String,
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    /// Create an empty table with the given header
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns,
            rows: Vec::new(),
        }
    }

    /// Read a table from a file, inferring the delimiter from its extension
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            PipelineError::Io(std::io::Error::new(
                e.kind(),
                format!("{}: {}", path.display(), e),
            ))
        })?;
        Self::from_reader(
            BufReader::new(file),
            Delimiter::from_path(path),
            path.display().to_string(),
        )
    }

    /// Read a table from any reader
    pub fn from_reader<R: Read>(
        reader: R,
        delimiter: Delimiter,
        name: impl Into<String>,
    ) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(delimiter.as_byte())
            .flexible(true)
            .has_headers(true)
            .from_reader(reader);

        let columns: Vec<String> = csv_reader
            .headers()?
            .iter()
            .map(|s| s.trim_start_matches('\u{feff}').trim().to_string())
            .collect();

        let mut rows = Vec::new();
        for record in csv_reader.records() {
            let record = record?;
            let mut row: Vec<Cell> = record.iter().take(columns.len()).map(Cell::parse).collect();
            row.resize(columns.len(), Cell::Null);
            rows.push(row);
        }

        Ok(Self {
            name: name.into(),
            columns,
            rows,
        })
    }

    /// Write the table to a file, inferring the delimiter from its extension
    pub fn write_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path)?;
        self.write(file, Delimiter::from_path(path))
    }

    /// Write the table with the given delimiter
    pub fn write<W: Write>(&self, writer: W, delimiter: Delimiter) -> Result<()> {
        let mut csv_writer = csv::WriterBuilder::new()
            .delimiter(delimiter.as_byte())
            .from_writer(writer);

        csv_writer.write_record(&self.columns)?;
        for row in &self.rows {
            csv_writer.write_record(row.iter().map(|c| c.to_string()))?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    /// Table origin used in messages
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename the table origin
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Column names in order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of data rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True if the table has no data rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// All rows
    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    /// Position of a column, if present
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// Position of a column, or a [`PipelineError::MissingColumn`]
    pub fn require_column(&self, column: &str) -> Result<usize> {
        self.column_index(column)
            .ok_or_else(|| PipelineError::missing_column(column, &self.name))
    }

    /// True if the column exists
    pub fn has_column(&self, column: &str) -> bool {
        self.column_index(column).is_some()
    }

    /// Cell at (row, column index)
    pub fn cell(&self, row: usize, col: usize) -> &Cell {
        &self.rows[row][col]
    }

    /// Cell at (row, column name), if the column exists
    pub fn value(&self, row: usize, column: &str) -> Option<&Cell> {
        self.column_index(column).map(|c| &self.rows[row][c])
    }

    /// Numeric value at (row, column index)
    pub fn number(&self, row: usize, col: usize) -> Option<f64> {
        self.rows[row][col].as_f64()
    }

    /// Append a row; it is padded or truncated to the header width
    pub fn push_row(&mut self, mut row: Vec<Cell>) {
        row.resize(self.columns.len(), Cell::Null);
        self.rows.push(row);
    }

    /// Add a column, replacing any existing column of the same name
    ///
    /// # Panics
    ///
    /// Panics if `values` does not have one entry per row.
    pub fn set_column(&mut self, column: impl Into<String>, values: Vec<Cell>) {
        assert_eq!(values.len(), self.rows.len(), "column length mismatch");
        let column = column.into();
        match self.column_index(&column) {
            Some(idx) => {
                for (row, v) in self.rows.iter_mut().zip(values) {
                    row[idx] = v;
                }
            }
            None => {
                self.columns.push(column);
                for (row, v) in self.rows.iter_mut().zip(values) {
                    row.push(v);
                }
            }
        }
    }

    /// Remove a column if present, returning its values
    pub fn remove_column(&mut self, column: &str) -> Option<Vec<Cell>> {
        let idx = self.column_index(column)?;
        self.columns.remove(idx);
        Some(self.rows.iter_mut().map(|row| row.remove(idx)).collect())
    }

    /// Rename a column if present
    pub fn rename_column(&mut self, from: &str, to: impl Into<String>) -> bool {
        match self.column_index(from) {
            Some(idx) => {
                self.columns[idx] = to.into();
                true
            }
            None => false,
        }
    }

    /// New table holding the given rows, in the given order
    pub fn select_rows(&self, indices: &[usize]) -> Table {
        Table {
            name: self.name.clone(),
            columns: self.columns.clone(),
            rows: indices.iter().map(|&i| self.rows[i].clone()).collect(),
        }
    }

    /// New table restricted to the named columns that exist, in that order
    pub fn select_columns<S: AsRef<str>>(&self, columns: &[S]) -> Table {
        let indices: Vec<usize> = columns
            .iter()
            .filter_map(|c| self.column_index(c.as_ref()))
            .collect();
        self.project(&indices)
    }

    /// New table with the named columns first (those present), then the rest
    pub fn with_columns_first<S: AsRef<str>>(&self, columns: &[S]) -> Table {
        let mut indices: Vec<usize> = columns
            .iter()
            .filter_map(|c| self.column_index(c.as_ref()))
            .collect();
        for i in 0..self.columns.len() {
            if !indices.contains(&i) {
                indices.push(i);
            }
        }
        self.project(&indices)
    }

    fn project(&self, indices: &[usize]) -> Table {
        Table {
            name: self.name.clone(),
            columns: indices.iter().map(|&i| self.columns[i].clone()).collect(),
            rows: self
                .rows
                .iter()
                .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
                .collect(),
        }
    }

    /// Stable sort of row indices by a numeric column
    ///
    /// Null and NaN cells sort last regardless of direction; ties keep their
    /// input order.
    pub fn sorted_indices(&self, indices: &[usize], col: usize, descending: bool) -> Vec<usize> {
        let mut sorted = indices.to_vec();
        sorted.sort_by(|&a, &b| {
            let va = self.number(a, col).filter(|v| !v.is_nan());
            let vb = self.number(b, col).filter(|v| !v.is_nan());
            match (va, vb) {
                (Some(x), Some(y)) => {
                    let ord = x.total_cmp(&y);
                    if descending {
                        ord.reverse()
                    } else {
                        ord
                    }
                }
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            }
        });
        sorted
    }
}
