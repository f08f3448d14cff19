//! Identifier-keyed tables (Arrow-backed)
//!
//! Descriptor and label files are loaded once into a single `RecordBatch`:
//! - Identifier column and label-type tags stay `Utf8`, never parsed as numbers
//!   (PDB codes like `1e66` would otherwise turn into floats)
//! - Every other column is `Float64`; empty cells become NaN
//! - Row selection goes through `arrow::compute::take`, so columns stay aligned
//!
//! Tables are immutable: every filter returns a new table.

mod export;

pub use export::{write_csv, write_parquet, ColumnData, ColumnarTable};

use crate::{Error, Result};
use arrow::array::{Array, ArrayRef, Float64Array, StringArray, UInt32Array};
use arrow::compute;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

/// Default identifier column shared by descriptor and label files
pub const DEFAULT_IDENTIFIER: &str = "PDB code";

/// Default label-type tag column of label files
pub const DEFAULT_LABEL_TYPE: &str = "Affinity Data Type";

/// Names of the non-numeric columns of feature and label files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataColumns {
    /// Identifier column (string-typed)
    pub identifier: String,
    /// Label-type tag column of label files (string-typed)
    pub label_type: String,
}

impl Default for DataColumns {
    fn default() -> Self {
        Self {
            identifier: DEFAULT_IDENTIFIER.to_string(),
            label_type: DEFAULT_LABEL_TYPE.to_string(),
        }
    }
}

/// A table whose rows are keyed by a string identifier
#[derive(Debug, Clone)]
pub struct Table {
    batch: RecordBatch,
    ids: Vec<String>,
    identifier: String,
    source: String,
}

impl Table {
    /// Load a CSV file.
    ///
    /// The identifier column and any `text_columns` are kept as strings,
    /// all other columns are parsed as `f64`.
    ///
    /// # Errors
    /// Returns error if the file cannot be read, the identifier column is
    /// missing, or a numeric cell does not parse
    pub fn from_csv_path<P: AsRef<Path>>(
        path: P,
        identifier: &str,
        text_columns: &[&str],
    ) -> Result<Self> {
        let path = path.as_ref();
        let reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(path)
            .map_err(|e| Error::Other(format!("Failed to open {}: {e}", path.display())))?;
        Self::from_csv_reader(reader, identifier, text_columns, &path.display().to_string())
    }

    /// Load CSV data from any reader (used for in-memory fixtures).
    ///
    /// # Errors
    /// Same as [`Table::from_csv_path`]
    pub fn from_csv_reader<R: std::io::Read>(
        mut reader: csv::Reader<R>,
        identifier: &str,
        text_columns: &[&str],
        source: &str,
    ) -> Result<Self> {
        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

        let id_index = headers
            .iter()
            .position(|h| h == identifier)
            .ok_or_else(|| Error::MissingColumn {
                column: identifier.to_string(),
                table: source.to_string(),
            })?;

        let is_text: Vec<bool> = headers
            .iter()
            .enumerate()
            .map(|(i, h)| i == id_index || text_columns.contains(&h.as_str()))
            .collect();

        let mut text_values: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
        let mut float_values: Vec<Vec<f64>> = vec![Vec::new(); headers.len()];

        for (row, record) in reader.records().enumerate() {
            let record = record?;
            for (col, header) in headers.iter().enumerate() {
                let cell = record.get(col).unwrap_or("");
                if is_text[col] {
                    text_values[col].push(cell.to_string());
                } else {
                    float_values[col].push(parse_cell(cell, header, row + 1)?);
                }
            }
        }

        let mut fields = Vec::with_capacity(headers.len());
        let mut columns: Vec<ArrayRef> = Vec::with_capacity(headers.len());
        for (col, header) in headers.iter().enumerate() {
            if is_text[col] {
                fields.push(Field::new(header, DataType::Utf8, false));
                columns.push(Arc::new(StringArray::from(std::mem::take(
                    &mut text_values[col],
                ))));
            } else {
                fields.push(Field::new(header, DataType::Float64, true));
                columns.push(Arc::new(Float64Array::from(std::mem::take(
                    &mut float_values[col],
                ))));
            }
        }

        let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?;
        Self::from_batch(batch, identifier, source)
    }

    /// Wrap an existing record batch.
    ///
    /// # Errors
    /// Returns error if the identifier column is missing or not `Utf8`
    pub fn from_batch(batch: RecordBatch, identifier: &str, source: &str) -> Result<Self> {
        let column = batch
            .column_by_name(identifier)
            .ok_or_else(|| Error::MissingColumn {
                column: identifier.to_string(),
                table: source.to_string(),
            })?;
        let strings = column
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or_else(|| {
                Error::InvalidInput(format!(
                    "identifier column '{identifier}' of {source} must be a string column"
                ))
            })?;
        let ids = (0..strings.len())
            .map(|i| strings.value(i).to_string())
            .collect();

        Ok(Self {
            batch,
            ids,
            identifier: identifier.to_string(),
            source: source.to_string(),
        })
    }

    /// Underlying record batch
    #[must_use]
    pub const fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    /// Row identifiers in row order
    #[must_use]
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    /// Name of the identifier column
    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Where the table came from (file path or fixture name)
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Number of rows
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    /// Number of columns still present (identifier included until dropped)
    #[must_use]
    pub fn num_columns(&self) -> usize {
        self.batch.num_columns()
    }

    /// Column names in schema order
    #[must_use]
    pub fn column_names(&self) -> Vec<String> {
        self.batch
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect()
    }

    /// Select rows by position (in the given order)
    ///
    /// # Errors
    /// Returns error if an index is out of bounds
    pub fn take(&self, indices: &[usize]) -> Result<Self> {
        let mut positions = Vec::with_capacity(indices.len());
        for &i in indices {
            if i >= self.num_rows() {
                return Err(Error::InvalidInput(format!(
                    "row index {i} out of bounds ({} rows in {})",
                    self.num_rows(),
                    self.source
                )));
            }
            positions.push(u32::try_from(i).map_err(|_| {
                Error::InvalidInput(format!("row index {i} exceeds u32 range"))
            })?);
        }
        let positions = UInt32Array::from(positions);

        let columns = self
            .batch
            .columns()
            .iter()
            .map(|c| compute::take(c.as_ref(), &positions, None))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let batch = RecordBatch::try_new(self.batch.schema(), columns)?;

        Ok(Self {
            batch,
            ids: indices.iter().map(|&i| self.ids[i].clone()).collect(),
            identifier: self.identifier.clone(),
            source: self.source.clone(),
        })
    }

    /// Rows sorted by identifier (stable)
    ///
    /// # Errors
    /// Returns error if the Arrow take kernel fails
    pub fn sorted_by_id(&self) -> Result<Self> {
        let mut order: Vec<usize> = (0..self.num_rows()).collect();
        order.sort_by(|&a, &b| self.ids[a].cmp(&self.ids[b]));
        self.take(&order)
    }

    /// Rows whose identifier occurs in `other`, sorted by identifier
    /// (inner join membership, `other` is authoritative)
    ///
    /// # Errors
    /// Returns error if the Arrow take kernel fails
    pub fn restricted_to(&self, other: &Self) -> Result<Self> {
        let keep: HashSet<&str> = other.ids.iter().map(String::as_str).collect();
        let mut order: Vec<usize> = (0..self.num_rows())
            .filter(|&i| keep.contains(self.ids[i].as_str()))
            .collect();
        order.sort_by(|&a, &b| self.ids[a].cmp(&self.ids[b]));
        self.take(&order)
    }

    /// Rows whose identifier is NOT in `excluded`, order preserved
    ///
    /// # Errors
    /// Returns error if the Arrow take kernel fails
    pub fn without_ids(&self, excluded: &HashSet<&str>) -> Result<Self> {
        let order: Vec<usize> = (0..self.num_rows())
            .filter(|&i| !excluded.contains(self.ids[i].as_str()))
            .collect();
        self.take(&order)
    }

    /// Values of a numeric column
    ///
    /// # Errors
    /// Returns error if the column is missing or not numeric
    pub fn numeric_column(&self, name: &str) -> Result<Vec<f64>> {
        let column = self
            .batch
            .column_by_name(name)
            .ok_or_else(|| Error::MissingColumn {
                column: name.to_string(),
                table: self.source.clone(),
            })?;
        let values = column
            .as_any()
            .downcast_ref::<Float64Array>()
            .ok_or_else(|| {
                Error::InvalidInput(format!(
                    "column '{name}' of {} is not numeric",
                    self.source
                ))
            })?;
        Ok(values.values().to_vec())
    }

    /// Drop columns by name.
    ///
    /// Names are compared after trimming surrounding whitespace, so `" ES"`
    /// and `"ES"` address the same column. Identifiers stay available through
    /// [`Table::ids`] even when the identifier column is dropped.
    ///
    /// # Errors
    /// Returns error if a requested column does not exist
    pub fn drop_columns(&self, names: &[&str]) -> Result<Self> {
        let schema = self.batch.schema();
        let mut dropped = vec![false; schema.fields().len()];

        for name in names {
            let wanted = name.trim();
            let position = schema
                .fields()
                .iter()
                .position(|f| f.name().trim() == wanted)
                .ok_or_else(|| Error::MissingColumn {
                    column: wanted.to_string(),
                    table: self.source.clone(),
                })?;
            dropped[position] = true;
        }

        let keep: Vec<usize> = (0..dropped.len()).filter(|&i| !dropped[i]).collect();
        let batch = self.batch.project(&keep)?;

        Ok(Self {
            batch,
            ids: self.ids.clone(),
            identifier: self.identifier.clone(),
            source: self.source.clone(),
        })
    }

    /// Row-major feature matrix of all remaining columns
    ///
    /// # Errors
    /// Returns error if any remaining column is not numeric
    pub fn to_matrix(&self) -> Result<Array2<f64>> {
        let schema = self.batch.schema();
        let mut columns = Vec::with_capacity(self.batch.num_columns());
        for (field, column) in schema.fields().iter().zip(self.batch.columns()) {
            let values = column
                .as_any()
                .downcast_ref::<Float64Array>()
                .ok_or_else(|| {
                    Error::InvalidInput(format!(
                        "column '{}' of {} is not numeric and must be dropped before building features",
                        field.name(),
                        self.source
                    ))
                })?;
            columns.push(values);
        }

        Ok(Array2::from_shape_fn(
            (self.num_rows(), columns.len()),
            |(r, c)| columns[c].value(r),
        ))
    }
}

/// Parse a numeric cell; empty cells are missing values
fn parse_cell(cell: &str, column: &str, row: usize) -> Result<f64> {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return Ok(f64::NAN);
    }
    trimmed.parse::<f64>().map_err(|_| Error::Parse {
        column: column.to_string(),
        row,
        value: cell.to_string(),
    })
}

/// Shortest round-tripping rendering with at least one decimal (`1.0`, `0.25`, `nan`)
#[must_use]
pub fn format_float(value: f64) -> String {
    if value.is_nan() {
        "nan".to_string()
    } else if value.is_infinite() {
        let text = if value > 0.0 { "inf" } else { "-inf" };
        text.to_string()
    } else if value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}
