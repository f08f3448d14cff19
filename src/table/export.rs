//! Columnar accumulators and result-table export (CSV, Parquet)

use super::format_float;
use crate::{Error, Result};
use arrow::array::{Array, ArrayRef, Float64Array, StringArray, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

/// One accumulated column
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    /// Free text (model names, tags, confidence-interval strings)
    Text(Vec<String>),
    /// Floating point statistics
    Float(Vec<f64>),
    /// Counts (set sizes)
    Count(Vec<u64>),
}

impl ColumnData {
    fn len(&self) -> usize {
        match self {
            Self::Text(v) => v.len(),
            Self::Float(v) => v.len(),
            Self::Count(v) => v.len(),
        }
    }

    fn to_array(&self) -> (DataType, ArrayRef) {
        match self {
            Self::Text(v) => (DataType::Utf8, Arc::new(StringArray::from(v.clone()))),
            Self::Float(v) => (DataType::Float64, Arc::new(Float64Array::from(v.clone()))),
            Self::Count(v) => (DataType::UInt64, Arc::new(UInt64Array::from(v.clone()))),
        }
    }
}

/// Named columns of equal length, converted to a `RecordBatch` on demand
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnarTable {
    columns: Vec<(String, ColumnData)>,
}

impl ColumnarTable {
    /// Create an empty table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column.
    ///
    /// # Errors
    /// Returns error if the column length differs from existing columns
    pub fn push_column(&mut self, name: impl Into<String>, data: ColumnData) -> Result<()> {
        let name = name.into();
        if let Some((first, existing)) = self.columns.first() {
            if existing.len() != data.len() {
                return Err(Error::InvalidInput(format!(
                    "column '{name}' has {} rows, '{first}' has {}",
                    data.len(),
                    existing.len()
                )));
            }
        }
        self.columns.push((name, data));
        Ok(())
    }

    /// Number of rows (0 for a table without columns)
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.columns.first().map_or(0, |(_, c)| c.len())
    }

    /// Column names in insertion order
    #[must_use]
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Look up a column by name
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ColumnData> {
        self.columns.iter().find(|(n, _)| n == name).map(|(_, c)| c)
    }

    /// Convert to an Arrow record batch
    ///
    /// # Errors
    /// Returns error if Arrow rejects the columns
    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let mut fields = Vec::with_capacity(self.columns.len());
        let mut arrays = Vec::with_capacity(self.columns.len());
        for (name, data) in &self.columns {
            let (data_type, array) = data.to_array();
            fields.push(Field::new(name, data_type, false));
            arrays.push(array);
        }
        Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?)
    }
}

/// Write a record batch as CSV.
///
/// With `with_index`, a leading unnamed column carries the 0-based row
/// number.
///
/// # Errors
/// Returns error if the file cannot be written or a column type is unsupported
pub fn write_csv<P: AsRef<Path>>(batch: &RecordBatch, path: P, with_index: bool) -> Result<()> {
    let mut writer = csv::Writer::from_path(path.as_ref())?;
    let schema = batch.schema();

    let mut header: Vec<String> = Vec::with_capacity(batch.num_columns() + 1);
    if with_index {
        header.push(String::new());
    }
    header.extend(schema.fields().iter().map(|f| f.name().clone()));
    writer.write_record(&header)?;

    for row in 0..batch.num_rows() {
        let mut record: Vec<String> = Vec::with_capacity(header.len());
        if with_index {
            record.push(row.to_string());
        }
        for (field, column) in schema.fields().iter().zip(batch.columns()) {
            record.push(cell_text(column.as_ref(), row).ok_or_else(|| {
                Error::InvalidInput(format!(
                    "unsupported column type {} for CSV export ('{}')",
                    field.data_type(),
                    field.name()
                ))
            })?);
        }
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

fn cell_text(column: &dyn Array, row: usize) -> Option<String> {
    let any = column.as_any();
    if let Some(values) = any.downcast_ref::<StringArray>() {
        return Some(values.value(row).to_string());
    }
    if let Some(values) = any.downcast_ref::<Float64Array>() {
        return Some(format_float(values.value(row)));
    }
    if let Some(values) = any.downcast_ref::<UInt64Array>() {
        return Some(values.value(row).to_string());
    }
    None
}

/// Write a record batch as a Parquet file
///
/// # Errors
/// Returns error if the file cannot be created or encoding fails
pub fn write_parquet<P: AsRef<Path>>(batch: &RecordBatch, path: P) -> Result<()> {
    use parquet::arrow::ArrowWriter;

    let file = File::create(path.as_ref())?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None)?;
    writer.write(batch)?;
    writer.close()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ColumnarTable {
        let mut table = ColumnarTable::new();
        table
            .push_column("Modeltype", ColumnData::Text(vec!["SVR".into(), "Ridge".into()]))
            .unwrap();
        table
            .push_column("mae", ColumnData::Float(vec![1.0, 0.5]))
            .unwrap();
        table
            .push_column("Set size", ColumnData::Count(vec![10, 20]))
            .unwrap();
        table
    }

    #[test]
    fn test_push_column_length_mismatch() {
        let mut table = sample();
        let result = table.push_column("bad", ColumnData::Float(vec![1.0]));
        assert!(result.is_err());
    }

    #[test]
    fn test_to_record_batch() {
        let batch = sample().to_record_batch().unwrap();
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.num_columns(), 3);
    }

    #[test]
    fn test_write_csv_with_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.csv");
        write_csv(&sample().to_record_batch().unwrap(), &path, true).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some(",Modeltype,mae,Set size"));
        assert_eq!(lines.next(), Some("0,SVR,1.0,10"));
        assert_eq!(lines.next(), Some("1,Ridge,0.5,20"));
    }

    #[test]
    fn test_write_parquet() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.parquet");
        write_parquet(&sample().to_record_batch().unwrap(), &path).unwrap();
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
    }
}
