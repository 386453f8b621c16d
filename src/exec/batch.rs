//! Row batches flowing between execution nodes.

use std::sync::Arc;

use arrow::array::{Array, ArrayRef};
use arrow::datatypes::{Field, Schema};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use serde::{Deserialize, Serialize};

use crate::error::{Result, VexecError};
use crate::types::DataType;

/// Ordered column types of a row batch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct RowDescriptor {
    types: Vec<DataType>,
}

impl RowDescriptor {
    /// Creates a descriptor from column types.
    #[must_use]
    pub fn new(types: Vec<DataType>) -> Self {
        RowDescriptor { types }
    }

    /// Returns the number of columns.
    #[must_use]
    pub fn size(&self) -> usize {
        self.types.len()
    }

    /// Returns the type of column `index`.
    #[must_use]
    pub fn type_at(&self, index: usize) -> Option<DataType> {
        self.types.get(index).copied()
    }

    /// Returns all column types.
    #[must_use]
    pub fn types(&self) -> &[DataType] {
        &self.types
    }
}

impl From<Vec<DataType>> for RowDescriptor {
    fn from(types: Vec<DataType>) -> Self {
        RowDescriptor::new(types)
    }
}

/// A set of equal-length columns plus an end-of-stream flag.
///
/// Columns are added in descriptor order and are checked against it; a batch
/// is complete once every described column is present.
#[derive(Debug, Clone)]
pub struct RowBatch {
    desc: RowDescriptor,
    num_rows: usize,
    columns: Vec<ArrayRef>,
    eos: bool,
}

impl RowBatch {
    /// Creates an empty batch that expects `num_rows` rows per column.
    #[must_use]
    pub fn new(desc: RowDescriptor, num_rows: usize) -> Self {
        let columns = Vec::with_capacity(desc.size());
        RowBatch {
            desc,
            num_rows,
            columns,
            eos: false,
        }
    }

    /// Creates a complete batch from columns; the row count is taken from
    /// the first column.
    ///
    /// # Errors
    ///
    /// Returns the first error [`RowBatch::add_column`] reports, or
    /// `ArityMismatch` if columns are missing.
    pub fn with_columns(desc: RowDescriptor, columns: Vec<ArrayRef>) -> Result<Self> {
        let num_rows = columns.first().map_or(0, |c| c.len());
        let mut batch = RowBatch::new(desc, num_rows);
        for column in columns {
            batch.add_column(column)?;
        }
        if !batch.is_complete() {
            return Err(VexecError::ArityMismatch {
                expected: batch.desc.size(),
                actual: batch.columns.len(),
            });
        }
        Ok(batch)
    }

    /// Converts an arrow record batch, deriving the descriptor from its schema.
    ///
    /// # Errors
    ///
    /// Returns `TypeError` if a column's type has no logical counterpart.
    pub fn from_record_batch(batch: &RecordBatch) -> Result<Self> {
        let types = batch
            .schema()
            .fields()
            .iter()
            .map(|f| {
                DataType::from_arrow(f.data_type())
                    .ok_or_else(|| VexecError::type_error("a supported type", f.data_type()))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(RowBatch {
            desc: RowDescriptor::new(types),
            num_rows: batch.num_rows(),
            columns: batch.columns().to_vec(),
            eos: false,
        })
    }

    /// Appends the next column.
    ///
    /// # Errors
    ///
    /// Returns `ArityMismatch` if the batch is already complete, `TypeError`
    /// if the column's type differs from the descriptor, or `ExecutionError`
    /// if its length differs from the batch's row count.
    pub fn add_column(&mut self, column: ArrayRef) -> Result<()> {
        let index = self.columns.len();
        let expected = self
            .desc
            .type_at(index)
            .ok_or_else(|| VexecError::ArityMismatch {
                expected: self.desc.size(),
                actual: index + 1,
            })?;
        if DataType::from_arrow(column.data_type()) != Some(expected) {
            return Err(VexecError::type_error(
                format!("{expected} at column {index}"),
                column.data_type(),
            ));
        }
        if column.len() != self.num_rows {
            return Err(VexecError::ExecutionError(format!(
                "column {index} has {} rows, batch has {}",
                column.len(),
                self.num_rows
            )));
        }
        self.columns.push(column);
        Ok(())
    }

    /// Returns the descriptor.
    #[must_use]
    pub fn desc(&self) -> &RowDescriptor {
        &self.desc
    }

    /// Returns the number of rows.
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    /// Returns the number of columns added so far.
    #[must_use]
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// Returns true once every described column has been added.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.columns.len() == self.desc.size()
    }

    /// Returns a column by index.
    ///
    /// # Panics
    ///
    /// Panics if `index >= num_columns()`.
    #[must_use]
    pub fn column(&self, index: usize) -> &ArrayRef {
        &self.columns[index]
    }

    /// Returns all columns.
    #[must_use]
    pub fn columns(&self) -> &[ArrayRef] {
        &self.columns
    }

    /// Returns true if this is the last batch of the stream.
    #[must_use]
    pub fn eos(&self) -> bool {
        self.eos
    }

    /// Marks this batch as the last of the stream.
    pub fn set_eos(&mut self, eos: bool) {
        self.eos = eos;
    }

    /// Converts to an arrow record batch with the given column names.
    ///
    /// # Errors
    ///
    /// Returns `ArityMismatch` if the name count differs from the column
    /// count, or an arrow error if the columns are rejected.
    pub fn to_record_batch(&self, names: &[String]) -> Result<RecordBatch> {
        if names.len() != self.columns.len() {
            return Err(VexecError::ArityMismatch {
                expected: self.columns.len(),
                actual: names.len(),
            });
        }
        let fields: Vec<Field> = names
            .iter()
            .zip(self.desc.types())
            .map(|(name, dt)| Field::new(name, dt.to_arrow(), false))
            .collect();
        let options = RecordBatchOptions::new().with_row_count(Some(self.num_rows));
        Ok(RecordBatch::try_new_with_options(
            Arc::new(Schema::new(fields)),
            self.columns.clone(),
            &options,
        )?)
    }
}

/// Row indices selected from a batch.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SelectionVector {
    /// Indices of selected rows.
    pub indices: Vec<u32>,
}

impl SelectionVector {
    /// Creates a selection vector with the given indices.
    #[must_use]
    pub fn new(indices: Vec<u32>) -> Self {
        SelectionVector { indices }
    }

    /// Creates a selection vector selecting all rows up to count.
    ///
    /// # Errors
    ///
    /// Returns `ExecutionError` if `count` exceeds the 32-bit index range.
    pub fn all(count: usize) -> Result<Self> {
        let end = row_index(count)?;
        Ok(SelectionVector {
            indices: (0..end).collect(),
        })
    }

    /// Returns the number of selected rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Returns true if no rows are selected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Returns the index at the given position.
    #[must_use]
    pub fn get(&self, pos: usize) -> Option<u32> {
        self.indices.get(pos).copied()
    }

    /// Iterates the selected row indices in order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.indices.iter().map(|&i| i as usize)
    }

    pub(crate) fn push(&mut self, index: usize) -> Result<()> {
        self.indices.push(row_index(index)?);
        Ok(())
    }
}

fn row_index(index: usize) -> Result<u32> {
    u32::try_from(index).map_err(|_| {
        VexecError::ExecutionError(format!("row index {index} exceeds 32-bit selection range"))
    })
}
