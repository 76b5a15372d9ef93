//! Row accumulator trait for building Arrow `RecordBatch`es

use arrow::array::RecordBatch;
use arrow::error::ArrowError;

/// Default batch size for flushing accumulated rows into a `RecordBatch`.
pub const DEFAULT_BATCH_SIZE: usize = 8192;

/// Columnar buffer that turns rows into record batches.
pub trait Accumulator {
    type Row;

    fn push(&mut self, row: Self::Row);

    /// Number of rows currently buffered
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check if buffer is full and should be flushed
    fn is_full(&self) -> bool {
        self.len() >= DEFAULT_BATCH_SIZE
    }

    /// Take buffered rows as a RecordBatch, resetting internal state
    fn take_batch(&mut self) -> Result<RecordBatch, ArrowError>;
}

/// Push every row through `acc`, handing full batches (and the remainder) to `write_batch`.
///
/// Returns the number of rows pushed.
pub fn drain_rows<A: Accumulator>(
    acc: &mut A,
    rows: impl IntoIterator<Item = A::Row>,
    mut write_batch: impl FnMut(&RecordBatch) -> std::io::Result<()>,
) -> std::io::Result<usize> {
    let mut pushed = 0usize;
    for row in rows {
        acc.push(row);
        pushed += 1;
        if acc.is_full() {
            write_batch(&acc.take_batch().map_err(std::io::Error::other)?)?;
        }
    }
    if !acc.is_empty() {
        write_batch(&acc.take_batch().map_err(std::io::Error::other)?)?;
    }
    Ok(pushed)
}
