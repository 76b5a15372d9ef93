//! Parquet snapshot sink with atomic tmp → rename

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::RecordBatch;
use arrow::datatypes::Schema;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, ZstdLevel};
use parquet::file::properties::WriterProperties;

/// Buffered parquet writer; the final file only appears after `finalize`
pub struct ParquetSink {
    writer: ArrowWriter<File>,
    tmp_path: PathBuf,
    final_path: PathBuf,
    row_count: usize,
}

impl std::fmt::Debug for ParquetSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParquetSink")
            .field("final_path", &self.final_path)
            .field("row_count", &self.row_count)
            .finish_non_exhaustive()
    }
}

impl ParquetSink {
    /// Create a sink for `{output_dir}/{name}.parquet`, writing to a tmp file first
    pub fn new(
        name: &str,
        output_dir: &Path,
        schema: &Schema,
        zstd_level: i32,
    ) -> Result<Self, std::io::Error> {
        fs::create_dir_all(output_dir)?;
        let final_path = output_dir.join(format!("{name}.parquet"));
        let tmp_path = output_dir.join(format!("{name}.parquet.tmp"));

        if tmp_path.exists() {
            log::warn!("Removing stale tmp file: {}", tmp_path.display());
            fs::remove_file(&tmp_path)?;
        }

        let file = File::create(&tmp_path)?;
        let level = ZstdLevel::try_new(zstd_level)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
        let props = WriterProperties::builder()
            .set_compression(Compression::ZSTD(level))
            .build();

        let writer = ArrowWriter::try_new(file, Arc::new(schema.clone()), Some(props))
            .map_err(std::io::Error::other)?;

        Ok(Self {
            writer,
            tmp_path,
            final_path,
            row_count: 0,
        })
    }

    pub fn write_batch(&mut self, batch: &RecordBatch) -> Result<(), std::io::Error> {
        self.row_count += batch.num_rows();
        self.writer.write(batch).map_err(std::io::Error::other)
    }

    /// Flush footer and rename tmp → final. Returns (path, rows).
    pub fn finalize(self) -> Result<(PathBuf, usize), std::io::Error> {
        let row_count = self.row_count;
        self.writer.close().map_err(std::io::Error::other)?;
        fs::rename(&self.tmp_path, &self.final_path)?;
        Ok((self.final_path, row_count))
    }
}

/// Check if a completed parquet file exists and has a valid footer
pub fn is_valid_parquet(path: &Path) -> bool {
    let Ok(file) = File::open(path) else {
        return false;
    };
    parquet::file::reader::SerializedFileReader::new(file).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Int32Array, StringArray};
    use arrow::datatypes::{DataType, Field};

    fn schema() -> Schema {
        Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("n", DataType::Int32, true),
        ])
    }

    fn batch(schema: &Schema) -> RecordBatch {
        RecordBatch::try_new(
            Arc::new(schema.clone()),
            vec![
                Arc::new(StringArray::from(vec!["a", "b"])),
                Arc::new(Int32Array::from(vec![Some(1), None])),
            ],
        )
        .unwrap()
    }

    #[test]
    fn write_and_finalize() {
        let dir = tempfile::tempdir().unwrap();
        let schema = schema();
        let mut sink = ParquetSink::new("snap", dir.path(), &schema, 3).unwrap();
        sink.write_batch(&batch(&schema)).unwrap();
        sink.write_batch(&batch(&schema)).unwrap();
        let (path, rows) = sink.finalize().unwrap();
        assert_eq!(rows, 4);
        assert_eq!(path, dir.path().join("snap.parquet"));
        assert!(is_valid_parquet(&path));
        assert!(!dir.path().join("snap.parquet.tmp").exists());
    }

    #[test]
    fn stale_tmp_removed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("snap.parquet.tmp"), b"junk").unwrap();
        let sink = ParquetSink::new("snap", dir.path(), &schema(), 3).unwrap();
        let (path, rows) = sink.finalize().unwrap();
        assert_eq!(rows, 0);
        assert!(is_valid_parquet(&path));
    }

    #[test]
    fn invalid_parquet_detected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.parquet");
        std::fs::write(&path, b"not parquet").unwrap();
        assert!(!is_valid_parquet(&path));
        assert!(!is_valid_parquet(&dir.path().join("missing.parquet")));
    }
}
