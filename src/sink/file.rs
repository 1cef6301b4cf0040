use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use datafusion::arrow::csv::WriterBuilder;
use datafusion::arrow::datatypes::SchemaRef;
use datafusion::arrow::record_batch::RecordBatch;
use tracing::info;

use crate::error::SinkError;

pub const PART_FILE: &str = "part-00000.csv";
pub const SUCCESS_MARKER: &str = "_SUCCESS";

/// Replaces `dir` with a directory holding `batches` as one CSV part file and
/// an empty `_SUCCESS` marker. Returns the path of the part file.
///
/// The header is written even when there are no rows; `schema` supplies it
/// then.
pub fn write_csv_dir(
    dir: &Path,
    schema: SchemaRef,
    batches: &[RecordBatch],
) -> Result<PathBuf, SinkError> {
    let dir_error = |source: io::Error| SinkError::OutputDirectory {
        path: dir.to_path_buf(),
        source,
    };

    match fs::remove_dir_all(dir) {
        Ok(()) => info!(dir = %dir.display(), "Removed previous output"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(dir_error(e)),
    }
    fs::create_dir_all(dir).map_err(dir_error)?;

    let empty;
    let batches = if batches.is_empty() {
        empty = [RecordBatch::new_empty(schema)];
        &empty[..]
    } else {
        batches
    };

    let part = dir.join(PART_FILE);
    let mut buf = Vec::new();
    {
        let mut writer = WriterBuilder::new().with_header(true).build(&mut buf);
        for batch in batches {
            writer.write(batch).map_err(|source| SinkError::Encode {
                path: part.clone(),
                source,
            })?;
        }
    }
    let rows: usize = batches.iter().map(RecordBatch::num_rows).sum();
    fs::write(&part, &buf).map_err(|source| SinkError::Write {
        path: part.clone(),
        source,
    })?;

    let marker = dir.join(SUCCESS_MARKER);
    fs::write(&marker, b"").map_err(|source| SinkError::Write {
        path: marker,
        source,
    })?;

    info!(path = %part.display(), rows, bytes = buf.len(), "File sink written");
    Ok(part)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::enriched_schema;
    use datafusion::arrow::array::{ArrayRef, Date32Array, Float64Array, Int32Array, StringArray};
    use std::sync::Arc;

    const HEADER: &str =
        "dt,vendor_id,payment_type,ratecode_id,sum_amount,avg_tips,rate_name,vendor_name,payment_name";

    // (vendor_id, sum_amount) rows on 2024-01-01, paid cash at the standard rate.
    fn batch(rows: &[(i32, Option<f64>)]) -> RecordBatch {
        let n = rows.len();
        let columns: Vec<ArrayRef> = vec![
            Arc::new(Date32Array::from(vec![19_723; n])),
            Arc::new(rows.iter().map(|r| Some(r.0)).collect::<Int32Array>()),
            Arc::new(Int32Array::from(vec![2; n])),
            Arc::new(Int32Array::from(vec![1; n])),
            Arc::new(rows.iter().map(|r| r.1).collect::<Float64Array>()),
            Arc::new(Float64Array::from(vec![2.0; n])),
            Arc::new(StringArray::from(vec!["Standard rate"; n])),
            Arc::new(StringArray::from(vec!["Creative Mobile Technologies, LLC"; n])),
            Arc::new(StringArray::from(vec!["Cash"; n])),
        ];
        RecordBatch::try_new(enriched_schema(), columns).unwrap()
    }

    #[test]
    fn test_writes_header_rows_and_marker() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("output");
        let batches = [batch(&[(1, Some(30.0))]), batch(&[(2, None)])];

        let part = write_csv_dir(&out, enriched_schema(), &batches).unwrap();

        let content = fs::read_to_string(&part).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines[0], HEADER);
        assert!(lines[1].starts_with("2024-01-01,1,2,1,30"));
        assert!(lines[1].ends_with(",Standard rate,\"Creative Mobile Technologies, LLC\",Cash"));
        assert!(lines[2].starts_with("2024-01-01,2,2,1,,2"));
        assert_eq!(lines.len(), 3);
        assert!(out.join(SUCCESS_MARKER).exists());
    }

    #[test]
    fn test_no_rows_still_writes_header() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("output");

        let part = write_csv_dir(&out, enriched_schema(), &[]).unwrap();

        let content = fs::read_to_string(&part).unwrap();
        assert_eq!(content.lines().collect::<Vec<_>>(), vec![HEADER]);
        assert!(out.join(SUCCESS_MARKER).exists());
    }

    #[test]
    fn test_previous_output_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("output");
        fs::create_dir_all(&out).unwrap();
        fs::write(out.join("part-00007.csv"), "stale").unwrap();

        write_csv_dir(&out, enriched_schema(), &[batch(&[(1, Some(30.0))])]).unwrap();

        assert!(!out.join("part-00007.csv").exists());
        assert!(out.join(PART_FILE).exists());
    }
}
