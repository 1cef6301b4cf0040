//! Reads trip files into typed [`TripRecord`]s.
//!
//! Reading is permissive: a field that does not parse as its column type is
//! read as null and counted, the row itself is kept. Only I/O and framing
//! problems abort the run.

use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use csv::{ByteRecord, ReaderBuilder};
use tracing::{debug, info, warn};

use crate::error::IngestError;
use crate::trip::{TripRecord, TRIP_COLUMNS};

const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Offset-carrying layouts; values are converted to UTC.
const ZONED_TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%#z",
    "%Y-%m-%dT%H:%M:%S%.f%#z",
];

/// Counters collected while reading the input files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub files: usize,
    pub rows_read: usize,
    pub rows_without_vendor: usize,
    pub malformed_fields: usize,
}

#[derive(Debug)]
pub struct Ingested {
    /// Every parsed trip in file order, including those without a vendor id.
    pub trips: Vec<TripRecord>,
    pub report: IngestReport,
}

/// Reads every `*.csv` file under `data_dir`.
///
/// Trips without a vendor id are kept and counted; the datamart query filters
/// them out.
#[tracing::instrument(skip_all, fields(data_dir = %data_dir.display()))]
pub fn ingest(data_dir: &Path) -> Result<Ingested, IngestError> {
    let files = discover_inputs(data_dir)?;

    let mut report = IngestReport {
        files: files.len(),
        ..Default::default()
    };
    let mut trips = Vec::new();
    for path in &files {
        read_trip_file(path, &mut report, &mut trips)?;
    }

    report.rows_without_vendor = trips.iter().filter(|t| t.vendor_id.is_none()).count();

    if report.malformed_fields > 0 {
        warn!(
            malformed_fields = report.malformed_fields,
            "Some fields could not be parsed and were read as null"
        );
    }
    info!(
        files = report.files,
        rows_read = report.rows_read,
        rows_without_vendor = report.rows_without_vendor,
        "Ingestion complete"
    );

    Ok(Ingested { trips, report })
}

/// Lists the input files of `data_dir` in name order.
pub fn discover_inputs(data_dir: &Path) -> Result<Vec<PathBuf>, IngestError> {
    if !data_dir.exists() {
        return Err(IngestError::MissingDirectory(data_dir.to_path_buf()));
    }
    if !data_dir.is_dir() {
        return Err(IngestError::NotADirectory(data_dir.to_path_buf()));
    }

    let pattern = format!(
        "{}/*.csv",
        glob::Pattern::escape(&data_dir.to_string_lossy())
    );
    let mut files = glob::glob(&pattern)
        .map_err(|source| IngestError::Pattern {
            pattern: pattern.clone(),
            source,
        })?
        .collect::<Result<Vec<_>, _>>()?;
    files.retain(|path| path.is_file());
    files.sort();

    if files.is_empty() {
        return Err(IngestError::NoInputFiles(data_dir.to_path_buf()));
    }
    debug!(count = files.len(), "Input files discovered");
    Ok(files)
}

/// Appends the rows of one trip file to `trips`.
pub fn read_trip_file(
    path: &Path,
    report: &mut IngestReport,
    trips: &mut Vec<TripRecord>,
) -> Result<(), IngestError> {
    let file = std::fs::File::open(path).map_err(|e| IngestError::Read {
        path: path.to_path_buf(),
        source: csv::Error::from(e),
    })?;
    read_trips(file, path, report, trips)
}

/// Parses trip rows from any reader. `origin` only labels errors.
pub fn read_trips<R: io::Read>(
    input: R,
    origin: &Path,
    report: &mut IngestReport,
    trips: &mut Vec<TripRecord>,
) -> Result<(), IngestError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(input);

    let mut record = ByteRecord::new();
    loop {
        match reader.read_byte_record(&mut record) {
            Ok(true) => {
                let (trip, malformed) = parse_record(&record);
                report.rows_read += 1;
                report.malformed_fields += malformed;
                trips.push(trip);
            }
            Ok(false) => break,
            Err(source) => {
                return Err(IngestError::Read {
                    path: origin.to_path_buf(),
                    source,
                })
            }
        }
    }
    Ok(())
}

/// Maps one raw row onto the trip columns. Returns the trip and the number of
/// fields that were present but did not parse.
pub fn parse_record(record: &ByteRecord) -> (TripRecord, usize) {
    let mut fields = FieldReader {
        record,
        malformed: 0,
    };
    let trip = TripRecord {
        vendor_id: fields.parse(0, parse_int),
        pickup_datetime: fields.parse(1, parse_timestamp),
        dropoff_datetime: fields.parse(2, parse_timestamp),
        passenger_count: fields.parse(3, parse_int),
        trip_distance: fields.parse(4, parse_float),
        ratecode_id: fields.parse(5, parse_int),
        store_and_fwd_flag: fields.parse(6, |s| Some(s.to_string())),
        pulocation_id: fields.parse(7, parse_int),
        dolocation_id: fields.parse(8, parse_int),
        payment_type: fields.parse(9, parse_int),
        fare_amount: fields.parse(10, parse_float),
        extra: fields.parse(11, parse_float),
        mta_tax: fields.parse(12, parse_float),
        tip_amount: fields.parse(13, parse_float),
        tolls_amount: fields.parse(14, parse_float),
        improvement_surcharge: fields.parse(15, parse_float),
        total_amount: fields.parse(16, parse_float),
        congestion_surcharge: fields.parse(17, parse_float),
    };
    (trip, fields.malformed)
}

struct FieldReader<'r> {
    record: &'r ByteRecord,
    malformed: usize,
}

impl FieldReader<'_> {
    /// Missing and empty fields are null; unparsable ones are null and counted.
    fn parse<T>(&mut self, idx: usize, parse: impl FnOnce(&str) -> Option<T>) -> Option<T> {
        let record = self.record;
        let raw = record.get(idx)?;
        let text = match std::str::from_utf8(raw) {
            Ok(text) => text.trim(),
            Err(_) => {
                self.reject(idx, &String::from_utf8_lossy(raw));
                return None;
            }
        };
        if text.is_empty() {
            return None;
        }

        let value = parse(text);
        if value.is_none() {
            self.reject(idx, text);
        }
        value
    }

    fn reject(&mut self, idx: usize, value: &str) {
        self.malformed += 1;
        debug!(column = TRIP_COLUMNS[idx], value, "Malformed field read as null");
    }
}

fn parse_int(text: &str) -> Option<i32> {
    text.parse().ok()
}

fn parse_float(text: &str) -> Option<f64> {
    text.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| DateTime::parse_from_rfc3339(text).ok().map(|ts| ts.naive_utc()))
        .or_else(|| {
            ZONED_TIMESTAMP_FORMATS
                .iter()
                .find_map(|format| DateTime::parse_from_str(text, format).ok())
                .map(|ts| ts.naive_utc())
        })
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}
