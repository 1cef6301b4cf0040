//! Error types for each stage of the datamart job.
//!
//! Every stage owns its own error enum so a failed run says which stage broke:
//! ingestion, aggregation, dimension setup, enrichment, display or a sink.
//! Configuration problems are reported by the binary before a run starts.

use std::io;
use std::path::PathBuf;

use datafusion::arrow::error::ArrowError;
use datafusion::error::DataFusionError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("ingestion failed: {0}")]
    Ingest(#[from] IngestError),

    #[error("aggregation failed: {0}")]
    Aggregate(#[from] AggregateError),

    #[error("dimension setup failed: {0}")]
    Dimension(#[from] DimensionError),

    #[error("enrichment failed: {0}")]
    Enrich(#[from] EnrichError),

    #[error("cannot display {title}: {source}")]
    Display {
        title: &'static str,
        #[source]
        source: DataFusionError,
    },

    #[error("cannot read enriched rows: {0}")]
    Rows(#[from] ArrowError),

    #[error("sink failed: {0}")]
    Sink(#[from] SinkError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing database setting `{0}` (pass --skip-database to run without the database sink)")]
    MissingDatabaseSetting(&'static str),

    #[error("invalid SQL identifier for {field}: {value:?}")]
    InvalidIdentifier { field: &'static str, value: String },
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("input directory does not exist: {}", .0.display())]
    MissingDirectory(PathBuf),

    #[error("input path is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("invalid input pattern {pattern}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("cannot list input files: {0}")]
    Listing(#[from] glob::GlobError),

    #[error("no *.csv files found in {}", .0.display())]
    NoInputFiles(PathBuf),

    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("cannot build trips table: {0}")]
    Table(#[source] ArrowError),
}

#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("{column} is not finite in {groups} group(s)")]
    NonFinite { column: &'static str, groups: usize },

    #[error(transparent)]
    DataFusion(#[from] DataFusionError),
}

#[derive(Debug, Error)]
pub enum DimensionError {
    #[error("dimension {dimension} declares id {id} more than once")]
    DuplicateId { dimension: &'static str, id: i32 },
}

#[derive(Debug, Error)]
pub enum EnrichError {
    #[error("cannot build {dimension} dimension table: {source}")]
    Table {
        dimension: &'static str,
        #[source]
        source: ArrowError,
    },

    #[error(transparent)]
    DataFusion(#[from] DataFusionError),
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("cannot prepare output directory {}: {source}", path.display())]
    OutputDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot encode rows for {}: {source}", path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: ArrowError,
    },

    #[error("cannot write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot connect to database {target}: {source}")]
    Connect {
        target: String,
        #[source]
        source: mysql_async::Error,
    },

    #[error("cannot create table {table}: {source}")]
    CreateTable {
        table: String,
        #[source]
        source: mysql_async::Error,
    },

    #[error("cannot append rows to {table}: {source}")]
    Insert {
        table: String,
        #[source]
        source: mysql_async::Error,
    },
}
