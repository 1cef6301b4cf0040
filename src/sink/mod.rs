//! Destinations for the enriched datamart.

pub mod file;
pub mod mysql;

use async_trait::async_trait;

use crate::enrich::EnrichedRow;
use crate::error::SinkError;

pub use file::write_csv_dir;
pub use mysql::MySqlSink;

/// A relational table that enriched rows are appended to.
///
/// Appends are not idempotent: running the job twice against the same table
/// stores every row twice.
#[async_trait]
pub trait TableSink: Send + Sync {
    /// Human readable target, for logs. Must not contain credentials.
    fn target(&self) -> String;

    /// Appends `rows` and returns how many were written.
    async fn append(&self, rows: &[EnrichedRow]) -> Result<usize, SinkError>;
}
