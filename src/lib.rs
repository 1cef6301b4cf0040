//! Daily taxi-trip datamart: per vendor, payment type and rate code totals,
//! labelled with TLC dimension names and written to CSV and MySQL.

pub mod aggregate;
pub mod config;
pub mod dimension;
pub mod enrich;
pub mod error;
pub mod ingest;
pub mod logging;
pub mod pipeline;
pub mod sink;
pub mod table;
pub mod trip;
