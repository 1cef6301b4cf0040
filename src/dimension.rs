//! Static lookup tables that turn TLC codes into display names.

use std::collections::HashMap;
use std::sync::Arc;

use datafusion::arrow::array::{ArrayRef, Int32Array, StringArray};
use datafusion::arrow::datatypes::{DataType, Field, Schema};
use datafusion::arrow::error::ArrowError;
use datafusion::arrow::record_batch::RecordBatch;

use crate::error::DimensionError;

pub const VENDORS: &[(i32, &str)] = &[
    (1, "Creative Mobile Technologies, LLC"),
    (2, "VeriFone Inc"),
];

pub const RATES: &[(i32, &str)] = &[
    (1, "Standard rate"),
    (2, "JFK"),
    (3, "Newark"),
    (4, "Nassau or Westchester"),
    (5, "Negotiated fare"),
    (6, "Group ride"),
];

pub const PAYMENTS: &[(i32, &str)] = &[
    (1, "Credit card"),
    (2, "Cash"),
    (3, "No charge"),
    (4, "Dispute"),
    (5, "Unknown"),
    (6, "Voided trip"),
];

/// An immutable id -> name table.
#[derive(Debug, Clone)]
pub struct Dimension {
    name: &'static str,
    entries: HashMap<i32, String>,
}

impl Dimension {
    /// Builds a table from (id, name) pairs. Ids must be unique.
    pub fn new<I, S>(name: &'static str, pairs: I) -> Result<Self, DimensionError>
    where
        I: IntoIterator<Item = (i32, S)>,
        S: Into<String>,
    {
        let mut entries = HashMap::new();
        for (id, label) in pairs {
            if entries.insert(id, label.into()).is_some() {
                return Err(DimensionError::DuplicateId {
                    dimension: name,
                    id,
                });
            }
        }
        Ok(Self { name, entries })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Name the table is registered under in a session, e.g. `vendor_dim`.
    pub fn table_name(&self) -> String {
        format!("{}_dim", self.name)
    }

    /// Id column, e.g. `vendor_key`. Distinct per dimension so joins never clash.
    pub fn key_column(&self) -> String {
        format!("{}_key", self.name)
    }

    /// Label column, e.g. `vendor_name`.
    pub fn label_column(&self) -> String {
        format!("{}_name", self.name)
    }

    /// The table as one batch of (key, label) rows in id order.
    pub fn to_batch(&self) -> Result<RecordBatch, ArrowError> {
        let mut entries: Vec<_> = self.entries.iter().collect();
        entries.sort();

        let schema = Arc::new(Schema::new(vec![
            Field::new(self.key_column(), DataType::Int32, false),
            Field::new(self.label_column(), DataType::Utf8, false),
        ]));
        let ids: ArrayRef = Arc::new(
            entries
                .iter()
                .map(|(id, _)| **id)
                .collect::<Int32Array>(),
        );
        let labels: ArrayRef = Arc::new(
            entries
                .iter()
                .map(|(_, label)| Some(label.as_str()))
                .collect::<StringArray>(),
        );
        RecordBatch::try_new(schema, vec![ids, labels])
    }
}

/// The three tables the datamart is enriched with.
#[derive(Debug, Clone)]
pub struct Dimensions {
    pub vendor: Dimension,
    pub payment: Dimension,
    pub rate: Dimension,
}

impl Dimensions {
    /// The TLC vendor, payment type and rate code tables.
    pub fn builtin() -> Result<Self, DimensionError> {
        Ok(Self {
            vendor: Dimension::new("vendor", VENDORS.iter().copied())?,
            payment: Dimension::new("payment", PAYMENTS.iter().copied())?,
            rate: Dimension::new("rate", RATES.iter().copied())?,
        })
    }
}
