use chrono::NaiveDateTime;

/// Column names of the trip files, in file order. Files are read positionally
/// against this list; the header row is skipped, not matched.
pub const TRIP_COLUMNS: [&str; 18] = [
    "vendor_id",
    "tpep_pickup_datetime",
    "tpep_dropoff_datetime",
    "passenger_count",
    "trip_distance",
    "ratecode_id",
    "store_and_fwd_flag",
    "pulocation_id",
    "dolocation_id",
    "payment_type",
    "fare_amount",
    "extra",
    "mta_tax",
    "tip_amount",
    "tolls_amount",
    "improvement_surcharge",
    "total_amount",
    "congestion_surcharge",
];

/// One taxi ride as read from the input files. Every field is nullable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TripRecord {
    pub vendor_id: Option<i32>,
    pub pickup_datetime: Option<NaiveDateTime>,
    pub dropoff_datetime: Option<NaiveDateTime>,
    pub passenger_count: Option<i32>,
    pub trip_distance: Option<f64>,
    pub ratecode_id: Option<i32>,
    pub store_and_fwd_flag: Option<String>,
    pub pulocation_id: Option<i32>,
    pub dolocation_id: Option<i32>,
    pub payment_type: Option<i32>,
    pub fare_amount: Option<f64>,
    pub extra: Option<f64>,
    pub mta_tax: Option<f64>,
    pub tip_amount: Option<f64>,
    pub tolls_amount: Option<f64>,
    pub improvement_surcharge: Option<f64>,
    pub total_amount: Option<f64>,
    pub congestion_surcharge: Option<f64>,
}
