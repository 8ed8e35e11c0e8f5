use serde::Serialize;
use sqlx::FromRow;

/// One row per processed file, recording how long the pipeline took for it.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct FileScanRecord {
    pub source_file: String,
    pub scan_time_ms: i64,
}
