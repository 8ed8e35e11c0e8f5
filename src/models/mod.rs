//! Domain models and DTOs for scan ingestion.

pub mod file_scan;
pub mod remote_file;
pub mod repository;
pub mod scan_result;
pub mod vulnerability;
