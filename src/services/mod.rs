//! Business logic services.

pub mod github;
pub mod ingestion;
pub mod payload;
pub mod retry;
pub mod store;
