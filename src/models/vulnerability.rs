//! Vulnerability records owned by a scan result.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "CRITICAL",
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single vulnerability reported by a scan.
///
/// `scan_id` and `source_file` are not part of the scanner payload; they are
/// filled from the owning scan result before the row is stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Vulnerability {
    pub id: String,
    #[serde(default)]
    pub scan_id: String,
    #[serde(default)]
    pub source_file: String,
    pub severity: Severity,
    pub cvss: f64,
    pub status: String,
    pub package_name: String,
    pub current_version: String,
    pub fixed_version: String,
    pub description: String,
    pub published_date: DateTime<Utc>,
    pub link: String,
    #[sqlx(json)]
    pub risk_factors: Vec<String>,
}
