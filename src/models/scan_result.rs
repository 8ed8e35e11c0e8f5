//! Scan result model as carried in the scanner payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::vulnerability::Vulnerability;

/// Payload element wrapping exactly one scan result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResultsWrapper {
    #[serde(rename = "scanResults")]
    pub scan_results: ScanResult,
}

/// One scan run's findings for a resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    pub scan_id: String,
    #[serde(default)]
    pub source_file: String,
    pub timestamp: DateTime<Utc>,
    pub scan_status: String,
    pub resource_type: String,
    pub resource_name: String,
    pub vulnerabilities: Vec<Vulnerability>,
    pub summary: Summary,
    pub scan_metadata: ScanMetadata,
}

impl ScanResult {
    /// Stamp the canonical source file on the result and its vulnerabilities.
    pub fn attach_source(&mut self, source_file: &str) {
        self.source_file = source_file.to_string();
        for vuln in &mut self.vulnerabilities {
            vuln.scan_id = self.scan_id.clone();
            vuln.source_file = source_file.to_string();
        }
    }
}

/// Aggregate counts reported by the scanner. Taken as-is from the payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub total_vulnerabilities: u32,
    pub severity_counts: SeverityCounts,
    pub fixable_count: u32,
    pub compliant: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeverityCounts {
    #[serde(rename = "CRITICAL")]
    pub critical: u32,
    #[serde(rename = "HIGH")]
    pub high: u32,
    #[serde(rename = "MEDIUM")]
    pub medium: u32,
    #[serde(rename = "LOW")]
    pub low: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanMetadata {
    pub scanner_version: String,
    pub policies_version: String,
    pub scanning_rules: Vec<String>,
    pub excluded_paths: Vec<String>,
}
