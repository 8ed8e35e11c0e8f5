//! Persistence of decoded scan results.
//!
//! A file's scan results, their vulnerabilities, and the file-scan record are
//! written in one transaction. Rows are only ever inserted; a key collision
//! fails the whole file.

use std::time::Duration;

use sqlx::types::Json;
use sqlx::{SqliteConnection, SqlitePool};

use crate::models::file_scan::FileScanRecord;
use crate::models::scan_result::ScanResult;
use crate::models::vulnerability::Vulnerability;

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("failed to start DB transaction: {0}")]
    Begin(#[source] sqlx::Error),

    #[error("error saving scan result {scan_id}: {source}")]
    ScanResult {
        scan_id: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("error saving vulnerability {id} of scan {scan_id}: {source}")]
    Vulnerability {
        id: String,
        scan_id: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("error saving file scan metadata: {0}")]
    FileScan(#[source] sqlx::Error),

    #[error("failed to commit transaction: {0}")]
    Commit(#[source] sqlx::Error),
}

/// Insert scan results and, after each, its vulnerabilities in list order.
pub async fn save_scan_results(
    conn: &mut SqliteConnection,
    source_file: &str,
    results: &[ScanResult],
) -> Result<(), PersistError> {
    for res in results {
        sqlx::query(
            r#"
            INSERT INTO scan_results (
                scan_id, source_file, timestamp, scan_status, resource_type, resource_name,
                total_vulnerabilities, critical_severity, high_severity, medium_severity,
                low_severity, fixable_count, compliant,
                scanner_version, policies_version, scanning_rules, excluded_paths
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&res.scan_id)
        .bind(source_file)
        .bind(res.timestamp)
        .bind(&res.scan_status)
        .bind(&res.resource_type)
        .bind(&res.resource_name)
        .bind(res.summary.total_vulnerabilities)
        .bind(res.summary.severity_counts.critical)
        .bind(res.summary.severity_counts.high)
        .bind(res.summary.severity_counts.medium)
        .bind(res.summary.severity_counts.low)
        .bind(res.summary.fixable_count)
        .bind(res.summary.compliant)
        .bind(&res.scan_metadata.scanner_version)
        .bind(&res.scan_metadata.policies_version)
        .bind(Json(&res.scan_metadata.scanning_rules))
        .bind(Json(&res.scan_metadata.excluded_paths))
        .execute(&mut *conn)
        .await
        .map_err(|source| PersistError::ScanResult {
            scan_id: res.scan_id.clone(),
            source,
        })?;

        for v in &res.vulnerabilities {
            insert_vulnerability(&mut *conn, &res.scan_id, source_file, v).await?;
        }
    }
    Ok(())
}

async fn insert_vulnerability(
    conn: &mut SqliteConnection,
    scan_id: &str,
    source_file: &str,
    v: &Vulnerability,
) -> Result<(), PersistError> {
    sqlx::query(
        r#"
        INSERT INTO vulnerabilities (
            id, scan_id, source_file, severity, cvss, status, package_name,
            current_version, fixed_version, description, published_date, link, risk_factors
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&v.id)
    .bind(scan_id)
    .bind(source_file)
    .bind(v.severity)
    .bind(v.cvss)
    .bind(&v.status)
    .bind(&v.package_name)
    .bind(&v.current_version)
    .bind(&v.fixed_version)
    .bind(&v.description)
    .bind(v.published_date)
    .bind(&v.link)
    .bind(Json(&v.risk_factors))
    .execute(conn)
    .await
    .map_err(|source| PersistError::Vulnerability {
        id: v.id.clone(),
        scan_id: scan_id.to_string(),
        source,
    })?;
    Ok(())
}

/// Record how long the pipeline took for a file.
pub async fn save_file_scan(
    conn: &mut SqliteConnection,
    source_file: &str,
    scan_time_ms: i64,
) -> Result<(), PersistError> {
    sqlx::query("INSERT INTO file_scans (source_file, scan_time_ms) VALUES (?, ?)")
        .bind(source_file)
        .bind(scan_time_ms)
        .execute(conn)
        .await
        .map_err(PersistError::FileScan)?;
    Ok(())
}

/// Store one file's scan results and its file-scan record atomically.
///
/// Every early return drops the open transaction, which rolls it back.
pub async fn persist_file(
    pool: &SqlitePool,
    source_file: &str,
    results: &[ScanResult],
    elapsed: Duration,
) -> Result<(), PersistError> {
    let mut tx = pool.begin().await.map_err(PersistError::Begin)?;

    save_scan_results(&mut tx, source_file, results).await?;

    let scan_time_ms = i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX);
    save_file_scan(&mut tx, source_file, scan_time_ms).await?;

    tx.commit().await.map_err(PersistError::Commit)?;
    Ok(())
}

/// Vulnerabilities whose stored severity equals `severity` exactly.
pub async fn vulnerabilities_by_severity(
    pool: &SqlitePool,
    severity: &str,
) -> Result<Vec<Vulnerability>, sqlx::Error> {
    sqlx::query_as::<_, Vulnerability>(
        r#"
        SELECT id, scan_id, source_file, severity, cvss, status, package_name,
               current_version, fixed_version, description, published_date, link, risk_factors
        FROM vulnerabilities
        WHERE severity = ?
        ORDER BY rowid
        "#,
    )
    .bind(severity)
    .fetch_all(pool)
    .await
}

/// The file-scan record for a source file, if it was ingested.
pub async fn file_scan(
    pool: &SqlitePool,
    source_file: &str,
) -> Result<Option<FileScanRecord>, sqlx::Error> {
    sqlx::query_as::<_, FileScanRecord>(
        "SELECT source_file, scan_time_ms FROM file_scans WHERE source_file = ?",
    )
    .bind(source_file)
    .fetch_optional(pool)
    .await
}
