//! End-to-end test of the scan ingestion pipeline over HTTP.
//!
//! Boots the Axum app on a random port against a temporary SQLite database,
//! with a wiremock server standing in for the GitHub contents API.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::{Client, StatusCode};
use scanledger::config::AppConfig;
use scanledger::services::github::GitHubClient;
use scanledger::services::retry::RetryPolicy;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::net::TcpListener;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const REPO: &str = "https://github.com/velancio/vulnerability_scans";
const CONTENTS: &str = "/repos/velancio/vulnerability_scans/contents";
const FIXTURE: &str = include_str!("fixtures/vulnscan1011.b64");

struct TestApp {
    base_url: String,
    db: sqlx::SqlitePool,
    github: MockServer,
    _dir: TempDir,
    _handle: tokio::task::JoinHandle<()>,
}

/// Spin up the full Axum app on a random port, returning its base URL along
/// with the database pool and the mock GitHub server.
async fn start_server() -> TestApp {
    let dir = TempDir::new().expect("tempdir");
    let database_url = format!("sqlite://{}", dir.path().join("pipeline.db").display());
    let github = MockServer::start().await;

    let config = AppConfig {
        database_url,
        database_max_connections: 5,
        host: "127.0.0.1".to_string(),
        port: 0,
        github_api_url: github.uri(),
        github_token: "test-token".to_string(),
        ingest_max_concurrency: 3,
        fetch_max_retries: 2,
        fetch_retry_base_ms: 5,
        fetch_timeout_secs: 5,
    };

    let pool = scanledger::db::create_pool(&config.database_url, config.database_max_connections)
        .await
        .expect("pool");
    scanledger::db::migrate(&pool).await.expect("migrations");

    let client = GitHubClient::new(
        config.github_api_url.clone(),
        config.github_token.clone(),
        RetryPolicy {
            max_retries: config.fetch_max_retries,
            base_delay: Duration::from_millis(config.fetch_retry_base_ms),
            backoff_factor: 2,
        },
        config.fetch_timeout(),
    )
    .expect("github client");

    let state = scanledger::AppState {
        db: pool.clone(),
        config,
        github: Arc::new(client),
    };
    let app = scanledger::routes::router(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });

    TestApp {
        base_url: format!("http://{addr}"),
        db: pool,
        github,
        _dir: dir,
        _handle: handle,
    }
}

fn file_body(name: &str, content: &str) -> Value {
    json!({
        "name": name,
        "path": name,
        "html_url": format!("{REPO}/blob/main/{name}"),
        "content": content,
        "encoding": "base64"
    })
}

fn generated_payload(scan_id: &str, vuln_id: &str, severity: &str) -> String {
    let body = json!([{
        "scanResults": {
            "scan_id": scan_id,
            "timestamp": "2025-01-29T13:00:00Z",
            "scan_status": "completed",
            "resource_type": "container",
            "resource_name": "ml-inference:2.0.0",
            "vulnerabilities": [{
                "id": vuln_id,
                "severity": severity,
                "cvss": 8.5,
                "status": "active",
                "package_name": "tensorflow",
                "current_version": "2.7.0",
                "fixed_version": "2.7.1",
                "description": "Remote code execution in TensorFlow model loading",
                "published_date": "2025-01-24T00:00:00Z",
                "link": format!("https://nvd.nist.gov/vuln/detail/{vuln_id}"),
                "risk_factors": ["Remote Code Execution", "Exploit in Wild"]
            }],
            "summary": {
                "total_vulnerabilities": 1,
                "severity_counts": { "CRITICAL": 0, "HIGH": 1, "MEDIUM": 0, "LOW": 0 },
                "fixable_count": 1,
                "compliant": false
            },
            "scan_metadata": {
                "scanner_version": "30.1.51",
                "policies_version": "2025.1.29",
                "scanning_rules": ["vulnerability", "compliance"],
                "excluded_paths": ["/tmp"]
            }
        }
    }]);
    STANDARD.encode(serde_json::to_vec(&body).unwrap())
}

async fn mount_file(server: &MockServer, name: &str, content: &str) {
    Mock::given(method("GET"))
        .and(path(format!("{CONTENTS}/{name}")))
        .and(header("Authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(file_body(name, content)))
        .mount(server)
        .await;
}

async fn count(pool: &sqlx::SqlitePool, table: &str) -> i64 {
    sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(pool)
        .await
        .unwrap()
}

/// Helper: extract `data` from the API envelope, panic with message on error.
fn extract_data(body: &Value) -> &Value {
    if let Some(err) = body.get("error").filter(|e| !e.is_null()) {
        panic!(
            "API error: {} - {}",
            err["code"].as_str().unwrap_or("?"),
            err["message"].as_str().unwrap_or("?"),
        );
    }
    body.get("data").expect("missing 'data' field")
}

#[tokio::test]
async fn health_endpoints() {
    let app = start_server().await;
    let client = Client::new();

    let resp = client.get(format!("{}/health/live", app.base_url)).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.unwrap(), "OK");

    let resp = client.get(format!("{}/health/ready", app.base_url)).send().await.unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(extract_data(&body)["database"], "connected");
}

#[tokio::test]
async fn scan_then_query_by_severity() {
    let app = start_server().await;
    let client = Client::new();

    mount_file(&app.github, "vulnscan1011.json", FIXTURE).await;
    mount_file(
        &app.github,
        "vulnscan1213.json",
        &generated_payload("VULN_scan_345mno", "CVE-2024-5555", "HIGH"),
    )
    .await;

    let resp = client
        .post(format!("{}/api/v1/scan", app.base_url))
        .json(&json!({ "repo": REPO, "files": ["vulnscan1011.json", "vulnscan1213.json"] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    let data = extract_data(&body);
    assert_eq!(data["message"], "All JSON files scanned successfully");
    assert_eq!(data["files_scanned"], 2);

    assert_eq!(count(&app.db, "scan_results").await, 3);
    assert_eq!(count(&app.db, "vulnerabilities").await, 4);
    assert_eq!(count(&app.db, "file_scans").await, 2);

    let resp = client
        .post(format!("{}/api/v1/query", app.base_url))
        .json(&json!({ "filters": { "severity": "HIGH" } }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    let vulns = extract_data(&body).as_array().unwrap().clone();
    assert_eq!(vulns.len(), 2);
    assert!(vulns.iter().all(|v| v["severity"] == "HIGH"));

    let ids: Vec<&str> = vulns.iter().map(|v| v["id"].as_str().unwrap()).collect();
    assert!(ids.contains(&"CVE-2024-2222"));
    assert!(ids.contains(&"CVE-2024-5555"));

    let from_fixture = vulns.iter().find(|v| v["id"] == "CVE-2024-2222").unwrap();
    assert_eq!(from_fixture["scan_id"], "VULN_scan_456def");
    assert_eq!(
        from_fixture["source_file"],
        format!("{REPO}/blob/main/vulnscan1011.json")
    );
    assert_eq!(
        from_fixture["risk_factors"],
        json!(["Authentication Bypass", "High CVSS Score", "Proof of Concept Exploit Available"])
    );

    // Case-sensitive match, and no matches is an empty list rather than an error.
    for severity in ["high", "LOW"] {
        let resp = client
            .post(format!("{}/api/v1/query", app.base_url))
            .json(&json!({ "filters": { "severity": severity } }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(extract_data(&body), &json!([]));
    }
}

#[tokio::test]
async fn missing_file_is_reported_while_others_commit() {
    let app = start_server().await;
    let client = Client::new();

    mount_file(
        &app.github,
        "a.json",
        &generated_payload("scan_a", "CVE-A", "HIGH"),
    )
    .await;
    mount_file(
        &app.github,
        "c.json",
        &generated_payload("scan_c", "CVE-C", "MEDIUM"),
    )
    .await;
    Mock::given(method("GET"))
        .and(path(format!("{CONTENTS}/missing.json")))
        .respond_with(ResponseTemplate::new(404))
        .expect(3)
        .mount(&app.github)
        .await;

    let resp = client
        .post(format!("{}/api/v1/scan", app.base_url))
        .json(&json!({ "repo": REPO, "files": ["a.json", "missing.json", "c.json"] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "INGESTION_FAILED");
    let message = body["error"]["message"].as_str().unwrap();
    let lines: Vec<&str> = message.lines().collect();
    assert_eq!(lines.len(), 1, "{message}");
    assert!(lines[0].starts_with("file missing.json: fetch failed:"), "{message}");
    assert!(lines[0].contains("404"));

    assert_eq!(count(&app.db, "scan_results").await, 2);
    assert_eq!(count(&app.db, "file_scans").await, 2);
}

#[tokio::test]
async fn invalid_requests_are_rejected_before_any_fetch() {
    let app = start_server().await;
    let client = Client::new();

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&app.github)
        .await;

    let cases = [
        json!({ "repo": "", "files": ["a.json"] }),
        json!({ "repo": REPO, "files": [] }),
        json!({ "repo": "https://github.com/velancio", "files": ["a.json"] }),
    ];

    for case in cases {
        let resp = client
            .post(format!("{}/api/v1/scan", app.base_url))
            .json(&case)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{case}");
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    let resp = client
        .post(format!("{}/api/v1/query", app.base_url))
        .json(&json!({ "filters": { "severity": "" } }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn rescanning_a_file_fails_without_touching_stored_rows() {
    let app = start_server().await;
    let client = Client::new();

    mount_file(
        &app.github,
        "a.json",
        &generated_payload("scan_a", "CVE-A", "HIGH"),
    )
    .await;

    let request = json!({ "repo": REPO, "files": ["a.json"] });
    let resp = client
        .post(format!("{}/api/v1/scan", app.base_url))
        .json(&request)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client
        .post(format!("{}/api/v1/scan", app.base_url))
        .json(&request)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = resp.json().await.unwrap();
    let message = body["error"]["message"].as_str().unwrap();
    assert!(message.starts_with("file a.json: persist failed:"), "{message}");

    assert_eq!(count(&app.db, "scan_results").await, 1);
    assert_eq!(count(&app.db, "vulnerabilities").await, 1);
}

#[tokio::test]
async fn caller_disconnect_does_not_cancel_ingestion() {
    let app = start_server().await;

    let names: Vec<String> = (0..6).map(|i| format!("slow{i}.json")).collect();
    for (i, name) in names.iter().enumerate() {
        Mock::given(method("GET"))
            .and(path(format!("{CONTENTS}/{name}")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(file_body(
                        name,
                        &generated_payload(&format!("scan_slow_{i}"), "CVE-SLOW", "LOW"),
                    ))
                    .set_delay(Duration::from_millis(300)),
            )
            .mount(&app.github)
            .await;
    }

    // Gives up well before the first file is even fetched.
    let impatient = Client::builder()
        .timeout(Duration::from_millis(100))
        .build()
        .unwrap();
    let sent = impatient
        .post(format!("{}/api/v1/scan", app.base_url))
        .json(&json!({ "repo": REPO, "files": names }))
        .send()
        .await;
    assert!(sent.is_err());

    let mut stored = 0;
    for _ in 0..30 {
        stored = count(&app.db, "file_scans").await;
        if stored == 6 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert_eq!(stored, 6);
    assert_eq!(count(&app.db, "vulnerabilities").await, 6);
}
