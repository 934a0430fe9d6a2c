//! Integration tests for the `octave serve` HTTP API.
//!
//! Each test starts the server as a child process on a unique port with a
//! temp store, makes raw HTTP requests, and verifies the responses.

use std::io::Read;
use std::net::TcpStream;
use std::path::{Path, PathBuf};
use std::process::{Child, Command};
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;

use tempfile::TempDir;

/// Base port is derived from the process ID so parallel test binaries
/// don't collide on the same range.
static NEXT_PORT: AtomicU16 = AtomicU16::new(0);
static PORT_INIT: std::sync::Once = std::sync::Once::new();

fn next_port() -> u16 {
    PORT_INIT.call_once(|| {
        let base = 20000 + (std::process::id() as u16 % 20000);
        NEXT_PORT.store(base, Ordering::SeqCst);
    });
    NEXT_PORT.fetch_add(1, Ordering::SeqCst)
}

fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .and_then(|p| p.parent())
        .expect("workspace root")
        .to_path_buf()
}

struct Server {
    child: Child,
    port: u16,
    store: TempDir,
}

impl Drop for Server {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn start_server(env: &[(&str, &str)]) -> Server {
    let port = next_port();
    let store = TempDir::new().unwrap();
    let config = store.path().join("octave.toml");
    std::fs::write(
        &config,
        format!(
            "schema_dir = {:?}\nstore_root = \"docs\"\n",
            workspace_root().join("schemas").to_string_lossy()
        ),
    )
    .unwrap();

    let mut cmd = Command::new(env!("CARGO_BIN_EXE_octave"));
    cmd.current_dir(workspace_root());
    cmd.arg("--config").arg(&config);
    cmd.arg("serve").arg("--port").arg(port.to_string());
    cmd.env_remove("OCTAVE_API_KEY");
    cmd.env_remove("OCTAVE_RATE_LIMIT");
    for (k, v) in env {
        cmd.env(k, v);
    }
    cmd.stdout(std::process::Stdio::null());
    cmd.stderr(std::process::Stdio::null());

    let child = cmd.spawn().expect("failed to start octave serve");
    for _ in 0..50 {
        if TcpStream::connect(format!("127.0.0.1:{}", port)).is_ok() {
            break;
        }
        std::thread::sleep(Duration::from_millis(100));
    }
    Server { child, port, store }
}

fn request(port: u16, method: &str, path: &str, headers: &[(&str, &str)], body: &str) -> (u16, String) {
    let mut stream = TcpStream::connect(format!("127.0.0.1:{}", port)).expect("failed to connect");
    stream
        .set_read_timeout(Some(Duration::from_secs(10)))
        .unwrap();

    let mut header_lines = String::new();
    for (name, value) in headers {
        header_lines.push_str(&format!("{}: {}\r\n", name, value));
    }
    let request = format!(
        "{} {} HTTP/1.1\r\nHost: localhost:{}\r\nContent-Type: application/json\r\nContent-Length: {}\r\n{}Connection: close\r\n\r\n{}",
        method,
        path,
        port,
        body.len(),
        header_lines,
        body
    );
    std::io::Write::write_all(&mut stream, request.as_bytes()).expect("failed to write");

    let mut response = String::new();
    let _ = stream.read_to_string(&mut response);
    parse_http_response(&response)
}

fn http_get(port: u16, path: &str) -> (u16, String) {
    request(port, "GET", path, &[], "")
}

fn http_post(port: u16, path: &str, body: &serde_json::Value) -> (u16, serde_json::Value) {
    let (status, body) = request(port, "POST", path, &[], &body.to_string());
    let json = serde_json::from_str(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

fn parse_http_response(response: &str) -> (u16, String) {
    let (headers, body) = response.split_once("\r\n\r\n").unwrap_or((response, ""));
    let status = headers
        .lines()
        .next()
        .and_then(|l| l.split_whitespace().nth(1))
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(0);
    let body = if headers.to_lowercase().contains("transfer-encoding: chunked") {
        decode_chunked(body)
    } else {
        body.to_owned()
    };
    (status, body)
}

fn decode_chunked(mut data: &str) -> String {
    let mut result = String::new();
    while let Some(line_end) = data.find("\r\n") {
        let size = match usize::from_str_radix(data[..line_end].trim(), 16) {
            Ok(0) | Err(_) => break,
            Ok(s) => s,
        };
        let start = line_end + 2;
        let end = (start + size).min(data.len());
        result.push_str(&data[start..end]);
        data = data.get(end + 2..).unwrap_or("");
    }
    result
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[test]
fn health_returns_200_with_version() {
    let server = start_server(&[]);
    let (status, body) = http_get(server.port, "/health");
    assert_eq!(status, 200);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["octave_version"], "1.0");
}

#[test]
fn unknown_route_is_404_json() {
    let server = start_server(&[]);
    let (status, body) = http_get(server.port, "/nope");
    assert_eq!(status, 404);
    assert!(body.contains("not found"));
}

#[test]
fn validate_endpoint_repairs_with_fix() {
    let server = start_server(&[]);
    let content = std::fs::read_to_string(workspace_root().join("fixtures/session_loose.oct.md")).unwrap();
    let (status, json) = http_post(
        server.port,
        "/validate",
        &serde_json::json!({ "content": content, "schema_name": "SESSION", "fix": true }),
    );
    assert_eq!(status, 200, "{}", json);
    assert_eq!(json["valid"], true);
    assert_eq!(json["validation_status"], "VALIDATED");
    assert!(json["canonical"].as_str().unwrap().contains("STATUS::ACTIVE\n"));
    assert!(!json["repair_log"].as_array().unwrap().is_empty());
}

#[test]
fn validate_endpoint_reports_fatal_errors_as_400() {
    let server = start_server(&[]);
    let (status, json) = http_post(
        server.port,
        "/validate",
        &serde_json::json!({ "content": "===D===\nK::\"open\n===END===\n" }),
    );
    assert_eq!(status, 400);
    assert_eq!(json["code"], "E007");
    assert!(json["rationale"].is_string());
}

#[test]
fn validate_endpoint_refuses_server_paths() {
    let server = start_server(&[]);
    let (status, _) = http_post(
        server.port,
        "/validate",
        &serde_json::json!({ "file_path": "/etc/passwd" }),
    );
    assert_eq!(status, 400);
}

#[test]
fn write_endpoint_stores_and_detects_conflicts() {
    let server = start_server(&[]);
    let (status, first) = http_post(
        server.port,
        "/write",
        &serde_json::json!({ "target_path": "a.oct.md", "content": "===A===\nK::v\n===END===\n" }),
    );
    assert_eq!(status, 200, "{}", first);
    let stored = std::fs::read_to_string(server.store.path().join("docs/a.oct.md")).unwrap();
    assert_eq!(stored, "===A===\nK::v\n===END===\n");

    let base = first["hash"].as_str().unwrap();
    let (status, _) = http_post(
        server.port,
        "/write",
        &serde_json::json!({ "target_path": "a.oct.md", "changes": { "K": "w" }, "base_hash": base }),
    );
    assert_eq!(status, 200);

    let (status, json) = http_post(
        server.port,
        "/write",
        &serde_json::json!({ "target_path": "a.oct.md", "changes": { "K": "x" }, "base_hash": base }),
    );
    assert_eq!(status, 409);
    assert_eq!(json["code"], "E020");
    assert_eq!(json["expected_hash"], base);
}

#[test]
fn write_endpoint_rejects_invalid_documents_with_422() {
    let server = start_server(&[]);
    let (status, json) = http_post(
        server.port,
        "/write",
        &serde_json::json!({
            "target_path": "s.oct.md",
            "content": "===SESSION===\nSTATUS::ACTIVE\n===END===\n",
            "schema": "SESSION",
        }),
    );
    assert_eq!(status, 422);
    assert_eq!(json["code"], "E017");
    assert!(!server.store.path().join("docs/s.oct.md").exists());
}

#[test]
fn eject_endpoint_projects_markdown() {
    let server = start_server(&[]);
    let content = std::fs::read_to_string(workspace_root().join("fixtures/session.oct.md")).unwrap();
    let (status, json) = http_post(
        server.port,
        "/eject",
        &serde_json::json!({ "content": content, "mode": "developer", "format": "markdown" }),
    );
    assert_eq!(status, 200, "{}", json);
    assert_eq!(json["lossy"], true);
    assert!(json["output"].as_str().unwrap().starts_with("# SESSION"));
}

#[test]
fn api_key_is_required_when_configured() {
    let server = start_server(&[("OCTAVE_API_KEY", "secret")]);
    let body = serde_json::json!({ "content": "===D===\n===END===\n" }).to_string();

    let (status, _) = http_get(server.port, "/health");
    assert_eq!(status, 200);

    let (status, _) = request(server.port, "POST", "/validate", &[], &body);
    assert_eq!(status, 401);

    let (status, _) = request(server.port, "POST", "/validate", &[("X-API-Key", "wrong")], &body);
    assert_eq!(status, 403);

    let (status, _) = request(
        server.port,
        "POST",
        "/validate",
        &[("Authorization", "Bearer secret")],
        &body,
    );
    assert_eq!(status, 200);
}

#[test]
fn rate_limit_returns_429() {
    let server = start_server(&[("OCTAVE_RATE_LIMIT", "2")]);
    assert_eq!(http_get(server.port, "/health").0, 200);
    assert_eq!(http_get(server.port, "/health").0, 200);
    let (status, body) = http_get(server.port, "/health");
    assert_eq!(status, 429);
    assert!(body.contains("retry_after"));
}
