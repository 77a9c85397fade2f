//! End-to-end tests for the smg binary
//!
//! These tests run the compiled binary against mock document stores and
//! validate the full workflow:
//! - Sitemap generation and the printed summary
//! - Exit-code mapping (success, partial, connection, configuration)
//! - Dry-run behavior
//! - Configuration validation
//! - Compression and output overrides

use assert_cmd::Command;
use flate2::read::GzDecoder;
use predicates::prelude::*;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Helper to write a configuration pointing at mock stores
fn write_config(dir: &TempDir, sources: &[(&str, &str)]) -> PathBuf {
    let output_dir = dir.path().join("sitemaps");
    let mut content = format!(
        r#"
[sitemap]
output_dir = "{}"
base_url = "https://www.example.org/sitemaps/"
"#,
        output_dir.display()
    );

    for (name, endpoint) in sources {
        content.push_str(&format!(
            r#"
[[sources]]
name = "{name}"
endpoint = "{endpoint}"
id_field = "id"
date_field = "last_modified"
url_template = "https://www.example.org/{name}/{{id}}"
"#
        ));
    }

    let config_path = dir.path().join("smg.toml");
    fs::write(&config_path, content).expect("Failed to write test config");
    config_path
}

fn output_dir(dir: &TempDir) -> PathBuf {
    dir.path().join("sitemaps")
}

/// Helper to build an smg command with fast retries
fn smg_cmd() -> Command {
    let mut cmd = Command::cargo_bin("smg").expect("smg binary builds");
    cmd.env("SMG_MAX_RETRIES", "1")
        .env("SMG_RETRY_BASE_MS", "1")
        .env_remove("SMG_CONFIG")
        .env_remove("SMG_OUTPUT_DIR")
        .env_remove("SMG_WORKERS");
    cmd
}

/// Mount a healthy store: ping, count, and a single page of documents
async fn mount_healthy(server: &MockServer, total: u64, ids: &[&str]) {
    Mock::given(method("GET"))
        .and(path("/admin/ping"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "status": "OK" })),
        )
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/select"))
        .and(query_param("rows", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "response": { "numFound": total, "docs": [] }
        })))
        .mount(server)
        .await;

    let docs: Vec<serde_json::Value> = ids
        .iter()
        .map(|id| serde_json::json!({ "id": id, "last_modified": "2024-01-15T10:30:00Z" }))
        .collect();
    Mock::given(method("GET"))
        .and(path("/select"))
        .and(query_param("start", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "response": { "numFound": total, "docs": docs }
        })))
        .mount(server)
        .await;
}

/// Mount a store whose health probe always fails
async fn mount_unreachable(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/admin/ping"))
        .respond_with(ResponseTemplate::new(503))
        .mount(server)
        .await;
}

fn gunzip(path: &Path) -> String {
    let file = fs::File::open(path).expect("Failed to open compressed file");
    let mut decoder = GzDecoder::new(file);
    let mut content = String::new();
    decoder
        .read_to_string(&mut content)
        .expect("Failed to decompress file");
    content
}

#[tokio::test]
async fn test_generate_writes_sitemaps_and_exits_zero() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_healthy(&server, 3, &["1", "2", "3"]).await;
    let config = write_config(&dir, &[("products", &server.uri())]);

    smg_cmd()
        .arg("-c")
        .arg(&config)
        .arg("generate")
        .assert()
        .success()
        .stdout(predicate::str::contains("products"))
        .stdout(predicate::str::contains("3 URLs across 2 file(s)"));

    let data_file = output_dir(&dir).join("sitemap-products-0001.xml.gz");
    let index_file = output_dir(&dir).join("sitemap-products-index.xml");
    assert!(data_file.exists());
    assert!(index_file.exists());

    let xml = gunzip(&data_file);
    assert!(xml.contains("<urlset"));
    assert!(xml.contains("https://www.example.org/products/1"));
    assert!(xml.contains("https://www.example.org/products/3"));
    assert!(xml.contains("<lastmod>2024-01-15T10:30:00Z</lastmod>"));

    let index = fs::read_to_string(&index_file).unwrap();
    assert!(index.contains("<sitemapindex"));
    assert!(index.contains("sitemap-products-0001.xml.gz"));
}

#[tokio::test]
async fn test_generate_partial_failure_exits_seven() {
    let healthy = MockServer::start().await;
    let broken = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_healthy(&healthy, 2, &["1", "2"]).await;
    mount_unreachable(&broken).await;
    let config = write_config(
        &dir,
        &[("products", &healthy.uri()), ("articles", &broken.uri())],
    );

    smg_cmd()
        .arg("-c")
        .arg(&config)
        .arg("generate")
        .arg("--quiet")
        .assert()
        .code(7)
        .stdout(predicate::str::contains("articles"))
        .stdout(predicate::str::contains("Connection error"));

    // The healthy source still produced its files.
    assert!(output_dir(&dir)
        .join("sitemap-products-index.xml")
        .exists());
    assert!(!output_dir(&dir)
        .join("sitemap-articles-index.xml")
        .exists());
}

#[tokio::test]
async fn test_generate_unreachable_store_exits_three() {
    let broken = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_unreachable(&broken).await;
    let config = write_config(&dir, &[("products", &broken.uri())]);

    smg_cmd()
        .arg("-c")
        .arg(&config)
        .arg("generate")
        .arg("--quiet")
        .assert()
        .code(3);

    assert!(!output_dir(&dir).exists());
}

#[tokio::test]
async fn test_generate_dry_run_writes_no_files() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_healthy(&server, 42, &[]).await;
    let config = write_config(&dir, &[("products", &server.uri())]);

    smg_cmd()
        .arg("-c")
        .arg(&config)
        .arg("generate")
        .arg("--dry-run")
        .assert()
        .success()
        .stdout(predicate::str::contains("42 document(s)"))
        .stdout(predicate::str::contains("No files were written."));

    assert!(!output_dir(&dir).exists());
}

#[tokio::test]
async fn test_output_flag_overrides_configured_directory() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_healthy(&server, 1, &["1"]).await;
    let config = write_config(&dir, &[("products", &server.uri())]);
    let override_dir = dir.path().join("elsewhere");

    smg_cmd()
        .arg("-c")
        .arg(&config)
        .arg("generate")
        .arg("--quiet")
        .arg("--output")
        .arg(&override_dir)
        .assert()
        .success();

    assert!(override_dir.join("sitemap-products-index.xml").exists());
    assert!(!output_dir(&dir).exists());
}

#[tokio::test]
async fn test_uncompressed_mode_emits_plain_xml() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_healthy(&server, 1, &["1"]).await;

    let output = dir.path().join("sitemaps");
    let content = format!(
        r#"
[sitemap]
output_dir = "{}"
base_url = "https://www.example.org/sitemaps/"
compress = false

[[sources]]
name = "products"
endpoint = "{}"
id_field = "id"
date_field = "last_modified"
url_template = "https://www.example.org/products/{{id}}"
"#,
        output.display(),
        server.uri()
    );
    let config = dir.path().join("smg.toml");
    fs::write(&config, content).unwrap();

    smg_cmd()
        .arg("-c")
        .arg(&config)
        .arg("generate")
        .arg("--quiet")
        .assert()
        .success();

    let data_file = output.join("sitemap-products-0001.xml");
    assert!(data_file.exists());
    let xml = fs::read_to_string(&data_file).unwrap();
    assert!(xml.contains("<urlset"));
    assert!(xml.contains("https://www.example.org/products/1"));
}

#[tokio::test]
async fn test_validate_accepts_good_config() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, &[("products", "http://localhost:8983/solr/products")]);

    smg_cmd()
        .arg("-c")
        .arg(&config)
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration valid"))
        .stdout(predicate::str::contains("products"));
}

#[tokio::test]
async fn test_validate_rejects_malformed_toml() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("smg.toml");
    fs::write(&config, "sources = not valid toml [").unwrap();

    smg_cmd()
        .arg("-c")
        .arg(&config)
        .arg("validate")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Configuration error"));
}

#[tokio::test]
async fn test_validate_rejects_template_without_placeholder() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, &[("products", "http://localhost:8983/solr/products")]);
    let content = fs::read_to_string(&config)
        .unwrap()
        .replace("/products/{id}", "/products/");
    fs::write(&config, content).unwrap();

    smg_cmd()
        .arg("-c")
        .arg(&config)
        .arg("validate")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("exactly one {id}"));
}

#[tokio::test]
async fn test_missing_config_file_exits_two() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("does-not-exist.toml");

    smg_cmd()
        .arg("-c")
        .arg(&config)
        .arg("validate")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("not found"));
}
