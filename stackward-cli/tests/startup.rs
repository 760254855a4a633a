//! Binary-level startup behaviour: configuration validation and fatal errors.

use std::fs;
use std::net::TcpListener;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn stackward() -> Command {
    let mut cmd = Command::cargo_bin("stackward").expect("stackward binary");
    cmd.env_remove("STACKWARD_API_ADDRESS")
        .env_remove("STACKWARD_API_KEY")
        .env("RUST_LOG", "error");
    cmd
}

/// An address nothing listens on: bind, read the port, release it.
fn closed_address() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    format!("http://{addr}")
}

#[test]
fn missing_address_is_fatal() {
    stackward()
        .args(["--api-key", "k"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("api-address must be set"));
}

#[test]
fn missing_key_is_fatal() {
    stackward()
        .args(["--api-address", "http://remote"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("api-key must be set"));
}

#[test]
fn key_from_environment_satisfies_validation() {
    let root = TempDir::new().expect("root");
    stackward()
        .env("STACKWARD_API_KEY", "from-env")
        .args(["--api-address", &closed_address()])
        .arg("--stacks-dir")
        .arg(root.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("api-key must be set").not())
        .stderr(predicate::str::contains("failed to fetch remote inventory"));
}

#[test]
fn unreachable_remote_is_fatal() {
    let root = TempDir::new().expect("root");
    stackward()
        .args(["--api-address", &closed_address(), "--api-key", "k"])
        .arg("--stacks-dir")
        .arg(root.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to fetch remote inventory"));
}

#[test]
fn invalid_config_file_is_fatal() {
    let dir = TempDir::new().expect("dir");
    let path = dir.path().join("stackward.yaml");
    fs::write(&path, "watch: [not, a, bool]\n").expect("write");

    stackward()
        .arg("--config")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to parse config"));
}

#[test]
fn config_file_supplies_required_settings() {
    let dir = TempDir::new().expect("dir");
    let path = dir.path().join("stackward.yaml");
    fs::write(
        &path,
        format!(
            "api-address: {}\napi-key: from-file\nstacks-dir: {}\n",
            closed_address(),
            dir.path().display()
        ),
    )
    .expect("write");

    stackward()
        .arg("--config")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("must be set").not())
        .stderr(predicate::str::contains("failed to fetch remote inventory"));
}

#[test]
fn unknown_log_format_is_rejected() {
    stackward()
        .args(["--log-format", "xml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown log format 'xml'"));
}
