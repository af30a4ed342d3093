//! Smoke tests for command wiring, plus end-to-end runs against SQLite

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;
use xtsqlorm::blocking::{self, Repository};
use xtsqlorm::{record, ColumnInfo, ColumnType, EngineOptions, TableShape};

fn database_url(dir: &Path) -> String {
    format!("sqlite://{}?mode=rwc", dir.join("cli.db").display())
}

/// A database with a small `people` table
fn seeded_database() -> (TempDir, String) {
    let dir = tempfile::tempdir().unwrap();
    let url = database_url(dir.path());

    let manager = blocking::create_connection_manager(EngineOptions::from_url(&url)).unwrap();
    let shape = TableShape::new(
        "people",
        vec![
            ColumnInfo::id("id"),
            ColumnInfo::new("name", ColumnType::Text).not_null(),
            ColumnInfo::new("age", ColumnType::Integer),
        ],
    )
    .unwrap();
    blocking::create_table(&manager, &shape, false).unwrap();

    let provider = blocking::create_session_provider(&manager);
    let people = Repository::with_shape(shape, &provider);
    for (name, age) in [("alice", 30), ("bob", 21), ("carol", 21)] {
        people.create(&record! { "name" => name, "age" => age }).unwrap();
    }
    manager.dispose();

    (dir, url)
}

fn xtsqlorm() -> Command {
    let mut cmd = Command::cargo_bin("xtsqlorm").unwrap();
    cmd.env_remove("RUST_LOG");
    cmd
}

// === Help Tests ===

#[test]
fn test_help_lists_commands() {
    let mut cmd = xtsqlorm();
    cmd.arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("ping"))
        .stdout(predicate::str::contains("copy-table"))
        .stdout(predicate::str::contains("gen-model"));
}

#[test]
fn test_export_help() {
    let mut cmd = xtsqlorm();
    cmd.arg("export").arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("COLUMN=VALUE"));
}

#[test]
fn test_connect_str_help() {
    let mut cmd = xtsqlorm();
    cmd.arg("connect-str").arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Driver alias"));
}

// === Registry Tests ===

#[test]
fn test_connect_str_from_config() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.toml");
    std::fs::write(
        &config,
        r#"
default = "app"

[databases.app]
kind = "postgresql"
host = "db"
port = 5432
user = "svc"
password = "s3cret"
database = "app"
"#,
    )
    .unwrap();

    xtsqlorm()
        .arg("--config")
        .arg(&config)
        .arg("connect-str")
        .assert()
        .success()
        .stdout(predicate::str::contains("postgresql://svc:s3cret@db:5432/app"));

    xtsqlorm()
        .arg("--config")
        .arg(&config)
        .arg("connect-str")
        .arg("missing")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown database key 'missing'"));
}

#[test]
fn test_missing_registry_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    xtsqlorm()
        .arg("--config")
        .arg(dir.path().join("absent.toml"))
        .arg("tables")
        .assert()
        .failure()
        .stderr(predicate::str::contains("database registry not found"));
}

// === SQLite Runs ===

#[test]
fn test_ping_and_tables() {
    let (_dir, url) = seeded_database();

    xtsqlorm()
        .args(["--url", &url, "ping"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ok (sqlite)"));

    xtsqlorm()
        .args(["--url", &url, "tables"])
        .assert()
        .success()
        .stdout(predicate::str::contains("people"));

    xtsqlorm()
        .args(["--url", &url, "pool-status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"size\""));
}

#[test]
fn test_reflect_and_copy_table() {
    let (_dir, url) = seeded_database();

    xtsqlorm()
        .args(["--url", &url, "reflect", "people"])
        .assert()
        .success()
        .stdout(predicate::str::contains("primary key"))
        .stdout(predicate::str::contains("not null"));

    xtsqlorm()
        .args(["--url", &url, "reflect", "ghosts"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("table not found: ghosts"));

    xtsqlorm()
        .args(["--url", &url, "copy-table", "people", "people_archive"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created people_archive (3 columns)"));

    xtsqlorm()
        .args(["--url", &url, "tables"])
        .assert()
        .success()
        .stdout(predicate::str::contains("people_archive"));
}

#[test]
fn test_gen_model() {
    let (dir, url) = seeded_database();

    xtsqlorm()
        .args(["--url", &url, "gen-model", "people"])
        .assert()
        .success()
        .stdout(predicate::str::contains("pub struct People {"));

    let out = dir.path().join("models").join("people.rs");
    xtsqlorm()
        .args(["--url", &url, "gen-model", "people", "--out"])
        .arg(&out)
        .assert()
        .success();
    let source = std::fs::read_to_string(&out).unwrap();
    assert!(source.contains("pub name: String"));
}

#[test]
fn test_stats_and_export() {
    let (dir, url) = seeded_database();

    xtsqlorm()
        .args(["--url", &url, "stats", "people", "age"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"count\": 3"))
        .stdout(predicate::str::contains("\"max\": 30"));

    xtsqlorm()
        .args(["--url", &url, "stats", "people", "salary"])
        .assert()
        .failure();

    xtsqlorm()
        .args(["--url", &url, "export", "people", "--columns", "name", "--where", "age=21"])
        .assert()
        .success()
        .stdout(predicate::str::contains("bob"))
        .stdout(predicate::str::contains("carol"))
        .stdout(predicate::str::contains("alice").not())
        .stdout(predicate::str::contains("\"age\"").not());

    let out = dir.path().join("people.json");
    xtsqlorm()
        .args(["--url", &url, "export", "people", "--out"])
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("Exported 3 rows"));
    let rows: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(rows.as_array().unwrap().len(), 3);
}
