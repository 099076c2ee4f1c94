use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Write a minimal, internally consistent fixture set into `dir`
fn write_fixtures(dir: &Path) {
    fs::create_dir_all(dir).unwrap();

    fs::write(
        dir.join("users.json"),
        r#"[
  {
    "id": "user-1",
    "name": "Test Publisher",
    "email": "pub@example.com",
    "role": "publisher",
    "password": "123456"
  }
]"#,
    )
    .unwrap();

    fs::write(
        dir.join("orders.json"),
        r#"[
  {
    "id": "order-1",
    "title": "Test Diner",
    "description": "A seeded order for the integration tests",
    "address": "1 Test Street, Testville",
    "total_amount": 50.0,
    "owner": "user-1",
    "owner_unique": "user-1"
  }
]"#,
    )
    .unwrap();

    fs::write(
        dir.join("foods.json"),
        r#"[
  {
    "id": "food-1",
    "title": "Test Sandwich",
    "description": "Seeded food item",
    "price": 7.5,
    "quantity": 10,
    "order_id": "order-1",
    "owner": "user-1"
  }
]"#,
    )
    .unwrap();
}

#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("plat").unwrap();
    cmd.arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Command line interface"))
        .stdout(predicate::str::contains("health"))
        .stdout(predicate::str::contains("seed"));
}

#[test]
fn test_cli_version() {
    let mut cmd = Command::cargo_bin("plat").unwrap();
    cmd.arg("--version");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("plat"));
}

#[test]
fn test_cli_requires_a_subcommand() {
    let mut cmd = Command::cargo_bin("plat").unwrap();

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_seed_subcommand_help() {
    let mut cmd = Command::cargo_bin("plat").unwrap();
    cmd.args(["seed", "--help"]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("import"))
        .stdout(predicate::str::contains("destroy"));
}

#[test]
fn test_health_offline_text_format() {
    let mut cmd = Command::cargo_bin("plat").unwrap();
    // Nothing listens on the discard port, so the check reports offline
    cmd.args(["health", "--url", "http://127.0.0.1:9"]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Platter API Health Check"))
        .stdout(predicate::str::contains("OFFLINE"))
        .stdout(predicate::str::contains(
            "API server is not running or not reachable",
        ));
}

#[test]
fn test_health_offline_json_format() {
    let mut cmd = Command::cargo_bin("plat").unwrap();
    cmd.args(["health", "--format", "json", "--url", "http://127.0.0.1:9"]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("\"status\": \"offline\""))
        .stdout(predicate::str::contains("\"endpoint\""));
}

#[test]
fn test_seed_import_and_destroy() {
    let temp_dir = TempDir::new().unwrap();
    let data_dir = temp_dir.path().join("data");
    let fixtures_dir = temp_dir.path().join("fixtures");
    write_fixtures(&fixtures_dir);

    let mut import = Command::cargo_bin("plat").unwrap();
    import
        .env_remove("DATA_PATH")
        .args(["seed", "import"])
        .arg("--data-dir")
        .arg(&data_dir)
        .arg("--fixtures")
        .arg(&fixtures_dir);

    import
        .assert()
        .success()
        .stdout(predicate::str::contains("Imported 1 users"))
        .stdout(predicate::str::contains("Imported 1 orders"))
        .stdout(predicate::str::contains("Imported 1 foods"))
        .stdout(predicate::str::contains("Data imported"));

    assert!(data_dir.join("platter.db").exists());

    let mut destroy = Command::cargo_bin("plat").unwrap();
    destroy
        .env_remove("DATA_PATH")
        .args(["seed", "destroy"])
        .arg("--data-dir")
        .arg(&data_dir);

    destroy
        .assert()
        .success()
        .stdout(predicate::str::contains("Deleted 1 foods, 1 orders, 1 users"))
        .stdout(predicate::str::contains("Data destroyed"));
}

#[test]
fn test_seed_import_rejects_duplicate_ids() {
    let temp_dir = TempDir::new().unwrap();
    let data_dir = temp_dir.path().join("data");
    let fixtures_dir = temp_dir.path().join("fixtures");
    write_fixtures(&fixtures_dir);

    let run = |cmd: &mut Command| {
        cmd.env_remove("DATA_PATH")
            .args(["seed", "import"])
            .arg("--data-dir")
            .arg(&data_dir)
            .arg("--fixtures")
            .arg(&fixtures_dir);
    };

    let mut first = Command::cargo_bin("plat").unwrap();
    run(&mut first);
    first.assert().success();

    // Re-importing the same fixture ids hits the primary key
    let mut second = Command::cargo_bin("plat").unwrap();
    run(&mut second);
    second.assert().failure();
}

#[test]
fn test_seed_import_missing_fixture_dir() {
    let temp_dir = TempDir::new().unwrap();
    let data_dir = temp_dir.path().join("data");

    let mut cmd = Command::cargo_bin("plat").unwrap();
    cmd.env_remove("DATA_PATH")
        .args(["seed", "import"])
        .arg("--data-dir")
        .arg(&data_dir)
        .arg("--fixtures")
        .arg(temp_dir.path().join("does-not-exist"));

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Cannot read fixture file"));
}
