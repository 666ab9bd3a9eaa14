//! Contract tests for the five-step reconstitution pipeline, driven through
//! the real binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::{tempdir, TempDir};

use stopdb_core::Store;

const SCHOOLS_CSV: &str = "\
Name,Website,School-Type,District,School-Level,Address,Latitude,Longitude
Roosevelt High School,https://roosevelt.example.org,Public,,High,\"1410 NE 66th St, Seattle, WA 98115\",47.676,-122.317
Hamilton Middle School,https://hamilton.example.org,public,,Middle,\"1610 N 41st St Seattle, WA 98103\",,
";

const INCIDENTS_CSV: &str = "\
Year,Month,Day,School,Incident-Type,Incident-Description,Supporting-Materials,School-Response,Media-Coverage,Social-Media-Post,Other-Related,Reported-School,Source(s),Last Modified
2023,04,null,Roosevelt High School,Graffiti,Racist graffiti found in bathroom.,,Statement sent to families.,,,,Yes,News,9/05/2023 3:30pm
";

fn write_seed_data(dir: &TempDir) {
    let data = dir.path().join("data");
    fs::create_dir(&data).unwrap();
    fs::write(data.join("schools.csv"), SCHOOLS_CSV).unwrap();
    fs::write(data.join("incidents.csv"), INCIDENTS_CSV).unwrap();
}

fn reconstitute(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("stopdb").unwrap();
    cmd.current_dir(dir)
        .env_clear()
        .env("DATABASE_URL", "sqlite:db.sqlite3")
        .env("SECRET_KEY", "test-secret")
        .env("STOPDB_SUPERUSER_USERNAME", "admin")
        .env("STOPDB_SUPERUSER_PASSWORD", "local-dev-password")
        .env("STOPDB_SUPERUSER_EMAIL", "admin@example.com")
        .arg("reconstitute");
    cmd
}

#[test]
fn rebuilds_a_database_from_nothing() {
    let dir = tempdir().unwrap();
    write_seed_data(&dir);

    // No database file exists yet: the delete step must be a no-op.
    reconstitute(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("reconstituted"))
        .stdout(predicate::str::contains("[5/5] import"));

    let store = Store::open(&dir.path().join("db.sqlite3")).unwrap();
    assert_eq!(store.superuser_count().unwrap(), 1);
    assert_eq!(store.count("schools").unwrap(), 2);
    assert_eq!(store.count("incidents").unwrap(), 1);

    let admin = store.user_by_username("admin").unwrap().unwrap();
    assert!(admin.is_superuser);
    assert_eq!(admin.email, "admin@example.com");
}

#[test]
fn a_second_run_converges_on_the_same_state() {
    let dir = tempdir().unwrap();
    write_seed_data(&dir);

    reconstitute(dir.path()).assert().success();
    reconstitute(dir.path()).assert().success();

    // Fresh rebuild each time: nothing doubles up.
    let store = Store::open(&dir.path().join("db.sqlite3")).unwrap();
    assert_eq!(store.superuser_count().unwrap(), 1);
    assert_eq!(store.count("schools").unwrap(), 2);
    assert_eq!(store.count("incidents").unwrap(), 1);
}

#[test]
fn empty_data_directory_imports_zero_records() {
    let dir = tempdir().unwrap();
    fs::create_dir(dir.path().join("data")).unwrap();

    reconstitute(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("0 seed records"));
}

#[test]
fn json_report_is_machine_readable() {
    let dir = tempdir().unwrap();
    fs::create_dir(dir.path().join("data")).unwrap();

    let output = reconstitute(dir.path()).arg("--json").assert().success();
    let report: serde_json::Value =
        serde_json::from_slice(&output.get_output().stdout).expect("valid JSON report");

    assert_eq!(report["superuser"], "admin");
    assert_eq!(report["steps"].as_array().unwrap().len(), 5);
    assert_eq!(report["import"]["districts"], 0);
}

#[test]
fn missing_database_url_is_a_config_error() {
    let dir = tempdir().unwrap();
    let mut cmd = Command::cargo_bin("stopdb").unwrap();
    cmd.current_dir(dir.path())
        .env_clear()
        .env("SECRET_KEY", "test-secret")
        .arg("reconstitute")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("DATABASE_URL"));
}

#[test]
fn missing_superuser_credentials_fail_step_four() {
    let dir = tempdir().unwrap();
    fs::create_dir(dir.path().join("data")).unwrap();

    let mut cmd = Command::cargo_bin("stopdb").unwrap();
    cmd.current_dir(dir.path())
        .env_clear()
        .env("DATABASE_URL", "sqlite:db.sqlite3")
        .env("SECRET_KEY", "test-secret")
        .arg("reconstitute")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("step createsuperuser failed"))
        .stderr(predicate::str::contains("STOPDB_SUPERUSER_USERNAME"));
}

#[test]
fn squash_failure_halts_before_touching_the_database() {
    let dir = tempdir().unwrap();
    write_seed_data(&dir);
    // A file where the migrations directory belongs breaks step 2.
    fs::write(dir.path().join("migrations"), "not a directory").unwrap();

    reconstitute(dir.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("step squash failed"));

    assert!(
        !dir.path().join("db.sqlite3").exists(),
        "no step after squash may have run"
    );
}

#[test]
fn missing_data_directory_fails_the_import_step() {
    let dir = tempdir().unwrap();

    reconstitute(dir.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("step import failed"));
}
