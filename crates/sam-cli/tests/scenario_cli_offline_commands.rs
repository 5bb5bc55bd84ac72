//! Scenario: the offline half of the `sam` CLI.
//!
//! # Invariants under test
//!
//! 1. `validate` accepts a good manifest and prints its identity.
//! 2. `validate` exits non-zero with the loader's message on a bad one,
//!    including a kind other than `--kind`.
//! 3. `example` prints a manifest the loader accepts back.
//! 4. `config-hash` prints a stable hash line first.
//! 5. Remote commands fail before any network I/O when no API key is set.
//! 6. Config keys the CLI does not read are reported on stderr.

use assert_cmd::Command;
use predicates::prelude::*;
use sam_testkit::fixture;

fn sam() -> Command {
    let mut cmd = Command::cargo_bin("sam").expect("sam binary");
    cmd.env_remove("SAM_CONFIG").env_remove("RUST_LOG");
    cmd
}

fn write(dir: &tempfile::TempDir, name: &str, text: &str) -> String {
    let path = dir.path().join(name);
    std::fs::write(&path, text).unwrap();
    path.to_string_lossy().into_owned()
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

#[test]
fn validate_prints_identity_of_a_good_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let file = write(&dir, "user.yaml", fixture("user").unwrap());

    sam()
        .args(["validate", "-f", &file, "--kind", "users"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "valid=true kind=User name=jdoe version=1.0.0 format=yaml",
        ));
}

#[test]
fn validate_rejects_the_wrong_kind() {
    let dir = tempfile::tempdir().unwrap();
    let file = write(&dir, "user.yaml", fixture("user").unwrap());

    sam()
        .args(["validate", "-f", &file, "--kind", "Secret"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("INVALID_MANIFEST"));
}

#[test]
fn validate_reports_a_missing_api_version() {
    let dir = tempfile::tempdir().unwrap();
    let file = write(
        &dir,
        "broken.yaml",
        "kind: User\nmetadata:\n  name: jdoe\nspec: {}\n",
    );

    sam()
        .args(["validate", "-f", &file])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Missing required key apiVersion"));
}

// ---------------------------------------------------------------------------
// example
// ---------------------------------------------------------------------------

#[test]
fn example_output_validates() {
    let out = sam().args(["example", "sqlplugins"]).output().unwrap();
    assert!(out.status.success());
    let yaml = String::from_utf8(out.stdout).unwrap();
    assert!(yaml.contains("kind: SqlPlugin"), "{yaml}");

    let dir = tempfile::tempdir().unwrap();
    let file = write(&dir, "example.yaml", &yaml);
    sam()
        .args(["validate", "-f", &file, "--kind", "SqlPlugin"])
        .assert()
        .success();
}

#[test]
fn example_of_unknown_kind_fails() {
    sam()
        .args(["example", "widget"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unsupported kind 'widget'"));
}

#[test]
fn example_json_is_json() {
    let out = sam().args(["example", "chatbot", "--json"]).output().unwrap();
    assert!(out.status.success());
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(v["kind"], "Chatbot");
}

// ---------------------------------------------------------------------------
// config-hash
// ---------------------------------------------------------------------------

#[test]
fn config_hash_is_stable_across_runs() {
    let dir = tempfile::tempdir().unwrap();
    let base = write(&dir, "base.yaml", "server:\n  platform_domain: smarter.sh\n");

    let first = sam().args(["config-hash", &base]).output().unwrap();
    let second = sam().args(["config-hash", &base]).output().unwrap();
    assert!(first.status.success());
    let first = String::from_utf8(first.stdout).unwrap();
    assert!(first.starts_with("config_hash="), "{first}");
    assert_eq!(first, String::from_utf8(second.stdout).unwrap());
}

// ---------------------------------------------------------------------------
// remote commands without credentials
// ---------------------------------------------------------------------------

#[test]
fn remote_command_without_key_fails_fast() {
    sam()
        .env_remove("SAM_TEST_UNSET_KEY")
        .args([
            "--token-env",
            "SAM_TEST_UNSET_KEY",
            "--api-url",
            "http://127.0.0.1:9",
            "get",
            "users",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "SECRETS_MISSING: env var SAM_TEST_UNSET_KEY is not set",
        ));
}

#[test]
fn unread_config_keys_are_warned_about() {
    let dir = tempfile::tempdir().unwrap();
    let config = write(
        &dir,
        "cli.yaml",
        "cli:\n  api_url: http://127.0.0.1:9\nexperimental:\n  turbo: true\n",
    );

    sam()
        .env("SAM_CONFIG", &config)
        .env_remove("SAM_TEST_UNSET_KEY")
        .args(["--token-env", "SAM_TEST_UNSET_KEY", "get", "users"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("config keys not read by the CLI"))
        .stderr(predicate::str::contains("/experimental/turbo"));
}
