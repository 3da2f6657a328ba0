//! CLI integration tests for passkey-cli.
//!
//! These tests run the actual binary and feed its output back into the
//! relying-party ceremonies from `passkey-core`.

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use passkey_core::{
    authentication, registration, AuthenticationResponse, MemoryCredentialStore, MemoryScope,
    RegistrationResponse, RelyingPartyConfig, SoftAuthenticatorState, SystemClock,
};
use predicates::prelude::*;
use tempfile::TempDir;

const RP_ID: &str = "ledger.test";
const ORIGIN: &str = "https://ledger.test";

/// Get a Command for the passkey binary.
fn passkey() -> Command {
    Command::cargo_bin("passkey").unwrap()
}

fn keygen(dir: &Path, algorithm: &str) -> std::path::PathBuf {
    let key = dir.join(format!("{algorithm}.json"));
    passkey()
        .args(["keygen", "--quiet", "-a", algorithm, "-o", key.to_str().unwrap()])
        .assert()
        .success();
    key
}

fn read_state(path: &Path) -> SoftAuthenticatorState {
    serde_json::from_slice(&fs::read(path).unwrap()).unwrap()
}

// ============================================================================
// Help and Version Tests
// ============================================================================

#[test]
fn test_help_displays_usage() {
    passkey()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Software passkey authenticator"))
        .stdout(predicate::str::contains("keygen"))
        .stdout(predicate::str::contains("register"))
        .stdout(predicate::str::contains("assert"))
        .stdout(predicate::str::contains("inspect"))
        .stdout(predicate::str::contains("check"));
}

#[test]
fn test_help_shows_exit_codes() {
    passkey()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Exit codes:"))
        .stdout(predicate::str::contains("65"))
        .stdout(predicate::str::contains("66"));
}

#[test]
fn test_version_displays_version() {
    passkey()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("passkey"));
}

// ============================================================================
// Keygen Tests
// ============================================================================

#[test]
fn test_keygen_writes_key_file() {
    let temp = TempDir::new().unwrap();
    let key = temp.path().join("device.json");

    passkey()
        .args(["keygen", "-a", "es256", "-o", key.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("ES256"));

    let state = read_state(&key);
    assert_eq!(state.algorithm, -7);
    assert_eq!(state.sign_count, 0);
    assert!(state.user_handle.is_none());
}

#[test]
fn test_keygen_refuses_to_overwrite() {
    let temp = TempDir::new().unwrap();
    let key = keygen(temp.path(), "ed25519");
    let original = fs::read(&key).unwrap();

    // Exit code 73 = EX_CANTCREAT
    passkey()
        .args(["keygen", "-o", key.to_str().unwrap()])
        .assert()
        .code(73)
        .stderr(predicate::str::contains("Refusing to overwrite"));
    assert_eq!(fs::read(&key).unwrap(), original);

    passkey()
        .args(["keygen", "--quiet", "--force", "-o", key.to_str().unwrap()])
        .assert()
        .success();
    assert_ne!(fs::read(&key).unwrap(), original);
}

// ============================================================================
// Exit Code Tests
// ============================================================================

#[test]
fn test_missing_options_returns_input_error() {
    let temp = TempDir::new().unwrap();
    let key = keygen(temp.path(), "ed25519");

    // Exit code 66 = EX_NOINPUT
    passkey()
        .args([
            "assert",
            "-k",
            key.to_str().unwrap(),
            "--origin",
            ORIGIN,
            "missing-options.json",
        ])
        .assert()
        .code(66)
        .stderr(predicate::str::contains("Failed to read options file"));
}

#[test]
fn test_invalid_options_returns_data_error() {
    let temp = TempDir::new().unwrap();
    let key = keygen(temp.path(), "ed25519");
    let options = temp.path().join("options.json");
    fs::write(&options, "not json").unwrap();

    passkey()
        .args([
            "register",
            "-k",
            key.to_str().unwrap(),
            "--origin",
            ORIGIN,
            options.to_str().unwrap(),
        ])
        .assert()
        .code(65)
        .stderr(predicate::str::contains("Failed to parse options file"));
}

// ============================================================================
// Inspect Tests
// ============================================================================

#[test]
fn test_inspect_reports_algorithm() {
    let temp = TempDir::new().unwrap();
    let key = keygen(temp.path(), "es256");
    let device = passkey_core::SoftAuthenticator::from_state(&read_state(&key)).unwrap();

    let output = passkey()
        .args(["inspect", "--json", "-a", "-257", &device.public_key_text().unwrap()])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let report: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(report["algorithm"], "ES256");
    assert_eq!(report["coseAlgorithm"], -7);
    assert_eq!(report["requestedAlgorithm"], -257);
    assert_eq!(report["rawPublicKey"].as_str().unwrap().len(), 130);
}

#[test]
fn test_inspect_rejects_wrong_algorithm() {
    let temp = TempDir::new().unwrap();
    let key = keygen(temp.path(), "ed25519");
    let device = passkey_core::SoftAuthenticator::from_state(&read_state(&key)).unwrap();

    passkey()
        .args(["inspect", "-a", "-7", &device.public_key_text().unwrap()])
        .assert()
        .code(65)
        .stderr(predicate::str::contains("cannot be used for verification"));
}

#[test]
fn test_inspect_rejects_unknown_algorithm() {
    passkey()
        .args(["inspect", "-a", "-35", "AAAA"])
        .assert()
        .code(65);
}

// ============================================================================
// Ceremony Roundtrip Tests
// ============================================================================

#[tokio::test]
async fn test_register_and_assert_against_relying_party() {
    let temp = TempDir::new().unwrap();
    let key = keygen(temp.path(), "ed25519");

    let store = MemoryCredentialStore::new();
    let session = MemoryScope::new();
    let config = RelyingPartyConfig::for_site(RP_ID);

    // Registration
    let options = registration::begin(&store, &session, &config).await.unwrap();
    let options_path = temp.path().join("creation.json");
    fs::write(&options_path, serde_json::to_vec(&options).unwrap()).unwrap();

    let output = passkey()
        .args([
            "register",
            "-k",
            key.to_str().unwrap(),
            "--origin",
            ORIGIN,
            options_path.to_str().unwrap(),
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let response: RegistrationResponse = serde_json::from_slice(&output).unwrap();
    registration::finish(&store, &session, &config, &response, &SystemClock)
        .await
        .unwrap();
    assert_eq!(
        read_state(&key).user_handle.as_deref(),
        Some(config.user_handle.to_base64url().as_str())
    );

    // Authentication, twice so the persisted counter is exercised
    for expected_count in 1..=2u64 {
        let options = authentication::begin(&store, &session, &config).await.unwrap();
        let options_path = temp.path().join("request.json");
        let response_path = temp.path().join("assertion.json");
        fs::write(&options_path, serde_json::to_vec(&options).unwrap()).unwrap();

        passkey()
            .args([
                "assert",
                "-k",
                key.to_str().unwrap(),
                "--origin",
                ORIGIN,
                "-o",
                response_path.to_str().unwrap(),
                options_path.to_str().unwrap(),
            ])
            .assert()
            .success();

        let response: AuthenticationResponse =
            serde_json::from_slice(&fs::read(&response_path).unwrap()).unwrap();
        let outcome = authentication::finish(&store, &session, &config, &response, &SystemClock)
            .await
            .unwrap();
        assert_eq!(outcome.credential.sign_count, expected_count);
    }
    assert_eq!(read_state(&key).sign_count, 2);
}

#[tokio::test]
async fn test_check_accepts_and_rejects_assertions() {
    let temp = TempDir::new().unwrap();
    let key = keygen(temp.path(), "es256");
    let device = passkey_core::SoftAuthenticator::from_state(&read_state(&key)).unwrap();

    let store = MemoryCredentialStore::new();
    let session = MemoryScope::new();
    let config = RelyingPartyConfig::for_site(RP_ID);
    let options = authentication::begin(&store, &session, &config).await.unwrap();
    let options_path = temp.path().join("request.json");
    let response_path = temp.path().join("assertion.json");
    fs::write(&options_path, serde_json::to_vec(&options).unwrap()).unwrap();

    passkey()
        .args([
            "assert",
            "-k",
            key.to_str().unwrap(),
            "--origin",
            ORIGIN,
            "-o",
            response_path.to_str().unwrap(),
            options_path.to_str().unwrap(),
        ])
        .assert()
        .success();

    let check = |challenge: &str, stored_count: &str| {
        let mut cmd = passkey();
        cmd.args([
            "check",
            response_path.to_str().unwrap(),
            "--public-key",
            &device.public_key_text().unwrap(),
            "-a",
            "-7",
            "--challenge",
            challenge,
            "--rp-id",
            RP_ID,
            "--origin",
            ORIGIN,
            "--stored-count",
            stored_count,
        ]);
        cmd
    };

    check(&options.challenge, "0")
        .assert()
        .success()
        .stdout(predicate::str::contains("Assertion valid"))
        .stdout(predicate::str::contains("0 -> 1"));

    // a different challenge
    check("AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA", "0")
        .assert()
        .code(65)
        .stderr(predicate::str::contains("Assertion rejected"));

    // stored counter ahead of the presented one
    check(&options.challenge, "5").assert().code(65);
}
