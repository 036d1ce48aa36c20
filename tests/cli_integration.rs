//! CLI Integration Tests
//!
//! Tests the command-line interface end-to-end. Every test runs against a
//! throwaway data directory and without an API key, so nothing here talks
//! to the network.

use assert_cmd::Command;
use assert_fs::prelude::*;
use assert_fs::TempDir;
use predicates::prelude::*;

/// Get the binary to test, isolated in `dir`.
fn copilot(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("safety-copilot").unwrap();
    cmd.current_dir(dir.path())
        .env("SAFETY_COPILOT_DATA_DIR", dir.path().join("data"))
        .env("XDG_CONFIG_HOME", dir.path().join("config"))
        .env_remove("API_KEY");
    cmd
}

// ============================================================================
// Help & Version Tests
// ============================================================================

#[test]
fn test_help_flag() {
    let dir = TempDir::new().unwrap();
    copilot(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("H&S safety inspection copilot"));
}

#[test]
fn test_version_flag() {
    let dir = TempDir::new().unwrap();
    copilot(&dir)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_alias_binary() {
    let dir = TempDir::new().unwrap();
    Command::cargo_bin("hsc")
        .unwrap()
        .current_dir(dir.path())
        .arg("steps")
        .assert()
        .success()
        .stdout(predicate::str::contains("analyze-rules"));
}

// ============================================================================
// Navigation
// ============================================================================

#[test]
fn test_steps_in_order() {
    let dir = TempDir::new().unwrap();
    let output = copilot(&dir).arg("steps").output().unwrap();
    let stdout = String::from_utf8(output.stdout).unwrap();

    let slugs: Vec<&str> = stdout.lines().filter_map(|l| l.split_whitespace().next()).collect();
    assert_eq!(
        slugs,
        [
            "analyze-rules",
            "prepare-checklist",
            "risk-detection",
            "review-plan",
            "create-report",
            "draft-email"
        ]
    );
}

#[test]
fn test_dashboard_is_default() {
    let dir = TempDir::new().unwrap();
    copilot(&dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("[ ] 1. Analyze New Safety Rules"));
}

// ============================================================================
// Steps without the gateway
// ============================================================================

#[test]
fn test_contractor_roster() {
    let dir = TempDir::new().unwrap();
    copilot(&dir)
        .args(["plan", "contractors"])
        .assert()
        .success()
        .stdout(predicate::str::contains("SafeBuild Construction Ltd. (Rating: A+)"))
        .stdout(predicate::str::contains("EnergyPipe Services Inc. (Rating: B)"))
        .stdout(predicate::str::contains("InfraSecure Solutions (Rating: A)"));
}

#[test]
fn test_paste_then_show_persists_between_runs() {
    let dir = TempDir::new().unwrap();
    copilot(&dir)
        .args(["rules", "paste", "Workers must wear hard hats."])
        .assert()
        .success();

    copilot(&dir)
        .args(["rules", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Workers must wear hard hats."));
}

#[test]
fn test_paste_from_stdin() {
    let dir = TempDir::new().unwrap();
    copilot(&dir)
        .args(["checklist", "set"])
        .write_stdin("- hard hats\n- gloves\n")
        .assert()
        .success();

    copilot(&dir)
        .args(["checklist", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("- gloves"));
}

#[test]
fn test_select_contractor_then_paste_plan() {
    let dir = TempDir::new().unwrap();
    copilot(&dir).args(["plan", "select", "contractor-2"]).assert().success();
    copilot(&dir).args(["plan", "paste", "Emergency muster at gate 3."]).assert().success();

    copilot(&dir)
        .args(["plan", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Contractor: EnergyPipe Services Inc. (Rating: B)"))
        .stdout(predicate::str::contains("Emergency muster at gate 3."));
}

#[test]
fn test_unknown_contractor_fails() {
    let dir = TempDir::new().unwrap();
    copilot(&dir)
        .args(["plan", "select", "Nobody Ltd."])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown contractor"));
}

#[test]
fn test_pdf_is_routed_to_paste() {
    let dir = TempDir::new().unwrap();
    dir.child("rules.pdf").write_binary(b"%PDF-1.4").unwrap();

    copilot(&dir)
        .args(["rules", "load", "rules.pdf"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("For PDF files, direct text analysis is not supported"));
}

#[test]
fn test_summarize_without_document_is_validation_error() {
    let dir = TempDir::new().unwrap();
    copilot(&dir)
        .args(["rules", "summarize"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Please upload or paste a regulation document first."));
}

#[test]
fn test_missing_api_key_is_reported() {
    let dir = TempDir::new().unwrap();
    copilot(&dir).args(["rules", "paste", "Workers must wear hard hats."]).assert().success();

    copilot(&dir)
        .args(["rules", "summarize"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "API key not configured. Please set the API_KEY environment variable.",
        ));

    // The document survives the failed call.
    copilot(&dir)
        .args(["rules", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Workers must wear hard hats."));
}

#[test]
fn test_promote_without_image_fails() {
    let dir = TempDir::new().unwrap();
    copilot(&dir)
        .args(["risk", "promote"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No image analysis available to add to notes."));
}

// ============================================================================
// Audit & Session
// ============================================================================

#[test]
fn test_audit_list_empty() {
    let dir = TempDir::new().unwrap();
    copilot(&dir)
        .args(["audit", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Total: 0 entries"));
}

#[test]
fn test_audit_list_json_empty() {
    let dir = TempDir::new().unwrap();
    copilot(&dir)
        .args(["audit", "list", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("[]"));
}

#[test]
fn test_audit_clear_requires_confirmation() {
    let dir = TempDir::new().unwrap();
    copilot(&dir).args(["audit", "clear"]).assert().failure();
    copilot(&dir).args(["audit", "clear", "--yes"]).assert().success();
}

#[test]
fn test_session_reset() {
    let dir = TempDir::new().unwrap();
    copilot(&dir).args(["report", "notes", "Scaffold missing toe boards."]).assert().success();
    dir.child("data/session.json").assert(predicate::path::exists());

    copilot(&dir).args(["session", "reset"]).assert().success();
    dir.child("data/session.json").assert(predicate::path::missing());

    copilot(&dir)
        .args(["report", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Scaffold").not());
}

#[test]
fn test_successive_commands_accumulate_in_session() {
    let dir = TempDir::new().unwrap();
    copilot(&dir).args(["report", "notes", "Scaffold missing toe boards."]).assert().success();
    copilot(&dir).args(["plan", "select", "contractor-3"]).assert().success();
    copilot(&dir).args(["rules", "paste", "Workers must wear hard hats."]).assert().success();

    copilot(&dir)
        .args(["session", "show", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Scaffold missing toe boards."))
        .stdout(predicate::str::contains("contractor-3"))
        .stdout(predicate::str::contains("Workers must wear hard hats."));
}

#[test]
fn test_session_show_json() {
    let dir = TempDir::new().unwrap();
    copilot(&dir).args(["email", "summary", "No guard rails on level 2"]).assert().success();

    copilot(&dir)
        .args(["session", "show", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"violationsSummaryForEmail\": \"No guard rails on level 2\""));
}

// ============================================================================
// Config & Completions
// ============================================================================

#[test]
fn test_config_shows_defaults() {
    let dir = TempDir::new().unwrap();
    copilot(&dir)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("api_key_env = \"API_KEY\""))
        .stdout(predicate::str::contains("# backend: gemini (API_KEY missing)"));
}

#[test]
fn test_config_reports_credential_present() {
    let dir = TempDir::new().unwrap();
    copilot(&dir)
        .env("API_KEY", "test-key")
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("# backend: gemini (API_KEY set)"));
}

#[test]
fn test_local_config_overrides_provider() {
    let dir = TempDir::new().unwrap();
    dir.child(".safety-copilot.toml").write_str("[gateway]\nprovider = \"other\"\n").unwrap();

    copilot(&dir)
        .args(["rules", "summarize"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unsupported completion provider: other"));
}

#[test]
fn test_completions_bash() {
    let dir = TempDir::new().unwrap();
    copilot(&dir)
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("safety-copilot"));
}
