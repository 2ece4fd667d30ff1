#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn hostguard(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("hostguard").unwrap();
    cmd.current_dir(dir.path())
        .env("HOSTGUARD_CONFIG", dir.path().join("hostguard.yaml"))
        .env_remove("HOSTGUARD_PASSWORD")
        .env_remove("RUST_LOG");
    cmd
}

fn write_sshd(dir: &TempDir, text: &str) -> PathBuf {
    let path = dir.path().join("sshd_config");
    std::fs::write(&path, text).unwrap();
    path
}

fn backups(dir: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| p.to_string_lossy().contains(".backup."))
        .collect()
}

// ---------------------------------------------------------------------------
// hostguard apply
// ---------------------------------------------------------------------------

#[test]
fn apply_sets_directives_and_keeps_backup() {
    let dir = TempDir::new().unwrap();
    let original = "#Port 22\nUsePAM yes\n";
    let path = write_sshd(&dir, original);

    hostguard(&dir)
        .args(["apply", path.to_str().unwrap(), "Port=2222", "PermitRootLogin=no"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ok:"));

    let content = std::fs::read_to_string(&path).unwrap();
    assert_eq!(content, "Port 2222\nUsePAM yes\nPermitRootLogin no\n");

    let b = backups(dir.path());
    assert_eq!(b.len(), 1);
    assert_eq!(std::fs::read_to_string(&b[0]).unwrap(), original);
}

#[test]
fn apply_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let path = write_sshd(&dir, "Port 22\n");
    let file = path.to_str().unwrap();

    hostguard(&dir)
        .args(["apply", file, "Port=2222"])
        .assert()
        .success();
    let first = std::fs::read(&path).unwrap();

    hostguard(&dir)
        .args(["apply", file, "Port=2222"])
        .assert()
        .success()
        .stdout(predicate::str::contains("already up to date"));
    assert_eq!(std::fs::read(&path).unwrap(), first);
}

#[test]
fn apply_reverts_when_validator_fails() {
    let dir = TempDir::new().unwrap();
    let original = "Port 22\r\n  PermitRootLogin yes\n# trailing comment";
    let path = write_sshd(&dir, original);

    hostguard(&dir)
        .args([
            "apply",
            path.to_str().unwrap(),
            "Port=2222",
            "--validate",
            "false",
        ])
        .assert()
        .failure()
        .stdout(predicate::str::contains("reverted"));

    assert_eq!(std::fs::read(&path).unwrap(), original.as_bytes());
}

#[test]
fn apply_validator_sees_the_new_file() {
    let dir = TempDir::new().unwrap();
    let path = write_sshd(&dir, "Port 22\n");

    hostguard(&dir)
        .args([
            "apply",
            path.to_str().unwrap(),
            "Port=2222",
            "--validate",
            r#"grep -q '^Port 2222$' "$1""#,
        ])
        .assert()
        .success();

    assert_eq!(std::fs::read_to_string(&path).unwrap(), "Port 2222\n");
}

#[test]
fn apply_detects_equals_separator() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.conf");
    std::fs::write(&path, "workers = 4\n").unwrap();

    hostguard(&dir)
        .args(["apply", path.to_str().unwrap(), "timeout=30"])
        .assert()
        .success();

    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        "workers = 4\ntimeout = 30\n"
    );
}

#[test]
fn apply_rejects_malformed_assignment() {
    let dir = TempDir::new().unwrap();
    let path = write_sshd(&dir, "Port 22\n");

    hostguard(&dir)
        .args(["apply", path.to_str().unwrap(), "Port"])
        .assert()
        .failure();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "Port 22\n");
}

#[test]
fn apply_json_reports_outcome() {
    let dir = TempDir::new().unwrap();
    let path = write_sshd(&dir, "Port 22\n");

    let output = hostguard(&dir)
        .args(["--json", "apply", path.to_str().unwrap(), "Port=2222"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let v: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(v["status"], "ok");
}

// ---------------------------------------------------------------------------
// hostguard check-port
// ---------------------------------------------------------------------------

#[test]
fn check_port_rejects_out_of_range_and_garbage() {
    let dir = TempDir::new().unwrap();
    for bad in ["80", "1023", "70000", "abc"] {
        hostguard(&dir).args(["check-port", bad]).assert().failure();
    }
}

#[test]
fn check_port_accepts_the_current_ssh_port() {
    let dir = TempDir::new().unwrap();
    let sshd = write_sshd(&dir, "Port 2222\n");
    std::fs::write(
        dir.path().join("hostguard.yaml"),
        format!("sshd_config: {}\n", sshd.display()),
    )
    .unwrap();

    hostguard(&dir)
        .args(["check-port", "2222"])
        .assert()
        .success()
        .stdout(predicate::str::contains("current SSH port"));
}

#[test]
fn check_port_rejects_a_bound_port() {
    let dir = TempDir::new().unwrap();
    let listener = std::net::TcpListener::bind("0.0.0.0:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    if port < 1024 {
        return;
    }

    hostguard(&dir)
        .args(["check-port", &port.to_string()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("in use"));
}

// ---------------------------------------------------------------------------
// hostguard config
// ---------------------------------------------------------------------------

#[test]
fn config_init_writes_defaults_once() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("hostguard.yaml");

    hostguard(&dir).args(["config", "init"]).assert().success();
    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.contains("sshd_config: /etc/ssh/sshd_config"));

    std::fs::write(&path, "ssh_service: sshd\n").unwrap();
    hostguard(&dir)
        .args(["config", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "ssh_service: sshd\n");
}

#[test]
fn config_show_merges_file_over_defaults() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("hostguard.yaml"), "ssh_service: sshd\n").unwrap();

    let output = hostguard(&dir)
        .args(["config", "show", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let v: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(v["ssh_service"], "sshd");
    assert_eq!(v["proxy"]["generator"], "xray");
}

#[test]
fn config_validate_flags_port_collision() {
    let dir = TempDir::new().unwrap();
    hostguard(&dir)
        .args(["config", "validate", "--port", "443"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("collides"));
    hostguard(&dir)
        .args(["config", "validate", "--port", "2222"])
        .assert()
        .success();
}

// ---------------------------------------------------------------------------
// hostguard keys
// ---------------------------------------------------------------------------

#[cfg(unix)]
fn fake_generator(dir: &TempDir, keypair: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;
    let path = dir.path().join("fake-xray");
    let script = format!(
        "#!/bin/sh\ncase \"$1\" in\n  uuid) echo 0f8fad5b-d9cb-469f-a165-70867728950e ;;\n  x25519) printf '{keypair}' ;;\n  *) exit 0 ;;\nesac\n"
    );
    std::fs::write(&path, script).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

#[cfg(unix)]
fn keys_config(dir: &TempDir, generator: &Path) {
    let yaml = format!(
        "output_dir: {out}\nproxy:\n  generator: {gen}\n  server_config: {cfg}\n  public_host: 203.0.113.7\n",
        out = dir.path().join("out").display(),
        gen = generator.display(),
        cfg = dir.path().join("xray/config.json").display(),
    );
    std::fs::write(dir.path().join("hostguard.yaml"), yaml).unwrap();
}

#[cfg(unix)]
#[test]
fn keys_writes_server_config_and_profile() {
    let dir = TempDir::new().unwrap();
    let gen = fake_generator(&dir, "Private key: privkey\\nPublic key: pubkey\\n");
    keys_config(&dir, &gen);

    hostguard(&dir)
        .args(["keys", "--no-restart"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "vless://0f8fad5b-d9cb-469f-a165-70867728950e@203.0.113.7:443",
        ));

    let server = std::fs::read_to_string(dir.path().join("xray/config.json")).unwrap();
    assert!(server.contains("privkey"));
    assert!(!server.contains("pubkey"));
    let profile = std::fs::read_to_string(dir.path().join("out/profile.txt")).unwrap();
    assert!(profile.contains("pbk=pubkey"));
    assert!(dir.path().join("out/profile.svg").exists());
}

#[cfg(unix)]
#[test]
fn keys_without_public_key_is_fatal() {
    let dir = TempDir::new().unwrap();
    let gen = fake_generator(&dir, "Private key: privkey\\n");
    keys_config(&dir, &gen);

    hostguard(&dir)
        .args(["keys", "--no-restart"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("error (fatal)"));

    assert!(!dir.path().join("xray/config.json").exists());
    assert!(!dir.path().join("out/profile.txt").exists());
}

#[test]
fn keys_with_missing_generator_fails_cleanly() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("hostguard.yaml"),
        format!(
            "output_dir: {}\nproxy:\n  generator: hostguard-no-such-binary\n",
            dir.path().join("out").display()
        ),
    )
    .unwrap();

    hostguard(&dir)
        .args(["keys", "--no-restart"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("not installed"));
}

// ---------------------------------------------------------------------------
// hostguard run
// ---------------------------------------------------------------------------

#[test]
fn run_with_invalid_username_changes_nothing() {
    let dir = TempDir::new().unwrap();
    let sshd = write_sshd(&dir, "Port 22\n");
    std::fs::write(
        dir.path().join("hostguard.yaml"),
        format!(
            "sshd_config: {}\nlog_file: {}\n",
            sshd.display(),
            dir.path().join("run.log").display()
        ),
    )
    .unwrap();

    // Preflight fails first on a non-root host; the parameters pass fails otherwise.
    hostguard(&dir)
        .args(["run", "--username", "Bad User", "--password", "longenough", "--port", "2222"])
        .write_stdin("")
        .assert()
        .failure()
        .stderr(predicate::str::contains("run aborted"));
    assert_eq!(std::fs::read_to_string(&sshd).unwrap(), "Port 22\n");
    assert!(backups(dir.path()).is_empty());
}

#[test]
fn apply_disables_duplicate_when_first_line_already_matches() {
    let dir = TempDir::new().unwrap();
    let path = write_sshd(&dir, "Port 2222\nPort 22\n");

    hostguard(&dir)
        .args(["apply", path.to_str().unwrap(), "Port=2222"])
        .assert()
        .success()
        .stdout(predicate::str::contains("updated: Port"));

    assert_eq!(std::fs::read_to_string(&path).unwrap(), "Port 2222\n# Port 22\n");
}
