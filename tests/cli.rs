//! CLI precondition checks driven through the binary.

use assert_cmd::Command;
use predicates::prelude::*;

fn ferry() -> Command {
    Command::cargo_bin("ferry").expect("ferry binary not found")
}

#[test]
fn help_lists_the_transfer_options() {
    ferry()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--port"))
        .stdout(predicate::str::contains("--connect"))
        .stdout(predicate::str::contains("--search"))
        .stdout(predicate::str::contains("--passcode"))
        .stdout(predicate::str::contains("rtc-send"))
        .stdout(predicate::str::contains("rtc-recv"));
}

#[test]
fn missing_send_file_is_fatal() {
    // The file check runs before any key generation or network activity, so
    // this exits immediately with code 1.
    ferry()
        .args([
            "--file",
            "/definitely/not/a/real/file.bin",
            "--passcode",
            "x",
            "--connect",
            "127.0.0.1:1",
        ])
        .timeout(std::time::Duration::from_secs(30))
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Source file not found"))
        .stderr(predicate::str::contains("hint:"));
}

#[test]
fn missing_rtc_send_file_is_fatal() {
    ferry()
        .args(["rtc-send", "--file", "/definitely/not/a/real/file.bin"])
        .timeout(std::time::Duration::from_secs(30))
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Source file not found"));
}

#[test]
fn empty_passcode_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("real.bin");
    std::fs::write(&file, b"data").unwrap();

    ferry()
        .args([
            "--file",
            file.to_str().unwrap(),
            "--passcode",
            "",
            "--connect",
            "127.0.0.1:1",
        ])
        .timeout(std::time::Duration::from_secs(30))
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("passcode"));
}
