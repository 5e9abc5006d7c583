//! The binary's exit codes and operator-facing errors.

use std::fs;
use std::process::Command;

use tempfile::TempDir;

use android_collector::utils::manifest::Finalizer;

fn collector() -> Command {
    Command::new(env!("CARGO_BIN_EXE_android_collector"))
}

#[test]
fn test_unusable_output_dir_is_reported() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("blocker");
    fs::write(&blocker, "a regular file").unwrap();

    let output = collector()
        .arg("--output")
        .arg(blocker.join("out"))
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stderr.contains("Failed to create output directory") || stdout.contains("Failed to create output directory"),
        "nothing reported, stdout: {:?} stderr: {:?}",
        stdout,
        stderr
    );
}

#[test]
fn test_verify_flags_tampered_workspace() {
    let dir = TempDir::new().unwrap();
    let workspace = dir.path().join("session");
    fs::create_dir_all(&workspace).unwrap();
    fs::write(workspace.join("getprop.txt"), "[ro.product.model]: [Pixel 7]\n").unwrap();
    Finalizer::hash_files(&workspace).unwrap();

    let intact = collector().arg("verify").arg(&workspace).output().unwrap();
    assert_eq!(intact.status.code(), Some(0));

    fs::write(workspace.join("getprop.txt"), "[ro.product.model]: [Other]\n").unwrap();
    let tampered = collector().arg("verify").arg(&workspace).output().unwrap();
    assert_eq!(tampered.status.code(), Some(1));
}
