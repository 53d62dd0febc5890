//! CLI integration tests.

use std::path::{Path, PathBuf};
use std::process::Command;

fn run_cli_clean_env(args: &[&str]) -> std::io::Result<std::process::Output> {
    let mut command = Command::new(env!("CARGO_BIN_EXE_optron"));
    command.args(args);
    for (key, _) in std::env::vars() {
        if key.starts_with("OPTRON_") {
            command.env_remove(key);
        }
    }
    command.output()
}

fn fixture(name: &str) -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    manifest_dir
        .parent()
        .and_then(Path::parent)
        .map_or_else(|| manifest_dir.to_path_buf(), Path::to_path_buf)
        .join("crates/config/tests/fixtures")
        .join(name)
}

#[test]
fn version_flag_prints_binary_name() -> Result<(), Box<dyn std::error::Error>> {
    let output = run_cli_clean_env(&["--version"])?;
    assert!(output.status.success());
    assert!(String::from_utf8(output.stdout)?.starts_with("optron "));
    Ok(())
}

#[test]
fn config_check_prints_normalized_config() -> Result<(), Box<dyn std::error::Error>> {
    let path = fixture("optron.valid.json");
    let output = run_cli_clean_env(&["config", "check", "--config", &path.to_string_lossy()])?;
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(
        value.get("address"),
        Some(&serde_json::json!("collector.internal:7000"))
    );
    assert_eq!(value.get("batchSize"), Some(&serde_json::json!(50)));
    Ok(())
}

#[test]
fn config_check_without_address_exits_2() -> Result<(), Box<dyn std::error::Error>> {
    let output = run_cli_clean_env(&["config", "check"])?;
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8(output.stderr)?;
    assert!(stderr.contains("config:missing_address"));
    Ok(())
}

#[test]
fn run_with_bad_batch_size_fails_before_starting() -> Result<(), Box<dyn std::error::Error>> {
    let path = fixture("optron.bad-batch.json");
    let output = run_cli_clean_env(&["run", "--id", "api", "--config", &path.to_string_lossy()])?;
    assert_eq!(output.status.code(), Some(2));
    Ok(())
}
