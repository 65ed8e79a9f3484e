//! CLI integration tests

use std::io::Write;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn growthctl(args: &[&str]) -> Output {
    Command::new("cargo")
        .args(["run", "-q", "-p", "growth-cli", "--"])
        .args(args)
        .env_remove("GROWTH_CACHE_DIR")
        .env_remove("GROWTH_DATASET_PATH")
        .env("NO_COLOR", "1")
        .output()
        .expect("Failed to execute command")
}

fn write_dataset(dir: &Path) -> String {
    let path = dir.join("stunting.csv");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "Umur,Jenis Kelamin,Tinggi Badan,Stunting").unwrap();
    for age in 0..24 {
        for sex in ["Laki-laki", "Perempuan"] {
            writeln!(file, "{},{},{:.1},Stunted", age, sex, 50.0 + age as f64 * 0.5).unwrap();
            writeln!(file, "{},{},{:.1},Normal", age, sex, 75.0 + age as f64 * 0.8).unwrap();
        }
    }
    path.to_string_lossy().into_owned()
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = growthctl(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(
        stdout.contains("child growth classifier"),
        "Should show app description"
    );
    for command in ["train", "predict", "batch", "status", "cache"] {
        assert!(stdout.contains(command), "Should show {} command", command);
    }
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let output = growthctl(&["--version"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("growthctl"), "Should show binary name");
}

/// Test predict subcommand help
#[test]
fn test_predict_help() {
    let output = growthctl(&["predict", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("--age"));
    assert!(stdout.contains("--sex"));
    assert!(stdout.contains("--height"));
}

/// Test cache subcommand help
#[test]
fn test_cache_help() {
    let output = growthctl(&["cache", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("status"));
    assert!(stdout.contains("clear"));
}

/// Test that an unknown command fails
#[test]
fn test_invalid_command() {
    let output = growthctl(&["invalid-command"]);
    assert!(!output.status.success(), "Invalid command should fail");
}

/// Train, predict from the cache, then clear it
#[test]
fn test_train_predict_and_clear() {
    let temp_dir = TempDir::new().unwrap();
    let dataset = write_dataset(temp_dir.path());
    let cache_dir = temp_dir.path().join("cache");
    let cache = cache_dir.to_string_lossy().into_owned();

    let output = growthctl(&["--dataset", &dataset, "--cache-dir", &cache, "train", "--format", "json"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let info: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(info["classes"], serde_json::json!(["Normal", "Stunted"]));
    assert!(cache_dir.join("growth_metadata.json").exists());

    // Dataset path is bogus: the prediction must come from the cache
    let output = growthctl(&[
        "--dataset", "/nonexistent.csv", "--cache-dir", &cache, "-f", "json",
        "predict", "--age", "12", "--sex", "Laki-laki", "--height", "60",
    ]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let result: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(result["label"], "Stunted");

    let output = growthctl(&["--cache-dir", &cache, "cache", "clear", "--format", "json"]);
    assert!(output.status.success());
    let cleared: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(cleared["removed"], 4);
    assert!(!cache_dir.join("growth_metadata.json").exists());
}

/// Invalid input exits non-zero and names the field
#[test]
fn test_predict_rejects_out_of_range_age() {
    let temp_dir = TempDir::new().unwrap();
    let dataset = write_dataset(temp_dir.path());
    let cache = temp_dir.path().join("cache").to_string_lossy().into_owned();

    let output = growthctl(&[
        "--dataset", &dataset, "--cache-dir", &cache,
        "predict", "--age", "-1", "--sex", "Perempuan", "--height", "80",
    ]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid age"), "stderr: {}", stderr);
}

/// A train run that fails leaves the previously cached bundle in place
#[test]
fn test_failed_train_keeps_cached_bundle() {
    let temp_dir = TempDir::new().unwrap();
    let dataset = write_dataset(temp_dir.path());
    let cache_dir = temp_dir.path().join("cache");
    let cache = cache_dir.to_string_lossy().into_owned();

    let output = growthctl(&["--dataset", &dataset, "--cache-dir", &cache, "train"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let missing = temp_dir.path().join("missing.csv").to_string_lossy().into_owned();
    let output = growthctl(&["--dataset", &missing, "--cache-dir", &cache, "train"]);
    assert!(!output.status.success());

    for file in ["growth_model.json", "growth_scaler.json", "growth_encoder.json", "growth_metadata.json"] {
        assert!(cache_dir.join(file).exists(), "{} should survive a failed train", file);
    }

    let output = growthctl(&[
        "--dataset", &missing, "--cache-dir", &cache, "-f", "json",
        "predict", "--age", "12", "--sex", "Perempuan", "--height", "95",
    ]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let result: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(result["label"], "Normal");
}

/// Status reports what the next start would do without training
#[test]
fn test_status_is_read_only() {
    let temp_dir = TempDir::new().unwrap();
    let dataset = write_dataset(temp_dir.path());
    let cache_dir = temp_dir.path().join("cache");
    let cache = cache_dir.to_string_lossy().into_owned();

    let output = growthctl(&["--dataset", &dataset, "--cache-dir", &cache, "-f", "json", "status"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["next_start"], "train");
    assert_eq!(report["cache"]["complete"], false);
    assert!(report.get("model").is_none());
    assert!(!cache_dir.exists(), "status must not create the cache");

    let output = growthctl(&["--dataset", &dataset, "--cache-dir", &cache, "train"]);
    assert!(output.status.success());

    let output = growthctl(&["--cache-dir", &cache, "-f", "json", "status"]);
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["next_start"], "load");
    assert_eq!(report["model"]["source"], "cache");
    assert_eq!(report["model"]["classes"], serde_json::json!(["Normal", "Stunted"]));
}
