// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies
//
// ModeProbe CLI - Integration Tests
//
// TESTING LAYERS:
//
// Layer 1 (Unit Tests - No hardware required):
//   - Help text and command structure
//   - Invalid argument handling
//   - Catalog listing
//
// Layer 2 (Simulated devices - No hardware required):
//   - Detection output driven by JSON scenarios (tests/fixtures)
//   - Exit codes per failure class
//   - Iteration continues past failing devices
//
// Layer 3 (Hardware Integration - Requires capture driver runtime):
//   - Driver runtime probe
//
// RUN LAYER 1 AND 2:
//   cargo test --test cli
//
// RUN LAYER 3 (on hardware):
//   cargo test --test cli -- --ignored --nocapture

use assert_cmd::Command;
use predicates::prelude::*;
use serial_test::serial;
use std::{env, path::PathBuf};

/// Helper to create a Command for the modeprobe binary
/// Uses MODEPROBE_BIN environment variable if set, otherwise the binary cargo built
fn modeprobe_cmd() -> Command {
    let mut cmd = if let Ok(bin_path) = env::var("MODEPROBE_BIN") {
        Command::new(bin_path)
    } else {
        Command::new(env!("CARGO_BIN_EXE_modeprobe"))
    };

    // Pass LD_LIBRARY_PATH for driver runtime loading
    if let Ok(ld_library_path) = env::var("LD_LIBRARY_PATH") {
        cmd.env("LD_LIBRARY_PATH", ld_library_path);
    }

    cmd
}

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

// =============================================================================
// Layer 1: Command Structure
// =============================================================================

#[test]
fn test_help() {
    modeprobe_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("detect"))
        .stdout(predicate::str::contains("modes"))
        .stdout(predicate::str::contains("info"));
}

#[test]
fn test_detect_help() {
    modeprobe_cmd()
        .args(["detect", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--scenario"))
        .stdout(predicate::str::contains("--timeout"))
        .stdout(predicate::str::contains("--video"))
        .stdout(predicate::str::contains(
            "Hardware device enumeration is not available",
        ));
}

#[test]
fn test_version() {
    modeprobe_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_invalid_video_connection() {
    modeprobe_cmd()
        .args(["detect", "--video", "firewire"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("unknown video connection"));
}

#[test]
fn test_zero_timeout_rejected() {
    modeprobe_cmd()
        .arg("detect")
        .arg("--scenario")
        .arg(fixture("single_hp59.json"))
        .args(["--timeout", "0"])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn test_modes_lists_catalog() {
    modeprobe_cmd()
        .arg("modes")
        .assert()
        .success()
        .stdout(predicate::str::contains("bmdModeHD1080p5994"))
        .stdout(predicate::str::contains("bmdMode4K2160p60"))
        .stdout(predicate::str::contains("36 modes"));
}

#[test]
fn test_modes_respects_api_version() {
    modeprobe_cmd()
        .args(["modes", "--api-version", "10.3.0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("bmdMode4K2160p60").not())
        .stdout(predicate::str::contains("33 modes"));
}

#[test]
fn test_modes_json() {
    let output = modeprobe_cmd()
        .args(["--json", "modes"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let modes: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let modes = modes.as_array().unwrap();
    assert_eq!(modes.len(), 36);
    assert_eq!(modes[0]["code"], 0);
    assert_eq!(modes[0]["name"], "bmdModeNTSC");
}

// =============================================================================
// Layer 2: Simulated Devices
// =============================================================================

#[test]
#[serial]
fn test_detect_format_change() {
    modeprobe_cmd()
        .arg("detect")
        .arg("--scenario")
        .arg(fixture("single_hp59.json"))
        .assert()
        .success()
        .stdout(predicate::str::contains("instance: 0"))
        .stdout(predicate::str::contains("Video mode: 17, bmdModeHD1080p5994"))
        .stdout(predicate::str::contains(
            "Resolution: 1920x1080, framerate: 59.9401, field dominance: progressive frame",
        ));
}

#[test]
#[serial]
fn test_detect_json() {
    let output = modeprobe_cmd()
        .args(["--json", "detect", "--scenario"])
        .arg(fixture("single_hp59.json"))
        .output()
        .unwrap();
    assert!(output.status.success());

    let records: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let record = &records[0];
    assert_eq!(record["instance"], 0);
    assert_eq!(record["detected"], true);
    assert_eq!(record["mode"]["fourcc"], "Hp59");
    assert_eq!(record["mode"]["frame_rate"], "60000/1001");
    assert_eq!(record["mode"]["width"], 1920);
}

#[test]
#[serial]
fn test_detect_continues_past_failures() {
    modeprobe_cmd()
        .arg("detect")
        .arg("--scenario")
        .arg(fixture("mixed.json"))
        .assert()
        .failure()
        .code(4)
        .stdout(predicate::str::contains(
            "instance: 0\nFailed to detect video mode\ninstance: 1\nVideo mode: 2, bmdModePAL",
        ))
        .stdout(predicate::str::contains(
            "Resolution: 720x576, framerate: 25, field dominance: upper field first",
        ))
        .stdout(predicate::str::contains(
            "instance: 2\nVideo mode: 6, bmdModeHD1080p2997",
        ))
        .stderr(predicate::str::contains("DeckLink Duo 2"));
}

#[test]
#[serial]
fn test_detect_no_signal_times_out() {
    modeprobe_cmd()
        .arg("detect")
        .arg("--scenario")
        .arg(fixture("no_signal.json"))
        .args(["--timeout", "200"])
        .assert()
        .failure()
        .code(6)
        .stdout(predicate::str::contains("Failed to detect video mode"))
        .stderr(predicate::str::contains("no video format detected within 200 ms"));
}

#[test]
#[serial]
fn test_detect_unknown_mode() {
    modeprobe_cmd()
        .arg("detect")
        .arg("--scenario")
        .arg(fixture("unknown_mode.json"))
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains(
            "Video mode: -1, unknown\nFailed to detect video mode",
        ));
}

#[test]
fn test_detect_missing_scenario() {
    modeprobe_cmd()
        .args(["detect", "--scenario", "/nonexistent/scenario.json"])
        .assert()
        .failure()
        .code(3);
}

#[test]
fn test_detect_malformed_scenario() {
    modeprobe_cmd()
        .arg("detect")
        .arg("--scenario")
        .arg(fixture("malformed.json"))
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("Malformed scenario"));
}

#[test]
fn test_detect_without_devices_or_driver() {
    modeprobe_cmd()
        .arg("detect")
        .env("MODEPROBE_DRIVER_LIBRARY", "/nonexistent/libDeckLinkAPI.so")
        .assert()
        .failure()
        .code(3);
}

#[test]
fn test_info_reports_missing_runtime() {
    modeprobe_cmd()
        .args(["info", "--library", "/nonexistent/libDeckLinkAPI.so"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Status: not available"));
}

// =============================================================================
// Layer 3: Hardware Integration
// =============================================================================

#[test]
#[ignore = "requires the capture driver runtime to be installed"]
fn test_info_with_runtime() {
    modeprobe_cmd()
        .arg("info")
        .assert()
        .success()
        .stdout(predicate::str::contains("Status: loaded"))
        .stdout(predicate::str::contains("CreateDeckLinkIteratorInstance"));
}
