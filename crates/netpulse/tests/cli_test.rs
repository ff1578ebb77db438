//! Integration tests for the `netpulse` CLI binary.
//!
//! These cover argument parsing, config handling, call-quality scoring and
//! the telemetry commands against temporary JSON Lines files. Nothing here
//! touches the network.
#![allow(clippy::unwrap_used)]

use std::io::Write;
use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a command for the `netpulse` binary with env isolation.
///
/// Points the config directories at `home` and clears every `NETPULSE_*`
/// override so tests never read the user's real configuration.
fn netpulse_cmd(home: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("netpulse");
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join(".config"))
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG");
    for (key, _) in std::env::vars() {
        if key.starts_with("NETPULSE_") {
            cmd.env_remove(key);
        }
    }
    cmd
}

fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

const UNTIL: &str = "2026-09-15T06:00:00Z";

/// Speed tests every 10 minutes from 2026-09-14 06:00 UTC; `true` is slow.
fn write_speed_series(file: &mut impl Write, host: &str, slow: &[bool]) {
    for (i, slow) in slow.iter().enumerate() {
        let minute = 10 * i;
        let (h, m) = (6 + minute / 60, minute % 60);
        let download = if *slow { 4.0 } else { 85.0 };
        writeln!(
            file,
            r#"{{"host_id":"{host}","type":"speed_test","timestamp":"2026-09-14T{h:02}:{m:02}:00Z","download_mbps":{download},"upload_mbps":14.0,"ping_ms":20.0}}"#
        )
        .unwrap();
    }
}

/// A fleet file: `lab-1` has one slowdown, `lab-2` is healthy.
fn fleet_file(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("telemetry.jsonl");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "# exported by the collector").unwrap();
    write_speed_series(&mut file, "lab-1", &[false, true, true, true, false]);
    write_speed_series(&mut file, "lab-2", &[false; 4]);
    writeln!(file, "{{not json").unwrap();
    path
}

fn json_stdout(output: &std::process::Output) -> serde_json::Value {
    assert!(output.status.success(), "{}", combined_output(output));
    serde_json::from_slice(&output.stdout).unwrap()
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let home = TempDir::new().unwrap();
    let output = netpulse_cmd(home.path()).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("Usage"));
}

#[test]
fn test_help_lists_commands() {
    let home = TempDir::new().unwrap();
    netpulse_cmd(home.path()).arg("--help").assert().success().stdout(
        predicate::str::contains("diagnose")
            .and(predicate::str::contains("quality"))
            .and(predicate::str::contains("incidents"))
            .and(predicate::str::contains("fleet")),
    );
}

#[test]
fn test_version_flag() {
    let home = TempDir::new().unwrap();
    netpulse_cmd(home.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("netpulse"));
}

#[test]
fn test_completions() {
    let home = TempDir::new().unwrap();
    netpulse_cmd(home.path())
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
    netpulse_cmd(home.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[test]
fn test_invalid_subcommand() {
    let home = TempDir::new().unwrap();
    let output = netpulse_cmd(home.path()).arg("foobar").output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("foobar"));
}

// ── Quality ─────────────────────────────────────────────────────────

#[test]
fn test_quality_json() {
    let home = TempDir::new().unwrap();
    let output = netpulse_cmd(home.path())
        .args(["quality", "--latency", "20", "--jitter", "2", "-o", "json"])
        .output()
        .unwrap();
    let json = json_stdout(&output);

    assert_eq!(json["codec"], "g711");
    assert_eq!(json["packet_loss_percent"], 0.0);
    let mos = json["mos"].as_f64().unwrap();
    assert!(mos > 4.0 && mos <= 4.5, "mos {mos}");
    assert!(json["impairments"].get("delay").is_some());
}

#[test]
fn test_quality_loss_lowers_mos() {
    let home = TempDir::new().unwrap();
    let mos = |loss: &str| -> f64 {
        let output = netpulse_cmd(home.path())
            .args(["quality", "--latency", "40", "--loss", loss, "--codec", "g729"])
            .args(["-o", "plain"])
            .output()
            .unwrap();
        assert!(output.status.success());
        String::from_utf8(output.stdout).unwrap().trim().parse().unwrap()
    };
    assert!(mos("0") > mos("3"));
    assert!(mos("3") > mos("15"));
}

#[test]
fn test_quality_simple_model_has_no_codec() {
    let home = TempDir::new().unwrap();
    let output = netpulse_cmd(home.path())
        .args(["quality", "--latency", "30", "--loss", "1", "--simple", "-o", "json-compact"])
        .output()
        .unwrap();
    let json = json_stdout(&output);
    assert!(json["codec"].is_null());
    assert!(json["impairments"].get("loss").is_some());
}

#[test]
fn test_quality_rejects_bad_inputs() {
    let home = TempDir::new().unwrap();
    netpulse_cmd(home.path())
        .args(["quality", "--latency", "20", "--loss", "150"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("loss"));

    // --codec and --simple are mutually exclusive
    netpulse_cmd(home.path())
        .args(["quality", "--latency", "20", "--codec", "opus", "--simple"])
        .assert()
        .code(2);
}

#[test]
fn test_quality_table_output() {
    let home = TempDir::new().unwrap();
    netpulse_cmd(home.path())
        .args(["quality", "--latency", "350", "--jitter", "40", "--loss", "5"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("MOS:")
                .and(predicate::str::contains("Rating:"))
                .and(predicate::str::contains("Recommendations:")),
        );
}

// ── Incidents ───────────────────────────────────────────────────────

#[test]
fn test_incidents_for_one_host() {
    let home = TempDir::new().unwrap();
    let data = fleet_file(home.path());
    let output = netpulse_cmd(home.path())
        .args(["incidents", "--host", "lab-1", "--until", UNTIL, "-o", "json"])
        .arg("--data")
        .arg(&data)
        .output()
        .unwrap();
    let json = json_stdout(&output);

    assert_eq!(json["host_id"], "lab-1");
    assert_eq!(json["status"], "degraded");
    assert_eq!(json["incident_count"], 1);
    assert_eq!(json["samples_analyzed"], 5);
    let incident = &json["incidents"][0];
    assert_eq!(incident["start_time"], "2026-09-14T06:10:00Z");
    assert_eq!(incident["samples"].as_array().unwrap().len(), 3);
}

#[test]
fn test_incidents_outside_window_are_ignored() {
    let home = TempDir::new().unwrap();
    let data = fleet_file(home.path());
    let output = netpulse_cmd(home.path())
        .args(["incidents", "--host", "lab-1", "-o", "json"])
        .args(["--until", "2026-09-20T00:00:00Z", "--hours", "12"])
        .arg("--data")
        .arg(&data)
        .output()
        .unwrap();
    let json = json_stdout(&output);
    assert_eq!(json["status"], "no_data");
    assert_eq!(json["incident_count"], 0);
}

#[test]
fn test_incidents_unknown_host() {
    let home = TempDir::new().unwrap();
    let data = fleet_file(home.path());
    netpulse_cmd(home.path())
        .args(["incidents", "--host", "nope"])
        .arg("--data")
        .arg(&data)
        .assert()
        .code(4)
        .stderr(predicate::str::contains("lab-1, lab-2"));
}

#[test]
fn test_incidents_without_data_file() {
    let home = TempDir::new().unwrap();
    netpulse_cmd(home.path())
        .args(["incidents", "--host", "lab-1"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("No telemetry file"));
}

#[test]
fn test_incidents_missing_file_is_data_error() {
    let home = TempDir::new().unwrap();
    netpulse_cmd(home.path())
        .args(["incidents", "--host", "lab-1", "--data"])
        .arg(home.path().join("missing.jsonl"))
        .assert()
        .code(4);
}

// ── Fleet ───────────────────────────────────────────────────────────

#[test]
fn test_fleet_json_rollup() {
    let home = TempDir::new().unwrap();
    let data = fleet_file(home.path());
    let output = netpulse_cmd(home.path())
        .args(["fleet", "--until", UNTIL, "-o", "json"])
        .arg("--data")
        .arg(&data)
        .output()
        .unwrap();
    let json = json_stdout(&output);

    assert_eq!(json["total_machines"], 2);
    assert_eq!(json["machines_analyzed"], 2);
    assert_eq!(json["machines_with_issues"], 1);
    assert_eq!(json["total_incidents"], 1);
    // 100 - 40 * 1/2 - 5 * 1
    assert_eq!(json["fleet_summary"]["health_score"], 75);
    let hosts: Vec<&str> = json["machine_reports"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["host_id"].as_str().unwrap())
        .collect();
    assert_eq!(hosts, vec!["lab-1", "lab-2"]);
}

#[test]
fn test_fleet_plain_with_host_filter() {
    let home = TempDir::new().unwrap();
    let data = fleet_file(home.path());
    netpulse_cmd(home.path())
        .args(["fleet", "--until", UNTIL, "-o", "plain"])
        .args(["--host", "lab-2", "--host", "ghost"])
        .arg("--data")
        .arg(&data)
        .assert()
        .success()
        .stdout("ghost\tno_data\t0\nlab-2\tok\t0\n");
}

#[test]
fn test_fleet_table_output() {
    let home = TempDir::new().unwrap();
    let data = fleet_file(home.path());
    netpulse_cmd(home.path())
        .args(["fleet", "--until", UNTIL])
        .arg("--data")
        .arg(&data)
        .assert()
        .success()
        .stdout(
            predicate::str::contains("Health:    75/100")
                .and(predicate::str::contains("lab-1"))
                .and(predicate::str::contains("degraded")),
        );
}

#[test]
fn test_fleet_uses_data_file_from_config() {
    let home = TempDir::new().unwrap();
    let data = fleet_file(home.path());
    let config = home.path().join("netpulse.toml");
    std::fs::write(
        &config,
        format!(
            "[defaults]\noutput = \"json-compact\"\n\n[store]\ndata_file = {:?}\n",
            data.display().to_string()
        ),
    )
    .unwrap();

    let output = netpulse_cmd(home.path())
        .args(["fleet", "--until", UNTIL, "--config"])
        .arg(&config)
        .output()
        .unwrap();
    let json = json_stdout(&output);
    assert_eq!(json["total_incidents"], 1);
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_path_honours_flag() {
    let home = TempDir::new().unwrap();
    let config = home.path().join("custom.toml");
    netpulse_cmd(home.path())
        .args(["config", "path", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("custom.toml"));
}

#[test]
fn test_config_init_and_show() {
    let home = TempDir::new().unwrap();
    let config = home.path().join("conf").join("netpulse.toml");

    netpulse_cmd(home.path())
        .args(["config", "init", "--config"])
        .arg(&config)
        .assert()
        .success();
    assert!(config.exists());

    // A second init refuses to overwrite
    netpulse_cmd(home.path())
        .args(["config", "init", "--config"])
        .arg(&config)
        .assert()
        .code(3)
        .stderr(predicate::str::contains("--force"));
    netpulse_cmd(home.path())
        .args(["config", "init", "--force", "--config"])
        .arg(&config)
        .assert()
        .success();

    let output = netpulse_cmd(home.path())
        .args(["config", "show", "-o", "json", "--config"])
        .arg(&config)
        .output()
        .unwrap();
    let json = json_stdout(&output);
    assert_eq!(json["diagnostic"]["ping_count"], 3);
    assert_eq!(json["quality"]["codec"], "g711");

    netpulse_cmd(home.path())
        .args(["config", "show", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("[diagnostic]"));
}

#[test]
fn test_env_overrides_config() {
    let home = TempDir::new().unwrap();
    let output = netpulse_cmd(home.path())
        .env("NETPULSE_DIAGNOSTIC__PING_COUNT", "7")
        .args(["config", "show", "-o", "json"])
        .output()
        .unwrap();
    let json = json_stdout(&output);
    assert_eq!(json["diagnostic"]["ping_count"], 7);
}

#[test]
fn test_invalid_config_exits_with_config_code() {
    let home = TempDir::new().unwrap();
    let config = home.path().join("bad.toml");
    std::fs::write(&config, "[diagnostic]\nping_count = 0\n").unwrap();
    netpulse_cmd(home.path())
        .args(["quality", "--latency", "10", "--config"])
        .arg(&config)
        .assert()
        .code(3)
        .stderr(predicate::str::contains("ping_count"));
}

#[test]
fn test_missing_explicit_config() {
    let home = TempDir::new().unwrap();
    netpulse_cmd(home.path())
        .args(["config", "show", "--config"])
        .arg(home.path().join("absent.toml"))
        .assert()
        .code(3);
}
