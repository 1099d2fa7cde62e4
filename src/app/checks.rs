use serde::Deserialize;
use tracing::{info, warn};

use crate::app::error::AppError;
use crate::app::executor::run_command;
use crate::app::tools::resolve_tool;

pub const LOW_BATTERY_PERCENT: i64 = 20;
pub const STORAGE_WARN_PERCENT: u8 = 90;
pub const DATA_MOUNT: &str = "/data";
pub const PING_TARGET: &str = "8.8.8.8";

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct BatteryStatus {
    pub percentage: i64,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub plugged: String,
}

pub fn parse_battery_status(raw: &str) -> Option<BatteryStatus> {
    serde_json::from_str(raw).ok()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskUsage {
    pub filesystem: String,
    pub used_percent: u8,
}

/// Pulls the Use% column out of `df` output. Expects the usual
/// header-then-rows shape; returns the first data row carrying a percentage.
pub fn parse_disk_usage(output: &str) -> Option<DiskUsage> {
    for line in output.lines().skip(1) {
        let columns: Vec<&str> = line.split_whitespace().collect();
        if columns.len() < 2 {
            continue;
        }
        if let Some(token) = columns.iter().find(|token| token.ends_with('%')) {
            if let Ok(percent) = token.trim_end_matches('%').parse::<u8>() {
                return Some(DiskUsage {
                    filesystem: columns[0].to_string(),
                    used_percent: percent,
                });
            }
        }
    }
    None
}

pub fn run_battery_check(toolbox_dir: &str, trace_id: &str) -> Result<(), AppError> {
    let program = resolve_tool(toolbox_dir, "termux-battery-status");
    let output = run_command(&program, &[], trace_id)?;
    if output.exit_code != Some(0) {
        return Err(AppError::dependency(
            format!("battery status query failed: {}", output.stderr.trim()),
            trace_id,
        ));
    }
    match parse_battery_status(&output.stdout) {
        Some(battery) => {
            if battery.percentage < LOW_BATTERY_PERCENT && battery.status != "CHARGING" {
                warn!(
                    trace_id = %trace_id,
                    percentage = battery.percentage,
                    status = %battery.status,
                    "Battery low"
                );
            } else {
                info!(
                    trace_id = %trace_id,
                    percentage = battery.percentage,
                    status = %battery.status,
                    "Battery check ok"
                );
            }
        }
        None => {
            warn!(
                trace_id = %trace_id,
                stdout = %output.stdout.trim(),
                "Battery status output was not parseable"
            );
        }
    }
    Ok(())
}

pub fn run_storage_check(toolbox_dir: &str, trace_id: &str) -> Result<(), AppError> {
    let program = resolve_tool(toolbox_dir, "df");
    let args = vec!["-h".to_string(), DATA_MOUNT.to_string()];
    let output = run_command(&program, &args, trace_id)?;
    if output.exit_code != Some(0) {
        return Err(AppError::dependency(
            format!("df failed: {}", output.stderr.trim()),
            trace_id,
        ));
    }
    match parse_disk_usage(&output.stdout) {
        Some(usage) => {
            if usage.used_percent >= STORAGE_WARN_PERCENT {
                warn!(
                    trace_id = %trace_id,
                    filesystem = %usage.filesystem,
                    used_percent = usage.used_percent,
                    "Storage nearly full"
                );
            } else {
                info!(
                    trace_id = %trace_id,
                    filesystem = %usage.filesystem,
                    used_percent = usage.used_percent,
                    "Storage check ok"
                );
            }
        }
        None => {
            warn!(
                trace_id = %trace_id,
                stdout = %output.stdout.trim(),
                "df output was not parseable"
            );
        }
    }
    Ok(())
}

pub fn run_network_check(toolbox_dir: &str, trace_id: &str) -> Result<(), AppError> {
    let program = resolve_tool(toolbox_dir, "ping");
    let args = vec![
        "-c".to_string(),
        "1".to_string(),
        "-W".to_string(),
        "2".to_string(),
        PING_TARGET.to_string(),
    ];
    let output = run_command(&program, &args, trace_id)?;
    if output.exit_code == Some(0) {
        info!(trace_id = %trace_id, target = PING_TARGET, "Network check ok");
    } else {
        // Offline is a condition to report, not a fault to raise.
        warn!(
            trace_id = %trace_id,
            target = PING_TARGET,
            exit_code = ?output.exit_code,
            "Network unreachable"
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_termux_battery_json() {
        let raw = r#"{"health":"GOOD","percentage":85,"plugged":"UNPLUGGED","status":"DISCHARGING","temperature":30.5}"#;
        let battery = parse_battery_status(raw).expect("parse");
        assert_eq!(battery.percentage, 85);
        assert_eq!(battery.status, "DISCHARGING");
        assert_eq!(battery.plugged, "UNPLUGGED");
    }

    #[test]
    fn battery_parse_rejects_garbage() {
        assert!(parse_battery_status("E: command not found").is_none());
    }

    #[test]
    fn parses_df_data_row() {
        let output = "Filesystem      Size  Used Avail Use% Mounted on\n/dev/block/dm-5 108G   92G   16G  86% /data\n";
        let usage = parse_disk_usage(output).expect("parse");
        assert_eq!(usage.filesystem, "/dev/block/dm-5");
        assert_eq!(usage.used_percent, 86);
    }

    #[test]
    fn df_parse_skips_rows_without_percentage() {
        let output = "Filesystem Size Used Avail Use% Mounted on\nnone 0 0 0 - /proc\n/dev/root 10G 9G 1G 90% /\n";
        let usage = parse_disk_usage(output).expect("parse");
        assert_eq!(usage.filesystem, "/dev/root");
        assert_eq!(usage.used_percent, 90);
    }

    #[test]
    fn df_parse_handles_empty_output() {
        assert!(parse_disk_usage("").is_none());
    }

    #[cfg(unix)]
    #[test]
    fn battery_check_reads_a_fake_helper() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::TempDir::new().expect("tmp");
        let script = dir.path().join("termux-battery-status");
        std::fs::write(
            &script,
            "#!/bin/sh\necho '{\"percentage\": 55, \"status\": \"DISCHARGING\"}'\n",
        )
        .expect("write");
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).expect("chmod");

        run_battery_check(&dir.path().to_string_lossy(), "trace-test").expect("check");
    }

    #[cfg(unix)]
    #[test]
    fn battery_check_missing_helper_is_a_dependency_error() {
        let dir = tempfile::TempDir::new().expect("tmp");
        let err = run_battery_check(&dir.path().to_string_lossy(), "trace-test").unwrap_err();
        assert_eq!(err.code, "ERR_DEPENDENCY");
    }
}
