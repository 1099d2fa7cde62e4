use tracing::{info, warn};

use crate::app::config::SystemOptimizations;
use crate::app::error::AppError;
use crate::app::executor::run_command;
use crate::app::tools::resolve_tool;

/// Basic Android package format: dot-separated segments of alnum/underscore,
/// at least two segments.
pub fn is_valid_package_name(value: &str) -> bool {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return false;
    }
    let mut count = 0usize;
    for part in trimmed.split('.') {
        count += 1;
        if part.is_empty() {
            return false;
        }
        if !part.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return false;
        }
    }
    count >= 2
}

/// Applies the configured optimizations: force-stops each listed background
/// app and optionally engages the battery saver. Per-app failures are logged
/// and the pass moves on.
pub fn run_optimization(
    opts: &SystemOptimizations,
    toolbox_dir: &str,
    trace_id: &str,
) -> Result<(), AppError> {
    let am = resolve_tool(toolbox_dir, "am");
    for package in &opts.background_apps {
        if !is_valid_package_name(package) {
            warn!(trace_id = %trace_id, package = %package, "Skipping invalid package name");
            continue;
        }
        let args = vec!["force-stop".to_string(), package.clone()];
        let output = run_command(&am, &args, trace_id)?;
        if output.exit_code == Some(0) {
            info!(trace_id = %trace_id, package = %package, "Stopped background app");
        } else {
            warn!(
                trace_id = %trace_id,
                package = %package,
                exit_code = ?output.exit_code,
                stderr = %output.stderr.trim(),
                "Failed to stop background app"
            );
        }
    }

    if opts.cpu_throttle {
        let settings = resolve_tool(toolbox_dir, "settings");
        let args = vec![
            "put".to_string(),
            "global".to_string(),
            "low_power".to_string(),
            "1".to_string(),
        ];
        let output = run_command(&settings, &args, trace_id)?;
        if output.exit_code == Some(0) {
            info!(trace_id = %trace_id, "Battery saver engaged");
        } else {
            warn!(
                trace_id = %trace_id,
                exit_code = ?output.exit_code,
                stderr = %output.stderr.trim(),
                "Failed to engage battery saver"
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_normal_package_names() {
        assert!(is_valid_package_name("com.example.app"));
        assert!(is_valid_package_name("com.android.chrome"));
        assert!(is_valid_package_name("a_b.c1"));
    }

    #[test]
    fn rejects_malformed_package_names() {
        assert!(!is_valid_package_name(""));
        assert!(!is_valid_package_name("single"));
        assert!(!is_valid_package_name("com..app"));
        assert!(!is_valid_package_name("com.example;rm"));
        assert!(!is_valid_package_name(".com.example"));
    }

    #[test]
    fn empty_optimizations_are_a_no_op() {
        let opts = SystemOptimizations::default();
        run_optimization(&opts, "", "trace-test").expect("ok");
    }

    #[cfg(unix)]
    #[test]
    fn force_stops_each_valid_package_once() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::TempDir::new().expect("tmp");
        let log = dir.path().join("calls.log");
        let script = dir.path().join("am");
        std::fs::write(
            &script,
            format!("#!/bin/sh\necho \"$@\" >> {}\n", log.display()),
        )
        .expect("write");
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).expect("chmod");

        let opts = SystemOptimizations {
            cpu_throttle: false,
            background_apps: vec![
                "com.example.app".to_string(),
                "not a package".to_string(),
            ],
        };
        run_optimization(&opts, &dir.path().to_string_lossy(), "trace-test").expect("ok");

        let calls = std::fs::read_to_string(&log).expect("read");
        let lines: Vec<&str> = calls.lines().collect();
        assert_eq!(lines, vec!["force-stop com.example.app"]);
    }
}
