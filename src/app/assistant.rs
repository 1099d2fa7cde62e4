use std::path::PathBuf;
use std::sync::Mutex;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::app::checks::{run_battery_check, run_network_check, run_storage_check};
use crate::app::config::{save_config, AssistantConfig};
use crate::app::error::AppError;
use crate::app::executor::execute_line;
use crate::app::optimize::run_optimization;
use crate::app::profile::DeviceProfile;
use crate::app::tasks::{TaskRunner, SHUTDOWN_JOIN_TIMEOUT};
use crate::app::tools::{resolve_tool, validate_tool, STARTUP_TOOLS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Created,
    Started,
    ShuttingDown,
    Stopped,
}

/// Exact-match lookup of a spoken phrase in the configured mappings.
pub fn resolve_command<'a>(config: &'a AssistantConfig, phrase: &str) -> Option<&'a str> {
    config.voice_commands.get(phrase.trim()).map(String::as_str)
}

/// The one stateful object: owns the config, the background-unit registry,
/// and the lifecycle state machine.
pub struct Assistant {
    config: AssistantConfig,
    config_path: PathBuf,
    profile: DeviceProfile,
    runner: TaskRunner,
    state: Mutex<Lifecycle>,
}

impl Assistant {
    pub fn new(config: AssistantConfig, config_path: PathBuf) -> Self {
        Self {
            config,
            config_path,
            profile: DeviceProfile::default(),
            runner: TaskRunner::new(),
            state: Mutex::new(Lifecycle::Created),
        }
    }

    pub fn config(&self) -> &AssistantConfig {
        &self.config
    }

    pub fn state(&self) -> Lifecycle {
        *self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Fires the optimization pass and the startup checks as independent
    /// background units and returns without waiting on them. Only legal from
    /// `Created`; a second call is rejected.
    pub fn start(&self, trace_id: &str) -> Result<(), AppError> {
        {
            let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
            if *state != Lifecycle::Created {
                return Err(AppError::validation("Assistant already started", trace_id));
            }
            *state = Lifecycle::Started;
        }

        info!(
            trace_id = %trace_id,
            version = env!("CARGO_PKG_VERSION"),
            os = std::env::consts::OS,
            arch = std::env::consts::ARCH,
            timestamp_utc = %Utc::now().to_rfc3339(),
            security_level = %self.config.security_level,
            profile = %serde_json::to_string(&self.profile).unwrap_or_default(),
            "Assistant starting"
        );

        for tool in STARTUP_TOOLS {
            let program = resolve_tool(&self.config.toolbox_dir, tool);
            match validate_tool(&program) {
                Ok(()) => debug!(trace_id = %trace_id, tool = %program, "Tool resolved"),
                Err(reason) => {
                    warn!(trace_id = %trace_id, tool = %program, reason = %reason, "Tool unavailable")
                }
            }
        }

        let toolbox = self.config.toolbox_dir.clone();
        let opts = self.config.system_optimizations.clone();
        let task_toolbox = toolbox.clone();
        let task_trace = trace_id.to_string();
        self.runner.spawn("optimize", trace_id, move || {
            run_optimization(&opts, &task_toolbox, &task_trace)
        })?;

        let task_toolbox = toolbox.clone();
        let task_trace = trace_id.to_string();
        self.runner.spawn("battery-check", trace_id, move || {
            run_battery_check(&task_toolbox, &task_trace)
        })?;

        let task_toolbox = toolbox.clone();
        let task_trace = trace_id.to_string();
        self.runner.spawn("storage-check", trace_id, move || {
            run_storage_check(&task_toolbox, &task_trace)
        })?;

        let task_trace = trace_id.to_string();
        self.runner.spawn("network-check", trace_id, move || {
            run_network_check(&toolbox, &task_trace)
        })?;

        Ok(())
    }

    /// Dispatches a recognized phrase to the command executor as a background
    /// unit; an unrecognized phrase produces exactly one log line and no
    /// action. Returns whether a dispatch happened.
    pub fn handle_voice_command(&self, phrase: &str, trace_id: &str) -> Result<bool, AppError> {
        if self.state() != Lifecycle::Started {
            return Err(AppError::validation(
                "Assistant is not accepting voice commands",
                trace_id,
            ));
        }
        match resolve_command(&self.config, phrase) {
            Some(command) => {
                info!(trace_id = %trace_id, phrase = %phrase.trim(), command = %command, "Dispatching voice command");
                let line = command.to_string();
                let task_trace = trace_id.to_string();
                self.runner.spawn("voice-command", trace_id, move || {
                    execute_line(&line, &task_trace)
                })?;
                Ok(true)
            }
            None => {
                info!(trace_id = %trace_id, phrase = %phrase.trim(), "Unrecognized voice command");
                Ok(false)
            }
        }
    }

    /// Drains every tracked unit with a bounded join, then writes the config
    /// to disk exactly once. Idempotent: repeated calls after the first are
    /// logged no-ops. Legal from `Created` too, in which case only the config
    /// write happens.
    pub fn shutdown(&self, trace_id: &str) -> Result<(), AppError> {
        {
            let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
            match *state {
                Lifecycle::ShuttingDown | Lifecycle::Stopped => {
                    info!(trace_id = %trace_id, "Shutdown already in progress, ignoring");
                    return Ok(());
                }
                Lifecycle::Created | Lifecycle::Started => *state = Lifecycle::ShuttingDown,
            }
        }

        let abandoned = self.runner.drain(SHUTDOWN_JOIN_TIMEOUT, trace_id);
        let saved = save_config(&self.config, &self.config_path, trace_id);

        {
            let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
            *state = Lifecycle::Stopped;
        }

        match saved {
            Ok(()) => {
                info!(trace_id = %trace_id, abandoned, "Assistant stopped");
                Ok(())
            }
            Err(err) => {
                warn!(trace_id = %trace_id, error = %err, "Config flush failed during shutdown");
                Err(err)
            }
        }
    }
}
