use std::io::Read;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::app::error::AppError;

pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
}

/// Quote-aware split of a command line into program + argument vector.
/// Commands are never handed to a shell, so metacharacters are inert;
/// mappings in the config are trusted input regardless.
pub fn tokenize(line: &str, trace_id: &str) -> Result<Vec<String>, AppError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut in_token = false;
    for ch in line.chars() {
        match quote {
            Some(q) if ch == q => quote = None,
            Some(_) => current.push(ch),
            None => match ch {
                '\'' | '"' => {
                    quote = Some(ch);
                    in_token = true;
                }
                c if c.is_whitespace() => {
                    if in_token {
                        tokens.push(std::mem::take(&mut current));
                        in_token = false;
                    }
                }
                c => {
                    current.push(c);
                    in_token = true;
                }
            },
        }
    }
    if quote.is_some() {
        return Err(AppError::validation(
            "Unbalanced quote in command line",
            trace_id,
        ));
    }
    if in_token {
        tokens.push(current);
    }
    if tokens.is_empty() {
        return Err(AppError::validation("Empty command line", trace_id));
    }
    Ok(tokens)
}

pub fn run_command(
    program: &str,
    args: &[String],
    trace_id: &str,
) -> Result<CommandOutput, AppError> {
    run_command_with_timeout(program, args, DEFAULT_COMMAND_TIMEOUT, trace_id)
}

pub fn run_command_with_timeout(
    program: &str,
    args: &[String],
    timeout: Duration,
    trace_id: &str,
) -> Result<CommandOutput, AppError> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|err| {
            AppError::dependency(format!("Failed to spawn {program}: {err}"), trace_id)
        })?;

    // Drain stdout/stderr in parallel; otherwise a chatty child blocks once
    // the pipe buffer fills and we incorrectly hit the timeout.
    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| AppError::system("Failed to capture stdout", trace_id))?;
    let mut stderr = child
        .stderr
        .take()
        .ok_or_else(|| AppError::system("Failed to capture stderr", trace_id))?;

    let stdout_handle = std::thread::spawn(move || {
        let mut buffer = Vec::<u8>::new();
        let _ = stdout.read_to_end(&mut buffer);
        buffer
    });
    let stderr_handle = std::thread::spawn(move || {
        let mut buffer = Vec::<u8>::new();
        let _ = stderr.read_to_end(&mut buffer);
        buffer
    });

    let start = Instant::now();
    let exit_code = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status.code(),
            Ok(None) => {
                if start.elapsed() > timeout {
                    let _ = child.kill();
                    let _ = child.wait();
                    let _ = stdout_handle.join();
                    let _ = stderr_handle.join();
                    return Err(AppError::system(
                        format!("{program} timed out after {}s", timeout.as_secs()),
                        trace_id,
                    ));
                }
                std::thread::sleep(Duration::from_millis(50));
            }
            Err(err) => {
                let _ = stdout_handle.join();
                let _ = stderr_handle.join();
                return Err(AppError::system(
                    format!("Failed to poll {program}: {err}"),
                    trace_id,
                ));
            }
        }
    };

    let stdout_bytes = stdout_handle.join().unwrap_or_default();
    let stderr_bytes = stderr_handle.join().unwrap_or_default();

    Ok(CommandOutput {
        stdout: String::from_utf8_lossy(&stdout_bytes).to_string(),
        stderr: String::from_utf8_lossy(&stderr_bytes).to_string(),
        exit_code,
    })
}

/// Runs a mapped command line and logs the outcome. This is a logging sink:
/// output is never returned to the voice-command caller.
pub fn execute_line(line: &str, trace_id: &str) -> Result<(), AppError> {
    let mut tokens = tokenize(line, trace_id)?;
    let program = tokens.remove(0);
    let args = tokens;
    let output = run_command(&program, &args, trace_id)?;
    if output.exit_code == Some(0) {
        info!(
            trace_id = %trace_id,
            command = %line,
            stdout = %output.stdout.trim(),
            "Command completed"
        );
    } else {
        warn!(
            trace_id = %trace_id,
            command = %line,
            exit_code = ?output.exit_code,
            stderr = %output.stderr.trim(),
            "Command failed"
        );
    }
    Ok(())
}
