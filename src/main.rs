use std::io::BufRead;
use std::path::PathBuf;

use tracing::{error, info, warn};
use uuid::Uuid;

use droidkeeper::app::assistant::Assistant;
use droidkeeper::app::config::{config_path, load_or_init};
use droidkeeper::app::logging::{default_log_path, init_logging};

#[derive(Debug, Clone)]
struct Args {
    config: Option<PathBuf>,
    log_file: Option<PathBuf>,
    no_log_file: bool,
}

fn parse_args() -> Result<Args, String> {
    let mut config: Option<PathBuf> = None;
    let mut log_file: Option<PathBuf> = None;
    let mut no_log_file = false;

    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--config" => {
                let value = it
                    .next()
                    .ok_or_else(|| "--config requires a value".to_string())?;
                config = Some(PathBuf::from(value));
            }
            "--log-file" => {
                let value = it
                    .next()
                    .ok_or_else(|| "--log-file requires a value".to_string())?;
                log_file = Some(PathBuf::from(value));
            }
            "--no-log-file" => {
                no_log_file = true;
            }
            "-h" | "--help" => {
                return Err(
                    "Usage: droidkeeper [--config PATH] [--log-file PATH] [--no-log-file]\n\
                     Reads voice commands from stdin; 'quit' or EOF shuts down.\n"
                        .to_string(),
                );
            }
            other => return Err(format!("Unknown arg: {other}")),
        }
    }

    Ok(Args {
        config,
        log_file,
        no_log_file,
    })
}

fn main() {
    let args = match parse_args() {
        Ok(v) => v,
        Err(msg) => {
            eprintln!("{msg}");
            std::process::exit(2);
        }
    };

    let log_path = if args.no_log_file {
        None
    } else {
        Some(args.log_file.unwrap_or_else(default_log_path))
    };
    init_logging(log_path.as_deref());

    let trace_id = Uuid::new_v4().to_string();
    let config_file = args.config.unwrap_or_else(config_path);
    let config = match load_or_init(&config_file, &trace_id) {
        Ok(config) => config,
        Err(err) => {
            error!(trace_id = %trace_id, error = %err, "Failed to initialize config");
            std::process::exit(1);
        }
    };

    let assistant = Assistant::new(config, config_file);
    if let Err(err) = assistant.start(&trace_id) {
        error!(trace_id = %trace_id, error = %err, "Failed to start assistant");
        std::process::exit(1);
    }

    info!(trace_id = %trace_id, "Listening for voice commands on stdin ('quit' to exit)");
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(_) => break,
        };
        let phrase = line.trim();
        if phrase.is_empty() {
            continue;
        }
        if phrase == "quit" || phrase == "exit" {
            break;
        }
        let command_trace = Uuid::new_v4().to_string();
        if let Err(err) = assistant.handle_voice_command(phrase, &command_trace) {
            warn!(trace_id = %command_trace, error = %err, "Voice command rejected");
        }
    }

    let shutdown_trace = Uuid::new_v4().to_string();
    if let Err(err) = assistant.shutdown(&shutdown_trace) {
        // Component failures never change the exit code; the log line is the
        // externally observable failure mode.
        warn!(trace_id = %shutdown_trace, error = %err, "Shutdown reported an error");
    }
}
