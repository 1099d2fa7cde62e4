use std::path::Path;

/// Helper binaries the assistant shells out to during startup.
pub const STARTUP_TOOLS: [&str; 4] = ["am", "df", "ping", "termux-battery-status"];

pub fn normalize_command_path(value: &str) -> String {
    let trimmed = value.trim();
    if let Some(inner) = trimmed
        .strip_prefix('"')
        .and_then(|candidate| candidate.strip_suffix('"'))
    {
        return inner.trim().to_string();
    }
    if let Some(inner) = trimmed
        .strip_prefix('\'')
        .and_then(|candidate| candidate.strip_suffix('\''))
    {
        return inner.trim().to_string();
    }
    trimmed.to_string()
}

/// Resolves a helper binary against the configured toolbox directory; an
/// empty directory means a plain $PATH lookup by name.
pub fn resolve_tool(toolbox_dir: &str, name: &str) -> String {
    let normalized = normalize_command_path(toolbox_dir);
    if normalized.is_empty() {
        name.to_string()
    } else {
        Path::new(&normalized).join(name).to_string_lossy().to_string()
    }
}

pub fn validate_tool(program: &str) -> Result<(), String> {
    if program.trim().is_empty() {
        return Err("Tool command is empty".to_string());
    }
    let path = Path::new(program);
    if path.components().count() == 1 {
        // Bare name, left to $PATH resolution at spawn time.
        return Ok(());
    }
    if path.is_dir() {
        return Err("Tool path must point to an executable file".to_string());
    }
    if !path.exists() {
        return Err("Tool executable not found at the configured path".to_string());
    }
    Ok(())
}
