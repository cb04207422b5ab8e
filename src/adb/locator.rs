use std::path::Path;

pub fn normalize_command_path(value: &str) -> String {
    let trimmed = value.trim();
    for quote in ['"', '\''] {
        if let Some(inner) = trimmed
            .strip_prefix(quote)
            .and_then(|candidate| candidate.strip_suffix(quote))
        {
            return inner.trim().to_string();
        }
    }
    trimmed.to_string()
}

/// Resolve a configured executable path, falling back to a bare program name
/// left to PATH lookup.
pub fn resolve_program(configured: &str, fallback: &str) -> String {
    let normalized = normalize_command_path(configured);
    if normalized.is_empty() {
        fallback.to_string()
    } else {
        normalized
    }
}

/// Cheap pre-flight check for a configured absolute path. Bare program names
/// are accepted as-is; PATH resolution happens at spawn time.
pub fn validate_program(program: &str) -> Result<(), String> {
    if program.trim().is_empty() {
        return Err("program path is empty".to_string());
    }
    if !program.contains('/') && !program.contains('\\') {
        return Ok(());
    }
    let path = Path::new(program);
    if path.is_dir() {
        return Err(format!("{program} is a directory, not an executable"));
    }
    if !path.exists() {
        return Err(format!("executable not found at {program}"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_wrapping_quotes() {
        assert_eq!(
            normalize_command_path("  \"/opt/platform-tools/adb\"  "),
            "/opt/platform-tools/adb"
        );
        assert_eq!(normalize_command_path("'/usr/bin/ffmpeg'"), "/usr/bin/ffmpeg");
    }

    #[test]
    fn resolves_empty_to_fallback() {
        assert_eq!(resolve_program("", "adb"), "adb");
        assert_eq!(resolve_program("   ", "ffmpeg"), "ffmpeg");
        assert_eq!(resolve_program("/custom/adb", "adb"), "/custom/adb");
    }

    #[test]
    fn accepts_bare_names_and_rejects_missing_paths() {
        assert!(validate_program("adb").is_ok());
        assert!(validate_program("/this/path/should/not/exist/adb").is_err());
        assert!(validate_program("").is_err());
    }
}
