pub fn validate_device_path(path: &str) -> Result<(), String> {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return Err("device path is required".to_string());
    }
    if !trimmed.starts_with('/') {
        return Err("device path must be absolute, starting with '/'".to_string());
    }
    if trimmed.contains('\0') {
        return Err("device path contains invalid characters".to_string());
    }
    if trimmed == "/" {
        return Err("device path must not be root".to_string());
    }
    for segment in trimmed.split('/') {
        if segment == ".." {
            return Err("device path must not contain '..' segments".to_string());
        }
    }
    Ok(())
}

/// Reduce a serial or similar identifier to something safe inside a host
/// filename.
pub fn sanitize_filename_component(value: &str) -> String {
    let cleaned: String = value
        .trim()
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' || ch == '.' {
                ch
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "device".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_device_path_requires_absolute() {
        assert!(validate_device_path("").is_err());
        assert!(validate_device_path("sdcard/file.txt").is_err());
        assert!(validate_device_path("/").is_err());
        assert!(validate_device_path("/sdcard/window_dump.xml").is_ok());
    }

    #[test]
    fn validate_device_path_blocks_dotdot() {
        assert!(validate_device_path("/sdcard/../etc/passwd").is_err());
        assert!(validate_device_path("/sdcard/..").is_err());
    }

    #[test]
    fn sanitizes_network_serials() {
        assert_eq!(sanitize_filename_component("10.0.0.5:5555"), "10.0.0.5_5555");
        assert_eq!(sanitize_filename_component("emulator-5554"), "emulator-5554");
        assert_eq!(sanitize_filename_component("  "), "device");
    }
}
