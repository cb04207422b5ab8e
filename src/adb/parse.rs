//! Parsers for the bridge's line-oriented text output. The protocol is text,
//! not structured; keep every phrase/shape assumption in this module so a
//! future adb output change touches only one place.

use std::collections::HashMap;

use crate::models::{DeviceDetail, DeviceFileEntry, DeviceSummary};

pub fn parse_adb_devices(output: &str) -> Vec<DeviceSummary> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter(|line| !line.trim_start().starts_with('*'))
        .filter(|line| !line.to_lowercase().contains("list of devices"))
        .filter_map(|line| {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.len() < 2 {
                return None;
            }
            let mut summary = DeviceSummary {
                serial: tokens[0].to_string(),
                state: tokens[1].to_string(),
                model: None,
                product: None,
                device: None,
                transport_id: None,
            };
            for token in tokens.iter().skip(2) {
                if let Some(value) = token.strip_prefix("model:") {
                    summary.model = Some(value.to_string());
                } else if let Some(value) = token.strip_prefix("product:") {
                    summary.product = Some(value.to_string());
                } else if let Some(value) = token.strip_prefix("device:") {
                    summary.device = Some(value.to_string());
                } else if let Some(value) = token.strip_prefix("transport_id:") {
                    summary.transport_id = Some(value.to_string());
                }
            }
            Some(summary)
        })
        .collect()
}

/// `getprop` lines look like `[ro.product.model]: [Pixel 7]`.
pub fn parse_getprop_map(output: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for line in output.lines() {
        let trimmed = line.trim();
        if !trimmed.starts_with('[') {
            continue;
        }
        let Some((key_part, value_part)) = trimmed.split_once("]: [") else {
            continue;
        };
        let key = key_part.trim_start_matches('[').trim();
        let value = value_part.trim_end_matches(']').trim();
        if !key.is_empty() {
            map.insert(key.to_string(), value.to_string());
        }
    }
    map
}

pub fn build_device_detail(serial: &str, props: &HashMap<String, String>) -> DeviceDetail {
    DeviceDetail {
        serial: serial.to_string(),
        brand: props.get("ro.product.manufacturer").cloned(),
        model: props.get("ro.product.model").cloned(),
        device: props.get("ro.product.device").cloned(),
        android_version: props.get("ro.build.version.release").cloned(),
        api_level: props.get("ro.build.version.sdk").cloned(),
        build_fingerprint: props.get("ro.build.fingerprint").cloned(),
    }
}

pub fn parse_ls_la(path: &str, output: &str) -> Vec<DeviceFileEntry> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter(|line| !line.trim_start().starts_with("total"))
        .filter_map(|line| {
            let tokens: Vec<&str> = line.trim().split_whitespace().collect();
            if tokens.len() < 8 {
                return None;
            }
            let is_dir = tokens[0].starts_with('d');
            let size_bytes = tokens.get(4).and_then(|value| value.parse::<u64>().ok());
            let (modified_at, name_start) = if tokens.len() >= 9 {
                (format!("{} {} {}", tokens[5], tokens[6], tokens[7]), 8usize)
            } else {
                (format!("{} {}", tokens[5], tokens[6]), 7usize)
            };
            let modified_at = Some(modified_at).filter(|value| !value.trim().is_empty());
            let name = if tokens.len() > name_start {
                tokens[name_start..].join(" ")
            } else {
                String::new()
            };
            if name.is_empty() || name == "." || name == ".." {
                return None;
            }
            Some(DeviceFileEntry {
                path: format!("{}/{}", path.trim_end_matches('/'), name),
                name,
                is_dir,
                size_bytes,
                modified_at,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_adb_devices_output() {
        let output = "List of devices attached\n0123456789ABCDEF device product:sdk_gphone64_arm64 model:Pixel_7 device:emu64a transport_id:1\nemulator-5554 unauthorized transport_id:2\n";
        let parsed = parse_adb_devices(output);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].serial, "0123456789ABCDEF");
        assert!(parsed[0].is_online());
        assert_eq!(parsed[0].model.as_deref(), Some("Pixel_7"));
        assert_eq!(parsed[1].state, "unauthorized");
        assert!(!parsed[1].is_online());
    }

    #[test]
    fn ignores_daemon_banner_lines() {
        let output = "* daemon not running; starting now at tcp:5037\n* daemon started successfully\nList of devices attached\n";
        assert!(parse_adb_devices(output).is_empty());
    }

    #[test]
    fn builds_device_detail_from_getprop() {
        let output = "[ro.product.manufacturer]: [Google]\n[ro.product.model]: [Pixel 7]\n[ro.build.version.sdk]: [34]\n[ro.build.fingerprint]: [google/panther/panther:14]\n";
        let detail = build_device_detail("ABC", &parse_getprop_map(output));
        assert_eq!(detail.serial, "ABC");
        assert_eq!(detail.brand.as_deref(), Some("Google"));
        assert_eq!(detail.model.as_deref(), Some("Pixel 7"));
        assert_eq!(detail.api_level.as_deref(), Some("34"));
        assert_eq!(
            detail.build_fingerprint.as_deref(),
            Some("google/panther/panther:14")
        );
    }

    #[test]
    fn parses_ls_la_listing() {
        let output = "total 16\ndrwxr-xr-x 2 root root 4096 2024-01-01 12:00 Download\n-rw-r--r-- 1 root root 123 2024-01-01 12:00 file.txt\n";
        let entries = parse_ls_la("/sdcard", output);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "Download");
        assert!(entries[0].is_dir);
        assert_eq!(entries[1].path, "/sdcard/file.txt");
        assert_eq!(entries[1].size_bytes, Some(123));
    }
}
