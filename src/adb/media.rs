use std::fs;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::adb::command::{self, Target};
use crate::adb::paths::sanitize_filename_component;
use crate::adb::runner::Executor;
use crate::adb::transfer::{transfer_file, Direction};
use crate::error::{resolve_trace_id, AdbError};
use crate::models::{DeviceFileEntry, OpReport};

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

fn artifact_name(prefix: &str, target: &Target, extension: &str) -> String {
    let serial = sanitize_filename_component(target.serial.as_deref().unwrap_or("default"));
    let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
    format!("{prefix}_{serial}_{timestamp}.{extension}")
}

fn unique_remote_path(prefix: &str, extension: &str) -> String {
    // Unique per invocation so concurrent captures against the same device
    // cannot clobber each other's temp file.
    format!("/sdcard/{prefix}_{}.{extension}", Uuid::new_v4().simple())
}

/// Grab the current screen as PNG bytes via `exec-out screencap`.
fn capture_png_bytes(
    exec: &dyn Executor,
    target: &Target,
    trace_id: &str,
) -> Result<Vec<u8>, AdbError> {
    let args = command::build("exec-out", target, &command::args(&["screencap", "-p"]));
    let output = exec.run(&args, trace_id)?;
    if !output.success() {
        return Err(AdbError::system(
            format!("screencap failed: {}", output.stderr_text().trim()),
            trace_id,
        ));
    }
    Ok(output.stdout)
}

/// Capture a screenshot into `output_dir`, returning the written path.
/// Prefers direct `exec-out` capture; falls back to the shell-capture,
/// pull, remove sequence when the direct path produces no usable PNG.
pub fn take_screenshot(
    exec: &dyn Executor,
    target: &Target,
    output_dir: &Path,
    trace_id: Option<String>,
) -> Result<PathBuf, AdbError> {
    let trace_id = resolve_trace_id(trace_id);
    fs::create_dir_all(output_dir)
        .map_err(|err| AdbError::system(format!("Failed to create output dir: {err}"), &trace_id))?;
    let output_path = output_dir.join(artifact_name("screenshot", target, "png"));

    match capture_png_bytes(exec, target, &trace_id) {
        Ok(bytes) if bytes.starts_with(PNG_SIGNATURE) => {
            fs::write(&output_path, &bytes).map_err(|err| {
                AdbError::system(format!("Failed to write screenshot: {err}"), &trace_id)
            })?;
            return Ok(output_path);
        }
        Ok(_) => {
            warn!(trace_id = %trace_id, "exec-out screencap returned non-PNG data; falling back to pull");
        }
        Err(err) => {
            warn!(trace_id = %trace_id, error = %err, "exec-out screencap failed; falling back to pull");
        }
    }

    let remote_path = unique_remote_path("screenshot", "png");
    let capture_args = command::build_shell(
        target,
        &command::args(&["screencap", "-p", &remote_path]),
    );
    let capture = exec.run(&capture_args, &trace_id)?;
    if !capture.success() {
        return Err(AdbError::system(
            format!("Fallback screencap failed: {}", capture.stderr_text().trim()),
            &trace_id,
        ));
    }
    let pulled = transfer_file(
        exec,
        target,
        Direction::Pull,
        &remote_path,
        &output_path,
        Some(trace_id.clone()),
    );
    // The device-side temp file must not leak, whatever the pull outcome.
    remove_remote(exec, target, &remote_path, false, Some(trace_id.clone()))?;
    pulled?;
    Ok(output_path)
}

/// Screenshot as a `data:image/png;base64,...` URL, for embedding without a
/// host file.
pub fn screenshot_data_url(
    exec: &dyn Executor,
    target: &Target,
    trace_id: Option<String>,
) -> Result<String, AdbError> {
    let trace_id = resolve_trace_id(trace_id);
    let bytes = capture_png_bytes(exec, target, &trace_id)?;
    png_bytes_to_data_url(&bytes).map_err(|reason| AdbError::system(reason, &trace_id))
}

pub fn png_bytes_to_data_url(bytes: &[u8]) -> Result<String, String> {
    if bytes.len() < PNG_SIGNATURE.len() {
        return Err("Screenshot data is empty".to_string());
    }
    if !bytes.starts_with(PNG_SIGNATURE) {
        return Err("Screenshot data is not a PNG".to_string());
    }
    Ok(format!("data:image/png;base64,{}", STANDARD.encode(bytes)))
}

/// Record the screen for `duration_secs` (device-side cap is 180s), pull the
/// clip into `output_dir`, and clean up the device-side temp file. Blocks
/// for the full recording duration.
pub fn record_screen(
    exec: &dyn Executor,
    target: &Target,
    output_dir: &Path,
    duration_secs: u32,
    trace_id: Option<String>,
) -> Result<PathBuf, AdbError> {
    let trace_id = resolve_trace_id(trace_id);
    fs::create_dir_all(output_dir)
        .map_err(|err| AdbError::system(format!("Failed to create output dir: {err}"), &trace_id))?;
    let output_path = output_dir.join(artifact_name("screenrecord", target, "mp4"));
    let remote_path = unique_remote_path("screenrecord", "mp4");

    let record_args = command::build_shell(
        target,
        &command::args(&[
            "screenrecord",
            "--time-limit",
            &duration_secs.to_string(),
            &remote_path,
        ]),
    );
    info!(trace_id = %trace_id, duration_secs, remote = %remote_path, "recording screen");
    let recorded = exec.run(&record_args, &trace_id)?;
    if !recorded.success() {
        return Err(AdbError::system(
            format!("screenrecord failed: {}", recorded.stderr_text().trim()),
            &trace_id,
        ));
    }
    let pulled = transfer_file(
        exec,
        target,
        Direction::Pull,
        &remote_path,
        &output_path,
        Some(trace_id.clone()),
    );
    remove_remote(exec, target, &remote_path, false, Some(trace_id.clone()))?;
    pulled?;
    Ok(output_path)
}

pub fn list_directory(
    exec: &dyn Executor,
    target: &Target,
    remote_dir: &str,
    trace_id: Option<String>,
) -> Result<Vec<DeviceFileEntry>, AdbError> {
    let trace_id = resolve_trace_id(trace_id);
    let args = command::build_shell(target, &command::args(&["ls", "-la", remote_dir]));
    let output = exec.run(&args, &trace_id)?;
    if !output.success() {
        return Err(AdbError::system(
            format!("ls failed: {}", output.stderr_text().trim()),
            &trace_id,
        ));
    }
    Ok(crate::adb::parse::parse_ls_la(
        remote_dir,
        &output.stdout_text(),
    ))
}

pub fn remove_remote(
    exec: &dyn Executor,
    target: &Target,
    remote_path: &str,
    recursive: bool,
    trace_id: Option<String>,
) -> Result<OpReport, AdbError> {
    let trace_id = resolve_trace_id(trace_id);
    let flag = if recursive { "-rf" } else { "-f" };
    let args = command::build_shell(target, &command::args(&["rm", flag, remote_path]));
    let output = exec.run(&args, &trace_id)?;
    if output.success() {
        Ok(OpReport::success(
            format!("Removed {remote_path}"),
            &trace_id,
        ))
    } else {
        Ok(OpReport::error(
            output.stderr_text().trim().to_string(),
            &trace_id,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn png_data_url_rejects_empty_and_non_png() {
        assert!(png_bytes_to_data_url(&[]).is_err());
        assert!(png_bytes_to_data_url(b"not a png").is_err());
    }

    #[test]
    fn png_data_url_encodes_png_prefix() {
        let bytes = b"\x89PNG\r\n\x1a\nfake";
        let url = png_bytes_to_data_url(bytes).expect("encode");
        assert!(url.starts_with("data:image/png;base64,"));
    }

    #[test]
    fn artifact_names_are_filesystem_safe() {
        let name = artifact_name("screenshot", &Target::network("10.0.0.5", 5555), "png");
        assert!(name.starts_with("screenshot_10.0.0.5_5555_"));
        assert!(name.ends_with(".png"));
        assert!(!name.contains(':'));
    }

    #[test]
    fn remote_temp_paths_are_unique() {
        let first = unique_remote_path("screenshot", "png");
        let second = unique_remote_path("screenshot", "png");
        assert_ne!(first, second);
        assert!(first.starts_with("/sdcard/screenshot_"));
    }
}
