use std::path::Path;

use tracing::debug;

use crate::adb::command::{self, Target};
use crate::adb::paths::validate_device_path;
use crate::adb::runner::{CommandOutput, Executor};
use crate::error::{resolve_trace_id, AdbError};

/// Transfer direction is an explicit choice, never inferred from paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Host file to device path.
    Push,
    /// Device path to host file.
    Pull,
}

/// Copy one file across the bridge. A missing remote object (for pulls) or a
/// missing host file (for pushes) surfaces as `ERR_TRANSFER` with the raw
/// bridge text preserved.
pub fn transfer_file(
    exec: &dyn Executor,
    target: &Target,
    direction: Direction,
    remote_path: &str,
    local_path: &Path,
    trace_id: Option<String>,
) -> Result<CommandOutput, AdbError> {
    let trace_id = resolve_trace_id(trace_id);
    validate_device_path(remote_path).map_err(|reason| AdbError::validation(reason, &trace_id))?;
    let local = local_path.to_string_lossy().to_string();

    let argv = match direction {
        Direction::Pull => command::build("pull", target, &[remote_path.to_string(), local.clone()]),
        Direction::Push => {
            if !local_path.exists() {
                return Err(AdbError::transfer(
                    format!("local file not found: {local}"),
                    &trace_id,
                ));
            }
            command::build("push", target, &[local.clone(), remote_path.to_string()])
        }
    };

    debug!(trace_id = %trace_id, direction = ?direction, remote = %remote_path, local = %local, "transferring file");
    let output = exec.run(&argv, &trace_id)?;
    if !output.success() {
        let detail = output.stderr_text();
        let detail = detail.trim();
        let detail = if detail.is_empty() {
            output.stdout_text().trim().to_string()
        } else {
            detail.to_string()
        };
        return Err(AdbError::transfer(
            format!("{direction:?} of {remote_path} failed: {detail}"),
            &trace_id,
        ));
    }
    if direction == Direction::Pull && !local_path.exists() {
        return Err(AdbError::transfer(
            format!("pull reported success but {local} was not written"),
            &trace_id,
        ));
    }
    Ok(output)
}
