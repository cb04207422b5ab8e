//! Device targeting and session bookkeeping: network connect/disconnect,
//! attached-device listing, default-target resolution.
//!
//! Success and failure for connect/disconnect are inferred from substring
//! matching on decoded bridge output. That is inherently fragile, so the
//! phrase knowledge lives only in the `interpret_*` functions below.

use tracing::{info, warn};

use crate::adb::command::{self, Target};
use crate::adb::parse::{build_device_detail, parse_adb_devices, parse_getprop_map};
use crate::adb::runner::{CommandOutput, Executor};
use crate::error::{resolve_trace_id, AdbError};
use crate::models::{DeviceDetail, DeviceSummary, OpReport};

pub struct Transport<'a> {
    exec: &'a dyn Executor,
    default_port: u16,
}

impl<'a> Transport<'a> {
    pub fn new(exec: &'a dyn Executor, default_port: u16) -> Self {
        Self { exec, default_port }
    }

    /// Connect to a device over the network. Reconnecting an
    /// already-connected device is a success.
    pub fn connect(
        &self,
        host: &str,
        port: Option<u16>,
        trace_id: Option<String>,
    ) -> Result<OpReport, AdbError> {
        let trace_id = resolve_trace_id(trace_id);
        let address = format!("{host}:{}", port.unwrap_or(self.default_port));
        let args = command::args(&["connect", &address]);
        let output = self.exec.run(&args, &trace_id)?;
        let report = match interpret_connect_output(&address, &output) {
            Ok(message) => OpReport::success(message, &trace_id),
            Err(raw) => {
                warn!(trace_id = %trace_id, address = %address, detail = %raw, "connect failed");
                OpReport::error(raw, &trace_id)
            }
        };
        Ok(report)
    }

    /// Disconnect one network device, or every connected one when `host` is
    /// absent. Disconnecting a device that is already gone is a success.
    pub fn disconnect(
        &self,
        host: Option<&str>,
        port: Option<u16>,
        trace_id: Option<String>,
    ) -> Result<OpReport, AdbError> {
        let trace_id = resolve_trace_id(trace_id);
        let address = host.map(|host| format!("{host}:{}", port.unwrap_or(self.default_port)));
        let mut args = command::args(&["disconnect"]);
        if let Some(address) = address.as_deref() {
            args.push(address.to_string());
        }
        let output = self.exec.run(&args, &trace_id)?;
        let report = match interpret_disconnect_output(address.as_deref(), &output) {
            Ok(message) => OpReport::success(message, &trace_id),
            Err(raw) => OpReport::error(raw, &trace_id),
        };
        Ok(report)
    }

    pub fn list_devices(&self, trace_id: Option<String>) -> Result<Vec<DeviceSummary>, AdbError> {
        let trace_id = resolve_trace_id(trace_id);
        let output = self.exec.run(&command::args(&["devices", "-l"]), &trace_id)?;
        if !output.success() {
            return Err(AdbError::system(
                format!("adb devices failed: {}", output.stderr_text().trim()),
                &trace_id,
            ));
        }
        Ok(parse_adb_devices(&output.stdout_text()))
    }

    /// Resolve the implicit target to a concrete serial. Exactly one online
    /// device resolves; several without an explicit serial is an ambiguity
    /// the caller must break, not something to resolve silently.
    pub fn resolve_target(&self, trace_id: Option<String>) -> Result<Target, AdbError> {
        let trace_id = resolve_trace_id(trace_id);
        let online: Vec<DeviceSummary> = self
            .list_devices(Some(trace_id.clone()))?
            .into_iter()
            .filter(DeviceSummary::is_online)
            .collect();
        match online.len() {
            0 => Err(AdbError::system("no devices attached", &trace_id)),
            1 => Ok(Target::serial(online[0].serial.clone())),
            _ => {
                let serials: Vec<&str> =
                    online.iter().map(|device| device.serial.as_str()).collect();
                Err(AdbError::ambiguous_target(
                    format!(
                        "multiple devices attached ({}); supply a serial",
                        serials.join(", ")
                    ),
                    &trace_id,
                ))
            }
        }
    }

    /// Key system properties for one device, from `getprop`.
    pub fn device_detail(
        &self,
        target: &Target,
        trace_id: Option<String>,
    ) -> Result<DeviceDetail, AdbError> {
        let trace_id = resolve_trace_id(trace_id);
        let args = command::build_shell(target, &command::args(&["getprop"]));
        let output = self.exec.run(&args, &trace_id)?;
        if !output.success() {
            return Err(AdbError::system(
                format!("getprop failed: {}", output.stderr_text().trim()),
                &trace_id,
            ));
        }
        let serial = target.serial.as_deref().unwrap_or_default();
        Ok(build_device_detail(
            serial,
            &parse_getprop_map(&output.stdout_text()),
        ))
    }

    pub fn start_server(&self, trace_id: Option<String>) -> Result<CommandOutput, AdbError> {
        let trace_id = resolve_trace_id(trace_id);
        info!(trace_id = %trace_id, "starting adb server");
        self.exec.run(&command::args(&["start-server"]), &trace_id)
    }

    pub fn kill_server(&self, trace_id: Option<String>) -> Result<CommandOutput, AdbError> {
        let trace_id = resolve_trace_id(trace_id);
        info!(trace_id = %trace_id, "killing adb server");
        self.exec.run(&command::args(&["kill-server"]), &trace_id)
    }
}

fn combined_text(output: &CommandOutput) -> String {
    format!("{}{}", output.stdout_text(), output.stderr_text())
}

/// Success iff the bridge reports `connected to <address>` (which also covers
/// `already connected to <address>`). Anything else is an error whose raw
/// text is preserved for the caller.
pub fn interpret_connect_output(address: &str, output: &CommandOutput) -> Result<String, String> {
    let combined = combined_text(output);
    let lower = combined.to_lowercase();
    if lower.contains(&format!("connected to {}", address.to_lowercase())) {
        return Ok(format!("Connected to {address}"));
    }
    let raw = combined.trim().to_string();
    if raw.is_empty() {
        Err(format!("unable to connect to {address}"))
    } else {
        Err(raw)
    }
}

/// Disconnect is idempotent from the caller's perspective: `no such device`
/// means the device was already gone and counts as success.
pub fn interpret_disconnect_output(
    address: Option<&str>,
    output: &CommandOutput,
) -> Result<String, String> {
    let combined = combined_text(output);
    let lower = combined.to_lowercase();
    let message = match address {
        Some(address) => format!("Disconnected from {address}"),
        None => "Disconnected".to_string(),
    };
    if lower.contains("no such device") {
        return Ok(message);
    }
    if output.success() || lower.contains("disconnected") {
        return Ok(message);
    }
    let raw = combined.trim().to_string();
    if raw.is_empty() {
        Err("disconnect failed".to_string())
    } else {
        Err(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adb::runner::OutputEncoding;

    fn output(stdout: &str, stderr: &str, exit_code: i32) -> CommandOutput {
        CommandOutput::new(
            stdout.as_bytes().to_vec(),
            stderr.as_bytes().to_vec(),
            Some(exit_code),
            OutputEncoding::Utf8,
        )
    }

    struct ScriptedExecutor {
        devices_output: String,
    }

    impl Executor for ScriptedExecutor {
        fn run(&self, args: &[String], _trace_id: &str) -> Result<CommandOutput, AdbError> {
            assert_eq!(args[0], "devices");
            Ok(output(&self.devices_output, "", 0))
        }
    }

    #[test]
    fn connect_phrase_yields_success() {
        let result = interpret_connect_output(
            "10.0.0.5:5555",
            &output("connected to 10.0.0.5:5555\n", "", 0),
        );
        assert_eq!(result, Ok("Connected to 10.0.0.5:5555".to_string()));
    }

    #[test]
    fn already_connected_is_success() {
        let result = interpret_connect_output(
            "10.0.0.5:5555",
            &output("already connected to 10.0.0.5:5555\n", "", 0),
        );
        assert!(result.is_ok());
    }

    #[test]
    fn unexpected_connect_output_preserves_raw_text() {
        let raw = "unable to connect to 10.0.0.5:5555: Connection refused";
        let result = interpret_connect_output("10.0.0.5:5555", &output(raw, "", 1));
        assert_eq!(result, Err(raw.to_string()));
    }

    #[test]
    fn disconnect_missing_device_is_idempotent_success() {
        let result = interpret_disconnect_output(
            Some("10.0.0.5:5555"),
            &output("", "error: no such device '10.0.0.5:5555'\n", 1),
        );
        assert_eq!(result, Ok("Disconnected from 10.0.0.5:5555".to_string()));
    }

    #[test]
    fn disconnect_all_reports_plain_message() {
        let result = interpret_disconnect_output(None, &output("disconnected everything\n", "", 0));
        assert_eq!(result, Ok("Disconnected".to_string()));
    }

    #[test]
    fn resolve_target_picks_sole_online_device() {
        let exec = ScriptedExecutor {
            devices_output: "List of devices attached\nABC device model:Pixel_7\nDEF offline\n"
                .to_string(),
        };
        let transport = Transport::new(&exec, 5555);
        let target = transport.resolve_target(None).expect("resolved");
        assert_eq!(target.serial.as_deref(), Some("ABC"));
    }

    #[test]
    fn resolve_target_surfaces_ambiguity() {
        let exec = ScriptedExecutor {
            devices_output: "ABC device\nDEF device\n".to_string(),
        };
        let transport = Transport::new(&exec, 5555);
        let err = transport.resolve_target(None).expect_err("ambiguous");
        assert_eq!(err.code, "ERR_AMBIGUOUS_TARGET");
        assert!(err.error.contains("ABC"));
        assert!(err.error.contains("DEF"));
    }

    #[test]
    fn resolve_target_errors_with_no_devices() {
        let exec = ScriptedExecutor {
            devices_output: "List of devices attached\n".to_string(),
        };
        let transport = Transport::new(&exec, 5555);
        let err = transport.resolve_target(None).expect_err("empty");
        assert_eq!(err.code, "ERR_SYSTEM");
    }
}
