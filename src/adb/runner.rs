use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Config;
use crate::error::AdbError;

/// Byte encoding applied when captured output is viewed as text. Device
/// property and UI text output is not guaranteed to be valid UTF-8.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutputEncoding {
    Utf8,
    #[default]
    Latin1,
}

impl OutputEncoding {
    /// Best-effort decode; never fails. UTF-8 uses replacement characters,
    /// Latin-1 maps every byte to the matching code point.
    pub fn decode(self, bytes: &[u8]) -> String {
        match self {
            OutputEncoding::Utf8 => String::from_utf8_lossy(bytes).to_string(),
            OutputEncoding::Latin1 => bytes.iter().map(|&b| b as char).collect(),
        }
    }
}

/// Fully captured result of one synchronous bridge invocation. Immutable once
/// produced; a non-zero exit code is data, not an error.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit_code: Option<i32>,
    encoding: OutputEncoding,
}

impl CommandOutput {
    pub fn new(
        stdout: Vec<u8>,
        stderr: Vec<u8>,
        exit_code: Option<i32>,
        encoding: OutputEncoding,
    ) -> Self {
        Self {
            stdout,
            stderr,
            exit_code,
            encoding,
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    pub fn stdout_text(&self) -> String {
        self.encoding.decode(&self.stdout)
    }

    pub fn stderr_text(&self) -> String {
        self.encoding.decode(&self.stderr)
    }
}

pub(crate) fn drain_on_thread<R: Read + Send + 'static>(mut reader: R) -> JoinHandle<Vec<u8>> {
    std::thread::spawn(move || {
        let mut buffer = Vec::<u8>::new();
        let mut temp = [0u8; 4096];
        loop {
            match reader.read(&mut temp) {
                Ok(0) => break,
                Ok(count) => buffer.extend_from_slice(&temp[..count]),
                Err(_) => break,
            }
        }
        buffer
    })
}

/// Run a command to completion, capturing stdout and stderr fully in memory.
/// Blocks the caller for the process's whole lifetime; no timeout is imposed.
/// Fails only when the process cannot be launched at all. Unsuitable for
/// unbounded outputs; the streaming pipeline spawns its own children.
pub fn run_command(
    program: &str,
    args: &[String],
    encoding: OutputEncoding,
    trace_id: &str,
) -> Result<CommandOutput, AdbError> {
    debug!(trace_id = %trace_id, program = %program, args = ?args, "running command");

    let mut child = Command::new(program)
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|err| AdbError::launch(format!("Failed to spawn {program}: {err}"), trace_id))?;

    // Drain stdout/stderr in parallel; otherwise a chatty child can block
    // once the pipe buffer fills and never reach exit.
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| AdbError::system("Failed to capture stdout", trace_id))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| AdbError::system("Failed to capture stderr", trace_id))?;
    let stdout_handle = drain_on_thread(stdout);
    let stderr_handle = drain_on_thread(stderr);

    let status = child
        .wait()
        .map_err(|err| AdbError::system(format!("Failed to wait for {program}: {err}"), trace_id))?;

    let stdout_bytes = stdout_handle.join().unwrap_or_default();
    let stderr_bytes = stderr_handle.join().unwrap_or_default();

    Ok(CommandOutput::new(
        stdout_bytes,
        stderr_bytes,
        status.code(),
        encoding,
    ))
}

/// Variant that kills the child once `timeout` elapses. Opt-in; the plain
/// `run_command` waits indefinitely.
pub fn run_command_with_timeout(
    program: &str,
    args: &[String],
    encoding: OutputEncoding,
    timeout: Duration,
    trace_id: &str,
) -> Result<CommandOutput, AdbError> {
    let mut child = Command::new(program)
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|err| AdbError::launch(format!("Failed to spawn {program}: {err}"), trace_id))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| AdbError::system("Failed to capture stdout", trace_id))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| AdbError::system("Failed to capture stderr", trace_id))?;
    let stdout_handle = drain_on_thread(stdout);
    let stderr_handle = drain_on_thread(stderr);

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
                    return Err(AdbError::system("Command timed out", trace_id));
                }
                std::thread::sleep(Duration::from_millis(50));
            }
            Err(err) => {
                let _ = stdout_handle.join();
                let _ = stderr_handle.join();
                return Err(AdbError::system(
                    format!("Failed to poll command: {err}"),
                    trace_id,
                ));
            }
        }
    };

    let stdout_bytes = stdout_handle.join().unwrap_or_default();
    let stderr_bytes = stderr_handle.join().unwrap_or_default();

    Ok(CommandOutput::new(
        stdout_bytes,
        stderr_bytes,
        exit_code,
        encoding,
    ))
}

/// Spawn a long-lived child with caller-controlled stdio wiring. Used by the
/// mirroring pipeline to connect capture stdout to renderer stdin.
pub fn spawn_streaming(
    program: &str,
    args: &[String],
    stdin: Stdio,
    stdout: Stdio,
    stderr: Stdio,
    trace_id: &str,
) -> Result<Child, AdbError> {
    debug!(trace_id = %trace_id, program = %program, args = ?args, "spawning streaming child");
    Command::new(program)
        .args(args)
        .stdin(stdin)
        .stdout(stdout)
        .stderr(stderr)
        .spawn()
        .map_err(|err| AdbError::launch(format!("Failed to spawn {program}: {err}"), trace_id))
}

/// The single I/O boundary higher components call through. Production code
/// uses `AdbBridge`; tests substitute a scripted implementation.
pub trait Executor {
    fn run(&self, args: &[String], trace_id: &str) -> Result<CommandOutput, AdbError>;

    fn encoding(&self) -> OutputEncoding {
        OutputEncoding::default()
    }
}

/// Synchronous executor bound to one adb binary and one output encoding.
#[derive(Debug, Clone)]
pub struct AdbBridge {
    program: String,
    encoding: OutputEncoding,
}

impl AdbBridge {
    pub fn new(program: impl Into<String>, encoding: OutputEncoding) -> Self {
        Self {
            program: program.into(),
            encoding,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            crate::adb::locator::resolve_program(&config.bridge.adb_path, "adb"),
            config.bridge.output_encoding,
        )
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl Default for AdbBridge {
    fn default() -> Self {
        Self::new("adb", OutputEncoding::default())
    }
}

impl Executor for AdbBridge {
    fn run(&self, args: &[String], trace_id: &str) -> Result<CommandOutput, AdbError> {
        run_command(&self.program, args, self.encoding, trace_id)
    }

    fn encoding(&self) -> OutputEncoding {
        self.encoding
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> (String, Vec<String>) {
        (
            "sh".to_string(),
            vec!["-c".to_string(), script.to_string()],
        )
    }

    #[test]
    fn non_zero_exit_is_data_not_error() {
        let (program, args) = sh("echo boom >&2; exit 3");
        let output = run_command(&program, &args, OutputEncoding::Utf8, "test-trace")
            .expect("non-zero exits must not raise");
        assert_eq!(output.exit_code, Some(3));
        assert!(!output.success());
        assert!(output.stderr_text().contains("boom"));
    }

    #[test]
    fn missing_binary_is_launch_failure() {
        let err = run_command(
            "/this/binary/should/not/exist",
            &[],
            OutputEncoding::Utf8,
            "test-trace",
        )
        .expect_err("spawn must fail");
        assert_eq!(err.code, "ERR_LAUNCH");
    }

    #[test]
    fn latin1_decoding_never_fails() {
        let bytes = vec![0x4f, 0x4b, 0x20, 0xe9, 0xff];
        let decoded = OutputEncoding::Latin1.decode(&bytes);
        assert_eq!(decoded, "OK \u{e9}\u{ff}");

        // The same bytes are invalid UTF-8; lossy decode degrades instead of
        // raising.
        let lossy = OutputEncoding::Utf8.decode(&bytes);
        assert!(lossy.starts_with("OK "));
    }

    #[test]
    fn run_command_with_timeout_does_not_deadlock_on_large_stdout() {
        // If stdout/stderr are piped but not drained, the child blocks once
        // the pipe buffer fills and an otherwise-fast command "hangs" until
        // the timeout.
        let (program, args) =
            sh("i=0; while [ $i -lt 100000 ]; do echo 1234567890; i=$((i+1)); done");
        let output = run_command_with_timeout(
            &program,
            &args,
            OutputEncoding::Utf8,
            Duration::from_secs(10),
            "test-trace-large-output",
        )
        .expect("large-output command should finish without timing out");
        assert_eq!(output.exit_code, Some(0));
        assert!(output.stdout.len() >= 1_000_000);
    }

    #[test]
    fn timeout_kills_hung_child() {
        let (program, args) = sh("sleep 30");
        let err = run_command_with_timeout(
            &program,
            &args,
            OutputEncoding::Utf8,
            Duration::from_millis(200),
            "test-trace",
        )
        .expect_err("should time out");
        assert_eq!(err.code, "ERR_SYSTEM");
    }
}
