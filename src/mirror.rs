//! Live screen mirroring: a device-side H.264 capture piped into a local
//! renderer window. Two children are wired stdout-to-stdin and supervised by
//! a polling loop; `start` blocks until the pipeline ends, a stop handle
//! flips a shared flag from another thread.

use std::process::{Child, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use crate::adb::command::{self, Target};
use crate::adb::runner::{drain_on_thread, spawn_streaming};
use crate::adb::locator::resolve_program;
use crate::config::{Config, MirrorConfig};
use crate::error::{resolve_trace_id, AdbError};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MirrorState {
    Idle,
    Running,
    Stopped,
    Failed,
}

/// Thread-safe handle that asks a running pipeline to shut down. Signalling
/// an already-finished pipeline is harmless.
#[derive(Debug, Clone)]
pub struct MirrorStop(Arc<AtomicBool>);

impl MirrorStop {
    pub fn signal(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

enum PipelineExit {
    /// Stop requested; both children were killed.
    Interrupted,
    /// The renderer exited on its own with this code and stderr.
    Completed(Option<i32>, String),
}

pub struct Mirror {
    bridge_program: String,
    settings: MirrorConfig,
    target: Target,
    state: MirrorState,
    stop_flag: Arc<AtomicBool>,
}

impl Mirror {
    pub fn new(bridge_program: impl Into<String>, target: Target, settings: MirrorConfig) -> Self {
        Self {
            bridge_program: bridge_program.into(),
            settings,
            target,
            state: MirrorState::Idle,
            stop_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn from_config(config: &Config, target: Target) -> Self {
        let mut settings = config.mirror.clone();
        settings.renderer_path = resolve_program(&settings.renderer_path, "ffmpeg");
        Self::new(
            resolve_program(&config.bridge.adb_path, "adb"),
            target,
            settings,
        )
    }

    pub fn state(&self) -> MirrorState {
        self.state
    }

    pub fn stop_handle(&self) -> MirrorStop {
        MirrorStop(Arc::clone(&self.stop_flag))
    }

    // Setters may be called in any state; a running pipeline keeps the
    // argv it was started with, the new values apply to the next start.

    pub fn set_resolution(&mut self, width: u32, height: u32) {
        self.settings.width = width;
        self.settings.height = height;
    }

    pub fn set_bit_rate(&mut self, bit_rate: u32) {
        self.settings.bit_rate = bit_rate;
    }

    pub fn set_buffer_size(&mut self, buffer_size: Option<u32>) {
        self.settings.buffer_size = buffer_size;
    }

    pub fn set_window_title(&mut self, title: impl Into<String>) {
        self.settings.window_title = title.into();
    }

    pub fn set_target(&mut self, target: Target) {
        self.target = target;
    }

    /// Run the capture-render pipeline until the renderer exits or the stop
    /// handle fires. Blocks the calling thread for the whole session.
    pub fn start(&mut self, trace_id: Option<String>) -> Result<MirrorState, AdbError> {
        let trace_id = resolve_trace_id(trace_id);
        self.stop_flag.store(false, Ordering::SeqCst);

        let capture_args = build_capture_args(&self.target, &self.settings);
        let renderer_args = build_renderer_args(&self.settings);
        info!(
            trace_id = %trace_id,
            capture = %command::render_command_line(&self.bridge_program, &capture_args),
            renderer = %command::render_command_line(&self.settings.renderer_path, &renderer_args),
            "starting mirror pipeline"
        );

        let mut capture = spawn_streaming(
            &self.bridge_program,
            &capture_args,
            Stdio::null(),
            Stdio::piped(),
            Stdio::null(),
            &trace_id,
        )
        .map_err(|err| {
            self.state = MirrorState::Failed;
            err
        })?;
        let capture_stdout = match capture.stdout.take() {
            Some(stdout) => stdout,
            None => {
                let _ = capture.kill();
                let _ = capture.wait();
                self.state = MirrorState::Failed;
                return Err(AdbError::stream("Failed to wire capture stdout", &trace_id));
            }
        };

        let renderer = spawn_streaming(
            &self.settings.renderer_path,
            &renderer_args,
            Stdio::from(capture_stdout),
            Stdio::null(),
            Stdio::piped(),
            &trace_id,
        );
        let mut renderer = match renderer {
            Ok(child) => child,
            Err(err) => {
                let _ = capture.kill();
                let _ = capture.wait();
                self.state = MirrorState::Failed;
                return Err(err);
            }
        };
        let renderer_stderr = renderer.stderr.take().map(drain_on_thread);

        self.state = MirrorState::Running;
        let exit = run_pipeline(&mut capture, &mut renderer, renderer_stderr, &self.stop_flag);
        match exit {
            PipelineExit::Interrupted => {
                info!(trace_id = %trace_id, "mirror pipeline stopped on request");
                self.state = MirrorState::Stopped;
                Ok(MirrorState::Stopped)
            }
            PipelineExit::Completed(Some(0), _) => {
                info!(trace_id = %trace_id, "mirror pipeline finished");
                self.state = MirrorState::Stopped;
                Ok(MirrorState::Stopped)
            }
            PipelineExit::Completed(code, stderr) => {
                warn!(trace_id = %trace_id, exit_code = ?code, "mirror pipeline failed");
                self.state = MirrorState::Failed;
                let detail = stderr.trim();
                let message = if detail.is_empty() {
                    format!("Renderer exited with code {code:?}")
                } else {
                    format!("Renderer exited with code {code:?}: {detail}")
                };
                Err(AdbError::stream(message, &trace_id))
            }
        }
    }
}

/// Device-side half: raw H.264 on the bridge's stdout.
fn build_capture_args(target: &Target, settings: &MirrorConfig) -> Vec<String> {
    command::build(
        "exec-out",
        target,
        &command::args(&[
            "screenrecord",
            "--size",
            &format!("{}x{}", settings.width, settings.height),
            &format!("--bit-rate={}", settings.bit_rate),
            "--output-format=h264",
            "-",
        ]),
    )
}

/// Host-side half: read the stream from stdin and render it in a window.
/// The buffer flag is omitted entirely when unset.
fn build_renderer_args(settings: &MirrorConfig) -> Vec<String> {
    let mut args = command::args(&["-loglevel", "error", "-i", "-"]);
    if let Some(buffer_size) = settings.buffer_size {
        args.push("-buffer_size".to_string());
        args.push(buffer_size.to_string());
    }
    args.push("-f".to_string());
    args.push("sdl".to_string());
    args.push(settings.window_title.clone());
    args
}

fn run_pipeline(
    capture: &mut Child,
    renderer: &mut Child,
    renderer_stderr: Option<JoinHandle<Vec<u8>>>,
    stop_flag: &AtomicBool,
) -> PipelineExit {
    let exit = loop {
        if stop_flag.load(Ordering::SeqCst) {
            let _ = renderer.kill();
            let _ = renderer.wait();
            break PipelineExit::Interrupted;
        }
        match renderer.try_wait() {
            Ok(Some(status)) => break PipelineExit::Completed(status.code(), String::new()),
            Ok(None) => std::thread::sleep(POLL_INTERVAL),
            Err(_) => {
                let _ = renderer.kill();
                let _ = renderer.wait();
                break PipelineExit::Interrupted;
            }
        }
    };
    // The capture child outlives the renderer when the window closes first;
    // reap it unconditionally.
    let _ = capture.kill();
    let _ = capture.wait();

    let stderr = renderer_stderr
        .and_then(|handle| handle.join().ok())
        .map(|bytes| String::from_utf8_lossy(&bytes).to_string())
        .unwrap_or_default();
    match exit {
        PipelineExit::Completed(code, _) => PipelineExit::Completed(code, stderr),
        interrupted => interrupted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spawn_pair(capture_script: &str, renderer_script: &str) -> (Child, Child) {
        let mut capture = spawn_streaming(
            "sh",
            &command::args(&["-c", capture_script]),
            Stdio::null(),
            Stdio::piped(),
            Stdio::null(),
            "test-trace",
        )
        .expect("spawn capture");
        let capture_stdout = capture.stdout.take().expect("capture stdout");
        let renderer = spawn_streaming(
            "sh",
            &command::args(&["-c", renderer_script]),
            Stdio::from(capture_stdout),
            Stdio::null(),
            Stdio::piped(),
            "test-trace",
        )
        .expect("spawn renderer");
        (capture, renderer)
    }

    fn run(capture_script: &str, renderer_script: &str, stop: &AtomicBool) -> PipelineExit {
        let (mut capture, mut renderer) = spawn_pair(capture_script, renderer_script);
        let stderr = renderer.stderr.take().map(drain_on_thread);
        run_pipeline(&mut capture, &mut renderer, stderr, stop)
    }

    #[test]
    fn pipeline_completes_when_renderer_drains_the_stream() {
        let stop = AtomicBool::new(false);
        let exit = run("printf 'frame-bytes'", "cat >/dev/null", &stop);
        match exit {
            PipelineExit::Completed(code, _) => assert_eq!(code, Some(0)),
            PipelineExit::Interrupted => panic!("expected completion"),
        }
    }

    #[test]
    fn pipeline_surfaces_renderer_failure_with_stderr() {
        let stop = AtomicBool::new(false);
        let exit = run(
            "printf 'frame-bytes'",
            "cat >/dev/null; echo render broke >&2; exit 2",
            &stop,
        );
        match exit {
            PipelineExit::Completed(code, stderr) => {
                assert_eq!(code, Some(2));
                assert!(stderr.contains("render broke"));
            }
            PipelineExit::Interrupted => panic!("expected failure exit"),
        }
    }

    #[test]
    fn stop_flag_interrupts_a_blocked_pipeline() {
        let stop = AtomicBool::new(true);
        let exit = run("sleep 30", "cat >/dev/null", &stop);
        assert!(matches!(exit, PipelineExit::Interrupted));
    }

    #[test]
    fn capture_args_scope_the_serial_before_the_subcommand() {
        let settings = MirrorConfig::default();
        let args = build_capture_args(&Target::serial("emulator-5554"), &settings);
        assert_eq!(
            args,
            vec![
                "-s",
                "emulator-5554",
                "exec-out",
                "screenrecord",
                "--size",
                "420x960",
                "--bit-rate=1000000",
                "--output-format=h264",
                "-",
            ]
        );
    }

    #[test]
    fn renderer_args_omit_the_buffer_flag_when_unset() {
        let mut settings = MirrorConfig::default();
        settings.buffer_size = Some(2048);
        let with_buffer = build_renderer_args(&settings);
        assert!(with_buffer.contains(&"-buffer_size".to_string()));
        assert!(with_buffer.contains(&"2048".to_string()));

        settings.buffer_size = None;
        let without_buffer = build_renderer_args(&settings);
        assert!(!without_buffer.contains(&"-buffer_size".to_string()));
        assert_eq!(without_buffer.last().map(String::as_str), Some("Android Screen"));
    }

    #[test]
    fn setters_apply_to_the_next_start_only() {
        let mut mirror = Mirror::new("adb", Target::any(), MirrorConfig::default());
        let before = build_capture_args(&mirror.target, &mirror.settings);

        mirror.set_resolution(1080, 2400);
        mirror.set_bit_rate(8_000_000);
        mirror.set_buffer_size(None);
        mirror.set_window_title("Pixel");

        // Argv built earlier is untouched; a fresh build sees the new values.
        assert!(before.contains(&"--size".to_string()));
        assert!(before.contains(&"420x960".to_string()));
        let after = build_capture_args(&mirror.target, &mirror.settings);
        assert!(after.contains(&"1080x2400".to_string()));
        assert!(after.contains(&"--bit-rate=8000000".to_string()));
        assert_eq!(mirror.state(), MirrorState::Idle);
    }
}
