//! Touch and key one-shots. Pure command formatting over the executor; the
//! exit status travels back as data for the caller to branch on.

use std::time::Duration;

use crate::adb::command::{self, Target};
use crate::adb::runner::{CommandOutput, Executor};
use crate::error::{resolve_trace_id, AdbError};

pub fn tap(
    exec: &dyn Executor,
    target: &Target,
    x: i32,
    y: i32,
    trace_id: Option<String>,
) -> Result<CommandOutput, AdbError> {
    let trace_id = resolve_trace_id(trace_id);
    let args = command::build_shell(
        target,
        &command::args(&["input", "tap", &x.to_string(), &y.to_string()]),
    );
    exec.run(&args, &trace_id)
}

#[allow(clippy::too_many_arguments)]
pub fn swipe(
    exec: &dyn Executor,
    target: &Target,
    x1: i32,
    y1: i32,
    x2: i32,
    y2: i32,
    duration_ms: u32,
    trace_id: Option<String>,
) -> Result<CommandOutput, AdbError> {
    let trace_id = resolve_trace_id(trace_id);
    let args = command::build_shell(
        target,
        &command::args(&[
            "input",
            "swipe",
            &x1.to_string(),
            &y1.to_string(),
            &x2.to_string(),
            &y2.to_string(),
            &duration_ms.to_string(),
        ]),
    );
    exec.run(&args, &trace_id)
}

pub fn input_text(
    exec: &dyn Executor,
    target: &Target,
    text: &str,
    trace_id: Option<String>,
) -> Result<CommandOutput, AdbError> {
    let trace_id = resolve_trace_id(trace_id);
    let args = command::build_shell(target, &command::args(&["input", "text", text]));
    exec.run(&args, &trace_id)
}

pub fn key_event(
    exec: &dyn Executor,
    target: &Target,
    keycode: i32,
    trace_id: Option<String>,
) -> Result<CommandOutput, AdbError> {
    let trace_id = resolve_trace_id(trace_id);
    let args = command::build_shell(
        target,
        &command::args(&["input", "keyevent", &keycode.to_string()]),
    );
    exec.run(&args, &trace_id)
}

/// Tap the same point repeatedly with a fixed delay between taps. Stops at
/// the first failed invocation.
pub fn repeat_tap(
    exec: &dyn Executor,
    target: &Target,
    x: i32,
    y: i32,
    times: u32,
    delay: Duration,
    trace_id: Option<String>,
) -> Result<u32, AdbError> {
    let trace_id = resolve_trace_id(trace_id);
    let mut performed = 0;
    for index in 0..times {
        let output = tap(exec, target, x, y, Some(trace_id.clone()))?;
        if !output.success() {
            break;
        }
        performed += 1;
        if index + 1 < times {
            std::thread::sleep(delay);
        }
    }
    Ok(performed)
}
