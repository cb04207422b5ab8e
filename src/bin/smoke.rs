//! Manual end-to-end check against a real attached device. Not a unit test:
//! it needs a working adb on PATH (or ADB_CONTROL_CONFIG_PATH pointing at a
//! config with one) and at least one online device for the deeper checks.
//!
//! Usage: smoke [--serial SERIAL] [--json] [--screenshot DIR] [--ui]

use std::path::PathBuf;
use std::time::Instant;

use serde::Serialize;

use adb_control::adb::media;
use adb_control::config::load_config;
use adb_control::error::new_trace_id;
use adb_control::logging::init_logging;
use adb_control::{AdbBridge, Target, Transport, UiInspector};

#[derive(Debug)]
struct Args {
    serial: Option<String>,
    json: bool,
    screenshot_dir: Option<PathBuf>,
    with_ui: bool,
}

#[derive(Serialize)]
struct Summary {
    tool: &'static str,
    status: &'static str,
    trace_id: String,
    serial: Option<String>,
    checks: Vec<Check>,
}

#[derive(Serialize)]
struct Check {
    name: &'static str,
    status: &'static str, // pass|fail|skip
    duration_ms: u128,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

fn parse_args() -> Result<Args, String> {
    let mut serial = std::env::var("ANDROID_SERIAL")
        .ok()
        .filter(|value| !value.trim().is_empty());
    let mut json = false;
    let mut screenshot_dir = None;
    let mut with_ui = false;

    let mut argv = std::env::args().skip(1);
    while let Some(arg) = argv.next() {
        match arg.as_str() {
            "--serial" => {
                serial = Some(argv.next().ok_or("--serial requires a value")?);
            }
            "--json" => json = true,
            "--screenshot" => {
                screenshot_dir =
                    Some(PathBuf::from(argv.next().ok_or("--screenshot requires a directory")?));
            }
            "--ui" => with_ui = true,
            other => return Err(format!("unknown argument: {other}")),
        }
    }
    Ok(Args {
        serial,
        json,
        screenshot_dir,
        with_ui,
    })
}

fn timed<T>(name: &'static str, run: impl FnOnce() -> Result<T, String>) -> (Check, Option<T>) {
    let started = Instant::now();
    match run() {
        Ok(value) => (
            Check {
                name,
                status: "pass",
                duration_ms: started.elapsed().as_millis(),
                detail: None,
            },
            Some(value),
        ),
        Err(detail) => (
            Check {
                name,
                status: "fail",
                duration_ms: started.elapsed().as_millis(),
                detail: Some(detail),
            },
            None,
        ),
    }
}

fn skipped(name: &'static str) -> Check {
    Check {
        name,
        status: "skip",
        duration_ms: 0,
        detail: None,
    }
}

fn main() {
    init_logging();
    let args = match parse_args() {
        Ok(args) => args,
        Err(message) => {
            eprintln!("smoke: {message}");
            std::process::exit(2);
        }
    };

    let trace_id = new_trace_id();
    let config = load_config().unwrap_or_default();
    let bridge = AdbBridge::from_config(&config);
    let transport = Transport::new(&bridge, config.bridge.default_port);
    let mut checks = Vec::new();

    let (check, devices) = timed("list_devices", || {
        transport
            .list_devices(Some(trace_id.clone()))
            .map_err(|err| err.to_string())
    });
    checks.push(check);

    let target = match &args.serial {
        Some(serial) => devices.is_some().then(|| Target::serial(serial.clone())),
        None => {
            let (check, target) = timed("resolve_target", || {
                transport
                    .resolve_target(Some(trace_id.clone()))
                    .map_err(|err| err.to_string())
            });
            checks.push(check);
            target
        }
    };

    match &target {
        Some(target) => {
            let (check, _) = timed("device_detail", || {
                transport
                    .device_detail(target, Some(trace_id.clone()))
                    .map_err(|err| err.to_string())
            });
            checks.push(check);

            match &args.screenshot_dir {
                Some(dir) => {
                    let (check, _) = timed("screenshot", || {
                        media::take_screenshot(&bridge, target, dir, Some(trace_id.clone()))
                            .map(|path| path.display().to_string())
                            .map_err(|err| err.to_string())
                    });
                    checks.push(check);
                }
                None => checks.push(skipped("screenshot")),
            }

            if args.with_ui {
                let inspector = UiInspector::from_settings(&bridge, &config.ui);
                let (check, _) = timed("ui_capture", || {
                    inspector
                        .capture(target, Some(trace_id.clone()))
                        .map(|snapshot| snapshot.len())
                        .map_err(|err| err.to_string())
                });
                checks.push(check);
            } else {
                checks.push(skipped("ui_capture"));
            }
        }
        None => {
            checks.push(skipped("device_detail"));
            checks.push(skipped("screenshot"));
            checks.push(skipped("ui_capture"));
        }
    }

    let failed = checks.iter().any(|check| check.status == "fail");
    let summary = Summary {
        tool: "smoke",
        status: if failed { "fail" } else { "pass" },
        trace_id,
        serial: target.and_then(|target| target.serial),
        checks,
    };

    if args.json {
        match serde_json::to_string_pretty(&summary) {
            Ok(payload) => println!("{payload}"),
            Err(err) => eprintln!("smoke: failed to serialize summary: {err}"),
        }
    } else {
        println!("smoke: {} (trace {})", summary.status, summary.trace_id);
        for check in &summary.checks {
            match &check.detail {
                Some(detail) => {
                    println!("  {:<16} {:<4} {:>5}ms  {detail}", check.name, check.status, check.duration_ms)
                }
                None => println!("  {:<16} {:<4} {:>5}ms", check.name, check.status, check.duration_ms),
            }
        }
    }
    std::process::exit(if failed { 1 } else { 0 });
}
