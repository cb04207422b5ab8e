use std::path::Path;

use tracing::info;

use crate::adb::command::{self, Target};
use crate::adb::runner::Executor;
use crate::error::{resolve_trace_id, AdbError};
use crate::models::{OpReport, PackageEntry};

pub fn parse_pm_list_packages_output(output: &str) -> Vec<PackageEntry> {
    let mut packages = Vec::new();
    for raw in output.lines() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        let payload = line.strip_prefix("package:").unwrap_or(line);
        if let Some((apk_path, package_name)) = payload.rsplit_once('=') {
            let apk_path = apk_path.trim().to_string();
            let package_name = package_name.trim().to_string();
            if package_name.is_empty() {
                continue;
            }
            packages.push(PackageEntry {
                package_name,
                is_system: is_system_path(&apk_path),
                apk_path: Some(apk_path),
            });
        } else {
            packages.push(PackageEntry {
                package_name: payload.to_string(),
                apk_path: None,
                is_system: false,
            });
        }
    }
    packages
}

fn is_system_path(path: &str) -> bool {
    path.starts_with("/system/")
        || path.starts_with("/product/")
        || path.starts_with("/vendor/")
        || path.starts_with("/system_ext/")
}

pub fn list_packages(
    exec: &dyn Executor,
    target: &Target,
    trace_id: Option<String>,
) -> Result<Vec<PackageEntry>, AdbError> {
    let trace_id = resolve_trace_id(trace_id);
    let args = command::build_shell(target, &command::args(&["pm", "list", "packages", "-f"]));
    let output = exec.run(&args, &trace_id)?;
    if !output.success() {
        return Err(AdbError::system(
            format!("pm list packages failed: {}", output.stderr_text().trim()),
            &trace_id,
        ));
    }
    Ok(parse_pm_list_packages_output(&output.stdout_text()))
}

pub fn is_package_installed(
    exec: &dyn Executor,
    target: &Target,
    package_name: &str,
    trace_id: Option<String>,
) -> Result<bool, AdbError> {
    let packages = list_packages(exec, target, trace_id)?;
    Ok(packages
        .iter()
        .any(|entry| entry.package_name == package_name))
}

pub fn install_package(
    exec: &dyn Executor,
    target: &Target,
    apk_path: &Path,
    reinstall: bool,
    trace_id: Option<String>,
) -> Result<OpReport, AdbError> {
    let trace_id = resolve_trace_id(trace_id);
    let apk = apk_path.to_string_lossy().to_string();
    if !apk_path.exists() {
        return Ok(OpReport::error(
            format!("APK not found: {apk}"),
            &trace_id,
        ));
    }
    let mut extra = Vec::new();
    if reinstall {
        extra.push("-r".to_string());
    }
    extra.push(apk.clone());
    let args = command::build("install", target, &extra);
    info!(trace_id = %trace_id, apk = %apk, "installing package");
    let output = exec.run(&args, &trace_id)?;
    let combined = format!("{}{}", output.stdout_text(), output.stderr_text());
    if output.success() && combined.to_lowercase().contains("success") {
        Ok(OpReport::success(format!("Installed {apk}"), &trace_id))
    } else {
        Ok(OpReport::error(combined.trim().to_string(), &trace_id))
    }
}

pub fn uninstall_package(
    exec: &dyn Executor,
    target: &Target,
    package_name: &str,
    trace_id: Option<String>,
) -> Result<OpReport, AdbError> {
    let trace_id = resolve_trace_id(trace_id);
    let args = command::build("uninstall", target, &[package_name.to_string()]);
    info!(trace_id = %trace_id, package = %package_name, "uninstalling package");
    let output = exec.run(&args, &trace_id)?;
    let combined = format!("{}{}", output.stdout_text(), output.stderr_text());
    if output.success() && combined.to_lowercase().contains("success") {
        Ok(OpReport::success(
            format!("Uninstalled {package_name}"),
            &trace_id,
        ))
    } else {
        Ok(OpReport::error(combined.trim().to_string(), &trace_id))
    }
}

/// Launch a package's LAUNCHER activity through monkey, the most portable
/// way to open an app without knowing its main activity name.
pub fn launch_app(
    exec: &dyn Executor,
    target: &Target,
    package_name: &str,
    trace_id: Option<String>,
) -> Result<OpReport, AdbError> {
    let trace_id = resolve_trace_id(trace_id);
    let args = command::build_shell(
        target,
        &command::args(&[
            "monkey",
            "-p",
            package_name,
            "-c",
            "android.intent.category.LAUNCHER",
            "1",
        ]),
    );
    let output = exec.run(&args, &trace_id)?;
    if output.success() {
        Ok(OpReport::success(
            format!("Launched {package_name}"),
            &trace_id,
        ))
    } else {
        Ok(OpReport::error(
            output.stderr_text().trim().to_string(),
            &trace_id,
        ))
    }
}
