use serde::{Deserialize, Serialize};

/// One row of `adb devices -l` output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceSummary {
    pub serial: String,
    pub state: String,
    pub model: Option<String>,
    pub product: Option<String>,
    pub device: Option<String>,
    pub transport_id: Option<String>,
}

impl DeviceSummary {
    pub fn is_online(&self) -> bool {
        self.state == "device"
    }
}

/// Key system properties pulled out of `getprop` output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceDetail {
    pub serial: String,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub device: Option<String>,
    pub android_version: Option<String>,
    pub api_level: Option<String>,
    pub build_fingerprint: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OpStatus {
    Success,
    Error,
}

/// Outcome of a one-shot operation whose failure is an ordinary result, not
/// an unwound error: connect/disconnect, screenshots, installs. The message
/// preserves raw bridge text on error so callers can decide between retry,
/// target change, or abort.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OpReport {
    pub status: OpStatus,
    pub message: String,
    pub trace_id: String,
}

impl OpReport {
    pub fn success(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self {
            status: OpStatus::Success,
            message: message.into(),
            trace_id: trace_id.into(),
        }
    }

    pub fn error(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self {
            status: OpStatus::Error,
            message: message.into(),
            trace_id: trace_id.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == OpStatus::Success
    }
}

/// One entry of a remote `ls -la` listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceFileEntry {
    pub name: String,
    pub path: String,
    pub is_dir: bool,
    pub size_bytes: Option<u64>,
    pub modified_at: Option<String>,
}

/// Installed package record from `pm list packages -f`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PackageEntry {
    pub package_name: String,
    pub apk_path: Option<String>,
    pub is_system: bool,
}
