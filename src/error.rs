use serde::Serialize;
use std::fmt;
use uuid::Uuid;

/// Structured failure surfaced by every component. Non-zero exit codes from
/// the bridge are NOT errors; they travel inside `CommandOutput` for the
/// caller to interpret.
#[derive(Debug, Clone, Serialize)]
pub struct AdbError {
    pub error: String,
    pub code: String,
    pub trace_id: String,
}

impl AdbError {
    pub fn new(
        code: impl Into<String>,
        message: impl Into<String>,
        trace_id: impl Into<String>,
    ) -> Self {
        Self {
            error: message.into(),
            code: code.into(),
            trace_id: trace_id.into(),
        }
    }

    /// Bridge or renderer binary missing or unexecutable. Fatal; not retried.
    pub fn launch(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new("ERR_LAUNCH", message, trace_id)
    }

    /// Missing remote file or host-side write failure during push/pull.
    pub fn transfer(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new("ERR_TRANSFER", message, trace_id)
    }

    /// Malformed tree markup; the snapshot is never partially populated.
    pub fn parse(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new("ERR_PARSE", message, trace_id)
    }

    /// No serial given while more than one device is attached.
    pub fn ambiguous_target(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new("ERR_AMBIGUOUS_TARGET", message, trace_id)
    }

    /// Streaming pipeline transitioned to `Failed`.
    pub fn stream(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new("ERR_STREAM", message, trace_id)
    }

    pub fn validation(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new("ERR_VALIDATION", message, trace_id)
    }

    pub fn system(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new("ERR_SYSTEM", message, trace_id)
    }
}

impl fmt::Display for AdbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.error, self.code)
    }
}

impl std::error::Error for AdbError {}

/// Use the caller-provided trace id when present, otherwise mint one.
pub fn resolve_trace_id(trace_id: Option<String>) -> String {
    trace_id
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(new_trace_id)
}

pub fn new_trace_id() -> String {
    Uuid::new_v4().to_string()
}
