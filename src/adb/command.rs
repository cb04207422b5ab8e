//! Pure argv construction. Target routing flags always precede the operation
//! itself; adb rejects commands where `-s` comes after the subcommand.

use serde::{Deserialize, Serialize};

/// The device a command is addressed to. An absent serial leaves resolution
/// to the bridge's own default-target logic (and its ambiguity error when
/// several devices are attached).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Target {
    pub serial: Option<String>,
}

impl Target {
    /// Default-target resolution by the bridge.
    pub fn any() -> Self {
        Self { serial: None }
    }

    pub fn serial(serial: impl Into<String>) -> Self {
        Self {
            serial: Some(serial.into()),
        }
    }

    /// A network-attached device; adb identifies these as `host:port`.
    pub fn network(host: &str, port: u16) -> Self {
        Self::serial(format!("{host}:{port}"))
    }
}

/// Build the argv for one bridge invocation. Deterministic, no side effects.
/// Values pass through verbatim as argv entries; no shell is involved, so no
/// escaping is performed or needed.
pub fn build(base: &str, target: &Target, args: &[String]) -> Vec<String> {
    let mut argv = Vec::with_capacity(args.len() + 3);
    if let Some(serial) = target.serial.as_deref() {
        argv.push("-s".to_string());
        argv.push(serial.to_string());
    }
    argv.push(base.to_string());
    argv.extend(args.iter().cloned());
    argv
}

/// Shell-style `shell <args...>` invocation, the most common formatting.
pub fn build_shell(target: &Target, args: &[String]) -> Vec<String> {
    build("shell", target, args)
}

/// Human-readable rendering for logs and error messages. Never executed.
pub fn render_command_line(program: &str, args: &[String]) -> String {
    let mut line = String::from(program);
    for arg in args {
        line.push(' ');
        line.push_str(arg);
    }
    line
}

/// Convenience for call sites assembling literal argument lists.
pub fn args(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| item.to_string()).collect()
}
