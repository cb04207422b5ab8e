//! On-device UI inspection: dump the current view hierarchy with
//! uiautomator, pull the markup to the host, and parse it into a queryable
//! snapshot. The device-side dump file is removed after every attempt,
//! successful or not, so repeated captures never trip over stale state.

pub mod markup;

use std::fs;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::adb::command::{self, Target};
use crate::adb::runner::Executor;
use crate::adb::transfer::{transfer_file, Direction};
use crate::config::{default_ui_attributes, UiSettings, DEFAULT_DEVICE_DUMP_PATH};
use crate::error::{resolve_trace_id, AdbError};

pub use markup::{parse_bounds, ElementBounds, UiElement};

/// A parsed view hierarchy, with elements in document order.
#[derive(Debug, Clone)]
pub struct UiSnapshot {
    pub elements: Vec<UiElement>,
    pub captured_at: DateTime<Utc>,
}

impl UiSnapshot {
    /// First element, in document order, whose resource id or visible text
    /// equals `key`. Absence is an ordinary answer, not a failure.
    pub fn find_element(&self, key: &str) -> Option<&UiElement> {
        self.elements.iter().find(|element| element.matches_key(key))
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

pub struct UiInspector<'a> {
    exec: &'a dyn Executor,
    attributes: Vec<String>,
    device_dump_path: String,
}

impl<'a> UiInspector<'a> {
    pub fn new(exec: &'a dyn Executor) -> Self {
        Self {
            exec,
            attributes: default_ui_attributes(),
            device_dump_path: DEFAULT_DEVICE_DUMP_PATH.to_string(),
        }
    }

    pub fn from_settings(exec: &'a dyn Executor, settings: &UiSettings) -> Self {
        Self {
            exec,
            attributes: settings.attributes.clone(),
            device_dump_path: settings.device_dump_path.clone(),
        }
    }

    /// Override which attributes are kept per element.
    pub fn with_attributes(mut self, attributes: Vec<String>) -> Self {
        self.attributes = attributes;
        self
    }

    /// Override where the dump lands on the device.
    pub fn with_device_dump_path(mut self, path: impl Into<String>) -> Self {
        self.device_dump_path = path.into();
        self
    }

    /// Capture the current view hierarchy. Fails when the dump command
    /// fails, the pull fails, or the markup does not parse; an on-screen
    /// hierarchy with zero nodes is a valid, empty snapshot.
    pub fn capture(
        &self,
        target: &Target,
        trace_id: Option<String>,
    ) -> Result<UiSnapshot, AdbError> {
        let trace_id = resolve_trace_id(trace_id);
        let captured_at = Utc::now();

        let dump_args = command::build_shell(
            target,
            &command::args(&["uiautomator", "dump", &self.device_dump_path]),
        );
        let dump = self.exec.run(&dump_args, &trace_id)?;
        if !dump.success() {
            return Err(AdbError::system(
                format!("uiautomator dump failed: {}", dump.stderr_text().trim()),
                &trace_id,
            ));
        }
        debug!(trace_id = %trace_id, path = %self.device_dump_path, "ui hierarchy dumped");

        let local = tempfile::Builder::new()
            .prefix("ui_dump_")
            .suffix(".xml")
            .tempfile()
            .map_err(|err| {
                AdbError::system(format!("Failed to create temp file: {err}"), &trace_id)
            })?;
        let pulled = transfer_file(
            self.exec,
            target,
            Direction::Pull,
            &self.device_dump_path,
            local.path(),
            Some(trace_id.clone()),
        );
        // Once the dump exists on the device it must be removed, whether or
        // not the pull brought it home.
        self.cleanup_remote(target, &trace_id);
        pulled?;

        let raw = fs::read(local.path()).map_err(|err| {
            AdbError::system(format!("Failed to read pulled dump: {err}"), &trace_id)
        })?;
        let text = String::from_utf8_lossy(&raw);
        let elements = markup::parse_ui_elements(&text, &self.attributes)
            .map_err(|reason| AdbError::parse(reason, &trace_id))?;
        Ok(UiSnapshot {
            elements,
            captured_at,
        })
    }

    /// Capture and query in one step, returning an owned copy of the first
    /// match.
    pub fn find_element(
        &self,
        target: &Target,
        key: &str,
        trace_id: Option<String>,
    ) -> Result<Option<UiElement>, AdbError> {
        let snapshot = self.capture(target, trace_id)?;
        Ok(snapshot.find_element(key).cloned())
    }

    fn cleanup_remote(&self, target: &Target, trace_id: &str) {
        let args = command::build_shell(
            target,
            &command::args(&["rm", "-f", &self.device_dump_path]),
        );
        match self.exec.run(&args, trace_id) {
            Ok(output) if output.success() => {}
            Ok(output) => {
                warn!(trace_id = %trace_id, stderr = %output.stderr_text().trim(), "dump cleanup reported failure");
            }
            Err(err) => {
                warn!(trace_id = %trace_id, error = %err, "dump cleanup could not run");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adb::runner::{CommandOutput, OutputEncoding};
    use std::cell::RefCell;
    use std::collections::HashMap;

    const SAMPLE_DUMP: &str = r#"<?xml version='1.0' encoding='UTF-8'?>
<hierarchy rotation="0">
  <node resource-id="" text="Settings" class="android.widget.TextView" package="com.android.settings" content-desc="" bounds="[0,0][1080,120]"/>
  <node resource-id="android:id/title" text="Network" class="android.widget.TextView" package="com.android.settings" content-desc="" bounds="[0,120][1080,240]"/>
</hierarchy>"#;

    /// Scripted device: answers the dump and rm shell calls, and either
    /// materializes the dump file on pull or fails the pull outright.
    struct ScriptedDevice {
        dump_payload: &'static str,
        fail_pull: bool,
        calls: RefCell<Vec<Vec<String>>>,
    }

    impl ScriptedDevice {
        fn new(dump_payload: &'static str, fail_pull: bool) -> Self {
            Self {
                dump_payload,
                fail_pull,
                calls: RefCell::new(Vec::new()),
            }
        }

        fn saw_cleanup(&self) -> bool {
            self.calls
                .borrow()
                .iter()
                .any(|args| args.contains(&"rm".to_string()))
        }
    }

    impl Executor for ScriptedDevice {
        fn run(&self, args: &[String], _trace_id: &str) -> Result<CommandOutput, AdbError> {
            self.calls.borrow_mut().push(args.to_vec());
            if args.contains(&"pull".to_string()) {
                if self.fail_pull {
                    return Ok(CommandOutput::new(
                        Vec::new(),
                        b"remote object does not exist".to_vec(),
                        Some(1),
                        OutputEncoding::Utf8,
                    ));
                }
                let local = args.last().cloned().unwrap_or_default();
                std::fs::write(&local, self.dump_payload).expect("write dump");
            }
            Ok(CommandOutput::new(
                Vec::new(),
                Vec::new(),
                Some(0),
                OutputEncoding::Utf8,
            ))
        }
    }

    fn element_with(resource_id: &str, text: &str) -> UiElement {
        let mut attrs = HashMap::new();
        attrs.insert("resource-id".to_string(), resource_id.to_string());
        attrs.insert("text".to_string(), text.to_string());
        UiElement { attrs }
    }

    #[test]
    fn capture_parses_pulled_hierarchy() {
        let device = ScriptedDevice::new(SAMPLE_DUMP, false);
        let inspector = UiInspector::new(&device);
        let snapshot = inspector.capture(&Target::any(), None).expect("capture");
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.elements[0].text(), "Settings");
        assert!(device.saw_cleanup());
    }

    #[test]
    fn cleanup_runs_even_when_the_pull_fails() {
        let device = ScriptedDevice::new(SAMPLE_DUMP, true);
        let inspector = UiInspector::new(&device);
        let err = inspector
            .capture(&Target::any(), None)
            .expect_err("pull should fail");
        assert_eq!(err.code, "ERR_TRANSFER");
        assert!(device.saw_cleanup());
    }

    #[test]
    fn malformed_markup_fails_parsing_after_cleanup() {
        let device = ScriptedDevice::new("<hierarchy><node text=", false);
        let inspector = UiInspector::new(&device);
        let err = inspector
            .capture(&Target::any(), None)
            .expect_err("parse should fail");
        assert_eq!(err.code, "ERR_PARSE");
        assert!(device.saw_cleanup());
    }

    #[test]
    fn find_element_returns_first_match_in_document_order() {
        let snapshot = UiSnapshot {
            elements: vec![element_with("", "X"), element_with("X", "")],
            captured_at: Utc::now(),
        };
        let found = snapshot.find_element("X").expect("match");
        assert_eq!(found.text(), "X");
        assert_eq!(found.resource_id(), "");
    }

    #[test]
    fn find_element_absence_is_none_not_error() {
        let device = ScriptedDevice::new(SAMPLE_DUMP, false);
        let inspector = UiInspector::new(&device);
        let found = inspector
            .find_element(&Target::any(), "does-not-exist", None)
            .expect("capture");
        assert_eq!(found, None);
    }

    #[test]
    fn dump_path_override_flows_into_commands() {
        let device = ScriptedDevice::new(SAMPLE_DUMP, false);
        let inspector =
            UiInspector::new(&device).with_device_dump_path("/data/local/tmp/view.xml");
        inspector.capture(&Target::any(), None).expect("capture");
        let calls = device.calls.borrow();
        assert!(calls[0].contains(&"/data/local/tmp/view.xml".to_string()));
    }
}
