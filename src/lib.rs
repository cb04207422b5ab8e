//! Host-side Android device automation over the platform's command-line
//! bridge. The crate wraps targeted command construction and execution,
//! TCP/IP device connection management, file transfer, UI hierarchy capture
//! and querying, input injection, app and media management, and a live
//! screen-mirroring pipeline.
//!
//! Everything funnels through the [`adb::runner::Executor`] trait; the
//! production implementation shells out to one bridge binary, and tests
//! substitute scripted executors.

pub mod adb;
pub mod config;
pub mod error;
pub mod logging;
pub mod mirror;
pub mod models;
pub mod ui;

pub use adb::command::Target;
pub use adb::runner::{AdbBridge, CommandOutput, Executor, OutputEncoding};
pub use adb::transport::Transport;
pub use config::Config;
pub use error::AdbError;
pub use mirror::{Mirror, MirrorState, MirrorStop};
pub use models::{DeviceDetail, DeviceSummary, OpReport, OpStatus};
pub use ui::{UiElement, UiInspector, UiSnapshot};
