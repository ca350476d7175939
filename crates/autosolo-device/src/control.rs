use autosolo_utils::error::DeviceError;
use autosolo_utils::types::{Point, Swipe};
use camino::Utf8Path;
use std::time::Duration;

use crate::Frame;

/// Everything the campaign engine needs from a device and its host.
///
/// Calls are synchronous and bounded by the adapter's own timeouts.
pub trait DeviceControl: Send + Sync {
    fn capture_screen(&self) -> Result<Frame, DeviceError>;

    fn tap(&self, at: Point) -> Result<(), DeviceError>;

    /// A swipe whose start and end coincide is a long press.
    fn swipe(&self, swipe: Swipe) -> Result<(), DeviceError>;

    /// Run `command` in the device shell and return its stdout.
    fn run_shell(&self, command: &str) -> Result<String, DeviceError>;

    fn stop_app(&self) -> Result<(), DeviceError>;

    fn start_app(&self) -> Result<(), DeviceError>;

    fn connect(&self) -> Result<(), DeviceError>;

    /// Kill every host process named `name`. Returns how many were killed.
    fn kill_process_by_name(&self, name: &str) -> usize;

    /// Host processes that make up the emulator backend.
    fn backend_process_names(&self) -> Vec<String>;

    fn manager_shutdown(&self, timeout: Duration) -> Result<(), DeviceError>;

    fn manager_launch(&self) -> Result<(), DeviceError>;

    /// Record the screen into `remote` on the device, blocking for `duration`.
    fn record_screen(&self, remote: &str, duration: Duration) -> Result<(), DeviceError> {
        let _ = (remote, duration);
        Err(DeviceError::Unsupported {
            operation: "record_screen".to_string(),
            backend: "device".to_string(),
        })
    }

    fn pull_file(&self, remote: &str, local: &Utf8Path) -> Result<(), DeviceError> {
        let _ = (remote, local);
        Err(DeviceError::Unsupported {
            operation: "pull_file".to_string(),
            backend: "device".to_string(),
        })
    }
}
