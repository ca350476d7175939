//! Host-side process cleanup for emulator backends that survive a manager shutdown.

use sysinfo::{ProcessesToUpdate, System};
use tracing::{debug, warn};

/// Kill every host process whose executable name equals `name`
/// (ASCII case-insensitive). Returns the number of processes signalled.
#[must_use]
pub fn kill_processes_named(name: &str) -> usize {
    let mut sys = System::new();
    sys.refresh_processes(ProcessesToUpdate::All, true);

    let mut killed = 0;
    for (pid, process) in sys.processes() {
        if !process.name().eq_ignore_ascii_case(name) {
            continue;
        }
        if process.kill() {
            debug!(%pid, name, "Killed host process");
            killed += 1;
        } else {
            warn!(%pid, name, "Failed to kill host process");
        }
    }
    killed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_process_name_kills_nothing() {
        assert_eq!(kill_processes_named("autosolo-no-such-process-4c1e.exe"), 0);
    }
}
