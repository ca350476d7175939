//! Bounded, escalating remediation: relaunch the app, and on the final
//! attempt reboot the whole emulator first.

use autosolo_config::Config;
use autosolo_utils::error::{CampaignError, DeviceError};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::ops::Ops;

/// Shell probe used to decide the device is back after a reboot.
const BOOT_PROBE: &str = "echo autosolo-ready";
const BOOT_PROBE_REPLY: &str = "autosolo-ready";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recovery {
    max_retries: u32,
    app_settle: Duration,
    retry_cooldown: Duration,
    shutdown_timeout: Duration,
    boot_timeout: Duration,
    boot_poll: Duration,
}

impl Recovery {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_retries: config.recovery.max_retries.max(1),
            app_settle: Duration::from_secs(config.recovery.app_settle_secs),
            retry_cooldown: Duration::from_secs(config.recovery.retry_cooldown_secs),
            shutdown_timeout: Duration::from_secs(config.emulator.shutdown_timeout_secs),
            boot_timeout: Duration::from_secs(config.emulator.boot_timeout_secs),
            boot_poll: Duration::from_secs(config.emulator.boot_poll_interval_secs),
        }
    }

    #[must_use]
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Run attempts until the lobby is reacquired.
    ///
    /// Every attempt but the last is a soft restart of the app; the last one
    /// reboots the emulator first. An operator stop propagates at once; any
    /// other error only fails the attempt it happened in.
    pub fn run(&self, ops: &Ops) -> Result<(), CampaignError> {
        let mut last_error = None;

        for attempt in 1..=self.max_retries {
            ops.run_state().check()?;
            let hard = attempt == self.max_retries;
            info!(attempt, max = self.max_retries, hard, "Recovery attempt");

            match self.attempt(ops, hard) {
                Ok(true) => {
                    info!(attempt, "Recovery succeeded");
                    return Ok(());
                }
                Ok(false) => {
                    warn!(attempt, "Recovery attempt did not reach the lobby");
                    last_error = Some("lobby not reached".to_string());
                }
                Err(e) if e.is_emergency_stop() => return Err(e),
                Err(e) => {
                    warn!(attempt, error = %e, "Recovery attempt failed");
                    last_error = Some(e.to_string());
                }
            }

            if attempt < self.max_retries {
                ops.sleep(self.retry_cooldown);
            }
        }

        Err(CampaignError::RecoveryExhausted {
            attempts: self.max_retries,
            last_error,
        })
    }

    fn attempt(&self, ops: &Ops, hard: bool) -> Result<bool, CampaignError> {
        if hard {
            self.hard_reboot(ops)?;
        }
        let device = ops.device();
        device.stop_app()?;
        device.start_app()?;
        debug!(settle_secs = self.app_settle.as_secs(), "App relaunched; settling");
        ops.sleep(self.app_settle);
        ops.reacquire_lobby()
    }

    /// Shut the emulator down, kill whatever is left of it, start it again and
    /// wait until adb answers.
    pub fn hard_reboot(&self, ops: &Ops) -> Result<(), CampaignError> {
        let device = ops.device();
        info!("Hard rebooting the device");

        if let Err(e) = device.manager_shutdown(self.shutdown_timeout) {
            warn!(error = %e, "Graceful emulator shutdown failed");
        }
        for name in device.backend_process_names() {
            let killed = device.kill_process_by_name(&name);
            if killed > 0 {
                info!(process = %name, killed, "Killed emulator process");
            }
        }
        match device.manager_launch() {
            Ok(()) => {}
            Err(DeviceError::Unsupported { backend, .. }) => {
                info!(backend = %backend, "No emulator manager; reconnecting only");
            }
            Err(e) => return Err(e.into()),
        }

        self.wait_for_boot(ops)
    }

    fn wait_for_boot(&self, ops: &Ops) -> Result<(), CampaignError> {
        let device = ops.device();
        let deadline = ops.clock().now() + self.boot_timeout;
        loop {
            ops.run_state().check()?;
            match device.connect().and_then(|()| device.run_shell(BOOT_PROBE)) {
                Ok(out) if out.contains(BOOT_PROBE_REPLY) => {
                    info!("Device is back");
                    return Ok(());
                }
                Ok(out) => debug!(output = %out.trim(), "Unexpected boot probe reply"),
                Err(e) => debug!(error = %e, "Device not ready yet"),
            }
            if ops.clock().now() >= deadline {
                return Err(DeviceError::BootTimeout {
                    timeout_secs: self.boot_timeout.as_secs(),
                }
                .into());
            }
            ops.sleep(self.boot_poll);
        }
    }
}
