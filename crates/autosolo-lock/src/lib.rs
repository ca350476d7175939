//! Advisory run lock for a campaign state directory.
//!
//! Only one `autosolo run` may drive a given state directory at a time, since
//! two instances would race on the checkpoint record and fight over the same
//! device. The lock is advisory: it coordinates autosolo processes, it is not
//! a security boundary.

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use fd_lock::RwLock;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::process;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

const LOCK_FILE_NAME: &str = "run.lock";
const MAX_ACQUIRE_ATTEMPTS: u32 = 3;
const MAX_READ_RETRIES: u32 = 3;
const READ_RETRY_DELAY_MS: u64 = 10;

/// Contents of the lock file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockInfo {
    /// Process ID holding the lock
    pub pid: u32,
    /// When the lock was taken
    pub created_at: DateTime<Utc>,
    /// Device the holder is driving, if known
    pub device: Option<String>,
    /// autosolo version that wrote the lock
    pub autosolo_version: String,
}

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("Another autosolo instance (PID {pid}, started {held_for} ago) is running against '{state_dir}'")]
    Held {
        state_dir: String,
        pid: u32,
        held_for: String,
    },

    #[error("Lock file '{path}' is corrupted: {reason}")]
    Corrupted { path: String, reason: String },

    #[error("Failed to acquire run lock: {reason}")]
    AcquisitionFailed { reason: String },

    #[error("Failed to release run lock: {reason}")]
    ReleaseFailed { reason: String },

    #[error("IO error during lock operation: {0}")]
    Io(#[from] io::Error),
}

/// Exclusive lock over a state directory, released on drop.
pub struct RunLock {
    lock_path: Utf8PathBuf,
    fd_lock: Option<Box<RwLock<fs::File>>>,
    info: LockInfo,
}

impl RunLock {
    /// Take the lock for `state_dir`.
    ///
    /// A lock left behind by a dead process is reclaimed. A lock held by a
    /// live process is only overridden when `force` is set.
    pub fn acquire(
        state_dir: &Utf8Path,
        device: Option<&str>,
        force: bool,
    ) -> Result<Self, LockError> {
        fs::create_dir_all(state_dir).map_err(|e| LockError::AcquisitionFailed {
            reason: format!("cannot create state directory '{state_dir}': {e}"),
        })?;

        let lock_path = Self::lock_path(state_dir);

        for attempt in 0..MAX_ACQUIRE_ATTEMPTS {
            let info = LockInfo {
                pid: process::id(),
                created_at: Utc::now(),
                device: device.map(str::to_string),
                autosolo_version: env!("CARGO_PKG_VERSION").to_string(),
            };

            match fs::OpenOptions::new()
                .create_new(true)
                .write(true)
                .open(&lock_path)
            {
                Ok(file) => return Self::finalize(lock_path, file, info),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    Self::check_existing(&lock_path, state_dir, force)?;
                    Self::remove_stale(&lock_path)?;
                    // Back off a little so two reclaimers don't collide forever.
                    thread::sleep(Duration::from_millis(
                        10 * u64::from(attempt + 1) + u64::from(process::id() % 7),
                    ));
                }
                Err(e) => {
                    return Err(LockError::AcquisitionFailed {
                        reason: format!("cannot create '{lock_path}': {e}"),
                    });
                }
            }
        }

        Err(LockError::AcquisitionFailed {
            reason: format!(
                "gave up after {MAX_ACQUIRE_ATTEMPTS} attempts; another process keeps re-taking '{lock_path}'"
            ),
        })
    }

    fn finalize(lock_path: Utf8PathBuf, file: fs::File, info: LockInfo) -> Result<Self, LockError> {
        let json = serde_json::to_string_pretty(&info).map_err(|e| LockError::AcquisitionFailed {
            reason: format!("cannot serialize lock info: {e}"),
        })?;

        let mut rw_lock = Box::new(RwLock::new(file));
        {
            let guard = rw_lock.try_write().map_err(|_| LockError::Held {
                state_dir: lock_path.parent().map(ToString::to_string).unwrap_or_default(),
                pid: 0,
                held_for: "unknown".to_string(),
            })?;
            let mut file_ref = &*guard;
            file_ref.write_all(json.as_bytes())?;
            file_ref.flush()?;
            file_ref.sync_all()?;
        }

        debug!(path = %lock_path, pid = info.pid, "Run lock acquired");
        Ok(Self {
            lock_path,
            fd_lock: Some(rw_lock),
            info,
        })
    }

    /// Decide whether an existing lock may be replaced.
    fn check_existing(lock_path: &Utf8Path, state_dir: &Utf8Path, force: bool) -> Result<(), LockError> {
        let existing = match Self::read_info_with_retry(lock_path) {
            Ok(Some(info)) => info,
            Ok(None) => return Ok(()),
            Err(e) if force => {
                warn!(error = %e, "Overriding unreadable run lock (--force)");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        if !is_process_running(existing.pid) {
            warn!(
                pid = existing.pid,
                created_at = %existing.created_at,
                "Reclaiming run lock left by a process that is no longer running"
            );
            return Ok(());
        }

        if force {
            warn!(pid = existing.pid, "Overriding live run lock (--force)");
            return Ok(());
        }

        Err(LockError::Held {
            state_dir: state_dir.to_string(),
            pid: existing.pid,
            held_for: format_elapsed(existing.created_at),
        })
    }

    /// The lock file can be observed between create and write; retry briefly.
    fn read_info_with_retry(lock_path: &Utf8Path) -> Result<Option<LockInfo>, LockError> {
        let mut last_reason = String::new();
        for attempt in 0..MAX_READ_RETRIES {
            let content = match fs::read_to_string(lock_path) {
                Ok(content) => content,
                Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
                Err(e) => {
                    last_reason = e.to_string();
                    thread::sleep(Duration::from_millis(READ_RETRY_DELAY_MS));
                    continue;
                }
            };

            match serde_json::from_str::<LockInfo>(&content) {
                Ok(info) => return Ok(Some(info)),
                Err(e) => {
                    let incomplete = content.trim().is_empty() || e.is_eof();
                    last_reason = e.to_string();
                    if !incomplete || attempt + 1 == MAX_READ_RETRIES {
                        break;
                    }
                    thread::sleep(Duration::from_millis(READ_RETRY_DELAY_MS));
                }
            }
        }
        Err(LockError::Corrupted {
            path: lock_path.to_string(),
            reason: last_reason,
        })
    }

    /// Rename-then-delete keeps the window where two processes both see "free" small.
    fn remove_stale(lock_path: &Utf8Path) -> Result<(), LockError> {
        let stale_path = lock_path.with_extension(format!(
            "stale.{}.{}",
            Utc::now().timestamp_millis(),
            process::id()
        ));
        match fs::rename(lock_path, &stale_path) {
            Ok(()) => {
                let _ = fs::remove_file(&stale_path);
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(LockError::AcquisitionFailed {
                reason: format!("cannot move stale lock aside: {e}"),
            }),
        }
    }

    /// Inspect the lock for `state_dir` without taking it.
    pub fn inspect(state_dir: &Utf8Path) -> Result<Option<LockInfo>, LockError> {
        let lock_path = Self::lock_path(state_dir);
        match fs::read_to_string(&lock_path) {
            Ok(content) => serde_json::from_str(&content)
                .map(Some)
                .map_err(|e| LockError::Corrupted {
                    path: lock_path.to_string(),
                    reason: e.to_string(),
                }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// True when some live process currently holds the lock for `state_dir`.
    #[must_use]
    pub fn is_held(state_dir: &Utf8Path) -> bool {
        matches!(Self::inspect(state_dir), Ok(Some(info)) if is_process_running(info.pid))
    }

    pub fn release(mut self) -> Result<(), LockError> {
        self.fd_lock.take();
        match fs::remove_file(&self.lock_path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(LockError::ReleaseFailed {
                reason: e.to_string(),
            }),
        }
    }

    #[must_use]
    pub fn info(&self) -> &LockInfo {
        &self.info
    }

    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.lock_path
    }

    fn lock_path(state_dir: &Utf8Path) -> Utf8PathBuf {
        state_dir.join(LOCK_FILE_NAME)
    }
}

impl std::fmt::Debug for RunLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunLock")
            .field("lock_path", &self.lock_path)
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if self.fd_lock.take().is_some() {
            let _ = fs::remove_file(&self.lock_path);
        }
    }
}

fn is_process_running(pid: u32) -> bool {
    #[cfg(unix)]
    {
        // kill(pid, 0): 0 = exists, EPERM = exists but not ours, ESRCH = gone.
        let rc = unsafe { libc::kill(pid as i32, 0) };
        if rc == 0 {
            true
        } else {
            matches!(
                io::Error::last_os_error().raw_os_error(),
                Some(code) if code == libc::EPERM
            )
        }
    }

    #[cfg(windows)]
    {
        use winapi::um::handleapi::CloseHandle;
        use winapi::um::minwinbase::STILL_ACTIVE;
        use winapi::um::processthreadsapi::{GetExitCodeProcess, OpenProcess};
        use winapi::um::winnt::PROCESS_QUERY_LIMITED_INFORMATION;

        unsafe {
            let handle = OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, 0, pid);
            if handle.is_null() {
                return false;
            }
            let mut exit_code: u32 = 0;
            let ok = GetExitCodeProcess(handle, &mut exit_code);
            CloseHandle(handle);
            ok != 0 && exit_code == STILL_ACTIVE
        }
    }

    #[cfg(not(any(unix, windows)))]
    {
        let _ = pid;
        true
    }
}

fn format_elapsed(since: DateTime<Utc>) -> String {
    let secs = (Utc::now() - since).num_seconds().max(0);
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else if secs < 86400 {
        format!("{}h", secs / 3600)
    } else {
        format!("{}d", secs / 86400)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn state_dir() -> (TempDir, Utf8PathBuf) {
        let td = TempDir::new().unwrap();
        let path = Utf8PathBuf::from_path_buf(td.path().join("state")).unwrap();
        (td, path)
    }

    fn write_foreign_lock(dir: &Utf8Path, pid: u32) {
        fs::create_dir_all(dir).unwrap();
        let info = LockInfo {
            pid,
            created_at: Utc::now() - chrono::Duration::minutes(5),
            device: Some("127.0.0.1:5555".to_string()),
            autosolo_version: "0.0.1".to_string(),
        };
        fs::write(
            dir.join(LOCK_FILE_NAME),
            serde_json::to_string(&info).unwrap(),
        )
        .unwrap();
    }

    #[test]
    fn test_acquire_and_release() {
        let (_td, dir) = state_dir();
        let lock = RunLock::acquire(&dir, Some("emulator-5554"), false).unwrap();
        assert!(lock.path().exists());
        assert_eq!(lock.info().pid, process::id());
        assert_eq!(lock.info().device.as_deref(), Some("emulator-5554"));

        let second = RunLock::acquire(&dir, None, false);
        assert!(matches!(second, Err(LockError::Held { .. })));

        lock.release().unwrap();
        assert!(!dir.join(LOCK_FILE_NAME).exists());
        let _again = RunLock::acquire(&dir, None, false).unwrap();
    }

    #[test]
    fn test_drop_removes_lock_file() {
        let (_td, dir) = state_dir();
        {
            let _lock = RunLock::acquire(&dir, None, false).unwrap();
            assert!(RunLock::is_held(&dir));
        }
        assert!(!dir.join(LOCK_FILE_NAME).exists());
        assert!(!RunLock::is_held(&dir));
    }

    #[test]
    fn test_inspect_reports_holder() {
        let (_td, dir) = state_dir();
        assert!(RunLock::inspect(&dir).unwrap().is_none());
        let _lock = RunLock::acquire(&dir, Some("dev"), false).unwrap();
        let info = RunLock::inspect(&dir).unwrap().unwrap();
        assert_eq!(info.pid, process::id());
        assert!(!info.autosolo_version.is_empty());
    }

    #[test]
    #[cfg(unix)]
    fn test_dead_holder_is_reclaimed() {
        let (_td, dir) = state_dir();
        // PIDs near i32::MAX are never allocated on Linux.
        write_foreign_lock(&dir, 2_147_483_000);
        let lock = RunLock::acquire(&dir, None, false).unwrap();
        assert_eq!(lock.info().pid, process::id());
    }

    #[test]
    fn test_live_holder_requires_force() {
        let (_td, dir) = state_dir();
        write_foreign_lock(&dir, process::id());

        match RunLock::acquire(&dir, None, false) {
            Err(LockError::Held { pid, held_for, .. }) => {
                assert_eq!(pid, process::id());
                assert_eq!(held_for, "5m");
            }
            other => panic!("expected Held, got {other:?}"),
        }

        let forced = RunLock::acquire(&dir, None, true).unwrap();
        assert_eq!(forced.info().pid, process::id());
    }

    #[test]
    fn test_corrupted_lock_is_reported_unless_forced() {
        let (_td, dir) = state_dir();
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(LOCK_FILE_NAME), "not json at all").unwrap();

        assert!(matches!(
            RunLock::acquire(&dir, None, false),
            Err(LockError::Corrupted { .. })
        ));
        assert!(RunLock::acquire(&dir, None, true).is_ok());
    }

    #[test]
    fn test_format_elapsed_units() {
        let now = Utc::now();
        assert_eq!(format_elapsed(now - chrono::Duration::seconds(30)), "30s");
        assert_eq!(format_elapsed(now - chrono::Duration::minutes(3)), "3m");
        assert_eq!(format_elapsed(now - chrono::Duration::hours(2)), "2h");
        assert_eq!(format_elapsed(now - chrono::Duration::days(4)), "4d");
        assert_eq!(format_elapsed(now + chrono::Duration::minutes(3)), "0s");
    }
}
