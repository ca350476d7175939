use camino::{Utf8Path, Utf8PathBuf};
use std::cell::RefCell;

// Thread-local override used only in tests to avoid process-global env races.
thread_local! {
    static THREAD_HOME: RefCell<Option<Utf8PathBuf>> = const { RefCell::new(None) };
}

pub const HOME_ENV: &str = "AUTOSOLO_HOME";
pub const CONFIG_DIR_NAME: &str = ".autosolo";
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Resolve the state directory:
/// 1) thread-local override (tests use this)
/// 2) env `AUTOSOLO_HOME`
/// 3) default ".autosolo"
#[must_use]
pub fn autosolo_home() -> Utf8PathBuf {
    if let Some(tl) = THREAD_HOME.with(|tl| tl.borrow().clone()) {
        return tl;
    }
    if let Ok(p) = std::env::var(HOME_ENV) {
        return Utf8PathBuf::from(p);
    }
    Utf8PathBuf::from(CONFIG_DIR_NAME)
}

/// `<home>/state.json`
#[must_use]
pub fn default_checkpoint_path() -> Utf8PathBuf {
    autosolo_home().join("state.json")
}

/// `<home>/crash_reports`
#[must_use]
pub fn default_crash_dir() -> Utf8PathBuf {
    autosolo_home().join("crash_reports")
}

/// Resolve `path` against `base` unless it is already absolute.
#[must_use]
pub fn resolve_against(base: &Utf8Path, path: &Utf8Path) -> Utf8PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// mkdir -p; treat `AlreadyExists` as success
pub fn ensure_dir_all<P: AsRef<std::path::Path>>(p: P) -> std::io::Result<()> {
    match std::fs::create_dir_all(&p) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(e),
    }
}

/// RAII guard for isolated home that clears thread-local state on drop
#[cfg(any(test, feature = "test-utils"))]
pub struct HomeGuard {
    inner: tempfile::TempDir,
}

#[cfg(any(test, feature = "test-utils"))]
impl HomeGuard {
    #[must_use]
    pub fn home(&self) -> Utf8PathBuf {
        autosolo_home()
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl Drop for HomeGuard {
    fn drop(&mut self) {
        THREAD_HOME.with(|tl| *tl.borrow_mut() = None);
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl std::ops::Deref for HomeGuard {
    type Target = tempfile::TempDir;
    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

/// Give the calling test thread its own state directory.
///
/// Hold the `HomeGuard` for the test's duration so the directory stays alive.
#[cfg(any(test, feature = "test-utils"))]
#[must_use]
pub fn with_isolated_home() -> HomeGuard {
    let td = tempfile::TempDir::new().expect("create temp home");
    let p = Utf8PathBuf::from_path_buf(td.path().to_path_buf()).expect("utf-8 temp path");
    THREAD_HOME.with(|tl| *tl.borrow_mut() = Some(p));
    HomeGuard { inner: td }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_isolated_home_overrides_default() {
        let guard = with_isolated_home();
        let home = autosolo_home();
        assert_eq!(home.as_std_path(), guard.inner.path());
        assert_eq!(guard.home(), home);
        assert_eq!(default_checkpoint_path(), home.join("state.json"));
        assert_eq!(default_crash_dir(), home.join("crash_reports"));
    }

    #[test]
    fn test_home_resets_after_guard_drop() {
        {
            let _guard = with_isolated_home();
        }
        let home = autosolo_home();
        // Falls back to env or the relative default once the override is gone.
        if std::env::var(HOME_ENV).is_err() {
            assert_eq!(home, Utf8PathBuf::from(CONFIG_DIR_NAME));
        }
    }

    #[test]
    fn test_resolve_against() {
        let base = Utf8Path::new("/work/bot");
        assert_eq!(
            resolve_against(base, Utf8Path::new("assets")),
            Utf8PathBuf::from("/work/bot/assets")
        );
        assert_eq!(
            resolve_against(base, Utf8Path::new("/opt/assets")),
            Utf8PathBuf::from("/opt/assets")
        );
    }

    #[test]
    fn test_ensure_dir_all_is_idempotent() {
        let td = tempfile::TempDir::new().unwrap();
        let dir = td.path().join("a/b/c");
        ensure_dir_all(&dir).unwrap();
        ensure_dir_all(&dir).unwrap();
        assert!(dir.is_dir());
    }
}
