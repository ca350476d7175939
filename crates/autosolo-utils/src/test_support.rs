//! Helpers shared by tests across the workspace.

use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use tempfile::TempDir;

/// A temp dir plus its UTF-8 path.
#[must_use]
pub fn utf8_tempdir() -> (TempDir, Utf8PathBuf) {
    let td = TempDir::new().expect("create temp dir");
    let path = Utf8PathBuf::from_path_buf(td.path().to_path_buf()).expect("utf-8 temp path");
    (td, path)
}

/// Write `content` to `dir/rel`, creating parents. Returns the full path.
pub fn write_file(dir: &Utf8Path, rel: &str, content: &str) -> Utf8PathBuf {
    let path = dir.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent");
    }
    fs::write(&path, content).expect("write file");
    path
}

/// Minimal `.autosolo/config.toml` under `dir`.
pub fn write_config(dir: &Utf8Path, toml: &str) -> Utf8PathBuf {
    write_file(dir, ".autosolo/config.toml", toml)
}
