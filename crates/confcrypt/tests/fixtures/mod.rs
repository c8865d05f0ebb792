#![allow(dead_code)]

use confcrypt_logger::{LevelFilter, Logger};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tempfile::TempDir;

/// base64 of the bytes 01..08.
pub const SALT_B64: &str = "AQIDBAUGBwg=";
pub const PASSPHRASE: &str = "correct horse";

static LOGGER: OnceLock<Option<Logger>> = OnceLock::new();

pub fn init_logging() {
    LOGGER.get_or_init(|| {
        Logger::builder().name("confcrypt-facade-tests").level(LevelFilter::WARN).init().ok()
    });
}

/// Writes `body` to `confcrypt.toml` inside a fresh temporary directory.
/// # Panics
/// * If the file cannot be written.
#[must_use]
pub fn settings_file(body: &str) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("confcrypt.toml");
    std::fs::write(&path, body).expect("Failed to write settings file");
    (dir, path)
}

/// Minimal settings with a low iteration count.
#[must_use]
pub fn fast_settings(pooled: bool) -> String {
    format!(
        "[engine]\niterations = 1000\nsalt = \"{SALT_B64}\"\n\n[provider]\npooled = {pooled}\n"
    )
}

pub fn exists(path: &Path) -> bool {
    path.is_file()
}
