#![allow(dead_code)]

use confcrypt_crypto::prelude::*;
use confcrypt_logger::{LevelFilter, Logger};
use std::sync::OnceLock;

/// Salt of the documented end-to-end scenario.
pub const SCENARIO_SALT: &[u8; 8] = b"\x01\x02\x03\x04\x05\x06\x07\x08";
pub const PASSPHRASE: &str = "correct horse";
pub const WRONG_PASSPHRASE: &str = "wrong horse";
pub const PLAINTEXT: &str = "db.password=s3cr3t";

static LOGGER: OnceLock<Option<Logger>> = OnceLock::new();

/// Installs a warn-level console subscriber once per test binary.
pub fn init_logging() {
    LOGGER.get_or_init(|| {
        Logger::builder().name("confcrypt-tests").level(LevelFilter::WARN).init().ok()
    });
}

/// Engine parameters with a low iteration count to keep the suite fast.
#[must_use]
pub fn fast_config(salt: &[u8]) -> EngineConfig {
    EngineConfig { iterations: 1_024, ..EngineConfig::with_salt(salt) }
}

/// Builds a provider over a fresh engine.
/// # Panics
/// * If the provider cannot be built.
#[must_use]
pub fn provider(passphrase: &str, pooled: bool) -> Provider {
    init_logging();
    Provider::builder()
        .engine_config(fast_config(b"fixture-salt"))
        .expect("valid engine config")
        .passphrase(passphrase)
        .pooled(pooled)
        .build()
        .expect("provider setup failed")
}
