use confcrypt_crypto::pool::{DEFAULT_BORROW_TIMEOUT, DEFAULT_MAX_IDLE, PoolConfig};
use confcrypt_crypto::{CryptoError, EngineConfig, Provider, ProviderBuilder};
use config::{Config, Environment, File, Map};
use serde::Deserialize;
use std::borrow::Cow;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Prefix of environment overrides, e.g. `CONFCRYPT__PROVIDER__PASSPHRASE`.
pub const ENV_PREFIX: &str = "CONFCRYPT";

/// Failures while loading settings or turning them into a provider.
#[confcrypt_derive::confcrypt_error]
pub enum SettingsError {
    #[error("Settings error{}: {source}", format_context(.context))]
    Config { source: config::ConfigError, context: Option<Cow<'static, str>> },

    #[error("Crypto setup failed{}: {source}", format_context(.context))]
    Crypto { source: CryptoError, context: Option<Cow<'static, str>> },
}

impl SettingsError {
    /// The crypto error behind a failed provider setup, if that is what failed.
    #[must_use]
    pub const fn crypto(&self) -> Option<&CryptoError> {
        match self {
            Self::Crypto { source, .. } => Some(source),
            Self::Config { .. } => None,
        }
    }
}

/// Everything needed to build a [`Provider`] from a settings file.
///
/// ```toml
/// [engine]
/// kdf_algorithm = "PBKDF2WithHmacSHA256"
/// iterations = 65536
/// salt = "AQIDBAUGBwg="
///
/// [provider]
/// pooled = true
///
/// [pool]
/// max_total = 16
/// borrow_timeout_ms = 2000
/// ```
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct CryptoSettings {
    pub engine: EngineConfig,
    pub provider: ProviderSettings,
    pub pool: PoolSettings,
}

#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub pooled: bool,
    /// Usually supplied through `CONFCRYPT__PROVIDER__PASSPHRASE` rather than the file.
    pub passphrase: Option<String>,
}

impl fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("pooled", &self.pooled)
            .field("passphrase", &self.passphrase.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    pub max_idle: usize,
    pub max_total: Option<usize>,
    pub idle_timeout_ms: Option<u64>,
    pub borrow_timeout_ms: u64,
    pub eviction_interval_ms: Option<u64>,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_idle: DEFAULT_MAX_IDLE,
            max_total: None,
            idle_timeout_ms: None,
            borrow_timeout_ms: u64::try_from(DEFAULT_BORROW_TIMEOUT.as_millis()).unwrap_or(u64::MAX),
            eviction_interval_ms: None,
        }
    }
}

impl From<&PoolSettings> for PoolConfig {
    fn from(settings: &PoolSettings) -> Self {
        Self {
            max_idle: settings.max_idle,
            max_total: settings.max_total,
            idle_timeout: settings.idle_timeout_ms.map(Duration::from_millis),
            borrow_timeout: Duration::from_millis(settings.borrow_timeout_ms),
            eviction_interval: settings.eviction_interval_ms.map(Duration::from_millis),
        }
    }
}

impl CryptoSettings {
    /// Turns the settings into a configured builder over an owned AES/GCM engine.
    ///
    /// # Errors
    /// Returns [`SettingsError::Crypto`] if the engine settings are invalid.
    pub fn into_builder(self) -> Result<ProviderBuilder, SettingsError> {
        let pool = PoolConfig::from(&self.pool);
        let mut builder = Provider::builder()
            .engine_config(self.engine)
            .context("Invalid engine settings")?
            .pooled(self.provider.pooled)
            .pool_config(pool);
        if let Some(passphrase) = self.provider.passphrase {
            builder = builder.passphrase(passphrase);
        }
        Ok(builder)
    }

    /// Builds the provider described by these settings.
    ///
    /// # Errors
    /// Returns [`SettingsError::Crypto`] if the settings are invalid, the passphrase is
    /// missing, or key derivation fails.
    pub fn build_provider(self) -> Result<Provider, SettingsError> {
        self.into_builder()?.build().context("Failed to build crypto provider")
    }
}

impl fmt::Debug for CryptoSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CryptoSettings")
            .field("engine", &self.engine)
            .field("provider", &self.provider)
            .field("pool", &self.pool)
            .finish()
    }
}

/// Loads [`CryptoSettings`] from a file layered with environment overrides.
///
/// The file is required; its format follows the extension (`.toml`, `.json`, `.yaml`, ...).
/// Without a path, `confcrypt` in the working directory is used. Environment variables
/// prefixed with `CONFCRYPT__` override file values, with `__` separating nested keys
/// (`CONFCRYPT__POOL__MAX_TOTAL` maps to `pool.max_total`).
///
/// # Errors
/// Returns [`SettingsError::Config`] if the file is missing or malformed, or if a value
/// does not fit its field (a salt that is not base64 included).
pub fn load_settings(path: Option<impl AsRef<Path>>) -> Result<CryptoSettings, SettingsError> {
    load(path, environment())
}

/// Same as [`load_settings`], but reads overrides from `vars` instead of the process
/// environment. Keys keep the `CONFCRYPT__` prefix.
///
/// # Errors
/// See [`load_settings`].
pub fn load_settings_with_env<K, V>(
    path: Option<impl AsRef<Path>>,
    vars: impl IntoIterator<Item = (K, V)>,
) -> Result<CryptoSettings, SettingsError>
where
    K: Into<String>,
    V: Into<String>,
{
    let vars: Map<String, String> = vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
    load(path, environment().source(Some(vars)))
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX).separator("__").convert_case(config::Case::Snake)
}

fn load(
    path: Option<impl AsRef<Path>>,
    environment: Environment,
) -> Result<CryptoSettings, SettingsError> {
    let effective_path =
        path.map_or_else(|| PathBuf::from("confcrypt"), |p| p.as_ref().to_path_buf());

    let builder = Config::builder()
        .add_source(File::from(effective_path.as_path()).required(true))
        .add_source(environment);

    info!("Loading crypto settings from {}", effective_path.display());

    let settings = builder
        .build()
        .context("Failed to build settings")?
        .try_deserialize::<CryptoSettings>()
        .context("Failed to deserialize settings")?;

    Ok(settings)
}
