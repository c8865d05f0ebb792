use crate::engine::{CryptoEngine, EngineConfig};
use crate::error::CryptoError;
use crate::gcm::AesGcmEngine;
use crate::key::SecretKey;
use crate::pool::PoolConfig;
use crate::provider::{DefaultProvider, PooledProvider, Provider};
use std::fmt;
use std::sync::Arc;
use zeroize::Zeroizing;

enum KeySource {
    Key(SecretKey),
    Passphrase(Zeroizing<String>),
}

/// Assembles an engine, a key and a concurrency strategy into a [`Provider`].
///
/// The builder is the only way to construct a provider. It holds key material until
/// [`ProviderBuilder::build`] consumes it; a passphrase is wiped as soon as the key has been
/// derived from it, or when the builder is dropped.
///
/// # Example
/// ```rust
/// use confcrypt_crypto::prelude::*;
/// use std::sync::Arc;
///
/// # fn main() -> Result<(), CryptoError> {
/// let engine = Arc::new(AesGcmEngine::new(EngineConfig {
///     iterations: 1_000,
///     ..EngineConfig::with_salt(b"8-bytes!")
/// })?);
///
/// let provider = ProviderBuilder::new()
///     .engine(Arc::clone(&engine))
///     .passphrase("correct horse")
///     .build()?;
///
/// assert_eq!(provider.strategy(), Strategy::Single);
/// provider.destroy()?;
/// assert!(!engine.is_destroyed(), "external engines outlive their providers by default");
/// # Ok(())
/// # }
/// ```
pub struct ProviderBuilder<E: CryptoEngine = AesGcmEngine> {
    engine: Option<Arc<E>>,
    owned_engine: bool,
    key: Option<KeySource>,
    pooled: bool,
    pool_config: PoolConfig,
    destroy_engine: Option<bool>,
}

impl<E: CryptoEngine> Default for ProviderBuilder<E> {
    fn default() -> Self {
        Self {
            engine: None,
            owned_engine: false,
            key: None,
            pooled: false,
            pool_config: PoolConfig::default(),
            destroy_engine: None,
        }
    }
}

impl<E: CryptoEngine> ProviderBuilder<E> {
    #[must_use = "Builder must be configured with an engine and a key before use"]
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses an existing, possibly shared, engine.
    ///
    /// Providers do not destroy external engines unless [`ProviderBuilder::destroy_engine`]
    /// says otherwise.
    #[must_use]
    pub fn engine(mut self, engine: Arc<E>) -> Self {
        self.engine = Some(engine);
        self.owned_engine = false;
        self
    }

    /// Uses `key` directly. Replaces any passphrase set earlier.
    #[must_use]
    pub fn key(mut self, key: SecretKey) -> Self {
        self.key = Some(KeySource::Key(key));
        self
    }

    /// Derives the key from `passphrase` at build time. Replaces any key set earlier.
    #[must_use]
    pub fn passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.key = Some(KeySource::Passphrase(Zeroizing::new(passphrase.into())));
        self
    }

    /// Selects the pooled strategy instead of the single shared cipher.
    #[must_use]
    pub const fn pooled(mut self, pooled: bool) -> Self {
        self.pooled = pooled;
        self
    }

    /// Pool settings, used when [`ProviderBuilder::pooled`] is enabled.
    #[must_use]
    pub const fn pool_config(mut self, config: PoolConfig) -> Self {
        self.pool_config = config;
        self
    }

    /// Whether destroying the provider also destroys its engine.
    ///
    /// Defaults to `true` for engines built by this builder and `false` for engines passed
    /// to [`ProviderBuilder::engine`].
    #[must_use]
    pub const fn destroy_engine(mut self, destroy: bool) -> Self {
        self.destroy_engine = Some(destroy);
        self
    }

    /// Consumes the builder and creates the provider.
    ///
    /// # Errors
    /// * [`CryptoError::Configuration`] if no engine or no key was set, or the pool settings
    ///   are invalid.
    /// * [`CryptoError::KeyDerivation`] if deriving the key from the passphrase fails.
    pub fn build(self) -> Result<Provider<E>, CryptoError> {
        let Some(engine) = self.engine else {
            return Err(CryptoError::configuration("No crypto engine configured"));
        };
        let key = match self.key {
            Some(KeySource::Key(key)) => key,
            Some(KeySource::Passphrase(passphrase)) => engine.derive_key(&passphrase)?,
            None => {
                return Err(CryptoError::configuration("No secret key or passphrase configured"));
            },
        };
        let destroy_engine = self.destroy_engine.unwrap_or(self.owned_engine);

        if self.pooled {
            PooledProvider::new(engine, key, self.pool_config, destroy_engine).map(Provider::pooled)
        } else {
            Ok(Provider::single(DefaultProvider::new(engine, key, destroy_engine)))
        }
    }
}

impl ProviderBuilder<AesGcmEngine> {
    /// Builds an AES/GCM engine with default parameters and the given salt.
    ///
    /// # Errors
    /// Returns [`CryptoError::Configuration`] if `salt` is empty.
    pub fn salt(self, salt: impl AsRef<[u8]>) -> Result<Self, CryptoError> {
        self.engine_config(EngineConfig::with_salt(salt))
    }

    /// Builds an AES/GCM engine from `config`, salt included.
    ///
    /// # Errors
    /// Returns [`CryptoError::Configuration`] if `config` is invalid.
    pub fn engine_config(mut self, config: EngineConfig) -> Result<Self, CryptoError> {
        self.engine = Some(Arc::new(AesGcmEngine::new(config)?));
        self.owned_engine = true;
        Ok(self)
    }
}

impl<E: CryptoEngine> fmt::Debug for ProviderBuilder<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = match &self.key {
            Some(KeySource::Key(_)) => "key",
            Some(KeySource::Passphrase(_)) => "passphrase",
            None => "none",
        };
        f.debug_struct("ProviderBuilder")
            .field("engine", &self.engine)
            .field("owned_engine", &self.owned_engine)
            .field("key", &key)
            .field("pooled", &self.pooled)
            .field("pool_config", &self.pool_config)
            .field("destroy_engine", &self.destroy_engine)
            .finish()
    }
}
