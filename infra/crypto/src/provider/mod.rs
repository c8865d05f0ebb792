//! String-level encryption over one engine and one secret key.
//!
//! Two concurrency strategies share the same core:
//!
//! * [`DefaultProvider`] keeps a single lazily-created cipher behind a mutex.
//! * [`PooledProvider`] borrows a cipher from a [`CipherPool`](crate::pool::CipherPool) for
//!   each operation.
//!
//! Destroying a provider waits for in-flight operations to finish, then wipes the key.
//! Operations started afterwards fail with [`CryptoError::State`].

mod default;
mod pooled;
#[cfg(test)]
pub(crate) mod testing;

pub use default::DefaultProvider;
pub use pooled::PooledProvider;

use crate::builder::ProviderBuilder;
use crate::engine::CryptoEngine;
use crate::error::{CryptoError, ErrorKind};
use crate::gcm::AesGcmEngine;
use crate::key::SecretKey;
use crate::pool::PoolStats;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

/// Encrypts and decrypts configuration values.
///
/// Absent values pass through [`CryptoProvider::encrypt_value`] and
/// [`CryptoProvider::decrypt_value`] untouched, even on a destroyed provider.
pub trait CryptoProvider: Send + Sync {
    /// # Errors
    /// * [`CryptoError::State`] if the provider was destroyed.
    /// * Any engine-family error raised while encrypting.
    fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError>;

    /// # Errors
    /// * [`CryptoError::WrongKey`] if the value was sealed under another key or altered.
    /// * [`CryptoError::State`] if the provider was destroyed.
    /// * Any other engine-family error raised while decrypting.
    fn decrypt(&self, ciphertext: &str) -> Result<String, CryptoError>;

    /// Destroys the provider. Calling it again is a no-op.
    ///
    /// # Errors
    /// Returns the failure of destroying an owned engine, if any.
    fn destroy(&self) -> Result<(), CryptoError>;

    fn is_destroyed(&self) -> bool;

    /// Null-safe [`CryptoProvider::encrypt`].
    ///
    /// # Errors
    /// See [`CryptoProvider::encrypt`].
    fn encrypt_value(&self, plaintext: Option<&str>) -> Result<Option<String>, CryptoError> {
        plaintext.map(|p| self.encrypt(p)).transpose()
    }

    /// Null-safe [`CryptoProvider::decrypt`].
    ///
    /// # Errors
    /// See [`CryptoProvider::decrypt`].
    fn decrypt_value(&self, ciphertext: Option<&str>) -> Result<Option<String>, CryptoError> {
        ciphertext.map(|c| self.decrypt(c)).transpose()
    }
}

/// Concurrency strategy of a [`Provider`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    Single,
    Pooled,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Single => "single",
            Self::Pooled => "pooled",
        })
    }
}

/// Engine, key and destroyed flag shared by both strategies.
pub(crate) struct ProviderCore<E: CryptoEngine> {
    engine: Arc<E>,
    key: RwLock<Option<SecretKey>>,
    destroyed: AtomicBool,
    destroy_engine: bool,
}

impl<E: CryptoEngine> ProviderCore<E> {
    pub(crate) fn new(engine: Arc<E>, key: SecretKey, destroy_engine: bool) -> Self {
        Self {
            engine,
            key: RwLock::new(Some(key)),
            destroyed: AtomicBool::new(false),
            destroy_engine,
        }
    }

    pub(crate) fn engine(&self) -> &Arc<E> {
        &self.engine
    }

    /// Runs `op` with the key while holding off destruction.
    pub(crate) fn with_key<T>(
        &self,
        op: impl FnOnce(&E, &SecretKey) -> Result<T, CryptoError>,
    ) -> Result<T, CryptoError> {
        if self.is_destroyed() {
            return Err(provider_destroyed());
        }
        let guard = self.key.read();
        let key = guard.as_ref().ok_or_else(provider_destroyed)?;
        op(&self.engine, key)
    }

    /// Marks the provider destroyed, waits for in-flight operations and wipes the key.
    ///
    /// Returns `Ok(false)` if another call already destroyed it.
    pub(crate) fn destroy(&self) -> Result<bool, CryptoError> {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return Ok(false);
        }

        drop(self.key.write().take());

        // A concurrent destroy through another provider sharing the engine is not a failure.
        if self.destroy_engine
            && let Err(e) = self.engine.destroy()
            && e.kind() != ErrorKind::State
        {
            return Err(e);
        }
        Ok(true)
    }

    pub(crate) fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }
}

impl<E: CryptoEngine> fmt::Debug for ProviderCore<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderCore")
            .field("engine", &self.engine)
            .field("destroyed", &self.is_destroyed())
            .field("destroy_engine", &self.destroy_engine)
            .finish_non_exhaustive()
    }
}

fn provider_destroyed() -> CryptoError {
    CryptoError::state("Crypto provider has been destroyed")
}

#[derive(Debug)]
enum Strategies<E: CryptoEngine> {
    Single(DefaultProvider<E>),
    Pooled(PooledProvider<E>),
}

/// Cheaply clonable handle to a built provider.
///
/// Clones share the same key and cipher state; destroying one destroys all of them.
///
/// # Example
/// ```rust
/// use confcrypt_crypto::prelude::*;
///
/// # fn main() -> Result<(), CryptoError> {
/// let provider = Provider::builder()
///     .engine_config(EngineConfig { iterations: 1_000, ..EngineConfig::with_salt(b"8-bytes!") })?
///     .passphrase("correct horse")
///     .pooled(true)
///     .build()?;
///
/// let sealed = provider.encrypt("db.password=s3cr3t")?;
/// assert_eq!(provider.decrypt(&sealed)?, "db.password=s3cr3t");
/// assert_eq!(provider.encrypt_value(None)?, None);
///
/// provider.destroy()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Provider<E: CryptoEngine = AesGcmEngine> {
    inner: Arc<Strategies<E>>,
}

impl<E: CryptoEngine> Clone for Provider<E> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl Provider<AesGcmEngine> {
    /// Returns a new [`ProviderBuilder`] for the AES/GCM engine.
    #[must_use]
    pub fn builder() -> ProviderBuilder<AesGcmEngine> {
        ProviderBuilder::new()
    }
}

impl<E: CryptoEngine> Provider<E> {
    pub(crate) fn single(provider: DefaultProvider<E>) -> Self {
        Self::announce(Strategy::Single, provider.engine());
        Self { inner: Arc::new(Strategies::Single(provider)) }
    }

    pub(crate) fn pooled(provider: PooledProvider<E>) -> Self {
        Self::announce(Strategy::Pooled, provider.engine());
        Self { inner: Arc::new(Strategies::Pooled(provider)) }
    }

    fn announce(strategy: Strategy, engine: &E) {
        info!(
            %strategy,
            transformation = %engine.config().transformation,
            kdf = %engine.config().kdf_algorithm,
            "Crypto provider built"
        );
    }

    #[must_use]
    pub fn strategy(&self) -> Strategy {
        match &*self.inner {
            Strategies::Single(_) => Strategy::Single,
            Strategies::Pooled(_) => Strategy::Pooled,
        }
    }

    /// The engine this provider drives.
    #[must_use]
    pub fn engine(&self) -> &Arc<E> {
        match &*self.inner {
            Strategies::Single(p) => p.engine(),
            Strategies::Pooled(p) => p.engine(),
        }
    }

    /// Pool counters, for pooled providers.
    #[must_use]
    pub fn pool_stats(&self) -> Option<PoolStats> {
        match &*self.inner {
            Strategies::Single(_) => None,
            Strategies::Pooled(p) => Some(p.pool_stats()),
        }
    }

    fn as_dyn(&self) -> &dyn CryptoProvider {
        match &*self.inner {
            Strategies::Single(p) => p,
            Strategies::Pooled(p) => p,
        }
    }
}

impl<E: CryptoEngine> CryptoProvider for Provider<E> {
    fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        self.as_dyn().encrypt(plaintext)
    }

    fn decrypt(&self, ciphertext: &str) -> Result<String, CryptoError> {
        self.as_dyn().decrypt(ciphertext)
    }

    fn destroy(&self) -> Result<(), CryptoError> {
        self.as_dyn().destroy()
    }

    fn is_destroyed(&self) -> bool {
        self.as_dyn().is_destroyed()
    }
}
