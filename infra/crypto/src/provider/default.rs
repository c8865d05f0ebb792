use crate::engine::CryptoEngine;
use crate::error::CryptoError;
use crate::key::SecretKey;
use crate::provider::{CryptoProvider, ProviderCore};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Provider that serializes every operation on one lazily-created cipher.
///
/// The lock covers the cipher only; key lookup and destroy coordination happen in the
/// shared core.
pub struct DefaultProvider<E: CryptoEngine> {
    core: ProviderCore<E>,
    cipher: Mutex<Option<E::Cipher>>,
}

impl<E: CryptoEngine> DefaultProvider<E> {
    pub(crate) fn new(engine: Arc<E>, key: SecretKey, destroy_engine: bool) -> Self {
        Self { core: ProviderCore::new(engine, key, destroy_engine), cipher: Mutex::new(None) }
    }

    pub(crate) fn engine(&self) -> &Arc<E> {
        self.core.engine()
    }

    fn run<T>(
        &self,
        op: impl FnOnce(&E, &SecretKey, &mut E::Cipher) -> Result<T, CryptoError>,
    ) -> Result<T, CryptoError> {
        self.core.with_key(|engine, key| {
            let mut slot = self.cipher.lock();
            let cipher = match &mut *slot {
                Some(cipher) => cipher,
                empty => empty.insert(engine.create_cipher()?),
            };
            op(engine, key, cipher)
        })
    }
}

impl<E: CryptoEngine> CryptoProvider for DefaultProvider<E> {
    fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        self.run(|engine, key, cipher| engine.encrypt(plaintext, key, cipher))
    }

    fn decrypt(&self, ciphertext: &str) -> Result<String, CryptoError> {
        self.run(|engine, key, cipher| engine.decrypt(ciphertext, key, cipher))
    }

    fn destroy(&self) -> Result<(), CryptoError> {
        if self.core.destroy()? {
            drop(self.cipher.lock().take());
            info!(strategy = "single", "Crypto provider destroyed");
        }
        Ok(())
    }

    fn is_destroyed(&self) -> bool {
        self.core.is_destroyed()
    }
}

impl<E: CryptoEngine> fmt::Debug for DefaultProvider<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefaultProvider")
            .field("core", &self.core)
            .field("cipher_cached", &self.cipher.lock().is_some())
            .finish()
    }
}
