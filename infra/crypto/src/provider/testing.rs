use crate::engine::{CryptoEngine, EngineConfig};
use crate::error::CryptoError;
use crate::gcm::{AesGcmEngine, GcmCipher};
use crate::key::SecretKey;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// AES/GCM engine that counts cipher creations.
#[derive(Debug)]
pub(crate) struct CountingEngine {
    inner: AesGcmEngine,
    ciphers: AtomicUsize,
}

impl CountingEngine {
    pub(crate) fn shared() -> Arc<Self> {
        let config = EngineConfig { iterations: 1_000, ..EngineConfig::with_salt(b"provider-salt") };
        Arc::new(Self {
            inner: AesGcmEngine::new(config).expect("valid engine"),
            ciphers: AtomicUsize::new(0),
        })
    }

    pub(crate) fn created(&self) -> usize {
        self.ciphers.load(Ordering::SeqCst)
    }
}

impl CryptoEngine for CountingEngine {
    type Cipher = GcmCipher;

    fn config(&self) -> &EngineConfig {
        self.inner.config()
    }

    fn derive_key(&self, passphrase: &str) -> Result<SecretKey, CryptoError> {
        self.inner.derive_key(passphrase)
    }

    fn create_cipher(&self) -> Result<GcmCipher, CryptoError> {
        let cipher = self.inner.create_cipher()?;
        self.ciphers.fetch_add(1, Ordering::SeqCst);
        Ok(cipher)
    }

    fn encrypt(
        &self,
        plaintext: &str,
        key: &SecretKey,
        cipher: &mut GcmCipher,
    ) -> Result<String, CryptoError> {
        self.inner.encrypt(plaintext, key, cipher)
    }

    fn decrypt(
        &self,
        ciphertext: &str,
        key: &SecretKey,
        cipher: &mut GcmCipher,
    ) -> Result<String, CryptoError> {
        self.inner.decrypt(ciphertext, key, cipher)
    }

    fn destroy(&self) -> Result<(), CryptoError> {
        self.inner.destroy()
    }

    fn is_destroyed(&self) -> bool {
        self.inner.is_destroyed()
    }
}
