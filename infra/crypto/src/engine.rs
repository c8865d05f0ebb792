use crate::error::CryptoError;
use crate::key::{KeyAlgorithm, SecretKey};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_ITERATIONS: u32 = 65_536;
pub const DEFAULT_KEY_BITS: u32 = 256;
pub const DEFAULT_IV_LEN: usize = 12;
pub const DEFAULT_TAG_LEN: usize = 16;
pub const DEFAULT_TRANSFORMATION: &str = "AES/GCM/NoPadding";

/// Password-based key derivation function used by [`CryptoEngine::derive_key`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
pub enum KdfAlgorithm {
    #[default]
    #[serde(rename = "PBKDF2WithHmacSHA256")]
    Pbkdf2HmacSha256,
    #[serde(rename = "PBKDF2WithHmacSHA512")]
    Pbkdf2HmacSha512,
}

impl KdfAlgorithm {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Pbkdf2HmacSha256 => "PBKDF2WithHmacSHA256",
            Self::Pbkdf2HmacSha512 => "PBKDF2WithHmacSHA512",
        }
    }
}

impl fmt::Display for KdfAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for KdfAlgorithm {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Self::Pbkdf2HmacSha256, Self::Pbkdf2HmacSha512]
            .into_iter()
            .find(|kdf| kdf.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| CryptoError::configuration(format!("Unsupported KDF algorithm '{s}'")))
    }
}

/// Whether a cipher was last initialized for encryption or decryption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherMode {
    Encrypt,
    Decrypt,
}

/// Parameters of a crypto engine.
///
/// Deserializable with defaults for every field; `salt` is read as standard base64 text.
/// Engines validate the record when they are constructed and never change it afterwards,
/// except for wiping the salt on destroy.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub kdf_algorithm: KdfAlgorithm,
    pub key_algorithm: String,
    pub transformation: String,
    pub iterations: u32,
    pub key_bits: u32,
    pub iv_len: usize,
    pub tag_len: usize,
    #[serde(deserialize_with = "deserialize_salt")]
    pub salt: Vec<u8>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            kdf_algorithm: KdfAlgorithm::default(),
            key_algorithm: KeyAlgorithm::Aes.name().to_owned(),
            transformation: DEFAULT_TRANSFORMATION.to_owned(),
            iterations: DEFAULT_ITERATIONS,
            key_bits: DEFAULT_KEY_BITS,
            iv_len: DEFAULT_IV_LEN,
            tag_len: DEFAULT_TAG_LEN,
            salt: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Default parameters with the given salt.
    #[must_use]
    pub fn with_salt(salt: impl AsRef<[u8]>) -> Self {
        Self { salt: salt.as_ref().to_vec(), ..Self::default() }
    }

    /// Derived key length in bytes.
    #[must_use]
    pub const fn key_len(&self) -> usize {
        (self.key_bits / 8) as usize
    }
}

impl fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConfig")
            .field("kdf_algorithm", &self.kdf_algorithm)
            .field("key_algorithm", &self.key_algorithm)
            .field("transformation", &self.transformation)
            .field("iterations", &self.iterations)
            .field("key_bits", &self.key_bits)
            .field("iv_len", &self.iv_len)
            .field("tag_len", &self.tag_len)
            .field("salt_len", &self.salt.len())
            .finish()
    }
}

fn deserialize_salt<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    STANDARD.decode(text.trim()).map_err(serde::de::Error::custom)
}

/// Key derivation plus authenticated encryption of string values.
///
/// An engine is shared by providers through an [`Arc`](std::sync::Arc) and must be safe to
/// call from many threads at once. Per-operation mutable state lives in [`Self::Cipher`],
/// which callers create with [`CryptoEngine::create_cipher`] and hold exclusively while an
/// operation runs.
///
/// After [`CryptoEngine::destroy`] every method fails with [`CryptoError::State`].
pub trait CryptoEngine: Send + Sync + fmt::Debug + 'static {
    /// Mutable cipher instance, initialized afresh for every operation.
    type Cipher: Send + 'static;

    fn config(&self) -> &EngineConfig;

    /// Derives a key from `passphrase` and the engine salt.
    ///
    /// # Errors
    /// * [`CryptoError::KeyDerivation`] for an empty passphrase or unusable parameters.
    /// * [`CryptoError::State`] if the engine was destroyed.
    fn derive_key(&self, passphrase: &str) -> Result<SecretKey, CryptoError>;

    /// Creates an uninitialized cipher for the configured transformation.
    ///
    /// # Errors
    /// * [`CryptoError::Engine`] if the transformation is not supported.
    /// * [`CryptoError::State`] if the engine was destroyed.
    fn create_cipher(&self) -> Result<Self::Cipher, CryptoError>;

    /// Encrypts `plaintext` under a fresh random IV.
    ///
    /// # Errors
    /// * [`CryptoError::Engine`] if the cipher cannot be initialized or the RNG fails.
    /// * [`CryptoError::State`] if the engine was destroyed.
    fn encrypt(
        &self,
        plaintext: &str,
        key: &SecretKey,
        cipher: &mut Self::Cipher,
    ) -> Result<String, CryptoError>;

    /// Decrypts a value produced by [`CryptoEngine::encrypt`].
    ///
    /// # Errors
    /// * [`CryptoError::WrongKey`] if tag verification fails.
    /// * [`CryptoError::Engine`] or [`CryptoError::Encoding`] for malformed input.
    /// * [`CryptoError::State`] if the engine was destroyed.
    fn decrypt(
        &self,
        ciphertext: &str,
        key: &SecretKey,
        cipher: &mut Self::Cipher,
    ) -> Result<String, CryptoError>;

    /// Marks the engine unusable and wipes its salt.
    ///
    /// # Errors
    /// Returns [`CryptoError::State`] if the engine was already destroyed.
    fn destroy(&self) -> Result<(), CryptoError>;

    fn is_destroyed(&self) -> bool;
}
