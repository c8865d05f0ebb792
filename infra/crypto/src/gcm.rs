//! AES in Galois/Counter Mode.
//!
//! ## Wire format
//!
//! ```text
//! base64( [IV(iv_len)][CIPHERTEXT(N)][TAG(tag_len)] )
//! ```
//!
//! Standard alphabet with padding. IV and tag lengths are fixed per engine and must match
//! between the encrypting and the decrypting side.

use crate::engine::{CipherMode, CryptoEngine, EngineConfig, KdfAlgorithm};
use crate::error::CryptoError;
use crate::key::{KeyAlgorithm, SecretKey};
use crate::rng::SecureRandom;
use aead::consts::{U12, U13, U14, U15, U16};
use aead::inout::InOutBuf;
use aead::{AeadInOut, KeyInit, Nonce, Tag};
use aes_gcm::AesGcm;
use aes_gcm::aes::{Aes128, Aes192, Aes256};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use parking_lot::RwLock;
use sha2::{Sha256, Sha512};
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

const SUPPORTED_TRANSFORMATION: &str = "AES/GCM/NoPadding";

/// Keyed AEAD primitive with runtime IV and tag lengths.
trait GcmOps: Send + Sync {
    /// Encrypts `buf[iv_len..]` in place and appends the tag. `buf` starts with the IV.
    fn seal(&self, iv_len: usize, buf: &mut Vec<u8>) -> Result<(), aead::Error>;

    /// Verifies and decrypts `body` in place.
    fn open(&self, iv: &[u8], body: &mut [u8], tag: &[u8]) -> Result<(), aead::Error>;
}

impl<C> GcmOps for C
where
    C: AeadInOut + Send + Sync,
{
    fn seal(&self, iv_len: usize, buf: &mut Vec<u8>) -> Result<(), aead::Error> {
        let (iv, body) = buf.split_at_mut(iv_len);
        let nonce: Nonce<C> = (&*iv).try_into().map_err(|_| aead::Error)?;
        let tag = self.encrypt_inout_detached(&nonce, &[], InOutBuf::from(body))?;
        buf.extend_from_slice(tag.as_slice());
        Ok(())
    }

    fn open(&self, iv: &[u8], body: &mut [u8], tag: &[u8]) -> Result<(), aead::Error> {
        let nonce: Nonce<C> = iv.try_into().map_err(|_| aead::Error)?;
        let tag: Tag<C> = tag.try_into().map_err(|_| aead::Error)?;
        self.decrypt_inout_detached(&nonce, &[], InOutBuf::from(body), &tag)
    }
}

fn keyed<C>(key: &[u8]) -> Result<Box<dyn GcmOps>, CryptoError>
where
    C: AeadInOut + KeyInit + ZeroizeOnDrop + Send + Sync + 'static,
{
    let cipher = C::new_from_slice(key).map_err(|_| {
        CryptoError::engine(format!("Invalid key length {} for AES/GCM", key.len()))
    })?;
    Ok(Box::new(cipher))
}

macro_rules! by_tag {
    ($aes:ty, $iv:ty, $tag_len:expr, $key:expr) => {
        match $tag_len {
            12 => keyed::<AesGcm<$aes, $iv, U12>>($key),
            13 => keyed::<AesGcm<$aes, $iv, U13>>($key),
            14 => keyed::<AesGcm<$aes, $iv, U14>>($key),
            15 => keyed::<AesGcm<$aes, $iv, U15>>($key),
            16 => keyed::<AesGcm<$aes, $iv, U16>>($key),
            other => Err(CryptoError::engine(format!("Unsupported GCM tag length {other}"))),
        }
    };
}

macro_rules! by_iv {
    ($aes:ty, $iv_len:expr, $tag_len:expr, $key:expr) => {
        match $iv_len {
            12 => by_tag!($aes, U12, $tag_len, $key),
            16 => by_tag!($aes, U16, $tag_len, $key),
            other => Err(CryptoError::engine(format!("Unsupported GCM IV length {other}"))),
        }
    };
}

fn keyed_ops(key: &[u8], iv_len: usize, tag_len: usize) -> Result<Box<dyn GcmOps>, CryptoError> {
    match key.len() {
        16 => by_iv!(Aes128, iv_len, tag_len, key),
        24 => by_iv!(Aes192, iv_len, tag_len, key),
        32 => by_iv!(Aes256, iv_len, tag_len, key),
        other => Err(CryptoError::engine(format!("Invalid key length {other} for AES/GCM"))),
    }
}

struct Keyed {
    key_id: u64,
    ops: Box<dyn GcmOps>,
}

/// Cipher handle created by [`AesGcmEngine::create_cipher`].
///
/// Holds the expanded key schedule of the last key it was used with; using it with another
/// key re-keys it. IVs are never cached.
pub struct GcmCipher {
    transformation: &'static str,
    mode: Option<CipherMode>,
    keyed: Option<Keyed>,
}

impl GcmCipher {
    const fn new() -> Self {
        Self { transformation: SUPPORTED_TRANSFORMATION, mode: None, keyed: None }
    }

    #[must_use]
    pub const fn transformation(&self) -> &'static str {
        self.transformation
    }

    /// Mode of the most recent initialization, `None` until first use.
    #[must_use]
    pub const fn mode(&self) -> Option<CipherMode> {
        self.mode
    }

    /// Identity of the key the cached schedule belongs to.
    #[must_use]
    pub fn key_id(&self) -> Option<u64> {
        self.keyed.as_ref().map(|k| k.key_id)
    }

    fn init(
        &mut self,
        mode: CipherMode,
        key: &SecretKey,
        config: &EngineConfig,
    ) -> Result<&dyn GcmOps, CryptoError> {
        if key.algorithm() != KeyAlgorithm::Aes {
            return Err(CryptoError::engine(format!(
                "Key algorithm {} does not match {}",
                key.algorithm(),
                self.transformation
            )));
        }

        self.mode = Some(mode);
        let keyed = match self.keyed.take() {
            Some(keyed) if keyed.key_id == key.id() => keyed,
            _ => Keyed {
                key_id: key.id(),
                ops: keyed_ops(key.expose_secret(), config.iv_len, config.tag_len)?,
            },
        };
        Ok(self.keyed.insert(keyed).ops.as_ref())
    }
}

impl fmt::Debug for GcmCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GcmCipher")
            .field("transformation", &self.transformation)
            .field("mode", &self.mode)
            .field("key_id", &self.key_id())
            .finish()
    }
}

struct EngineState {
    salt: Zeroizing<Vec<u8>>,
    rng: Option<Arc<SecureRandom>>,
}

impl EngineState {
    fn rng(&self) -> Result<&SecureRandom, CryptoError> {
        self.rng.as_deref().ok_or_else(destroyed)
    }
}

fn destroyed() -> CryptoError {
    CryptoError::state("Crypto engine has been destroyed")
}

/// PBKDF2 + AES/GCM engine.
///
/// # Example
/// ```rust
/// use confcrypt_crypto::{AesGcmEngine, CryptoEngine, EngineConfig};
///
/// # fn main() -> Result<(), confcrypt_crypto::CryptoError> {
/// let engine = AesGcmEngine::new(EngineConfig { iterations: 1_000, ..EngineConfig::with_salt(b"8-bytes!") })?;
/// let key = engine.derive_key("correct horse")?;
/// let mut cipher = engine.create_cipher()?;
///
/// let sealed = engine.encrypt("db.password=s3cr3t", &key, &mut cipher)?;
/// assert_eq!(engine.decrypt(&sealed, &key, &mut cipher)?, "db.password=s3cr3t");
/// # Ok(())
/// # }
/// ```
pub struct AesGcmEngine {
    config: EngineConfig,
    state: RwLock<EngineState>,
}

impl AesGcmEngine {
    /// Validates `config` and creates the engine.
    ///
    /// The salt is moved out of `config` into engine-owned memory that is wiped on destroy;
    /// [`CryptoEngine::config`] therefore reports an empty salt.
    ///
    /// # Errors
    /// Returns [`CryptoError::Configuration`] for an empty salt, a non-AES key algorithm, or
    /// unsupported key, IV or tag lengths.
    pub fn new(mut config: EngineConfig) -> Result<Self, CryptoError> {
        validate(&config)?;
        let salt = Zeroizing::new(std::mem::take(&mut config.salt));

        debug!(
            kdf = %config.kdf_algorithm,
            transformation = %config.transformation,
            key_bits = config.key_bits,
            iv_len = config.iv_len,
            tag_len = config.tag_len,
            "AES/GCM engine created"
        );

        Ok(Self {
            config,
            state: RwLock::new(EngineState { salt, rng: Some(SecureRandom::shared()) }),
        })
    }

    /// Default parameters with the given salt.
    ///
    /// # Errors
    /// Returns [`CryptoError::Configuration`] if `salt` is empty.
    pub fn with_salt(salt: impl AsRef<[u8]>) -> Result<Self, CryptoError> {
        Self::new(EngineConfig::with_salt(salt))
    }
}

fn validate(config: &EngineConfig) -> Result<(), CryptoError> {
    if config.salt.is_empty() {
        return Err(CryptoError::configuration("Salt must not be empty"));
    }
    if !config.key_algorithm.eq_ignore_ascii_case(KeyAlgorithm::Aes.name()) {
        return Err(CryptoError::configuration(format!(
            "Unsupported key algorithm '{}'",
            config.key_algorithm
        )));
    }
    if !matches!(config.key_bits, 128 | 192 | 256) {
        return Err(CryptoError::configuration(format!(
            "Unsupported key size {} bits, expected 128, 192 or 256",
            config.key_bits
        )));
    }
    if !matches!(config.iv_len, 12 | 16) {
        return Err(CryptoError::configuration(format!(
            "Unsupported IV length {} bytes, expected 12 or 16",
            config.iv_len
        )));
    }
    if !(12..=16).contains(&config.tag_len) {
        return Err(CryptoError::configuration(format!(
            "Unsupported tag length {} bytes, expected 12 to 16",
            config.tag_len
        )));
    }
    Ok(())
}

impl CryptoEngine for AesGcmEngine {
    type Cipher = GcmCipher;

    fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn derive_key(&self, passphrase: &str) -> Result<SecretKey, CryptoError> {
        let state = self.state.read();
        if state.rng.is_none() {
            return Err(destroyed());
        }
        if passphrase.is_empty() {
            return Err(CryptoError::key_derivation("Passphrase must not be empty"));
        }
        if self.config.iterations == 0 {
            return Err(CryptoError::key_derivation("Iteration count must be positive"));
        }

        let mut out = vec![0u8; self.config.key_len()];
        match self.config.kdf_algorithm {
            KdfAlgorithm::Pbkdf2HmacSha256 => pbkdf2::pbkdf2_hmac::<Sha256>(
                passphrase.as_bytes(),
                &state.salt,
                self.config.iterations,
                &mut out,
            ),
            KdfAlgorithm::Pbkdf2HmacSha512 => pbkdf2::pbkdf2_hmac::<Sha512>(
                passphrase.as_bytes(),
                &state.salt,
                self.config.iterations,
                &mut out,
            ),
        }

        Ok(SecretKey::from_parts(KeyAlgorithm::Aes, out))
    }

    fn create_cipher(&self) -> Result<GcmCipher, CryptoError> {
        if self.is_destroyed() {
            return Err(destroyed());
        }
        if self.config.transformation != SUPPORTED_TRANSFORMATION {
            return Err(CryptoError::Engine {
                message: format!("Unsupported transformation '{}'", self.config.transformation)
                    .into(),
                context: Some("creating cipher".into()),
            });
        }

        debug!(transformation = SUPPORTED_TRANSFORMATION, "Cipher created");
        Ok(GcmCipher::new())
    }

    fn encrypt(
        &self,
        plaintext: &str,
        key: &SecretKey,
        cipher: &mut GcmCipher,
    ) -> Result<String, CryptoError> {
        let state = self.state.read();
        let rng = state.rng()?;
        let ops = cipher.init(CipherMode::Encrypt, key, &self.config)?;

        let iv_len = self.config.iv_len;
        let mut buf = Zeroizing::new(Vec::with_capacity(
            iv_len + plaintext.len() + self.config.tag_len,
        ));
        buf.resize(iv_len, 0);
        rng.fill(&mut buf)?;
        buf.extend_from_slice(plaintext.as_bytes());

        ops.seal(iv_len, &mut buf)
            .map_err(|_| CryptoError::engine("AES/GCM encryption failed"))?;

        Ok(STANDARD.encode(buf.as_slice()))
    }

    fn decrypt(
        &self,
        ciphertext: &str,
        key: &SecretKey,
        cipher: &mut GcmCipher,
    ) -> Result<String, CryptoError> {
        let state = self.state.read();
        state.rng()?;

        let mut blob = STANDARD.decode(ciphertext.trim()).map_err(|source| {
            CryptoError::Encoding { source, context: Some("decoding ciphertext".into()) }
        })?;

        let (iv_len, tag_len) = (self.config.iv_len, self.config.tag_len);
        if blob.len() < iv_len + tag_len {
            return Err(CryptoError::Engine {
                message: format!(
                    "Ciphertext too short ({} bytes). Expected at least {} bytes",
                    blob.len(),
                    iv_len + tag_len
                )
                .into(),
                context: None,
            });
        }

        let ops = cipher.init(CipherMode::Decrypt, key, &self.config)?;

        let (iv, rest) = blob.split_at_mut(iv_len);
        let (body, tag) = rest.split_at_mut(rest.len() - tag_len);
        if ops.open(iv, body, tag).is_err() {
            debug!(kind = %crate::error::ErrorKind::WrongKey, "AES/GCM authentication failed");
            return Err(CryptoError::WrongKey { context: None });
        }

        let plain_len = body.len();
        blob.copy_within(iv_len..iv_len + plain_len, 0);
        blob.truncate(plain_len);

        String::from_utf8(blob).map_err(|e| {
            let mut bytes = e.into_bytes();
            bytes.zeroize();
            CryptoError::engine("Decrypted value is not valid UTF-8")
        })
    }

    fn destroy(&self) -> Result<(), CryptoError> {
        let mut state = self.state.write();
        if state.rng.take().is_none() {
            return Err(destroyed());
        }
        state.salt.zeroize();
        debug!("AES/GCM engine destroyed");
        Ok(())
    }

    fn is_destroyed(&self) -> bool {
        self.state.read().rng.is_none()
    }
}

impl fmt::Debug for AesGcmEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AesGcmEngine")
            .field("config", &self.config)
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}
