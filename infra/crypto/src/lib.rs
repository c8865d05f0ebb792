//! Reversible protection of configuration property values.
//!
//! This crate derives a symmetric key from a passphrase with PBKDF2, encrypts string values
//! with AES/GCM, and wraps both in providers that are safe to drive from many threads.
//!
//! ## Ciphertext Format
//!
//! ```text
//! base64( [IV][CIPHERTEXT][TAG] )
//! ```
//!
//! Standard base64 alphabet with padding. Defaults: 12-byte IV, 16-byte tag, 256-bit key,
//! 65 536 PBKDF2-HMAC-SHA256 iterations. Every encryption draws a fresh random IV from the
//! process-wide [`SecureRandom`] source.
//!
//! ## Concurrency Strategies
//!
//! * **Single**: one cipher, created on first use and guarded by a mutex.
//! * **Pooled**: ciphers are borrowed from a bounded [`CipherPool`](pool::CipherPool) for each
//!   operation and returned afterwards, even on failure.
//!
//! ## Destruction
//!
//! [`CryptoProvider::destroy`] waits for in-flight operations, wipes the key and, for engines
//! the builder created, wipes the engine salt. Every later operation fails with
//! [`CryptoError::State`]. Destroying twice is harmless.
//!
//! ## Example
//! ```rust
//! use confcrypt_crypto::prelude::*;
//!
//! # fn main() -> Result<(), CryptoError> {
//! let provider = Provider::builder()
//!     .salt(b"8-bytes!")?
//!     .passphrase("correct horse")
//!     .build()?;
//!
//! let sealed = provider.encrypt("db.password=s3cr3t")?;
//! assert_eq!(provider.decrypt(&sealed)?, "db.password=s3cr3t");
//!
//! let wrong = Provider::builder().salt(b"8-bytes!")?.passphrase("wrong horse").build()?;
//! assert_eq!(wrong.decrypt(&sealed).unwrap_err().kind(), ErrorKind::WrongKey);
//! # Ok(())
//! # }
//! ```

mod builder;
mod engine;
mod error;
mod gcm;
mod key;
pub mod pool;
mod provider;
mod rng;

pub use builder::ProviderBuilder;
pub use engine::{
    CipherMode, CryptoEngine, DEFAULT_ITERATIONS, DEFAULT_IV_LEN, DEFAULT_KEY_BITS,
    DEFAULT_TAG_LEN, DEFAULT_TRANSFORMATION, EngineConfig, KdfAlgorithm,
};
pub use error::{CryptoError, CryptoErrorExt, ErrorKind};
pub use gcm::{AesGcmEngine, GcmCipher};
pub use key::{KeyAlgorithm, SecretKey};
pub use provider::{CryptoProvider, DefaultProvider, PooledProvider, Provider, Strategy};
pub use rng::SecureRandom;

pub mod prelude {
    pub use crate::builder::ProviderBuilder;
    pub use crate::engine::{CryptoEngine, EngineConfig, KdfAlgorithm};
    pub use crate::error::{CryptoError, CryptoErrorExt, ErrorKind};
    pub use crate::gcm::AesGcmEngine;
    pub use crate::key::SecretKey;
    pub use crate::pool::PoolConfig;
    pub use crate::provider::{CryptoProvider, Provider, Strategy};
}
