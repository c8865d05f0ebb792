use crate::error::CryptoError;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use zeroize::{Zeroize, ZeroizeOnDrop};

static NEXT_KEY_ID: AtomicU64 = AtomicU64::new(1);

/// Symmetric algorithm a [`SecretKey`] is tagged with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyAlgorithm {
    Aes,
}

impl KeyAlgorithm {
    /// Canonical algorithm name, as used in engine configuration.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Aes => "AES",
        }
    }

    /// Returns `true` if `len` bytes is a valid key size for this algorithm.
    #[must_use]
    pub const fn accepts_len(self, len: usize) -> bool {
        match self {
            Self::Aes => matches!(len, 16 | 24 | 32),
        }
    }
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Opaque symmetric key material.
///
/// The bytes are wiped when the key is dropped. A key is deliberately not `Clone`: the
/// provider that receives it owns the only copy and destroys it together with itself.
///
/// Every key carries a process-unique identity so that cipher handles can cache the
/// expanded key schedule and notice when they are used with a different key.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SecretKey {
    bytes: Vec<u8>,
    #[zeroize(skip)]
    algorithm: KeyAlgorithm,
    #[zeroize(skip)]
    id: u64,
}

impl SecretKey {
    /// Wraps raw key material.
    ///
    /// The input buffer is moved into the key; no copy is left behind.
    ///
    /// # Errors
    /// Returns [`CryptoError::Configuration`] if the length is invalid for `algorithm`.
    pub fn new(algorithm: KeyAlgorithm, mut bytes: Vec<u8>) -> Result<Self, CryptoError> {
        if !algorithm.accepts_len(bytes.len()) {
            let len = bytes.len();
            bytes.zeroize();
            return Err(CryptoError::configuration(format!(
                "Invalid {algorithm} key length {len} bytes, expected 16, 24 or 32"
            )));
        }
        Ok(Self::from_parts(algorithm, bytes))
    }

    /// Copies `bytes` into a new AES key.
    ///
    /// # Errors
    /// Returns [`CryptoError::Configuration`] if `bytes` is not 16, 24 or 32 bytes long.
    pub fn aes(bytes: impl AsRef<[u8]>) -> Result<Self, CryptoError> {
        Self::new(KeyAlgorithm::Aes, bytes.as_ref().to_vec())
    }

    pub(crate) fn from_parts(algorithm: KeyAlgorithm, bytes: Vec<u8>) -> Self {
        Self { bytes, algorithm, id: NEXT_KEY_ID.fetch_add(1, Ordering::Relaxed) }
    }

    #[must_use]
    pub const fn algorithm(&self) -> KeyAlgorithm {
        self.algorithm
    }

    /// Process-unique identity of this key instance.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Key size in bits.
    #[must_use]
    pub fn bits(&self) -> usize {
        self.bytes.len() * 8
    }

    /// Borrows the raw key bytes.
    ///
    /// Intended for engine implementations; never log or persist the result.
    #[must_use]
    pub fn expose_secret(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretKey")
            .field("algorithm", &self.algorithm)
            .field("bits", &self.bits())
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_aes_key_lengths() {
        for len in [16, 24, 32] {
            let key = SecretKey::aes(vec![7u8; len]).expect("valid AES length");
            assert_eq!(key.len(), len);
            assert_eq!(key.algorithm(), KeyAlgorithm::Aes);
        }

        let err = SecretKey::aes([0u8; 20]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_ids_are_unique() {
        let a = SecretKey::aes([1u8; 32]).unwrap();
        let b = SecretKey::aes([1u8; 32]).unwrap();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_debug_redacts_material() {
        let key = SecretKey::aes([0xAB; 16]).unwrap();
        let rendered = format!("{key:?}");
        assert!(rendered.contains("bits: 128"));
        assert!(!rendered.contains("171, 171"), "raw bytes must not be printed: {rendered}");
    }

    #[test]
    fn test_zeroize_wipes_bytes() {
        let mut key = SecretKey::aes([0x5A; 32]).unwrap();
        key.zeroize();
        assert_eq!(key.len(), 0, "zeroized key must not expose material");
    }
}
