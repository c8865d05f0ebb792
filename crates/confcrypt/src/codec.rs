//! Consumer-side contract between property sources and crypto providers.
//!
//! A property layer only needs two null-safe calls: [`ValueCodec::encode`] before a value is
//! stored and [`ValueCodec::decode`] when it is read back. Every [`CryptoProvider`] is a
//! codec. [`ProtectedProperties`] is a minimal in-memory source built on top of it.

use confcrypt_crypto::{CryptoError, CryptoProvider};
use std::collections::BTreeMap;
use std::fmt;
use tracing::trace;

/// Null-safe, reversible transformation of property values.
pub trait ValueCodec: Send + Sync {
    /// # Errors
    /// Returns the provider error if the value cannot be encoded.
    fn encode(&self, value: Option<&str>) -> Result<Option<String>, CryptoError>;

    /// # Errors
    /// Returns the provider error if the value cannot be decoded, typically
    /// [`CryptoError::WrongKey`].
    fn decode(&self, value: Option<&str>) -> Result<Option<String>, CryptoError>;
}

impl<P: CryptoProvider + ?Sized> ValueCodec for P {
    fn encode(&self, value: Option<&str>) -> Result<Option<String>, CryptoError> {
        self.encrypt_value(value)
    }

    fn decode(&self, value: Option<&str>) -> Result<Option<String>, CryptoError> {
        self.decrypt_value(value)
    }
}

/// Read access to decoded properties.
pub trait ConfigSource {
    /// Decoded value of `key`. `Ok(None)` covers both a missing key and a null value.
    ///
    /// # Errors
    /// Returns the codec error if the stored value cannot be decoded.
    fn get(&self, key: &str) -> Result<Option<String>, CryptoError>;

    fn contains_key(&self, key: &str) -> bool;

    fn keys(&self) -> Vec<String>;
}

/// Read and write access to properties.
pub trait MutableConfigSource: ConfigSource {
    /// Encodes and stores `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    /// Returns the codec error if the value cannot be encoded; the previous value is kept.
    fn set(&mut self, key: &str, value: Option<&str>) -> Result<(), CryptoError>;

    /// Removes `key`. Returns `true` if it was present.
    fn remove(&mut self, key: &str) -> bool;
}

/// In-memory property map that keeps values encoded at rest.
///
/// # Example
/// ```rust
/// use confcrypt::prelude::*;
///
/// # fn main() -> Result<(), CryptoError> {
/// let provider = Provider::builder()
///     .engine_config(EngineConfig { iterations: 1_000, ..EngineConfig::with_salt(b"8-bytes!") })?
///     .passphrase("correct horse")
///     .build()?;
///
/// let mut props = ProtectedProperties::new(provider);
/// props.set("db.password", Some("s3cr3t"))?;
///
/// assert_ne!(props.raw("db.password"), Some("s3cr3t"));
/// assert_eq!(props.get("db.password")?.as_deref(), Some("s3cr3t"));
/// # Ok(())
/// # }
/// ```
pub struct ProtectedProperties<C: ValueCodec> {
    codec: C,
    values: BTreeMap<String, Option<String>>,
}

impl<C: ValueCodec> ProtectedProperties<C> {
    pub const fn new(codec: C) -> Self {
        Self { codec, values: BTreeMap::new() }
    }

    /// Restores properties from already encoded values, e.g. a persisted file.
    pub fn from_raw<K, V>(codec: C, raw: impl IntoIterator<Item = (K, Option<V>)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let values = raw.into_iter().map(|(k, v)| (k.into(), v.map(Into::into))).collect();
        Self { codec, values }
    }

    /// Stored (still encoded) value of `key`.
    #[must_use]
    pub fn raw(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Option::as_deref)
    }

    /// Stored (still encoded) entries in key order, for persistence.
    pub fn iter_raw(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_deref()))
    }

    pub const fn codec(&self) -> &C {
        &self.codec
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<C: ValueCodec> ConfigSource for ProtectedProperties<C> {
    fn get(&self, key: &str) -> Result<Option<String>, CryptoError> {
        match self.values.get(key) {
            Some(stored) => self.codec.decode(stored.as_deref()),
            None => Ok(None),
        }
    }

    fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    fn keys(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }
}

impl<C: ValueCodec> MutableConfigSource for ProtectedProperties<C> {
    fn set(&mut self, key: &str, value: Option<&str>) -> Result<(), CryptoError> {
        let encoded = self.codec.encode(value)?;
        trace!(key, null = encoded.is_none(), "Protected property stored");
        self.values.insert(key.to_owned(), encoded);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> bool {
        self.values.remove(key).is_some()
    }
}

impl<C: ValueCodec> fmt::Debug for ProtectedProperties<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProtectedProperties").field("keys", &self.values.keys()).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use confcrypt_crypto::ErrorKind;

    /// Reversible toy codec that fails on a marker value.
    #[derive(Debug)]
    struct Reverse;

    impl ValueCodec for Reverse {
        fn encode(&self, value: Option<&str>) -> Result<Option<String>, CryptoError> {
            value
                .map(|v| match v {
                    "poison" => Err(CryptoError::WrongKey { context: None }),
                    v => Ok(v.chars().rev().collect()),
                })
                .transpose()
        }

        fn decode(&self, value: Option<&str>) -> Result<Option<String>, CryptoError> {
            Ok(value.map(|v| v.chars().rev().collect()))
        }
    }

    #[test]
    fn test_values_are_encoded_at_rest() {
        let mut props = ProtectedProperties::new(Reverse);
        props.set("user", Some("alice")).unwrap();

        assert_eq!(props.raw("user"), Some("ecila"));
        assert_eq!(props.get("user").unwrap().as_deref(), Some("alice"));
        assert_eq!(props.keys(), vec!["user".to_owned()]);
    }

    #[test]
    fn test_null_values_are_kept_as_null() {
        let mut props = ProtectedProperties::new(Reverse);
        props.set("optional", None).unwrap();

        assert!(props.contains_key("optional"));
        assert_eq!(props.raw("optional"), None);
        assert_eq!(props.get("optional").unwrap(), None);
        assert_eq!(props.get("missing").unwrap(), None);
    }

    #[test]
    fn test_failed_encode_keeps_previous_value() {
        let mut props = ProtectedProperties::new(Reverse);
        props.set("k", Some("v1")).unwrap();

        let err = props.set("k", Some("poison")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WrongKey);
        assert_eq!(props.get("k").unwrap().as_deref(), Some("v1"));
    }

    #[test]
    fn test_from_raw_and_remove() {
        let mut props = ProtectedProperties::from_raw(
            Reverse,
            [("a", Some("1")), ("b", None::<&str>)],
        );
        assert_eq!(props.len(), 2);
        assert_eq!(props.iter_raw().collect::<Vec<_>>(), vec![("a", Some("1")), ("b", None)]);

        assert!(props.remove("a"));
        assert!(!props.remove("a"));
        assert_eq!(props.len(), 1);
    }

    #[test]
    fn test_debug_lists_keys_only() {
        let mut props = ProtectedProperties::new(Reverse);
        props.set("db.password", Some("s3cr3t")).unwrap();
        let rendered = format!("{props:?}");
        assert!(rendered.contains("db.password"));
        assert!(!rendered.contains("t3rc3s"));
    }
}
