//! # Crypto Errors
//!
//! This module defines the [`CryptoError`] enum used by engines, providers and the builder,
//! together with the coarse [`ErrorKind`] classification that callers match on.

use std::borrow::Cow;
use std::fmt;

/// Failures reported by the crypto layer.
///
/// Callers usually care about [`CryptoError::kind`] rather than the concrete variant:
/// base64 failures and pool exhaustion both belong to the engine family, and a
/// [`CryptoError::Suppressed`] wrapper reports the kind of its primary error.
#[confcrypt_derive::confcrypt_error]
pub enum CryptoError {
    /// The builder, engine configuration or key material is invalid.
    #[error("Invalid configuration{}: {message}", format_context(.context))]
    Configuration { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// Password-based key derivation failed or was given unusable input.
    #[error("Key derivation failed{}: {message}", format_context(.context))]
    KeyDerivation { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// A cipher could not be created or initialized, or an encrypt/decrypt step failed.
    #[error("Crypto engine error{}: {message}", format_context(.context))]
    Engine { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// The ciphertext is not valid base64.
    #[error("Malformed ciphertext encoding{}: {source}", format_context(.context))]
    Encoding { source: base64::DecodeError, context: Option<Cow<'static, str>> },

    /// Authentication tag verification failed.
    ///
    /// The value was encrypted with a different key, or it has been tampered with.
    #[error("Wrong key or tampered ciphertext{}", format_context(.context))]
    WrongKey { context: Option<Cow<'static, str>> },

    /// The provider or engine has already been destroyed.
    #[error("Invalid state{}: {message}", format_context(.context))]
    State { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// No cipher could be borrowed from the pool within the configured wait bound.
    #[error("Cipher pool exhausted{}: {message}", format_context(.context))]
    PoolExhausted { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// An operation failed and a follow-up step (returning the cipher) failed as well.
    ///
    /// `primary` is the error the caller should act on; `secondary` is kept for diagnostics.
    #[error("{primary} (suppressed: {secondary}){}", format_context(.context))]
    Suppressed {
        primary: Box<CryptoError>,
        secondary: Box<CryptoError>,
        context: Option<Cow<'static, str>>,
    },
}

/// Coarse classification of a [`CryptoError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Configuration,
    KeyDerivation,
    Engine,
    WrongKey,
    State,
    PoolExhaustion,
}

impl ErrorKind {
    /// Returns `true` for kinds raised while a cipher operation was running or being prepared.
    #[must_use]
    pub const fn is_engine_family(self) -> bool {
        matches!(self, Self::Engine | Self::WrongKey | Self::PoolExhaustion)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Configuration => "configuration",
            Self::KeyDerivation => "key-derivation",
            Self::Engine => "engine",
            Self::WrongKey => "wrong-key",
            Self::State => "state",
            Self::PoolExhaustion => "pool-exhaustion",
        };
        f.write_str(label)
    }
}

impl CryptoError {
    /// Classifies the error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration { .. } => ErrorKind::Configuration,
            Self::KeyDerivation { .. } => ErrorKind::KeyDerivation,
            Self::Engine { .. } | Self::Encoding { .. } => ErrorKind::Engine,
            Self::WrongKey { .. } => ErrorKind::WrongKey,
            Self::State { .. } => ErrorKind::State,
            Self::PoolExhausted { .. } => ErrorKind::PoolExhaustion,
            Self::Suppressed { primary, .. } => primary.kind(),
        }
    }

    /// Attaches `secondary` to this error as a suppressed follow-up failure.
    #[must_use]
    pub fn with_suppressed(self, secondary: Self) -> Self {
        Self::Suppressed { primary: Box::new(self), secondary: Box::new(secondary), context: None }
    }

    /// Returns the error to act on, unwrapping a suppression wrapper.
    #[must_use]
    pub fn primary(&self) -> &Self {
        match self {
            Self::Suppressed { primary, .. } => primary.primary(),
            other => other,
        }
    }

    /// Returns the suppressed follow-up failure, if any.
    #[must_use]
    pub fn suppressed(&self) -> Option<&Self> {
        match self {
            Self::Suppressed { secondary, .. } => Some(secondary),
            _ => None,
        }
    }

    pub(crate) fn configuration(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Configuration { message: message.into(), context: None }
    }

    pub(crate) fn key_derivation(message: impl Into<Cow<'static, str>>) -> Self {
        Self::KeyDerivation { message: message.into(), context: None }
    }

    pub(crate) fn engine(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Engine { message: message.into(), context: None }
    }

    pub(crate) fn state(message: impl Into<Cow<'static, str>>) -> Self {
        Self::State { message: message.into(), context: None }
    }
}
