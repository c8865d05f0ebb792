//! Facade crate for protected configuration values.
//! Re-exports the crypto layer and adds what a property-loading application needs on top:
//! settings loading and the null-safe value-codec contract.
//! Keep this crate thin: the cryptography lives in `confcrypt-crypto`.
//!
//! ## Usage
//! - Describe the engine and provider in a settings file and call [`load_settings`].
//! - Build the provider with [`CryptoSettings::build_provider`], supplying the passphrase
//!   through `CONFCRYPT__PROVIDER__PASSPHRASE`.
//! - Hand the provider to the property layer as a [`ValueCodec`](codec::ValueCodec).

pub mod codec;
pub mod settings;

pub use confcrypt_crypto as crypto;
pub use settings::{CryptoSettings, SettingsError, load_settings, load_settings_with_env};

pub mod prelude {
    pub use crate::codec::{ConfigSource, MutableConfigSource, ProtectedProperties, ValueCodec};
    pub use crate::settings::{CryptoSettings, SettingsError, load_settings, load_settings_with_env};
    pub use confcrypt_crypto::prelude::*;
}
