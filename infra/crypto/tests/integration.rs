pub mod fixtures;

use confcrypt_crypto::prelude::*;
use fixtures::*;

#[test]
fn scenario_roundtrip_with_default_parameters() {
    init_logging();
    let provider = Provider::builder()
        .salt(SCENARIO_SALT)
        .expect("valid salt")
        .passphrase(PASSPHRASE)
        .build()
        .expect("provider setup failed");

    let sealed = provider.encrypt(PLAINTEXT).expect("encrypt failed");
    assert_eq!(provider.decrypt(&sealed).expect("decrypt failed"), PLAINTEXT);

    let wrong = Provider::builder()
        .salt(SCENARIO_SALT)
        .expect("valid salt")
        .passphrase(WRONG_PASSPHRASE)
        .build()
        .expect("provider setup failed");

    let err = wrong.decrypt(&sealed).expect_err("wrong passphrase must not decrypt");
    assert!(matches!(err, CryptoError::WrongKey { .. }), "unexpected error: {err}");
}

#[test]
fn scenario_ciphertext_from_fixed_iv_decrypts() {
    // base64(IV a0..ab || ciphertext || tag) under the default parameters and SCENARIO_SALT.
    const SEALED: &str = "oKGio6SlpqeoqaqrDay6M8cmYyXPBWXc9dCBSYQCqYgJOA58gWhzCtMMoQUpgw==";

    init_logging();
    let provider = Provider::builder()
        .salt(SCENARIO_SALT)
        .expect("valid salt")
        .passphrase(PASSPHRASE)
        .build()
        .expect("provider setup failed");

    assert_eq!(provider.decrypt(SEALED).expect("decrypt failed"), PLAINTEXT);
}

#[test]
fn iv_is_fresh_for_every_encryption() {
    for pooled in [false, true] {
        let provider = provider(PASSPHRASE, pooled);
        let first = provider.encrypt(PLAINTEXT).unwrap();
        let second = provider.encrypt(PLAINTEXT).unwrap();

        assert_ne!(first, second, "same plaintext must not produce the same ciphertext");
        assert_eq!(provider.decrypt(&first).unwrap(), provider.decrypt(&second).unwrap());
    }
}

#[test]
fn tampering_is_detected() {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;

    let provider = provider(PASSPHRASE, false);
    let sealed = provider.encrypt(PLAINTEXT).unwrap();

    let mut raw = STANDARD.decode(&sealed).unwrap();
    for index in 0..raw.len() {
        raw[index] ^= 0x01;
        let err = provider.decrypt(&STANDARD.encode(&raw)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WrongKey, "flip at {index}: {err}");
        raw[index] ^= 0x01;
    }

    assert_eq!(provider.decrypt(&STANDARD.encode(&raw)).unwrap(), PLAINTEXT);
}

#[test]
fn ciphertext_is_portable_between_strategies() {
    let engine = std::sync::Arc::new(AesGcmEngine::new(fast_config(b"portable")).unwrap());
    let single =
        ProviderBuilder::new().engine(std::sync::Arc::clone(&engine)).passphrase("pw").build();
    let pooled = ProviderBuilder::new()
        .engine(std::sync::Arc::clone(&engine))
        .passphrase("pw")
        .pooled(true)
        .build();

    let (single, pooled) = (single.unwrap(), pooled.unwrap());
    let sealed = single.encrypt("shared value").unwrap();
    assert_eq!(pooled.decrypt(&sealed).unwrap(), "shared value");
}

#[test]
fn destroy_is_terminal_and_idempotent() {
    for pooled in [false, true] {
        let provider = provider(PASSPHRASE, pooled);
        let sealed = provider.encrypt(PLAINTEXT).unwrap();

        provider.destroy().expect("first destroy");
        provider.destroy().expect("second destroy is harmless");

        assert!(provider.is_destroyed());
        assert!(provider.engine().is_destroyed(), "owned engine is destroyed with the provider");
        assert_eq!(provider.encrypt(PLAINTEXT).unwrap_err().kind(), ErrorKind::State);
        assert_eq!(provider.decrypt(&sealed).unwrap_err().kind(), ErrorKind::State);
    }
}

#[test]
fn null_values_pass_through() {
    let provider = provider(PASSPHRASE, true);
    assert_eq!(provider.encrypt_value(None).unwrap(), None);
    assert_eq!(provider.decrypt_value(None).unwrap(), None);

    let sealed = provider.encrypt_value(Some(PLAINTEXT)).unwrap();
    assert_eq!(provider.decrypt_value(sealed.as_deref()).unwrap().as_deref(), Some(PLAINTEXT));

    provider.destroy().unwrap();
    assert_eq!(provider.encrypt_value(None).unwrap(), None);
}
