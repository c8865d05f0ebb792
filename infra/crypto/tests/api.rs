pub mod fixtures;

use confcrypt_crypto::pool::{CipherPool, EngineCipherFactory, PoolConfig, PoolError};
use confcrypt_crypto::prelude::*;
use confcrypt_crypto::{CipherMode, KeyAlgorithm};
use fixtures::*;
use std::sync::Arc;
use std::time::Duration;

#[test]
fn engine_config_from_json_drives_wire_format() {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;

    let raw = serde_json::json!({
        "kdf_algorithm": "PBKDF2WithHmacSHA512",
        "iterations": 512,
        "key_bits": 128,
        "iv_len": 16,
        "tag_len": 12,
        "salt": STANDARD.encode(SCENARIO_SALT)
    });
    let config: EngineConfig = serde_json::from_value(raw).expect("config deserialize");
    let provider = Provider::builder()
        .engine_config(config)
        .unwrap()
        .passphrase(PASSPHRASE)
        .build()
        .unwrap();

    let sealed = provider.encrypt("abc").unwrap();
    assert_eq!(STANDARD.decode(&sealed).unwrap().len(), 16 + 3 + 12);
    assert_eq!(provider.decrypt(&sealed).unwrap(), "abc");
    assert_eq!(provider.engine().config().key_bits, 128);
}

#[test]
fn engine_can_be_driven_directly() {
    let engine = AesGcmEngine::new(fast_config(b"direct")).unwrap();
    let key = engine.derive_key(PASSPHRASE).unwrap();
    assert_eq!(key.algorithm(), KeyAlgorithm::Aes);
    assert_eq!(key.bits(), 256);

    let mut cipher = engine.create_cipher().unwrap();
    assert_eq!(cipher.transformation(), "AES/GCM/NoPadding");
    assert_eq!(cipher.mode(), None);

    let sealed = engine.encrypt(PLAINTEXT, &key, &mut cipher).unwrap();
    assert_eq!(cipher.mode(), Some(CipherMode::Encrypt));
    assert_eq!(engine.decrypt(&sealed, &key, &mut cipher).unwrap(), PLAINTEXT);

    engine.destroy().unwrap();
    assert_eq!(engine.destroy().unwrap_err().kind(), ErrorKind::State);
}

#[test]
fn pool_is_usable_on_its_own() {
    let engine = Arc::new(AesGcmEngine::new(fast_config(b"pool")).unwrap());
    let key = engine.derive_key(PASSPHRASE).unwrap();
    let pool = CipherPool::new(
        EngineCipherFactory::new(Arc::clone(&engine)),
        PoolConfig { max_total: Some(2), borrow_timeout: Duration::from_millis(10), ..PoolConfig::default() },
    )
    .unwrap();

    let mut a = pool.borrow().unwrap();
    let b = pool.borrow().unwrap();
    assert!(matches!(pool.borrow().unwrap_err(), PoolError::Exhausted { .. }));

    let sealed = engine.encrypt("pooled", &key, &mut a).unwrap();
    a.release().unwrap();
    drop(b);

    let mut again = pool.borrow().unwrap();
    assert_eq!(engine.decrypt(&sealed, &key, &mut again).unwrap(), "pooled");
    drop(again);

    let stats = pool.stats();
    assert_eq!((stats.created, stats.active, stats.idle), (2, 0, 2));
}

#[test]
fn shared_engine_serves_several_providers() {
    let engine = Arc::new(AesGcmEngine::new(fast_config(b"shared")).unwrap());
    let first = ProviderBuilder::new().engine(Arc::clone(&engine)).passphrase("one").build().unwrap();
    let second =
        ProviderBuilder::new().engine(Arc::clone(&engine)).passphrase("two").pooled(true).build().unwrap();

    let sealed = first.encrypt("value").unwrap();
    assert_eq!(second.decrypt(&sealed).unwrap_err().kind(), ErrorKind::WrongKey);

    first.destroy().unwrap();
    assert!(!engine.is_destroyed());
    assert!(second.encrypt("still works").is_ok());
}

#[test]
fn provider_clones_share_state() {
    let provider = provider(PASSPHRASE, false);
    let clone = provider.clone();

    let sealed = clone.encrypt(PLAINTEXT).unwrap();
    assert_eq!(provider.decrypt(&sealed).unwrap(), PLAINTEXT);

    clone.destroy().unwrap();
    assert!(provider.is_destroyed());
    assert_eq!(provider.strategy(), Strategy::Single);
    assert!(provider.pool_stats().is_none());
}

#[test]
fn error_kinds_render_for_logs() {
    assert_eq!(ErrorKind::WrongKey.to_string(), "wrong-key");
    assert_eq!(ErrorKind::PoolExhaustion.to_string(), "pool-exhaustion");
    assert!(ErrorKind::PoolExhaustion.is_engine_family());
    assert!(!ErrorKind::Configuration.is_engine_family());
}
