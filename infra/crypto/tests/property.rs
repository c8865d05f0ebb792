pub mod fixtures;

use confcrypt_crypto::prelude::*;
use fixtures::provider;
use proptest::prelude::*;
use std::sync::OnceLock;

fn shared(pooled: bool) -> &'static Provider {
    static SINGLE: OnceLock<Provider> = OnceLock::new();
    static POOLED: OnceLock<Provider> = OnceLock::new();
    let slot = if pooled { &POOLED } else { &SINGLE };
    slot.get_or_init(|| provider("property-pass", pooled))
}

proptest! {
    #[test]
    fn roundtrip_arbitrary_strings(value in any::<String>(), pooled in any::<bool>()) {
        let provider = shared(pooled);
        let sealed = provider.encrypt(&value).unwrap();
        prop_assert_eq!(provider.decrypt(&sealed).unwrap(), value);
    }

    #[test]
    fn decrypting_garbage_never_panics(garbage in "[A-Za-z0-9+/=]{0,96}") {
        let provider = shared(false);
        if let Err(err) = provider.decrypt(&garbage) {
            prop_assert!(err.kind().is_engine_family(), "unexpected kind {}", err.kind());
        }
    }
}
