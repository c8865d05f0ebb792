pub mod fixtures;

use confcrypt::prelude::*;
use fixtures::*;

fn provider(passphrase: &str, pooled: bool) -> Provider {
    init_logging();
    Provider::builder()
        .engine_config(EngineConfig { iterations: 1_000, ..EngineConfig::with_salt(b"codec-salt") })
        .expect("valid engine config")
        .passphrase(passphrase)
        .pooled(pooled)
        .build()
        .expect("provider setup failed")
}

#[test]
fn provider_is_a_null_safe_codec() {
    let codec = provider(PASSPHRASE, false);

    assert_eq!(codec.encode(None).unwrap(), None);
    assert_eq!(codec.decode(None).unwrap(), None);

    let sealed = codec.encode(Some("s3cr3t")).unwrap().expect("value present");
    assert_ne!(sealed, "s3cr3t");
    assert_eq!(codec.decode(Some(sealed.as_str())).unwrap().as_deref(), Some("s3cr3t"));
}

#[test]
fn properties_persist_and_reload_encrypted() {
    let mut props = ProtectedProperties::new(provider(PASSPHRASE, true));
    props.set("db.user", Some("app")).unwrap();
    props.set("db.password", Some("s3cr3t")).unwrap();
    props.set("db.replica", None).unwrap();

    let persisted: Vec<(String, Option<String>)> = props
        .iter_raw()
        .map(|(k, v)| (k.to_owned(), v.map(str::to_owned)))
        .collect();
    assert!(persisted.iter().all(|(_, v)| v.as_deref() != Some("s3cr3t")));

    let reloaded = ProtectedProperties::from_raw(provider(PASSPHRASE, false), persisted.clone());
    assert_eq!(reloaded.get("db.password").unwrap().as_deref(), Some("s3cr3t"));
    assert_eq!(reloaded.get("db.replica").unwrap(), None);
    assert_eq!(reloaded.keys(), vec!["db.password", "db.replica", "db.user"]);

    let foreign = ProtectedProperties::from_raw(provider("wrong horse", false), persisted);
    assert_eq!(foreign.get("db.password").unwrap_err().kind(), ErrorKind::WrongKey);
    assert_eq!(foreign.get("db.replica").unwrap(), None);
}

#[test]
fn shared_provider_backs_several_sources() {
    let shared = provider(PASSPHRASE, true);
    let mut first = ProtectedProperties::new(shared.clone());
    let mut second = ProtectedProperties::new(shared.clone());

    first.set("a", Some("1")).unwrap();
    second.set("b", Some("2")).unwrap();
    assert_eq!(first.get("a").unwrap().as_deref(), Some("1"));
    assert_eq!(second.get("b").unwrap().as_deref(), Some("2"));

    shared.destroy().unwrap();
    assert_eq!(first.get("a").unwrap_err().kind(), ErrorKind::State);
    assert_eq!(second.set("c", Some("3")).unwrap_err().kind(), ErrorKind::State);
    assert!(!second.contains_key("c"));
    assert_eq!(first.get("missing").unwrap(), None);
}
