//! Failure paths: configuration, canonicalisation, store outages and
//! malformed store answers.

mod common;

use std::sync::Arc;

use common::{CountingStore, Fault, doc};
use json_register::{
    RawJson, RegisterConfig, RegisterError, Registry, StoreError, ToCanonical,
};
use serde_json::json;

fn registry() -> (Arc<CountingStore>, Registry<Arc<CountingStore>>) {
    let store = Arc::new(CountingStore::new());
    let registry = Registry::new(Arc::clone(&store), 16).unwrap();
    (store, registry)
}

#[test]
fn zero_capacity_is_rejected_before_any_store_access() {
    let store = Arc::new(CountingStore::new());
    let result = Registry::new(Arc::clone(&store), 0);
    assert!(matches!(result, Err(RegisterError::Configuration(_))));
    assert_eq!(store.calls(), 0);
}

#[test]
fn bad_config_is_a_configuration_error() {
    let cases = [
        "cache:\n  capacity: 0\n",
        "table:\n  name: \"\"\n",
        "table:\n  id_column: \"id; --\"\n",
        "store:\n  backend: sqlite\n",
        "store:\n  backend: redb\n",
        "store:\n  pool_size: 0\n",
    ];
    for yaml in cases {
        // Parse without validation so `open` is the one to reject it.
        let config: RegisterConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(
            matches!(Registry::open(&config), Err(RegisterError::Configuration(_))),
            "{yaml:?} should be rejected"
        );
    }
}

#[test]
fn invalid_json_text_is_a_canonicalisation_error() {
    let (store, registry) = registry();
    for text in ["", "{\"a\":}", "[1, 2", "NaN", "{\"a\":1} {\"b\":2}"] {
        assert!(
            matches!(
                registry.register(&RawJson(text)),
                Err(RegisterError::Canonicalisation(_))
            ),
            "{text:?} should fail"
        );
    }
    assert_eq!(store.calls(), 0);
}

#[test]
fn one_bad_document_aborts_the_whole_batch() {
    let (store, registry) = registry();
    let docs = [RawJson("{\"ok\":1}"), RawJson("{broken"), RawJson("[2]")];
    assert!(matches!(
        registry.register_batch(&docs),
        Err(RegisterError::Canonicalisation(_))
    ));
    assert_eq!(store.calls(), 0);
    assert!(registry.cache().is_empty());
}

#[test]
fn outage_during_single_registration_is_a_connection_error() {
    let (store, registry) = registry();
    store.set_fault(Fault::Unavailable);
    assert!(matches!(
        registry.register(&doc(1)),
        Err(RegisterError::Connection(StoreError::Unavailable(_)))
    ));
    assert!(registry.cache().is_empty());

    store.set_fault(Fault::None);
    assert!(registry.register(&doc(1)).is_ok());
}

#[test]
fn timeout_is_a_connection_error() {
    let (store, registry) = registry();
    store.set_fault(Fault::Timeout);
    assert!(matches!(
        registry.register_batch(&[doc(1), doc(2)]),
        Err(RegisterError::Connection(StoreError::Timeout(_)))
    ));
}

#[test]
fn outage_during_batch_leaves_cache_unchanged() {
    let (store, registry) = registry();
    let cached = registry.register(&doc(1)).unwrap();
    let before = registry.cache().len();

    store.set_fault(Fault::Unavailable);
    let result = registry.register_batch(&[doc(1), doc(2), doc(3)]);
    assert!(matches!(result, Err(RegisterError::Connection(_))));
    assert_eq!(registry.cache().len(), before);
    for n in [2, 3] {
        let key = doc(n).to_canonical().unwrap();
        assert!(!registry.cache().contains(key.as_str()));
    }

    // The cached entry is untouched and still served without the store.
    assert_eq!(registry.register(&doc(1)).unwrap(), cached);
}

#[test]
fn malformed_single_answers_are_invalid_responses() {
    for fault in [Fault::EmptyRows, Fault::ExtraRow, Fault::NegativeId, Fault::Malformed] {
        let (store, registry) = registry();
        store.set_fault(fault);
        assert!(
            matches!(
                registry.register(&doc(1)),
                Err(RegisterError::InvalidResponse(_))
            ),
            "{fault:?} should be an invalid response"
        );
        assert!(registry.cache().is_empty(), "{fault:?} must not be cached");
    }
}

#[test]
fn malformed_batch_answers_are_invalid_responses() {
    for fault in [Fault::DropLastRow, Fault::ForeignKey, Fault::NegativeId] {
        let (store, registry) = registry();
        registry.register(&doc(1)).unwrap();
        store.set_fault(fault);

        let result = registry.register_batch(&[doc(1), doc(2), doc(3)]);
        assert!(
            matches!(result, Err(RegisterError::InvalidResponse(_))),
            "{fault:?} should be an invalid response"
        );
        assert_eq!(registry.cache().len(), 1, "{fault:?} must not touch the cache");
    }
}

#[test]
fn errors_render_readable_messages() {
    let (store, registry) = registry();
    store.set_fault(Fault::EmptyRows);
    let err = registry.register(&json!({"a": 1})).unwrap_err();
    assert!(err.to_string().contains("no rows"), "{err}");

    let err = registry.register(&RawJson("{")).unwrap_err();
    assert!(err.to_string().starts_with("canonicalisation failed"), "{err}");
}
