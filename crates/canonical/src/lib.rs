//! Canonical JSON keys.
//!
//! This crate maps a JSON document to a string that is identical for every
//! document with the same JSON value, whatever the member order, whitespace or
//! number spelling of the input. Registries use the string as the identity of
//! the document.
//!
//! ## What we do
//!
//! - Object members sorted by the byte order of their UTF-8 keys
//! - Array order preserved
//! - No whitespace between tokens
//! - Minimal string escaping, everything else raw UTF-8
//! - Numbers compared by value (`1`, `1.0` and `1e0` are one number)
//!
//! ## Pure function guarantee
//!
//! No I/O, no clock calls, no locale or platform dependence. The same value
//! gives the same key on any machine, in any process, forever.
//!
//! ## Invariants worth knowing
//!
//! - Parsed values always canonicalise; only text input can fail
//! - Text input is parsed first and never stored verbatim
//! - Duplicate member names in text input keep the last value, like the parser
//!
//! Bottom line: equal JSON values, equal keys. Different values, different keys.

mod document;
mod error;
mod hash;
mod key;
mod number;
mod writer;

pub use crate::document::{RawJson, ToCanonical};
pub use crate::error::CanonicalisationError;
pub use crate::hash::hash_canonical_bytes;
pub use crate::key::CanonicalKey;
pub use crate::writer::{canonicalise, canonicalise_str};

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_order_is_ignored() {
        let a = canonicalise(&json!({"b": 2, "a": 1}));
        let b = canonicalise(&json!({"a": 1, "b": 2}));
        assert_eq!(a, b);
        assert_eq!(a.as_str(), r#"{"a":1,"b":2}"#);
    }

    #[test]
    fn integer_and_integral_float_are_one_key() {
        let int = canonicalise(&json!({"a": 1}));
        let float = canonicalise(&json!({"a": 1.0}));
        let text = canonicalise_str(r#"{"a": 1e0}"#).unwrap();
        assert_eq!(int, float);
        assert_eq!(int, text);
        assert_eq!(int.as_str(), r#"{"a":1}"#);
    }

    #[test]
    fn nested_objects_sorted_at_every_level() {
        let key = canonicalise(&json!({
            "z": {"y": 1, "x": [{"d": 4, "c": 3}]},
            "a": null
        }));
        assert_eq!(key.as_str(), r#"{"a":null,"z":{"x":[{"c":3,"d":4}],"y":1}}"#);
    }

    #[test]
    fn array_order_matters() {
        assert_ne!(canonicalise(&json!([1, 2, 3])), canonicalise(&json!([3, 2, 1])));
    }

    #[test]
    fn primitives() {
        assert_eq!(canonicalise(&json!(null)).as_str(), "null");
        assert_eq!(canonicalise(&json!(true)).as_str(), "true");
        assert_eq!(canonicalise(&json!(false)).as_str(), "false");
        assert_eq!(canonicalise(&json!(-7)).as_str(), "-7");
        assert_eq!(canonicalise(&json!("s")).as_str(), "\"s\"");
    }

    #[test]
    fn empty_containers() {
        assert_eq!(canonicalise(&json!({})).as_str(), "{}");
        assert_eq!(canonicalise(&json!([])).as_str(), "[]");
        assert_ne!(canonicalise(&json!({})), canonicalise(&json!([])));
    }

    #[test]
    fn whitespace_in_text_input_is_irrelevant() {
        let compact = canonicalise_str(r#"{"a":[1,2],"b":"x y"}"#).unwrap();
        let spaced = canonicalise_str("{\n  \"b\" : \"x y\",\n\t\"a\" : [ 1 , 2 ]\n}").unwrap();
        assert_eq!(compact, spaced);
    }

    #[test]
    fn string_and_number_never_collide() {
        assert_ne!(canonicalise(&json!("1")), canonicalise(&json!(1)));
        assert_ne!(canonicalise(&json!("null")), canonicalise(&json!(null)));
    }

    #[test]
    fn invalid_text_rejected() {
        for text in ["", "{", "[1,]", "NaN", "Infinity", "{\"a\":1} trailing", "\"\\ud800\""] {
            assert!(
                matches!(
                    canonicalise_str(text),
                    Err(CanonicalisationError::InvalidJson { .. })
                ),
                "should reject {text:?}"
            );
        }
    }

    #[test]
    fn digest_is_stable() {
        let key = canonicalise(&json!({"a": 1}));
        assert_eq!(key.digest(), hash_canonical_bytes(br#"{"a":1}"#));
        assert_eq!(key.digest().len(), 64);
    }
}
