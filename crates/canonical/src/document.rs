//! Document inputs accepted by the canonicaliser.
//!
//! A document is either an already parsed [`serde_json::Value`] or
//! pre-serialized JSON text wrapped in [`RawJson`]. The wrapper keeps the two
//! apart at the type level: a Rust `&str` could mean "this JSON string value"
//! or "this JSON text", and the two canonicalise differently.
//!
//! # Examples
//!
//! ```rust
//! use canonical::{RawJson, ToCanonical};
//! use serde_json::json;
//!
//! let parsed = json!({"a": 1, "b": [true, null]});
//! let text = RawJson("{ \"b\": [true, null], \"a\": 1.0 }");
//!
//! assert_eq!(parsed.to_canonical().unwrap(), text.to_canonical().unwrap());
//! assert_eq!(
//!     parsed.to_canonical().unwrap().as_str(),
//!     r#"{"a":1,"b":[true,null]}"#
//! );
//! ```

use serde_json::Value;

use crate::error::CanonicalisationError;
use crate::key::CanonicalKey;
use crate::writer::{canonicalise, canonicalise_str};

/// Pre-serialized JSON text.
///
/// The text is parsed before canonicalisation and never forwarded verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawJson<'a>(pub &'a str);

impl<'a> RawJson<'a> {
    pub fn as_str(&self) -> &'a str {
        self.0
    }
}

impl<'a> From<&'a str> for RawJson<'a> {
    fn from(text: &'a str) -> Self {
        RawJson(text)
    }
}

impl<'a> From<&'a String> for RawJson<'a> {
    fn from(text: &'a String) -> Self {
        RawJson(text.as_str())
    }
}

/// Anything that can be turned into a [`CanonicalKey`].
pub trait ToCanonical {
    fn to_canonical(&self) -> Result<CanonicalKey, CanonicalisationError>;
}

impl ToCanonical for Value {
    fn to_canonical(&self) -> Result<CanonicalKey, CanonicalisationError> {
        Ok(canonicalise(self))
    }
}

impl ToCanonical for RawJson<'_> {
    fn to_canonical(&self) -> Result<CanonicalKey, CanonicalisationError> {
        canonicalise_str(self.0)
    }
}

impl<T: ToCanonical + ?Sized> ToCanonical for &T {
    fn to_canonical(&self) -> Result<CanonicalKey, CanonicalisationError> {
        (**self).to_canonical()
    }
}

impl<T: ToCanonical + ?Sized> ToCanonical for Box<T> {
    fn to_canonical(&self) -> Result<CanonicalKey, CanonicalisationError> {
        (**self).to_canonical()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn raw_json_string_is_parsed_not_quoted() {
        let raw = RawJson("\"hello\"").to_canonical().unwrap();
        let value = json!("hello").to_canonical().unwrap();
        assert_eq!(raw, value);
    }

    #[test]
    fn raw_json_rejects_bare_words() {
        assert!(RawJson("hello").to_canonical().is_err());
    }

    #[test]
    fn references_delegate() {
        let value = json!([1, 2]);
        let by_ref: &Value = &value;
        assert_eq!(
            by_ref.to_canonical().unwrap(),
            value.to_canonical().unwrap()
        );
    }
}
