use std::borrow::Borrow;
use std::fmt;

use serde::Serialize;

use crate::hash::hash_canonical_bytes;

/// The canonical string form of a JSON document.
///
/// Two documents produce equal keys iff they are equal as JSON values with
/// object member order ignored. Keys can only be built by the canonicaliser,
/// so holding a `CanonicalKey` means holding canonical text.
///
/// `CanonicalKey` borrows as `str`, which lets hash maps keyed by it be
/// queried with plain string slices.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct CanonicalKey(String);

impl CanonicalKey {
    pub(crate) fn from_canonical(text: String) -> Self {
        CanonicalKey(text)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Length of the canonical text in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// SHA-256 hex digest of the key, for logs and diagnostics.
    pub fn digest(&self) -> String {
        hash_canonical_bytes(self.0.as_bytes())
    }
}

impl fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CanonicalKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for CanonicalKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<CanonicalKey> for String {
    fn from(key: CanonicalKey) -> Self {
        key.0
    }
}
