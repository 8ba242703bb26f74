use canonical::CanonicalisationError;
use store::StoreError;
use thiserror::Error;

use crate::config::ConfigLoadError;

/// Errors returned by registration.
#[derive(Debug, Error)]
pub enum RegisterError {
    /// Invalid settings, reported at construction before any store access.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// The document could not be turned into a canonical key.
    #[error("canonicalisation failed: {0}")]
    Canonicalisation(#[from] CanonicalisationError),
    /// The store could not be reached, timed out or failed mid-operation.
    #[error("store connection failed: {0}")]
    Connection(#[source] StoreError),
    /// The store answered, but not with what the protocol requires.
    #[error("invalid store response: {0}")]
    InvalidResponse(String),
}

impl From<StoreError> for RegisterError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidConfig(msg) => RegisterError::Configuration(msg),
            StoreError::Malformed(msg) => RegisterError::InvalidResponse(msg),
            other => RegisterError::Connection(other),
        }
    }
}

impl From<ConfigLoadError> for RegisterError {
    fn from(err: ConfigLoadError) -> Self {
        RegisterError::Configuration(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn store_errors_map_by_kind() {
        assert!(matches!(
            RegisterError::from(StoreError::InvalidConfig("bad".into())),
            RegisterError::Configuration(_)
        ));
        assert!(matches!(
            RegisterError::from(StoreError::Malformed("no rows".into())),
            RegisterError::InvalidResponse(_)
        ));
        for err in [
            StoreError::Unavailable("down".into()),
            StoreError::Timeout(Duration::from_millis(5)),
            StoreError::Backend("disk full".into()),
        ] {
            assert!(matches!(
                RegisterError::from(err),
                RegisterError::Connection(_)
            ));
        }
    }

    #[test]
    fn connection_keeps_its_source() {
        use std::error::Error;
        let err = RegisterError::from(StoreError::Unavailable("down".into()));
        assert!(err.source().is_some());
        assert!(err.to_string().contains("down"));
    }
}
