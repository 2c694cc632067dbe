//! Errors surfaced by [`crate::store::PersistenceStore`] (§4.2).

use thiserror::Error;

/// Recoverable I/O failure from a [`crate::store::PersistenceStore`]. The
/// caller decides whether to retry or drop — only a namespace
/// initialization failure is fatal, and that is reported directly as an
/// `Err` from `wait_for_init` rather than wrapped here.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("namespace {namespace} failed to initialize: {source}")]
    Init {
        namespace: String,
        #[source]
        source: std::io::Error,
    },

    #[error("read of {key} in {namespace} failed: {source}")]
    Read {
        namespace: String,
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("write of {key} in {namespace} failed: {source}")]
    Write {
        namespace: String,
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{key} in {namespace} failed structural validation: {reason}")]
    Invalid {
        namespace: String,
        key: String,
        reason: String,
    },
}
