//! Typed errors for the node-correlation cache and its provider-ID parser.
//!
//! Every other cache operation in this crate is total — absence is
//! signaled via a `(T, bool)` tuple, never an error. This is the one place
//! a caller must handle a `Result`.

use thiserror::Error;

pub type NodeCacheResult<T> = Result<T, NodeCacheError>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NodeCacheError {
    #[error("node is nil")]
    NilNode,

    #[error("provider id is empty")]
    EmptyProviderId,

    #[error("unsupported provider id scheme: {scheme}")]
    UnsupportedProviderScheme { scheme: String },

    #[error("malformed provider id: {provider_id}")]
    MalformedProviderId { provider_id: String },
}
