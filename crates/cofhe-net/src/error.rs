//! Error types for the network module.

use thiserror::Error;

/// Errors talking to chain RPC, the threshold network or the input verifier.
#[derive(Debug, Error)]
pub enum NetError {
    /// Request could not be sent or its body could not be read.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Endpoint answered with a non-success status.
    #[error("HTTP {status} from {endpoint}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// Response body did not match the expected shape.
    #[error("decode error: {0}")]
    Decode(String),

    /// JSON-RPC call failed.
    #[error("rpc error: {0}")]
    Rpc(String),

    /// A configured URL could not be parsed.
    #[error("invalid url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// Result type for network operations.
pub type Result<T> = std::result::Result<T, NetError>;
