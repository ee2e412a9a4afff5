//! Bridge error types.
//!
//! Every variant is terminal to the call that produced it. Nothing is
//! retried inside the bridge and nothing is logged here.

use tether_hostapi::HostError;

/// Top-level error type for the guest-side bridge.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// The host could not satisfy an allocation. No handle was created.
    #[error("allocation of {len} bytes failed: {source}")]
    Allocation { len: u64, source: HostError },

    /// The host does not know a live region at `offset`.
    #[error("no region at offset {offset}")]
    NotFound { offset: u64 },

    /// The host region no longer matches the handle.
    #[error("region at offset {offset} (len {len}) is out of bounds")]
    OutOfBounds { offset: u64, len: u64 },

    /// A typed read was attempted on a region of the wrong width.
    #[error("size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: u64, actual: u64 },

    /// The handle at `offset` was already released by this guest.
    #[error("handle at offset {offset} used after free")]
    UseAfterFree { offset: u64 },

    /// Structured value could not be serialized or parsed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Decoder label other than UTF-8.
    #[error("unsupported encoding label: {label:?}")]
    UnsupportedEncoding { label: String },

    /// Operation the bridge deliberately does not implement.
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(&'static str),

    /// Host function dispatch failed.
    #[error("host function {name:?} failed: {source}")]
    HostInvocation { name: String, source: HostError },

    /// Bytes are not valid UTF-8 and substitution was not allowed.
    #[error("malformed UTF-8 input after {valid_up_to} valid bytes")]
    MalformedInput { valid_up_to: usize },

    /// Millisecond timestamp outside the representable range.
    #[error("invalid timestamp: {0} ms")]
    InvalidTimestamp(i64),
}

/// Convenience result type for the bridge.
pub type BridgeResult<T> = Result<T, BridgeError>;
