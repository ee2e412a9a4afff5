//! Sandbox error types.

use tether_hostapi::HostError;

/// Top-level error type for the sandbox crate.
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    /// Wasmtime engine, compilation, or instantiation error.
    #[error("wasmtime error: {0}")]
    Wasmtime(#[from] anyhow::Error),

    /// Module validation failed (bad imports, missing export, etc.).
    #[error("validation error: {0}")]
    ValidationError(String),

    /// Kernel memory or function table error.
    #[error("host error: {0}")]
    HostError(#[from] HostError),

    /// Guest export returned a non-zero status.
    #[error("plugin call failed with code {0}")]
    CallFailed(i32),

    /// Kernel memory could not be created or grown.
    #[error("memory error: {0}")]
    MemoryError(String),

    /// Fuel exhausted during execution.
    #[error("fuel exhausted (instruction limit)")]
    FuelExhausted,

    /// WASM guest trapped.
    #[error("guest trapped: {0}")]
    GuestTrapped(String),
}
