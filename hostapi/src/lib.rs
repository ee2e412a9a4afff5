//! `tether-hostapi`: host runtime boundary for the Tether plugin bridge.
//!
//! This crate defines what a host runtime must provide to the guest-side
//! bridge. It provides:
//!
//! - `HostMemory` / `HostRuntime` traits: allocate, locate, free and read
//!   regions; enumerate and invoke host functions; call input/output
//! - `Region`, `Value`, `HostFunctionDescriptor`: boundary types
//! - `FunctionTable`: ordered registry of native callbacks
//! - `MemHost`: in-memory `HostRuntime` for testing
//! - `HostConfig`: memory limits
//! - `HostError` / `ErrorCode`: host-side errors with stable numeric codes

pub mod error;
pub mod types;
pub mod traits;
pub mod functions;
pub mod mem_host;

// Re-export commonly used types at the crate root.
pub use error::{ErrorCode, HostError};
pub use types::{HostConfig, HostFunctionDescriptor, Region, Value};
pub use traits::{HostMemory, HostRuntime};
pub use functions::{call_no_result, call_with_result, DispatchPath, FunctionTable, HostCallback};
pub use mem_host::MemHost;
