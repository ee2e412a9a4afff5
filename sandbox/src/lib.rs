//! `tether-sandbox`: wasmtime-backed host runtime for the Tether bridge.
//!
//! Regions live in a kernel-owned wasmtime linear memory, so the same
//! runtime can serve Rust guests through `tether-bridge` and WASM plugins
//! through the `tether_env` import module. It enforces:
//!
//! - **Determinism:** No SIMD, no threads, NaN canonicalization
//! - **Fuel metering:** Instruction-level metering to stop runaway plugins
//! - **Memory limits:** Bounded kernel memory growth and region sizes
//! - **Import whitelisting:** Only `tether_env` function imports, no WASI
//! - **ABI validation:** Plugin exports must be `() -> i32`
//!
//! The entry points are [`WasmHost`] and [`Plugin::call`].

pub mod error;
pub mod config;
pub mod memory;
pub mod host_impl;
pub mod validation;
pub mod linker;
pub mod runtime;

pub use error::SandboxError;
pub use config::SandboxConfig;
pub use runtime::{Plugin, WasmHost};
