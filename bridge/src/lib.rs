//! `tether-bridge`: guest-side memory and host-call bridge.
//!
//! Guest code exchanges data with a host runtime through [`MemoryHandle`]s,
//! `(offset, len)` capabilities over host-managed memory, and calls host
//! functions through a dispatch index fixed at enumeration time.
//!
//! - **Memory Bridge** ([`Memory`]): allocate from bytes, strings, JSON and
//!   fixed-width numbers; locate; typed reads; single release
//! - **Host Call Bridge** ([`Host`]): enumerate once, bind by name, dispatch
//!   on the zero-result or result-returning path; call input/output
//! - **Text codec** ([`TextDecoder`], [`TextEncoder`]): UTF-8 only
//! - **Clock** ([`Clock`]): injected time source
//!
//! Everything hangs off a [`GuestContext`] built once per invocation.

pub mod error;
pub mod text;
pub mod handle;
pub mod memory;
pub mod host;
pub mod clock;
pub mod context;

pub use error::{BridgeError, BridgeResult};
pub use text::{DecodeOptions, DecoderOptions, TextDecoder, TextEncoder};
pub use handle::{HandleLedger, MemoryHandle, Numeric, NumericKind};
pub use memory::Memory;
pub use host::{Arg, BoundFunction, Host};
pub use clock::{Clock, FixedClock, SystemClock};
pub use context::GuestContext;

pub use tether_hostapi::{HostFunctionDescriptor, HostRuntime, Value};
