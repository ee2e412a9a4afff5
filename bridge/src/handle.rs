//! Memory handles and the guest-side release ledger.

use std::collections::BTreeSet;

use serde::de::DeserializeOwned;
use tether_hostapi::{HostRuntime, Region, Value};

use crate::error::BridgeResult;
use crate::memory::Memory;

/// Capability referencing a region of host-managed memory.
///
/// A handle never owns the memory it names. It is a plain `(offset, len)`
/// pair that must be released exactly once through [`Memory::release`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemoryHandle {
    pub offset: u64,
    pub len: u64,
}

impl MemoryHandle {
    pub fn new(offset: u64, len: u64) -> Self {
        Self { offset, len }
    }

    pub fn region(&self) -> Region {
        Region::new(self.offset, self.len)
    }

    pub fn read_bytes<H: HostRuntime>(&self, memory: &Memory<'_, H>) -> BridgeResult<Vec<u8>> {
        memory.read_bytes(*self)
    }

    pub fn read_string<H: HostRuntime>(&self, memory: &Memory<'_, H>) -> BridgeResult<String> {
        memory.read_string(*self)
    }

    pub fn read_u32<H: HostRuntime>(&self, memory: &Memory<'_, H>) -> BridgeResult<u32> {
        memory.read_u32(*self)
    }

    pub fn read_u64<H: HostRuntime>(&self, memory: &Memory<'_, H>) -> BridgeResult<u64> {
        memory.read_u64(*self)
    }

    pub fn read_f32<H: HostRuntime>(&self, memory: &Memory<'_, H>) -> BridgeResult<f32> {
        memory.read_f32(*self)
    }

    pub fn read_f64<H: HostRuntime>(&self, memory: &Memory<'_, H>) -> BridgeResult<f64> {
        memory.read_f64(*self)
    }

    pub fn read_json<T: DeserializeOwned, H: HostRuntime>(
        &self,
        memory: &Memory<'_, H>,
    ) -> BridgeResult<T> {
        memory.read_json(*self)
    }

    /// Release the region. Consumes the handle.
    pub fn free<H: HostRuntime>(self, memory: &mut Memory<'_, H>) -> BridgeResult<()> {
        memory.release(self)
    }
}

impl From<Region> for MemoryHandle {
    fn from(region: Region) -> Self {
        Self::new(region.offset, region.len)
    }
}

impl From<MemoryHandle> for Value {
    fn from(handle: MemoryHandle) -> Self {
        Value::Handle(handle.region())
    }
}

/// Fixed-width numeric kinds that can be written into a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericKind {
    U32,
    U64,
    F32,
    F64,
}

impl NumericKind {
    /// Width in bytes.
    pub fn width(self) -> u64 {
        match self {
            Self::U32 | Self::F32 => 4,
            Self::U64 | Self::F64 => 8,
        }
    }
}

/// A fixed-width numeric value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Numeric {
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
}

impl Numeric {
    pub fn kind(&self) -> NumericKind {
        match self {
            Self::U32(_) => NumericKind::U32,
            Self::U64(_) => NumericKind::U64,
            Self::F32(_) => NumericKind::F32,
            Self::F64(_) => NumericKind::F64,
        }
    }

    /// Little-endian bytes, exactly `kind().width()` long.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        match self {
            Self::U32(v) => v.to_le_bytes().to_vec(),
            Self::U64(v) => v.to_le_bytes().to_vec(),
            Self::F32(v) => v.to_le_bytes().to_vec(),
            Self::F64(v) => v.to_le_bytes().to_vec(),
        }
    }
}

impl From<Numeric> for Value {
    fn from(n: Numeric) -> Self {
        match n {
            Numeric::U32(v) => Value::U32(v),
            Numeric::U64(v) => Value::U64(v),
            Numeric::F32(v) => Value::F32(v),
            Numeric::F64(v) => Value::F64(v),
        }
    }
}

/// Offsets this guest has released and not seen reallocated since.
///
/// The host contract does not promise double-free tolerance, so the guest
/// tracks releases itself and fails fast on reuse. The host stays the
/// authority on liveness: the ledger only classifies host rejections, and an
/// entry is dropped as soon as the host hands its offset out again. A ledger
/// lives in one `GuestContext`, so it holds at most the releases made during
/// a single invocation.
#[derive(Debug, Clone, Default)]
pub struct HandleLedger {
    released: BTreeSet<u64>,
}

impl HandleLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_released(&self, offset: u64) -> bool {
        self.released.contains(&offset)
    }

    /// Record a release. Returns false if the offset was already released.
    pub fn mark_released(&mut self, offset: u64) -> bool {
        self.released.insert(offset)
    }

    /// Forget a release because the host handed the offset out again.
    pub fn mark_live(&mut self, offset: u64) {
        self.released.remove(&offset);
    }

    pub fn released_count(&self) -> usize {
        self.released.len()
    }
}
