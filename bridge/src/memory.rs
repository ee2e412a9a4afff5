//! Memory Bridge: marshal guest values to and from host-managed regions.
//!
//! `Memory` is a short-lived view over a `GuestContext`: it borrows the host
//! runtime and the release ledger. Every allocation returns a
//! [`MemoryHandle`] the caller must release exactly once.
//!
//! Fixed-width numbers are stored little-endian. Typed readers require the
//! region length to match the type width exactly; nothing is truncated or
//! padded.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, trace};

use tether_hostapi::{ErrorCode, HostError, HostRuntime};

use crate::error::{BridgeError, BridgeResult};
use crate::handle::{HandleLedger, MemoryHandle, Numeric, NumericKind};
use crate::text::{self, TextDecoder, TextEncoder};

/// Guest-side view of host memory.
pub struct Memory<'a, H: HostRuntime> {
    host: &'a mut H,
    ledger: &'a mut HandleLedger,
}

impl<'a, H: HostRuntime> Memory<'a, H> {
    pub(crate) fn new(host: &'a mut H, ledger: &'a mut HandleLedger) -> Self {
        Self { host, ledger }
    }

    // ── Allocation ──

    /// Copy `bytes` into a fresh host region.
    pub fn allocate_bytes(&mut self, bytes: &[u8]) -> BridgeResult<MemoryHandle> {
        let region = self
            .host
            .allocate(bytes)
            .map_err(|source| BridgeError::Allocation {
                len: bytes.len() as u64,
                source,
            })?;
        self.ledger.mark_live(region.offset);
        debug!(offset = region.offset, len = region.len, "allocated region");
        Ok(region.into())
    }

    /// UTF-8 encode `text` and allocate it.
    pub fn allocate_string(&mut self, text: &str) -> BridgeResult<MemoryHandle> {
        let bytes = TextEncoder::new().encode(text);
        self.allocate_bytes(&bytes)
    }

    /// Allocate raw bytes that must already be valid UTF-8.
    ///
    /// Returns `MalformedInput` without allocating if they are not.
    pub fn allocate_utf8(&mut self, bytes: &[u8]) -> BridgeResult<MemoryHandle> {
        let text = text::validate_utf8(bytes)?;
        self.allocate_string(text)
    }

    /// Serialize `value` as JSON and allocate the text.
    pub fn allocate_json<T: Serialize + ?Sized>(&mut self, value: &T) -> BridgeResult<MemoryHandle> {
        let json = serde_json::to_vec(value)?;
        self.allocate_bytes(&json)
    }

    /// Allocate a fixed-width number as little-endian bytes.
    pub fn allocate_fixed_width(&mut self, value: Numeric) -> BridgeResult<MemoryHandle> {
        self.allocate_bytes(&value.to_le_bytes())
    }

    pub fn allocate_u32(&mut self, value: u32) -> BridgeResult<MemoryHandle> {
        self.allocate_fixed_width(Numeric::U32(value))
    }

    pub fn allocate_u64(&mut self, value: u64) -> BridgeResult<MemoryHandle> {
        self.allocate_fixed_width(Numeric::U64(value))
    }

    pub fn allocate_f32(&mut self, value: f32) -> BridgeResult<MemoryHandle> {
        self.allocate_fixed_width(Numeric::F32(value))
    }

    pub fn allocate_f64(&mut self, value: f64) -> BridgeResult<MemoryHandle> {
        self.allocate_fixed_width(Numeric::F64(value))
    }

    // ── Lookup ──

    /// Wrap an offset obtained elsewhere (e.g. a host call result) in a handle.
    ///
    /// The host is the authority: an offset this guest released earlier is
    /// live again once the host hands it back, and its ledger entry is dropped.
    pub fn locate(&mut self, offset: u64) -> BridgeResult<MemoryHandle> {
        let region = self
            .host
            .locate(offset)
            .map_err(|_| BridgeError::NotFound { offset })?;
        self.ledger.mark_live(offset);
        Ok(region.into())
    }

    // ── Reading ──

    /// Exactly `handle.len` bytes starting at `handle.offset`.
    pub fn read_bytes(&self, handle: MemoryHandle) -> BridgeResult<Vec<u8>> {
        let out_of_bounds = || BridgeError::OutOfBounds {
            offset: handle.offset,
            len: handle.len,
        };
        let data = self.host.read_region(handle.offset).map_err(|_| {
            if self.ledger.is_released(handle.offset) {
                BridgeError::UseAfterFree {
                    offset: handle.offset,
                }
            } else {
                out_of_bounds()
            }
        })?;
        if data.len() as u64 != handle.len {
            return Err(out_of_bounds());
        }
        trace!(offset = handle.offset, len = handle.len, "read region");
        Ok(data)
    }

    /// Decode the region as UTF-8, substituting U+FFFD for malformed bytes.
    ///
    /// A leading byte order mark is kept, so any string written with
    /// [`allocate_string`](Self::allocate_string) reads back unchanged.
    pub fn read_string(&self, handle: MemoryHandle) -> BridgeResult<String> {
        self.read_string_with(handle, &TextDecoder::keeping_bom())
    }

    pub fn read_string_with(
        &self,
        handle: MemoryHandle,
        decoder: &TextDecoder,
    ) -> BridgeResult<String> {
        let bytes = self.read_bytes(handle)?;
        decoder.decode_bytes(&bytes)
    }

    pub fn read_u32(&self, handle: MemoryHandle) -> BridgeResult<u32> {
        let bytes = self.read_exact::<4>(handle, NumericKind::U32)?;
        Ok(u32::from_le_bytes(bytes))
    }

    pub fn read_u64(&self, handle: MemoryHandle) -> BridgeResult<u64> {
        let bytes = self.read_exact::<8>(handle, NumericKind::U64)?;
        Ok(u64::from_le_bytes(bytes))
    }

    pub fn read_f32(&self, handle: MemoryHandle) -> BridgeResult<f32> {
        let bytes = self.read_exact::<4>(handle, NumericKind::F32)?;
        Ok(f32::from_le_bytes(bytes))
    }

    pub fn read_f64(&self, handle: MemoryHandle) -> BridgeResult<f64> {
        let bytes = self.read_exact::<8>(handle, NumericKind::F64)?;
        Ok(f64::from_le_bytes(bytes))
    }

    /// Parse the region as JSON.
    pub fn read_json<T: DeserializeOwned>(&self, handle: MemoryHandle) -> BridgeResult<T> {
        let bytes = self.read_bytes(handle)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn read_exact<const N: usize>(
        &self,
        handle: MemoryHandle,
        kind: NumericKind,
    ) -> BridgeResult<[u8; N]> {
        let expected = kind.width();
        if handle.len != expected {
            return Err(BridgeError::SizeMismatch {
                expected,
                actual: handle.len,
            });
        }
        let bytes = self.read_bytes(handle)?;
        bytes
            .as_slice()
            .try_into()
            .map_err(|_| BridgeError::SizeMismatch {
                expected,
                actual: bytes.len() as u64,
            })
    }

    // ── Release ──

    /// Free the region. A second release of the same handle is `UseAfterFree`,
    /// unless the host has since handed the offset out again.
    pub fn release(&mut self, handle: MemoryHandle) -> BridgeResult<()> {
        let offset = handle.offset;
        self.host.free(offset).map_err(|source| match source {
            HostError::Code(ErrorCode::BadOffset) => BridgeError::UseAfterFree { offset },
            source => BridgeError::HostInvocation {
                name: "free".into(),
                source,
            },
        })?;
        self.ledger.mark_released(offset);
        debug!(offset, len = handle.len, "released region");
        Ok(())
    }
}
