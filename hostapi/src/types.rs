//! Shared boundary types and host configuration.
//!
//! `Region` is the host's view of an allocated byte range, `Value` is the
//! closed set of kinds that may be passed to or returned from a host
//! function, and `HostConfig` bundles the memory limits a runtime enforces.

/// An allocated region in host-managed memory.
///
/// Offset `0` never names a live region; runtimes use it as the null offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Region {
    pub offset: u64,
    pub len: u64,
}

impl Region {
    pub fn new(offset: u64, len: u64) -> Self {
        Self { offset, len }
    }

    /// One past the last byte of the region, or `None` on overflow.
    pub fn end(&self) -> Option<u64> {
        self.offset.checked_add(self.len)
    }
}

/// A host function entry as reported by `HostRuntime::list_functions`.
///
/// The dispatch index is the entry's position in that list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostFunctionDescriptor {
    pub name: String,
    /// Number of results. Zero selects the no-result dispatch path.
    pub results: u32,
}

impl HostFunctionDescriptor {
    pub fn new(name: impl Into<String>, results: u32) -> Self {
        Self {
            name: name.into(),
            results,
        }
    }

    pub fn returns_value(&self) -> bool {
        self.results > 0
    }
}

/// A marshalable value crossing the guest/host call boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bytes(Vec<u8>),
    Text(String),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    /// Reference to a region the guest already owns.
    Handle(Region),
}

impl Value {
    /// Short kind name, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Bytes(_) => "bytes",
            Self::Text(_) => "text",
            Self::U32(_) => "u32",
            Self::U64(_) => "u64",
            Self::F32(_) => "f32",
            Self::F64(_) => "f64",
            Self::Handle(_) => "handle",
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Self::U32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::U64(v) => Some(*v),
            Self::U32(v) => Some(*v as u64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::F64(v) => Some(*v),
            Self::F32(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_handle(&self) -> Option<Region> {
        match self {
            Self::Handle(r) => Some(*r),
            _ => None,
        }
    }
}

/// Memory limits enforced by a host runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostConfig {
    /// Largest single region the host will allocate, in bytes.
    pub max_region_len: u64,
    /// Upper bound on the sum of all live region lengths.
    pub max_total_bytes: u64,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            max_region_len: 4 * 1024 * 1024,   // 4 MiB
            max_total_bytes: 16 * 1024 * 1024, // 16 MiB
        }
    }
}
