//! Host-side error types for the Tether host runtime boundary.
//!
//! `HostError` is the error type returned by every `HostMemory` and
//! `HostRuntime` method. It wraps a numeric `ErrorCode` for failures that
//! cross the guest/host boundary and provides an `Internal` variant for
//! host-only failures that carry a descriptive message.

use std::fmt;

/// Numeric error codes shared by the host runtime and WASM guests.
///
/// Values are stable: WASM guests observe them as `i32` return codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ErrorCode {
    Ok = 0,
    BadOffset = 1,
    OutOfMemory = 2,
    RegionTooLarge = 3,
    UnknownFunction = 4,
    ArityMismatch = 5,
    InvalidArgument = 6,
    InvalidEncoding = 7,
    CallbackFailed = 8,
    Internal = 10,
}

impl ErrorCode {
    /// Convert from an i32 error code returned across the boundary.
    pub fn from_i32(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Ok),
            1 => Some(Self::BadOffset),
            2 => Some(Self::OutOfMemory),
            3 => Some(Self::RegionTooLarge),
            4 => Some(Self::UnknownFunction),
            5 => Some(Self::ArityMismatch),
            6 => Some(Self::InvalidArgument),
            7 => Some(Self::InvalidEncoding),
            8 => Some(Self::CallbackFailed),
            10 => Some(Self::Internal),
            _ => None,
        }
    }

    /// Return the i32 representation of this error code.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Returns true if this is the `Ok` variant.
    pub fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "OK"),
            Self::BadOffset => write!(f, "ERR_BAD_OFFSET"),
            Self::OutOfMemory => write!(f, "ERR_OUT_OF_MEMORY"),
            Self::RegionTooLarge => write!(f, "ERR_REGION_TOO_LARGE"),
            Self::UnknownFunction => write!(f, "ERR_UNKNOWN_FUNCTION"),
            Self::ArityMismatch => write!(f, "ERR_ARITY_MISMATCH"),
            Self::InvalidArgument => write!(f, "ERR_INVALID_ARGUMENT"),
            Self::InvalidEncoding => write!(f, "ERR_INVALID_ENCODING"),
            Self::CallbackFailed => write!(f, "ERR_CALLBACK_FAILED"),
            Self::Internal => write!(f, "ERR_INTERNAL"),
        }
    }
}

/// Host-side error type returned by the runtime traits.
///
/// Guests see the `i32` error code via [`to_error_code`](HostError::to_error_code).
/// The `Internal` variant is mapped to `ErrorCode::Internal` (10) for the guest
/// but keeps its message for host-side diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    /// A boundary error code.
    Code(ErrorCode),
    /// An internal host error not directly mapped to a code.
    Internal(String),
}

impl HostError {
    /// Convert to the `i32` error code returned to a WASM guest.
    pub fn to_error_code(&self) -> i32 {
        match self {
            Self::Code(code) => code.as_i32(),
            Self::Internal(_) => ErrorCode::Internal as i32,
        }
    }

    /// The `ErrorCode` this error surfaces as.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Code(code) => *code,
            Self::Internal(_) => ErrorCode::Internal,
        }
    }

    pub fn bad_offset() -> Self {
        Self::Code(ErrorCode::BadOffset)
    }

    pub fn out_of_memory() -> Self {
        Self::Code(ErrorCode::OutOfMemory)
    }

    pub fn region_too_large() -> Self {
        Self::Code(ErrorCode::RegionTooLarge)
    }

    pub fn unknown_function() -> Self {
        Self::Code(ErrorCode::UnknownFunction)
    }

    pub fn arity_mismatch() -> Self {
        Self::Code(ErrorCode::ArityMismatch)
    }

    pub fn invalid_argument() -> Self {
        Self::Code(ErrorCode::InvalidArgument)
    }

    pub fn invalid_encoding() -> Self {
        Self::Code(ErrorCode::InvalidEncoding)
    }

    pub fn callback_failed() -> Self {
        Self::Code(ErrorCode::CallbackFailed)
    }
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Code(code) => write!(f, "host error: {}", code),
            Self::Internal(msg) => write!(f, "internal host error: {}", msg),
        }
    }
}

impl std::error::Error for HostError {}

impl From<ErrorCode> for HostError {
    fn from(code: ErrorCode) -> Self {
        Self::Code(code)
    }
}
