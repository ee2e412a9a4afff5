//! Host runtime traits: the primitives the guest-side bridge consumes.
//!
//! `HostMemory` covers region management in host-owned linear memory.
//! `HostRuntime` adds the native function table and the designated call
//! input/output buffers. Both work with Rust slices and values, never with
//! raw guest pointers; bounds checking is the implementation's job.

use crate::error::HostError;
use crate::types::{HostFunctionDescriptor, Region, Value};

/// Region management in host-owned memory.
pub trait HostMemory {
    /// Copy `bytes` into a freshly allocated region.
    ///
    /// Fails without allocating anything if the request cannot be satisfied.
    fn allocate(&mut self, bytes: &[u8]) -> Result<Region, HostError>;

    /// Look up the live region starting at `offset`.
    ///
    /// Returns `Err(HostError::bad_offset())` if no live region starts there.
    fn locate(&self, offset: u64) -> Result<Region, HostError>;

    /// Reclaim the region starting at `offset`.
    fn free(&mut self, offset: u64) -> Result<(), HostError>;

    /// Copy out the full contents of the region starting at `offset`.
    fn read_region(&self, offset: u64) -> Result<Vec<u8>, HostError>;
}

/// The complete host runtime surface.
pub trait HostRuntime: HostMemory {
    /// Host functions in dispatch order. Index = position in this list.
    fn list_functions(&self) -> Vec<HostFunctionDescriptor>;

    /// Invoke a function that produces a result.
    fn invoke_with_result(&mut self, index: u32, args: &[Value]) -> Result<Value, HostError>;

    /// Invoke a function that produces no result.
    fn invoke_no_result(&mut self, index: u32, args: &[Value]) -> Result<(), HostError>;

    /// Raw bytes of the current call's input.
    fn call_input_bytes(&self) -> Result<Vec<u8>, HostError>;

    /// Current call's input decoded as UTF-8.
    ///
    /// Returns `Err(HostError::invalid_encoding())` if the input is not UTF-8.
    fn call_input_string(&self) -> Result<String, HostError> {
        String::from_utf8(self.call_input_bytes()?).map_err(|_| HostError::invalid_encoding())
    }

    /// Replace the current call's output.
    fn set_call_output_bytes(&mut self, bytes: &[u8]) -> Result<(), HostError>;

    /// Replace the current call's output with UTF-8 text.
    fn set_call_output_string(&mut self, text: &str) -> Result<(), HostError> {
        self.set_call_output_bytes(text.as_bytes())
    }
}

impl<T: HostMemory + ?Sized> HostMemory for &mut T {
    fn allocate(&mut self, bytes: &[u8]) -> Result<Region, HostError> {
        (**self).allocate(bytes)
    }

    fn locate(&self, offset: u64) -> Result<Region, HostError> {
        (**self).locate(offset)
    }

    fn free(&mut self, offset: u64) -> Result<(), HostError> {
        (**self).free(offset)
    }

    fn read_region(&self, offset: u64) -> Result<Vec<u8>, HostError> {
        (**self).read_region(offset)
    }
}

/// Lets a borrowed runtime back a short-lived guest context.
impl<T: HostRuntime + ?Sized> HostRuntime for &mut T {
    fn list_functions(&self) -> Vec<HostFunctionDescriptor> {
        (**self).list_functions()
    }

    fn invoke_with_result(&mut self, index: u32, args: &[Value]) -> Result<Value, HostError> {
        (**self).invoke_with_result(index, args)
    }

    fn invoke_no_result(&mut self, index: u32, args: &[Value]) -> Result<(), HostError> {
        (**self).invoke_no_result(index, args)
    }

    fn call_input_bytes(&self) -> Result<Vec<u8>, HostError> {
        (**self).call_input_bytes()
    }

    fn call_input_string(&self) -> Result<String, HostError> {
        (**self).call_input_string()
    }

    fn set_call_output_bytes(&mut self, bytes: &[u8]) -> Result<(), HostError> {
        (**self).set_call_output_bytes(bytes)
    }

    fn set_call_output_string(&mut self, text: &str) -> Result<(), HostError> {
        (**self).set_call_output_string(text)
    }
}
