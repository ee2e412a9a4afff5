//! In-memory host runtime for testing.
//!
//! `MemHost` implements `HostRuntime` with a `BTreeMap` of regions keyed by
//! offset. Offsets are handed out monotonically starting at 1 and are never
//! reused, which makes stale-handle behavior easy to observe in tests.

use std::collections::BTreeMap;

use tracing::trace;

use crate::error::HostError;
use crate::functions::{call_no_result, call_with_result, DispatchPath, FunctionTable};
use crate::traits::{HostMemory, HostRuntime};
use crate::types::{HostConfig, HostFunctionDescriptor, Region, Value};

/// In-memory host runtime backed by `BTreeMap`.
#[derive(Debug, Clone)]
pub struct MemHost {
    regions: BTreeMap<u64, Vec<u8>>,
    next_offset: u64,
    total_bytes: u64,
    config: HostConfig,
    functions: FunctionTable,
    input: Vec<u8>,
    output: Vec<u8>,
}

impl Default for MemHost {
    fn default() -> Self {
        Self::new()
    }
}

impl MemHost {
    /// Create an empty runtime with default limits and no functions.
    pub fn new() -> Self {
        Self::with_config(HostConfig::default())
    }

    pub fn with_config(config: HostConfig) -> Self {
        Self {
            regions: BTreeMap::new(),
            next_offset: 1,
            total_bytes: 0,
            config,
            functions: FunctionTable::new(),
            input: Vec::new(),
            output: Vec::new(),
        }
    }

    /// Replace the function table.
    pub fn with_functions(mut self, functions: FunctionTable) -> Self {
        self.functions = functions;
        self
    }

    /// Set the bytes returned by `call_input_bytes`.
    pub fn set_input(&mut self, input: impl Into<Vec<u8>>) {
        self.input = input.into();
    }

    /// Bytes last written through `set_call_output_*`.
    pub fn output(&self) -> &[u8] {
        &self.output
    }

    /// Number of live regions.
    pub fn live_regions(&self) -> usize {
        self.regions.len()
    }

    /// Sum of live region lengths.
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }
}

impl HostMemory for MemHost {
    fn allocate(&mut self, bytes: &[u8]) -> Result<Region, HostError> {
        let len = bytes.len() as u64;
        if len > self.config.max_region_len {
            return Err(HostError::region_too_large());
        }
        if self.total_bytes + len > self.config.max_total_bytes {
            return Err(HostError::out_of_memory());
        }
        let offset = self.next_offset;
        self.next_offset = offset
            .checked_add(len.max(1))
            .ok_or_else(HostError::out_of_memory)?;
        self.regions.insert(offset, bytes.to_vec());
        self.total_bytes += len;
        trace!(offset, len, "mem host allocate");
        Ok(Region::new(offset, len))
    }

    fn locate(&self, offset: u64) -> Result<Region, HostError> {
        self.regions
            .get(&offset)
            .map(|data| Region::new(offset, data.len() as u64))
            .ok_or_else(HostError::bad_offset)
    }

    fn free(&mut self, offset: u64) -> Result<(), HostError> {
        let data = self
            .regions
            .remove(&offset)
            .ok_or_else(HostError::bad_offset)?;
        self.total_bytes -= data.len() as u64;
        trace!(offset, len = data.len(), "mem host free");
        Ok(())
    }

    fn read_region(&self, offset: u64) -> Result<Vec<u8>, HostError> {
        self.regions
            .get(&offset)
            .cloned()
            .ok_or_else(HostError::bad_offset)
    }
}

impl HostRuntime for MemHost {
    fn list_functions(&self) -> Vec<HostFunctionDescriptor> {
        self.functions.descriptors()
    }

    fn invoke_with_result(&mut self, index: u32, args: &[Value]) -> Result<Value, HostError> {
        let callback = self.functions.resolve(index, DispatchPath::WithResult)?;
        call_with_result(&callback, self, args)
    }

    fn invoke_no_result(&mut self, index: u32, args: &[Value]) -> Result<(), HostError> {
        let callback = self.functions.resolve(index, DispatchPath::NoResult)?;
        call_no_result(&callback, self, args)
    }

    fn call_input_bytes(&self) -> Result<Vec<u8>, HostError> {
        Ok(self.input.clone())
    }

    fn set_call_output_bytes(&mut self, bytes: &[u8]) -> Result<(), HostError> {
        self.output = bytes.to_vec();
        Ok(())
    }
}
