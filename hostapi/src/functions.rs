//! Native function table shared by host runtime implementations.
//!
//! A `FunctionTable` is an ordered list of `(descriptor, callback)` pairs.
//! The position of an entry is its dispatch index and never changes once the
//! entry is registered. Callbacks receive the runtime's memory so they can
//! read argument regions and allocate result regions.

use std::fmt;
use std::sync::Arc;

use crate::error::HostError;
use crate::traits::HostMemory;
use crate::types::{HostFunctionDescriptor, Value};

/// Host callback signature.
///
/// Result-returning functions must return `Ok(Some(_))`; zero-result
/// functions should return `Ok(None)`.
pub type HostCallback =
    Arc<dyn Fn(&mut dyn HostMemory, &[Value]) -> Result<Option<Value>, HostError> + Send + Sync>;

/// Which dispatch path a call came through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchPath {
    /// `invoke_no_result`
    NoResult,
    /// `invoke_with_result`
    WithResult,
}

/// Ordered registry of host functions.
#[derive(Clone, Default)]
pub struct FunctionTable {
    entries: Vec<(HostFunctionDescriptor, HostCallback)>,
}

impl FunctionTable {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Register a function and return its dispatch index.
    pub fn register<F>(&mut self, name: impl Into<String>, results: u32, callback: F) -> u32
    where
        F: Fn(&mut dyn HostMemory, &[Value]) -> Result<Option<Value>, HostError>
            + Send
            + Sync
            + 'static,
    {
        let index = self.entries.len() as u32;
        self.entries
            .push((HostFunctionDescriptor::new(name, results), Arc::new(callback)));
        index
    }

    /// Builder form of [`register`](Self::register).
    pub fn with<F>(mut self, name: impl Into<String>, results: u32, callback: F) -> Self
    where
        F: Fn(&mut dyn HostMemory, &[Value]) -> Result<Option<Value>, HostError>
            + Send
            + Sync
            + 'static,
    {
        self.register(name, results, callback);
        self
    }

    /// Descriptors in dispatch order.
    pub fn descriptors(&self) -> Vec<HostFunctionDescriptor> {
        self.entries.iter().map(|(d, _)| d.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve `index` for a call through `path`.
    ///
    /// The callback is cloned out so the caller can hand its runtime to it
    /// as `&mut dyn HostMemory` without holding a borrow of the table.
    pub fn resolve(&self, index: u32, path: DispatchPath) -> Result<HostCallback, HostError> {
        let (descriptor, callback) = self
            .entries
            .get(index as usize)
            .ok_or_else(HostError::unknown_function)?;
        let path_ok = match path {
            DispatchPath::NoResult => !descriptor.returns_value(),
            DispatchPath::WithResult => descriptor.returns_value(),
        };
        if !path_ok {
            return Err(HostError::arity_mismatch());
        }
        Ok(Arc::clone(callback))
    }
}

impl fmt::Debug for FunctionTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|(d, _)| d))
            .finish()
    }
}

/// Run a resolved result-returning callback. A missing result is an arity mismatch.
pub fn call_with_result(
    callback: &HostCallback,
    memory: &mut dyn HostMemory,
    args: &[Value],
) -> Result<Value, HostError> {
    callback(memory, args)?.ok_or_else(HostError::arity_mismatch)
}

/// Run a resolved zero-result callback. Any returned value is discarded.
pub fn call_no_result(
    callback: &HostCallback,
    memory: &mut dyn HostMemory,
    args: &[Value],
) -> Result<(), HostError> {
    callback(memory, args).map(|_| ())
}
