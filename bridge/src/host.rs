//! Host Call Bridge: dispatch guest calls to host functions by index.
//!
//! The host's function table is enumerated once per `GuestContext` and
//! cached; the position of each descriptor is its dispatch index for the
//! rest of the invocation. [`BoundFunction`] closes over that index and the
//! declared result arity, and selects the zero-result or result-returning
//! dispatch path accordingly.

use std::collections::BTreeMap;

use tracing::debug;

use tether_hostapi::{HostError, HostFunctionDescriptor, HostRuntime, Value};

use crate::error::{BridgeError, BridgeResult};
use crate::handle::{HandleLedger, MemoryHandle, Numeric};

/// A guest-side argument to a host function.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Bytes(Vec<u8>),
    Text(String),
    Number(Numeric),
    Handle(MemoryHandle),
}

impl From<MemoryHandle> for Arg {
    fn from(handle: MemoryHandle) -> Self {
        Self::Handle(handle)
    }
}

impl From<Numeric> for Arg {
    fn from(n: Numeric) -> Self {
        Self::Number(n)
    }
}

impl From<&str> for Arg {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Arg {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Vec<u8>> for Arg {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<u32> for Arg {
    fn from(v: u32) -> Self {
        Self::Number(Numeric::U32(v))
    }
}

impl From<u64> for Arg {
    fn from(v: u64) -> Self {
        Self::Number(Numeric::U64(v))
    }
}

impl From<f32> for Arg {
    fn from(v: f32) -> Self {
        Self::Number(Numeric::F32(v))
    }
}

impl From<f64> for Arg {
    fn from(v: f64) -> Self {
        Self::Number(Numeric::F64(v))
    }
}

/// A host function bound to its dispatch index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundFunction {
    name: String,
    index: u32,
    results: u32,
}

impl BoundFunction {
    fn new(index: u32, descriptor: &HostFunctionDescriptor) -> Self {
        Self {
            name: descriptor.name.clone(),
            index,
            results: descriptor.results,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn results(&self) -> u32 {
        self.results
    }

    /// Invoke the function. Zero-result functions return `Ok(None)`.
    pub fn call<H: HostRuntime>(
        &self,
        host: &mut Host<'_, H>,
        args: &[Arg],
    ) -> BridgeResult<Option<Value>> {
        host.dispatch(self, args)
    }
}

/// Guest-side view of the host's function table and call I/O.
pub struct Host<'a, H: HostRuntime> {
    runtime: &'a mut H,
    ledger: &'a HandleLedger,
    functions: &'a mut Option<Vec<HostFunctionDescriptor>>,
}

impl<'a, H: HostRuntime> Host<'a, H> {
    pub(crate) fn new(
        runtime: &'a mut H,
        ledger: &'a HandleLedger,
        functions: &'a mut Option<Vec<HostFunctionDescriptor>>,
    ) -> Self {
        Self {
            runtime,
            ledger,
            functions,
        }
    }

    /// Host functions in dispatch order.
    ///
    /// The runtime is queried on first use only; later calls return the
    /// cached list so indices stay stable.
    pub fn enumerate_host_functions(&mut self) -> &[HostFunctionDescriptor] {
        let runtime = &*self.runtime;
        self.functions.get_or_insert_with(|| {
            let functions = runtime.list_functions();
            debug!(count = functions.len(), "enumerated host functions");
            functions
        })
        .as_slice()
    }

    /// Bind every host function by name.
    ///
    /// If two descriptors share a name the later one wins; indices remain
    /// positional.
    pub fn bind_all(&mut self) -> BTreeMap<String, BoundFunction> {
        self.enumerate_host_functions()
            .iter()
            .enumerate()
            .map(|(index, d)| (d.name.clone(), BoundFunction::new(index as u32, d)))
            .collect()
    }

    /// Look up `name` and invoke it.
    pub fn call(&mut self, name: &str, args: &[Arg]) -> BridgeResult<Option<Value>> {
        let bound = self
            .enumerate_host_functions()
            .iter()
            .enumerate()
            .rev()
            .find(|(_, d)| d.name == name)
            .map(|(index, d)| BoundFunction::new(index as u32, d))
            .ok_or_else(|| BridgeError::HostInvocation {
                name: name.to_string(),
                source: HostError::unknown_function(),
            })?;
        self.dispatch(&bound, args)
    }

    fn dispatch(&mut self, function: &BoundFunction, args: &[Arg]) -> BridgeResult<Option<Value>> {
        let values = self.marshal(args)?;
        debug!(
            name = %function.name,
            index = function.index,
            results = function.results,
            args = values.len(),
            "dispatching host function"
        );
        let invocation_error = |source: HostError| BridgeError::HostInvocation {
            name: function.name.clone(),
            source,
        };
        if function.results == 0 {
            self.runtime
                .invoke_no_result(function.index, &values)
                .map_err(invocation_error)?;
            Ok(None)
        } else {
            self.runtime
                .invoke_with_result(function.index, &values)
                .map(Some)
                .map_err(invocation_error)
        }
    }

    /// Convert guest arguments to boundary values, rejecting released handles.
    ///
    /// A handle whose offset the host reports live again is forwarded.
    fn marshal(&self, args: &[Arg]) -> BridgeResult<Vec<Value>> {
        args.iter()
            .map(|arg| match arg {
                Arg::Handle(handle)
                    if self.ledger.is_released(handle.offset)
                        && self.runtime.locate(handle.offset).is_err() =>
                {
                    Err(BridgeError::UseAfterFree {
                        offset: handle.offset,
                    })
                }
                Arg::Handle(handle) => Ok(Value::from(*handle)),
                Arg::Bytes(bytes) => Ok(Value::Bytes(bytes.clone())),
                Arg::Text(text) => Ok(Value::Text(text.clone())),
                Arg::Number(n) => Ok(Value::from(*n)),
            })
            .collect()
    }

    // ── Call I/O ──

    pub fn input_bytes(&self) -> BridgeResult<Vec<u8>> {
        self.runtime
            .call_input_bytes()
            .map_err(|source| io_error("input_bytes", source))
    }

    pub fn input_string(&self) -> BridgeResult<String> {
        self.runtime
            .call_input_string()
            .map_err(|source| io_error("input_string", source))
    }

    pub fn output_bytes(&mut self, output: &[u8]) -> BridgeResult<()> {
        self.runtime
            .set_call_output_bytes(output)
            .map_err(|source| io_error("output_bytes", source))
    }

    pub fn output_string(&mut self, output: &str) -> BridgeResult<()> {
        self.runtime
            .set_call_output_string(output)
            .map_err(|source| io_error("output_string", source))
    }
}

fn io_error(name: &str, source: HostError) -> BridgeError {
    BridgeError::HostInvocation {
        name: name.to_string(),
        source,
    }
}
