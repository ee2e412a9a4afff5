//! Shared test helpers for bridge integration tests.
//!
//! Provides a host runtime that records every dispatch so tests can assert
//! which path and index a call took, plus a standard function table.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use tether_bridge::GuestContext;
use tether_hostapi::{
    DispatchPath, FunctionTable, HostError, HostFunctionDescriptor, HostMemory, HostRuntime,
    MemHost, Region, Value,
};

/// One recorded dispatch: which path, which index, which arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    pub path: DispatchPath,
    pub index: u32,
    pub args: Vec<Value>,
}

/// `MemHost` wrapper that records dispatches and list queries.
pub struct RecordingHost {
    pub inner: MemHost,
    pub dispatches: Vec<Dispatch>,
    pub list_queries: Arc<Mutex<u32>>,
}

impl RecordingHost {
    pub fn new(inner: MemHost) -> Self {
        Self {
            inner,
            dispatches: Vec::new(),
            list_queries: Arc::new(Mutex::new(0)),
        }
    }
}

impl HostMemory for RecordingHost {
    fn allocate(&mut self, bytes: &[u8]) -> Result<Region, HostError> {
        self.inner.allocate(bytes)
    }

    fn locate(&self, offset: u64) -> Result<Region, HostError> {
        self.inner.locate(offset)
    }

    fn free(&mut self, offset: u64) -> Result<(), HostError> {
        self.inner.free(offset)
    }

    fn read_region(&self, offset: u64) -> Result<Vec<u8>, HostError> {
        self.inner.read_region(offset)
    }
}

impl HostRuntime for RecordingHost {
    fn list_functions(&self) -> Vec<HostFunctionDescriptor> {
        *self.list_queries.lock().unwrap() += 1;
        self.inner.list_functions()
    }

    fn invoke_with_result(&mut self, index: u32, args: &[Value]) -> Result<Value, HostError> {
        self.dispatches.push(Dispatch {
            path: DispatchPath::WithResult,
            index,
            args: args.to_vec(),
        });
        self.inner.invoke_with_result(index, args)
    }

    fn invoke_no_result(&mut self, index: u32, args: &[Value]) -> Result<(), HostError> {
        self.dispatches.push(Dispatch {
            path: DispatchPath::NoResult,
            index,
            args: args.to_vec(),
        });
        self.inner.invoke_no_result(index, args)
    }

    fn call_input_bytes(&self) -> Result<Vec<u8>, HostError> {
        self.inner.call_input_bytes()
    }

    fn set_call_output_bytes(&mut self, bytes: &[u8]) -> Result<(), HostError> {
        self.inner.set_call_output_bytes(bytes)
    }
}

/// `[("add", 1), ("log", 0)]`. `log` appends text arguments to `sink`.
pub fn add_and_log(sink: Arc<Mutex<Vec<String>>>) -> FunctionTable {
    FunctionTable::new()
        .with("add", 1, |_, args| {
            let a = args.first().and_then(Value::as_u64).ok_or_else(HostError::invalid_argument)?;
            let b = args.get(1).and_then(Value::as_u64).ok_or_else(HostError::invalid_argument)?;
            Ok(Some(Value::U64(a + b)))
        })
        .with("log", 0, move |mem, args| {
            for arg in args {
                let line = match arg {
                    Value::Text(s) => s.clone(),
                    Value::Handle(region) => {
                        String::from_utf8_lossy(&mem.read_region(region.offset)?).into_owned()
                    }
                    other => format!("{other:?}"),
                };
                sink.lock().unwrap().push(line);
            }
            Ok(None)
        })
}

/// Context over a plain `MemHost` with no functions.
pub fn plain_context() -> GuestContext<MemHost> {
    GuestContext::new(MemHost::new())
}

/// Context over a recording host with `add` and `log`.
pub fn recording_context(sink: Arc<Mutex<Vec<String>>>) -> GuestContext<RecordingHost> {
    let host = MemHost::new().with_functions(add_and_log(sink));
    GuestContext::new(RecordingHost::new(host))
}
