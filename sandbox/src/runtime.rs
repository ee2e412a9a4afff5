//! Sandbox runtime: Wasmtime engine, kernel memory and plugin calls.
//!
//! [`WasmHost`] is a `HostRuntime` whose regions live in a wasmtime linear
//! memory owned by the kernel. [`Plugin`] loads a WASM guest against the
//! same kernel and runs its exports under a fuel limit.

use tracing::{debug, warn};
use wasmtime::{Config, Engine, Instance, Linker, Memory, MemoryType, Module, Store, Trap};

use tether_hostapi::{
    DispatchPath, FunctionTable, HostError, HostFunctionDescriptor, HostMemory, HostRuntime,
    Region, Value,
};

use crate::config::SandboxConfig;
use crate::error::SandboxError;
use crate::host_impl::{self, KernelState};
use crate::linker::register_kernel_functions;
use crate::memory::{RegionAllocator, KERNEL_BASE, PAGE_SIZE};
use crate::validation::{validate_export, validate_module};

/// Host runtime backed by a wasmtime linear memory.
pub struct WasmHost {
    store: Store<KernelState>,
}

impl WasmHost {
    /// Create a standalone runtime with its own engine.
    pub fn new(config: &SandboxConfig, functions: FunctionTable) -> Result<Self, SandboxError> {
        let engine = create_engine(config)?;
        Self::with_engine(&engine, config, functions)
    }

    pub(crate) fn with_engine(
        engine: &Engine,
        config: &SandboxConfig,
        functions: FunctionTable,
    ) -> Result<Self, SandboxError> {
        let mut store = Store::new(engine, KernelState::new(config, functions));

        let ty = MemoryType::new(config.initial_memory_pages, Some(config.max_memory_pages));
        let memory = Memory::new(&mut store, ty)
            .map_err(|e| SandboxError::MemoryError(format!("kernel memory: {}", e)))?;
        let capacity = memory.data_size(&store) as u64;

        let state = store.data_mut();
        state.memory = Some(memory);
        state.allocator = RegionAllocator::new(KERNEL_BASE, capacity);

        Ok(Self { store })
    }

    /// Replace the current call's input, freeing the previous input region.
    pub fn set_input(&mut self, input: &[u8]) -> Result<Region, HostError> {
        if let Some(previous) = self.store.data_mut().input.take() {
            if host_impl::locate(&self.store, previous.offset).is_ok() {
                host_impl::free(&mut self.store, previous.offset)?;
            }
        }
        let region = host_impl::alloc(&mut self.store, input)?;
        self.store.data_mut().input = Some(region);
        Ok(region)
    }

    /// Bytes of the current call's output. Empty if none was set.
    pub fn output(&self) -> Result<Vec<u8>, HostError> {
        match self.store.data().output {
            Some(region) => host_impl::read_span(&self.store, region),
            None => Ok(Vec::new()),
        }
    }

    /// Free the current call's input and output regions.
    pub fn finish_call(&mut self) -> Result<(), HostError> {
        host_impl::release_call_regions(&mut self.store)
    }

    /// Number of live regions.
    pub fn live_regions(&self) -> usize {
        self.store.data().allocator.live_count()
    }

    /// Sum of live region lengths.
    pub fn live_bytes(&self) -> u64 {
        self.store.data().allocator.live_bytes()
    }

    /// Current kernel memory size in pages.
    pub fn memory_pages(&self) -> u64 {
        self.store.data().allocator.capacity() / PAGE_SIZE
    }
}

impl HostMemory for WasmHost {
    fn allocate(&mut self, bytes: &[u8]) -> Result<Region, HostError> {
        host_impl::alloc(&mut self.store, bytes)
    }

    fn locate(&self, offset: u64) -> Result<Region, HostError> {
        host_impl::locate(&self.store, offset)
    }

    fn free(&mut self, offset: u64) -> Result<(), HostError> {
        host_impl::free(&mut self.store, offset)
    }

    fn read_region(&self, offset: u64) -> Result<Vec<u8>, HostError> {
        host_impl::read(&self.store, offset)
    }
}

impl HostRuntime for WasmHost {
    fn list_functions(&self) -> Vec<HostFunctionDescriptor> {
        self.store.data().functions.descriptors()
    }

    fn invoke_with_result(&mut self, index: u32, args: &[Value]) -> Result<Value, HostError> {
        host_impl::invoke(&mut self.store, index, DispatchPath::WithResult, args)?
            .ok_or_else(HostError::arity_mismatch)
    }

    fn invoke_no_result(&mut self, index: u32, args: &[Value]) -> Result<(), HostError> {
        host_impl::invoke(&mut self.store, index, DispatchPath::NoResult, args).map(|_| ())
    }

    fn call_input_bytes(&self) -> Result<Vec<u8>, HostError> {
        match self.store.data().input {
            Some(region) => host_impl::read_span(&self.store, region),
            None => Ok(Vec::new()),
        }
    }

    fn set_call_output_bytes(&mut self, bytes: &[u8]) -> Result<(), HostError> {
        let region = host_impl::alloc(&mut self.store, bytes)?;
        host_impl::set_output(&mut self.store, region)
    }
}

/// A validated WASM guest instantiated against the kernel.
///
/// The instance and its kernel memory persist across calls; each call gets
/// a fresh fuel budget and its own input and output regions.
pub struct Plugin {
    host: WasmHost,
    module: Module,
    instance: Instance,
    fuel_limit: u64,
}

impl Plugin {
    /// Compile, validate and instantiate `wasm` (binary or text format).
    pub fn new(
        wasm: &[u8],
        config: SandboxConfig,
        functions: FunctionTable,
    ) -> Result<Self, SandboxError> {
        let engine = create_engine(&config)?;
        let module = Module::new(&engine, wasm)?;
        validate_module(&module)?;

        let mut host = WasmHost::with_engine(&engine, &config, functions)?;
        let mut linker = Linker::new(&engine);
        register_kernel_functions(&mut linker)?;

        // A start function runs during instantiation and needs fuel too.
        host.store.set_fuel(config.fuel_limit)?;
        let instance = handle_trap(linker.instantiate(&mut host.store, &module))?;

        Ok(Self {
            host,
            module,
            instance,
            fuel_limit: config.fuel_limit,
        })
    }

    /// Run `export` with `input` and return the bytes it set as output.
    ///
    /// The input and output regions are freed before returning, whatever
    /// the outcome.
    pub fn call(&mut self, export: &str, input: &[u8]) -> Result<Vec<u8>, SandboxError> {
        validate_export(&self.module, export)?;
        let func = self
            .instance
            .get_typed_func::<(), i32>(&mut self.host.store, export)?;

        self.host.store.set_fuel(self.fuel_limit)?;
        self.host.set_input(input)?;
        debug!(export, input_len = input.len(), "plugin call");

        let outcome = match handle_trap(func.call(&mut self.host.store, ())) {
            Ok(0) => self.host.output().map_err(SandboxError::from),
            Ok(code) => Err(SandboxError::CallFailed(code)),
            Err(e) => Err(e),
        };
        let fuel_used = self
            .fuel_limit
            .saturating_sub(self.host.store.get_fuel().unwrap_or(0));
        debug!(export, fuel_used, ok = outcome.is_ok(), "plugin call finished");

        let cleanup = self.host.finish_call();
        settle_call(export, outcome, cleanup)
    }

    /// Whether the module exports `name` with the plugin call signature.
    pub fn has_export(&self, name: &str) -> bool {
        validate_export(&self.module, name).is_ok()
    }

    pub fn host(&self) -> &WasmHost {
        &self.host
    }

    /// The kernel runtime, for building a `GuestContext` between calls.
    pub fn host_mut(&mut self) -> &mut WasmHost {
        &mut self.host
    }
}

/// Create a Wasmtime engine with deterministic configuration.
pub(crate) fn create_engine(config: &SandboxConfig) -> Result<Engine, SandboxError> {
    let mut wasm_config = Config::new();

    // Fuel metering: prevents infinite loops
    wasm_config.consume_fuel(true);

    // Determinism enforcement
    wasm_config.wasm_threads(false);
    wasm_config.wasm_simd(false);
    wasm_config.wasm_relaxed_simd(false);
    wasm_config.wasm_multi_memory(false);
    wasm_config.cranelift_nan_canonicalization(true);

    let max_bytes = u64::from(config.max_memory_pages) * PAGE_SIZE;
    wasm_config.memory_guaranteed_dense_image_size(max_bytes.min(16 * 1024 * 1024));

    Ok(Engine::new(&wasm_config)?)
}

/// Combine a call's outcome with the release of its regions.
///
/// The guest's own error wins; a cleanup failure is only reported when the
/// call itself succeeded.
fn settle_call<T>(
    export: &str,
    outcome: Result<T, SandboxError>,
    cleanup: Result<(), HostError>,
) -> Result<T, SandboxError> {
    match cleanup {
        Ok(()) => outcome,
        Err(e) => {
            warn!(export, error = %e, "failed to release call regions");
            outcome.and(Err(e.into()))
        }
    }
}

/// Convert a guest call result, mapping traps to `SandboxError`.
///
/// Fuel exhaustion → `SandboxError::FuelExhausted`
/// Other traps → `SandboxError::GuestTrapped`
fn handle_trap<R>(result: Result<R, anyhow::Error>) -> Result<R, SandboxError> {
    match result {
        Ok(val) => Ok(val),
        Err(e) => {
            if matches!(e.downcast_ref::<Trap>(), Some(Trap::OutOfFuel)) {
                Err(SandboxError::FuelExhausted)
            } else {
                Err(SandboxError::GuestTrapped(format!("{:#}", e)))
            }
        }
    }
}
