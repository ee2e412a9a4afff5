//! Kernel state held in the wasmtime `Store`, and the region operations
//! shared by the Rust-side runtime and the guest-facing kernel imports.
//!
//! Every operation is generic over `AsContext`/`AsContextMut` so it can run
//! against a `Store<KernelState>` or a `Caller<'_, KernelState>` alike.
//! [`ContextMemory`] exposes the same operations as `HostMemory`, which is
//! what host callbacks receive when a WASM guest invokes them.

use tracing::trace;
use wasmtime::{AsContext, AsContextMut, Memory};

use tether_hostapi::{
    call_no_result, call_with_result, DispatchPath, FunctionTable, HostConfig, HostError,
    HostMemory, Region, Value,
};

use crate::config::SandboxConfig;
use crate::memory::{self, AllocPlan, RegionAllocator, KERNEL_BASE};

/// Per-runtime state held in the wasmtime `Store`.
pub struct KernelState {
    /// Region allocator over kernel memory.
    pub allocator: RegionAllocator,
    /// Kernel memory. Set once right after the store is created.
    pub memory: Option<Memory>,
    /// Region holding the current call's input.
    pub input: Option<Region>,
    /// Region holding the current call's output. Owned by the kernel once set.
    pub output: Option<Region>,
    /// Host functions, in dispatch order.
    pub functions: FunctionTable,
    /// Region limits.
    pub config: HostConfig,
}

impl KernelState {
    pub fn new(config: &SandboxConfig, functions: FunctionTable) -> Self {
        Self {
            // Replaced with the real capacity once kernel memory exists.
            allocator: RegionAllocator::new(KERNEL_BASE, 0),
            memory: None,
            input: None,
            output: None,
            functions,
            config: config.host.clone(),
        }
    }

    /// Check region limits and plan an allocation of `len` bytes.
    fn plan_alloc(&self, len: u64) -> Result<AllocPlan, HostError> {
        if len > self.config.max_region_len {
            return Err(HostError::region_too_large());
        }
        if self.allocator.live_bytes() + len > self.config.max_total_bytes {
            return Err(HostError::out_of_memory());
        }
        Ok(self.allocator.plan(len))
    }
}

pub(crate) fn kernel_memory<C: AsContext<Data = KernelState>>(ctx: &C) -> Result<Memory, HostError> {
    ctx.as_context()
        .data()
        .memory
        .ok_or_else(|| HostError::Internal("kernel memory not initialized".into()))
}

/// Allocate a region and copy `data` into it.
pub fn alloc<C: AsContextMut<Data = KernelState>>(
    ctx: &mut C,
    data: &[u8],
) -> Result<Region, HostError> {
    let len = data.len() as u64;
    let memory = kernel_memory(&*ctx)?;
    let plan = ctx.as_context().data().plan_alloc(len)?;

    if plan.grow_pages > 0 {
        memory
            .grow(&mut *ctx, plan.grow_pages)
            .map_err(|_| HostError::out_of_memory())?;
    }
    // Blocks may be recycled, so the padding after the data is cleared too.
    let mut block = vec![0u8; plan.block as usize];
    block[..data.len()].copy_from_slice(data);
    memory::write_bytes(memory.data_mut(&mut *ctx), plan.offset, &block)?;
    ctx.as_context_mut().data_mut().allocator.commit(&plan, len);

    trace!(offset = plan.offset, len, reused = plan.reused, "kernel alloc");
    Ok(Region::new(plan.offset, len))
}

/// The live region starting at `offset`.
pub fn locate<C: AsContext<Data = KernelState>>(ctx: &C, offset: u64) -> Result<Region, HostError> {
    ctx.as_context()
        .data()
        .allocator
        .region(offset)
        .ok_or_else(HostError::bad_offset)
}

/// Copy out the full region starting at `offset`.
pub fn read<C: AsContext<Data = KernelState>>(ctx: &C, offset: u64) -> Result<Vec<u8>, HostError> {
    let region = locate(ctx, offset)?;
    read_span(ctx, region)
}

/// Copy out exactly `region.len` bytes at `region.offset`, live or not.
pub fn read_span<C: AsContext<Data = KernelState>>(
    ctx: &C,
    region: Region,
) -> Result<Vec<u8>, HostError> {
    let memory = kernel_memory(ctx)?;
    memory::read_bytes(memory.data(ctx), region.offset, region.len)
}

/// Release the region at `offset`.
pub fn free<C: AsContextMut<Data = KernelState>>(ctx: &mut C, offset: u64) -> Result<(), HostError> {
    let len = ctx.as_context_mut().data_mut().allocator.free(offset)?;
    trace!(offset, len, "kernel free");
    Ok(())
}

/// Record `region` as the call output, freeing a previous kernel-owned output.
pub fn set_output<C: AsContextMut<Data = KernelState>>(
    ctx: &mut C,
    region: Region,
) -> Result<(), HostError> {
    let (previous, input) = {
        let mut store = ctx.as_context_mut();
        let state = store.data_mut();
        (state.output.replace(region), state.input)
    };
    if let Some(prev) = previous {
        let shared = prev.offset == region.offset || input.map(|r| r.offset) == Some(prev.offset);
        if !shared && locate(&*ctx, prev.offset).is_ok() {
            free(ctx, prev.offset)?;
        }
    }
    Ok(())
}

/// Free the input and output regions of the finished call.
pub fn release_call_regions<C: AsContextMut<Data = KernelState>>(
    ctx: &mut C,
) -> Result<(), HostError> {
    let (input, output) = {
        let mut store = ctx.as_context_mut();
        let state = store.data_mut();
        (state.input.take(), state.output.take())
    };
    let mut offsets: Vec<u64> = input.into_iter().chain(output).map(|r| r.offset).collect();
    offsets.dedup();
    for offset in offsets {
        if locate(&*ctx, offset).is_ok() {
            free(ctx, offset)?;
        }
    }
    Ok(())
}

/// Run host function `index` through `path`.
///
/// The callback gets kernel memory through the same context, so it can read
/// argument regions and allocate its result.
pub fn invoke<C: AsContextMut<Data = KernelState>>(
    ctx: &mut C,
    index: u32,
    path: DispatchPath,
    args: &[Value],
) -> Result<Option<Value>, HostError> {
    let callback = ctx.as_context().data().functions.resolve(index, path)?;
    let mut memory = ContextMemory(&mut *ctx);
    trace!(index, ?path, args = args.len(), "kernel invoke");
    match path {
        DispatchPath::WithResult => call_with_result(&callback, &mut memory, args).map(Some),
        DispatchPath::NoResult => call_no_result(&callback, &mut memory, args).map(|()| None),
    }
}

/// Place a host function result in kernel memory.
///
/// A handle result must name a live region and is returned as is; every
/// other kind is copied into a fresh region (numbers little-endian).
pub fn value_region<C: AsContextMut<Data = KernelState>>(
    ctx: &mut C,
    value: Value,
) -> Result<Region, HostError> {
    match value {
        Value::Handle(region) => locate(&*ctx, region.offset),
        Value::Bytes(bytes) => alloc(ctx, &bytes),
        Value::Text(text) => alloc(ctx, text.as_bytes()),
        Value::U32(v) => alloc(ctx, &v.to_le_bytes()),
        Value::U64(v) => alloc(ctx, &v.to_le_bytes()),
        Value::F32(v) => alloc(ctx, &v.to_le_bytes()),
        Value::F64(v) => alloc(ctx, &v.to_le_bytes()),
    }
}

/// `HostMemory` over a borrowed store context.
pub struct ContextMemory<'a, C>(pub &'a mut C);

impl<C: AsContextMut<Data = KernelState>> HostMemory for ContextMemory<'_, C> {
    fn allocate(&mut self, bytes: &[u8]) -> Result<Region, HostError> {
        alloc(&mut *self.0, bytes)
    }

    fn locate(&self, offset: u64) -> Result<Region, HostError> {
        locate(&*self.0, offset)
    }

    fn free(&mut self, offset: u64) -> Result<(), HostError> {
        free(&mut *self.0, offset)
    }

    fn read_region(&self, offset: u64) -> Result<Vec<u8>, HostError> {
        read(&*self.0, offset)
    }
}
