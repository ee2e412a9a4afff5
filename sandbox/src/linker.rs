//! Kernel function registration via Wasmtime linker.
//!
//! Registers the `tether_env` imports WASM guests use to reach kernel
//! memory and the host function table. Offsets and lengths cross the
//! boundary as `i64`. A negative or out-of-bounds offset traps the guest;
//! allocation failure returns 0.
//!
//! `invoke(index, arg)` and `invoke0(index, arg)` call host function
//! `index` on the result and zero-result paths. `arg` is the offset of a
//! live region passed as the single handle argument, or 0 for no
//! arguments. `invoke` returns the offset of the result region; a host
//! failure traps.

use tracing::trace;
use wasmtime::{Caller, Linker};

use tether_hostapi::{DispatchPath, HostError, Region, Value};

use crate::error::SandboxError;
use crate::host_impl::{self, KernelState};
use crate::memory;

/// Import module name for kernel functions.
pub const KERNEL_MODULE: &str = "tether_env";

/// Every function registered under [`KERNEL_MODULE`].
pub const KERNEL_FUNCTIONS: &[&str] = &[
    "alloc",
    "free",
    "length",
    "load_u8",
    "store_u8",
    "load_u64",
    "store_u64",
    "input_offset",
    "input_length",
    "output_set",
    "invoke",
    "invoke0",
];

/// Register all `tether_env` functions with the linker.
pub fn register_kernel_functions(linker: &mut Linker<KernelState>) -> Result<(), SandboxError> {
    register_alloc(linker)?;
    register_free(linker)?;
    register_length(linker)?;
    register_load_store_u8(linker)?;
    register_load_store_u64(linker)?;
    register_input(linker)?;
    register_output_set(linker)?;
    register_invoke(linker)?;
    Ok(())
}

fn offset_arg(value: i64) -> Result<u64, HostError> {
    u64::try_from(value).map_err(|_| HostError::bad_offset())
}

fn len_arg(value: i64) -> Result<u64, HostError> {
    u64::try_from(value).map_err(|_| HostError::invalid_argument())
}

fn index_arg(value: i32) -> Result<u32, HostError> {
    u32::try_from(value).map_err(|_| HostError::unknown_function())
}

/// Host function arguments for a guest `arg` offset: none for 0, otherwise
/// the live region starting there.
fn handle_args(caller: &Caller<'_, KernelState>, arg: i64) -> Result<Vec<Value>, HostError> {
    match offset_arg(arg)? {
        0 => Ok(Vec::new()),
        offset => Ok(vec![Value::Handle(host_impl::locate(caller, offset)?)]),
    }
}

/// Check that `[offset, offset+len)` lies inside kernel memory.
fn checked_span(caller: &Caller<'_, KernelState>, offset: u64, len: u64) -> Result<(), HostError> {
    let mem = host_impl::kernel_memory(caller)?;
    memory::validate_range(mem.data_size(caller), offset, len)
}

// ── Regions ──

fn register_alloc(linker: &mut Linker<KernelState>) -> Result<(), SandboxError> {
    linker.func_wrap(
        KERNEL_MODULE,
        "alloc",
        |mut caller: Caller<'_, KernelState>, len: i64| -> wasmtime::Result<i64> {
            let len = len_arg(len)?;
            if len > caller.data().config.max_region_len {
                return Ok(0);
            }
            let zeroed = vec![0u8; len as usize];
            match host_impl::alloc(&mut caller, &zeroed) {
                Ok(region) => Ok(region.offset as i64),
                Err(e) => {
                    trace!(len, error = %e, "guest alloc failed");
                    Ok(0)
                }
            }
        },
    )?;
    Ok(())
}

fn register_free(linker: &mut Linker<KernelState>) -> Result<(), SandboxError> {
    linker.func_wrap(
        KERNEL_MODULE,
        "free",
        |mut caller: Caller<'_, KernelState>, offset: i64| -> wasmtime::Result<()> {
            let offset = offset_arg(offset)?;
            host_impl::free(&mut caller, offset)?;
            Ok(())
        },
    )?;
    Ok(())
}

fn register_length(linker: &mut Linker<KernelState>) -> Result<(), SandboxError> {
    linker.func_wrap(
        KERNEL_MODULE,
        "length",
        |caller: Caller<'_, KernelState>, offset: i64| -> wasmtime::Result<i64> {
            let offset = offset_arg(offset)?;
            Ok(host_impl::locate(&caller, offset).map_or(0, |r| r.len as i64))
        },
    )?;
    Ok(())
}

// ── Loads and stores ──

fn register_load_store_u8(linker: &mut Linker<KernelState>) -> Result<(), SandboxError> {
    linker.func_wrap(
        KERNEL_MODULE,
        "load_u8",
        |caller: Caller<'_, KernelState>, offset: i64| -> wasmtime::Result<i32> {
            let offset = offset_arg(offset)?;
            let bytes = host_impl::read_span(&caller, Region::new(offset, 1))?;
            Ok(i32::from(bytes[0]))
        },
    )?;

    linker.func_wrap(
        KERNEL_MODULE,
        "store_u8",
        |mut caller: Caller<'_, KernelState>, offset: i64, byte: i32| -> wasmtime::Result<()> {
            let offset = offset_arg(offset)?;
            checked_span(&caller, offset, 1)?;
            let mem = host_impl::kernel_memory(&caller)?;
            memory::write_bytes(mem.data_mut(&mut caller), offset, &[byte as u8])?;
            Ok(())
        },
    )?;
    Ok(())
}

fn register_load_store_u64(linker: &mut Linker<KernelState>) -> Result<(), SandboxError> {
    linker.func_wrap(
        KERNEL_MODULE,
        "load_u64",
        |caller: Caller<'_, KernelState>, offset: i64| -> wasmtime::Result<i64> {
            let offset = offset_arg(offset)?;
            checked_span(&caller, offset, 8)?;
            let mem = host_impl::kernel_memory(&caller)?;
            let value = memory::read_u64(mem.data(&caller), offset)?;
            Ok(value as i64)
        },
    )?;

    linker.func_wrap(
        KERNEL_MODULE,
        "store_u64",
        |mut caller: Caller<'_, KernelState>, offset: i64, value: i64| -> wasmtime::Result<()> {
            let offset = offset_arg(offset)?;
            checked_span(&caller, offset, 8)?;
            let mem = host_impl::kernel_memory(&caller)?;
            memory::write_u64(mem.data_mut(&mut caller), offset, value as u64)?;
            Ok(())
        },
    )?;
    Ok(())
}

// ── Call input and output ──

fn register_input(linker: &mut Linker<KernelState>) -> Result<(), SandboxError> {
    linker.func_wrap(
        KERNEL_MODULE,
        "input_offset",
        |caller: Caller<'_, KernelState>| -> i64 {
            caller.data().input.map_or(0, |r| r.offset as i64)
        },
    )?;

    linker.func_wrap(
        KERNEL_MODULE,
        "input_length",
        |caller: Caller<'_, KernelState>| -> i64 {
            caller.data().input.map_or(0, |r| r.len as i64)
        },
    )?;
    Ok(())
}

fn register_output_set(linker: &mut Linker<KernelState>) -> Result<(), SandboxError> {
    linker.func_wrap(
        KERNEL_MODULE,
        "output_set",
        |mut caller: Caller<'_, KernelState>, offset: i64, len: i64| -> wasmtime::Result<()> {
            let offset = offset_arg(offset)?;
            let len = len_arg(len)?;
            let region = host_impl::locate(&caller, offset)?;
            if len > region.len {
                return Err(HostError::invalid_argument().into());
            }
            host_impl::set_output(&mut caller, Region::new(offset, len))?;
            trace!(offset, len, "guest output set");
            Ok(())
        },
    )?;
    Ok(())
}

// ── Host functions ──

fn register_invoke(linker: &mut Linker<KernelState>) -> Result<(), SandboxError> {
    linker.func_wrap(
        KERNEL_MODULE,
        "invoke",
        |mut caller: Caller<'_, KernelState>, index: i32, arg: i64| -> wasmtime::Result<i64> {
            let index = index_arg(index)?;
            let args = handle_args(&caller, arg)?;
            let value = host_impl::invoke(&mut caller, index, DispatchPath::WithResult, &args)?
                .ok_or_else(HostError::arity_mismatch)?;
            let region = host_impl::value_region(&mut caller, value)?;
            trace!(index, offset = region.offset, len = region.len, "guest invoke");
            Ok(region.offset as i64)
        },
    )?;

    linker.func_wrap(
        KERNEL_MODULE,
        "invoke0",
        |mut caller: Caller<'_, KernelState>, index: i32, arg: i64| -> wasmtime::Result<()> {
            let index = index_arg(index)?;
            let args = handle_args(&caller, arg)?;
            host_impl::invoke(&mut caller, index, DispatchPath::NoResult, &args)?;
            trace!(index, "guest invoke0");
            Ok(())
        },
    )?;
    Ok(())
}
