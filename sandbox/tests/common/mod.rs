//! Shared test helpers for sandbox integration tests.
//!
//! Provides inline WAT plugins, a standard host function table, and
//! factory functions for plugins and kernel-backed guest contexts.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use tether_bridge::GuestContext;
use tether_hostapi::{DispatchPath, FunctionTable, HostError, Value};
use tether_sandbox::{Plugin, SandboxConfig, WasmHost};

// ── Plugins ──

/// `echo`: sets the input region as the output.
pub const ECHO_WAT: &str = r#"
(module
    (import "tether_env" "input_offset" (func $in_off (result i64)))
    (import "tether_env" "input_length" (func $in_len (result i64)))
    (import "tether_env" "output_set" (func $out (param i64 i64)))
    (func (export "echo") (result i32)
        (call $out (call $in_off) (call $in_len))
        i32.const 0)
)
"#;

/// `upper`: copies the input into a fresh region, ASCII-uppercased.
/// Returns 1 if the kernel refuses the allocation.
pub const UPPER_WAT: &str = r#"
(module
    (import "tether_env" "alloc" (func $alloc (param i64) (result i64)))
    (import "tether_env" "load_u8" (func $load (param i64) (result i32)))
    (import "tether_env" "store_u8" (func $store (param i64 i32)))
    (import "tether_env" "input_offset" (func $in_off (result i64)))
    (import "tether_env" "input_length" (func $in_len (result i64)))
    (import "tether_env" "output_set" (func $out (param i64 i64)))
    (func (export "upper") (result i32)
        (local $src i64) (local $len i64) (local $dst i64) (local $i i64) (local $b i32)
        (local.set $src (call $in_off))
        (local.set $len (call $in_len))
        (local.set $dst (call $alloc (local.get $len)))
        (if (i64.eqz (local.get $dst)) (then (return (i32.const 1))))
        (block $done
            (loop $next
                (br_if $done (i64.ge_u (local.get $i) (local.get $len)))
                (local.set $b (call $load (i64.add (local.get $src) (local.get $i))))
                (if (i32.and
                        (i32.ge_u (local.get $b) (i32.const 97))
                        (i32.le_u (local.get $b) (i32.const 122)))
                    (then (local.set $b (i32.sub (local.get $b) (i32.const 32)))))
                (call $store (i64.add (local.get $dst) (local.get $i)) (local.get $b))
                (local.set $i (i64.add (local.get $i) (i64.const 1)))
                (br $next)))
        (call $out (local.get $dst) (local.get $len))
        i32.const 0)
)
"#;

/// `inc`: reads a little-endian u64 from the input and outputs it plus one.
pub const INC_WAT: &str = r#"
(module
    (import "tether_env" "alloc" (func $alloc (param i64) (result i64)))
    (import "tether_env" "load_u64" (func $load64 (param i64) (result i64)))
    (import "tether_env" "store_u64" (func $store64 (param i64 i64)))
    (import "tether_env" "input_offset" (func $in_off (result i64)))
    (import "tether_env" "output_set" (func $out (param i64 i64)))
    (func (export "inc") (result i32)
        (local $dst i64)
        (local.set $dst (call $alloc (i64.const 8)))
        (call $store64
            (local.get $dst)
            (i64.add (call $load64 (call $in_off)) (i64.const 1)))
        (call $out (local.get $dst) (i64.const 8))
        i32.const 0)
)
"#;

/// Exports that misbehave in different ways.
pub const FAULTY_WAT: &str = r#"
(module
    (import "tether_env" "alloc" (func $alloc (param i64) (result i64)))
    (import "tether_env" "free" (func $free (param i64)))
    (import "tether_env" "length" (func $length (param i64) (result i64)))
    (import "tether_env" "load_u8" (func $load (param i64) (result i32)))
    (import "tether_env" "output_set" (func $out (param i64 i64)))

    (func (export "status_seven") (result i32)
        i32.const 7)

    (func (export "unreachable") (result i32)
        unreachable)

    (func (export "spin") (result i32)
        (loop $forever (br $forever))
        i32.const 0)

    (func (export "bad_free") (result i32)
        (call $free (i64.const 12345))
        i32.const 0)

    (func (export "far_load") (result i32)
        (drop (call $load (i64.const 1099511627776)))
        i32.const 0)

    (func (export "oversized_output") (result i32)
        (local $r i64)
        (local.set $r (call $alloc (i64.const 4)))
        (call $out (local.get $r) (i64.const 5))
        i32.const 0)

    (func (export "huge_alloc") (result i32)
        (if (i64.eqz (call $alloc (i64.const 1073741824)))
            (then (return (i32.const 1))))
        i32.const 0)

    ;; 0 if length tracks alloc and free, otherwise the failing step.
    (func (export "length_lifecycle") (result i32)
        (local $r i64)
        (local.set $r (call $alloc (i64.const 5)))
        (if (i64.ne (call $length (local.get $r)) (i64.const 5))
            (then (return (i32.const 2))))
        (call $free (local.get $r))
        (if (i64.ne (call $length (local.get $r)) (i64.const 0))
            (then (return (i32.const 3))))
        i32.const 0)
)
"#;

/// Calls host functions by dispatch index with the input region as argument.
pub const HOST_CALL_WAT: &str = r#"
(module
    (import "tether_env" "invoke" (func $invoke (param i32 i64) (result i64)))
    (import "tether_env" "invoke0" (func $invoke0 (param i32 i64)))
    (import "tether_env" "length" (func $length (param i64) (result i64)))
    (import "tether_env" "input_offset" (func $in_off (result i64)))
    (import "tether_env" "output_set" (func $out (param i64 i64)))

    ;; Output whatever function 1 returns for the input.
    (func (export "call_one") (result i32)
        (local $r i64)
        (local.set $r (call $invoke (i32.const 1) (call $in_off)))
        (call $out (local.get $r) (call $length (local.get $r)))
        i32.const 0)

    ;; Hand the input to function 0 on the zero-result path.
    (func (export "notify_zero") (result i32)
        (call $invoke0 (i32.const 0) (call $in_off))
        i32.const 0)

    ;; Function 1 returns a value, so the zero-result path is refused.
    (func (export "wrong_path") (result i32)
        (call $invoke0 (i32.const 1) (call $in_off))
        i32.const 0)

    (func (export "unknown_index") (result i32)
        (drop (call $invoke (i32.const 99) (i64.const 0)))
        i32.const 0)

    (func (export "bad_argument") (result i32)
        (drop (call $invoke (i32.const 1) (i64.const 12345)))
        i32.const 0)
)
"#;

pub fn load_plugin(wat: &str) -> Plugin {
    load_plugin_with(wat, SandboxConfig::default(), FunctionTable::new())
}

pub fn load_plugin_with(wat: &str, config: SandboxConfig, functions: FunctionTable) -> Plugin {
    Plugin::new(wat.as_bytes(), config, functions).unwrap()
}

// ── Host functions ──

/// `[("add", 1), ("shout", 1)]`.
///
/// `shout` takes a handle, uppercases the region's text and returns a
/// handle to a new region holding the result.
pub fn add_and_shout() -> FunctionTable {
    FunctionTable::new()
        .with("add", 1, |_, args| {
            let a = args.first().and_then(Value::as_u64).ok_or_else(HostError::invalid_argument)?;
            let b = args.get(1).and_then(Value::as_u64).ok_or_else(HostError::invalid_argument)?;
            Ok(Some(Value::U64(a + b)))
        })
        .with("shout", 1, |mem, args| {
            let region = args
                .first()
                .and_then(Value::as_handle)
                .ok_or_else(HostError::invalid_argument)?;
            let text = String::from_utf8(mem.read_region(region.offset)?)
                .map_err(|_| HostError::invalid_encoding())?;
            let loud = mem.allocate(text.to_uppercase().as_bytes())?;
            Ok(Some(Value::Handle(loud)))
        })
}

/// `[("record", 0), ("shout", 1)]`. `record` appends the argument
/// region's text to `log`.
pub fn record_and_shout(log: Arc<Mutex<Vec<String>>>) -> FunctionTable {
    let shout = add_and_shout();
    FunctionTable::new()
        .with("record", 0, move |mem, args| {
            let region = args
                .first()
                .and_then(Value::as_handle)
                .ok_or_else(HostError::invalid_argument)?;
            let text = String::from_utf8(mem.read_region(region.offset)?)
                .map_err(|_| HostError::invalid_encoding())?;
            log.lock().unwrap().push(text);
            Ok(None)
        })
        .with("shout", 1, move |mem, args| {
            let callback = shout.resolve(1, DispatchPath::WithResult)?;
            callback(mem, args)
        })
}

/// Guest context over a fresh kernel with `add` and `shout`.
pub fn kernel_context() -> GuestContext<WasmHost> {
    kernel_context_with(SandboxConfig::default())
}

pub fn kernel_context_with(config: SandboxConfig) -> GuestContext<WasmHost> {
    GuestContext::new(WasmHost::new(&config, add_and_shout()).unwrap())
}
