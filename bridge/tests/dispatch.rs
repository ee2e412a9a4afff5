//! Host Call Bridge dispatch tests.

mod common;

use std::sync::{Arc, Mutex};

use tether_bridge::{Arg, BridgeError, GuestContext, Value};
use tether_hostapi::{DispatchPath, ErrorCode, FunctionTable, HostError, MemHost};

use common::*;

#[test]
fn test_bind_all_assigns_positional_indices() {
    let sink = Arc::new(Mutex::new(Vec::new()));
    let mut ctx = recording_context(sink);
    let functions = ctx.host().bind_all();

    assert_eq!(functions.len(), 2);
    assert_eq!(functions["add"].index(), 0);
    assert_eq!(functions["add"].results(), 1);
    assert_eq!(functions["log"].index(), 1);
    assert_eq!(functions["log"].results(), 0);
}

#[test]
fn test_dispatch_paths_follow_arity() {
    let sink = Arc::new(Mutex::new(Vec::new()));
    let mut ctx = recording_context(sink.clone());
    let functions = ctx.host().bind_all();

    let sum = functions["add"]
        .call(&mut ctx.host(), &[Arg::from(2u64), Arg::from(40u64)])
        .unwrap();
    assert_eq!(sum, Some(Value::U64(42)));

    let out = functions["log"].call(&mut ctx.host(), &[Arg::from("hello")]).unwrap();
    assert_eq!(out, None);

    let dispatches = &ctx.host_runtime().dispatches;
    assert_eq!(dispatches.len(), 2);
    assert_eq!(dispatches[0].path, DispatchPath::WithResult);
    assert_eq!(dispatches[0].index, 0);
    assert_eq!(dispatches[1].path, DispatchPath::NoResult);
    assert_eq!(dispatches[1].index, 1);
    assert_eq!(*sink.lock().unwrap(), vec!["hello".to_string()]);
}

#[test]
fn test_arguments_pass_through_unchanged() {
    let sink = Arc::new(Mutex::new(Vec::new()));
    let mut ctx = recording_context(sink.clone());
    let handle = ctx.memory().allocate_string("from memory").unwrap();

    ctx.host()
        .call("log", &[Arg::from(handle), Arg::Bytes(vec![1, 2]), Arg::from(0.5f32)])
        .unwrap();

    let recorded = &ctx.host_runtime().dispatches[0].args;
    assert_eq!(
        recorded,
        &vec![
            Value::Handle(handle.region()),
            Value::Bytes(vec![1, 2]),
            Value::F32(0.5)
        ]
    );
    assert_eq!(sink.lock().unwrap()[0], "from memory");
}

#[test]
fn test_enumerated_once_per_context() {
    let sink = Arc::new(Mutex::new(Vec::new()));
    let mut ctx = recording_context(sink);
    let queries = ctx.host_runtime().list_queries.clone();

    ctx.host().bind_all();
    ctx.host().bind_all();
    ctx.host().call("log", &[]).unwrap();
    ctx.host().enumerate_host_functions();

    assert_eq!(*queries.lock().unwrap(), 1);
}

#[test]
fn test_host_failure_carries_function_name() {
    let table = FunctionTable::new().with("explode", 1, |_, _| Err(HostError::callback_failed()));
    let mut ctx = GuestContext::new(MemHost::new().with_functions(table));

    match ctx.host().call("explode", &[]) {
        Err(BridgeError::HostInvocation { name, source }) => {
            assert_eq!(name, "explode");
            assert_eq!(source.code(), ErrorCode::CallbackFailed);
        }
        other => panic!("expected HostInvocation, got {other:?}"),
    }
}

#[test]
fn test_invalid_arguments_surface_as_invocation_error() {
    let sink = Arc::new(Mutex::new(Vec::new()));
    let mut ctx = recording_context(sink);
    let err = ctx.host().call("add", &[Arg::from("not a number")]).unwrap_err();
    match err {
        BridgeError::HostInvocation { name, source } => {
            assert_eq!(name, "add");
            assert_eq!(source.code(), ErrorCode::InvalidArgument);
        }
        other => panic!("expected HostInvocation, got {other:?}"),
    }
}

#[test]
fn test_released_handle_not_forwarded() {
    let sink = Arc::new(Mutex::new(Vec::new()));
    let mut ctx = recording_context(sink);
    let handle = ctx.memory().allocate_string("bye").unwrap();
    ctx.memory().release(handle).unwrap();

    assert!(matches!(
        ctx.host().call("log", &[Arg::from(handle)]),
        Err(BridgeError::UseAfterFree { .. })
    ));
    assert!(ctx.host_runtime().dispatches.is_empty());
}

#[test]
fn test_result_handle_can_be_located_and_read() {
    let table = FunctionTable::new().with("greet", 1, |mem, args| {
        let name = args.first().and_then(Value::as_str).unwrap_or("world");
        let region = mem.allocate(format!("hello, {name}").as_bytes())?;
        Ok(Some(Value::U64(region.offset)))
    });
    let mut ctx = GuestContext::new(MemHost::new().with_functions(table));

    let offset = ctx
        .host()
        .call("greet", &[Arg::from("tether")])
        .unwrap()
        .and_then(|v| v.as_u64())
        .unwrap();
    let handle = ctx.memory().locate(offset).unwrap();
    assert_eq!(ctx.memory().read_string(handle).unwrap(), "hello, tether");
    ctx.memory().release(handle).unwrap();
    assert_eq!(ctx.host_runtime().live_regions(), 0);
}

#[test]
fn test_call_io_pass_through() {
    let mut host = MemHost::new();
    host.set_input("request body");
    let mut ctx = GuestContext::new(host);

    assert_eq!(ctx.host().input_string().unwrap(), "request body");
    assert_eq!(ctx.host().input_bytes().unwrap(), b"request body".to_vec());
    ctx.host().output_string("response").unwrap();
    assert_eq!(ctx.host_runtime().output(), b"response");
    ctx.host().output_bytes(&[0, 1]).unwrap();
    assert_eq!(ctx.host_runtime().output(), &[0, 1]);
}

#[test]
fn test_input_string_invalid_utf8() {
    let mut host = MemHost::new();
    host.set_input(vec![0xC3]);
    let mut ctx = GuestContext::new(host);
    assert!(matches!(
        ctx.host().input_string(),
        Err(BridgeError::HostInvocation { .. })
    ));
}
