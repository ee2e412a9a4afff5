//! WASM module validation: kernel ABI checks.
//!
//! Checks a compiled plugin module before it is instantiated:
//!
//! 1. No WASI imports
//! 2. All imports are functions from the `tether_env` module
//! 3. Every imported name is a registered kernel function
//!
//! Export signatures are checked per call by [`validate_export`].

use wasmtime::{ExternType, Module, ValType};

use crate::error::SandboxError;
use crate::linker::{KERNEL_FUNCTIONS, KERNEL_MODULE};

/// Validate a plugin module's imports.
pub fn validate_module(module: &Module) -> Result<(), SandboxError> {
    validate_imports(module)
}

/// Check that `name` is exported as a `() -> i32` function.
pub fn validate_export(module: &Module, name: &str) -> Result<(), SandboxError> {
    let export = module
        .exports()
        .find(|e| e.name() == name)
        .ok_or_else(|| SandboxError::ValidationError(format!("missing export: {}", name)))?;

    let func_ty = match export.ty() {
        ExternType::Func(ft) => ft,
        _ => {
            return Err(SandboxError::ValidationError(format!(
                "export '{}' must be a function",
                name
            )));
        }
    };

    let params = func_ty.params().len();
    let results: Vec<ValType> = func_ty.results().collect();
    if params != 0 || results.len() != 1 || !matches!(results[0], ValType::I32) {
        return Err(SandboxError::ValidationError(format!(
            "export '{}' must have signature () -> i32",
            name
        )));
    }

    Ok(())
}

/// Check that all imports are kernel functions and none are WASI.
fn validate_imports(module: &Module) -> Result<(), SandboxError> {
    for import in module.imports() {
        let module_name = import.module();

        if module_name.starts_with("wasi") {
            return Err(SandboxError::ValidationError(format!(
                "WASI import not allowed: {}::{}",
                module_name,
                import.name()
            )));
        }

        if module_name != KERNEL_MODULE {
            return Err(SandboxError::ValidationError(format!(
                "import from unknown module '{}' (only '{}' allowed): {}",
                module_name,
                KERNEL_MODULE,
                import.name()
            )));
        }

        if !matches!(import.ty(), ExternType::Func(_)) {
            return Err(SandboxError::ValidationError(format!(
                "non-function import not allowed: {}::{}",
                module_name,
                import.name()
            )));
        }

        if !KERNEL_FUNCTIONS.contains(&import.name()) {
            return Err(SandboxError::ValidationError(format!(
                "unknown kernel function: {}::{}",
                module_name,
                import.name()
            )));
        }
    }

    Ok(())
}
