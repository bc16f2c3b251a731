//! Guest module validation: import resolution and memory export checks.
//!
//! Runs once when the artifact is compiled, so a guest that could never be
//! instantiated is rejected with a precise load error instead of a generic
//! linker failure. Checks:
//!
//! 1. The configured memory export is present
//! 2. Every import is either WASI preview1 or a registered host function
//! 3. Host function imports have the capability's signature
//!
//! Function exports are resolved per session, when the bridge becomes Ready.

use wasmtime::{ExternType, Module};

use guestfetch_hostapi::{GuestAbi, WASI_MODULE};

use crate::error::SandboxError;
use crate::linker::HostFunctionRegistry;

/// Validate that a guest can be linked against `registry`.
pub fn validate_module(
    module: &Module,
    registry: &HostFunctionRegistry,
    abi: &GuestAbi,
) -> Result<(), SandboxError> {
    validate_memory(module, abi)?;
    validate_imports(module, registry)?;
    Ok(())
}

fn validate_memory(module: &Module, abi: &GuestAbi) -> Result<(), SandboxError> {
    let has_memory = module
        .exports()
        .any(|e| e.name() == abi.memory && matches!(e.ty(), ExternType::Memory(_)));
    if !has_memory {
        return Err(SandboxError::Load(format!(
            "module must export memory '{}'",
            abi.memory
        )));
    }
    Ok(())
}

fn validate_imports(module: &Module, registry: &HostFunctionRegistry) -> Result<(), SandboxError> {
    for import in module.imports() {
        let module_name = import.module();

        // WASI imports are resolved by the compatibility layer at link time.
        if module_name == WASI_MODULE {
            continue;
        }

        let binding = registry.lookup(module_name, import.name()).ok_or_else(|| {
            SandboxError::Load(format!(
                "unresolved import {}::{}",
                module_name,
                import.name()
            ))
        })?;

        let func_ty = match import.ty() {
            ExternType::Func(ft) => ft,
            _ => {
                return Err(SandboxError::Load(format!(
                    "import {}::{} must be a function",
                    module_name,
                    import.name()
                )));
            }
        };

        if !binding.capability.accepts(&func_ty) {
            let (params, results) = binding.capability.signature();
            return Err(SandboxError::Load(format!(
                "import {}::{} has wrong signature: expected {} i32 params and {} results",
                module_name,
                import.name(),
                params,
                results
            )));
        }
    }

    Ok(())
}
