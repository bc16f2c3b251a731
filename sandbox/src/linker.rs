//! Host function registration via Wasmtime linker.
//!
//! The guest resolves its imports by `(module, name)` at instantiation time.
//! `HostFunctionRegistry` records which capability answers each import and
//! links them into a `Linker` before the module is instantiated. The WASI
//! preview1 compatibility layer is linked separately by
//! [`link_compat_layer`].
//!
//! Each host function:
//! 1. Extracts memory and `HostState` from the Caller
//! 2. Validates pointer/length arguments against linear memory
//! 3. Performs the operation
//! 4. On failure records the fault in `HostState` and traps the guest

use wasmtime::{Caller, FuncType, Linker, Memory, ValType};
use wasmtime_wasi::preview1;

use guestfetch_hostapi::{HostError, HOST_LOG, HOST_MODULE};

use crate::error::SandboxError;
use crate::host_impl::HostState;
use crate::memory;

/// The fixed set of capabilities the host can publish to a guest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostCapability {
    /// `(ptr: i32, len: i32)`: forward guest bytes to the session's `LogSink`.
    Log,
}

impl HostCapability {
    /// Signature as `(i32 param count, result count)`. Every parameter is i32.
    pub fn signature(&self) -> (usize, usize) {
        match self {
            Self::Log => (2, 0),
        }
    }

    /// True if `ty` is the wasm signature this capability is linked with.
    pub fn accepts(&self, ty: &FuncType) -> bool {
        let (params, results) = self.signature();
        ty.params().len() == params
            && ty.params().all(|p| matches!(p, ValType::I32))
            && ty.results().len() == results
    }
}

/// A host function published to the guest under `module::name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostFunctionBinding {
    pub module: String,
    pub name: String,
    pub capability: HostCapability,
}

/// Host functions available to guests, keyed by `(module, name)`.
#[derive(Debug, Clone, Default)]
pub struct HostFunctionRegistry {
    bindings: Vec<HostFunctionBinding>,
}

impl HostFunctionRegistry {
    /// An empty registry. Guests importing anything outside WASI will fail to load.
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard registry: `env.log`.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.bindings.push(HostFunctionBinding {
            module: HOST_MODULE.into(),
            name: HOST_LOG.into(),
            capability: HostCapability::Log,
        });
        registry
    }

    /// Publish `capability` under `module::name`.
    pub fn register(
        &mut self,
        module: &str,
        name: &str,
        capability: HostCapability,
    ) -> Result<(), SandboxError> {
        if self.lookup(module, name).is_some() {
            return Err(SandboxError::DuplicateBinding {
                module: module.into(),
                name: name.into(),
            });
        }
        self.bindings.push(HostFunctionBinding {
            module: module.into(),
            name: name.into(),
            capability,
        });
        Ok(())
    }

    pub fn lookup(&self, module: &str, name: &str) -> Option<&HostFunctionBinding> {
        self.bindings
            .iter()
            .find(|b| b.module == module && b.name == name)
    }

    pub fn bindings(&self) -> &[HostFunctionBinding] {
        &self.bindings
    }

    /// Define every registered binding in `linker`.
    pub fn link(&self, linker: &mut Linker<HostState>) -> Result<(), SandboxError> {
        for binding in &self.bindings {
            match binding.capability {
                HostCapability::Log => link_log(linker, &binding.module, &binding.name)?,
            }
        }
        Ok(())
    }
}

/// Link the WASI preview1 imports the guest toolchain relies on for
/// abort and exit handling.
pub fn link_compat_layer(linker: &mut Linker<HostState>) -> Result<(), SandboxError> {
    preview1::add_to_linker_sync(linker, |state: &mut HostState| &mut state.wasi)
        .map_err(|e| SandboxError::Load(format!("linking WASI preview1: {e:#}")))
}

/// Get the guest's exported memory from a Caller.
fn get_memory(caller: &mut Caller<'_, HostState>) -> Option<Memory> {
    let name = caller.data().memory_export().to_owned();
    caller.get_export(&name).and_then(|e| e.into_memory())
}

/// Record `err` as the reason for trapping and turn it into a trap.
fn fault(caller: &mut Caller<'_, HostState>, err: HostError) -> anyhow::Error {
    let trap = anyhow::anyhow!("{}", err);
    caller.data_mut().record_fault(err);
    trap
}

fn link_log(linker: &mut Linker<HostState>, module: &str, name: &str) -> Result<(), SandboxError> {
    linker
        .func_wrap(
            module,
            name,
            |mut caller: Caller<'_, HostState>, ptr: u32, len: u32| -> anyhow::Result<()> {
                let mem = match get_memory(&mut caller) {
                    Some(m) => m,
                    None => return Err(fault(&mut caller, HostError::MissingMemory)),
                };

                let read = memory::read_bytes(mem.data(&caller), ptr, len);
                let message = match read {
                    Ok(b) => b,
                    Err(e) => {
                        tracing::warn!(ptr, len, "guest log outside linear memory");
                        return Err(fault(&mut caller, e.into()));
                    }
                };

                tracing::debug!(
                    target: "guest",
                    line = %String::from_utf8_lossy(&message),
                    "guest log"
                );

                if let Err(e) = caller.data_mut().log(&message) {
                    return Err(fault(&mut caller, e));
                }
                Ok(())
            },
        )
        .map_err(|e| SandboxError::Load(format!("linking {module}::{name}: {e:#}")))?;
    Ok(())
}
