//! Sandbox runtime: Wasmtime engine, guest loading, and invocation.
//!
//! [`Bridge`] compiles the guest artifact once and can be shared. Each call to
//! [`Bridge::session`] builds a fresh store, links host functions, instantiates
//! the guest and runs its startup export, yielding a [`Session`] that owns the
//! guest for exactly one invocation.
//!
//! Session lifecycle:
//!
//! ```text
//! Uninitialized -> Loaded -> Ready -> Invoking -> Completed | Failed -> Closed
//! ```

use std::path::Path;

use wasmtime::{Config, Engine, Instance, Linker, Module, Store, Trap, TypedFunc, WasmParams, WasmResults};
use wasmtime_wasi::I32Exit;

use guestfetch_hostapi::{AllocationHandle, GuestAbi, LogSink, PackedResult, StdoutSink};

use crate::artifact::BUILD_URL_WAT;
use crate::config::SandboxConfig;
use crate::error::SandboxError;
use crate::host_impl::HostState;
use crate::linker::{link_compat_layer, HostFunctionRegistry};
use crate::marshal::Marshaler;
use crate::memory::GuestMemory;
use crate::validation::validate_module;

/// Fuel granted for releasing allocations after the guest ran out.
const CLEANUP_FUEL: u64 = 1_000_000;

/// A compiled guest artifact plus the host functions it links against.
///
/// Immutable after construction; every invocation gets its own [`Session`].
pub struct Bridge {
    engine: Engine,
    module: Module,
    config: SandboxConfig,
    registry: HostFunctionRegistry,
}

impl Bridge {
    /// Compile a guest from wasm bytes (or WAT text) with the default host functions.
    pub fn new(wasm: &[u8], config: SandboxConfig) -> Result<Self, SandboxError> {
        Self::with_registry(wasm, config, HostFunctionRegistry::with_defaults())
    }

    /// Compile a guest that links against `registry`.
    pub fn with_registry(
        wasm: &[u8],
        config: SandboxConfig,
        registry: HostFunctionRegistry,
    ) -> Result<Self, SandboxError> {
        let engine = create_engine()?;
        let module = Module::new(&engine, wasm).map_err(SandboxError::Compile)?;
        Self::from_module(engine, module, config, registry)
    }

    /// Load from a `.wasm` or `.wat` file path.
    pub fn from_file(path: &Path, config: SandboxConfig) -> Result<Self, SandboxError> {
        let engine = create_engine()?;
        let module = Module::from_file(&engine, path).map_err(SandboxError::Compile)?;
        Self::from_module(engine, module, config, HostFunctionRegistry::with_defaults())
    }

    /// The URL-building guest shipped with this crate.
    pub fn embedded(config: SandboxConfig) -> Result<Self, SandboxError> {
        Self::new(BUILD_URL_WAT.as_bytes(), config)
    }

    fn from_module(
        engine: Engine,
        module: Module,
        config: SandboxConfig,
        registry: HostFunctionRegistry,
    ) -> Result<Self, SandboxError> {
        validate_module(&module, &registry, &config.abi)?;
        tracing::debug!(
            imports = module.imports().len(),
            exports = module.exports().len(),
            "guest artifact compiled"
        );
        Ok(Self {
            engine,
            module,
            config,
            registry,
        })
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Load a fresh guest whose log lines go to stdout.
    pub fn session(&self) -> Result<Session, SandboxError> {
        self.session_with_sink(Box::new(StdoutSink))
    }

    /// Load a fresh guest whose log lines go to `sink`.
    pub fn session_with_sink(&self, sink: Box<dyn LogSink>) -> Result<Session, SandboxError> {
        Session::load(self, sink)
    }

    /// Run one input through a fresh guest and close it.
    pub fn transform(&self, input: &str) -> Result<String, SandboxError> {
        self.transform_with_sink(input, Box::new(StdoutSink))
    }

    pub fn transform_with_sink(
        &self,
        input: &str,
        sink: Box<dyn LogSink>,
    ) -> Result<String, SandboxError> {
        let mut session = self.session_with_sink(sink)?;
        let result = session.invoke(input);
        let closed = session.close();
        match (result, closed) {
            (Ok(out), Ok(())) => Ok(out),
            (Ok(_), Err(e)) | (Err(e), _) => Err(e),
        }
    }
}

/// Where a [`Session`] is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    /// Instantiated and startup export run.
    Loaded,
    /// Required exports resolved; accepts one invocation.
    Ready,
    Invoking,
    Completed,
    Failed,
    /// All guest resources released.
    Closed,
}

/// One instantiated guest, used for a single invocation.
pub struct Session {
    store: Store<HostState>,
    marshaler: Marshaler,
    side_effect: TypedFunc<(u32, u32), ()>,
    transform: TypedFunc<(u32, u32), u64>,
    abi: GuestAbi,
    state: SessionState,
}

impl Session {
    fn load(bridge: &Bridge, sink: Box<dyn LogSink>) -> Result<Self, SandboxError> {
        let config = &bridge.config;
        let abi = config.abi.clone();

        // 1. Fresh store with fuel and memory limits
        let mut store = Store::new(&bridge.engine, HostState::new(config, sink));
        store.limiter(|state| &mut state.limits);
        store
            .set_fuel(config.fuel_limit)
            .map_err(|e| SandboxError::Load(format!("setting fuel: {e:#}")))?;

        // 2. Link the compatibility layer and host functions
        let mut linker = Linker::new(&bridge.engine);
        link_compat_layer(&mut linker)?;
        bridge.registry.link(&mut linker)?;

        // 3. Instantiate and run startup
        let instance = linker
            .instantiate(&mut store, &bridge.module)
            .map_err(|e| SandboxError::Load(format!("{e:#}")))?;
        run_startup(&mut store, &instance, &abi.startup)?;

        let memory = instance
            .get_memory(&mut store, &abi.memory)
            .ok_or_else(|| SandboxError::Load(format!("no memory export '{}'", abi.memory)))?;
        tracing::debug!(from = ?SessionState::Uninitialized, to = ?SessionState::Loaded, "session state");

        // 4. Resolve the exports the invocation needs
        let allocate = resolve::<u32, u32>(&mut store, &instance, &abi.allocate)?;
        let release = resolve::<u32, ()>(&mut store, &instance, &abi.release)?;
        let side_effect = resolve::<(u32, u32), ()>(&mut store, &instance, &abi.side_effect)?;
        let transform = resolve::<(u32, u32), u64>(&mut store, &instance, &abi.transform)?;
        tracing::debug!(from = ?SessionState::Loaded, to = ?SessionState::Ready, "session state");

        let marshaler = Marshaler::new(GuestMemory::new(memory), allocate, release, &abi);
        Ok(Self {
            store,
            marshaler,
            side_effect,
            transform,
            abi,
            state: SessionState::Ready,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Pass `input` through the guest: side-effect export, then transform.
    ///
    /// Every guest allocation made along the way is released before this
    /// returns, whether the invocation succeeded or not. A session accepts
    /// exactly one invocation.
    pub fn invoke(&mut self, input: &str) -> Result<String, SandboxError> {
        if self.state != SessionState::Ready {
            return Err(SandboxError::NotReady { state: self.state });
        }
        self.transition(SessionState::Invoking);

        let outcome = self.run_invocation(input.as_bytes());
        let outcome = self.finish(outcome);

        match &outcome {
            Ok(out) => {
                tracing::info!(input, output = %out, "guest transform completed");
                self.transition(SessionState::Completed);
            }
            Err(e) => {
                tracing::warn!(input, error = %e, "guest invocation failed");
                self.transition(SessionState::Failed);
            }
        }
        outcome
    }

    fn run_invocation(&mut self, input: &[u8]) -> Result<String, SandboxError> {
        let handle = self.marshal_in(input)?;
        self.call_side_effect(handle)?;
        let packed = self.call_transform(handle)?;
        let bytes = self.marshal_out(packed)?;
        String::from_utf8(bytes).map_err(|source| SandboxError::InvalidUtf8 {
            export: self.abi.transform.clone(),
            source,
        })
    }

    /// Release everything the invocation allocated; the invocation's own
    /// error takes precedence over a cleanup error.
    fn finish(&mut self, outcome: Result<String, SandboxError>) -> Result<String, SandboxError> {
        if matches!(outcome, Err(SandboxError::FuelExhausted { .. })) {
            // Without fuel the guest deallocator cannot run at all.
            if let Err(e) = self.store.set_fuel(CLEANUP_FUEL) {
                tracing::warn!(error = %e, "could not refuel for cleanup");
            }
        }
        let cleanup = self.marshaler.release_all(&mut self.store);
        match (outcome, cleanup) {
            (Ok(out), Ok(())) => Ok(out),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(cleanup_err)) => {
                tracing::warn!(error = %cleanup_err, "cleanup after failed invocation also failed");
                Err(e)
            }
        }
    }

    // ── Marshaling primitives ──

    /// Allocate `size` bytes in the guest. The handle is tracked until released.
    pub fn allocate(&mut self, size: u32) -> Result<AllocationHandle, SandboxError> {
        self.marshaler.allocate(&mut self.store, size)
    }

    pub fn marshal_in(&mut self, bytes: &[u8]) -> Result<AllocationHandle, SandboxError> {
        self.marshaler.marshal_in(&mut self.store, bytes)
    }

    pub fn marshal_out(&mut self, packed: PackedResult) -> Result<Vec<u8>, SandboxError> {
        self.marshaler.marshal_out(&mut self.store, packed)
    }

    pub fn release(&mut self, ptr: u32) -> Result<(), SandboxError> {
        self.marshaler.release(&mut self.store, ptr)
    }

    /// Allocations still held by the host.
    pub fn outstanding_allocations(&self) -> &[AllocationHandle] {
        self.marshaler.outstanding()
    }

    // ── Linear memory access ──

    pub fn read(&self, offset: u32, len: u32) -> Result<Vec<u8>, SandboxError> {
        Ok(self.marshaler.memory().read(&self.store, offset, len)?)
    }

    pub fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), SandboxError> {
        Ok(self.marshaler.memory().write(&mut self.store, offset, bytes)?)
    }

    pub fn memory_size(&self) -> usize {
        self.marshaler.memory().size(&self.store)
    }

    // ── Guest entry points ──

    /// Call the side-effect export with a marshaled buffer.
    pub fn call_side_effect(&mut self, handle: AllocationHandle) -> Result<(), SandboxError> {
        let result = self.side_effect.call(&mut self.store, (handle.ptr, handle.size));
        handle_trap(&mut self.store, &self.abi.side_effect, result)
    }

    /// Call the transform export with a marshaled buffer.
    ///
    /// The returned buffer must go through [`marshal_out`](Self::marshal_out)
    /// so the host takes ownership of it.
    pub fn call_transform(&mut self, handle: AllocationHandle) -> Result<PackedResult, SandboxError> {
        let result = self.transform.call(&mut self.store, (handle.ptr, handle.size));
        handle_trap(&mut self.store, &self.abi.transform, result).map(PackedResult::from_raw)
    }

    /// Number of lines the guest has logged so far.
    pub fn log_lines(&self) -> u64 {
        self.store.data().log_lines()
    }

    /// Release outstanding allocations and drop the guest.
    pub fn close(mut self) -> Result<(), SandboxError> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<(), SandboxError> {
        if self.state == SessionState::Closed {
            return Ok(());
        }
        let result = self.marshaler.release_all(&mut self.store);
        self.transition(SessionState::Closed);
        result
    }

    fn transition(&mut self, next: SessionState) {
        tracing::debug!(from = ?self.state, to = ?next, "session state");
        self.state = next;
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            tracing::warn!(error = %e, "releasing guest allocations on drop failed");
        }
    }
}

/// Create a Wasmtime engine with fuel metering.
fn create_engine() -> Result<Engine, SandboxError> {
    let mut wasm_config = Config::new();

    // Fuel metering: prevents infinite loops
    wasm_config.consume_fuel(true);

    // One linear memory per guest
    wasm_config.wasm_multi_memory(false);

    Engine::new(&wasm_config).map_err(SandboxError::Compile)
}

/// Run the startup export if the guest has one.
fn run_startup(
    store: &mut Store<HostState>,
    instance: &Instance,
    export: &str,
) -> Result<(), SandboxError> {
    let Some(func) = instance.get_func(&mut *store, export) else {
        tracing::debug!(export, "guest has no startup export");
        return Ok(());
    };
    let startup = func
        .typed::<(), ()>(&*store)
        .map_err(|e| SandboxError::Startup {
            export: export.into(),
            reason: format!("{e:#}"),
        })?;
    let result = startup.call(&mut *store, ());
    handle_trap(store, export, result).map_err(|e| SandboxError::Startup {
        export: export.into(),
        reason: e.to_string(),
    })
}

/// Look up a typed function export.
fn resolve<P: WasmParams, R: WasmResults>(
    store: &mut Store<HostState>,
    instance: &Instance,
    name: &str,
) -> Result<TypedFunc<P, R>, SandboxError> {
    instance
        .get_typed_func::<P, R>(&mut *store, name)
        .map_err(|e| SandboxError::MissingExport {
            name: name.into(),
            reason: format!("{e:#}"),
        })
}

/// Handle a guest function call result, converting traps to `SandboxError`.
///
/// Host function fault → the fault (`Bounds` for bad guest pointers)
/// `proc_exit`        → `SandboxError::GuestExit`
/// Fuel exhaustion    → `SandboxError::FuelExhausted`
/// Other traps        → `SandboxError::Invocation`
pub(crate) fn handle_trap<R>(
    store: &mut Store<HostState>,
    export: &str,
    result: anyhow::Result<R>,
) -> Result<R, SandboxError> {
    let err = match result {
        Ok(val) => return Ok(val),
        Err(e) => e,
    };
    if let Some(fault) = store.data_mut().take_fault() {
        return Err(fault.into());
    }
    if let Some(exit) = err.downcast_ref::<I32Exit>() {
        return Err(SandboxError::GuestExit {
            export: export.into(),
            code: exit.0,
        });
    }
    if matches!(err.downcast_ref::<Trap>(), Some(Trap::OutOfFuel)) {
        return Err(SandboxError::FuelExhausted {
            export: export.into(),
        });
    }
    Err(SandboxError::Invocation {
        export: export.into(),
        reason: format!("{err:#}"),
    })
}
