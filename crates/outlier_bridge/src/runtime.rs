//! Script runtime management
//!
//! One QuickJS runtime per process. It is created by the first call to
//! [`initialize`] or [`try_initialize`] and lives until the process exits.

use crate::array::ArrayView;
use crate::config::BridgeConfig;
use crate::error::{DetectError, ExtractError, InitializationFailure, InvokeError, ResolveError};
use crate::extract::{self, DetectionResult};
use crate::handle::{self, ForeignHandle};
use crate::invoke;
use crate::loader::ModuleRegistry;
use crate::resolve::{self, ResolvedFunction};
use crate::{console, report};
use once_cell::sync::OnceCell;
use rquickjs::{function::Constructor, Context, Ctx, Object, Runtime};
use std::fmt;
use std::path::PathBuf;

static STATE: OnceCell<Result<RuntimeState, InitializationFailure>> = OnceCell::new();

/// Typed array constructors the bridge relies on.
const REQUIRED_ARRAYS: [&str; 3] = ["ArrayBuffer", "Float64Array", "BigInt64Array"];

/// The initialized embedded runtime
pub struct RuntimeState {
    runtime: Runtime,
    context: Context,
    /// `name -> module.exports`, kept inside the runtime
    modules: ForeignHandle,
    registry: ModuleRegistry,
    config: BridgeConfig,
}

/// Initialize the runtime, aborting the process if that fails.
///
/// A half-initialized interpreter cannot be torn down and retried, so there
/// is nothing useful a caller could do with the error.
pub fn initialize(config: BridgeConfig) -> &'static RuntimeState {
    match try_initialize(config) {
        Ok(state) => state,
        Err(err) => {
            tracing::error!(error = %err, "embedded runtime failed to initialize");
            eprintln!("fatal: embedded runtime failed to initialize: {err}");
            std::process::abort();
        }
    }
}

/// Initialize the runtime once. Later calls return the first outcome and
/// ignore their `config`.
pub fn try_initialize(
    config: BridgeConfig,
) -> Result<&'static RuntimeState, InitializationFailure> {
    let mut requested = Some(config);
    let outcome = STATE.get_or_init(|| RuntimeState::boot(requested.take().unwrap_or_default()));
    if requested.is_some() {
        tracing::debug!("runtime already initialized; ignoring config");
    }
    outcome.as_ref().map_err(Clone::clone)
}

/// The runtime, if it has been initialized successfully.
pub fn runtime() -> Option<&'static RuntimeState> {
    STATE.get().and_then(|outcome| outcome.as_ref().ok())
}

impl RuntimeState {
    fn boot(config: BridgeConfig) -> Result<Self, InitializationFailure> {
        let runtime =
            Runtime::new().map_err(|e| InitializationFailure::Runtime(e.to_string()))?;
        if let Some(limit) = config.limits.memory_limit {
            runtime.set_memory_limit(limit);
        }
        if let Some(threshold) = config.limits.gc_threshold {
            runtime.set_gc_threshold(threshold);
        }
        runtime.set_max_stack_size(config.limits.max_stack_size.unwrap_or(0));

        let context =
            Context::full(&runtime).map_err(|e| InitializationFailure::Context(e.to_string()))?;

        let install_console = config.console;
        let modules = handle::enter(&context, |ctx| {
            check_arrays(&ctx)?;
            if install_console {
                console::install(&ctx)
                    .map_err(|e| InitializationFailure::Bindings(report::capture(&ctx, e)))?;
            }
            // No prototype: `constructor`, `__proto__` and friends are plain keys
            let cache: Object = ctx
                .eval("Object.create(null)")
                .map_err(|e| InitializationFailure::Context(report::capture(&ctx, e)))?;
            Ok::<_, InitializationFailure>(ForeignHandle::save(&ctx, cache.into_value()))
        })?;
        report::clear();

        let registry = ModuleRegistry::new(config.modules.search_paths.clone());
        tracing::info!(
            search_paths = registry.search_paths().len(),
            console = config.console,
            "embedded runtime initialized"
        );

        Ok(Self {
            runtime,
            context,
            modules,
            registry,
            config,
        })
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    pub(crate) fn context(&self) -> &Context {
        &self.context
    }

    pub(crate) fn module_cache<'js>(&self, ctx: &Ctx<'js>) -> rquickjs::Result<Object<'js>> {
        self.modules.restore(ctx)?.get()
    }

    /// Make `source` importable as `name`.
    pub fn register_module(&self, name: &str, source: impl Into<String>) -> Result<(), ResolveError> {
        self.registry.register(name, source)
    }

    pub fn add_search_path(&self, path: impl Into<PathBuf>) {
        self.registry.add_search_path(path);
    }

    /// Resolve `module.function` to a reusable callable.
    pub fn resolve(&self, module: &str, function: &str) -> Result<ResolvedFunction, ResolveError> {
        resolve::resolve(self, module, function)
    }

    /// Call `function` with `values` exposed as a `Float64Array`, returning
    /// the raw result.
    pub fn invoke(
        &self,
        function: &ResolvedFunction,
        values: &mut [f64],
    ) -> Result<ForeignHandle, InvokeError> {
        invoke::invoke(self, function, ArrayView::new(values))
    }

    /// Interpret a raw result as an index buffer. The handle is released on failure.
    pub fn extract(&self, result: ForeignHandle) -> Result<DetectionResult, ExtractError> {
        extract::extract(self, result)
    }

    /// [`Self::invoke`] followed by [`Self::extract`].
    pub fn detect(
        &self,
        function: &ResolvedFunction,
        values: &mut [f64],
    ) -> Result<DetectionResult, DetectError> {
        let raw = self.invoke(function, values)?;
        Ok(self.extract(raw)?)
    }

    /// See [`crate::report`] for when this is set and cleared.
    pub fn last_error(&self) -> Option<String> {
        report::last_error()
    }

    /// Objects alive in the runtime after a full GC pass.
    pub fn live_objects(&self) -> i64 {
        handle::assert_unlocked();
        self.runtime.run_gc();
        self.runtime.memory_usage().obj_count
    }
}

impl fmt::Debug for RuntimeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeState")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

fn check_arrays(ctx: &Ctx<'_>) -> Result<(), InitializationFailure> {
    let globals = ctx.globals();
    for name in REQUIRED_ARRAYS {
        globals
            .get::<_, Constructor>(name)
            .map_err(|e| InitializationFailure::ArraySupport(format!("{name}: {e}")))?;
    }
    Ok(())
}
