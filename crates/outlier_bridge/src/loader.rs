//! Detector module loading
//!
//! Module names are dotted (`detectors.zscore_v2`). A name resolves to a source
//! registered in memory, or to `<search path>/detectors/zscore_v2.js`. Sources are
//! CommonJS-shaped: they run once with `exports` and `module` in scope and
//! `module.exports` becomes the module object, cached for every later import.

use crate::error::ResolveError;
use crate::report;
use crate::runtime::RuntimeState;
use dashmap::DashMap;
use rquickjs::{Ctx, Exception, Function, Object, Value};
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

/// Where detector sources come from.
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    sources: DashMap<String, Arc<str>>,
    search_paths: RwLock<Vec<PathBuf>>,
}

/// Source text plus where it was found.
#[derive(Debug, Clone)]
pub(crate) struct ModuleSource {
    pub origin: String,
    pub text: Arc<str>,
}

impl ModuleRegistry {
    pub fn new(search_paths: Vec<PathBuf>) -> Self {
        Self {
            sources: DashMap::new(),
            search_paths: RwLock::new(search_paths),
        }
    }

    /// Register an in-memory module. In-memory sources win over files. Has no
    /// effect on a module that was already imported.
    pub fn register(&self, name: &str, source: impl Into<String>) -> Result<(), ResolveError> {
        validate_module_name(name)?;
        let text: String = source.into();
        if self.sources.insert(name.to_string(), Arc::from(text)).is_some() {
            tracing::debug!(module = name, "replaced registered module source");
        }
        Ok(())
    }

    pub fn add_search_path(&self, path: impl Into<PathBuf>) {
        let path = path.into();
        tracing::debug!(path = %path.display(), "added detector search path");
        match self.search_paths.write() {
            Ok(mut paths) => paths.push(path),
            Err(poisoned) => poisoned.into_inner().push(path),
        }
    }

    pub fn search_paths(&self) -> Vec<PathBuf> {
        match self.search_paths.read() {
            Ok(paths) => paths.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Find the source for `name`. `Ok(None)` means nothing matched;
    /// `Err` means a file matched but could not be read.
    pub(crate) fn locate(&self, name: &str) -> Result<Option<ModuleSource>, String> {
        if let Some(text) = self.sources.get(name) {
            return Ok(Some(ModuleSource {
                origin: format!("<memory:{name}>"),
                text: Arc::clone(text.value()),
            }));
        }

        let relative = relative_path(name);
        for dir in self.search_paths() {
            let candidate = dir.join(&relative);
            match std::fs::read_to_string(&candidate) {
                Ok(text) => {
                    return Ok(Some(ModuleSource {
                        origin: candidate.display().to_string(),
                        text: Arc::from(text),
                    }))
                }
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
                Err(err) => return Err(format!("{}: {err}", candidate.display())),
            }
        }
        Ok(None)
    }
}

fn relative_path(name: &str) -> PathBuf {
    let mut path: PathBuf = name.split('.').collect();
    path.set_extension("js");
    path
}

/// Dotted segments of ASCII letters, digits, `_` and `-`.
pub fn validate_module_name(name: &str) -> Result<(), ResolveError> {
    let invalid = |reason: &str| ResolveError::InvalidName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name.is_empty() {
        return Err(invalid("module name is empty"));
    }
    for segment in name.split('.') {
        if segment.is_empty() {
            return Err(invalid("empty segment"));
        }
        if let Some(c) = segment
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
        {
            return Err(invalid(&format!("unexpected character {c:?}")));
        }
    }
    Ok(())
}

pub fn validate_function_name(name: &str) -> Result<(), ResolveError> {
    let reason = if name.is_empty() {
        "function name is empty"
    } else if name.contains('\0') {
        "function name contains NUL"
    } else {
        return Ok(());
    };
    Err(ResolveError::InvalidName {
        name: name.to_string(),
        reason: reason.to_string(),
    })
}

/// Import `name`, from the cache when possible.
pub(crate) fn import<'js>(
    ctx: &Ctx<'js>,
    state: &RuntimeState,
    name: &str,
) -> Result<Object<'js>, ResolveError> {
    let failed = |message: String| ResolveError::ImportFailed {
        module: name.to_string(),
        message,
    };

    let cache = state
        .module_cache(ctx)
        .map_err(|e| failed(report::capture(ctx, e)))?;
    let cached: Value = cache.get(name).map_err(|e| failed(report::capture(ctx, e)))?;
    if let Some(exports) = cached.as_object() {
        return Ok(exports.clone());
    }

    let source = match state.registry().locate(name) {
        Ok(Some(source)) => source,
        Ok(None) => {
            let err = Exception::throw_message(ctx, &format!("No module named '{name}'"));
            return Err(ResolveError::ModuleNotFound {
                module: name.to_string(),
                message: report::capture(ctx, err),
            });
        }
        Err(message) => {
            report::record(message.clone());
            return Err(failed(message));
        }
    };

    let exports = evaluate(ctx, &source).map_err(|e| failed(report::capture(ctx, e)))?;
    cache
        .set(name, exports.clone())
        .map_err(|e| failed(report::capture(ctx, e)))?;

    tracing::debug!(module = name, origin = %source.origin, "imported detector module");
    Ok(exports)
}

fn evaluate<'js>(ctx: &Ctx<'js>, source: &ModuleSource) -> rquickjs::Result<Object<'js>> {
    let wrapped = format!("(function (exports, module) {{\n{}\n}})", source.text);
    let body: Function = ctx.eval(wrapped)?;

    let module = Object::new(ctx.clone())?;
    module.set("exports", Object::new(ctx.clone())?)?;
    module.set("id", source.origin.as_str())?;

    let exports: Value = module.get("exports")?;
    body.call::<_, ()>((exports, module.clone()))?;
    module.get("exports")
}
