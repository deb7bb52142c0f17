//! Symbol resolution: `module.function` to a callable handle

use crate::error::ResolveError;
use crate::handle::{self, ForeignHandle};
use crate::loader;
use crate::report;
use crate::runtime::RuntimeState;
use rquickjs::{Exception, Value};
use std::fmt;

/// A detector function, resolved once and reused for any number of calls.
///
/// Shareable across threads; calls through it are serialized by the runtime
/// lock. Dropping it releases the function.
pub struct ResolvedFunction {
    module: String,
    name: String,
    handle: ForeignHandle,
}

impl ResolvedFunction {
    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.module, self.name)
    }

    pub(crate) fn handle(&self) -> &ForeignHandle {
        &self.handle
    }

    pub fn release(self) {
        drop(self);
    }
}

impl fmt::Debug for ResolvedFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedFunction")
            .field("module", &self.module)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

pub(crate) fn resolve(
    state: &RuntimeState,
    module: &str,
    function: &str,
) -> Result<ResolvedFunction, ResolveError> {
    report::clear();
    let checked = loader::validate_module_name(module)
        .and_then(|()| loader::validate_function_name(function));
    if let Err(err) = checked {
        report::record(err.to_string());
        return Err(err);
    }

    // The module object and the attribute value are borrowed for the scope
    // only; just the callable leaves it.
    let handle = handle::enter(state.context(), |ctx| {
        let exports = loader::import(&ctx, state, module)?;

        let member: Value = exports
            .get(function)
            .map_err(|e| ResolveError::FunctionNotFound {
                module: module.to_string(),
                function: function.to_string(),
                message: report::capture(&ctx, e),
            })?;

        if member.is_undefined() {
            let err = Exception::throw_message(
                &ctx,
                &format!("module '{module}' has no attribute '{function}'"),
            );
            return Err(ResolveError::FunctionNotFound {
                module: module.to_string(),
                function: function.to_string(),
                message: report::capture(&ctx, err),
            });
        }
        if !member.is_function() {
            let err = Exception::throw_message(
                &ctx,
                &format!("'{module}.{function}' is a {:?}, not a function", member.type_of()),
            );
            return Err(ResolveError::NotCallable {
                module: module.to_string(),
                function: function.to_string(),
                message: report::capture(&ctx, err),
            });
        }

        Ok(ForeignHandle::save(&ctx, member))
    })?;

    tracing::debug!(module, function, "resolved detector function");
    Ok(ResolvedFunction {
        module: module.to_string(),
        name: function.to_string(),
        handle,
    })
}
