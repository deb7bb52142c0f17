//! Invocation of resolved detectors

use crate::array::ArrayView;
use crate::error::InvokeError;
use crate::extract;
use crate::handle::{self, ForeignHandle};
use crate::report;
use crate::resolve::ResolvedFunction;
use crate::runtime::RuntimeState;
use rquickjs::{Function, Value};

/// Call `function(values)` and keep whatever it returns.
///
/// Blocks until the detector finishes. The input buffer is detached before
/// this returns, whether or not the call succeeded.
pub(crate) fn invoke(
    state: &RuntimeState,
    function: &ResolvedFunction,
    values: ArrayView<'_>,
) -> Result<ForeignHandle, InvokeError> {
    report::clear();
    let len = values.len();

    let outcome = handle::enter(state.context(), |ctx| {
        let callee: Function = function
            .handle()
            .restore(&ctx)
            .and_then(|value| value.get())
            .map_err(|e| InvokeError::Handle(report::capture(&ctx, e)))?;

        let exposed = values
            .expose(&ctx)
            .map_err(|e| InvokeError::ArrayView(report::capture(&ctx, e)))?;

        let returned = callee
            .call::<_, Value>((exposed.array(),))
            .map_err(|e| InvokeError::RuntimeRaised {
                message: report::capture(&ctx, e),
            });
        // Detach before looking at the result, so it can never alias the input
        drop(exposed);
        let returned = returned?;

        if !extract::is_index_array(&returned) {
            let err = InvokeError::UnexpectedReturnType {
                found: extract::describe(&returned),
            };
            report::record(err.to_string());
            return Err(err);
        }

        Ok(ForeignHandle::save(&ctx, returned))
    });

    match &outcome {
        Ok(_) => tracing::trace!(function = %function.qualified_name(), len, "detector returned"),
        Err(err) => tracing::debug!(function = %function.qualified_name(), len, error = %err, "detector call failed"),
    }
    outcome
}
