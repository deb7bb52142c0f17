//! Result extraction
//!
//! A detector returns a `BigInt64Array`. Its storage is read in place as
//! `&[i64]`; nothing is copied unless the caller asks for a `Vec`. The type
//! tag is checked before the storage is touched.

use crate::error::ExtractError;
use crate::handle::{self, ForeignHandle};
use crate::report;
use crate::runtime::RuntimeState;
use rquickjs::{Ctx, Object, TypedArray, Value};
use std::fmt;

/// Indices returned by one detector call.
///
/// Holds the returned array alive. [`DetectionResult::release`] (or drop)
/// gives it back to the runtime; after that the indices are gone.
pub struct DetectionResult {
    underlying: ForeignHandle,
    count: usize,
}

impl DetectionResult {
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Lend the indices to `read` without copying.
    ///
    /// `read` runs with the runtime lock held. Calling back into the bridge
    /// from `read` panics instead of deadlocking.
    pub fn with_indices<F, R>(&self, read: F) -> Result<R, ExtractError>
    where
        F: FnOnce(&[i64]) -> R + Send,
        R: Send,
    {
        let state = crate::runtime::runtime().ok_or(ExtractError::Uninitialized)?;
        let expected = self.count;
        handle::enter(state.context(), |ctx| {
            let value = self
                .underlying
                .restore(&ctx)
                .map_err(|e| ExtractError::Size(report::capture(&ctx, e)))?;
            read_indices(&ctx, &value, |indices| {
                if indices.len() == expected {
                    Ok(read(indices))
                } else {
                    Err(ExtractError::LengthMismatch {
                        reported: expected,
                        actual: indices.len(),
                    })
                }
            })?
        })
    }

    /// Copy the indices out.
    pub fn to_vec(&self) -> Result<Vec<i64>, ExtractError> {
        self.with_indices(<[i64]>::to_vec)
    }

    /// The returned array object.
    pub fn underlying(&self) -> &ForeignHandle {
        &self.underlying
    }

    /// Give the array back to the runtime. Consumes the result:
    ///
    /// ```compile_fail
    /// fn release_twice(result: outlier_bridge::DetectionResult) {
    ///     result.release();
    ///     result.release();
    /// }
    /// ```
    pub fn release(self) {
        drop(self);
    }
}

impl fmt::Debug for DetectionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DetectionResult")
            .field("count", &self.count)
            .finish_non_exhaustive()
    }
}

pub(crate) fn extract(
    state: &RuntimeState,
    result: ForeignHandle,
) -> Result<DetectionResult, ExtractError> {
    report::clear();
    let counted = handle::enter(state.context(), |ctx| {
        let value = result
            .restore(&ctx)
            .map_err(|e| ExtractError::Size(report::capture(&ctx, e)))?;
        read_indices(&ctx, &value, <[i64]>::len)
    });

    match counted {
        Ok(count) => Ok(DetectionResult {
            underlying: result,
            count,
        }),
        Err(err) => {
            tracing::warn!(error = %err, "detector broke its return contract");
            report::record(err.to_string());
            // `result` is released here, outside the lock
            Err(err)
        }
    }
}

/// Whether `value` can be read as an index buffer at all.
pub(crate) fn is_index_array(value: &Value<'_>) -> bool {
    value.get::<TypedArray<i64>>().is_ok()
}

/// Validate `value` and lend its storage to `read`.
fn read_indices<'js, R>(
    ctx: &Ctx<'js>,
    value: &Value<'js>,
    read: impl FnOnce(&[i64]) -> R,
) -> Result<R, ExtractError> {
    let not_indices = || ExtractError::NotIndexArray {
        found: describe(value),
    };
    let typed: TypedArray<i64> = value.get().map_err(|_| not_indices())?;
    let object = value.as_object().ok_or_else(not_indices)?;

    let reported: f64 = object
        .get("length")
        .map_err(|e| ExtractError::Size(report::capture(ctx, e)))?;
    if !(reported >= 0.0 && reported.fract() == 0.0) {
        return Err(ExtractError::InvalidLength { reported });
    }
    let reported = reported as usize;

    let Some(bytes) = typed.as_bytes() else {
        // QuickJS leaves a TypeError pending for detached buffers
        let _ = ctx.catch();
        return Err(ExtractError::Detached);
    };
    let indices: &[i64] =
        bytemuck::try_cast_slice(bytes).map_err(|e| ExtractError::Layout(e.to_string()))?;
    if indices.len() != reported {
        return Err(ExtractError::LengthMismatch {
            reported,
            actual: indices.len(),
        });
    }

    Ok(read(indices))
}

/// Short type description for diagnostics: the constructor name for objects.
pub(crate) fn describe(value: &Value<'_>) -> String {
    value
        .as_object()
        .and_then(|object| object.get::<_, Object>("constructor").ok())
        .and_then(|constructor| constructor.get::<_, String>("name").ok())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| format!("{:?}", value.type_of()))
}
