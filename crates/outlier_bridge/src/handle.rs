//! Handle-based access to runtime values
//!
//! Values created inside a locked scope borrow that scope (`Value<'js>`) and
//! are freed when it ends. Anything the host keeps longer becomes a
//! [`ForeignHandle`]: one owned reference, given back exactly once when the
//! handle is released or dropped.

use rquickjs::{Context, Ctx, Persistent, Value};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::mem::ManuallyDrop;
use std::panic::{self, AssertUnwindSafe};

thread_local! {
    /// How many `enter` scopes this thread is inside.
    static DEPTH: Cell<usize> = const { Cell::new(0) };
    /// Handles dropped while this thread already held the runtime lock.
    static DEFERRED: RefCell<Vec<Pinned>> = const { RefCell::new(Vec::new()) };
}

/// A value pinned past its scope.
struct Pinned(Persistent<Value<'static>>);

// SAFETY: the persistent value is only cloned, restored or freed from inside
// `Context::with`, which holds the runtime lock for the whole closure.
unsafe impl Send for Pinned {}
unsafe impl Sync for Pinned {}

impl Pinned {
    fn free(self, ctx: &Ctx<'_>) {
        drop(self.0.restore(ctx));
    }
}

/// Owned reference to a value living in the embedded runtime.
///
/// Move-only: [`ForeignHandle::release`] consumes the handle, so a reference
/// cannot be given back twice. Must not be created before
/// [`crate::initialize`] has finished.
pub struct ForeignHandle {
    value: ManuallyDrop<Pinned>,
}

impl ForeignHandle {
    pub(crate) fn save<'js>(ctx: &Ctx<'js>, value: Value<'js>) -> Self {
        Self {
            value: ManuallyDrop::new(Pinned(Persistent::save(ctx, value))),
        }
    }

    /// Borrow the value for the current scope. Takes a new reference; the
    /// handle keeps its own.
    pub(crate) fn restore<'js>(&self, ctx: &Ctx<'js>) -> rquickjs::Result<Value<'js>> {
        self.value.0.clone().restore(ctx)
    }

    /// Give the reference back to the runtime.
    ///
    /// ```compile_fail
    /// fn release_twice(handle: outlier_bridge::ForeignHandle) {
    ///     handle.release();
    ///     handle.release();
    /// }
    /// ```
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for ForeignHandle {
    fn drop(&mut self) {
        // SAFETY: `value` is not touched again after this point.
        let value = unsafe { ManuallyDrop::take(&mut self.value) };

        if DEPTH.with(Cell::get) > 0 {
            // Locking again from here would deadlock; free on the way out instead
            DEFERRED.with(|d| d.borrow_mut().push(value));
            return;
        }

        match crate::runtime::runtime() {
            Some(state) => state.context().with(move |ctx| value.free(&ctx)),
            None => {
                tracing::warn!("foreign handle outlived runtime setup; leaking it");
                std::mem::forget(value);
            }
        }
    }
}

impl fmt::Debug for ForeignHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForeignHandle").finish_non_exhaustive()
    }
}

/// Nesting marker for the current thread.
struct Scope;

impl Scope {
    fn open() -> Self {
        DEPTH.with(|d| d.set(d.get() + 1));
        Scope
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        DEPTH.with(|d| d.set(d.get() - 1));
    }
}

/// Run `f` with the runtime lock held.
///
/// Every access to the runtime goes through here. Handles dropped inside `f`
/// are freed before the lock is given up.
///
/// # Panics
///
/// If this thread already holds the lock, i.e. when called from inside a
/// [`crate::DetectionResult::with_indices`] reader. The lock is not
/// reentrant, so waiting would hang forever. A panic in `f` is carried out
/// of the locked scope before it resumes, leaving the runtime usable.
pub(crate) fn enter<F, R>(context: &Context, f: F) -> R
where
    F: FnOnce(Ctx<'_>) -> R + Send,
    R: Send,
{
    assert_unlocked();
    let outcome = context.with(|ctx| {
        let scope = Scope::open();
        let out = panic::catch_unwind(AssertUnwindSafe(|| f(ctx.clone())));
        drain(&ctx);
        drop(scope);
        out
    });
    outcome.unwrap_or_else(|payload| panic::resume_unwind(payload))
}

/// Fail fast instead of deadlocking on a lock this thread already holds.
pub(crate) fn assert_unlocked() {
    if DEPTH.with(Cell::get) > 0 {
        panic!("outlier bridge called from inside a `with_indices` reader; the runtime lock is already held");
    }
}

fn drain(ctx: &Ctx<'_>) {
    let pending = DEFERRED.with(|d| std::mem::take(&mut *d.borrow_mut()));
    if !pending.is_empty() {
        tracing::trace!(count = pending.len(), "freeing deferred handles");
    }
    for value in pending {
        value.free(ctx);
    }
}
