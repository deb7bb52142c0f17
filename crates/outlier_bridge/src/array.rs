//! Zero-copy input arrays
//!
//! An [`ArrayView`] hands the caller's `f64` buffer to the runtime as a
//! `Float64Array` over an `ArrayBuffer` that points straight at the caller's
//! memory. The buffer is detached when the exposed array goes out of scope, so
//! a detector that keeps a reference sees an empty array afterwards and never
//! the caller's memory.

use rquickjs::{function::Constructor, qjs, Ctx, Value};
use std::ffi::c_void;
use std::marker::PhantomData;

/// Borrowed `f64` buffer headed into the runtime.
#[derive(Debug)]
pub(crate) struct ArrayView<'a> {
    data: &'a mut [f64],
}

impl<'a> ArrayView<'a> {
    pub(crate) fn new(data: &'a mut [f64]) -> Self {
        Self { data }
    }

    pub(crate) fn len(&self) -> usize {
        self.data.len()
    }

    pub(crate) fn byte_len(&self) -> usize {
        std::mem::size_of_val(&*self.data)
    }

    /// Wrap the buffer as a `Float64Array` without copying.
    ///
    /// The returned [`ExposedArray`] keeps the mutable borrow alive and
    /// detaches the buffer when dropped.
    pub(crate) fn expose<'js>(mut self, ctx: &Ctx<'js>) -> rquickjs::Result<ExposedArray<'a, 'js>> {
        let byte_len = self.byte_len();
        // SAFETY: the memory is valid for 'a. ExposedArray holds the borrow
        // and detaches the buffer before it ends; the no-op free leaves the
        // memory with the caller.
        let raw = unsafe {
            qjs::JS_NewArrayBuffer(
                ctx.as_raw().as_ptr(),
                self.data.as_mut_ptr().cast::<u8>(),
                byte_len as _,
                Some(borrowed_free),
                std::ptr::null_mut(),
                false.into(),
            )
        };
        // SAFETY: JS_NewArrayBuffer returns a new reference (or an exception tag)
        let buffer = unsafe { Value::from_raw(ctx.clone(), raw) };
        if !buffer.is_object() {
            return Err(rquickjs::Error::Exception);
        }

        let guard = DetachOnDrop {
            ctx: ctx.clone(),
            buffer,
        };
        let constructor: Constructor = ctx.globals().get("Float64Array")?;
        let array: Value = constructor.construct((guard.buffer.clone(),))?;

        Ok(ExposedArray {
            array,
            _guard: guard,
            _borrow: PhantomData,
        })
    }
}

/// A `Float64Array` aliasing borrowed memory.
pub(crate) struct ExposedArray<'a, 'js> {
    array: Value<'js>,
    _guard: DetachOnDrop<'js>,
    _borrow: PhantomData<&'a mut [f64]>,
}

impl<'js> ExposedArray<'_, 'js> {
    /// The `Float64Array`, as an argument for a call.
    pub(crate) fn array(&self) -> Value<'js> {
        self.array.clone()
    }
}

struct DetachOnDrop<'js> {
    ctx: Ctx<'js>,
    buffer: Value<'js>,
}

impl Drop for DetachOnDrop<'_> {
    fn drop(&mut self) {
        // SAFETY: `buffer` is a live ArrayBuffer and the lock is held for 'js
        unsafe { qjs::JS_DetachArrayBuffer(self.ctx.as_raw().as_ptr(), self.buffer.as_raw()) };
    }
}

/// The caller owns the memory; the runtime must not free it.
unsafe extern "C" fn borrowed_free(
    _rt: *mut qjs::JSRuntime,
    _opaque: *mut c_void,
    _ptr: *mut c_void,
) {
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_reports_sizes() {
        let mut data = [1.0, 2.0, 3.0];
        let view = ArrayView::new(&mut data);
        assert_eq!(view.len(), 3);
        assert_eq!(view.byte_len(), 24);
    }

    #[test]
    fn empty_view() {
        let mut data: [f64; 0] = [];
        let view = ArrayView::new(&mut data);
        assert_eq!(view.len(), 0);
        assert_eq!(view.byte_len(), 0);
    }
}
