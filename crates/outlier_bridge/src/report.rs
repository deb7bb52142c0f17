//! Error reporting
//!
//! A failed runtime call leaves an exception pending inside QuickJS. It is
//! taken and rendered the moment the failure is seen, before any other
//! runtime call can overwrite it, and the text is parked in a per-thread slot.
//!
//! Policy:
//! - rendering clears the runtime's pending exception
//! - [`last_error`] takes the message; a second call returns `None`
//! - every bridge operation clears the slot when it starts

use rquickjs::{convert::Coerced, Ctx, Value};
use std::cell::RefCell;

thread_local! {
    static LAST_ERROR: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Take the diagnostic left by the most recent failed bridge call on this thread.
pub fn last_error() -> Option<String> {
    LAST_ERROR.with(|e| e.borrow_mut().take())
}

pub(crate) fn clear() {
    LAST_ERROR.with(|e| *e.borrow_mut() = None);
}

pub(crate) fn record(message: impl Into<String>) {
    LAST_ERROR.with(|e| *e.borrow_mut() = Some(message.into()));
}

/// Render `err` and record it. For [`rquickjs::Error::Exception`] this takes
/// the pending exception out of the runtime.
pub(crate) fn capture(ctx: &Ctx<'_>, err: rquickjs::Error) -> String {
    let message = match err {
        rquickjs::Error::Exception => {
            let exception = ctx.catch();
            render(ctx, &exception)
        }
        other => other.to_string(),
    };
    tracing::debug!(%message, "runtime call failed");
    record(message.clone());
    message
}

/// Convert a thrown value to text with the runtime's own `String(value)`.
pub(crate) fn render<'js>(ctx: &Ctx<'js>, exception: &Value<'js>) -> String {
    if let Some(stack) = exception
        .as_object()
        .and_then(|o| o.get::<_, Option<String>>("stack").ok().flatten())
    {
        tracing::trace!(%stack, "exception stack");
    }

    match exception.get::<Coerced<String>>() {
        Ok(Coerced(text)) if !text.is_empty() => text,
        Ok(_) => format!("{:?} thrown with an empty message", exception.type_of()),
        Err(_) => {
            // toString itself threw; drop that secondary exception
            let _ = ctx.catch();
            format!("unprintable {:?} thrown", exception.type_of())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_error_is_read_once() {
        clear();
        record("boom");
        assert_eq!(last_error().as_deref(), Some("boom"));
        assert_eq!(last_error(), None);
    }

    #[test]
    fn slot_is_per_thread() {
        clear();
        record("main thread failure");
        let other = std::thread::spawn(last_error).join().expect("join");
        assert_eq!(other, None);
        assert_eq!(last_error().as_deref(), Some("main thread failure"));
    }
}
