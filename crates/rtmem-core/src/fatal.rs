//! Fatal outcomes.
//!
//! Backend exhaustion and explicit aborts must never return control to the
//! code that triggered them. They are raised as an unwind carrying a typed
//! [`Fatal`] payload; a top-level driver decides what that means:
//! - [`guard`] turns it into `Err(Fatal)` (tests, embedders with their own
//!   shutdown path)
//! - [`run`] logs it and terminates the process
//!
//! Panics that are not [`Fatal`] pass through both drivers untouched.

use std::panic::{self, AssertUnwindSafe};

use thiserror::Error;

/// Exit status used by [`run`] when a fatal outcome reaches it.
pub const FATAL_EXIT_CODE: i32 = 70;

/// A condition after which the runtime cannot continue.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Fatal {
    /// The backend could not satisfy a non-zero allocation.
    #[error("memory exhausted")]
    MemoryExhausted,
    /// The runtime or a host hook requested termination.
    #[error("abort: {0}")]
    Abort(String),
}

/// Diverge with `fatal`.
pub fn raise(fatal: Fatal) -> ! {
    tracing::error!(%fatal, "fatal runtime condition");
    panic::resume_unwind(Box::new(fatal))
}

/// Run `f`, converting a raised [`Fatal`] into `Err`.
pub fn guard<T>(f: impl FnOnce() -> T) -> Result<T, Fatal> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => Ok(value),
        Err(payload) => match payload.downcast::<Fatal>() {
            Ok(fatal) => Err(*fatal),
            Err(other) => panic::resume_unwind(other),
        },
    }
}

/// Run `f`, terminating the process if it raises a [`Fatal`].
pub fn run<T>(f: impl FnOnce() -> T) -> T {
    match guard(f) {
        Ok(value) => value,
        Err(fatal) => {
            eprintln!("rtmem: {fatal}");
            std::process::exit(FATAL_EXIT_CODE)
        }
    }
}
