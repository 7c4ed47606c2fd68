//! # rtmem-core
//!
//! Memory substrate and string rendering for an embeddable managed runtime.
//!
//! Every other runtime component reaches memory exclusively through this
//! crate:
//! - [`mem::facade`]: allocation entry points delegating to host hooks
//! - [`mem::grow`]: overflow-safe doubling buffers
//! - [`format`]: exact-length two-pass string rendering
//! - [`trace`]: optional call-site instrumentation (`mem-debug` feature)
//!
//! Hosts describe their allocator once in a [`SystemTable`] and hand it to
//! each [`Context`]. Backend exhaustion is fatal and surfaces as a [`Fatal`]
//! outcome; buffer limits surface as [`MemError`].

#![deny(unsafe_code)]

pub mod config;
pub mod context;
pub mod error;
pub mod fatal;
pub mod format;
pub mod mem;
pub mod string;
#[cfg(feature = "mem-debug")]
pub mod trace;

pub use config::{Closure, FinalizeFn, Finalizer, GrowPolicy, RuntimeDefaults, SystemTable};
pub use context::{Context, WeakContext};
pub use error::{ConfigError, MemError};
pub use fatal::Fatal;
pub use format::{FormatArg, render_format};
pub use mem::block::{BLOCK_ALIGN, Block, Element};
pub use mem::grow::{BufKind, GrowBuf};
pub use mem::heap::HeapBackend;
pub use string::{RtString, Unit};
