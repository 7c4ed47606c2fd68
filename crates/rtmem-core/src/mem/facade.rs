//! Allocation entry points.
//!
//! Every runtime allocation goes through here. The facade never hands back a
//! failure for a non-zero request: if the backend is exhausted it calls the
//! host's `mem_exhausted` hook and diverges with the [`Fatal`](crate::Fatal)
//! that hook describes.
//!
//! With the `mem-debug` feature each entry point is `#[track_caller]` and
//! reports the caller's file and line to [`crate::trace`]. Without it the
//! call-site plumbing is a zero-sized [`Site`] and the attribute is absent.

#![allow(unsafe_code)]

use std::num::NonZeroUsize;
#[cfg(feature = "mem-debug")]
use std::panic::Location;

use crate::config::Finalizer;
use crate::context::Context;
use crate::fatal;
use crate::mem::block::{Block, Element};
#[cfg(feature = "mem-debug")]
use crate::trace::{self, AllocPath, TraceOp};

/// Call site and type label of a memory operation.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Site {
    #[cfg(feature = "mem-debug")]
    location: &'static Location<'static>,
    #[cfg(feature = "mem-debug")]
    label: &'static str,
}

impl Site {
    #[cfg_attr(feature = "mem-debug", track_caller)]
    #[inline]
    pub(crate) fn caller() -> Self {
        Self {
            #[cfg(feature = "mem-debug")]
            location: Location::caller(),
            #[cfg(feature = "mem-debug")]
            label: "",
        }
    }

    /// Label the operation with the element type `T`.
    #[inline]
    #[must_use]
    pub(crate) fn of<T>(self) -> Self {
        Self {
            #[cfg(feature = "mem-debug")]
            label: std::any::type_name::<T>(),
            ..self
        }
    }

    #[cfg(feature = "mem-debug")]
    pub(crate) fn emit(self, op: TraceOp) {
        trace::emit(self.location, self.label, op);
    }
}

/// Scanned allocation of at least `size` bytes. `None` only for `size == 0`.
#[cfg_attr(feature = "mem-debug", track_caller)]
pub fn allocate(ctx: &Context, size: usize) -> Option<Block> {
    allocate_at(ctx, size, Site::caller())
}

/// Allocation with `finalizer` bound to the block by the backend in the
/// same step. Aborts when the backend cannot register finalizers.
#[cfg_attr(feature = "mem-debug", track_caller)]
pub fn allocate_finalized(ctx: &Context, size: usize, finalizer: Finalizer) -> Option<Block> {
    let site = Site::caller();
    let size = NonZeroUsize::new(size)?;
    let Some(hook) = ctx.system().malloc_finalize.as_ref() else {
        ctx.abort("backend has no malloc_finalize hook")
    };
    let block = hook(ctx, size.get(), finalizer);
    #[cfg(feature = "mem-debug")]
    site.emit(TraceOp::Allocate {
        path: AllocPath::Finalized,
        size: size.get(),
        block: block.map(Block::addr),
    });
    #[cfg(not(feature = "mem-debug"))]
    let _ = site;
    Some(block.unwrap_or_else(|| exhausted(ctx)))
}

/// Reference-free allocation through `malloc_string`, falling back to
/// `malloc` when the backend has no separate path.
#[cfg_attr(feature = "mem-debug", track_caller)]
pub fn allocate_opaque(ctx: &Context, size: usize) -> Option<Block> {
    allocate_opaque_at(ctx, size, Site::caller())
}

/// Return `slot`'s block early. The slot is always empty afterwards, so a
/// second call is a no-op.
///
/// # Safety
///
/// The block in `slot` must have come from this context's backend, and no
/// other handle to it may be used afterwards: no copy of the [`Block`], no
/// [`RtString`](crate::RtString) over it, no [`GrowBuf`](crate::GrowBuf)
/// holding it. The backend may hand the same memory out again.
///
/// ```compile_fail
/// # use std::sync::Arc;
/// # use rtmem_core::{mem, Context, HeapBackend};
/// let heap = Arc::new(HeapBackend::new());
/// let ctx = Context::new(Arc::new(heap.install())).unwrap();
/// let s = rtmem_core::render_format(&ctx, "%s", &["hello".into()]);
/// mem::release(&ctx, &mut s.block());
/// ```
#[cfg_attr(feature = "mem-debug", track_caller)]
pub unsafe fn release(ctx: &Context, slot: &mut Option<Block>) {
    // SAFETY: forwarded from the caller.
    unsafe { release_at(ctx, slot, Site::caller()) };
}

/// Ask the backend for a collection pass. No-op without a `gcollect` hook.
#[cfg_attr(feature = "mem-debug", track_caller)]
pub fn force_collect(ctx: &Context) {
    #[cfg(feature = "mem-debug")]
    Site::caller().emit(TraceOp::Collect);
    if let Some(collect) = ctx.system().gcollect.as_ref() {
        collect(ctx);
    }
}

/// Scanned storage for `count` values of `T`. Overflow counts as exhaustion.
#[cfg_attr(feature = "mem-debug", track_caller)]
pub fn new_array<T: Element>(ctx: &Context, count: usize) -> Option<Block> {
    let size = array_bytes::<T>(ctx, count);
    allocate_at(ctx, size, Site::caller().of::<T>())
}

/// Opaque storage for `count` values of `T`. Overflow counts as exhaustion.
#[cfg_attr(feature = "mem-debug", track_caller)]
pub fn new_text_array<T: Element>(ctx: &Context, count: usize) -> Option<Block> {
    let size = array_bytes::<T>(ctx, count);
    allocate_opaque_at(ctx, size, Site::caller().of::<T>())
}

fn array_bytes<T: Element>(ctx: &Context, count: usize) -> usize {
    count
        .checked_mul(std::mem::size_of::<T>())
        .unwrap_or_else(|| exhausted(ctx))
}

pub(crate) fn allocate_at(ctx: &Context, size: usize, site: Site) -> Option<Block> {
    let size = NonZeroUsize::new(size)?;
    let block = (ctx.system().malloc)(ctx, size.get());
    #[cfg(feature = "mem-debug")]
    site.emit(TraceOp::Allocate {
        path: AllocPath::Scanned,
        size: size.get(),
        block: block.map(Block::addr),
    });
    #[cfg(not(feature = "mem-debug"))]
    let _ = site;
    Some(block.unwrap_or_else(|| exhausted(ctx)))
}

pub(crate) fn allocate_opaque_at(ctx: &Context, size: usize, site: Site) -> Option<Block> {
    let size = NonZeroUsize::new(size)?;
    let system = ctx.system();
    let block = match system.malloc_string.as_ref() {
        Some(hook) => hook(ctx, size.get()),
        None => (system.malloc)(ctx, size.get()),
    };
    #[cfg(feature = "mem-debug")]
    site.emit(TraceOp::Allocate {
        path: AllocPath::Opaque,
        size: size.get(),
        block: block.map(Block::addr),
    });
    #[cfg(not(feature = "mem-debug"))]
    let _ = site;
    Some(block.unwrap_or_else(|| exhausted(ctx)))
}

/// # Safety
///
/// Same contract as [`release`].
pub(crate) unsafe fn release_at(ctx: &Context, slot: &mut Option<Block>, site: Site) {
    let block = slot.take();
    #[cfg(feature = "mem-debug")]
    site.emit(TraceOp::Release {
        block: block.map(Block::addr),
    });
    #[cfg(not(feature = "mem-debug"))]
    let _ = site;
    if let Some(block) = block {
        (ctx.system().free)(ctx, block);
    }
}

fn exhausted(ctx: &Context) -> ! {
    let fatal = (ctx.system().mem_exhausted)(ctx);
    fatal::raise(fatal)
}
