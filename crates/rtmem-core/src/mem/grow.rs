//! Growable buffers.
//!
//! [`GrowBuf`] is the runtime's dynamic array: a backend block, a logical
//! length, and the byte capacity behind it. Capacity starts at the policy's
//! initial size and doubles, clamping to the policy maximum once doubling
//! would cross it. A request past the maximum is refused with
//! [`MemError::LimitReached`] before anything is touched.
//!
//! Buffers do not release storage on drop; the collector owns that. Call
//! [`GrowBuf::release`] to return it early. Elements past the old length read
//! as zero after any growth, whether or not it reallocated.

#![allow(unsafe_code)]

use std::fmt;
use std::marker::PhantomData;
use std::ptr;

use crate::config::GrowPolicy;
use crate::context::Context;
use crate::error::MemError;
use crate::mem::block::{Block, Element};
use crate::mem::facade::{self, Site};
#[cfg(feature = "mem-debug")]
use crate::trace::TraceOp;

/// Which allocation path backs the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BufKind {
    /// May hold references; allocated through `malloc`.
    #[default]
    Scanned,
    /// Character data; allocated through the opaque path.
    Text,
}

/// Byte capacity needed to hold `new_len` elements of `element_size` bytes,
/// starting from `allocated` bytes.
///
/// Returns `allocated` unchanged when it already suffices. A policy that
/// fails [`GrowPolicy::validate`] is rejected before any planning.
pub fn plan_capacity(
    policy: &GrowPolicy,
    allocated: usize,
    new_len: usize,
    element_size: usize,
) -> Result<usize, MemError> {
    policy.validate()?;
    let element_size = element_size.max(1);
    if new_len > policy.maximum_bytes / element_size {
        return Err(MemError::LimitReached {
            requested: new_len,
            element_size,
            maximum_bytes: policy.maximum_bytes,
        });
    }
    let mut candidate = allocated;
    while new_len > candidate / element_size {
        candidate = if candidate == 0 {
            policy.initial_bytes
        } else if candidate >= policy.maximum_bytes / 2 {
            policy.maximum_bytes
        } else {
            candidate * 2
        };
    }
    Ok(candidate)
}

/// Dynamic array of `T` in backend memory.
pub struct GrowBuf<T: Element> {
    block: Option<Block>,
    len: usize,
    allocated: usize,
    kind: BufKind,
    _marker: PhantomData<T>,
}

impl<T: Element> GrowBuf<T> {
    const ELEMENT_SIZE: usize = std::mem::size_of::<T>();

    /// Empty scanned buffer.
    #[must_use]
    pub const fn new() -> Self {
        Self::with_kind(BufKind::Scanned)
    }

    /// Empty text buffer.
    #[must_use]
    pub const fn text() -> Self {
        Self::with_kind(BufKind::Text)
    }

    #[must_use]
    pub const fn with_kind(kind: BufKind) -> Self {
        Self {
            block: None,
            len: 0,
            allocated: 0,
            kind,
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub fn kind(&self) -> BufKind {
        self.kind
    }

    #[must_use]
    pub fn block(&self) -> Option<Block> {
        self.block
    }

    /// Capacity in bytes.
    #[must_use]
    pub fn allocated_bytes(&self) -> usize {
        self.allocated
    }

    /// Capacity in elements.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.allocated / Self::ELEMENT_SIZE
    }

    /// Set the length to `new_len`, growing storage when it does not fit.
    ///
    /// Existing elements are preserved and elements past the old length read
    /// as zero. Never reallocates to shrink.
    #[cfg_attr(feature = "mem-debug", track_caller)]
    pub fn grow_to(&mut self, ctx: &Context, new_len: usize) -> Result<usize, MemError> {
        self.grow_at(ctx, new_len, Site::caller().of::<T>())
    }

    fn grow_at(&mut self, ctx: &Context, new_len: usize, site: Site) -> Result<usize, MemError> {
        #[cfg(feature = "mem-debug")]
        site.emit(TraceOp::Grow {
            old_len: self.len,
            new_len,
        });
        let planned = plan_capacity(&ctx.system().grow, self.allocated, new_len, Self::ELEMENT_SIZE)
            .inspect_err(|err| tracing::warn!(target: "rtmem::grow", %err, "buffer growth refused"))?;
        if planned != self.allocated {
            self.reallocate(ctx, planned, site);
        } else if let Some(block) = self.block.filter(|_| new_len > self.len) {
            let kept = self.len * Self::ELEMENT_SIZE;
            let fresh = (new_len - self.len) * Self::ELEMENT_SIZE;
            // SAFETY: `new_len <= allocated / size_of::<T>()`, so the range
            // `kept..kept + fresh` lies inside the owned block.
            unsafe { ptr::write_bytes(block.as_ptr().add(kept), 0, fresh) };
        }
        self.len = new_len;
        Ok(new_len)
    }

    fn reallocate(&mut self, ctx: &Context, capacity: usize, site: Site) {
        let fresh = match self.kind {
            BufKind::Text => facade::allocate_opaque_at(ctx, capacity, site),
            BufKind::Scanned => facade::allocate_at(ctx, capacity, site),
        };
        let Some(fresh) = fresh else {
            ctx.abort("growable buffer planned an empty capacity")
        };
        let kept = self.len * Self::ELEMENT_SIZE;
        // SAFETY: `fresh` holds `capacity` bytes and `kept <= self.allocated <
        // capacity`; the old block holds `self.allocated` bytes. The two
        // blocks are distinct live allocations.
        unsafe {
            if let Some(old) = self.block {
                ptr::copy_nonoverlapping(old.as_ptr(), fresh.as_ptr(), kept);
            }
            ptr::write_bytes(fresh.as_ptr().add(kept), 0, capacity - kept);
        }
        #[cfg(feature = "mem-debug")]
        site.emit(TraceOp::Reallocate {
            from: self.block.map(Block::addr),
            to: fresh.addr(),
            len: self.len,
            old_capacity: self.allocated,
            new_capacity: capacity,
            text: self.kind == BufKind::Text,
        });
        let mut old = self.block.replace(fresh);
        if old.is_some() {
            // SAFETY: the buffer owns its block; `block()` only hands out
            // copies that cannot be read or released without `unsafe`.
            unsafe { facade::release_at(ctx, &mut old, site) };
        }
        self.allocated = capacity;
    }

    /// Truncate to `new_len` elements. Storage is kept for reuse.
    pub fn shrink_to(&mut self, new_len: usize) -> usize {
        self.len = self.len.min(new_len);
        self.len
    }

    #[cfg_attr(feature = "mem-debug", track_caller)]
    pub fn push(&mut self, ctx: &Context, value: T) -> Result<(), MemError> {
        let index = self.len;
        self.grow_at(ctx, index + 1, Site::caller().of::<T>())?;
        self.as_mut_slice()[index] = value;
        Ok(())
    }

    #[cfg_attr(feature = "mem-debug", track_caller)]
    pub fn extend_from_slice(&mut self, ctx: &Context, items: &[T]) -> Result<(), MemError> {
        let start = self.len;
        let Some(end) = start.checked_add(items.len()) else {
            return Err(MemError::LimitReached {
                requested: usize::MAX,
                element_size: Self::ELEMENT_SIZE,
                maximum_bytes: ctx.system().grow.maximum_bytes,
            });
        };
        self.grow_at(ctx, end, Site::caller().of::<T>())?;
        self.as_mut_slice()[start..end].copy_from_slice(items);
        Ok(())
    }

    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        match self.block {
            // SAFETY: the block holds `allocated >= len * size_of::<T>()`
            // initialized bytes, is BLOCK_ALIGN-aligned, and `T: Element`
            // accepts any bytes this buffer wrote or zeroed.
            Some(block) => unsafe { std::slice::from_raw_parts(block.as_ptr().cast::<T>(), self.len) },
            None => &[],
        }
    }

    #[must_use]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        match self.block {
            // SAFETY: as in `as_slice`; `&mut self` makes the access unique.
            Some(block) => unsafe {
                std::slice::from_raw_parts_mut(block.as_ptr().cast::<T>(), self.len)
            },
            None => &mut [],
        }
    }

    /// Return storage to the backend and reset to empty.
    #[cfg_attr(feature = "mem-debug", track_caller)]
    pub fn release(&mut self, ctx: &Context) {
        // SAFETY: as in `reallocate`, the buffer is the block's only owner.
        unsafe { facade::release_at(ctx, &mut self.block, Site::caller().of::<T>()) };
        self.len = 0;
        self.allocated = 0;
    }
}

impl<T: Element> Default for GrowBuf<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Element + fmt::Debug> fmt::Debug for GrowBuf<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GrowBuf")
            .field("kind", &self.kind)
            .field("len", &self.len)
            .field("allocated", &self.allocated)
            .field("items", &self.as_slice())
            .finish()
    }
}
