//! Reference heap backend.
//!
//! A non-collecting backend over the Rust global allocator. Nothing is ever
//! proven unreachable here, so blocks live until they are released through
//! the facade or reclaimed with [`HeapBackend::reclaim`]. Dropping the
//! backend leaks whatever is still live: strings and buffers may outlive it.
//! Finalizers registered through `malloc_finalize` run at
//! [`HeapBackend::shutdown`]; an explicit release drops the binding without
//! running it.

#![allow(unsafe_code)]

use std::alloc::{self, Layout};
use std::collections::HashMap;
use std::ptr::NonNull;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::{Finalizer, SystemTable};
use crate::context::Context;
use crate::mem::block::{BLOCK_ALIGN, Block};

/// Counters kept by the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeapStats {
    /// Successful allocations of any kind.
    pub allocations: u64,
    /// Of those, served through `malloc_string`.
    pub opaque_allocations: u64,
    /// Of those, served through `malloc_finalize`.
    pub finalized_allocations: u64,
    /// Blocks returned through `free`.
    pub releases: u64,
    /// `free` calls naming a block this backend does not own.
    pub unknown_releases: u64,
    /// Finalizers run at shutdown.
    pub finalizers_run: u64,
    /// Requests refused by the byte limit.
    pub refusals: u64,
}

#[derive(Default)]
struct HeapState {
    /// Live blocks (address -> layout).
    live: HashMap<usize, Layout>,
    /// Pending finalizers (address -> binding).
    finalizers: HashMap<usize, Finalizer>,
    live_bytes: usize,
    stats: HeapStats,
}

/// Global-allocator backed [`SystemTable`] provider.
pub struct HeapBackend {
    state: Mutex<HeapState>,
    /// Ceiling on live bytes; requests past it report exhaustion.
    limit: Option<usize>,
}

impl HeapBackend {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(HeapState::default()),
            limit: None,
        }
    }

    /// Backend that refuses requests once `limit` live bytes are outstanding.
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            state: Mutex::new(HeapState::default()),
            limit: Some(limit),
        }
    }

    /// A system table whose hooks all route to this backend.
    #[must_use]
    pub fn install(self: &Arc<Self>) -> SystemTable {
        let scanned = Arc::clone(self);
        let opaque = Arc::clone(self);
        let finalized = Arc::clone(self);
        let freeing = Arc::clone(self);
        SystemTable::new(
            move |_ctx, size| scanned.allocate(size, true),
            // SAFETY: the facade calls `free` only from `release`, whose
            // caller guarantees the block has no other live handle.
            move |_ctx, block| unsafe { freeing.free(block) },
        )
        .with_malloc_string(move |_ctx, size| opaque.allocate_opaque(size))
        .with_malloc_finalize(move |_ctx, size, fin| finalized.allocate_finalized(size, fin))
    }

    /// Allocate `size` bytes, zeroed when `zeroed` is set.
    pub fn allocate(&self, size: usize, zeroed: bool) -> Option<Block> {
        let mut state = self.state.lock();
        self.allocate_locked(&mut state, size, zeroed)
    }

    /// Allocate without zeroing, counted as an opaque request.
    pub fn allocate_opaque(&self, size: usize) -> Option<Block> {
        let mut state = self.state.lock();
        let block = self.allocate_locked(&mut state, size, false)?;
        state.stats.opaque_allocations += 1;
        Some(block)
    }

    /// Allocate zeroed memory and bind `finalizer` to it under one lock.
    pub fn allocate_finalized(&self, size: usize, finalizer: Finalizer) -> Option<Block> {
        let mut state = self.state.lock();
        let block = self.allocate_locked(&mut state, size, true)?;
        state.finalizers.insert(block.addr(), finalizer);
        state.stats.finalized_allocations += 1;
        Some(block)
    }

    fn allocate_locked(&self, state: &mut HeapState, size: usize, zeroed: bool) -> Option<Block> {
        let size = size.max(1);
        let over = self
            .limit
            .filter(|&limit| state.live_bytes.saturating_add(size) > limit);
        if let Some(limit) = over {
            state.stats.refusals += 1;
            tracing::warn!(
                target: "rtmem::heap",
                size,
                live_bytes = state.live_bytes,
                limit,
                "allocation refused by heap limit"
            );
            return None;
        }
        let layout = Layout::from_size_align(size, BLOCK_ALIGN).ok()?;
        // SAFETY: layout has non-zero size.
        let raw = unsafe {
            if zeroed {
                alloc::alloc_zeroed(layout)
            } else {
                alloc::alloc(layout)
            }
        };
        let ptr = NonNull::new(raw)?;
        // SAFETY: freshly allocated with BLOCK_ALIGN and `size` bytes; stays
        // valid until `free` or drop deallocates it.
        let block = unsafe { Block::from_raw_parts(ptr, size) };
        state.live.insert(block.addr(), layout);
        state.live_bytes += size;
        state.stats.allocations += 1;
        Some(block)
    }

    /// Return `block` to the global allocator. Unknown blocks are logged and
    /// counted, never deallocated.
    ///
    /// # Safety
    ///
    /// No handle to `block` may be used afterwards. See
    /// [`release`](crate::mem::release).
    ///
    /// ```compile_fail
    /// # use rtmem_core::HeapBackend;
    /// let heap = HeapBackend::new();
    /// let block = heap.allocate(8, true).unwrap();
    /// heap.free(block);
    /// ```
    pub unsafe fn free(&self, block: Block) {
        let mut state = self.state.lock();
        let Some(layout) = state.live.remove(&block.addr()) else {
            state.stats.unknown_releases += 1;
            tracing::warn!(
                target: "rtmem::heap",
                addr = block.addr(),
                "release of block not owned by this heap"
            );
            return;
        };
        state.finalizers.remove(&block.addr());
        state.live_bytes -= layout.size();
        state.stats.releases += 1;
        // SAFETY: the block was allocated by this backend with `layout` and
        // has just been removed from the live table.
        unsafe { alloc::dealloc(block.as_ptr(), layout) };
    }

    /// Run every pending finalizer. The blocks themselves stay live until
    /// released or reclaimed.
    pub fn shutdown(&self, ctx: &Context) -> usize {
        let pending: Vec<(usize, Finalizer, Layout)> = {
            let mut state = self.state.lock();
            let drained: Vec<_> = state.finalizers.drain().collect();
            drained
                .into_iter()
                .filter_map(|(addr, fin)| state.live.get(&addr).map(|l| (addr, fin, *l)))
                .collect()
        };
        let ran = pending.len();
        for (addr, fin, layout) in pending {
            let Some(ptr) = NonNull::new(addr as *mut u8) else {
                continue;
            };
            // SAFETY: the address came from the live table, which still owns it.
            let block = unsafe { Block::from_raw_parts(ptr, layout.size()) };
            fin.run(ctx, block);
        }
        self.state.lock().stats.finalizers_run += ran as u64;
        ran
    }

    /// Deallocate every live block and drop pending finalizers. Returns the
    /// number of blocks freed.
    ///
    /// # Safety
    ///
    /// No handle into this backend may be used afterwards: no [`Block`],
    /// [`RtString`](crate::RtString) or [`GrowBuf`](crate::GrowBuf) that
    /// came from it.
    pub unsafe fn reclaim(&self) -> usize {
        let mut state = self.state.lock();
        state.finalizers.clear();
        state.live_bytes = 0;
        let live: Vec<(usize, Layout)> = state.live.drain().collect();
        state.stats.releases += live.len() as u64;
        for &(addr, layout) in &live {
            // SAFETY: every live entry was allocated here with its layout, and
            // the caller guarantees nothing refers to it any more.
            unsafe { alloc::dealloc(addr as *mut u8, layout) };
        }
        live.len()
    }

    #[must_use]
    pub fn live_blocks(&self) -> usize {
        self.state.lock().live.len()
    }

    #[must_use]
    pub fn live_bytes(&self) -> usize {
        self.state.lock().live_bytes
    }

    #[must_use]
    pub fn stats(&self) -> HeapStats {
        self.state.lock().stats
    }

    #[must_use]
    pub fn is_live(&self, block: Block) -> bool {
        self.state.lock().live.contains_key(&block.addr())
    }

    #[must_use]
    pub fn pending_finalizers(&self) -> usize {
        self.state.lock().finalizers.len()
    }
}

impl Default for HeapBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for HeapBackend {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if !state.live.is_empty() {
            tracing::debug!(
                target: "rtmem::heap",
                blocks = state.live.len(),
                bytes = state.live_bytes,
                "heap dropped with live blocks; leaking them"
            );
        }
    }
}

impl std::fmt::Debug for HeapBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("HeapBackend")
            .field("live_blocks", &state.live.len())
            .field("live_bytes", &state.live_bytes)
            .field("limit", &self.limit)
            .field("stats", &state.stats)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn allocations_are_aligned_and_tracked() {
        let heap = HeapBackend::new();
        let a = heap.allocate(24, true).unwrap();
        let b = heap.allocate_opaque(7).unwrap();
        assert_eq!(a.addr() % BLOCK_ALIGN, 0);
        assert_eq!(b.addr() % BLOCK_ALIGN, 0);
        assert_eq!(heap.live_blocks(), 2);
        assert_eq!(heap.live_bytes(), 31);
        assert_eq!(heap.stats().opaque_allocations, 1);

        // SAFETY: `a` is not used again except as an address.
        unsafe { heap.free(a) };
        assert!(!heap.is_live(a));
        assert!(heap.is_live(b));
        assert_eq!(heap.live_bytes(), 7);
    }

    #[test]
    fn zeroed_allocation_reads_zero() {
        let heap = HeapBackend::new();
        let block = heap.allocate(64, true).unwrap();
        // SAFETY: 64 live bytes owned by `heap`.
        let bytes = unsafe { std::slice::from_raw_parts(block.as_ptr(), 64) };
        assert!(bytes.iter().all(|&b| b == 0));
    }

    #[test]
    fn unknown_release_is_counted_not_freed() {
        let heap = HeapBackend::new();
        let other = HeapBackend::new();
        let block = other.allocate(16, false).unwrap();
        // SAFETY: `heap` does not own `block`, so nothing is freed.
        unsafe { heap.free(block) };
        assert_eq!(heap.stats().unknown_releases, 1);
        assert!(other.is_live(block));
    }

    #[test]
    fn limit_refuses_past_ceiling() {
        let heap = HeapBackend::with_limit(100);
        assert!(heap.allocate(60, false).is_some());
        assert!(heap.allocate(60, false).is_none());
        assert_eq!(heap.stats().refusals, 1);
        assert!(heap.allocate(40, false).is_some());
    }

    #[test]
    fn shutdown_runs_only_unreleased_finalizers() {
        static RUNS: AtomicUsize = AtomicUsize::new(0);
        fn count(_ctx: &Context, _block: Block, closure: &crate::Closure) {
            let step = closure.downcast_ref::<usize>().copied().unwrap_or(0);
            RUNS.fetch_add(step, Ordering::SeqCst);
        }

        let heap = Arc::new(HeapBackend::new());
        let ctx = Context::new(Arc::new(heap.install())).unwrap();
        let closure: crate::Closure = Arc::new(5_usize);
        let kept = heap
            .allocate_finalized(8, Finalizer::new(count, Arc::clone(&closure)))
            .unwrap();
        let dropped = heap
            .allocate_finalized(8, Finalizer::new(count, Arc::clone(&closure)))
            .unwrap();
        assert_eq!(heap.pending_finalizers(), 2);

        // SAFETY: `dropped` is not used again.
        unsafe { heap.free(dropped) };
        assert_eq!(heap.pending_finalizers(), 1);
        assert_eq!(heap.shutdown(&ctx), 1);
        assert_eq!(RUNS.load(Ordering::SeqCst), 5);
        assert_eq!(heap.stats().finalizers_run, 1);
        assert!(heap.is_live(kept));
        assert_eq!(heap.shutdown(&ctx), 0);
    }

    #[test]
    fn reclaim_frees_everything_still_live() {
        fn noop(_ctx: &Context, _block: Block, _closure: &crate::Closure) {}
        let heap = HeapBackend::new();
        let a = heap.allocate(32, true).unwrap();
        heap.allocate_opaque(5).unwrap();
        heap.allocate_finalized(8, Finalizer::new(noop, Arc::new(()))).unwrap();
        // SAFETY: no block from `heap` is read after this point.
        assert_eq!(unsafe { heap.reclaim() }, 3);
        assert_eq!(heap.live_blocks(), 0);
        assert_eq!(heap.live_bytes(), 0);
        assert_eq!(heap.pending_finalizers(), 0);
        assert!(!heap.is_live(a));
    }

    #[test]
    fn strings_outlive_a_dropped_backend() {
        let s = {
            let heap = Arc::new(HeapBackend::new());
            let ctx = Context::new(Arc::new(heap.install())).unwrap();
            crate::rt_format!(&ctx, "%s", "hello")
        };
        assert_eq!(s, "hello");
    }
}
