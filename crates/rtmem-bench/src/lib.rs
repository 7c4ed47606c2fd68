//! Shared setup for rtmem benchmarks.

use std::sync::Arc;

use rtmem_core::{Context, GrowPolicy, HeapBackend};

/// A context over a fresh heap backend with the given growth policy.
pub fn heap_context(policy: GrowPolicy) -> (Arc<HeapBackend>, Context) {
    let heap = Arc::new(HeapBackend::new());
    let system = heap.install().with_grow_policy(policy);
    match Context::new(Arc::new(system)) {
        Ok(ctx) => (heap, ctx),
        Err(err) => panic!("benchmark policy rejected: {err}"),
    }
}
