//! Capacity traces for growable buffers.
//!
//! Replays a sequence of growth targets through the buffer planner without
//! touching memory, or through a real [`GrowBuf`] over the heap backend, and
//! records what capacity each step ends at.

use std::sync::Arc;

use rtmem_core::mem::grow::plan_capacity;
use rtmem_core::{BufKind, Context, GrowBuf, GrowPolicy, HeapBackend};
use serde::{Deserialize, Serialize};

use crate::error::HarnessError;

/// One growth request and its result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrowStep {
    pub target: usize,
    /// Byte capacity after the step.
    pub capacity: usize,
    pub reallocated: bool,
    pub limit_reached: bool,
}

/// A full trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrowTrace {
    pub element_size: usize,
    /// `opaque` for text buffers, `scanned` otherwise.
    pub path: String,
    pub initial_bytes: usize,
    pub maximum_bytes: usize,
    pub steps: Vec<GrowStep>,
}

impl GrowTrace {
    /// Capacities joined by commas, `limit` for refused steps.
    #[must_use]
    pub fn summary(&self) -> String {
        self.steps
            .iter()
            .map(|s| {
                if s.limit_reached {
                    String::from("limit")
                } else {
                    s.capacity.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join(",")
    }

    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
    }
}

fn path_name(text: bool) -> String {
    String::from(if text { "opaque" } else { "scanned" })
}

/// Plan every step without allocating.
pub fn plan_trace(
    policy: &GrowPolicy,
    element_size: usize,
    targets: &[usize],
    text: bool,
) -> Result<GrowTrace, HarnessError> {
    if element_size == 0 {
        return Err(HarnessError::ZeroElementSize);
    }
    policy.validate()?;
    let mut allocated = 0;
    let steps = targets
        .iter()
        .map(|&target| match plan_capacity(policy, allocated, target, element_size) {
            Ok(capacity) => {
                let reallocated = capacity != allocated;
                allocated = capacity;
                GrowStep {
                    target,
                    capacity,
                    reallocated,
                    limit_reached: false,
                }
            }
            Err(_) => GrowStep {
                target,
                capacity: allocated,
                reallocated: false,
                limit_reached: true,
            },
        })
        .collect();
    Ok(GrowTrace {
        element_size,
        path: path_name(text),
        initial_bytes: policy.initial_bytes,
        maximum_bytes: policy.maximum_bytes,
        steps,
    })
}

/// Run every step through a byte buffer on a fresh heap backend.
///
/// Element sizes other than 1 are modelled by scaling the targets, so the
/// byte capacities match [`plan_trace`] for the same policy.
pub fn live_trace(
    policy: &GrowPolicy,
    element_size: usize,
    targets: &[usize],
    text: bool,
) -> Result<GrowTrace, HarnessError> {
    if element_size == 0 {
        return Err(HarnessError::ZeroElementSize);
    }
    let heap = Arc::new(HeapBackend::new());
    let ctx = Context::new(Arc::new(heap.install().with_grow_policy(*policy)))?;
    let kind = if text { BufKind::Text } else { BufKind::Scanned };
    let mut buf = GrowBuf::<u8>::with_kind(kind);
    let mut steps = Vec::with_capacity(targets.len());
    for &target in targets {
        let before = buf.allocated_bytes();
        let outcome = match target.checked_mul(element_size) {
            Some(bytes) if target <= policy.maximum_bytes / element_size => {
                buf.grow_to(&ctx, bytes).is_ok()
            }
            _ => false,
        };
        steps.push(GrowStep {
            target,
            capacity: buf.allocated_bytes(),
            reallocated: buf.allocated_bytes() != before,
            limit_reached: !outcome,
        });
    }
    tracing::debug!(
        target: "rtmem::harness",
        allocations = heap.stats().allocations,
        releases = heap.stats().releases,
        "live grow trace finished"
    );
    buf.release(&ctx);
    Ok(GrowTrace {
        element_size,
        path: path_name(text),
        initial_bytes: policy.initial_bytes,
        maximum_bytes: policy.maximum_bytes,
        steps,
    })
}
