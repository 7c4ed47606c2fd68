//! Call-site tracing for the memory layer.
//!
//! Only compiled with the `mem-debug` feature. Every facade and buffer entry
//! point reports a [`TraceEvent`] here when the process-wide flag is on. The
//! flag starts out unresolved and is read from `RTMEM_MEM_DEBUG` on first use;
//! [`set_enabled`] overrides it.
//!
//! Events go to the installed [`TraceSink`], or to [`TracingSink`] when none is
//! installed.

use std::fmt;
use std::panic::Location;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};

/// Environment variable consulted on first use.
pub const ENV_FLAG: &str = "RTMEM_MEM_DEBUG";

const FLAG_UNRESOLVED: u8 = 0;
const FLAG_OFF: u8 = 1;
const FLAG_ON: u8 = 2;

static FLAG: AtomicU8 = AtomicU8::new(FLAG_UNRESOLVED);
static NEXT_SEQ: AtomicU64 = AtomicU64::new(1);
static SINK: RwLock<Option<Arc<dyn TraceSink>>> = parking_lot::const_rwlock(None);

/// Which facade path served an allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocPath {
    Scanned,
    Opaque,
    Finalized,
}

/// A traced memory operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceOp {
    Allocate {
        path: AllocPath,
        size: usize,
        block: Option<usize>,
    },
    Release {
        block: Option<usize>,
    },
    Grow {
        old_len: usize,
        new_len: usize,
    },
    Reallocate {
        from: Option<usize>,
        to: usize,
        len: usize,
        old_capacity: usize,
        new_capacity: usize,
        text: bool,
    },
    Collect,
}

/// One traced operation with its call site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEvent {
    /// Process-wide monotonic sequence number.
    pub seq: u64,
    pub op: TraceOp,
    pub file: &'static str,
    pub line: u32,
    /// Type or purpose of the memory, empty when unknown.
    pub label: &'static str,
}

/// Destination for trace events.
pub trait TraceSink: Send + Sync {
    fn record(&self, event: &TraceEvent);
}

/// Forwards events to `tracing` at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl TraceSink for TracingSink {
    fn record(&self, event: &TraceEvent) {
        tracing::debug!(
            target: "rtmem::mem",
            seq = event.seq,
            file = event.file,
            line = event.line,
            label = event.label,
            "{}",
            event.op
        );
    }
}

/// Keeps events in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<TraceEvent>>,
}

impl RecordingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn events(&self) -> Vec<TraceEvent> {
        self.events.lock().clone()
    }

    pub fn drain(&self) -> Vec<TraceEvent> {
        std::mem::take(&mut *self.events.lock())
    }
}

impl TraceSink for RecordingSink {
    fn record(&self, event: &TraceEvent) {
        self.events.lock().push(event.clone());
    }
}

fn fmt_block(f: &mut fmt::Formatter<'_>, block: Option<usize>) -> fmt::Result {
    match block {
        Some(addr) => write!(f, "{addr:#x}"),
        None => f.write_str("null"),
    }
}

impl fmt::Display for TraceOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Allocate { path, size, block } => {
                let name = match path {
                    AllocPath::Scanned => "malloc",
                    AllocPath::Opaque => "malloc_string",
                    AllocPath::Finalized => "malloc_finalize",
                };
                write!(f, "{name} {size} -> ")?;
                fmt_block(f, block)
            }
            Self::Release { block } => {
                f.write_str("free ")?;
                fmt_block(f, block)
            }
            Self::Grow { old_len, new_len } => write!(f, "grow {old_len}->{new_len}"),
            Self::Reallocate {
                from,
                to,
                len,
                old_capacity,
                new_capacity,
                text,
            } => {
                f.write_str("grow from ")?;
                fmt_block(f, from)?;
                write!(f, "/{old_capacity} -> {to:#x}/{len}/{new_capacity}")?;
                if text {
                    f.write_str(" [string]")?;
                }
                Ok(())
            }
            Self::Collect => f.write_str("gcollect"),
        }
    }
}

/// Parse an on/off flag value.
#[must_use]
pub fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "on" | "true" | "yes" | "enabled"
    )
}

/// Whether tracing is on. Resolves the environment flag on first call.
#[must_use]
pub fn enabled() -> bool {
    match FLAG.load(Ordering::Relaxed) {
        FLAG_ON => true,
        FLAG_OFF => false,
        _ => resolve_from_env(),
    }
}

fn resolve_from_env() -> bool {
    let on = std::env::var(ENV_FLAG).is_ok_and(|v| parse_flag(&v));
    let value = if on { FLAG_ON } else { FLAG_OFF };
    // A concurrent set_enabled wins over the environment.
    let _ = FLAG.compare_exchange(FLAG_UNRESOLVED, value, Ordering::AcqRel, Ordering::Acquire);
    FLAG.load(Ordering::Acquire) == FLAG_ON
}

/// Turn tracing on or off, returning the previous setting.
pub fn set_enabled(on: bool) -> bool {
    let value = if on { FLAG_ON } else { FLAG_OFF };
    FLAG.swap(value, Ordering::AcqRel) == FLAG_ON
}

/// Route events to `sink`, returning the previously installed sink.
pub fn install_sink(sink: Arc<dyn TraceSink>) -> Option<Arc<dyn TraceSink>> {
    SINK.write().replace(sink)
}

/// Restore the default [`TracingSink`] routing.
pub fn clear_sink() -> Option<Arc<dyn TraceSink>> {
    SINK.write().take()
}

pub(crate) fn emit(site: &'static Location<'static>, label: &'static str, op: TraceOp) {
    if !enabled() {
        return;
    }
    let event = TraceEvent {
        seq: NEXT_SEQ.fetch_add(1, Ordering::Relaxed),
        op,
        file: site.file(),
        line: site.line(),
        label,
    };
    let sink = SINK.read().clone();
    match sink {
        Some(sink) => sink.record(&event),
        None => TracingSink.record(&event),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn flag_parser_accepts_common_spellings() {
        for on in ["1", "on", "TRUE", "yes", " enabled "] {
            assert!(parse_flag(on), "{on:?} should enable");
        }
        for off in ["0", "off", "false", "", "bogus"] {
            assert!(!parse_flag(off), "{off:?} should disable");
        }
    }

    #[test]
    fn ops_render_like_debug_lines() {
        let alloc = TraceOp::Allocate {
            path: AllocPath::Opaque,
            size: 24,
            block: Some(0x1000),
        };
        assert_eq!(alloc.to_string(), "malloc_string 24 -> 0x1000");
        assert_eq!(TraceOp::Release { block: None }.to_string(), "free null");
        assert_eq!(
            TraceOp::Grow {
                old_len: 3,
                new_len: 9
            }
            .to_string(),
            "grow 3->9"
        );
        let realloc = TraceOp::Reallocate {
            from: None,
            to: 0x2000,
            len: 9,
            old_capacity: 0,
            new_capacity: 1024,
            text: true,
        };
        assert_eq!(realloc.to_string(), "grow from null/0 -> 0x2000/9/1024 [string]");
        assert_eq!(TraceOp::Collect.to_string(), "gcollect");
    }

    #[test]
    #[serial(mem_trace)]
    fn emit_respects_flag_and_sink() {
        let sink = Arc::new(RecordingSink::new());
        let previous_sink = install_sink(sink.clone());
        let previous_flag = set_enabled(false);

        emit(Location::caller(), "trace-off", TraceOp::Collect);
        assert!(sink.events().iter().all(|e| e.label != "trace-off"));

        set_enabled(true);
        let site = Location::caller();
        emit(site, "trace-on", TraceOp::Collect);
        let events: Vec<_> = sink
            .drain()
            .into_iter()
            .filter(|e| e.label == "trace-on")
            .collect();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].op, TraceOp::Collect);
        assert_eq!(events[0].file, site.file());
        assert_eq!(events[0].line, site.line());
        assert!(events[0].seq > 0);

        set_enabled(previous_flag);
        match previous_sink {
            Some(s) => {
                install_sink(s);
            }
            None => {
                clear_sink();
            }
        }
    }

    #[test]
    #[serial(mem_trace)]
    fn sequence_numbers_increase() {
        let sink = Arc::new(RecordingSink::new());
        let previous_sink = install_sink(sink.clone());
        let previous_flag = set_enabled(true);

        emit(Location::caller(), "trace-seq", TraceOp::Collect);
        emit(Location::caller(), "trace-seq", TraceOp::Collect);
        let events: Vec<_> = sink
            .drain()
            .into_iter()
            .filter(|e| e.label == "trace-seq")
            .collect();
        assert_eq!(events.len(), 2);
        assert!(events[0].seq < events[1].seq);

        set_enabled(previous_flag);
        match previous_sink {
            Some(s) => {
                install_sink(s);
            }
            None => {
                clear_sink();
            }
        }
    }
}
