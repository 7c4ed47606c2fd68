//! System configuration.
//!
//! A [`SystemTable`] describes the host allocator and the fatal-condition
//! hooks. It is built once, wrapped in an `Arc`, and handed to every
//! [`Context`] that should use it. Nothing in this crate reads allocator state
//! from a global.
//!
//! Required hooks (`malloc`, `free`, `mem_exhausted`, `abort`,
//! `random_seed`) are constructor arguments or defaults and always present.
//! `malloc_string`, `malloc_finalize` and `gcollect` are optional
//! capabilities, installed with the `with_*` builders.

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::context::Context;
use crate::error::ConfigError;
use crate::fatal::Fatal;
use crate::mem::block::Block;

/// Allocates `size` bytes, or returns `None` when the backend is exhausted.
pub type MallocHook = Arc<dyn Fn(&Context, usize) -> Option<Block> + Send + Sync>;
/// Allocates `size` bytes with a finalizer bound to the result.
pub type MallocFinalizeHook =
    Arc<dyn Fn(&Context, usize, Finalizer) -> Option<Block> + Send + Sync>;
/// Returns a block the caller proved unreachable.
pub type FreeHook = Arc<dyn Fn(&Context, Block) + Send + Sync>;
/// Runs an out-of-band collection.
pub type CollectHook = Arc<dyn Fn(&Context) + Send + Sync>;
/// Describes why allocation failed; the facade diverges with the result.
pub type ExhaustedHook = fn(&Context) -> Fatal;
/// Describes an abort; the caller diverges with the result.
pub type AbortHook = fn(&Context, &str) -> Fatal;
/// Seeds the runtime's random source.
pub type SeedHook = fn() -> u32;

/// Data handed back to a finalizer. The registrant keeps its own clone.
pub type Closure = Arc<dyn Any + Send + Sync>;
/// Finalizer entry point: `(context, block, closure)`.
pub type FinalizeFn = fn(&Context, Block, &Closure);

/// A finalizer bound to a block at allocation time.
#[derive(Clone)]
pub struct Finalizer {
    func: FinalizeFn,
    closure: Closure,
}

impl Finalizer {
    #[must_use]
    pub fn new(func: FinalizeFn, closure: Closure) -> Self {
        Self { func, closure }
    }

    /// The registrant's closure data.
    #[must_use]
    pub fn closure(&self) -> &Closure {
        &self.closure
    }

    /// Invoke the finalizer for `block`. Called by backends once `block` is
    /// unreachable.
    pub fn run(self, ctx: &Context, block: Block) {
        (self.func)(ctx, block, &self.closure);
    }
}

impl fmt::Debug for Finalizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Finalizer")
            .field("func", &(self.func as *const ()))
            .finish_non_exhaustive()
    }
}

/// Sizing rules for growable buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrowPolicy {
    /// First allocation, in bytes, for an empty buffer.
    pub initial_bytes: usize,
    /// Hard ceiling, in bytes. Slightly below the 32-bit segment limit to
    /// leave room for allocator overhead.
    pub maximum_bytes: usize,
}

impl GrowPolicy {
    pub const INITIAL_BYTES: usize = 1024;
    pub const MAXIMUM_BYTES: usize = u32::MAX as usize - 128;

    pub const DEFAULT: Self = Self {
        initial_bytes: Self::INITIAL_BYTES,
        maximum_bytes: Self::MAXIMUM_BYTES,
    };

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_bytes == 0 {
            return Err(ConfigError::ZeroInitialSize);
        }
        if self.initial_bytes > self.maximum_bytes {
            return Err(ConfigError::InitialExceedsMaximum {
                initial_bytes: self.initial_bytes,
                maximum_bytes: self.maximum_bytes,
            });
        }
        Ok(())
    }
}

impl Default for GrowPolicy {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Per-context defaults copied into each new [`Context`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeDefaults {
    /// Locale name, if the host wants one. `None` means the C locale.
    pub locale: Option<String>,
    /// Maximum evaluator recursion depth. `None` means unlimited.
    pub recursion_limit: Option<u32>,
    /// Host compatibility flags, opaque to this crate.
    pub compat_flags: u32,
}

/// The host allocator and fatal-condition hooks.
///
/// Hooks are only reachable through the facade, so `free` runs solely on
/// behalf of an `unsafe` release.
///
/// ```compile_fail
/// # use std::sync::Arc;
/// # use rtmem_core::{Context, HeapBackend};
/// let heap = Arc::new(HeapBackend::new());
/// let ctx = Context::new(Arc::new(heap.install())).unwrap();
/// let s = rtmem_core::render_format(&ctx, "%s", &["hello".into()]);
/// (ctx.system().free)(&ctx, s.block().unwrap());
/// ```
#[derive(Clone)]
pub struct SystemTable {
    pub(crate) malloc: MallocHook,
    pub(crate) malloc_string: Option<MallocHook>,
    pub(crate) malloc_finalize: Option<MallocFinalizeHook>,
    pub(crate) free: FreeHook,
    pub(crate) gcollect: Option<CollectHook>,
    pub(crate) mem_exhausted: ExhaustedHook,
    pub(crate) abort: AbortHook,
    pub(crate) random_seed: SeedHook,
    pub grow: GrowPolicy,
    pub defaults: RuntimeDefaults,
}

impl SystemTable {
    /// Table with the two mandatory allocator hooks; everything else defaults.
    pub fn new(
        malloc: impl Fn(&Context, usize) -> Option<Block> + Send + Sync + 'static,
        free: impl Fn(&Context, Block) + Send + Sync + 'static,
    ) -> Self {
        Self {
            malloc: Arc::new(malloc),
            malloc_string: None,
            malloc_finalize: None,
            free: Arc::new(free),
            gcollect: None,
            mem_exhausted: default_mem_exhausted,
            abort: default_abort,
            random_seed: default_random_seed,
            grow: GrowPolicy::DEFAULT,
            defaults: RuntimeDefaults::default(),
        }
    }

    #[must_use]
    pub fn with_malloc_string(
        mut self,
        hook: impl Fn(&Context, usize) -> Option<Block> + Send + Sync + 'static,
    ) -> Self {
        self.malloc_string = Some(Arc::new(hook));
        self
    }

    #[must_use]
    pub fn with_malloc_finalize(
        mut self,
        hook: impl Fn(&Context, usize, Finalizer) -> Option<Block> + Send + Sync + 'static,
    ) -> Self {
        self.malloc_finalize = Some(Arc::new(hook));
        self
    }

    #[must_use]
    pub fn with_gcollect(mut self, hook: impl Fn(&Context) + Send + Sync + 'static) -> Self {
        self.gcollect = Some(Arc::new(hook));
        self
    }

    #[must_use]
    pub fn with_mem_exhausted(mut self, hook: ExhaustedHook) -> Self {
        self.mem_exhausted = hook;
        self
    }

    #[must_use]
    pub fn with_abort(mut self, hook: AbortHook) -> Self {
        self.abort = hook;
        self
    }

    #[must_use]
    pub fn with_random_seed(mut self, hook: SeedHook) -> Self {
        self.random_seed = hook;
        self
    }

    #[must_use]
    pub fn with_grow_policy(mut self, grow: GrowPolicy) -> Self {
        self.grow = grow;
        self
    }

    #[must_use]
    pub fn with_defaults(mut self, defaults: RuntimeDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.grow.validate()
    }

    #[must_use]
    pub fn has_malloc_string(&self) -> bool {
        self.malloc_string.is_some()
    }

    #[must_use]
    pub fn has_malloc_finalize(&self) -> bool {
        self.malloc_finalize.is_some()
    }

    #[must_use]
    pub fn has_gcollect(&self) -> bool {
        self.gcollect.is_some()
    }
}

impl fmt::Debug for SystemTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemTable")
            .field("malloc_string", &self.malloc_string.is_some())
            .field("malloc_finalize", &self.malloc_finalize.is_some())
            .field("gcollect", &self.gcollect.is_some())
            .field("grow", &self.grow)
            .field("defaults", &self.defaults)
            .finish_non_exhaustive()
    }
}

fn default_mem_exhausted(_ctx: &Context) -> Fatal {
    Fatal::MemoryExhausted
}

fn default_abort(_ctx: &Context, msg: &str) -> Fatal {
    Fatal::Abort(msg.to_owned())
}

fn default_random_seed() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos() ^ (d.as_secs() as u32))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> SystemTable {
        SystemTable::new(|_, _| None, |_, _| {})
    }

    #[test]
    fn default_grow_policy_matches_constants() {
        let policy = GrowPolicy::default();
        assert_eq!(policy.initial_bytes, 1024);
        assert_eq!(policy.maximum_bytes, u32::MAX as usize - 128);
        assert_eq!(policy.validate(), Ok(()));
    }

    #[test]
    fn grow_policy_rejects_zero_and_inverted_sizes() {
        let zero = GrowPolicy {
            initial_bytes: 0,
            maximum_bytes: 64,
        };
        assert_eq!(zero.validate(), Err(ConfigError::ZeroInitialSize));

        let inverted = GrowPolicy {
            initial_bytes: 128,
            maximum_bytes: 64,
        };
        assert_eq!(
            inverted.validate(),
            Err(ConfigError::InitialExceedsMaximum {
                initial_bytes: 128,
                maximum_bytes: 64
            })
        );
    }

    #[test]
    fn new_table_has_no_optional_capabilities() {
        let t = table();
        assert!(t.malloc_string.is_none());
        assert!(t.malloc_finalize.is_none());
        assert!(t.gcollect.is_none());
        assert_eq!(t.grow, GrowPolicy::DEFAULT);
        assert_eq!(t.defaults, RuntimeDefaults::default());
    }

    #[test]
    fn builders_install_optional_hooks() {
        let t = table()
            .with_malloc_string(|_, _| None)
            .with_malloc_finalize(|_, _, _| None)
            .with_gcollect(|_| {})
            .with_random_seed(|| 42);
        assert!(t.has_malloc_string());
        assert!(t.has_malloc_finalize());
        assert!(t.has_gcollect());
        assert_eq!((t.random_seed)(), 42);
    }

    #[test]
    fn debug_output_reports_capabilities() {
        let rendered = format!("{:?}", table().with_gcollect(|_| {}));
        assert!(rendered.contains("gcollect: true"));
        assert!(rendered.contains("malloc_string: false"));
    }
}
