//! Runtime context.
//!
//! The handle threaded through every allocation and rendering call. Cloning a
//! [`Context`] is cheap and yields another handle to the same runtime.

use std::fmt;
use std::sync::{Arc, Weak};

use crate::config::SystemTable;
use crate::error::ConfigError;
use crate::fatal;

struct ContextInner {
    system: Arc<SystemTable>,
    locale: Option<String>,
    recursion_limit: Option<u32>,
    compat_flags: u32,
    random_seed: u32,
}

/// Handle to a runtime configured by a [`SystemTable`].
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

/// Non-owning handle for backends that keep per-block state.
#[derive(Clone, Default)]
pub struct WeakContext {
    inner: Weak<ContextInner>,
}

impl Context {
    /// Build a context over `system`, copying its runtime defaults and drawing
    /// a random seed.
    pub fn new(system: Arc<SystemTable>) -> Result<Self, ConfigError> {
        system.validate()?;
        let defaults = system.defaults.clone();
        let random_seed = (system.random_seed)();
        Ok(Self {
            inner: Arc::new(ContextInner {
                locale: defaults.locale,
                recursion_limit: defaults.recursion_limit,
                compat_flags: defaults.compat_flags,
                random_seed,
                system,
            }),
        })
    }

    #[must_use]
    pub fn system(&self) -> &SystemTable {
        &self.inner.system
    }

    #[must_use]
    pub fn locale(&self) -> Option<&str> {
        self.inner.locale.as_deref()
    }

    #[must_use]
    pub fn recursion_limit(&self) -> Option<u32> {
        self.inner.recursion_limit
    }

    #[must_use]
    pub fn compat_flags(&self) -> u32 {
        self.inner.compat_flags
    }

    #[must_use]
    pub fn random_seed(&self) -> u32 {
        self.inner.random_seed
    }

    #[must_use]
    pub fn downgrade(&self) -> WeakContext {
        WeakContext {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Whether both handles refer to the same runtime.
    #[must_use]
    pub fn same_runtime(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Terminate through the host's abort hook.
    pub fn abort(&self, msg: &str) -> ! {
        let fatal = (self.system().abort)(self, msg);
        fatal::raise(fatal)
    }
}

impl WeakContext {
    #[must_use]
    pub fn upgrade(&self) -> Option<Context> {
        self.inner.upgrade().map(|inner| Context { inner })
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("system", &self.inner.system)
            .field("locale", &self.inner.locale)
            .field("recursion_limit", &self.inner.recursion_limit)
            .field("compat_flags", &self.inner.compat_flags)
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for WeakContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakContext")
            .field("live", &(self.inner.strong_count() > 0))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GrowPolicy, RuntimeDefaults};
    use crate::fatal::{Fatal, guard};

    fn table() -> SystemTable {
        SystemTable::new(|_, _| None, |_, _| {})
    }

    #[test]
    fn context_copies_defaults_and_seed() {
        let system = table()
            .with_random_seed(|| 0xC0FFEE)
            .with_defaults(RuntimeDefaults {
                locale: Some("en_US".into()),
                recursion_limit: Some(500),
                compat_flags: 0b101,
            });
        let ctx = Context::new(Arc::new(system)).unwrap();
        assert_eq!(ctx.random_seed(), 0xC0FFEE);
        assert_eq!(ctx.locale(), Some("en_US"));
        assert_eq!(ctx.recursion_limit(), Some(500));
        assert_eq!(ctx.compat_flags(), 0b101);
    }

    #[test]
    fn context_rejects_invalid_grow_policy() {
        let system = table().with_grow_policy(GrowPolicy {
            initial_bytes: 0,
            maximum_bytes: 16,
        });
        assert_eq!(
            Context::new(Arc::new(system)).unwrap_err(),
            ConfigError::ZeroInitialSize
        );
    }

    #[test]
    fn clones_share_one_runtime() {
        let system = Arc::new(table());
        let a = Context::new(Arc::clone(&system)).unwrap();
        let b = a.clone();
        let c = Context::new(system).unwrap();
        assert!(a.same_runtime(&b));
        assert!(!a.same_runtime(&c));
    }

    #[test]
    fn weak_handle_dies_with_last_context() {
        let ctx = Context::new(Arc::new(table())).unwrap();
        let weak = ctx.downgrade();
        assert!(weak.upgrade().is_some_and(|c| c.same_runtime(&ctx)));
        drop(ctx);
        assert!(weak.upgrade().is_none());
        assert!(WeakContext::default().upgrade().is_none());
    }

    #[test]
    fn abort_goes_through_the_host_hook() {
        fn host_abort(_ctx: &Context, msg: &str) -> Fatal {
            Fatal::Abort(format!("host: {msg}"))
        }
        let ctx = Context::new(Arc::new(table().with_abort(host_abort))).unwrap();
        let out = guard::<()>(|| ctx.abort("stack overflow"));
        assert_eq!(out, Err(Fatal::Abort("host: stack overflow".into())));
    }
}
