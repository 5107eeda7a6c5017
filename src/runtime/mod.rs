//! Runtime - the scheduler, DOM and configuration shared by a component tree.
//!
//! Everything is `Rc`-based and single-threaded. A `Runtime` is cheap to
//! clone; clones share state. Tests build one per case instead of resetting
//! globals.
//!
//! # Example
//!
//! ```ignore
//! use spark_dom::{Component, ComponentOptions, Runtime};
//!
//! let rt = Runtime::new();
//! let root = rt.dom().create_element("main");
//! let counter = Component::new(&rt, Rc::new(Counter), ComponentOptions {
//!     target: Some(root),
//!     ..Default::default()
//! })?;
//!
//! counter.set(0, json!(5));
//! rt.run_microtasks(); // one flush, one patch
//! ```

pub mod context;
pub mod dirty;
pub mod lifecycle;
pub mod scheduler;

use std::cell::Cell;
use std::rc::Rc;

use crate::config::RuntimeConfig;
use crate::dom::Dom;

pub use context::Context;
pub use dirty::{make_dirty, DirtyMask, BITS_PER_WORD};
pub use lifecycle::{
    after_update, before_update, create_event_dispatcher, get_context, has_context, on_destroy,
    on_mount, set_context,
};
pub use scheduler::{FlushStats, Scheduler};

/// One-shot teardown, returned by subscriptions and run by destroy paths.
pub type Cleanup = Box<dyn FnOnce()>;

/// Repeatable callback. `Rc` identity is what the flush dedupes on.
pub type Hook = Rc<dyn Fn()>;

// =============================================================================
// Runtime
// =============================================================================

struct RuntimeInner {
    scheduler: Scheduler,
    dom: Dom,
    config: RuntimeConfig,
    next_component_id: Cell<u64>,
}

/// Shared handle to a scheduler, a DOM and a configuration.
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    /// Runtime with default configuration.
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    /// Runtime with explicit configuration.
    pub fn with_config(config: RuntimeConfig) -> Self {
        tracing::debug!(?config, "runtime created");
        Self {
            inner: Rc::new(RuntimeInner {
                scheduler: Scheduler::new(),
                dom: Dom::with_recording(config.record_mutations),
                config,
                next_component_id: Cell::new(1),
            }),
        }
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.inner.scheduler
    }

    pub fn dom(&self) -> &Dom {
        &self.inner.dom
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    /// Drain the microtask queue (the host's end of turn).
    pub fn run_microtasks(&self) -> usize {
        self.inner.scheduler.run_microtasks()
    }

    /// Flush now, without waiting for the microtask boundary.
    pub fn flush(&self) {
        self.inner.scheduler.flush();
    }

    /// Apply all pending changes before returning.
    pub fn tick(&self) {
        self.inner.scheduler.tick();
    }

    pub(crate) fn next_component_id(&self) -> u64 {
        let id = self.inner.next_component_id.get();
        self.inner.next_component_id.set(id + 1);
        id
    }

    /// Whether two handles share state.
    pub fn ptr_eq(&self, other: &Runtime) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.inner.config)
            .field("stats", &self.inner.scheduler.stats())
            .finish()
    }
}
