//! Update Scheduler - coalesces a tick's mutations into one flush.
//!
//! # Deferral
//!
//! `schedule_flush()` queues one flush on the scheduler's microtask queue.
//! The host drains that queue at the end of its synchronous turn with
//! [`Scheduler::run_microtasks`]; every mutation made before then lands in
//! the same flush.
//!
//! # Flush phases
//!
//! ```text
//! loop {
//!     a. update dirty components in enqueue order      (parents first)
//!     b. pop bind-this callbacks                       (children first)
//!     c. run after-update callbacks, each once/flush   (parents first)
//! } while components, bind or after-update callbacks are pending
//! drain flush-complete callbacks (reverse order)
//! ```
//!
//! A `flush()` issued while one is running returns immediately; the running
//! loop re-checks its queue, so nothing recurses and stack depth stays flat
//! however many rounds after-update work triggers.

use std::cell::{Cell, RefCell};
use std::collections::{HashSet, VecDeque};
use std::rc::Rc;

use crate::component::Component;
use crate::error::{Result, RuntimeError};

use super::{Cleanup, Hook};

// =============================================================================
// State
// =============================================================================

/// Counters describing scheduler activity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FlushStats {
    /// Flushes that ran (reentrant and empty calls excluded).
    pub flushes: u64,
    /// Outer loop iterations across all flushes.
    pub rounds: u64,
    /// Component updates applied.
    pub updates: u64,
}

#[derive(Default)]
struct PendingQueues {
    dirty_components: Vec<Component>,
    binding_callbacks: Vec<Cleanup>,
    render_callbacks: Vec<Hook>,
    flush_callbacks: Vec<Cleanup>,
    seen_callbacks: HashSet<usize>,
}

impl PendingQueues {
    /// Work that phases a to c still have to pick up.
    fn has_round_work(&self) -> bool {
        !self.dirty_components.is_empty()
            || !self.binding_callbacks.is_empty()
            || !self.render_callbacks.is_empty()
    }

    fn is_idle(&self) -> bool {
        self.dirty_components.is_empty()
            && self.binding_callbacks.is_empty()
            && self.render_callbacks.is_empty()
            && self.flush_callbacks.is_empty()
    }
}

#[derive(Default)]
struct SchedulerInner {
    queues: RefCell<PendingQueues>,
    update_scheduled: Cell<bool>,
    flushing: Cell<bool>,
    current: RefCell<Option<Component>>,
    microtasks: RefCell<VecDeque<Cleanup>>,
    stats: Cell<FlushStats>,
}

/// Owner of the pending queues and the active-component context.
///
/// Cloning shares the scheduler. Each [`Runtime`](super::Runtime) owns one;
/// tests build as many isolated schedulers as they like.
#[derive(Clone, Default)]
pub struct Scheduler {
    inner: Rc<SchedulerInner>,
}

fn hook_id(hook: &Hook) -> usize {
    Rc::as_ptr(hook) as *const () as usize
}

impl Scheduler {
    /// Create an idle scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    // -------------------------------------------------------------------------
    // Microtasks
    // -------------------------------------------------------------------------

    /// Defer `task` to the end of the current synchronous turn.
    pub fn queue_microtask(&self, task: impl FnOnce() + 'static) {
        self.inner.microtasks.borrow_mut().push_back(Box::new(task));
    }

    /// Run queued microtasks, including any they queue, until none remain.
    /// Returns how many ran.
    pub fn run_microtasks(&self) -> usize {
        let mut ran = 0;
        loop {
            let task = self.inner.microtasks.borrow_mut().pop_front();
            let Some(task) = task else { break };
            task();
            ran += 1;
        }
        if ran > 0 {
            tracing::trace!(ran, "microtasks drained");
        }
        ran
    }

    /// Schedule a flush and drain microtasks, so every pending change is
    /// applied when this returns.
    pub fn tick(&self) {
        self.schedule_flush();
        self.run_microtasks();
    }

    // -------------------------------------------------------------------------
    // Scheduling
    // -------------------------------------------------------------------------

    /// Queue one deferred flush unless one is already queued.
    pub fn schedule_flush(&self) {
        if self.inner.update_scheduled.replace(true) {
            return;
        }
        let weak = Rc::downgrade(&self.inner);
        self.queue_microtask(move || {
            if let Some(inner) = weak.upgrade() {
                Scheduler { inner }.flush();
            }
        });
    }

    /// Whether a flush is queued and has not finished yet.
    pub fn is_flush_scheduled(&self) -> bool {
        self.inner.update_scheduled.get()
    }

    /// Whether a flush is running right now.
    pub fn is_flushing(&self) -> bool {
        self.inner.flushing.get()
    }

    pub(crate) fn enqueue(&self, component: Component) {
        self.inner.queues.borrow_mut().dirty_components.push(component);
    }

    /// Number of components waiting for the next flush.
    pub fn pending_components(&self) -> usize {
        self.inner.queues.borrow().dirty_components.len()
    }

    /// Queue a post-patch callback. The same `Rc` runs at most once per flush.
    pub fn add_render_callback(&self, callback: Hook) {
        self.inner.queues.borrow_mut().render_callbacks.push(callback);
    }

    /// Queue a node-reference binding callback; these run children first.
    pub fn add_binding_callback(&self, callback: impl FnOnce() + 'static) {
        self.inner
            .queues
            .borrow_mut()
            .binding_callbacks
            .push(Box::new(callback));
    }

    /// Queue a one-shot callback for when the flush settles.
    pub fn add_flush_callback(&self, callback: impl FnOnce() + 'static) {
        self.inner
            .queues
            .borrow_mut()
            .flush_callbacks
            .push(Box::new(callback));
    }

    /// Activity counters.
    pub fn stats(&self) -> FlushStats {
        self.inner.stats.get()
    }

    // -------------------------------------------------------------------------
    // Active component
    // -------------------------------------------------------------------------

    /// Component being initialised or updated, if any.
    pub fn current(&self) -> Option<Component> {
        self.inner.current.borrow().clone()
    }

    /// Component being initialised or updated, or an error naming the
    /// `operation` that needed one.
    pub fn current_component(&self, operation: &'static str) -> Result<Component> {
        self.current()
            .ok_or(RuntimeError::OutsideComponentInit { operation })
    }

    /// Make `component` the active component until the guard drops.
    pub(crate) fn enter(&self, component: Component) -> CurrentGuard {
        let previous = self.inner.current.replace(Some(component));
        CurrentGuard {
            scheduler: self.clone(),
            previous,
        }
    }

    fn set_current(&self, component: Option<Component>) {
        *self.inner.current.borrow_mut() = component;
    }

    // -------------------------------------------------------------------------
    // Flush
    // -------------------------------------------------------------------------

    /// Apply every pending update and run lifecycle callbacks to quiescence.
    pub fn flush(&self) {
        if self.inner.flushing.get() {
            tracing::trace!("flush requested while flushing; the active loop picks it up");
            return;
        }
        if self.inner.queues.borrow().is_idle() {
            self.inner.update_scheduled.set(false);
            return;
        }

        self.inner.flushing.set(true);
        // Writes made during the flush are picked up by the loop below.
        self.inner.update_scheduled.set(true);
        let mut guard = FlushGuard {
            scheduler: self,
            saved: self.inner.current.take(),
            finished: false,
        };

        let mut rounds = 0u64;
        let mut updates = 0u64;
        // Keeps every callback seen this flush alive so its address cannot be
        // reused by a later callback and mistaken for it.
        let mut retired: Vec<Hook> = Vec::new();

        loop {
            rounds += 1;

            // a. before-update hooks + patch, in enqueue order
            let mut index = 0;
            loop {
                let next = self.inner.queues.borrow().dirty_components.get(index).cloned();
                let Some(component) = next else { break };
                index += 1;

                self.set_current(Some(component.clone()));
                component.run_update();
                updates += 1;
            }
            self.set_current(None);
            self.inner.queues.borrow_mut().dirty_components.clear();

            // b. bind-this callbacks, last queued first
            loop {
                let callback = self.inner.queues.borrow_mut().binding_callbacks.pop();
                let Some(callback) = callback else { break };
                callback();
            }

            // c. after-update callbacks, once each per flush
            let mut index = 0;
            loop {
                let next = self.inner.queues.borrow().render_callbacks.get(index).cloned();
                let Some(callback) = next else { break };
                index += 1;

                let first_time = self
                    .inner
                    .queues
                    .borrow_mut()
                    .seen_callbacks
                    .insert(hook_id(&callback));
                if first_time {
                    callback();
                }
            }
            retired.extend(self.inner.queues.borrow_mut().render_callbacks.drain(..));

            if !self.inner.queues.borrow().has_round_work() {
                break;
            }
        }

        loop {
            let callback = self.inner.queues.borrow_mut().flush_callbacks.pop();
            let Some(callback) = callback else { break };
            callback();
        }

        let mut stats = self.inner.stats.get();
        stats.flushes += 1;
        stats.rounds += rounds;
        stats.updates += updates;
        self.inner.stats.set(stats);
        tracing::debug!(rounds, updates, "flush complete");

        guard.finished = true;
        drop(guard);
        drop(retired);

        // Flush-complete callbacks ran after the loop; anything they queued
        // needs a flush of its own.
        if !self.inner.queues.borrow().is_idle() {
            self.schedule_flush();
        }
    }
}

// =============================================================================
// Guards
// =============================================================================

/// Restores the previously active component on drop.
pub(crate) struct CurrentGuard {
    scheduler: Scheduler,
    previous: Option<Component>,
}

impl Drop for CurrentGuard {
    fn drop(&mut self) {
        self.scheduler.set_current(self.previous.take());
    }
}

/// Resets flush state on exit, including when a callback panics.
struct FlushGuard<'a> {
    scheduler: &'a Scheduler,
    saved: Option<Component>,
    finished: bool,
}

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        let inner = &self.scheduler.inner;

        if !self.finished {
            // Unwinding out of a callback: drop the rest of this flush's work
            // and return pending components to the resting state.
            let abandoned = std::mem::take(&mut *inner.queues.borrow_mut());
            for component in &abandoned.dirty_components {
                component.reset_dirty();
            }
            tracing::warn!(
                components = abandoned.dirty_components.len(),
                "flush aborted; pending work dropped"
            );
        }

        inner.queues.borrow_mut().seen_callbacks.clear();
        inner.update_scheduled.set(false);
        inner.current.replace(self.saved.take());
        inner.flushing.set(false);
    }
}
