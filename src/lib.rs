//! # spark-dom
//!
//! Compiled-component runtime core over a retained DOM.
//!
//! Components hold their state in numbered reactive slots. Writing a slot
//! marks it in the component's dirty mask; every write made in one
//! synchronous turn lands in a single microtask-deferred flush, which patches
//! only the bindings that read a dirty slot. Keyed lists are diffed
//! incrementally so surviving items keep their DOM.
//!
//! ## Architecture
//!
//! ```text
//! Component::set ─► make_dirty ─► Scheduler::schedule_flush
//!                                         │ (microtask)
//!                                         ▼
//!                  flush: run_update ─► Fragment::patch ─► Dom
//!                                         │
//!                                         └─► KeyedList::reconcile
//! ```
//!
//! ## Modules
//!
//! - [`runtime`] - Runtime handle, dirty tracking, scheduler, context, lifecycle
//! - [`component`] - Component instances, definitions, fragments, events
//! - [`blocks`] - Keyed reconciler
//! - [`template`] - Data-driven fragments and keyed `each` regions
//! - [`dom`] - Retained node tree with events and mutation stats
//! - [`store`] - Bridge from `spark_signals` signals into slots
//! - [`config`] / [`error`] - Configuration and the crate error type

pub mod blocks;
pub mod component;
pub mod config;
pub mod dom;
pub mod error;
pub mod runtime;
pub mod store;
pub mod template;

pub use blocks::{validate_keys, BlockKey, BlockRef, KeyedBlock, KeyedItem, KeyedList, ReconcileOutcome};

pub use component::{
    BindCallback, Component, ComponentDef, ComponentEvent, ComponentEventHandler, ComponentFlags,
    ComponentOptions, EmptyFragment, EventDispatcher, Fragment, MountHook, Props, WeakComponent,
};

pub use config::RuntimeConfig;

pub use dom::{Dom, DomStats, Event, EventHandler, ListenerId, Mutation, NodeId, NodeKind};

pub use error::{Result, RuntimeError};

pub use runtime::{
    // Types
    Cleanup, Context, DirtyMask, FlushStats, Hook, Runtime, Scheduler,
    // Dirty tracking
    make_dirty, BITS_PER_WORD,
    // Lifecycle
    after_update, before_update, create_event_dispatcher, get_context, has_context, on_destroy,
    on_mount, set_context,
};

pub use template::{EachBlock, IfBlock, NodeRef, RefCallback, Template, TemplateFragment, TemplateHandler};
