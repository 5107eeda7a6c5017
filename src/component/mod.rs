//! Component Instance - reactive slots, a fragment, and lifecycle hooks.
//!
//! # Construction sequence
//!
//! 1. The new component becomes the active component (the previous one is
//!    restored afterwards), and its context frame inherits the parent's.
//! 2. Declared props are copied into their slots, then
//!    [`ComponentDef::instance`] runs. Slot writes during this step do not
//!    mark anything dirty.
//! 3. Reactive declarations run once with every slot considered dirty, the
//!    component becomes ready, before-update hooks run, and the fragment is
//!    built.
//! 4. With a target: the fragment is created (or claimed when hydrating),
//!    mounted, and the scheduler flushes so on-mount hooks run before
//!    `Component::new` returns.
//!
//! # Ownership
//!
//! `Component` is an `Rc` handle. The scheduler holds strong handles only
//! while a component is queued or active. Closures stored inside a
//! component's own fragment should capture a [`WeakComponent`].

pub mod events;
pub mod fragment;

use std::cell::{Cell, RefCell, RefMut};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use bitflags::bitflags;
use serde_json::{Map, Value};

use crate::dom::NodeId;
use crate::error::{Result, RuntimeError};
use crate::runtime::{make_dirty, Cleanup, Context, DirtyMask, Hook, Runtime};

pub use events::{ComponentEvent, ComponentEventHandler, EventDispatcher};
pub use fragment::{EmptyFragment, Fragment};

/// Prop values by name.
pub type Props = Map<String, Value>;

/// On-mount hook; a returned cleanup joins the on-destroy list.
pub type MountHook = Box<dyn FnOnce() -> Option<Cleanup>>;

/// Parent-side callback of a two-way prop binding.
pub type BindCallback = Rc<dyn Fn(&Value)>;

bitflags! {
    /// Lifecycle state of a component.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ComponentFlags: u8 {
        /// Instance function finished; invalidations now schedule patches.
        const READY = 1 << 0;
        /// Fragment DOM has been created or claimed.
        const CREATED = 1 << 1;
        /// Fragment has been mounted at least once.
        const MOUNTED = 1 << 2;
        /// Destroyed; further work is a no-op.
        const DESTROYED = 1 << 3;
        /// Applying `set_props`; bound callbacks are not notified.
        const SKIP_BOUND = 1 << 4;
    }
}

// =============================================================================
// Definition
// =============================================================================

/// What a component is: its slots, props, instance logic and fragment.
pub trait ComponentDef {
    /// Name used in logs.
    fn name(&self) -> &str {
        "Component"
    }

    /// Number of reactive slots. Fixed for the component's lifetime.
    fn slot_count(&self) -> usize;

    /// Declared props as `(name, slot)` pairs.
    fn props(&self) -> &[(&'static str, usize)] {
        &[]
    }

    /// Initialise slots and register lifecycle hooks.
    ///
    /// Declared props have already been copied into their slots.
    fn instance(&self, cx: &Component, props: &Props) -> Result<()> {
        let _ = (cx, props);
        Ok(())
    }

    /// Reactive declarations: derive slots from the slots in `dirty`.
    /// Runs before every patch, and once at construction with `DirtyMask::All`.
    fn reactive(&self, cx: &Component, dirty: &DirtyMask) {
        let _ = (cx, dirty);
    }

    /// Build the component's fragment. `None` renders nothing.
    fn fragment(&self, cx: &Component) -> Option<Box<dyn Fragment>>;
}

/// Construction options.
#[derive(Default)]
pub struct ComponentOptions {
    /// Mount under this node immediately.
    pub target: Option<NodeId>,
    /// Insert before this child of `target`.
    pub anchor: Option<NodeId>,
    /// Initial prop values.
    pub props: Props,
    /// Claim `target`'s existing children instead of building fresh nodes.
    pub hydrate: bool,
    /// Run the fragment's intro before mounting.
    pub intro: bool,
    /// Context to inherit instead of the parent component's.
    pub context: Option<Context>,
}

// =============================================================================
// Instance
// =============================================================================

#[derive(Default)]
struct Hooks {
    on_mount: Vec<MountHook>,
    on_destroy: Vec<Cleanup>,
    before_update: Vec<Hook>,
    after_update: Vec<Hook>,
}

struct ComponentInner {
    id: u64,
    runtime: Runtime,
    def: Rc<dyn ComponentDef>,
    context: Context,
    flags: Cell<ComponentFlags>,
    ctx: RefCell<Vec<Value>>,
    dirty: RefCell<DirtyMask>,
    fragment: RefCell<Option<Box<dyn Fragment>>>,
    hooks: RefCell<Hooks>,
    listeners: RefCell<HashMap<String, Vec<(u64, ComponentEventHandler)>>>,
    next_listener: Cell<u64>,
    bound: RefCell<HashMap<usize, BindCallback>>,
}

/// Handle to a live component instance.
#[derive(Clone)]
pub struct Component {
    inner: Rc<ComponentInner>,
}

/// Non-owning handle, for closures the component itself stores.
#[derive(Clone)]
pub struct WeakComponent {
    inner: Weak<ComponentInner>,
}

impl Component {
    /// Instantiate `def` (and mount it when `options.target` is set).
    ///
    /// # Errors
    ///
    /// Whatever `def.instance` returns.
    pub fn new(rt: &Runtime, def: Rc<dyn ComponentDef>, options: ComponentOptions) -> Result<Component> {
        let scheduler = rt.scheduler().clone();
        let parent = scheduler.current();
        let context = match &options.context {
            Some(context) => context.child(),
            None => parent
                .as_ref()
                .map(|p| p.context().child())
                .unwrap_or_default(),
        };

        let slot_count = def.slot_count();
        let component = Component {
            inner: Rc::new(ComponentInner {
                id: rt.next_component_id(),
                runtime: rt.clone(),
                def: def.clone(),
                context,
                flags: Cell::new(ComponentFlags::empty()),
                ctx: RefCell::new(vec![Value::Null; slot_count]),
                dirty: RefCell::new(DirtyMask::All),
                fragment: RefCell::new(None),
                hooks: RefCell::new(Hooks::default()),
                listeners: RefCell::new(HashMap::new()),
                next_listener: Cell::new(0),
                bound: RefCell::new(HashMap::new()),
            }),
        };
        tracing::debug!(
            component = component.id(),
            name = def.name(),
            parent = ?parent.as_ref().map(Component::id),
            "component created"
        );

        let _active = scheduler.enter(component.clone());

        component.apply_initial_props(&options.props);
        def.instance(&component, &options.props)?;
        def.reactive(&component, &DirtyMask::All);
        component.insert_flags(ComponentFlags::READY);
        component.run_before_update();

        let fragment = def
            .fragment(&component)
            .unwrap_or_else(|| Box::new(EmptyFragment));
        *component.inner.fragment.borrow_mut() = Some(fragment);

        if let Some(target) = options.target {
            let dom = rt.dom();
            if options.hydrate {
                let mut nodes = dom.children(target);
                component.claim_fragment(&mut nodes);
                for node in nodes {
                    dom.discard(node);
                }
            } else {
                component.create_fragment();
            }
            if options.intro {
                component.with_fragment(|fragment| fragment.intro());
            }
            component.mount_fragment(target, options.anchor);
            scheduler.flush();
        }

        Ok(component)
    }

    // -------------------------------------------------------------------------
    // Identity
    // -------------------------------------------------------------------------

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        self.inner.def.name()
    }

    pub fn runtime(&self) -> &Runtime {
        &self.inner.runtime
    }

    pub fn context(&self) -> &Context {
        &self.inner.context
    }

    pub fn flags(&self) -> ComponentFlags {
        self.inner.flags.get()
    }

    pub fn is_destroyed(&self) -> bool {
        self.flags().contains(ComponentFlags::DESTROYED)
    }

    pub fn is_mounted(&self) -> bool {
        self.flags().contains(ComponentFlags::MOUNTED)
    }

    pub fn downgrade(&self) -> WeakComponent {
        WeakComponent {
            inner: Rc::downgrade(&self.inner),
        }
    }

    pub fn ptr_eq(&self, other: &Component) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    fn insert_flags(&self, flags: ComponentFlags) {
        self.inner.flags.set(self.flags() | flags);
    }

    fn remove_flags(&self, flags: ComponentFlags) {
        self.inner.flags.set(self.flags() - flags);
    }

    // -------------------------------------------------------------------------
    // Slots
    // -------------------------------------------------------------------------

    pub fn slot_count(&self) -> usize {
        self.inner.ctx.borrow().len()
    }

    /// Current value of `slot` (`Null` when out of range).
    pub fn get(&self, slot: usize) -> Value {
        self.inner
            .ctx
            .borrow()
            .get(slot)
            .cloned()
            .unwrap_or(Value::Null)
    }

    /// Snapshot of every slot.
    pub fn ctx(&self) -> Vec<Value> {
        self.inner.ctx.borrow().clone()
    }

    /// Slot index of the declared prop `name`.
    pub fn prop_slot(&self, name: &str) -> Option<usize> {
        self.inner
            .def
            .props()
            .iter()
            .find(|(prop, _)| *prop == name)
            .map(|&(_, slot)| slot)
    }

    /// Write `value` into `slot` if it differs, invalidating it.
    /// Returns whether anything changed.
    pub fn set(&self, slot: usize, value: Value) -> bool {
        if self.is_destroyed() {
            tracing::warn!(component = self.id(), slot, "set on destroyed component ignored");
            return false;
        }
        {
            let mut ctx = self.inner.ctx.borrow_mut();
            let Some(current) = ctx.get_mut(slot) else {
                tracing::warn!(component = self.id(), slot, "slot out of range");
                return false;
            };
            if *current == value {
                return false;
            }
            *current = value;
        }
        self.invalidate(slot);
        true
    }

    /// Write `value` only while `slot` is still `Null`. Meant for prop
    /// defaults inside `instance`.
    pub fn set_default(&self, slot: usize, value: Value) {
        if self.get(slot).is_null() {
            self.set(slot, value);
        }
    }

    /// Mutate `slot` in place and invalidate it unconditionally.
    ///
    /// `f` must not touch this component.
    pub fn update(&self, slot: usize, f: impl FnOnce(&mut Value)) {
        if self.is_destroyed() {
            tracing::warn!(component = self.id(), slot, "update on destroyed component ignored");
            return;
        }
        {
            let mut ctx = self.inner.ctx.borrow_mut();
            let Some(value) = ctx.get_mut(slot) else {
                tracing::warn!(component = self.id(), slot, "slot out of range");
                return;
            };
            f(value);
        }
        self.invalidate(slot);
    }

    /// Notify a bound parent and, once ready, mark `slot` dirty.
    pub fn invalidate(&self, slot: usize) {
        if self.is_destroyed() {
            return;
        }
        if !self.flags().contains(ComponentFlags::SKIP_BOUND) {
            let bound = self.inner.bound.borrow().get(&slot).cloned();
            if let Some(callback) = bound {
                callback(&self.get(slot));
            }
        }
        if self.flags().contains(ComponentFlags::READY) {
            make_dirty(self, slot);
        }
    }

    /// Whether `slot` changed since the last patch.
    pub fn is_dirty(&self, slot: usize) -> bool {
        match &*self.inner.dirty.borrow() {
            DirtyMask::All => false,
            mask => mask.is_dirty(slot),
        }
    }

    /// Copy of the pending dirty mask (`All` at rest).
    pub fn dirty_mask(&self) -> DirtyMask {
        self.inner.dirty.borrow().clone()
    }

    pub(crate) fn dirty_mask_mut(&self) -> RefMut<'_, DirtyMask> {
        self.inner.dirty.borrow_mut()
    }

    pub(crate) fn reset_dirty(&self) {
        if let Ok(mut dirty) = self.inner.dirty.try_borrow_mut() {
            *dirty = DirtyMask::All;
        }
    }

    // -------------------------------------------------------------------------
    // Props
    // -------------------------------------------------------------------------

    fn apply_initial_props(&self, props: &Props) {
        let mut ctx = self.inner.ctx.borrow_mut();
        for (name, value) in props {
            match self.prop_slot(name).and_then(|slot| ctx.get_mut(slot)) {
                Some(current) => *current = value.clone(),
                None => self.warn_unknown_prop(name),
            }
        }
    }

    /// Apply new prop values, scheduling a patch for those that changed.
    /// Bound parents are not notified of these writes.
    ///
    /// # Errors
    ///
    /// `ComponentDestroyed` after `destroy`.
    pub fn set_props(&self, props: &Props) -> Result<()> {
        if self.is_destroyed() {
            return Err(RuntimeError::ComponentDestroyed { operation: "set_props" });
        }
        if props.is_empty() {
            return Ok(());
        }

        self.insert_flags(ComponentFlags::SKIP_BOUND);
        for (name, value) in props {
            match self.prop_slot(name) {
                Some(slot) => {
                    self.set(slot, value.clone());
                }
                None => self.warn_unknown_prop(name),
            }
        }
        self.remove_flags(ComponentFlags::SKIP_BOUND);
        Ok(())
    }

    fn warn_unknown_prop(&self, prop: &str) {
        if self.inner.runtime.config().warn_unknown_props {
            tracing::warn!(component = self.id(), name = self.name(), prop, "unknown prop");
        }
    }

    /// Two-way binding: `callback` receives the prop's value now and
    /// whenever the component invalidates it. Returns false when the
    /// component declares no such prop.
    pub fn bind_prop(&self, name: &str, callback: impl Fn(&Value) + 'static) -> bool {
        let Some(slot) = self.prop_slot(name) else {
            return false;
        };
        let callback: BindCallback = Rc::new(callback);
        self.inner.bound.borrow_mut().insert(slot, callback.clone());
        callback(&self.get(slot));
        true
    }

    // -------------------------------------------------------------------------
    // Events
    // -------------------------------------------------------------------------

    /// Listen for `event`. The returned cleanup removes the listener.
    pub fn on(&self, event: &str, handler: impl Fn(&ComponentEvent) + 'static) -> Cleanup {
        let id = self.inner.next_listener.get();
        self.inner.next_listener.set(id + 1);
        self.inner
            .listeners
            .borrow_mut()
            .entry(event.to_string())
            .or_default()
            .push((id, Rc::new(handler)));

        let weak = self.downgrade();
        let event = event.to_string();
        Box::new(move || {
            if let Some(component) = weak.upgrade() {
                if let Some(list) = component.inner.listeners.borrow_mut().get_mut(&event) {
                    list.retain(|(listener, _)| *listener != id);
                }
            }
        })
    }

    /// Emit `name` to this component's listeners. Returns how many ran.
    pub fn dispatch(&self, name: &str, detail: Value) -> usize {
        let handlers: Vec<ComponentEventHandler> = self
            .inner
            .listeners
            .borrow()
            .get(name)
            .map(|list| list.iter().map(|(_, handler)| handler.clone()).collect())
            .unwrap_or_default();

        let event = ComponentEvent {
            name: name.to_string(),
            detail,
        };
        for handler in &handlers {
            handler(&event);
        }
        handlers.len()
    }

    // -------------------------------------------------------------------------
    // Hooks
    // -------------------------------------------------------------------------

    pub(crate) fn push_on_mount(&self, hook: MountHook) {
        self.inner.hooks.borrow_mut().on_mount.push(hook);
    }

    pub(crate) fn push_on_destroy(&self, hook: Cleanup) {
        if self.is_destroyed() {
            hook();
            return;
        }
        self.inner.hooks.borrow_mut().on_destroy.push(hook);
    }

    pub(crate) fn push_before_update(&self, hook: Hook) {
        self.inner.hooks.borrow_mut().before_update.push(hook);
    }

    /// Wrapped once here so a queued copy keeps its identity in the flush's
    /// seen-set and turns into a no-op if the component is destroyed first.
    pub(crate) fn push_after_update(&self, hook: Hook) {
        let weak = self.downgrade();
        let guarded: Hook = Rc::new(move || {
            let alive = weak.upgrade().is_some_and(|component| !component.is_destroyed());
            if alive {
                hook();
            }
        });
        self.inner.hooks.borrow_mut().after_update.push(guarded);
    }

    fn run_before_update(&self) {
        let hooks = self.inner.hooks.borrow().before_update.clone();
        for hook in hooks {
            hook();
        }
    }

    fn queue_after_update(&self) {
        let hooks = self.inner.hooks.borrow().after_update.clone();
        let scheduler = self.inner.runtime.scheduler();
        for hook in hooks {
            scheduler.add_render_callback(hook);
        }
    }

    fn run_mount_hooks(&self) {
        let hooks = std::mem::take(&mut self.inner.hooks.borrow_mut().on_mount);
        let cleanups: Vec<Cleanup> = hooks.into_iter().filter_map(|hook| hook()).collect();

        if self.is_destroyed() {
            for cleanup in cleanups {
                cleanup();
            }
        } else {
            self.inner.hooks.borrow_mut().on_destroy.extend(cleanups);
        }
    }

    // -------------------------------------------------------------------------
    // Fragment
    // -------------------------------------------------------------------------

    /// Run `f` on the fragment with no borrow held, so `f` may call back
    /// into this component.
    fn with_fragment<R>(&self, f: impl FnOnce(&mut dyn Fragment) -> R) -> Option<R> {
        let mut fragment = self.inner.fragment.borrow_mut().take()?;
        let result = f(fragment.as_mut());

        if self.is_destroyed() {
            fragment.destroy(self.inner.runtime.dom(), true);
        } else {
            *self.inner.fragment.borrow_mut() = Some(fragment);
        }
        Some(result)
    }

    /// Build the fragment's detached DOM. Does nothing after the first call.
    pub fn create_fragment(&self) {
        if self.flags().intersects(ComponentFlags::CREATED | ComponentFlags::DESTROYED) {
            return;
        }
        let ctx = self.ctx();
        let dom = self.inner.runtime.dom().clone();
        self.with_fragment(|fragment| fragment.create(&dom, &ctx));
        self.insert_flags(ComponentFlags::CREATED);
    }

    pub(crate) fn claim_fragment(&self, nodes: &mut Vec<NodeId>) {
        let ctx = self.ctx();
        let dom = self.inner.runtime.dom().clone();
        self.with_fragment(|fragment| fragment.claim(&dom, &ctx, nodes));
        self.insert_flags(ComponentFlags::CREATED);
    }

    /// Insert the fragment under `target` before `anchor`, creating it first
    /// if needed. On-mount hooks run in the next flush, which is scheduled.
    pub fn mount(&self, target: NodeId, anchor: Option<NodeId>) {
        self.create_fragment();
        self.mount_fragment(target, anchor);
        self.inner.runtime.scheduler().schedule_flush();
    }

    pub(crate) fn mount_fragment(&self, target: NodeId, anchor: Option<NodeId>) {
        if self.is_destroyed() {
            return;
        }
        let dom = self.inner.runtime.dom().clone();
        self.with_fragment(|fragment| fragment.mount(&dom, target, anchor));
        self.insert_flags(ComponentFlags::MOUNTED);
        tracing::debug!(component = self.id(), ?target, "component mounted");

        let weak = self.downgrade();
        self.inner
            .runtime
            .scheduler()
            .add_render_callback(Rc::new(move || {
                if let Some(component) = weak.upgrade() {
                    component.run_mount_hooks();
                }
            }));
        self.queue_after_update();
    }

    /// Re-insert an already mounted fragment; queues no hooks.
    pub(crate) fn move_fragment(&self, target: NodeId, anchor: Option<NodeId>) {
        if self.is_destroyed() {
            return;
        }
        let dom = self.inner.runtime.dom().clone();
        self.with_fragment(|fragment| fragment.mount(&dom, target, anchor));
        tracing::trace!(component = self.id(), ?target, "component moved");
    }

    /// First top-level node of the fragment.
    pub fn first_node(&self) -> Option<NodeId> {
        self.inner
            .fragment
            .borrow()
            .as_ref()
            .and_then(|fragment| fragment.first())
    }

    /// Apply pending changes: reactive declarations, before-update hooks,
    /// patch with the dirty mask (which returns to rest), then queue
    /// after-update hooks. Called by the flush loop.
    pub(crate) fn run_update(&self) {
        if self.is_destroyed() || self.inner.fragment.borrow().is_none() {
            self.reset_dirty();
            return;
        }

        let pending = self.dirty_mask();
        self.inner.def.reactive(self, &pending);
        self.run_before_update();

        let dirty = std::mem::take(&mut *self.inner.dirty.borrow_mut());
        let ctx = self.ctx();
        let dom = self.inner.runtime.dom().clone();
        tracing::trace!(component = self.id(), dirty = ?dirty.words(), "patch");
        self.with_fragment(|fragment| fragment.patch(&dom, &ctx, &dirty));

        self.queue_after_update();
    }

    // -------------------------------------------------------------------------
    // Teardown
    // -------------------------------------------------------------------------

    /// Run on-destroy hooks, remove the DOM and release every block.
    /// Calling it again does nothing.
    pub fn destroy(&self) {
        self.destroy_with(true);
    }

    pub(crate) fn destroy_with(&self, detaching: bool) {
        if self.is_destroyed() {
            return;
        }
        self.insert_flags(ComponentFlags::DESTROYED);

        let on_destroy = std::mem::take(&mut self.inner.hooks.borrow_mut().on_destroy);
        for hook in on_destroy {
            hook();
        }

        let fragment = self.inner.fragment.borrow_mut().take();
        if let Some(mut fragment) = fragment {
            fragment.destroy(self.inner.runtime.dom(), detaching);
        }

        {
            let mut hooks = self.inner.hooks.borrow_mut();
            hooks.before_update.clear();
            hooks.after_update.clear();
        }
        self.inner.listeners.borrow_mut().clear();
        self.inner.bound.borrow_mut().clear();
        self.reset_dirty();
        tracing::debug!(component = self.id(), detaching, "component destroyed");
    }
}

impl PartialEq for Component {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Component {}

impl std::fmt::Debug for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Component")
            .field("id", &self.id())
            .field("name", &self.name())
            .field("flags", &self.flags())
            .finish()
    }
}

impl WeakComponent {
    pub fn upgrade(&self) -> Option<Component> {
        self.inner.upgrade().map(|inner| Component { inner })
    }

    /// [`Component::set`] if the component is still alive.
    pub fn set(&self, slot: usize, value: Value) -> bool {
        self.upgrade().is_some_and(|component| component.set(slot, value))
    }

    /// [`Component::update`] if the component is still alive.
    pub fn update(&self, slot: usize, f: impl FnOnce(&mut Value)) {
        if let Some(component) = self.upgrade() {
            component.update(slot, f);
        }
    }

    /// Current value of `slot`, `Null` once the component is gone.
    pub fn get(&self, slot: usize) -> Value {
        self.upgrade().map_or(Value::Null, |component| component.get(slot))
    }
}

impl std::fmt::Debug for WeakComponent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.upgrade() {
            Some(component) => f.debug_tuple("WeakComponent").field(&component.id()).finish(),
            None => f.write_str("WeakComponent(<dropped>)"),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::RefCell;

    use crate::runtime::{on_destroy, on_mount};

    /// Two slots, `label` is a prop; renders nothing.
    struct Plain;

    impl ComponentDef for Plain {
        fn name(&self) -> &str {
            "Plain"
        }

        fn slot_count(&self) -> usize {
            2
        }

        fn props(&self) -> &[(&'static str, usize)] {
            &[("label", 0)]
        }

        fn instance(&self, cx: &Component, _props: &Props) -> Result<()> {
            cx.set_default(0, json!("none"));
            cx.set(1, json!(0));
            Ok(())
        }

        fn fragment(&self, _cx: &Component) -> Option<Box<dyn Fragment>> {
            None
        }
    }

    fn plain(rt: &Runtime, props: Props) -> Component {
        Component::new(rt, Rc::new(Plain), ComponentOptions { props, ..Default::default() })
            .unwrap_or_else(|err| panic!("construction failed: {err}"))
    }

    #[test]
    fn test_instance_writes_do_not_schedule() {
        let rt = Runtime::new();
        let c = plain(&rt, Props::new());

        assert_eq!(c.get(0), json!("none"));
        assert_eq!(c.get(1), json!(0));
        assert!(c.dirty_mask().is_all(), "instance writes must leave the mask at rest");
        assert_eq!(rt.scheduler().pending_components(), 0);
    }

    #[test]
    fn test_props_fill_slots_before_instance() {
        let rt = Runtime::new();
        let mut props = Props::new();
        props.insert("label".into(), json!("hello"));
        let c = plain(&rt, props);
        assert_eq!(c.get(0), json!("hello"), "default must not override a passed prop");
    }

    #[test]
    fn test_set_skips_equal_values() {
        let rt = Runtime::new();
        let c = plain(&rt, Props::new());

        assert!(!c.set(1, json!(0)));
        assert_eq!(rt.scheduler().pending_components(), 0);

        assert!(c.set(1, json!(1)));
        assert!(c.is_dirty(1));
        assert!(!c.is_dirty(0));
        assert_eq!(rt.scheduler().pending_components(), 1);
    }

    #[test]
    fn test_update_always_invalidates() {
        let rt = Runtime::new();
        let c = plain(&rt, Props::new());

        c.update(1, |_| {});
        assert!(c.is_dirty(1));
    }

    #[test]
    fn test_bind_prop_reports_child_writes_but_not_set_props() {
        let rt = Runtime::new();
        let c = plain(&rt, Props::new());
        let seen = Rc::new(RefCell::new(Vec::new()));

        let log = seen.clone();
        assert!(c.bind_prop("label", move |v| log.borrow_mut().push(v.clone())));
        assert!(!c.bind_prop("missing", |_| {}));

        c.set(0, json!("typed"));
        let mut props = Props::new();
        props.insert("label".into(), json!("from parent"));
        c.set_props(&props).unwrap_or_else(|err| panic!("{err}"));

        assert_eq!(*seen.borrow(), vec![json!("none"), json!("typed")]);
        assert_eq!(c.get(0), json!("from parent"));
    }

    #[test]
    fn test_on_and_dispatch() {
        let rt = Runtime::new();
        let c = plain(&rt, Props::new());
        let hits = Rc::new(Cell::new(0));

        let counter = hits.clone();
        let off = c.on("save", move |event| {
            assert_eq!(event.detail, json!({"id": 1}));
            counter.set(counter.get() + 1);
        });

        assert_eq!(c.dispatch("save", json!({"id": 1})), 1);
        assert_eq!(c.dispatch("other", Value::Null), 0);
        off();
        assert_eq!(c.dispatch("save", json!({"id": 1})), 0);
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_destroy_is_idempotent_and_blocks_writes() {
        let rt = Runtime::new();
        let c = plain(&rt, Props::new());

        c.destroy();
        c.destroy();
        assert!(c.is_destroyed());
        assert!(!c.set(1, json!(9)));
        assert!(matches!(
            c.set_props(&Props::new()),
            Err(RuntimeError::ComponentDestroyed { operation: "set_props" })
        ));
        assert_eq!(c.get(1), json!(0), "slots stay readable after destroy");
    }

    struct WithHooks {
        log: Rc<RefCell<Vec<&'static str>>>,
    }

    impl ComponentDef for WithHooks {
        fn slot_count(&self) -> usize {
            0
        }

        fn instance(&self, cx: &Component, _props: &Props) -> Result<()> {
            let log = self.log.clone();
            on_mount(cx.runtime(), move || {
                log.borrow_mut().push("mount");
                let log = log.clone();
                Some(Box::new(move || log.borrow_mut().push("mount cleanup")))
            })?;
            let log = self.log.clone();
            on_destroy(cx.runtime(), move || log.borrow_mut().push("destroy"))?;
            Ok(())
        }

        fn fragment(&self, _cx: &Component) -> Option<Box<dyn Fragment>> {
            None
        }
    }

    #[test]
    fn test_mount_cleanup_runs_after_destroy_hooks() {
        let rt = Runtime::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let target = rt.dom().create_element("div");

        let c = Component::new(
            &rt,
            Rc::new(WithHooks { log: log.clone() }),
            ComponentOptions { target: Some(target), ..Default::default() },
        )
        .unwrap_or_else(|err| panic!("{err}"));
        assert_eq!(*log.borrow(), vec!["mount"]);

        c.destroy();
        assert_eq!(*log.borrow(), vec!["mount", "destroy", "mount cleanup"]);
    }

    #[test]
    fn test_destroy_before_first_flush_runs_mount_cleanup_immediately() {
        let rt = Runtime::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let target = rt.dom().create_element("div");

        let c = Component::new(&rt, Rc::new(WithHooks { log: log.clone() }), ComponentOptions::default())
            .unwrap_or_else(|err| panic!("{err}"));
        c.mount(target, None);
        c.destroy();
        rt.run_microtasks();

        assert_eq!(*log.borrow(), vec!["destroy", "mount", "mount cleanup"]);
    }
}
