//! Templates - fragments described as data.
//!
//! A [`Template`] records static structure plus every dynamic binding and
//! the slots it reads. [`Template::build`] turns that into a
//! [`TemplateFragment`], whose patch looks up the bindings of each dirty slot
//! in a slot → bindings table and re-evaluates only those.
//!
//! # Example
//!
//! ```ignore
//! const NAME: usize = 0;
//!
//! fn fragment(&self, cx: &Component) -> Option<Box<dyn Fragment>> {
//!     let mut t = Template::new(cx.runtime());
//!     let p = t.element(None, "p");
//!     t.text(Some(p), "Hello ");
//!     t.dynamic_text(Some(p), &[NAME], |ctx| ctx[NAME].as_str().unwrap_or("").to_string());
//!
//!     let weak = cx.downgrade();
//!     let input = t.element(None, "input");
//!     t.on(input, "input", move |event, _ctx| {
//!         weak.set(NAME, event.detail.clone());
//!     });
//!     Some(Box::new(t.build()))
//! }
//! ```

pub mod branch;
pub mod each;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use serde_json::Value;
use smallvec::SmallVec;

use crate::blocks::BlockKey;
use crate::component::{Component, Fragment, Props};
use crate::dom::{Dom, Event, ListenerId, NodeId};
use crate::runtime::{DirtyMask, Runtime};

pub use branch::IfBlock;
pub use each::EachBlock;

/// Handle to a node declared in a [`Template`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeRef(usize);

/// DOM event handler that also receives the fragment's current slot values.
pub type TemplateHandler = Rc<dyn Fn(&Event, &[Value])>;

/// Receives a node when it is mounted and `None` when it is destroyed.
pub type RefCallback = Rc<dyn Fn(Option<NodeId>)>;

type TextEval = Box<dyn Fn(&[Value]) -> String>;
type AttrEval = Box<dyn Fn(&[Value]) -> Option<String>>;

enum PartKind {
    Element { tag: String, attrs: Vec<(String, String)> },
    Text(String),
    Region(Box<dyn Fragment>),
}

struct Part {
    parent: Option<usize>,
    kind: PartKind,
}

enum BindingKind {
    Text(TextEval),
    Attr { name: String, eval: AttrEval },
}

struct Binding {
    part: usize,
    deps: SmallVec<[usize; 4]>,
    kind: BindingKind,
}

struct ListenerSpec {
    part: usize,
    event: String,
    handler: TemplateHandler,
}

// =============================================================================
// Builder
// =============================================================================

/// Builder for a [`TemplateFragment`].
///
/// Parts are created and mounted in declaration order; a part's parent must
/// be declared before it.
pub struct Template {
    runtime: Runtime,
    parts: Vec<Part>,
    bindings: Vec<Binding>,
    listeners: Vec<ListenerSpec>,
    refs: Vec<(usize, RefCallback)>,
}

impl Template {
    pub fn new(runtime: &Runtime) -> Self {
        Self {
            runtime: runtime.clone(),
            parts: Vec::new(),
            bindings: Vec::new(),
            listeners: Vec::new(),
            refs: Vec::new(),
        }
    }

    fn push(&mut self, parent: Option<NodeRef>, kind: PartKind) -> NodeRef {
        self.parts.push(Part {
            parent: parent.map(|p| p.0),
            kind,
        });
        NodeRef(self.parts.len() - 1)
    }

    /// Declare an element under `parent` (`None` for top level).
    pub fn element(&mut self, parent: Option<NodeRef>, tag: &str) -> NodeRef {
        self.push(
            parent,
            PartKind::Element {
                tag: tag.to_string(),
                attrs: Vec::new(),
            },
        )
    }

    /// Static attribute on an element.
    pub fn attr(&mut self, node: NodeRef, name: &str, value: &str) -> &mut Self {
        if let Some(Part {
            kind: PartKind::Element { attrs, .. },
            ..
        }) = self.parts.get_mut(node.0)
        {
            attrs.push((name.to_string(), value.to_string()));
        }
        self
    }

    /// Static text node.
    pub fn text(&mut self, parent: Option<NodeRef>, text: &str) -> NodeRef {
        self.push(parent, PartKind::Text(text.to_string()))
    }

    /// Text node re-evaluated whenever one of `deps` is dirty.
    pub fn dynamic_text(
        &mut self,
        parent: Option<NodeRef>,
        deps: &[usize],
        eval: impl Fn(&[Value]) -> String + 'static,
    ) -> NodeRef {
        let node = self.push(parent, PartKind::Text(String::new()));
        self.bindings.push(Binding {
            part: node.0,
            deps: SmallVec::from_slice(deps),
            kind: BindingKind::Text(Box::new(eval)),
        });
        node
    }

    /// Attribute re-evaluated whenever one of `deps` is dirty. `None`
    /// removes it.
    pub fn dynamic_attr(
        &mut self,
        node: NodeRef,
        name: &str,
        deps: &[usize],
        eval: impl Fn(&[Value]) -> Option<String> + 'static,
    ) -> &mut Self {
        self.bindings.push(Binding {
            part: node.0,
            deps: SmallVec::from_slice(deps),
            kind: BindingKind::Attr {
                name: name.to_string(),
                eval: Box::new(eval),
            },
        });
        self
    }

    /// DOM event listener, attached on first mount.
    pub fn on(
        &mut self,
        node: NodeRef,
        event: &str,
        handler: impl Fn(&Event, &[Value]) + 'static,
    ) -> &mut Self {
        self.listeners.push(ListenerSpec {
            part: node.0,
            event: event.to_string(),
            handler: Rc::new(handler),
        });
        self
    }

    /// Hand the mounted node to `callback` (queued as a bind callback), and
    /// `None` on destroy.
    pub fn bind_this(&mut self, node: NodeRef, callback: impl Fn(Option<NodeId>) + 'static) -> &mut Self {
        self.refs.push((node.0, Rc::new(callback)));
        self
    }

    /// Embed a fragment; it is patched with this fragment's slots.
    pub fn nest(&mut self, parent: Option<NodeRef>, fragment: impl Fragment + 'static) {
        self.push(parent, PartKind::Region(Box::new(fragment)));
    }

    /// Embed a keyed list region.
    pub fn each<K: BlockKey>(&mut self, parent: Option<NodeRef>, block: EachBlock<K>) {
        self.push(parent, PartKind::Region(Box::new(block)));
    }

    /// Embed a conditional region.
    pub fn when(&mut self, parent: Option<NodeRef>, block: IfBlock) {
        self.push(parent, PartKind::Region(Box::new(block)));
    }

    /// Embed a child component. Its props are re-derived with `props`
    /// whenever one of `deps` is dirty.
    ///
    /// Construct `child` inside the parent's `ComponentDef::fragment` so it
    /// inherits the parent's context.
    pub fn component(
        &mut self,
        parent: Option<NodeRef>,
        child: Component,
        deps: &[usize],
        props: impl Fn(&[Value]) -> Props + 'static,
    ) {
        self.push(
            parent,
            PartKind::Region(Box::new(ChildComponent {
                component: child,
                deps: SmallVec::from_slice(deps),
                props: Box::new(props),
            })),
        );
    }

    pub fn build(self) -> TemplateFragment {
        let mut by_slot: Vec<SmallVec<[usize; 4]>> = Vec::new();
        for (index, binding) in self.bindings.iter().enumerate() {
            for &slot in &binding.deps {
                if slot >= by_slot.len() {
                    by_slot.resize_with(slot + 1, SmallVec::new);
                }
                by_slot[slot].push(index);
            }
        }

        TemplateFragment {
            runtime: self.runtime,
            nodes: vec![None; self.parts.len()],
            parts: self.parts,
            bindings: self.bindings,
            by_slot,
            listeners: self.listeners,
            attached: Vec::new(),
            refs: self.refs,
            ctx: Rc::new(RefCell::new(Vec::new())),
            mounted: false,
        }
    }
}

// =============================================================================
// Fragment
// =============================================================================

/// Fragment produced by [`Template::build`].
pub struct TemplateFragment {
    runtime: Runtime,
    parts: Vec<Part>,
    nodes: Vec<Option<NodeId>>,
    bindings: Vec<Binding>,
    by_slot: Vec<SmallVec<[usize; 4]>>,
    listeners: Vec<ListenerSpec>,
    attached: Vec<(NodeId, ListenerId)>,
    refs: Vec<(usize, RefCallback)>,
    ctx: Rc<RefCell<Vec<Value>>>,
    mounted: bool,
}

impl TemplateFragment {
    /// DOM node of a declared element or text part, once created.
    pub fn node(&self, node: NodeRef) -> Option<NodeId> {
        self.nodes.get(node.0).copied().flatten()
    }

    fn apply(&self, dom: &Dom, index: usize, ctx: &[Value]) {
        let binding = &self.bindings[index];
        let Some(node) = self.nodes[binding.part] else { return };
        match &binding.kind {
            BindingKind::Text(eval) => dom.set_data(node, &eval(ctx)),
            BindingKind::Attr { name, eval } => dom.set_attr(node, name, eval(ctx).as_deref()),
        }
        tracing::trace!(binding = index, ?node, "binding applied");
    }

    fn apply_all(&self, dom: &Dom, ctx: &[Value]) {
        for index in 0..self.bindings.len() {
            self.apply(dom, index, ctx);
        }
    }

    fn attach_listeners(&mut self, dom: &Dom) {
        for spec in &self.listeners {
            let Some(node) = self.nodes[spec.part] else { continue };
            let handler = spec.handler.clone();
            let ctx = self.ctx.clone();
            let id = dom.listen(node, &spec.event, move |event| {
                let snapshot = ctx.borrow().clone();
                handler(event, &snapshot);
            });
            self.attached.push((node, id));
        }
    }
}

fn take_matching(dom: &Dom, pool: &mut Vec<NodeId>, tag: Option<&str>) -> Option<NodeId> {
    let position = pool.iter().position(|&node| dom.tag(node).as_deref() == tag)?;
    Some(pool.remove(position))
}

impl Fragment for TemplateFragment {
    fn create(&mut self, dom: &Dom, ctx: &[Value]) {
        *self.ctx.borrow_mut() = ctx.to_vec();
        for (index, part) in self.parts.iter_mut().enumerate() {
            self.nodes[index] = match &mut part.kind {
                PartKind::Element { tag, attrs } => {
                    let node = dom.create_element(tag);
                    for (name, value) in attrs.iter() {
                        dom.set_attr(node, name, Some(value));
                    }
                    Some(node)
                }
                PartKind::Text(text) => Some(dom.create_text(text)),
                PartKind::Region(region) => {
                    region.create(dom, ctx);
                    None
                }
            };
        }
        self.apply_all(dom, ctx);
    }

    fn claim(&mut self, dom: &Dom, ctx: &[Value], nodes: &mut Vec<NodeId>) {
        *self.ctx.borrow_mut() = ctx.to_vec();
        let mut pools: HashMap<usize, Vec<NodeId>> = HashMap::new();

        for index in 0..self.parts.len() {
            let parent = self.parts[index].parent;
            let node = {
                let pool: &mut Vec<NodeId> = match parent {
                    None => &mut *nodes,
                    Some(p) => pools.entry(p).or_default(),
                };
                match &mut self.parts[index].kind {
                    PartKind::Element { tag, attrs } => {
                        let node = take_matching(dom, pool, Some(tag.as_str()))
                            .unwrap_or_else(|| dom.create_element(tag));
                        for (name, value) in attrs.iter() {
                            dom.set_attr(node, name, Some(value));
                        }
                        Some(node)
                    }
                    PartKind::Text(text) => {
                        let node = take_matching(dom, pool, None)
                            .unwrap_or_else(|| dom.create_text(text));
                        dom.set_data(node, text);
                        Some(node)
                    }
                    PartKind::Region(region) => {
                        region.claim(dom, ctx, pool);
                        None
                    }
                }
            };

            if let (Some(node), PartKind::Element { .. }) = (node, &self.parts[index].kind) {
                pools.insert(index, dom.children(node));
            }
            self.nodes[index] = node;
        }

        for leftover in pools.into_values().flatten() {
            dom.discard(leftover);
        }
        self.apply_all(dom, ctx);
    }

    fn mount(&mut self, dom: &Dom, target: NodeId, anchor: Option<NodeId>) {
        let first_mount = !self.mounted;
        let nodes = &self.nodes;

        for (index, part) in self.parts.iter_mut().enumerate() {
            let (container, before) = match part.parent {
                None => (target, anchor),
                // Nested parts move with their top-level ancestor.
                Some(_) if !first_mount => continue,
                Some(parent) => match nodes[parent] {
                    Some(node) => (node, None),
                    None => continue,
                },
            };
            match &mut part.kind {
                PartKind::Region(region) => region.mount(dom, container, before),
                _ => {
                    if let Some(node) = nodes[index] {
                        dom.insert(container, node, before);
                    }
                }
            }
        }

        if first_mount {
            self.mounted = true;
            self.attach_listeners(dom);

            let scheduler = self.runtime.scheduler();
            for (part, callback) in &self.refs {
                if let Some(node) = self.nodes[*part] {
                    let callback = callback.clone();
                    scheduler.add_binding_callback(move || callback(Some(node)));
                }
            }
        }
    }

    fn patch(&mut self, dom: &Dom, ctx: &[Value], dirty: &DirtyMask) {
        *self.ctx.borrow_mut() = ctx.to_vec();

        if dirty.is_all() {
            self.apply_all(dom, ctx);
        } else {
            let mut hit = vec![false; self.bindings.len()];
            for slot in dirty.iter() {
                if let Some(bindings) = self.by_slot.get(slot) {
                    for &binding in bindings {
                        hit[binding] = true;
                    }
                }
            }
            for (index, _) in hit.iter().enumerate().filter(|(_, hit)| **hit) {
                self.apply(dom, index, ctx);
            }
        }

        for part in &mut self.parts {
            if let PartKind::Region(region) = &mut part.kind {
                region.patch(dom, ctx, dirty);
            }
        }
    }

    fn intro(&mut self) {
        for part in &mut self.parts {
            if let PartKind::Region(region) = &mut part.kind {
                region.intro();
            }
        }
    }

    fn first(&self) -> Option<NodeId> {
        self.parts
            .iter()
            .enumerate()
            .filter(|(_, part)| part.parent.is_none())
            .find_map(|(index, part)| match &part.kind {
                PartKind::Region(region) => region.first(),
                _ => self.nodes[index],
            })
    }

    fn destroy(&mut self, dom: &Dom, detaching: bool) {
        for (node, id) in self.attached.drain(..) {
            dom.unlisten(node, id);
        }

        if self.mounted {
            let scheduler = self.runtime.scheduler();
            for (_, callback) in &self.refs {
                let callback = callback.clone();
                scheduler.add_binding_callback(move || callback(None));
            }
        }

        for part in &mut self.parts {
            if let PartKind::Region(region) = &mut part.kind {
                region.destroy(dom, detaching && part.parent.is_none());
            }
        }

        if detaching {
            for (index, part) in self.parts.iter().enumerate() {
                if part.parent.is_none() {
                    if let Some(node) = self.nodes[index] {
                        dom.discard(node);
                    }
                }
            }
        }
        self.nodes.iter_mut().for_each(|node| *node = None);
        self.mounted = false;
    }
}

// =============================================================================
// Child components
// =============================================================================

struct ChildComponent {
    component: Component,
    deps: SmallVec<[usize; 4]>,
    props: Box<dyn Fn(&[Value]) -> Props>,
}

impl Fragment for ChildComponent {
    fn create(&mut self, _dom: &Dom, _ctx: &[Value]) {
        self.component.create_fragment();
    }

    fn claim(&mut self, _dom: &Dom, _ctx: &[Value], nodes: &mut Vec<NodeId>) {
        self.component.claim_fragment(nodes);
    }

    fn mount(&mut self, _dom: &Dom, target: NodeId, anchor: Option<NodeId>) {
        if self.component.is_mounted() {
            self.component.move_fragment(target, anchor);
        } else {
            self.component.mount_fragment(target, anchor);
        }
    }

    fn patch(&mut self, _dom: &Dom, ctx: &[Value], dirty: &DirtyMask) {
        if !dirty.any(&self.deps) {
            return;
        }
        if let Err(err) = self.component.set_props(&(self.props)(ctx)) {
            tracing::debug!(%err, component = self.component.id(), "child props not applied");
        }
    }

    fn first(&self) -> Option<NodeId> {
        self.component.first_node()
    }

    fn destroy(&mut self, _dom: &Dom, detaching: bool) {
        self.component.destroy_with(detaching);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::Cell;

    fn built(rt: &Runtime, t: Template, ctx: &[Value]) -> (NodeId, TemplateFragment) {
        let root = rt.dom().create_element("div");
        let mut fragment = t.build();
        fragment.create(rt.dom(), ctx);
        fragment.mount(rt.dom(), root, None);
        (root, fragment)
    }

    #[test]
    fn test_static_and_dynamic_parts_render() {
        let rt = Runtime::new();
        let mut t = Template::new(&rt);
        let p = t.element(None, "p");
        t.attr(p, "class", "greeting");
        t.text(Some(p), "Hi ");
        t.dynamic_text(Some(p), &[0], |ctx| ctx[0].as_str().unwrap_or_default().to_string());

        let (root, _fragment) = built(&rt, t, &[json!("Ann")]);
        assert_eq!(rt.dom().to_html(root), r#"<div><p class="greeting">Hi Ann</p></div>"#);
    }

    #[test]
    fn test_patch_only_touches_dirty_bindings() {
        let rt = Runtime::new();
        let calls = Rc::new(Cell::new((0, 0)));
        let mut t = Template::new(&rt);

        let a = calls.clone();
        t.dynamic_text(None, &[0], move |ctx| {
            let (x, y) = a.get();
            a.set((x + 1, y));
            ctx[0].to_string()
        });
        let b = calls.clone();
        t.dynamic_text(None, &[1], move |ctx| {
            let (x, y) = b.get();
            b.set((x, y + 1));
            ctx[1].to_string()
        });

        let (root, mut fragment) = built(&rt, t, &[json!(1), json!(2)]);
        assert_eq!(calls.get(), (1, 1));

        fragment.patch(rt.dom(), &[json!(1), json!(3)], &DirtyMask::from_slots(&[1]));
        assert_eq!(calls.get(), (1, 2));
        assert_eq!(rt.dom().text_content(root), "13");

        fragment.patch(rt.dom(), &[json!(5), json!(3)], &DirtyMask::All);
        assert_eq!(calls.get(), (2, 3));
        assert_eq!(rt.dom().text_content(root), "53");
    }

    #[test]
    fn test_dynamic_attr_removed_on_none() {
        let rt = Runtime::new();
        let mut t = Template::new(&rt);
        let input = t.element(None, "input");
        t.dynamic_attr(input, "disabled", &[0], |ctx| {
            ctx[0].as_bool().unwrap_or_default().then(String::new)
        });

        let (_root, mut fragment) = built(&rt, t, &[json!(true)]);
        let node = fragment.node(input).unwrap_or_else(|| panic!("input not created"));
        assert_eq!(rt.dom().attr(node, "disabled").as_deref(), Some(""));

        fragment.patch(rt.dom(), &[json!(false)], &DirtyMask::from_slots(&[0]));
        assert_eq!(rt.dom().attr(node, "disabled"), None);
    }

    #[test]
    fn test_listener_sees_latest_ctx_and_is_removed_on_destroy() {
        let rt = Runtime::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut t = Template::new(&rt);
        let button = t.element(None, "button");
        let log = seen.clone();
        t.on(button, "click", move |_event, ctx| log.borrow_mut().push(ctx[0].clone()));

        let (_root, mut fragment) = built(&rt, t, &[json!("first")]);
        let node = fragment.node(button).unwrap_or_else(|| panic!("button not created"));

        rt.dom().dispatch(node, "click", Value::Null);
        fragment.patch(rt.dom(), &[json!("second")], &DirtyMask::from_slots(&[0]));
        rt.dom().dispatch(node, "click", Value::Null);
        assert_eq!(*seen.borrow(), vec![json!("first"), json!("second")]);

        fragment.destroy(rt.dom(), true);
        assert!(!rt.dom().is_alive(node));
    }

    #[test]
    fn test_bind_this_queues_through_scheduler() {
        let rt = Runtime::new();
        let bound = Rc::new(Cell::new(None));
        let mut t = Template::new(&rt);
        let div = t.element(None, "section");
        let slot = bound.clone();
        t.bind_this(div, move |node| slot.set(node));

        let (_root, mut fragment) = built(&rt, t, &[]);
        assert_eq!(bound.get(), None, "bind callbacks wait for the flush");

        rt.flush();
        assert!(bound.get().is_some());

        fragment.destroy(rt.dom(), true);
        rt.flush();
        assert_eq!(bound.get(), None);
    }

    /// `<b></b>` counting its on-mount runs.
    struct Mounts {
        hits: Rc<Cell<usize>>,
    }

    impl crate::component::ComponentDef for Mounts {
        fn slot_count(&self) -> usize {
            0
        }

        fn instance(&self, cx: &Component, _props: &Props) -> crate::error::Result<()> {
            let hits = self.hits.clone();
            crate::runtime::on_mount(cx.runtime(), move || {
                hits.set(hits.get() + 1);
                None
            })
        }

        fn fragment(&self, cx: &Component) -> Option<Box<dyn Fragment>> {
            let mut t = Template::new(cx.runtime());
            t.element(None, "b");
            Some(Box::new(t.build()))
        }
    }

    #[test]
    fn test_moving_child_component_queues_no_hooks() {
        let rt = Runtime::new();
        let hits = Rc::new(Cell::new(0));
        let child = Component::new(
            &rt,
            Rc::new(Mounts { hits: hits.clone() }),
            crate::component::ComponentOptions::default(),
        )
        .unwrap_or_else(|err| panic!("{err}"));

        let mut t = Template::new(&rt);
        t.component(None, child, &[], |_ctx| Props::new());
        let (root, mut fragment) = built(&rt, t, &[]);
        rt.flush();
        assert_eq!(hits.get(), 1);
        let flushes = rt.scheduler().stats().flushes;

        let other = rt.dom().create_element("section");
        fragment.mount(rt.dom(), other, None);
        rt.flush();

        assert_eq!(rt.scheduler().stats().flushes, flushes, "a move leaves nothing to flush");
        assert_eq!(hits.get(), 1);
        assert_eq!(rt.dom().to_html(other), "<section><b></b></section>");
        assert_eq!(rt.dom().to_html(root), "<div></div>");
    }

    #[test]
    fn test_claim_reuses_matching_nodes() {
        let rt = Runtime::new();
        let dom = rt.dom();
        let target = dom.create_element("div");
        let existing = dom.create_element("p");
        dom.append(target, existing);
        dom.append(existing, dom.create_text("stale"));
        let stray = dom.create_element("span");
        dom.append(target, stray);

        let mut t = Template::new(&rt);
        let p = t.element(None, "p");
        t.dynamic_text(Some(p), &[0], |ctx| ctx[0].as_str().unwrap_or_default().to_string());
        let mut fragment = t.build();

        let mut nodes = dom.children(target);
        fragment.claim(dom, &[json!("fresh")], &mut nodes);
        assert_eq!(nodes, vec![stray]);
        assert_eq!(fragment.node(p), Some(existing));

        for node in nodes {
            dom.discard(node);
        }
        fragment.mount(dom, target, None);
        assert_eq!(dom.to_html(target), "<div><p>fresh</p></div>");
    }
}
