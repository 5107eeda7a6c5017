//! Keyed `each` regions.
//!
//! An [`EachBlock`] renders one fragment per item of a list slot and keeps
//! them in line with the list through [`KeyedList::reconcile`]. It owns an
//! empty anchor node that marks where the region ends, so the region can sit
//! between other siblings.
//!
//! # Item scope
//!
//! Each item fragment renders from the parent's slots followed by two more:
//!
//! ```text
//! ctx[0 .. n]   parent slots
//! ctx[n]        the item value
//! ctx[n + 1]    the item's index in the list
//! ```
//!
//! Whenever the region re-runs, both item slots are treated as dirty.

use std::collections::HashMap;

use serde_json::Value;
use smallvec::SmallVec;

use crate::blocks::{BlockKey, KeyedItem, KeyedList};
use crate::component::Fragment;
use crate::dom::{Dom, NodeId};
use crate::error::RuntimeError;
use crate::runtime::{DirtyMask, Runtime};

type ItemsFn = Box<dyn Fn(&[Value]) -> Vec<Value>>;
type KeyFn<K> = Box<dyn Fn(&Value, usize) -> K>;
type RenderFn<K> = Box<dyn Fn(&K) -> Box<dyn Fragment>>;

/// Keyed list region of a template.
pub struct EachBlock<K: BlockKey> {
    validate_keys: bool,
    deps: SmallVec<[usize; 4]>,
    items: ItemsFn,
    key: KeyFn<K>,
    render: RenderFn<K>,
    list: KeyedList<K>,
    anchor: Option<NodeId>,
}

impl<K: BlockKey> EachBlock<K> {
    /// Create a region.
    ///
    /// # Arguments
    ///
    /// * `runtime` - Supplies the duplicate-key policy
    /// * `deps` - Every parent slot the region or its items read
    /// * `items` - Derives the list from the parent's slots
    /// * `key` - Extracts an item's key (given the item and its index)
    /// * `render` - Builds the fragment for a new key
    pub fn new(
        runtime: &Runtime,
        deps: &[usize],
        items: impl Fn(&[Value]) -> Vec<Value> + 'static,
        key: impl Fn(&Value, usize) -> K + 'static,
        render: impl Fn(&K) -> Box<dyn Fragment> + 'static,
    ) -> Self {
        Self {
            validate_keys: runtime.config().validate_keys,
            deps: SmallVec::from_slice(deps),
            items: Box::new(items),
            key: Box::new(key),
            render: Box::new(render),
            list: KeyedList::default(),
            anchor: None,
        }
    }

    /// Slot index of the item value for a parent with `parent_slots` slots.
    pub const fn item_slot(parent_slots: usize) -> usize {
        parent_slots
    }

    /// Slot index of the item index for a parent with `parent_slots` slots.
    pub const fn index_slot(parent_slots: usize) -> usize {
        parent_slots + 1
    }

    /// Keys currently rendered, in order.
    pub fn keys(&self) -> Vec<K> {
        self.list.keys()
    }

    fn child_items(&self, ctx: &[Value]) -> Vec<KeyedItem<K>> {
        let values = (self.items)(ctx);
        let mut seen: HashMap<K, usize> = HashMap::new();
        let mut items = Vec::with_capacity(values.len());

        for (index, value) in values.into_iter().enumerate() {
            let key = (self.key)(&value, index);
            if self.validate_keys {
                if let Some(&first) = seen.get(&key) {
                    let err = RuntimeError::DuplicateKey {
                        key: format!("{key:?}"),
                        first,
                        second: index,
                    };
                    tracing::error!(%err, "duplicate key dropped from each");
                    continue;
                }
                seen.insert(key.clone(), index);
            }

            let mut child = Vec::with_capacity(ctx.len() + 2);
            child.extend_from_slice(ctx);
            child.push(value);
            child.push(Value::from(index));
            items.push(KeyedItem::new(key, child));
        }
        items
    }

    fn child_dirty(dirty: &DirtyMask, parent_slots: usize) -> DirtyMask {
        let mut child = dirty.clone();
        child.mark(Self::item_slot(parent_slots));
        child.mark(Self::index_slot(parent_slots));
        child
    }
}

impl<K: BlockKey> Fragment for EachBlock<K> {
    fn create(&mut self, dom: &Dom, ctx: &[Value]) {
        self.anchor = Some(dom.create_anchor());
        let items = self.child_items(ctx);
        let render = &self.render;
        self.list = KeyedList::create(dom, items, |key| render(key));
    }

    fn mount(&mut self, dom: &Dom, target: NodeId, anchor: Option<NodeId>) {
        self.list.mount(dom, target, anchor);
        if let Some(own) = self.anchor {
            dom.insert(target, own, anchor);
        }
    }

    fn patch(&mut self, dom: &Dom, ctx: &[Value], dirty: &DirtyMask) {
        if !dirty.any(&self.deps) {
            return;
        }
        let Some(anchor) = self.anchor else { return };
        let Some(parent) = dom.parent(anchor) else { return };

        let items = self.child_items(ctx);
        let child_dirty = Self::child_dirty(dirty, ctx.len());
        let render = &self.render;
        self.list
            .reconcile(dom, parent, Some(anchor), items, &child_dirty, |key| render(key));
    }

    fn first(&self) -> Option<NodeId> {
        self.list.first().or(self.anchor)
    }

    fn destroy(&mut self, dom: &Dom, detaching: bool) {
        self.list.destroy(dom, detaching);
        if let (true, Some(anchor)) = (detaching, self.anchor.take()) {
            dom.discard(anchor);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use serde_json::json;

    /// Renders `<li>` with the item's `name`.
    struct Li {
        node: Option<NodeId>,
        item_slot: usize,
    }

    impl Fragment for Li {
        fn create(&mut self, dom: &Dom, ctx: &[Value]) {
            let li = dom.create_element("li");
            dom.set_text_content(li, ctx[self.item_slot]["name"].as_str().unwrap_or_default());
            self.node = Some(li);
        }

        fn mount(&mut self, dom: &Dom, target: NodeId, anchor: Option<NodeId>) {
            if let Some(node) = self.node {
                dom.insert(target, node, anchor);
            }
        }

        fn patch(&mut self, dom: &Dom, ctx: &[Value], dirty: &DirtyMask) {
            if let (Some(node), true) = (self.node, dirty.is_dirty(self.item_slot)) {
                dom.set_text_content(node, ctx[self.item_slot]["name"].as_str().unwrap_or_default());
            }
        }

        fn first(&self) -> Option<NodeId> {
            self.node
        }

        fn destroy(&mut self, dom: &Dom, detaching: bool) {
            if let (true, Some(node)) = (detaching, self.node.take()) {
                dom.discard(node);
            }
        }
    }

    fn people(rt: &Runtime) -> EachBlock<i64> {
        EachBlock::new(
            rt,
            &[0],
            |ctx| ctx[0].as_array().cloned().unwrap_or_default(),
            |item, _| item["id"].as_i64().unwrap_or_default(),
            |_| Box::new(Li { node: None, item_slot: EachBlock::<i64>::item_slot(1) }),
        )
    }

    #[test]
    fn test_each_renders_and_updates_before_trailing_sibling() {
        let rt = Runtime::new();
        let dom = rt.dom();
        let ul = dom.create_element("ul");
        let footer = dom.create_element("li");
        dom.append(ul, footer);

        let mut each = people(&rt);
        let ctx = vec![json!([{"id": 1, "name": "Ann"}, {"id": 2, "name": "Bo"}])];
        each.create(dom, &ctx);
        each.mount(dom, ul, Some(footer));
        assert_eq!(dom.to_html(ul), "<ul><li>Ann</li><li>Bo</li><li></li></ul>");

        let ctx = vec![json!([{"id": 2, "name": "Bob"}, {"id": 3, "name": "Cy"}, {"id": 1, "name": "Ann"}])];
        each.patch(dom, &ctx, &DirtyMask::from_slots(&[0]));
        assert_eq!(dom.to_html(ul), "<ul><li>Bob</li><li>Cy</li><li>Ann</li><li></li></ul>");
        assert_eq!(each.keys(), vec![2, 3, 1]);
    }

    #[test]
    fn test_each_skips_patch_when_deps_clean() {
        let rt = Runtime::new();
        let dom = rt.dom();
        let ul = dom.create_element("ul");

        let mut each = people(&rt);
        each.create(dom, &[json!([{"id": 1, "name": "Ann"}])]);
        each.mount(dom, ul, None);

        each.patch(dom, &[json!([])], &DirtyMask::from_slots(&[3]));
        assert_eq!(each.keys(), vec![1]);
    }

    #[test]
    fn test_duplicate_keys_keep_first() {
        let rt = Runtime::new();
        let dom = rt.dom();
        let ul = dom.create_element("ul");

        let mut each = people(&rt);
        each.create(dom, &[json!([{"id": 1, "name": "Ann"}, {"id": 1, "name": "Dup"}, {"id": 2, "name": "Bo"}])]);
        each.mount(dom, ul, None);

        assert_eq!(each.keys(), vec![1, 2]);
        assert_eq!(dom.text_content(ul), "AnnBo");
    }

    #[test]
    fn test_destroy_detaching_clears_region() {
        let rt = Runtime::with_config(RuntimeConfig::default());
        let dom = rt.dom();
        let ul = dom.create_element("ul");

        let mut each = people(&rt);
        each.create(dom, &[json!([{"id": 1, "name": "Ann"}])]);
        each.mount(dom, ul, None);
        each.destroy(dom, true);

        assert!(dom.children(ul).is_empty());
    }
}
