//! Keyed Reconciler - incremental diff of an ordered list of keyed blocks.
//!
//! # Algorithm
//!
//! ```text
//! 1. index old positions by key
//! 2. walk the new items back to front:
//!      known key -> reuse + patch     new key -> create (detached)
//!      delta[key] = |old_pos - new_pos| for keys in both lists
//! 3. walk old (o) and new (n) from the end:
//!      same block            -> anchor = its first node, o--, n--
//!      old key gone          -> destroy old, o--
//!      new key unplaced      -> insert new before anchor, n--
//!        or flagged will_move
//!      old key did_move      -> o--
//!      delta[new] > delta[old] -> move new now (did_move), n--
//!      otherwise             -> flag old will_move, o--
//! 4. destroy leftover old blocks whose key vanished, insert leftover new
//! ```
//!
//! This is a greedy heuristic. It always reuses blocks for surviving keys
//! and keeps moves low for typical edits (one item moved, inserted or
//! removed) without computing a longest increasing subsequence.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::hash::Hash;
use std::rc::Rc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::component::Fragment;
use crate::dom::{Dom, NodeId};
use crate::error::{Result, RuntimeError};
use crate::runtime::DirtyMask;

/// Requirements on a list key.
pub trait BlockKey: Clone + Eq + Hash + Debug + 'static {}

impl<T: Clone + Eq + Hash + Debug + 'static> BlockKey for T {}

// =============================================================================
// Blocks
// =============================================================================

/// One rendered item of a keyed list.
pub struct KeyedBlock<K> {
    key: K,
    fragment: Box<dyn Fragment>,
}

impl<K> KeyedBlock<K> {
    pub fn key(&self) -> &K {
        &self.key
    }

    /// First DOM node of the block.
    pub fn first(&self) -> Option<NodeId> {
        self.fragment.first()
    }

    pub fn fragment(&self) -> &dyn Fragment {
        self.fragment.as_ref()
    }
}

impl<K: Debug> Debug for KeyedBlock<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyedBlock")
            .field("key", &self.key)
            .field("first", &self.first())
            .finish()
    }
}

/// Shared handle to a block. Identity (`Rc::ptr_eq`) is block identity.
pub type BlockRef<K> = Rc<RefCell<KeyedBlock<K>>>;

/// Input item: its key and the slot values its fragment renders from.
#[derive(Clone, Debug, PartialEq)]
pub struct KeyedItem<K> {
    pub key: K,
    pub ctx: Vec<Value>,
}

impl<K> KeyedItem<K> {
    pub fn new(key: K, ctx: Vec<Value>) -> Self {
        Self { key, ctx }
    }
}

/// What one reconciliation did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Blocks built for keys not in the old list.
    pub created: usize,
    /// Reused blocks patched with new slot values.
    pub patched: usize,
    /// New blocks inserted into the DOM.
    pub inserted: usize,
    /// Reused blocks repositioned.
    pub moved: usize,
    /// Blocks whose key vanished.
    pub destroyed: usize,
}

/// Check `keys` for duplicates.
///
/// # Errors
///
/// `DuplicateKey` naming the first repeated key and both positions.
pub fn validate_keys<'a, K: BlockKey>(keys: impl IntoIterator<Item = &'a K>) -> Result<()> {
    let mut seen: HashMap<&K, usize> = HashMap::new();
    for (position, key) in keys.into_iter().enumerate() {
        if let Some(&first) = seen.get(key) {
            return Err(RuntimeError::DuplicateKey {
                key: format!("{key:?}"),
                first,
                second: position,
            });
        }
        seen.insert(key, position);
    }
    Ok(())
}

// =============================================================================
// KeyedList
// =============================================================================

/// Ordered keyed blocks plus a key lookup.
///
/// `blocks` is DOM order; `lookup` holds every block currently placed in
/// the DOM. Keys must be unique within one call; see [`validate_keys`].
pub struct KeyedList<K: BlockKey> {
    blocks: Vec<BlockRef<K>>,
    lookup: IndexMap<K, BlockRef<K>>,
}

impl<K: BlockKey> Default for KeyedList<K> {
    fn default() -> Self {
        Self {
            blocks: Vec::new(),
            lookup: IndexMap::new(),
        }
    }
}

impl<K: BlockKey> KeyedList<K> {
    /// Build one detached block per item, in order.
    pub fn create(
        dom: &Dom,
        items: Vec<KeyedItem<K>>,
        mut create: impl FnMut(&K) -> Box<dyn Fragment>,
    ) -> Self {
        let mut list = Self::default();
        for item in items {
            let mut fragment = create(&item.key);
            fragment.create(dom, &item.ctx);
            let block = Rc::new(RefCell::new(KeyedBlock {
                key: item.key.clone(),
                fragment,
            }));
            list.lookup.insert(item.key, block.clone());
            list.blocks.push(block);
        }
        tracing::trace!(blocks = list.blocks.len(), "keyed list created");
        list
    }

    /// Insert every block under `parent`, before `anchor`, in order.
    pub fn mount(&mut self, dom: &Dom, parent: NodeId, anchor: Option<NodeId>) {
        for block in &self.blocks {
            block.borrow_mut().fragment.mount(dom, parent, anchor);
        }
    }

    /// Destroy every block.
    pub fn destroy(&mut self, dom: &Dom, detaching: bool) {
        for block in self.blocks.drain(..) {
            block.borrow_mut().fragment.destroy(dom, detaching);
        }
        self.lookup.clear();
    }

    /// Blocks in DOM order.
    pub fn blocks(&self) -> &[BlockRef<K>] {
        &self.blocks
    }

    /// Keys in DOM order.
    pub fn keys(&self) -> Vec<K> {
        self.blocks.iter().map(|b| b.borrow().key.clone()).collect()
    }

    pub fn get(&self, key: &K) -> Option<BlockRef<K>> {
        self.lookup.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// First DOM node of the first block that has one.
    pub fn first(&self) -> Option<NodeId> {
        self.blocks.iter().find_map(|b| b.borrow().first())
    }

    /// Bring the list and the DOM under `parent` in line with `items`.
    ///
    /// `anchor` is the node the list ends before (`None` for the end of
    /// `parent`). Reused blocks are patched with `dirty`; new keys get a
    /// fragment from `create`.
    pub fn reconcile(
        &mut self,
        dom: &Dom,
        parent: NodeId,
        anchor: Option<NodeId>,
        items: Vec<KeyedItem<K>>,
        dirty: &DirtyMask,
        mut create: impl FnMut(&K) -> Box<dyn Fragment>,
    ) -> ReconcileOutcome {
        let mut outcome = ReconcileOutcome::default();
        let old_blocks = std::mem::take(&mut self.blocks);

        let old_indexes: HashMap<K, usize> = old_blocks
            .iter()
            .enumerate()
            .map(|(i, b)| (b.borrow().key.clone(), i))
            .collect();

        // Back to front: reuse or create, record deltas.
        let mut new_blocks: Vec<Option<BlockRef<K>>> = vec![None; items.len()];
        let mut new_keys: HashSet<K> = HashSet::with_capacity(items.len());
        let mut deltas: HashMap<K, usize> = HashMap::new();

        for (i, item) in items.into_iter().enumerate().rev() {
            let block = match self.lookup.get(&item.key) {
                Some(block) => {
                    block.borrow_mut().fragment.patch(dom, &item.ctx, dirty);
                    outcome.patched += 1;
                    block.clone()
                }
                None => {
                    let mut fragment = create(&item.key);
                    fragment.create(dom, &item.ctx);
                    outcome.created += 1;
                    Rc::new(RefCell::new(KeyedBlock {
                        key: item.key.clone(),
                        fragment,
                    }))
                }
            };

            if let Some(&old) = old_indexes.get(&item.key) {
                deltas.insert(item.key.clone(), old.abs_diff(i));
            }
            new_keys.insert(item.key);
            new_blocks[i] = Some(block);
        }
        let new_blocks: Vec<BlockRef<K>> = new_blocks.into_iter().flatten().collect();

        let mut will_move: HashSet<K> = HashSet::new();
        let mut did_move: HashSet<K> = HashSet::new();
        let mut next = anchor;
        let mut o = old_blocks.len();
        let mut n = new_blocks.len();

        while o > 0 && n > 0 {
            let new_block = &new_blocks[n - 1];
            let old_block = &old_blocks[o - 1];
            let new_key = new_block.borrow().key.clone();
            let old_key = old_block.borrow().key.clone();

            if Rc::ptr_eq(new_block, old_block) {
                next = new_block.borrow().first().or(next);
                o -= 1;
                n -= 1;
            } else if !new_keys.contains(&old_key) {
                self.destroy_block(dom, old_block, &mut outcome);
                o -= 1;
            } else if !self.lookup.contains_key(&new_key) || will_move.contains(&new_key) {
                self.insert_block(dom, parent, new_block, &mut next, &mut outcome);
                n -= 1;
            } else if did_move.contains(&old_key) {
                o -= 1;
            } else if deltas.get(&new_key) > deltas.get(&old_key) {
                did_move.insert(new_key);
                self.insert_block(dom, parent, new_block, &mut next, &mut outcome);
                n -= 1;
            } else {
                will_move.insert(old_key);
                o -= 1;
            }
        }

        while o > 0 {
            o -= 1;
            let old_block = &old_blocks[o];
            let vanished = !new_keys.contains(&old_block.borrow().key);
            if vanished {
                self.destroy_block(dom, old_block, &mut outcome);
            }
        }

        while n > 0 {
            self.insert_block(dom, parent, &new_blocks[n - 1], &mut next, &mut outcome);
            n -= 1;
        }

        self.blocks = new_blocks;
        tracing::debug!(?outcome, blocks = self.blocks.len(), "keyed list reconciled");
        outcome
    }

    fn insert_block(
        &mut self,
        dom: &Dom,
        parent: NodeId,
        block: &BlockRef<K>,
        next: &mut Option<NodeId>,
        outcome: &mut ReconcileOutcome,
    ) {
        let key = block.borrow().key.clone();
        block.borrow_mut().fragment.mount(dom, parent, *next);

        if self.lookup.insert(key.clone(), block.clone()).is_some() {
            outcome.moved += 1;
            tracing::trace!(?key, "block moved");
        } else {
            outcome.inserted += 1;
            tracing::trace!(?key, "block inserted");
        }
        *next = block.borrow().first().or(*next);
    }

    fn destroy_block(&mut self, dom: &Dom, block: &BlockRef<K>, outcome: &mut ReconcileOutcome) {
        let key = block.borrow().key.clone();
        block.borrow_mut().fragment.destroy(dom, true);
        self.lookup.shift_remove(&key);
        outcome.destroyed += 1;
        tracing::trace!(?key, "block destroyed");
    }
}

impl<K: BlockKey> Debug for KeyedList<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyedList").field("keys", &self.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// A block rendering one text node with its first slot.
    struct Row {
        node: Option<NodeId>,
    }

    impl Fragment for Row {
        fn create(&mut self, dom: &Dom, ctx: &[Value]) {
            let text = ctx.first().and_then(Value::as_str).unwrap_or_default();
            self.node = Some(dom.create_text(text));
        }

        fn mount(&mut self, dom: &Dom, target: NodeId, anchor: Option<NodeId>) {
            if let Some(node) = self.node {
                dom.insert(target, node, anchor);
            }
        }

        fn patch(&mut self, dom: &Dom, ctx: &[Value], _dirty: &DirtyMask) {
            if let (Some(node), Some(text)) = (self.node, ctx.first().and_then(Value::as_str)) {
                dom.set_data(node, text);
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

    fn items(keys: &[&'static str]) -> Vec<KeyedItem<&'static str>> {
        keys.iter().map(|&k| KeyedItem::new(k, vec![json!(k)])).collect()
    }

    fn row(_key: &&'static str) -> Box<dyn Fragment> {
        Box::new(Row { node: None })
    }

    fn setup(keys: &[&'static str]) -> (Dom, NodeId, KeyedList<&'static str>) {
        let dom = Dom::new();
        let parent = dom.create_element("ul");
        let mut list = KeyedList::create(&dom, items(keys), row);
        list.mount(&dom, parent, None);
        dom.reset_stats();
        (dom, parent, list)
    }

    #[test]
    fn test_rotation_moves_one_block() {
        let (dom, parent, mut list) = setup(&["a", "b", "c"]);
        let before: Vec<_> = list.blocks().to_vec();

        let outcome = list.reconcile(&dom, parent, None, items(&["c", "a", "b"]), &DirtyMask::All, row);

        assert_eq!(outcome.moved, 1, "only c should move");
        assert_eq!(outcome.created, 0);
        assert_eq!(outcome.destroyed, 0);
        assert_eq!(dom.text_content(parent), "cab");
        for block in &before {
            let key = block.borrow().key;
            let after = list.get(&key).unwrap_or_else(|| panic!("{key} missing"));
            assert!(Rc::ptr_eq(block, &after), "{key} must keep its block");
        }
        assert_eq!(dom.stats().moves, 1);
    }

    #[test]
    fn test_insert_in_middle() {
        let (dom, parent, mut list) = setup(&["a", "b"]);

        let outcome = list.reconcile(&dom, parent, None, items(&["a", "c", "b"]), &DirtyMask::All, row);

        assert_eq!(outcome.created, 1);
        assert_eq!(outcome.inserted, 1);
        assert_eq!(outcome.moved, 0);
        assert_eq!(dom.text_content(parent), "acb");
        assert_eq!(dom.stats().moves, 0);
    }

    #[test]
    fn test_identity_reconcile_is_free() {
        let (dom, parent, mut list) = setup(&["a", "b", "c", "d"]);

        let outcome = list.reconcile(&dom, parent, None, items(&["a", "b", "c", "d"]), &DirtyMask::All, row);

        assert_eq!(outcome.inserted + outcome.moved + outcome.destroyed + outcome.created, 0);
        assert_eq!(outcome.patched, 4);
        assert_eq!(dom.stats().inserts + dom.stats().moves + dom.stats().removals, 0);
    }

    #[test]
    fn test_removal_and_clear() {
        let (dom, parent, mut list) = setup(&["a", "b", "c"]);

        let outcome = list.reconcile(&dom, parent, None, items(&["a", "c"]), &DirtyMask::All, row);
        assert_eq!(outcome.destroyed, 1);
        assert_eq!(dom.text_content(parent), "ac");
        assert!(list.get(&"b").is_none());

        let outcome = list.reconcile(&dom, parent, None, Vec::new(), &DirtyMask::All, row);
        assert_eq!(outcome.destroyed, 2);
        assert!(list.is_empty());
        assert_eq!(dom.children(parent).len(), 0);
    }

    #[test]
    fn test_reverse_keeps_blocks() {
        let (dom, parent, mut list) = setup(&["a", "b", "c", "d", "e"]);

        let outcome = list.reconcile(&dom, parent, None, items(&["e", "d", "c", "b", "a"]), &DirtyMask::All, row);

        assert_eq!(outcome.created, 0);
        assert_eq!(dom.text_content(parent), "edcba");
        assert_eq!(list.keys(), vec!["e", "d", "c", "b", "a"]);
    }

    #[test]
    fn test_respects_trailing_anchor() {
        let dom = Dom::new();
        let parent = dom.create_element("div");
        let tail = dom.create_text("|");
        dom.append(parent, tail);

        let mut list = KeyedList::create(&dom, items(&["a"]), row);
        list.mount(&dom, parent, Some(tail));
        list.reconcile(&dom, parent, Some(tail), items(&["b", "a", "c"]), &DirtyMask::All, row);

        assert_eq!(dom.text_content(parent), "bac|");
    }

    #[test]
    fn test_validate_keys_reports_positions() {
        assert!(validate_keys(&["a", "b"]).is_ok());
        assert_eq!(
            validate_keys(&["a", "b", "a"]),
            Err(RuntimeError::DuplicateKey {
                key: "\"a\"".into(),
                first: 0,
                second: 2,
            })
        );
    }
}
