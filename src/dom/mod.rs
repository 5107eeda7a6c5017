//! Retained DOM - the live node tree components render into.
//!
//! Nodes live in an arena and are addressed by generational [`NodeId`]s.
//! Freed slots go back to a pool for O(1) reuse; a stale id (one whose slot
//! was freed and reused) is simply ignored by every operation.
//!
//! # Operations
//!
//! The tree exposes exactly the mutation primitives a compiled component
//! needs:
//! - `create_element` / `create_text` / `create_anchor` - detached nodes
//! - `insert(parent, node, anchor)` - insert before `anchor` (or append);
//!   inserting an attached node moves it
//! - `detach` / `discard` - unlink, or unlink and free the whole subtree
//! - `set_attr` / `set_data` - write only when the value actually changes
//! - `listen` / `dispatch` - bubbling events
//!
//! Every structural write is counted in [`DomStats`] so callers can assert
//! how much DOM work an update did.

mod events;
mod html;

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;
use serde_json::Value;

pub use events::{Event, EventHandler, ListenerId};

// =============================================================================
// Types
// =============================================================================

/// Generational handle to a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

/// What a node is.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Element {
        tag: String,
        attrs: IndexMap<String, String>,
    },
    Text(String),
}

/// One recorded DOM mutation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Mutation {
    /// A detached node was placed under `parent`.
    Insert {
        node: NodeId,
        parent: NodeId,
        anchor: Option<NodeId>,
    },
    /// An attached node was moved (possibly under a new parent).
    Move {
        node: NodeId,
        parent: NodeId,
        anchor: Option<NodeId>,
    },
    /// A node was unlinked from `parent`.
    Detach { node: NodeId, parent: NodeId },
    /// A text node's data changed.
    SetData { node: NodeId, data: String },
    /// An attribute was set (`Some`) or removed (`None`).
    SetAttr {
        node: NodeId,
        name: String,
        value: Option<String>,
    },
}

/// Counters for DOM writes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DomStats {
    pub inserts: usize,
    pub moves: usize,
    pub removals: usize,
    pub text_writes: usize,
    pub attr_writes: usize,
}

struct Listener {
    id: ListenerId,
    event: String,
    handler: EventHandler,
}

struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    listeners: Vec<Listener>,
}

struct Entry {
    generation: u32,
    node: Option<NodeData>,
}

// =============================================================================
// Tree (arena)
// =============================================================================

struct Tree {
    entries: Vec<Entry>,
    free: Vec<u32>,
    stats: DomStats,
    journal: Vec<Mutation>,
    recording: bool,
    next_listener: u64,
}

impl Tree {
    fn new(recording: bool) -> Self {
        Self {
            entries: Vec::new(),
            free: Vec::new(),
            stats: DomStats::default(),
            journal: Vec::new(),
            recording,
            next_listener: 0,
        }
    }

    fn get(&self, id: NodeId) -> Option<&NodeData> {
        self.entries
            .get(id.index as usize)
            .filter(|entry| entry.generation == id.generation)
            .and_then(|entry| entry.node.as_ref())
    }

    fn get_mut(&mut self, id: NodeId) -> Option<&mut NodeData> {
        self.entries
            .get_mut(id.index as usize)
            .filter(|entry| entry.generation == id.generation)
            .and_then(|entry| entry.node.as_mut())
    }

    fn alloc(&mut self, kind: NodeKind) -> NodeId {
        let data = NodeData {
            kind,
            parent: None,
            children: Vec::new(),
            listeners: Vec::new(),
        };

        // Reuse free slot or grow
        if let Some(index) = self.free.pop() {
            let entry = &mut self.entries[index as usize];
            entry.node = Some(data);
            NodeId {
                index,
                generation: entry.generation,
            }
        } else {
            let index = self.entries.len() as u32;
            self.entries.push(Entry {
                generation: 0,
                node: Some(data),
            });
            NodeId {
                index,
                generation: 0,
            }
        }
    }

    fn release(&mut self, id: NodeId) {
        if let Some(entry) = self.entries.get_mut(id.index as usize) {
            if entry.generation == id.generation && entry.node.take().is_some() {
                entry.generation = entry.generation.wrapping_add(1);
                self.free.push(id.index);
            }
        }
    }

    /// Remove `node` from its parent's child list. Returns the old parent.
    fn unlink(&mut self, node: NodeId) -> Option<NodeId> {
        let parent = self.get_mut(node)?.parent.take()?;
        if let Some(parent_data) = self.get_mut(parent) {
            parent_data.children.retain(|&child| child != node);
        }
        Some(parent)
    }

    fn is_ancestor_or_self(&self, candidate: NodeId, mut node: NodeId) -> bool {
        loop {
            if node == candidate {
                return true;
            }
            match self.get(node).and_then(|data| data.parent) {
                Some(parent) => node = parent,
                None => return false,
            }
        }
    }

    fn record(&mut self, mutation: Mutation) {
        if self.recording {
            self.journal.push(mutation);
        }
    }
}

// =============================================================================
// Dom handle
// =============================================================================

/// Shared handle to one node tree. Cloning shares the tree.
#[derive(Clone)]
pub struct Dom {
    tree: Rc<RefCell<Tree>>,
}

impl Default for Dom {
    fn default() -> Self {
        Self::new()
    }
}

impl Dom {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::with_recording(false)
    }

    /// Create an empty tree, optionally journaling every mutation.
    pub fn with_recording(recording: bool) -> Self {
        Self {
            tree: Rc::new(RefCell::new(Tree::new(recording))),
        }
    }

    // -------------------------------------------------------------------------
    // Creation
    // -------------------------------------------------------------------------

    /// Create a detached element.
    pub fn create_element(&self, tag: &str) -> NodeId {
        self.tree.borrow_mut().alloc(NodeKind::Element {
            tag: tag.to_string(),
            attrs: IndexMap::new(),
        })
    }

    /// Create a detached text node.
    pub fn create_text(&self, data: &str) -> NodeId {
        self.tree
            .borrow_mut()
            .alloc(NodeKind::Text(data.to_string()))
    }

    /// Create an empty text node used as a stable insertion anchor.
    pub fn create_anchor(&self) -> NodeId {
        self.create_text("")
    }

    // -------------------------------------------------------------------------
    // Structure
    // -------------------------------------------------------------------------

    /// Append `child` as the last child of `parent`.
    pub fn append(&self, parent: NodeId, child: NodeId) {
        self.insert(parent, child, None);
    }

    /// Insert `node` under `parent` before `anchor` (append when `None`).
    ///
    /// If `node` is already attached anywhere it is moved, which counts as a
    /// move rather than an insert.
    pub fn insert(&self, parent: NodeId, node: NodeId, anchor: Option<NodeId>) {
        if anchor == Some(node) {
            return;
        }

        let mut tree = self.tree.borrow_mut();
        if tree.get(parent).is_none() || tree.get(node).is_none() {
            tracing::warn!(?parent, ?node, "insert on a released node ignored");
            return;
        }
        if tree.is_ancestor_or_self(node, parent) {
            tracing::warn!(?parent, ?node, "insert would create a cycle; ignored");
            return;
        }

        let was_attached = tree.unlink(node).is_some();

        let Some(parent_data) = tree.get_mut(parent) else { return };
        let position = match anchor {
            Some(anchor) => match parent_data.children.iter().position(|&c| c == anchor) {
                Some(position) => position,
                None => {
                    tracing::warn!(?parent, ?anchor, "anchor is not a child of parent; appending");
                    parent_data.children.len()
                }
            },
            None => parent_data.children.len(),
        };
        parent_data.children.insert(position, node);

        if let Some(node_data) = tree.get_mut(node) {
            node_data.parent = Some(parent);
        }

        if was_attached {
            tree.stats.moves += 1;
            tree.record(Mutation::Move { node, parent, anchor });
        } else {
            tree.stats.inserts += 1;
            tree.record(Mutation::Insert { node, parent, anchor });
        }
    }

    /// Unlink `node` from its parent. The node stays alive and can be
    /// re-inserted.
    pub fn detach(&self, node: NodeId) {
        let mut tree = self.tree.borrow_mut();
        if let Some(parent) = tree.unlink(node) {
            tree.stats.removals += 1;
            tree.record(Mutation::Detach { node, parent });
        }
    }

    /// Unlink `node` and free it together with its whole subtree.
    pub fn discard(&self, node: NodeId) {
        self.detach(node);

        let mut tree = self.tree.borrow_mut();
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            if let Some(data) = tree.get(id) {
                stack.extend(data.children.iter().copied());
            }
            tree.release(id);
        }
    }

    // -------------------------------------------------------------------------
    // Content
    // -------------------------------------------------------------------------

    /// Set (`Some`) or remove (`None`) an attribute. Writing the current
    /// value is a no-op.
    pub fn set_attr(&self, node: NodeId, name: &str, value: Option<&str>) {
        let mut tree = self.tree.borrow_mut();
        let Some(NodeKind::Element { attrs, .. }) = tree.get_mut(node).map(|data| &mut data.kind) else {
            return;
        };

        let changed = match value {
            Some(value) => {
                if attrs.get(name).map(String::as_str) == Some(value) {
                    false
                } else {
                    attrs.insert(name.to_string(), value.to_string());
                    true
                }
            }
            None => attrs.shift_remove(name).is_some(),
        };

        if changed {
            tree.stats.attr_writes += 1;
            tree.record(Mutation::SetAttr {
                node,
                name: name.to_string(),
                value: value.map(str::to_string),
            });
        }
    }

    /// Read an attribute.
    pub fn attr(&self, node: NodeId, name: &str) -> Option<String> {
        match &self.tree.borrow().get(node)?.kind {
            NodeKind::Element { attrs, .. } => attrs.get(name).cloned(),
            NodeKind::Text(_) => None,
        }
    }

    /// Replace a text node's data. Writing the current data is a no-op.
    pub fn set_data(&self, node: NodeId, data: &str) {
        let mut tree = self.tree.borrow_mut();
        let Some(NodeKind::Text(current)) = tree.get_mut(node).map(|d| &mut d.kind) else {
            return;
        };
        if current == data {
            return;
        }
        current.clear();
        current.push_str(data);

        tree.stats.text_writes += 1;
        tree.record(Mutation::SetData {
            node,
            data: data.to_string(),
        });
    }

    /// Data of a text node.
    pub fn data(&self, node: NodeId) -> Option<String> {
        match &self.tree.borrow().get(node)?.kind {
            NodeKind::Text(data) => Some(data.clone()),
            NodeKind::Element { .. } => None,
        }
    }

    /// Concatenated text of `node` and all its descendants.
    pub fn text_content(&self, node: NodeId) -> String {
        let tree = self.tree.borrow();
        let mut out = String::new();
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            let Some(data) = tree.get(id) else { continue };
            match &data.kind {
                NodeKind::Text(text) => out.push_str(text),
                NodeKind::Element { .. } => stack.extend(data.children.iter().rev().copied()),
            }
        }
        out
    }

    /// Replace all children of an element with one text node (none when
    /// `text` is empty). On a text node this is `set_data`.
    pub fn set_text_content(&self, node: NodeId, text: &str) {
        let children = {
            let tree = self.tree.borrow();
            match tree.get(node).map(|d| &d.kind) {
                Some(NodeKind::Element { .. }) => tree.get(node).map(|d| d.children.clone()),
                Some(NodeKind::Text(_)) => None,
                None => return,
            }
        };

        let Some(children) = children else {
            self.set_data(node, text);
            return;
        };

        for child in children {
            self.discard(child);
        }
        if !text.is_empty() {
            let text_node = self.create_text(text);
            self.append(node, text_node);
        }
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// Child ids in document order.
    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.tree
            .borrow()
            .get(node)
            .map(|data| data.children.clone())
            .unwrap_or_default()
    }

    /// Parent id, if attached.
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.tree.borrow().get(node)?.parent
    }

    /// Tag name of an element.
    pub fn tag(&self, node: NodeId) -> Option<String> {
        match &self.tree.borrow().get(node)?.kind {
            NodeKind::Element { tag, .. } => Some(tag.clone()),
            NodeKind::Text(_) => None,
        }
    }

    /// Whether `node` still refers to a live node.
    pub fn is_alive(&self, node: NodeId) -> bool {
        self.tree.borrow().get(node).is_some()
    }

    /// Number of live nodes in the arena.
    pub fn node_count(&self) -> usize {
        let tree = self.tree.borrow();
        tree.entries.len() - tree.free.len()
    }

    /// Serialize `node` and its subtree as HTML.
    pub fn to_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        html::write_node(&self.tree.borrow(), node, &mut out);
        out
    }

    // -------------------------------------------------------------------------
    // Events
    // -------------------------------------------------------------------------

    /// Attach a listener. Returns a handle for [`Dom::unlisten`].
    pub fn listen(&self, node: NodeId, event: &str, handler: impl Fn(&Event) + 'static) -> ListenerId {
        let mut tree = self.tree.borrow_mut();
        let id = ListenerId(tree.next_listener);
        tree.next_listener += 1;

        if let Some(data) = tree.get_mut(node) {
            data.listeners.push(Listener {
                id,
                event: event.to_string(),
                handler: Rc::new(handler),
            });
        }
        id
    }

    /// Remove a listener. Returns false if it was not attached.
    pub fn unlisten(&self, node: NodeId, id: ListenerId) -> bool {
        let mut tree = self.tree.borrow_mut();
        let Some(data) = tree.get_mut(node) else { return false };
        let before = data.listeners.len();
        data.listeners.retain(|listener| listener.id != id);
        data.listeners.len() != before
    }

    /// Dispatch an event on `target`, bubbling to its ancestors.
    ///
    /// Handlers run outside the tree borrow, so they may freely mutate the
    /// DOM or component state. Returns the number of handlers invoked.
    pub fn dispatch(&self, target: NodeId, name: &str, detail: Value) -> usize {
        let event = Event::new(name, target, detail);
        let mut invoked = 0;
        let mut current = Some(target);

        while let Some(node) = current {
            let (handlers, parent) = {
                let tree = self.tree.borrow();
                let Some(data) = tree.get(node) else { break };
                let handlers: Vec<EventHandler> = data
                    .listeners
                    .iter()
                    .filter(|listener| listener.event == name)
                    .map(|listener| listener.handler.clone())
                    .collect();
                (handlers, data.parent)
            };

            event.set_current_target(node);
            for handler in handlers {
                handler(&event);
                invoked += 1;
            }

            if event.is_propagation_stopped() {
                break;
            }
            current = parent;
        }

        invoked
    }

    // -------------------------------------------------------------------------
    // Instrumentation
    // -------------------------------------------------------------------------

    /// Write counters since creation or the last [`Dom::reset_stats`].
    pub fn stats(&self) -> DomStats {
        self.tree.borrow().stats
    }

    /// Zero the write counters.
    pub fn reset_stats(&self) {
        self.tree.borrow_mut().stats = DomStats::default();
    }

    /// Drain the mutation journal (empty unless recording is on).
    pub fn take_journal(&self) -> Vec<Mutation> {
        std::mem::take(&mut self.tree.borrow_mut().journal)
    }

    /// Turn the mutation journal on or off.
    pub fn set_recording(&self, recording: bool) {
        self.tree.borrow_mut().recording = recording;
    }
}
