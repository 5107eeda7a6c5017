//! Fragment - the unit of rendered DOM a component or keyed block owns.

use serde_json::Value;

use crate::dom::{Dom, NodeId};
use crate::runtime::DirtyMask;

/// Detached-then-mounted DOM with patch and teardown capabilities.
///
/// Call order: `create` (or `claim`), optionally `intro`, `mount`, any number
/// of `mount` (to move) and `patch` calls, then `destroy` once.
///
/// `ctx` is the owning scope's slot values. For a component that is its
/// reactive slots; for a keyed `each` item it is the parent's slots followed
/// by the item value and its index.
pub trait Fragment {
    /// Build the DOM nodes without inserting them anywhere.
    fn create(&mut self, dom: &Dom, ctx: &[Value]);

    /// Adopt matching nodes from `nodes` instead of building new ones,
    /// removing adopted nodes from the list. Whatever stays in `nodes` is
    /// discarded by the caller.
    fn claim(&mut self, dom: &Dom, ctx: &[Value], nodes: &mut Vec<NodeId>) {
        let _ = nodes;
        self.create(dom, ctx);
    }

    /// Insert the fragment's top-level nodes under `target`, before
    /// `anchor` (or at the end). Mounting an already mounted fragment moves it.
    fn mount(&mut self, dom: &Dom, target: NodeId, anchor: Option<NodeId>);

    /// Re-evaluate whatever reads a dirty slot.
    fn patch(&mut self, dom: &Dom, ctx: &[Value], dirty: &DirtyMask);

    /// Called between creation and the first mount when intro is requested.
    fn intro(&mut self) {}

    /// First top-level node, used as an insertion anchor by keyed lists.
    fn first(&self) -> Option<NodeId>;

    /// Release everything. `detaching` is false when an ancestor's nodes are
    /// being removed anyway.
    fn destroy(&mut self, dom: &Dom, detaching: bool);
}

/// Fragment that renders nothing. Components without a fragment use it so
/// the lifecycle still runs.
#[derive(Debug, Default)]
pub struct EmptyFragment;

impl Fragment for EmptyFragment {
    fn create(&mut self, _dom: &Dom, _ctx: &[Value]) {}

    fn mount(&mut self, _dom: &Dom, _target: NodeId, _anchor: Option<NodeId>) {}

    fn patch(&mut self, _dom: &Dom, _ctx: &[Value], _dirty: &DirtyMask) {}

    fn first(&self) -> Option<NodeId> {
        None
    }

    fn destroy(&mut self, _dom: &Dom, _detaching: bool) {}
}
