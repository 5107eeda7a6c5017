//! DOM events - listener handles and the event object passed to handlers.

use std::cell::Cell;
use std::rc::Rc;

use serde_json::Value;

use super::NodeId;

/// Listener callback (Rc so the dispatcher can call it outside the tree borrow).
pub type EventHandler = Rc<dyn Fn(&Event)>;

/// Handle returned by `Dom::listen`, used to remove the listener.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(pub(super) u64);

/// An event travelling from its target up through the target's ancestors.
#[derive(Debug)]
pub struct Event {
    /// Event name, e.g. `"input"`, `"blur"`, `"click"`.
    pub name: String,
    /// Node the event was dispatched on.
    pub target: NodeId,
    /// Payload supplied by the dispatcher.
    pub detail: Value,
    current_target: Cell<NodeId>,
    propagation_stopped: Cell<bool>,
}

impl Event {
    pub(super) fn new(name: impl Into<String>, target: NodeId, detail: Value) -> Self {
        Self {
            name: name.into(),
            target,
            detail,
            current_target: Cell::new(target),
            propagation_stopped: Cell::new(false),
        }
    }

    /// Node whose listener is currently running.
    pub fn current_target(&self) -> NodeId {
        self.current_target.get()
    }

    pub(super) fn set_current_target(&self, node: NodeId) {
        self.current_target.set(node);
    }

    /// Stop the event from reaching further ancestors.
    pub fn stop_propagation(&self) {
        self.propagation_stopped.set(true);
    }

    /// Whether a handler called [`Event::stop_propagation`].
    pub fn is_propagation_stopped(&self) -> bool {
        self.propagation_stopped.get()
    }
}
