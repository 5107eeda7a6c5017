//! Component events - `on` listeners and the dispatcher a component emits with.

use std::rc::Rc;

use serde_json::Value;

use super::{Component, WeakComponent};

/// Event a component emits to its `on` listeners.
#[derive(Clone, Debug, PartialEq)]
pub struct ComponentEvent {
    pub name: String,
    pub detail: Value,
}

/// Listener registered with [`Component::on`].
pub type ComponentEventHandler = Rc<dyn Fn(&ComponentEvent)>;

/// Emits events on behalf of one component.
///
/// Holds the component weakly; dispatching after the component is gone
/// does nothing.
#[derive(Clone)]
pub struct EventDispatcher {
    component: WeakComponent,
}

impl EventDispatcher {
    pub(crate) fn new(component: &Component) -> Self {
        Self {
            component: component.downgrade(),
        }
    }

    /// Emit `name` with `detail`. Returns how many listeners ran.
    pub fn dispatch(&self, name: &str, detail: Value) -> usize {
        match self.component.upgrade() {
            Some(component) => component.dispatch(name, detail),
            None => 0,
        }
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("alive", &self.component.upgrade().is_some())
            .finish()
    }
}
