//! Lifecycle registration for the component being initialised.
//!
//! These functions attach to whichever component is active on the runtime's
//! scheduler, which is the component whose `ComponentDef::instance` (or
//! fragment construction) is running. Called anywhere else they fail with
//! [`RuntimeError::OutsideComponentInit`](crate::RuntimeError).
//!
//! # Example
//!
//! ```ignore
//! fn instance(&self, cx: &Component, _props: &Map<String, Value>) -> Result<()> {
//!     let rt = cx.runtime();
//!     on_mount(rt, || {
//!         tracing::info!("mounted");
//!         Some(Box::new(|| tracing::info!("torn down")))
//!     })?;
//!     set_context(rt, "lang", "th".to_string())?;
//!     Ok(())
//! }
//! ```

use std::rc::Rc;

use crate::component::events::EventDispatcher;
use crate::error::Result;

use super::{Cleanup, Runtime};

/// Run `hook` once the component is first mounted and flushed. A returned
/// cleanup joins the on-destroy list.
pub fn on_mount(rt: &Runtime, hook: impl FnOnce() -> Option<Cleanup> + 'static) -> Result<()> {
    let component = rt.scheduler().current_component("on_mount")?;
    component.push_on_mount(Box::new(hook));
    Ok(())
}

/// Run `hook` when the component is destroyed.
pub fn on_destroy(rt: &Runtime, hook: impl FnOnce() + 'static) -> Result<()> {
    let component = rt.scheduler().current_component("on_destroy")?;
    component.push_on_destroy(Box::new(hook));
    Ok(())
}

/// Run `hook` before every patch of the component (and once before its
/// fragment is first built).
pub fn before_update(rt: &Runtime, hook: impl Fn() + 'static) -> Result<()> {
    let component = rt.scheduler().current_component("before_update")?;
    component.push_before_update(Rc::new(hook));
    Ok(())
}

/// Run `hook` after every flush that patched the component.
pub fn after_update(rt: &Runtime, hook: impl Fn() + 'static) -> Result<()> {
    let component = rt.scheduler().current_component("after_update")?;
    component.push_after_update(Rc::new(hook));
    Ok(())
}

/// Make `value` visible to the component's descendants under `key`.
pub fn set_context<T: 'static>(rt: &Runtime, key: &str, value: T) -> Result<()> {
    let component = rt.scheduler().current_component("set_context")?;
    component.context().set(key, value);
    Ok(())
}

/// Nearest context value for `key` as seen by the active component.
pub fn get_context<T: Clone + 'static>(rt: &Runtime, key: &str) -> Result<Option<T>> {
    let component = rt.scheduler().current_component("get_context")?;
    component.context().get(key)
}

/// Whether `key` is visible to the active component.
pub fn has_context(rt: &Runtime, key: &str) -> Result<bool> {
    let component = rt.scheduler().current_component("has_context")?;
    Ok(component.context().has(key))
}

/// Dispatcher for events the active component emits to its `on` listeners.
pub fn create_event_dispatcher(rt: &Runtime) -> Result<EventDispatcher> {
    let component = rt.scheduler().current_component("create_event_dispatcher")?;
    Ok(EventDispatcher::new(&component))
}
