//! Signal bridge - mirror a `spark_signals` signal into a reactive slot.
//!
//! ```ignore
//! let total = signal(0.0_f64);
//!
//! fn instance(&self, cx: &Component, _props: &Props) -> Result<()> {
//!     store::subscribe(cx, TOTAL, &self.total, |v| json!(v))?;
//!     Ok(())
//! }
//!
//! total.set(12.5); // slot TOTAL invalidated, patched on the next flush
//! ```

use serde_json::Value;
use spark_signals::{effect, Signal};

use crate::component::Component;
use crate::error::Result;

/// Keep `slot` of `component` equal to `map(signal)`.
///
/// The slot is written immediately and again whenever the signal changes.
/// The underlying effect stops when the component is destroyed.
///
/// # Errors
///
/// `OutsideComponentInit` unless a component is being initialised.
pub fn subscribe<T>(
    component: &Component,
    slot: usize,
    source: &Signal<T>,
    map: impl Fn(&T) -> Value + 'static,
) -> Result<()>
where
    T: Clone + PartialEq + 'static,
{
    component.runtime().scheduler().current_component("subscribe")?;

    let weak = component.downgrade();
    let source = source.clone();
    let stop = effect(move || {
        let value = map(&source.get());
        weak.set(slot, value);
    });

    component.push_on_destroy(Box::new(stop));
    tracing::trace!(component = component.id(), slot, "signal subscribed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    use serde_json::json;
    use spark_signals::signal;

    use crate::component::{ComponentDef, ComponentOptions, Fragment, Props};
    use crate::error::RuntimeError;
    use crate::runtime::Runtime;

    struct Mirror {
        source: Signal<i32>,
    }

    impl ComponentDef for Mirror {
        fn slot_count(&self) -> usize {
            1
        }

        fn instance(&self, cx: &Component, _props: &Props) -> crate::error::Result<()> {
            subscribe(cx, 0, &self.source, |v| json!(v * 10))
        }

        fn fragment(&self, _cx: &Component) -> Option<Box<dyn Fragment>> {
            None
        }
    }

    #[test]
    fn test_subscribe_mirrors_until_destroy() {
        let rt = Runtime::new();
        let source = signal(1);
        let c = Component::new(&rt, Rc::new(Mirror { source: source.clone() }), ComponentOptions::default())
            .unwrap_or_else(|err| panic!("{err}"));

        assert_eq!(c.get(0), json!(10));
        assert!(c.dirty_mask().is_all(), "initial write happens during init");

        source.set(2);
        assert_eq!(c.get(0), json!(20));
        assert!(c.is_dirty(0));

        c.destroy();
        source.set(3);
        assert_eq!(c.get(0), json!(20), "effect must stop on destroy");
    }

    #[test]
    fn test_subscribe_outside_init_fails() {
        let rt = Runtime::new();
        let c = Component::new(&rt, Rc::new(Mirror { source: signal(0) }), ComponentOptions::default())
            .unwrap_or_else(|err| panic!("{err}"));

        let other = signal(5);
        assert!(matches!(
            subscribe(&c, 0, &other, |v| json!(v)),
            Err(RuntimeError::OutsideComponentInit { operation: "subscribe" })
        ));
    }
}
