//! Helpers shared by the integration tests.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use serde_json::Value;
use spark_dom::{
    Component, ComponentDef, ComponentOptions, DirtyMask, Dom, Fragment, NodeId, Props, Result, Runtime,
    Template,
};
use tracing_subscriber::EnvFilter;

/// Route runtime logs to the test writer, filtered by `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// `<p>{text}</p>` with a `text` prop in slot 0. Counts text evaluations and
/// logs its name to `log` from a before-update hook.
pub struct Label {
    pub name: &'static str,
    pub renders: Rc<Cell<usize>>,
    pub log: Rc<RefCell<Vec<String>>>,
}

impl Label {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            renders: Rc::new(Cell::new(0)),
            log: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn sharing_log(name: &'static str, log: &Rc<RefCell<Vec<String>>>) -> Self {
        Self {
            name,
            renders: Rc::new(Cell::new(0)),
            log: log.clone(),
        }
    }
}

impl ComponentDef for Label {
    fn name(&self) -> &str {
        self.name
    }

    fn slot_count(&self) -> usize {
        1
    }

    fn props(&self) -> &[(&'static str, usize)] {
        &[("text", 0)]
    }

    fn instance(&self, cx: &Component, _props: &Props) -> Result<()> {
        let log = self.log.clone();
        let name = self.name;
        spark_dom::before_update(cx.runtime(), move || log.borrow_mut().push(name.to_string()))
    }

    fn fragment(&self, cx: &Component) -> Option<Box<dyn Fragment>> {
        let mut t = Template::new(cx.runtime());
        let p = t.element(None, "p");
        let renders = self.renders.clone();
        t.dynamic_text(Some(p), &[0], move |ctx| {
            renders.set(renders.get() + 1);
            text_of(&ctx[0])
        });
        Some(Box::new(t.build()))
    }
}

/// Mount `def` under a fresh `<main>` and return both.
pub fn mount(rt: &Runtime, def: Rc<dyn ComponentDef>, props: Props) -> (NodeId, Component) {
    let target = rt.dom().create_element("main");
    let component = Component::new(
        rt,
        def,
        ComponentOptions {
            target: Some(target),
            props,
            ..Default::default()
        },
    )
    .unwrap_or_else(|err| panic!("component construction failed: {err}"));
    (target, component)
}

/// Display form of a slot value: strings without quotes, `Null` empty.
pub fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Keyed block rendering one text node from ctx[0].
pub struct TextRow {
    pub node: Option<NodeId>,
}

impl TextRow {
    pub fn boxed() -> Box<dyn Fragment> {
        Box::new(TextRow { node: None })
    }
}

impl Fragment for TextRow {
    fn create(&mut self, dom: &Dom, ctx: &[Value]) {
        self.node = Some(dom.create_text(&text_of(&ctx[0])));
    }

    fn mount(&mut self, dom: &Dom, target: NodeId, anchor: Option<NodeId>) {
        if let Some(node) = self.node {
            dom.insert(target, node, anchor);
        }
    }

    fn patch(&mut self, dom: &Dom, ctx: &[Value], _dirty: &DirtyMask) {
        if let Some(node) = self.node {
            dom.set_data(node, &text_of(&ctx[0]));
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
