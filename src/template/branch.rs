//! Conditional regions.
//!
//! An [`IfBlock`] shows one of up to two branches depending on a condition
//! over the parent's slots. While the condition keeps its value the live
//! branch is patched in place; when it flips, the old branch is destroyed and
//! the other one is created and mounted in front of the region's anchor.
//!
//! Branches render from the parent's slots unchanged.

use serde_json::Value;
use smallvec::SmallVec;

use crate::component::Fragment;
use crate::dom::{Dom, NodeId};
use crate::runtime::DirtyMask;

type ConditionFn = Box<dyn Fn(&[Value]) -> bool>;
type BranchFn = Box<dyn Fn() -> Box<dyn Fragment>>;

/// Conditional region of a template.
pub struct IfBlock {
    deps: SmallVec<[usize; 4]>,
    condition: ConditionFn,
    then: BranchFn,
    otherwise: Option<BranchFn>,
    /// Which branch is live and its fragment.
    current: Option<(bool, Box<dyn Fragment>)>,
    anchor: Option<NodeId>,
}

impl IfBlock {
    /// Create a region rendering `then` while `condition` holds.
    ///
    /// `deps` lists every parent slot the condition or either branch reads;
    /// nothing is re-evaluated unless one of them is dirty.
    pub fn new(
        deps: &[usize],
        condition: impl Fn(&[Value]) -> bool + 'static,
        then: impl Fn() -> Box<dyn Fragment> + 'static,
    ) -> Self {
        Self {
            deps: SmallVec::from_slice(deps),
            condition: Box::new(condition),
            then: Box::new(then),
            otherwise: None,
            current: None,
            anchor: None,
        }
    }

    /// Branch rendered while the condition does not hold.
    pub fn otherwise(mut self, render: impl Fn() -> Box<dyn Fragment> + 'static) -> Self {
        self.otherwise = Some(Box::new(render));
        self
    }

    /// Whether a branch is rendered, and which: `Some(true)` for `then`.
    pub fn branch(&self) -> Option<bool> {
        self.current.as_ref().map(|(branch, _)| *branch)
    }

    fn render(&self, branch: bool) -> Option<Box<dyn Fragment>> {
        if branch {
            Some((self.then)())
        } else {
            self.otherwise.as_ref().map(|render| render())
        }
    }
}

impl Fragment for IfBlock {
    fn create(&mut self, dom: &Dom, ctx: &[Value]) {
        self.anchor = Some(dom.create_anchor());
        let branch = (self.condition)(ctx);
        self.current = self.render(branch).map(|mut fragment| {
            fragment.create(dom, ctx);
            (branch, fragment)
        });
    }

    fn claim(&mut self, dom: &Dom, ctx: &[Value], nodes: &mut Vec<NodeId>) {
        self.anchor = Some(dom.create_anchor());
        let branch = (self.condition)(ctx);
        self.current = self.render(branch).map(|mut fragment| {
            fragment.claim(dom, ctx, nodes);
            (branch, fragment)
        });
    }

    fn mount(&mut self, dom: &Dom, target: NodeId, anchor: Option<NodeId>) {
        if let Some((_, fragment)) = &mut self.current {
            fragment.mount(dom, target, anchor);
        }
        if let Some(own) = self.anchor {
            dom.insert(target, own, anchor);
        }
    }

    fn patch(&mut self, dom: &Dom, ctx: &[Value], dirty: &DirtyMask) {
        if !dirty.any(&self.deps) {
            return;
        }
        let branch = (self.condition)(ctx);

        if let Some((live, fragment)) = &mut self.current {
            if *live == branch {
                fragment.patch(dom, ctx, dirty);
                return;
            }
        }

        if let Some((_, mut fragment)) = self.current.take() {
            fragment.destroy(dom, true);
        }
        let Some(anchor) = self.anchor else { return };
        let Some(parent) = dom.parent(anchor) else { return };
        self.current = self.render(branch).map(|mut fragment| {
            fragment.create(dom, ctx);
            fragment.intro();
            fragment.mount(dom, parent, Some(anchor));
            (branch, fragment)
        });
        tracing::trace!(branch, rendered = self.current.is_some(), "if block switched");
    }

    fn intro(&mut self) {
        if let Some((_, fragment)) = &mut self.current {
            fragment.intro();
        }
    }

    fn first(&self) -> Option<NodeId> {
        self.current
            .as_ref()
            .and_then(|(_, fragment)| fragment.first())
            .or(self.anchor)
    }

    fn destroy(&mut self, dom: &Dom, detaching: bool) {
        if let Some((_, mut fragment)) = self.current.take() {
            fragment.destroy(dom, detaching);
        }
        if let (true, Some(anchor)) = (detaching, self.anchor.take()) {
            dom.discard(anchor);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Runtime;
    use crate::template::Template;
    use serde_json::json;

    /// `<em>{ctx[1]}</em>` shown while ctx[0] is true, `<i>none</i>` otherwise.
    fn flag(rt: &Runtime, with_else: bool) -> IfBlock {
        let (then_rt, else_rt) = (rt.clone(), rt.clone());
        let block = IfBlock::new(
            &[0, 1],
            |ctx| ctx[0].as_bool().unwrap_or_default(),
            move || {
                let mut t = Template::new(&then_rt);
                let em = t.element(None, "em");
                t.dynamic_text(Some(em), &[1], |ctx| ctx[1].as_str().unwrap_or_default().to_string());
                Box::new(t.build())
            },
        );
        if !with_else {
            return block;
        }
        block.otherwise(move || {
            let mut t = Template::new(&else_rt);
            let i = t.element(None, "i");
            t.text(Some(i), "none");
            Box::new(t.build())
        })
    }

    #[test]
    fn test_branch_created_patched_and_destroyed_on_flip() {
        let rt = Runtime::new();
        let dom = rt.dom();
        let div = dom.create_element("div");
        let footer = dom.create_element("b");
        dom.append(div, footer);

        let mut block = flag(&rt, false);
        block.create(dom, &[json!(false), json!("a")]);
        block.mount(dom, div, Some(footer));
        assert_eq!(block.branch(), None);
        assert_eq!(dom.to_html(div), "<div><b></b></div>");

        block.patch(dom, &[json!(true), json!("a")], &DirtyMask::from_slots(&[0]));
        assert_eq!(block.branch(), Some(true));
        assert_eq!(dom.to_html(div), "<div><em>a</em><b></b></div>", "created before the footer");
        let em = dom.children(div)[0];

        block.patch(dom, &[json!(true), json!("b")], &DirtyMask::from_slots(&[1]));
        assert_eq!(dom.children(div)[0], em, "same condition patches in place");
        assert_eq!(dom.to_html(div), "<div><em>b</em><b></b></div>");

        block.patch(dom, &[json!(false), json!("b")], &DirtyMask::from_slots(&[0]));
        assert!(!dom.is_alive(em));
        assert_eq!(dom.to_html(div), "<div><b></b></div>");
    }

    #[test]
    fn test_else_branch_swaps_with_then() {
        let rt = Runtime::new();
        let dom = rt.dom();
        let div = dom.create_element("div");

        let mut block = flag(&rt, true);
        block.create(dom, &[json!(true), json!("yes")]);
        block.mount(dom, div, None);
        assert_eq!(dom.to_html(div), "<div><em>yes</em></div>");

        block.patch(dom, &[json!(false), json!("yes")], &DirtyMask::from_slots(&[0]));
        assert_eq!(block.branch(), Some(false));
        assert_eq!(dom.to_html(div), "<div><i>none</i></div>");
    }

    #[test]
    fn test_clean_deps_skip_condition() {
        let rt = Runtime::new();
        let dom = rt.dom();
        let div = dom.create_element("div");

        let mut block = flag(&rt, false);
        block.create(dom, &[json!(true), json!("kept")]);
        block.mount(dom, div, None);

        block.patch(dom, &[json!(false), json!("kept")], &DirtyMask::from_slots(&[4]));
        assert_eq!(block.branch(), Some(true));
        assert_eq!(dom.to_html(div), "<div><em>kept</em></div>");
    }

    #[test]
    fn test_destroy_detaching_clears_branch_and_anchor() {
        let rt = Runtime::new();
        let dom = rt.dom();
        let div = dom.create_element("div");

        let mut block = flag(&rt, false);
        block.create(dom, &[json!(true), json!("x")]);
        block.mount(dom, div, None);
        block.destroy(dom, true);

        assert!(dom.children(div).is_empty());
        assert_eq!(block.branch(), None);
    }
}
