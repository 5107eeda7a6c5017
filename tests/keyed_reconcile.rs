//! Keyed reconciliation properties.

mod common;

use std::collections::HashSet;
use std::rc::Rc;

use proptest::prelude::*;
use proptest::sample::subsequence;
use serde_json::json;
use spark_dom::{DirtyMask, Dom, KeyedItem, KeyedList, NodeId};

use common::TextRow;

const UNIVERSE: u32 = 12;

fn items(keys: &[u32]) -> Vec<KeyedItem<u32>> {
    keys.iter()
        .map(|&k| KeyedItem::new(k, vec![json!(format!("<{k}>"))]))
        .collect()
}

fn rendered(keys: &[u32]) -> String {
    keys.iter().map(|k| format!("<{k}>")).collect()
}

fn mounted(keys: &[u32]) -> (Dom, NodeId, NodeId, KeyedList<u32>) {
    let dom = Dom::new();
    let parent = dom.create_element("ol");
    let tail = dom.create_anchor();
    dom.append(parent, tail);

    let mut list = KeyedList::create(&dom, items(keys), |_| TextRow::boxed());
    list.mount(&dom, parent, Some(tail));
    dom.reset_stats();
    (dom, parent, tail, list)
}

fn key_list() -> impl Strategy<Value = Vec<u32>> {
    let universe: Vec<u32> = (0..UNIVERSE).collect();
    subsequence(universe, 0..=UNIVERSE as usize).prop_shuffle()
}

proptest! {
    #[test]
    fn prop_reconcile_reaches_new_order_and_reuses_blocks(old in key_list(), new in key_list()) {
        let (dom, parent, tail, mut list) = mounted(&old);
        let before: Vec<_> = old.iter().filter_map(|k| list.get(k).map(|b| (*k, b))).collect();

        let outcome = list.reconcile(&dom, parent, Some(tail), items(&new), &DirtyMask::All, |_| TextRow::boxed());

        prop_assert_eq!(dom.text_content(parent), rendered(&new));
        prop_assert_eq!(list.keys(), new.clone());
        prop_assert_eq!(dom.children(parent).last().copied(), Some(tail), "anchor stays last");

        let old_set: HashSet<u32> = old.iter().copied().collect();
        let new_set: HashSet<u32> = new.iter().copied().collect();
        for (key, block) in &before {
            match list.get(key) {
                Some(after) => {
                    prop_assert!(Rc::ptr_eq(block, &after), "key {} rebuilt", key);
                }
                None => {
                    prop_assert!(!new_set.contains(key));
                }
            }
        }

        prop_assert_eq!(outcome.created, new_set.difference(&old_set).count());
        prop_assert_eq!(outcome.destroyed, old_set.difference(&new_set).count());
        prop_assert_eq!(outcome.patched, new_set.intersection(&old_set).count());
        prop_assert_eq!(outcome.inserted, outcome.created);

        let stats = dom.stats();
        prop_assert_eq!(stats.moves, outcome.moved);
        prop_assert_eq!(stats.inserts, outcome.inserted);
        prop_assert!(outcome.moved <= outcome.patched);
    }

    #[test]
    fn prop_reconcile_against_itself_is_free(keys in key_list()) {
        let (dom, parent, tail, mut list) = mounted(&keys);

        let outcome = list.reconcile(&dom, parent, Some(tail), items(&keys), &DirtyMask::All, |_| TextRow::boxed());

        prop_assert_eq!(outcome.inserted + outcome.moved + outcome.destroyed + outcome.created, 0);
        let stats = dom.stats();
        prop_assert_eq!(stats.inserts + stats.moves + stats.removals, 0);
    }

    #[test]
    fn prop_single_relocation_keeps_every_block(len in 2usize..10, from in 0usize..10, to in 0usize..10) {
        let from = from % len;
        let to = to % len;
        prop_assume!(from != to);

        let old: Vec<u32> = (0..len as u32).collect();
        let mut new = old.clone();
        let key = new.remove(from);
        new.insert(to, key);

        let (dom, parent, tail, mut list) = mounted(&old);
        let outcome = list.reconcile(&dom, parent, Some(tail), items(&new), &DirtyMask::All, |_| TextRow::boxed());

        prop_assert_eq!(dom.text_content(parent), rendered(&new));
        prop_assert!(outcome.moved >= 1);
        prop_assert_eq!(outcome.created + outcome.destroyed, 0);
    }
}

#[test]
fn test_rotation_right_moves_exactly_one() {
    let (dom, parent, tail, mut list) = mounted(&[1, 2, 3]);

    let outcome = list.reconcile(&dom, parent, Some(tail), items(&[3, 1, 2]), &DirtyMask::All, |_| {
        TextRow::boxed()
    });

    assert_eq!(outcome.moved, 1);
    assert_eq!(outcome.created + outcome.destroyed, 0);
    assert_eq!(dom.text_content(parent), "<3><1><2>");
}

#[test]
fn test_insert_between_moves_nothing() {
    let (dom, parent, tail, mut list) = mounted(&[1, 2]);

    let outcome = list.reconcile(&dom, parent, Some(tail), items(&[1, 9, 2]), &DirtyMask::All, |_| {
        TextRow::boxed()
    });

    assert_eq!(outcome.created, 1);
    assert_eq!(outcome.moved, 0);
    assert_eq!(dom.stats().moves, 0);
    assert_eq!(dom.text_content(parent), "<1><9><2>");
}

#[test]
fn test_patched_blocks_receive_new_ctx() {
    let (dom, parent, tail, mut list) = mounted(&[1, 2]);

    let renamed = vec![
        KeyedItem::new(1, vec![json!("one")]),
        KeyedItem::new(2, vec![json!("two")]),
    ];
    list.reconcile(&dom, parent, Some(tail), renamed, &DirtyMask::All, |_| TextRow::boxed());

    assert_eq!(dom.text_content(parent), "onetwo");
    assert_eq!(dom.stats().text_writes, 2);
}
